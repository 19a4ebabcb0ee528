use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::{PgUserStore, UserStore};
pub use repo_types::User;
pub use services::{RegistrationWorkflow, VerificationWorkflow};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
