use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::{
    error::{ServiceError, TokenError},
    state::AppState,
    users::dto::{RegisterRequest, ResendRequest, UserResponse, VerifyQuery},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/verify", get(verify))
        .route("/users/verify/resend", post(resend))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let message = state
        .registration
        .register(&payload.nickname, &payload.email)
        .await
        .map_err(into_response)?;
    Ok(Json(UserResponse { message }))
}

#[instrument(skip(state, query))]
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    state
        .verification
        .verify(&query.token)
        .await
        .map_err(into_response)?;
    Ok(Json(UserResponse {
        message: "Email successfully verified".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn resend(
    State(state): State<AppState>,
    Json(payload): Json<ResendRequest>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let message = state
        .registration
        .resend(&payload.email)
        .await
        .map_err(into_response)?;
    Ok(Json(UserResponse { message }))
}

pub(crate) fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::DuplicateUser(_) | ServiceError::AlreadyVerified(_) => StatusCode::CONFLICT,
        ServiceError::UserNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Token {
            source: TokenError::SigningError(_),
            ..
        } => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Token { .. } => StatusCode::BAD_REQUEST,
        ServiceError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Send { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn into_response(err: ServiceError) -> (StatusCode, String) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    } else {
        warn!(error = %err, "request rejected");
    }
    (status, err.to_string())
}
