mod credential;
mod token_exchange;

pub use credential::{AuthorizationServer, OAuthCredential, OAuthCredentialManager};
pub use token_exchange::{HttpTokenEndpoint, OAuthTokenSet, TokenEndpoint};
