use thiserror::Error;

/// Failures of verification-token issuance and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token claims are invalid: {0}")]
    InvalidClaims(String),
    #[error("token signing failed: {0}")]
    SigningError(String),
}

/// Failures of the OAuth2 refresh exchange.
///
/// Cloneable so a single refresh outcome can be handed to every caller that
/// joined the same in-flight refresh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// Refresh token revoked or expired. Needs out-of-band re-authorization.
    #[error("refresh grant rejected (invalid_grant): {0}")]
    InvalidGrant(String),
    #[error("token endpoint unreachable: {0}")]
    Network(String),
    #[error("token endpoint temporarily unavailable: {0}")]
    Transient(String),
    #[error("token endpoint rejected the request: status={status} code={code}")]
    Rejected { status: u16, code: String },
    #[error("token endpoint returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl OAuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, OAuthError::Network(_) | OAuthError::Transient(_))
    }
}

/// Classified failures reported by a mail transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport rejected the bearer credential: {0}")]
    Unauthorized(String),
    #[error("transport rejected the message: status={status} {message}")]
    Rejected { status: u16, message: String },
    #[error("transport unreachable: {0}")]
    Network(String),
    #[error("transport call timed out")]
    Timeout,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("mail credential unavailable: {0}")]
    Credential(#[from] OAuthError),
    #[error("mail delivery failed: {0}")]
    Transport(#[from] TransportError),
    #[error("mail message is invalid: {0}")]
    InvalidMessage(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with email {0} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors surfaced by the registration and verification workflows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("email {0} is already registered")]
    DuplicateUser(String),
    #[error("no user registered with email {0}")]
    UserNotFound(String),
    #[error("email {0} is already verified")]
    AlreadyVerified(String),
    #[error("{operation}: persistence failed: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("{operation}: {source}")]
    Token {
        operation: &'static str,
        #[source]
        source: TokenError,
    },
    #[error("{operation}: {source}")]
    Send {
        operation: &'static str,
        #[source]
        source: SendError,
    },
}
