use serde::{Deserialize, Serialize};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nickname: String,
    pub email: String,
}

/// Query string of the verification link.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub token: String,
}

/// Request body for re-sending the verification email.
#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
}
