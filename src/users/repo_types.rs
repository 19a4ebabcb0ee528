use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,                   // unique user ID
    pub nickname: String,           // display name
    pub email: String,              // lookup key, lower-cased
    pub verified: bool,             // email ownership confirmed
    pub created_at: OffsetDateTime, // creation timestamp
}
