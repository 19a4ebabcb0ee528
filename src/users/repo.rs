use async_trait::async_trait;
use sqlx::PgPool;

use crate::{error::StoreError, users::repo_types::User};

/// Persistence the workflows need. Email is the lookup key.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn save(&self, user: &User) -> Result<(), StoreError>;
    /// Returns whether a row with this email exists (verified before or not).
    async fn mark_verified(&self, email: &str) -> Result<bool, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, nickname, email, verified, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(user.verified)
        .bind(user.created_at)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(e) => {
                let duplicate =
                    matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
                if duplicate {
                    Err(StoreError::Duplicate(user.email.clone()))
                } else {
                    Err(StoreError::Database(e))
                }
            }
        }
    }

    async fn mark_verified(&self, email: &str) -> Result<bool, StoreError> {
        // Postgres counts matched rows, so an already verified user still reports 1.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verified = TRUE
            WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, nickname, email, verified, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}
