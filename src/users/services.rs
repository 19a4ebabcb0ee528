use std::{sync::Arc, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::{ServiceError, StoreError},
    mail::Mailer,
    token::TokenCodec,
    users::{repo::UserStore, repo_types::User},
};

const VERIFICATION_SUBJECT: &str = "Email Verification";
const MAX_NICKNAME_LEN: usize = 64;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ServiceError::Validation(format!("invalid email: {email}")));
    }
    Ok(email)
}

fn normalize_nickname(raw: &str) -> Result<String, ServiceError> {
    let nickname = raw.trim();
    if nickname.is_empty() {
        return Err(ServiceError::Validation("nickname is required".into()));
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(ServiceError::Validation(format!(
            "nickname must be at most {MAX_NICKNAME_LEN} characters"
        )));
    }
    Ok(nickname.to_string())
}

fn verification_link(base: &str, token: &str) -> String {
    match reqwest::Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("token", token);
            url.to_string()
        }
        Err(_) => format!("{base}?token={token}"),
    }
}

/// Creates unverified users and mails them a verification link.
///
/// Not atomic: a user row written before a token or mail failure stays in
/// the store, and `resend` is the way to notify it later.
pub struct RegistrationWorkflow {
    users: Arc<dyn UserStore>,
    codec: TokenCodec,
    mailer: Arc<Mailer>,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
    verification_url: String,
}

impl RegistrationWorkflow {
    pub fn new(
        users: Arc<dyn UserStore>,
        codec: TokenCodec,
        mailer: Arc<Mailer>,
        clock: Arc<dyn Clock>,
        token_ttl: Duration,
        verification_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            codec,
            mailer,
            clock,
            token_ttl,
            verification_url: verification_url.into(),
        }
    }

    pub fn token_ttl_minutes(&self) -> u64 {
        self.token_ttl.as_secs() / 60
    }

    pub async fn register(&self, nickname: &str, email: &str) -> Result<String, ServiceError> {
        let nickname = normalize_nickname(nickname)?;
        let email = normalize_email(email)?;

        let user = User {
            id: Uuid::new_v4(),
            nickname,
            email,
            verified: false,
            created_at: self.clock.now(),
        };
        self.users.save(&user).await.map_err(|source| match source {
            StoreError::Duplicate(email) => {
                warn!(email = %email, "email already registered");
                ServiceError::DuplicateUser(email)
            }
            source => ServiceError::Persistence {
                operation: "register",
                source,
            },
        })?;
        info!(user_id = %user.id, email = %user.email, "user registered");

        self.send_verification("register", &user.email).await?;
        Ok(self.confirmation(&user.email))
    }

    /// Re-issues a token for an existing, unverified user.
    pub async fn resend(&self, email: &str) -> Result<String, ServiceError> {
        let email = normalize_email(email)?;
        let user = self
            .users
            .find_by_email(&email)
            .await
            .map_err(|source| ServiceError::Persistence {
                operation: "resend",
                source,
            })?
            .ok_or_else(|| ServiceError::UserNotFound(email.clone()))?;
        if user.verified {
            return Err(ServiceError::AlreadyVerified(user.email));
        }

        self.send_verification("resend", &user.email).await?;
        Ok(self.confirmation(&user.email))
    }

    async fn send_verification(
        &self,
        operation: &'static str,
        email: &str,
    ) -> Result<(), ServiceError> {
        let token = self
            .codec
            .issue(email, self.token_ttl)
            .map_err(|source| ServiceError::Token { operation, source })?;

        let body = format!(
            "To verify your account, please click the link below within {} minutes:\n{}",
            self.token_ttl_minutes(),
            verification_link(&self.verification_url, &token),
        );
        self.mailer
            .send(email, VERIFICATION_SUBJECT, &body)
            .await
            .map_err(|source| ServiceError::Send { operation, source })
    }

    fn confirmation(&self, email: &str) -> String {
        format!(
            "A verification email has been sent to {}. Please verify your email within the next {} minutes to complete your registration.",
            email,
            self.token_ttl_minutes()
        )
    }
}

/// Turns a valid verification token into a verified user.
pub struct VerificationWorkflow {
    users: Arc<dyn UserStore>,
    codec: TokenCodec,
}

impl VerificationWorkflow {
    pub fn new(users: Arc<dyn UserStore>, codec: TokenCodec) -> Self {
        Self { users, codec }
    }

    /// Succeeds again for an already verified user.
    pub async fn verify(&self, token: &str) -> Result<(), ServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::Validation("token is required".into()));
        }

        let claims = self.codec.validate(token).map_err(|source| {
            warn!(error = %source, "verification token rejected");
            ServiceError::Token {
                operation: "verify",
                source,
            }
        })?;

        let matched = self
            .users
            .mark_verified(&claims.email)
            .await
            .map_err(|source| ServiceError::Persistence {
                operation: "verify",
                source,
            })?;
        if !matched {
            warn!(email = %claims.email, "verified token names no registered user");
            return Err(ServiceError::UserNotFound(claims.email));
        }

        info!(email = %claims.email, "email verified");
        Ok(())
    }
}
