use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;
use time::OffsetDateTime;

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
const DEFAULT_GMAIL_SEND_URL: &str =
    "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";
/// One week.
const MAX_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_minutes: u64,
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: Option<i64>,
    pub scope: String,
}

impl OAuthConfig {
    pub fn access_token_expiry(&self) -> anyhow::Result<Option<OffsetDateTime>> {
        self.access_token_expires_at
            .map(OffsetDateTime::from_unix_timestamp)
            .transpose()
            .context("GOOGLE_OAUTH_ACCESS_TOKEN_EXPIRES_AT out of range")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub sender: String,
    pub verification_url: String,
    pub gmail_send_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_base_path: String,
    pub database_url: String,
    pub token: TokenConfig,
    pub oauth: OAuthConfig,
    pub email: EmailConfig,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let ttl_minutes: i64 = match lookup("EMAIL_TOKEN_EXPIRY") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("invalid value for EMAIL_TOKEN_EXPIRY: {v}"))?,
            None => 15,
        };
        if ttl_minutes <= 0 {
            bail!("EMAIL_TOKEN_EXPIRY must be a positive number of minutes");
        }
        if ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            bail!("EMAIL_TOKEN_EXPIRY must be at most {MAX_TOKEN_TTL_MINUTES} minutes");
        }

        let access_token_expires_at = lookup("GOOGLE_OAUTH_ACCESS_TOKEN_EXPIRES_AT")
            .map(|v| {
                v.trim().parse::<i64>().with_context(|| {
                    format!("invalid value for GOOGLE_OAUTH_ACCESS_TOKEN_EXPIRES_AT: {v}")
                })
            })
            .transpose()?;

        Ok(Self {
            host: or_default("APP_HOST", "0.0.0.0"),
            port: or_default("APP_PORT", "8080")
                .parse()
                .context("APP_PORT must be a port number")?,
            api_base_path: or_default("APP_API_BASE_PATH", "/api/v1"),
            database_url: required("DATABASE_URL")?,
            token: TokenConfig {
                secret: required("JWT_SECRET_KEY")?,
                ttl_minutes: ttl_minutes as u64,
            },
            oauth: OAuthConfig {
                client_id: required("GOOGLE_CLIENT_ID")?,
                client_secret: required("GOOGLE_CLIENT_SECRET")?,
                redirect_uri: or_default("GOOGLE_REDIRECT_URI", ""),
                auth_url: or_default("GOOGLE_AUTH_URL", DEFAULT_AUTH_URL),
                token_url: or_default("GOOGLE_TOKEN_URL", DEFAULT_TOKEN_URL),
                access_token: or_default("GOOGLE_OAUTH_ACCESS_TOKEN", ""),
                refresh_token: required("GOOGLE_OAUTH_REFRESH_TOKEN")?,
                access_token_expires_at,
                scope: or_default("GOOGLE_OAUTH_SCOPE", DEFAULT_SCOPE),
            },
            email: EmailConfig {
                sender: required("EMAIL_SENDER")?,
                verification_url: required("EMAIL_VERIFICATION_URL")?,
                gmail_send_url: or_default("GMAIL_SEND_URL", DEFAULT_GMAIL_SEND_URL),
            },
            http_timeout_secs: or_default("HTTP_TIMEOUT_SECS", "10")
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a number of seconds")?,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
