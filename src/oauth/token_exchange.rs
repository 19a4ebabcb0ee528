//! Refresh-grant exchange against the authorization server's token endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::OAuthError;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest access-token lifetime accepted from the token endpoint.
pub const MAX_EXPIRES_IN_SECS: i64 = 7 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokenSet, OAuthError>;
}

pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpTokenEndpoint {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokenSet, OAuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.trim()),
            ("client_id", self.client_id.trim()),
        ];
        if !self.client_secret.trim().is_empty() {
            form.push(("client_secret", self.client_secret.trim()));
        }

        let response = self
            .client
            .post(self.token_url.trim())
            .form(&form)
            .send()
            .await
            .map_err(classify_request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(classify_request_error)?;
        parse_token_response(status, &body)
    }
}

fn classify_request_error(err: reqwest::Error) -> OAuthError {
    if err.is_timeout() {
        OAuthError::Transient(format!("token request timed out: {err}"))
    } else {
        OAuthError::Network(err.to_string())
    }
}

/// Turns a token endpoint answer into a token set or a classified error.
pub(crate) fn parse_token_response(status: StatusCode, body: &str) -> Result<OAuthTokenSet, OAuthError> {
    if !status.is_success() {
        let (code, description) = parse_error_details(body);
        if code.as_deref() == Some("invalid_grant") {
            return Err(OAuthError::InvalidGrant(
                description.unwrap_or_else(|| "refresh token revoked or expired".into()),
            ));
        }
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            return Err(OAuthError::Transient(format!("status={}", status.as_u16())));
        }
        return Err(OAuthError::Rejected {
            status: status.as_u16(),
            code: code.unwrap_or_else(|| "unknown".into()),
        });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| OAuthError::InvalidResponse(format!("json invalid: {e}")))?;

    let access_token = non_empty_str(&value, "access_token")
        .ok_or_else(|| OAuthError::InvalidResponse("missing access_token".into()))?;
    let expires_in = value
        .get("expires_in")
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|secs| *secs > 0);
    if let Some(secs) = expires_in.filter(|secs| *secs > MAX_EXPIRES_IN_SECS) {
        return Err(OAuthError::InvalidResponse(format!(
            "expires_in out of range: {secs}"
        )));
    }

    Ok(OAuthTokenSet {
        access_token,
        refresh_token: non_empty_str(&value, "refresh_token"),
        expires_in,
        scope: non_empty_str(&value, "scope"),
    })
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_error_details(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };
    (
        non_empty_str(&value, "error"),
        non_empty_str(&value, "error_description"),
    )
}
