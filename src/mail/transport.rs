use async_trait::async_trait;
use base64ct::{Base64Url, Encoding};
use reqwest::StatusCode;
use serde_json::json;

use crate::{error::TransportError, mail::message::OutgoingMessage};

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &OutgoingMessage, bearer: &str) -> Result<(), TransportError>;
}

/// Gmail REST `users.messages.send` with a bearer access token.
pub struct GmailTransport {
    client: reqwest::Client,
    send_url: String,
}

impl GmailTransport {
    pub fn new(client: reqwest::Client, send_url: impl Into<String>) -> Self {
        Self {
            client,
            send_url: send_url.into(),
        }
    }
}

#[async_trait]
impl MailTransport for GmailTransport {
    async fn send(&self, message: &OutgoingMessage, bearer: &str) -> Result<(), TransportError> {
        let raw = Base64Url::encode_string(message.to_rfc822().as_bytes());
        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(bearer)
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

fn classify_request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> TransportError {
    let snippet: String = body.chars().take(240).collect();
    if status == StatusCode::UNAUTHORIZED {
        TransportError::Unauthorized(snippet)
    } else {
        TransportError::Rejected {
            status: status.as_u16(),
            message: snippet,
        }
    }
}
