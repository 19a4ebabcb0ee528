use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    error::{SendError, TransportError},
    mail::{message::OutgoingMessage, transport::MailTransport},
    oauth::OAuthCredentialManager,
};

/// Sends mail through a transport authenticated with the managed OAuth2
/// credential.
///
/// An authorization failure triggers one forced credential refresh and one
/// retry. Every other failure is returned as is.
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    credentials: Arc<OAuthCredentialManager>,
    sender: String,
    send_timeout: Duration,
}

impl Mailer {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        credentials: Arc<OAuthCredentialManager>,
        sender: impl Into<String>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            credentials,
            sender: sender.into(),
            send_timeout,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let message = OutgoingMessage::new(&self.sender, to, subject, body)?;
        let bearer = self.credentials.get_valid_access_token().await?;

        match self.deliver(&message, &bearer).await {
            Ok(()) => {}
            Err(TransportError::Unauthorized(reason)) => {
                warn!(to = %to, reason = %reason, "mail transport rejected credential; refreshing once");
                let bearer = self.credentials.force_refresh(&bearer).await?;
                self.deliver(&message, &bearer).await?;
            }
            Err(err) => return Err(err.into()),
        }

        info!(to = %to, subject = %subject, "mail sent");
        Ok(())
    }

    async fn deliver(&self, message: &OutgoingMessage, bearer: &str) -> Result<(), TransportError> {
        tokio::time::timeout(self.send_timeout, self.transport.send(message, bearer))
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }
}
