use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    error::OAuthError,
    oauth::token_exchange::{TokenEndpoint, DEFAULT_EXPIRES_IN_SECS},
    security::mask_token,
};

/// A cached access token is treated as stale this long before it expires.
pub const REFRESH_LEAD: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct OAuthCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<OffsetDateTime>,
    pub scope: String,
}

impl OAuthCredential {
    /// Unknown expiry or an empty access token always counts as stale.
    fn usable_token(&self, now: OffsetDateTime) -> Option<&str> {
        let expires_at = self.expires_at?;
        if self.access_token.is_empty() || expires_at - REFRESH_LEAD <= now {
            return None;
        }
        Some(self.access_token.as_str())
    }
}

impl fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &mask_token(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Endpoints used to send an operator back through consent after the refresh
/// grant has been revoked.
#[derive(Debug, Clone)]
pub struct AuthorizationServer {
    pub auth_url: String,
    pub client_id: String,
    pub redirect_uri: String,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, OAuthError>>>;

struct CredentialState {
    credential: OAuthCredential,
    in_flight: Option<RefreshFuture>,
}

struct Inner {
    state: Mutex<CredentialState>,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    authorization: AuthorizationServer,
}

/// Owns the mail provider credential and refreshes it on demand.
///
/// Concurrent callers that find the access token stale share one in-flight
/// refresh and all observe its outcome.
pub struct OAuthCredentialManager {
    inner: Arc<Inner>,
}

impl OAuthCredentialManager {
    pub fn new(
        credential: OAuthCredential,
        endpoint: Arc<dyn TokenEndpoint>,
        authorization: AuthorizationServer,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CredentialState {
                    credential,
                    in_flight: None,
                }),
                endpoint,
                clock,
                request_timeout,
                authorization,
            }),
        }
    }

    pub async fn get_valid_access_token(&self) -> Result<String, OAuthError> {
        let refresh = {
            let mut state = self.inner.lock_state();
            if let Some(token) = state.credential.usable_token(self.inner.clock.now()) {
                return Ok(token.to_string());
            }
            self.join_or_start_refresh(&mut state)
        };
        refresh.await
    }

    /// Refreshes after the transport rejected `rejected_token`, unless the
    /// cache already holds a newer usable token.
    pub async fn force_refresh(&self, rejected_token: &str) -> Result<String, OAuthError> {
        let refresh = {
            let mut state = self.inner.lock_state();
            if state.in_flight.is_none() && state.credential.access_token != rejected_token {
                if let Some(token) = state.credential.usable_token(self.inner.clock.now()) {
                    return Ok(token.to_string());
                }
            }
            self.join_or_start_refresh(&mut state)
        };
        refresh.await
    }

    pub fn authorization_url(&self, state: &str) -> anyhow::Result<String> {
        self.inner.authorization_url(state)
    }

    fn join_or_start_refresh(&self, state: &mut CredentialState) -> RefreshFuture {
        if let Some(in_flight) = &state.in_flight {
            debug!("joining in-flight oauth refresh");
            return in_flight.clone();
        }

        let inner = Arc::clone(&self.inner);
        let refresh_token = state.credential.refresh_token.clone();
        let refresh = async move { inner.run_refresh(refresh_token).await }
            .boxed()
            .shared();
        state.in_flight = Some(refresh.clone());
        refresh
    }

    #[cfg(test)]
    pub(crate) fn credential(&self) -> OAuthCredential {
        self.inner.lock_state().credential.clone()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CredentialState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_refresh(&self, refresh_token: String) -> Result<String, OAuthError> {
        debug!(refresh_token = %mask_token(&refresh_token), "refreshing oauth access token");
        let outcome =
            match tokio::time::timeout(self.request_timeout, self.endpoint.refresh(&refresh_token))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(OAuthError::Transient(format!(
                    "token refresh timed out after {:?}",
                    self.request_timeout
                ))),
            };

        let mut state = self.lock_state();
        state.in_flight = None;
        match outcome {
            Ok(tokens) => {
                let expires_in = tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
                let Some(expires_at) = self
                    .clock
                    .now()
                    .checked_add(time::Duration::seconds(expires_in))
                else {
                    let err = OAuthError::InvalidResponse(format!(
                        "expires_in out of range: {expires_in}"
                    ));
                    warn!(error = %err, "oauth refresh failed");
                    return Err(err);
                };
                let credential = &mut state.credential;
                credential.access_token = tokens.access_token;
                if let Some(rotated) = tokens.refresh_token {
                    credential.refresh_token = rotated;
                }
                if let Some(scope) = tokens.scope {
                    credential.scope = scope;
                }
                credential.expires_at = Some(expires_at);
                info!(expires_at = %expires_at, "oauth access token refreshed");
                Ok(credential.access_token.clone())
            }
            Err(err @ OAuthError::InvalidGrant(_)) => {
                drop(state);
                let reauthorize = self.authorization_url("reauthorize").unwrap_or_default();
                error!(
                    error = %err,
                    reauthorize_url = %reauthorize,
                    "oauth refresh grant revoked; re-authorization required"
                );
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, retryable = err.is_retryable(), "oauth refresh failed");
                Err(err)
            }
        }
    }

    fn authorization_url(&self, state: &str) -> anyhow::Result<String> {
        let scope = self.lock_state().credential.scope.clone();
        let url = reqwest::Url::parse_with_params(
            &self.authorization.auth_url,
            &[
                ("client_id", self.authorization.client_id.as_str()),
                ("redirect_uri", self.authorization.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )?;
        Ok(url.to_string())
    }
}
