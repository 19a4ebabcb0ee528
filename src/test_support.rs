//! In-memory fakes for the collaborators the workflows talk to.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use time::{macros::datetime, OffsetDateTime};

use crate::{
    clock::Clock,
    error::{OAuthError, StoreError, TransportError},
    mail::{MailTransport, OutgoingMessage},
    oauth::{OAuthTokenSet, TokenEndpoint},
    users::{User, UserStore},
};

pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(datetime!(2024-01-01 12:00 UTC)),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("clock lock")
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, User>>,
    pub fail_writes: bool,
}

impl InMemoryUserStore {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.users.lock().expect("store lock").get(email).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().expect("store lock").len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn save(&self, user: &User) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut users = self.users.lock().expect("store lock");
        if users.contains_key(&user.email) {
            return Err(StoreError::Duplicate(user.email.clone()));
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn mark_verified(&self, email: &str) -> Result<bool, StoreError> {
        if self.fail_writes {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut users = self.users.lock().expect("store lock");
        match users.get_mut(email) {
            Some(user) => {
                user.verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get(email))
    }
}

/// Records every message and replays scripted failures in order before
/// falling back to success.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(OutgoingMessage, String)>>,
    attempts: AtomicUsize,
    script: Mutex<Vec<TransportError>>,
}

impl RecordingTransport {
    pub fn failing_with(errors: Vec<TransportError>) -> Self {
        Self {
            script: Mutex::new(errors),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(OutgoingMessage, String)> {
        self.sent.lock().expect("transport lock").clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &OutgoingMessage, bearer: &str) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let scripted = {
            let mut script = self.script.lock().expect("transport lock");
            if script.is_empty() {
                None
            } else {
                Some(script.remove(0))
            }
        };
        if let Some(err) = scripted {
            return Err(err);
        }
        self.sent
            .lock()
            .expect("transport lock")
            .push((message.clone(), bearer.to_string()));
        Ok(())
    }
}

/// Token endpoint that counts refresh calls and answers after a short delay
/// so concurrent callers overlap.
pub struct CountingTokenEndpoint {
    calls: AtomicUsize,
    delay: Duration,
    expires_in: Option<i64>,
    outcome: Result<(), OAuthError>,
}

impl CountingTokenEndpoint {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
            expires_in: Some(3600),
            outcome: Ok(()),
        }
    }

    pub fn failing(err: OAuthError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
            expires_in: Some(3600),
            outcome: Err(err),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_expires_in(mut self, expires_in: Option<i64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for CountingTokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokenSet, OAuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()?;
        Ok(OAuthTokenSet {
            access_token: format!("access-{n}"),
            refresh_token: Some(format!("{refresh_token}-rotated")),
            expires_in: self.expires_in,
            scope: None,
        })
    }
}
