use crate::auth::error::AuthError;
use crate::auth::identity::IdentityProvider;
use crate::auth::token::BearerToken;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const FAKE_ENDPOINT: &str = "fake://identity";

/// `FakeIdentity` is an in-memory identity endpoint for testing purposes.
/// It counts exchanges and can simulate rejection, outages, and short-lived tokens.
#[derive(Clone)]
pub struct FakeIdentity {
    calls: Arc<AtomicUsize>,
    lifetimes: Arc<Mutex<VecDeque<Duration>>>,
    default_lifetime: Duration,
    reject: Arc<AtomicBool>,
    transient_failures: Arc<AtomicUsize>,
    delay: std::time::Duration,
}

#[allow(dead_code)]
impl FakeIdentity {
    /// Create a FakeIdentity issuing one-hour tokens
    pub fn new() -> Self {
        FakeIdentity {
            calls: Arc::new(AtomicUsize::new(0)),
            lifetimes: Arc::new(Mutex::new(VecDeque::new())),
            default_lifetime: Duration::hours(1),
            reject: Arc::new(AtomicBool::new(false)),
            transient_failures: Arc::new(AtomicUsize::new(0)),
            delay: std::time::Duration::ZERO,
        }
    }

    /// Slow every exchange down, so concurrent readers overlap
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Lifetime of the next issued token; queued values are used in order
    pub fn fake_next_lifetime(&self, lifetime: Duration) {
        self.lifetimes.lock().unwrap().push_back(lifetime);
    }

    /// Reject all exchanges as if the API key were revoked
    pub fn fake_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Fail the next `count` exchanges with a transport error
    pub fn fake_fail_transiently(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Number of exchanges attempted so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn request_token(&self) -> Result<BearerToken, AuthError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.reject.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected {
                endpoint: FAKE_ENDPOINT.to_string(),
                status: 400,
                message: "Provided API key could not be found".to_string(),
            });
        }

        let pending_failure = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if pending_failure {
            return Err(AuthError::Transport {
                endpoint: FAKE_ENDPOINT.to_string(),
                reason: "503 Service Unavailable".to_string(),
            });
        }

        let lifetime = self
            .lifetimes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_lifetime);

        Ok(BearerToken::new(
            format!("fake-token-{}", call),
            Utc::now() + lifetime,
        ))
    }

    fn endpoint(&self) -> &str {
        FAKE_ENDPOINT
    }
}

impl Default for FakeIdentity {
    fn default() -> Self {
        Self::new()
    }
}
