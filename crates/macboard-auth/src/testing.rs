//! Testing infrastructure.
//!
//! [`MockProvider`] stands in for the hosted identity provider: sign-in
//! outcomes are scripted up front, pushes are sent by hand, and every call
//! is counted for later assertion.
//!
//! # Example
//!
//! ```ignore
//! use macboard_auth::testing::{provider_user, MockProvider};
//!
//! let provider = MockProvider::new();
//! provider.queue_interactive(Ok(provider_user("uid-1", "Ada")));
//! provider.push(ProviderEvent::Changed(None));
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::provider::{IdentityProvider, ProviderEvent};
use crate::user::ProviderUser;

type SignInResult = Result<ProviderUser, ProviderError>;

/// Build a non-anonymous provider user. An empty `name` leaves the display
/// name unset.
pub fn provider_user(uid: &str, name: &str) -> ProviderUser {
    ProviderUser {
        uid: uid.to_string(),
        display_name: (!name.is_empty()).then(|| name.to_string()),
        is_anonymous: false,
        photo_url: None,
        email: None,
        metadata: None,
    }
}

#[derive(Default)]
pub struct MockProvider {
    interactive: Mutex<VecDeque<SignInResult>>,
    anonymous: Mutex<VecDeque<SignInResult>>,
    supports_anonymous: bool,
    sign_out_error: Mutex<Option<ProviderError>>,
    delay: Mutex<Option<Duration>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
    interactive_calls: AtomicUsize,
    anonymous_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MockProvider {
    /// A provider without anonymous sign-in.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anonymous() -> Self {
        Self {
            supports_anonymous: true,
            ..Self::default()
        }
    }

    pub fn queue_interactive(&self, result: SignInResult) {
        self.interactive.lock().push_back(result);
    }

    pub fn queue_anonymous(&self, result: SignInResult) {
        self.anonymous.lock().push_back(result);
    }

    /// Make every later sign-out fail with `error`.
    pub fn fail_sign_out(&self, error: ProviderError) {
        *self.sign_out_error.lock() = Some(error);
    }

    /// Delay every provider call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Deliver `event` to every live subscriber. Returns how many received it.
    pub fn push(&self, event: ProviderEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    pub fn interactive_calls(&self) -> usize {
        self.interactive_calls.load(Ordering::SeqCst)
    }

    pub fn anonymous_calls(&self) -> usize {
        self.anonymous_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn unscripted() -> ProviderError {
        ProviderError::new("auth/internal-error", "no scripted result")
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn sign_in_interactive(&self) -> Result<ProviderUser, ProviderError> {
        self.interactive_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.interactive
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted()))
    }

    fn supports_anonymous(&self) -> bool {
        self.supports_anonymous
    }

    async fn sign_in_anonymous(&self) -> Result<ProviderUser, ProviderError> {
        self.anonymous_calls.fetch_add(1, Ordering::SeqCst);
        if !self.supports_anonymous {
            return Err(ProviderError::unsupported());
        }
        self.wait().await;
        self.anonymous
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted()))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        match self.sign_out_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }
}
