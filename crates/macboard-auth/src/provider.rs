//! Identity provider adapter interface

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::user::ProviderUser;

/// A provider-side auth transition.
///
/// Delivery is at-least-once with no ordering guarantee relative to local
/// calls; consumers must tolerate replays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// `Some` when a user is signed in on the provider side, `None` otherwise
    Changed(Option<ProviderUser>),
    /// The subscription itself reported a failure
    Failed(ProviderError),
}

/// Hosted identity provider, implemented outside this crate.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Interactive (popup) sign-in. A user dismissing the flow is reported
    /// as an error whose code contains `popup-closed` or `cancel`.
    async fn sign_in_interactive(&self) -> Result<ProviderUser, ProviderError>;

    /// Whether [`IdentityProvider::sign_in_anonymous`] is available.
    fn supports_anonymous(&self) -> bool {
        false
    }

    async fn sign_in_anonymous(&self) -> Result<ProviderUser, ProviderError> {
        Err(ProviderError::unsupported())
    }

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Subscribe to provider-side transitions. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent>;
}
