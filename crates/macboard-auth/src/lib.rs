//! Mac Board Session Synchronization
//!
//! Reconciles three independently updated sources of authentication state:
//! - push notifications from the identity provider
//! - the persisted session snapshot in the origin-wide store
//! - the force-logout signal, raised by any context's sign-out
//!
//! Each browsing context owns one [`SessionController`]. Contexts that did
//! not originate a logout converge through their [`Watchdog`], which polls
//! the signal on a fixed interval.

mod controller;
mod error;
mod provider;
mod signal;
mod snapshot;
mod state;
pub mod testing;
mod user;
mod watchdog;

pub use controller::{ControllerOptions, SessionController};
pub use error::{format_error_message, AuthError, ErrorKind, ProviderError};
pub use provider::{IdentityProvider, ProviderEvent};
pub use signal::{ForceLogoutSignal, FORCE_LOGOUT_KEY};
pub use snapshot::{PersistedSnapshot, SnapshotStore, SESSION_SNAPSHOT_KEY};
pub use state::{Session, SessionPhase, SessionView, SurfacedError};
pub use user::{ProviderMetadata, ProviderUser, User, UserMetadata};
pub use watchdog::{poll_once, Watchdog, DEFAULT_POLL_INTERVAL};

pub type Result<T> = std::result::Result<T, AuthError>;
