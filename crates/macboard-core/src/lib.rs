//! Mac Board Core
//!
//! Wires one browsing context together: the origin-wide store, the session
//! controller and its watchdog, plus configuration and logging.

mod config;
mod context;
mod error;

pub use config::Config;
pub use context::BrowsingContext;
pub use error::CoreError;

// Re-export core components
pub use macboard_auth::{
    format_error_message, ErrorKind, ForceLogoutSignal, IdentityProvider, ProviderError,
    ProviderEvent, ProviderUser, SessionController, SessionPhase, SessionView, SurfacedError,
    User,
};
pub use macboard_storage::{Database, KeyValueStore, MemoryStore, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
