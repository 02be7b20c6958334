//! Force-logout signal
//!
//! One boolean in the origin-wide store, shared by every browsing context.
//! Raised by any context's sign-out, cleared by a successful sign-in, read
//! by every context's watchdog and at controller initialization.

use std::sync::Arc;

use macboard_storage::KeyValueStore;

use crate::Result;

pub const FORCE_LOGOUT_KEY: &str = "mac_board_force_logout";

const RAISED: &str = "true";

#[derive(Clone)]
pub struct ForceLogoutSignal {
    store: Arc<dyn KeyValueStore>,
}

impl ForceLogoutSignal {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Only the exact value `"true"` counts as raised. A read failure is
    /// logged and reads as not raised.
    pub fn is_set(&self) -> bool {
        match self.store.get(FORCE_LOGOUT_KEY) {
            Ok(value) => value.as_deref() == Some(RAISED),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read force-logout signal");
                false
            }
        }
    }

    pub fn raise(&self) -> Result<()> {
        self.store.set(FORCE_LOGOUT_KEY, RAISED)?;
        tracing::debug!("Force-logout signal raised");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(FORCE_LOGOUT_KEY)?;
        tracing::debug!("Force-logout signal cleared");
        Ok(())
    }
}

impl std::fmt::Debug for ForceLogoutSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceLogoutSignal")
            .field("key", &FORCE_LOGOUT_KEY)
            .finish()
    }
}
