//! Session state
//!
//! ```text
//! Uninitialized
//!   ↓ initialize
//! Loading ──────────────┐
//!   ↓ push / grace      │ push
//! Authenticated(user)   │
//! Anonymous(user)       │
//! Unauthenticated  ←────┤ sign-out, watchdog
//! Error(kind)      ─────┘ sign-in reopens the cycle
//! ```
//!
//! There is no terminal state.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::user::User;

/// An error currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Distinguishes successive errors for auto-dismissal
    pub generation: u64,
}

/// Per-context session state owned by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<SurfacedError>,
    pub initialized: bool,
}

impl Session {
    /// Derive the state-machine state. `force_logout` is the current value
    /// of the shared signal; it dominates any present user.
    pub fn phase(&self, force_logout: bool) -> SessionPhase {
        if !self.initialized {
            return SessionPhase::Uninitialized;
        }
        if self.is_loading {
            return SessionPhase::Loading;
        }
        match (&self.user, &self.error) {
            (Some(user), _) if !force_logout => {
                if user.is_anonymous {
                    SessionPhase::Anonymous(user.clone())
                } else {
                    SessionPhase::Authenticated(user.clone())
                }
            }
            (_, Some(error)) => SessionPhase::Error(error.kind),
            _ => SessionPhase::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self, force_logout: bool) -> bool {
        self.user.is_some() && !force_logout
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Authenticated(User),
    Anonymous(User),
    Unauthenticated,
    Error(ErrorKind),
}

impl SessionPhase {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionPhase::Authenticated(user) | SessionPhase::Anonymous(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Loading => "loading",
            SessionPhase::Authenticated(_) => "authenticated",
            SessionPhase::Anonymous(_) => "anonymous",
            SessionPhase::Unauthenticated => "unauthenticated",
            SessionPhase::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the presentation layer reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<SurfacedError>,
}

impl SessionView {
    pub fn from_session(session: &Session, force_logout: bool) -> Self {
        Self {
            user: session.user.clone(),
            is_authenticated: session.is_authenticated(force_logout),
            is_loading: session.is_loading,
            error: session.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(user: Option<User>) -> Session {
        Session {
            user,
            is_loading: false,
            error: None,
            initialized: true,
        }
    }

    #[test]
    fn test_signal_dominates_user() {
        let session = ready(Some(User::guest()));

        assert!(session.is_authenticated(false));
        assert!(!session.is_authenticated(true));
        assert_eq!(session.phase(true), SessionPhase::Unauthenticated);
    }

    #[test]
    fn test_phases() {
        assert_eq!(Session::default().phase(false), SessionPhase::Uninitialized);

        let mut session = ready(None);
        assert_eq!(session.phase(false), SessionPhase::Unauthenticated);

        session.is_loading = true;
        assert_eq!(session.phase(false), SessionPhase::Loading);

        session.is_loading = false;
        session.error = Some(SurfacedError {
            kind: ErrorKind::Network,
            message: ErrorKind::Network.message().to_string(),
            generation: 1,
        });
        assert_eq!(session.phase(false), SessionPhase::Error(ErrorKind::Network));

        let guest = User::guest();
        session.user = Some(guest.clone());
        assert_eq!(session.phase(false), SessionPhase::Anonymous(guest));
    }
}
