//! Authentication error types and classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Storage error: {0}")]
    Storage(#[from] macboard_storage::StorageError),

    #[error("Snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// A raw failure reported by the identity provider.
///
/// `code` is the provider's machine-readable error code, e.g.
/// `auth/network-request-failed`. Classification only looks at it by
/// substring, so adapters can pass codes through untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {}", .message.as_deref().unwrap_or("no message"))]
pub struct ProviderError {
    pub code: String,
    pub message: Option<String>,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
        }
    }

    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: None,
        }
    }

    /// Returned by adapters without anonymous sign-in.
    pub fn unsupported() -> Self {
        Self::from_code("auth/operation-not-allowed")
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::classify(Some(self))
    }
}

/// Fixed taxonomy of authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    PopupClosed,
    PopupBlocked,
    Timeout,
    UserCancelled,
    Default,
}

impl ErrorKind {
    /// Classify a provider error by its code. Total: an absent error, or a
    /// code matching nothing, is `Default`. Checks run in a fixed order so
    /// a code matching several patterns resolves to the first.
    pub fn classify(error: Option<&ProviderError>) -> Self {
        let Some(error) = error else {
            return ErrorKind::Default;
        };
        let code = error.code.as_str();

        if code.contains("network") {
            ErrorKind::Network
        } else if code.contains("popup-closed") {
            ErrorKind::PopupClosed
        } else if code.contains("popup-blocked") {
            ErrorKind::PopupBlocked
        } else if code.contains("timeout") {
            ErrorKind::Timeout
        } else if code.contains("cancelled") || code.contains("cancel") {
            ErrorKind::UserCancelled
        } else {
            ErrorKind::Default
        }
    }

    /// Closing the popup or cancelling is a deliberate user action and is
    /// never shown as an error.
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, ErrorKind::PopupClosed | ErrorKind::UserCancelled)
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Check your network connection and try again.",
            ErrorKind::PopupClosed => "The sign-in window was closed.",
            ErrorKind::PopupBlocked => {
                "The sign-in popup was blocked. Allow popups for this site and try again."
            }
            ErrorKind::Timeout => "The request timed out. Please try again.",
            ErrorKind::UserCancelled => "Sign-in was cancelled.",
            ErrorKind::Default => "Something went wrong while signing in. Please try again.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::PopupClosed => "popup_closed",
            ErrorKind::PopupBlocked => "popup_blocked",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UserCancelled => "user_cancelled",
            ErrorKind::Default => "default",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Human-readable message for a provider error.
///
/// Unclassified errors keep the provider's own message when it has one.
pub fn format_error_message(error: Option<&ProviderError>) -> String {
    let kind = ErrorKind::classify(error);
    if kind == ErrorKind::Default {
        if let Some(message) = error.and_then(|e| e.message.as_deref()) {
            if !message.trim().is_empty() {
                return message.to_string();
            }
        }
    }
    kind.message().to_string()
}
