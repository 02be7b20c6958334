//! User data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User object as delivered by the identity provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    pub photo_url: Option<String>,
    pub email: Option<String>,
    pub metadata: Option<ProviderMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub creation_time: Option<DateTime<Utc>>,
    pub last_sign_in_time: Option<DateTime<Utc>>,
}

/// Immutable snapshot of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Provider identifier, or `guest-<uuid>` for a local guest
    pub id: String,
    pub display_name: String,
    pub is_anonymous: bool,
    pub photo_url: Option<String>,
    pub email: Option<String>,
    pub metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    pub creation_time: Option<DateTime<Utc>>,
    pub last_sign_in_time: Option<DateTime<Utc>>,
}

impl User {
    pub fn from_provider(user: &ProviderUser) -> Self {
        let display_name = user
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                user.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if user.is_anonymous {
                    "Guest".to_string()
                } else {
                    "User".to_string()
                }
            });

        Self {
            id: user.uid.clone(),
            display_name,
            is_anonymous: user.is_anonymous,
            photo_url: user.photo_url.clone(),
            email: user.email.clone(),
            metadata: user.metadata.as_ref().map(|m| UserMetadata {
                creation_time: m.creation_time,
                last_sign_in_time: m.last_sign_in_time,
            }),
        }
    }

    /// A guest identity that exists only on this side.
    ///
    /// The provider never hears about it, so it cannot be looked up there.
    pub fn guest() -> Self {
        let now = Utc::now();

        Self {
            id: format!("guest-{}", Uuid::new_v4()),
            display_name: "Guest".to_string(),
            is_anonymous: true,
            photo_url: None,
            email: None,
            metadata: Some(UserMetadata {
                creation_time: Some(now),
                last_sign_in_time: Some(now),
            }),
        }
    }

    pub fn is_local_guest(&self) -> bool {
        self.is_anonymous && self.id.starts_with("guest-")
    }
}
