//! User profile and session identity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Email, UserId, UserRole};

/// A validated user profile as returned by `/api/users/me` or login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub role: UserRole,
}

impl UserProfile {
    /// Full name if set, otherwise the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// Who the current visitor is.
///
/// Determines which channel is authoritative for cart and wishlist state:
/// nothing while unresolved, local storage while anonymous, the backend
/// once authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Identity fetch has not completed.
    #[default]
    Unresolved,
    /// Resolved, no user.
    Anonymous,
    /// Resolved to a signed-in user.
    Authenticated(UserProfile),
}

impl SessionState {
    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Unresolved | Self::Anonymous => None,
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(full_name: Option<&str>) -> UserProfile {
        UserProfile {
            id: UserId::new(42),
            username: "minh".to_string(),
            full_name: full_name.map(str::to_string),
            email: None,
            phone: None,
            address: None,
            gender: None,
            birth_date: None,
            role: UserRole::User,
        }
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        assert_eq!(profile(Some("Nguyen Van Minh")).display_name(), "Nguyen Van Minh");
        assert_eq!(profile(Some("  ")).display_name(), "minh");
        assert_eq!(profile(None).display_name(), "minh");
    }

    #[test]
    fn test_session_state_user() {
        assert!(SessionState::Unresolved.user().is_none());
        assert!(!SessionState::Unresolved.is_resolved());
        assert!(SessionState::Anonymous.is_resolved());
        let state = SessionState::Authenticated(profile(None));
        assert_eq!(state.user().map(|u| u.id), Some(UserId::new(42)));
    }
}
