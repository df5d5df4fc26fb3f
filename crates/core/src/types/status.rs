//! Role and dashboard enums.

use serde::{Deserialize, Serialize};

/// Account role reported on a user profile.
///
/// The backend stores a free-form string and only ever checks for
/// `"admin"` (case-insensitively). Anything else, including a missing
/// value, is an ordinary customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    /// Can open the admin dashboard.
    Admin,
}

impl UserRole {
    /// Interpret the backend's role string.
    #[must_use]
    pub fn from_wire(role: Option<&str>) -> Self {
        match role {
            Some(r) if r.trim().eq_ignore_ascii_case("admin") => Self::Admin,
            _ => Self::User,
        }
    }

    /// Whether this role may use the admin dashboard.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Section of the admin dashboard.
///
/// The active section is remembered in local storage between visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSection {
    #[default]
    Dashboard,
    Products,
    Orders,
    Users,
    Reviews,
    Settings,
}

impl DashboardSection {
    /// Every section, in menu order.
    pub const ALL: [Self; 6] = [
        Self::Dashboard,
        Self::Products,
        Self::Orders,
        Self::Users,
        Self::Reviews,
        Self::Settings,
    ];

    /// The identifier persisted in local storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Products => "products",
            Self::Orders => "orders",
            Self::Users => "users",
            Self::Reviews => "reviews",
            Self::Settings => "settings",
        }
    }
}

impl std::fmt::Display for DashboardSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DashboardSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("invalid dashboard section: {s}"))
    }
}
