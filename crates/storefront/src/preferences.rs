//! Persisted UI preferences.

use std::sync::Arc;

use tracing::{debug, warn};

use bikeshop_core::DashboardSection;

use crate::storage::{LocalStorage, StorageError, keys};

/// Which admin dashboard section was open last.
///
/// Stored as the bare section name under `dashboardActiveItem`.
#[derive(Clone)]
pub struct DashboardPreference {
    storage: Arc<dyn LocalStorage>,
}

impl DashboardPreference {
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// The stored section, or [`DashboardSection::Dashboard`] when nothing
    /// usable is stored.
    #[must_use]
    pub fn active(&self) -> DashboardSection {
        match self.storage.get(keys::DASHBOARD_ACTIVE_ITEM) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                debug!(value = %raw, "Unknown dashboard section; using default");
                DashboardSection::default()
            }),
            Ok(None) => DashboardSection::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read dashboard preference");
                DashboardSection::default()
            }
        }
    }

    /// Remember `section`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn set_active(&self, section: DashboardSection) -> Result<(), StorageError> {
        self.storage.set(keys::DASHBOARD_ACTIVE_ITEM, section.as_str())
    }
}
