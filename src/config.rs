use std::time::Duration;

use cosmic::cosmic_config::{self, CosmicConfigEntry, cosmic_config_derive::CosmicConfigEntry};
use serde::{Deserialize, Serialize};

use crate::board::BoardOptions;
use crate::board::store::SyncMode;
use crate::core::status::{StatusSet, Theme};
use crate::sync::firestore::{DEFAULT_ENDPOINT, FirestoreSettings};

pub const CONFIG_VERSION: u64 = 1;

pub const APP_ID: &str = "dev.frontdesk.app";

const MIN_POLL_SECS: u64 = 1;

/// Where appointments live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process board, lost on exit. Used until a project is configured.
    #[default]
    Memory,
    Firestore,
}

impl Backend {
    pub const ALL: &'static [Backend] = &[Backend::Memory, Backend::Firestore];

    pub fn label(&self) -> &'static str {
        match self {
            Backend::Memory => "This device only",
            Backend::Firestore => "Firestore",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, CosmicConfigEntry)]
pub struct BoardConfig {
    pub backend: Backend,
    pub project_id: String,
    pub api_key: String,
    pub collection: String,
    /// Field the remote listing is sorted by. Empty keeps the server order.
    pub order_by: String,
    pub sync_mode: SyncMode,
    pub poll_interval_secs: u64,
    pub status_set: StatusSet,
    pub theme: Theme,
    /// Last signed-in account, prefilled on the login page.
    pub email: String,
    pub debug_logging: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            project_id: String::new(),
            api_key: String::new(),
            collection: "appointments".into(),
            order_by: String::new(),
            sync_mode: SyncMode::Live,
            poll_interval_secs: 5,
            status_set: StatusSet::Basic,
            theme: Theme::Light,
            email: String::new(),
            debug_logging: false,
        }
    }
}

impl BoardConfig {
    /// True when the Firestore backend is selected and has what it needs to connect.
    pub fn firestore_ready(&self) -> bool {
        self.backend == Backend::Firestore
            && !self.project_id.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.collection.trim().is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_SECS))
    }

    pub fn firestore_settings(&self) -> Option<FirestoreSettings> {
        if !self.firestore_ready() {
            return None;
        }
        let order_by = self.order_by.trim();
        Some(FirestoreSettings {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project_id: self.project_id.trim().to_string(),
            api_key: self.api_key.trim().to_string(),
            collection: self.collection.trim().to_string(),
            order_by: (!order_by.is_empty()).then(|| order_by.to_string()),
            poll_interval: self.poll_interval(),
        })
    }

    pub fn board_options(&self) -> BoardOptions {
        BoardOptions {
            sync_mode: self.sync_mode,
            status_set: self.status_set,
            theme: self.theme,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.collection, "appointments");
        assert_eq!(config.sync_mode, SyncMode::Live);
        assert_eq!(config.status_set, StatusSet::Basic);
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(!config.firestore_ready());
        assert!(config.firestore_settings().is_none());
    }

    #[test]
    fn firestore_needs_project_and_key() {
        let mut config = BoardConfig {
            backend: Backend::Firestore,
            project_id: "desk-1".into(),
            ..BoardConfig::default()
        };
        assert!(!config.firestore_ready());
        config.api_key = "k".into();
        assert!(config.firestore_ready());
        config.backend = Backend::Memory;
        assert!(!config.firestore_ready());
    }

    #[test]
    fn settings_trim_and_drop_empty_order() {
        let mut config = BoardConfig {
            backend: Backend::Firestore,
            project_id: " desk-1 ".into(),
            api_key: "k".into(),
            poll_interval_secs: 0,
            ..BoardConfig::default()
        };
        let settings = config.firestore_settings().unwrap();
        assert_eq!(settings.project_id, "desk-1");
        assert_eq!(settings.order_by, None);
        assert_eq!(settings.poll_interval, Duration::from_secs(1));

        config.order_by = "time".into();
        let settings = config.firestore_settings().unwrap();
        assert_eq!(settings.order_by.as_deref(), Some("time"));
    }

    #[test]
    fn board_options_follow_config() {
        let config = BoardConfig {
            sync_mode: SyncMode::Once,
            status_set: StatusSet::Extended,
            theme: Theme::Dark,
            ..BoardConfig::default()
        };
        let options = config.board_options();
        assert_eq!(options.sync_mode, SyncMode::Once);
        assert_eq!(options.status_set, StatusSet::Extended);
        assert_eq!(options.theme, Theme::Dark);
    }
}
