use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    store::{FileStore, InMemoryStore, LeaseStore},
    Error, Result,
};

pub const DEFAULT_LEASE_KEY: &str = "managedbeat_status";
pub const DEFAULT_STORE: &str = "default";

/// Externally loaded configuration surface.
///
/// Loadable from a JSON file; the binary layers command-line overrides on
/// top. Every field has a default, so an empty file (or none at all) is a
/// valid single-instance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Key under which the leader record lives.
    pub lease_key: String,
    /// Seconds a leader record stays valid without renewal.
    pub lease_timeout_secs: u64,
    /// Seconds between leadership polls and renewals.
    pub poll_interval_secs: u64,
    /// Which entry of `stores` to use.
    pub store: String,
    /// Named store adapters available to this instance.
    pub stores: HashMap<String, StoreConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    File { path: PathBuf },
}

impl Default for Settings {
    fn default() -> Self {
        let mut stores = HashMap::new();
        stores.insert(DEFAULT_STORE.to_string(), StoreConfig::Memory);
        Self {
            lease_key: DEFAULT_LEASE_KEY.to_string(),
            lease_timeout_secs: 60,
            poll_interval_secs: 15,
            store: DEFAULT_STORE.to_string(),
            stores,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))
    }

    /// Values beyond what chrono can represent saturate to the maximum
    /// duration: an absurdly large timeout means the lease never expires,
    /// which is the closest representable reading of the configuration.
    #[must_use]
    pub fn lease_timeout(&self) -> chrono::Duration {
        i64::try_from(self.lease_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Builds the selected store adapter. An unknown name is a
    /// misconfiguration and fatal before the loop ever starts.
    pub fn build_store(&self) -> Result<Arc<dyn LeaseStore>> {
        match self.stores.get(&self.store) {
            None => Err(Error::Config(format!(
                "store {:?} is not configured",
                self.store
            ))),
            Some(StoreConfig::Memory) => Ok(Arc::new(InMemoryStore::new())),
            Some(StoreConfig::File { path }) => Ok(Arc::new(FileStore::new(path.clone())?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let settings = Settings::default();
        assert_eq!(settings.lease_key, "managedbeat_status");
        assert_eq!(settings.lease_timeout_secs, 60);
        assert_eq!(settings.poll_interval_secs, 15);
        assert_eq!(settings.store, "default");
        settings.build_store().unwrap();
    }

    #[test]
    fn unknown_store_name_is_a_config_error() {
        let settings = Settings {
            store: "redis".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.build_store().unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"poll_interval_secs": 1}"#).unwrap();
        assert_eq!(settings.poll_interval_secs, 1);
        assert_eq!(settings.lease_timeout_secs, 60);
        assert_eq!(settings.lease_key, "managedbeat_status");
    }

    #[test]
    fn huge_lease_timeout_saturates_instead_of_panicking() {
        let settings = Settings {
            lease_timeout_secs: u64::MAX,
            ..Settings::default()
        };
        assert_eq!(settings.lease_timeout(), chrono::Duration::MAX);

        // in-range values convert exactly
        let settings = Settings {
            lease_timeout_secs: 1,
            ..Settings::default()
        };
        assert_eq!(settings.lease_timeout(), chrono::Duration::seconds(1));
    }

    #[test]
    fn file_store_config_builds() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.stores.insert(
            "shared".to_string(),
            StoreConfig::File {
                path: dir.path().join("leases"),
            },
        );
        settings.store = "shared".to_string();
        let store = settings.build_store().unwrap();
        assert!(store.is_shared());
    }
}
