use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::{Error, Result};

/// Shared key-value store holding the leader record.
///
/// Deliberately the lowest common denominator a commodity shared cache can
/// offer: plain get/set/delete, no compare-and-swap, no transactions. The
/// only consistency the protocol needs is that a writer sees its own
/// writes.
#[async_trait]
pub trait LeaseStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether other instances of this fleet can see writes made here.
    /// A process-local store cannot provide mutual exclusion.
    fn is_shared(&self) -> bool {
        true
    }
}

/// Process-local store. Fine for tests and single-instance deployments;
/// useless for coordinating a fleet, which the sanity check warns about.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: dashmap::DashMap<String, Vec<u8>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    fn is_shared(&self) -> bool {
        false
    }
}

/// One file per key under a root directory. Shared between processes on
/// the same host, which is enough for a single-machine fleet.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
            return Err(Error::Storage(format!("{key:?} is not a valid store key")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl LeaseStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.key_path(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.key_path(key)?;
        // Write-then-rename so a concurrent reader never sees a torn write.
        let tmp = self
            .root
            .join(format!(".{key}.{}", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.key_path(key)?).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Validates the store once before the supervision loop is allowed to run:
/// write a random probe, read it back, compare, delete the probe.
///
/// A store that cannot hold a round-trip cannot hold a lease either, so a
/// failure here is fatal. A non-shared store merely voids the
/// mutual-exclusion guarantee and gets a warning.
pub async fn sanity_check(store: &dyn LeaseStore) -> Result<()> {
    let probe_key = format!("probe-{}", Uuid::new_v4());
    let probe_value = Uuid::new_v4().into_bytes().to_vec();

    let read = match store.set(&probe_key, probe_value.clone()).await {
        Ok(()) => store.get(&probe_key).await,
        Err(err) => Err(err),
    };
    let cleanup = store.delete(&probe_key).await;

    match read {
        Ok(Some(value)) if value == probe_value => {}
        Ok(_) => {
            return Err(Error::StoreSanity {
                reason: "probe value did not read back intact".into(),
            })
        }
        Err(err) => {
            return Err(Error::StoreSanity {
                reason: err.to_string(),
            })
        }
    }
    cleanup.map_err(|err| Error::StoreSanity {
        reason: format!("probe cleanup failed: {err}"),
    })?;

    if !store.is_shared() {
        warn!(
            "store is process-local; mutual exclusion across instances is impossible \
             with this configuration"
        );
    }
    Ok(())
}
