use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::{
    record::LeaderRecord,
    store::LeaseStore,
    time::{Clock, SystemClock},
    InstanceId, Result,
};

/// The lease-based mutual-exclusion protocol, speaking plain get/set/delete
/// against the shared store.
///
/// All three operations are advisory. There is no compare-and-swap, so two
/// instances can overwrite each other's claims; callers close that window
/// by re-reading the record after writing and reacting to a foreign
/// identity (see [`crate::supervisor::Supervisor`]).
#[derive(Debug)]
pub struct LeaseProtocol {
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
    key: String,
    lease_timeout: Duration,
    identity: InstanceId,
    origin: String,
}

impl LeaseProtocol {
    pub fn new(store: Arc<dyn LeaseStore>, key: impl Into<String>, lease_timeout: Duration) -> Self {
        Self::with_clock(store, key, lease_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn LeaseStore>,
        key: impl Into<String>,
        lease_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let origin = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".into());
        Self {
            store,
            clock,
            key: key.into(),
            lease_timeout,
            identity: InstanceId::new(),
            origin,
        }
    }

    #[must_use]
    pub fn identity(&self) -> InstanceId {
        self.identity
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Reads the current lease holder.
    ///
    /// Absent, undecodable, and expired records all read as `None`, as does
    /// a failing store read: every defect fails open toward a re-election,
    /// never closed toward a deadlock.
    pub async fn current_leader(&self) -> Option<InstanceId> {
        let bytes = match self.store.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                debug!(%err, "leader record read failed; treating slot as vacant");
                return None;
            }
        };
        let record = match LeaderRecord::decode(&bytes) {
            Ok(record) => record,
            Err(err) => {
                debug!(%err, "leader record undecodable; treating slot as vacant");
                return None;
            }
        };
        if record.is_expired(self.clock.now(), self.lease_timeout) {
            None
        } else {
            Some(record.identity)
        }
    }

    /// Writes a fresh record with our identity and the current time.
    ///
    /// Claiming and renewing are the same write; repeated claims by the same
    /// instance only advance the timestamp. Write failures propagate: a
    /// leader that cannot renew must not keep believing it is one.
    pub async fn claim_leadership(&self) -> Result<()> {
        let record = LeaderRecord::new(self.identity, self.origin.clone(), self.clock.now());
        debug!(identity = %self.identity, "writing leader record");
        self.store.set(&self.key, record.encode()?).await
    }

    /// Deletes the record unconditionally.
    ///
    /// Only the current leader may call this on clean step-down; a
    /// non-leader calling it would evict a legitimate leader.
    pub async fn release_leadership(&self) -> Result<()> {
        debug!(identity = %self.identity, "deleting leader record");
        self.store.delete(&self.key).await
    }
}
