use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{time::Timestamp, InstanceId, Result};

/// The single persistent entity of the protocol: the serialized state of
/// the current lease holder.
///
/// Only the current leader writes it (by convention, not enforcement). It
/// is created on claim, overwritten in place on every renewal with the same
/// identity and a refreshed timestamp, and deleted on clean step-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRecord {
    /// When the record was last (re)written; source of truth for liveness.
    pub timestamp: Timestamp,
    /// The claiming instance.
    pub identity: InstanceId,
    /// Host name of the claiming instance, for diagnostics only.
    pub origin: String,
}

impl LeaderRecord {
    pub fn new(identity: InstanceId, origin: impl Into<String>, now: Timestamp) -> Self {
        Self {
            timestamp: now,
            identity,
            origin: origin.into(),
        }
    }

    /// A record is valid for `lease_timeout` after its timestamp; exactly
    /// at the boundary it counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp, lease_timeout: Duration) -> bool {
        now.signed_duration_since(self.timestamp) >= lease_timeout
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn codec_round_trips() {
        let record = LeaderRecord::new(InstanceId::new(), "host-1", Utc::now());
        let decoded = LeaderRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(LeaderRecord::decode(b"definitely not bincode").is_err());
        assert!(LeaderRecord::decode(&[]).is_err());
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        let record = LeaderRecord::new(InstanceId::new(), "host-1", now);
        let timeout = Duration::seconds(60);

        assert!(!record.is_expired(now, timeout));
        assert!(!record.is_expired(now + Duration::seconds(59), timeout));
        assert!(record.is_expired(now + Duration::seconds(60), timeout));
        assert!(record.is_expired(now + Duration::seconds(61), timeout));
    }
}
