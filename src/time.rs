use chrono::{DateTime, Utc};

pub type Timestamp = DateTime<Utc>;

/// Source of wall-clock time for the lease protocol.
///
/// Lease expiry is judged against this clock, so tests can substitute a
/// manual implementation and move time around freely.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
