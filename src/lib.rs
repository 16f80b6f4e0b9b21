#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Keeps exactly one instance of a scheduled-task runner alive across a
//! fleet of identical processes.
//!
//! Coordination happens through a single leader record in a shared
//! key-value store ([`store::LeaseStore`]). The record is a time-bounded
//! lease: whichever instance holds a non-expired record runs the worker,
//! everyone else observes and waits for the lease to expire. There is no
//! compare-and-swap and no consensus; races are closed reactively by the
//! [`supervisor::Supervisor`] revalidating the record every poll interval
//! and evicting itself when it finds a foreign identity.

pub mod config;
pub mod error;
pub mod lease;
pub mod record;
pub mod store;
pub mod supervisor;
pub mod time;
pub mod worker;

pub mod test_utils;

pub use error::{Error, Result};

/// Unique token minted once per process lifetime.
///
/// Distinguishes this instance from every other instance in the fleet,
/// including earlier generations of itself on the same host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstanceId(pub uuid::Uuid);

impl InstanceId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
