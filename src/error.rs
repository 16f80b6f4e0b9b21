use thiserror::Error;

use crate::InstanceId;

/// Faults surfaced by the lease protocol and the supervision loop.
///
/// Everything that reaches the top-level driver through this type is fatal
/// by construction: the loop never returns an error it could recover from.
/// Stale, missing, or undecodable leader records are deliberately NOT
/// errors; they read as "no leader" and trigger an election instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("lease store failed its sanity check: {reason}")]
    StoreSanity { reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("leadership contention: observed {observed:?} while believing ourselves leader")]
    Contention { observed: Option<InstanceId> },

    #[error("worker task ended abnormally: {0}")]
    WorkerAborted(String),

    #[error("interrupted: {0}")]
    Interrupted(String),

    #[error("store error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
