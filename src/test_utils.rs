use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    store::{InMemoryStore, LeaseStore},
    time::{Clock, Timestamp},
    worker::Worker,
    Error, Result,
};

/// A clock the test owns. Time only moves when the test moves it.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// An in-memory store whose reads a test can break on demand, either by
/// failing outright or by handing back bytes that decode as nothing.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_reads: AtomicBool,
    garbage_reads: AtomicBool,
}

impl FlakyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `get` return a storage error until switched back.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Makes every `get` return undecodable bytes until switched back.
    pub fn return_garbage(&self, on: bool) {
        self.garbage_reads.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl LeaseStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected read failure".into()));
        }
        if self.garbage_reads.load(Ordering::SeqCst) {
            return Ok(Some(b"injected garbage".to_vec()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    fn is_shared(&self) -> bool {
        self.inner.is_shared()
    }
}

/// A worker that runs until the test tells it to finish, counting starts.
#[derive(Debug, Default)]
pub struct ScriptedWorker {
    starts: AtomicUsize,
    finish: Notify,
}

impl ScriptedWorker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the supervisor has started a run.
    #[must_use]
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Makes the current (or next) run return, simulating the activity
    /// dying unexpectedly.
    pub fn finish_current_run(&self) {
        self.finish.notify_one();
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn run(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.finish.notified().await;
        Ok(())
    }
}
