use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, error, info, warn};

use crate::{lease::LeaseProtocol, worker::Worker, Error, InstanceId, Result};

/// Where the loop currently stands; published over a watch channel so
/// operators and tests can follow transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Watching the leader record, waiting for the slot to become vacant.
    Observing,
    /// Holding the lease and keeping the worker activity alive.
    Leading,
    /// Terminal: a fatal fault was hit and `run` is returning.
    ShuttingDown,
}

/// The top-level control loop.
///
/// Decides whether this instance is leader and drives the worker activity
/// lifecycle accordingly. Every anomaly that could compromise mutual
/// exclusion (contention, an aborted worker task, a failing renewal) makes
/// `run` return an error; the driver maps that to an abnormal process exit
/// and an external process manager restarts the instance with a fresh
/// identity. There is no in-process retry after a detected fault.
#[derive(Debug)]
pub struct Supervisor {
    protocol: LeaseProtocol,
    worker: Arc<dyn Worker>,
    poll_interval: Duration,
    state_tx: watch::Sender<SupervisorState>,
}

impl Supervisor {
    pub fn new(protocol: LeaseProtocol, worker: Arc<dyn Worker>, poll_interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(SupervisorState::Observing);
        Self {
            protocol,
            worker,
            poll_interval,
            state_tx,
        }
    }

    #[must_use]
    pub fn identity(&self) -> InstanceId {
        self.protocol.identity()
    }

    #[must_use]
    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    /// Runs until a fatal fault occurs. Never returns `Ok`.
    pub async fn run(&self) -> Result<()> {
        let result = self.run_loop().await;
        if result.is_err() {
            self.state_tx.send_replace(SupervisorState::ShuttingDown);
        }
        result
    }

    async fn run_loop(&self) -> Result<()> {
        // Damp the thundering herd after a fleet-wide restart: give the
        // previous leader's record one interval to be observed before
        // anyone here claims the slot.
        sleep(self.poll_interval).await;

        loop {
            self.state_tx.send_replace(SupervisorState::Observing);

            if let Some(leader) = self.protocol.current_leader().await {
                debug!(%leader, "valid leader present; observing");
                sleep(self.poll_interval).await;
                continue;
            }

            self.protocol.claim_leadership().await?;
            info!(identity = %self.identity(), "no valid leader found; leadership claimed");
            self.state_tx.send_replace(SupervisorState::Leading);

            let worker = Arc::clone(&self.worker);
            let mut handle = tokio::spawn(async move { worker.run().await });

            match self.lead(&mut handle).await {
                Ok(()) => {
                    // The worker returned on its own. Anomalous for an
                    // activity that should run forever, but not fatal:
                    // step down cleanly and rejoin the observers.
                    self.protocol.release_leadership().await?;
                    info!(identity = %self.identity(), "leadership released; observing again");
                }
                Err(err) => {
                    handle.abort();
                    return Err(err);
                }
            }
        }
    }

    /// One leadership generation: revalidate, renew, wait on the worker.
    ///
    /// Returns `Ok` only when the worker finished by itself; any other exit
    /// is a fault that must end this process.
    async fn lead(&self, handle: &mut JoinHandle<Result<()>>) -> Result<()> {
        loop {
            match self.protocol.current_leader().await {
                Some(id) if id == self.protocol.identity() => {}
                observed => {
                    // Another instance won the claim race. Correctness
                    // cannot be negotiated mid-race; disappear and let the
                    // process manager restart us as a fresh observer. The
                    // record is theirs now, so no release.
                    error!(
                        ?observed,
                        identity = %self.identity(),
                        "foreign leadership detected; evicting ourselves"
                    );
                    return Err(Error::Contention { observed });
                }
            }

            self.protocol.claim_leadership().await?;

            match timeout(self.poll_interval, &mut *handle).await {
                // Still running; renew again next cycle.
                Err(_elapsed) => {}
                Ok(Ok(result)) => {
                    warn!(?result, "worker activity finished unexpectedly");
                    return Ok(());
                }
                Ok(Err(join_err)) => {
                    // The task panicked or was killed out from under us.
                    self.protocol.release_leadership().await?;
                    return Err(Error::WorkerAborted(join_err.to_string()));
                }
            }
        }
    }
}
