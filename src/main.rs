use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing::{error, info};

use managedbeat::{
    config::Settings,
    lease::LeaseProtocol,
    store,
    supervisor::Supervisor,
    worker::CommandWorker,
    Error, Result,
};

/// The only externally observable recovery signal: an external process
/// manager (supervisord or similar) restarts us on this status.
const ABNORMAL_EXIT: i32 = 255;

/// Keeps exactly one instance of a scheduler command running across a
/// fleet of identical processes.
#[derive(Debug, Parser)]
#[command(name = "managedbeat", version, about)]
struct Cli {
    /// JSON settings file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Key under which the leader record is stored
    #[arg(long)]
    lease_key: Option<String>,

    /// Seconds a leader record stays valid without renewal
    #[arg(long)]
    lease_timeout: Option<u64>,

    /// Seconds between leadership polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Which configured store adapter to use
    #[arg(long)]
    store: Option<String>,

    /// Pid file to clear before each worker start
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Scheduler command to supervise, e.g. `celery beat`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(%err, "fatal fault; exiting for the process manager to restart us");
        std::process::exit(ABNORMAL_EXIT);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(lease_key) = cli.lease_key {
        settings.lease_key = lease_key;
    }
    if let Some(lease_timeout) = cli.lease_timeout {
        settings.lease_timeout_secs = lease_timeout;
    }
    if let Some(poll_interval) = cli.poll_interval {
        settings.poll_interval_secs = poll_interval;
    }
    if let Some(store) = cli.store {
        settings.store = store;
    }

    let store = settings.build_store()?;
    store::sanity_check(store.as_ref()).await?;

    let protocol = LeaseProtocol::new(
        Arc::clone(&store),
        settings.lease_key.clone(),
        settings.lease_timeout(),
    );
    info!(
        identity = %protocol.identity(),
        origin = %protocol.origin(),
        store = %settings.store,
        "instance starting"
    );

    let mut worker = CommandWorker::new(cli.command[0].clone(), cli.command[1..].to_vec());
    if let Some(pid_file) = cli.pid_file {
        worker = worker.with_pid_file(pid_file);
    }

    let supervisor = Supervisor::new(protocol, Arc::new(worker), settings.poll_interval());

    // A termination signal mid-sleep must never be silently absorbed;
    // abnormal exit is the only safe recovery path.
    tokio::select! {
        result = supervisor.run() => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            Err(Error::Interrupted("termination signal received".into()))
        }
    }
}
