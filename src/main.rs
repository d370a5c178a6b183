mod config;
mod delivery;
mod notifier;
mod pr;
mod report;
mod snapshot;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

/// PRS Notifier — polls GitHub repositories for open pull requests and posts
/// the newly opened and recently updated ones to a chat webhook.
///
/// Runs once and exits; schedule it (cron, systemd timer) for periodic polling.
#[derive(Parser, Debug)]
#[command(name = "prs-notifier", version, about)]
struct Cli {
    /// Config file (defaults to .prs-notifier.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Snapshot file holding the previous run's state
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Print the message instead of posting it. Same as setting PRS_TEST to
    /// any non-empty value other than 0, false, no or off
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let _main_span = info_span!("prs_notify").entered();

    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.webhook.test_mode = true;
    }
    if let Some(path) = cli.snapshot {
        config.snapshot.path = path;
    }
    let repos = config.repositories()?;
    debug!(repos = repos.len(), test_mode = config.webhook.test_mode, "resolved configuration");

    let client = pr::GitHubClient::new(&config.github, config.github_token())?;
    let collector = pr::Collector::new(client, repos);
    let store = snapshot::SnapshotStore::new(config.snapshot.path.clone());
    let deliverer = delivery::from_config(&config.webhook);
    let layout = report::Layout::from(&config.notify);
    debug!(snapshot = %store.path().display(), "using snapshot file");

    let outcome = notifier::run_once(&collector, &store, deliverer.as_ref(), &layout).await?;
    info!(
        fetched = outcome.fetched,
        new = outcome.new,
        updated = outcome.updated,
        delivered = ?outcome.delivered,
        "done"
    );

    Ok(())
}
