//! fleet-deploy 主入口

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use fleet_deploy::{
    config::{self, FleetConfig},
    dispatcher::{Action, Dispatcher},
    executor::HostExecutor,
    ssh::SshHostExecutor,
    telemetry,
};

#[derive(Parser)]
#[command(name = "fleet-deploy", version)]
#[command(about = "Build, ship and restart the downloader services", long_about = None)]
struct Cli {
    /// Target hosts, comma separated ([user@]host[:port])
    #[arg(short = 'H', long, value_delimiter = ',')]
    hosts: Vec<String>,

    /// Configuration file (toml, yaml or json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host of the counter store, overrides stats.host
    #[arg(long)]
    stats_host: Option<String>,

    /// Actions to run, in order
    #[arg(value_enum, required = true)]
    actions: Vec<Action>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    config::load_dotenv();

    let mut config =
        FleetConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(stats_host) = cli.stats_host {
        config.stats.host = stats_host;
    }

    telemetry::init_telemetry(&config.logging);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "fleet-deploy starting");

    let hosts = config
        .target_hosts(&cli.hosts)
        .context("Invalid host list")?;

    let executor: Arc<dyn HostExecutor> =
        Arc::new(SshHostExecutor::from_settings(config.ssh.clone()).await);
    let dispatcher = Dispatcher::from_config(&config, executor)?;

    let mut stdout = std::io::stdout();
    if let Err(e) = dispatcher.run(&cli.actions, &hosts, &mut stdout).await {
        tracing::error!(error = %e, "Run failed");
        return Err(e.into());
    }

    Ok(())
}
