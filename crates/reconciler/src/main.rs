//! meshrecon
//!
//! Rebuilds the host network topology from a configuration file.

use clap::Parser;
use meshrecon::validator::check_offline;
use meshrecon::{Progress, Reconciler, RuntimeConfig, SystemNetwork};
use meshrecon_common::{config, default_config_path, default_runtime_path, PipelineResult};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "meshrecon")]
#[command(about = "Tear down and rebuild mesh, bridge, hostapd and dnsmasq state")]
#[command(version)]
struct Cli {
    /// Topology configuration file
    #[arg(default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Runtime settings file
    #[arg(long, default_value_os_t = default_runtime_path())]
    runtime: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Validate the configuration without touching the system
    #[arg(long)]
    check: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    info!("meshrecon v{}", meshrecon_common::VERSION);

    let runtime = RuntimeConfig::load(&cli.runtime)?;
    debug!("Runtime settings: {:?}", runtime);
    let progress = Progress::stdout();

    let result = if cli.check {
        progress.banner("Checking configuration");
        config::load(&cli.config)
            .and_then(|cfg| check_offline(&cfg, &runtime.default_netmask))
            .map(|()| progress.note("configuration OK"))
    } else {
        let net = SystemNetwork::new(runtime.settle_delay());
        Reconciler::new(&net, &runtime, &progress)
            .run(&cli.config)
            .await
            .map(|summary| progress.summary(&summary))
    };

    if let Err(e) = &result {
        progress.error_block(e);
    }
    std::process::exit(PipelineResult::from(&result).exit_code());
}
