//! qmr-proxyd daemon.
//!
//! ```text
//!   qmr-cli / desktop shell
//!          │  HTTP + WebSocket (control.bind_address)
//!          ▼
//!   ┌───────────────┐    ┌──────────────┐    ┌──────────────┐
//!   │   control     │───▶│  supervisor  │───▶│   sources    │── GET subscription URL
//!   │   (axum)      │    │              │    │  (resolver)  │──▶ <base_dir>/<b64>/config.yaml
//!   └───────┬───────┘    │              │    └──────────────┘
//!           │ /events    │              │───▶ core process (-d <dir>)
//!   ┌───────┴───────┐    │              │
//!   │    relay      │◀───│              │───▶ sysproxy (registry / gsettings / networksetup)
//!   └───────────────┘    └──────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use qmr_proxyd::config::load_or_default;
use qmr_proxyd::lifecycle;
use qmr_proxyd::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "qmr-proxyd")]
#[command(about = "Supervises a local proxy core and the OS proxy settings", long_about = None)]
struct Args {
    /// TOML config file; defaults are used when it does not exist
    #[arg(short, long, default_value = "qmr-proxyd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_exists = args.config.exists();
    let config = load_or_default(&args.config)?;

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "qmr-proxyd starting");
    if !config_exists {
        tracing::warn!(path = %args.config.display(), "Config file not found, running with defaults");
    }

    tracing::info!(
        bind_address = %config.control.bind_address,
        binary = %config.core.binary.display(),
        sources_file = %config.core.sources_file.display(),
        auto_restart = config.supervisor.auto_restart,
        system_proxy = config.system_proxy.enabled,
        "Configuration loaded"
    );

    let watch_path = config_exists.then(|| args.config.clone());
    lifecycle::run(watch_path, config).await?;
    Ok(())
}
