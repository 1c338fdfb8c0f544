//! Price Engine binary
//!
//! Loads the configuration file given on the command line, starts one loop
//! per configured group and runs until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use cli::{Cli, ParseOutcome, EXIT_USAGE};
use config::{load_config, validate_config, EngineConfig};
use fair_value::{shutdown_signal, Supervisor};
use observability::{init_logging, LogFormat};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::parse_args() {
        ParseOutcome::Run(cli) => cli,
        ParseOutcome::Exit { message, code } => {
            if code == 0 {
                print!("{}", message);
            } else {
                eprint!("{}", message);
            }
            std::process::exit(code);
        }
    };

    let format = LogFormat::parse(cli.log_format.as_str()).unwrap_or_default();
    init_logging("price-engine", format)?;
    debug!(?cli, "CLI arguments parsed");

    if !cli.config.is_file() {
        error!(path = %cli.config.display(), "Configuration file not found");
        std::process::exit(EXIT_USAGE);
    }

    let config = load_and_validate(&cli.config)?;

    if let Some(port) = config.metrics_port {
        observability::init_metrics(port).context("Failed to start metrics exporter")?;
    }

    info!(
        store = config.store.as_str(),
        groups = config.groups.len(),
        symbols = config.all_symbols().count(),
        interval_ms = config.common.loop_interval_ms,
        "Price engine starting"
    );

    let supervisor = Supervisor::start(&config)
        .await
        .context("Failed to start price engine")?;

    shutdown_signal().await;

    supervisor.shutdown().await?;
    info!("Price engine exited");
    Ok(())
}

fn load_and_validate(path: &std::path::Path) -> Result<EngineConfig> {
    let config = load_config(path)?;
    let report = validate_config(&config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }

    if !report.is_valid() {
        error!(error_count = report.errors.len(), "Configuration validation failed");
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start price engine due to configuration errors");
    }

    Ok(config)
}
