//! Health probe runner.
//!
//! Loads a probe file, runs every configured check once, concurrently, and
//! reports the verdicts.
//!
//! ```text
//! probes.toml → config::load_config → health::build_registrations
//!     → health::run_all (shared ConnectionCache, Ctrl-C cancels)
//!     → one line (or JSON object) per check, exit code 1 if any failed
//!     → metrics text file, when enabled
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use health_probes::config::{load_config, ProbeConfig};
use health_probes::health::{build_registrations, run_all, HealthReportEntry};
use health_probes::net::ConnectionCache;
use health_probes::observability::{logging, metrics};
use health_probes::CancellationToken;

#[derive(Parser)]
#[command(name = "health-probe")]
#[command(about = "Run dependency health checks once and report the results", long_about = None)]
struct Cli {
    /// Probe configuration file (TOML).
    #[arg(short, long, default_value = "probes.toml")]
    config: PathBuf,

    /// Print results as JSON lines.
    #[arg(long)]
    json: bool,

    /// Override the default per-check timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config: ProbeConfig = load_config(&cli.config)?;
    if let Some(secs) = cli.timeout_secs {
        config.defaults.timeout_secs = secs;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(
        config = %cli.config.display(),
        "health-probe v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let metrics_handle = if config.observability.metrics_enabled {
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let cache = ConnectionCache::new();
    let registrations = build_registrations(&config, &cache)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight checks");
            on_signal.cancel();
        }
    });

    let results = run_all(&registrations, &cancel).await;

    if let Some(handle) = &metrics_handle {
        let path = &config.observability.metrics_path;
        if let Err(e) = metrics::write_textfile(handle, path) {
            tracing::error!(path = %path.display(), error = %e, "Failed to write metrics");
        }
    }

    let mut all_healthy = true;
    for (name, result) in &results {
        all_healthy &= result.is_healthy();
        if cli.json {
            println!("{}", serde_json::to_string(&HealthReportEntry::new(name, result))?);
        } else {
            match &result.description {
                Some(description) => println!("{:<24} {:<10} {}", name, result.status, description),
                None => println!("{:<24} {}", name, result.status),
            }
        }
    }

    Ok(all_healthy)
}
