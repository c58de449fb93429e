use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ci_reporter::config::{Credentials, LogFormat, ReporterConfig};

#[derive(Parser)]
#[command(
    name = "ci-reporter",
    about = "Reports CI job failures and keepalives for tracked release branches to Slack",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (defaults to CI_REPORTER_CONFIG, then the system path)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the composed message instead of posting it
    #[arg(long)]
    dry_run: bool,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Before config resolution, so its fallback warnings are visible.
    init_tracing(cli.log_format.unwrap_or_default());

    let config = ReporterConfig::resolve(cli.config.as_deref())?;
    let credentials = Credentials::from_env()?;

    let outcome = ci_reporter::run(config, &credentials, cli.dry_run).await?;
    tracing::info!(?outcome, "report finished");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
