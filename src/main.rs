use aed_archiver::app::archive::ArchiveStore;
use aed_archiver::app::cadence::CadenceGate;
use aed_archiver::app::ports::{Clock, DatasetHost};
use aed_archiver::common::time::format_timestamp;
use aed_archiver::config::{Backend, Config};
use aed_archiver::infra::clock::SystemClock;
use aed_archiver::infra::http_client::ReqwestWaitTimeSource;
use aed_archiver::infra::local_host::LocalDatasetHost;
use aed_archiver::infra::supabase_host::SupabaseDatasetHost;
use aed_archiver::observability::{self, metrics};
use aed_archiver::UpdateUseCase;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aed_archiver")]
#[command(about = "Archive Hong Kong A&E wait times on a quarter-hour cadence")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one check-and-update cycle (the default)
    Run,
    /// Print the next checkpoint and exit
    NextCheck,
}

fn build_host(config: &Config) -> anyhow::Result<Arc<dyn DatasetHost>> {
    let host: Arc<dyn DatasetHost> = match config.archive.backend {
        Backend::Supabase => {
            let base_url = config.archive.base_url.as_deref().context("ARCHIVE_BASE_URL is required")?;
            let token = config.archive.token.as_deref().context("ARCHIVE_TOKEN is required")?;
            Arc::new(SupabaseDatasetHost::new(base_url, &config.archive.bucket, token))
        }
        Backend::Local => Arc::new(LocalDatasetHost::new(config.archive.root.clone())),
    };
    Ok(host)
}

async fn run_once(config: Config) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let source = ReqwestWaitTimeSource::new(config.source.url.clone(), config.source.timeout_seconds)
        .context("failed to build HTTP client")?;
    let archive = ArchiveStore::new(build_host(&config)?);
    let use_case = UpdateUseCase::new(clock, Arc::new(source), archive, config.mode);

    let outcome = use_case.run_cycle().await;
    info!(outcome = outcome.label(), "Cycle finished");

    if let Some(url) = config.pushgateway_url.as_deref() {
        if let Err(e) = metrics::push_metrics(url).await {
            warn!(error = %e, "Failed to push metrics");
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let log_dir = std::env::var("AED_LOG_DIR")
        .unwrap_or_else(|_| observability::logging::DEFAULT_LOG_DIR.to_string());
    let _log_guard = observability::init_logging(log_dir);

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::NextCheck => {
            let gate = CadenceGate::new(Arc::new(SystemClock));
            println!("{}", format_timestamp(&gate.next_check_time()));
        }
        Commands::Run => {
            // configuration problems are the only fatal errors
            let config = Config::load(cli.config.as_deref()).context("invalid configuration")?;
            observability::init_metrics();
            run_once(config).await?;
        }
    }
    Ok(())
}
