use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lcloud::config;
use lcloud::provider::Inventory;
use lcloud::runner::{self, OutputOptions, Tee};
use lcloud::TaskDispatcher;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// List the public and private network assets of cloud accounts
#[derive(Parser, Debug)]
#[command(name = "lcloud", version = lcloud::VERSION, about, long_about = None)]
struct Args {
    /// Config file (defaults to <config dir>/lcloud/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker tasks per fan-out wave
    #[arg(short, long, default_value_t = lcloud::dispatch::DEFAULT_THREADS)]
    threads: usize,

    /// Only use config blocks of these providers
    #[arg(short, long, value_delimiter = ',')]
    provider: Vec<String>,

    /// Only use config blocks with these ids
    #[arg(short, long, value_delimiter = ',')]
    id: Vec<String>,

    /// Services to enumerate, overriding each block's cloud_services
    #[arg(long, value_delimiter = ',')]
    cloud_services: Vec<String>,

    /// Leave private IP addresses out of the output
    #[arg(long)]
    exclude_private: bool,

    /// Also write results to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress all log output
    #[arg(short, long)]
    silent: bool,

    /// Print one JSON object per resource
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(args: &Args) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    if args.silent {
        return Ok(None);
    }
    let Some(level) = args.log_level.to_tracing_level() else {
        return Ok(None);
    };

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lcloud={}", level.as_str().to_ascii_lowercase())));

    let (writer, guard) = match &args.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(args.log_file.is_none())
        .with_target(false)
        .init();

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(&args)?;

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    if config::ensure_config_file(&config_path)
        .with_context(|| format!("Failed to create config file {:?}", config_path))?
    {
        tracing::info!("Created config template at {:?}", config_path);
    }

    let blocks = config::read_config(&config_path)?;
    let blocks = config::select(blocks, &args.provider, &args.id);
    if blocks.is_empty() {
        tracing::warn!("No matching provider entries in {:?}", config_path);
        return Ok(());
    }

    let dispatcher = TaskDispatcher::new(args.threads);
    tracing::debug!("Using {} worker tasks per wave", dispatcher.threads());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after in-flight requests");
                cancel.cancel();
            }
        });
    }

    let inventory = Inventory::build(&blocks, &args.cloud_services, dispatcher).await;
    if inventory.is_empty() {
        tracing::warn!("No usable provider configured");
        return Ok(());
    }

    let file = match &args.output {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file {:?}", path))?,
        )),
        None => None,
    };
    let mut out = Tee::new(io::stdout().lock(), file);

    let options = OutputOptions {
        exclude_private: args.exclude_private,
        json: args.json,
    };
    let summary = runner::enumerate(&inventory.providers, options, &cancel, &mut out).await?;
    tracing::info!(
        "Listed {} assets from {} accounts ({} failed)",
        summary.lines,
        summary.providers,
        summary.failed_providers
    );

    Ok(())
}
