//! Statiq - a static asset server
//!
//! This is the main entry point for the Statiq CLI. It turns the command line
//! into a [`ServerConfig`], installs logging and hands over to the server.

use std::io::IsTerminal;
use std::time::Duration;

use clap::Parser;
use statiq_core::config::{DEFAULT_ADDR, DEFAULT_INDEX, DEFAULT_ROOT};
use statiq_core::{Options, ServerConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Statiq - serve a directory over HTTP
#[derive(Parser)]
#[command(name = "statiq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to static files
    #[arg(long, default_value = DEFAULT_ROOT)]
    files: String,

    /// Address to listen on
    #[arg(long, default_value = DEFAULT_ADDR)]
    addr: String,

    /// Cache duration for static files (e.g. 12h, 30m, 1d)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "12h")]
    cache: Duration,

    /// Compression level. 0 = disabled, 1 = default, 2 = best
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    compress_level: i64,

    /// Log requests to stdout
    #[arg(long)]
    log_requests: bool,

    /// Serve the index file for unmatched paths (for SPA apps)
    #[arg(long)]
    spa: bool,

    /// Index file relative from the files path
    #[arg(long, default_value = DEFAULT_INDEX)]
    index: String,

    /// Serve files as attachments
    #[arg(long)]
    download: bool,

    /// User credentials (can be used multiple times)
    #[arg(long = "user", value_name = "USERNAME:PASSWORD")]
    users: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        Options {
            files: cli.files,
            addr: cli.addr,
            cache: cli.cache,
            compress_level: cli.compress_level,
            log_requests: cli.log_requests,
            spa: cli.spa,
            index: cli.index,
            download: cli.download,
            users: cli.users,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::info!("🚀 Statiq v{}", statiq_core::VERSION);

    let (config, warnings) = Options::from(cli).resolve();
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    announce(&config);

    if let Err(e) = statiq_server::run(&config).await {
        tracing::error!("❌ {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Startup summary of the enabled features
fn announce(config: &ServerConfig) {
    if !config.credentials.is_empty() {
        tracing::info!(
            "Enabling basic authentication for {} user(s)",
            config.credentials.len()
        );
    }

    if config.log_requests {
        tracing::info!("Enabling request logging");
    }

    if config.download {
        tracing::info!("Enabling downloads");
    }

    if config.compression.is_enabled() {
        tracing::info!("Enabling compression: {}", config.compression);
    }

    if config.spa {
        tracing::info!(
            "📁 Serving files from {} as SPA with index file {}",
            config.root_dir.display(),
            config.index_path().display()
        );
    } else {
        tracing::info!(
            "📁 Serving files from {} with index file {}",
            config.root_dir.display(),
            config.index_path().display()
        );
    }
}
