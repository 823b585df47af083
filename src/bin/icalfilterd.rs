//! icalfilterd: calendar filter daemon.
//!
//! Serves `/filter` over HTTP, fetching feeds through a shared
//! deduplicating cache.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use icalfilter::FetchCache;
use icalfilter::server::config::Config;
use icalfilter::server::{AppState, router};

/// icalfilterd: shrink remote iCalendar feeds over HTTP.
#[derive(Parser)]
#[command(name = "icalfilterd")]
#[command(version = icalfilter::PKG_VERSION)]
#[command(about = "Serve filtered iCalendar feeds")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Listening address.
    #[arg(long, env = "ICALFILTER_ADDR")]
    addr: Option<String>,

    /// Listening port.
    #[arg(long, env = "ICALFILTER_PORT")]
    port: Option<u16>,

    /// Response timeout in milliseconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Cache expiry duration in seconds.
    #[arg(long)]
    cachettl: Option<u64>,

    /// Maximum concurrent upstream fetches.
    #[arg(long)]
    max_concurrent: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(addr) = &self.addr {
            config.server.address = addr.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.server.timeout_ms = timeout;
        }
        if let Some(ttl) = self.cachettl {
            config.cache.ttl_secs = ttl;
        }
        if let Some(n) = self.max_concurrent {
            config.cache.max_concurrent = n;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("icalfilter=info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration, then let flags win
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    let fetcher = FetchCache::http(&config.fetch_config())?;
    let state = AppState::new(fetcher, &config);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;

    info!(
        version = icalfilter::PKG_VERSION,
        %addr,
        ttl_secs = config.cache.ttl_secs,
        max_concurrent = config.cache.max_concurrent,
        "icalfilterd starting"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("icalfilterd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
