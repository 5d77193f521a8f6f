use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

mod config;
mod error;
mod handlers;
mod read_pool;
mod routes;

use config::Config;
use read_pool::ReadPool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Root directory to serve files from
    pub root_dir: PathBuf,
    /// When set, file requests are redirected here instead of served
    pub proxy_base: Option<Url>,
    /// Pool of threads performing blocking file reads
    pub read_pool: ReadPool,
}

#[derive(Parser, Debug)]
#[command(name = "autoindex")]
#[command(about = "Minimal HTTP server for browsing and downloading a directory tree")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "AUTOINDEX_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "AUTOINDEX_BIND")]
    bind: Option<String>,

    /// Root directory to serve files from
    #[arg(short, long, env = "AUTOINDEX_ROOT")]
    root: Option<PathBuf>,

    /// Redirect file requests to this upstream base URL instead of
    /// serving bytes from local disk
    #[arg(long, env = "AUTOINDEX_PROXY")]
    proxy: Option<String>,

    /// Number of threads for blocking file reads
    #[arg(short, long, env = "AUTOINDEX_WORKERS")]
    workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, env = "AUTOINDEX_VERBOSE")]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "AUTOINDEX_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "autoindex=debug,tower_http=debug"
    } else {
        "autoindex=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config from file if provided, otherwise use defaults; CLI flags
    // override either.
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(root) = cli.root {
        config.root = root;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy_base = Some(proxy);
    }
    if let Some(workers) = cli.workers {
        config.read_workers = workers;
    }

    // Resolve root directory to absolute path
    let root_dir = config
        .root
        .canonicalize()
        .unwrap_or_else(|_| config.root.clone());

    if !root_dir.is_dir() {
        return Err(format!("Root path is not a directory: {}", root_dir.display()).into());
    }

    let proxy_base = match &config.proxy_base {
        Some(base) => {
            let url = Url::parse(base)
                .map_err(|err| format!("Invalid proxy base URL {base:?}: {err}"))?;
            info!("Redirecting file requests to {}", url);
            Some(url)
        }
        None => None,
    };

    info!("Serving files from: {}", root_dir.display());

    let state = AppState {
        root_dir,
        proxy_base,
        read_pool: ReadPool::new(config.read_workers),
    };

    // Build router
    let app = Router::new()
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    info!("Starting autoindex on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
