//! Elevation API server.
//!
//! Serves point elevation queries over a directory of EU-DEM v1.1
//! GeoTIFF tiles.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use elevation_api::config::ElevationConfig;
use elevation_api::state::AppState;

/// Elevation API server
#[derive(Parser, Debug)]
#[command(name = "elevation-api")]
#[command(about = "Point elevation server over EU-DEM GeoTIFF tiles")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "ELEVATION_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "ELEVATION_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// Directory holding the EU-DEM v1.1 GeoTIFF files
    #[arg(long, env = "EU_DEM_PATH")]
    dem_path: PathBuf,

    /// Maximum number of tile files held open at once
    #[arg(long, default_value = "32", env = "ELEVATION_DECODER_CACHE")]
    decoder_cache_size: usize,

    /// Decoded-sample cache budget per open file, in megabytes
    #[arg(long, default_value = "128", env = "ELEVATION_TILE_CACHE_MB")]
    tile_cache_mb: usize,

    /// A file that must exist and decode at startup
    #[arg(long, env = "ELEVATION_CANARY")]
    canary: Option<String>,
}

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }
    let runtime = runtime_builder
        .build()
        .expect("Failed to create Tokio runtime");

    runtime.block_on(async move {
        run_server(args).await;
    });
}

async fn run_server(args: Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting elevation API server");

    let config = ElevationConfig {
        dem_path: args.dem_path,
        decoder_cache_size: args.decoder_cache_size,
        tile_cache_mb: args.tile_cache_mb,
        canary: args.canary,
    };
    let state = match AppState::new(&config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    let app = elevation_api::build_router(state);

    let addr: SocketAddr = args.listen.parse().expect("Invalid listen address");
    info!("Elevation API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server failed");
}
