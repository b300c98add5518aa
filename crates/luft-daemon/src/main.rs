//! luft-daemon entry point.
//!
//! This file is intentionally thin: it parses arguments, loads config, sets
//! up tracing, starts the poll task and serves the read-only API. Route
//! handlers live in `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use luft_config::{report_unused_keys, AdapterConfig, UnusedKeyPolicy};
use luft_core::{DeviceRegistry, NullSink, Poller};
use luft_daemon::{poll, routes, state};
use luft_md::LuftdatenFetcher;
use tokio::sync::watch;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Debug, Parser)]
#[command(
    name = "luft-daemon",
    version,
    about = "Polls a luftdaten area and mirrors its sensors as devices"
)]
struct Args {
    /// YAML config layers, later files override earlier ones.
    #[arg(
        long = "config",
        env = "LUFT_CONFIG",
        value_delimiter = ',',
        default_value = "config/default.yaml"
    )]
    config: Vec<PathBuf>,

    /// HTTP listen address.
    #[arg(long, env = "LUFT_DAEMON_ADDR", default_value = "127.0.0.1:8899")]
    bind: SocketAddr,

    /// Run a single pass, print its report as JSON and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    let args = Args::parse();

    let loaded =
        luft_config::load_layered_yaml(args.config.as_slice()).context("config load failed")?;
    let cfg = loaded.adapter()?;

    init_tracing(&cfg.logging.level);
    info!(
        config_hash = %loaded.config_hash,
        layers = args.config.len(),
        "config loaded"
    );

    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!("{unused}");
    }

    let fetcher = cfg.fetcher()?;
    info!(area_url = %fetcher.build_area_url(), "upstream configured");

    if args.once {
        return run_once(fetcher, &cfg).await;
    }

    let shared = Arc::new(state::AppState::new());
    let poller = Poller::new(
        Box::new(fetcher),
        Arc::new(shared.sink()),
        DeviceRegistry::new(cfg.device.description.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_task = poll::spawn_poller(
        Arc::clone(&shared),
        poller,
        cfg.poll_interval(),
        shutdown_rx,
    );

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("luft-daemon listening on http://{}", args.bind);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("bind failed: {}", args.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server crashed")?;

    let (poller, stats) = poll_task.await.context("poll task panicked")?;
    info!(
        devices = poller.registry().len(),
        passes_ok = stats.passes_ok,
        passes_failed = stats.passes_failed,
        "luft-daemon stopped"
    );
    Ok(())
}

async fn run_once(fetcher: LuftdatenFetcher, cfg: &AdapterConfig) -> anyhow::Result<()> {
    let mut poller = Poller::new(
        Box::new(fetcher),
        Arc::new(NullSink),
        DeviceRegistry::new(cfg.device.description.clone()),
    );
    let report = poller.run_pass().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(tower_http::cors::Any)
}
