//! Market Grid Binary
//!
//! Connects to a market data stream and keeps a windowed view of it
//! refreshed once per display tick. Frames go to the log.
//!
//! The binary is headless: there is no interactive scroll input, so the
//! viewport stays at `MARKET_GRID_SCROLL_OFFSET` for the whole run.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-grid
//! ```
//!
//! # Environment Variables
//!
//! - `MARKET_GRID_STREAM_URL`: Stream endpoint (default: ws://localhost:8080)
//! - `MARKET_GRID_INGEST_MODE`: inline | worker (default: worker)
//! - `MARKET_GRID_DISPLAY_ORDER`: ranked | storage, storage needs inline (default: ranked)
//! - `MARKET_GRID_ITEM_HEIGHT`: Row height in pixels (default: 40)
//! - `MARKET_GRID_CONTAINER_HEIGHT`: Viewport height in pixels (default: 600)
//! - `MARKET_GRID_OVERSCAN`: Overscan rows on each side (default: 10)
//! - `MARKET_GRID_SCROLL_OFFSET`: Fixed scroll offset (default: 0)
//! - `MARKET_GRID_REFRESH_HZ`: Refresh ticks per second (default: 60)
//! - `MARKET_GRID_EVENT_CAPACITY`: Bounded queue capacity (default: 1024)
//! - `MARKET_GRID_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8082)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: market-grid)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use market_grid::infrastructure::health::{HealthServer, HealthServerState};
use market_grid::infrastructure::sink::TracingFrameSink;
use market_grid::infrastructure::telemetry;
use market_grid::{
    ChannelEvent, Connector, FrameClock, GridConfig, IngestMode, IngestionChannel,
    OffloadWorker, Presenter, StreamStatus, WebSocketConnector, init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

type GridPresenter = Presenter<TracingFrameSink>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let crypto_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    load_dotenv();

    // Initialize telemetry (console + optional OTLP)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting market grid");
    if !crypto_installed {
        tracing::debug!("rustls crypto provider already installed");
    }

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed, metrics disabled");
    }

    let config = GridConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let status = Arc::new(StreamStatus::new());

    if config.server.health_port != 0 {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            config.ingest_mode,
            Arc::clone(&status),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let connector: Arc<dyn Connector> = Arc::new(WebSocketConnector::new(&config.stream_url));
    let presenter = Presenter::new(
        config.viewport.geometry(),
        config.display_order,
        TracingFrameSink::default(),
        Arc::clone(&status),
    )
    .with_scroll_offset(config.viewport.scroll_offset);

    let presenter = match config.ingest_mode {
        IngestMode::Inline => run_inline(&config, connector, presenter, shutdown_token).await?,
        IngestMode::Worker => {
            run_worker(&config, connector, &status, presenter, shutdown_token).await?
        }
    };

    tracing::info!(
        frames = presenter.frames(),
        recomputes = presenter.recomputes(),
        "Market grid stopped"
    );
    Ok(())
}

/// Decode, merge and rank on the presentation runtime.
async fn run_inline(
    config: &GridConfig,
    connector: Arc<dyn Connector>,
    presenter: GridPresenter,
    shutdown_token: CancellationToken,
) -> anyhow::Result<GridPresenter> {
    let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(config.event_capacity);
    let channel = IngestionChannel::new(connector, event_tx, shutdown_token.child_token());

    let ingest = tokio::spawn(async move {
        if let Err(e) = channel.run().await {
            tracing::error!(error = %e, "Ingestion channel error");
        }
    });

    let presentation = tokio::spawn(presenter.run(
        event_rx,
        scroll_input(config),
        FrameClock::new(config.refresh_hz),
        shutdown_token.clone(),
    ));

    tracing::info!(mode = "inline", "Market grid ready");
    await_shutdown(shutdown_token).await;

    let presenter = tokio::time::timeout(SHUTDOWN_TIMEOUT, presentation)
        .await
        .context("presenter did not stop in time")?
        .context("presenter task failed")?;
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, ingest).await.is_err() {
        tracing::warn!("Ingestion channel did not stop in time");
    }
    Ok(presenter)
}

/// Decode, merge and rank on the offload worker thread.
async fn run_worker(
    config: &GridConfig,
    connector: Arc<dyn Connector>,
    status: &Arc<StreamStatus>,
    presenter: GridPresenter,
    shutdown_token: CancellationToken,
) -> anyhow::Result<GridPresenter> {
    let (worker, messages) =
        OffloadWorker::spawn(connector, config.event_capacity, Arc::clone(status))
            .context("failed to start offload worker")?;
    worker.connect().context("failed to reach offload worker")?;

    let presentation = tokio::spawn(presenter.run(
        messages,
        scroll_input(config),
        FrameClock::new(config.refresh_hz),
        shutdown_token.clone(),
    ));

    tracing::info!(mode = "worker", "Market grid ready");
    await_shutdown(shutdown_token).await;

    let presenter = tokio::time::timeout(SHUTDOWN_TIMEOUT, presentation)
        .await
        .context("presenter did not stop in time")?
        .context("presenter task failed")?;

    tokio::task::spawn_blocking(move || worker.terminate())
        .await
        .context("offload worker join failed")?;
    Ok(presenter)
}

/// Scroll input for a headless grid: closed from the start, so the
/// presenter keeps its initial offset.
fn scroll_input(config: &GridConfig) -> mpsc::Receiver<f64> {
    let (_scroll_tx, scroll_rx) = mpsc::channel(config.event_capacity);
    scroll_rx
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &GridConfig) {
    tracing::info!(
        stream_url = %config.stream_url,
        ingest_mode = config.ingest_mode.as_str(),
        display_order = config.display_order.as_str(),
        refresh_hz = config.refresh_hz,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        item_height = config.viewport.item_height,
        container_height = config.viewport.container_height,
        overscan = config.viewport.overscan,
        scroll_offset = config.viewport.scroll_offset,
        event_capacity = config.event_capacity,
        "Viewport settings"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
