use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};

use crate::config::{AppConfig, SERVICE_NAME, SERVICE_VERSION, ServerConfig};
use crate::http;
use crate::runtime;
use crate::scheduler::{PollPortfolioTask, TaskScheduler};
use crate::service::TrackerService;
use crate::telemetry;

fn load_config() -> anyhow::Result<AppConfig> {
    dotenv::dotenv()
        .map_err(|err| {
            eprintln!(".env file error: {err}");
            err
        })
        .ok();

    AppConfig::fetch()
}

fn log_config(cfg: &AppConfig) {
    let db = &cfg.database_config;
    let poly = &cfg.polymarket_config;
    info!("{SERVICE_NAME} v{SERVICE_VERSION}");
    info!(
        "database {}@{}:{}/{} (sslmode={}, pool={})",
        db.user, db.host, db.port, db.database, db.sslmode, db.max_connections
    );
    info!(
        "wallet {} polled every {}s",
        if poly.wallet.is_empty() { "<unset>" } else { poly.wallet.as_str() },
        poly.poll_interval_secs
    );
    info!(
        "admin user {}, session ttl {}h",
        cfg.auth.username, cfg.auth.access_ttl_hours
    );
    info!("research dir {}", cfg.research.dir.display());
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections...");
}

pub async fn bootstrap() -> anyhow::Result<()> {
    let app_config = load_config()?;

    let ServerConfig {
        log_level,
        scratch_dir,
        allow_root,
        ..
    } = app_config.server_config.clone();

    telemetry::init_logger(log_level);
    let metrics = telemetry::install_metrics_recorder()?;
    telemetry::emit_startup_metrics();
    log_config(&app_config);

    runtime::ensure_not_root(allow_root)?;
    runtime::prepare_scratch_dir(&scratch_dir)?;

    let addr = app_config.bind_addr();
    let service = TrackerService::new(app_config).await?;

    let mut scheduler = TaskScheduler::new().await?;
    scheduler
        .add_task(Arc::new(PollPortfolioTask::new(service.clone())))
        .await?;
    scheduler.start().await?;

    let app = http::router(service, metrics);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Running server on {}...", local_addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    info!("Server stopped");
    Ok(())
}
