use std::{path::Path, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use stateset_forecast as forecast;
use forecast::services::catalog::{InMemoryCatalog, ProductCatalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = forecast::config::load_config().context("failed to load configuration")?;
    forecast::config::init_tracing(cfg.log_level(), cfg.log_json);
    forecast::handlers::health::init_start_time();

    let catalog = match cfg.products_path.as_deref() {
        Some(path) => InMemoryCatalog::load_from_file(Path::new(path))
            .with_context(|| format!("failed to load products from {}", path))?,
        None => {
            warn!("No products_path configured; serving an empty catalog");
            InMemoryCatalog::new()
        }
    };
    info!(products = catalog.len(), "product catalog ready");

    let catalog: Arc<dyn ProductCatalog> = Arc::new(catalog);
    let state = forecast::AppState::new(cfg.clone(), catalog);
    let app = forecast::app(state);

    let addr = cfg.bind_address();
    info!("stateset-forecast listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
