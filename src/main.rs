use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use storefront_api as api;
use api::config::{ImageBackend, StorageBackend};
use api::handlers::AppServices;
use api::repositories::{MemoryStore, SqlStore};
use api::storage::{CloudinaryConfig, CloudinaryImageStore, ImageStore, MemoryImageStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let images: Arc<dyn ImageStore> = match cfg.image_backend {
        ImageBackend::Cloudinary => {
            let cloudinary = CloudinaryConfig::from_app_config(&cfg)?;
            info!(cloud = %cloudinary.cloud_name, "Using Cloudinary image storage");
            Arc::new(CloudinaryImageStore::new(cloudinary)?)
        }
        ImageBackend::Memory => {
            info!("Using in-memory image storage");
            Arc::new(MemoryImageStore::new(
                cfg.memory_image_base_url.clone(),
                cfg.cloudinary_folder.clone(),
            ))
        }
    };

    let services = match cfg.storage_backend {
        StorageBackend::Sql => {
            let db_pool = api::db::establish_connection_from_app_config(&cfg)
                .await
                .context("Database connection establishment failed")?;
            if cfg.auto_migrate {
                api::db::run_migrations(&db_pool).await.map_err(|e| {
                    error!("Failed running migrations: {}", e);
                    e
                })?;
            }
            AppServices::new(Arc::new(SqlStore::new(Arc::new(db_pool))), images)
        }
        StorageBackend::Memory => {
            info!("Using in-memory document store; data is not persisted");
            AppServices::new(Arc::new(MemoryStore::new()), images)
        }
    };

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let state = api::AppState::new(cfg, services);
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("storefront-api listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("storefront-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
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
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
