use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upload_kit::{
    build_router,
    services::{
        file_storage::FileStorageService,
        initializers::InitializerRegistry,
        lifecycle::{ApplicationEvent, Lifecycle, Readiness},
    },
    utils::config::AppConfig,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_kit=debug,tower_http=debug,request=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::from_env();
    tracing::info!("Configuration loaded: {:?}", config);

    // Initialize file storage service
    let storage_service = FileStorageService::new(&config.temp_dir)
        .map_err(|e| {
            tracing::error!("Failed to initialize file storage: {}", e);
            e
        })?
        .with_max_file_age(Duration::from_secs(config.temp_file_max_age_seconds));

    let mut initializers = InitializerRegistry::new();
    let temp_dir = storage_service.temp_dir().to_path_buf();
    initializers.register("temp-dir-check", move || {
        let metadata = std::fs::metadata(&temp_dir)?;
        anyhow::ensure!(metadata.is_dir(), "{} is not a directory", temp_dir.display());
        tracing::info!("Uploads default to {}", temp_dir.display());
        Ok(())
    });

    let readiness = Arc::new(Readiness::new());
    let lifecycle = Arc::new(
        Lifecycle::new(config.application_id.clone(), initializers).with_client(readiness.clone()),
    );
    lifecycle.loaded();

    // Start cleanup task for temporary files
    let cleanup_storage = storage_service.clone();
    lifecycle.track_task(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600)); // Run every hour
        loop {
            interval.tick().await;
            if let Err(e) = cleanup_storage.cleanup_temp_files().await {
                tracing::error!("Failed to cleanup temporary files: {}", e);
            }
        }
    }));

    // Create shared state
    let app_state = AppState {
        config: Arc::new(config.clone()),
        storage: Arc::new(storage_service),
        lifecycle: lifecycle.clone(),
        readiness,
    };

    let app = build_router(app_state);

    // Parse the bind address
    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    lifecycle.dispatch(ApplicationEvent::Ready);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    lifecycle.dispatch(ApplicationEvent::Closed);
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
