use meme_api::{
    aws_clients::{create_dynamodb_client, create_sdk_config},
    config::{Config, StoreBackend},
    domain::MemeRepository,
    errors::AppError,
    repositories::{DynamoDbMemeRepository, InMemoryMemeRepository},
    routes::create_router,
    service::MemeService,
    startup, AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "meme_api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(?config, "Configuration loaded");

    let repo = build_repository(&config).await?;
    let state = Arc::new(AppState {
        memes: MemeService::new(repo),
    });
    let app = create_router(state);

    tracing::info!("Server listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .map_err(|e| AppError::InitError(format!("Failed to bind {}: {}", config.bind_address, e)))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::InternalServerError(format!("Server error: {}", e)))?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// The process owns the storage connection; handlers only ever see the trait object.
async fn build_repository(config: &Config) -> Result<Arc<dyn MemeRepository>, AppError> {
    match config.store {
        StoreBackend::DynamoDb => {
            let sdk_config = create_sdk_config(config).await;
            let client = create_dynamodb_client(&sdk_config);
            if config.init_tables {
                startup::init_tables(&client, &config.memes_table, &config.meme_triples_table).await?;
            } else {
                tracing::info!("Skipping DynamoDB table initialization");
            }
            Ok(Arc::new(DynamoDbMemeRepository::new(
                client,
                config.memes_table.clone(),
                config.meme_triples_table.clone(),
            )))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory meme store; data is lost on restart");
            Ok(Arc::new(InMemoryMemeRepository::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
