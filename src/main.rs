use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use reviews_rs::{
    auth::{LoggingCodeDelivery, TokenIssuer},
    create_app, init_observability,
    repositories::InMemoryStore,
    services::UserServiceSettings,
    shutdown_observability, AppState, Config, Metrics, Repositories, StorageBackend,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_environment()
        .await
        .context("Failed to load configuration")?;

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref(),
        &config.observability.log_level,
        config.observability.enable_json_logging,
    )?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);

    let metrics = Arc::new(Metrics::new()?);

    let repositories = match config.database.storage_backend {
        StorageBackend::DynamoDb => {
            let tables = config.database.table_names();
            info!(
                users = %tables.users,
                profiles = %tables.profiles,
                reviews = %tables.reviews,
                comments = %tables.comments,
                drafts = %tables.drafts,
                "Using DynamoDB tables"
            );
            Repositories::dynamodb(
                Arc::new(config.aws.dynamodb_client.clone()),
                tables,
                config.database.region.clone(),
            )
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Repositories::in_memory(Arc::new(InMemoryStore::new()))
        }
    };

    let tokens = Arc::new(TokenIssuer::new(
        config.auth.secret()?.as_bytes(),
        config.auth.token_ttl(),
    ));

    let state = AppState::new(
        repositories,
        tokens,
        Arc::new(LoggingCodeDelivery),
        UserServiceSettings {
            password_hash_cost: config.auth.password_hash_cost,
            require_confirmation: config.auth.require_confirmation,
        },
        metrics,
    );

    let app = create_app(
        state,
        config.server.request_timeout(),
        config.server.max_request_size,
    );

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host: {}", config.server.host))?,
        config.server.port,
    );
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
