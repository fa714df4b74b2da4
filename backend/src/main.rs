use axum::{middleware as axum_middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tx_middleware::{
    config::Config,
    db::{create_pool_with_config, DbPool},
    handlers, middleware,
    transaction::TransactionWrapper,
};

fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

fn router(transactions: TransactionWrapper<DbPool>) -> Router {
    // Routes that run inside a request transaction
    let db_routes = Router::new()
        .route("/api/db/ping", get(handlers::db_ping))
        .route_layer(axum_middleware::from_fn_with_state(
            transactions,
            middleware::transaction::<DbPool>,
        ));

    Router::new()
        .route("/api/health", get(handlers::health))
        .merge(db_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(middleware::log_requests)),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tx_middleware=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        bind_addr = %config.bind_addr,
        db_max_connections = config.db_max_connections,
        db_acquire_timeout_secs = config.db_acquire_timeout_secs,
        "Loaded configuration from environment/.env"
    );

    // Initialize database; the transaction wrapper is built once and shared.
    let pool = create_pool_with_config(&config.database_url, config.pool_config()).await?;
    let app = router(TransactionWrapper::new(pool));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
