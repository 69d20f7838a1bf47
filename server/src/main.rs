use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use checkin_server::config::Config;
use checkin_server::MIGRATOR;
use checkin_server::routes::{create_routes, AppState};
use checkin_server::scheduler::{ReconcileScheduler, SystemClock, Trigger};
use checkin_server::store::PostgresStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let store = Arc::new(PostgresStore::new(pool));
    let state = AppState::new(store, config.reconcile_batch_size);

    let scheduler = ReconcileScheduler::start(
        state.reconciliation.clone(),
        Arc::new(SystemClock),
        Trigger::daily(config.reconcile_schedule),
    );
    tracing::info!(at = %config.reconcile_schedule.at(), "Reconciliation scheduled daily (UTC)");

    let app = create_routes(state, &config);

    tracing::info!("🚀 Server running at http://{}", config.server_addr);

    let listener = TcpListener::bind(config.server_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    scheduler.stop().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
