use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use excursions_api::config::ServerConfig;
use excursions_api::router::build_app_router;
use excursions_api::state::AppState;
use excursions_core::workflow::WorkflowDefinition;
use excursions_db::DbPool;
use excursions_events::{
    EmailConfig, EmailDelivery, EventBus, EventPersistence, LogDelivery, MessageSender,
    NotificationRelay, RelayConfig,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "excursions_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let workflow_json = std::fs::read_to_string(&config.workflow_config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", config.workflow_config_path));
    let definition = Arc::new(
        WorkflowDefinition::from_json(&workflow_json).expect("Invalid workflow definition"),
    );
    tracing::info!(path = %config.workflow_config_path, "Loaded workflow definition");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = excursions_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    excursions_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    excursions_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // Spawn event persistence (writes all events to the database).
    let persistence_handle = tokio::spawn(EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    // --- Notification relay ---
    let relay_cancel = CancellationToken::new();
    let relay_config = RelayConfig {
        poll_interval: Duration::from_secs(config.notification_poll_secs),
        email_domain: config.email_domain.clone(),
        ..RelayConfig::default()
    };
    let relay_handle = match EmailConfig::from_env() {
        Some(email) => {
            tracing::info!(smtp_host = %email.smtp_host, "Delivering notifications over SMTP");
            let sender = EmailDelivery::new(email).expect("Invalid SMTP configuration");
            spawn_relay(&pool, &definition, sender, relay_config, relay_cancel.clone())
        }
        None => {
            tracing::warn!("SMTP_HOST not set, notifications will only be logged");
            spawn_relay(&pool, &definition, LogDelivery, relay_config, relay_cancel.clone())
        }
    };

    tracing::info!("Event services started (persistence, notification relay)");

    // --- App state + router ---
    let state = AppState::new(
        pool,
        Arc::new(config.clone()),
        Arc::clone(&definition),
        Arc::clone(&event_bus),
    );
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = Duration::from_secs(config.shutdown_timeout_secs);

    relay_cancel.cancel();
    let _ = tokio::time::timeout(drain, relay_handle).await;
    tracing::info!("Notification relay stopped");

    // Dropping the last bus handle closes the channel; persistence drains and exits.
    drop(event_bus);
    let _ = tokio::time::timeout(drain, persistence_handle).await;
    tracing::info!("Event persistence stopped");

    tracing::info!("Graceful shutdown complete");
}

fn spawn_relay<S: MessageSender + 'static>(
    pool: &DbPool,
    definition: &Arc<WorkflowDefinition>,
    sender: S,
    config: RelayConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let relay = NotificationRelay::new(pool.clone(), Arc::clone(definition), sender, config);
    tokio::spawn(async move { relay.run(cancel).await })
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
