//! Showcase server entry point.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use showcase_api::{AppState, WsTransport};
use showcase_common::{ClockService, Config, LocalStorage, SystemClock};
use showcase_core::{
    ActorDirectory, CommentThreadService, ConnectionRegistry, JwtVerifier, LiveDelivery,
    MessagingService, NotificationService, ReportService, ToggleCoordinator,
};
use showcase_db::repositories::{
    AlbumRepository, CommentRepository, EdgeRepository, MessageRepository, NotificationRepository,
    ReportRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "showcase=debug,tower_http=debug".into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting showcase server...");

    // Connect to database
    let db = showcase_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    showcase_db::migrate(&db).await?;
    info!("Migrations completed");

    let clock: ClockService = Arc::new(SystemClock);

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let album_repo = AlbumRepository::new(Arc::clone(&db));
    let edge_repo = EdgeRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));
    let message_repo = MessageRepository::new(Arc::clone(&db));
    let report_repo = ReportRepository::new(Arc::clone(&db));

    let mut actors = ActorDirectory::new(user_repo.clone());
    let storage = LocalStorage::new(&config.storage.base_path, &config.storage.base_url)?;
    actors.set_storage(Arc::new(storage));

    // Initialize live delivery
    let registry = Arc::new(ConnectionRegistry::new(config.realtime.connection_policy));
    let transport = Arc::new(WsTransport::new());
    let delivery = LiveDelivery::new(
        Arc::clone(&registry),
        transport.clone(),
        StdDuration::from_millis(config.realtime.push_timeout_ms),
    );
    info!(
        policy = ?config.realtime.connection_policy,
        push_timeout_ms = config.realtime.push_timeout_ms,
        "Initialized live delivery"
    );

    // Initialize services
    let mut notification_service = NotificationService::new(
        Arc::clone(&db),
        notification_repo,
        album_repo.clone(),
        actors.clone(),
        clock.clone(),
    );
    notification_service.set_live_delivery(delivery.clone());

    let mut messaging_service = MessagingService::new(
        Arc::clone(&db),
        message_repo,
        user_repo.clone(),
        actors.clone(),
        notification_service.clone(),
        clock.clone(),
    )
    .with_ttl(Duration::hours(config.realtime.message_ttl_hours));
    messaging_service.set_live_delivery(delivery);

    let toggle_service = ToggleCoordinator::new(
        Arc::clone(&db),
        edge_repo,
        album_repo.clone(),
        user_repo,
        notification_service.clone(),
        clock.clone(),
    );

    let comment_service = CommentThreadService::new(
        Arc::clone(&db),
        comment_repo,
        album_repo.clone(),
        actors,
        notification_service.clone(),
        clock.clone(),
    );

    let report_service = ReportService::new(
        Arc::clone(&db),
        report_repo,
        album_repo,
        notification_service.clone(),
        clock,
    );

    // Create app state
    let state = AppState {
        registry,
        transport,
        verifier: Arc::new(JwtVerifier::from_config(&config.auth)),
        notification_service,
        messaging_service,
        toggle_service,
        comment_service,
        report_service,
    };

    // Build router
    let app = showcase_api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
