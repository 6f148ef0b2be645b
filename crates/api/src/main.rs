use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quill_db::memory::MemorySessionStore;
use quill_db::store::{PgSessionStore, SessionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill_api::auth::identity::{
    HttpIdentityProvider, MemoryUserDirectory, PgUserDirectory, UserDirectory,
};
use quill_api::auth::session::SessionService;
use quill_api::config::{EnvLookup, LogFormat, ServerConfig, StoreBackend};
use quill_api::router::build_router;
use quill_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let log_format = EnvLookup::process()
        .parse_or("LOG_FORMAT", LogFormat::Text)
        .unwrap_or(LogFormat::Text);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill_api=debug,quill_db=debug,tower_http=debug".into()),
        )
        .with((log_format == LogFormat::Text).then(tracing_subscriber::fmt::layer))
        .with((log_format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json()))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store_backend,
        "Loaded server configuration"
    );

    // --- Session store ---
    let (store, users): (Arc<dyn SessionStore>, Arc<dyn UserDirectory>) =
        match config.store_backend {
            StoreBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .expect("DATABASE_URL must be set");

                let pool = quill_db::create_pool(database_url)
                    .await
                    .expect("Failed to connect to database");
                tracing::info!("Database connection pool created");

                quill_db::health_check(&pool)
                    .await
                    .expect("Database health check failed");
                tracing::info!("Database health check passed");

                quill_db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");
                tracing::info!("Database migrations applied");

                (
                    Arc::new(PgSessionStore::new(pool.clone())) as Arc<dyn SessionStore>,
                    Arc::new(PgUserDirectory::new(pool)) as Arc<dyn UserDirectory>,
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory session store; sessions are lost on restart");
                (
                    Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>,
                    Arc::new(MemoryUserDirectory::new()) as Arc<dyn UserDirectory>,
                )
            }
        };

    // --- Identity provider ---
    let identity = HttpIdentityProvider::new(config.identity_exchange_url.clone())
        .expect("Failed to build identity provider client");

    // --- App state ---
    let sessions = SessionService::new(store, config.jwt.clone(), &config.session)
        .expect("Invalid REFRESH_HASH_KEY");
    let config = Arc::new(config);
    let state = AppState {
        config: Arc::clone(&config),
        sessions: Arc::new(sessions),
        identity: Arc::new(identity),
        users,
    };

    // --- Router ---
    let app = build_router(state).expect("Invalid router configuration");

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    })
    .into_future();

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    let deadline = async move {
        if stop_rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result.expect("Server error"),
        () = deadline => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Shutdown grace period elapsed, dropping in-flight requests"
            );
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
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
