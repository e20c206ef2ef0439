//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::jwt::JwtManager;
use crate::migration;
use crate::poller::TrackPoller;
use crate::repository::track::TrackRepositoryImpl;
use crate::service::TrackService;
use crate::state::HasTracks;
use crate::suno::SunoClient;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: MySqlPool,
    pub track_service: Arc<TrackService<TrackRepositoryImpl>>,
    pub track_poller: Arc<TrackPoller<TrackRepositoryImpl>>,
    pub jwt_manager: JwtManager,
}

/// Implement HasTracks trait for production AppState
impl HasTracks for AppState {
    type TrackRepo = TrackRepositoryImpl;

    fn config(&self) -> &Config {
        &self.config
    }

    fn track_service(&self) -> &TrackService<Self::TrackRepo> {
        &self.track_service
    }

    fn track_poller(&self) -> &TrackPoller<Self::TrackRepo> {
        &self.track_poller
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    async fn check_ready(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db_pool).await.is_ok()
    }
}

/// Run the server
pub async fn run(config: Config) -> Result<()> {
    // Apply pending migrations before serving
    migration::run_migrations(&config).await?;

    // Create database connection pool
    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    info!("Connected to database");

    // Create repositories
    let track_repo = Arc::new(TrackRepositoryImpl::new(db_pool.clone()));

    // Create JWT manager
    let jwt_manager = JwtManager::new(config.jwt.clone());

    // Create the generation API gateway
    let suno = Arc::new(SunoClient::new(config.suno.clone()));

    // Create services
    let track_service = Arc::new(TrackService::new(track_repo.clone(), suno.clone(), &config));
    let track_poller = Arc::new(TrackPoller::new(suno, track_repo, config.poller.clone()));

    // Create app state
    let state = AppState {
        config: Arc::new(config.clone()),
        db_pool,
        track_service,
        track_poller: Arc::clone(&track_poller),
        jwt_manager,
    };

    let app = build_router(state);

    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the poll and list-refresh loops before the process exits
    track_poller.shutdown();
    info!("Server stopped");

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C)
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("Shutdown signal received");
}

/// Build the HTTP router with generic state type
///
/// This function is generic over the state type, allowing it to work with
/// both production `AppState` and test implementations that implement
/// `HasTracks`.
pub fn build_router<S: HasTracks>(state: S) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = Duration::from_secs(state.config().http_request_timeout_secs);

    Router::new()
        // Health endpoints
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        // Music generation endpoints
        .route("/api/v1/music/generate", post(api::track::generate::<S>))
        .route(
            "/api/v1/music/status/{task_id}",
            get(api::track::status::<S>),
        )
        .route("/api/v1/music/tracks", get(api::track::list::<S>))
        // Push channel for the generation service. The remote side sends
        // no credentials; it only knows the URL we hand it on creation.
        .route(
            "/api/v1/music/callback",
            post(api::suno_callback::receive::<S>),
        )
        // Add middleware. The timeout is outermost so it also bounds a
        // handler stuck waiting on the generation service.
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
