//! Study Group Scheduling Backend
//!
//! A REST backend with SQLite persistence that schedules study group sessions and
//! reports, but never enforces, scheduling conflicts.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod scheduling;
mod services;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use services::{GroupService, LogNotifier, SessionScheduler, StaticAdvice};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub groups: Arc<GroupService>,
    pub scheduler: Arc<SessionScheduler>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the services over one repository with the default notifier and advice table.
    pub fn new(repo: Repository, config: Config) -> Self {
        let scheduler = SessionScheduler::new(
            repo.clone(),
            config.rules,
            Arc::new(LogNotifier),
            Arc::new(StaticAdvice),
        );
        Self {
            groups: Arc::new(GroupService::new(repo.clone())),
            scheduler: Arc::new(scheduler),
            repo: Arc::new(repo),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Study Group Scheduling Backend");
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        horizon_days = config.rules.horizon_days,
        buffer_minutes = config.rules.overlap_buffer_minutes,
        daily_limit = config.rules.daily_session_limit,
        "Scheduling rules"
    );

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (STUDY_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let state = AppState::new(Repository::new(pool), config.clone());

    // Background reminder sweep
    services::reminders::start(
        state.scheduler.clone(),
        config.reminder_interval_secs,
        config.reminder_lead_minutes,
    );

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Students
        .route("/students", get(api::list_students))
        .route("/students", post(api::create_student))
        .route("/students/{id}", get(api::get_student))
        .route("/students/{id}/availability", put(api::update_availability))
        .route("/students/{id}/sessions", get(api::student_sessions))
        // Groups
        .route("/groups", get(api::list_groups))
        .route("/groups", post(api::create_group))
        .route("/groups/{id}", get(api::get_group))
        .route("/groups/{id}", delete(api::delete_group))
        .route("/groups/{id}/members", post(api::join_group))
        .route("/groups/{id}/members/{student_id}", delete(api::leave_group))
        .route("/groups/{id}/common-slots", get(api::common_slots))
        .route("/groups/{id}/sessions", get(api::group_sessions))
        .route("/groups/{id}/suggest-times", post(api::suggest_times))
        .route("/groups/{id}/analytics", get(api::group_analytics))
        // Sessions
        .route("/sessions", post(api::create_session))
        .route("/sessions/upcoming", get(api::upcoming_sessions))
        .route("/sessions/conflicts", get(api::conflicting_sessions))
        .route("/sessions/{id}", get(api::get_session))
        .route("/sessions/{id}", put(api::update_session))
        .route("/sessions/{id}", delete(api::delete_session))
        .route("/sessions/{id}/force-schedule", post(api::force_schedule))
        .route("/sessions/{id}/status", post(api::change_status))
        .route("/sessions/{id}/attendance", post(api::record_attendance))
        .route("/sessions/{id}/notes", put(api::update_notes))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Result<&'static str, errors::AppError> {
    state.repo.ping().await?;
    Ok("OK")
}

#[cfg(test)]
mod tests;
