// Axum web server layer

use axum::{
    error_handling::HandleErrorLayer,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;

pub mod handlers;
pub mod middleware;
pub mod responses;

use crate::auth::{auth_gate, AuthState};
use crate::core::traits::ConfigStore;
use crate::metrics::Metrics;
use crate::notify::{BackgroundTasks, NotificationDispatcher};
use crate::registration::RegistrationService;

use crate::config::Config;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub configs: Arc<dyn ConfigStore>,
    pub registrations: Arc<RegistrationService>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub tasks: BackgroundTasks,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
}

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - Tracing (tower-http::trace)
/// - Request timeout (tower::timeout), elapsed requests answer 408
/// - Body size limit (tower-http::limit)
/// - Admission gate, on matched routes only; `/api/register` passes through
pub fn create_router(app_state: AppState, auth_state: Arc<AuthState>) -> Router {
    let body_limit = app_state.config.body_size_limit_bytes;
    let timeout = Duration::from_secs(app_state.config.request_timeout_secs);

    Router::new()
        .route("/api/register", post(handlers::register_handler))
        .route(
            "/api/config",
            get(handlers::list_configs_handler).post(handlers::create_config_handler),
        )
        .route(
            "/api/config/:id",
            get(handlers::get_config_handler)
                .put(handlers::change_config_handler)
                .delete(handlers::delete_config_handler),
        )
        .route("/api/metrics", get(handlers::metrics_handler))
        .route_layer(from_fn_with_state(auth_state, auth_gate))
        .layer(middleware::body_size_limit_layer(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(middleware::handle_timeout_error))
                .timeout(timeout),
        )
        .layer(middleware::tracing_layer())
        .with_state(app_state)
}
