//! API Router configuration

use super::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Users
        .route("/users", post(handlers::signup))
        .route(
            "/users/me",
            get(handlers::current_user).patch(handlers::update_current_user),
        )
        .route("/users/:id", get(handlers::get_user))
        // Employees
        .route("/employees", get(handlers::list_candidates))
        .route("/employees/:id/workload", get(handlers::employee_workload))
        .route("/employees/:id/tasks", get(handlers::employee_tasks))
        // Attachments
        .route("/attachments", post(handlers::upload_attachment))
        .route("/attachments/:reference", get(handlers::download_attachment))
        // Complaints
        .route(
            "/complaints",
            get(handlers::list_complaints).post(handlers::create_complaint),
        )
        .route("/complaints/:id", get(handlers::get_complaint))
        .route("/complaints/:id/assign", post(handlers::assign_complaint))
        .route(
            "/complaints/:id/transition",
            post(handlers::transition_complaint),
        )
        .route("/complaints/:id/timeline", get(handlers::complaint_timeline))
        // Dashboard
        .route("/stats", get(handlers::statistics))
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/read-all", post(handlers::mark_all_read))
        .route("/notifications/:id/read", post(handlers::mark_read))
        // Events
        .route("/events/stream", get(handlers::stream_events));

    let server = &state.config.server;
    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
