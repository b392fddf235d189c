pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::tailoring::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/progress/steps", get(handlers::handle_get_steps))
        // Session API
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        .route("/api/v1/sessions/:id/start", post(handlers::handle_start))
        .route("/api/v1/sessions/:id/submit", post(handlers::handle_submit))
        .route(
            "/api/v1/sessions/:id/restart",
            post(handlers::handle_restart),
        )
        .route("/api/v1/sessions/:id/home", post(handlers::handle_home))
        .route(
            "/api/v1/sessions/:id/events",
            get(handlers::handle_session_events),
        )
        // Resume API
        .route("/api/v1/resumes/:id", get(handlers::handle_get_resume))
        // Theme rendering and PDF export happen elsewhere
        .route(
            "/api/v1/resumes/:id/preview",
            get(handlers::handle_render_theme),
        )
        .route(
            "/api/v1/resumes/:id/download",
            get(handlers::handle_render_theme),
        )
        .with_state(state)
}
