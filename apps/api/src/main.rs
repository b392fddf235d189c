mod config;
mod errors;
mod progress;
mod routes;
mod state;
mod tailoring;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::progress::{ProgressSettings, SessionRegistry, StepPlan};
use crate::routes::build_router;
use crate::state::AppState;
use crate::tailoring::client::WebhookTailorClient;
use crate::tailoring::store::ResumeStore;

const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeForge API v{}", env!("CARGO_PKG_VERSION"));

    // Step plan: custom file if configured, otherwise the built-in six steps
    let plan = match &config.steps_file {
        Some(path) => StepPlan::from_json_file(path)
            .with_context(|| format!("Invalid progress step plan in {}", path.display()))?,
        None => StepPlan::builtin(),
    };
    info!(
        "Progress plan: {} steps, {}ms nominal / {}ms accelerated",
        plan.len(),
        plan.total_nominal_ms(),
        plan.total_accelerated_ms()
    );

    let settings = ProgressSettings {
        tick: config.progress_tick,
        grace: config.preview_grace,
    };
    let sessions = Arc::new(SessionRegistry::new(plan, settings));
    sessions.spawn_idle_sweep(SESSION_SWEEP_PERIOD.min(config.session_idle), config.session_idle);

    // Initialize tailoring backend
    let tailor = Arc::new(WebhookTailorClient::new(
        config.tailor_webhook_url.clone(),
        config.tailor_timeout,
    ));
    info!("Tailoring client initialized ({})", config.tailor_webhook_url);

    let resumes = ResumeStore::new();
    resumes.spawn_periodic_clear(config.resume_cache_clear);

    // Build app state
    let state = AppState {
        config: config.clone(),
        sessions,
        tailor,
        resumes,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the frontend origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
