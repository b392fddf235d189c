use std::sync::Arc;

use crate::config::Config;
use crate::progress::SessionRegistry;
use crate::tailoring::client::TailorClient;
use crate::tailoring::store::ResumeStore;
use crate::tailoring::themes::TailoredResult;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// One progress orchestrator per visitor session.
    pub sessions: Arc<SessionRegistry<TailoredResult>>,
    /// Real tailoring backend. Swappable for tests.
    pub tailor: Arc<dyn TailorClient>,
    pub resumes: ResumeStore,
}
