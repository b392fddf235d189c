use serde::Serialize;

use crate::progress::chime::ChimeCue;
use crate::progress::stage::Stage;
use crate::progress::timeline::ProgressState;

/// Notifications pushed to whoever renders a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Progress(ProgressState),
    Stage {
        stage: Stage,
        /// Human-readable failure message on `Loading → Form`.
        error: Option<String>,
    },
    Chime(ChimeCue),
}

impl SessionEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Progress(_) => "progress",
            SessionEvent::Stage { .. } => "stage",
            SessionEvent::Chime(_) => "chime",
        }
    }
}
