use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::progress::steps::Step;
use crate::progress::{Session, SessionSnapshot, Stage};
use crate::state::AppState;
use crate::tailoring::client::{ResumeUpload, TailorInput};
use crate::tailoring::tailor_resume;
use crate::tailoring::themes::{is_known_theme, TailoredResult};

type SnapshotResponse = Json<SessionSnapshot<TailoredResult>>;

fn find_session(state: &AppState, id: Uuid) -> Result<Arc<Session<TailoredResult>>, AppError> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

/// GET /api/v1/progress/steps
pub async fn handle_get_steps(State(state): State<AppState>) -> Json<Vec<Step>> {
    Json(state.sessions.plan().steps().to_vec())
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, SnapshotResponse) {
    let session = state.sessions.create();
    (StatusCode::CREATED, Json(session.snapshot()))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SnapshotResponse, AppError> {
    Ok(Json(find_session(&state, id)?.snapshot()))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .remove(id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/start
pub async fn handle_start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SnapshotResponse, AppError> {
    let session = find_session(&state, id)?;
    session.start()?;
    Ok(Json(session.snapshot()))
}

/// POST /api/v1/sessions/:id/submit
///
/// Multipart fields: `jobDescription`, `resume` (PDF file), `useMock` (`"true"` to skip the
/// tailoring backend).
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, SnapshotResponse), AppError> {
    let session = find_session(&state, id)?;
    session.stage().transition(Stage::Loading)?;
    let input = read_tailor_input(multipart).await?;
    input.validate()?;

    let operation = tailor_resume(state.tailor.clone(), state.resumes.clone(), input);
    session.submit(operation)?;
    Ok((StatusCode::ACCEPTED, Json(session.snapshot())))
}

async fn read_tailor_input(mut multipart: Multipart) -> Result<TailorInput, AppError> {
    let mut input = TailorInput::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "jobDescription" => {
                input.job_description = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid job description: {e}")))?;
            }
            "useMock" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid useMock flag: {e}")))?;
                input.use_mock = raw.trim().eq_ignore_ascii_case("true");
            }
            "resume" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid resume upload: {e}")))?;
                if !bytes.is_empty() {
                    input.resume = Some(ResumeUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => warn!("Ignoring unknown form field '{other}'"),
        }
    }
    Ok(input)
}

/// POST /api/v1/sessions/:id/restart
pub async fn handle_restart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SnapshotResponse, AppError> {
    let session = find_session(&state, id)?;
    session.restart()?;
    Ok(Json(session.snapshot()))
}

/// POST /api/v1/sessions/:id/home
pub async fn handle_home(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SnapshotResponse, AppError> {
    let session = find_session(&state, id)?;
    session.go_home();
    Ok(Json(session.snapshot()))
}

/// GET /api/v1/sessions/:id/events
/// Server-Sent Events stream of `progress`, `stage` and `chime` events.
pub async fn handle_session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = find_session(&state, id)?;
    info!("Client subscribed to session {id} events");

    let stream = BroadcastStream::new(session.subscribe()).filter_map(move |item| match item {
        Ok(event) => match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                warn!("Failed to encode {} event: {e}", event.name());
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Session {id} subscriber lagged, skipped {skipped} events");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state
        .resumes
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Resume not found or expired".to_string()))
}

#[derive(Deserialize)]
pub struct ThemeQuery {
    pub theme: String,
}

/// GET /api/v1/resumes/:id/preview
/// GET /api/v1/resumes/:id/download
/// Rendering happens in a separate service; only the request is checked here.
pub async fn handle_render_theme(
    Path(_id): Path<String>,
    Query(query): Query<ThemeQuery>,
) -> Result<(), AppError> {
    if !is_known_theme(&query.theme) {
        return Err(AppError::Validation(format!("Unknown theme '{}'", query.theme)));
    }
    Err(AppError::NotImplemented)
}
