// Resume tailoring: the real operation behind the progress flow and the HTTP surface
// around it. Theme rendering and PDF export live outside this service.

pub mod client;
pub mod handlers;
pub mod mock_resume;
pub mod store;
pub mod themes;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::tailoring::client::{TailorClient, TailorError, TailorInput};
use crate::tailoring::mock_resume::{mock_json_resume, MOCK_RESUME_ID};
use crate::tailoring::store::ResumeStore;
use crate::tailoring::themes::{themed_results, TailoredResult};

/// Runs one tailoring request end to end: backend call (or mock), cache, theme links.
///
/// `input` must already be validated.
pub async fn tailor_resume(
    client: Arc<dyn TailorClient>,
    store: ResumeStore,
    input: TailorInput,
) -> Result<TailoredResult, TailorError> {
    let (resume_id, resume) = if input.use_mock {
        info!("Using mock resume data");
        (MOCK_RESUME_ID.to_string(), mock_json_resume())
    } else {
        let upload = input.resume.as_ref().ok_or(TailorError::MissingResume)?;
        let resume = client.tailor(&input.job_description, upload).await?;
        (Uuid::new_v4().to_string(), resume)
    };

    store.insert(resume_id.clone(), resume);
    let result = themed_results(&resume_id);
    info!(
        "Tailored resume {} ready in {} themes",
        resume_id,
        result.resumes.len()
    );
    Ok(result)
}
