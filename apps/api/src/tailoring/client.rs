//! Tailoring Client: the single point of contact with the real tailoring backend.
//!
//! The backend is an n8n webhook that accepts the job description and the uploaded PDF as
//! multipart form data and answers with `{ "jsonResume": { ... } }`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

const PDF_MIME: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF";

/// Why the real operation did not produce a resume. `Display` is shown to the user.
#[derive(Debug, Error)]
pub enum TailorError {
    #[error("Could not reach the tailoring service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to process resume with webhook: {status}")]
    Status { status: u16, body: String },

    #[error("No jsonResume returned")]
    MissingResume,
}

/// Submission problems caught before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Please upload your resume")]
    MissingResume,

    #[error("Please upload a PDF file")]
    NotPdf,

    #[error("Please enter a job description")]
    MissingJobDescription,
}

#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ResumeUpload {
    pub fn is_pdf(&self) -> bool {
        self.content_type.as_deref() == Some(PDF_MIME) || self.bytes.starts_with(PDF_MAGIC)
    }
}

/// Everything the form submits.
#[derive(Debug, Clone, Default)]
pub struct TailorInput {
    pub job_description: String,
    pub resume: Option<ResumeUpload>,
    /// Dev-only: skip the backend and use the bundled mock resume.
    pub use_mock: bool,
}

impl TailorInput {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.use_mock {
            return Ok(());
        }
        let resume = self.resume.as_ref().ok_or(InputError::MissingResume)?;
        if !resume.is_pdf() {
            return Err(InputError::NotPdf);
        }
        if self.job_description.trim().is_empty() {
            return Err(InputError::MissingJobDescription);
        }
        Ok(())
    }
}

#[async_trait]
pub trait TailorClient: Send + Sync {
    /// Returns the tailored resume in JSON Resume format.
    async fn tailor(&self, job_description: &str, resume: &ResumeUpload)
        -> Result<Value, TailorError>;
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(rename = "jsonResume")]
    json_resume: Option<Value>,
}

#[derive(Clone)]
pub struct WebhookTailorClient {
    client: Client,
    url: String,
}

impl WebhookTailorClient {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            url,
        }
    }
}

#[async_trait]
impl TailorClient for WebhookTailorClient {
    async fn tailor(
        &self,
        job_description: &str,
        resume: &ResumeUpload,
    ) -> Result<Value, TailorError> {
        let part = Part::bytes(resume.bytes.to_vec())
            .file_name(resume.file_name.clone())
            .mime_str(resume.content_type.as_deref().unwrap_or(PDF_MIME))?;
        let form = Form::new()
            .text("jobDescription", job_description.to_string())
            .part("resume", part);

        info!(
            "Sending resume '{}' ({} bytes, JD {} chars) to tailoring webhook",
            resume.file_name,
            resume.bytes.len(),
            job_description.len()
        );
        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Tailoring webhook returned {}: {}", status, body);
            return Err(TailorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: WebhookResponse = response.json().await?;
        debug!(
            "Tailoring webhook answered, has jsonResume: {}",
            payload.json_resume.is_some()
        );
        payload.json_resume.ok_or(TailorError::MissingResume)
    }
}
