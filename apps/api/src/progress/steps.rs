//! Step Plan: the fixed, ordered list of decorative steps shown while a resume is tailored.
//!
//! A plan is validated once when it is built and is immutable afterwards. Every run of the
//! timeline borrows the same plan; steps are never added, removed or reordered mid-run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed step plan. Raised at startup; the service refuses to run with a bad plan.
#[derive(Debug, Error)]
pub enum StepConfigError {
    #[error("Step plan is empty")]
    Empty,

    #[error("Step at position {index} has a blank id")]
    BlankId { index: usize },

    #[error("Duplicate step id '{id}'")]
    DuplicateId { id: String },

    #[error("Step '{id}' has a zero {which} duration")]
    ZeroDuration { id: String, which: &'static str },

    #[error(
        "Step '{id}' accelerates to {accelerated_ms}ms, which is longer than its nominal {nominal_ms}ms"
    )]
    AcceleratedLonger {
        id: String,
        nominal_ms: u64,
        accelerated_ms: u64,
    },

    #[error("Failed to read step plan at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid step plan JSON at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One named phase of the progress timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub note: String,
    pub nominal_duration_ms: u64,
    pub accelerated_duration_ms: u64,
    /// Decorative step that does not correspond to a real backend phase.
    #[serde(default = "default_artificial")]
    pub artificial: bool,
}

fn default_artificial() -> bool {
    true
}

impl Step {
    pub fn new(id: &str, label: &str, nominal_ms: u64, accelerated_ms: u64) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            note: String::new(),
            nominal_duration_ms: nominal_ms,
            accelerated_duration_ms: accelerated_ms,
            artificial: true,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    /// Duration this step runs for, depending on whether the real result is already known.
    pub fn effective_duration_ms(&self, accelerated: bool) -> u64 {
        if accelerated {
            self.accelerated_duration_ms
        } else {
            self.nominal_duration_ms
        }
    }
}

/// A validated, shareable step sequence.
#[derive(Debug, Clone)]
pub struct StepPlan {
    steps: Arc<[Step]>,
}

impl StepPlan {
    /// Validates `steps` and freezes them into a plan.
    pub fn new(steps: Vec<Step>) -> Result<Self, StepConfigError> {
        if steps.is_empty() {
            return Err(StepConfigError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, step) in steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(StepConfigError::BlankId { index });
            }
            if !seen.insert(step.id.as_str()) {
                return Err(StepConfigError::DuplicateId {
                    id: step.id.clone(),
                });
            }
            if step.nominal_duration_ms == 0 {
                return Err(StepConfigError::ZeroDuration {
                    id: step.id.clone(),
                    which: "nominal",
                });
            }
            if step.accelerated_duration_ms == 0 {
                return Err(StepConfigError::ZeroDuration {
                    id: step.id.clone(),
                    which: "accelerated",
                });
            }
            if step.accelerated_duration_ms > step.nominal_duration_ms {
                return Err(StepConfigError::AcceleratedLonger {
                    id: step.id.clone(),
                    nominal_ms: step.nominal_duration_ms,
                    accelerated_ms: step.accelerated_duration_ms,
                });
            }
        }

        Ok(Self {
            steps: steps.into(),
        })
    }

    /// Loads a plan from a JSON array of steps.
    pub fn from_json_file(path: &Path) -> Result<Self, StepConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| StepConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let steps: Vec<Step> =
            serde_json::from_str(&raw).map_err(|source| StepConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(steps)
    }

    /// The six-step plan shown by the tailoring flow.
    pub fn builtin() -> Self {
        Self::new(builtin_steps()).expect("built-in step plan is valid")
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Share of the global percentage owned by each step.
    pub fn contribution(&self) -> f64 {
        100.0 / self.steps.len() as f64
    }

    pub fn total_nominal_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.nominal_duration_ms).sum()
    }

    pub fn total_accelerated_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.accelerated_duration_ms).sum()
    }
}

fn builtin_steps() -> Vec<Step> {
    vec![
        Step::new("upload", "Uploading your resume securely", 8_000, 600)
            .with_note("Encrypting the PDF in transit"),
        Step::new("analyze", "Analyzing job requirements with AI", 18_000, 600)
            .with_note("Reading the job posting"),
        Step::new("extract", "Extracting key skills and experiences", 15_000, 600)
            .with_note("Matching your history against the role"),
        Step::new("tailor", "Tailoring resume to match job posting", 22_000, 600)
            .with_note("Rewriting highlights for the role"),
        Step::new("optimize", "Optimizing keywords for ATS systems", 15_000, 600)
            .with_note("Balancing keyword coverage"),
        Step::new("themes", "Generating professional themes", 12_000, 600)
            .with_note("Preparing theme previews"),
    ]
}
