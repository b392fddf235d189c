use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use crate::tailoring::mock_resume::{mock_json_resume, MOCK_RESUME_ID};

/// In-memory cache of tailored resumes, keyed by resume id.
///
/// Only suitable for a single instance; entries are dropped wholesale on every clear.
#[derive(Clone, Default)]
pub struct ResumeStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl ResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: String, resume: Value) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, resume);
    }

    /// The mock id always resolves, even after a clear.
    pub fn get(&self, id: &str) -> Option<Value> {
        if id == MOCK_RESUME_ID {
            return Some(mock_json_resume());
        }
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Clears the store every `period`.
    pub fn spawn_periodic_clear(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let dropped = store.len();
                store.clear();
                info!("Resume cache cleared ({dropped} entries)");
            }
        })
    }
}
