//! Stage: the top-level mode of a tailoring session.
//!
//! ```text
//! Landing ──start──▶ Form ──submit──▶ Loading ──reveal──▶ Preview
//!                     ▲                  │                   │
//!                     └──── failure ─────┘                   │
//!                     └────────────── restart ───────────────┘
//! any ──home──▶ Landing
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Landing,
    Form,
    Loading,
    Preview,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Landing => "landing",
            Stage::Form => "form",
            Stage::Loading => "loading",
            Stage::Preview => "preview",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: Stage,
    pub to: Stage,
}

impl Stage {
    pub fn can_transition_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (_, Stage::Landing)
                | (Stage::Landing, Stage::Form)
                | (Stage::Form, Stage::Loading)
                | (Stage::Loading, Stage::Form)
                | (Stage::Loading, Stage::Preview)
                | (Stage::Preview, Stage::Form)
        )
    }

    pub fn transition(self, next: Stage) -> Result<Stage, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

/// The two facts that must both hold before `Loading → Preview` may fire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RevealCondition {
    timeline_finished: bool,
    operation_succeeded: bool,
}

impl RevealCondition {
    pub fn mark_timeline_finished(&mut self) {
        self.timeline_finished = true;
    }

    pub fn mark_operation_succeeded(&mut self) {
        self.operation_succeeded = true;
    }

    pub fn timeline_finished(&self) -> bool {
        self.timeline_finished
    }

    pub fn is_met(&self) -> bool {
        self.timeline_finished && self.operation_succeeded
    }
}
