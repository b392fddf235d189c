//! Completion Gate: turns the single outcome of the real tailoring call into signals.
//!
//! Success raises the shared [`AccelerateSignal`] read by the timeline on its next tick.
//! Failure cancels the run's token, which halts the timeline immediately.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Single-writer, single-reader flag shared between the gate and the timeline driver.
#[derive(Debug, Clone, Default)]
pub struct AccelerateSignal(Arc<AtomicBool>);

impl AccelerateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns `true` only for the call that actually raised it.
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of the real operation as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ApiState<T, E> {
    Pending,
    Succeeded(T),
    Failed(E),
}

impl<T, E> ApiState<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, ApiState::Pending)
    }
}

/// Wraps exactly one asynchronous call. Consumed by [`CompletionGate::observe`], so a gate
/// can resolve at most once.
#[derive(Debug)]
pub struct CompletionGate {
    accelerate: AccelerateSignal,
    cancel: CancellationToken,
}

impl CompletionGate {
    pub fn new(accelerate: AccelerateSignal, cancel: CancellationToken) -> Self {
        Self { accelerate, cancel }
    }

    /// Awaits the operation and publishes its outcome.
    ///
    /// Dropping the returned future before it resolves discards the operation without
    /// raising or cancelling anything.
    pub async fn observe<F, T, E>(self, operation: F) -> ApiState<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        match operation.await {
            Ok(payload) => {
                if self.accelerate.raise() {
                    info!("Tailoring finished; accelerating remaining steps");
                }
                ApiState::Succeeded(payload)
            }
            Err(e) => {
                warn!("Tailoring failed: {e}");
                self.cancel.cancel();
                ApiState::Failed(e)
            }
        }
    }
}
