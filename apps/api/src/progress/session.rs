//! Session: one progress orchestrator per visitor.
//!
//! A session owns its stage, the active run (cancellation token + run id), the event
//! stream and the chime notifier. While in `Loading` a single run task joins the timeline
//! driver and the completion gate:
//!
//! 1. the driver streams `ProgressState` snapshots,
//! 2. the gate resolves the real operation once (success accelerates, failure cancels),
//! 3. once the timeline is finished *and* the operation succeeded, a grace delay elapses and
//!    the session moves to `Preview`.
//!
//! All state changes happen under one mutex and are checked against the run id, so a run
//! that was cancelled (restart, navigation home, teardown) can never publish progress or
//! reveal results after the fact.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::progress::chime::{AudioContextFactory, ChimeNotifier, EventAudioContext};
use crate::progress::driver::TimelineDriver;
use crate::progress::events::SessionEvent;
use crate::progress::gate::{AccelerateSignal, ApiState, CompletionGate};
use crate::progress::stage::{RevealCondition, Stage, TransitionError};
use crate::progress::steps::StepPlan;
use crate::progress::timeline::{ProgressState, Timeline};

const EVENT_CAPACITY: usize = 256;

/// Timing knobs shared by every session.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSettings {
    pub tick: Duration,
    /// Pause between "both conditions met" and the reveal.
    pub grace: Duration,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            grace: Duration::from_millis(600),
        }
    }
}

/// Serializable view of a session, used by the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot<P> {
    pub id: Uuid,
    pub stage: Stage,
    pub progress: Option<ProgressState>,
    pub result: Option<P>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
}

struct Inner<P> {
    stage: Stage,
    run: Option<ActiveRun>,
    progress: Option<ProgressState>,
    result: Option<P>,
    last_error: Option<String>,
    next_run_id: u64,
}

pub struct Session<P> {
    id: Uuid,
    created_at: DateTime<Utc>,
    plan: StepPlan,
    settings: ProgressSettings,
    inner: Mutex<Inner<P>>,
    last_seen: Mutex<Instant>,
    events: broadcast::Sender<SessionEvent>,
    chime: Arc<ChimeNotifier>,
    shutdown: CancellationToken,
}

impl<P> Session<P>
where
    P: Clone + Send + 'static,
{
    /// Creates a session in `Landing` whose chime is delivered over its own event stream.
    pub fn new(plan: StepPlan, settings: ProgressSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let audio = EventAudioContext::factory(events.clone());
        Self::assemble(plan, settings, events, audio)
    }

    /// Creates a session with a custom audio backend.
    pub fn with_audio(
        plan: StepPlan,
        settings: ProgressSettings,
        audio: AudioContextFactory,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::assemble(plan, settings, events, audio)
    }

    fn assemble(
        plan: StepPlan,
        settings: ProgressSettings,
        events: broadcast::Sender<SessionEvent>,
        audio: AudioContextFactory,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            plan,
            settings,
            inner: Mutex::new(Inner {
                stage: Stage::Landing,
                run: None,
                progress: None,
                result: None,
                last_error: None,
                next_run_id: 0,
            }),
            last_seen: Mutex::new(Instant::now()),
            events,
            chime: Arc::new(ChimeNotifier::new(audio)),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.lock().stage
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.touch();
        self.events.subscribe()
    }

    /// True once nobody has used the session for `max_idle` and no event stream is open.
    pub fn is_idle(&self, max_idle: Duration) -> bool {
        let last_seen = *self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        self.events.receiver_count() == 0 && last_seen.elapsed() >= max_idle
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Current view of the session. Each call counts as a re-render for the chime, which
    /// must not fire again while the stage stays at `Preview`.
    pub fn snapshot(&self) -> SessionSnapshot<P> {
        self.touch();
        let inner = self.lock();
        self.chime.observe(inner.stage);
        SessionSnapshot {
            id: self.id,
            stage: inner.stage,
            progress: inner.progress.clone(),
            result: inner.result.clone(),
            last_error: inner.last_error.clone(),
            created_at: self.created_at,
        }
    }

    /// `Landing → Form`.
    pub fn start(&self) -> Result<Stage, TransitionError> {
        self.touch();
        let mut inner = self.lock();
        Self::require(&inner, Stage::Landing, Stage::Form)?;
        self.set_stage(&mut inner, Stage::Form, None)
    }

    /// `Form → Loading`: starts the timeline and begins observing `operation`.
    ///
    /// Inputs must already be validated. The operation is dropped without effect if the
    /// run is cancelled before it resolves.
    pub fn submit<F, E>(self: &Arc<Self>, operation: F) -> Result<Stage, TransitionError>
    where
        F: Future<Output = Result<P, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.touch();
        let mut inner = self.lock();
        inner.stage.transition(Stage::Loading)?;

        let run_id = inner.next_run_id;
        inner.next_run_id += 1;
        let cancel = self.shutdown.child_token();
        inner.run = Some(ActiveRun {
            id: run_id,
            cancel: cancel.clone(),
        });
        inner.last_error = None;
        inner.result = None;
        inner.progress = Some(Timeline::new(self.plan.clone()).snapshot());
        let stage = self.set_stage(&mut inner, Stage::Loading, None)?;
        drop(inner);

        info!("Session {} started run {}", self.id, run_id);
        tokio::spawn(Arc::clone(self).drive_run(run_id, cancel, operation));
        Ok(stage)
    }

    /// `Preview → Form`.
    pub fn restart(&self) -> Result<Stage, TransitionError> {
        self.touch();
        let mut inner = self.lock();
        Self::require(&inner, Stage::Preview, Stage::Form)?;
        self.set_stage(&mut inner, Stage::Form, None)
    }

    /// Any stage `→ Landing`. Cancels an active run.
    pub fn go_home(&self) -> Stage {
        self.touch();
        let mut inner = self.lock();
        inner.last_error = None;
        // Landing is reachable from every stage.
        self.set_stage(&mut inner, Stage::Landing, None)
            .unwrap_or(Stage::Landing)
    }

    /// Cancels every run owned by this session. Used when the session is discarded.
    pub fn teardown(&self) {
        self.shutdown.cancel();
        let mut inner = self.lock();
        if let Some(run) = inner.run.take() {
            run.cancel.cancel();
        }
        inner.progress = None;
        info!("Session {} torn down", self.id);
    }

    fn lock(&self) -> MutexGuard<'_, Inner<P>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies a validated transition and performs its side effects.
    fn set_stage(
        &self,
        inner: &mut Inner<P>,
        next: Stage,
        error: Option<String>,
    ) -> Result<Stage, TransitionError> {
        let from = inner.stage;
        from.transition(next)?;

        if from == Stage::Loading && next != Stage::Loading {
            if let Some(run) = inner.run.take() {
                run.cancel.cancel();
            }
            inner.progress = None;
        }
        if from == Stage::Preview && next != Stage::Preview {
            inner.result = None;
        }

        inner.stage = next;
        info!("Session {}: {} -> {}", self.id, from, next);
        self.events.send(SessionEvent::Stage { stage: next, error }).ok();
        self.chime.observe(next);
        Ok(next)
    }

    /// Rejects user actions that are only meaningful from one stage, even when the stage
    /// machine itself would allow the move (e.g. `Loading → Form` is reserved for failures).
    fn require(inner: &Inner<P>, expected: Stage, to: Stage) -> Result<(), TransitionError> {
        if inner.stage == expected {
            Ok(())
        } else {
            Err(TransitionError {
                from: inner.stage,
                to,
            })
        }
    }

    fn is_current(inner: &Inner<P>, run_id: u64) -> bool {
        inner.stage == Stage::Loading && inner.run.as_ref().is_some_and(|r| r.id == run_id)
    }

    fn publish_progress(&self, run_id: u64, state: ProgressState) {
        let mut inner = self.lock();
        if !Self::is_current(&inner, run_id) {
            return;
        }
        inner.progress = Some(state.clone());
        self.events.send(SessionEvent::Progress(state)).ok();
    }

    fn fail_run(&self, run_id: u64, message: String) {
        let mut inner = self.lock();
        if !Self::is_current(&inner, run_id) {
            return;
        }
        inner.last_error = Some(message.clone());
        if let Err(e) = self.set_stage(&mut inner, Stage::Form, Some(message)) {
            warn!("Session {}: could not revert after failure: {e}", self.id);
        }
    }

    fn reveal(&self, run_id: u64, payload: P) {
        let mut inner = self.lock();
        if !Self::is_current(&inner, run_id) {
            return;
        }
        inner.result = Some(payload);
        if let Err(e) = self.set_stage(&mut inner, Stage::Preview, None) {
            warn!("Session {}: could not reveal results: {e}", self.id);
        }
    }

    async fn drive_run<F, E>(self: Arc<Self>, run_id: u64, cancel: CancellationToken, operation: F)
    where
        F: Future<Output = Result<P, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let accelerate = AccelerateSignal::new();
        let (mut progress, _driver) = TimelineDriver::new(self.plan.clone(), self.settings.tick)
            .start(accelerate.clone(), cancel.clone());
        let observed = CompletionGate::new(accelerate, cancel.clone()).observe(operation);
        tokio::pin!(observed);

        let mut api_state: ApiState<P, E> = ApiState::Pending;
        let mut condition = RevealCondition::default();

        while !condition.is_met() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return,

                outcome = &mut observed, if api_state.is_pending() => {
                    match outcome {
                        ApiState::Failed(e) => {
                            self.fail_run(run_id, e.to_string());
                            return;
                        }
                        succeeded => {
                            condition.mark_operation_succeeded();
                            api_state = succeeded;
                        }
                    }
                }

                Some(state) = progress.recv(), if !condition.timeline_finished() => {
                    if state.timeline_finished {
                        condition.mark_timeline_finished();
                    }
                    self.publish_progress(run_id, state);
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.settings.grace) => {}
        }

        if let ApiState::Succeeded(payload) = api_state {
            self.reveal(run_id, payload);
        }
    }
}
