//! Chime Notifier: a short synthesized cue played once when results are revealed.
//!
//! The audio context is created lazily on the first chime and reused for the lifetime of
//! the notifier. Every playback first resumes the context if it is suspended. Audio
//! failures are logged and dropped; they never reach the user or delay a stage change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, OnceCell};
use tracing::{debug, warn};

use crate::progress::events::SessionEvent;
use crate::progress::stage::Stage;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio context unavailable: {0}")]
    Unavailable(String),

    #[error("audio autoplay denied: {0}")]
    AutoplayDenied(String),

    #[error("chime playback failed: {0}")]
    Playback(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
}

/// One sine tone within a cue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tone {
    pub frequency_hz: f32,
    pub start_ms: u32,
    pub duration_ms: u32,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChimeCue {
    pub tones: Vec<Tone>,
}

impl ChimeCue {
    /// Rising C-major arpeggio, roughly half a second long.
    pub fn completion() -> Self {
        let notes: [f32; 3] = [523.25, 659.25, 783.99];
        Self {
            tones: notes
                .iter()
                .enumerate()
                .map(|(i, &frequency_hz)| Tone {
                    frequency_hz,
                    start_ms: i as u32 * 110,
                    duration_ms: 260,
                    gain: 0.18,
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait AudioContext: Send + Sync {
    fn state(&self) -> ContextState;
    async fn resume(&self) -> Result<(), AudioError>;
    async fn play(&self, cue: &ChimeCue) -> Result<(), AudioError>;
}

pub type AudioContextFactory =
    Arc<dyn Fn() -> Result<Arc<dyn AudioContext>, AudioError> + Send + Sync>;

pub struct ChimeNotifier {
    played: AtomicBool,
    context: OnceCell<Arc<dyn AudioContext>>,
    factory: AudioContextFactory,
    cue: ChimeCue,
}

impl ChimeNotifier {
    pub fn new(factory: AudioContextFactory) -> Self {
        Self {
            played: AtomicBool::new(false),
            context: OnceCell::new(),
            factory,
            cue: ChimeCue::completion(),
        }
    }

    /// Called whenever the session (re)renders its stage.
    ///
    /// Fires on the first observation of `Preview`; further observations while still in
    /// `Preview` do nothing. Observing any other stage re-arms the notifier. Returns whether
    /// a chime was fired. Playback runs on a detached task.
    pub fn observe(self: &Arc<Self>, stage: Stage) -> bool {
        if stage != Stage::Preview {
            self.played.store(false, Ordering::SeqCst);
            return false;
        }
        if self.played.swap(true, Ordering::SeqCst) {
            return false;
        }

        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = notifier.play().await {
                warn!("Completion chime skipped: {e}");
            }
        });
        true
    }

    async fn play(&self) -> Result<(), AudioError> {
        let context = self
            .context
            .get_or_try_init(|| async { (self.factory)() })
            .await?;
        if context.state() == ContextState::Suspended {
            context.resume().await?;
        }
        context.play(&self.cue).await?;
        debug!("Completion chime played");
        Ok(())
    }
}

/// Audio context backed by the session event stream: the cue is delivered to the connected
/// client, which synthesizes it. With no client connected the context counts as suspended
/// and cannot be resumed, the server-side analogue of a blocked autoplay.
pub struct EventAudioContext {
    events: broadcast::Sender<SessionEvent>,
}

impl EventAudioContext {
    pub fn factory(events: broadcast::Sender<SessionEvent>) -> AudioContextFactory {
        Arc::new(move || {
            Ok(Arc::new(EventAudioContext {
                events: events.clone(),
            }) as Arc<dyn AudioContext>)
        })
    }
}

#[async_trait]
impl AudioContext for EventAudioContext {
    fn state(&self) -> ContextState {
        if self.events.receiver_count() == 0 {
            ContextState::Suspended
        } else {
            ContextState::Running
        }
    }

    async fn resume(&self) -> Result<(), AudioError> {
        if self.events.receiver_count() == 0 {
            return Err(AudioError::AutoplayDenied(
                "no client is listening".to_string(),
            ));
        }
        Ok(())
    }

    async fn play(&self, cue: &ChimeCue) -> Result<(), AudioError> {
        self.events
            .send(SessionEvent::Chime(cue.clone()))
            .map(|_| ())
            .map_err(|_| AudioError::Playback("event stream closed".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Audio context that records what happened to it.
    pub(crate) struct RecordingAudio {
        pub plays: AtomicUsize,
        pub resumes: AtomicUsize,
        pub suspended: AtomicBool,
        pub deny_resume: bool,
    }

    impl RecordingAudio {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                plays: AtomicUsize::new(0),
                resumes: AtomicUsize::new(0),
                suspended: AtomicBool::new(false),
                deny_resume: false,
            })
        }

        pub(crate) fn plays(&self) -> usize {
            self.plays.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AudioContext for RecordingAudio {
        fn state(&self) -> ContextState {
            if self.suspended.load(Ordering::SeqCst) {
                ContextState::Suspended
            } else {
                ContextState::Running
            }
        }

        async fn resume(&self) -> Result<(), AudioError> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            if self.deny_resume {
                return Err(AudioError::AutoplayDenied("blocked".to_string()));
            }
            self.suspended.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn play(&self, _cue: &ChimeCue) -> Result<(), AudioError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Factory handing out `audio`, counting how often it was asked.
    pub(crate) fn factory_for(audio: Arc<RecordingAudio>, created: Arc<AtomicUsize>) -> AudioContextFactory {
        Arc::new(move || {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(audio.clone() as Arc<dyn AudioContext>)
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_fires_once_per_preview_entry() {
        let audio = RecordingAudio::new();
        let created = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(ChimeNotifier::new(factory_for(audio.clone(), created.clone())));

        assert!(!notifier.observe(Stage::Loading));
        assert!(notifier.observe(Stage::Preview));
        assert!(!notifier.observe(Stage::Preview));
        assert!(!notifier.observe(Stage::Preview));
        settle().await;

        assert_eq!(audio.plays(), 1);
    }

    #[tokio::test]
    async fn test_leaving_preview_rearms_and_reuses_context() {
        let audio = RecordingAudio::new();
        let created = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(ChimeNotifier::new(factory_for(audio.clone(), created.clone())));

        assert!(notifier.observe(Stage::Preview));
        settle().await;
        assert!(!notifier.observe(Stage::Form));
        assert!(notifier.observe(Stage::Preview));
        settle().await;

        assert_eq!(audio.plays(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 1, "context is created once");
    }

    #[tokio::test]
    async fn test_context_is_not_created_before_first_chime() {
        let audio = RecordingAudio::new();
        let created = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(ChimeNotifier::new(factory_for(audio, created.clone())));

        notifier.observe(Stage::Form);
        notifier.observe(Stage::Loading);
        settle().await;
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_suspended_context_is_resumed_before_playing() {
        let audio = RecordingAudio::new();
        audio.suspended.store(true, Ordering::SeqCst);
        let notifier = Arc::new(ChimeNotifier::new(factory_for(
            audio.clone(),
            Arc::new(AtomicUsize::new(0)),
        )));

        notifier.observe(Stage::Preview);
        settle().await;

        assert_eq!(audio.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(audio.plays(), 1);
    }

    #[tokio::test]
    async fn test_denied_autoplay_is_swallowed() {
        let audio = Arc::new(RecordingAudio {
            plays: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            suspended: AtomicBool::new(true),
            deny_resume: true,
        });
        let notifier = Arc::new(ChimeNotifier::new(factory_for(
            audio.clone(),
            Arc::new(AtomicUsize::new(0)),
        )));

        assert!(notifier.observe(Stage::Preview));
        settle().await;

        assert_eq!(audio.plays(), 0);
        // Still counts as played for this Preview entry.
        assert!(!notifier.observe(Stage::Preview));
    }

    #[tokio::test]
    async fn test_failed_context_creation_is_retried_next_time() {
        let attempts = Arc::new(Mutex::new(0));
        let counter = attempts.clone();
        let factory: AudioContextFactory = Arc::new(move || {
            *counter.lock().unwrap() += 1;
            Err(AudioError::Unavailable("no output device".to_string()))
        });
        let notifier = Arc::new(ChimeNotifier::new(factory));

        notifier.observe(Stage::Preview);
        settle().await;
        notifier.observe(Stage::Form);
        notifier.observe(Stage::Preview);
        settle().await;

        assert_eq!(*attempts.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_event_context_delivers_cue_to_listener() {
        let (tx, mut rx) = broadcast::channel(8);
        let notifier = Arc::new(ChimeNotifier::new(EventAudioContext::factory(tx)));

        notifier.observe(Stage::Preview);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, SessionEvent::Chime(ChimeCue::completion()));
    }

    #[tokio::test]
    async fn test_event_context_without_listener_is_suspended() {
        let (tx, rx) = broadcast::channel::<SessionEvent>(8);
        drop(rx);
        let context = EventAudioContext { events: tx };
        assert_eq!(context.state(), ContextState::Suspended);
        assert!(matches!(
            context.resume().await,
            Err(AudioError::AutoplayDenied(_))
        ));
    }

    #[test]
    fn test_completion_cue_is_a_rising_arpeggio() {
        let cue = ChimeCue::completion();
        assert_eq!(cue.tones.len(), 3);
        assert!(cue
            .tones
            .windows(2)
            .all(|w| w[1].frequency_hz > w[0].frequency_hz && w[1].start_ms > w[0].start_ms));
    }
}
