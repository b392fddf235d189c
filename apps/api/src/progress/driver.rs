//! Timeline Driver: ticks a [`Timeline`] from a tokio interval on its own task.
//!
//! Time is read from `tokio::time`, so tests running on a paused runtime get a fully
//! deterministic virtual clock.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::progress::gate::AccelerateSignal;
use crate::progress::steps::StepPlan;
use crate::progress::timeline::{ProgressState, Timeline};

/// Upper bound on tick granularity.
pub const MAX_TICK: Duration = Duration::from_millis(200);

pub struct TimelineDriver {
    plan: StepPlan,
    tick: Duration,
}

impl TimelineDriver {
    /// `tick` is clamped into `1ms..=200ms`.
    pub fn new(plan: StepPlan, tick: Duration) -> Self {
        Self {
            plan,
            tick: tick.clamp(Duration::from_millis(1), MAX_TICK),
        }
    }

    /// Spawns the tick loop and returns the stream of snapshots.
    ///
    /// The first snapshot is emitted immediately. The stream ends after the snapshot with
    /// `timeline_finished == true`, or as soon as `cancel` fires; nothing is sent after
    /// cancellation is observed.
    pub fn start(
        self,
        accelerate: AccelerateSignal,
        cancel: CancellationToken,
    ) -> (mpsc::UnboundedReceiver<ProgressState>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_timeline(
            Timeline::new(self.plan),
            self.tick,
            accelerate,
            cancel,
            tx,
        ));
        (rx, handle)
    }
}

async fn run_timeline(
    mut timeline: Timeline,
    tick: Duration,
    accelerate: AccelerateSignal,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<ProgressState>,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Timeline cancelled at {:.1}%", timeline.percent());
                return;
            }

            _ = interval.tick() => {
                let now = Instant::now();
                let delta = now.saturating_duration_since(last);
                last = now;

                let state = timeline.advance(delta, accelerate.is_raised());
                if cancel.is_cancelled() || tx.send(state).is_err() {
                    return;
                }
                if timeline.is_finished() {
                    debug!("Timeline finished");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::steps::Step;

    fn scenario_plan() -> StepPlan {
        StepPlan::new(vec![
            Step::new("a", "First", 2000, 500),
            Step::new("b", "Second", 3000, 500),
            Step::new("c", "Third", 3000, 500),
        ])
        .unwrap()
    }

    /// Drains the driver, returning each snapshot with its offset from `start` in ms.
    async fn collect(
        mut rx: mpsc::UnboundedReceiver<ProgressState>,
        start: Instant,
    ) -> Vec<(u128, ProgressState)> {
        let mut out = Vec::new();
        while let Some(state) = rx.recv().await {
            out.push((start.elapsed().as_millis(), state));
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_unaccelerated_run_takes_sum_of_nominal() {
        let start = Instant::now();
        let (rx, handle) = TimelineDriver::new(scenario_plan(), Duration::from_millis(100))
            .start(AccelerateSignal::new(), CancellationToken::new());

        let snapshots = collect(rx, start).await;
        handle.await.unwrap();

        let (at, last) = snapshots.last().unwrap();
        assert!(last.timeline_finished);
        assert_eq!(last.percent_complete, 100.0);
        assert!((7900..=8100).contains(at), "finished at {at}ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_accelerated_from_start_takes_sum_of_accelerated() {
        let signal = AccelerateSignal::new();
        signal.raise();
        let start = Instant::now();
        let (rx, _handle) = TimelineDriver::new(scenario_plan(), Duration::from_millis(100))
            .start(signal, CancellationToken::new());

        let snapshots = collect(rx, start).await;
        let (at, last) = snapshots.last().unwrap();
        assert!(last.timeline_finished);
        assert!((1400..=1600).contains(at), "finished at {at}ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_uneven_tick_stays_within_one_tick_of_schedule() {
        let signal = AccelerateSignal::new();
        signal.raise();
        let start = Instant::now();
        let (rx, _handle) = TimelineDriver::new(scenario_plan(), Duration::from_millis(200))
            .start(signal, CancellationToken::new());

        let snapshots = collect(rx, start).await;
        let (at, last) = snapshots.last().unwrap();
        assert!(last.timeline_finished);
        assert!((1300..=1700).contains(at), "finished at {at}ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_snapshot_is_immediate() {
        let (mut rx, _handle) = TimelineDriver::new(scenario_plan(), Duration::from_millis(100))
            .start(AccelerateSignal::new(), CancellationToken::new());
        let start = Instant::now();
        let first = rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(first.percent_complete, 0.0);
        assert_eq!(first.active_step_id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_run_acceleration_catches_up() {
        let signal = AccelerateSignal::new();
        let start = Instant::now();
        let (rx, _handle) = TimelineDriver::new(scenario_plan(), Duration::from_millis(100))
            .start(signal.clone(), CancellationToken::new());

        let raiser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1050)).await;
            signal.raise();
        });

        let snapshots = collect(rx, start).await;
        raiser.await.unwrap();

        let first_done = snapshots
            .iter()
            .find(|(_, s)| s.completed_step_ids.len() == 1)
            .map(|(t, _)| *t)
            .unwrap();
        assert_eq!(first_done, 1100, "first step completes on the tick after the signal");

        let (at, _) = snapshots.last().unwrap();
        assert!((1900..=2200).contains(at), "finished at {at}ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_emissions() {
        let token = CancellationToken::new();
        let (mut rx, handle) = TimelineDriver::new(scenario_plan(), Duration::from_millis(100))
            .start(AccelerateSignal::new(), token.clone());

        tokio::time::sleep(Duration::from_millis(450)).await;
        token.cancel();
        handle.await.unwrap();

        let mut received = Vec::new();
        while let Some(state) = rx.recv().await {
            received.push(state);
        }
        // Ticks at 0, 100, 200, 300, 400 only.
        assert_eq!(received.len(), 5);
        assert!(received.iter().all(|s| !s.timeline_finished));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_receiver_ends_driver() {
        let (rx, handle) = TimelineDriver::new(scenario_plan(), Duration::from_millis(100))
            .start(AccelerateSignal::new(), CancellationToken::new());
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("driver should stop once nobody listens")
            .unwrap();
    }

    #[test]
    fn test_tick_is_clamped_to_two_hundred_ms() {
        let driver = TimelineDriver::new(scenario_plan(), Duration::from_secs(5));
        assert_eq!(driver.tick, MAX_TICK);
    }
}
