//! Timeline: the arithmetic behind the decorative progress bar.
//!
//! `Timeline` is a pure state machine fed with elapsed-time deltas. It knows nothing about
//! clocks or tasks; `driver::TimelineDriver` feeds it from a tokio interval and tests feed it
//! directly.
//!
//! # Rules
//! - Per-step ratio = `clamp(elapsed / effective_duration, 0, 1)`
//! - Global percent = `(step_index + ratio) * (100 / step_count)`
//! - A step whose ratio reaches 1 is recorded as completed and the next step starts from
//!   zero elapsed time. At most one step completes per tick.
//! - When acceleration begins mid-step the elapsed time already spent on that step is kept
//!   and compared against the shorter duration, so an overdue step completes on the next
//!   tick (a visible catch-up jump).
//! - The percentage never decreases, and reaches exactly 100 only when the last step
//!   completes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::progress::steps::StepPlan;

/// Rendering status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    pub id: String,
    pub status: StepStatus,
}

/// One snapshot of timeline progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub percent_complete: f64,
    pub active_step_id: String,
    /// Completed steps in plan order; never contains duplicates.
    pub completed_step_ids: Vec<String>,
    pub timeline_finished: bool,
    pub steps: Vec<StepProgress>,
}

impl ProgressState {
    pub fn status_of(&self, step_id: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|s| s.id == step_id)
            .map(|s| s.status)
    }
}

/// Largest value strictly below 100.
fn just_below_hundred() -> f64 {
    f64::from_bits(100.0_f64.to_bits() - 1)
}

#[derive(Debug, Clone)]
pub struct Timeline {
    plan: StepPlan,
    index: usize,
    elapsed_ms: f64,
    completed: Vec<String>,
    percent: f64,
    finished: bool,
}

impl Timeline {
    pub fn new(plan: StepPlan) -> Self {
        Self {
            plan,
            index: 0,
            elapsed_ms: 0.0,
            completed: Vec::new(),
            percent: 0.0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Elapsed time credited to the active step.
    pub fn step_elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Applies one tick worth of elapsed time and returns the resulting snapshot.
    ///
    /// `accelerated` is read per tick: the active step's effective duration is decided here,
    /// never cached from an earlier tick.
    pub fn advance(&mut self, delta: Duration, accelerated: bool) -> ProgressState {
        if self.finished {
            return self.snapshot();
        }

        let delta_ms = delta.as_secs_f64() * 1000.0;
        self.elapsed_ms += delta_ms;

        let effective_ms = match self.plan.get(self.index) {
            Some(step) => step.effective_duration_ms(accelerated) as f64,
            None => return self.snapshot(),
        };
        let ratio = (self.elapsed_ms / effective_ms).clamp(0.0, 1.0);
        let contribution = self.plan.contribution();

        if ratio >= 1.0 {
            // Only the part of this tick past the deadline carries over. Time banked before
            // an acceleration is spent on the catch-up jump.
            let overshoot_ms = (self.elapsed_ms - effective_ms).clamp(0.0, delta_ms);
            self.complete_active_step(accelerated, overshoot_ms);
            if self.finished {
                self.percent = 100.0;
            } else {
                self.raise_percent(self.index as f64 * contribution);
            }
        } else {
            self.raise_percent((self.index as f64 + ratio) * contribution);
        }

        self.snapshot()
    }

    fn complete_active_step(&mut self, accelerated: bool, overshoot_ms: f64) {
        let Some(step) = self.plan.get(self.index) else {
            return;
        };
        if !self.completed.iter().any(|id| id == &step.id) {
            self.completed.push(step.id.clone());
        }
        debug!(
            "Step '{}' completed after {:.0}ms (accelerated={})",
            step.id, self.elapsed_ms, accelerated
        );

        if self.index + 1 >= self.plan.len() {
            self.finished = true;
        } else {
            self.index += 1;
            self.elapsed_ms = overshoot_ms;
        }
    }

    fn raise_percent(&mut self, candidate: f64) {
        let capped = candidate.min(just_below_hundred());
        if capped > self.percent {
            self.percent = capped;
        }
    }

    pub fn snapshot(&self) -> ProgressState {
        let steps = self
            .plan
            .steps()
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let status = if self.completed.iter().any(|id| id == &step.id) {
                    StepStatus::Done
                } else if i == self.index {
                    StepStatus::Active
                } else {
                    StepStatus::Pending
                };
                StepProgress {
                    id: step.id.clone(),
                    status,
                }
            })
            .collect();

        ProgressState {
            percent_complete: self.percent,
            active_step_id: self
                .plan
                .get(self.index)
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            completed_step_ids: self.completed.clone(),
            timeline_finished: self.finished,
            steps,
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

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Runs the timeline at a fixed tick until it finishes, raising acceleration from tick
    /// `accelerate_from` on. Returns every snapshot together with its virtual timestamp.
    fn run(plan: StepPlan, tick_ms: u64, accelerate_from: Option<u64>) -> Vec<(u64, ProgressState)> {
        let mut timeline = Timeline::new(plan);
        let mut out = vec![(0, timeline.advance(Duration::ZERO, accelerate_from == Some(0)))];
        let mut now = 0;
        while !timeline.is_finished() {
            now += tick_ms;
            let accelerated = accelerate_from.is_some_and(|t| now >= t);
            out.push((now, timeline.advance(ms(tick_ms), accelerated)));
            assert!(now < 1_000_000, "timeline never finished");
        }
        out
    }

    #[test]
    fn test_initial_snapshot_is_first_step_active() {
        let timeline = Timeline::new(scenario_plan());
        let state = timeline.snapshot();
        assert_eq!(state.percent_complete, 0.0);
        assert_eq!(state.active_step_id, "a");
        assert!(state.completed_step_ids.is_empty());
        assert!(!state.timeline_finished);
        assert_eq!(state.status_of("a"), Some(StepStatus::Active));
        assert_eq!(state.status_of("b"), Some(StepStatus::Pending));
    }

    #[test]
    fn test_percent_follows_step_ratio() {
        let mut timeline = Timeline::new(scenario_plan());
        let state = timeline.advance(ms(1000), false);
        // Half of the first third.
        assert!((state.percent_complete - 100.0 / 6.0).abs() < 1e-9);
        assert_eq!(state.active_step_id, "a");
    }

    #[test]
    fn test_step_completion_advances_and_resets_elapsed() {
        let mut timeline = Timeline::new(scenario_plan());
        timeline.advance(ms(1900), false);
        let state = timeline.advance(ms(100), false);
        assert_eq!(state.completed_step_ids, vec!["a".to_string()]);
        assert_eq!(state.active_step_id, "b");
        assert_eq!(timeline.step_elapsed_ms(), 0.0);
        assert!((state.percent_complete - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(state.status_of("a"), Some(StepStatus::Done));
        assert_eq!(state.status_of("b"), Some(StepStatus::Active));
    }

    #[test]
    fn test_overshoot_within_tick_carries_into_next_step() {
        let mut timeline = Timeline::new(scenario_plan());
        timeline.advance(ms(1800), false);
        let state = timeline.advance(ms(300), false);
        assert_eq!(state.active_step_id, "b");
        assert!((timeline.step_elapsed_ms() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_catch_up_carries_only_the_current_tick() {
        let mut timeline = Timeline::new(scenario_plan());
        timeline.advance(ms(1000), false);
        timeline.advance(ms(100), true);
        // 600ms past the accelerated target, but only this tick's 100ms moves on.
        assert!((timeline.step_elapsed_ms() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_uneven_tick_stays_on_schedule() {
        // 200ms ticks never land on the 500ms step boundaries.
        let snapshots = run(scenario_plan(), 200, Some(0));
        let (finished_at, _) = snapshots.last().unwrap();
        assert!(
            (1500..=1700).contains(finished_at),
            "finished at {finished_at}"
        );

        let snapshots = run(scenario_plan(), 300, None);
        let (finished_at, _) = snapshots.last().unwrap();
        assert!(
            (8000..=8300).contains(finished_at),
            "finished at {finished_at}"
        );
    }

    #[test]
    fn test_only_one_step_completes_per_tick() {
        let mut timeline = Timeline::new(scenario_plan());
        let state = timeline.advance(ms(60_000), false);
        assert_eq!(state.completed_step_ids.len(), 1);
        assert!(!state.timeline_finished);
    }

    #[test]
    fn test_acceleration_preserves_elapsed_and_catches_up() {
        let mut timeline = Timeline::new(scenario_plan());
        timeline.advance(ms(1000), false);
        assert_eq!(timeline.step_elapsed_ms(), 1000.0);

        // Elapsed 1000 already exceeds the 500ms accelerated target: completes right away.
        let state = timeline.advance(ms(100), true);
        assert_eq!(state.completed_step_ids, vec!["a".to_string()]);
        assert_eq!(state.active_step_id, "b");
    }

    #[test]
    fn test_acceleration_mid_step_reuses_elapsed_time() {
        let mut timeline = Timeline::new(scenario_plan());
        timeline.advance(ms(300), false);
        // 300 already spent, 500 accelerated target: 100 more is 80% of the step.
        let state = timeline.advance(ms(100), true);
        assert!(state.completed_step_ids.is_empty());
        assert!((state.percent_complete - 0.8 * 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_final_step_forces_exactly_one_hundred() {
        let plan = StepPlan::new(vec![
            Step::new("a", "A", 300, 100),
            Step::new("b", "B", 300, 100),
            Step::new("c", "C", 300, 100),
        ])
        .unwrap();
        let snapshots = run(plan, 100, None);
        let (_, last) = snapshots.last().unwrap();
        assert!(last.timeline_finished);
        assert_eq!(last.percent_complete, 100.0);
        assert_eq!(last.completed_step_ids, vec!["a", "b", "c"]);
        assert!(last.steps.iter().all(|s| s.status == StepStatus::Done));
    }

    #[test]
    fn test_hundred_percent_only_when_finished() {
        for accelerate_from in [None, Some(0), Some(700), Some(2000), Some(5100)] {
            for (_, state) in run(scenario_plan(), 100, accelerate_from) {
                assert_eq!(
                    state.percent_complete == 100.0,
                    state.timeline_finished,
                    "percent {} finished {} (accelerate_from={accelerate_from:?})",
                    state.percent_complete,
                    state.timeline_finished
                );
            }
        }
    }

    #[test]
    fn test_percent_never_decreases_for_any_trigger_time() {
        for trigger in (0..=8_000).step_by(100) {
            let snapshots = run(scenario_plan(), 100, Some(trigger));
            for pair in snapshots.windows(2) {
                assert!(
                    pair[1].1.percent_complete >= pair[0].1.percent_complete,
                    "regressed at t={} with trigger {trigger}",
                    pair[1].0
                );
            }
        }
    }

    #[test]
    fn test_unaccelerated_run_takes_sum_of_nominal_durations() {
        let snapshots = run(scenario_plan(), 100, None);
        let (finished_at, _) = snapshots.last().unwrap();
        assert_eq!(*finished_at, 8000);
    }

    #[test]
    fn test_accelerated_from_start_takes_sum_of_accelerated_durations() {
        let snapshots = run(scenario_plan(), 100, Some(0));
        let (finished_at, _) = snapshots.last().unwrap();
        assert_eq!(*finished_at, 1500);
    }

    #[test]
    fn test_acceleration_at_one_second_finishes_near_two_seconds() {
        let snapshots = run(scenario_plan(), 100, Some(1000));
        let first_done = snapshots
            .iter()
            .find(|(_, s)| s.completed_step_ids.len() == 1)
            .map(|(t, _)| *t)
            .unwrap();
        assert_eq!(first_done, 1000);

        let (finished_at, _) = snapshots.last().unwrap();
        assert!(
            (1900..=2100).contains(finished_at),
            "finished at {finished_at}"
        );
    }

    #[test]
    fn test_advance_after_finish_is_a_no_op() {
        let plan = StepPlan::new(vec![Step::new("only", "Only", 100, 50)]).unwrap();
        let mut timeline = Timeline::new(plan);
        let done = timeline.advance(ms(100), false);
        assert!(done.timeline_finished);
        let again = timeline.advance(ms(100), true);
        assert_eq!(done, again);
        assert_eq!(again.completed_step_ids.len(), 1);
    }
}
