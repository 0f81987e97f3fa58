//! [`DockingStateMachine`] – sequences search, approach and completion.
//!
//! ```text
//! Idle ──begin──▶ Searching ⇄ Approaching ──aligned──▶ Succeeded
//!                     │             │
//!                     └── cancel ───┴──▶ Cancelled   (also TimedOut / Failed)
//! ```
//!
//! One [`step`][DockingStateMachine::step] per camera frame: if the target
//! marker is among the observations the approach controller runs on that
//! marker's pose, otherwise the search strategy produces a scan command.
//! Every terminal transition yields the zero command.
//!
//! The machine performs no I/O; the async control loop in
//! [`control_loop`][crate::control_loop] feeds it frames and forwards its
//! commands.

use std::time::{Duration, Instant};

use dockbot_perception::pose_source::select_target;
use dockbot_types::{
    DockingConfig, DockingStatus, DockingTaskState, MarkerObservation, VelocityCommand,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::approach::{ApproachController, SaturationCounts};
use crate::search::{SearchState, SearchStrategy};

/// Result of one state machine step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Command to hand to the velocity sink for this iteration.
    pub command: VelocityCommand,
    /// Status after the step.
    pub status: DockingStatus,
    /// `true` when the step changed the status.
    pub changed: bool,
}

/// Owns the single docking task and all of its controller state.
#[derive(Debug, Clone)]
pub struct DockingStateMachine {
    search: SearchStrategy,
    search_state: SearchState,
    approach: ApproachController,
    task: Option<DockingTaskState>,
    started_at: Option<Instant>,
    timeout: Option<Duration>,
}

impl DockingStateMachine {
    /// Build an idle machine from `config`.
    pub fn new(config: &DockingConfig) -> Self {
        let search = SearchStrategy::new(config.search);
        let search_state = search.initial_state();
        Self {
            search,
            search_state,
            approach: ApproachController::new(config),
            task: None,
            started_at: None,
            timeout: config.task_timeout(),
        }
    }

    pub fn status(&self) -> DockingStatus {
        self.task.map(|t| t.status).unwrap_or_default()
    }

    pub fn task(&self) -> Option<DockingTaskState> {
        self.task
    }

    pub fn search_state(&self) -> SearchState {
        self.search_state
    }

    pub fn saturation_counts(&self) -> SaturationCounts {
        self.approach.saturation_counts()
    }

    /// Start a fresh task for `target_marker_id`.
    ///
    /// Controller and search state are reset before the task becomes
    /// `Searching`, so no output is ever computed from a previous task's
    /// history.
    pub fn begin(&mut self, task_id: Uuid, target_marker_id: u32, now: Instant) -> DockingTaskState {
        if self.status().is_active() {
            warn!(
                previous = ?self.task,
                "beginning a new docking task while another is active"
            );
        }
        self.approach.reset();
        self.search_state = self.search.initial_state();
        self.started_at = Some(now);

        let task = DockingTaskState {
            task_id,
            status: DockingStatus::Searching,
            target_marker_id,
        };
        self.task = Some(task);
        info!(%task_id, marker_id = target_marker_id, "docking task started; searching");
        task
    }

    /// Advance the task by one frame's worth of observations.
    ///
    /// Outside of `Searching`/`Approaching` this is a no-op that returns the
    /// zero command.
    pub fn step(&mut self, now: Instant, observations: &[MarkerObservation]) -> StepOutcome {
        let Some(task) = self.task.filter(|t| t.status.is_active()) else {
            return self.idle_outcome();
        };

        match select_target(observations, task.target_marker_id) {
            Some(target) if self.approach.is_aligned(target) => {
                let changed = self.transition(DockingStatus::Succeeded);
                info!(
                    marker_id = task.target_marker_id,
                    saturations = ?self.approach.saturation_counts(),
                    "aligned with marker; docking complete"
                );
                StepOutcome {
                    command: VelocityCommand::zero(),
                    status: DockingStatus::Succeeded,
                    changed,
                }
            }
            Some(target) => {
                let changed = self.transition(DockingStatus::Approaching);
                let command = self.approach.compute(target);
                debug!(?command, "approaching marker");
                StepOutcome {
                    command,
                    status: DockingStatus::Approaching,
                    changed,
                }
            }
            None => {
                let changed = self.transition(DockingStatus::Searching);
                let (command, next) = self.search.decide(now, self.search_state);
                self.search_state = next;
                debug!(
                    visible = observations.len(),
                    direction = ?next.direction,
                    "target not visible; scanning"
                );
                StepOutcome {
                    command,
                    status: DockingStatus::Searching,
                    changed,
                }
            }
        }
    }

    /// End the active task because the client asked to stop.
    pub fn cancel(&mut self) -> StepOutcome {
        self.finish(DockingStatus::Cancelled)
    }

    /// End the active task after a runtime fault.
    pub fn fail(&mut self) -> StepOutcome {
        self.finish(DockingStatus::Failed)
    }

    /// End the active task with `TimedOut` if its deadline has passed.
    pub fn check_deadline(&mut self, now: Instant) -> Option<StepOutcome> {
        let timeout = self.timeout?;
        let started = self.started_at?;
        if self.status().is_active() && now.saturating_duration_since(started) >= timeout {
            warn!(?timeout, "docking task deadline elapsed");
            Some(self.finish(DockingStatus::TimedOut))
        } else {
            None
        }
    }

    fn finish(&mut self, status: DockingStatus) -> StepOutcome {
        if !self.status().is_active() {
            return self.idle_outcome();
        }
        self.transition(status);
        StepOutcome {
            command: VelocityCommand::zero(),
            status,
            changed: true,
        }
    }

    fn idle_outcome(&self) -> StepOutcome {
        StepOutcome {
            command: VelocityCommand::zero(),
            status: self.status(),
            changed: false,
        }
    }

    fn transition(&mut self, to: DockingStatus) -> bool {
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        if task.status == to {
            return false;
        }
        info!(task_id = %task.task_id, from = %task.status, to = %to, "docking status changed");
        task.status = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockbot_types::{AxisGains, PidGains, Tolerance, TurnDirection, Vector3};

    fn marker(id: u32, x: f32, z: f32) -> MarkerObservation {
        MarkerObservation::new(id, Vector3::zero(), Vector3::new(x, 0.0, z))
    }

    fn started(config: &DockingConfig, target: u32) -> (DockingStateMachine, Instant) {
        let mut sm = DockingStateMachine::new(config);
        let t0 = Instant::now();
        sm.begin(Uuid::new_v4(), target, t0);
        (sm, t0)
    }

    #[test]
    fn starts_idle_and_step_is_noop() {
        let mut sm = DockingStateMachine::new(&DockingConfig::default());
        assert_eq!(sm.status(), DockingStatus::Idle);
        let out = sm.step(Instant::now(), &[marker(5, 0.0, 0.1)]);
        assert_eq!(out.status, DockingStatus::Idle);
        assert!(out.command.is_zero());
        assert!(!out.changed);
    }

    #[test]
    fn begin_enters_searching() {
        let (sm, _) = started(&DockingConfig::default(), 5);
        let task = sm.task().unwrap();
        assert_eq!(task.status, DockingStatus::Searching);
        assert_eq!(task.target_marker_id, 5);
    }

    #[test]
    fn aligned_on_first_frame_succeeds_with_zero_command() {
        let config = DockingConfig {
            tolerance: Tolerance::uniform(0.01),
            ..DockingConfig::default()
        };
        let (mut sm, t0) = started(&config, 5);
        let out = sm.step(t0, &[marker(5, 0.0, 0.10)]);
        assert_eq!(out.status, DockingStatus::Succeeded);
        assert!(out.command.is_zero());
        assert!(out.changed);
        // Further steps emit no motion.
        let out = sm.step(t0, &[marker(5, 0.3, 1.0)]);
        assert_eq!(out.status, DockingStatus::Succeeded);
        assert!(out.command.is_zero());
    }

    #[test]
    fn only_the_matching_marker_drives_the_controller() {
        let config = DockingConfig {
            gains: AxisGains {
                angle: PidGains::new(1.0, 0.0, 0.0),
                depth: PidGains::new(0.1, 0.0, 0.0),
                lateral: PidGains::new(0.1, 0.0, 0.0),
            },
            ..DockingConfig::default()
        };
        let decoy = marker(9, -0.2, 0.9);
        let target = marker(5, 0.05, 0.40);

        let (mut a, t0) = started(&config, 5);
        let (mut b, _) = started(&config, 5);
        let out_a = a.step(t0, &[decoy, target]);
        let out_b = b.step(t0, &[target, decoy]);
        assert_eq!(out_a.status, DockingStatus::Approaching);
        assert_eq!(out_a.command, out_b.command);
        // depth: 0.1 * 0.30, lateral: -(0.1 * 0.05)
        assert!((out_a.command.linear.x - 0.03).abs() < 1e-6);
        assert!((out_a.command.linear.y + 0.005).abs() < 1e-6);
    }

    #[test]
    fn non_matching_markers_keep_searching() {
        let (mut sm, t0) = started(&DockingConfig::default(), 5);
        let out = sm.step(t0, &[marker(4, 0.0, 0.5), marker(6, 0.0, 0.5)]);
        assert_eq!(out.status, DockingStatus::Searching);
        assert_eq!(out.command, VelocityCommand::turn(-0.5));
    }

    #[test]
    fn no_markers_for_seven_seconds_flips_once() {
        let (mut sm, t0) = started(&DockingConfig::default(), 5);
        let mut directions = Vec::new();
        for s in [0.0, 3.5, 7.0] {
            sm.step(t0 + Duration::from_secs_f64(s), &[]);
            directions.push(sm.search_state().direction);
        }
        assert_eq!(
            directions,
            vec![TurnDirection::Right, TurnDirection::Left, TurnDirection::Left]
        );
    }

    #[test]
    fn search_timing_survives_an_approach_interlude() {
        let (mut sm, t0) = started(&DockingConfig::default(), 5);
        sm.step(t0, &[]);
        sm.step(t0 + Duration::from_secs(4), &[]);
        assert!(!sm.search_state().using_startup_window);

        let out = sm.step(t0 + Duration::from_secs(5), &[marker(5, 0.0, 0.6)]);
        assert_eq!(out.status, DockingStatus::Approaching);

        let out = sm.step(t0 + Duration::from_secs(6), &[]);
        assert_eq!(out.status, DockingStatus::Searching);
        assert!(out.changed);
        assert!(!sm.search_state().using_startup_window);
        assert_eq!(sm.search_state().direction, TurnDirection::Left);
    }

    #[test]
    fn cancel_mid_approach_stops_motion() {
        let (mut sm, t0) = started(&DockingConfig::default(), 5);
        let out = sm.step(t0, &[marker(5, 0.0, 0.6)]);
        assert_eq!(out.status, DockingStatus::Approaching);
        assert!(!out.command.is_zero());

        let out = sm.cancel();
        assert_eq!(out.status, DockingStatus::Cancelled);
        assert!(out.command.is_zero());
        assert_eq!(sm.status(), DockingStatus::Cancelled);

        // Cancelling again is a no-op.
        let again = sm.cancel();
        assert!(!again.changed);
    }

    #[test]
    fn deadline_times_out_active_task() {
        let config = DockingConfig {
            task_timeout_secs: Some(10.0),
            ..DockingConfig::default()
        };
        let (mut sm, t0) = started(&config, 5);
        assert!(sm.check_deadline(t0 + Duration::from_secs(9)).is_none());
        let out = sm.check_deadline(t0 + Duration::from_secs(10)).unwrap();
        assert_eq!(out.status, DockingStatus::TimedOut);
        assert!(out.command.is_zero());
    }

    #[test]
    fn no_deadline_when_disabled() {
        let config = DockingConfig {
            task_timeout_secs: None,
            ..DockingConfig::default()
        };
        let (mut sm, t0) = started(&config, 5);
        assert!(sm.check_deadline(t0 + Duration::from_secs(100_000)).is_none());
    }

    #[test]
    fn begin_resets_controller_and_search_state() {
        let (mut sm, t0) = started(&DockingConfig::default(), 5);
        let fresh = sm.clone();
        sm.step(t0, &[]);
        sm.step(t0 + Duration::from_secs(4), &[]);
        sm.step(t0 + Duration::from_secs(5), &[marker(5, 0.2, 1.5)]);
        sm.cancel();

        let t1 = t0 + Duration::from_secs(6);
        sm.begin(Uuid::new_v4(), 5, t1);
        assert_eq!(sm.search_state(), fresh.search_state());
        assert_eq!(sm.saturation_counts(), SaturationCounts::default());

        let mut reference = fresh;
        let o = [marker(5, 0.1, 0.8)];
        assert_eq!(sm.step(t1, &o).command, reference.step(t1, &o).command);
    }
}
