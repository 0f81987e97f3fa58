//! [`ControlLoop`] – the per-task frame loop.
//!
//! Each iteration:
//!
//! 1. **Cancel check** – a set cancel flag ends the task as `Cancelled`
//!    with a zero command and without touching the camera again.
//! 2. **Deadline** – an expired task deadline ends the task as `TimedOut`.
//! 3. **Observe** – capture one frame and run the pose source.  Capture or
//!    detection failures count as "nothing visible".
//! 4. **Decide** – step the [`DockingStateMachine`].
//! 5. **Act** – publish the command.  A sink failure ends the task as
//!    `Failed`.
//!
//! The loop yields to the runtime at every frame boundary, so cancellation
//! latency is at most one capture-plus-compute cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use dockbot_hal::camera::Camera;
use dockbot_hal::velocity::VelocitySink;
use dockbot_perception::pose_source::PoseSource;
use dockbot_types::{
    DockError, DockingFeedback, DockingOutcome, DockingStatus, MarkerObservation,
    VelocityCommand,
};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::state_machine::DockingStateMachine;

/// Where a running task reports its progress.
#[derive(Debug, Clone)]
pub struct TaskReporter {
    pub status: Arc<watch::Sender<DockingStatus>>,
    pub feedback: broadcast::Sender<DockingFeedback>,
}

impl TaskReporter {
    /// A reporter whose receivers are discarded.
    pub fn detached() -> Self {
        let (status, _) = watch::channel(DockingStatus::Idle);
        let (feedback, _) = broadcast::channel(256);
        Self {
            status: Arc::new(status),
            feedback,
        }
    }

    pub(crate) fn report(&self, task_id: Uuid, status: DockingStatus) {
        self.status.send_replace(status);
        // No subscribers is not an error.
        let _ = self.feedback.send(DockingFeedback {
            task_id,
            is_docking: status.is_active(),
            status,
            timestamp: Utc::now(),
        });
    }
}

/// Everything one docking task needs, moved into its tokio task.
pub struct ControlLoop {
    pub machine: DockingStateMachine,
    pub camera: Box<dyn Camera>,
    pub pose_source: Box<dyn PoseSource>,
    pub sink: Arc<dyn VelocitySink>,
    pub cancel: Arc<AtomicBool>,
    pub frame_period: Duration,
    pub feedback_every: u32,
    pub reporter: TaskReporter,
}

impl ControlLoop {
    /// Run the task for `target_marker_id` to its terminal outcome.
    pub async fn run(self, task_id: Uuid, target_marker_id: u32) -> DockingOutcome {
        let span = info_span!("docking_task", %task_id, marker_id = target_marker_id);
        self.run_inner(task_id, target_marker_id).instrument(span).await
    }

    async fn run_inner(mut self, task_id: Uuid, target_marker_id: u32) -> DockingOutcome {
        self.machine.begin(task_id, target_marker_id, Instant::now());
        self.reporter.report(task_id, DockingStatus::Searching);

        let mut ticker = tokio::time::interval(self.frame_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iteration: u64 = 0;
        let mut failure: Option<DockError> = None;

        let status = loop {
            ticker.tick().await;

            if self.cancel.load(Ordering::Acquire) {
                let out = self.machine.cancel();
                self.stop_robot(out.command);
                break out.status;
            }

            let now = Instant::now();
            if let Some(out) = self.machine.check_deadline(now) {
                self.stop_robot(out.command);
                break out.status;
            }

            let observations = self.observe();
            let out = self.machine.step(now, &observations);

            if let Err(e) = self.sink.publish(out.command) {
                error!(error = %e, sink = self.sink.id(), "velocity publish failed; aborting task");
                let failed = self.machine.fail();
                self.stop_robot(failed.command);
                failure = Some(e);
                break failed.status;
            }

            if out.status.is_terminal() {
                break out.status;
            }

            iteration += 1;
            let periodic = self.feedback_every > 0 && iteration % u64::from(self.feedback_every) == 0;
            if out.changed || periodic {
                self.reporter.report(task_id, out.status);
            }
        };

        self.reporter.report(task_id, status);
        info!(
            %status,
            iterations = iteration,
            saturations = ?self.machine.saturation_counts(),
            "docking task finished"
        );

        DockingOutcome {
            task_id: Some(task_id),
            docked: status == DockingStatus::Succeeded,
            status,
            error: failure,
        }
    }

    fn observe(&mut self) -> Vec<MarkerObservation> {
        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, camera = self.camera.id(), "frame capture failed");
                return Vec::new();
            }
        };
        if frame.is_empty() {
            warn!(camera = self.camera.id(), sequence = frame.sequence, "empty frame");
            return Vec::new();
        }
        match self.pose_source.estimate(&frame) {
            Ok(observations) => observations,
            Err(e) => {
                warn!(error = %e, sequence = frame.sequence, "marker pose estimation failed");
                Vec::new()
            }
        }
    }

    /// Best-effort final command.
    fn stop_robot(&self, command: VelocityCommand) {
        if let Err(e) = self.sink.publish(command) {
            warn!(error = %e, "failed to publish stop command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::sync::atomic::AtomicUsize;

    use dockbot_hal::sim::{RecordingVelocitySink, SimCamera};
    use dockbot_perception::pose_source::ScriptedPoseSource;
    use dockbot_perception::sim::{Pose2D, SimWorld};
    use dockbot_types::{AxisGains, DockingConfig, PidGains, Tolerance, Vector3};

    fn marker(id: u32, x: f32, z: f32) -> MarkerObservation {
        MarkerObservation::new(id, Vector3::zero(), Vector3::new(x, 0.0, z))
    }

    struct Rig {
        control: ControlLoop,
        captures: Arc<AtomicUsize>,
        sink: Arc<RecordingVelocitySink>,
        status: watch::Receiver<DockingStatus>,
    }

    fn rig(config: &DockingConfig, source: Box<dyn PoseSource>) -> Rig {
        let camera = SimCamera::new("front");
        let captures = camera.capture_counter();
        let sink = RecordingVelocitySink::new();
        let reporter = TaskReporter::detached();
        let status = reporter.status.subscribe();
        Rig {
            control: ControlLoop {
                machine: DockingStateMachine::new(config),
                camera: Box::new(camera),
                pose_source: source,
                sink: sink.clone(),
                cancel: Arc::new(AtomicBool::new(false)),
                frame_period: Duration::from_millis(1),
                feedback_every: 5,
                reporter,
            },
            captures,
            sink,
            status,
        }
    }

    #[tokio::test]
    async fn aligned_first_frame_succeeds_immediately() {
        let config = DockingConfig {
            tolerance: Tolerance::uniform(0.01),
            ..DockingConfig::default()
        };
        let source = ScriptedPoseSource::repeat(vec![marker(5, 0.0, 0.10)], 10);
        let r = rig(&config, Box::new(source));
        let outcome = r.control.run(Uuid::new_v4(), 5).await;

        assert!(outcome.docked);
        assert_eq!(outcome.status, DockingStatus::Succeeded);
        assert_eq!(r.captures.load(Ordering::SeqCst), 1);
        assert_eq!(r.sink.commands(), vec![VelocityCommand::zero()]);
        assert_eq!(*r.status.borrow(), DockingStatus::Succeeded);
    }

    #[tokio::test]
    async fn cancel_mid_approach_emits_zero_and_stops_capturing() {
        let config = DockingConfig::default();
        let source = ScriptedPoseSource::repeat(vec![marker(5, 0.05, 0.8)], 100_000);
        let r = rig(&config, Box::new(source));
        let cancel = Arc::clone(&r.control.cancel);
        let mut status = r.status.clone();

        let task = tokio::spawn(r.control.run(Uuid::new_v4(), 5));
        status
            .wait_for(|s| *s == DockingStatus::Approaching)
            .await
            .expect("status channel open");

        cancel.store(true, Ordering::Release);
        let captured_at_cancel = r.captures.load(Ordering::SeqCst);
        let outcome = task.await.expect("task must not panic");

        assert_eq!(outcome.status, DockingStatus::Cancelled);
        assert!(!outcome.docked);
        assert_eq!(r.sink.last(), Some(VelocityCommand::zero()));
        assert_eq!(r.captures.load(Ordering::SeqCst), captured_at_cancel);
    }

    #[tokio::test]
    async fn capture_faults_keep_searching_until_deadline() {
        let config = DockingConfig {
            task_timeout_secs: Some(0.05),
            ..DockingConfig::default()
        };
        let r = rig(&config, Box::new(ScriptedPoseSource::default()));
        let camera = SimCamera::new("broken");
        camera.fault_switch().store(true, Ordering::SeqCst);
        let mut control = r.control;
        control.camera = Box::new(camera);

        let outcome = control.run(Uuid::new_v4(), 5).await;
        assert_eq!(outcome.status, DockingStatus::TimedOut);
        assert!(!outcome.docked);

        let cmds = r.sink.commands();
        let (last, scans) = cmds.split_last().expect("at least the stop command");
        assert!(last.is_zero());
        assert!(!scans.is_empty());
        assert!(scans.iter().all(|c| *c == VelocityCommand::turn(-0.5)));
    }

    #[tokio::test]
    async fn sink_failure_fails_the_task() {
        let config = DockingConfig::default();
        let mut r = rig(&config, Box::new(ScriptedPoseSource::default()));
        r.control.sink = RecordingVelocitySink::failing();
        let outcome = r.control.run(Uuid::new_v4(), 5).await;
        assert_eq!(outcome.status, DockingStatus::Failed);
        assert!(!outcome.docked);
        assert!(!outcome.is_setup_failure());
        assert!(matches!(
            outcome.error,
            Some(DockError::HardwareFault { ref details, .. }) if details == "simulated publish failure"
        ));
        assert_eq!(r.captures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn feedback_reports_progress() {
        let config = DockingConfig {
            task_timeout_secs: Some(0.05),
            ..DockingConfig::default()
        };
        let r = rig(&config, Box::new(ScriptedPoseSource::default()));
        let mut feedback = r.control.reporter.feedback.subscribe();
        let outcome = r.control.run(Uuid::new_v4(), 5).await;

        let first = feedback.recv().await.unwrap();
        assert!(first.is_docking);
        assert_eq!(first.status, DockingStatus::Searching);
        let mut last = first;
        while let Ok(f) = feedback.try_recv() {
            last = f;
        }
        assert!(!last.is_docking);
        assert_eq!(last.status, outcome.status);
    }

    fn p_only_config() -> DockingConfig {
        DockingConfig {
            gains: AxisGains {
                angle: PidGains::new(1.0, 0.0, 0.0),
                depth: PidGains::new(3.0, 0.0, 0.0),
                lateral: PidGains::new(3.0, 0.0, 0.0),
            },
            task_timeout_secs: Some(10.0),
            ..DockingConfig::default()
        }
    }

    #[tokio::test]
    async fn simulated_robot_docks_on_marker_ahead() {
        let world = SimWorld::new(Pose2D::default()).with_marker(5, 0.5, -0.03, PI);
        let config = p_only_config();
        let mut r = rig(&config, Box::new(world.pose_source()));
        r.control.sink = Arc::new(world.drive_sink());

        let outcome = r.control.run(Uuid::new_v4(), 5).await;
        assert_eq!(outcome.status, DockingStatus::Succeeded);
        let robot = world.robot();
        assert!((0.5 - robot.x - 0.10).abs() <= 0.011);
        assert!((robot.y + 0.03).abs() <= 0.011);
        assert!(world.command().is_zero());
    }

    #[tokio::test]
    async fn simulated_robot_finds_marker_by_scanning() {
        let bearing = -50f32.to_radians();
        let world = SimWorld::new(Pose2D::default()).with_marker(
            5,
            0.6 * bearing.cos(),
            0.6 * bearing.sin(),
            bearing + PI,
        );
        let config = p_only_config();
        let mut r = rig(&config, Box::new(world.pose_source()));
        r.control.sink = Arc::new(world.drive_sink());
        let cancel = Arc::clone(&r.control.cancel);
        let mut status = r.status.clone();

        let task = tokio::spawn(r.control.run(Uuid::new_v4(), 5));
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| *s == DockingStatus::Approaching),
        )
        .await
        .expect("marker found before timeout")
        .expect("status channel open");
        assert!(world.robot().heading < -0.3);

        cancel.store(true, Ordering::Release);
        let outcome = task.await.unwrap();
        assert_eq!(outcome.status, DockingStatus::Cancelled);
    }
}
