//! [`DockingServer`] – the task interface.
//!
//! Accepts [`DockingRequest`]s, owns the single active docking task and
//! reports its progress.
//!
//! | Request | Server state | Result |
//! |---|---|---|
//! | any, other robot's id | any | ignored: `Idle`, `docked = false` |
//! | start | idle | task spawned → [`Submission::Started`] |
//! | start | task active, [`ReplacePolicy::Reject`] | `Err(DockError::Busy)` |
//! | start | task active, [`ReplacePolicy::CancelAndReplace`] | active task cancelled, new one spawned |
//! | start | setup fails | [`Submission::Finished`] with status `Failed` and a setup error |
//! | stop | task active | task cancelled, its outcome returned |
//! | stop | idle | `Idle`, `docked = false` |
//!
//! A task that dies without an outcome (it panicked) is reported as `Failed`
//! with a [`DockError::Channel`] error after a zero command is published.
//!
//! Commands go to the velocity sink directly, or through a fixed-rate
//! [`Republisher`] when `republish_hz` is non-zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dockbot_hal::velocity::VelocitySink;
use dockbot_types::{
    DockError, DockingConfig, DockingFeedback, DockingOutcome, DockingRequest, DockingStatus,
    ReplacePolicy, VelocityCommand,
};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::control_loop::{ControlLoop, TaskReporter};
use crate::republisher::Republisher;
use crate::rig::DockingRig;
use crate::state_machine::DockingStateMachine;

const FEEDBACK_CAPACITY: usize = 256;

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

/// Client-side view of one spawned docking task.
#[derive(Debug, Clone)]
pub struct DockingHandle {
    task_id: Uuid,
    target_marker_id: u32,
    cancel: Arc<AtomicBool>,
    status: watch::Receiver<DockingStatus>,
    outcome: watch::Receiver<Option<DockingOutcome>>,
}

impl DockingHandle {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn target_marker_id(&self) -> u32 {
        self.target_marker_id
    }

    /// Latest status of this task.
    pub fn status(&self) -> DockingStatus {
        match &*self.outcome.borrow() {
            Some(outcome) => outcome.status,
            None => *self.status.borrow(),
        }
    }

    pub fn is_docking(&self) -> bool {
        self.status().is_active()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Ask the task to stop. Takes effect at the next frame boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(&self) -> DockingOutcome {
        let mut rx = self.outcome.clone();
        match rx.wait_for(Option::is_some).await.map(|o| (*o).clone()) {
            Ok(Some(outcome)) => outcome,
            _ => DockingOutcome::failed(
                Some(self.task_id),
                DockError::Channel("docking task ended without an outcome".to_string()),
            ),
        }
    }
}

/// What a [`DockingServer::submit`] call did.
#[derive(Debug, Clone)]
pub enum Submission {
    /// A task is now running.
    Started(DockingHandle),
    /// No task is running as a result of this request.
    Finished(DockingOutcome),
}

// ────────────────────────────────────────────────────────────────────────────
// Server
// ────────────────────────────────────────────────────────────────────────────

/// Owns the single active docking task.
pub struct DockingServer {
    config: DockingConfig,
    rig: Arc<dyn DockingRig>,
    sink: Arc<dyn VelocitySink>,
    republisher: Mutex<Option<Republisher>>,
    active: Mutex<Option<DockingHandle>>,
    status: Arc<watch::Sender<DockingStatus>>,
    feedback: broadcast::Sender<DockingFeedback>,
}

impl DockingServer {
    /// Build a server publishing to `sink`.
    ///
    /// When `config.republish_hz` is non-zero a [`Republisher`] is started,
    /// so this must then be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DockError::InvalidConfig`] when `config` does not validate.
    pub fn new(
        config: DockingConfig,
        rig: Arc<dyn DockingRig>,
        sink: Arc<dyn VelocitySink>,
    ) -> Result<Self, DockError> {
        config.validate()?;
        let (republisher, sink) = if config.republish_hz > 0 {
            let republisher = Republisher::spawn(sink, config.republish_hz)?;
            let latch: Arc<dyn VelocitySink> = republisher.latch();
            (Some(republisher), latch)
        } else {
            (None, sink)
        };
        let (status, _) = watch::channel(DockingStatus::Idle);
        let (feedback, _) = broadcast::channel(FEEDBACK_CAPACITY);
        Ok(Self {
            config,
            rig,
            sink,
            republisher: Mutex::new(republisher),
            active: Mutex::new(None),
            status: Arc::new(status),
            feedback,
        })
    }

    pub fn config(&self) -> &DockingConfig {
        &self.config
    }

    pub fn subscribe_feedback(&self) -> broadcast::Receiver<DockingFeedback> {
        self.feedback.subscribe()
    }

    /// Status of the current or most recent task; `Idle` after a stop.
    pub fn watch_status(&self) -> watch::Receiver<DockingStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> DockingStatus {
        *self.status.borrow()
    }

    /// The running task, if any.
    pub async fn current_task(&self) -> Option<DockingHandle> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|h| !h.is_finished())
            .cloned()
    }

    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Returns [`DockError::Busy`] for a start request while a task is active
    /// under [`ReplacePolicy::Reject`].
    pub async fn submit(&self, request: DockingRequest) -> Result<Submission, DockError> {
        if let (Some(own), Some(addressed)) = (self.config.robot_id, request.robot_id)
            && own != addressed
        {
            debug!(own, addressed, "request addressed to another robot; ignoring");
            return Ok(Submission::Finished(DockingOutcome::not_started(
                DockingStatus::Idle,
            )));
        }

        let mut active = self.active.lock().await;
        let running = active.take().filter(|h| !h.is_finished());

        if !request.start {
            let outcome = match running {
                Some(handle) => {
                    info!(task_id = %handle.task_id, "stop requested");
                    handle.cancel();
                    handle.outcome().await
                }
                None => DockingOutcome::not_started(DockingStatus::Idle),
            };
            self.status.send_replace(DockingStatus::Idle);
            return Ok(Submission::Finished(outcome));
        }

        if let Some(handle) = running {
            match self.config.replace_policy {
                ReplacePolicy::Reject => {
                    let active_marker_id = handle.target_marker_id;
                    *active = Some(handle);
                    return Err(DockError::Busy { active_marker_id });
                }
                ReplacePolicy::CancelAndReplace => {
                    info!(
                        task_id = %handle.task_id,
                        new_marker_id = request.target_marker_id,
                        "replacing active docking task"
                    );
                    handle.cancel();
                    handle.outcome().await;
                }
            }
        }

        match self.spawn_task(request.target_marker_id) {
            Ok(handle) => {
                *active = Some(handle.clone());
                Ok(Submission::Started(handle))
            }
            Err(e) => {
                error!(error = %e, marker_id = request.target_marker_id, "docking setup failed");
                self.status.send_replace(DockingStatus::Failed);
                Ok(Submission::Finished(DockingOutcome::failed(None, e)))
            }
        }
    }

    /// Cancel whatever is running and stop republishing.
    ///
    /// Intended as the last call on a server.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.active.lock().await.take() {
            handle.cancel();
            handle.outcome().await;
        }
        if let Some(republisher) = self.republisher.lock().await.take() {
            republisher.shutdown().await;
        }
        info!("docking server stopped");
    }

    fn spawn_task(&self, target_marker_id: u32) -> Result<DockingHandle, DockError> {
        let calibration = self.rig.load_calibration(&self.config)?;
        let session = self.rig.open(&calibration, &self.config)?;

        let task_id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let reporter = TaskReporter {
            status: Arc::clone(&self.status),
            feedback: self.feedback.clone(),
        };
        let sink = Arc::clone(&self.sink);
        let control = ControlLoop {
            machine: DockingStateMachine::new(&self.config),
            camera: session.camera,
            pose_source: session.pose_source,
            sink: Arc::clone(&sink),
            cancel: Arc::clone(&cancel),
            frame_period: self.config.frame_period(),
            feedback_every: self.config.feedback_every,
            reporter: reporter.clone(),
        };

        // Searching is visible before the first frame.
        self.status.send_replace(DockingStatus::Searching);
        let task = tokio::spawn(control.run(task_id, target_marker_id));
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%task_id, error = %e, "docking task died; stopping the robot");
                    if let Err(e) = sink.publish(VelocityCommand::zero()) {
                        warn!(error = %e, "failed to publish stop command");
                    }
                    reporter.report(task_id, DockingStatus::Failed);
                    DockingOutcome::failed(
                        Some(task_id),
                        DockError::Channel(format!("docking task died: {e}")),
                    )
                }
            };
            outcome_tx.send_replace(Some(outcome));
        });

        Ok(DockingHandle {
            task_id,
            target_marker_id,
            cancel,
            status: self.status.subscribe(),
            outcome: outcome_rx,
        })
    }
}
