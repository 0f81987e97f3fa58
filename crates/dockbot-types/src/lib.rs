//! Shared data model for the dockbot docking stack.
//!
//! Every other crate in the workspace speaks in these types: marker
//! observations coming out of perception, velocity commands going into the
//! HAL, and the request/feedback/result messages exchanged with a docking
//! client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod config;

pub use config::{
    AxisGains, AxisLimits, DockingConfig, PidGains, ReplacePolicy, RotationAxis, SearchConfig,
    TargetPose, Tolerance, TurnDirection,
};

/// A plain 3-component vector (metres, radians, or their rates).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Return the component selected by `axis`.
    pub fn component(&self, axis: RotationAxis) -> f32 {
        match axis {
            RotationAxis::X => self.x,
            RotationAxis::Y => self.y,
            RotationAxis::Z => self.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Twist-style velocity command (m/s and rad/s, robot frame).
///
/// `linear.x` drives forward, `linear.y` strafes left and `angular.z` turns
/// counter-clockwise (left), following the usual `cmd_vel` convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl VelocityCommand {
    /// The all-zero command: stop every axis.
    pub const fn zero() -> Self {
        Self {
            linear: Vector3::zero(),
            angular: Vector3::zero(),
        }
    }

    /// Pure in-place rotation at `angular_z` rad/s.
    pub const fn turn(angular_z: f32) -> Self {
        Self {
            linear: Vector3::zero(),
            angular: Vector3::new(0.0, 0.0, angular_z),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

/// One marker found in a camera frame.
///
/// `rotation` is the marker's rotation vector and `translation` its position
/// in the camera frame (x right, y down, z forward), both as reported by the
/// pose source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub marker_id: u32,
    pub rotation: Vector3,
    pub translation: Vector3,
}

impl MarkerObservation {
    pub fn new(marker_id: u32, rotation: Vector3, translation: Vector3) -> Self {
        Self {
            marker_id,
            rotation,
            translation,
        }
    }
}

/// A docking request as received from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockingRequest {
    /// `true` to start docking, `false` to cancel whatever is running.
    pub start: bool,
    /// Identity of the marker to dock against.
    pub target_marker_id: u32,
    /// Robot the request is addressed to. `None` addresses any robot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_id: Option<u32>,
}

impl DockingRequest {
    /// A start request for `target_marker_id`, addressed to any robot.
    pub fn start(target_marker_id: u32) -> Self {
        Self {
            start: true,
            target_marker_id,
            robot_id: None,
        }
    }

    /// A stop request.
    pub fn stop() -> Self {
        Self {
            start: false,
            target_marker_id: 0,
            robot_id: None,
        }
    }

    /// Address the request to a specific robot.
    pub fn for_robot(mut self, robot_id: u32) -> Self {
        self.robot_id = Some(robot_id);
        self
    }
}

/// Progress of a docking task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockingStatus {
    #[default]
    Idle,
    Searching,
    Approaching,
    Succeeded,
    Cancelled,
    /// The task deadline elapsed before the robot was aligned.
    TimedOut,
    /// Setup failed or the velocity sink faulted.
    Failed,
}

impl DockingStatus {
    /// `true` while the control loop is driving the robot.
    pub fn is_active(self) -> bool {
        matches!(self, DockingStatus::Searching | DockingStatus::Approaching)
    }

    /// `true` once a task has reached an outcome.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DockingStatus::Succeeded
                | DockingStatus::Cancelled
                | DockingStatus::TimedOut
                | DockingStatus::Failed
        )
    }
}

impl std::fmt::Display for DockingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DockingStatus::Idle => "idle",
            DockingStatus::Searching => "searching",
            DockingStatus::Approaching => "approaching",
            DockingStatus::Succeeded => "succeeded",
            DockingStatus::Cancelled => "cancelled",
            DockingStatus::TimedOut => "timed_out",
            DockingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of the single docking task the state machine owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockingTaskState {
    pub task_id: Uuid,
    pub status: DockingStatus,
    pub target_marker_id: u32,
}

/// Periodic progress report sent to the requesting client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockingFeedback {
    pub task_id: Uuid,
    pub is_docking: bool,
    pub status: DockingStatus,
    pub timestamp: DateTime<Utc>,
}

/// Terminal result of a docking request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingOutcome {
    /// `None` when the request never started a task (ignored or stop request).
    pub task_id: Option<Uuid>,
    pub docked: bool,
    pub status: DockingStatus,
    /// Why a `Failed` task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DockError>,
}

impl DockingOutcome {
    /// Outcome for a request that did not start any task.
    pub fn not_started(status: DockingStatus) -> Self {
        Self {
            task_id: None,
            docked: false,
            status,
            error: None,
        }
    }

    /// Outcome of a task that ended with `error`.
    pub fn failed(task_id: Option<Uuid>, error: DockError) -> Self {
        Self {
            task_id,
            docked: false,
            status: DockingStatus::Failed,
            error: Some(error),
        }
    }

    /// `true` when the task never got as far as moving the robot.
    pub fn is_setup_failure(&self) -> bool {
        self.error.as_ref().is_some_and(DockError::is_setup_error)
    }
}

/// Error type shared by every dockbot crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DockError {
    #[error("Camera {device} unavailable: {details}")]
    CameraUnavailable { device: String, details: String },

    #[error("Calibration Error: {0}")]
    Calibration(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Docking busy: task for marker {active_marker_id} is still active")]
    Busy { active_marker_id: u32 },

    #[error("Invalid Configuration: {0}")]
    InvalidConfig(String),

    #[error("Task Channel Error: {0}")]
    Channel(String),
}

impl DockError {
    /// `true` for failures that abort a task before any motion happens.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            DockError::CameraUnavailable { .. } | DockError::Calibration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_command_zero_is_zero() {
        assert!(VelocityCommand::zero().is_zero());
        assert!(!VelocityCommand::turn(0.5).is_zero());
        assert_eq!(VelocityCommand::default(), VelocityCommand::zero());
    }

    #[test]
    fn turn_only_sets_angular_z() {
        let cmd = VelocityCommand::turn(-0.5);
        assert_eq!(cmd.linear, Vector3::zero());
        assert_eq!(cmd.angular, Vector3::new(0.0, 0.0, -0.5));
    }

    #[test]
    fn vector_component_selects_axis() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(v.component(RotationAxis::X), 1.0);
        assert_eq!(v.component(RotationAxis::Y), 2.0);
        assert_eq!(v.component(RotationAxis::Z), 3.0);
    }

    #[test]
    fn docking_request_json_omits_missing_robot_id() {
        let json = serde_json::to_string(&DockingRequest::start(5)).unwrap();
        assert!(!json.contains("robot_id"));
        let back: DockingRequest =
            serde_json::from_str(r#"{"start":true,"target_marker_id":5}"#).unwrap();
        assert_eq!(back, DockingRequest::start(5));
    }

    #[test]
    fn docking_request_for_robot() {
        let req = DockingRequest::start(7).for_robot(1);
        assert!(req.start);
        assert_eq!(req.target_marker_id, 7);
        assert_eq!(req.robot_id, Some(1));
        assert!(!DockingRequest::stop().start);
    }

    #[test]
    fn status_classification() {
        assert!(DockingStatus::Searching.is_active());
        assert!(DockingStatus::Approaching.is_active());
        assert!(!DockingStatus::Idle.is_active());
        assert!(!DockingStatus::Idle.is_terminal());
        for s in [
            DockingStatus::Succeeded,
            DockingStatus::Cancelled,
            DockingStatus::TimedOut,
            DockingStatus::Failed,
        ] {
            assert!(s.is_terminal());
            assert!(!s.is_active());
        }
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DockingStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
        assert_eq!(DockingStatus::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn setup_errors_are_classified() {
        let cam = DockError::CameraUnavailable {
            device: "front".to_string(),
            details: "no such device".to_string(),
        };
        assert!(cam.is_setup_error());
        assert!(DockError::Calibration("missing K".to_string()).is_setup_error());
        assert!(!DockError::Busy { active_marker_id: 3 }.is_setup_error());
        assert!(cam.to_string().contains("front"));
    }

    #[test]
    fn outcome_distinguishes_setup_failures() {
        let setup = DockingOutcome::failed(None, DockError::Calibration("missing K".to_string()));
        assert!(setup.is_setup_failure());
        assert_eq!(setup.status, DockingStatus::Failed);

        let runtime = DockingOutcome::failed(
            Some(Uuid::new_v4()),
            DockError::HardwareFault {
                component: "cmd_vel".to_string(),
                details: "bus off".to_string(),
            },
        );
        assert!(!runtime.is_setup_failure());
        assert!(!DockingOutcome::not_started(DockingStatus::Idle).is_setup_failure());

        let json = serde_json::to_string(&setup).unwrap();
        let back: DockingOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, setup);
    }
}
