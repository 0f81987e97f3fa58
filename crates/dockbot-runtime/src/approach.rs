//! [`ApproachController`] – drives the robot onto the docking pose while the
//! target marker is in view.
//!
//! Three independent PID loops run on the marker pose errors:
//!
//! | Axis | Error | Command |
//! |---|---|---|
//! | angle | observed yaw − target yaw | `angular.z = −output` |
//! | depth | marker z − target z | `linear.x = |output|` (always toward the marker) |
//! | lateral | marker x − target x | `linear.y = −output` (camera x right, robot y left) |
//!
//! Completion is a pure function of the observation, the target pose and the
//! tolerance band; see [`is_aligned`].

use dockbot_hal::pid::PidController;
use dockbot_perception::pose_source::observed_yaw;
use dockbot_types::{
    DockingConfig, MarkerObservation, RotationAxis, TargetPose, Tolerance, VelocityCommand,
};

/// Signed per-axis pose error for one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisErrors {
    pub angle: f32,
    pub depth: f32,
    pub lateral: f32,
}

impl AxisErrors {
    pub fn compute(observation: &MarkerObservation, target: &TargetPose, yaw_axis: RotationAxis) -> Self {
        Self {
            angle: observed_yaw(observation, yaw_axis) - target.orientation.component(yaw_axis),
            depth: observation.translation.z - target.position.z,
            lateral: observation.translation.x - target.position.x,
        }
    }

    /// `true` when every axis error lies inside its tolerance band.
    pub fn within(&self, tolerance: &Tolerance) -> bool {
        self.angle.abs() <= tolerance.angle
            && self.depth.abs() <= tolerance.depth
            && self.lateral.abs() <= tolerance.lateral
    }
}

/// Docking completion predicate.
pub fn is_aligned(
    observation: &MarkerObservation,
    target: &TargetPose,
    tolerance: &Tolerance,
    yaw_axis: RotationAxis,
) -> bool {
    AxisErrors::compute(observation, target, yaw_axis).within(tolerance)
}

/// How often each axis output hit its speed limit during the current task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaturationCounts {
    pub angle: u64,
    pub depth: u64,
    pub lateral: u64,
}

/// Per-axis PID approach controller. Owns the loop state for one task.
#[derive(Debug, Clone)]
pub struct ApproachController {
    angle: PidController,
    depth: PidController,
    lateral: PidController,
    target: TargetPose,
    tolerance: Tolerance,
    yaw_axis: RotationAxis,
}

impl ApproachController {
    pub fn new(config: &DockingConfig) -> Self {
        Self {
            angle: PidController::new(config.gains.angle, config.max_speed.angle),
            depth: PidController::new(config.gains.depth, config.max_speed.depth),
            lateral: PidController::new(config.gains.lateral, config.max_speed.lateral),
            target: config.target_pose,
            tolerance: config.tolerance,
            yaw_axis: config.yaw_axis,
        }
    }

    /// Clear every axis loop. Must run before the first [`compute`][Self::compute] of a task.
    pub fn reset(&mut self) {
        self.angle.reset();
        self.depth.reset();
        self.lateral.reset();
    }

    pub fn errors(&self, observation: &MarkerObservation) -> AxisErrors {
        AxisErrors::compute(observation, &self.target, self.yaw_axis)
    }

    pub fn is_aligned(&self, observation: &MarkerObservation) -> bool {
        is_aligned(observation, &self.target, &self.tolerance, self.yaw_axis)
    }

    /// Advance all three loops on `observation` and build the command.
    pub fn compute(&mut self, observation: &MarkerObservation) -> VelocityCommand {
        let errors = self.errors(observation);
        let angle = self.angle.update(errors.angle);
        let depth = self.depth.update(errors.depth).abs();
        let lateral = self.lateral.update(errors.lateral);

        let mut command = VelocityCommand::zero();
        command.angular.z = -angle;
        command.linear.x = depth;
        command.linear.y = -lateral;
        tracing::trace!(?errors, ?command, "approach step");
        command
    }

    pub fn saturation_counts(&self) -> SaturationCounts {
        SaturationCounts {
            angle: self.angle.saturation_count(),
            depth: self.depth.saturation_count(),
            lateral: self.lateral.saturation_count(),
        }
    }
}
