//! Planar kinematic simulation of a holonomic robot and fiducial markers.
//!
//! [`SimWorld`] is shared between a [`SimPoseSource`] and a
//! [`SimDriveSink`]: the sink latches the most recent velocity command and
//! every call to [`PoseSource::estimate`] first integrates that command over
//! one fixed simulation step, then reports the markers the camera can see.
//!
//! The camera sits at the robot centre looking along the robot heading.
//! Observed translations use the camera convention (x right, y down,
//! z forward).  The relative yaw between the robot heading and the marker's
//! approach direction is written into the configured rotation component.
//!
//! # Example
//!
//! ```rust
//! use dockbot_perception::sim::{Pose2D, SimWorld};
//!
//! let world = SimWorld::new(Pose2D::default()).with_marker(5, 1.0, 0.0, std::f32::consts::PI);
//! let seen = world.observe();
//! assert_eq!(seen.len(), 1);
//! assert!((seen[0].translation.z - 1.0).abs() < 1e-6);
//! ```

use std::f32::consts::{PI, TAU};
use std::sync::{Arc, Mutex, MutexGuard};

use dockbot_hal::camera::CameraFrame;
use dockbot_hal::velocity::VelocitySink;
use dockbot_types::{DockError, MarkerObservation, RotationAxis, VelocityCommand, Vector3};

use crate::pose_source::PoseSource;

/// Robot pose in the world plane: metres and radians (counter-clockwise).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

impl Pose2D {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }
}

/// A marker fixed in the world. `facing` is the direction its face points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimMarker {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub facing: f32,
}

#[derive(Debug)]
struct WorldState {
    robot: Pose2D,
    markers: Vec<SimMarker>,
    command: VelocityCommand,
    step_secs: f32,
    half_fov: f32,
    max_range: f32,
    yaw_axis: RotationAxis,
}

/// Shared handle to the simulated world. Clones share the same state.
#[derive(Debug, Clone)]
pub struct SimWorld {
    inner: Arc<Mutex<WorldState>>,
}

impl SimWorld {
    /// A world with the robot at `robot` and no markers.
    ///
    /// Defaults: 33 ms simulation step, 60° horizontal field of view, 3 m
    /// detection range, yaw reported on the X rotation component.
    pub fn new(robot: Pose2D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WorldState {
                robot,
                markers: Vec::new(),
                command: VelocityCommand::zero(),
                step_secs: 0.033,
                half_fov: 30f32.to_radians(),
                max_range: 3.0,
                yaw_axis: RotationAxis::X,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_marker(self, id: u32, x: f32, y: f32, facing: f32) -> Self {
        self.state().markers.push(SimMarker { id, x, y, facing });
        self
    }

    pub fn with_step(self, step_secs: f32) -> Self {
        self.state().step_secs = step_secs;
        self
    }

    /// Farthest distance at which a marker is still detected.
    pub fn with_max_range(self, metres: f32) -> Self {
        self.state().max_range = metres;
        self
    }

    pub fn with_yaw_axis(self, axis: RotationAxis) -> Self {
        self.state().yaw_axis = axis;
        self
    }

    pub fn robot(&self) -> Pose2D {
        self.state().robot
    }

    /// Most recent command received by the drive sink.
    pub fn command(&self) -> VelocityCommand {
        self.state().command
    }

    /// Integrate the latched command over one simulation step.
    pub fn step(&self) {
        let mut s = self.state();
        let dt = s.step_secs;
        let cmd = s.command;
        let (sin, cos) = s.robot.heading.sin_cos();
        s.robot.x += (cmd.linear.x * cos - cmd.linear.y * sin) * dt;
        s.robot.y += (cmd.linear.x * sin + cmd.linear.y * cos) * dt;
        s.robot.heading = wrap_angle(s.robot.heading + cmd.angular.z * dt);
    }

    /// Markers currently inside the camera's field of view and range.
    pub fn observe(&self) -> Vec<MarkerObservation> {
        let s = self.state();
        let (sin, cos) = s.robot.heading.sin_cos();
        s.markers
            .iter()
            .filter_map(|m| {
                let dx = m.x - s.robot.x;
                let dy = m.y - s.robot.y;
                let forward = dx * cos + dy * sin;
                let left = -dx * sin + dy * cos;
                let range = forward.hypot(left);
                if forward <= 0.0 || range > s.max_range || left.atan2(forward).abs() > s.half_fov {
                    return None;
                }
                // Zero when the robot looks straight into the marker face.
                let yaw = wrap_angle(s.robot.heading - (m.facing + PI));
                let mut rotation = Vector3::zero();
                match s.yaw_axis {
                    RotationAxis::X => rotation.x = yaw,
                    RotationAxis::Y => rotation.y = yaw,
                    RotationAxis::Z => rotation.z = yaw,
                }
                Some(MarkerObservation::new(
                    m.id,
                    rotation,
                    Vector3::new(-left, 0.0, forward),
                ))
            })
            .collect()
    }

    /// Pose source view of this world.
    pub fn pose_source(&self) -> SimPoseSource {
        SimPoseSource {
            world: self.clone(),
        }
    }

    /// Velocity sink view of this world.
    pub fn drive_sink(&self) -> SimDriveSink {
        SimDriveSink {
            world: self.clone(),
        }
    }
}

/// Wrap an angle into `(-π, π]`.
fn wrap_angle(a: f32) -> f32 {
    let mut a = a % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Pose source backed by a [`SimWorld`]. Advances the world one step per frame.
pub struct SimPoseSource {
    world: SimWorld,
}

impl PoseSource for SimPoseSource {
    fn estimate(&mut self, _frame: &CameraFrame) -> Result<Vec<MarkerObservation>, DockError> {
        self.world.step();
        let seen = self.world.observe();
        tracing::trace!(robot = ?self.world.robot(), visible = seen.len(), "sim frame");
        Ok(seen)
    }
}

/// Velocity sink that drives the simulated robot.
pub struct SimDriveSink {
    world: SimWorld,
}

impl VelocitySink for SimDriveSink {
    fn id(&self) -> &str {
        "sim_drive"
    }

    fn publish(&self, command: VelocityCommand) -> Result<(), DockError> {
        self.world.state().command = command;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn marker_straight_ahead_is_centered() {
        let world = SimWorld::new(Pose2D::default()).with_marker(5, 0.5, 0.0, PI);
        let seen = world.observe();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].marker_id, 5);
        assert!(seen[0].translation.x.abs() < 1e-6);
        assert!((seen[0].translation.z - 0.5).abs() < 1e-6);
        assert!(seen[0].rotation.x.abs() < 1e-6);
    }

    #[test]
    fn marker_to_the_right_has_positive_camera_x() {
        let world = SimWorld::new(Pose2D::default()).with_marker(1, 1.0, -0.2, PI);
        let seen = world.observe();
        assert!(seen[0].translation.x > 0.19);
    }

    #[test]
    fn marker_outside_fov_or_behind_is_hidden() {
        let world = SimWorld::new(Pose2D::default())
            .with_marker(1, -1.0, 0.0, 0.0)
            .with_marker(2, 0.2, 1.0, -FRAC_PI_2)
            .with_marker(3, 5.0, 0.0, PI);
        assert!(world.observe().is_empty());
    }

    #[test]
    fn max_range_limits_detection() {
        let world = SimWorld::new(Pose2D::default()).with_marker(1, 1.5, 0.0, PI);
        assert_eq!(world.observe().len(), 1);
        let world = world.with_max_range(1.0);
        assert!(world.observe().is_empty());
    }

    #[test]
    fn drive_sink_moves_robot_forward() {
        let world = SimWorld::new(Pose2D::default()).with_step(0.1);
        let sink = world.drive_sink();
        let mut cmd = VelocityCommand::zero();
        cmd.linear.x = 1.0;
        sink.publish(cmd).unwrap();
        world.step();
        assert!((world.robot().x - 0.1).abs() < 1e-6);
        assert!(world.robot().y.abs() < 1e-6);
    }

    #[test]
    fn turning_right_changes_heading_and_relative_yaw() {
        let world = SimWorld::new(Pose2D::default())
            .with_marker(1, 1.0, 0.0, PI)
            .with_step(0.1);
        world.drive_sink().publish(VelocityCommand::turn(-1.0)).unwrap();
        world.step();
        assert!((world.robot().heading + 0.1).abs() < 1e-6);
        let seen = world.observe();
        assert!((seen[0].rotation.x + 0.1).abs() < 1e-5);
        // Marker drifts to the left of the image when turning right.
        assert!(seen[0].translation.x < 0.0);
    }

    #[test]
    fn yaw_axis_is_configurable() {
        let world = SimWorld::new(Pose2D::new(0.0, 0.0, 0.2))
            .with_marker(1, 1.0, 0.0, PI)
            .with_yaw_axis(RotationAxis::Z);
        let seen = world.observe();
        assert_eq!(seen[0].rotation.x, 0.0);
        assert!((seen[0].rotation.z - 0.2).abs() < 1e-6);
    }

    #[test]
    fn pose_source_steps_world() {
        let world = SimWorld::new(Pose2D::default())
            .with_marker(1, 1.0, 0.0, PI)
            .with_step(0.5);
        let mut cmd = VelocityCommand::zero();
        cmd.linear.x = 0.2;
        world.drive_sink().publish(cmd).unwrap();
        let mut src = world.pose_source();
        let frame = CameraFrame {
            width: 1,
            height: 1,
            sequence: 1,
            data: vec![0],
        };
        let seen = src.estimate(&frame).unwrap();
        assert!((seen[0].translation.z - 0.9).abs() < 1e-5);
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        assert!((wrap_angle(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-5);
        assert!((wrap_angle(-3.0 * PI / 2.0) - FRAC_PI_2).abs() < 1e-5);
        assert!((wrap_angle(0.3) - 0.3).abs() < 1e-6);
    }
}
