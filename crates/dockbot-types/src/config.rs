//! Tunable docking parameters.
//!
//! [`DockingConfig`] is loaded once per process and handed to the runtime.
//! Every field has a serde default so partial TOML files are accepted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DockError, Vector3};

/// Longest accepted search window or task deadline: one week.
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/// Desired final pose of the marker relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPose {
    /// Metres, camera frame. `z` is the stand-off distance.
    pub position: Vector3,
    /// Radians.
    pub orientation: Vector3,
}

impl Default for TargetPose {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.10),
            orientation: Vector3::zero(),
        }
    }
}

/// Per-axis error magnitude still considered aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub angle: f32,
    pub depth: f32,
    pub lateral: f32,
}

impl Tolerance {
    pub fn uniform(v: f32) -> Self {
        Self {
            angle: v,
            depth: v,
            lateral: v,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            angle: 0.05,
            depth: 0.01,
            lateral: 0.01,
        }
    }
}

/// Proportional, integral and derivative gains for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisGains {
    pub angle: PidGains,
    pub depth: PidGains,
    pub lateral: PidGains,
}

impl Default for AxisGains {
    fn default() -> Self {
        Self {
            angle: PidGains::new(0.001, 0.1, 0.1),
            depth: PidGains::new(0.3, 0.1, 0.1),
            lateral: PidGains::new(0.3, 0.1, 0.1),
        }
    }
}

/// Maximum output magnitude per axis (rad/s for angle, m/s otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    pub angle: f32,
    pub depth: f32,
    pub lateral: f32,
}

impl Default for AxisLimits {
    fn default() -> Self {
        Self {
            angle: 0.10,
            depth: 0.07,
            lateral: 0.07,
        }
    }
}

/// Direction of an in-place scan rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Left,
    #[default]
    Right,
}

impl TurnDirection {
    pub fn flipped(self) -> Self {
        match self {
            TurnDirection::Left => TurnDirection::Right,
            TurnDirection::Right => TurnDirection::Left,
        }
    }

    /// Sign applied to the turn speed: left is counter-clockwise (positive).
    pub fn sign(self) -> f32 {
        match self {
            TurnDirection::Left => 1.0,
            TurnDirection::Right => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_turn_speed")]
    pub turn_speed: f32,
    /// Length of the first sweep of a task.
    #[serde(default = "default_first_window")]
    pub first_window_secs: f64,
    /// Length of every later sweep.
    #[serde(default = "default_subsequent_window")]
    pub subsequent_window_secs: f64,
    #[serde(default)]
    pub initial_direction: TurnDirection,
}

impl SearchConfig {
    pub fn first_window(&self) -> Duration {
        secs(self.first_window_secs)
    }

    pub fn subsequent_window(&self) -> Duration {
        secs(self.subsequent_window_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            turn_speed: default_turn_speed(),
            first_window_secs: default_first_window(),
            subsequent_window_secs: default_subsequent_window(),
            initial_direction: TurnDirection::default(),
        }
    }
}

fn default_turn_speed() -> f32 {
    0.5
}
fn default_first_window() -> f64 {
    3.0
}
fn default_subsequent_window() -> f64 {
    6.0
}

/// Which rotation-vector component carries the yaw measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationAxis {
    #[default]
    X,
    Y,
    Z,
}

/// What to do with a start request that arrives while a task is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// Refuse the new request with [`DockError::Busy`].
    #[default]
    Reject,
    /// Drive the running task to `Cancelled`, then start the new one.
    CancelAndReplace,
}

/// Full docking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingConfig {
    #[serde(default)]
    pub target_pose: TargetPose,
    #[serde(default)]
    pub tolerance: Tolerance,
    #[serde(default)]
    pub gains: AxisGains,
    #[serde(default)]
    pub max_speed: AxisLimits,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub yaw_axis: RotationAxis,
    /// Physical marker edge length, used by the pose source for scale.
    #[serde(default = "default_marker_length")]
    pub marker_length_m: f32,
    /// Overall task deadline. `None` lets a task search forever; written as
    /// `0` or `"none"` in a config file.
    #[serde(default = "default_task_timeout", with = "timeout_secs")]
    pub task_timeout_secs: Option<f64>,
    #[serde(default = "default_frame_period_ms")]
    pub frame_period_ms: u64,
    /// Rate of the velocity republisher. `0` publishes straight to the sink.
    #[serde(default = "default_republish_hz")]
    pub republish_hz: u32,
    /// Emit a feedback message every this many loop iterations.
    #[serde(default = "default_feedback_every")]
    pub feedback_every: u32,
    #[serde(default = "default_calibration_path")]
    pub calibration_path: String,
    /// Identity of this robot. Requests addressed elsewhere are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_id: Option<u32>,
    #[serde(default)]
    pub replace_policy: ReplacePolicy,
}

fn default_marker_length() -> f32 {
    0.048
}
fn default_task_timeout() -> Option<f64> {
    Some(120.0)
}
mod timeout_secs {
    use serde::de::{self, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Off,
        Secs(f64),
        Word(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(secs) => s.serialize_f64(*secs),
            None => s.serialize_str("none"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Off => Ok(None),
            Raw::Secs(secs) if secs == 0.0 => Ok(None),
            Raw::Secs(secs) => Ok(Some(secs)),
            Raw::Word(word) if word.trim().eq_ignore_ascii_case("none") => Ok(None),
            Raw::Word(word) => Err(de::Error::invalid_value(
                Unexpected::Str(&word),
                &"a number of seconds, 0 or \"none\"",
            )),
        }
    }
}

fn default_frame_period_ms() -> u64 {
    33
}
fn default_republish_hz() -> u32 {
    100
}
fn default_feedback_every() -> u32 {
    10
}
fn default_calibration_path() -> String {
    "calibration.toml".to_string()
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            target_pose: TargetPose::default(),
            tolerance: Tolerance::default(),
            gains: AxisGains::default(),
            max_speed: AxisLimits::default(),
            search: SearchConfig::default(),
            yaw_axis: RotationAxis::default(),
            marker_length_m: default_marker_length(),
            task_timeout_secs: default_task_timeout(),
            frame_period_ms: default_frame_period_ms(),
            republish_hz: default_republish_hz(),
            feedback_every: default_feedback_every(),
            calibration_path: default_calibration_path(),
            robot_id: None,
            replace_policy: ReplacePolicy::default(),
        }
    }
}

impl DockingConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(secs)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms)
    }

    /// Check every value against its domain.
    ///
    /// # Errors
    ///
    /// Returns [`DockError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), DockError> {
        let non_negative = [
            ("tolerance.angle", self.tolerance.angle),
            ("tolerance.depth", self.tolerance.depth),
            ("tolerance.lateral", self.tolerance.lateral),
            ("max_speed.angle", self.max_speed.angle),
            ("max_speed.depth", self.max_speed.depth),
            ("max_speed.lateral", self.max_speed.lateral),
            ("search.turn_speed", self.search.turn_speed),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(DockError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        check_duration("search.first_window_secs", self.search.first_window_secs)?;
        check_duration(
            "search.subsequent_window_secs",
            self.search.subsequent_window_secs,
        )?;
        if !self.marker_length_m.is_finite() || self.marker_length_m <= 0.0 {
            return Err(DockError::InvalidConfig(format!(
                "marker_length_m must be positive, got {}",
                self.marker_length_m
            )));
        }
        if let Some(t) = self.task_timeout_secs {
            check_duration("task_timeout_secs", t)?;
        }
        if self.frame_period_ms == 0 {
            return Err(DockError::InvalidConfig(
                "frame_period_ms must be at least 1".to_string(),
            ));
        }
        if !self.target_pose.position.is_finite() || !self.target_pose.orientation.is_finite() {
            return Err(DockError::InvalidConfig(
                "target_pose must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_duration(name: &str, value: f64) -> Result<(), DockError> {
    if !value.is_finite() || value <= 0.0 || value > MAX_DURATION_SECS {
        return Err(DockError::InvalidConfig(format!(
            "{name} must be positive and at most {MAX_DURATION_SECS} s, got {value}"
        )));
    }
    Ok(())
}
