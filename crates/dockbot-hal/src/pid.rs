//! Per-axis PID (Proportional–Integral–Derivative) controller.
//!
//! The docking controller runs one instance per controlled axis (yaw angle,
//! depth, lateral offset).  Each call is one control step: the caller passes
//! the signed error for that axis and receives the clamped output.
//!
//! The discrete form is
//!
//! ```text
//! output = kp * e + ki * Σ(previous errors) + kd * (e - previous_error)
//! ```
//!
//! after which `e` is added to the integral.  The derivative term is zero on
//! the first step after a reset.  There is no anti-windup: only the final
//! output is saturated to `±output_limit`.
//!
//! # Example
//!
//! ```rust
//! use dockbot_hal::pid::PidController;
//! use dockbot_types::PidGains;
//!
//! let mut pid = PidController::new(PidGains::new(0.5, 0.0, 0.0), 1.0);
//! assert!((pid.update(0.4) - 0.2).abs() < 1e-6);
//! assert_eq!(pid.update(10.0), 1.0); // saturated
//! assert_eq!(pid.saturation_count(), 1);
//! ```

use dockbot_types::PidGains;

/// Memory carried between steps of one axis loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisControllerState {
    /// Sum of every error seen since the last reset.
    pub integral: f32,
    /// Error from the previous step; `None` right after a reset.
    pub previous_error: Option<f32>,
}

/// A tunable PID loop with symmetric output saturation.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    output_limit: f32,
    state: AxisControllerState,
    saturations: u64,
}

impl PidController {
    /// Create a controller whose output is clamped to `±output_limit`.
    pub fn new(gains: PidGains, output_limit: f32) -> Self {
        Self {
            gains,
            output_limit: output_limit.abs(),
            state: AxisControllerState::default(),
            saturations: 0,
        }
    }

    pub fn output_limit(&self) -> f32 {
        self.output_limit
    }

    /// Run one step without saturation and advance the internal state.
    fn step_unclamped(&mut self, error: f32) -> f32 {
        let p = self.gains.kp * error;
        let i = self.gains.ki * self.state.integral;
        let d = match self.state.previous_error {
            Some(prev) => self.gains.kd * (error - prev),
            None => 0.0,
        };

        self.state.integral += error;
        self.state.previous_error = Some(error);

        p + i + d
    }

    /// Run one step and return the output saturated to `±output_limit`.
    ///
    /// Saturated steps are counted; see [`saturation_count`][Self::saturation_count].
    pub fn update(&mut self, error: f32) -> f32 {
        let raw = self.step_unclamped(error);
        let clamped = raw.clamp(-self.output_limit, self.output_limit);
        if clamped != raw {
            self.saturations += 1;
            tracing::debug!(raw, clamped, "pid output saturated");
        }
        clamped
    }

    /// Number of steps whose output hit the limit since construction or the
    /// last reset.
    pub fn saturation_count(&self) -> u64 {
        self.saturations
    }

    pub fn state(&self) -> AxisControllerState {
        self.state
    }

    /// Reset internal state (integral accumulator, derivative memory and the
    /// saturation counter).
    pub fn reset(&mut self) {
        self.state = AxisControllerState::default();
        self.saturations = 0;
    }
}
