//! The marker pose seam.
//!
//! A [`PoseSource`] wraps whatever fiducial detector the robot carries.  For
//! each frame it reports every marker it found together with the marker's
//! rotation vector and translation in the camera frame.  An empty list is a
//! normal result meaning "nothing visible".

use std::collections::VecDeque;

use dockbot_hal::camera::CameraFrame;
use dockbot_types::{DockError, MarkerObservation, RotationAxis};

/// Detector plus pose estimator for fiducial markers.
pub trait PoseSource: Send {
    /// Detect markers in `frame` and estimate their poses.
    ///
    /// # Errors
    ///
    /// Implementations may return [`DockError::HardwareFault`] when the frame
    /// cannot be processed.  Callers treat this like an empty frame.
    fn estimate(&mut self, frame: &CameraFrame) -> Result<Vec<MarkerObservation>, DockError>;
}

/// Pick the observation whose id equals `target_marker_id`.
///
/// Other markers are ignored regardless of where they sit in the list.
pub fn select_target(
    observations: &[MarkerObservation],
    target_marker_id: u32,
) -> Option<&MarkerObservation> {
    observations
        .iter()
        .find(|obs| obs.marker_id == target_marker_id)
}

/// Yaw measurement of `observation`, read from the configured rotation axis.
pub fn observed_yaw(observation: &MarkerObservation, axis: RotationAxis) -> f32 {
    observation.rotation.component(axis)
}

/// Replays a fixed list of per-frame detections.
///
/// Once the script is exhausted every further frame reports no markers.
#[derive(Debug, Default)]
pub struct ScriptedPoseSource {
    frames: VecDeque<Vec<MarkerObservation>>,
}

impl ScriptedPoseSource {
    pub fn new(frames: impl IntoIterator<Item = Vec<MarkerObservation>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// A source that reports the same detections `times` times in a row.
    pub fn repeat(observations: Vec<MarkerObservation>, times: usize) -> Self {
        Self::new(std::iter::repeat_n(observations, times))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl PoseSource for ScriptedPoseSource {
    fn estimate(&mut self, _frame: &CameraFrame) -> Result<Vec<MarkerObservation>, DockError> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}
