//! [`DockingRig`] – how a docking task gets its camera and marker detector.
//!
//! The server opens a fresh [`RigSession`] for every accepted task, after
//! loading the calibration.  Either step failing is a setup error: the task
//! ends as `Failed` before any velocity command is produced.

use dockbot_hal::calibration::CameraCalibration;
use dockbot_hal::camera::Camera;
use dockbot_hal::sim::SimCamera;
use dockbot_perception::pose_source::PoseSource;
use dockbot_perception::sim::{SimDriveSink, SimWorld};
use dockbot_types::{DockError, DockingConfig};

/// Camera and detector for one task.
pub struct RigSession {
    pub camera: Box<dyn Camera>,
    pub pose_source: Box<dyn PoseSource>,
}

/// Source of per-task perception hardware.
pub trait DockingRig: Send + Sync {
    /// Load the camera intrinsics. Defaults to the configured calibration file.
    fn load_calibration(&self, config: &DockingConfig) -> Result<CameraCalibration, DockError> {
        CameraCalibration::load(&config.calibration_path)
    }

    /// Open the camera and build the marker pose source.
    fn open(
        &self,
        calibration: &CameraCalibration,
        config: &DockingConfig,
    ) -> Result<RigSession, DockError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Simulation rig
// ────────────────────────────────────────────────────────────────────────────

const SIM_CAMERA_ID: &str = "sim_front";

/// Smallest projected marker edge, in pixels, the simulated detector decodes.
const MIN_MARKER_PIXELS: f32 = 10.0;

/// Rig backed by a [`SimWorld`].
#[derive(Debug, Clone)]
pub struct SimRig {
    world: SimWorld,
    camera_available: bool,
    calibration_from_file: bool,
}

impl SimRig {
    /// A rig on `world` using [`nominal_calibration`][Self::nominal_calibration].
    pub fn new(world: SimWorld) -> Self {
        Self {
            world,
            camera_available: true,
            calibration_from_file: false,
        }
    }

    /// Make every [`open`][DockingRig::open] fail as if the device were unplugged.
    pub fn with_unavailable_camera(mut self) -> Self {
        self.camera_available = false;
        self
    }

    /// Read intrinsics from `calibration_path` like a physical rig does.
    pub fn with_calibration_from_file(mut self) -> Self {
        self.calibration_from_file = true;
        self
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    /// Sink that drives the simulated robot.
    pub fn drive_sink(&self) -> SimDriveSink {
        self.world.drive_sink()
    }

    /// 640×480 pinhole camera, no distortion.
    pub fn nominal_calibration() -> CameraCalibration {
        CameraCalibration {
            camera_matrix: [[615.0, 0.0, 320.0], [0.0, 615.0, 240.0], [0.0, 0.0, 1.0]],
            distortion: vec![0.0; 5],
        }
    }
}

impl DockingRig for SimRig {
    fn load_calibration(&self, config: &DockingConfig) -> Result<CameraCalibration, DockError> {
        if self.calibration_from_file {
            CameraCalibration::load(&config.calibration_path)
        } else {
            Ok(Self::nominal_calibration())
        }
    }

    /// Open the simulated camera.
    ///
    /// The world reports yaw on `config.yaw_axis`, and markers are detected up
    /// to the range at which `config.marker_length_m` still spans
    /// [`MIN_MARKER_PIXELS`] at the calibrated focal length.
    fn open(
        &self,
        calibration: &CameraCalibration,
        config: &DockingConfig,
    ) -> Result<RigSession, DockError> {
        if !self.camera_available {
            return Err(DockError::CameraUnavailable {
                device: SIM_CAMERA_ID.to_string(),
                details: "device not present".to_string(),
            });
        }
        let max_range = calibration.fx() as f32 * config.marker_length_m / MIN_MARKER_PIXELS;
        let world = self
            .world
            .clone()
            .with_yaw_axis(config.yaw_axis)
            .with_max_range(max_range);
        Ok(RigSession {
            camera: Box::new(SimCamera::new(SIM_CAMERA_ID)),
            pose_source: Box::new(world.pose_source()),
        })
    }
}
