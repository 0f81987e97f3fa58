//! `dockbot-hal` – hardware seams for the docking controller.
//!
//! # Modules
//!
//! - [`camera`] – [`Camera`][camera::Camera]: frame source trait and
//!   [`CameraFrame`][camera::CameraFrame].
//! - [`calibration`] – [`CameraCalibration`][calibration::CameraCalibration]:
//!   intrinsic matrix and distortion coefficients loaded from TOML.
//! - [`velocity`] – [`VelocitySink`][velocity::VelocitySink] and the
//!   [`LatchedVelocity`][velocity::LatchedVelocity] handoff cell used by the
//!   fixed-rate republisher.
//! - [`pid`] – [`PidController`][pid::PidController]: one feedback loop per
//!   controlled axis.
//! - [`sim`] – hardware-free camera and sink stubs for tests and CI.

pub mod calibration;
pub mod camera;
pub mod pid;
pub mod sim;
pub mod velocity;

pub use calibration::CameraCalibration;
pub use camera::{Camera, CameraFrame};
pub use pid::{AxisControllerState, PidController};
pub use velocity::{LatchedVelocity, VelocitySink};
