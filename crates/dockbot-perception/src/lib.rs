//! `dockbot-perception` – turns camera frames into marker poses.
//!
//! The marker detector itself is an external library; this crate defines the
//! seam it plugs into and the small amount of geometry the controller needs.
//!
//! # Modules
//!
//! - [`pose_source`] – [`PoseSource`][pose_source::PoseSource] trait,
//!   exact-id target selection, and a scripted source for tests.
//! - [`sim`] – [`SimWorld`][sim::SimWorld]: a planar kinematic world with
//!   fiducial markers that reacts to the velocity commands it receives.

pub mod pose_source;
pub mod sim;

pub use pose_source::{PoseSource, ScriptedPoseSource, select_target};
pub use sim::{Pose2D, SimWorld};
