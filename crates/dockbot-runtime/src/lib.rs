//! `dockbot-runtime` – the docking engine.
//!
//! Turns a stream of camera frames into velocity commands that park the
//! robot in front of a fiducial marker.
//!
//! # Modules
//!
//! - [`search`] – [`SearchStrategy`][search::SearchStrategy]: the in-place
//!   scan used while the target marker is out of view.  Alternates direction
//!   with a short first window and longer later windows.
//! - [`approach`] – [`ApproachController`][approach::ApproachController]:
//!   three PID loops (angle, depth, lateral) on the marker pose error, plus
//!   the pure [`is_aligned`][approach::is_aligned] completion predicate.
//! - [`state_machine`] – [`DockingStateMachine`][state_machine::DockingStateMachine]:
//!   `Idle → Searching ⇄ Approaching → Succeeded`, with cancellation,
//!   timeouts and failures as the other terminal states.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: the
//!   async per-task frame loop (capture, detect, decide, publish).
//! - [`rig`] – [`DockingRig`][rig::DockingRig]: opens the camera and marker
//!   detector for each task.  [`SimRig`][rig::SimRig] runs against a
//!   kinematic simulation.
//! - [`republisher`] – [`Republisher`][republisher::Republisher]: repeats the
//!   latest command at a fixed rate for base controllers with a command
//!   watchdog.
//! - [`server`] – [`DockingServer`][server::DockingServer]: the task
//!   interface.  One active task at a time, explicit replace policy, stop
//!   requests, feedback stream.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.

pub mod approach;
pub mod control_loop;
pub mod republisher;
pub mod rig;
pub mod search;
pub mod server;
pub mod state_machine;
pub mod telemetry;

pub use approach::{ApproachController, AxisErrors, SaturationCounts, is_aligned};
pub use control_loop::{ControlLoop, TaskReporter};
pub use republisher::Republisher;
pub use rig::{DockingRig, RigSession, SimRig};
pub use search::{SearchState, SearchStrategy};
pub use server::{DockingHandle, DockingServer, Submission};
pub use state_machine::{DockingStateMachine, StepOutcome};
pub use telemetry::{TracerProviderGuard, init_tracing};
