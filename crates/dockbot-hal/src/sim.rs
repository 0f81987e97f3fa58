//! In-process stand-ins for CI/CD testing without physical hardware.
//!
//! [`SimCamera`] returns blank frames and counts how many were captured;
//! [`RecordingVelocitySink`] keeps every command it is handed so tests can
//! assert on the exact sequence the control loop produced.
//!
//! # Example
//!
//! ```rust
//! use dockbot_hal::camera::Camera;
//! use dockbot_hal::sim::{RecordingVelocitySink, SimCamera};
//! use dockbot_hal::velocity::VelocitySink;
//! use dockbot_types::VelocityCommand;
//!
//! let mut camera = SimCamera::new("front");
//! let captures = camera.capture_counter();
//! camera.capture().expect("sim capture must succeed");
//! assert_eq!(captures.load(std::sync::atomic::Ordering::SeqCst), 1);
//!
//! let sink = RecordingVelocitySink::new();
//! sink.publish(VelocityCommand::turn(0.5)).unwrap();
//! assert_eq!(sink.commands().len(), 1);
//! ```

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dockbot_types::{DockError, VelocityCommand};

use crate::camera::{Camera, CameraFrame};
use crate::velocity::VelocitySink;

// ────────────────────────────────────────────────────────────────────────────
// Stub camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera that returns a blank 4×4 greyscale frame.
pub struct SimCamera {
    id: String,
    captures: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl SimCamera {
    /// Create a new simulated camera with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            captures: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared counter of successful and failed capture attempts.
    pub fn capture_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.captures)
    }

    /// Switch that makes subsequent captures fail while set.
    pub fn fault_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail)
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, DockError> {
        let sequence = self.captures.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(DockError::HardwareFault {
                component: self.id.clone(),
                details: "simulated capture failure".to_string(),
            });
        }
        Ok(CameraFrame {
            width: 4,
            height: 4,
            sequence,
            data: vec![0u8; 16],
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording sink
// ────────────────────────────────────────────────────────────────────────────

/// A velocity sink that records every command in order.
#[derive(Default)]
pub struct RecordingVelocitySink {
    commands: Mutex<Vec<VelocityCommand>>,
    fail: AtomicBool,
}

impl RecordingVelocitySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A sink that rejects every publish.
    pub fn failing() -> Arc<Self> {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    /// Every command received so far, oldest first.
    pub fn commands(&self) -> Vec<VelocityCommand> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<VelocityCommand> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .copied()
    }
}

impl VelocitySink for RecordingVelocitySink {
    fn id(&self) -> &str {
        "sim_cmd_vel"
    }

    fn publish(&self, command: VelocityCommand) -> Result<(), DockError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DockError::HardwareFault {
                component: "sim_cmd_vel".to_string(),
                details: "simulated publish failure".to_string(),
            });
        }
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command);
        Ok(())
    }
}
