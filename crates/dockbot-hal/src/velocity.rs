//! Velocity output seam.
//!
//! The docking loop hands every computed [`VelocityCommand`] to a
//! [`VelocitySink`].  A sink may forward straight to the motor driver, or it
//! may be a [`LatchedVelocity`] cell that a fixed-rate republisher drains on
//! its own clock.

use std::sync::{Arc, Mutex};

use dockbot_types::{DockError, VelocityCommand};

/// Anything that accepts velocity commands for the drive base.
///
/// `publish` takes `&self` so one sink can be shared between the control
/// loop and a republisher running on another task.
pub trait VelocitySink: Send + Sync {
    /// Stable identifier, e.g. `"cmd_vel"`.
    fn id(&self) -> &str;

    /// Apply `command` to the robot.
    ///
    /// # Errors
    ///
    /// Returns [`DockError::HardwareFault`] if the command cannot be
    /// delivered.
    fn publish(&self, command: VelocityCommand) -> Result<(), DockError>;
}

impl<T: VelocitySink + ?Sized> VelocitySink for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn publish(&self, command: VelocityCommand) -> Result<(), DockError> {
        (**self).publish(command)
    }
}

/// Single-slot "latest wins" command cell.
///
/// Writers replace the whole command under the lock, so readers never see a
/// partially updated vector.
#[derive(Debug, Default)]
pub struct LatchedVelocity {
    current: Mutex<VelocityCommand>,
}

impl LatchedVelocity {
    /// Create a cell holding the zero command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latched command.
    pub fn set(&self, command: VelocityCommand) {
        let mut slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *slot = command;
    }

    /// Copy out the most recent command.
    pub fn latest(&self) -> VelocityCommand {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VelocitySink for LatchedVelocity {
    fn id(&self) -> &str {
        "latched_cmd_vel"
    }

    fn publish(&self, command: VelocityCommand) -> Result<(), DockError> {
        self.set(command);
        Ok(())
    }
}
