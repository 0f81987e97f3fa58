//! [`Republisher`] – fixed-rate velocity republishing.
//!
//! Many base controllers stop the robot when no command arrives for a short
//! while.  The docking loop only produces a command per camera frame, so the
//! republisher latches the latest one and forwards it downstream at a fixed
//! rate from its own tokio task.

use std::sync::Arc;
use std::time::Duration;

use dockbot_hal::velocity::{LatchedVelocity, VelocitySink};
use dockbot_types::{DockError, VelocityCommand};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Handle to a running republishing task. The task stops when this is dropped.
pub struct Republisher {
    latch: Arc<LatchedVelocity>,
    downstream: Arc<dyn VelocitySink>,
    handle: Option<JoinHandle<()>>,
}

impl Republisher {
    /// Start forwarding the latched command to `downstream` at `hz`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DockError::InvalidConfig`] when `hz` is zero.
    pub fn spawn(downstream: Arc<dyn VelocitySink>, hz: u32) -> Result<Self, DockError> {
        if hz == 0 {
            return Err(DockError::InvalidConfig(
                "republish rate must be greater than zero".to_string(),
            ));
        }
        let latch = Arc::new(LatchedVelocity::new());
        let period = Duration::from_secs_f64(1.0 / f64::from(hz));
        let handle = tokio::spawn(forward(Arc::clone(&latch), Arc::clone(&downstream), period));
        debug!(hz, sink = downstream.id(), "velocity republisher started");
        Ok(Self {
            latch,
            downstream,
            handle: Some(handle),
        })
    }

    /// The sink the control loop should publish into.
    pub fn latch(&self) -> Arc<LatchedVelocity> {
        Arc::clone(&self.latch)
    }

    /// Stop the task and send a final zero command downstream.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.latch.set(VelocityCommand::zero());
        if let Err(e) = self.downstream.publish(VelocityCommand::zero()) {
            warn!(error = %e, "final zero command could not be delivered");
        }
    }
}

impl Drop for Republisher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn forward(latch: Arc<LatchedVelocity>, downstream: Arc<dyn VelocitySink>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failing = false;
    loop {
        ticker.tick().await;
        match downstream.publish(latch.latest()) {
            Ok(()) if failing => {
                info!(sink = downstream.id(), "velocity republishing recovered");
                failing = false;
            }
            Ok(()) => {}
            // Log once per failure run; the loop keeps trying at full rate.
            Err(e) if !failing => {
                warn!(error = %e, sink = downstream.id(), "velocity republish failed");
                failing = true;
            }
            Err(_) => {}
        }
    }
}
