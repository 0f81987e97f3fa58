//! `dockbot` – marker docking command line interface.
//!
//! 1. Loads `~/.dockbot/config.toml` (or `--config <path>`), writing a
//!    default file on first run, and applies `DOCKBOT_*` overrides.
//! 2. Starts the docking server, on a simulated robot with `--sim`.
//! 3. Drops the user into an **interactive REPL** (`/dock`, `/stop`,
//!    `/status`, `/config`, `/help`, `/quit`).
//! 4. Intercepts **Ctrl-C** to cancel the active task, stop the robot and exit.

mod config;
mod repl;

use clap::Parser;
use colored::Colorize;
use std::f32::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use dockbot_hal::calibration::CameraCalibration;
use dockbot_hal::velocity::{LatchedVelocity, VelocitySink};
use dockbot_perception::sim::{Pose2D, SimWorld};
use dockbot_runtime::rig::{DockingRig, RigSession, SimRig};
use dockbot_runtime::server::DockingServer;
use dockbot_types::{DockError, DockingConfig, DockingStatus};

#[derive(Parser)]
#[command(name = "dockbot")]
#[command(about = "Dock a mobile robot to a fiducial marker")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.dockbot/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drive a simulated robot instead of hardware.
    #[arg(long)]
    sim: bool,
}

fn main() {
    let cli = Cli::parse();
    let _tracing = dockbot_runtime::init_tracing("dockbot");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let path = cli.config.clone().unwrap_or_else(config::config_path);
    if cli.config.is_none() {
        match config::write_default_if_missing(&path) {
            Ok(true) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Ok(false) => {}
            Err(e) => println!("{}: {}", "Error writing default config".red(), e),
        }
    }
    let cfg = match config::resolve(&path) {
        Ok(cfg) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            std::process::exit(2);
        }
    };

    // ── Runtime and server ────────────────────────────────────────────────
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            std::process::exit(1);
        }
    };

    let world = cli.sim.then(|| sim_world(&cfg.sim));
    let (rig, sink): (Arc<dyn DockingRig>, Arc<dyn VelocitySink>) = match &world {
        Some(world) => {
            let rig = SimRig::new(world.clone());
            let sink = Arc::new(rig.drive_sink());
            println!(
                "  Simulation: marker {} at {:.2} m, bearing {:.0}°",
                cfg.sim.marker_id.to_string().bold(),
                cfg.sim.distance_m,
                cfg.sim.bearing_deg
            );
            (Arc::new(rig), sink)
        }
        None => (Arc::new(NoCameraRig), Arc::new(LatchedVelocity::new())),
    };

    let server = {
        let _guard = runtime.enter();
        match DockingServer::new(cfg.docking.clone(), rig, sink) {
            Ok(server) => Arc::new(server),
            Err(e) => {
                println!("{}: {}", "Server error".red(), e);
                std::process::exit(2);
            }
        }
    };
    runtime.spawn(report_progress(Arc::clone(&server)));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let server_ctrlc = Arc::clone(&server);
    let handle_ctrlc = runtime.handle().clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());
        handle_ctrlc.block_on(server_ctrlc.shutdown());
        println!("{}", "  ✓ Docking cancelled, zero velocity sent.".green());
        shutdown_clone.store(true, Ordering::SeqCst);
        std::process::exit(130);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will not stop the robot");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    let session = repl::Session {
        server,
        runtime: runtime.handle().clone(),
        config: cfg,
        world,
    };
    repl::run(&session, shutdown);
    runtime.block_on(session.server.shutdown());
}

// ─────────────────────────────────────────────────────────────────────────────
// Rigs
// ─────────────────────────────────────────────────────────────────────────────

/// Place the robot at the origin and the marker as described by `sim`.
fn sim_world(sim: &config::SimSettings) -> SimWorld {
    let bearing = sim.bearing_deg.to_radians();
    let (x, y) = (sim.distance_m * bearing.cos(), sim.distance_m * bearing.sin());
    let facing = bearing + PI + sim.facing_offset_deg.to_radians();
    SimWorld::new(Pose2D::default()).with_marker(sim.marker_id, x, y, facing)
}

/// Rig used without `--sim`: calibration is checked, but no camera driver is
/// built into this binary.
struct NoCameraRig;

impl DockingRig for NoCameraRig {
    fn open(
        &self,
        _calibration: &CameraCalibration,
        _config: &DockingConfig,
    ) -> Result<RigSession, DockError> {
        Err(DockError::CameraUnavailable {
            device: "camera".to_string(),
            details: "no camera driver is built into dockbot; run with --sim".to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress
// ─────────────────────────────────────────────────────────────────────────────

/// Print status transitions of whatever task is running.
async fn report_progress(server: Arc<DockingServer>) {
    let mut status = server.watch_status();
    let mut last = *status.borrow();
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        if current == last {
            continue;
        }
        last = current;
        if current != DockingStatus::Idle {
            println!("\n  {} {}", "⟳".cyan(), repl::status_label(current));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"     _            _    _           _   "#.bold().cyan());
    println!("{}", r#"  __| | ___   ___| | _| |__   ___ | |_ "#.bold().cyan());
    println!("{}", r#" / _` |/ _ \ / __| |/ / '_ \ / _ \| __|"#.bold().cyan());
    println!("{}", r#"| (_| | (_) | (__|   <| |_) | (_) | |_ "#.bold().cyan());
    println!("{}", r#" \__,_|\___/ \___|_|\_\_.__/ \___/ \__|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "dockbot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Fiducial marker docking controller");
    println!();
}
