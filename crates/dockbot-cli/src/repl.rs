//! REPL – the dockbot interactive shell.
//!
//! Supported slash-commands:
//!   /dock <marker-id> [robot-id] – start docking to a marker
//!   /stop                        – cancel the active docking task
//!   /status                      – show task status (and the sim robot pose)
//!   /config                      – print the effective configuration
//!   /help                        – show this list
//!   /quit | /exit                – stop the robot and exit

use colored::{ColoredString, Colorize};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dockbot_perception::sim::SimWorld;
use dockbot_runtime::server::{DockingServer, Submission};
use dockbot_types::{DockingOutcome, DockingRequest, DockingStatus};
use tokio::runtime::Handle;

use crate::config::Config;

/// A parsed slash-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dock {
        marker_id: u32,
        robot_id: Option<u32>,
    },
    Stop,
    Status,
    Config,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".to_string());
        };
        let args: Vec<&str> = words.collect();
        let no_args = |cmd: Command| {
            if args.is_empty() {
                Ok(cmd)
            } else {
                Err(format!("{head} takes no arguments"))
            }
        };
        match head {
            "/dock" => {
                let (marker, robot) = match args.as_slice() {
                    [marker] => (marker, None),
                    [marker, robot] => (marker, Some(robot)),
                    _ => return Err("usage: /dock <marker-id> [robot-id]".to_string()),
                };
                let marker_id: u32 = marker
                    .parse()
                    .map_err(|_| format!("'{marker}' is not a marker id"))?;
                let robot_id: Option<u32> = robot
                    .map(|r| r.parse().map_err(|_| format!("'{r}' is not a robot id")))
                    .transpose()?;
                Ok(Command::Dock {
                    marker_id,
                    robot_id,
                })
            }
            "/stop" => no_args(Command::Stop),
            "/status" => no_args(Command::Status),
            "/config" => no_args(Command::Config),
            "/help" => no_args(Command::Help),
            "/quit" | "/exit" => no_args(Command::Quit),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

/// Everything the shell needs to drive the docking server.
pub struct Session {
    pub server: Arc<DockingServer>,
    pub runtime: Handle,
    pub config: Config,
    pub world: Option<SimWorld>,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(session: &Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "dockbot>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Ok(Command::Dock {
                marker_id,
                robot_id,
            }) => cmd_dock(session, marker_id, robot_id),
            Ok(Command::Stop) => cmd_stop(session),
            Ok(Command::Status) => cmd_status(session),
            Ok(Command::Config) => cmd_config(&session.config),
            Ok(Command::Help) => cmd_help(),
            Ok(Command::Quit) => {
                session.runtime.block_on(session.server.shutdown());
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => {
                println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    e.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "dockbot Commands".bold().underline());
    println!("  {}  – dock to a marker", "/dock <marker-id> [robot-id]".bold().cyan());
    println!("  {}                         – cancel the active task", "/stop".bold().cyan());
    println!("  {}                       – task status", "/status".bold().cyan());
    println!("  {}                       – effective configuration", "/config".bold().cyan());
    println!("  {}                 – stop and exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_dock(session: &Session, marker_id: u32, robot_id: Option<u32>) {
    let mut request = DockingRequest::start(marker_id);
    if let Some(id) = robot_id {
        request = request.for_robot(id);
    }
    match session.runtime.block_on(session.server.submit(request)) {
        Ok(Submission::Started(handle)) => println!(
            "  {} docking to marker {} (task {})",
            "▶".green(),
            marker_id.to_string().bold(),
            handle.task_id().to_string().dimmed()
        ),
        Ok(Submission::Finished(outcome)) => print_outcome(&outcome),
        Err(e) => println!("  {} {}", "✗".red(), e),
    }
}

fn cmd_stop(session: &Session) {
    match session
        .runtime
        .block_on(session.server.submit(DockingRequest::stop()))
    {
        Ok(Submission::Finished(outcome)) if outcome.task_id.is_none() => {
            println!("  {}", "No docking task is running.".dimmed());
        }
        Ok(Submission::Finished(outcome)) => print_outcome(&outcome),
        Ok(Submission::Started(_)) => {}
        Err(e) => println!("  {} {}", "✗".red(), e),
    }
}

fn cmd_status(session: &Session) {
    println!("{}", "Docking Status".bold().underline());
    println!("  Status : {}", status_label(session.server.status()));
    match session.runtime.block_on(session.server.current_task()) {
        Some(task) => println!(
            "  Task   : {} → marker {}",
            task.task_id().to_string().dimmed(),
            task.target_marker_id().to_string().bold()
        ),
        None => println!("  Task   : {}", "none".dimmed()),
    }
    if let Some(world) = &session.world {
        let pose = world.robot();
        println!(
            "  Robot  : x={:.3} m  y={:.3} m  heading={:.1}°",
            pose.x,
            pose.y,
            pose.heading.to_degrees()
        );
    }
}

fn cmd_config(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(raw) => {
            println!("{}", "Effective Configuration".bold().underline());
            for line in raw.lines() {
                println!("  {}", line);
            }
        }
        Err(e) => println!("{}: {}", "Error rendering config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn status_label(status: DockingStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        DockingStatus::Succeeded => text.green().bold(),
        DockingStatus::Searching | DockingStatus::Approaching => text.cyan(),
        DockingStatus::Cancelled | DockingStatus::Idle => text.yellow(),
        DockingStatus::TimedOut | DockingStatus::Failed => text.red().bold(),
    }
}

fn print_outcome(outcome: &DockingOutcome) {
    let mark = if outcome.docked { "✓".green() } else { "•".yellow() };
    print!("  {} {}", mark, status_label(outcome.status));
    if let Some(err) = &outcome.error {
        let stage = if err.is_setup_error() { "setup" } else { "runtime" };
        print!(" – {} error: {}", stage, err.to_string().red());
    }
    println!();
}
