//! CLI configuration – reads/writes `~/.dockbot/config.toml`.
//!
//! ```toml
//! [docking]
//! calibration_path = "/etc/dockbot/calibration.toml"
//! replace_policy = "cancel_and_replace"
//!
//! [docking.tolerance]
//! angle = 0.05
//! depth = 0.01
//! lateral = 0.01
//!
//! [sim]
//! marker_id = 7
//! distance_m = 1.2
//! bearing_deg = -40.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use dockbot_types::DockingConfig;

/// Where the `--sim` marker sits relative to the robot's start pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSettings {
    #[serde(default)]
    pub marker_id: u32,

    /// Straight-line distance from the robot to the marker.
    #[serde(default = "default_distance_m")]
    pub distance_m: f32,

    /// Marker bearing, counter-clockwise from the robot heading.
    #[serde(default = "default_bearing_deg")]
    pub bearing_deg: f32,

    /// How far the marker face is turned away from pointing at the robot.
    #[serde(default)]
    pub facing_offset_deg: f32,
}

fn default_distance_m() -> f32 {
    1.0
}
fn default_bearing_deg() -> f32 {
    -40.0
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            marker_id: 0,
            distance_m: default_distance_m(),
            bearing_deg: default_bearing_deg(),
            facing_offset_deg: 0.0,
        }
    }
}

/// Persisted user configuration stored in `~/.dockbot/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub docking: DockingConfig,

    #[serde(default)]
    pub sim: SimSettings,
}

/// Return the path to `~/.dockbot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".dockbot").join("config.toml")
}

/// Load `path`, or defaults when it does not exist, then apply environment
/// overrides and validate.
pub fn resolve(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg)?;
    cfg.docking
        .validate()
        .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `DOCKBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DOCKBOT_CALIBRATION_PATH` | `docking.calibration_path` |
/// | `DOCKBOT_ROBOT_ID` | `docking.robot_id` |
/// | `DOCKBOT_TASK_TIMEOUT_SECS` | `docking.task_timeout_secs` (`0` or `none` disables) |
/// | `DOCKBOT_REPUBLISH_HZ` | `docking.republish_hz` |
pub fn apply_env_overrides(cfg: &mut Config) -> Result<(), String> {
    if let Ok(v) = std::env::var("DOCKBOT_CALIBRATION_PATH") {
        cfg.docking.calibration_path = v;
    }
    if let Ok(v) = std::env::var("DOCKBOT_ROBOT_ID") {
        let id = v
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("DOCKBOT_ROBOT_ID={v}: {e}"))?;
        cfg.docking.robot_id = Some(id);
    }
    if let Ok(v) = std::env::var("DOCKBOT_TASK_TIMEOUT_SECS") {
        cfg.docking.task_timeout_secs = parse_timeout(&v)?;
    }
    if let Ok(v) = std::env::var("DOCKBOT_REPUBLISH_HZ") {
        cfg.docking.republish_hz = v
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("DOCKBOT_REPUBLISH_HZ={v}: {e}"))?;
    }
    Ok(())
}

fn parse_timeout(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(secs) if secs == 0.0 => Ok(None),
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(secs)),
        Ok(_) => Err(format!("DOCKBOT_TASK_TIMEOUT_SECS={raw}: must be positive")),
        Err(e) => Err(format!("DOCKBOT_TASK_TIMEOUT_SECS={raw}: {e}")),
    }
}

/// Save the config to a specific path, creating its directory if necessary.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

/// Write a default config to `path` unless one exists. Returns `true` when written.
pub fn write_default_if_missing(path: &Path) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    save_to(&Config::default(), path)?;
    Ok(true)
}
