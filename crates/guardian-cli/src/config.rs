//! Guardian configuration – reads/writes `~/.guardian/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use guardian_perception::{Quaternion, Transform3D, TfEngine, Vec3};
use guardian_types::GuardianConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A fixed sensor mount: pose of `child` expressed in `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StaticTransformConfig {
    pub parent: String,
    pub child: String,
    /// Metres, `[x, y, z]`.
    #[serde(default)]
    pub translation: [f32; 3],
    /// Unit quaternion, `[w, x, y, z]`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
}

impl StaticTransformConfig {
    pub fn to_transform(&self) -> Transform3D {
        let [x, y, z] = self.translation;
        let [qw, qx, qy, qz] = self.rotation;
        Transform3D::new(
            Vec3::new(x, y, z),
            Quaternion::new(qw, qx, qy, qz).normalized(),
        )
    }
}

/// Persisted configuration stored in `~/.guardian/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Frame every point is evaluated in.
    #[serde(default = "default_vehicle_frame")]
    pub vehicle_frame_id: String,

    /// Display name for the warning stream in operator output.  Signals are
    /// always routed on the bus's collision-warning topic; this value does
    /// not select a channel.
    #[serde(default = "default_warning_topic")]
    pub collision_warning_topic: String,

    /// Collision monitor period (seconds).
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: f64,

    /// Geometric and temporal thresholds.
    #[serde(default)]
    pub guardian: GuardianConfig,

    /// Sensor mounts loaded into the transform tree at startup.
    #[serde(default)]
    pub static_transforms: Vec<StaticTransformConfig>,
}

fn default_vehicle_frame() -> String {
    "novatel".to_string()
}
fn default_warning_topic() -> String {
    "/guardian/collision_warning".to_string()
}
fn default_monitor_interval() -> f64 {
    0.1
}
fn identity_rotation() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vehicle_frame_id: default_vehicle_frame(),
            collision_warning_topic: default_warning_topic(),
            monitor_interval_secs: default_monitor_interval(),
            guardian: GuardianConfig::default(),
            static_transforms: vec![StaticTransformConfig {
                parent: default_vehicle_frame(),
                child: "velodyne128".to_string(),
                translation: [0.0, 1.2, 1.8],
                rotation: identity_rotation(),
            }],
        }
    }
}

impl Config {
    /// Startup validation.  Any error here is fatal.
    pub fn validate(&self) -> Result<(), String> {
        if self.vehicle_frame_id.trim().is_empty() {
            return Err("vehicle_frame_id must not be empty".to_string());
        }
        if !self.monitor_interval_secs.is_finite() || self.monitor_interval_secs <= 0.0 {
            return Err(format!(
                "monitor_interval_secs must be positive, got {}",
                self.monitor_interval_secs
            ));
        }
        for t in &self.static_transforms {
            if t.parent.is_empty() || t.child.is_empty() || t.parent == t.child {
                return Err(format!(
                    "static transform {:?} -> {:?} needs two distinct frame names",
                    t.parent, t.child
                ));
            }
            if t.translation.iter().chain(t.rotation.iter()).any(|v| !v.is_finite()) {
                return Err(format!(
                    "static transform {} -> {} has non-finite values",
                    t.parent, t.child
                ));
            }
        }
        self.guardian.validate().map_err(|e| e.to_string())
    }

    /// Transform tree holding every configured sensor mount.
    pub fn transform_tree(&self) -> TfEngine {
        let mut tf = TfEngine::new();
        for t in &self.static_transforms {
            tf.set_static_transform(&t.parent, &t.child, t.to_transform());
        }
        tf
    }

    pub fn monitor_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.monitor_interval_secs)
    }
}

/// Return the path to `~/.guardian/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".guardian").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
///
/// Environment overrides are applied on top of the file contents.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `GUARDIAN_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GUARDIAN_VEHICLE_FRAME` | `vehicle_frame_id` |
/// | `GUARDIAN_MONITOR_INTERVAL` | `monitor_interval_secs` |
/// | `GUARDIAN_MIN_POINTS` | `guardian.min_points_in_roi_to_trigger` |
/// | `GUARDIAN_MIN_FRAMES` | `guardian.min_consecutive_frames_to_trigger` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("GUARDIAN_VEHICLE_FRAME") {
        cfg.vehicle_frame_id = v;
    }
    if let Ok(v) = std::env::var("GUARDIAN_MONITOR_INTERVAL")
        && let Ok(secs) = v.parse::<f64>()
    {
        cfg.monitor_interval_secs = secs;
    }
    if let Ok(v) = std::env::var("GUARDIAN_MIN_POINTS")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.guardian.min_points_in_roi_to_trigger = n;
    }
    if let Ok(v) = std::env::var("GUARDIAN_MIN_FRAMES")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.guardian.min_consecutive_frames_to_trigger = n;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

/// JSON Schema of the config file, pretty-printed.
pub fn schema_json() -> Result<String, String> {
    let schema = schemars::schema_for!(Config);
    serde_json::to_string_pretty(&schema).map_err(|e| format!("Failed to render schema: {}", e))
}
