use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single sensor return.  Coordinates are in whatever frame the owning
/// [`PointCloudFrame`] declares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True when every coordinate is a real number (no NaN, no infinity).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One discrete point-cloud capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudFrame {
    /// Coordinate frame the points are expressed in (e.g. `"velodyne128"`).
    pub frame_id: String,
    /// Capture time in seconds since the Unix epoch.
    pub timestamp_sec: f64,
    pub points: Vec<Point3>,
}

/// Per-frame verdict published by the guardian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionSignal {
    /// Time the frame was processed, in seconds since the Unix epoch.
    pub timestamp_sec: f64,
    pub is_collision: bool,
}

/// Extents of an axis-aligned box around the vehicle origin, in metres.
///
/// `backward` is configured as a positive distance behind the origin; it is
/// applied as a negative bound on the forward (+y) axis.  `side` is the
/// half-width, compared against `|x|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoxExtents {
    pub forward: f32,
    pub backward: f32,
    pub side: f32,
}

impl BoxExtents {
    pub fn new(forward: f32, backward: f32, side: f32) -> Self {
        Self {
            forward,
            backward,
            side,
        }
    }

    fn validate(&self, name: &str) -> Result<(), GuardianError> {
        for (field, value) in [
            ("forward", self.forward),
            ("backward", self.backward),
            ("side", self.side),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GuardianError::ConfigurationInvalid(format!(
                    "{name}.{field} must be a non-negative distance, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Tuning for the frame risk evaluator and the consensus tracker.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GuardianConfig {
    /// The vehicle's own body.  Points inside are never a risk.
    #[serde(default = "default_ego_box")]
    pub ego_box: BoxExtents,
    /// The protective region considered dangerous if intruded upon.
    #[serde(default = "default_roi")]
    pub roi: BoxExtents,
    /// Points below this height are treated as ground clutter (metres).
    #[serde(default = "default_height_min")]
    pub height_min: f32,
    /// Points above this height are treated as overhangs (metres).
    #[serde(default = "default_height_max")]
    pub height_max: f32,
    /// Qualifying points needed in one frame to call it a frame risk.
    #[serde(default = "default_min_points")]
    pub min_points_in_roi_to_trigger: u32,
    /// Consecutive frame risks needed before declaring a collision.
    #[serde(default = "default_min_frames")]
    pub min_consecutive_frames_to_trigger: u32,
}

fn default_ego_box() -> BoxExtents {
    BoxExtents::new(2.0, 2.0, 1.0)
}
fn default_roi() -> BoxExtents {
    BoxExtents::new(10.0, 2.0, 3.0)
}
fn default_height_min() -> f32 {
    0.1
}
fn default_height_max() -> f32 {
    2.5
}
fn default_min_points() -> u32 {
    5
}
fn default_min_frames() -> u32 {
    3
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            ego_box: default_ego_box(),
            roi: default_roi(),
            height_min: default_height_min(),
            height_max: default_height_max(),
            min_points_in_roi_to_trigger: default_min_points(),
            min_consecutive_frames_to_trigger: default_min_frames(),
        }
    }
}

impl GuardianConfig {
    /// Reject configurations that would make the filters meaningless.
    ///
    /// Must be called before the first frame is processed; a failure here is
    /// fatal to startup.
    pub fn validate(&self) -> Result<(), GuardianError> {
        self.ego_box.validate("ego_box")?;
        self.roi.validate("roi")?;

        if !self.height_min.is_finite() || !self.height_max.is_finite() {
            return Err(GuardianError::ConfigurationInvalid(
                "height band bounds must be finite".to_string(),
            ));
        }
        if self.height_min >= self.height_max {
            return Err(GuardianError::ConfigurationInvalid(format!(
                "height_min ({}) must be below height_max ({})",
                self.height_min, self.height_max
            )));
        }
        if self.ego_box.side >= self.roi.side {
            return Err(GuardianError::ConfigurationInvalid(format!(
                "ego_box.side ({}) must be strictly inside roi.side ({})",
                self.ego_box.side, self.roi.side
            )));
        }
        if self.min_points_in_roi_to_trigger == 0 {
            return Err(GuardianError::ConfigurationInvalid(
                "min_points_in_roi_to_trigger must be at least 1".to_string(),
            ));
        }
        if self.min_consecutive_frames_to_trigger == 0 {
            return Err(GuardianError::ConfigurationInvalid(
                "min_consecutive_frames_to_trigger must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "guardian-runtime::collision_guardian"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh event stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A raw sensor capture.  Shared so fan-out does not copy the points.
    PointCloud(Arc<PointCloudFrame>),
    CollisionWarning(CollisionSignal),
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 * 1e-6
}

/// Global error type spanning transform lookups, configuration and transport.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GuardianError {
    #[error("Transform Unavailable: {source_frame} -> {target_frame} at t={timestamp:.3}")]
    TransformUnavailable {
        timestamp: f64,
        target_frame: String,
        source_frame: String,
    },

    #[error("Invalid Configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Publish Failure: {0}")]
    PublishFailure(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Safety status lock poisoned")]
    StatusPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GuardianConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_point_threshold_is_rejected() {
        let cfg = GuardianConfig {
            min_points_in_roi_to_trigger: 0,
            ..GuardianConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, GuardianError::ConfigurationInvalid(_)));
        assert!(err.to_string().contains("min_points_in_roi_to_trigger"));
    }

    #[test]
    fn zero_frame_threshold_is_rejected() {
        let cfg = GuardianConfig {
            min_consecutive_frames_to_trigger: 0,
            ..GuardianConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_extent_is_rejected() {
        let cfg = GuardianConfig {
            roi: BoxExtents::new(10.0, -2.0, 3.0),
            ..GuardianConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("roi.backward"));
    }

    #[test]
    fn inverted_height_band_is_rejected() {
        let cfg = GuardianConfig {
            height_min: 2.0,
            height_max: 1.0,
            ..GuardianConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ego_side_must_be_inside_roi_side() {
        let cfg = GuardianConfig {
            ego_box: BoxExtents::new(2.0, 2.0, 3.0),
            roi: BoxExtents::new(10.0, 2.0, 3.0),
            ..GuardianConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let cfg: GuardianConfig =
            serde_json::from_str(r#"{ "min_points_in_roi_to_trigger": 12 }"#).unwrap();
        assert_eq!(cfg.min_points_in_roi_to_trigger, 12);
        assert_eq!(cfg.min_consecutive_frames_to_trigger, 3);
        assert_eq!(cfg.roi, BoxExtents::new(10.0, 2.0, 3.0));
    }

    #[test]
    fn nan_point_is_not_finite() {
        assert!(Point3::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Point3::new(f32::NAN, 2.0, 3.0).is_finite());
        assert!(!Point3::new(1.0, 2.0, f32::INFINITY).is_finite());
    }

    #[test]
    fn collision_event_roundtrip() {
        let event = Event::new(
            "guardian-runtime::collision_guardian",
            EventPayload::CollisionWarning(CollisionSignal {
                timestamp_sec: 12.5,
                is_collision: true,
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        match back.payload {
            EventPayload::CollisionWarning(signal) => assert!(signal.is_collision),
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn transform_error_display_names_frames() {
        let err = GuardianError::TransformUnavailable {
            timestamp: 1.0,
            target_frame: "novatel".to_string(),
            source_frame: "velodyne128".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("novatel"));
        assert!(msg.contains("velodyne128"));
    }
}
