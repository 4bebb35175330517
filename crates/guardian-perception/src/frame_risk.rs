//! Frame Risk Evaluator.
//!
//! Turns one point-cloud frame into a single "risk observed this frame"
//! boolean.  Every point is moved into the vehicle body frame and pushed
//! through four filter layers, cheapest and most discriminating first:
//!
//! 1. **validity** – points with a NaN/infinite coordinate are sensor noise;
//! 2. **ego exclusion** – points on the vehicle's own body;
//! 3. **height band** – ground returns and overhead structures;
//! 4. **protective region (ROI)** – anything outside the danger zone.
//!
//! Surviving points are counted, and the scan stops as soon as the count
//! reaches the configured threshold.
//!
//! Vehicle body axes: `+y` forward, `x` lateral, `z` up.
//!
//! # Example
//!
//! ```rust
//! use guardian_perception::frame_risk::FrameRiskEvaluator;
//! use guardian_perception::transform::Transform3D;
//! use guardian_types::{GuardianConfig, Point3, PointCloudFrame};
//!
//! let evaluator = FrameRiskEvaluator::new(&GuardianConfig::default());
//! let frame = PointCloudFrame {
//!     frame_id: "novatel".into(),
//!     timestamp_sec: 0.0,
//!     points: vec![Point3::new(0.5, 5.0, 1.0); 6],
//! };
//! assert!(evaluator.evaluate(&frame, &Transform3D::identity()));
//! ```

use guardian_types::{GuardianConfig, Point3, PointCloudFrame};
use tracing::trace;

use crate::transform::Transform3D;

/// Why a single point did or did not count toward the frame risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClass {
    /// Non-finite coordinate.
    Invalid,
    /// On the vehicle itself.
    EgoBody,
    /// Below `height_min` or above `height_max`.
    OutsideHeightBand,
    /// Outside the protective region.
    OutsideRoi,
    /// Inside the danger zone.
    Qualifying,
}

/// Stateless per-frame geometric filter.
///
/// Holds the filter bounds in the form the hot loop compares against: the
/// backward extents are stored as negative `y` bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRiskEvaluator {
    ego_forward: f32,
    ego_backward: f32,
    ego_side: f32,
    roi_forward: f32,
    roi_backward: f32,
    roi_side: f32,
    height_min: f32,
    height_max: f32,
    min_points: u32,
}

impl FrameRiskEvaluator {
    /// Build an evaluator from an already-validated configuration.
    pub fn new(config: &GuardianConfig) -> Self {
        Self {
            ego_forward: config.ego_box.forward,
            ego_backward: -config.ego_box.backward,
            ego_side: config.ego_box.side,
            roi_forward: config.roi.forward,
            roi_backward: -config.roi.backward,
            roi_side: config.roi.side,
            height_min: config.height_min,
            height_max: config.height_max,
            min_points: config.min_points_in_roi_to_trigger,
        }
    }

    /// Classify a point already expressed in the vehicle body frame.
    ///
    /// Layers are checked in order; the first one that rejects the point
    /// decides its class.
    pub fn classify(&self, p: Point3) -> PointClass {
        if !p.is_finite() {
            return PointClass::Invalid;
        }
        if p.y < self.ego_forward && p.y > self.ego_backward && p.x.abs() < self.ego_side {
            return PointClass::EgoBody;
        }
        if p.z < self.height_min || p.z > self.height_max {
            return PointClass::OutsideHeightBand;
        }
        if p.y > self.roi_forward || p.y < self.roi_backward || p.x.abs() > self.roi_side {
            return PointClass::OutsideRoi;
        }
        PointClass::Qualifying
    }

    /// Return `true` when at least `min_points_in_roi_to_trigger` points of
    /// `frame` fall inside the protective region.
    ///
    /// `sensor_to_vehicle` maps the frame's points into the vehicle body
    /// frame.  Invalid points are skipped before the transform is applied.
    pub fn evaluate(&self, frame: &PointCloudFrame, sensor_to_vehicle: &Transform3D) -> bool {
        let mut qualifying: u32 = 0;

        for &pt in &frame.points {
            if !pt.is_finite() {
                continue;
            }
            let in_vehicle = sensor_to_vehicle.apply_point(pt);
            if self.classify(in_vehicle) != PointClass::Qualifying {
                continue;
            }
            qualifying += 1;
            if qualifying >= self.min_points {
                trace!(frame_id = %frame.frame_id, qualifying, "point threshold reached");
                return true;
            }
        }

        false
    }

    /// Full-scan count of qualifying points, without the early exit.
    ///
    /// Diagnostic only; the hot path is [`evaluate`][Self::evaluate].
    pub fn count_qualifying(&self, frame: &PointCloudFrame, sensor_to_vehicle: &Transform3D) -> usize {
        frame
            .points
            .iter()
            .filter(|p| p.is_finite())
            .filter(|&&p| self.classify(sensor_to_vehicle.apply_point(p)) == PointClass::Qualifying)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Quaternion, Vec3};
    use guardian_types::BoxExtents;
    use std::f32::consts::FRAC_PI_2;

    fn scenario_config() -> GuardianConfig {
        GuardianConfig {
            ego_box: BoxExtents::new(2.0, 2.0, 1.0),
            roi: BoxExtents::new(10.0, 2.0, 3.0),
            height_min: 0.1,
            height_max: 2.5,
            min_points_in_roi_to_trigger: 5,
            min_consecutive_frames_to_trigger: 3,
        }
    }

    fn frame_of(points: Vec<Point3>) -> PointCloudFrame {
        PointCloudFrame {
            frame_id: "velodyne128".to_string(),
            timestamp_sec: 0.0,
            points,
        }
    }

    #[test]
    fn empty_frame_is_not_a_risk() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        assert!(!ev.evaluate(&frame_of(vec![]), &Transform3D::identity()));
    }

    #[test]
    fn dense_intrusion_in_roi_is_a_risk() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        let frame = frame_of(vec![Point3::new(0.5, 5.0, 1.0); 6]);
        assert!(ev.evaluate(&frame, &Transform3D::identity()));
    }

    #[test]
    fn points_on_ego_body_never_count() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        let frame = frame_of(vec![Point3::new(0.5, 1.0, 1.0); 6]);
        assert!(!ev.evaluate(&frame, &Transform3D::identity()));
        assert_eq!(ev.classify(Point3::new(0.5, 1.0, 1.0)), PointClass::EgoBody);
    }

    #[test]
    fn below_threshold_is_not_a_risk() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        let frame = frame_of(vec![Point3::new(0.5, 5.0, 1.0); 4]);
        assert!(!ev.evaluate(&frame, &Transform3D::identity()));
    }

    #[test]
    fn height_band_excludes_ground_and_overhangs() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        assert_eq!(ev.classify(Point3::new(0.5, 5.0, 0.0)), PointClass::OutsideHeightBand);
        assert_eq!(ev.classify(Point3::new(0.5, 5.0, 3.0)), PointClass::OutsideHeightBand);

        let mut points = vec![Point3::new(0.5, 5.0, 0.05); 10];
        points.extend(vec![Point3::new(0.5, 5.0, 2.6); 10]);
        assert!(!ev.evaluate(&frame_of(points), &Transform3D::identity()));
    }

    #[test]
    fn height_band_bounds_are_inclusive() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        assert_eq!(ev.classify(Point3::new(0.5, 5.0, 0.1)), PointClass::Qualifying);
        assert_eq!(ev.classify(Point3::new(0.5, 5.0, 2.5)), PointClass::Qualifying);
    }

    #[test]
    fn roi_bounds() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        // Beyond the forward reach.
        assert_eq!(ev.classify(Point3::new(0.0, 10.5, 1.0)), PointClass::OutsideRoi);
        // Behind the backward reach (-2 m).
        assert_eq!(ev.classify(Point3::new(0.0, -2.5, 1.0)), PointClass::OutsideRoi);
        // Too far to either side.
        assert_eq!(ev.classify(Point3::new(3.5, 5.0, 1.0)), PointClass::OutsideRoi);
        assert_eq!(ev.classify(Point3::new(-3.5, 5.0, 1.0)), PointClass::OutsideRoi);
        // Beside the car, outside the ego box but inside the ROI.
        assert_eq!(ev.classify(Point3::new(-2.0, 0.0, 1.0)), PointClass::Qualifying);
        // Exactly on the ROI edge still counts.
        assert_eq!(ev.classify(Point3::new(3.0, 10.0, 1.0)), PointClass::Qualifying);
    }

    #[test]
    fn ego_box_bounds_are_strict() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        // On the ego box edge: not excluded, and inside the ROI.
        assert_eq!(ev.classify(Point3::new(0.0, 2.0, 1.0)), PointClass::Qualifying);
        assert_eq!(ev.classify(Point3::new(1.0, 0.0, 1.0)), PointClass::Qualifying);
        assert_eq!(ev.classify(Point3::new(0.0, -1.9, 1.0)), PointClass::EgoBody);
    }

    #[test]
    fn ego_exclusion_wins_over_height_band() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        // Under the car and on the ground: reported as ego body.
        assert_eq!(ev.classify(Point3::new(0.0, 0.0, -1.0)), PointClass::EgoBody);
    }

    #[test]
    fn nan_points_are_skipped() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        let mut points = vec![Point3::new(f32::NAN, 5.0, 1.0); 20];
        points.extend(vec![Point3::new(0.5, f32::NAN, 1.0); 20]);
        points.extend(vec![Point3::new(0.5, 5.0, 1.0); 4]);
        let frame = frame_of(points.clone());
        assert!(!ev.evaluate(&frame, &Transform3D::identity()));
        assert_eq!(ev.count_qualifying(&frame, &Transform3D::identity()), 4);

        points.push(Point3::new(0.5, 5.0, 1.0));
        assert!(ev.evaluate(&frame_of(points), &Transform3D::identity()));
        assert_eq!(ev.classify(Point3::new(f32::NAN, 0.0, 0.0)), PointClass::Invalid);
    }

    #[test]
    fn transform_is_applied_before_filtering() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        // Sensor yawed +90° and mounted 1 m up: sensor +x maps to vehicle +y.
        let sensor_to_vehicle =
            Transform3D::new(Vec3::new(0.0, 0.0, 1.0), Quaternion::from_yaw(FRAC_PI_2));
        // In sensor coordinates these sit at x = 5, z = 0 → vehicle (0, 5, 1).
        let frame = frame_of(vec![Point3::new(5.0, 0.0, 0.0); 6]);
        assert!(ev.evaluate(&frame, &sensor_to_vehicle));
        // Without the transform they are on the ground, beside the car.
        assert!(!ev.evaluate(&frame, &Transform3D::identity()));
    }

    #[test]
    fn threshold_of_one_triggers_on_first_point() {
        let cfg = GuardianConfig {
            min_points_in_roi_to_trigger: 1,
            ..scenario_config()
        };
        let ev = FrameRiskEvaluator::new(&cfg);
        let frame = frame_of(vec![Point3::new(-2.0, 8.0, 1.2)]);
        assert!(ev.evaluate(&frame, &Transform3D::identity()));
    }

    #[test]
    fn scattered_points_count_across_the_frame() {
        let ev = FrameRiskEvaluator::new(&scenario_config());
        let frame = frame_of(vec![
            Point3::new(0.0, 5.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),  // ego
            Point3::new(2.5, -1.5, 0.5),
            Point3::new(0.0, 20.0, 1.0), // beyond ROI
            Point3::new(-2.5, 9.9, 2.4),
            Point3::new(0.0, 5.0, 0.0),  // ground
            Point3::new(1.5, 1.5, 1.0),
            Point3::new(-1.2, -1.9, 1.0),
        ]);
        assert_eq!(ev.count_qualifying(&frame, &Transform3D::identity()), 5);
        assert!(ev.evaluate(&frame, &Transform3D::identity()));
    }
}
