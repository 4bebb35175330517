//! [`CollisionGuardian`] – per-frame collision pipeline.
//!
//! Each incoming point-cloud frame goes through:
//!
//! 1. **Resolve** – ask the [`TransformResolver`] for the sensor → vehicle
//!    transform at the frame's capture time.  Without it the frame is
//!    abandoned: no verdict, no counter update, no signal.
//! 2. **Evaluate** – [`FrameRiskEvaluator`] decides whether enough points
//!    sit inside the danger zone.
//! 3. **Track** – [`ConsensusTracker`] turns the per-frame verdict into a
//!    debounced collision flag.
//! 4. **Publish** – one [`CollisionSignal`] goes out on
//!    [`Topic::CollisionWarning`].
//!
//! Frames must be fed to one guardian strictly in arrival order; `process`
//! takes `&mut self` so a single instance can never evaluate two frames at
//! once.

use std::sync::Arc;

use guardian_middleware::{EventBus, Topic};
use guardian_perception::{FrameRiskEvaluator, TransformResolver};
use guardian_types::{
    CollisionSignal, Event, EventPayload, GuardianConfig, GuardianError, PointCloudFrame,
    now_seconds,
};
use tracing::{debug, error, info, instrument, warn};

use crate::consensus::ConsensusTracker;

/// Event source label used for published collision signals.
pub const GUARDIAN_SOURCE: &str = "guardian-runtime::collision_guardian";

/// Running totals, mostly for operator summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardianStats {
    /// Frames that produced a verdict.
    pub frames_evaluated: u64,
    /// Frames abandoned because no transform was available.
    pub transform_failures: u64,
    /// Signals that could not be delivered to any subscriber.
    pub publish_failures: u64,
    /// Signals published with `is_collision == true`.
    pub collision_signals: u64,
    /// Frames the stream skipped before they reached this guardian.
    pub lagged_frames: u64,
}

/// Geometric filter plus temporal consensus for one sensor stream.
pub struct CollisionGuardian {
    vehicle_frame_id: String,
    evaluator: FrameRiskEvaluator,
    tracker: ConsensusTracker,
    resolver: Arc<dyn TransformResolver>,
    bus: EventBus,
    stats: GuardianStats,
}

impl CollisionGuardian {
    /// Build a guardian.  Fails with
    /// [`GuardianError::ConfigurationInvalid`] before any frame is seen if
    /// `config` is unusable.
    pub fn new(
        config: &GuardianConfig,
        vehicle_frame_id: impl Into<String>,
        resolver: Arc<dyn TransformResolver>,
        bus: EventBus,
    ) -> Result<Self, GuardianError> {
        config.validate()?;
        let vehicle_frame_id = vehicle_frame_id.into();
        if vehicle_frame_id.trim().is_empty() {
            return Err(GuardianError::ConfigurationInvalid(
                "vehicle_frame_id must not be empty".to_string(),
            ));
        }

        info!(
            vehicle_frame = %vehicle_frame_id,
            min_points = config.min_points_in_roi_to_trigger,
            min_frames = config.min_consecutive_frames_to_trigger,
            "collision guardian initialised"
        );

        Ok(Self {
            vehicle_frame_id,
            evaluator: FrameRiskEvaluator::new(config),
            tracker: ConsensusTracker::new(config.min_consecutive_frames_to_trigger),
            resolver,
            bus,
            stats: GuardianStats::default(),
        })
    }

    /// Run one frame through the pipeline and return the published signal.
    ///
    /// A missing transform is returned as
    /// [`GuardianError::TransformUnavailable`] and leaves the consensus
    /// state untouched.  A failed publish is only logged: the verdict still
    /// counts and the signal is returned.
    #[instrument(
        name = "collision_guardian.process",
        skip_all,
        fields(frame_id = %frame.frame_id, stamp = frame.timestamp_sec, points = frame.points.len())
    )]
    pub fn process(&mut self, frame: &PointCloudFrame) -> Result<CollisionSignal, GuardianError> {
        if !frame.timestamp_sec.is_finite() {
            self.stats.transform_failures += 1;
            error!("frame dropped: capture time is not a finite number");
            return Err(GuardianError::TransformUnavailable {
                timestamp: frame.timestamp_sec,
                target_frame: self.vehicle_frame_id.clone(),
                source_frame: frame.frame_id.clone(),
            });
        }

        let sensor_to_vehicle = match self.resolver.resolve(
            frame.timestamp_sec,
            &self.vehicle_frame_id,
            &frame.frame_id,
        ) {
            Ok(t) => t,
            Err(e) => {
                self.stats.transform_failures += 1;
                error!(error = %e, "frame dropped: no sensor transform");
                return Err(e);
            }
        };

        let frame_risk = self.evaluator.evaluate(frame, &sensor_to_vehicle);
        let is_collision = self.tracker.record(frame_risk);
        self.stats.frames_evaluated += 1;
        debug!(frame_risk, consecutive = self.tracker.count(), "frame evaluated");

        if is_collision {
            self.stats.collision_signals += 1;
            warn!(
                consecutive = self.tracker.count(),
                threshold = self.tracker.threshold(),
                "persistent collision risk detected"
            );
        }

        let signal = CollisionSignal {
            timestamp_sec: now_seconds(),
            is_collision,
        };
        let event = Event::new(GUARDIAN_SOURCE, EventPayload::CollisionWarning(signal));
        if let Err(e) = self.bus.publish_to(Topic::CollisionWarning, event) {
            self.stats.publish_failures += 1;
            warn!(error = %e, "collision signal not delivered");
        }

        Ok(signal)
    }

    /// Current consecutive-risk streak.
    pub fn consecutive_risk_frames(&self) -> u32 {
        self.tracker.count()
    }

    /// Forget the current streak after `skipped` frames were lost upstream.
    ///
    /// Frames on either side of a gap are not consecutive, so they must not
    /// add up to a collision.
    pub fn reset_consensus(&mut self, skipped: u64) {
        self.stats.lagged_frames += skipped;
        if self.tracker.count() > 0 {
            warn!(
                skipped,
                discarded = self.tracker.count(),
                "frames lost, consecutive-risk streak discarded"
            );
        }
        self.tracker.reset();
    }

    pub fn stats(&self) -> GuardianStats {
        self.stats
    }
}
