//! [`ConsensusTracker`] – temporal debounce for per-frame risk verdicts.
//!
//! A single noisy frame must never brake the vehicle.  The tracker counts how
//! many frames in a row were judged risky and reports a persistent risk only
//! once that streak reaches the configured threshold.
//!
//! # Algorithm
//!
//! * risky frame → counter saturates upward by one.
//! * safe frame → counter drops to zero immediately.
//! * persistent ⇔ `counter >= threshold`.
//!
//! Frames that could not be evaluated are not recorded at all, so they
//! neither extend nor break a streak.
//!
//! # Example
//!
//! ```rust
//! use guardian_runtime::consensus::ConsensusTracker;
//!
//! let mut tracker = ConsensusTracker::new(3);
//!
//! assert!(!tracker.record(true));
//! assert!(!tracker.record(true));
//! assert!(tracker.record(true)); // third risky frame in a row
//!
//! // One safe frame wipes the streak.
//! assert!(!tracker.record(false));
//! assert_eq!(tracker.count(), 0);
//! ```

/// Consecutive-risk counter.
#[derive(Debug, Clone)]
pub struct ConsensusTracker {
    /// Number of consecutive risky frames that makes a risk persistent.
    threshold: u32,
    /// Length of the current risky streak.
    consecutive: u32,
}

impl ConsensusTracker {
    /// Create a tracker.  A `threshold` of 1 reports every risky frame.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: 0,
        }
    }

    /// Record the verdict for the newest evaluated frame.
    ///
    /// Returns `true` when the risk is persistent after this frame.
    pub fn record(&mut self, risk: bool) -> bool {
        if risk {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.consecutive = 0;
        }
        self.is_persistent()
    }

    pub fn is_persistent(&self) -> bool {
        self.consecutive >= self.threshold
    }

    /// Current streak length.
    pub fn count(&self) -> u32 {
        self.consecutive
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}
