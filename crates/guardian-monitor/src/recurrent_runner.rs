//! [`RecurrentRunner`] – periodic monitor capability and its scheduler.
//!
//! Each monitor declares how often it wants to run; the
//! [`MonitorScheduler`] owns a collection of boxed monitors and, on every
//! scheduler tick, runs the ones whose next round is due.  A monitor's next
//! round is always measured from the tick it last ran on, so a slow or late
//! scheduler never causes a burst of catch-up runs.  A tick that lands just
//! short of the due time still counts, so timer jitter does not drop rounds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use guardian_types::now_seconds;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Fraction of a monitor's interval by which a tick may precede its due time.
const DUE_SLACK_FRACTION: f64 = 0.1;

/// A monitor that runs on a fixed cadence, independent of data arrival.
pub trait RecurrentRunner: Send {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Minimum time between two runs.
    fn interval(&self) -> Duration;

    /// Run one round.  `current_time` is seconds since the Unix epoch.
    fn run_once(&mut self, current_time: f64);
}

struct Scheduled {
    runner: Box<dyn RecurrentRunner>,
    next_round: f64,
    round_count: u64,
}

/// Drives a set of [`RecurrentRunner`]s.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use guardian_monitor::recurrent_runner::{MonitorScheduler, RecurrentRunner};
///
/// struct Counter(u32);
///
/// impl RecurrentRunner for Counter {
///     fn name(&self) -> &str { "counter" }
///     fn interval(&self) -> Duration { Duration::from_secs(1) }
///     fn run_once(&mut self, _current_time: f64) { self.0 += 1; }
/// }
///
/// let mut scheduler = MonitorScheduler::new();
/// scheduler.add(Box::new(Counter(0)));
///
/// assert_eq!(scheduler.tick(10.0), 1); // first tick always runs
/// assert_eq!(scheduler.tick(10.5), 0); // not due yet
/// assert_eq!(scheduler.tick(11.0), 1);
/// ```
#[derive(Default)]
pub struct MonitorScheduler {
    runners: Vec<Scheduled>,
}

impl MonitorScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor.  It runs on the next [`tick`][Self::tick].
    pub fn add(&mut self, runner: Box<dyn RecurrentRunner>) {
        info!(monitor = runner.name(), interval = ?runner.interval(), "monitor registered");
        self.runners.push(Scheduled {
            runner,
            next_round: f64::NEG_INFINITY,
            round_count: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Number of rounds the monitor called `name` has completed.
    pub fn round_count(&self, name: &str) -> Option<u64> {
        self.runners
            .iter()
            .find(|s| s.runner.name() == name)
            .map(|s| s.round_count)
    }

    /// Run every monitor that is due at `current_time`.
    ///
    /// Returns how many monitors ran.
    pub fn tick(&mut self, current_time: f64) -> usize {
        let mut ran = 0;
        for scheduled in &mut self.runners {
            let interval = scheduled.runner.interval().as_secs_f64();
            if scheduled.next_round - current_time > interval * DUE_SLACK_FRACTION {
                continue;
            }
            scheduled.round_count += 1;
            scheduled.next_round = current_time + interval;
            scheduled.runner.run_once(current_time);
            ran += 1;
        }
        ran
    }

    /// Tick every `period` of wall-clock time until `shutdown` is raised.
    ///
    /// `period` should be no longer than the shortest monitor interval.
    /// Returns the scheduler so callers can inspect it after shutdown.
    pub async fn run(mut self, period: Duration, shutdown: Arc<AtomicBool>) -> Self {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            let ran = self.tick(now_seconds());
            debug!(ran, "monitor scheduler tick");
        }
        info!("monitor scheduler stopped");
        self
    }
}
