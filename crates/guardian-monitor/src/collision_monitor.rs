//! [`CollisionMonitor`] – maps the latest collision verdict onto the vehicle
//! safety status.
//!
//! The monitor does not react to individual messages.  On every scheduled
//! round it looks at the newest [`CollisionSignal`] observed on
//! [`Topic::CollisionWarning`] and rewrites the safety status from scratch:
//!
//! | Latest signal | Safety status |
//! |---|---|
//! | none yet, or `is_collision == false` | message cleared, trigger time cleared, no emergency stop, component `Ok` |
//! | `is_collision == true` | [`EMERGENCY_BRAKING_MSG`], trigger time = round time, emergency stop, component `Fatal` |
//!
//! A collision verdict stays in force for as long as it remains the newest
//! message on the topic, even if the producer goes silent.

use std::time::Duration;

use guardian_middleware::{EventBus, LatestObserver, Topic};
use guardian_types::{CollisionSignal, EventPayload};
use tracing::{debug, error, info, warn};

use crate::recurrent_runner::RecurrentRunner;
use crate::status::{StatusLevel, StatusWriter};

/// Scheduler name of the collision monitor.
pub const COLLISION_MONITOR_NAME: &str = "CollisionMonitor";
/// Component entry this monitor owns in the status record.
pub const COLLISION_COMPONENT: &str = "Collision";
/// Passenger message while emergency braking is requested.
pub const EMERGENCY_BRAKING_MSG: &str = "EMERGENCY BRAKING! Imminent Collision!";
/// Default round interval.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(100);

/// Reactor from collision verdicts to the safety status.
pub struct CollisionMonitor {
    interval: Duration,
    observer: LatestObserver,
    status: StatusWriter,
    braking: bool,
}

impl CollisionMonitor {
    /// Create the monitor and its subscription to [`Topic::CollisionWarning`].
    ///
    /// Signals published before this call are not seen.
    pub fn new(bus: &EventBus, status: StatusWriter, interval: Duration) -> Self {
        Self {
            interval,
            observer: bus.observe(Topic::CollisionWarning),
            status,
            braking: false,
        }
    }

    /// Newest signal seen by the last round.
    pub fn latest_signal(&self) -> Option<CollisionSignal> {
        match self.observer.latest_observed().map(|e| &e.payload) {
            Some(EventPayload::CollisionWarning(signal)) => Some(*signal),
            _ => None,
        }
    }
}

impl RecurrentRunner for CollisionMonitor {
    fn name(&self) -> &str {
        COLLISION_MONITOR_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run_once(&mut self, current_time: f64) {
        self.observer.observe();
        let collision = self.latest_signal().is_some_and(|s| s.is_collision);

        let applied = self.status.update(|status| {
            let Some(component) = status.components.get_mut(COLLISION_COMPONENT) else {
                return false;
            };
            component.clear();

            if collision {
                component.set(StatusLevel::Fatal, EMERGENCY_BRAKING_MSG);
                status.passenger_msg = Some(EMERGENCY_BRAKING_MSG.to_string());
                status.safety_mode_trigger_time = Some(current_time);
                status.require_emergency_stop = true;
            } else {
                component.set(StatusLevel::Ok, "");
                status.clear_safety_action();
            }
            true
        });

        match applied {
            Ok(true) => {
                if collision != self.braking {
                    if collision {
                        warn!(current_time, "emergency braking requested");
                    } else {
                        info!(current_time, "collision cleared, emergency braking released");
                    }
                    self.braking = collision;
                }
            }
            Ok(false) => debug!(component = COLLISION_COMPONENT, "component not registered, skipping"),
            Err(e) => error!(error = %e, "failed to update safety status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{SystemStatus, status_store};
    use guardian_types::{Event, GuardianError};

    fn publish(bus: &EventBus, is_collision: bool) -> Result<(), GuardianError> {
        let signal = CollisionSignal {
            timestamp_sec: 0.0,
            is_collision,
        };
        bus.publish_to(
            Topic::CollisionWarning,
            Event::new("test", EventPayload::CollisionWarning(signal)),
        )?;
        Ok(())
    }

    fn monitor_with_component(bus: &EventBus) -> (CollisionMonitor, crate::status::StatusReader) {
        let (writer, reader) = status_store([COLLISION_COMPONENT]);
        (CollisionMonitor::new(bus, writer, DEFAULT_MONITOR_INTERVAL), reader)
    }

    fn assert_clear(snap: &SystemStatus) {
        assert_eq!(snap.passenger_msg, None);
        assert_eq!(snap.safety_mode_trigger_time, None);
        assert!(!snap.require_emergency_stop);
        assert_eq!(snap.components[COLLISION_COMPONENT].status, StatusLevel::Ok);
    }

    #[test]
    fn no_signal_yet_reports_clear() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let (mut monitor, reader) = monitor_with_component(&bus);
        monitor.run_once(1.0);
        assert_clear(&reader.snapshot()?);
        Ok(())
    }

    #[test]
    fn collision_signal_requests_emergency_stop() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let (mut monitor, reader) = monitor_with_component(&bus);

        publish(&bus, true)?;
        monitor.run_once(10.0);

        let snap = reader.snapshot()?;
        assert_eq!(snap.passenger_msg.as_deref(), Some(EMERGENCY_BRAKING_MSG));
        assert_eq!(snap.safety_mode_trigger_time, Some(10.0));
        assert!(snap.require_emergency_stop);
        assert_eq!(snap.components[COLLISION_COMPONENT].status, StatusLevel::Fatal);
        assert_eq!(snap.components[COLLISION_COMPONENT].message, EMERGENCY_BRAKING_MSG);
        Ok(())
    }

    #[test]
    fn false_signal_clears_previous_collision() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let (mut monitor, reader) = monitor_with_component(&bus);

        publish(&bus, true)?;
        monitor.run_once(1.0);
        assert!(reader.emergency_stop_required()?);

        publish(&bus, false)?;
        monitor.run_once(1.1);
        assert_clear(&reader.snapshot()?);
        Ok(())
    }

    #[test]
    fn only_newest_signal_counts() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let (mut monitor, reader) = monitor_with_component(&bus);

        publish(&bus, true)?;
        publish(&bus, true)?;
        publish(&bus, false)?;
        monitor.run_once(1.0);
        assert_clear(&reader.snapshot()?);
        Ok(())
    }

    #[test]
    fn stale_collision_stays_in_force() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let (mut monitor, reader) = monitor_with_component(&bus);

        publish(&bus, true)?;
        monitor.run_once(1.0);
        // Producer goes quiet; the verdict persists and the trigger time
        // follows the round clock.
        monitor.run_once(1.1);
        monitor.run_once(1.2);

        let snap = reader.snapshot()?;
        assert!(snap.require_emergency_stop);
        assert_eq!(snap.safety_mode_trigger_time, Some(1.2));
        Ok(())
    }

    #[test]
    fn repeated_rounds_are_idempotent() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let (mut monitor, reader) = monitor_with_component(&bus);

        publish(&bus, false)?;
        monitor.run_once(5.0);
        let first = reader.snapshot()?;
        monitor.run_once(5.0);
        assert_eq!(reader.snapshot()?, first);
        Ok(())
    }

    #[test]
    fn missing_component_leaves_status_untouched() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let (writer, reader) = status_store(["Lidar"]);
        let mut monitor = CollisionMonitor::new(&bus, writer, DEFAULT_MONITOR_INTERVAL);

        publish(&bus, true)?;
        monitor.run_once(1.0);

        let snap = reader.snapshot()?;
        assert!(!snap.require_emergency_stop);
        assert_eq!(snap.passenger_msg, None);
        assert_eq!(snap.components["Lidar"].status, StatusLevel::Unknown);
        Ok(())
    }

    #[test]
    fn signals_before_construction_are_not_seen() -> Result<(), GuardianError> {
        let bus = EventBus::default();
        let _keepalive = bus.subscribe_to(Topic::CollisionWarning);
        publish(&bus, true)?;

        let (mut monitor, reader) = monitor_with_component(&bus);
        monitor.run_once(1.0);
        assert_clear(&reader.snapshot()?);
        assert_eq!(monitor.latest_signal(), None);
        Ok(())
    }

    #[test]
    fn runner_metadata() {
        let bus = EventBus::default();
        let (writer, _reader) = status_store([COLLISION_COMPONENT]);
        let monitor = CollisionMonitor::new(&bus, writer, Duration::from_millis(250));
        assert_eq!(monitor.name(), COLLISION_MONITOR_NAME);
        assert_eq!(monitor.interval(), Duration::from_millis(250));
    }
}
