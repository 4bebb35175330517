//! `guardian-monitor` – Safety Status Reactor
//!
//! Periodic monitors that turn what the pipeline publishes into the vehicle
//! safety status consumed by actuation and the passenger display.
//!
//! # Modules
//!
//! - [`status`] – [`SystemStatus`][status::SystemStatus] and its
//!   single-writer / many-reader store created by
//!   [`status_store`][status::status_store].
//! - [`recurrent_runner`] – the [`RecurrentRunner`][recurrent_runner::RecurrentRunner]
//!   capability and the [`MonitorScheduler`][recurrent_runner::MonitorScheduler]
//!   that runs each monitor on its own cadence.
//! - [`collision_monitor`] – [`CollisionMonitor`][collision_monitor::CollisionMonitor]:
//!   requests emergency braking while the newest collision verdict is
//!   positive and releases it as soon as it is not.

pub mod collision_monitor;
pub mod recurrent_runner;
pub mod status;

pub use collision_monitor::{
    COLLISION_COMPONENT, COLLISION_MONITOR_NAME, CollisionMonitor, DEFAULT_MONITOR_INTERVAL,
    EMERGENCY_BRAKING_MSG,
};
pub use recurrent_runner::{MonitorScheduler, RecurrentRunner};
pub use status::{ComponentStatus, StatusLevel, StatusReader, StatusWriter, SystemStatus, status_store};
