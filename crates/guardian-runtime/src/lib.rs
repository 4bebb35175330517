//! `guardian-runtime` – Collision Pipeline
//!
//! Wires the geometric frame filter and the temporal consensus tracker into
//! a single per-stream component and drives it from the event bus.
//!
//! # Modules
//!
//! - [`consensus`] – [`ConsensusTracker`][consensus::ConsensusTracker]:
//!   consecutive-risk counter that debounces per-frame verdicts.
//! - [`collision_guardian`] – [`CollisionGuardian`][collision_guardian::CollisionGuardian]:
//!   resolve transform → evaluate frame → track → publish one
//!   [`CollisionSignal`][guardian_types::CollisionSignal] per frame.
//! - [`node`] – [`run_collision_node`][node::run_collision_node]: async loop
//!   feeding [`Topic::PointCloud`][guardian_middleware::Topic::PointCloud]
//!   frames to a guardian in arrival order.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.
//!
//! The safety-status side lives in `guardian-monitor`; its main types are
//! re-exported here so a binary can assemble the whole guardian from this
//! crate alone.

pub mod collision_guardian;
pub mod consensus;
pub mod node;
pub mod telemetry;

pub use collision_guardian::{CollisionGuardian, GUARDIAN_SOURCE, GuardianStats};
pub use consensus::ConsensusTracker;
pub use node::run_collision_node;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};

pub use guardian_monitor::{CollisionMonitor, MonitorScheduler, StatusReader, status_store};
