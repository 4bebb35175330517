//! `guardian-perception` – Spatial reasoning layer.
//!
//! Turns raw sensor returns into the geometric answers the guardian needs.
//!
//! # Modules
//!
//! - [`transform`] – [`TfEngine`][transform::TfEngine]: graph of named
//!   reference frames with static and timestamped edges, exposed to the rest
//!   of the system through the [`TransformResolver`][transform::TransformResolver]
//!   seam.
//! - [`frame_risk`] – [`FrameRiskEvaluator`][frame_risk::FrameRiskEvaluator]:
//!   layered point filter that decides whether one frame shows an intrusion
//!   into the protective region around the vehicle.

pub mod frame_risk;
pub mod transform;

pub use frame_risk::{FrameRiskEvaluator, PointClass};
pub use transform::{Quaternion, TfEngine, Transform3D, TransformResolver, Vec3};
