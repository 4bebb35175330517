//! `guardian-middleware` – The Nervous System
//!
//! Routes asynchronous data between the sensor, the guardian and the safety
//! monitors without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels, plus a latest-value observer for pollers.
//! - [`adapter`] – [`SensorAdapter`] trait and the frame forwarding loop.
//! - [`replay`] – [`FrameLogReplay`]: a rate-limited JSON-lines frame source.

pub mod adapter;
pub mod bus;
pub mod replay;

pub use adapter::{SensorAdapter, forward_frames};
pub use bus::{EventBus, LatestObserver, Topic, TopicReceiver};
pub use replay::FrameLogReplay;
