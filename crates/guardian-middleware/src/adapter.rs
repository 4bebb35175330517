//! The sensor adapter pattern.
//!
//! The guardian never talks to a LiDAR driver directly.  An adapter turns
//! whatever the outside world delivers (a live driver, a recorded log) into a
//! stream of [`PointCloudFrame`]s, and [`forward_frames`] pushes that stream
//! onto the internal [`EventBus`] one frame at a time.
//!
//! - [`SensorAdapter`] – the trait every frame source must implement.
//! - [`FrameLogReplay`][crate::replay::FrameLogReplay] – replays a
//!   JSON-lines frame log at a bounded rate.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use guardian_types::{Event, EventPayload, GuardianError, PointCloudFrame};
use tracing::{debug, warn};

use crate::bus::{EventBus, Topic};

/// Every point-cloud source must implement this trait.
///
/// # Contract
///
/// * `name` – stable identifier used as the bus event `source`.
/// * `frame_stream` – returns the frames in capture order.  Failing to open
///   the underlying source is reported up front; once the stream exists it
///   only yields well-formed frames.
#[async_trait]
pub trait SensorAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn frame_stream(&self) -> Result<BoxStream<'static, PointCloudFrame>, GuardianError>;
}

/// Publish every frame of `adapter` to [`Topic::PointCloud`], in order.
///
/// Frames that nobody is subscribed to are dropped with a warning; the
/// sensor never waits on its consumers.  Returns the number of frames that
/// were delivered to at least one subscriber.
pub async fn forward_frames(
    adapter: &dyn SensorAdapter,
    bus: &EventBus,
) -> Result<usize, GuardianError> {
    let source = format!("guardian-middleware::{}", adapter.name());
    let mut frames = adapter.frame_stream().await?;
    let mut delivered = 0;

    while let Some(frame) = frames.next().await {
        let event = Event::new(source.clone(), EventPayload::PointCloud(Arc::new(frame)));
        match bus.publish_to(Topic::PointCloud, event) {
            Ok(receivers) => {
                delivered += 1;
                debug!(receivers, "point cloud frame forwarded");
            }
            Err(e) => warn!(error = %e, "point cloud frame dropped"),
        }
    }

    Ok(delivered)
}
