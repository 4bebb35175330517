//! Async driver that feeds bus frames into a [`CollisionGuardian`].
//!
//! One node per sensor stream.  The node awaits [`Topic::PointCloud`] events
//! and hands each frame to the guardian before receiving the next, so the
//! consensus counter always sees frames in arrival order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use guardian_middleware::TopicReceiver;
use guardian_types::EventPayload;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::collision_guardian::CollisionGuardian;

/// How often an idle node re-checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Process frames from `frames` until the topic closes or `shutdown` is
/// raised.  Returns the guardian so callers can read its final state.
///
/// A lagging receiver discards the guardian's streak, since the frames on
/// either side of the gap are not consecutive, and carries on with the
/// newest ones.  Transform failures are already logged by the guardian and
/// do not stop the node.
pub async fn run_collision_node(
    mut guardian: CollisionGuardian,
    mut frames: TopicReceiver,
    shutdown: Arc<AtomicBool>,
) -> CollisionGuardian {
    info!(topic = ?frames.topic(), "collision node started");

    while !shutdown.load(Ordering::SeqCst) {
        let received = match tokio::time::timeout(SHUTDOWN_POLL, frames.recv()).await {
            Ok(received) => received,
            Err(_) => continue,
        };

        match received {
            Ok(event) => match event.payload {
                EventPayload::PointCloud(frame) => {
                    let _ = guardian.process(&frame);
                }
                other => debug!(?other, "ignoring non point-cloud event"),
            },
            Err(RecvError::Lagged(n)) => {
                warn!(skipped = n, "collision node lagged behind the sensor");
                guardian.reset_consensus(n);
            }
            Err(RecvError::Closed) => {
                info!("point cloud topic closed");
                break;
            }
        }
    }

    let stats = guardian.stats();
    info!(
        frames_evaluated = stats.frames_evaluated,
        transform_failures = stats.transform_failures,
        lagged_frames = stats.lagged_frames,
        collision_signals = stats.collision_signals,
        "collision node stopped"
    );
    guardian
}
