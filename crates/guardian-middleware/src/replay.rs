//! [`FrameLogReplay`] – replays a recorded point-cloud log.
//!
//! The log is newline-delimited JSON, one [`PointCloudFrame`] per line:
//!
//! ```text
//! {"frame_id":"velodyne128","timestamp_sec":1.0,"points":[{"x":0.5,"y":5.0,"z":1.0}]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.  Lines that fail to
//! parse are logged and skipped so one corrupt record does not end the
//! replay.  Playback can be paced with a frame-rate cap.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use guardian_types::{GuardianError, PointCloudFrame};
use tracing::{info, warn};

use crate::adapter::SensorAdapter;

/// Replays a JSON-lines frame log as a [`SensorAdapter`].
pub struct FrameLogReplay {
    path: PathBuf,
    rate_hz: Option<NonZeroU32>,
}

impl FrameLogReplay {
    /// Replay `path` as fast as the consumer allows.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rate_hz: None,
        }
    }

    /// Cap playback at `rate_hz` frames per second.
    pub fn with_rate(mut self, rate_hz: NonZeroU32) -> Self {
        self.rate_hz = Some(rate_hz);
        self
    }
}

/// Parse a frame log, skipping blank, comment and malformed lines.
pub fn parse_frame_log(raw: &str) -> Vec<PointCloudFrame> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .filter_map(|(idx, line)| match serde_json::from_str::<PointCloudFrame>(line) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(line = idx + 1, error = %e, "skipping malformed frame record");
                None
            }
        })
        .collect()
}

#[async_trait]
impl SensorAdapter for FrameLogReplay {
    fn name(&self) -> &str {
        "replay"
    }

    async fn frame_stream(&self) -> Result<BoxStream<'static, PointCloudFrame>, GuardianError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GuardianError::Io(format!("failed to read frame log {}: {e}", self.path.display()))
        })?;
        let frames = parse_frame_log(&raw);
        info!(path = %self.path.display(), frames = frames.len(), "frame log loaded");

        let Some(rate) = self.rate_hz else {
            return Ok(stream::iter(frames).boxed());
        };

        let limiter: Arc<DefaultDirectRateLimiter> =
            Arc::new(RateLimiter::direct(Quota::per_second(rate)));
        let paced = stream::iter(frames).then(move |frame| {
            let limiter = Arc::clone(&limiter);
            async move {
                limiter.until_ready().await;
                frame
            }
        });
        Ok(paced.boxed())
    }
}
