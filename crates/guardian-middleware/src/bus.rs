//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::PointCloud`] | High-frequency LiDAR frames from the sensor driver |
//! | [`Topic::CollisionWarning`] | One [`CollisionSignal`][guardian_types::CollisionSignal] per evaluated frame |
//!
//! Two ways to consume a topic:
//!
//! * [`TopicReceiver`] – awaits every event in order.  Used by the frame
//!   pipeline, which must see each frame exactly once.
//! * [`LatestObserver`] – non-blocking, keeps only the most recent event.
//!   Used by periodic monitors that poll on their own cadence.

use guardian_types::{Event, GuardianError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Raw point-cloud frames.
    PointCloud,
    /// Debounced per-frame collision verdicts.
    CollisionWarning,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    point_cloud: broadcast::Sender<Event>,
    collision_warning: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (point_cloud, _) = broadcast::channel(capacity);
        let (collision_warning, _) = broadcast::channel(capacity);
        Self {
            point_cloud,
            collision_warning,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`GuardianError::PublishFailure`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, GuardianError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| GuardianError::PublishFailure(format!("no subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Create a latest-value observer for `topic`.
    ///
    /// Events published before this call are not seen.
    pub fn observe(&self, topic: Topic) -> LatestObserver {
        LatestObserver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
            latest: None,
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::PointCloud => &self.point_cloud,
            Topic::CollisionWarning => &self.collision_warning,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Latest-value observer
// ---------------------------------------------------------------------------

/// Non-blocking reader that remembers only the newest event on its topic.
///
/// Call [`observe`][Self::observe] to pull everything that arrived since the
/// last call, then [`latest_observed`][Self::latest_observed] to read the
/// newest one.  The cached event survives across calls, so a quiet topic
/// keeps reporting its last known value.
pub struct LatestObserver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
    latest: Option<Event>,
}

impl LatestObserver {
    /// Drain pending events, keeping the most recent one.  Never blocks.
    pub fn observe(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => self.latest = Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "LatestObserver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// The newest event seen by the last [`observe`][Self::observe] call.
    pub fn latest_observed(&self) -> Option<&Event> {
        self.latest.as_ref()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
