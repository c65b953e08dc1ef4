//! BroadcastHub processor.
//!
//! The BroadcastHub is responsible for:
//! - Keeping the registry of live subscribers
//! - Receiving `Notification`s via the `Processor` trait
//! - Delivering each notification to every registered subscriber, with a
//!   per-delivery timeout
//! - Dropping subscribers whose delivery fails or times out
//!
//! The registry lock is held only while inserting, removing, or copying the
//! registry; deliveries run against that copy, so a failing subscriber
//! cannot disturb delivery to the others.

use async_trait::async_trait;
use futures_util::future::join_all;
use kanau::processor::Processor;
use mona_sdk::objects::Notification;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

/// Opaque handle id, assigned at registration and never reused.
pub type ConnectionId = Uuid;

/// Default bound for a single delivery attempt.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Default per-connection outbound buffer.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

/// Errors that can occur while delivering to one subscriber.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The subscriber's connection is gone
    #[error("subscriber closed")]
    Closed,

    /// The subscriber did not accept the frame in time
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),

    /// Transport-specific failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Something that can receive serialized notifications.
///
/// Implemented by the WebSocket layer; the hub only sees this trait.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Deliver one JSON text frame.
    async fn deliver(&self, frame: Arc<str>) -> Result<(), DeliveryError>;
}

/// Subscriber that forwards frames into a bounded channel.
///
/// The receiving half is drained by a per-connection writer task. A full
/// buffer makes `deliver` wait, which the hub's timeout turns into a drop.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Arc<str>>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiver its writer task drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn deliver(&self, frame: Arc<str>) -> Result<(), DeliveryError> {
        self.tx.send(frame).await.map_err(|_| DeliveryError::Closed)
    }
}

/// Result of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the frame
    pub delivered: usize,
    /// Subscribers removed because delivery failed
    pub dropped: usize,
}

/// BroadcastHub fans notifications out to every live subscriber.
pub struct BroadcastHub {
    registry: Mutex<HashMap<ConnectionId, Arc<dyn Subscriber>>>,
    send_timeout: Duration,
}

impl BroadcastHub {
    /// Create a new BroadcastHub.
    ///
    /// # Arguments
    ///
    /// * `send_timeout` - Upper bound for a single delivery attempt
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            send_timeout,
        }
    }

    /// Add a subscriber and return its handle id.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> ConnectionId {
        let id = Uuid::now_v7();
        let total = {
            let mut registry = self.registry.lock();
            registry.insert(id, subscriber);
            registry.len()
        };
        debug!(connection = %id, total, "Subscriber registered");
        id
    }

    /// Remove a subscriber. Removing an absent id is a no-op.
    ///
    /// Returns `true` if the id was registered.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        let (removed, total) = {
            let mut registry = self.registry.lock();
            let removed = registry.remove(&id).is_some();
            (removed, registry.len())
        };
        if removed {
            debug!(connection = %id, total, "Subscriber deregistered");
        }
        removed
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.registry.lock().contains_key(&id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Serialize `notification` once and deliver it to every subscriber.
    pub async fn broadcast(&self, notification: &Notification) -> BroadcastReport {
        match notification.to_frame() {
            Ok(frame) => self.broadcast_frame(frame.into()).await,
            Err(e) => {
                error!(error = %e, "Failed to serialize notification");
                BroadcastReport::default()
            }
        }
    }

    /// Deliver an already serialized frame to every subscriber.
    pub async fn broadcast_frame(&self, frame: Arc<str>) -> BroadcastReport {
        let targets: Vec<(ConnectionId, Arc<dyn Subscriber>)> = self
            .registry
            .lock()
            .iter()
            .map(|(id, subscriber)| (*id, Arc::clone(subscriber)))
            .collect();

        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let send_timeout = self.send_timeout;
        let deliveries = targets.into_iter().map(|(id, subscriber)| {
            let frame = Arc::clone(&frame);
            async move {
                let result = match tokio::time::timeout(send_timeout, subscriber.deliver(frame)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::TimedOut(send_timeout)),
                };
                (id, result)
            }
        });

        let mut report = BroadcastReport::default();
        for (id, result) in join_all(deliveries).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(connection = %id, error = %e, "Delivery failed, dropping subscriber");
                    self.deregister(id);
                    report.dropped += 1;
                }
            }
        }
        report
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT)
    }
}

// ---------------------------------------------------------------------------
// Processor trait implementation
// ---------------------------------------------------------------------------

impl Processor<Notification> for BroadcastHub {
    type Output = BroadcastReport;
    type Error = Infallible;

    async fn process(&self, notification: Notification) -> Result<BroadcastReport, Infallible> {
        Ok(self.broadcast(&notification).await)
    }
}
