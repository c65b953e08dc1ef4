use crate::processors::hub::{DEFAULT_SEND_TIMEOUT, DEFAULT_SUBSCRIBER_BUFFER};
use std::time::Duration;

/// Subscriber delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Upper bound for delivering one frame to one subscriber.
    pub send_timeout: Duration,
    /// Frames buffered per connection before deliveries start to wait.
    pub subscriber_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}
