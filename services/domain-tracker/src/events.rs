//! "Query detected" event and its subscribers

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::tracker::Timestamp;

/// Name under which the event is published to external consumers
pub const QUERY_DETECTED: &str = "query_detected";

/// How long one listener may take before it is skipped
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Raised when the monitored client looked up the monitored domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDetected {
    pub tracker: String,
    pub occurred_at: Timestamp,
}

/// Receives detection events from a tracker
#[async_trait]
pub trait EventListener: Send + Sync + std::fmt::Debug {
    /// Listener name used in logs
    fn name(&self) -> &str;

    /// Handle one event. Errors are logged by the caller and otherwise dropped.
    async fn on_query_detected(&self, event: &QueryDetected) -> crate::Result<()>;
}

/// Listeners registered with one tracker
#[derive(Debug, Clone)]
pub struct Subscribers {
    listeners: Vec<Arc<dyn EventListener>>,
    delivery_timeout: Duration,
}

impl Default for Subscribers {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delivery_timeout(mut self, delivery_timeout: Duration) -> Self {
        self.delivery_timeout = delivery_timeout;
        self
    }

    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        tracing::debug!("Subscribed listener '{}'", listener.name());
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// Each listener gets at most the delivery timeout; a listener that
    /// overruns is abandoned and the next one is called. Returns how many
    /// listeners accepted the event.
    pub async fn emit(&self, event: &QueryDetected) -> usize {
        let mut delivered = 0;
        for listener in &self.listeners {
            let outcome =
                tokio::time::timeout(self.delivery_timeout, listener.on_query_detected(event))
                    .await
                    .unwrap_or(Err(crate::TrackerError::Timeout(self.delivery_timeout)));
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    "Listener '{}' failed to handle {} for '{}': {}",
                    listener.name(),
                    QUERY_DETECTED,
                    event.tracker,
                    e
                ),
            }
        }
        delivered
    }
}
