//! Change detection for one monitored client/domain pair

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::config::TrackerConfig;
use crate::events::{EventListener, QueryDetected, Subscribers};
use crate::upstream::{QueryLog, QueryRecord};
use crate::TrackerError;

/// ctime-style rendering, e.g. `Sat Jan  2 13:04:05 2021`
const DISPLAY_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// A wall-clock instant with its human-readable local rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub epoch_ms: u64,
    pub display: String,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            epoch_ms: now.timestamp_millis().max(0) as u64,
            display: now.format(DISPLAY_FORMAT).to_string(),
        }
    }

    pub fn from_epoch_ms(epoch_ms: u64) -> Self {
        let display = Local
            .timestamp_millis_opt(epoch_ms as i64)
            .single()
            .map(|t| t.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_default();
        Self { epoch_ms, display }
    }

    pub fn epoch_seconds(&self) -> i64 {
        (self.epoch_ms / 1000) as i64
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// The per-cycle "last checked" value handed to display code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusObservation {
    pub tracker: String,
    pub last_checked: Timestamp,
}

/// Tunables for the change detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Seconds a record must be ahead of the watermark to count as new
    pub debounce_seconds: i64,
    /// Upper bound on one upstream fetch
    pub timeout: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            debounce_seconds: 30,
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&TrackerConfig> for TrackerSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            debounce_seconds: config.debounce_seconds,
            timeout: config.timeout(),
        }
    }
}

/// Newest timestamp in a batch. Pi-hole returns rows oldest first, but
/// the maximum is taken so an unordered batch cannot hide a new query.
pub fn newest_timestamp(records: &[QueryRecord]) -> Option<i64> {
    records.iter().map(|r| r.timestamp).max()
}

/// True when `timestamp` is more than `debounce_seconds` past `watermark`
pub fn is_new_enough(timestamp: i64, watermark: i64, debounce_seconds: i64) -> bool {
    timestamp.saturating_sub(watermark) > debounce_seconds.max(0)
}

/// Watches one query log and fires [`QueryDetected`] on new lookups.
///
/// The watermark is owned by the tracker and only moves forward. A tracker
/// is driven by exactly one poll loop, which is why `check_once` takes
/// `&mut self` instead of locking.
pub struct Tracker {
    name: String,
    source: Arc<dyn QueryLog>,
    settings: TrackerSettings,
    watermark: i64,
    last_event: Option<QueryDetected>,
    subscribers: Subscribers,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("watermark", &self.watermark)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Tracker {
    /// Create a tracker whose watermark starts at the current time
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn QueryLog>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            watermark: Timestamp::now().epoch_seconds(),
            last_event: None,
            subscribers: Subscribers::new().with_delivery_timeout(settings.timeout),
            settings,
        }
    }

    /// Start from a known watermark instead of "now"
    pub fn with_watermark(mut self, watermark: i64) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn last_event(&self) -> Option<&QueryDetected> {
        self.last_event.as_ref()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        self.subscribers.subscribe(listener);
    }

    /// Run one poll-compare-emit cycle.
    ///
    /// Fetch failures and timeouts abort the cycle before any state is
    /// touched. On success a fresh observation is returned whether or not
    /// an event fired.
    pub async fn check_once(&mut self) -> crate::Result<StatusObservation> {
        let timeout = self.settings.timeout;
        let records = tokio::time::timeout(timeout, self.source.fetch_recent_queries())
            .await
            .map_err(|_| TrackerError::Timeout(timeout))??;

        let observation = StatusObservation {
            tracker: self.name.clone(),
            last_checked: Timestamp::now(),
        };

        let Some(newest) = newest_timestamp(&records) else {
            tracing::debug!("'{}': no queries found", self.name);
            return Ok(observation);
        };

        tracing::debug!(
            "'{}': last query {}, watermark {}",
            self.name,
            newest,
            self.watermark
        );

        if !is_new_enough(newest, self.watermark, self.settings.debounce_seconds) {
            return Ok(observation);
        }

        self.watermark = newest;
        tracing::info!("'{}': query detected at {}", self.name, newest);

        let event = QueryDetected {
            tracker: self.name.clone(),
            occurred_at: Timestamp::now(),
        };
        let delivered = self.subscribers.emit(&event).await;
        tracing::debug!(
            "'{}': event delivered to {}/{} listeners",
            self.name,
            delivered,
            self.subscribers.len()
        );
        self.last_event = Some(event);

        Ok(observation)
    }
}
