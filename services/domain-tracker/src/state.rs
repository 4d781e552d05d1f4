//! Shared tracker statuses read by the dashboard

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::events::{EventListener, QueryDetected};
use crate::tracker::{StatusObservation, Timestamp};
use crate::TrackerError;

/// Where a tracker's poll loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerPhase {
    /// Waiting for the next tick
    Idle,
    /// A cycle is in flight
    Checking,
    /// Stopped until the operator fixes the credentials
    Suspended,
}

impl std::fmt::Display for TrackerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerPhase::Idle => write!(f, "Idle"),
            TrackerPhase::Checking => write!(f, "Checking"),
            TrackerPhase::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Status of a single tracker
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub name: String,
    pub phase: TrackerPhase,
    pub polling_interval_ms: u64,
    pub watermark: i64,
    pub last_checked: Option<Timestamp>,
    pub last_event: Option<Timestamp>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl TrackerStatus {
    pub fn new(name: impl Into<String>, polling_interval_ms: u64, watermark: i64) -> Self {
        Self {
            name: name.into(),
            phase: TrackerPhase::Idle,
            polling_interval_ms,
            watermark,
            last_checked: None,
            last_event: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Shared state accessible by engine and dashboard
#[derive(Debug)]
pub struct SharedState {
    pub trackers: Vec<TrackerStatus>,
}

impl SharedState {
    pub fn new(trackers: Vec<TrackerStatus>) -> Self {
        Self { trackers }
    }

    pub fn get(&self, name: &str) -> Option<&TrackerStatus> {
        self.trackers.iter().find(|t| t.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut TrackerStatus> {
        self.trackers.iter_mut().find(|t| t.name == name)
    }

    /// Mark a cycle as started. Returns false for unknown trackers.
    pub fn begin_cycle(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(status) => {
                status.phase = TrackerPhase::Checking;
                true
            }
            None => false,
        }
    }

    /// Return a tracker to idle after its cycle was abandoned at shutdown.
    /// Nothing the cycle observed is published.
    pub fn abandon_cycle(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(status) if status.phase == TrackerPhase::Checking => {
                status.phase = TrackerPhase::Idle;
                true
            }
            _ => false,
        }
    }

    /// Publish a successful cycle, replacing the previous observation
    pub fn record_success(
        &mut self,
        observation: &StatusObservation,
        watermark: i64,
    ) -> bool {
        match self.get_mut(&observation.tracker) {
            Some(status) => {
                status.phase = TrackerPhase::Idle;
                status.last_checked = Some(observation.last_checked.clone());
                status.watermark = watermark;
                status.consecutive_failures = 0;
                status.last_error = None;
                true
            }
            None => false,
        }
    }

    /// Count a failed cycle, returning the number of consecutive failures
    pub fn record_failure(&mut self, name: &str, error: &TrackerError) -> u32 {
        match self.get_mut(name) {
            Some(status) => {
                status.phase = TrackerPhase::Idle;
                status.consecutive_failures += 1;
                status.last_error = Some(error.to_string());
                status.consecutive_failures
            }
            None => 0,
        }
    }

    pub fn record_event(&mut self, event: &QueryDetected) -> bool {
        match self.get_mut(&event.tracker) {
            Some(status) => {
                status.last_event = Some(event.occurred_at.clone());
                true
            }
            None => false,
        }
    }

    pub fn suspend(&mut self, name: &str, error: &TrackerError) -> bool {
        match self.get_mut(name) {
            Some(status) => {
                status.phase = TrackerPhase::Suspended;
                status.last_error = Some(error.to_string());
                true
            }
            None => false,
        }
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<SharedState>>;

pub fn new_state_handle(trackers: Vec<TrackerStatus>) -> StateHandle {
    Arc::new(RwLock::new(SharedState::new(trackers)))
}

/// Listener that mirrors detections into the shared state
#[derive(Debug, Clone)]
pub struct StateRecorder {
    state: StateHandle,
}

impl StateRecorder {
    pub fn new(state: StateHandle) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventListener for StateRecorder {
    fn name(&self) -> &str {
        "dashboard"
    }

    async fn on_query_detected(&self, event: &QueryDetected) -> crate::Result<()> {
        self.state.write().await.record_event(event);
        Ok(())
    }
}
