//! Engine: runs one poll loop per tracker

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::state::StateHandle;
use crate::tracker::{StatusObservation, Tracker};

/// Consecutive failures after which a warning is logged
const FAILURE_WARNING_THRESHOLD: u32 = 5;

/// What the poll loop does after publishing a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Suspend,
}

/// The engine owns every tracker and drives their poll loops
pub struct Engine {
    trackers: Vec<(Tracker, Duration)>,
    state: StateHandle,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(state: StateHandle, cancel: CancellationToken) -> Self {
        Self {
            trackers: Vec::new(),
            state,
            cancel,
        }
    }

    /// Register a tracker to be polled every `interval`
    pub fn add_tracker(&mut self, tracker: Tracker, interval: Duration) {
        tracing::debug!(
            "Registered tracker '{}' (every {:?})",
            tracker.name(),
            interval
        );
        self.trackers.push((tracker, interval));
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    /// Start polling all trackers. Returns when the cancellation token is triggered.
    pub async fn run(self) {
        let mut handles = Vec::new();

        for (tracker, interval) in self.trackers {
            let state = self.state.clone();
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(async move {
                poll_loop(tracker, interval, state, cancel).await;
            }));
        }

        self.cancel.cancelled().await;

        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// Poll one tracker until cancelled or suspended.
///
/// The cycle is awaited inline, so a tick that comes due while a cycle is
/// still running is skipped rather than overlapping it. Cancellation
/// abandons an in-flight cycle and publishes nothing from it.
pub async fn poll_loop(
    mut tracker: Tracker,
    interval: Duration,
    state: StateHandle,
    cancel: CancellationToken,
) {
    let name = tracker.name().to_string();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => {
                tracing::debug!("Polling loop for '{}' cancelled", name);
                break;
            }
        }

        state.write().await.begin_cycle(&name);
        let result = tokio::select! {
            result = tracker.check_once() => result,
            _ = cancel.cancelled() => {
                tracing::debug!("Abandoning in-flight cycle for '{}' on shutdown", name);
                state.write().await.abandon_cycle(&name);
                break;
            }
        };

        if cancel.is_cancelled() {
            tracing::debug!("Discarding cycle result for '{}' after shutdown", name);
            state.write().await.abandon_cycle(&name);
            break;
        }

        if publish_cycle(&name, result, tracker.watermark(), &state).await == LoopControl::Suspend
        {
            break;
        }
    }
}

/// Publish a cycle outcome to the shared state and decide whether to keep polling
pub async fn publish_cycle(
    name: &str,
    result: crate::Result<StatusObservation>,
    watermark: i64,
    state: &StateHandle,
) -> LoopControl {
    match result {
        Ok(observation) => {
            tracing::debug!("'{}' last checked {}", name, observation.last_checked);
            state.write().await.record_success(&observation, watermark);
            LoopControl::Continue
        }
        Err(e) if e.requires_reauth() => {
            tracing::error!(
                "Tracker '{}' suspended, reauthentication required: {}",
                name,
                e
            );
            state.write().await.suspend(name, &e);
            LoopControl::Suspend
        }
        Err(e) => {
            let failures = state.write().await.record_failure(name, &e);
            tracing::warn!("Cycle for '{}' failed: {}", name, e);
            if failures == FAILURE_WARNING_THRESHOLD {
                tracing::warn!(
                    "Tracker '{}' has {} consecutive failures",
                    name,
                    failures
                );
            }
            LoopControl::Continue
        }
    }
}
