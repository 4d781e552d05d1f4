//! Domain tracker - Pi-hole query log watcher
//!
//! Polls a Pi-hole query log, detects when a monitored client has looked up a
//! monitored domain, and fires a "query detected" event to its listeners.

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod events;
pub mod io;
pub mod state;
pub mod tracker;
pub mod upstream;
pub mod webhook;

pub use config::{load_config, Config};
pub use error::{Result, TrackerError};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::events::EventListener;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::state::{StateRecorder, TrackerStatus};
use crate::tracker::{Tracker, TrackerSettings};
use crate::upstream::PiHoleClient;
use crate::webhook::WebhookListener;

/// Check that every configured Pi-hole is reachable and accepts its token
pub async fn check_endpoints(config: &Config, http: Arc<dyn HttpClient>) -> Result<()> {
    for tracker_config in &config.trackers {
        let client = PiHoleClient::new(tracker_config, Arc::clone(&http));
        tracing::debug!("Validating '{}' at {}", tracker_config.name, client.url());
        if let Err(e) = client.validate().await {
            tracing::error!("Tracker '{}' failed validation: {}", tracker_config.name, e);
            return Err(e);
        }
        tracing::info!("Tracker '{}' validated", tracker_config.name);
    }
    Ok(())
}

/// Run the domain tracker service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    check_endpoints(&config, Arc::clone(&http)).await?;

    let cancel = CancellationToken::new();

    // Listeners shared by every tracker
    let listeners: Vec<Arc<dyn EventListener>> = config
        .webhooks
        .iter()
        .map(|webhook| {
            Arc::new(WebhookListener::new(webhook, Arc::clone(&http))) as Arc<dyn EventListener>
        })
        .collect();

    // Build trackers
    let mut trackers = Vec::new();
    for tracker_config in &config.trackers {
        let source = Arc::new(PiHoleClient::new(tracker_config, Arc::clone(&http)));
        let tracker = Tracker::new(
            tracker_config.name.clone(),
            source,
            TrackerSettings::from(tracker_config),
        );
        trackers.push((tracker, tracker_config.polling_interval()));
    }

    if trackers.is_empty() {
        tracing::warn!("No trackers configured");
    }

    // Build shared state
    let statuses = trackers
        .iter()
        .map(|(tracker, interval)| {
            TrackerStatus::new(
                tracker.name(),
                interval.as_millis() as u64,
                tracker.watermark(),
            )
        })
        .collect();
    let state = state::new_state_handle(statuses);
    let recorder: Arc<dyn EventListener> = Arc::new(StateRecorder::new(Arc::clone(&state)));

    // Build engine
    let mut engine = Engine::new(Arc::clone(&state), cancel.clone());
    for (mut tracker, interval) in trackers {
        tracker.subscribe(Arc::clone(&recorder));
        for listener in &listeners {
            tracker.subscribe(Arc::clone(listener));
        }
        engine.add_tracker(tracker, interval);
    }

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    // Start dashboard if enabled
    if config.dashboard.enabled {
        let dashboard_port = config.dashboard.port;
        let dashboard_state = Arc::clone(&state);
        let cancel_for_dashboard = cancel.clone();

        tokio::spawn(async move {
            let router = dashboard::build_router(dashboard_state);
            let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
            tracing::info!("Dashboard listening on http://{}", addr);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(
                        "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                        dashboard_port,
                        e
                    );
                    return;
                }
            };

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_for_dashboard.cancelled().await;
                })
                .await
                .ok();

            tracing::debug!("Dashboard stopped");
        });
    }

    tracing::info!("Domain tracker started with {} tracker(s)", engine.tracker_count());

    // Run the engine (blocks until cancelled)
    engine.run().await;
    tracing::info!("Domain tracker stopped");

    Ok(())
}
