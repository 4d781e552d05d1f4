//! Web dashboard with JSON status endpoint

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;

use crate::state::{StateHandle, TrackerPhase};

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub state: StateHandle,
}

/// Build the dashboard axum router
pub fn build_router(state: StateHandle) -> Router {
    let dashboard_state = DashboardState { state };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(dashboard_state)
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;

    let tracker_rows: String = state
        .trackers
        .iter()
        .map(|t| {
            let (color, bg) = match t.phase {
                TrackerPhase::Idle => ("#155724", "#d4edda"),
                TrackerPhase::Checking => ("#004085", "#cce5ff"),
                TrackerPhase::Suspended => ("#721c24", "#f8d7da"),
            };
            let last_checked = t
                .last_checked
                .as_ref()
                .map(|ts| escape_html(&ts.display))
                .unwrap_or_else(|| "Never".to_string());
            let last_event = t
                .last_event
                .as_ref()
                .map(|ts| escape_html(&ts.display))
                .unwrap_or_else(|| "-".to_string());
            format!(
                r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">
                        <span style="display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; color: {}; background-color: {};">{}</span>
                    </td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                </tr>"#,
                escape_html(&t.name),
                color,
                bg,
                t.phase,
                last_checked,
                last_event,
                t.consecutive_failures,
                escape_html(t.last_error.as_deref().unwrap_or(""))
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta http-equiv="refresh" content="5">
    <title>Domain Tracker</title>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem;">
    <h1>Domain Tracker</h1>
    <table style="width: 100%; border-collapse: collapse;">
        <thead>
            <tr style="border-bottom: 2px solid #dee2e6;">
                <th style="padding: 0.5rem; text-align: left;">Tracker</th>
                <th style="padding: 0.5rem; text-align: left;">Phase</th>
                <th style="padding: 0.5rem; text-align: left;">Last Checked</th>
                <th style="padding: 0.5rem; text-align: left;">Last Detection</th>
                <th style="padding: 0.5rem; text-align: left;">Failures</th>
                <th style="padding: 0.5rem; text-align: left;">Last Error</th>
            </tr>
        </thead>
        <tbody>{tracker_rows}</tbody>
    </table>
</body>
</html>"#,
        tracker_rows = tracker_rows,
    );

    Html(html)
}

/// Escape text for interpolation into HTML element content
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;

    let statuses: Vec<serde_json::Value> = state
        .trackers
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "phase": t.phase,
                "last_checked": t.last_checked.as_ref().map(|ts| &ts.display),
                "last_checked_epoch_ms": t.last_checked.as_ref().map(|ts| ts.epoch_ms),
                "last_event": t.last_event.as_ref().map(|ts| &ts.display),
                "watermark": t.watermark,
                "consecutive_failures": t.consecutive_failures,
                "last_error": t.last_error,
                "polling_interval_ms": t.polling_interval_ms,
            })
        })
        .collect();

    axum::Json(statuses)
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
