//! BDD step definitions for query detection feature

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};

use domain_tracker::config::TrackerConfig;
use domain_tracker::io::HttpResponse;
use domain_tracker::tracker::{Timestamp, Tracker, TrackerSettings};
use domain_tracker::upstream::PiHoleClient;

use crate::world::{Scripted, TrackerWorld};

fn test_config() -> TrackerConfig {
    TrackerConfig {
        name: "Camera".to_string(),
        address: "pi.hole".to_string(),
        access_token: "secret".to_string(),
        client: "192.168.1.50".to_string(),
        domain: "example.com".to_string(),
        polling_interval_seconds: 5,
        timeout_seconds: 10,
        debounce_seconds: 30,
    }
}

pub fn build_tracker(world: &mut TrackerWorld, watermark: i64, settings: TrackerSettings) {
    let source = Arc::new(PiHoleClient::new(&test_config(), world.http.clone()));
    let mut tracker = Tracker::new("Camera", source, settings).with_watermark(watermark);
    tracker.subscribe(world.listener.clone());
    world.tracker = Some(tracker);
}

#[given(expr = "a tracker with watermark {int}")]
fn tracker_with_watermark(world: &mut TrackerWorld, watermark: i64) {
    build_tracker(world, watermark, TrackerSettings::default());
}

#[given(expr = "a tracker with watermark {int} and a fetch timeout of {int} milliseconds")]
fn tracker_with_timeout(world: &mut TrackerWorld, watermark: i64, timeout_ms: u64) {
    let settings = TrackerSettings {
        timeout: Duration::from_millis(timeout_ms),
        ..TrackerSettings::default()
    };
    build_tracker(world, watermark, settings);
}

#[given(expr = "the query log returns timestamps {string}")]
fn log_returns(world: &mut TrackerWorld, stamps: String) {
    script_timestamps(world, &stamps);
}

#[when(expr = "the query log starts returning timestamps {string}")]
fn log_starts_returning(world: &mut TrackerWorld, stamps: String) {
    script_timestamps(world, &stamps);
}

fn script_timestamps(world: &mut TrackerWorld, stamps: &str) {
    let rows: Vec<String> = stamps
        .split(',')
        .map(|s| format!(r#"["{}","A","example.com","192.168.1.50","2"]"#, s.trim()))
        .collect();
    world.http.set(Scripted::Respond(HttpResponse {
        status: 200,
        body: format!(r#"{{"data": [{}]}}"#, rows.join(",")),
    }));
}

#[given("the query log is empty")]
fn log_empty(world: &mut TrackerWorld) {
    world.http.set(Scripted::Respond(HttpResponse {
        status: 200,
        body: r#"{"data": []}"#.to_string(),
    }));
}

#[when("the tracker checks once")]
async fn check_once(world: &mut TrackerWorld) {
    let tracker = world.tracker.as_mut().expect("tracker not set");
    world.last_result = Some(tracker.check_once().await);
}

#[when(expr = "the tracker checks {int} times")]
async fn check_many(world: &mut TrackerWorld, times: usize) {
    let tracker = world.tracker.as_mut().expect("tracker not set");
    for _ in 0..times {
        world.last_result = Some(tracker.check_once().await);
    }
}

#[then("no event should have been emitted")]
fn no_event(world: &mut TrackerWorld) {
    assert_eq!(world.listener.count(), 0);
}

#[then(expr = "exactly {int} event(s) should have been emitted")]
fn exact_events(world: &mut TrackerWorld, expected: usize) {
    assert_eq!(world.listener.count(), expected);
}

#[then(expr = "the watermark should be {int}")]
fn watermark_is(world: &mut TrackerWorld, expected: i64) {
    let tracker = world.tracker.as_ref().expect("tracker not set");
    assert_eq!(tracker.watermark(), expected);
}

#[then("a last checked time should be reported")]
fn last_checked_reported(world: &mut TrackerWorld) {
    let result = world.last_result.as_ref().expect("no cycle result");
    let observation = result.as_ref().expect("cycle failed");
    let now = Timestamp::now().epoch_ms;
    assert!(observation.last_checked.epoch_ms <= now);
    assert!(now - observation.last_checked.epoch_ms < 5_000);
    assert!(!observation.last_checked.display.is_empty());
}
