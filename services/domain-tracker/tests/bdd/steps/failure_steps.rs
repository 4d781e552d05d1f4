//! BDD step definitions for cycle failure feature

use std::time::Duration;

use cucumber::{given, then};

use domain_tracker::io::HttpResponse;
use domain_tracker::TrackerError;

use crate::world::{Scripted, TrackerWorld};

fn last_error(world: &TrackerWorld) -> &TrackerError {
    let result = world.last_result.as_ref().expect("no cycle result");
    result.as_ref().err().expect("cycle unexpectedly succeeded")
}

#[given(expr = "the query log answers HTTP {int}")]
fn log_answers_status(world: &mut TrackerWorld, status: u16) {
    world.http.set(Scripted::Respond(HttpResponse {
        status,
        body: String::new(),
    }));
}

#[given(expr = "the query log hangs for {int} seconds")]
fn log_hangs(world: &mut TrackerWorld, seconds: u64) {
    world.http.set(Scripted::Hang(Duration::from_secs(seconds)));
}

#[given(expr = "the query log answers {string}")]
fn log_answers_body(world: &mut TrackerWorld, body: String) {
    world.http.set(Scripted::Respond(HttpResponse { status: 200, body }));
}

#[then("the cycle should fail with a timeout")]
fn fails_with_timeout(world: &mut TrackerWorld) {
    let err = last_error(world);
    assert!(matches!(err, TrackerError::Timeout(_)), "{err:?}");
    assert!(err.is_retryable());
}

#[then(expr = "the cycle should fail with unexpected status {int}")]
fn fails_with_status(world: &mut TrackerWorld, status: u16) {
    let err = last_error(world);
    assert!(
        matches!(err, TrackerError::UnexpectedStatus(s) if *s == status),
        "{err:?}"
    );
}

#[then("the cycle should fail with a format error")]
fn fails_with_format(world: &mut TrackerWorld) {
    let err = last_error(world);
    assert!(matches!(err, TrackerError::Format(_)), "{err:?}");
}

#[then("the cycle should require reauthentication")]
fn requires_reauth(world: &mut TrackerWorld) {
    let err = last_error(world);
    assert!(err.requires_reauth(), "{err:?}");
}
