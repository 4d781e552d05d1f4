//! BDD test world for domain tracker service

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cucumber::World;
use domain_tracker::events::{EventListener, QueryDetected};
use domain_tracker::io::{HttpClient, HttpResponse};
use domain_tracker::tracker::{StatusObservation, Tracker};

/// How the fake Pi-hole answers the next request
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(HttpResponse),
    Hang(Duration),
}

impl Default for Scripted {
    fn default() -> Self {
        Scripted::Respond(HttpResponse {
            status: 200,
            body: r#"{"data": []}"#.to_string(),
        })
    }
}

/// An HTTP client whose GET answer is set by the steps
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    next: Mutex<Scripted>,
}

impl ScriptedHttp {
    pub fn set(&self, scripted: Scripted) {
        *self.next.lock().unwrap() = scripted;
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedHttp {
    async fn get(
        &self,
        _url: &str,
        _query: &[(&str, &str)],
    ) -> domain_tracker::Result<HttpResponse> {
        let scripted = self.next.lock().unwrap().clone();
        match scripted {
            Scripted::Respond(response) => Ok(response),
            Scripted::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(HttpResponse {
                    status: 200,
                    body: r#"{"data": []}"#.to_string(),
                })
            }
        }
    }

    async fn post_json(
        &self,
        _url: &str,
        _body: &serde_json::Value,
    ) -> domain_tracker::Result<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            body: String::new(),
        })
    }
}

/// Counts the events it receives
#[derive(Debug, Default)]
pub struct CountingListener {
    count: AtomicUsize,
}

impl CountingListener {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EventListener for CountingListener {
    fn name(&self) -> &str {
        "counting"
    }

    async fn on_query_detected(&self, _event: &QueryDetected) -> domain_tracker::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default, World)]
pub struct TrackerWorld {
    pub http: Arc<ScriptedHttp>,
    pub listener: Arc<CountingListener>,
    pub tracker: Option<Tracker>,
    pub last_result: Option<domain_tracker::Result<StatusObservation>>,
}
