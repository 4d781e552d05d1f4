//! Pi-hole query log client

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

use crate::config::TrackerConfig;
use crate::io::{HttpClient, HttpResponse};
use crate::TrackerError;

/// A single row of the Pi-hole query log.
///
/// The API encodes rows as positional arrays:
/// `[timestamp, type, domain, client, status, ...]`. Only the fields the
/// tracker cares about are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    /// Epoch seconds
    pub timestamp: i64,
    pub domain: Option<String>,
    pub client: Option<String>,
}

impl<'de> Deserialize<'de> for QueryRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(QueryRecordVisitor)
    }
}

struct QueryRecordVisitor;

impl<'de> Visitor<'de> for QueryRecordVisitor {
    type Value = QueryRecord;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a query log row starting with an epoch timestamp")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<QueryRecord, A::Error> {
        let first: serde_json::Value = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let timestamp = parse_timestamp(&first).ok_or_else(|| {
            de::Error::custom(format!("invalid timestamp ({})", json_kind(&first)))
        })?;

        let mut fields: Vec<serde_json::Value> = Vec::new();
        while let Some(value) = seq.next_element::<serde_json::Value>()? {
            fields.push(value);
        }
        let text = |index: usize| {
            fields
                .get(index)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Ok(QueryRecord {
            timestamp,
            // indices are shifted by one because the timestamp was consumed
            domain: text(1),
            client: text(2),
        })
    }
}

/// Timestamps arrive as strings in Pi-hole v5 but some builds emit numbers
/// Shape of a rejected value; the value itself is never echoed into errors
fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "non-numeric string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn parse_timestamp(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct QueryLogResponse {
    data: Vec<QueryRecord>,
}

/// Source of recent query records for one tracker
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait QueryLog: Send + Sync {
    /// Fetch the queries matching the tracker's client/domain filter
    async fn fetch_recent_queries(&self) -> crate::Result<Vec<QueryRecord>>;
}

/// Client for the Pi-hole `admin/api.php` endpoint
pub struct PiHoleClient {
    url: String,
    access_token: String,
    client: String,
    domain: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for PiHoleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiHoleClient")
            .field("url", &self.url)
            .field("client", &self.client)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl PiHoleClient {
    pub fn new(config: &TrackerConfig, http: Arc<dyn HttpClient>) -> Self {
        let url = format!("http://{}/admin/api.php", config.address);
        tracing::debug!(
            "Created PiHoleClient for '{}' at {} (client={}, domain={})",
            config.name,
            url,
            config.client,
            config.domain
        );

        Self {
            url,
            access_token: config.access_token.clone(),
            client: config.client.clone(),
            domain: config.domain.clone(),
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Setup check: the appliance answers on its API endpoint
    pub async fn check_connectivity(&self) -> crate::Result<()> {
        let response = self.http.get(&self.url, &[]).await?;
        if response.status != 200 {
            return Err(TrackerError::Transport(format!(
                "{} answered HTTP {}",
                self.url, response.status
            )));
        }
        Ok(())
    }

    /// Setup check: the access token is accepted
    pub async fn check_auth(&self) -> crate::Result<()> {
        let response = self
            .http
            .get(
                &self.url,
                &[("getAllQueries", "1"), ("auth", self.access_token.as_str())],
            )
            .await?;

        if response.status != 200 {
            return Err(TrackerError::Auth(format!(
                "{} answered HTTP {}",
                self.url, response.status
            )));
        }

        // Pi-hole answers a rejected token with 200 and an empty array
        let body: serde_json::Value = serde_json::from_str(&response.body)
            .map_err(|_| TrackerError::Auth("response is not JSON".to_string()))?;
        if body.get("data").is_none() {
            return Err(TrackerError::Auth(
                "access token was not accepted".to_string(),
            ));
        }
        Ok(())
    }

    /// Run both setup checks, connectivity first
    pub async fn validate(&self) -> crate::Result<()> {
        self.check_connectivity().await?;
        self.check_auth().await
    }

    fn parse(response: HttpResponse) -> crate::Result<Vec<QueryRecord>> {
        match response.status {
            200 => {}
            401 | 403 => {
                return Err(TrackerError::Auth(format!(
                    "query log request rejected with HTTP {}",
                    response.status
                )))
            }
            status => return Err(TrackerError::UnexpectedStatus(status)),
        }

        let parsed: QueryLogResponse = serde_json::from_str(&response.body)?;
        Ok(parsed.data)
    }
}

#[async_trait]
impl QueryLog for PiHoleClient {
    async fn fetch_recent_queries(&self) -> crate::Result<Vec<QueryRecord>> {
        let response = self
            .http
            .get(
                &self.url,
                &[
                    ("getAllQueries", "1"),
                    ("auth", self.access_token.as_str()),
                    ("domain", self.domain.as_str()),
                    ("client", self.client.as_str()),
                ],
            )
            .await?;

        let records = Self::parse(response)?;
        tracing::debug!("Fetched {} queries for {}", records.len(), self.domain);
        Ok(records)
    }
}
