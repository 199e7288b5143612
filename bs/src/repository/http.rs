//! REST record store client
//!
//! Lists with `GET {base}/{resource}`, creates with `POST {base}/{resource}`
//! and updates with `PATCH {base}/{resource}/{id}`. List responses may be a
//! bare JSON array or a page envelope `{"items": [...], "nextPage": n}`;
//! envelopes are followed until `nextPage` is null. A listing that revisits a
//! page or exceeds the page cap is an error, never a partial result.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Repository, RepositoryError, in_scope};
use crate::config::RemoteConfig;
use crate::domain::{Payload, RecordId, RemoteRecord};
use crate::scope::ScopeFilter;

/// Upper bound on followed pages
const MAX_PAGES: u64 = 10_000;

/// Default retry-after when a 429 carries no usable header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub struct HttpRepository {
    base_url: String,
    resource: String,
    api_key: Option<String>,
    http: Client,
    timeout: Duration,
}

impl HttpRepository {
    pub fn new(
        base_url: impl Into<String>,
        resource: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let resource = resource.into().trim_matches('/').to_string();
        debug!(%base_url, %resource, "HttpRepository::new: called");
        let http = Client::builder().timeout(timeout).build().map_err(RepositoryError::Network)?;
        Ok(Self {
            base_url,
            resource,
            api_key,
            http,
            timeout,
        })
    }

    /// Build from configuration; the API key is read from the configured
    /// environment variable when it is set
    pub fn from_config(config: &RemoteConfig, resource: &str) -> Result<Self, RepositoryError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| RepositoryError::Other("remote.base-url is not configured".to_string()))?;
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!(env = %config.api_key_env, "HttpRepository::from_config: no API key, sending unauthenticated requests");
        }
        Self::new(base_url, resource, api_key, config.timeout())
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.resource)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, RepositoryError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                RepositoryError::Timeout(self.timeout)
            } else {
                RepositoryError::Network(e)
            }
        })?;
        check_response(response).await
    }
}

async fn check_response(response: Response) -> Result<Value, RepositoryError> {
    let status = response.status().as_u16();

    if status == 429 {
        debug!("check_response: rate limited (429)");
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(RepositoryError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    let text = response.text().await?;
    if !(200..300).contains(&status) {
        debug!(%status, "check_response: API error");
        let body = serde_json::from_str::<Value>(&text)
            .ok()
            .or_else(|| (!text.trim().is_empty()).then(|| Value::String(text.clone())));
        return Err(RepositoryError::api(status, body));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Split a list response into its records and the next page number
fn split_page(body: Value) -> Result<(Vec<Value>, Option<u64>), RepositoryError> {
    match body {
        Value::Array(items) => Ok((items, None)),
        Value::Object(mut map) => {
            let items = match map.remove("items") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(RepositoryError::InvalidResponse(
                        "list response is neither an array nor a page with items".to_string(),
                    ));
                }
            };
            let next = map.get("nextPage").and_then(Value::as_u64);
            Ok((items, next))
        }
        other => Err(RepositoryError::InvalidResponse(format!("unexpected list response: {}", other))),
    }
}

/// Page numbers followed by one listing
///
/// The first request carries no page number. Every later page must be new
/// and the total stays within `max_pages`.
#[derive(Debug)]
struct PageCursor {
    current: Option<u64>,
    visited: HashSet<u64>,
    fetched: u64,
    max_pages: u64,
}

impl PageCursor {
    fn new(max_pages: u64) -> Self {
        Self {
            current: None,
            visited: HashSet::new(),
            fetched: 0,
            max_pages,
        }
    }

    fn current(&self) -> Option<u64> {
        self.current
    }

    /// Record a received page and move to `next`. Returns false when the
    /// listing is complete.
    fn advance(&mut self, next: Option<u64>, empty: bool) -> Result<bool, RepositoryError> {
        self.fetched += 1;
        if let Some(page) = self.current {
            self.visited.insert(page);
        }
        let Some(next) = next.filter(|_| !empty) else {
            return Ok(false);
        };
        if self.visited.contains(&next) {
            warn!(page = next, "PageCursor::advance: page already listed");
            return Err(RepositoryError::InvalidResponse(format!(
                "pagination revisits page {next}; listing would be incomplete"
            )));
        }
        if self.fetched >= self.max_pages {
            warn!(max_pages = self.max_pages, "PageCursor::advance: page cap reached");
            return Err(RepositoryError::InvalidResponse(format!(
                "listing exceeds {} pages; refusing a partial result",
                self.max_pages
            )));
        }
        self.current = Some(next);
        Ok(true)
    }
}

/// Convert a store JSON object into a RemoteRecord
pub(crate) fn parse_record(value: Value) -> Result<RemoteRecord, RepositoryError> {
    let Value::Object(fields) = value else {
        return Err(RepositoryError::InvalidResponse("record is not a JSON object".to_string()));
    };
    let id = match fields.get("id") {
        Some(Value::Number(n)) => RecordId::new(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => RecordId::new(s.clone()),
        _ => return Err(RepositoryError::InvalidResponse("record has no id".to_string())),
    };
    let created_at = fields.get("created_at").and_then(parse_timestamp);
    let mut record = RemoteRecord::new(id, fields);
    record.created_at = created_at;
    Ok(record)
}

/// Millisecond epoch (numeric or string) or RFC 3339 timestamp
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single())),
        _ => None,
    }
}

#[async_trait]
impl Repository for HttpRepository {
    async fn list(&self, scope: Option<&ScopeFilter>) -> Result<Vec<RemoteRecord>, RepositoryError> {
        debug!(resource = %self.resource, ?scope, "HttpRepository::list: called");
        let url = self.collection_url();
        let mut records = Vec::new();
        let mut cursor = PageCursor::new(MAX_PAGES);

        loop {
            let mut request = self.http.get(&url);
            if let Some(scope) = scope {
                request = request.query(&[(scope.field.as_str(), scope.value.as_str())]);
            }
            if let Some(page) = cursor.current() {
                request = request.query(&[("page", page)]);
            }

            let (items, next) = split_page(self.send(request).await?)?;
            debug!(count = items.len(), ?next, "HttpRepository::list: page received");
            let empty = items.is_empty();
            for item in items {
                records.push(parse_record(item)?);
            }

            if !cursor.advance(next, empty)? {
                break;
            }
        }

        // Stores that ignore the scope query still get narrowed here
        let fetched = records.len();
        records.retain(|r| in_scope(r, scope));
        if records.len() != fetched {
            debug!(fetched, kept = records.len(), "HttpRepository::list: filtered out-of-scope records");
        }
        Ok(records)
    }

    async fn create(&self, payload: Payload) -> Result<RemoteRecord, RepositoryError> {
        debug!(resource = %self.resource, "HttpRepository::create: called");
        let request = self.http.post(self.collection_url()).json(&payload);
        let body = self.send(request).await?;
        parse_record(body).inspect_err(|e| warn!(error = %e, "HttpRepository::create: unexpected response"))
    }

    async fn update(&self, id: &RecordId, payload: Payload) -> Result<RemoteRecord, RepositoryError> {
        debug!(resource = %self.resource, %id, "HttpRepository::update: called");
        let url = format!("{}/{}", self.collection_url(), id);
        let body = self.send(self.http.patch(url).json(&payload)).await?;
        parse_record(body).inspect_err(|e| warn!(error = %e, "HttpRepository::update: unexpected response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_page_array() {
        let (items, next) = split_page(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(next, None);
    }

    #[test]
    fn test_split_page_envelope() {
        let (items, next) = split_page(json!({"items": [{"id": 1}], "curPage": 1, "nextPage": 2})).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(next, Some(2));

        let (_, last) = split_page(json!({"items": [], "nextPage": null})).unwrap();
        assert_eq!(last, None);
    }

    #[test]
    fn test_split_page_rejects_other_shapes() {
        assert!(split_page(json!({"records": []})).is_err());
        assert!(split_page(json!("nope")).is_err());
    }

    #[test]
    fn test_page_cursor_follows_until_last_page() {
        let mut cursor = PageCursor::new(10);
        assert_eq!(cursor.current(), None);
        assert!(cursor.advance(Some(2), false).unwrap());
        assert_eq!(cursor.current(), Some(2));
        assert!(cursor.advance(Some(3), false).unwrap());
        assert!(!cursor.advance(None, false).unwrap());
    }

    #[test]
    fn test_page_cursor_empty_page_ends_listing() {
        let mut cursor = PageCursor::new(10);
        assert!(!cursor.advance(Some(2), true).unwrap());
    }

    #[test]
    fn test_page_cursor_rejects_cycle() {
        let mut cursor = PageCursor::new(10);
        assert!(cursor.advance(Some(1), false).unwrap());
        assert!(cursor.advance(Some(2), false).unwrap());
        let err = cursor.advance(Some(1), false).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidResponse(_)));

        let mut cursor = PageCursor::new(10);
        assert!(cursor.advance(Some(4), false).unwrap());
        assert!(cursor.advance(Some(4), false).is_err());
    }

    #[test]
    fn test_page_cursor_rejects_exceeding_cap() {
        let mut cursor = PageCursor::new(3);
        assert!(cursor.advance(Some(2), false).unwrap());
        assert!(cursor.advance(Some(3), false).unwrap());
        let err = cursor.advance(Some(4), false).unwrap_err();
        assert!(err.to_string().contains("3 pages"), "{err}");
    }

    #[test]
    fn test_parse_record_numeric_id_and_epoch() {
        let record = parse_record(json!({"id": 42, "created_at": 1_735_689_600_000i64, "name": "Jane"})).unwrap();
        assert_eq!(record.id.as_str(), "42");
        assert_eq!(record.created_at.unwrap().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(record.field("name"), Some(&json!("Jane")));
    }

    #[test]
    fn test_parse_record_string_id_and_rfc3339() {
        let record = parse_record(json!({"id": "abc", "created_at": "2025-01-01T10:00:00Z"})).unwrap();
        assert_eq!(record.id.as_str(), "abc");
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_parse_record_without_id_fails() {
        assert!(parse_record(json!({"name": "x"})).is_err());
        assert!(parse_record(json!([1])).is_err());
    }

    #[test]
    fn test_new_trims_url_parts() {
        let repo = HttpRepository::new("https://x.example/api/", "/nic_cc_customer/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(repo.collection_url(), "https://x.example/api/nic_cc_customer");
    }
}
