//! Remote API client.
//!
//! Requests go through a [`Transport`], which only moves bytes; everything
//! the API promises about its answers is checked here. Every answer must be a
//! JSON envelope `{ "success": bool, "data": ..., "error": "..." }`. A body
//! starting with markup (an HTML error page from a proxy or the web server) is
//! rejected before any JSON parsing.

use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::app_response::AppResponse;
use crate::identity;
use crate::model::{CatalogStats, ContentItem, Playlist, Preferences};

pub const CLIENT_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, without a leading slash.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), query: Vec::new(), body: None }
    }

    pub fn post(path: impl Into<String>, body: JsonValue) -> Self {
        Self { method: Method::Post, path: path.into(), query: Vec::new(), body: Some(body) }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self { method: Method::Delete, path: path.into(), query: Vec::new(), body: None }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Moves one request to the remote and returns the raw response body.
///
/// Implementations report unreachable hosts, timeouts and non-success HTTP
/// statuses as `NetworkError`. They must not interpret the body.
pub trait Transport: Send + Sync {
    fn send(&self, client_id: &str, request: &ApiRequest) -> Result<String, AppResponse>;
}

/// Blocking HTTP transport over a shared ureq agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .timeout_connect(Some(connect_timeout))
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for HttpTransport {
    fn send(&self, client_id: &str, request: &ApiRequest) -> Result<String, AppResponse> {
        if self.base_url.is_empty() {
            return Err(AppResponse::NetworkError("No API base URL configured".to_string()));
        }
        let url = self.url(&request.path);
        debug!("{:?} {}", request.method, url);

        let mut response = match request.method {
            Method::Get | Method::Delete => {
                let mut builder = if request.method == Method::Get {
                    self.agent.get(&url)
                } else {
                    self.agent.delete(&url)
                };
                builder = builder
                    .header(CLIENT_ID_HEADER, client_id)
                    .header("Accept", "application/json");
                for (key, value) in &request.query {
                    builder = builder.query(key, value);
                }
                builder.call()?
            }
            Method::Post => {
                let mut builder = self
                    .agent
                    .post(&url)
                    .header(CLIENT_ID_HEADER, client_id)
                    .header("Accept", "application/json")
                    .header("Content-Type", "application/json");
                for (key, value) in &request.query {
                    builder = builder.query(key, value);
                }
                let body = match &request.body {
                    Some(body) => serde_json::to_string(body)?,
                    None => "{}".to_string(),
                };
                builder.send(body)?
            }
        };

        let body = response.body_mut().read_to_string()?;
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: JsonValue,
    #[serde(default, alias = "message")]
    error: Option<String>,
}

/// True when the body is an HTML/XML page rather than API output.
pub fn looks_like_markup(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

/// Validates an API envelope and returns its `data` payload.
pub fn parse_envelope(body: &str) -> Result<JsonValue, AppResponse> {
    if looks_like_markup(body) {
        return Err(AppResponse::RemoteError("Received markup instead of JSON".to_string()));
    }
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| AppResponse::RemoteError(format!("Malformed API response: {e}")))?;
    if !envelope.success {
        let reason = envelope.error.unwrap_or_else(|| "unspecified".to_string());
        return Err(AppResponse::RemoteError(format!("API reported failure: {reason}")));
    }
    Ok(envelope.data)
}

fn decode<T: DeserializeOwned>(data: JsonValue) -> Result<T, AppResponse> {
    serde_json::from_value(data)
        .map_err(|e| AppResponse::RemoteError(format!("Unexpected API payload: {e}")))
}

#[derive(Debug, Deserialize)]
struct CreatedCode {
    code: String,
}

/// Typed view of the remote API for one client identity.
pub struct RemoteApi {
    transport: Box<dyn Transport>,
    client_id: String,
}

impl RemoteApi {
    pub fn new(transport: Box<dyn Transport>, client_id: String) -> Self {
        Self { transport, client_id }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn call(&self, request: ApiRequest) -> Result<JsonValue, AppResponse> {
        let body = self.transport.send(&self.client_id, &request)?;
        parse_envelope(&body)
    }

    pub fn status(&self) -> Result<(), AppResponse> {
        self.call(ApiRequest::get("status")).map(|_| ())
    }

    pub fn catalog_list(&self, limit: usize, offset: usize) -> Result<Vec<ContentItem>, AppResponse> {
        let data = self.call(
            ApiRequest::get("movies").query("limit", limit).query("offset", offset),
        )?;
        decode(data)
    }

    pub fn catalog_search(&self, query: &str, limit: usize) -> Result<Vec<ContentItem>, AppResponse> {
        let data = self.call(
            ApiRequest::get("movies/search").query("q", query).query("limit", limit),
        )?;
        decode(data)
    }

    pub fn catalog_random(&self, count: usize) -> Result<Vec<ContentItem>, AppResponse> {
        decode(self.call(ApiRequest::get("movies/random").query("count", count))?)
    }

    pub fn catalog_stats(&self) -> Result<CatalogStats, AppResponse> {
        decode(self.call(ApiRequest::get("stats"))?)
    }

    pub fn catalog_bulk_add(&self, items: &[ContentItem]) -> Result<(), AppResponse> {
        self.call(ApiRequest::post("movies/bulk", json!({ "movies": items })))
            .map(|_| ())
    }

    pub fn queue_get(&self) -> Result<Vec<ContentItem>, AppResponse> {
        decode(self.call(ApiRequest::get("queue"))?)
    }

    pub fn queue_add(&self, item: &ContentItem) -> Result<(), AppResponse> {
        let body = serde_json::to_value(item)?;
        self.call(ApiRequest::post("queue", body)).map(|_| ())
    }

    pub fn queue_remove(&self, title: &str) -> Result<(), AppResponse> {
        self.call(ApiRequest::delete("queue").query("title", title)).map(|_| ())
    }

    /// Replaces the remote queue with `items`.
    pub fn queue_sync(&self, items: &[ContentItem]) -> Result<(), AppResponse> {
        self.call(ApiRequest::post("queue/sync", json!({ "queue": items })))
            .map(|_| ())
    }

    pub fn preferences_get(&self) -> Result<Preferences, AppResponse> {
        decode(self.call(ApiRequest::get("preferences"))?)
    }

    pub fn preferences_save(&self, prefs: &Preferences) -> Result<(), AppResponse> {
        let body = serde_json::to_value(prefs)?;
        self.call(ApiRequest::post("preferences", body)).map(|_| ())
    }

    /// Returns the server-assigned share code.
    pub fn playlist_create(&self, playlist: &Playlist) -> Result<String, AppResponse> {
        let body = serde_json::to_value(playlist)?;
        let created: CreatedCode = decode(self.call(ApiRequest::post("playlists", body))?)?;
        Ok(created.code)
    }

    pub fn playlist_get(&self, code: &str) -> Result<Playlist, AppResponse> {
        if !identity::is_valid_share_code(code) {
            return Err(AppResponse::ValidationError(format!("Invalid share code '{code}'")));
        }
        decode(self.call(ApiRequest::get(format!("playlists/{code}")))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_is_rejected_before_parsing() {
        let err = parse_envelope("  <!DOCTYPE html><html>502</html>").unwrap_err();
        assert!(matches!(err, AppResponse::RemoteError(msg) if msg.contains("markup")));
    }

    #[test]
    fn envelope_requires_success_flag() {
        assert!(parse_envelope(r#"{"data": []}"#).is_err());
        assert!(parse_envelope("not json").is_err());
    }

    #[test]
    fn failed_envelope_carries_reason() {
        let err = parse_envelope(r#"{"success": false, "error": "db down"}"#).unwrap_err();
        assert_eq!(err, AppResponse::RemoteError("API reported failure: db down".to_string()));
    }

    #[test]
    fn successful_envelope_yields_data() {
        let data = parse_envelope(r#"{"success": true, "data": {"code": "AB12"}}"#).unwrap();
        assert_eq!(data["code"], "AB12");
        assert_eq!(parse_envelope(r#"{"success": true}"#).unwrap(), JsonValue::Null);
    }

    struct Unreachable;

    impl Transport for Unreachable {
        fn send(&self, _: &str, _: &ApiRequest) -> Result<String, AppResponse> {
            Err(AppResponse::NetworkError("no network in unit tests".to_string()))
        }
    }

    #[test]
    fn playlist_codes_are_checked_before_sending() {
        let api = RemoteApi::new(Box::new(Unreachable), "user_test".to_string());
        for code in ["", "AB/../queue", "AB?x=1", "AB 12"] {
            assert!(matches!(api.playlist_get(code), Err(AppResponse::ValidationError(_))));
        }
        assert!(matches!(api.playlist_get("AB-12"), Err(AppResponse::NetworkError(_))));
    }

    #[test]
    fn request_builder_collects_query() {
        let req = ApiRequest::get("movies").query("limit", 5).query("offset", 10);
        assert_eq!(req.method, Method::Get);
        assert_eq!(
            req.query,
            vec![("limit".to_string(), "5".to_string()), ("offset".to_string(), "10".to_string())]
        );
    }
}
