//! REST gateway: verb-level operations against one configured backend.
//!
//! Every call goes through the same pipeline:
//! cache lookup (reads) -> rate-limiter admission -> HTTP -> decode -> retry on transient
//! failure -> cache populate (reads) / cache invalidation (writes).

use crate::cache::{ResponseCache, fingerprint};
use crate::config::{AuthConfig, RestBackendConfig};
use crate::error::{RestError, Result};
use crate::limiter::RateLimiter;
use crate::safety::{check_same_origin, redact_url, same_origin_redirects};
use crate::semantics::Verb;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// One outbound REST call, as built by a tool handler.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub verb: Verb,
    pub path: String,
    pub query: Option<Map<String, Value>>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Per-call timeout override.
    pub timeout: Option<Duration>,
}

impl RestRequest {
    #[must_use]
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            query: None,
            body: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: Option<Map<String, Value>>) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Shared handle to the REST backend.
///
/// Owns the HTTP connection pool, the rate limiter and the response cache. Cloning is cheap and
/// every clone shares the same state.
#[derive(Clone)]
pub struct RestGateway {
    inner: Arc<RestGatewayInner>,
}

struct RestGatewayInner {
    config: RestBackendConfig,
    base_url: Url,
    client: Client,
    limiter: RateLimiter,
    cache: ResponseCache,
}

/// A failed attempt, with the server's `Retry-After` hint if it sent one.
struct AttemptFailure {
    error: RestError,
    retry_after: Option<Duration>,
}

impl From<RestError> for AttemptFailure {
    fn from(error: RestError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl RestGateway {
    /// Build a gateway from an immutable config bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: RestBackendConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            RestError::Config(format!("Invalid baseUrl '{}': {e}", config.base_url))
        })?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(RestError::Config(format!(
                "Invalid baseUrl '{}': scheme must be http or https",
                config.base_url
            )));
        }

        let client = Client::builder()
            .redirect(same_origin_redirects(&base_url))
            .build()
            .map_err(|e| RestError::Config(format!("failed to build HTTP client: {e}")))?;

        let limiter = RateLimiter::from_config(&config.rate_limit);
        let cache = ResponseCache::new(config.cache.ttl());

        Ok(Self {
            inner: Arc::new(RestGatewayInner {
                config,
                base_url,
                client,
                limiter,
                cache,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RestBackendConfig {
        &self.inner.config
    }

    /// Base URL with credentials, query and fragment stripped (safe to log).
    #[must_use]
    pub fn redacted_base_url(&self) -> String {
        redact_url(&self.inner.base_url)
    }

    /// `GET path?query`, served from the cache when possible.
    ///
    /// # Errors
    ///
    /// See [`RestGateway::execute`].
    pub async fn fetch(
        &self,
        path: &str,
        query: Option<Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let req = RestRequest::new(Verb::Get, path)
            .with_query(query)
            .with_timeout(timeout);
        self.execute(&req).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`RestGateway::execute`].
    pub async fn create(
        &self,
        path: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let req = RestRequest::new(Verb::Post, path)
            .with_body(Some(body))
            .with_timeout(timeout);
        self.execute(&req).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`RestGateway::execute`].
    pub async fn replace(
        &self,
        path: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let req = RestRequest::new(Verb::Put, path)
            .with_body(Some(body))
            .with_timeout(timeout);
        self.execute(&req).await
    }

    /// `DELETE path?query`.
    ///
    /// # Errors
    ///
    /// See [`RestGateway::execute`].
    pub async fn remove(
        &self,
        path: &str,
        query: Option<Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let req = RestRequest::new(Verb::Delete, path)
            .with_query(query)
            .with_timeout(timeout);
        self.execute(&req).await
    }

    /// Execute a REST call and return the decoded JSON body.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an empty/malformed path or unusable headers
    /// - `Blocked` if the resolved URL leaves the backend's origin
    /// - `Transport` for network failures and timeouts (after retries)
    /// - `Backend` for non-2xx responses (after retries, for retryable statuses)
    /// - `Decode` if a 2xx body is not JSON
    pub async fn execute(&self, req: &RestRequest) -> Result<Value> {
        let path = normalize_path(&req.path)?;
        let query = query_pairs(req.query.as_ref());

        if !req.verb.is_read() {
            let result = self.send_with_retry(req, &path, &query).await;
            // Invalidate even on failure: the backend may have applied the write anyway.
            self.invalidate_after_write(&path);
            return result;
        }

        let key = fingerprint(req.verb, &path, &query);
        if let Some(hit) = self.inner.cache.get(&key) {
            debug!(key = %key, "response cache hit");
            return Ok(hit);
        }
        debug!(key = %key, "response cache miss");

        let cache = &self.inner.cache;
        let generation = cache.generation();
        let value = self.send_with_retry(req, &path, &query).await?;
        if cache.is_enabled() && !cache.put_if_current(key, &path, value.clone(), generation) {
            debug!(path = %path, "write landed during read; response not cached");
        }
        Ok(value)
    }

    fn invalidate_after_write(&self, path: &str) {
        let cache = &self.inner.cache;
        let mut removed = cache.invalidate_prefix(path);
        for ancestor in ancestor_paths(path) {
            removed += cache.invalidate_exact(&ancestor);
        }
        if removed > 0 {
            debug!(path = %path, removed, "invalidated cached reads after write");
        }
    }

    async fn send_with_retry(
        &self,
        req: &RestRequest,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Value> {
        let url = self.build_url(path, query)?;
        check_same_origin(&self.inner.base_url, &url)?;

        let policy = &self.inner.config.retry;
        let max_attempts = policy.max_attempts();
        let mut attempt: u32 = 1;
        loop {
            let failure = match self.send_once(req, &url).await {
                Ok(v) => return Ok(v),
                Err(f) => f,
            };

            if attempt >= max_attempts || !failure.error.is_retryable(policy) {
                return Err(failure.error);
            }

            let delay = policy.delay_with_hint(attempt, failure.retry_after);
            warn!(
                verb = %req.verb,
                url = %redact_url(&url),
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %failure.error,
                "REST call failed; retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt = attempt.saturating_add(1);
        }
    }

    async fn send_once(
        &self,
        req: &RestRequest,
        url: &Url,
    ) -> std::result::Result<Value, AttemptFailure> {
        let inner = &self.inner;
        let _admission = inner.limiter.acquire().await?;

        let mut request = inner
            .client
            .request(req.verb.method(), url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        request = apply_headers(&inner.config, request, &req.headers);
        request = apply_auth(inner.config.auth.as_ref(), request);
        if let Some(body) = &req.body {
            request = request.json(body);
        }
        if let Some(t) = inner.config.effective_timeout(req.timeout) {
            request = request.timeout(t);
        }

        let response = request.send().await.map_err(RestError::from)?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let bytes =
            read_response_body_limited_bytes(response, inner.config.max_response_bytes).await?;

        if status.is_success() {
            return decode_success_body(&bytes).map_err(AttemptFailure::from);
        }

        Err(AttemptFailure {
            error: backend_error(status, &bytes),
            retry_after,
        })
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path}"))
            .map_err(|e| RestError::InvalidRequest(format!("Invalid URL: {e}")))?;

        let mut pairs: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(AuthConfig::Query { name, value }) = &self.inner.config.auth {
            pairs.push((name.as_str(), value.as_str()));
        }

        if !pairs.is_empty() {
            let mut qs = String::new();
            for (i, (k, v)) in pairs.iter().enumerate() {
                if i > 0 {
                    qs.push('&');
                }
                qs.push_str(&encode_query_component(k));
                qs.push('=');
                qs.push_str(&encode_query_component(v));
            }
            url.set_query(Some(&qs));
        }

        Ok(url)
    }
}

fn normalize_path(raw: &str) -> Result<String> {
    let path = raw.trim();
    if path.is_empty() {
        return Err(RestError::InvalidRequest("path must not be empty".to_string()));
    }
    if path.contains(['?', '#']) {
        return Err(RestError::InvalidRequest(format!(
            "path '{path}' must not contain '?' or '#'; pass query parameters separately"
        )));
    }
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Ok(format!("/{path}"))
    }
}

/// `/users/1/posts` -> [`/users/1`, `/users`].
fn ancestor_paths(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = path.trim_end_matches('/');
    while let Some((parent, _)) = current.rsplit_once('/') {
        if parent.is_empty() {
            break;
        }
        out.push(parent.to_string());
        current = parent;
    }
    out
}

/// Flatten a query mapping into sorted key/value pairs.
///
/// Arrays become repeated keys, objects are JSON-encoded, `null` is dropped.
fn query_pairs(query: Option<&Map<String, Value>>) -> Vec<(String, String)> {
    let Some(query) = query else {
        return Vec::new();
    };
    let mut pairs = Vec::with_capacity(query.len());
    for (k, v) in query {
        match v {
            Value::Null => {}
            Value::Array(items) => {
                pairs.extend(items.iter().map(|item| (k.clone(), value_to_string(item))));
            }
            other => pairs.push((k.clone(), value_to_string(other))),
        }
    }
    pairs.sort();
    pairs
}

fn apply_headers(
    cfg: &RestBackendConfig,
    mut request: reqwest::RequestBuilder,
    headers: &[(String, String)],
) -> reqwest::RequestBuilder {
    for (key, value) in &cfg.defaults.headers {
        request = request.header(key, value);
    }
    for (key, value) in headers {
        request = request.header(key, value);
    }
    request
}

fn apply_auth(
    auth: Option<&AuthConfig>,
    request: reqwest::RequestBuilder,
) -> reqwest::RequestBuilder {
    match auth {
        Some(AuthConfig::Bearer { token }) => request.bearer_auth(token),
        Some(AuthConfig::Header { name, value }) => request.header(name, value),
        Some(AuthConfig::Basic { username, password }) => {
            request.basic_auth(username, Some(password))
        }
        Some(AuthConfig::Query { .. } | AuthConfig::None) | None => request,
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Some(Duration::from_secs(secs))
}

async fn read_response_body_limited_bytes(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> Result<Vec<u8>> {
    let Some(max) = max_bytes else {
        let bytes = response.bytes().await?;
        return Ok(bytes.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(RestError::Decode(format!(
            "response too large: {len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(RestError::Decode(format!(
                "response too large: exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }

    Ok(out)
}

fn decode_success_body(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| RestError::Decode(format!("response body is not valid JSON: {e}")))
}

fn backend_error(status: StatusCode, bytes: &[u8]) -> RestError {
    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| json!(String::from_utf8_lossy(bytes).into_owned()))
    };
    RestError::Backend {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        body,
    }
}

pub(crate) fn encode_query_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
