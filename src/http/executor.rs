use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request, Response};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use super::client::{ClientSettings, DnsTimings, build_client};
use super::resolve::RequestSpec;
use crate::error::{AppError, AppResult};
use crate::metrics::{
    CacheStatus, PhaseTimings, RequestMeasurement, ResponseSize, TIMEOUT_ERROR, duration_ms,
};

pub const DEFAULT_CACHE_HEADER: &str = "X-Cache";
pub const DEFAULT_CACHE_HIT_VALUES: [&str; 1] = ["HIT"];
/// Largest body kept for assertions and chain extraction.
pub const DEFAULT_BODY_CAPTURE_LIMIT: usize = 1024 * 1024;

/// Status, headers and (possibly truncated) body of one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCapture {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResponseCapture {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub measurement: RequestMeasurement,
    /// Present only when capture was requested and a response arrived.
    pub response: Option<ResponseCapture>,
}

/// Performs one request. Never fails: transport problems are encoded in the
/// returned measurement.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, index: u64, spec: &RequestSpec, capture: bool) -> Execution;
}

/// Hands each virtual-user lane its own executor.
pub trait ExecutorFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the executor's transport cannot be built.
    fn lane_executor(&self, lane: usize) -> AppResult<Arc<dyn RequestExecutor>>;
}

/// Decides HIT/MISS from one response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRule {
    header: String,
    hit_values: Vec<String>,
}

impl Default for CacheRule {
    fn default() -> Self {
        Self {
            header: DEFAULT_CACHE_HEADER.to_owned(),
            hit_values: DEFAULT_CACHE_HIT_VALUES
                .iter()
                .map(|value| (*value).to_owned())
                .collect(),
        }
    }
}

impl CacheRule {
    #[must_use]
    pub fn new(header: String, hit_values: Vec<String>) -> Self {
        Self { header, hit_values }
    }

    /// `HIT` when the header value starts with any allow-listed value,
    /// ignoring ASCII case; `MISS` otherwise, including when absent.
    #[must_use]
    pub fn classify(&self, headers: &HeaderMap) -> CacheStatus {
        let Some(value) = headers
            .get(self.header.as_str())
            .and_then(|value| value.to_str().ok())
        else {
            return CacheStatus::Miss;
        };
        let value = value.trim();
        let hit = self.hit_values.iter().any(|hit| {
            !hit.is_empty()
                && value
                    .get(..hit.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(hit))
        });
        if hit {
            CacheStatus::Hit
        } else {
            CacheStatus::Miss
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub client: ClientSettings,
    pub cache_rule: CacheRule,
    pub body_capture_limit: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            cache_rule: CacheRule::default(),
            body_capture_limit: DEFAULT_BODY_CAPTURE_LIMIT,
        }
    }
}

/// reqwest-backed executor owning one client (one pool, one resolver).
#[derive(Debug)]
pub struct HttpExecutor {
    client: Client,
    dns: Arc<DnsTimings>,
    cache_rule: CacheRule,
    body_capture_limit: usize,
}

impl HttpExecutor {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(settings: &ExecutorSettings) -> AppResult<Self> {
        let dns = Arc::new(DnsTimings::default());
        let client = build_client(&settings.client, &dns)?;
        Ok(Self {
            client,
            dns,
            cache_rule: settings.cache_rule.clone(),
            body_capture_limit: settings.body_capture_limit,
        })
    }

    fn build_request(&self, spec: &RequestSpec) -> Result<Request, reqwest::Error> {
        let mut builder = self
            .client
            .request(spec.method.to_reqwest(), spec.url.clone());
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(credentials) = &spec.credentials
            && spec.header("authorization").is_none()
        {
            let encoded = B64.encode(format!(
                "{}:{}",
                credentials.username, credentials.password
            ));
            builder = builder.header("Authorization", format!("Basic {}", encoded));
        }
        if !spec.body.is_empty() {
            builder = builder.body(spec.body.clone());
        }
        builder.build()
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, index: u64, spec: &RequestSpec, capture: bool) -> Execution {
        let request = match self.build_request(spec) {
            Ok(request) => request,
            Err(err) => {
                return Execution {
                    measurement: RequestMeasurement::failed(
                        index,
                        Duration::ZERO,
                        Duration::ZERO,
                        format!("invalid request: {}", root_cause(&err)),
                    ),
                    response: None,
                };
            }
        };

        self.dns.take();
        let started = Instant::now();
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                let elapsed = started.elapsed();
                debug!("Request {} failed: {}", index, err);
                return Execution {
                    measurement: RequestMeasurement::failed(
                        index,
                        self.dns.take(),
                        elapsed,
                        describe_error(&err),
                    ),
                    response: None,
                };
            }
        };
        let headers_at = started.elapsed();
        let dns = self.dns.take().min(headers_at);

        let status = response.status().as_u16();
        let header_bytes = header_block_size(&response);
        let cache = self.cache_rule.classify(response.headers());
        let captured_headers = capture.then(|| collect_headers(response.headers()));
        let limit = if capture { self.body_capture_limit } else { 0 };

        let (body_bytes, body) = match drain_response_body(response, limit).await {
            Ok(drained) => drained,
            Err(err) => {
                let elapsed = started.elapsed();
                debug!("Request {} failed while reading body: {}", index, err);
                return Execution {
                    measurement: RequestMeasurement::failed(
                        index,
                        dns,
                        elapsed,
                        describe_error(&err),
                    ),
                    response: None,
                };
            }
        };
        let total = started.elapsed();

        // No connect or handshake events are exposed by the transport, so
        // connection setup on a fresh connection lands in `wait`.
        let timing = PhaseTimings {
            dns: duration_ms(dns),
            tcp: 0.0,
            tls: 0.0,
            wait: duration_ms(headers_at.saturating_sub(dns)),
            download: duration_ms(total.saturating_sub(headers_at)),
        };
        let measurement = RequestMeasurement {
            index,
            status,
            timing,
            total_time: duration_ms(total),
            ttfb: duration_ms(headers_at),
            size: ResponseSize {
                response_headers: header_bytes,
                response_body: body_bytes,
            },
            cache,
            error: None,
        };
        let response = captured_headers.map(|headers| ResponseCapture {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        });

        Execution {
            measurement,
            response,
        }
    }
}

/// Builds a fresh [`HttpExecutor`] for every lane.
#[derive(Debug, Clone, Default)]
pub struct HttpExecutorFactory {
    settings: ExecutorSettings,
}

impl HttpExecutorFactory {
    #[must_use]
    pub const fn new(settings: ExecutorSettings) -> Self {
        Self { settings }
    }
}

impl ExecutorFactory for HttpExecutorFactory {
    fn lane_executor(&self, lane: usize) -> AppResult<Arc<dyn RequestExecutor>> {
        let executor = HttpExecutor::new(&self.settings).map_err(|err| {
            if let AppError::Http(http) = err {
                AppError::http(http.for_lane(lane))
            } else {
                err
            }
        })?;
        Ok(Arc::new(executor))
    }
}

/// Reads the body chunk by chunk, keeping at most `keep` bytes.
async fn drain_response_body(
    response: Response,
    keep: usize,
) -> Result<(u64, Vec<u8>), reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    let mut kept = Vec::new();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        let room = keep.saturating_sub(kept.len());
        if room > 0 {
            kept.extend_from_slice(bytes.get(..room.min(bytes.len())).unwrap_or_default());
        }
    }
    Ok((total_bytes, kept))
}

/// Size of the header block as it appears on the wire for HTTP/1.1: the
/// status line, `name: value\r\n` per header, and the closing blank line.
pub(crate) fn header_block_size(response: &Response) -> u64 {
    let status = response.status();
    let status_line = format!(
        "{:?} {} {}\r\n",
        response.version(),
        status.as_str(),
        status.canonical_reason().unwrap_or_default()
    );
    let header_bytes = response
        .headers()
        .iter()
        .map(|(name, value)| {
            name.as_str()
                .len()
                .saturating_add(value.len())
                .saturating_add(4)
        })
        .fold(0_usize, usize::saturating_add);
    u64::try_from(
        status_line
            .len()
            .saturating_add(header_bytes)
            .saturating_add(2),
    )
    .unwrap_or(u64::MAX)
}

fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn describe_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return TIMEOUT_ERROR.to_owned();
    }
    if err.is_connect() {
        return format!("connection failed: {}", root_cause(err));
    }
    if err.is_redirect() {
        return format!("redirect failed: {}", root_cause(err));
    }
    if err.is_body() || err.is_decode() {
        return format!("body read failed: {}", root_cause(err));
    }
    format!("request failed: {}", root_cause(err))
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
