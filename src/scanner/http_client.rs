use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{ScanError, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// How the body of a successful response is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Json,
    Binary,
}

/// A request against the scanning service, relative to its base endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub expect: Expect,
}

impl Request {
    pub fn get_json(path: &str) -> Self {
        Self {
            method: Method::Get,
            path: path.to_string(),
            body: None,
            expect: Expect::Json,
        }
    }

    pub fn post_json(path: &str, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.to_string(),
            body: Some(body),
            expect: Expect::Json,
        }
    }

    pub fn post_binary(path: &str, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.to_string(),
            body: Some(body),
            expect: Expect::Binary,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn into_json(self) -> Result<Value, ScanError> {
        match self {
            Payload::Json(v) => Ok(v),
            Payload::Binary(_) => Err(ScanError::Decode(
                "expected a JSON body, got binary".to_string(),
            )),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, ScanError> {
        match self {
            Payload::Binary(b) => Ok(b),
            Payload::Json(_) => Err(ScanError::Decode(
                "expected a binary body, got JSON".to_string(),
            )),
        }
    }
}

/// Seam between the controller and the network.
///
/// Unreachable services and failing statuses are `ScanError::Transport`;
/// a success body that cannot be decoded is `ScanError::Decode`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: Request) -> Result<Payload, ScanError>;
}

/// Join the base endpoint and a path, dropping one trailing slash from the base.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.strip_suffix('/').unwrap_or(base);
    format!("{}{}", base, path)
}

/// Pick the most useful message out of a failed response body:
/// a JSON `error` string, then the raw text, then a generic message.
pub fn error_message_from_body(body: &str, path: &str, status: u16) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json.get("error").and_then(|e| e.as_str()) {
            if !msg.trim().is_empty() {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("Request to {} failed with status {}", path, status)
}

/// reqwest-backed transport bound to one base endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout());
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: Request) -> Result<Payload, ScanError> {
        let url = join_url(&self.base_url, &request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let msg = if e.is_timeout() {
                format!("Request to {} timed out", url)
            } else {
                format!("Request to {} failed: {}", url, e)
            };
            error!("{}", msg);
            TransportError::network(msg)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                warn!("Failed to read error body from {}: {}", url, e);
                String::new()
            });
            let msg = error_message_from_body(&body, &request.path, status.as_u16());
            error!("{} returned {}: {}", request.path, status, msg);
            return Err(TransportError::http(status.as_u16(), msg).into());
        }
        info!("{} returned {}", request.path, status);

        let bytes = response.bytes().await.map_err(|e| {
            TransportError::network(format!("Failed to read response body from {}: {}", url, e))
        })?;

        match request.expect {
            Expect::Binary => Ok(Payload::Binary(bytes.to_vec())),
            Expect::Json => serde_json::from_slice(&bytes).map(Payload::Json).map_err(|e| {
                error!("{} returned {} with a non-JSON body: {}", request.path, status, e);
                ScanError::Decode(format!("Invalid JSON from {}: {}", request.path, e))
            }),
        }
    }
}
