//! Single-shot JSON relay.
//!
//! A [`Relay`] takes an operator-supplied endpoint plus an opaque field map, issues exactly
//! one `POST` with a JSON body, and maps whatever happens into a [`ResultEnvelope`]. It
//! never retries, never reshapes a successful body and never lets a failure escape as
//! anything other than a [`RelayError`].

use crate::json;
use crate::payload::RequestPayload;
use crate::preview::JSON_CONTENT_TYPE;
use crate::safety::{
    OutboundHttpSafety, RedirectPolicy, redact_endpoint, redact_url, sanitize_reqwest_error,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const ENDPOINT_REQUIRED: &str = "API Endpoint is required";
const ENDPOINT_NOT_STRING: &str = "API Endpoint must be a string";
const BODY_NOT_OBJECT: &str = "Request body must be a JSON object";
const NON_JSON_SUCCESS_BODY: &str = "Upstream returned a response body that is not valid JSON";
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed configuration, detected before any I/O.
    Validation,
    /// No usable response was received from the destination.
    Transport,
    /// The destination answered with a non-success status.
    Upstream,
}

/// Relay failure. `Display` is the operator-facing message that lands in the envelope's
/// `error` field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        details: Option<Value>,
    },
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Upstream { .. } => ErrorKind::Upstream,
        }
    }

    /// HTTP status reported to the caller of the inbound boundary.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Transport(_) => 500,
            Self::Upstream { status, .. } => *status,
        }
    }
}

/// Endpoint plus the opaque field map forwarded as the request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayRequest {
    pub endpoint: String,
    pub payload: Map<String, Value>,
}

impl RelayRequest {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
        }
    }

    #[must_use]
    pub fn for_payload(endpoint: impl Into<String>, payload: &RequestPayload) -> Self {
        Self::new(endpoint, payload.to_forward_body())
    }

    /// Split an inbound body into the endpoint and everything else.
    ///
    /// No field other than `endpoint` is inspected; the remainder is forwarded untouched,
    /// in its original order.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] if the body is not an object, or if `endpoint` is
    /// missing, `null`, blank, or not a string.
    pub fn from_inbound(body: Value) -> Result<Self> {
        let Value::Object(mut fields) = body else {
            return Err(RelayError::Validation(BODY_NOT_OBJECT.to_string()));
        };

        let endpoint = match fields.shift_remove("endpoint") {
            None | Some(Value::Null) => {
                return Err(RelayError::Validation(ENDPOINT_REQUIRED.to_string()));
            }
            Some(Value::String(s)) => s,
            Some(_) => return Err(RelayError::Validation(ENDPOINT_NOT_STRING.to_string())),
        };

        let request = Self::new(endpoint, fields);
        request.validated_endpoint()?;
        Ok(request)
    }

    fn validated_endpoint(&self) -> Result<&str> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(RelayError::Validation(ENDPOINT_REQUIRED.to_string()));
        }
        Ok(endpoint)
    }
}

/// Normalized outcome of a relay attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    /// The destination's JSON body, unmodified.
    Success(Value),
    Failure {
        status: u16,
        error: String,
        /// Destination error body; only present when a response was actually received.
        details: Option<Value>,
    },
}

#[derive(Serialize)]
struct FailureBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl ResultEnvelope {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Failure { status, .. } => *status,
        }
    }

    /// The JSON body returned to the caller.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::Success(v) => v.clone(),
            Self::Failure { error, details, .. } => serde_json::to_value(FailureBody {
                error,
                details: details.as_ref(),
            })
            .unwrap_or_else(|_| Value::String(error.clone())),
        }
    }
}

impl From<RelayError> for ResultEnvelope {
    fn from(e: RelayError) -> Self {
        let status = e.status();
        match e {
            RelayError::Validation(error) | RelayError::Transport(error) => Self::Failure {
                status,
                error,
                details: None,
            },
            RelayError::Upstream {
                message, details, ..
            } => Self::Failure {
                status,
                error: message,
                details,
            },
        }
    }
}

impl From<Result<Value>> for ResultEnvelope {
    fn from(r: Result<Value>) -> Self {
        match r {
            Ok(body) => Self::Success(body),
            Err(e) => e.into(),
        }
    }
}

/// What came back from the destination, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The one network operation a relay performs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as JSON to `endpoint`.
    ///
    /// Any received response, whatever its status, is `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if no complete response was received.
    async fn post_json(&self, endpoint: &str, body: &Map<String, Value>) -> Result<RawResponse>;
}

/// reqwest-backed transport. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    safety: Arc<OutboundHttpSafety>,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if the HTTP client cannot be built.
    pub fn new(safety: OutboundHttpSafety) -> Result<Self> {
        // Redirects are followed by hand so every hop goes through `check_url`.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RelayError::Transport(sanitize_reqwest_error(&e)))?;
        Ok(Self {
            client,
            safety: Arc::new(safety),
        })
    }

    #[must_use]
    pub fn safety(&self) -> &OutboundHttpSafety {
        &self.safety
    }

    async fn send_checked(
        &self,
        url: &Url,
        body: Option<&Map<String, Value>>,
    ) -> Result<reqwest::Response> {
        self.safety
            .check_url(url)
            .await
            .map_err(|v| RelayError::Transport(v.to_string()))?;

        let request = match body {
            Some(body) => self
                .client
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                .json(body),
            None => self.client.get(url.clone()),
        };
        request
            .send()
            .await
            .map_err(|e| RelayError::Transport(sanitize_reqwest_error(&e)))
    }
}

/// Where a redirect response points, resolved against the URL that produced it.
fn redirect_target(response: &reqwest::Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    response.url().join(location).ok()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, endpoint: &str, body: &Map<String, Value>) -> Result<RawResponse> {
        let mut url =
            Url::parse(endpoint).map_err(|e| RelayError::Transport(format!("Invalid URL: {e}")))?;
        let mut body = Some(body);
        let mut hops = 0;

        let response = loop {
            let response = self.send_checked(&url, body).await?;
            if self.safety.redirects == RedirectPolicy::None {
                break response;
            }
            let Some(next) = redirect_target(&response) else {
                break response;
            };
            if hops == MAX_REDIRECTS {
                return Err(RelayError::Transport(format!(
                    "Too many redirects (limit {MAX_REDIRECTS})"
                )));
            }
            hops += 1;

            // 307/308 replay the POST; 301/302/303 degrade to a bodyless GET.
            let status = response.status().as_u16();
            if status != 307 && status != 308 {
                body = None;
            }
            debug!(
                from = %redact_url(&url),
                to = %redact_url(&next),
                status,
                "following redirect"
            );
            url = next;
        };

        let status = response.status().as_u16();
        let body = read_body_limited(response, self.safety.max_response_bytes).await?;
        Ok(RawResponse { status, body })
    }
}

async fn read_body_limited(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> Result<Vec<u8>> {
    let transport_err = |e: reqwest::Error| RelayError::Transport(sanitize_reqwest_error(&e));

    let Some(max) = max_bytes else {
        return Ok(response.bytes().await.map_err(transport_err)?.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(RelayError::Transport(format!(
            "Response too large: {len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(transport_err)? {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(RelayError::Transport(format!(
                "Response too large: exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

#[derive(Clone)]
pub struct Relay<T = HttpTransport> {
    transport: T,
}

impl Relay<HttpTransport> {
    /// A relay over reqwest with the given outbound policy.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if the HTTP client cannot be built.
    pub fn http(safety: OutboundHttpSafety) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(safety)?))
    }
}

impl<T: Transport> Relay<T> {
    #[must_use]
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Forward the request and return the destination's JSON body.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Validation`] for a blank endpoint (the transport is not touched)
    /// - [`RelayError::Transport`] when no usable response was received, including a 2xx
    ///   whose body is not JSON
    /// - [`RelayError::Upstream`] for a non-2xx response
    pub async fn forward(&self, request: &RelayRequest) -> Result<Value> {
        let endpoint = request.validated_endpoint()?;

        debug!(
            endpoint = %redact_endpoint(endpoint),
            fields = ?request.payload.keys().collect::<Vec<_>>(),
            "relaying request"
        );

        let raw = self.transport.post_json(endpoint, &request.payload).await?;
        interpret_response(raw)
    }

    /// Forward the request and normalize the outcome. Failures are logged once here.
    pub async fn relay(&self, request: &RelayRequest) -> ResultEnvelope {
        match self.forward(request).await {
            Ok(body) => ResultEnvelope::Success(body),
            Err(e) => {
                warn!(
                    endpoint = %redact_endpoint(request.endpoint.trim()),
                    kind = ?e.kind(),
                    status = e.status(),
                    error = %e,
                    "Proxy error"
                );
                ResultEnvelope::from(e)
            }
        }
    }
}

fn interpret_response(raw: RawResponse) -> Result<Value> {
    if (200..300).contains(&raw.status) {
        if raw.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        return json::from_slice(&raw.body)
            .map_err(|_| RelayError::Transport(NON_JSON_SUCCESS_BODY.to_string()));
    }

    let details = json::from_slice::<Value>(&raw.body).ok();
    let message = details
        .as_ref()
        .and_then(upstream_message)
        .unwrap_or_else(|| format!("Request failed with status code {}", raw.status));

    Err(RelayError::Upstream {
        status: raw.status,
        message,
        details,
    })
}

/// Pull a human-readable message out of a destination error body.
fn upstream_message(body: &Value) -> Option<String> {
    let candidates = [
        body.get("error"),
        body.get("message"),
        body.get("error").and_then(|e| e.get("message")),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}
