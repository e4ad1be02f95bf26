//! Deterministic rendering of the outbound request before it is sent.

use crate::payload::{RequestPayload, build};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Substituted for the destination URL when no endpoint is configured.
pub const PLACEHOLDER_ENDPOINT: &str = "<YOUR_LAMBDA_URL>";

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPreview {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl RequestPreview {
    #[must_use]
    pub fn from_payload(endpoint: &str, payload: &RequestPayload) -> Self {
        let endpoint = endpoint.trim();
        let url = if endpoint.is_empty() {
            PLACEHOLDER_ENDPOINT.to_string()
        } else {
            endpoint.to_string()
        };

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string());

        Self {
            method: "POST".to_string(),
            url,
            headers,
            body: payload.to_value(),
        }
    }

    /// True when the URL is the placeholder rather than a configured endpoint.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.url == PLACEHOLDER_ENDPOINT
    }

    /// The payload pretty-printed with two-space indentation.
    #[must_use]
    pub fn pretty_body(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }

    /// A `curl` invocation equivalent to the relayed call.
    ///
    /// The body is single-quoted; embedded single quotes are closed, escaped and reopened
    /// (`'\''`) so the command can be pasted into a POSIX shell as-is.
    #[must_use]
    pub fn curl_command(&self) -> String {
        let mut cmd = format!("curl -X {} \"{}\"", self.method, self.url);
        for (name, value) in &self.headers {
            cmd.push_str(&format!(" \\\n  -H \"{name}: {value}\""));
        }
        let body = self.pretty_body().replace('\'', r"'\''");
        cmd.push_str(&format!(" \\\n  -d '{body}'"));
        cmd
    }
}

/// Render the preview for raw operator inputs.
#[must_use]
pub fn preview(endpoint: &str, url: &str, profile_text: &str) -> RequestPreview {
    RequestPreview::from_payload(endpoint, &build(url, profile_text))
}
