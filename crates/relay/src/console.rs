//! Caller-owned operator state: the three inputs an operator edits and what they see after
//! a run. Nothing here is global; callers keep a console per operator session.

use crate::payload::{RequestPayload, build};
use crate::preview::RequestPreview;
use crate::relay::{RelayError, RelayRequest, ResultEnvelope};
use serde::Serialize;
use serde_json::Value;

const ENDPOINT_NOT_CONFIGURED: &str = "Please provide an API Endpoint to execute the request.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorConsole {
    pub endpoint: String,
    pub target_url: String,
    pub profile_text: String,
}

impl OperatorConsole {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        target_url: impl Into<String>,
        profile_text: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            target_url: target_url.into(),
            profile_text: profile_text.into(),
        }
    }

    #[must_use]
    pub fn payload(&self) -> RequestPayload {
        build(&self.target_url, &self.profile_text)
    }

    #[must_use]
    pub fn preview(&self) -> RequestPreview {
        RequestPreview::from_payload(&self.endpoint, &self.payload())
    }

    /// The request the relay boundary would receive for the current inputs.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] when no endpoint is configured.
    pub fn relay_request(&self) -> Result<RelayRequest, RelayError> {
        if self.endpoint.trim().is_empty() {
            return Err(RelayError::Validation(ENDPOINT_NOT_CONFIGURED.to_string()));
        }
        Ok(RelayRequest::for_payload(self.endpoint.trim(), &self.payload()))
    }

    /// Characters (not bytes) in the profile text.
    #[must_use]
    pub fn profile_char_count(&self) -> usize {
        self.profile_text.chars().count()
    }
}

/// What the operator sees once a run completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response pane contents: the success body, or the destination's error body when one
    /// was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl RunOutcome {
    #[must_use]
    pub fn from_envelope(envelope: ResultEnvelope) -> Self {
        match envelope {
            ResultEnvelope::Success(body) => Self {
                error: None,
                response: Some(body),
            },
            ResultEnvelope::Failure { error, details, .. } => Self {
                error: Some(error),
                response: details,
            },
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<ResultEnvelope> for RunOutcome {
    fn from(envelope: ResultEnvelope) -> Self {
        Self::from_envelope(envelope)
    }
}

impl From<RelayError> for RunOutcome {
    fn from(e: RelayError) -> Self {
        Self::from_envelope(e.into())
    }
}
