//! Canonical request payload built from raw operator inputs.
//!
//! The profile text is dual-mode: it is either a JSON document or free text. The mode is
//! decided exactly once, when the payload is built, and carried as a [`ProfileInput`].

use crate::json;
use serde::Serialize;
use serde_json::{Map, Value};

/// The `user_profile` field of a payload.
///
/// Serializes untagged: `Json` emits the parsed value, `Raw` emits the original text as a
/// JSON string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProfileInput {
    Json(Value),
    Raw(String),
}

impl ProfileInput {
    /// Resolve operator text into a profile value.
    ///
    /// Malformed JSON is a legitimate free-text profile, so a parse failure falls back to
    /// [`ProfileInput::Raw`] without reporting an error.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        json::from_str::<Value>(text).map_or_else(|_| Self::Raw(text.to_string()), Self::Json)
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// The value as it will appear on the wire.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Json(v) => v.clone(),
            Self::Raw(s) => Value::String(s.clone()),
        }
    }
}

/// Body sent to the crawl endpoint: `{"url": ..., "user_profile": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPayload {
    pub url: String,
    pub user_profile: ProfileInput,
}

impl RequestPayload {
    /// The payload as the opaque field map a relay forwards.
    #[must_use]
    pub fn to_forward_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("url".to_string(), Value::String(self.url.clone()));
        body.insert("user_profile".to_string(), self.user_profile.to_value());
        body
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_forward_body())
    }
}

/// Build a payload from the target URL and the raw profile text.
///
/// `url` is passed through untouched (no trimming, validation or percent-encoding); an
/// empty URL is forwarded as an empty string.
#[must_use]
pub fn build(url: &str, profile_text: &str) -> RequestPayload {
    RequestPayload {
        url: url.to_string(),
        user_profile: ProfileInput::parse(profile_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_profile_is_parsed() {
        let p = build(
            "https://example.com/jobs",
            r#"{"major": "CS", "interests": ["AI", "BACKEND"]}"#,
        );
        assert!(p.user_profile.is_json());
        assert_eq!(
            p.user_profile.to_value(),
            json!({"major": "CS", "interests": ["AI", "BACKEND"]})
        );
    }

    #[test]
    fn scalar_json_texts_are_json_too() {
        assert_eq!(build("u", "42").user_profile, ProfileInput::Json(json!(42)));
        assert_eq!(build("u", " true ").user_profile, ProfileInput::Json(json!(true)));
        assert_eq!(
            build("u", "\"quoted\"").user_profile,
            ProfileInput::Json(json!("quoted"))
        );
        assert_eq!(build("u", "null").user_profile, ProfileInput::Json(Value::Null));
    }

    #[test]
    fn free_text_falls_back_to_raw_string() {
        let text = "Junior CS student, NOT interested in ML engineering.";
        let p = build("https://example.com", text);
        assert_eq!(p.user_profile, ProfileInput::Raw(text.to_string()));
        assert_eq!(p.user_profile.to_value(), json!(text));
    }

    #[test]
    fn malformed_json_is_kept_verbatim() {
        let text = r#"{"major": "CS",}"#;
        let p = build("u", text);
        assert_eq!(p.user_profile, ProfileInput::Raw(text.to_string()));
    }

    #[test]
    fn deeply_nested_profile_stays_json() {
        let depth = 500;
        let text = format!("{}{{}}{}", r#"{"a":"#.repeat(depth), "}".repeat(depth));
        let p = build("u", &text);
        assert!(p.user_profile.is_json());

        let value = p.user_profile.to_value();
        let mut level = &value;
        for _ in 0..depth {
            level = &level["a"];
        }
        assert_eq!(level, &json!({}));
    }

    #[test]
    fn empty_profile_and_url_are_permitted() {
        let p = build("", "");
        assert_eq!(p.url, "");
        assert_eq!(p.user_profile, ProfileInput::Raw(String::new()));
        assert_eq!(p.to_value(), json!({"url": "", "user_profile": ""}));
    }

    #[test]
    fn url_is_not_normalized() {
        let url = "  https://linkareer.com/list/intern?page=1&filterBy_status=OPEN ";
        assert_eq!(build(url, "x").url, url);
    }

    #[test]
    fn serialization_matches_forward_body() {
        let p = build("https://example.com/jobs", r#"{"b": 1, "a": 2}"#);
        let serialized = serde_json::to_value(&p).expect("serialize payload");
        assert_eq!(serialized, p.to_value());
        // Operator key order survives.
        assert_eq!(
            serde_json::to_string(&p).expect("serialize payload"),
            r#"{"url":"https://example.com/jobs","user_profile":{"b":1,"a":2}}"#
        );
    }
}
