//! JSON parsing without serde_json's 128-level recursion limit.
//!
//! Operator profiles and destination bodies are opaque, so nesting depth is not ours to
//! cap. `serde_stacker` grows the stack on demand instead of overflowing it.

use serde::Deserialize;
use serde::de::DeserializeOwned;

/// # Errors
///
/// Returns the serde_json error if `text` is not a single valid JSON document.
pub fn from_str<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// # Errors
///
/// Returns the serde_json error if `bytes` is not a single valid JSON document.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn nested(depth: usize) -> String {
        format!("{}{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn nesting_past_the_default_limit_parses() {
        let text = nested(1000);
        assert!(serde_json::from_str::<Value>(&text).is_err());
        let value: Value = from_str(&text).expect("deep json");
        assert!(value.is_array());
        from_slice::<Value>(text.as_bytes()).expect("deep json bytes");
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(from_str::<Value>("{} x").is_err());
        assert!(from_slice::<Value>(b"[1] [2]").is_err());
    }
}
