//! Request relay and payload normalization for externally hosted crawl endpoints.
//!
//! This crate is used by:
//! - `crawl-relay-server` (the same-origin `/api/crawl` boundary)
//! - operator tooling that needs the exact outbound request before it is sent
//!
//! It intentionally contains **no** persistence, retries, authentication or rate limiting.
//! Every call is a single-shot conduit: build the payload, forward it once, normalize the
//! outcome into a [`relay::ResultEnvelope`].

pub mod console;
pub mod json;
pub mod payload;
pub mod preview;
pub mod relay;
pub mod safety;

pub use payload::{ProfileInput, RequestPayload, build};
pub use preview::{PLACEHOLDER_ENDPOINT, RequestPreview, preview};
pub use relay::{
    ErrorKind, HttpTransport, RawResponse, Relay, RelayError, RelayRequest, ResultEnvelope,
    Transport,
};
