//! Wire format
//!
//! Message values travel as bincode in the HTTP body. References travel as
//! form-url-encoded path segments.

use crate::error::{RemoteError, Result};
use actor_core::{Reference, Value};
use bytes::Bytes;
use url::form_urlencoded;

pub fn encode_value(value: &Value) -> Result<Bytes> {
    Ok(Bytes::from(bincode::serialize(value)?))
}

pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Err(RemoteError::codec("empty message body"));
    }
    Ok(bincode::deserialize(bytes)?)
}

/// Encode a reference name for use as one URL path segment
pub fn encode_reference(reference: &Reference) -> String {
    form_urlencoded::byte_serialize(reference.name().as_bytes()).collect()
}

/// Decode a path segment produced by [`encode_reference`]
pub fn decode_reference(segment: &str) -> Result<Reference> {
    let name: String = form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(RemoteError::codec(format!(
            "invalid reference segment '{}'",
            segment
        )));
    }
    Ok(Reference::parse(&name))
}
