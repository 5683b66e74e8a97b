//! Trailer emulation over an ordinary header collection.
//!
//! Trailers can normally only be declared before the response head is
//! sent, yet the host surface allows setting them at any point before
//! finalization. They therefore ride inside the header collection under a
//! reserved name prefix and are materialized as real trailers when the
//! transaction completes. The prefix keeps the two namespaces apart:
//! header enumeration skips prefixed entries, trailer enumeration sees
//! only them.
//!
//! Names are reported in the `http` crate's lowercase canonical form.

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{HostError, HostResult};

/// Reserved name prefix marking a header entry as a deferred trailer.
///
/// The `http` crate validates header names at construction, so the prefix
/// has to be a well-formed name; reserving it is a convention enforced by
/// enumeration on both sides.
pub const TRAILER_PREFIX: &str = "x-weftgate-trailer-";

/// Encode a trailer name into its reserved header-collection name.
pub fn encode(name: &str) -> HostResult<HeaderName> {
    if name.is_empty() {
        return Err(HostError::MalformedInput("empty trailer name".to_string()));
    }
    HeaderName::from_bytes(format!("{TRAILER_PREFIX}{name}").as_bytes())
        .map_err(|e| HostError::MalformedInput(format!("trailer name {name:?}: {e}")))
}

/// Decode a header-collection name back to the trailer name it carries.
/// Returns `None` for ordinary headers.
pub fn decode(name: &HeaderName) -> Option<&str> {
    name.as_str()
        .strip_prefix(TRAILER_PREFIX)
        .filter(|stripped| !stripped.is_empty())
}

/// Whether `name` is a deferred-trailer entry.
pub fn is_trailer(name: &HeaderName) -> bool {
    decode(name).is_some()
}

/// Every trailer name present in `headers`, stripped of the prefix.
pub fn names(headers: &HeaderMap) -> Vec<String> {
    headers.keys().filter_map(decode).map(str::to_owned).collect()
}

/// First value recorded for trailer `name`; `None` on miss.
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    let encoded = encode(name).ok()?;
    headers
        .get(&encoded)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Record trailer `name`. Single-valued: the last write wins.
pub fn set(headers: &mut HeaderMap, name: &str, value: &str) -> HostResult<()> {
    let encoded = encode(name)?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| HostError::MalformedInput(format!("trailer value for {name:?}: {e}")))?;
    headers.insert(encoded, value);
    Ok(())
}

/// Split a collection into its ordinary headers and its decoded trailers.
///
/// Used at finalization, when the deferred entries become real trailers
/// on the transport.
pub fn partition(headers: &HeaderMap) -> (HeaderMap, HeaderMap) {
    let mut ordinary = HeaderMap::new();
    let mut trailers = HeaderMap::new();
    for (name, value) in headers {
        match decode(name) {
            Some(stripped) => {
                // A prefixed name minus its prefix is still a valid name.
                if let Ok(decoded) = HeaderName::from_bytes(stripped.as_bytes()) {
                    trailers.insert(decoded, value.clone());
                }
            }
            None => {
                ordinary.append(name.clone(), value.clone());
            }
        }
    }
    (ordinary, trailers)
}
