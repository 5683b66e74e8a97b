//! Mutable per-request state.
//!
//! One [`RequestState`] holds everything the guest may read or rewrite on
//! the request side: method, target, protocol version, headers, trailers,
//! and a replaceable body. The transport hands one in at transaction
//! creation and the remaining pipeline receives it back, mutations
//! included, at the handoff.

use std::io::{Cursor, Read};

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::uri::{Authority, PathAndQuery};
use http::{Method, Uri, Version};

use crate::error::{HostError, HostResult};
use crate::trailers;

/// The request half of a transaction.
pub struct RequestState {
    method: Method,
    target: PathAndQuery,
    version: Version,
    headers: HeaderMap,
    authority: Option<Authority>,
    body: RequestBody,
}

/// A request body: either the transport's native byte stream, consumed as
/// it is read, or a buffer that replaced the stream wholesale.
pub enum RequestBody {
    Stream(Box<dyn Read + Send>),
    Buffered(Cursor<Vec<u8>>),
}

impl RequestBody {
    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        RequestBody::Stream(Box::new(reader))
    }

    pub fn buffered(bytes: impl Into<Vec<u8>>) -> Self {
        RequestBody::Buffered(Cursor::new(bytes.into()))
    }

    pub fn empty() -> Self {
        RequestBody::buffered(Vec::new())
    }
}

impl RequestState {
    /// Build the state for a received request. The target is taken from
    /// the URI's path and query (`/` when absent) and the authority is
    /// kept for the `host` pseudo-header.
    pub fn new(
        method: Method,
        uri: &Uri,
        version: Version,
        headers: HeaderMap,
        body: RequestBody,
    ) -> Self {
        let target = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        Self {
            method,
            target,
            version,
            headers,
            authority: uri.authority().cloned(),
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Protocol string as the guest sees it, e.g. `HTTP/1.1`.
    pub fn protocol_version(&self) -> String {
        match self.version {
            v if v == Version::HTTP_10 => "HTTP/1.0".to_string(),
            v if v == Version::HTTP_11 => "HTTP/1.1".to_string(),
            v if v == Version::HTTP_2 => "HTTP/2.0".to_string(),
            v => format!("{v:?}"),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Absolute path plus query: never empty (`/` default), the `?` and
    /// query appended only when the original target carried one — a bare
    /// trailing `?` survives as-is.
    pub fn uri(&self) -> String {
        let path = match self.target.path() {
            "" => "/",
            path => path,
        };
        match self.target.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }

    /// Replace the request target. Only origin-form targets (absolute
    /// path, optional query) are accepted.
    pub fn set_uri(&mut self, uri: &str) -> HostResult<()> {
        if !uri.starts_with('/') {
            return Err(HostError::MalformedInput(format!(
                "request target must be an absolute path: {uri:?}"
            )));
        }
        self.target = uri.parse::<PathAndQuery>().map_err(|e| {
            HostError::MalformedInput(format!("request target {uri:?}: {e}"))
        })?;
        Ok(())
    }

    /// The authority the request was addressed to, when known.
    pub fn authority(&self) -> Option<&Authority> {
        self.authority.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Ordinary header names, sorted: deferred-trailer entries excluded,
    /// `host` synthesized from the authority when not present as a header.
    pub fn header_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .headers
            .keys()
            .filter(|name| !trailers::is_trailer(name))
            .map(|name| name.as_str().to_owned())
            .collect();
        if self.authority.is_some() && !names.iter().any(|name| name == "host") {
            names.push("host".to_string());
        }
        names.sort();
        names
    }

    /// First value under `name`. The `host` pseudo-header falls back to
    /// the request authority when no such header was carried.
    pub fn header(&self, name: &str) -> Option<String> {
        if name.eq_ignore_ascii_case("host") {
            if let Some(value) = self.headers.get(http::header::HOST) {
                return Some(String::from_utf8_lossy(value.as_bytes()).into_owned());
            }
            return self.authority.as_ref().map(|a| a.to_string());
        }
        self.headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }

    /// Set header `name`, replacing every existing value.
    pub fn set_header(&mut self, name: &str, value: &str) -> HostResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HostError::MalformedInput(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HostError::MalformedInput(format!("header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn trailer_names(&self) -> Vec<String> {
        trailers::names(&self.headers)
    }

    pub fn trailer(&self, name: &str) -> Option<String> {
        trailers::get(&self.headers, name)
    }

    pub fn set_trailer(&mut self, name: &str, value: &str) -> HostResult<()> {
        trailers::set(&mut self.headers, name, value)
    }

    /// Reader over the current body. Reading consumes: the transport
    /// stream drains, a buffered body advances its cursor.
    pub fn body_reader(&mut self) -> &mut (dyn Read + Send) {
        match &mut self.body {
            RequestBody::Stream(reader) => reader.as_mut(),
            RequestBody::Buffered(cursor) => cursor,
        }
    }

    /// Discard the current body and return a writer building its
    /// replacement. Asking for the writer is the reset: whatever body was
    /// there before, streamed or buffered, is gone.
    pub fn body_writer(&mut self) -> &mut Vec<u8> {
        self.body = RequestBody::Buffered(Cursor::new(Vec::new()));
        match &mut self.body {
            RequestBody::Buffered(cursor) => cursor.get_mut(),
            RequestBody::Stream(_) => unreachable!("body was just replaced with a buffer"),
        }
    }

    pub fn set_body(&mut self, body: RequestBody) {
        self.body = body;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn request(uri: &str) -> RequestState {
        RequestState::new(
            Method::GET,
            &uri.parse::<Uri>().unwrap(),
            Version::HTTP_11,
            HeaderMap::new(),
            RequestBody::empty(),
        )
    }

    // ── Request line ───────────────────────────────────────────────

    #[test]
    fn uri_roundtrip_with_query() {
        let mut req = request("/a?x=1");
        assert_eq!(req.uri(), "/a?x=1");

        req.set_uri("/b/c?y=2&z=3").unwrap();
        assert_eq!(req.uri(), "/b/c?y=2&z=3");
    }

    #[test]
    fn uri_defaults_to_root() {
        let req = request("http://example.com");
        assert_eq!(req.uri(), "/");
    }

    #[test]
    fn uri_preserves_forced_empty_query() {
        let req = request("/search?");
        assert_eq!(req.uri(), "/search?");
    }

    #[test]
    fn set_uri_rejects_relative_and_garbage() {
        let mut req = request("/");
        assert!(matches!(
            req.set_uri("no-leading-slash"),
            Err(HostError::MalformedInput(_))
        ));
        assert!(matches!(
            req.set_uri("/bad path with spaces"),
            Err(HostError::MalformedInput(_))
        ));
        // State is not corrupted by a rejected input.
        assert_eq!(req.uri(), "/");
    }

    #[test]
    fn method_is_mutable() {
        let mut req = request("/");
        assert_eq!(req.method(), &Method::GET);
        req.set_method(Method::POST);
        assert_eq!(req.method(), &Method::POST);
    }

    #[test]
    fn protocol_version_string() {
        let req = request("/");
        assert_eq!(req.protocol_version(), "HTTP/1.1");
    }

    // ── Headers ────────────────────────────────────────────────────

    #[test]
    fn host_synthesized_from_authority() {
        let req = request("http://example.com:8080/a");
        assert_eq!(req.header("Host").as_deref(), Some("example.com:8080"));
        assert!(req.header_names().contains(&"host".to_string()));
    }

    #[test]
    fn host_header_wins_over_authority() {
        let mut req = request("http://example.com/a");
        req.set_header("host", "override.test").unwrap();
        assert_eq!(req.header("host").as_deref(), Some("override.test"));
        // Not listed twice.
        let names = req.header_names();
        assert_eq!(names.iter().filter(|n| *n == "host").count(), 1);
    }

    #[test]
    fn no_host_at_all() {
        let req = request("/a");
        assert_eq!(req.header("host"), None);
        assert!(!req.header_names().contains(&"host".to_string()));
    }

    #[test]
    fn header_names_sorted_and_trailer_free() {
        let mut req = request("/");
        req.set_header("x-b", "2").unwrap();
        req.set_header("x-a", "1").unwrap();
        req.set_trailer("checksum", "deadbeef").unwrap();

        assert_eq!(req.header_names(), vec!["x-a", "x-b"]);
        assert_eq!(req.trailer_names(), vec!["checksum"]);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut req = request("/");
        req.set_header("X-Trace", "abc").unwrap();
        assert_eq!(req.header("x-trace").as_deref(), Some("abc"));
        assert_eq!(req.header("X-TRACE").as_deref(), Some("abc"));
    }

    #[test]
    fn set_header_rejects_invalid_names() {
        let mut req = request("/");
        assert!(matches!(
            req.set_header("bad name", "v"),
            Err(HostError::MalformedInput(_))
        ));
    }

    // ── Body ───────────────────────────────────────────────────────

    #[test]
    fn streamed_body_drains_on_read() {
        let mut req = RequestState::new(
            Method::POST,
            &"/upload".parse::<Uri>().unwrap(),
            Version::HTTP_11,
            HeaderMap::new(),
            RequestBody::stream(Cursor::new(b"payload".to_vec())),
        );

        let mut first = String::new();
        req.body_reader().read_to_string(&mut first).unwrap();
        assert_eq!(first, "payload");

        let mut second = String::new();
        req.body_reader().read_to_string(&mut second).unwrap();
        assert_eq!(second, "");
    }

    #[test]
    fn body_writer_replaces_wholesale() {
        let mut req = RequestState::new(
            Method::POST,
            &"/upload".parse::<Uri>().unwrap(),
            Version::HTTP_11,
            HeaderMap::new(),
            RequestBody::buffered(b"original".to_vec()),
        );

        req.body_writer().write_all(b"rewritten").unwrap();

        let mut replaced = String::new();
        req.body_reader().read_to_string(&mut replaced).unwrap();
        assert_eq!(replaced, "rewritten");
    }

    #[test]
    fn body_writer_acquire_is_the_reset() {
        let mut req = request("/");
        req.body_writer().write_all(b"first").unwrap();
        // Acquiring again starts from scratch, earlier bytes are gone.
        req.body_writer().write_all(b"second").unwrap();

        let mut body = String::new();
        req.body_reader().read_to_string(&mut body).unwrap();
        assert_eq!(body, "second");
    }
}
