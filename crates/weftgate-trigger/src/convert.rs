//! Conversions between hyper's request types and the interception core.

use http::request::Parts;

use weftgate_handler::{RequestBody, RequestState};

/// Build the mutable per-request state from a received request head and
/// its collected body bytes.
pub fn request_state(parts: &Parts, body: Vec<u8>) -> RequestState {
    RequestState::new(
        parts.method.clone(),
        &parts.uri,
        parts.version,
        parts.headers.clone(),
        RequestBody::buffered(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn parts(uri: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .method("POST")
            .uri(uri)
            .header("host", "example.com")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn carries_method_target_and_headers() {
        let state = request_state(&parts("/api/v1?foo=bar"), b"{}".to_vec());
        assert_eq!(state.method().as_str(), "POST");
        assert_eq!(state.uri(), "/api/v1?foo=bar");
        assert_eq!(state.header("content-type").as_deref(), Some("application/json"));
        assert_eq!(state.header("host").as_deref(), Some("example.com"));
    }

    #[test]
    fn empty_path_becomes_root() {
        let state = request_state(&parts("http://example.com"), Vec::new());
        assert_eq!(state.uri(), "/");
    }

    #[test]
    fn body_is_readable() {
        use std::io::Read;

        let mut state = request_state(&parts("/"), b"payload".to_vec());
        let mut body = String::new();
        state.body_reader().read_to_string(&mut body).unwrap();
        assert_eq!(body, "payload");
    }
}
