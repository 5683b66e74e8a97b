//! Per-request transaction state and the host surface.
//!
//! A [`Transaction`] is the unit of truth for one request/response cycle:
//! it owns the mutable request, the active response sink, the negotiated
//! feature set, and the single-use handoff to the remaining pipeline.
//! Every host-surface procedure is a method taking the transaction as an
//! explicit handle — isolation between concurrent requests is `&mut`
//! exclusive ownership, not ambient or shared state.
//!
//! # Control flow
//!
//! ```text
//! transport receives a request
//!   │
//!   ├── Transaction::new (sink mode fixed by negotiated features)
//!   ├── guest runs, driving the host surface
//!   │     └── advance() — at most one real handoff to the pipeline
//!   ├── guest returns
//!   │
//!   ▼
//! Transaction::finish — buffered responses flush, streamed ones complete
//! ```

use std::io::Read;

use http::{Method, StatusCode};

use crate::error::{HostError, HostResult};
use crate::features::Features;
use crate::request::RequestState;
use crate::sink::{BodyWriter, ResponseSink, Transport};

/// The remaining pipeline: invoked at most once, synchronously, with the
/// (possibly rewritten) request and the transaction's response sink as
/// its response target.
pub type Pipeline =
    Box<dyn FnOnce(&mut RequestState, &mut ResponseSink) -> anyhow::Result<()> + Send>;

/// One request/response cycle and its mutable state.
pub struct Transaction {
    request: RequestState,
    sink: ResponseSink,
    features: Features,
    next: Option<Pipeline>,
    advanced: bool,
}

impl Transaction {
    /// Build the state for one request. The sink starts buffering when
    /// `BUFFER_RESPONSE` was negotiated and pass-through otherwise, and
    /// never switches mid-flight.
    pub fn new(
        request: RequestState,
        transport: Box<dyn Transport>,
        features: Features,
        next: Pipeline,
    ) -> Self {
        let sink = if features.contains(Features::BUFFER_RESPONSE) {
            ResponseSink::buffering(transport)
        } else {
            ResponseSink::pass_through(transport)
        };
        tracing::debug!(features = %features, buffering = sink.is_buffering(), "transaction created");
        Self {
            request,
            sink,
            features,
            next: Some(next),
            advanced: false,
        }
    }

    // ── Capabilities ───────────────────────────────────────────────

    /// Merge `flags` into this transaction's feature set and return the
    /// result. The sink mode was fixed at creation and does not change.
    pub fn enable_features(&mut self, flags: Features) -> Features {
        self.features |= flags;
        self.features
    }

    pub fn features(&self) -> Features {
        self.features
    }

    // ── Request line ───────────────────────────────────────────────

    pub fn method(&self) -> &str {
        self.request.method().as_str()
    }

    pub fn set_method(&mut self, method: &str) -> HostResult<()> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| HostError::MalformedInput(format!("method {method:?}: {e}")))?;
        self.request.set_method(method);
        Ok(())
    }

    /// Absolute path plus query, `/` when the request had none.
    pub fn uri(&self) -> String {
        self.request.uri()
    }

    /// Replace the request target; rejects anything that is not an
    /// absolute path with optional query.
    pub fn set_uri(&mut self, uri: &str) -> HostResult<()> {
        self.request.set_uri(uri)
    }

    /// Read-only protocol string, e.g. `HTTP/1.1`.
    pub fn protocol_version(&self) -> String {
        self.request.protocol_version()
    }

    // ── Request headers, trailers, body ────────────────────────────

    pub fn request_header_names(&self) -> Vec<String> {
        self.request.header_names()
    }

    pub fn request_header(&self, name: &str) -> Option<String> {
        self.request.header(name)
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) -> HostResult<()> {
        self.request.set_header(name, value)
    }

    pub fn request_trailer_names(&self) -> Vec<String> {
        self.request.trailer_names()
    }

    pub fn request_trailer(&self, name: &str) -> Option<String> {
        self.request.trailer(name)
    }

    pub fn set_request_trailer(&mut self, name: &str, value: &str) -> HostResult<()> {
        self.request.set_trailer(name, value)
    }

    /// Reader over the request body; reading consumes it.
    pub fn request_body_reader(&mut self) -> &mut (dyn Read + Send) {
        self.request.body_reader()
    }

    /// Writer that replaces the request body wholesale.
    pub fn request_body_writer(&mut self) -> &mut Vec<u8> {
        self.request.body_writer()
    }

    // ── Handoff ────────────────────────────────────────────────────

    /// Hand off to the remaining pipeline, synchronously.
    ///
    /// The first call performs the real handoff: the pipeline runs to
    /// completion with the mutated request and this transaction's sink,
    /// and everything it wrote is visible to host-surface reads once the
    /// call returns. Any later call is a silent no-op. A pipeline failure
    /// comes back as [`HostError::Pipeline`] without corrupting the
    /// transaction — the guest decides what response to produce instead.
    pub fn advance(&mut self) -> HostResult<()> {
        let Some(next) = self.next.take() else {
            tracing::debug!("advance called again; pipeline already ran");
            return Ok(());
        };
        self.advanced = true;
        tracing::debug!(method = %self.request.method(), uri = %self.request.uri(), "handing off to pipeline");
        next(&mut self.request, &mut self.sink).map_err(HostError::Pipeline)
    }

    /// Whether the handoff has happened.
    pub fn advanced(&self) -> bool {
        self.advanced
    }

    // ── Response status, headers, trailers, body ───────────────────

    /// Last explicitly set status code, 200 when never set.
    pub fn status_code(&self) -> u16 {
        self.sink.status().as_u16()
    }

    pub fn set_status_code(&mut self, code: u16) -> HostResult<()> {
        let status = StatusCode::from_u16(code)
            .map_err(|e| HostError::MalformedInput(format!("status code {code}: {e}")))?;
        self.sink.set_status(status)
    }

    pub fn response_header_names(&self) -> Vec<String> {
        self.sink.header_names()
    }

    pub fn response_header(&self, name: &str) -> Option<String> {
        self.sink.header(name)
    }

    pub fn set_response_header(&mut self, name: &str, value: &str) -> HostResult<()> {
        self.sink.set_header(name, value)
    }

    pub fn response_trailer_names(&self) -> Vec<String> {
        self.sink.trailer_names()
    }

    pub fn response_trailer(&self, name: &str) -> Option<String> {
        self.sink.trailer(name)
    }

    pub fn set_response_trailer(&mut self, name: &str, value: &str) -> HostResult<()> {
        self.sink.set_trailer(name, value)
    }

    /// Reader over the response body produced so far (buffering mode
    /// only; a streamed body has already left the process).
    pub fn response_body_reader(&self) -> std::io::Cursor<&[u8]> {
        self.sink.body_reader()
    }

    /// Writer for the response body; acquiring it in buffering mode
    /// resets whatever was buffered before.
    pub fn response_body_writer(&mut self) -> BodyWriter<'_> {
        self.sink.body_writer()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Finalize the transaction: flush a buffered response to the
    /// transport, or complete a streamed one. Consumes the transaction,
    /// so no host-surface call can observe a flushed sink.
    pub fn finish(self) -> HostResult<()> {
        self.sink.finish()
    }

    /// Direct access for embedders and pipeline stages.
    pub fn request(&self) -> &RequestState {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestState {
        &mut self.request
    }

    pub fn sink(&self) -> &ResponseSink {
        &self.sink
    }
}
