//! Response sink wrapper: pass-through vs buffering.
//!
//! A [`ResponseSink`] gives the guest one read/write surface over status,
//! headers, body, and trailers, in one of two modes decided at
//! transaction creation:
//!
//! - **pass-through** — writes reach the transport as they occur. The
//!   head (status line plus ordinary headers) goes out on the first body
//!   byte or on an explicit status write, and after that it cannot be
//!   rewritten.
//! - **buffering** — status, headers, and body are captured in memory and
//!   nothing reaches the transport until [`finish`](ResponseSink::finish)
//!   flushes the lot atomically.
//!
//! Trailers behave identically in both modes: they ride in the header
//! collection under the reserved prefix and become real trailers at
//! completion, which is the only moment a transport can still accept them.

use std::io::{self, Cursor, Write};

use http::{HeaderMap, StatusCode};
use http::header::{HeaderName, HeaderValue};

use crate::error::{HostError, HostResult};
use crate::trailers;

/// The native response sink underneath a transaction.
///
/// The transport behind this trait is a black box; the interception layer
/// only needs a head that can be sent once, a byte stream, and a
/// completion step that carries the trailers.
pub trait Transport: Send {
    /// Send the status line and ordinary headers. Called at most once per
    /// response.
    fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> Result<(), String>;

    /// Stream one chunk of body bytes. The head has already been sent.
    fn write_body(&mut self, chunk: &[u8]) -> Result<(), String>;

    /// Complete the response, emitting any trailers.
    fn finish(&mut self, trailers: &HeaderMap) -> Result<(), String>;
}

/// Uniform read/write surface over the response, polymorphic over mode.
pub enum ResponseSink {
    PassThrough(PassThroughSink),
    Buffering(BufferedSink),
}

/// Pass-through mode: no buffering, standard streaming discipline.
pub struct PassThroughSink {
    transport: Box<dyn Transport>,
    status: StatusCode,
    headers: HeaderMap,
    head_sent: bool,
}

/// Buffering mode: the response is held locally until finalization.
pub struct BufferedSink {
    transport: Box<dyn Transport>,
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseSink {
    pub fn pass_through(transport: Box<dyn Transport>) -> Self {
        ResponseSink::PassThrough(PassThroughSink {
            transport,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_sent: false,
        })
    }

    pub fn buffering(transport: Box<dyn Transport>) -> Self {
        ResponseSink::Buffering(BufferedSink {
            transport,
            status: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        })
    }

    pub fn is_buffering(&self) -> bool {
        matches!(self, ResponseSink::Buffering(_))
    }

    /// Last explicitly set status code, `200 OK` when never set.
    pub fn status(&self) -> StatusCode {
        match self {
            ResponseSink::PassThrough(sink) => sink.status,
            ResponseSink::Buffering(sink) => sink.status.unwrap_or(StatusCode::OK),
        }
    }

    /// Set the status code.
    ///
    /// Buffering mode stores it locally, overwritable until the flush.
    /// Pass-through mode sends the head immediately; once the head is on
    /// the wire — by a previous status write or a body write — the call
    /// fails with [`HostError::InvalidStateTransition`], since a
    /// transport cannot un-send a status line.
    pub fn set_status(&mut self, status: StatusCode) -> HostResult<()> {
        match self {
            ResponseSink::Buffering(sink) => {
                sink.status = Some(status);
                Ok(())
            }
            ResponseSink::PassThrough(sink) => {
                if sink.head_sent {
                    return Err(HostError::InvalidStateTransition(
                        "status line already sent to the transport",
                    ));
                }
                sink.status = status;
                sink.send_head()
            }
        }
    }

    /// The sink's full header collection, deferred-trailer entries
    /// included.
    pub fn headers(&self) -> &HeaderMap {
        match self {
            ResponseSink::PassThrough(sink) => &sink.headers,
            ResponseSink::Buffering(sink) => &sink.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        match self {
            ResponseSink::PassThrough(sink) => &mut sink.headers,
            ResponseSink::Buffering(sink) => &mut sink.headers,
        }
    }

    /// Ordinary response header names; deferred-trailer entries excluded.
    pub fn header_names(&self) -> Vec<String> {
        self.headers()
            .keys()
            .filter(|name| !trailers::is_trailer(name))
            .map(|name| name.as_str().to_owned())
            .collect()
    }

    /// First value under `name`.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers()
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }

    /// Set header `name`, replacing every existing value.
    ///
    /// In pass-through mode an ordinary header staged after the head went
    /// out never reaches the transport; only trailer-prefixed entries are
    /// read again at completion.
    pub fn set_header(&mut self, name: &str, value: &str) -> HostResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HostError::MalformedInput(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HostError::MalformedInput(format!("header value: {e}")))?;
        self.headers_mut().insert(name, value);
        Ok(())
    }

    /// Reader over the body produced so far. Only the buffering sink has
    /// observable output; a pass-through body has already left the
    /// process, so the reader is empty.
    pub fn body_reader(&self) -> Cursor<&[u8]> {
        match self {
            ResponseSink::Buffering(sink) => Cursor::new(sink.body.as_slice()),
            ResponseSink::PassThrough(_) => Cursor::new(&[]),
        }
    }

    /// Writer for the response body.
    ///
    /// Acquiring the writer in buffering mode discards anything
    /// previously buffered — asking for it is the declaration of a
    /// rewrite. In pass-through mode writes go straight to the transport
    /// and cannot be taken back.
    pub fn body_writer(&mut self) -> BodyWriter<'_> {
        match self {
            ResponseSink::Buffering(sink) => {
                sink.body.clear();
                BodyWriter::Buffered(&mut sink.body)
            }
            ResponseSink::PassThrough(sink) => BodyWriter::Live(sink),
        }
    }

    pub fn trailer_names(&self) -> Vec<String> {
        trailers::names(self.headers())
    }

    pub fn trailer(&self, name: &str) -> Option<String> {
        trailers::get(self.headers(), name)
    }

    pub fn set_trailer(&mut self, name: &str, value: &str) -> HostResult<()> {
        trailers::set(self.headers_mut(), name, value)
    }

    /// Flush and complete the response. The buffering sink releases its
    /// captured status, headers, body, and trailers in one shot; the
    /// pass-through sink only has the completion (and a head, if nothing
    /// was ever written) left to send. Consuming the sink makes mutation
    /// after the flush unrepresentable.
    pub fn finish(self) -> HostResult<()> {
        match self {
            ResponseSink::PassThrough(mut sink) => {
                if !sink.head_sent {
                    sink.send_head()?;
                }
                let (_, trailers) = trailers::partition(&sink.headers);
                tracing::debug!(trailers = trailers.len(), "completing streamed response");
                sink.transport.finish(&trailers).map_err(HostError::Transport)
            }
            ResponseSink::Buffering(mut sink) => {
                let status = sink.status.unwrap_or(StatusCode::OK);
                let (ordinary, trailers) = trailers::partition(&sink.headers);
                tracing::debug!(
                    status = status.as_u16(),
                    body_bytes = sink.body.len(),
                    trailers = trailers.len(),
                    "flushing buffered response"
                );
                sink.transport
                    .send_head(status, &ordinary)
                    .map_err(HostError::Transport)?;
                if !sink.body.is_empty() {
                    sink.transport
                        .write_body(&sink.body)
                        .map_err(HostError::Transport)?;
                }
                sink.transport.finish(&trailers).map_err(HostError::Transport)
            }
        }
    }
}

impl PassThroughSink {
    /// Send the staged head. Trailer-prefixed entries stay behind in the
    /// staged collection until completion.
    fn send_head(&mut self) -> HostResult<()> {
        let (ordinary, _) = trailers::partition(&self.headers);
        tracing::debug!(status = self.status.as_u16(), "sending response head");
        self.transport
            .send_head(self.status, &ordinary)
            .map_err(HostError::Transport)?;
        self.head_sent = true;
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> HostResult<()> {
        if !self.head_sent {
            self.send_head()?;
        }
        self.transport.write_body(chunk).map_err(HostError::Transport)
    }
}

/// Destination for response body bytes, handed out by
/// [`ResponseSink::body_writer`].
pub enum BodyWriter<'a> {
    /// Appends to the buffering sink's captured body.
    Buffered(&'a mut Vec<u8>),
    /// Forwards each write to the transport, sending the head first if it
    /// has not gone out yet.
    Live(&'a mut PassThroughSink),
}

impl Write for BodyWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BodyWriter::Buffered(body) => {
                body.extend_from_slice(buf);
                Ok(buf.len())
            }
            BodyWriter::Live(sink) => {
                sink.write_chunk(buf).map_err(io::Error::other)?;
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
