//! Interception-layer error types.

use thiserror::Error;

/// Errors surfaced by host-surface procedures.
///
/// Downstream pipeline failures during [`advance`](crate::Transaction::advance)
/// arrive as [`HostError::Pipeline`] and do not fail the transaction — the
/// guest decides how to represent them in its own response.
#[derive(Debug, Error)]
pub enum HostError {
    /// The guest supplied input the host cannot parse (request target,
    /// header name or value, status code).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The requested mutation is impossible in the sink's current state,
    /// e.g. setting the status code after the head left the process.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(&'static str),

    /// The remaining pipeline stage failed during the handoff.
    #[error("pipeline stage failed: {0}")]
    Pipeline(#[source] anyhow::Error),

    /// The native transport rejected a write.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type HostResult<T> = Result<T, HostError>;
