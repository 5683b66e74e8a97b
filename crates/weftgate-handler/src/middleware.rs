//! The guest seam.
//!
//! A [`Middleware`] is the external processing unit that drives the host
//! surface for one transaction. The call marshaling between this trait
//! and however the guest is actually encoded (a wasm unit, a script, an
//! in-process handler) lives outside this crate; here a guest is just
//! something invoked once per transaction with the explicit handle.

use crate::transaction::Transaction;

/// One guest invocation per transaction.
///
/// The guest decides whether and when the remaining pipeline runs by
/// calling [`Transaction::advance`] — or not calling it, short-circuiting
/// the pipeline entirely. Returning an error abandons the transaction;
/// whatever the sink already streamed stays sent, anything buffered is
/// discarded by the embedder.
pub trait Middleware: Send + Sync {
    fn handle(&self, txn: &mut Transaction) -> anyhow::Result<()>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Transaction) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, txn: &mut Transaction) -> anyhow::Result<()> {
        self(txn)
    }
}

/// Forwards every request straight to the remaining pipeline, touching
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Middleware for Passthrough {
    fn handle(&self, txn: &mut Transaction) -> anyhow::Result<()> {
        txn.advance()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::{HeaderMap, Method, StatusCode, Uri, Version};

    use crate::features::Features;
    use crate::request::{RequestBody, RequestState};
    use crate::sink::Transport;

    struct NullTransport;

    impl Transport for NullTransport {
        fn send_head(&mut self, _status: StatusCode, _headers: &HeaderMap) -> Result<(), String> {
            Ok(())
        }

        fn write_body(&mut self, _chunk: &[u8]) -> Result<(), String> {
            Ok(())
        }

        fn finish(&mut self, _trailers: &HeaderMap) -> Result<(), String> {
            Ok(())
        }
    }

    fn transaction() -> Transaction {
        let request = RequestState::new(
            Method::GET,
            &"/".parse::<Uri>().unwrap(),
            Version::HTTP_11,
            HeaderMap::new(),
            RequestBody::empty(),
        );
        Transaction::new(
            request,
            Box::new(NullTransport),
            Features::BUFFER_RESPONSE,
            Box::new(|_req, _sink| Ok(())),
        )
    }

    #[test]
    fn passthrough_advances() {
        let mut txn = transaction();
        Passthrough.handle(&mut txn).unwrap();
        assert!(txn.advanced());
    }

    #[test]
    fn closures_are_middleware() {
        let mw = |txn: &mut Transaction| -> anyhow::Result<()> {
            txn.set_response_header("x-seen", "1")?;
            Ok(())
        };
        let mut txn = transaction();
        mw.handle(&mut txn).unwrap();
        assert_eq!(txn.response_header("x-seen").as_deref(), Some("1"));
    }
}
