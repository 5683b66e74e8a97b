//! In-memory transport backing one HTTP exchange.
//!
//! hyper's service model produces a whole `Response` per request, so the
//! trigger's [`Transport`] implementation accumulates everything the sink
//! emits — head, body bytes, trailers — and assembles the final response
//! once the transaction is done. A [`CollectorHandle`] shares the
//! accumulated state so the trigger can still reach it after the
//! transaction consumed the collector.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};

use weftgate_handler::Transport;

/// Body type produced by the trigger.
pub type ResponseBody = BoxBody<Bytes, Infallible>;

#[derive(Default)]
struct Collected {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    trailers: HeaderMap,
    finished: bool,
}

/// A [`Transport`] that records the response instead of writing to a
/// socket.
#[derive(Default)]
pub struct ResponseCollector {
    inner: Arc<Mutex<Collected>>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle onto the shared state, usable after the collector itself
    /// moved into a transaction.
    pub fn handle(&self) -> CollectorHandle {
        CollectorHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Transport for ResponseCollector {
    fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> Result<(), String> {
        let mut collected = self.inner.lock().map_err(|_| "collector poisoned")?;
        if collected.status.is_some() {
            return Err("response head already sent".to_string());
        }
        collected.status = Some(status);
        collected.headers = headers.clone();
        Ok(())
    }

    fn write_body(&mut self, chunk: &[u8]) -> Result<(), String> {
        let mut collected = self.inner.lock().map_err(|_| "collector poisoned")?;
        collected.body.extend_from_slice(chunk);
        Ok(())
    }

    fn finish(&mut self, trailers: &HeaderMap) -> Result<(), String> {
        let mut collected = self.inner.lock().map_err(|_| "collector poisoned")?;
        collected.trailers = trailers.clone();
        collected.finished = true;
        Ok(())
    }
}

/// Shared view over a [`ResponseCollector`]'s accumulated state.
pub struct CollectorHandle {
    inner: Arc<Mutex<Collected>>,
}

impl CollectorHandle {
    /// Whether the response head reached the transport. Once true, the
    /// exchange cannot fall back to an error page.
    pub fn head_sent(&self) -> bool {
        self.inner
            .lock()
            .map(|collected| collected.status.is_some())
            .unwrap_or(false)
    }

    /// Assemble the final response from whatever was collected. Trailers
    /// ride on the body via `http-body-util`'s trailer frame support.
    pub fn into_response(self) -> anyhow::Result<Response<ResponseBody>> {
        let collected = {
            let mut guard = self
                .inner
                .lock()
                .map_err(|_| anyhow::anyhow!("collector poisoned"))?;
            std::mem::take(&mut *guard)
        };

        let mut response = Response::builder()
            .status(collected.status.unwrap_or(StatusCode::OK))
            .body(body_with_trailers(
                Bytes::from(collected.body),
                collected.trailers,
            ))?;
        *response.headers_mut() = collected.headers;
        Ok(response)
    }
}

fn body_with_trailers(bytes: Bytes, trailers: HeaderMap) -> ResponseBody {
    if trailers.is_empty() {
        Full::new(bytes).boxed()
    } else {
        Full::new(bytes)
            .with_trailers(std::future::ready(Some(Ok::<_, Infallible>(trailers))))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_head_body_and_completion() {
        let mut collector = ResponseCollector::new();
        let handle = collector.handle();

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/plain".parse().unwrap());
        collector.send_head(StatusCode::CREATED, &headers).unwrap();
        assert!(handle.head_sent());

        collector.write_body(b"hello ").unwrap();
        collector.write_body(b"world").unwrap();
        collector.finish(&HeaderMap::new()).unwrap();

        let response = handle.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn rejects_double_head() {
        let mut collector = ResponseCollector::new();
        collector.send_head(StatusCode::OK, &HeaderMap::new()).unwrap();
        let err = collector
            .send_head(StatusCode::NOT_FOUND, &HeaderMap::new())
            .unwrap_err();
        assert!(err.contains("already sent"));
    }

    #[test]
    fn untouched_collector_defaults_to_200() {
        let collector = ResponseCollector::new();
        let handle = collector.handle();
        assert!(!handle.head_sent());

        let response = handle.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn body_and_trailers_survive_assembly() {
        let mut collector = ResponseCollector::new();
        let handle = collector.handle();

        collector.send_head(StatusCode::OK, &HeaderMap::new()).unwrap();
        collector.write_body(b"payload").unwrap();
        let mut trailers = HeaderMap::new();
        trailers.insert("checksum", "deadbeef".parse().unwrap());
        collector.finish(&trailers).unwrap();

        let response = handle.into_response().unwrap();
        let collected = response.into_body().collect().await.unwrap();
        assert_eq!(
            collected
                .trailers()
                .and_then(|t| t.get("checksum"))
                .unwrap(),
            "deadbeef"
        );
        assert_eq!(collected.to_bytes().as_ref(), b"payload");
    }
}
