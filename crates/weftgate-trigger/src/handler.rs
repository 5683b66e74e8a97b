//! HTTP trigger handler.
//!
//! [`HttpTrigger`] manages a hyper HTTP server that runs every inbound
//! request through a middleware transaction: the request is wrapped in a
//! [`Transaction`], the configured middleware (the guest) is invoked, and
//! the finalized response is handed back to hyper.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use tokio::net::TcpListener;
use tracing::{error, info};

use weftgate_handler::{Features, Middleware, Pipeline, RequestState, ResponseSink, Transaction};

use crate::collector::{ResponseBody, ResponseCollector};
use crate::convert;

/// The remaining pipeline stage behind the middleware.
///
/// The trigger builds one single-use handoff per request from this
/// callback — it maps requests to whatever sits downstream (a router, a
/// reverse proxy, an inner application) and writes its answer into the
/// transaction's sink.
pub type NextStage =
    Arc<dyn Fn(&mut RequestState, &mut ResponseSink) -> anyhow::Result<()> + Send + Sync>;

/// Runs one request through a middleware transaction.
///
/// Cheap to clone; the trigger clones it into every connection task.
#[derive(Clone)]
pub struct Interceptor {
    middleware: Arc<dyn Middleware>,
    next: NextStage,
    features: Features,
}

impl Interceptor {
    /// `features` is the process-wide negotiated set; it fixes the sink
    /// mode of every transaction this interceptor creates.
    pub fn new(middleware: Arc<dyn Middleware>, next: NextStage, features: Features) -> Self {
        Self {
            middleware,
            next,
            features,
        }
    }

    /// Wrap `req` in a transaction, invoke the middleware, finalize, and
    /// assemble the response.
    ///
    /// The guest runs synchronously on the calling task, per the
    /// one-execution-context-per-request model; only body collection
    /// suspends.
    pub async fn intercept<B>(&self, req: Request<B>) -> anyhow::Result<Response<ResponseBody>>
    where
        B: Body<Data = Bytes>,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .context("collecting request body")?
            .to_bytes();

        let request = convert::request_state(&parts, body.to_vec());
        let collector = ResponseCollector::new();
        let handle = collector.handle();

        let next = Arc::clone(&self.next);
        let pipeline: Pipeline = Box::new(move |req, sink| next(req, sink));

        let mut txn = Transaction::new(request, Box::new(collector), self.features, pipeline);
        match self.middleware.handle(&mut txn) {
            Ok(()) => {
                txn.finish().context("finalizing response")?;
            }
            Err(e) => {
                // Dropping the transaction discards anything buffered.
                drop(txn);
                if handle.head_sent() {
                    // The head already left pass-through; all that is
                    // possible now is to return what was streamed.
                    error!(error = %e, "middleware failed after response head was sent");
                } else {
                    error!(error = %e, "middleware failed");
                    return Ok(error_response());
                }
            }
        }

        handle.into_response()
    }
}

fn error_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Full::new(Bytes::from("Internal Server Error")).boxed())
        .unwrap()
}

/// HTTP trigger server.
///
/// Binds to a TCP port and runs every inbound request through the
/// interceptor. Spawns a tokio task per connection using HTTP/1.1.
pub struct HttpTrigger {
    bind_addr: SocketAddr,
    interceptor: Interceptor,
}

impl HttpTrigger {
    pub fn new(bind_addr: SocketAddr, interceptor: Interceptor) -> Self {
        Self {
            bind_addr,
            interceptor,
        }
    }

    /// Start the HTTP server.
    ///
    /// Runs until the shutdown signal is received.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .context("failed to bind HTTP trigger")?;

        info!(addr = %self.bind_addr, "HTTP trigger listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, peer_addr) = accept_result.context("accept failed")?;
                    let interceptor = self.interceptor.clone();

                    tokio::spawn(async move {
                        let io = hyper_util::rt::TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let interceptor = interceptor.clone();
                            async move {
                                match interceptor.intercept(req).await {
                                    Ok(resp) => Ok::<_, hyper::Error>(resp),
                                    Err(e) => {
                                        error!(%peer_addr, error = %e, "request interception failed");
                                        Ok(error_response())
                                    }
                                }
                            }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("HTTP trigger shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// A next stage that echoes the request line, for wiring tests and
/// demos without a real downstream.
pub fn echo_stage() -> NextStage {
    Arc::new(|req: &mut RequestState, sink: &mut ResponseSink| {
        use std::io::Write;

        let line = format!("{} {}", req.method(), req.uri());
        sink.set_header("content-type", "text/plain")?;
        sink.body_writer().write_all(line.as_bytes())?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use weftgate_handler::Passthrough;

    fn echo_interceptor(features: Features) -> Interceptor {
        Interceptor::new(Arc::new(Passthrough), echo_stage(), features)
    }

    #[test]
    fn http_trigger_creation() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let trigger = HttpTrigger::new(addr, echo_interceptor(Features::NONE));
        assert_eq!(trigger.bind_addr, addr);
    }

    #[tokio::test]
    async fn http_trigger_serves_and_shuts_down() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let trigger = HttpTrigger::new(addr, echo_interceptor(Features::NONE));

        let (tx, rx) = tokio::sync::watch::channel(false);

        let server = tokio::spawn(async move { trigger.serve(rx).await });

        // Give it a moment to bind.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // Signal shutdown.
        tx.send(true).unwrap();

        let result = server.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn intercept_echoes_through_passthrough_middleware() {
        let interceptor = echo_interceptor(Features::NONE);
        let req = Request::builder()
            .method("GET")
            .uri("/ping?x=1")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = interceptor.intercept(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"GET /ping?x=1");
    }

    #[tokio::test]
    async fn middleware_failure_maps_to_500() {
        let failing = |_txn: &mut Transaction| -> anyhow::Result<()> {
            anyhow::bail!("guest trapped")
        };
        let interceptor =
            Interceptor::new(Arc::new(failing), echo_stage(), Features::BUFFER_RESPONSE);

        let req = Request::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = interceptor.intercept(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
