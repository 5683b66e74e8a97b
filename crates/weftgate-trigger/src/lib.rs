//! weftgate-trigger — HTTP trigger for WeftGate.
//!
//! Bridges inbound HTTP requests to the interception core. Each request
//! becomes one transaction: the configured middleware (the guest) drives
//! the host surface, decides whether the remaining pipeline stage runs,
//! and the finalized response goes back out through hyper.
//!
//! # Architecture
//!
//! ```text
//! HTTP client
//!   │
//!   ▼
//! hyper server
//!   │
//!   ├── Collect request body, build RequestState
//!   ├── Transaction::new (ResponseCollector as the transport)
//!   ├── middleware.handle(&mut txn)
//!   │     └── txn.advance() → the configured next stage
//!   ├── Transaction::finish
//!   │
//!   ▼
//! assembled HTTP response (trailers riding as body frames)
//! ```

pub mod collector;
pub mod config;
pub mod convert;
pub mod handler;

pub use collector::{CollectorHandle, ResponseBody, ResponseCollector};
pub use config::TriggerConfig;
pub use handler::{HttpTrigger, Interceptor, NextStage, echo_stage};
