//! WeftGate interception core.
//!
//! The request-interception layer of an HTTP middleware host: every
//! inbound transaction is exposed to an external middleware unit ("the
//! guest") through a typed host surface that can read and rewrite the
//! request, shape the response, and decide whether and when the remaining
//! pipeline runs.
//!
//! # Architecture
//!
//! ```text
//! transport (hyper, test harness, ...)
//!   │
//!   ▼
//! Transaction ──────────── per-request unit of truth
//!   ├── RequestState       method / target / headers / trailers / body
//!   ├── ResponseSink       pass-through or buffering, fixed at creation
//!   │     └── Transport    the native sink, a black box behind a trait
//!   ├── Features           negotiated capabilities
//!   └── advance()          single-use handoff to the remaining pipeline
//! ```
//!
//! The guest interacts exclusively through [`Transaction`] methods — the
//! host surface — and each transaction is exclusively owned by the
//! execution context handling its request, so there is no cross-request
//! locking at this layer.
//!
//! Trailers deserve a note: a transport can only accept trailers at
//! response completion, but the host surface allows setting them at any
//! point. They therefore ride inside the ordinary header collection under
//! a reserved name prefix (see [`trailers`]) and materialize when the
//! transaction finalizes.

pub mod error;
pub mod features;
pub mod middleware;
pub mod request;
pub mod sink;
pub mod trailers;
pub mod transaction;

pub use error::{HostError, HostResult};
pub use features::{FeatureNegotiator, Features};
pub use middleware::{Middleware, Passthrough};
pub use request::{RequestBody, RequestState};
pub use sink::{BodyWriter, ResponseSink, Transport};
pub use transaction::{Pipeline, Transaction};
