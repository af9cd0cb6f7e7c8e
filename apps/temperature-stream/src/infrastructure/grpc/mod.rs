//! gRPC Transport
//!
//! Implements the `TemperatureService` bidirectional stream on the server
//! side and the subscription driver on the client side.
//!
//! # Architecture
//!
//! Each `StreamTemperature` call becomes one session task:
//!
//! 1. The task waits for a slot in the bounded session pool
//! 2. Inbound `TemperatureRequest`s feed the session's registry
//! 3. When the client closes its send half, the registry freezes
//! 4. Samples are written to a per-session channel drained by tonic
//! 5. The session ends on disconnect, write failure, or shutdown

pub mod client;
pub mod convert;
pub mod server;
pub mod sessions;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod temperature {
        pub mod v1 {
            include!("../../../../../packages/schema-gen/rust/temperature/v1/temperature.v1.rs");
        }
    }
}

pub use client::{ClientError, ReceiveSummary, StreamOutcome, SubscriptionDriver, receive_samples};
pub use server::{TemperatureStreamServer, TemperatureStreamServerConfig};
pub use sessions::{SessionCounts, SessionTracker, TrackedSession};
