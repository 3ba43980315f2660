//! HTTP gateway for the voice conversation pipeline.
//!
//! One request runs upload → transcription → reply generation, returns the
//! reply immediately, and leaves speech synthesis to a background job whose
//! output is served from the static directory.

pub mod error;
pub mod jobs;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod state;

pub use server::{build_router, start_gateway};
pub use state::{GatewayState, Providers};
