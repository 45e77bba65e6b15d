//! Analysis gateway.
//!
//! This module owns the boundary with the external vision model: the
//! image payload, the fixed instruction and response schema, and the
//! HTTP client that sends one request per analysis.

pub mod client;
pub mod payload;
pub mod schema;

pub use client::{AnalysisService, GatewayConfig, GatewayError, GeminiGateway};
pub use payload::ImagePayload;
