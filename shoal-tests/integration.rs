//! Integration tests for Shoal
//!
//! Drive the full axum router over the simulated swarm: locator handling,
//! range semantics, session sharing between readers, stats polling and
//! idle reaping.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/range_streaming.rs"]
mod range_streaming;
#[path = "integration/session_lifecycle.rs"]
mod session_lifecycle;
#[path = "integration/stats_endpoint.rs"]
mod stats_endpoint;
