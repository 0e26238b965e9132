//! Shoal Web - HTTP surface of the streaming gateway
//!
//! Exposes swarm content as byte-range addressable media:
//!
//! - `GET|HEAD /stream?locator=` streams the first playable file, honoring `Range`
//! - `GET /stream?locator=&stats=true` polls transfer metrics without creating a session
//! - `DELETE /stream?locator=` tears a session down
//! - `GET /sessions` and `GET /health` for operators

pub mod error;
pub mod handlers;
pub mod range_response;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, router, run_server};
