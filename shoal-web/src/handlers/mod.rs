//! HTTP request handlers organized by functionality

pub mod sessions;
pub mod stream;

pub use sessions::{health, list_sessions};
pub use stream::{StreamQuery, stream_delete, stream_get, stream_head};
