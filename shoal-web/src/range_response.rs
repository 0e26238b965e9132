//! Range-aware media responses.
//!
//! Headers come entirely from the [`RangePlan`]; the body forwards chunks
//! from the request's own [`ReadSequence`]. When the client goes away hyper
//! drops the body, which drops the sequence and withdraws its interest.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use shoal_core::{FileHandle, RangePlan, ReadSequence, media};

/// Response streaming `reader` for the planned window of `file`.
///
/// `reader` is None only when the plan has no bytes to send.
pub fn stream_response(file: &FileHandle, plan: &RangePlan, reader: Option<ReadSequence>) -> Response {
    let body = match reader {
        Some(reader) => Body::from_stream(reader),
        None => Body::empty(),
    };
    build(file, plan, body)
}

/// Headers-only response for HEAD requests.
pub fn head_response(file: &FileHandle, plan: &RangePlan) -> Response {
    build(file, plan, Body::empty())
}

fn build(file: &FileHandle, plan: &RangePlan, body: Body) -> Response {
    let status = if plan.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static(media::content_type_for(&file.name)),
        )
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, plan.content_length())
        .header(header::CACHE_CONTROL, "no-cache");

    if let Some(content_range) = plan.content_range() {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to build range response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
