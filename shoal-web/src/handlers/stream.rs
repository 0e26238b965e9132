//! `/stream` handlers: range streaming, stats polling and teardown.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use shoal_core::{
    ContentId, FileHandle, Locator, RangePlan, ReadSequence, SessionError, SwarmSession,
    select_video_file, stats,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::range_response;
use crate::server::AppState;

/// Query accepted by every `/stream` method.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(alias = "magnet")]
    pub locator: Option<String>,
    #[serde(default)]
    pub stats: bool,
}

impl StreamQuery {
    fn locator(&self) -> Result<&str, ApiError> {
        self.locator.as_deref().ok_or(ApiError::MissingLocator)
    }
}

/// Streams the first playable file, or reports stats when `stats=true`.
pub async fn stream_get(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let raw = query.locator()?;
    if query.stats {
        return stats_response(&state, raw);
    }

    let locator = Locator::parse(raw)?;
    let (file, plan, reader) = open_stream(&state, &locator, range_header(&headers)).await?;
    debug!(
        content_id = %locator.content_id.short(),
        file = %file.name,
        partial = plan.is_partial(),
        bytes = plan.content_length(),
        "streaming"
    );
    Ok(range_response::stream_response(&file, &plan, reader))
}

/// Same status logic as GET without opening a read sequence.
pub async fn stream_head(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let locator = Locator::parse(query.locator()?)?;
    let session = state.registry.get_or_create(&locator).await?;
    let file = select_or_release(&state, &session).await?;
    let plan = RangePlan::resolve(range_header(&headers), file.length)?;
    Ok(range_response::head_response(&file, &plan))
}

/// Destroys the session for a locator.
pub async fn stream_delete(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<StatusCode, ApiError> {
    let content_id = ContentId::from_locator(query.locator()?)?;
    if state.registry.destroy(&content_id).await {
        info!(content_id = %content_id, "session destroyed on request");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound { content_id })
    }
}

fn stats_response(state: &AppState, raw: &str) -> Result<Response, ApiError> {
    let content_id = ContentId::from_locator(raw)?;
    match stats::probe(&state.registry, raw)? {
        Some(snapshot) => Ok(Json(snapshot).into_response()),
        None => Err(ApiError::SessionNotFound { content_id }),
    }
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
}

/// Resolves the session, file, plan and read sequence for one request.
///
/// A session reaped between lookup and open is rejoined once.
async fn open_stream(
    state: &AppState,
    locator: &Locator,
    range: Option<&str>,
) -> Result<(FileHandle, RangePlan, Option<ReadSequence>), ApiError> {
    let mut rejoined = false;
    loop {
        let session = state.registry.get_or_create(locator).await?;
        let file = select_or_release(state, &session).await?;
        let plan = RangePlan::resolve(range, file.length)?;

        let Some(window) = plan.window() else {
            return Ok((file, plan, None));
        };
        match session.open_reader(file.index, window) {
            Ok(reader) => return Ok((file, plan, Some(reader))),
            Err(SessionError::Destroyed { .. }) if !rejoined => {
                debug!(content_id = %locator.content_id.short(), "session destroyed before read, rejoining");
                rejoined = true;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Selects the playable file, destroying unread sessions that have none.
async fn select_or_release(
    state: &AppState,
    session: &Arc<SwarmSession>,
) -> Result<FileHandle, ApiError> {
    match select_video_file(session.files()) {
        Ok(file) => Ok(file.clone()),
        Err(e) => {
            if session.active_readers() == 0 {
                state.registry.destroy_session(session).await;
            }
            Err(e.into())
        }
    }
}
