//! Paginated swap history endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::instrument;

use crate::api::middleware::error::ApiError;
use crate::api::models::{EventsQuery, EventsResponse};
use crate::app_state::AppState;
use crate::error::SyncError;

/// Parse the `page` parameter; absent means page 1.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] unless the value is a positive integer.
pub fn parse_page(raw: Option<&str>) -> Result<usize, ApiError> {
    let Some(raw) = raw else {
        return Ok(1);
    };
    match raw.trim().parse::<usize>() {
        Ok(page) if page >= 1 => Ok(page),
        _ => Err(ApiError::BadRequest(format!(
            "page must be a positive integer, got: {raw}"
        ))),
    }
}

/// Returns one page of the current session's swaps, newest first.
#[instrument(skip(state))]
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let page = parse_page(query.page.as_deref())?;

    let session = state
        .current_session()
        .ok_or_else(|| SyncError::session_not_ready("wallet, network or provider"))?;

    let key = session.key();
    Ok(Json(EventsResponse {
        address: key.address.to_string(),
        chain_id: key.chain_id,
        page: session.page(state.page_size, page).await,
    }))
}
