use crate::routes::error::map_origin_error;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pulse_core::{Event, OriginError};
use tracing::warn;

#[derive(Debug, serde::Deserialize)]
pub struct EventsQuery {
    limit: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/grouped", get(grouped_events))
        .route("/events/subscribe", get(subscribe))
        .with_state(state)
}

/// Validated page of recent events, most recent first. The viewer's initial
/// backfill; the live stream takes over from here.
pub(crate) async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    match fetch_page(&state, query.limit).await {
        Ok(events) => Json(events).into_response(),
        Err(err) => map_origin_error(&err).into_response(),
    }
}

/// Same page, collapsed into display-ready groups by the correlator.
pub(crate) async fn grouped_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    match fetch_page(&state, query.limit).await {
        Ok(events) => Json(pulse_core::group(&events)).into_response(),
        Err(err) => map_origin_error(&err).into_response(),
    }
}

pub(crate) async fn subscribe(State(state): State<AppState>) -> Response {
    crate::sse::subscribe(state).await
}

async fn fetch_page(state: &AppState, limit: Option<u32>) -> Result<Vec<Event>, OriginError> {
    let limit = limit.unwrap_or(state.config.page_limit);
    let page = state.origin.recent_events(limit).await?;
    let mut events = Vec::with_capacity(page.len());
    for raw in page {
        match Event::from_raw(raw) {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "discarding malformed upstream event"),
        }
    }
    Ok(events)
}
