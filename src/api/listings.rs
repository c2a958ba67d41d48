use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error::ApiError, AppState};
use crate::models::{ListingEntry, ListingKind};
use crate::reconciler::Visibility;
use crate::scraping::SourceInfo;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingsQuery {
    pub kind: Option<String>,
    pub include_past: Option<String>,
}

impl ListingsQuery {
    fn visibility(&self) -> Visibility {
        let include_past = self
            .include_past
            .as_deref()
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        Visibility::from_include_past(include_past)
    }
}

/// GET /listings
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<Vec<ListingEntry>>, ApiError> {
    let kind = match query.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(raw) => Some(parse_kind(raw)?),
        None => None,
    };
    read_listings(&state, query.visibility(), kind).await
}

/// GET /listings/:kind
pub async fn list_by_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<Vec<ListingEntry>>, ApiError> {
    let kind = parse_kind(&kind)?;
    read_listings(&state, query.visibility(), Some(kind)).await
}

/// GET /sources
pub async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    Json(state.aggregator.sources())
}

async fn read_listings(
    state: &AppState,
    visibility: Visibility,
    kind: Option<ListingKind>,
) -> Result<Json<Vec<ListingEntry>>, ApiError> {
    let mut entries = state
        .reconciler
        .handle_read(visibility)
        .await
        .map_err(ApiError::listings)?;
    if let Some(kind) = kind {
        entries.retain(|entry| entry.kind == kind);
    }
    Ok(Json(entries))
}

fn parse_kind(raw: &str) -> Result<ListingKind, ApiError> {
    raw.parse::<ListingKind>()
        .map_err(|_| ApiError::InvalidKind(raw.to_string()))
}
