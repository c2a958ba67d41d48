use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{error, info};

use super::{error::ApiError, AppState};
use crate::models::RefreshSummary;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: RefreshSummary,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RefreshStatus {
    Never,
    Ok(RefreshSummary),
}

/// POST /admin/refresh
pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    info!("manual refresh requested");
    match state.aggregator.refresh().await {
        Ok(outcome) => Ok(Json(RefreshResponse {
            success: true,
            summary: outcome.summary,
        })),
        Err(err) => {
            error!("manual refresh failed: {err:#}");
            Err(ApiError::Refresh(format!("{err:#}")))
        }
    }
}

/// GET /admin/refresh-status
pub async fn refresh_status(State(state): State<AppState>) -> Result<Json<RefreshStatus>, ApiError> {
    let summary = state
        .aggregator
        .store()
        .load_summary()
        .await
        .map_err(|err| ApiError::Storage(err.to_string()))?;
    Ok(Json(match summary {
        Some(summary) => RefreshStatus::Ok(summary),
        None => RefreshStatus::Never,
    }))
}
