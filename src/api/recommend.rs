use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::warn;

use super::{error::ApiError, AppState};
use crate::reconciler::Visibility;
use crate::recommend::Recommendation;
use crate::store::{self, StoreError};

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(default, alias = "mensaje")]
    pub message: Option<String>,
}

/// POST /recommend
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<Recommendation>, ApiError> {
    let message = request
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("a message is required".to_string()))?;

    let events = state
        .reconciler
        .handle_read(Visibility::UpcomingOnly)
        .await
        .map_err(ApiError::listings)?;

    let restaurants = match store::load_restaurants(&state.restaurants_path).await {
        Ok(restaurants) => restaurants,
        Err(StoreError::NotFound(path)) => {
            warn!("no restaurant export at {}, recommending events only", path.display());
            Vec::new()
        }
        Err(err) => return Err(ApiError::reviews(err)),
    };

    let recommendation = state
        .recommender
        .recommend(&message, &events, &restaurants)
        .await;
    Ok(Json(recommendation))
}
