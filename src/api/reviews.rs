use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error::ApiError, AppState};
use crate::models::Restaurant;
use crate::store;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewsQuery {
    #[serde(alias = "nombre")]
    pub name: Option<String>,
}

/// GET /reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<Vec<Restaurant>>, ApiError> {
    let mut restaurants = store::load_restaurants(&state.restaurants_path)
        .await
        .map_err(ApiError::reviews)?;

    if let Some(needle) = query
        .name
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
    {
        restaurants.retain(|restaurant| restaurant.name.to_lowercase().contains(&needle));
    }
    Ok(Json(restaurants))
}

/// GET /reviews/:index, by position in the export.
pub async fn review_at(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> Result<Json<Restaurant>, ApiError> {
    let position: usize = index
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid review index: {index}")))?;

    let restaurants = store::load_restaurants(&state.restaurants_path)
        .await
        .map_err(ApiError::reviews)?;
    let total = restaurants.len();
    restaurants
        .into_iter()
        .nth(position)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            message: format!("No restaurant at position {position}"),
            detail: format!("index {position} out of range ({total} restaurants)"),
        })
}
