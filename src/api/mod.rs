//! HTTP surface.

pub mod admin;
pub mod error;
pub mod health;
pub mod listings;
pub mod recommend;
pub mod reviews;

use std::path::PathBuf;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::aggregator::Aggregator;
use crate::reconciler::Reconciler;
use crate::recommend::Recommender;

pub use error::ApiError;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Reconciler,
    pub aggregator: Aggregator,
    pub recommender: Recommender,
    pub restaurants_path: PathBuf,
}

impl AppState {
    pub fn new(
        reconciler: Reconciler,
        aggregator: Aggregator,
        recommender: Recommender,
        restaurants_path: PathBuf,
    ) -> Self {
        Self {
            reconciler,
            aggregator,
            recommender,
            restaurants_path,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/listings", get(listings::list_listings))
        .route("/listings/:kind", get(listings::list_by_kind))
        .route("/sources", get(listings::list_sources))
        .route("/admin/refresh", post(admin::refresh))
        .route("/admin/refresh-status", get(admin::refresh_status))
        .route("/reviews", get(reviews::list_reviews))
        .route("/reviews/:index", get(reviews::review_at))
        .route("/recommend", post(recommend::recommend))
        .merge(health::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /
async fn index() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "listings": "GET /listings?kind=&includePast=",
            "listingsByKind": "GET /listings/:kind",
            "sources": "GET /sources",
            "refresh": "POST /admin/refresh",
            "refreshStatus": "GET /admin/refresh-status",
            "reviews": "GET /reviews?name=",
            "reviewByIndex": "GET /reviews/:index",
            "recommend": "POST /recommend",
            "health": "GET /health",
        }
    }))
}
