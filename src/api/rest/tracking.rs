use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracking/update", post(update_location))
        .route("/tracking/distance/:ride_id", get(distance))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackUpdateRequest {
    pub ride_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceResponse {
    pub distance_km: f64,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<TrackUpdateRequest>,
) -> Result<&'static str, AppError> {
    state
        .tracker
        .append_point(payload.ride_id, payload.latitude, payload.longitude)?;
    Ok("Location stored")
}

async fn distance(
    State(state): State<Arc<AppState>>,
    ApiPath(ride_id): ApiPath<i64>,
) -> Json<DistanceResponse> {
    Json(DistanceResponse {
        distance_km: state.tracker.polyline_distance(ride_id),
    })
}
