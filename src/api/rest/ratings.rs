use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::engine::ratings::NewRating;
use crate::error::AppError;
use crate::models::rating::Rating;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ratings", post(rate_ride))
        .route("/ratings/byRide/:ride_id", get(rating_for_ride))
}

async fn rate_ride(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewRating>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    Ok((StatusCode::CREATED, Json(state.ratings.rate(payload)?)))
}

async fn rating_for_ride(
    State(state): State<Arc<AppState>>,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<Json<Rating>, AppError> {
    Ok(Json(state.ratings.for_ride(ride_id)?))
}
