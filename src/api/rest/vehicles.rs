use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::engine::accounts::NewVehicle;
use crate::error::AppError;
use crate::models::vehicle::Vehicle;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vehicles/registerVehicle", post(register_vehicle))
        .route("/vehicles/driver/:driver_id", get(vehicle_for_driver))
}

async fn register_vehicle(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewVehicle>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let vehicle = state.accounts.register_vehicle(payload)?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn vehicle_for_driver(
    State(state): State<Arc<AppState>>,
    ApiPath(driver_id): ApiPath<i64>,
) -> Result<Json<Vehicle>, AppError> {
    Ok(Json(state.accounts.vehicle_for_driver(driver_id)?))
}
