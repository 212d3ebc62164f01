use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::extract::{ApiJson, ApiPath, ApiQuery};
use crate::engine::rides::RideRequest;
use crate::error::AppError;
use crate::models::trip::Trip;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides/rideRequest", post(request_ride))
        .route("/rides/accept", post(accept_ride))
        .route("/rides/start", post(start_ride))
        .route("/rides/cancel", post(cancel_ride))
        .route("/rides/complete", post(complete_ride))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/otp", get(ride_otp))
        .route("/rides/:id/verify-otp", post(verify_otp))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideParams {
    pub ride_id: i64,
    pub clerk_driver_id: Option<String>,
    pub otp: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpQuery {
    pub clerk_user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub otp: String,
    pub clerk_driver_id: Option<String>,
}

#[derive(Serialize)]
struct OtpResponse {
    otp: String,
}

async fn request_ride(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RideRequest>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.rides.request(payload).await?))
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RideParams>,
) -> Result<Json<Trip>, AppError> {
    let driver = params
        .clerk_driver_id
        .as_deref()
        .map(str::trim)
        .filter(|driver| !driver.is_empty())
        .ok_or_else(|| AppError::InvalidInput("clerkDriverId is required".to_string()))?;

    Ok(Json(state.rides.accept(params.ride_id, driver).await?))
}

async fn start_ride(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RideParams>,
) -> Result<Json<Trip>, AppError> {
    let otp = params
        .otp
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput("otp is required".to_string()))?;
    let trip = state
        .rides
        .start(params.ride_id, otp, params.clerk_driver_id.as_deref())
        .await?;
    Ok(Json(trip))
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RideParams>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.rides.cancel(params.ride_id).await?))
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RideParams>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.rides.complete(params.ride_id).await?))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.rides.get(id)?))
}

async fn ride_otp(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<OtpQuery>,
) -> Result<Json<OtpResponse>, AppError> {
    let otp = state.rides.start_otp(id, &query.clerk_user_id)?;
    Ok(Json(OtpResponse { otp }))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> Result<Json<Trip>, AppError> {
    let trip = state
        .rides
        .start(id, &payload.otp, payload.clerk_driver_id.as_deref())
        .await?;
    Ok(Json(trip))
}
