use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::api::rest::form::{bearer_token, Form};
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::trip::Trip;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers/createDrivers", post(create_driver))
        .route("/drivers/:id", get(get_driver))
        .route(
            "/drivers/getDriverByClerkDriverId/:clerk_driver_id",
            get(get_driver_by_clerk_id),
        )
        .route("/drivers/update-location/:clerk_driver_id", put(update_location))
        .route("/drivers/me/rides", get(my_rides))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub is_online: bool,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    let mut form = Form::read(multipart).await?;
    let token = form.required_text("token")?;
    let profile_image = form.file("profileImage");
    let license_image = form.file("licenseImage");

    let driver = state
        .accounts
        .create_driver(&token, profile_image, license_image)
        .await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.accounts.driver(id)?))
}

async fn get_driver_by_clerk_id(
    State(state): State<Arc<AppState>>,
    ApiPath(clerk_driver_id): ApiPath<String>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.accounts.driver_by_clerk_id(&clerk_driver_id)?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    ApiPath(clerk_driver_id): ApiPath<String>,
    ApiJson(payload): ApiJson<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.registry.upsert_location(
        &clerk_driver_id,
        payload.latitude,
        payload.longitude,
        payload.is_online,
    )?;
    Ok(Json(driver))
}

async fn my_rides(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Trip>>, AppError> {
    let token = bearer_token(&headers)?;
    let driver = state.accounts.authenticated_driver(token).await?;
    Ok(Json(state.rides.history_for_driver(&driver.clerk_driver_id)?))
}
