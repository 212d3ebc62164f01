use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;

use crate::api::rest::extract::ApiPath;
use crate::api::rest::form::{bearer_token, Form};
use crate::engine::accounts::ProfileUpdate;
use crate::error::AppError;
use crate::models::rider::Rider;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/createUsers", post(create_user))
        .route("/users/getUserByClerkUserId/:id", get(get_user))
        .route("/users/updateProfile", put(update_profile))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Rider>), AppError> {
    let mut form = Form::read(multipart).await?;
    let token = form.required_text("token")?;
    let profile_image = form.file("profileImage");

    let rider = state.accounts.create_rider(&token, profile_image).await?;
    Ok((StatusCode::CREATED, Json(rider)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Rider>, AppError> {
    Ok(Json(state.accounts.rider(&id)?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Rider>, AppError> {
    let token = bearer_token(&headers)?;
    let mut form = Form::read(multipart).await?;

    let update = ProfileUpdate {
        profile_image: form.file("profileImage"),
        emergency_contact_name: form.text("userEmergencyContactName")?,
        emergency_contact_number: form.text("userEmergencyContactNumber")?,
        date_of_birth: form.text("dateOfBirth")?,
    };

    Ok(Json(state.accounts.update_profile(token, update).await?))
}
