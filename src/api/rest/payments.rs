use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::engine::payments::Verification;
use crate::error::AppError;
use crate::models::payment::Payment;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/createOrder", post(create_order))
        .route("/payments/createForRide/:ride_id", post(create_for_ride))
        .route("/payments/byRide/:ride_id", get(by_ride))
        .route("/payments/verify", post(verify))
        .route("/payments/webhook", post(webhook))
        .route("/payments/:id/refund", post(refund))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub receipt: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let order = state
        .payments
        .create_order(
            payload.amount,
            payload.currency.as_deref(),
            payload.receipt.as_deref(),
        )
        .await?;
    Ok(Json(order.body))
}

async fn create_for_ride(
    State(state): State<Arc<AppState>>,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.payments.create_order_for_trip(ride_id).await?))
}

async fn by_ride(
    State(state): State<Arc<AppState>>,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.payments.by_ride(ride_id)?))
}

async fn verify(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<VerifyRequest>,
) -> Result<Json<Verification>, AppError> {
    let outcome = state
        .payments
        .verify_and_apply(&payload.order_id, &payload.payment_id, &payload.signature)
        .await?;
    Ok(Json(outcome))
}

async fn refund(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.payments.refund(id)?))
}

/// Acknowledged and logged only.
async fn webhook(body: Bytes) -> Json<Value> {
    let event = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|value| value.get("event").and_then(Value::as_str).map(str::to_string));
    tracing::info!(event = ?event, bytes = body.len(), "payment webhook received");

    Json(json!({ "status": "received" }))
}
