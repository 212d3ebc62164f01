use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clients::razorpay::{GatewayOrder, RazorpayClient, GATEWAY_LABEL};
use crate::error::AppError;
use crate::models::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::models::trip::TripPaymentStatus;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_RECEIPT: &str = "receipt#1";

/// Result of a gateway callback. Signature mismatch is a normal outcome, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub valid: bool,
    pub payment: Payment,
}

pub struct PaymentEngine {
    store: Arc<Store>,
    gateway: Arc<RazorpayClient>,
    metrics: Metrics,
    order_slots: DashMap<i64, Arc<Mutex<()>>>,
}

impl PaymentEngine {
    pub fn new(store: Arc<Store>, gateway: Arc<RazorpayClient>, metrics: Metrics) -> Self {
        Self {
            store,
            gateway,
            metrics,
            order_slots: DashMap::new(),
        }
    }

    /// A bare gateway order, not tied to any ride.
    pub async fn create_order(
        &self,
        amount: Decimal,
        currency: Option<&str>,
        receipt: Option<&str>,
    ) -> Result<GatewayOrder, AppError> {
        self.timed_order(
            amount,
            currency.unwrap_or(DEFAULT_CURRENCY),
            receipt.unwrap_or(DEFAULT_RECEIPT),
        )
        .await
    }

    /// Opens (or re-opens) the online payment for a ride at its current fare. Calls for
    /// the same ride are serialized, so a duplicate request re-issues the order on the
    /// one payment row instead of racing it.
    pub async fn create_order_for_trip(&self, trip_id: i64) -> Result<Payment, AppError> {
        let slot = self.order_slots.entry(trip_id).or_default().clone();
        let _guard = slot.lock().await;

        let trip = self.store.trips.get(trip_id)?;
        let amount = trip
            .fare
            .ok_or_else(|| AppError::InvalidInput(format!("ride {trip_id} has no fare")))?;

        let existing = self.store.payments.for_trip(trip_id);
        if let Some(payment) = &existing {
            if payment.payment_status.is_settled() {
                return Err(AppError::InvalidState("already-paid".to_string()));
            }
            if payment.payment_status == PaymentStatus::Failed {
                return Err(AppError::InvalidState(format!(
                    "payment {} for ride {trip_id} has failed",
                    payment.id
                )));
            }
        }

        let order = self
            .timed_order(amount, DEFAULT_CURRENCY, &format!("ride-{trip_id}"))
            .await?;
        let gateway_response = order.body.to_string();

        let payment = match existing {
            Some(previous) => {
                let ((), payment) = self.store.payments.update(previous.id, |payment| {
                    if !payment.payment_status.can_transition_to(PaymentStatus::Pending) {
                        return Err(AppError::InvalidState(format!(
                            "payment {} is no longer pending",
                            payment.id
                        )));
                    }
                    payment.amount = amount;
                    payment.gateway_order_id = order.id.clone();
                    payment.transaction_id = order.id.clone();
                    payment.gateway_response = gateway_response;
                    Ok(())
                })?;
                self.store
                    .payments
                    .reindex_order(payment.id, &previous.gateway_order_id, &order.id)?;
                info!(payment_id = payment.id, ride_id = trip_id, order_id = %order.id, "gateway order re-issued");
                payment
            }
            None => {
                let payment = self.store.payments.insert(Payment {
                    id: 0,
                    trip_id,
                    clerk_user_id: trip.clerk_user_id.clone(),
                    clerk_driver_id: trip.clerk_driver_id.clone(),
                    amount,
                    payment_method: PaymentMethod::Online,
                    payment_gateway: GATEWAY_LABEL.to_string(),
                    gateway_order_id: order.id.clone(),
                    transaction_id: order.id.clone(),
                    gateway_response,
                    payment_status: PaymentStatus::Pending,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })?;
                info!(payment_id = payment.id, ride_id = trip_id, order_id = %order.id, amount = %amount, "payment created");
                payment
            }
        };

        Ok(payment)
    }

    pub fn by_ride(&self, trip_id: i64) -> Result<Payment, AppError> {
        self.store
            .payments
            .for_trip(trip_id)
            .ok_or_else(|| AppError::NotFound(format!("payment for ride {trip_id} not found")))
    }

    /// Applies a gateway callback. Replays of an accepted callback change nothing, and a
    /// bad signature only ever fails a pending payment.
    pub async fn verify_and_apply(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Verification, AppError> {
        let valid = self
            .gateway
            .verify_signature(order_id, payment_id, signature);
        self.metrics
            .payment_verifications_total
            .with_label_values(&[if valid { "valid" } else { "invalid" }])
            .inc();

        let id = self
            .store
            .payments
            .id_for_order(order_id)
            .ok_or_else(|| AppError::NotFound(format!("no payment for order {order_id}")))?;

        let (settled, payment) = self.store.payments.update(id, |payment| {
            match (valid, payment.payment_status) {
                (true, PaymentStatus::Pending) => {
                    payment.payment_status = PaymentStatus::Success;
                    payment.transaction_id = payment_id.to_string();
                    Ok(true)
                }
                (true, PaymentStatus::Success) => Ok(true),
                (true, status) => Err(AppError::InvalidState(format!(
                    "payment {} is {status:?}",
                    payment.id
                ))),
                (false, PaymentStatus::Pending) => {
                    payment.payment_status = PaymentStatus::Failed;
                    Ok(false)
                }
                (false, _) => Ok(false),
            }
        })?;

        if settled {
            self.store.trips.update(payment.trip_id, |trip| {
                trip.payment_status = TripPaymentStatus::Paid;
                Ok(())
            })?;
            info!(payment_id = payment.id, ride_id = payment.trip_id, "payment captured");
        } else {
            warn!(payment_id = payment.id, order_id, "payment signature rejected");
        }

        Ok(Verification { valid, payment })
    }

    pub fn refund(&self, payment_id: i64) -> Result<Payment, AppError> {
        let ((), payment) = self.store.payments.update(payment_id, |payment| {
            if !payment.payment_status.can_transition_to(PaymentStatus::Refunded) {
                return Err(AppError::InvalidState(format!(
                    "payment {} cannot be refunded from {:?}",
                    payment.id, payment.payment_status
                )));
            }
            payment.payment_status = PaymentStatus::Refunded;
            Ok(())
        })?;

        info!(payment_id = payment.id, ride_id = payment.trip_id, "payment refunded");
        Ok(payment)
    }

    async fn timed_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let start = Instant::now();
        let result = self.gateway.create_order(amount, currency, receipt).await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .gateway_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        result
    }
}
