use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::payment::Payment;
use crate::store::table::{claim_all, Row, Table, UniqueIndex};

impl Row for Payment {
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

pub struct PaymentStore {
    table: Table<Payment>,
    by_trip: UniqueIndex,
    by_order: UniqueIndex,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self {
            table: Table::new("payment"),
            by_trip: UniqueIndex::new("rideId"),
            by_order: UniqueIndex::new("gatewayOrderId"),
        }
    }

    pub fn insert(&self, mut payment: Payment) -> Result<Payment, AppError> {
        let id = self.table.allocate_id();
        let now = Utc::now();
        payment.id = id;
        payment.created_at = now;
        payment.updated_at = now;

        let trip_key = payment.trip_id.to_string();
        claim_all(
            &[
                (&self.by_trip, Some(trip_key.as_str())),
                (&self.by_order, Some(payment.gateway_order_id.as_str())),
            ],
            id,
        )?;

        self.table.insert(id, payment.clone());
        Ok(payment)
    }

    pub fn for_trip(&self, trip_id: i64) -> Option<Payment> {
        self.by_trip
            .lookup(&trip_id.to_string())
            .and_then(|id| self.table.get(id))
    }

    /// Resolves a payment by the gateway order id it was created with.
    pub fn id_for_order(&self, order_id: &str) -> Option<i64> {
        self.by_order.lookup(order_id)
    }

    /// Points a re-issued gateway order at an existing payment row.
    pub fn reindex_order(&self, id: i64, old_order_id: &str, new_order_id: &str) -> Result<(), AppError> {
        self.by_order.claim(new_order_id, id)?;
        self.by_order.release(old_order_id, id);
        Ok(())
    }

    pub fn update<R>(
        &self,
        id: i64,
        change: impl FnOnce(&mut Payment) -> Result<R, AppError>,
    ) -> Result<(R, Payment), AppError> {
        self.table.update(id, change)
    }
}

impl Default for PaymentStore {
    fn default() -> Self {
        Self::new()
    }
}
