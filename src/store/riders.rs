use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::rider::Rider;
use crate::store::non_blank;
use crate::store::table::{claim_all, Row, Table, UniqueIndex};

impl Row for Rider {
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

pub struct RiderStore {
    table: Table<Rider>,
    by_clerk_id: UniqueIndex,
    by_phone: UniqueIndex,
    by_email: UniqueIndex,
    by_referral_code: UniqueIndex,
}

impl RiderStore {
    pub fn new() -> Self {
        Self {
            table: Table::new("rider"),
            by_clerk_id: UniqueIndex::new("clerkUserId"),
            by_phone: UniqueIndex::new("phoneNumber"),
            by_email: UniqueIndex::new("email"),
            by_referral_code: UniqueIndex::new("referralCode"),
        }
    }

    /// Assigns the id and timestamps, then enforces every unique column.
    pub fn insert(&self, mut rider: Rider) -> Result<Rider, AppError> {
        let id = self.table.allocate_id();
        let now = Utc::now();
        rider.id = id;
        rider.created_at = now;
        rider.updated_at = now;

        claim_all(
            &[
                (&self.by_clerk_id, Some(rider.clerk_user_id.as_str())),
                (&self.by_phone, Some(rider.phone_number.as_str())),
                (&self.by_email, non_blank(&rider.email)),
                (&self.by_referral_code, non_blank(&rider.referral_code)),
            ],
            id,
        )?;

        self.table.insert(id, rider.clone());
        Ok(rider)
    }

    pub fn by_clerk_id(&self, clerk_user_id: &str) -> Result<Rider, AppError> {
        self.by_clerk_id
            .lookup(clerk_user_id)
            .and_then(|id| self.table.get(id))
            .ok_or_else(|| AppError::NotFound(format!("rider {clerk_user_id} not found")))
    }

    pub fn update(
        &self,
        clerk_user_id: &str,
        change: impl FnOnce(&mut Rider) -> Result<(), AppError>,
    ) -> Result<Rider, AppError> {
        let id = self
            .by_clerk_id
            .lookup(clerk_user_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {clerk_user_id} not found")))?;

        let ((), rider) = self.table.update(id, change)?;
        Ok(rider)
    }

    pub fn count(&self) -> usize {
        self.table.count()
    }
}

impl Default for RiderStore {
    fn default() -> Self {
        Self::new()
    }
}
