use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::AppError;

/// A row that carries an `updated_at` column.
pub trait Row: Clone {
    fn touch(&mut self, at: DateTime<Utc>);
}

/// One relational table: rows keyed by a monotonically assigned id.
pub struct Table<T> {
    name: &'static str,
    rows: DashMap<i64, T>,
    next_id: AtomicI64,
}

impl<T: Clone> Table<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn insert(&self, id: i64, row: T) {
        self.rows.insert(id, row);
    }

    pub fn get(&self, id: i64) -> Option<T> {
        self.rows.get(&id).map(|row| row.value().clone())
    }

    pub fn require(&self, id: i64) -> Result<T, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", self.name)))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }


    /// Snapshot of every row. Never call while holding a row lock on this table.
    pub fn all(&self) -> Vec<T> {
        self.rows.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl<T: Row> Table<T> {
    /// Runs `change` against a copy of the row while holding the row's write lock and
    /// commits the copy only when `change` succeeds, so a failed update leaves the
    /// stored row untouched.
    pub fn update<R>(
        &self,
        id: i64,
        change: impl FnOnce(&mut T) -> Result<R, AppError>,
    ) -> Result<(R, T), AppError> {
        let mut entry = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", self.name)))?;

        let mut draft = entry.value().clone();
        let outcome = change(&mut draft)?;
        draft.touch(Utc::now());
        *entry = draft.clone();

        Ok((outcome, draft))
    }
}

/// Unique constraint over one column.
pub struct UniqueIndex {
    column: &'static str,
    keys: DashMap<String, i64>,
}

impl UniqueIndex {
    pub fn new(column: &'static str) -> Self {
        Self {
            column,
            keys: DashMap::new(),
        }
    }

    pub fn claim(&self, key: &str, id: i64) -> Result<(), AppError> {
        match self.keys.entry(key.to_string()) {
            Entry::Occupied(existing) if *existing.get() == id => Ok(()),
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "{} '{key}' already exists",
                self.column
            ))),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    pub fn release(&self, key: &str, id: i64) {
        self.keys.remove_if(key, |_, owner| *owner == id);
    }

    pub fn lookup(&self, key: &str) -> Option<i64> {
        self.keys.get(key).map(|entry| *entry.value())
    }
}

/// Claims every present key for `id`, or none of them.
pub fn claim_all(claims: &[(&UniqueIndex, Option<&str>)], id: i64) -> Result<(), AppError> {
    for (position, (index, key)) in claims.iter().enumerate() {
        let Some(key) = key else { continue };

        if let Err(err) = index.claim(key, id) {
            for (claimed, claimed_key) in &claims[..position] {
                if let Some(claimed_key) = claimed_key {
                    claimed.release(claimed_key, id);
                }
            }
            return Err(err);
        }
    }

    Ok(())
}
