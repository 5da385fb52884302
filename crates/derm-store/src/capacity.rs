//! Capacity ledger: per half-day booking counters.
//!
//! Admission is a single conditional update — increment the counter
//! only while it is still below quota — so two concurrent bookings for
//! the last remaining slot can never both be admitted. There is no
//! read-then-write window: the store either commits the increment or
//! reports rejection, and a failed operation leaves no partial state.

use derm_core::config::CapacityConfig;
use derm_core::slot::SlotKey;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::StoreError;
use crate::ClinicDb;

/// Tracks booked counts per (date, half-day) against the configured
/// quota.
#[derive(Debug, Clone)]
pub struct CapacityLedger {
    db: ClinicDb,
    config: CapacityConfig,
}

impl CapacityLedger {
    /// Creates a ledger over `db` with the given quotas.
    #[must_use]
    pub fn new(db: ClinicDb, config: CapacityConfig) -> Self {
        Self { db, config }
    }

    /// The configured quotas.
    #[must_use]
    pub const fn config(&self) -> CapacityConfig {
        self.config
    }

    /// Attempts to admit one reservation into `slot`.
    ///
    /// Returns `Ok(true)` when admitted, `Ok(false)` when the quota is
    /// already reached. Callers must not assume admission on error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable; no partial
    /// state is left behind.
    pub fn try_reserve(&self, slot: SlotKey) -> Result<bool, StoreError> {
        let conn = self.db.lock()?;
        Self::try_reserve_in(&conn, self.config, slot)
    }

    /// Releases one previously admitted reservation from `slot`.
    ///
    /// Saturating: a release against an empty slot changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn release(&self, slot: SlotKey) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        Self::release_in(&conn, slot)
    }

    /// Remaining open reservations for `slot`.
    ///
    /// A slot with no bookings yet reports the full quota.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn available_count(&self, slot: SlotKey) -> Result<u32, StoreError> {
        let conn = self.db.lock()?;
        let booked = Self::booked_count_in(&conn, slot)?;
        Ok(self.config.quota_for(slot.half_day).saturating_sub(booked))
    }

    /// Current booked count for `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn booked_count(&self, slot: SlotKey) -> Result<u32, StoreError> {
        let conn = self.db.lock()?;
        Self::booked_count_in(&conn, slot)
    }

    /// Transaction-scoped admission; see [`Self::try_reserve`].
    pub(crate) fn try_reserve_in(
        conn: &Connection,
        config: CapacityConfig,
        slot: SlotKey,
    ) -> Result<bool, StoreError> {
        let quota = config.quota_for(slot.half_day);
        conn.execute(
            "INSERT OR IGNORE INTO capacity_slots (slot_date, half_day, booked_count)
             VALUES (?1, ?2, 0)",
            params![slot.date, slot.half_day.as_str()],
        )?;
        // The atomic check-and-increment. `changes() == 1` means the
        // counter was still below quota at commit time.
        let changed = conn.execute(
            "UPDATE capacity_slots
             SET booked_count = booked_count + 1
             WHERE slot_date = ?1 AND half_day = ?2 AND booked_count < ?3",
            params![slot.date, slot.half_day.as_str(), quota],
        )?;
        let admitted = changed == 1;
        debug!(slot = %slot, admitted, "capacity admission");
        Ok(admitted)
    }

    /// Transaction-scoped release; see [`Self::release`].
    pub(crate) fn release_in(conn: &Connection, slot: SlotKey) -> Result<(), StoreError> {
        let changed = conn.execute(
            "UPDATE capacity_slots
             SET booked_count = booked_count - 1
             WHERE slot_date = ?1 AND half_day = ?2 AND booked_count > 0",
            params![slot.date, slot.half_day.as_str()],
        )?;
        debug!(slot = %slot, released = changed == 1, "capacity release");
        Ok(())
    }

    pub(crate) fn booked_count_in(conn: &Connection, slot: SlotKey) -> Result<u32, StoreError> {
        let booked: Option<u32> = conn
            .query_row(
                "SELECT booked_count FROM capacity_slots
                 WHERE slot_date = ?1 AND half_day = ?2",
                params![slot.date, slot.half_day.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(booked.unwrap_or(0))
    }
}
