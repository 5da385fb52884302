//! Database schema.
//!
//! Four logical tables back the engine (`appointments`, `doctors`,
//! `credentials`, `admin_sessions`) plus two bookkeeping tables: the
//! `capacity_slots` counters that capacity admission updates
//! atomically, and the `appointment_seq` per-day counter behind
//! human-readable appointment ids.
//!
//! Schema application is idempotent; every statement is
//! `IF NOT EXISTS`.

use rusqlite::Connection;

/// Creates all tables and indices.
///
/// # Errors
///
/// Returns the underlying database error if any DDL statement fails.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS appointments (
            appointment_id     TEXT PRIMARY KEY,
            patient_id         TEXT NOT NULL,
            doctor_id          TEXT NOT NULL,
            service_id         TEXT NOT NULL,
            scheduled_at       TEXT NOT NULL,
            slot_date          TEXT NOT NULL,
            half_day           TEXT NOT NULL CHECK (half_day IN ('AM', 'PM')),
            status             TEXT NOT NULL,
            notes              TEXT,
            proxy_name         TEXT,
            proxy_contact      TEXT,
            proxy_age          INTEGER,
            proxy_relationship TEXT,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_appointments_patient_status
         ON appointments (patient_id, status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_appointments_slot
         ON appointments (slot_date, half_day)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_appointments_status
         ON appointments (status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS doctors (
            doctor_id      TEXT PRIMARY KEY,
            full_name      TEXT NOT NULL DEFAULT '',
            available_days TEXT NOT NULL DEFAULT '',
            available_am   INTEGER NOT NULL DEFAULT 0,
            available_pm   INTEGER NOT NULL DEFAULT 0,
            is_active      INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS credentials (
            user_id         TEXT PRIMARY KEY,
            password_hash   TEXT NOT NULL,
            salt            TEXT NOT NULL,
            failed_attempts INTEGER NOT NULL DEFAULT 0,
            locked_until    TEXT,
            created_at      TEXT NOT NULL,
            last_login      TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admin_sessions (
            session_id    TEXT PRIMARY KEY,
            admin_id      TEXT NOT NULL,
            session_token TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            expires_at    TEXT NOT NULL,
            last_activity TEXT NOT NULL,
            is_active     INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_admin_sessions_admin
         ON admin_sessions (admin_id, is_active)",
        [],
    )?;
    // At most one live session system-wide. The partial unique index
    // makes the exclusivity invariant hold at the database level: a
    // second active row is rejected by the UNIQUE constraint even if
    // application-level eviction were bypassed.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_admin_sessions_single_active
         ON admin_sessions (is_active) WHERE is_active = 1",
        [],
    )?;

    // Quota is configuration, not state: only the booked count lives
    // here. The upper bound is enforced by the conditional update in
    // the capacity ledger.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS capacity_slots (
            slot_date    TEXT NOT NULL,
            half_day     TEXT NOT NULL CHECK (half_day IN ('AM', 'PM')),
            booked_count INTEGER NOT NULL DEFAULT 0 CHECK (booked_count >= 0),
            PRIMARY KEY (slot_date, half_day)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS appointment_seq (
            day  TEXT PRIMARY KEY,
            next INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}
