//! Session exclusivity manager.
//!
//! The clinic models a single physical front-desk terminal: at most
//! one administrator session is live system-wide. Login evicts every
//! active session and inserts the fresh one inside a single
//! transaction, so there is no observable instant with two active
//! sessions; a partial unique index in the schema backs the invariant
//! at the database level as well.

use chrono::{DateTime, Utc};
use derm_core::session::{AdminSession, SessionPolicy};
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use crate::error::{SessionError, StoreError};
use crate::ClinicDb;

/// Issues, renews, validates, and evicts administrator sessions.
#[derive(Debug, Clone)]
pub struct SessionExclusivityManager {
    db: ClinicDb,
    policy: SessionPolicy,
}

impl SessionExclusivityManager {
    /// Creates a manager with the given session policy.
    #[must_use]
    pub fn new(db: ClinicDb, policy: SessionPolicy) -> Self {
        Self { db, policy }
    }

    /// Issues a session, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::login_at`].
    pub fn login(&self, admin_id: &str) -> Result<AdminSession, StoreError> {
        self.login_at(admin_id, Utc::now())
    }

    /// Issues a fresh session for `admin_id` as of `now`, evicting
    /// every currently active session first.
    ///
    /// Eviction covers the admin's own previous session too: a second
    /// login from the same admin replaces, never duplicates, the live
    /// session. Eviction and insertion commit atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable; on failure
    /// no session state has changed.
    pub fn login_at(&self, admin_id: &str, now: DateTime<Utc>) -> Result<AdminSession, StoreError> {
        let session = AdminSession::issue(admin_id, self.policy, now);

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        let evicted = tx.execute(
            "UPDATE admin_sessions SET is_active = 0, expires_at = ?1 WHERE is_active = 1",
            params![now],
        )?;
        tx.execute(
            "INSERT INTO admin_sessions
             (session_id, admin_id, session_token, created_at, expires_at, last_activity, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            params![
                session.session_id,
                session.admin_id,
                session.token,
                session.created_at,
                session.expires_at,
                session.last_activity,
            ],
        )?;
        tx.commit()?;
        drop(conn);

        if evicted > 0 {
            warn!(admin_id, evicted, "evicted active admin sessions on login");
        }
        info!(admin_id, session_id = %session.session_id, "admin session issued");
        Ok(session)
    }

    /// Validates a session, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_at`].
    pub fn validate(&self, admin_id: &str) -> Result<bool, StoreError> {
        self.validate_at(admin_id, Utc::now())
    }

    /// Returns `true` iff `admin_id` holds an active, unexpired
    /// session at `now`; refreshes `last_activity` as a side effect.
    ///
    /// The check and the activity refresh are one conditional update,
    /// so an expired or evicted session can never be refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn validate_at(&self, admin_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let conn = self.db.lock()?;
        let refreshed = conn.execute(
            "UPDATE admin_sessions SET last_activity = ?2
             WHERE admin_id = ?1 AND is_active = 1 AND expires_at > ?2",
            params![admin_id, now],
        )?;
        Ok(refreshed == 1)
    }

    /// Renews a session, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::renew_at`].
    pub fn renew(&self, admin_id: &str) -> Result<bool, StoreError> {
        self.renew_at(admin_id, Utc::now())
    }

    /// Extends the session's expiry by the timeout iff it is currently
    /// valid. Returns whether the renewal happened.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn renew_at(&self, admin_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let new_expiry = now + self.policy.timeout();
        let conn = self.db.lock()?;
        let renewed = conn.execute(
            "UPDATE admin_sessions SET expires_at = ?3, last_activity = ?2
             WHERE admin_id = ?1 AND is_active = 1 AND expires_at > ?2",
            params![admin_id, now, new_expiry],
        )?;
        Ok(renewed == 1)
    }

    /// Ends the admin's session, using the wall clock. Idempotent.
    ///
    /// # Errors
    ///
    /// See [`Self::logout_at`].
    pub fn logout(&self, admin_id: &str) -> Result<(), StoreError> {
        self.logout_at(admin_id, Utc::now())
    }

    /// Marks the admin's session inactive and expired as of `now`.
    /// A no-op when no active session exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn logout_at(&self, admin_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        let ended = conn.execute(
            "UPDATE admin_sessions SET is_active = 0, expires_at = ?2
             WHERE admin_id = ?1 AND is_active = 1",
            params![admin_id, now],
        )?;
        drop(conn);
        if ended > 0 {
            info!(admin_id, "admin logged out");
        }
        Ok(())
    }

    /// Forcibly ends the admin's session, using the wall clock.
    /// Idempotent; identical to logout apart from the audit log line.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn force_logout(&self, admin_id: &str) -> Result<(), StoreError> {
        self.force_logout_at(admin_id, Utc::now())
    }

    /// Forcibly ends the admin's session as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn force_logout_at(&self, admin_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        let ended = conn.execute(
            "UPDATE admin_sessions SET is_active = 0, expires_at = ?2
             WHERE admin_id = ?1 AND is_active = 1",
            params![admin_id, now],
        )?;
        drop(conn);
        if ended > 0 {
            warn!(admin_id, "admin force-logged out");
        }
        Ok(())
    }

    /// Sweeps expired sessions, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::sweep_expired_at`].
    pub fn sweep_expired(&self) -> Result<usize, StoreError> {
        self.sweep_expired_at(Utc::now())
    }

    /// Marks every session whose expiry has passed as inactive.
    /// Intended to run periodically; safe to re-run, and a failed run
    /// self-heals on the next one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.db.lock()?;
        let swept = conn.execute(
            "UPDATE admin_sessions SET is_active = 0
             WHERE is_active = 1 AND expires_at <= ?1",
            params![now],
        )?;
        drop(conn);
        if swept > 0 {
            info!(swept, "swept expired admin sessions");
        }
        Ok(swept)
    }

    /// Guard for admin-gated operations: errors unless `admin_id`
    /// holds a live session right now.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionConflict`] when the session is missing,
    /// expired, or evicted; [`SessionError::Store`] on store failure.
    pub fn require_valid(&self, admin_id: &str) -> Result<(), SessionError> {
        self.require_valid_at(admin_id, Utc::now())
    }

    /// Guard for admin-gated operations as of `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::require_valid`].
    pub fn require_valid_at(&self, admin_id: &str, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.validate_at(admin_id, now)? {
            Ok(())
        } else {
            Err(SessionError::SessionConflict {
                admin_id: admin_id.to_string(),
            })
        }
    }

    /// The admin currently holding the live session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn current_admin_at(&self, now: DateTime<Utc>) -> Result<Option<String>, StoreError> {
        let conn = self.db.lock()?;
        let admin = conn
            .query_row(
                "SELECT admin_id FROM admin_sessions
                 WHERE is_active = 1 AND expires_at > ?1
                 ORDER BY last_activity DESC LIMIT 1",
                params![now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(admin)
    }

    /// Loads the admin's live session row, if any. Mostly for tests
    /// and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn active_session(&self, admin_id: &str) -> Result<Option<AdminSession>, StoreError> {
        let conn = self.db.lock()?;
        let session = conn
            .query_row(
                "SELECT session_id, admin_id, session_token, created_at, expires_at,
                        last_activity, is_active
                 FROM admin_sessions
                 WHERE admin_id = ?1 AND is_active = 1",
                params![admin_id],
                |row| {
                    Ok(AdminSession {
                        session_id: row.get(0)?,
                        admin_id: row.get(1)?,
                        token: row.get(2)?,
                        created_at: row.get(3)?,
                        expires_at: row.get(4)?,
                        last_activity: row.get(5)?,
                        is_active: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    /// Number of active session rows. Exactly zero or one by the
    /// exclusivity invariant; exposed for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn active_session_count(&self) -> Result<u32, StoreError> {
        let conn = self.db.lock()?;
        let count =
            conn.query_row("SELECT COUNT(*) FROM admin_sessions WHERE is_active = 1", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}
