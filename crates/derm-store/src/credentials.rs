//! Credential store: verification and failed-attempt lockout.
//!
//! Hashing lives in `derm_core::credentials`; this module owns the
//! stored rows and the lockout bookkeeping. Verification while a lock
//! is active short-circuits to [`AuthError::AccountLocked`] without
//! touching the failure counter; a success resets the counter and
//! clears the lock in one update.

use chrono::{DateTime, Utc};
use derm_core::config::AuthConfig;
use derm_core::credentials::{
    generate_salt, hash_secret, verify_secret, AuthError, CredentialRecord, LockoutPolicy,
};
use derm_core::validate;
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use crate::error::{RegisterError, StoreError, VerifyError};
use crate::ClinicDb;

/// Verifies login secrets and manages lockout state.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    db: ClinicDb,
    policy: LockoutPolicy,
    iterations: u32,
}

impl CredentialStore {
    /// Creates a credential store with the given auth settings.
    #[must_use]
    pub fn new(db: ClinicDb, auth: &AuthConfig) -> Self {
        Self {
            db,
            policy: auth.lockout_policy(),
            iterations: auth.hash_iterations,
        }
    }

    /// Registers a new credential, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::register_at`].
    pub fn register(&self, user_id: &str, secret: &str) -> Result<(), RegisterError> {
        self.register_at(user_id, secret, Utc::now())
    }

    /// Registers a new credential as of `now`.
    ///
    /// # Errors
    ///
    /// [`RegisterError::Validation`] for weak secrets,
    /// [`RegisterError::AlreadyExists`] for duplicate user ids, or
    /// [`RegisterError::Store`] on store failure.
    pub fn register_at(
        &self,
        user_id: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RegisterError> {
        validate::validate_password(secret)?;
        let salt = generate_salt();
        let password_hash = hash_secret(secret, &salt, self.iterations);

        let conn = self.db.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO credentials
                 (user_id, password_hash, salt, failed_attempts, locked_until, created_at)
                 VALUES (?1, ?2, ?3, 0, NULL, ?4)",
                params![user_id, password_hash, salt, now],
            )
            .map_err(StoreError::from)?;
        if inserted == 0 {
            return Err(RegisterError::AlreadyExists {
                user_id: user_id.to_string(),
            });
        }
        info!(user_id, "credential registered");
        Ok(())
    }

    /// Verifies a candidate secret, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_at`].
    pub fn verify(&self, user_id: &str, candidate: &str) -> Result<(), VerifyError> {
        self.verify_at(user_id, candidate, Utc::now())
    }

    /// Verifies a candidate secret as of `now`.
    ///
    /// While the lockout window is active every attempt fails with
    /// [`AuthError::AccountLocked`] and the failure counter is left
    /// alone — even a correct secret does not unlock early. A mismatch
    /// records a failure (locking the account once the threshold is
    /// reached); a match resets the counter and clears any expired
    /// lock.
    ///
    /// # Errors
    ///
    /// [`VerifyError::Auth`] for unknown users, mismatches, and locked
    /// accounts; [`VerifyError::Store`] when the store fails, in which
    /// case the attempt's outcome is unknown and the caller must
    /// re-query before retrying.
    pub fn verify_at(
        &self,
        user_id: &str,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VerifyError> {
        let Some(record) = self.get(user_id)? else {
            return Err(AuthError::NotFound {
                user_id: user_id.to_string(),
            }
            .into());
        };

        if let Some(remaining) = record.lock_remaining(now) {
            warn!(user_id, remaining_secs = remaining.num_seconds(), "login attempt while locked");
            return Err(AuthError::AccountLocked {
                user_id: user_id.to_string(),
                remaining_secs: remaining.num_seconds(),
            }
            .into());
        }

        if verify_secret(candidate, &record.salt, self.iterations, &record.password_hash) {
            self.record_success_at(user_id, now)?;
            Ok(())
        } else {
            self.record_failure_at(user_id, now)?;
            Err(AuthError::InvalidCredentials {
                user_id: user_id.to_string(),
            }
            .into())
        }
    }

    /// Records a failed attempt, using the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn record_failure(&self, user_id: &str) -> Result<(), StoreError> {
        self.record_failure_at(user_id, Utc::now())
    }

    /// Records a failed attempt as of `now`, locking the account when
    /// the consecutive-failure threshold is reached.
    ///
    /// The increment and the conditional lock are one update, so a
    /// concurrent reader never sees the count past the threshold
    /// without the lock set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn record_failure_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let lock_until = now + self.policy.lock_window();
        let conn = self.db.lock()?;
        conn.execute(
            "UPDATE credentials
             SET failed_attempts = failed_attempts + 1,
                 locked_until = CASE
                     WHEN failed_attempts + 1 >= ?2 THEN ?3
                     ELSE locked_until
                 END
             WHERE user_id = ?1",
            params![user_id, self.policy.max_failures, lock_until],
        )?;
        Ok(())
    }

    /// Records a successful attempt, using the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn record_success(&self, user_id: &str) -> Result<(), StoreError> {
        self.record_success_at(user_id, Utc::now())
    }

    /// Records a successful attempt as of `now`: resets the failure
    /// counter, clears the lock, stamps the last login.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn record_success_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        conn.execute(
            "UPDATE credentials
             SET failed_attempts = 0, locked_until = NULL, last_login = ?2
             WHERE user_id = ?1",
            params![user_id, now],
        )?;
        Ok(())
    }

    /// Loads one credential row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let conn = self.db.lock()?;
        let record = conn
            .query_row(
                "SELECT user_id, password_hash, salt, failed_attempts, locked_until
                 FROM credentials WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(CredentialRecord {
                        user_id: row.get(0)?,
                        password_hash: row.get(1)?,
                        salt: row.get(2)?,
                        failed_attempts: row.get(3)?,
                        locked_until: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
