//! Credential hashing and the failed-attempt lockout policy.
//!
//! Secrets are never stored or compared in plaintext. Each credential
//! carries a random 32-byte salt; the stored hash is SHA-256 over
//! `secret || salt`, re-digested for a fixed iteration count to slow
//! brute force. Verification recomputes the hash and compares in
//! constant time via `subtle`.
//!
//! Five consecutive failures lock the account for thirty minutes; a
//! success resets the counter and clears the lock.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Default hash iteration count. The floor is enforced by
/// [`crate::config::AuthConfig`] validation.
pub const DEFAULT_HASH_ITERATIONS: u32 = 10_000;

/// Salt length in bytes before hex encoding.
pub const SALT_LEN: usize = 32;

/// Generates a fresh random salt, hex-encoded.
#[must_use]
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hashes `secret` with `salt` through `iterations` SHA-256 rounds.
///
/// The first round digests `secret || salt`; every further round
/// digests the previous output. Output is hex-encoded.
#[must_use]
pub fn hash_secret(secret: &str, salt: &str, iterations: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(salt.as_bytes());
    let mut hash = hasher.finalize();
    for _ in 1..iterations {
        hash = Sha256::digest(&hash[..]);
    }
    hex::encode(hash)
}

/// Recomputes the hash for `candidate` and compares it against
/// `expected_hash` in constant time.
#[must_use]
pub fn verify_secret(candidate: &str, salt: &str, iterations: u32, expected_hash: &str) -> bool {
    let computed = hash_secret(candidate, salt, iterations);
    computed
        .as_bytes()
        .ct_eq(expected_hash.as_bytes())
        .into()
}

/// Lockout rules applied after repeated credential failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lock.
    pub max_failures: u32,
    /// How long a triggered lock lasts, in minutes.
    pub lock_minutes: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lock_minutes: 30,
        }
    }
}

impl LockoutPolicy {
    /// The lock window as a duration.
    #[must_use]
    pub fn lock_window(&self) -> Duration {
        Duration::minutes(self.lock_minutes)
    }

    /// Whether a failure count has reached the lock threshold.
    #[must_use]
    pub fn triggers_lock(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_failures
    }
}

/// One stored credential row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    /// The account this credential belongs to.
    pub user_id: String,
    /// Hex-encoded iterated hash.
    pub password_hash: String,
    /// Hex-encoded salt.
    pub salt: String,
    /// Consecutive failures since the last success.
    pub failed_attempts: u32,
    /// When set and in the future, login attempts short-circuit.
    pub locked_until: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// Remaining lock time at `now`, if any.
    #[must_use]
    pub fn lock_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.locked_until {
            Some(until) if until > now => Some(until - now),
            _ => None,
        }
    }
}

/// Credential verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    /// The candidate secret did not match.
    #[error("invalid credentials for user {user_id}")]
    InvalidCredentials {
        /// The account that failed verification.
        user_id: String,
    },

    /// The lockout window is still active. Verification short-circuits
    /// without touching the failure counter.
    #[error("account {user_id} is locked for another {remaining_secs}s")]
    AccountLocked {
        /// The locked account.
        user_id: String,
        /// Seconds until the lock expires.
        remaining_secs: i64,
    },

    /// No credential exists for the user id.
    #[error("no credential found for user {user_id}")]
    NotFound {
        /// The unknown account.
        user_id: String,
    },
}
