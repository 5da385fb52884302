//! Admin session model and token minting.
//!
//! The clinic runs a single physical front desk, so at most one
//! administrator session may be live system-wide. This module holds the
//! session value type and policy; the eviction logic that enforces the
//! exclusivity invariant lives in `derm-store::sessions`.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the opaque session token in bytes before hex encoding.
pub const TOKEN_LEN: usize = 32;

/// Session expiry rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Idle/absolute timeout in minutes. Each renewal extends expiry by
    /// this much.
    pub timeout_minutes: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self { timeout_minutes: 30 }
    }
}

impl SessionPolicy {
    /// The timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::minutes(self.timeout_minutes)
    }
}

/// One administrator session row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    /// Unique session id.
    pub session_id: String,
    /// The administrator holding the session.
    pub admin_id: String,
    /// Opaque bearer token, hex-encoded.
    pub token: String,
    /// When the session was issued.
    pub created_at: DateTime<Utc>,
    /// When the session lapses unless renewed.
    pub expires_at: DateTime<Utc>,
    /// Last time the session was validated (sliding activity marker).
    pub last_activity: DateTime<Utc>,
    /// Cleared on logout, eviction, or expiry sweep.
    pub is_active: bool,
}

impl AdminSession {
    /// Mints a fresh session for `admin_id` at `now`.
    #[must_use]
    pub fn issue(admin_id: &str, policy: SessionPolicy, now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            admin_id: admin_id.to_string(),
            token: mint_token(),
            created_at: now,
            expires_at: now + policy.timeout(),
            last_activity: now,
            is_active: true,
        }
    }

    /// Active and not yet expired at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Mints an opaque random bearer token.
#[must_use]
pub fn mint_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
