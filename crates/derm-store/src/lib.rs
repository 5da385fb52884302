//! derm-store - SQLite-backed engine for the Derm appointment system.
//!
//! This crate owns every state transition that touches the persistent
//! store:
//!
//! - [`capacity::CapacityLedger`]: atomic admission against the per
//!   half-day quota
//! - [`registry::AppointmentRegistry`]: appointment lifecycle and the
//!   one-active-appointment-per-patient invariant
//! - [`credentials::CredentialStore`]: salted-hash verification and
//!   failed-attempt lockout
//! - [`sessions::SessionExclusivityManager`]: the single-live-admin-
//!   session invariant with forced eviction
//! - [`doctors`]: persistence for the static availability roster
//!
//! All components share one [`ClinicDb`] handle, a `SQLite` connection
//! behind a mutex. Operations that must be atomic (capacity admission,
//! session eviction-then-issue, booking with compensating release) run
//! as single conditional updates or single transactions so no partial
//! state is ever observable.
//!
//! Public operations default to the wall clock and offer `*_at`
//! variants that take an explicit `now`, so expiry and lockout
//! behavior is testable without sleeping.

pub mod capacity;
pub mod credentials;
pub mod doctors;
pub mod error;
pub mod registry;
pub mod schema;
pub mod sessions;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

pub use crate::capacity::CapacityLedger;
pub use crate::credentials::CredentialStore;
pub use crate::error::{BookingError, RegisterError, SessionError, StoreError, VerifyError};
pub use crate::registry::{AppointmentRegistry, BookingRequest};
pub use crate::sessions::SessionExclusivityManager;

/// Shared handle to the clinic database.
///
/// Cloning is cheap; all clones serialize access through the same
/// connection, which is how the store guarantees its conditional
/// updates see a consistent counter.
#[derive(Clone)]
pub struct ClinicDb {
    conn: Arc<Mutex<Connection>>,
}

impl ClinicDb {
    /// Opens (creating if needed) the database at `path` and applies
    /// the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the file cannot be
    /// opened or the schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a fresh in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the schema cannot be
    /// applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection, applying pragmas and the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the schema cannot be
    /// applied.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Locks the underlying connection.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl std::fmt::Debug for ClinicDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicDb").finish_non_exhaustive()
    }
}
