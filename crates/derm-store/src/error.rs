//! Store-level error types.
//!
//! Every operation reports one of these typed errors to the caller;
//! nothing is swallowed into a generic failure. Transient store
//! failures surface as [`StoreError::Persistence`] and are never
//! retried inside the engine (only the session sweep self-heals, by
//! running again).

use derm_core::appointment::TransitionError;
use derm_core::credentials::AuthError;
use derm_core::slot::SlotKey;
use derm_core::validate::ValidationError;
use thiserror::Error;

/// Low-level store failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The underlying database reported an error. The operation's
    /// outcome is unknown; callers must re-query before retrying
    /// non-idempotent operations.
    #[error("persistent store failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// The connection mutex was poisoned by a panicking thread.
    #[error("store lock poisoned")]
    Poisoned,

    /// A stored value could not be decoded.
    #[error("corrupt {column} value in store: {value}")]
    Corrupt {
        /// The column that failed to decode.
        column: &'static str,
        /// The raw value found.
        value: String,
    },
}

/// Booking and lifecycle errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BookingError {
    /// Malformed request, rejected before touching the store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The patient already holds a non-terminal future appointment.
    #[error("patient {patient_id} already has an active appointment: {appointment_id}")]
    DuplicateActiveAppointment {
        /// The booking patient.
        patient_id: String,
        /// Their existing active appointment.
        appointment_id: String,
    },

    /// The doctor is not available for the requested slot.
    #[error("doctor {doctor_id} is not available for {slot}")]
    DoctorUnavailable {
        /// The requested doctor.
        doctor_id: String,
        /// The requested slot.
        slot: SlotKey,
    },

    /// The half-day quota is already fully booked.
    #[error("capacity exceeded for {slot}")]
    CapacityExceeded {
        /// The exhausted slot.
        slot: SlotKey,
    },

    /// No appointment exists with the given id (or it does not belong
    /// to the acting patient).
    #[error("appointment not found: {appointment_id}")]
    NotFound {
        /// The unknown appointment id.
        appointment_id: String,
    },

    /// The requested lifecycle move is not permitted.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The store failed mid-operation; any reservation made inside the
    /// same transaction was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Credential verification errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// Wrong secret, locked account, or unknown user.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The store failed; the attempt's outcome is unknown.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Credential registration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegisterError {
    /// The secret failed policy checks.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A credential already exists for the user id.
    #[error("credential already exists for user {user_id}")]
    AlreadyExists {
        /// The duplicate user id.
        user_id: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Admin session errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The admin attempted a gated action without a live session
    /// (expired, evicted, or never issued).
    #[error("no valid admin session for {admin_id}")]
    SessionConflict {
        /// The admin without a live session.
        admin_id: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
