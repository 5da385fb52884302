//! Appointment records and the lifecycle state machine.
//!
//! An appointment starts PENDING and moves through a closed transition
//! graph:
//!
//! ```text
//! PENDING -----> APPROVED -----> COMPLETED
//!    |             |  ^
//!    |             v  |
//!    |          RESCHEDULED ---> COMPLETED
//!    |             |
//!    v             v
//! CANCELLED <------+
//! ```
//!
//! COMPLETED and CANCELLED are terminal. Cancelled rows are retained
//! for audit; nothing is ever physically deleted.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slot::SlotKey;

/// Lifecycle status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Booked, awaiting staff approval.
    Pending,
    /// Confirmed by staff.
    Approved,
    /// Moved to a new slot; still awaiting the visit.
    Rescheduled,
    /// The visit happened. Terminal.
    Completed,
    /// Withdrawn; the capacity slot was released. Terminal.
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that count against the one-active-appointment-per-patient
    /// invariant.
    pub const ACTIVE: [Self; 3] = [Self::Pending, Self::Approved, Self::Rescheduled];

    /// Returns `true` for COMPLETED and CANCELLED.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if the status still holds a capacity slot.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::Rescheduled)
    }

    /// Whether the lifecycle graph permits moving to `next`.
    ///
    /// Terminal states permit nothing; everything else follows the
    /// closed graph in the module docs. Self-transitions are not moves
    /// and return `false`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Approved | Self::Cancelled),
            Self::Approved => {
                matches!(next, Self::Completed | Self::Cancelled | Self::Rescheduled)
            }
            Self::Rescheduled => {
                matches!(next, Self::Approved | Self::Cancelled | Self::Completed)
            }
            Self::Completed | Self::Cancelled => false,
        }
    }

    /// Stable storage form, e.g. `"PENDING"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rescheduled => "RESCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a stored status label fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown appointment status: {value}")]
pub struct ParseStatusError {
    /// The rejected label.
    pub value: String,
}

impl FromStr for AppointmentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "RESCHEDULED" => Ok(Self::Rescheduled),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(ParseStatusError {
                value: other.to_string(),
            }),
        }
    }
}

/// Details captured when a patient books on behalf of someone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyBooking {
    /// Full name of the person who will attend.
    pub name: String,
    /// Contact number or address for the attendee.
    pub contact: String,
    /// Attendee age in years.
    pub age: u8,
    /// Relationship of the attendee to the booking patient.
    pub relationship: String,
}

/// A booked appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Opaque unique id, `APP<yyyymmdd><seq>`.
    pub id: String,
    /// The booking patient.
    pub patient_id: String,
    /// The doctor the visit is booked with.
    pub doctor_id: String,
    /// The clinic service requested.
    pub service_id: String,
    /// Date and time of the visit.
    pub scheduled_at: NaiveDateTime,
    /// Current lifecycle status.
    pub status: AppointmentStatus,
    /// Free-form staff notes (cancellation reason, etc).
    pub notes: Option<String>,
    /// Present when the visit is for someone other than the booking
    /// patient.
    pub proxy: Option<ProxyBooking>,
}

impl Appointment {
    /// The capacity slot this appointment occupies.
    #[must_use]
    pub fn slot(&self) -> SlotKey {
        SlotKey::of(self.scheduled_at)
    }
}

/// Errors raised by lifecycle transitions.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    /// The requested move is not an edge of the lifecycle graph.
    #[error("appointment {appointment_id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        /// The appointment being moved.
        appointment_id: String,
        /// Current status.
        from: AppointmentStatus,
        /// Requested status.
        to: AppointmentStatus,
    },

    /// The appointment is already COMPLETED or CANCELLED.
    #[error("appointment {appointment_id} is terminal ({status}) and cannot change")]
    Terminal {
        /// The appointment being moved.
        appointment_id: String,
        /// Its terminal status.
        status: AppointmentStatus,
    },
}

/// Checks a lifecycle move, distinguishing the terminal case.
///
/// # Errors
///
/// [`TransitionError::Terminal`] when `from` is terminal, otherwise
/// [`TransitionError::IllegalTransition`] when the edge does not exist.
pub fn check_transition(
    appointment_id: &str,
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal {
            appointment_id: appointment_id.to_string(),
            status: from,
        });
    }
    if !from.can_transition_to(to) {
        return Err(TransitionError::IllegalTransition {
            appointment_id: appointment_id.to_string(),
            from,
            to,
        });
    }
    Ok(())
}
