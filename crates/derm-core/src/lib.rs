//! derm-core - Domain logic for the Derm appointment engine.
//!
//! This crate holds the pure, store-agnostic half of the clinic engine:
//! the appointment lifecycle state machine, half-day capacity slot
//! types, the doctor availability index, credential hashing and lockout
//! policy, the admin session model, input validation, notification
//! events, and TOML configuration.
//!
//! Everything that talks to the persistent store lives in `derm-store`;
//! this crate performs no I/O so its invariants can be tested without a
//! database.
//!
//! # Modules
//!
//! - [`appointment`]: `Appointment` and the status state machine
//! - [`availability`]: weekday/half-day doctor availability lookups
//! - [`config`]: clinic configuration (quotas, lockout, session timeout)
//! - [`credentials`]: salted iterated hashing and lockout policy
//! - [`notify`]: structured notification events and the sink trait
//! - [`session`]: admin session model and token minting
//! - [`slot`]: `HalfDay` buckets and `SlotKey`
//! - [`validate`]: caller-fixable input checks

pub mod appointment;
pub mod availability;
pub mod config;
pub mod credentials;
pub mod notify;
pub mod session;
pub mod slot;
pub mod validate;

pub use appointment::{Appointment, AppointmentStatus, ProxyBooking, TransitionError};
pub use availability::{DoctorAvailability, DoctorAvailabilityIndex};
pub use config::{ClinicConfig, ConfigError};
pub use credentials::{AuthError, CredentialRecord, LockoutPolicy};
pub use notify::{NotificationEvent, NotificationKind, NotificationSink};
pub use session::{AdminSession, SessionPolicy};
pub use slot::{HalfDay, SlotKey};
pub use validate::ValidationError;
