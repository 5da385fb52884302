//! Doctor availability lookups.
//!
//! Availability is static reference data: a set of weekdays plus AM/PM
//! flags per doctor. A doctor is bookable for a slot iff the slot's
//! weekday is in their set and the matching half-day flag is on. The
//! index is pure and read-only to the engine; `derm-store` builds it
//! from the `doctors` table.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};

use crate::slot::HalfDay;

/// Static availability data for one doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorAvailability {
    /// The doctor's id.
    pub doctor_id: String,
    /// Weekdays the doctor sees patients.
    pub days: HashSet<Weekday>,
    /// Available in the morning block on those days.
    pub available_am: bool,
    /// Available in the afternoon block on those days.
    pub available_pm: bool,
    /// Inactive doctors are never bookable.
    pub active: bool,
}

impl DoctorAvailability {
    /// Whether this doctor is bookable for `date`/`half_day`.
    #[must_use]
    pub fn covers(&self, date: NaiveDate, half_day: HalfDay) -> bool {
        if !self.active || !self.days.contains(&date.weekday()) {
            return false;
        }
        match half_day {
            HalfDay::Am => self.available_am,
            HalfDay::Pm => self.available_pm,
        }
    }
}

/// Pure lookup index over the clinic's doctor roster.
#[derive(Debug, Clone, Default)]
pub struct DoctorAvailabilityIndex {
    doctors: HashMap<String, DoctorAvailability>,
}

impl DoctorAvailabilityIndex {
    /// Builds an index from roster entries. Later entries with a
    /// duplicate id replace earlier ones.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = DoctorAvailability>) -> Self {
        let doctors = entries
            .into_iter()
            .map(|entry| (entry.doctor_id.clone(), entry))
            .collect();
        Self { doctors }
    }

    /// Number of doctors in the roster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doctors.len()
    }

    /// Returns `true` when the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
    }

    /// Looks up one doctor's availability entry.
    #[must_use]
    pub fn get(&self, doctor_id: &str) -> Option<&DoctorAvailability> {
        self.doctors.get(doctor_id)
    }

    /// Whether `doctor_id` is bookable on `date` for `half_day`.
    ///
    /// An unknown doctor id is simply unavailable, not an error.
    #[must_use]
    pub fn is_available(&self, doctor_id: &str, date: NaiveDate, half_day: HalfDay) -> bool {
        self.doctors
            .get(doctor_id)
            .is_some_and(|entry| entry.covers(date, half_day))
    }

    /// All doctors bookable on `date` for `half_day`, sorted by id for
    /// deterministic output.
    #[must_use]
    pub fn list_available(&self, date: NaiveDate, half_day: HalfDay) -> Vec<&str> {
        let mut available: Vec<&str> = self
            .doctors
            .values()
            .filter(|entry| entry.covers(date, half_day))
            .map(|entry| entry.doctor_id.as_str())
            .collect();
        available.sort_unstable();
        available
    }
}
