//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use derm_core::availability::DoctorAvailability;
use derm_core::config::CapacityConfig;
use derm_core::notify::RecordingSink;
use derm_store::capacity::CapacityLedger;
use derm_store::{doctors, AppointmentRegistry, BookingRequest, ClinicDb};

/// Roster doctor available every day, both blocks.
pub const DOCTOR: &str = "DOC1";
/// Roster doctor available Mondays AM only.
pub const AM_ONLY_DOCTOR: &str = "DOC2";

/// Fixed test clock: 2024-06-01 09:00 UTC.
pub fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// 2024-06-10 is a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

pub fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    monday().and_hms_opt(hour, minute, 0).unwrap()
}

pub struct TestClinic {
    pub db: ClinicDb,
    pub registry: AppointmentRegistry,
    pub ledger: CapacityLedger,
    pub sink: Arc<RecordingSink>,
}

/// Builds an in-memory clinic with symmetric quotas and a two-doctor
/// roster.
pub fn clinic_with_quota(quota: u32) -> TestClinic {
    let db = ClinicDb::open_in_memory().expect("open in-memory db");
    seed_roster(&db);
    clinic_over(db, quota)
}

/// Builds a clinic over an existing database handle.
pub fn clinic_over(db: ClinicDb, quota: u32) -> TestClinic {
    let config = CapacityConfig {
        am_quota: quota,
        pm_quota: quota,
    };
    let index = doctors::load_availability_index(&db).expect("load roster");
    let sink = Arc::new(RecordingSink::new());
    let registry = AppointmentRegistry::new(db.clone(), config, Arc::new(index), sink.clone());
    let ledger = CapacityLedger::new(db.clone(), config);
    TestClinic {
        db,
        registry,
        ledger,
        sink,
    }
}

pub fn seed_roster(db: &ClinicDb) {
    let all_week: std::collections::HashSet<Weekday> = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .collect();

    doctors::upsert_doctor(
        db,
        &DoctorAvailability {
            doctor_id: DOCTOR.to_string(),
            days: all_week,
            available_am: true,
            available_pm: true,
            active: true,
        },
        "Dr. Reyes",
    )
    .expect("seed doctor");

    doctors::upsert_doctor(
        db,
        &DoctorAvailability {
            doctor_id: AM_ONLY_DOCTOR.to_string(),
            days: [Weekday::Mon].into_iter().collect(),
            available_am: true,
            available_pm: false,
            active: true,
        },
        "Dr. Tan",
    )
    .expect("seed doctor");
}

pub fn request(patient_id: &str, when: NaiveDateTime) -> BookingRequest {
    BookingRequest {
        patient_id: patient_id.to_string(),
        doctor_id: DOCTOR.to_string(),
        service_id: "SVC-ACNE".to_string(),
        scheduled_at: when,
        proxy: None,
    }
}
