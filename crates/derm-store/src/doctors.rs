//! Persistence for the doctor availability roster.
//!
//! Availability is static reference data: weekday set (stored as a CSV
//! of three-letter abbreviations, e.g. `MON,WED,FRI`) plus AM/PM flags
//! and an active marker. The engine reads it through a
//! [`DoctorAvailabilityIndex`] built here; booking never writes to it.

use chrono::Weekday;
use derm_core::availability::{DoctorAvailability, DoctorAvailabilityIndex};
use rusqlite::params;

use crate::error::StoreError;
use crate::ClinicDb;

/// Inserts or replaces one roster entry.
///
/// # Errors
///
/// Returns [`StoreError`] if the store is unreachable.
pub fn upsert_doctor(
    db: &ClinicDb,
    entry: &DoctorAvailability,
    full_name: &str,
) -> Result<(), StoreError> {
    let days = encode_days(entry);
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO doctors (doctor_id, full_name, available_days, available_am, available_pm, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (doctor_id) DO UPDATE SET
             full_name = excluded.full_name,
             available_days = excluded.available_days,
             available_am = excluded.available_am,
             available_pm = excluded.available_pm,
             is_active = excluded.is_active",
        params![
            entry.doctor_id,
            full_name,
            days,
            entry.available_am,
            entry.available_pm,
            entry.active,
        ],
    )?;
    Ok(())
}

/// Loads the whole roster into an in-memory index.
///
/// # Errors
///
/// Returns [`StoreError`] if the store is unreachable or a stored
/// weekday abbreviation cannot be decoded.
pub fn load_availability_index(db: &ClinicDb) -> Result<DoctorAvailabilityIndex, StoreError> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(
        "SELECT doctor_id, available_days, available_am, available_pm, is_active FROM doctors",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, bool>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, bool>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (doctor_id, days_csv, available_am, available_pm, active) = row?;
        let days = decode_days(&days_csv)?;
        entries.push(DoctorAvailability {
            doctor_id,
            days,
            available_am,
            available_pm,
            active,
        });
    }
    Ok(DoctorAvailabilityIndex::new(entries))
}

fn encode_days(entry: &DoctorAvailability) -> String {
    let abbrevs: Vec<&str> = entry.days.iter().map(|day| day_abbrev(*day)).collect();
    abbrevs.join(",")
}

fn decode_days(csv: &str) -> Result<std::collections::HashSet<Weekday>, StoreError> {
    csv.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            day_from_abbrev(part).ok_or_else(|| StoreError::Corrupt {
                column: "available_days",
                value: part.to_string(),
            })
        })
        .collect()
}

const fn day_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MON",
        Weekday::Tue => "TUE",
        Weekday::Wed => "WED",
        Weekday::Thu => "THU",
        Weekday::Fri => "FRI",
        Weekday::Sat => "SAT",
        Weekday::Sun => "SUN",
    }
}

fn day_from_abbrev(abbrev: &str) -> Option<Weekday> {
    match abbrev {
        "MON" => Some(Weekday::Mon),
        "TUE" => Some(Weekday::Tue),
        "WED" => Some(Weekday::Wed),
        "THU" => Some(Weekday::Thu),
        "FRI" => Some(Weekday::Fri),
        "SAT" => Some(Weekday::Sat),
        "SUN" => Some(Weekday::Sun),
        _ => None,
    }
}
