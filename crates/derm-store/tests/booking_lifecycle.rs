//! End-to-end booking lifecycle over a real store.

mod common;

use chrono::Duration;
use derm_core::appointment::{AppointmentStatus, ProxyBooking, TransitionError};
use derm_core::notify::NotificationKind;
use derm_core::slot::{HalfDay, SlotKey};
use derm_store::{BookingError, ClinicDb};
use tempfile::TempDir;

use common::{clinic_over, clinic_with_quota, clock, monday, monday_at, request, AM_ONLY_DOCTOR};

#[test]
fn a_full_morning_admits_exactly_the_quota() {
    let clinic = clinic_with_quota(20);
    let am = SlotKey::new(monday(), HalfDay::Am);

    for i in 0..20 {
        let req = request(&format!("PAT{i:03}"), monday_at(9, i));
        let appointment = clinic.registry.book_at(req, clock()).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
    }
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 0);

    let overflow = clinic
        .registry
        .book_at(request("PAT020", monday_at(10, 30)), clock())
        .unwrap_err();
    assert!(matches!(overflow, BookingError::CapacityExceeded { slot } if slot == am));
}

#[test]
fn cancelling_one_booking_reopens_exactly_one_seat() {
    let clinic = clinic_with_quota(20);
    let am = SlotKey::new(monday(), HalfDay::Am);

    let mut ids = Vec::new();
    for i in 0..20 {
        let appointment = clinic
            .registry
            .book_at(request(&format!("PAT{i:03}"), monday_at(9, i)), clock())
            .unwrap();
        ids.push(appointment.id);
    }

    assert!(clinic
        .registry
        .cancel_at(&ids[4], "PAT004", Some("fever"), clock())
        .unwrap());
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 1);

    // The reopened seat is bookable again, then the slot is full again.
    clinic
        .registry
        .book_at(request("PAT020", monday_at(11, 0)), clock())
        .unwrap();
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 0);
    let err = clinic
        .registry
        .book_at(request("PAT021", monday_at(11, 15)), clock())
        .unwrap_err();
    assert!(matches!(err, BookingError::CapacityExceeded { .. }));
}

#[test]
fn a_patient_cannot_hold_two_active_appointments() {
    let clinic = clinic_with_quota(5);
    let first = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();

    // A different slot does not help; the invariant is per patient.
    let err = clinic
        .registry
        .book_at(request("PAT001", monday_at(14, 0)), clock())
        .unwrap_err();
    match err {
        BookingError::DuplicateActiveAppointment {
            patient_id,
            appointment_id,
        } => {
            assert_eq!(patient_id, "PAT001");
            assert_eq!(appointment_id, first.id);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn cancellation_frees_the_patient_for_a_new_booking() {
    let clinic = clinic_with_quota(5);
    let am = SlotKey::new(monday(), HalfDay::Am);
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 5);

    let first = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 4);

    assert!(clinic
        .registry
        .cancel_at(&first.id, "PAT001", None, clock())
        .unwrap());
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 5);

    let second = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 30)), clock())
        .unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 4);
}

#[test]
fn cancel_is_idempotent_and_releases_only_once() {
    let clinic = clinic_with_quota(5);
    let am = SlotKey::new(monday(), HalfDay::Am);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();

    assert!(clinic
        .registry
        .cancel_at(&appointment.id, "PAT001", None, clock())
        .unwrap());
    assert!(!clinic
        .registry
        .cancel_at(&appointment.id, "PAT001", None, clock())
        .unwrap());
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 5);
}

#[test]
fn cancelling_someone_elses_appointment_reads_as_not_found() {
    let clinic = clinic_with_quota(5);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();

    let err = clinic
        .registry
        .cancel_at(&appointment.id, "PAT002", None, clock())
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound { .. }));

    let err = clinic
        .registry
        .cancel_at("APP20240601999", "PAT001", None, clock())
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound { .. }));
}

#[test]
fn lifecycle_transitions_follow_the_state_machine() {
    let clinic = clinic_with_quota(5);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();

    // PENDING -> COMPLETED skips approval and is rejected.
    let err = clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Completed, clock())
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::Transition(TransitionError::IllegalTransition { .. })
    ));

    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Approved, clock())
        .unwrap();
    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Completed, clock())
        .unwrap();

    // Terminal states never move again, not even to CANCELLED.
    let err = clinic
        .registry
        .cancel_at(&appointment.id, "PAT001", None, clock())
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::Transition(TransitionError::Terminal { .. })
    ));
}

#[test]
fn completion_does_not_return_the_seat() {
    let clinic = clinic_with_quota(5);
    let am = SlotKey::new(monday(), HalfDay::Am);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();

    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Approved, clock())
        .unwrap();
    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Completed, clock())
        .unwrap();
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 4);
}

#[test]
fn transition_to_cancelled_releases_the_seat() {
    let clinic = clinic_with_quota(5);
    let am = SlotKey::new(monday(), HalfDay::Am);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();

    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Cancelled, clock())
        .unwrap();
    assert_eq!(clinic.ledger.available_count(am).unwrap(), 5);
}

#[test]
fn reschedule_moves_the_reservation_between_slots() {
    let clinic = clinic_with_quota(5);
    let am = SlotKey::new(monday(), HalfDay::Am);
    let pm = SlotKey::new(monday(), HalfDay::Pm);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();
    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Approved, clock())
        .unwrap();

    clinic
        .registry
        .reschedule_at(&appointment.id, monday_at(14, 0), common::DOCTOR, clock())
        .unwrap();

    assert_eq!(clinic.ledger.available_count(am).unwrap(), 5);
    assert_eq!(clinic.ledger.available_count(pm).unwrap(), 4);

    let moved = clinic.registry.get(&appointment.id).unwrap().unwrap();
    assert_eq!(moved.status, AppointmentStatus::Rescheduled);
    assert_eq!(moved.scheduled_at, monday_at(14, 0));
}

#[test]
fn reschedule_into_a_full_slot_keeps_the_old_seat() {
    let clinic = clinic_with_quota(1);
    let am = SlotKey::new(monday(), HalfDay::Am);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();
    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Approved, clock())
        .unwrap();
    // PAT002 fills the only PM seat.
    clinic
        .registry
        .book_at(request("PAT002", monday_at(14, 0)), clock())
        .unwrap();

    let err = clinic
        .registry
        .reschedule_at(&appointment.id, monday_at(15, 0), common::DOCTOR, clock())
        .unwrap_err();
    assert!(matches!(err, BookingError::CapacityExceeded { .. }));

    // The original reservation is untouched by the failed move.
    assert_eq!(clinic.ledger.booked_count(am).unwrap(), 1);
    let unchanged = clinic.registry.get(&appointment.id).unwrap().unwrap();
    assert_eq!(unchanged.scheduled_at, monday_at(9, 0));
    assert_eq!(unchanged.status, AppointmentStatus::Approved);
}

#[test]
fn pending_appointments_cannot_be_rescheduled() {
    let clinic = clinic_with_quota(5);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();

    let err = clinic
        .registry
        .reschedule_at(&appointment.id, monday_at(14, 0), common::DOCTOR, clock())
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::Transition(TransitionError::IllegalTransition { .. })
    ));
}

#[test]
fn a_rescheduled_appointment_can_move_again() {
    let clinic = clinic_with_quota(5);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();
    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Approved, clock())
        .unwrap();
    clinic
        .registry
        .reschedule_at(&appointment.id, monday_at(14, 0), common::DOCTOR, clock())
        .unwrap();
    clinic
        .registry
        .reschedule_at(&appointment.id, monday_at(10, 0), common::DOCTOR, clock())
        .unwrap();

    let moved = clinic.registry.get(&appointment.id).unwrap().unwrap();
    assert_eq!(moved.scheduled_at, monday_at(10, 0));
    let am = SlotKey::new(monday(), HalfDay::Am);
    let pm = SlotKey::new(monday(), HalfDay::Pm);
    assert_eq!(clinic.ledger.booked_count(am).unwrap(), 1);
    assert_eq!(clinic.ledger.booked_count(pm).unwrap(), 0);
}

#[test]
fn doctor_coverage_is_checked_before_capacity() {
    let clinic = clinic_with_quota(5);

    let mut req = request("PAT001", monday_at(14, 0));
    req.doctor_id = AM_ONLY_DOCTOR.to_string();
    let err = clinic.registry.book_at(req, clock()).unwrap_err();
    assert!(matches!(err, BookingError::DoctorUnavailable { .. }));

    let mut req = request("PAT001", monday_at(9, 0));
    req.doctor_id = "DOC-UNKNOWN".to_string();
    let err = clinic.registry.book_at(req, clock()).unwrap_err();
    assert!(matches!(err, BookingError::DoctorUnavailable { .. }));

    // Nothing above touched the counters.
    let pm = SlotKey::new(monday(), HalfDay::Pm);
    assert_eq!(clinic.ledger.booked_count(pm).unwrap(), 0);
}

#[test]
fn bookings_outside_clinic_hours_are_rejected() {
    let clinic = clinic_with_quota(5);

    // Noon gap.
    let err = clinic
        .registry
        .book_at(request("PAT001", monday_at(12, 30)), clock())
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    // Past date.
    let yesterday = clock().date_naive() - Duration::days(1);
    let when = yesterday.and_hms_opt(9, 0, 0).unwrap();
    let err = clinic
        .registry
        .book_at(request("PAT001", when), clock())
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

#[test]
fn proxy_details_survive_a_round_trip() {
    let clinic = clinic_with_quota(5);
    let mut req = request("PAT001", monday_at(9, 0));
    req.proxy = Some(ProxyBooking {
        name: "Maria Santos".to_string(),
        contact: "09171234567".to_string(),
        age: 8,
        relationship: "mother".to_string(),
    });

    let appointment = clinic.registry.book_at(req, clock()).unwrap();
    let stored = clinic.registry.get(&appointment.id).unwrap().unwrap();
    let proxy = stored.proxy.unwrap();
    assert_eq!(proxy.name, "Maria Santos");
    assert_eq!(proxy.contact, "09171234567");
    assert_eq!(proxy.age, 8);
    assert_eq!(proxy.relationship, "mother");
}

#[test]
fn appointment_ids_are_daily_sequences() {
    let clinic = clinic_with_quota(5);
    let first = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();
    let second = clinic
        .registry
        .book_at(request("PAT002", monday_at(9, 30)), clock())
        .unwrap();

    assert_eq!(first.id, "APP20240601001");
    assert_eq!(second.id, "APP20240601002");
}

#[test]
fn queries_see_the_committed_lifecycle() {
    let clinic = clinic_with_quota(5);
    let a = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();
    let b = clinic
        .registry
        .book_at(request("PAT002", monday_at(14, 0)), clock())
        .unwrap();
    clinic
        .registry
        .transition_status_at(&b.id, AppointmentStatus::Approved, clock())
        .unwrap();

    let active = clinic
        .registry
        .active_appointment_for("PAT001", clock())
        .unwrap()
        .unwrap();
    assert_eq!(active.id, a.id);

    let pending = clinic
        .registry
        .appointments_by_status(AppointmentStatus::Pending)
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, a.id);

    let on_monday = clinic.registry.appointments_on(monday()).unwrap();
    assert_eq!(on_monday.len(), 2);

    let upcoming = clinic.registry.upcoming(14, clock()).unwrap();
    assert_eq!(upcoming.len(), 2);
    let upcoming = clinic.registry.upcoming(3, clock()).unwrap();
    assert!(upcoming.is_empty());
}

#[test]
fn successful_operations_emit_notifications() {
    let clinic = clinic_with_quota(5);
    let appointment = clinic
        .registry
        .book_at(request("PAT001", monday_at(9, 0)), clock())
        .unwrap();
    clinic
        .registry
        .transition_status_at(&appointment.id, AppointmentStatus::Approved, clock())
        .unwrap();
    clinic
        .registry
        .reschedule_at(&appointment.id, monday_at(14, 0), common::DOCTOR, clock())
        .unwrap();
    clinic
        .registry
        .cancel_at(&appointment.id, "PAT001", None, clock())
        .unwrap();

    let events = clinic.sink.events();
    let kinds: Vec<NotificationKind> = events.iter().map(|event| event.kind).collect();
    assert_eq!(
        kinds,
        [
            NotificationKind::Confirmation,
            NotificationKind::Reschedule,
            NotificationKind::Cancellation,
        ]
    );
    assert!(events.iter().all(|event| event.recipient == "PAT001"));
}

#[test]
fn rejected_bookings_emit_nothing() {
    let clinic = clinic_with_quota(5);
    let err = clinic
        .registry
        .book_at(request("PAT001", monday_at(12, 15)), clock())
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    assert!(clinic.sink.events().is_empty());
}

#[test]
fn state_survives_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clinic.db");
    let am = SlotKey::new(monday(), HalfDay::Am);

    let id = {
        let db = ClinicDb::open(&path).unwrap();
        common::seed_roster(&db);
        let clinic = clinic_over(db, 5);
        clinic
            .registry
            .book_at(request("PAT001", monday_at(9, 0)), clock())
            .unwrap()
            .id
    };

    let db = ClinicDb::open(&path).unwrap();
    let clinic = clinic_over(db, 5);
    let stored = clinic.registry.get(&id).unwrap().unwrap();
    assert_eq!(stored.patient_id, "PAT001");
    assert_eq!(stored.status, AppointmentStatus::Pending);
    assert_eq!(clinic.ledger.booked_count(am).unwrap(), 1);
}
