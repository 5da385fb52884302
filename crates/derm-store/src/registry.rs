//! Appointment registry: lifecycle and the single-active-appointment
//! invariant.
//!
//! Booking checks its preconditions in a fixed order — duplicate
//! active appointment, doctor availability, capacity — and only then
//! persists the PENDING row. The capacity reservation and the insert
//! commit in one transaction, so a persistence failure after a
//! successful reservation rolls the reservation back instead of
//! leaking a slot. Rescheduling reserves the new slot before releasing
//! the old one for the same reason: the patient never transiently
//! holds zero slots.
//!
//! Cancelled rows are retained for audit; nothing is deleted.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use derm_core::appointment::{
    check_transition, Appointment, AppointmentStatus, ProxyBooking, TransitionError,
};
use derm_core::availability::DoctorAvailabilityIndex;
use derm_core::config::CapacityConfig;
use derm_core::notify::{NotificationEvent, NotificationKind, NotificationSink};
use derm_core::slot::SlotKey;
use derm_core::validate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;
use tracing::info;

use crate::capacity::CapacityLedger;
use crate::error::{BookingError, StoreError};
use crate::ClinicDb;

/// A booking request as received from the presentation layer.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    /// The booking patient.
    pub patient_id: String,
    /// The requested doctor.
    pub doctor_id: String,
    /// The requested clinic service.
    pub service_id: String,
    /// Requested visit date and time.
    pub scheduled_at: NaiveDateTime,
    /// Set when booking on behalf of someone else.
    pub proxy: Option<ProxyBooking>,
}

/// Owns the appointment lifecycle.
pub struct AppointmentRegistry {
    db: ClinicDb,
    capacity: CapacityConfig,
    availability: Arc<DoctorAvailabilityIndex>,
    sink: Arc<dyn NotificationSink>,
}

impl AppointmentRegistry {
    /// Creates a registry over `db`.
    ///
    /// `availability` is the static roster index (see
    /// [`crate::doctors::load_availability_index`]); `sink` receives a
    /// notification event after every successful book, cancel, and
    /// reschedule.
    #[must_use]
    pub fn new(
        db: ClinicDb,
        capacity: CapacityConfig,
        availability: Arc<DoctorAvailabilityIndex>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            db,
            capacity,
            availability,
            sink,
        }
    }

    /// Books a new appointment, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::book_at`].
    pub fn book(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        self.book_at(request, Utc::now())
    }

    /// Books a new appointment as of `now`.
    ///
    /// Preconditions, checked in order:
    /// 1. the request is well-formed and inside clinic hours;
    /// 2. the patient holds no active appointment
    ///    ([`BookingError::DuplicateActiveAppointment`]);
    /// 3. the doctor covers the slot ([`BookingError::DoctorUnavailable`]);
    /// 4. the half-day quota admits one more
    ///    ([`BookingError::CapacityExceeded`]).
    ///
    /// Only when all pass is the appointment persisted, status PENDING.
    ///
    /// # Errors
    ///
    /// One of the precondition errors above, or [`BookingError::Store`]
    /// when the store fails — in which case any capacity reservation
    /// made during the attempt has been rolled back.
    pub fn book_at(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingError> {
        let today = now.date_naive();
        validate::validate_schedule(request.scheduled_at, today)?;
        if let Some(proxy) = &request.proxy {
            validate::validate_name(&proxy.name)?;
            validate::validate_age(u16::from(proxy.age))?;
        }

        let slot = SlotKey::of(request.scheduled_at);
        let appointment = {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction().map_err(StoreError::from)?;

            if let Some(existing) = Self::active_appointment_id(&tx, &request.patient_id, today)? {
                return Err(BookingError::DuplicateActiveAppointment {
                    patient_id: request.patient_id,
                    appointment_id: existing,
                });
            }

            if !self
                .availability
                .is_available(&request.doctor_id, slot.date, slot.half_day)
            {
                return Err(BookingError::DoctorUnavailable {
                    doctor_id: request.doctor_id,
                    slot,
                });
            }

            if !CapacityLedger::try_reserve_in(&tx, self.capacity, slot)? {
                return Err(BookingError::CapacityExceeded { slot });
            }

            let id = Self::next_appointment_id(&tx, today)?;
            let appointment = Appointment {
                id,
                patient_id: request.patient_id,
                doctor_id: request.doctor_id,
                service_id: request.service_id,
                scheduled_at: request.scheduled_at,
                status: AppointmentStatus::Pending,
                notes: None,
                proxy: request.proxy,
            };
            Self::insert_appointment(&tx, &appointment, now)?;

            // Commit covers both the reservation and the row; a failure
            // here releases the reserved slot by rollback.
            tx.commit().map_err(StoreError::from)?;
            appointment
        };

        info!(
            appointment_id = %appointment.id,
            patient_id = %appointment.patient_id,
            slot = %slot,
            "appointment booked"
        );
        self.notify(
            &appointment.patient_id,
            NotificationKind::Confirmation,
            &appointment,
        );
        Ok(appointment)
    }

    /// Cancels an appointment, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::cancel_at`].
    pub fn cancel(
        &self,
        appointment_id: &str,
        acting_patient_id: &str,
        reason: Option<&str>,
    ) -> Result<bool, BookingError> {
        self.cancel_at(appointment_id, acting_patient_id, reason, Utc::now())
    }

    /// Cancels an appointment as of `now`.
    ///
    /// Returns `Ok(true)` on a real cancellation and `Ok(false)` when
    /// the appointment was already cancelled (idempotent no-op; the
    /// capacity counter is untouched). The slot is released exactly
    /// once, in the same transaction as the status change.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for unknown ids or ids belonging to
    /// another patient; [`BookingError::Transition`] for COMPLETED
    /// appointments; [`BookingError::Store`] on store failure.
    pub fn cancel_at(
        &self,
        appointment_id: &str,
        acting_patient_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let cancelled = {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction().map_err(StoreError::from)?;

            let Some(appointment) = Self::fetch_appointment(&tx, appointment_id)? else {
                return Err(BookingError::NotFound {
                    appointment_id: appointment_id.to_string(),
                });
            };
            // Cancellation is patient-scoped; another patient's id
            // reads as not-found rather than leaking the row.
            if appointment.patient_id != acting_patient_id {
                return Err(BookingError::NotFound {
                    appointment_id: appointment_id.to_string(),
                });
            }

            if appointment.status == AppointmentStatus::Cancelled {
                return Ok(false);
            }
            check_transition(
                appointment_id,
                appointment.status,
                AppointmentStatus::Cancelled,
            )?;

            tx.execute(
                "UPDATE appointments
                 SET status = 'CANCELLED', notes = COALESCE(?2, notes), updated_at = ?3
                 WHERE appointment_id = ?1",
                params![appointment_id, reason, now],
            )
            .map_err(StoreError::from)?;
            CapacityLedger::release_in(&tx, appointment.slot())?;
            tx.commit().map_err(StoreError::from)?;
            appointment
        };

        info!(appointment_id, patient_id = acting_patient_id, "appointment cancelled");
        self.notify(acting_patient_id, NotificationKind::Cancellation, &cancelled);
        Ok(true)
    }

    /// Applies a lifecycle transition, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_status_at`].
    pub fn transition_status(
        &self,
        appointment_id: &str,
        new_status: AppointmentStatus,
    ) -> Result<(), BookingError> {
        self.transition_status_at(appointment_id, new_status, Utc::now())
    }

    /// Applies a lifecycle transition as of `now`.
    ///
    /// Illegal moves are rejected with
    /// [`BookingError::Transition`], never silently clamped. Moving to
    /// CANCELLED through this entry point also releases the capacity
    /// slot, preserving the decrement-exactly-once property.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`], [`BookingError::Transition`], or
    /// [`BookingError::Store`].
    pub fn transition_status_at(
        &self,
        appointment_id: &str,
        new_status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let Some(appointment) = Self::fetch_appointment(&tx, appointment_id)? else {
            return Err(BookingError::NotFound {
                appointment_id: appointment_id.to_string(),
            });
        };
        check_transition(appointment_id, appointment.status, new_status)?;

        tx.execute(
            "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE appointment_id = ?1",
            params![appointment_id, new_status.as_str(), now],
        )
        .map_err(StoreError::from)?;
        if new_status == AppointmentStatus::Cancelled {
            CapacityLedger::release_in(&tx, appointment.slot())?;
        }
        tx.commit().map_err(StoreError::from)?;

        info!(appointment_id, from = %appointment.status, to = %new_status, "status transition");
        Ok(())
    }

    /// Reschedules an appointment, using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`Self::reschedule_at`].
    pub fn reschedule(
        &self,
        appointment_id: &str,
        new_when: NaiveDateTime,
        new_doctor_id: &str,
    ) -> Result<(), BookingError> {
        self.reschedule_at(appointment_id, new_when, new_doctor_id, Utc::now())
    }

    /// Moves an appointment to a new slot and doctor as of `now`.
    ///
    /// Availability and capacity for the new slot are validated as in
    /// [`Self::book_at`]; the new slot is reserved before the old one
    /// is released, and both commit atomically. Only APPROVED and
    /// RESCHEDULED appointments can move; a PENDING appointment must
    /// be approved or cancelled first.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`], [`BookingError::NotFound`],
    /// [`BookingError::Transition`],
    /// [`BookingError::DoctorUnavailable`],
    /// [`BookingError::CapacityExceeded`], or [`BookingError::Store`].
    pub fn reschedule_at(
        &self,
        appointment_id: &str,
        new_when: NaiveDateTime,
        new_doctor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        validate::validate_schedule(new_when, now.date_naive())?;
        let new_slot = SlotKey::of(new_when);

        let (old_appointment, rescheduled) = {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction().map_err(StoreError::from)?;

            let Some(appointment) = Self::fetch_appointment(&tx, appointment_id)? else {
                return Err(BookingError::NotFound {
                    appointment_id: appointment_id.to_string(),
                });
            };
            if appointment.status.is_terminal() {
                return Err(BookingError::Transition(TransitionError::Terminal {
                    appointment_id: appointment_id.to_string(),
                    status: appointment.status,
                }));
            }
            let stays_rescheduled = appointment.status == AppointmentStatus::Rescheduled;
            if !stays_rescheduled
                && !appointment
                    .status
                    .can_transition_to(AppointmentStatus::Rescheduled)
            {
                return Err(BookingError::Transition(
                    TransitionError::IllegalTransition {
                        appointment_id: appointment_id.to_string(),
                        from: appointment.status,
                        to: AppointmentStatus::Rescheduled,
                    },
                ));
            }

            if !self
                .availability
                .is_available(new_doctor_id, new_slot.date, new_slot.half_day)
            {
                return Err(BookingError::DoctorUnavailable {
                    doctor_id: new_doctor_id.to_string(),
                    slot: new_slot,
                });
            }

            let old_slot = appointment.slot();
            if new_slot != old_slot {
                // Reserve the new slot first; only once the move is
                // committed does the old reservation come back.
                if !CapacityLedger::try_reserve_in(&tx, self.capacity, new_slot)? {
                    return Err(BookingError::CapacityExceeded { slot: new_slot });
                }
            }

            tx.execute(
                "UPDATE appointments
                 SET scheduled_at = ?2, slot_date = ?3, half_day = ?4, doctor_id = ?5,
                     status = 'RESCHEDULED', updated_at = ?6
                 WHERE appointment_id = ?1",
                params![
                    appointment_id,
                    new_when,
                    new_slot.date,
                    new_slot.half_day.as_str(),
                    new_doctor_id,
                    now,
                ],
            )
            .map_err(StoreError::from)?;

            if new_slot != old_slot {
                CapacityLedger::release_in(&tx, old_slot)?;
            }
            tx.commit().map_err(StoreError::from)?;

            let mut rescheduled = appointment.clone();
            rescheduled.scheduled_at = new_when;
            rescheduled.doctor_id = new_doctor_id.to_string();
            rescheduled.status = AppointmentStatus::Rescheduled;
            (appointment, rescheduled)
        };

        info!(
            appointment_id,
            from = %old_appointment.scheduled_at,
            to = %new_when,
            "appointment rescheduled"
        );
        self.sink.deliver(&NotificationEvent {
            recipient: rescheduled.patient_id.clone(),
            kind: NotificationKind::Reschedule,
            details: json!({
                "appointment_id": appointment_id,
                "old_scheduled_at": old_appointment.scheduled_at.to_string(),
                "old_doctor_id": old_appointment.doctor_id,
                "new_scheduled_at": new_when.to_string(),
                "new_doctor_id": new_doctor_id,
            }),
        });
        Ok(())
    }

    /// Looks up one appointment by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn get(&self, appointment_id: &str) -> Result<Option<Appointment>, StoreError> {
        let conn = self.db.lock()?;
        Self::fetch_appointment(&conn, appointment_id)
    }

    /// The patient's current active appointment, if any, as of `now`.
    ///
    /// Active means status in {PENDING, APPROVED, RESCHEDULED} and a
    /// visit date of today or later.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn active_appointment_for(
        &self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, StoreError> {
        let conn = self.db.lock()?;
        let id = Self::active_appointment_id(&conn, patient_id, now.date_naive())?;
        match id {
            Some(id) => Self::fetch_appointment(&conn, &id),
            None => Ok(None),
        }
    }

    /// All appointments for a patient, newest visit first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn appointments_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.query_appointments(
            "SELECT * FROM appointments WHERE patient_id = ?1
             ORDER BY scheduled_at DESC",
            params![patient_id],
        )
    }

    /// All appointments in a given status, by visit time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn appointments_by_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.query_appointments(
            "SELECT * FROM appointments WHERE status = ?1 ORDER BY scheduled_at",
            params![status.as_str()],
        )
    }

    /// All appointments on a given date, by visit time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        self.query_appointments(
            "SELECT * FROM appointments WHERE slot_date = ?1 ORDER BY scheduled_at",
            params![date],
        )
    }

    /// Active appointments scheduled within the next `days_ahead` days
    /// of `now`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    pub fn upcoming(
        &self,
        days_ahead: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let start = now.date_naive();
        let end = start + Duration::days(i64::from(days_ahead));
        self.query_appointments(
            "SELECT * FROM appointments
             WHERE slot_date BETWEEN ?1 AND ?2
             AND status IN ('PENDING', 'APPROVED', 'RESCHEDULED')
             ORDER BY scheduled_at",
            params![start, end],
        )
    }

    fn query_appointments(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Appointment>, StoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_appointment)?;
        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?);
        }
        Ok(appointments)
    }

    fn active_appointment_id(
        conn: &Connection,
        patient_id: &str,
        today: NaiveDate,
    ) -> Result<Option<String>, StoreError> {
        let id = conn
            .query_row(
                "SELECT appointment_id FROM appointments
                 WHERE patient_id = ?1
                 AND status IN ('PENDING', 'APPROVED', 'RESCHEDULED')
                 AND slot_date >= ?2
                 LIMIT 1",
                params![patient_id, today],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn fetch_appointment(
        conn: &Connection,
        appointment_id: &str,
    ) -> Result<Option<Appointment>, StoreError> {
        let appointment = conn
            .query_row(
                "SELECT * FROM appointments WHERE appointment_id = ?1",
                params![appointment_id],
                Self::row_to_appointment,
            )
            .optional()?;
        Ok(appointment)
    }

    fn insert_appointment(
        conn: &Connection,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let slot = appointment.slot();
        conn.execute(
            "INSERT INTO appointments
             (appointment_id, patient_id, doctor_id, service_id, scheduled_at,
              slot_date, half_day, status, notes,
              proxy_name, proxy_contact, proxy_age, proxy_relationship,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
            params![
                appointment.id,
                appointment.patient_id,
                appointment.doctor_id,
                appointment.service_id,
                appointment.scheduled_at,
                slot.date,
                slot.half_day.as_str(),
                appointment.status.as_str(),
                appointment.notes,
                appointment.proxy.as_ref().map(|p| p.name.as_str()),
                appointment.proxy.as_ref().map(|p| p.contact.as_str()),
                appointment.proxy.as_ref().map(|p| p.age),
                appointment.proxy.as_ref().map(|p| p.relationship.as_str()),
                now,
            ],
        )?;
        Ok(())
    }

    /// Allocates the next human-readable id for a booking made on
    /// `today`, e.g. `APP20240610003`. Backed by a transactional
    /// per-day sequence so concurrent bookings cannot collide.
    fn next_appointment_id(conn: &Connection, today: NaiveDate) -> Result<String, StoreError> {
        let seq: i64 = conn.query_row(
            "INSERT INTO appointment_seq (day, next) VALUES (?1, 1)
             ON CONFLICT (day) DO UPDATE SET next = next + 1
             RETURNING next",
            params![today],
            |row| row.get(0),
        )?;
        Ok(format!("APP{}{seq:03}", today.format("%Y%m%d")))
    }

    fn row_to_appointment(row: &Row<'_>) -> rusqlite::Result<Appointment> {
        let status_raw: String = row.get("status")?;
        let status = status_raw.parse::<AppointmentStatus>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })?;
        let proxy = match row.get::<_, Option<String>>("proxy_name")? {
            Some(name) => Some(ProxyBooking {
                name,
                contact: row
                    .get::<_, Option<String>>("proxy_contact")?
                    .unwrap_or_default(),
                age: row.get::<_, Option<u8>>("proxy_age")?.unwrap_or_default(),
                relationship: row
                    .get::<_, Option<String>>("proxy_relationship")?
                    .unwrap_or_default(),
            }),
            None => None,
        };
        Ok(Appointment {
            id: row.get("appointment_id")?,
            patient_id: row.get("patient_id")?,
            doctor_id: row.get("doctor_id")?,
            service_id: row.get("service_id")?,
            scheduled_at: row.get("scheduled_at")?,
            status,
            notes: row.get("notes")?,
            proxy,
        })
    }

    fn notify(&self, recipient: &str, kind: NotificationKind, appointment: &Appointment) {
        let event = NotificationEvent {
            recipient: recipient.to_string(),
            kind,
            details: json!({
                "appointment_id": appointment.id,
                "doctor_id": appointment.doctor_id,
                "service_id": appointment.service_id,
                "scheduled_at": appointment.scheduled_at.to_string(),
            }),
        };
        // Delivery trouble is the notifier's problem; appointment state
        // is already committed.
        self.sink.deliver(&event);
    }
}

impl std::fmt::Debug for AppointmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppointmentRegistry")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
