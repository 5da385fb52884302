//! Capacity counter invariants under arbitrary reserve/release mixes.

mod common;

use chrono::NaiveDate;
use derm_core::config::CapacityConfig;
use derm_core::slot::{HalfDay, SlotKey};
use derm_store::capacity::CapacityLedger;
use derm_store::ClinicDb;
use proptest::prelude::*;

fn ledger(quota: u32) -> CapacityLedger {
    let db = ClinicDb::open_in_memory().expect("open in-memory db");
    CapacityLedger::new(
        db,
        CapacityConfig {
            am_quota: quota,
            pm_quota: quota,
        },
    )
}

fn slot() -> SlotKey {
    SlotKey::new(NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date"), HalfDay::Am)
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Reserve,
    Release,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Reserve), Just(Op::Release)]
}

proptest! {
    // The stored counter always agrees with a simple in-memory model
    // and never leaves [0, quota], whatever the operation order.
    #[test]
    fn counter_tracks_the_model(
        quota in 1u32..6,
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let ledger = ledger(quota);
        let slot = slot();
        let mut model: u32 = 0;

        for op in ops {
            match op {
                Op::Reserve => {
                    let admitted = ledger.try_reserve(slot).unwrap();
                    prop_assert_eq!(admitted, model < quota);
                    if admitted {
                        model += 1;
                    }
                }
                Op::Release => {
                    ledger.release(slot).unwrap();
                    model = model.saturating_sub(1);
                }
            }
            let booked = ledger.booked_count(slot).unwrap();
            prop_assert_eq!(booked, model);
            prop_assert!(booked <= quota);
            prop_assert_eq!(ledger.available_count(slot).unwrap(), quota - booked);
        }
    }
}

#[test]
fn counts_are_scoped_to_their_half_day() {
    let clinic = common::clinic_with_quota(2);
    let am = SlotKey::new(common::monday(), HalfDay::Am);
    let pm = SlotKey::new(common::monday(), HalfDay::Pm);

    clinic
        .registry
        .book_at(common::request("PAT001", common::monday_at(9, 0)), common::clock())
        .unwrap();
    clinic
        .registry
        .book_at(common::request("PAT002", common::monday_at(14, 0)), common::clock())
        .unwrap();

    assert_eq!(clinic.ledger.booked_count(am).unwrap(), 1);
    assert_eq!(clinic.ledger.booked_count(pm).unwrap(), 1);
}

#[test]
fn counts_are_scoped_to_their_date() {
    let clinic = common::clinic_with_quota(1);
    let monday_am = SlotKey::new(common::monday(), HalfDay::Am);
    let tuesday = common::monday().succ_opt().expect("valid date");
    let tuesday_am = SlotKey::new(tuesday, HalfDay::Am);

    clinic
        .registry
        .book_at(common::request("PAT001", common::monday_at(9, 0)), common::clock())
        .unwrap();
    let next_day = tuesday.and_hms_opt(9, 0, 0).expect("valid time");
    clinic
        .registry
        .book_at(common::request("PAT002", next_day), common::clock())
        .unwrap();

    assert_eq!(clinic.ledger.booked_count(monday_am).unwrap(), 1);
    assert_eq!(clinic.ledger.booked_count(tuesday_am).unwrap(), 1);
}
