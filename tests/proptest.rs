// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Property-based tests for the balance engine.
//!
//! These verify the invariants that must hold for any ledger contents:
//! healing always restores `total == used + remaining`, healing is
//! idempotent, the read-side aggregator agrees with the calculator, and
//! the charge guard never lets a pool go negative.

use care_ledger_rs::{
    CareRecord, ChargeRequest, Engine, HistoryView, LedgerStore, Member, MemberId, Membership,
    MembershipId, MemoryStore, ProgramId, Reconciler, RecordId, SignatureStatus, compute_balance,
};
use chrono::{NaiveDate, NaiveTime};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Whole-unit prices from 1 to 5,000,000.
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1i64..=5_000_000i64).prop_map(Decimal::from)
}

/// A (price, completed?) pair for one ledger row.
fn arb_row() -> impl Strategy<Value = (Decimal, bool)> {
    (arb_price(), any::<bool>())
}

/// A bogus stored snapshot: (used, remaining) with no relation to the ledger.
fn arb_drift() -> impl Strategy<Value = (Decimal, Decimal)> {
    ((0i64..=10_000_000i64), (-1_000_000i64..=10_000_000i64))
        .prop_map(|(u, r)| (Decimal::from(u), Decimal::from(r)))
}

fn record(id: u64, price: Decimal, completed: bool) -> CareRecord {
    CareRecord {
        id: RecordId(id),
        member_id: MemberId(1),
        membership_id: MembershipId(1),
        program_id: ProgramId(7),
        original_price: price,
        discount_rate: Decimal::ZERO,
        final_price: price,
        balance_after: None,
        signature_status: if completed {
            SignatureStatus::Completed
        } else {
            SignatureStatus::Pending
        },
        signature_data: None,
        date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        note_summary: None,
        note_details: None,
        note_recommendation: None,
    }
}

/// Builds a store holding one member, one pool with a drifted snapshot, and
/// the given ledger rows.
fn drifted_store(
    total: Decimal,
    drift: (Decimal, Decimal),
    rows: &[(Decimal, bool)],
) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_member(Member::new(MemberId(1), "Kim", "010-0000-0000"))
        .unwrap();
    let mut pool = Membership::new(MembershipId(1), MemberId(1), "body care", total);
    pool.used_amount = drift.0;
    pool.remaining_amount = drift.1;
    store.insert_membership(pool).unwrap();
    for (i, (price, completed)) in rows.iter().enumerate() {
        store
            .insert_record(record(i as u64 + 1, *price, *completed))
            .unwrap();
    }
    store
}

// =============================================================================
// Healing Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// After a sweep, every snapshot satisfies `total == used + remaining`
    /// and matches the calculator exactly, whatever garbage was stored.
    #[test]
    fn healing_restores_the_invariant(
        total in arb_price(),
        drift in arb_drift(),
        rows in prop::collection::vec(arb_row(), 0..12),
    ) {
        let store = drifted_store(total, drift, &rows);
        let report = Reconciler::new(store.clone()).audit_and_heal();
        prop_assert_eq!(report.audited, 1);
        prop_assert_eq!(report.errors, 0);

        let healed = store.membership(MembershipId(1)).unwrap();
        prop_assert_eq!(
            healed.total_amount,
            healed.used_amount + healed.remaining_amount
        );

        let records = store.records_for_membership(MembershipId(1)).unwrap();
        let computed = compute_balance(total, &records);
        prop_assert_eq!(healed.used_amount, computed.used);
        prop_assert_eq!(healed.remaining_amount, computed.remaining);
    }

    /// A second sweep over an already-healed store changes nothing.
    #[test]
    fn healing_is_idempotent(
        total in arb_price(),
        drift in arb_drift(),
        rows in prop::collection::vec(arb_row(), 0..12),
    ) {
        let store = drifted_store(total, drift, &rows);
        let reconciler = Reconciler::new(store.clone());

        reconciler.audit_and_heal();
        let before = store.membership(MembershipId(1)).unwrap();

        let second = reconciler.audit_and_heal();
        prop_assert_eq!(second.healed, 0);
        prop_assert_eq!(store.membership(MembershipId(1)).unwrap(), before);
    }

    /// Only completed rows contribute to the healed usage.
    #[test]
    fn healed_usage_ignores_pending_rows(
        total in arb_price(),
        rows in prop::collection::vec(arb_row(), 0..12),
    ) {
        let store = drifted_store(total, (Decimal::ZERO, total), &rows);
        Reconciler::new(store.clone()).audit_and_heal();

        let expected: Decimal = rows
            .iter()
            .filter(|(_, completed)| *completed)
            .map(|(price, _)| *price)
            .sum();
        prop_assert_eq!(store.membership(MembershipId(1)).unwrap().used_amount, expected);
    }
}

// =============================================================================
// Charge Guard Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Under the default policy, no sequence of charges drives a pool
    /// negative, and the invariant holds after every accepted charge.
    #[test]
    fn guard_never_allows_a_negative_balance(
        total in arb_price(),
        charges in prop::collection::vec(arb_price(), 1..10),
    ) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_member(Member::new(MemberId(1), "Kim", "010-0000-0000"))
            .unwrap();
        store
            .insert_membership(Membership::new(MembershipId(1), MemberId(1), "pool", total))
            .unwrap();
        let engine = Engine::new(store.clone());

        for (i, price) in charges.iter().enumerate() {
            // May fail on the guard; that's the point
            let _ = engine.charge_and_record(ChargeRequest {
                record_id: RecordId(i as u64 + 1),
                member_id: MemberId(1),
                membership_id: MembershipId(1),
                program_id: ProgramId(7),
                original_price: *price,
                discount_rate: None,
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                signature_data: None,
                note_summary: None,
            });

            let pool = store.membership(MembershipId(1)).unwrap();
            prop_assert!(pool.remaining_amount >= Decimal::ZERO);
            prop_assert_eq!(pool.total_amount, pool.used_amount + pool.remaining_amount);
        }
    }

    /// The read-side totals agree with the calculator for whatever the
    /// write path produced.
    #[test]
    fn aggregator_matches_calculator(
        total in arb_price(),
        charges in prop::collection::vec(arb_price(), 0..10),
    ) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_member(Member::new(MemberId(1), "Kim", "010-0000-0000"))
            .unwrap();
        store
            .insert_membership(Membership::new(MembershipId(1), MemberId(1), "pool", total))
            .unwrap();
        let engine = Engine::new(store.clone());

        for (i, price) in charges.iter().enumerate() {
            let _ = engine.charge_and_record(ChargeRequest {
                record_id: RecordId(i as u64 + 1),
                member_id: MemberId(1),
                membership_id: MembershipId(1),
                program_id: ProgramId(7),
                original_price: *price,
                discount_rate: None,
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                signature_data: None,
                note_summary: None,
            });
        }

        let records = store.records_for_membership(MembershipId(1)).unwrap();
        let computed = compute_balance(total, &records);

        let totals = HistoryView::new(store.clone())
            .member_totals(MemberId(1))
            .unwrap();
        // A fully exhausted pool drops out of the active set; only compare
        // while the pool still counts.
        if store.membership(MembershipId(1)).unwrap().is_active() {
            prop_assert_eq!(totals.total_used, computed.used);
            prop_assert_eq!(totals.total_remaining, computed.remaining);
        }
    }

    /// The unified history is strictly ordered newest-first.
    #[test]
    fn history_is_date_time_descending(
        days in prop::collection::vec((1u32..=28u32, 0u32..24u32), 1..15),
    ) {
        let store = Arc::new(MemoryStore::new());
        for (i, (day, hour)) in days.iter().enumerate() {
            let mut row = record(i as u64 + 1, Decimal::from(1000), true);
            row.date = NaiveDate::from_ymd_opt(2025, 3, *day).unwrap();
            row.time = NaiveTime::from_hms_opt(*hour, 0, 0).unwrap();
            store.insert_record(row).unwrap();
        }

        let entries = HistoryView::new(store)
            .unified_history(MemberId(1))
            .unwrap();
        for pair in entries.windows(2) {
            prop_assert!((pair[0].date, pair[0].time) >= (pair[1].date, pair[1].time));
        }
    }
}
