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

//! Benchmarks for the balance engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Pure balance recomputation over growing ledgers
//! - Charge throughput, single- and multi-threaded
//! - Audit-and-heal sweep scaling with membership count and worker count
//! - Unified history aggregation

use care_ledger_rs::{
    CareRecord, ChargeRequest, Engine, HistoryView, LedgerStore, Member, MemberId, Membership,
    MembershipId, MemoryStore, ProgramId, Reconciler, RecordId, SignatureStatus, compute_balance,
};
use chrono::{NaiveDate, NaiveTime};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Helper Functions
// =============================================================================

fn completed_record(id: u64, membership: u64, price: i64) -> CareRecord {
    CareRecord {
        id: RecordId(id),
        member_id: MemberId(membership),
        membership_id: MembershipId(membership),
        program_id: ProgramId(7),
        original_price: Decimal::from(price),
        discount_rate: Decimal::ZERO,
        final_price: Decimal::from(price),
        balance_after: None,
        signature_status: SignatureStatus::Completed,
        signature_data: None,
        date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        note_summary: None,
        note_details: None,
        note_recommendation: None,
    }
}

fn make_charge(record_id: u64, member: u64, price: i64) -> ChargeRequest {
    ChargeRequest {
        record_id: RecordId(record_id),
        member_id: MemberId(member),
        membership_id: MembershipId(member),
        program_id: ProgramId(7),
        original_price: Decimal::from(price),
        discount_rate: None,
        date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        signature_data: None,
        note_summary: None,
    }
}

/// Store with `members` members, one large pool each.
fn seeded_store(members: u64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for member in 1..=members {
        store
            .insert_member(Member::new(
                MemberId(member),
                format!("member-{member}"),
                "010-0000-0000",
            ))
            .unwrap();
        store
            .insert_membership(Membership::new(
                MembershipId(member),
                MemberId(member),
                "body care",
                Decimal::from(1_000_000_000_000i64),
            ))
            .unwrap();
    }
    store
}

// =============================================================================
// Calculator Benchmarks
// =============================================================================

fn bench_compute_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_balance");
    for size in [10usize, 100, 1_000] {
        let records: Vec<CareRecord> = (1..=size as u64)
            .map(|i| completed_record(i, 1, 10_000))
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| {
                black_box(compute_balance(
                    Decimal::from(1_000_000_000i64),
                    black_box(records),
                ))
            })
        });
    }
    group.finish();
}

// =============================================================================
// Charge Throughput Benchmarks
// =============================================================================

fn bench_single_threaded_charges(c: &mut Criterion) {
    let mut group = c.benchmark_group("charges");
    group.throughput(Throughput::Elements(1));

    let store = seeded_store(1);
    let engine = Engine::new(store);
    let next_id = AtomicU64::new(1);

    group.bench_function("single_thread", |b| {
        b.iter(|| {
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            engine
                .charge_and_record(black_box(make_charge(id, 1, 1)))
                .unwrap();
        })
    });
    group.finish();
}

fn bench_concurrent_charges(c: &mut Criterion) {
    let mut group = c.benchmark_group("charges_concurrent");
    for clients in [2u64, 8] {
        group.throughput(Throughput::Elements(clients * 100));
        group.bench_with_input(
            BenchmarkId::from_parameter(clients),
            &clients,
            |b, &clients| {
                b.iter_batched(
                    || {
                        let store = seeded_store(clients);
                        Arc::new(Engine::new(store))
                    },
                    |engine| {
                        (1..=clients).into_par_iter().for_each(|member| {
                            for i in 0..100u64 {
                                let id = member * 1_000_000 + i;
                                engine.charge_and_record(make_charge(id, member, 1)).unwrap();
                            }
                        });
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Reconciliation Sweep Benchmarks
// =============================================================================

fn bench_audit_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit_and_heal");
    for memberships in [10u64, 100] {
        for workers in [1usize, 4] {
            group.throughput(Throughput::Elements(memberships));
            group.bench_with_input(
                BenchmarkId::new(format!("workers-{workers}"), memberships),
                &(memberships, workers),
                |b, &(memberships, workers)| {
                    b.iter_batched(
                        || {
                            let store = seeded_store(memberships);
                            let mut record_id = 1u64;
                            for member in 1..=memberships {
                                for _ in 0..10 {
                                    store
                                        .insert_record(completed_record(record_id, member, 10_000))
                                        .unwrap();
                                    record_id += 1;
                                }
                            }
                            store
                        },
                        |store| {
                            let report =
                                Reconciler::with_workers(store, workers).audit_and_heal();
                            black_box(report)
                        },
                        criterion::BatchSize::SmallInput,
                    )
                },
            );
        }
    }
    group.finish();
}

// =============================================================================
// Aggregator Benchmarks
// =============================================================================

fn bench_unified_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("unified_history");
    for records in [10u64, 500] {
        let store = seeded_store(1);
        for i in 1..=records {
            store.insert_record(completed_record(i, 1, 10_000)).unwrap();
        }
        let view = HistoryView::new(store);
        group.throughput(Throughput::Elements(records));
        group.bench_with_input(BenchmarkId::from_parameter(records), &view, |b, view| {
            b.iter(|| black_box(view.unified_history(MemberId(1)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_compute_balance,
    bench_single_threaded_charges,
    bench_concurrent_charges,
    bench_audit_sweep,
    bench_unified_history,
);
criterion_main!(benches);
