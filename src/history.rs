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

//! Read-side balance aggregation for a single member.
//!
//! [`HistoryView`] merges a member's confirmed usage (completed care
//! records) and pending reservations into one time-ordered trail, and sums
//! member-level totals across active pools. Nothing here is cached across
//! calls: the ledger can change between two views, so every call recomputes
//! from source. The member's record count bounds the work.
//!
//! The totals use the same arithmetic as the balance calculator on the same
//! rows — if this view and an audit sweep ever disagree for one membership,
//! that is a bug in this crate, not drift.

use crate::base::{MemberId, ProgramId};
use crate::calculator::compute_balance;
use crate::error::StoreError;
use crate::store::LedgerStore;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// What a history entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    /// A completed, charged care session.
    Completed,
    /// A pending reservation; intent, not usage.
    Reserved,
}

/// One row of the unified member history, newest first.
///
/// Reserved entries carry no amount and no balance trail — nothing has
/// been charged yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub program_id: ProgramId,
    pub amount: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub signed: bool,
    pub note_summary: Option<String>,
}

/// Member-level balance totals across active memberships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberTotals {
    /// Sum of active pools' totals.
    pub total_amount: Decimal,
    /// Ledger-derived usage across active pools.
    pub total_used: Decimal,
    /// Ledger-derived remaining balance across active pools.
    pub total_remaining: Decimal,
}

/// Read-side aggregator over a ledger store.
pub struct HistoryView<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> HistoryView<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// One chronological view of everything that happened (or is booked)
    /// for a member, sorted descending by date then time.
    pub fn unified_history(&self, member_id: MemberId) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut entries: Vec<HistoryEntry> = Vec::new();

        for record in self.store.records_for_member(member_id)? {
            if !record.is_completed() {
                continue;
            }
            entries.push(HistoryEntry {
                kind: HistoryKind::Completed,
                date: record.date,
                time: record.time,
                program_id: record.program_id,
                amount: Some(record.final_price),
                balance_after: record.balance_after,
                signed: record.signature_data.is_some(),
                note_summary: record.note_summary,
            });
        }

        for reservation in self.store.reservations_for_member(member_id)? {
            if !reservation.is_open() {
                continue;
            }
            entries.push(HistoryEntry {
                kind: HistoryKind::Reserved,
                date: reservation.date,
                time: reservation.time,
                program_id: reservation.program_id,
                amount: None,
                balance_after: None,
                signed: false,
                note_summary: None,
            });
        }

        entries.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
        Ok(entries)
    }

    /// Sums totals across the member's active memberships, recomputing
    /// usage from the ledger rather than trusting snapshots.
    pub fn member_totals(&self, member_id: MemberId) -> Result<MemberTotals, StoreError> {
        let mut totals = MemberTotals::default();

        for membership in self.store.memberships_for_member(member_id)? {
            if !membership.is_active() {
                continue;
            }
            let records = self.store.records_for_membership(membership.id)?;
            let computed = compute_balance(membership.total_amount, &records);
            totals.total_amount += membership.total_amount;
            totals.total_used += computed.used;
            totals.total_remaining += computed.remaining;
        }

        Ok(totals)
    }

    /// Unread in-app notifications, for badge counts.
    pub fn unread_count(&self, member_id: MemberId) -> Result<usize, StoreError> {
        Ok(self
            .store
            .notifications_for_member(member_id)?
            .iter()
            .filter(|n| !n.is_read)
            .count())
    }
}
