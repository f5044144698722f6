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

//! Usage ledger rows, reservations, and in-app notifications.
//!
//! A care record moves through exactly one financial transition:
//!
//!   Pending ──complete──► Completed
//!
//! Only `Completed` records count toward usage; a `Pending` row is reserved
//! intent that has charged nothing yet. After completion the financial
//! fields are frozen and only the note fields may change.

use crate::base::{MemberId, MembershipId, NotificationId, ProgramId, RecordId, ReservationId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Consent/charge state of a care record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    Pending,
    Completed,
}

/// One immutable ledger entry for a rendered, charged service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareRecord {
    pub id: RecordId,
    pub member_id: MemberId,
    /// Which pool this session was (or will be) charged against.
    pub membership_id: MembershipId,
    pub program_id: ProgramId,
    pub original_price: Decimal,
    pub discount_rate: Decimal,
    /// The amount actually debited; the only field balance recomputation sums.
    pub final_price: Decimal,
    /// Remaining balance at the moment of completion. A point-in-time cache
    /// for display, never authoritative.
    pub balance_after: Option<Decimal>,
    pub signature_status: SignatureStatus,
    /// Consent proof captured at completion.
    pub signature_data: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub note_summary: Option<String>,
    /// Admin-private session notes.
    pub note_details: Option<String>,
    /// Care recommendation shared with the member.
    pub note_recommendation: Option<String>,
}

impl CareRecord {
    pub fn is_completed(&self) -> bool {
        self.signature_status == SignatureStatus::Completed
    }
}

/// Editable, non-financial fields of a care record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordNotes {
    pub summary: Option<String>,
    pub details: Option<String>,
    pub recommendation: Option<String>,
}

/// State of a scheduled visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Completed,
    Cancelled,
}

/// A scheduled future visit. Not a ledger entry; it becomes a
/// [`CareRecord`] only on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub member_id: MemberId,
    pub program_id: ProgramId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn is_open(&self) -> bool {
        self.status == ReservationStatus::Reserved
    }
}

/// Fire-and-forget in-app message row backing unread-count badges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub member_id: MemberId,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
