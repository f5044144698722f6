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

//! # Care Ledger
//!
//! This library provides the membership-balance core of a wellness-center
//! management system: prepaid membership pools, an immutable care-session
//! usage ledger, drift reconciliation between the two, and gated outbound
//! notification dispatch.
//!
//! ## Core Components
//!
//! - [`Engine`]: Write side — grants, top-ups, and guarded session charges
//! - [`calculator`]: The one place balance arithmetic lives
//! - [`Reconciler`]: Audit-and-heal sweep plus orphan cleanup
//! - [`HistoryView`]: Read side — unified per-member history and totals
//! - [`DispatchGate`]: Feature-flag-checked outbound messaging
//! - [`LedgerStore`]: Row-level store seam ([`MemoryStore`] in process)
//!
//! ## Example
//!
//! ```
//! use care_ledger_rs::{
//!     ChargeRequest, Engine, Member, MemberId, Membership, MembershipId, MemoryStore,
//!     ProgramId, RecordId,
//! };
//! use chrono::{NaiveDate, NaiveTime};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let engine = Engine::new(store);
//!
//! engine
//!     .register_member(Member::new(MemberId(1), "Kim", "010-1234-5678"))
//!     .unwrap();
//! engine
//!     .grant_membership(Membership::new(
//!         MembershipId(1),
//!         MemberId(1),
//!         "10-session body care",
//!         dec!(3_000_000),
//!     ))
//!     .unwrap();
//!
//! // Charge one session against the pool
//! let record = engine
//!     .charge_and_record(ChargeRequest {
//!         record_id: RecordId(1),
//!         member_id: MemberId(1),
//!         membership_id: MembershipId(1),
//!         program_id: ProgramId(7),
//!         original_price: dec!(1_188_000),
//!         discount_rate: None,
//!         date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
//!         time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
//!         signature_data: Some("consent".to_string()),
//!         note_summary: None,
//!     })
//!     .unwrap();
//!
//! assert_eq!(record.balance_after, Some(dec!(1_812_000)));
//! ```
//!
//! ## Consistency Model
//!
//! The store seam offers single-row atomicity and nothing more, so a
//! completed charge is two independent writes. The engine accepts that a
//! partial failure can leave the membership snapshot drifted from its
//! ledger rows, and [`Reconciler::audit_and_heal`] restores the invariant
//! `total_amount == used_amount + remaining_amount` on its next sweep.

pub mod calculator;
pub mod error;
pub mod gate;
pub mod history;
pub mod jobs;
pub mod store;

mod base;
mod engine;
mod member;
mod membership;
mod reconciler;
mod record;

pub use base::{MemberId, MembershipId, NotificationId, ProgramId, RecordId, ReservationId};
pub use calculator::{ComputedBalance, compute_balance, final_price};
pub use engine::{ChargeRequest, Engine};
pub use error::{ChargeError, SendError, StoreError};
pub use gate::{
    DispatchGate, Feature, FlagSource, HttpSender, JsonFlags, MessageSender, OutboundMessage,
    ProviderReply, PushReport, PushSender, SendOutcome,
};
pub use history::{HistoryEntry, HistoryKind, HistoryView, MemberTotals};
pub use jobs::ReminderReport;
pub use member::Member;
pub use membership::{Membership, MembershipStatus, OverdraftPolicy};
pub use reconciler::{AuditReport, CleanupReport, Reconciler};
pub use record::{
    CareRecord, Notification, RecordNotes, Reservation, ReservationStatus, SignatureStatus,
};
pub use store::{LedgerStore, MemoryStore, Snapshot};
