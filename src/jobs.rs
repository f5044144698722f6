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

//! Scheduled entry points.
//!
//! Each job is a stateless read-then-act pass over the store (and, for
//! reminders, the dispatch gate). An external scheduler owns the cadence;
//! the operations CLI exposes each job as a subcommand.

use crate::base::MemberId;
use crate::error::StoreError;
use crate::gate::{DispatchGate, Feature, OutboundMessage, render_template};
use crate::record::Notification;
use crate::store::LedgerStore;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{info, warn};

/// AlimTalk template for the day-before visit reminder.
const VISIT_REMINDER_TEMPLATE: &str =
    "Hi #{name}, this is a reminder of your visit on #{date} at #{time}. \
     Please contact us if you need to reschedule.";

const VISIT_REMINDER_TEMPLATE_CODE: &str = "VISIT_REMINDER_01";

/// Outcome of one reminder scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderReport {
    /// Open reservations found on the target date.
    pub scanned: usize,
    /// Reminders the provider accepted.
    pub sent: usize,
    /// Sends suppressed by the feature flag or failed at the provider.
    pub skipped: usize,
    /// Store failures while resolving members or writing notifications.
    pub errors: usize,
}

/// Scans open reservations on `date` and sends one gated reminder per
/// reservation, mirroring each successful send as an in-app notification.
///
/// Delivery problems never abort the scan: a failed or suppressed send is
/// counted and the pass moves on.
pub fn visit_reminders<S: LedgerStore>(
    store: &S,
    gate: &DispatchGate,
    date: NaiveDate,
) -> ReminderReport {
    let reservations = match store.reservations_on(date) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "reminder scan could not list reservations");
            return ReminderReport {
                errors: 1,
                ..ReminderReport::default()
            };
        }
    };

    let mut report = ReminderReport::default();

    for reservation in reservations.iter().filter(|r| r.is_open()) {
        report.scanned += 1;

        let member = match store.member(reservation.member_id) {
            Ok(member) => member,
            Err(e) => {
                report.errors += 1;
                warn!(member = %reservation.member_id, error = %e, "reminder skipped: member lookup failed");
                continue;
            }
        };

        let body = render_template(
            VISIT_REMINDER_TEMPLATE,
            &[
                ("name", &member.name),
                ("date", &reservation.date.to_string()),
                ("time", &reservation.time.format("%H:%M").to_string()),
            ],
        );
        let message = OutboundMessage::templated(VISIT_REMINDER_TEMPLATE_CODE, body.clone());

        let outcome = gate.send_with_check(Feature::VisitReminder, &member.phone, &message);
        if !outcome.success {
            report.skipped += 1;
            continue;
        }
        report.sent += 1;

        if let Err(e) = append_notification(store, member.id, "Visit reminder", &body) {
            report.errors += 1;
            warn!(member = %member.id, error = %e, "reminder sent but notification row failed");
        }
    }

    info!(
        scanned = report.scanned,
        sent = report.sent,
        skipped = report.skipped,
        errors = report.errors,
        "visit reminder scan finished"
    );
    report
}

/// Writes a full JSON snapshot of all tables to `writer`.
pub fn backup<S: LedgerStore, W: Write>(store: &S, writer: W) -> Result<(), StoreError> {
    let snapshot = crate::store::Snapshot {
        members: store.members()?,
        memberships: store.memberships()?,
        care_records: store.records()?,
        reservations: store.reservations()?,
        notifications: store.notifications()?,
    };
    serde_json::to_writer_pretty(writer, &snapshot)
        .map_err(|e| StoreError::Backend(e.to_string()))
}

/// Cheapest possible read, proving the store still answers.
///
/// Hosted free tiers pause idle databases; a scheduled ping keeps the
/// project warm and doubles as a health probe.
pub fn keep_alive<S: LedgerStore>(store: &S) -> Result<usize, StoreError> {
    let count = store.members()?.len();
    info!(members = count, "keep-alive ping answered");
    Ok(count)
}

fn append_notification<S: LedgerStore>(
    store: &S,
    member_id: MemberId,
    title: &str,
    content: &str,
) -> Result<(), StoreError> {
    let id = store.allocate_notification_id()?;
    store.insert_notification(Notification {
        id,
        member_id,
        title: title.to_string(),
        content: content.to_string(),
        is_read: false,
        created_at: Utc::now(),
    })
}
