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

//! Charge processing engine.
//!
//! The [`Engine`] is the write side: it registers members, grants and tops
//! up membership pools, opens pending care records, and performs the one
//! financial transition in the system — completing a record, which debits
//! the pool and appends to the usage ledger.
//!
//! # Consistency
//!
//! A completed charge is two writes: the care-record row and the membership
//! snapshot. The store offers no cross-row transaction, so the engine
//! performs them in order (ledger first, snapshot second) and reports a
//! store failure if the second write is lost. The reconciliation sweep
//! recomputes every snapshot from the ledger, so a gap here heals on the
//! next run. Do not reorder or "fix" this without a store that actually
//! provides multi-row atomicity.
//!
//! # Charge guard
//!
//! A charge exceeding the remaining balance is rejected before any write
//! under the default [`OverdraftPolicy::Reject`]; see
//! [`OverdraftPolicy::AllowNegative`] for arrears billing.

use crate::base::{MemberId, MembershipId, ProgramId, RecordId, ReservationId};
use crate::calculator;
use crate::error::ChargeError;
use crate::member::Member;
use crate::membership::{Membership, OverdraftPolicy};
use crate::record::{CareRecord, RecordNotes, Reservation, ReservationStatus, SignatureStatus};
use crate::store::LedgerStore;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything needed to charge one care session.
///
/// `discount_rate: None` falls back to the membership's rate. The final
/// price is always derived through [`calculator::final_price`], never
/// supplied by the caller.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub record_id: RecordId,
    pub member_id: MemberId,
    pub membership_id: MembershipId,
    pub program_id: ProgramId,
    pub original_price: Decimal,
    pub discount_rate: Option<Decimal>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub signature_data: Option<String>,
    pub note_summary: Option<String>,
}

/// Charge processing engine over a ledger store.
pub struct Engine<S: LedgerStore> {
    store: Arc<S>,
    policy: OverdraftPolicy,
}

impl<S: LedgerStore> Engine<S> {
    /// Creates an engine with the default hard overdraft guard.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            policy: OverdraftPolicy::Reject,
        }
    }

    pub fn with_policy(store: Arc<S>, policy: OverdraftPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Registers a new member.
    pub fn register_member(&self, member: Member) -> Result<(), ChargeError> {
        self.store.insert_member(member)?;
        Ok(())
    }

    /// Deletes a member and cascades to everything the member owns.
    ///
    /// The cascade is row-by-row; a failure partway through leaves orphans
    /// behind, which the cleanup sweep removes on its next pass rather than
    /// this call retrying.
    pub fn delete_member(&self, id: MemberId) -> Result<(), ChargeError> {
        self.store.member(id).map_err(|_| ChargeError::MemberNotFound)?;
        self.store.delete_member(id)?;

        for membership in self.store.memberships_for_member(id)? {
            if let Err(e) = self.store.delete_membership(membership.id) {
                warn!(member = %id, membership = %membership.id, error = %e, "cascade delete left membership behind");
            }
        }
        for record in self.store.records_for_member(id)? {
            if let Err(e) = self.store.delete_record(record.id) {
                warn!(member = %id, record = %record.id, error = %e, "cascade delete left care record behind");
            }
        }
        for reservation in self.store.reservations_for_member(id)? {
            if let Err(e) = self.store.delete_reservation(reservation.id) {
                warn!(member = %id, reservation = %reservation.id, error = %e, "cascade delete left reservation behind");
            }
        }
        for notification in self.store.notifications_for_member(id)? {
            if let Err(e) = self.store.delete_notification(notification.id) {
                warn!(member = %id, notification = %notification.id, error = %e, "cascade delete left notification behind");
            }
        }
        Ok(())
    }

    /// Grants a new membership pool to an existing member.
    ///
    /// # Errors
    ///
    /// - [`ChargeError::MemberNotFound`] - owner does not exist.
    /// - [`ChargeError::InvalidAmount`] - non-positive total.
    pub fn grant_membership(&self, membership: Membership) -> Result<(), ChargeError> {
        if membership.total_amount <= Decimal::ZERO {
            return Err(ChargeError::InvalidAmount);
        }
        self.store
            .member(membership.member_id)
            .map_err(|_| ChargeError::MemberNotFound)?;
        self.store.insert_membership(membership)?;
        Ok(())
    }

    /// Raises a pool's total, crediting the remaining balance.
    pub fn top_up(
        &self,
        membership_id: MembershipId,
        amount: Decimal,
    ) -> Result<Membership, ChargeError> {
        let mut membership = self
            .store
            .membership(membership_id)
            .map_err(|_| ChargeError::MembershipNotFound)?;
        membership.top_up(amount)?;
        self.store.update_membership(membership.clone())?;
        Ok(membership)
    }

    /// Opens a pending care record at session start. Charges nothing.
    pub fn open_record(&self, request: ChargeRequest) -> Result<CareRecord, ChargeError> {
        let membership = self.checked_membership(&request)?;
        let record = build_record(&request, &membership, SignatureStatus::Pending, None);
        self.store.insert_record(record.clone())?;
        Ok(record)
    }

    /// Completes a pending record: the one pending → completed transition.
    ///
    /// Guards the balance, appends nothing (the row exists), flips the
    /// status, stamps `balance_after` and the consent signature, then
    /// debits the snapshot.
    ///
    /// # Errors
    ///
    /// - [`ChargeError::RecordNotFound`] - no such record.
    /// - [`ChargeError::AlreadyCompleted`] - the transition already ran.
    /// - [`ChargeError::InsufficientBalance`] - guard tripped; no write done.
    pub fn complete_record(
        &self,
        record_id: RecordId,
        signature_data: Option<String>,
    ) -> Result<CareRecord, ChargeError> {
        let mut record = self
            .store
            .record(record_id)
            .map_err(|_| ChargeError::RecordNotFound)?;
        if record.is_completed() {
            return Err(ChargeError::AlreadyCompleted);
        }

        let mut membership = self
            .store
            .membership(record.membership_id)
            .map_err(|_| ChargeError::MembershipNotFound)?;
        if membership.member_id != record.member_id {
            return Err(ChargeError::MembershipMismatch);
        }

        membership.debit(record.final_price, self.policy)?;

        record.signature_status = SignatureStatus::Completed;
        record.signature_data = signature_data;
        record.balance_after = Some(membership.remaining_amount);

        // Ledger first, snapshot second. A lost snapshot write heals on the
        // next reconciliation sweep.
        self.store.update_record(record.clone())?;
        self.store.update_membership(membership)?;

        debug!(record = %record.id, amount = %record.final_price, "care record completed");
        Ok(record)
    }

    /// Instant charge flow: inserts an already-completed record and debits
    /// the pool in one call.
    pub fn charge_and_record(&self, request: ChargeRequest) -> Result<CareRecord, ChargeError> {
        let mut membership = self.checked_membership(&request)?;
        let rate = request.discount_rate.unwrap_or(membership.discount_rate);
        let price = calculator::final_price(request.original_price, rate);

        membership.debit(price, self.policy)?;

        let record = build_record(
            &request,
            &membership,
            SignatureStatus::Completed,
            Some(membership.remaining_amount),
        );

        self.store.insert_record(record.clone())?;
        self.store.update_membership(membership)?;

        debug!(record = %record.id, amount = %record.final_price, "instant charge recorded");
        Ok(record)
    }

    /// Edits the non-financial note fields of a record.
    ///
    /// Works on pending and completed records alike; financial fields are
    /// untouchable here by construction.
    pub fn edit_notes(&self, record_id: RecordId, notes: RecordNotes) -> Result<(), ChargeError> {
        let mut record = self
            .store
            .record(record_id)
            .map_err(|_| ChargeError::RecordNotFound)?;
        record.note_summary = notes.summary;
        record.note_details = notes.details;
        record.note_recommendation = notes.recommendation;
        self.store.update_record(record)?;
        Ok(())
    }

    /// Books a future visit.
    pub fn book_reservation(&self, reservation: Reservation) -> Result<(), ChargeError> {
        self.store
            .member(reservation.member_id)
            .map_err(|_| ChargeError::MemberNotFound)?;
        self.store.insert_reservation(reservation)?;
        Ok(())
    }

    /// Cancels an open reservation.
    pub fn cancel_reservation(&self, id: ReservationId) -> Result<(), ChargeError> {
        let mut reservation = self
            .store
            .reservation(id)
            .map_err(|_| ChargeError::ReservationNotFound)?;
        if !reservation.is_open() {
            return Err(ChargeError::ReservationClosed);
        }
        reservation.status = ReservationStatus::Cancelled;
        self.store.update_reservation(reservation)?;
        Ok(())
    }

    /// Turns an open reservation into a charged care record.
    ///
    /// The reservation closes only after the charge succeeds, so a tripped
    /// balance guard leaves it open for rebooking against another pool.
    pub fn complete_reservation(
        &self,
        reservation_id: ReservationId,
        record_id: RecordId,
        membership_id: MembershipId,
        original_price: Decimal,
        signature_data: Option<String>,
    ) -> Result<CareRecord, ChargeError> {
        let reservation = self
            .store
            .reservation(reservation_id)
            .map_err(|_| ChargeError::ReservationNotFound)?;
        if !reservation.is_open() {
            return Err(ChargeError::ReservationClosed);
        }

        let record = self.charge_and_record(ChargeRequest {
            record_id,
            member_id: reservation.member_id,
            membership_id,
            program_id: reservation.program_id,
            original_price,
            discount_rate: None,
            date: reservation.date,
            time: reservation.time,
            signature_data,
            note_summary: None,
        })?;

        let mut closed = reservation;
        closed.status = ReservationStatus::Completed;
        self.store.update_reservation(closed)?;
        Ok(record)
    }

    /// Fetches and validates the membership a request charges against.
    fn checked_membership(&self, request: &ChargeRequest) -> Result<Membership, ChargeError> {
        if request.original_price <= Decimal::ZERO {
            return Err(ChargeError::InvalidAmount);
        }
        let membership = self
            .store
            .membership(request.membership_id)
            .map_err(|_| ChargeError::MembershipNotFound)?;
        if membership.member_id != request.member_id {
            return Err(ChargeError::MembershipMismatch);
        }
        Ok(membership)
    }
}

fn build_record(
    request: &ChargeRequest,
    membership: &Membership,
    status: SignatureStatus,
    balance_after: Option<Decimal>,
) -> CareRecord {
    let rate = request.discount_rate.unwrap_or(membership.discount_rate);
    CareRecord {
        id: request.record_id,
        member_id: request.member_id,
        membership_id: request.membership_id,
        program_id: request.program_id,
        original_price: request.original_price,
        discount_rate: rate,
        final_price: calculator::final_price(request.original_price, rate),
        balance_after,
        signature_status: status,
        signature_data: request.signature_data.clone(),
        date: request.date,
        time: request.time,
        note_summary: request.note_summary.clone(),
        note_details: None,
        note_recommendation: None,
    }
}
