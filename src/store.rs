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

//! Ledger store seam.
//!
//! [`LedgerStore`] is the boundary to the hosted row store. It offers
//! row-level reads and writes on five typed tables and **no multi-row
//! transaction primitive** — the charge path must treat its two writes as
//! eventually consistent, and the reconciliation sweep closes any gap a
//! partial failure leaves behind.
//!
//! Every call is fallible with a typed [`StoreError`], including
//! [`StoreError::Timeout`]: a hosted backend answers over the network and
//! callers must be able to skip one slow row without aborting a batch.
//!
//! [`MemoryStore`] is the in-process implementation backing tests, the
//! demo server, and the operations CLI (which loads a JSON [`Snapshot`]).
//! Deserialization happens at this boundary and fails loudly; rows never
//! reach the domain with a half-parsed shape.

use crate::base::{MemberId, MembershipId, NotificationId, RecordId, ReservationId};
use crate::error::StoreError;
use crate::member::Member;
use crate::membership::Membership;
use crate::record::{CareRecord, Notification, Reservation};
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Row-level access to the five ledger tables.
///
/// Single-row writes are atomic; nothing larger is. Implementations must
/// bound every call and surface [`StoreError::Timeout`] instead of hanging.
pub trait LedgerStore: Send + Sync {
    // --- members ---
    fn insert_member(&self, member: Member) -> Result<(), StoreError>;
    fn member(&self, id: MemberId) -> Result<Member, StoreError>;
    fn members(&self) -> Result<Vec<Member>, StoreError>;
    fn delete_member(&self, id: MemberId) -> Result<(), StoreError>;

    // --- memberships ---
    fn insert_membership(&self, membership: Membership) -> Result<(), StoreError>;
    fn membership(&self, id: MembershipId) -> Result<Membership, StoreError>;
    fn memberships(&self) -> Result<Vec<Membership>, StoreError>;
    fn memberships_for_member(&self, member_id: MemberId) -> Result<Vec<Membership>, StoreError>;
    /// Whole-row replace; the single-row atomic write the snapshot heal rides on.
    fn update_membership(&self, membership: Membership) -> Result<(), StoreError>;
    fn delete_membership(&self, id: MembershipId) -> Result<(), StoreError>;

    // --- care records ---
    fn insert_record(&self, record: CareRecord) -> Result<(), StoreError>;
    fn record(&self, id: RecordId) -> Result<CareRecord, StoreError>;
    fn records(&self) -> Result<Vec<CareRecord>, StoreError>;
    fn records_for_member(&self, member_id: MemberId) -> Result<Vec<CareRecord>, StoreError>;
    fn records_for_membership(
        &self,
        membership_id: MembershipId,
    ) -> Result<Vec<CareRecord>, StoreError>;
    fn update_record(&self, record: CareRecord) -> Result<(), StoreError>;
    fn delete_record(&self, id: RecordId) -> Result<(), StoreError>;

    // --- reservations ---
    fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;
    fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError>;
    fn reservations(&self) -> Result<Vec<Reservation>, StoreError>;
    fn reservations_for_member(&self, member_id: MemberId)
    -> Result<Vec<Reservation>, StoreError>;
    fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>, StoreError>;
    fn update_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;
    fn delete_reservation(&self, id: ReservationId) -> Result<(), StoreError>;

    // --- notifications ---
    /// Hands out the next notification id; hosted backends map this onto a
    /// sequence, [`MemoryStore`] onto an atomic counter.
    fn allocate_notification_id(&self) -> Result<NotificationId, StoreError>;
    fn insert_notification(&self, notification: Notification) -> Result<(), StoreError>;
    fn notifications(&self) -> Result<Vec<Notification>, StoreError>;
    fn notifications_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<Notification>, StoreError>;
    fn mark_notification_read(&self, id: NotificationId) -> Result<(), StoreError>;
    fn delete_notification(&self, id: NotificationId) -> Result<(), StoreError>;
}

/// Full dump of all five tables.
///
/// The backup job writes this shape and the CLI loads it back; round-tripping
/// through [`Snapshot`] is the supported way to run the sweeps offline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub members: Vec<Member>,
    pub memberships: Vec<Membership>,
    pub care_records: Vec<CareRecord>,
    pub reservations: Vec<Reservation>,
    pub notifications: Vec<Notification>,
}

/// In-memory ledger store over concurrent maps.
///
/// Per-table [`DashMap`]s give the same guarantee the hosted store does:
/// single-row atomicity, nothing across rows or tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    members: DashMap<MemberId, Member>,
    memberships: DashMap<MembershipId, Membership>,
    care_records: DashMap<RecordId, CareRecord>,
    reservations: DashMap<ReservationId, Reservation>,
    notifications: DashMap<NotificationId, Notification>,
    notification_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a snapshot dump.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        let mut max_notification = 0;
        for m in snapshot.members {
            store.members.insert(m.id, m);
        }
        for m in snapshot.memberships {
            store.memberships.insert(m.id, m);
        }
        for r in snapshot.care_records {
            store.care_records.insert(r.id, r);
        }
        for r in snapshot.reservations {
            store.reservations.insert(r.id, r);
        }
        for n in snapshot.notifications {
            max_notification = max_notification.max(n.id.0);
            store.notifications.insert(n.id, n);
        }
        store
            .notification_seq
            .store(max_notification, Ordering::Relaxed);
        store
    }

    /// Parses a JSON snapshot, failing loudly on any unexpected shape.
    pub fn from_snapshot_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Dumps all tables, sorted by id for stable output.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            members: self.members.iter().map(|r| r.value().clone()).collect(),
            memberships: self.memberships.iter().map(|r| r.value().clone()).collect(),
            care_records: self
                .care_records
                .iter()
                .map(|r| r.value().clone())
                .collect(),
            reservations: self
                .reservations
                .iter()
                .map(|r| r.value().clone())
                .collect(),
            notifications: self
                .notifications
                .iter()
                .map(|r| r.value().clone())
                .collect(),
        };
        snapshot.members.sort_by_key(|m| m.id.0);
        snapshot.memberships.sort_by_key(|m| m.id.0);
        snapshot.care_records.sort_by_key(|r| r.id.0);
        snapshot.reservations.sort_by_key(|r| r.id.0);
        snapshot.notifications.sort_by_key(|n| n.id.0);
        snapshot
    }
}

impl LedgerStore for MemoryStore {
    fn insert_member(&self, member: Member) -> Result<(), StoreError> {
        self.members.insert(member.id, member);
        Ok(())
    }

    fn member(&self, id: MemberId) -> Result<Member, StoreError> {
        self.members
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::RowNotFound)
    }

    fn members(&self) -> Result<Vec<Member>, StoreError> {
        Ok(self.members.iter().map(|r| r.value().clone()).collect())
    }

    fn delete_member(&self, id: MemberId) -> Result<(), StoreError> {
        self.members
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::RowNotFound)
    }

    fn insert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        self.memberships.insert(membership.id, membership);
        Ok(())
    }

    fn membership(&self, id: MembershipId) -> Result<Membership, StoreError> {
        self.memberships
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::RowNotFound)
    }

    fn memberships(&self) -> Result<Vec<Membership>, StoreError> {
        Ok(self.memberships.iter().map(|r| r.value().clone()).collect())
    }

    fn memberships_for_member(&self, member_id: MemberId) -> Result<Vec<Membership>, StoreError> {
        Ok(self
            .memberships
            .iter()
            .filter(|r| r.value().member_id == member_id)
            .map(|r| r.value().clone())
            .collect())
    }

    fn update_membership(&self, membership: Membership) -> Result<(), StoreError> {
        match self.memberships.get_mut(&membership.id) {
            Some(mut row) => {
                *row = membership;
                Ok(())
            }
            None => Err(StoreError::RowNotFound),
        }
    }

    fn delete_membership(&self, id: MembershipId) -> Result<(), StoreError> {
        self.memberships
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::RowNotFound)
    }

    fn insert_record(&self, record: CareRecord) -> Result<(), StoreError> {
        self.care_records.insert(record.id, record);
        Ok(())
    }

    fn record(&self, id: RecordId) -> Result<CareRecord, StoreError> {
        self.care_records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::RowNotFound)
    }

    fn records(&self) -> Result<Vec<CareRecord>, StoreError> {
        Ok(self
            .care_records
            .iter()
            .map(|r| r.value().clone())
            .collect())
    }

    fn records_for_member(&self, member_id: MemberId) -> Result<Vec<CareRecord>, StoreError> {
        Ok(self
            .care_records
            .iter()
            .filter(|r| r.value().member_id == member_id)
            .map(|r| r.value().clone())
            .collect())
    }

    fn records_for_membership(
        &self,
        membership_id: MembershipId,
    ) -> Result<Vec<CareRecord>, StoreError> {
        Ok(self
            .care_records
            .iter()
            .filter(|r| r.value().membership_id == membership_id)
            .map(|r| r.value().clone())
            .collect())
    }

    fn update_record(&self, record: CareRecord) -> Result<(), StoreError> {
        match self.care_records.get_mut(&record.id) {
            Some(mut row) => {
                *row = record;
                Ok(())
            }
            None => Err(StoreError::RowNotFound),
        }
    }

    fn delete_record(&self, id: RecordId) -> Result<(), StoreError> {
        self.care_records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::RowNotFound)
    }

    fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError> {
        self.reservations
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::RowNotFound)
    }

    fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        Ok(self
            .reservations
            .iter()
            .map(|r| r.value().clone())
            .collect())
    }

    fn reservations_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<Reservation>, StoreError> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| r.value().member_id == member_id)
            .map(|r| r.value().clone())
            .collect())
    }

    fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>, StoreError> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| r.value().date == date)
            .map(|r| r.value().clone())
            .collect())
    }

    fn update_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        match self.reservations.get_mut(&reservation.id) {
            Some(mut row) => {
                *row = reservation;
                Ok(())
            }
            None => Err(StoreError::RowNotFound),
        }
    }

    fn delete_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
        self.reservations
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::RowNotFound)
    }

    fn allocate_notification_id(&self) -> Result<NotificationId, StoreError> {
        Ok(NotificationId(
            self.notification_seq.fetch_add(1, Ordering::Relaxed) + 1,
        ))
    }

    fn insert_notification(&self, notification: Notification) -> Result<(), StoreError> {
        self.notifications.insert(notification.id, notification);
        Ok(())
    }

    fn notifications(&self) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .notifications
            .iter()
            .map(|r| r.value().clone())
            .collect())
    }

    fn notifications_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .notifications
            .iter()
            .filter(|r| r.value().member_id == member_id)
            .map(|r| r.value().clone())
            .collect())
    }

    fn mark_notification_read(&self, id: NotificationId) -> Result<(), StoreError> {
        match self.notifications.get_mut(&id) {
            Some(mut row) => {
                row.is_read = true;
                Ok(())
            }
            None => Err(StoreError::RowNotFound),
        }
    }

    fn delete_notification(&self, id: NotificationId) -> Result<(), StoreError> {
        self.notifications
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::RowNotFound)
    }
}
