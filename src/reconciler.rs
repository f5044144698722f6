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

//! Reconciliation sweeps: audit-and-heal and orphan cleanup.
//!
//! The charge path's two writes are not atomic, so a partial failure can
//! leave a membership snapshot disagreeing with its ledger rows. The
//! [`Reconciler`] is the compensating mechanism: a full-table sweep that
//! recomputes every snapshot from the ledger and overwrites the ones that
//! drifted. It is idempotent — with no intervening writes, a second run
//! heals nothing.
//!
//! Each membership's read-recompute-write touches only that membership's
//! rows, so audits are independent and run on a bounded worker pool. One
//! bad row (missing, corrupt, timed out) is logged, counted, and skipped;
//! the sweep never aborts over it.

use crate::base::MemberId;
use crate::calculator::compute_balance;
use crate::error::StoreError;
use crate::membership::Membership;
use crate::store::LedgerStore;
use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Default number of sweep workers.
const DEFAULT_WORKERS: usize = 4;

/// Outcome of one audit-and-heal sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Memberships examined.
    pub audited: usize,
    /// Snapshots overwritten because they disagreed with the ledger.
    pub healed: usize,
    /// Rows skipped on store failure; nonzero means operators should look.
    pub errors: usize,
}

/// Outcome of one orphan-cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub memberships_removed: usize,
    pub records_removed: usize,
    pub reservations_removed: usize,
    pub notifications_removed: usize,
    pub errors: usize,
}

impl CleanupReport {
    pub fn total_removed(&self) -> usize {
        self.memberships_removed
            + self.records_removed
            + self.reservations_removed
            + self.notifications_removed
    }
}

/// Batch reconciliation over a ledger store.
pub struct Reconciler<S: LedgerStore> {
    store: Arc<S>,
    workers: usize,
}

impl<S: LedgerStore> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Caps the sweep's worker pool. Zero is clamped to one.
    pub fn with_workers(store: Arc<S>, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
        }
    }

    /// Sweeps every membership, healing snapshots that drifted from their
    /// ledger-derived values.
    ///
    /// Failure to list the table at all is the only whole-sweep error and
    /// reports as a single error with nothing audited.
    pub fn audit_and_heal(&self) -> AuditReport {
        let memberships = match self.store.memberships() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "audit sweep could not list memberships");
                return AuditReport {
                    audited: 0,
                    healed: 0,
                    errors: 1,
                };
            }
        };

        let total = memberships.len();
        let queue: SegQueue<Membership> = SegQueue::new();
        for membership in memberships {
            queue.push(membership);
        }

        let audited = AtomicUsize::new(0);
        let healed = AtomicUsize::new(0);
        let errors = AtomicUsize::new(0);

        let workers = self.workers.min(total.max(1));
        crossbeam::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    while let Some(membership) = queue.pop() {
                        match self.audit_one(membership) {
                            Ok(was_healed) => {
                                audited.fetch_add(1, Ordering::Relaxed);
                                if was_healed {
                                    healed.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Err(e) => {
                                errors.fetch_add(1, Ordering::Relaxed);
                                warn!(error = %e, "membership audit skipped");
                            }
                        }
                    }
                });
            }
        })
        .expect("sweep worker panicked");

        let report = AuditReport {
            audited: audited.into_inner(),
            healed: healed.into_inner(),
            errors: errors.into_inner(),
        };
        info!(
            audited = report.audited,
            healed = report.healed,
            errors = report.errors,
            "audit-and-heal sweep finished"
        );
        report
    }

    /// Recomputes one membership; overwrites the snapshot on mismatch.
    fn audit_one(&self, mut membership: Membership) -> Result<bool, StoreError> {
        let records = self.store.records_for_membership(membership.id)?;
        let computed = compute_balance(membership.total_amount, &records);

        if membership.used_amount == computed.used
            && membership.remaining_amount == computed.remaining
        {
            return Ok(false);
        }

        info!(
            membership = %membership.id,
            stored_used = %membership.used_amount,
            computed_used = %computed.used,
            "healing drifted snapshot"
        );
        membership.set_balance(computed.used, computed.remaining);
        self.store.update_membership(membership)?;
        Ok(true)
    }

    /// Deletes rows whose member no longer exists.
    ///
    /// Orphans have no parent to repair against, so removal is the only
    /// recovery. Row-level failures are counted and skipped like the audit
    /// sweep's.
    pub fn purge_orphans(&self) -> CleanupReport {
        let live: HashSet<MemberId> = match self.store.members() {
            Ok(members) => members.into_iter().map(|m| m.id).collect(),
            Err(e) => {
                warn!(error = %e, "cleanup sweep could not list members");
                return CleanupReport {
                    errors: 1,
                    ..CleanupReport::default()
                };
            }
        };

        let mut report = CleanupReport::default();

        match self.store.memberships() {
            Ok(rows) => {
                for row in rows.into_iter().filter(|r| !live.contains(&r.member_id)) {
                    match self.store.delete_membership(row.id) {
                        Ok(()) => report.memberships_removed += 1,
                        Err(e) => {
                            report.errors += 1;
                            warn!(membership = %row.id, error = %e, "orphan delete skipped");
                        }
                    }
                }
            }
            Err(e) => {
                report.errors += 1;
                warn!(error = %e, "cleanup sweep could not list memberships");
            }
        }

        match self.store.records() {
            Ok(rows) => {
                for row in rows.into_iter().filter(|r| !live.contains(&r.member_id)) {
                    match self.store.delete_record(row.id) {
                        Ok(()) => report.records_removed += 1,
                        Err(e) => {
                            report.errors += 1;
                            warn!(record = %row.id, error = %e, "orphan delete skipped");
                        }
                    }
                }
            }
            Err(e) => {
                report.errors += 1;
                warn!(error = %e, "cleanup sweep could not list care records");
            }
        }

        match self.store.reservations() {
            Ok(rows) => {
                for row in rows.into_iter().filter(|r| !live.contains(&r.member_id)) {
                    match self.store.delete_reservation(row.id) {
                        Ok(()) => report.reservations_removed += 1,
                        Err(e) => {
                            report.errors += 1;
                            warn!(reservation = %row.id, error = %e, "orphan delete skipped");
                        }
                    }
                }
            }
            Err(e) => {
                report.errors += 1;
                warn!(error = %e, "cleanup sweep could not list reservations");
            }
        }

        match self.store.notifications() {
            Ok(rows) => {
                for row in rows.into_iter().filter(|r| !live.contains(&r.member_id)) {
                    match self.store.delete_notification(row.id) {
                        Ok(()) => report.notifications_removed += 1,
                        Err(e) => {
                            report.errors += 1;
                            warn!(notification = %row.id, error = %e, "orphan delete skipped");
                        }
                    }
                }
            }
            Err(e) => {
                report.errors += 1;
                warn!(error = %e, "cleanup sweep could not list notifications");
            }
        }

        info!(
            removed = report.total_removed(),
            errors = report.errors,
            "orphan cleanup finished"
        );
        report
    }
}
