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

//! Membership balance pools.
//!
//! A membership is a prepaid pool: `total_amount` is fixed at grant time
//! (raised only by a top-up), `used_amount` and `remaining_amount` are
//! derived and must always satisfy `total == used + remaining` after any
//! completed write. The reconciliation sweep restores that invariant when
//! a partial write leaves the snapshot drifted.
//!
//! # Example
//!
//! ```
//! use care_ledger_rs::{Membership, MembershipId, MemberId};
//! use rust_decimal_macros::dec;
//!
//! let pool = Membership::new(
//!     MembershipId(1),
//!     MemberId(1),
//!     "10-session body care",
//!     dec!(3_000_000),
//! );
//! assert_eq!(pool.remaining_amount, dec!(3_000_000));
//! ```

use crate::base::{MemberId, MembershipId};
use crate::error::ChargeError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Advisory lifecycle state of a membership.
///
/// The balance calculator ignores status entirely; it exists so list views
/// and the reminder jobs can filter without recomputing dates and sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Expired,
    Exhausted,
}

/// How a charge that exceeds the remaining balance is treated.
///
/// The default is a hard reject before any write. Centers that bill arrears
/// can opt into negative balances; the drifted/negative state stays fully
/// visible to the reconciliation sweep either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverdraftPolicy {
    #[default]
    Reject,
    AllowNegative,
}

/// A prepaid balance pool owned by one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub member_id: MemberId,
    pub product_name: String,
    /// Immutable after creation except via [`Membership::top_up`].
    pub total_amount: Decimal,
    pub used_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: MembershipStatus,
    /// Default discount applied to charges against this pool.
    pub discount_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub expiry_date: Option<NaiveDate>,
}

impl Membership {
    /// Creates a fresh pool: nothing used, everything remaining.
    pub fn new(
        id: MembershipId,
        member_id: MemberId,
        product_name: impl Into<String>,
        total_amount: Decimal,
    ) -> Self {
        Self {
            id,
            member_id,
            product_name: product_name.into(),
            total_amount,
            used_amount: Decimal::ZERO,
            remaining_amount: total_amount,
            status: MembershipStatus::Active,
            discount_rate: Decimal::ZERO,
            created_at: Utc::now(),
            expiry_date: None,
        }
    }

    pub fn with_discount_rate(mut self, rate: Decimal) -> Self {
        self.discount_rate = rate;
        self
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry_date = Some(expiry);
        self
    }

    fn assert_invariant(&self) {
        debug_assert_eq!(
            self.total_amount,
            self.used_amount + self.remaining_amount,
            "invariant violated: total {} != used {} + remaining {}",
            self.total_amount,
            self.used_amount,
            self.remaining_amount
        );
    }

    /// Debits the pool for a completed charge.
    ///
    /// # Errors
    ///
    /// - [`ChargeError::InvalidAmount`] - amount is zero or negative.
    /// - [`ChargeError::InsufficientBalance`] - amount exceeds the remaining
    ///   balance under [`OverdraftPolicy::Reject`].
    pub fn debit(&mut self, amount: Decimal, policy: OverdraftPolicy) -> Result<(), ChargeError> {
        if amount <= Decimal::ZERO {
            return Err(ChargeError::InvalidAmount);
        }
        if policy == OverdraftPolicy::Reject && self.remaining_amount < amount {
            return Err(ChargeError::InsufficientBalance);
        }
        self.used_amount += amount;
        self.remaining_amount -= amount;
        self.refresh_status(Utc::now().date_naive());
        self.assert_invariant();
        Ok(())
    }

    /// Raises the pool size, crediting the remaining balance.
    ///
    /// # Errors
    ///
    /// Returns [`ChargeError::InvalidAmount`] for a zero or negative top-up.
    pub fn top_up(&mut self, amount: Decimal) -> Result<(), ChargeError> {
        if amount <= Decimal::ZERO {
            return Err(ChargeError::InvalidAmount);
        }
        self.total_amount += amount;
        self.remaining_amount += amount;
        self.refresh_status(Utc::now().date_naive());
        self.assert_invariant();
        Ok(())
    }

    /// Overwrites both derived fields with recomputed values.
    ///
    /// Used by the reconciliation sweep; deliberately does not validate the
    /// inputs against the previous snapshot, which is exactly what may be
    /// wrong.
    pub fn set_balance(&mut self, used: Decimal, remaining: Decimal) {
        self.used_amount = used;
        self.remaining_amount = remaining;
        self.refresh_status(Utc::now().date_naive());
        self.assert_invariant();
    }

    /// Recomputes the advisory status from the balance and expiry date.
    ///
    /// Expiry wins over exhaustion when both apply.
    pub fn refresh_status(&mut self, today: NaiveDate) {
        self.status = if self.expiry_date.is_some_and(|d| d < today) {
            MembershipStatus::Expired
        } else if self.remaining_amount <= Decimal::ZERO {
            MembershipStatus::Exhausted
        } else {
            MembershipStatus::Active
        };
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}
