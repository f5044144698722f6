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

//! Pure balance arithmetic.
//!
//! Everything financial in this crate reduces to one rule: a membership's
//! used amount is the sum of `final_price` over its completed care records,
//! and its remaining amount is `total - used`. This module is the single
//! place that rule lives; the write path, the reconciliation sweep, and the
//! read-side aggregator all call into it rather than re-deriving sums.
//!
//! The calculator reports, it does not guard: a negative remaining balance
//! comes back as-is. Rejecting overdrafts is the charge engine's job, and
//! detecting drifted snapshots is the reconciler's.

use crate::record::CareRecord;
use rust_decimal::Decimal;

/// Result of recomputing a membership's balance from its ledger rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputedBalance {
    pub used: Decimal,
    pub remaining: Decimal,
}

/// Recomputes `(used, remaining)` from the full set of a membership's
/// care records.
///
/// Only records with a completed signature count; pending rows are reserved
/// intent, not usage. An empty slice yields `(0, total)`.
pub fn compute_balance(total: Decimal, records: &[CareRecord]) -> ComputedBalance {
    let used: Decimal = records
        .iter()
        .filter(|r| r.is_completed())
        .map(|r| r.final_price)
        .sum();

    ComputedBalance {
        used,
        remaining: total - used,
    }
}

/// Applies a percentage discount and rounds to whole currency units.
///
/// Shared by the charge path and tests so both sides agree on one rounding
/// rule (banker's rounding via [`Decimal::round_dp`]).
pub fn final_price(original: Decimal, discount_rate: Decimal) -> Decimal {
    let hundred = Decimal::from(100);
    (original * (hundred - discount_rate) / hundred).round_dp(0)
}
