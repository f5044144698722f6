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

//! Member records.
//!
//! A member is the aggregate root: deleting one cascades to its memberships,
//! care records, reservations, and notifications. Rows that survive a partial
//! cascade are orphans and belong to the cleanup sweep.

use crate::base::MemberId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A registered member of the center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    /// Recipient number for AlimTalk/SMS dispatch.
    pub phone: String,
    /// Discount applied when a charge does not specify its own rate.
    pub default_discount_rate: Decimal,
    /// Device token for push delivery, if the member installed the app.
    pub push_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn new(id: MemberId, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            phone: phone.into(),
            default_discount_rate: Decimal::ZERO,
            push_token: None,
            created_at: Utc::now(),
        }
    }
}
