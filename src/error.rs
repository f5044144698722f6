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

//! Error types for charging, store access, and outbound messaging.

use thiserror::Error;

/// Charge processing errors.
///
/// Interactive flows fail fast on these; none of them leave a partial
/// financial write behind except [`ChargeError::Store`], whose gap the
/// reconciliation sweep closes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChargeError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Charge would exceed the membership's remaining balance
    #[error("insufficient remaining balance")]
    InsufficientBalance,

    /// Referenced member does not exist
    #[error("member not found")]
    MemberNotFound,

    /// Referenced membership does not exist
    #[error("membership not found")]
    MembershipNotFound,

    /// Membership belongs to a different member than the record claims
    #[error("membership does not belong to this member")]
    MembershipMismatch,

    /// Referenced care record does not exist
    #[error("care record not found")]
    RecordNotFound,

    /// Care record was already completed (charged) once
    #[error("care record already completed")]
    AlreadyCompleted,

    /// Referenced reservation does not exist
    #[error("reservation not found")]
    ReservationNotFound,

    /// Reservation was already completed or cancelled
    #[error("reservation is no longer open")]
    ReservationClosed,

    /// Underlying store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Ledger store access errors.
///
/// Every store call is fallible and bounded; a [`StoreError::Timeout`] from
/// one row must never abort a batch sweep.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Requested row does not exist
    #[error("row not found")]
    RowNotFound,

    /// Store call exceeded its deadline
    #[error("store call timed out")]
    Timeout,

    /// Persisted row had an unexpected shape
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Backend-specific failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Outbound message delivery errors.
///
/// The dispatch gate normalizes these into a [`SendOutcome`] so callers
/// never fail their primary operation over a notification.
///
/// [`SendOutcome`]: crate::gate::SendOutcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Network-level failure reaching the provider
    #[error("network error: {0}")]
    Network(String),

    /// Provider did not answer within the client timeout
    #[error("send timed out")]
    Timeout,

    /// Provider answered with a non-success code
    #[error("provider rejected send (code {code}): {message}")]
    Provider { code: i64, message: String },
}

#[cfg(test)]
mod tests {
    use super::{ChargeError, SendError, StoreError};

    #[test]
    fn charge_error_display_messages() {
        assert_eq!(
            ChargeError::InvalidAmount.to_string(),
            "invalid amount (must be positive)"
        );
        assert_eq!(
            ChargeError::InsufficientBalance.to_string(),
            "insufficient remaining balance"
        );
        assert_eq!(ChargeError::MemberNotFound.to_string(), "member not found");
        assert_eq!(
            ChargeError::MembershipNotFound.to_string(),
            "membership not found"
        );
        assert_eq!(
            ChargeError::MembershipMismatch.to_string(),
            "membership does not belong to this member"
        );
        assert_eq!(ChargeError::RecordNotFound.to_string(), "care record not found");
        assert_eq!(
            ChargeError::AlreadyCompleted.to_string(),
            "care record already completed"
        );
        assert_eq!(
            ChargeError::ReservationClosed.to_string(),
            "reservation is no longer open"
        );
    }

    #[test]
    fn store_error_wraps_into_charge_error() {
        let err: ChargeError = StoreError::Timeout.into();
        assert_eq!(err.to_string(), "store error: store call timed out");
    }

    #[test]
    fn send_error_display_messages() {
        assert_eq!(SendError::Timeout.to_string(), "send timed out");
        assert_eq!(
            SendError::Provider {
                code: -101,
                message: "invalid template".to_string()
            }
            .to_string(),
            "provider rejected send (code -101): invalid template"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = ChargeError::InsufficientBalance;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
