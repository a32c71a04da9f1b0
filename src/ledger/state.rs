//! Transfer Status Axes
//!
//! Two independent status axes per transaction record: the transfer lifecycle
//! (sender side + settlement) and the credit lifecycle (receiver side).
//! Transitions are validated explicitly; illegal transitions are rejected,
//! never silently applied.
//!
//! Status IDs are designed for storage as SMALLINT.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer lifecycle over a single transaction id.
///
/// ```text
/// PENDING →(freeze ok) FROZEN →(confirm) SUCCESS
///     ↓                   ↓
///  CANCELLED          CANCELLED   (compensating path)
/// ```
///
/// Terminal states: SUCCESS (20), FAILED (-10), CANCELLED (-20)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransferStatus {
    /// Intent recorded, no balance touched yet
    Pending = 0,

    /// Sender funds reserved (frozen_balance raised, balance untouched)
    Frozen = 10,

    /// Terminal: settled, funds moved
    Success = 20,

    /// Terminal: rejected before any mutation
    Failed = -10,

    /// Terminal: compensated
    Cancelled = -20,
}

impl TransferStatus {
    /// Terminal states admit no further transitions; mutations on terminal
    /// records are no-ops.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Success | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }

    /// Whether a transition to `next` is legal.
    ///
    /// Monotonic except for the compensating path into CANCELLED.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Frozen)
                | (TransferStatus::Pending, TransferStatus::Failed)
                | (TransferStatus::Pending, TransferStatus::Cancelled)
                | (TransferStatus::Frozen, TransferStatus::Success)
                | (TransferStatus::Frozen, TransferStatus::Cancelled)
        )
    }

    /// Numeric ID for SMALLINT storage.
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferStatus::Pending),
            10 => Some(TransferStatus::Frozen),
            20 => Some(TransferStatus::Success),
            -10 => Some(TransferStatus::Failed),
            -20 => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Frozen => "FROZEN",
            TransferStatus::Success => "SUCCESS",
            TransferStatus::Failed => "FAILED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receiver-side credit lifecycle, independent of [`TransferStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum CreditStatus {
    /// Receiver not yet credited
    Pending = 0,

    /// unreleased_balance raised on the receiver
    Success = 10,

    /// Credit attempt failed
    Failed = -10,
}

impl CreditStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CreditStatus::Success | CreditStatus::Failed)
    }

    pub fn can_transition_to(&self, next: CreditStatus) -> bool {
        matches!(
            (self, next),
            (CreditStatus::Pending, CreditStatus::Success)
                | (CreditStatus::Pending, CreditStatus::Failed)
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(CreditStatus::Pending),
            10 => Some(CreditStatus::Success),
            -10 => Some(CreditStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::Pending => "PENDING",
            CreditStatus::Success => "SUCCESS",
            CreditStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
