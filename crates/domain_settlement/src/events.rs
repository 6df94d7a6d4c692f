//! Ledger messages and domain events
//!
//! Three acknowledgement shapes arrive from the external ledger integration
//! (preview result, transfer confirmation, receipt) and two request shapes go
//! out to it (preview request, transfer request). `SettlementEvent` records
//! what happened to a settlement, for audit trails and downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CorrelationId, LedgerId, Money, Period, SettlementId};

use crate::line::{ChangeCode, PaymentLine};
use crate::order::{OrderStatus, PayeeId, TrackKind};
use crate::settlement::{SettlementKind, SettlementStatus};

/// Result of applying a ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOutcome {
    /// The event changed state
    Applied,
    /// The same event was applied before; nothing changed
    Duplicate,
    /// The event does not belong here; nothing changed
    Ignored,
}

impl EventOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EventOutcome::Applied)
    }

    /// Combines the outcomes of offering one event to several orders
    pub fn or(self, other: EventOutcome) -> EventOutcome {
        match (self, other) {
            (EventOutcome::Applied, _) | (_, EventOutcome::Applied) => EventOutcome::Applied,
            (EventOutcome::Duplicate, _) | (_, EventOutcome::Duplicate) => EventOutcome::Duplicate,
            _ => EventOutcome::Ignored,
        }
    }
}

/// One period of a dry-run breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewPeriod {
    pub period: Period,
    pub amount: Money,
}

/// Dry-run answer from the ledger for one order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub settlement_id: SettlementId,
    pub ledger_id: LedgerId,
    pub track: TrackKind,
    pub total: Money,
    pub periods: Vec<PreviewPeriod>,
}

/// The ledger has taken an order into processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfirmation {
    pub settlement_id: SettlementId,
    pub ledger_id: LedgerId,
    pub reconciliation_key: String,
    pub timestamp: DateTime<Utc>,
}

/// Final verdict of the ledger on an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Accepted,
    AcceptedWithWarning,
    Rejected,
}

impl ReceiptStatus {
    pub fn order_status(&self) -> OrderStatus {
        match self {
            ReceiptStatus::Accepted | ReceiptStatus::AcceptedWithWarning => OrderStatus::Settled,
            ReceiptStatus::Rejected => OrderStatus::Rejected,
        }
    }
}

/// Receipt (final acknowledgement) from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub settlement_id: SettlementId,
    pub ledger_id: LedgerId,
    pub status: ReceiptStatus,
    pub reconciliation_key: String,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
}

/// An acknowledgement as kept in an order's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acknowledgement {
    Preview(PreviewResult),
    Transferred(TransferConfirmation),
    Receipt(Receipt),
}

/// Order content as sent to the ledger
///
/// Only lines that changed relative to the previous order are included;
/// unchanged lines are already known to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub settlement_id: SettlementId,
    pub correlation_id: CorrelationId,
    pub ledger_id: LedgerId,
    pub payee: PayeeId,
    pub track: TrackKind,
    pub change: ChangeCode,
    pub lines: Vec<PaymentLine>,
    pub gross: Money,
    pub net: Money,
}

/// Request for a dry run of one order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub order: OrderPayload,
    pub as_of: DateTime<Utc>,
    pub actor: String,
}

/// Request to transfer one order to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub order: OrderPayload,
    pub as_of: DateTime<Utc>,
    pub actor: String,
}

/// Domain events emitted by the Settlement aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettlementEvent {
    /// A settlement was computed
    SettlementCreated {
        settlement_id: SettlementId,
        correlation_id: CorrelationId,
        kind: SettlementKind,
        timestamp: DateTime<Utc>,
    },

    /// Approval was recorded
    SettlementApproved {
        settlement_id: SettlementId,
        approver: String,
        automatic: bool,
        timestamp: DateTime<Utc>,
    },

    /// The aggregate status moved
    StatusChanged {
        settlement_id: SettlementId,
        from: SettlementStatus,
        to: SettlementStatus,
        timestamp: DateTime<Utc>,
    },

    /// One order's status moved
    OrderStatusChanged {
        settlement_id: SettlementId,
        ledger_id: LedgerId,
        track: TrackKind,
        from: OrderStatus,
        to: OrderStatus,
        timestamp: DateTime<Utc>,
    },

    /// A cancellation superseded this settlement
    SettlementSuperseded {
        settlement_id: SettlementId,
        superseded_by: SettlementId,
        timestamp: DateTime<Utc>,
    },
}
