//! Payment orders
//!
//! An order is one track (employer refund or person) of a settlement as the
//! external ledger sees it: every line of its chain under one ledger id, with
//! the lines that changed since the previous order marked for sending.
//!
//! # Active days
//!
//! A termination marker on line `n` stops the chain's payments from its date
//! for every line with a sequence number up to `n`. Lines appended after it
//! pay again. `active_days` replays the lines in sequence order to get the
//! days the ledger currently pays for.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{CorrelationId, Currency, LedgerId, Money, Period, SettlementId};

use crate::events::{
    Acknowledgement, EventOutcome, OrderPayload, PreviewRequest, PreviewResult, Receipt,
    TransferConfirmation, TransferRequest,
};
use crate::line::{ChangeCode, DayPicture, PaymentLine};

/// Which party an order pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Refund to the employer that advanced the benefit
    EmployerRefund,
    /// Direct payment to the person
    Person,
}

/// Order lifecycle: Created -> (Previewed)? -> Transferred -> Settled | Rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Previewed,
    Transferred,
    Settled,
    Rejected,
}

impl OrderStatus {
    /// True once the ledger has given its final answer
    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Settled | OrderStatus::Rejected)
    }
}

/// Identifier of a payee: an organisation number or a person number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayeeId(String);

impl PayeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One track of a settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    payee: PayeeId,
    track: TrackKind,
    /// Absent until the track has had content
    ledger_id: Option<LedgerId>,
    change: ChangeCode,
    lines: Vec<PaymentLine>,
    currency: Currency,
    /// Gross total of the previous order in the chain
    previous_gross: Money,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    reconciliation_key: Option<String>,
    transferred_at: Option<DateTime<Utc>>,
    acknowledged_at: Option<DateTime<Utc>>,
    preview: Option<PreviewResult>,
    acknowledgements: Vec<Acknowledgement>,
}

impl PaymentOrder {
    pub(crate) fn new(
        track: TrackKind,
        payee: PayeeId,
        ledger_id: Option<LedgerId>,
        change: ChangeCode,
        lines: Vec<PaymentLine>,
        currency: Currency,
        previous_gross: Money,
    ) -> Self {
        Self {
            payee,
            track,
            ledger_id,
            change,
            lines,
            currency,
            previous_gross,
            created_at: Utc::now(),
            status: OrderStatus::Created,
            reconciliation_key: None,
            transferred_at: None,
            acknowledged_at: None,
            preview: None,
            acknowledgements: Vec::new(),
        }
    }

    /// An order for a track that has never had content
    pub(crate) fn empty(track: TrackKind, payee: PayeeId, currency: Currency) -> Self {
        Self::new(
            track,
            payee,
            None,
            ChangeCode::Unchanged,
            Vec::new(),
            currency,
            Money::zero(currency),
        )
    }

    pub fn payee(&self) -> &PayeeId {
        &self.payee
    }

    pub fn track(&self) -> TrackKind {
        self.track
    }

    pub fn ledger_id(&self) -> Option<LedgerId> {
        self.ledger_id
    }

    pub fn change(&self) -> ChangeCode {
        self.change
    }

    pub fn lines(&self) -> &[PaymentLine] {
        &self.lines
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn reconciliation_key(&self) -> Option<&str> {
        self.reconciliation_key.as_deref()
    }

    pub fn transferred_at(&self) -> Option<DateTime<Utc>> {
        self.transferred_at
    }

    pub fn acknowledged_at(&self) -> Option<DateTime<Utc>> {
        self.acknowledged_at
    }

    pub fn preview(&self) -> Option<&PreviewResult> {
        self.preview.as_ref()
    }

    /// Every acknowledgement received, in arrival order
    pub fn acknowledgements(&self) -> &[Acknowledgement] {
        &self.acknowledgements
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when at least one line must be sent to the ledger
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(PaymentLine::is_changed)
    }

    /// Lines included in outbound requests
    pub fn changed_lines(&self) -> impl Iterator<Item = &PaymentLine> {
        self.lines.iter().filter(|l| l.is_changed())
    }

    /// Highest sequence number in the chain, zero without lines
    pub fn highest_sequence(&self) -> u32 {
        self.lines.iter().map(PaymentLine::sequence).max().unwrap_or(0)
    }

    /// Days the ledger pays for once this order is applied
    pub fn active_days(&self) -> DayPicture {
        let mut lines: Vec<&PaymentLine> = self.lines.iter().collect();
        lines.sort_by_key(|l| l.sequence());

        let mut days = DayPicture::new();
        for line in lines {
            for date in line.paid_dates() {
                days.insert(date, *line.rate());
            }
            if let Some(termination) = line.termination() {
                days.split_off(&termination.effective_from);
            }
        }
        days
    }

    /// First to last active day
    pub fn active_period(&self) -> Option<Period> {
        let days = self.active_days();
        let first = *days.keys().next()?;
        let last = *days.keys().next_back()?;
        Some(Period { start: first, end: last })
    }

    /// Sum of active line amounts
    ///
    /// Every line of an order carries the order's currency.
    pub fn gross(&self) -> Money {
        self.active_days()
            .values()
            .fold(Money::zero(self.currency), |total, rate| total + rate.daily_amount)
    }

    /// Change in money flow versus the previous order in the chain
    pub fn net(&self) -> Money {
        self.gross() - self.previous_gross
    }

    /// Calendar days between `date` and the active span; `None` for an order
    /// without active days
    pub fn distance_to(&self, date: NaiveDate) -> Option<i64> {
        self.active_period().map(|period| period.distance_to(date))
    }

    /// True when `date` lies within the active span or no more than
    /// `threshold_days` before or after it. An order without active days is
    /// never near.
    pub fn is_near(&self, date: NaiveDate, threshold_days: i64) -> bool {
        self.distance_to(date)
            .is_some_and(|distance| distance <= threshold_days)
    }

    /// True when this order is the one a ledger message for `ledger_id` and
    /// `track` addresses
    pub fn is_relevant(&self, ledger_id: LedgerId, track: TrackKind) -> bool {
        self.ledger_id == Some(ledger_id) && self.track == track
    }

    /// Transferred to the ledger but not yet acknowledged
    pub fn is_in_flight(&self) -> bool {
        self.has_changes() && self.status == OrderStatus::Transferred
    }

    /// Status as it counts for the settlement; `None` when nothing is sent
    pub fn pending_status(&self) -> Option<OrderStatus> {
        self.has_changes().then_some(self.status)
    }

    fn payload(
        &self,
        settlement_id: SettlementId,
        correlation_id: CorrelationId,
    ) -> Option<OrderPayload> {
        if !self.has_changes() {
            return None;
        }
        let ledger_id = self.ledger_id?;
        Some(OrderPayload {
            settlement_id,
            correlation_id,
            ledger_id,
            payee: self.payee.clone(),
            track: self.track,
            change: self.change,
            lines: self.changed_lines().cloned().collect(),
            gross: self.gross(),
            net: self.net(),
        })
    }

    /// Dry-run request; `None` when the order has nothing to send
    pub fn preview_request(
        &self,
        settlement_id: SettlementId,
        correlation_id: CorrelationId,
        as_of: DateTime<Utc>,
        actor: &str,
    ) -> Option<PreviewRequest> {
        self.payload(settlement_id, correlation_id)
            .map(|order| PreviewRequest {
                order,
                as_of,
                actor: actor.to_string(),
            })
    }

    /// Transfer request; `None` when the order has nothing to send
    pub fn transfer_request(
        &self,
        settlement_id: SettlementId,
        correlation_id: CorrelationId,
        as_of: DateTime<Utc>,
        actor: &str,
    ) -> Option<TransferRequest> {
        self.payload(settlement_id, correlation_id)
            .map(|order| TransferRequest {
                order,
                as_of,
                actor: actor.to_string(),
            })
    }

    /// Stores a dry-run result addressed to this order
    pub fn record_preview(&mut self, result: &PreviewResult) -> EventOutcome {
        if !self.has_changes() || !self.is_relevant(result.ledger_id, result.track) {
            return EventOutcome::Ignored;
        }
        let ack = Acknowledgement::Preview(result.clone());
        if self.acknowledgements.contains(&ack) {
            return EventOutcome::Duplicate;
        }

        self.preview = Some(result.clone());
        if self.status == OrderStatus::Created {
            self.status = OrderStatus::Previewed;
        }
        self.acknowledgements.push(ack);
        EventOutcome::Applied
    }

    /// Applies a transfer confirmation addressed to this order's ledger id
    pub fn record_transferred(&mut self, confirmation: &TransferConfirmation) -> EventOutcome {
        if !self.has_changes() || self.ledger_id != Some(confirmation.ledger_id) {
            return EventOutcome::Ignored;
        }
        let ack = Acknowledgement::Transferred(confirmation.clone());
        if self.acknowledgements.contains(&ack) {
            return EventOutcome::Duplicate;
        }

        if self.reconciliation_key.is_none() {
            self.reconciliation_key = Some(confirmation.reconciliation_key.clone());
        }
        if self.transferred_at.is_none() {
            self.transferred_at = Some(confirmation.timestamp);
        }
        if matches!(self.status, OrderStatus::Created | OrderStatus::Previewed) {
            self.status = OrderStatus::Transferred;
        }
        self.acknowledgements.push(ack);
        EventOutcome::Applied
    }

    /// Applies a receipt addressed to this order's ledger id
    ///
    /// The first receipt decides the final status; later receipts are kept
    /// in the history only.
    pub fn record_receipt(&mut self, receipt: &Receipt) -> EventOutcome {
        if !self.has_changes() || self.ledger_id != Some(receipt.ledger_id) {
            return EventOutcome::Ignored;
        }
        let ack = Acknowledgement::Receipt(receipt.clone());
        if self.acknowledgements.contains(&ack) {
            return EventOutcome::Duplicate;
        }

        if self.reconciliation_key.is_none() {
            self.reconciliation_key = Some(receipt.reconciliation_key.clone());
        }
        if !self.status.is_final() {
            self.status = receipt.status.order_status();
            self.acknowledged_at = Some(receipt.timestamp);
        }
        self.acknowledgements.push(ack);
        EventOutcome::Applied
    }
}
