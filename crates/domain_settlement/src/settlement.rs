//! Settlement Aggregate Root
//!
//! A settlement pairs the employer-refund order and the person order computed
//! from one economic timeline. It is the consistency boundary for approval,
//! outbound requests and ledger acknowledgements.
//!
//! # Lifecycle
//!
//! ```text
//! Created -> Sent -> Transferred -> Settled
//!    |         \          \
//!    |          +----------+--> SettlementFailed   (an order was rejected)
//!    +--> ApprovedWithoutPayment                   (approved, nothing to pay)
//!    +--> Discarded                                (abandoned before sending)
//! ```
//!
//! # Invariants
//!
//! - Settlements in one chain share a correlation id; a cancellation ends it
//! - The aggregate status is derived from the order statuses by one total
//!   function and recomputed after every applied ledger event
//! - Ledger events are idempotent; events for other settlements are no-ops

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{BatchId, CoreError, CorrelationId, LedgerId, Money, Period, SettlementId};

use crate::config::EngineConfig;
use crate::diff;
use crate::error::SettlementError;
use crate::events::{
    EventOutcome, PreviewRequest, PreviewResult, Receipt, ReceiptStatus, SettlementEvent,
    TransferConfirmation, TransferRequest,
};
use crate::order::{OrderStatus, PayeeId, PaymentOrder, TrackKind};
use crate::timeline::EconomicTimeline;

/// Why a settlement was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementKind {
    /// Regular settlement of a benefit period
    Ordinary,
    /// Recalculation of an already settled period
    Revision,
    /// Termination of a whole chain
    Cancellation,
    /// Basic-rate adjustment after the yearly rate change
    YearEndSupplement,
}

/// Settlement lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementStatus {
    Created,
    Sent,
    Transferred,
    Settled,
    SettlementFailed,
    Discarded,
    ApprovedWithoutPayment,
}

impl SettlementStatus {
    /// Aggregate status from the statuses of the orders that have something
    /// to send
    ///
    /// Only a sent settlement follows its orders. Any rejection fails it;
    /// it is settled once every order is, and transferred once every order
    /// is at least transferred.
    pub fn derive(
        current: SettlementStatus,
        employer: Option<OrderStatus>,
        person: Option<OrderStatus>,
    ) -> SettlementStatus {
        match current {
            SettlementStatus::Created
            | SettlementStatus::Discarded
            | SettlementStatus::ApprovedWithoutPayment
            | SettlementStatus::SettlementFailed => current,
            SettlementStatus::Sent | SettlementStatus::Transferred | SettlementStatus::Settled => {
                let statuses: Vec<OrderStatus> = employer.into_iter().chain(person).collect();
                if statuses.is_empty() {
                    current
                } else if statuses.contains(&OrderStatus::Rejected) {
                    SettlementStatus::SettlementFailed
                } else if statuses.iter().all(|s| *s == OrderStatus::Settled) {
                    SettlementStatus::Settled
                } else if statuses
                    .iter()
                    .all(|s| matches!(s, OrderStatus::Transferred | OrderStatus::Settled))
                {
                    SettlementStatus::Transferred
                } else {
                    SettlementStatus::Sent
                }
            }
        }
    }

    /// Reached the end of the lifecycle without a failure
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            SettlementStatus::Settled | SettlementStatus::ApprovedWithoutPayment
        )
    }
}

/// An approval decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approver: String,
    pub automatic: bool,
    pub approved: bool,
    pub timestamp: DateTime<Utc>,
}

impl Approval {
    /// Decision taken by a case handler
    pub fn manual(approver: impl Into<String>, approved: bool) -> Self {
        Self {
            approver: approver.into(),
            automatic: false,
            approved,
            timestamp: Utc::now(),
        }
    }

    /// Positive decision taken by the system
    pub fn automatic(approver: impl Into<String>) -> Self {
        Self {
            approver: approver.into(),
            automatic: true,
            approved: true,
            timestamp: Utc::now(),
        }
    }
}

/// What happens right after a settlement is created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalPolicy {
    /// Wait for a case handler
    #[default]
    Manual,
    /// Approve on creation
    Automatic { approver: String },
}

/// Input to a settlement computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub person: PayeeId,
    pub employer: PayeeId,
    pub timeline: EconomicTimeline,
    /// Last date this computation decides on
    pub covered_through: NaiveDate,
    pub kind: SettlementKind,
    pub approval_policy: ApprovalPolicy,
    /// Economic-determination batch the timeline came from
    pub batch_id: Option<BatchId>,
}

impl SettlementRequest {
    pub fn new(
        person: PayeeId,
        employer: PayeeId,
        timeline: EconomicTimeline,
        covered_through: NaiveDate,
    ) -> Self {
        Self {
            person,
            employer,
            timeline,
            covered_through,
            kind: SettlementKind::Ordinary,
            approval_policy: ApprovalPolicy::Manual,
            batch_id: None,
        }
    }

    pub fn with_kind(mut self, kind: SettlementKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_approval_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.approval_policy = policy;
        self
    }

    pub fn with_batch_id(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }
}

/// The Settlement aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    id: SettlementId,
    correlation_id: CorrelationId,
    kind: SettlementKind,
    status: SettlementStatus,
    timeline: EconomicTimeline,
    period: Period,
    employer: PaymentOrder,
    person: PaymentOrder,
    approval: Option<Approval>,
    batch_id: Option<BatchId>,
    superseded_by: Option<SettlementId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    /// Uncommitted domain events
    #[serde(skip)]
    events: Vec<SettlementEvent>,
}

impl Settlement {
    /// Computes a settlement from a timeline
    ///
    /// `previous` is the settlement history of the person, oldest first, and
    /// may hold several chains. The new settlement continues the open chain
    /// whose orders are nearest to the timeline's first paid day when that
    /// distance is within the configured threshold; otherwise it starts a new
    /// chain.
    ///
    /// # Errors
    ///
    /// - `UnsupportedKind` for `SettlementKind::Cancellation`
    /// - `InvalidTimeline` when the timeline is structurally invalid
    #[instrument(skip_all, fields(kind = ?request.kind, covered_through = %request.covered_through))]
    pub fn create(
        previous: &[Settlement],
        request: SettlementRequest,
        config: &EngineConfig,
    ) -> Result<Self, SettlementError> {
        if request.kind == SettlementKind::Cancellation {
            return Err(SettlementError::UnsupportedKind(format!("{:?}", request.kind)));
        }
        request.timeline.validate(request.covered_through)?;

        let first_paid = request.timeline.first_paid_date(request.covered_through);
        let predecessor = diff::predecessor(previous, first_paid, config.near_threshold_days);
        Self::continuing(previous, predecessor, request, config)
    }

    /// Computes a settlement continuing `predecessor`, or a new chain
    pub(crate) fn continuing(
        previous: &[Settlement],
        predecessor: Option<&Settlement>,
        request: SettlementRequest,
        config: &EngineConfig,
    ) -> Result<Self, SettlementError> {
        let covered_through = request.covered_through;
        let start = request.timeline.first_date().unwrap_or(covered_through);
        let period = Period::new(start, covered_through).map_err(CoreError::from)?;
        let currency = predecessor
            .map(|p| p.employer.currency())
            .unwrap_or(config.currency);

        let employer = diff::next_order(
            predecessor.and_then(|p| diff::prior_order(previous, p, TrackKind::EmployerRefund)),
            TrackKind::EmployerRefund,
            request.employer,
            &request.timeline.picture(TrackKind::EmployerRefund, covered_through, currency),
            covered_through,
            currency,
        );
        let person = diff::next_order(
            predecessor.and_then(|p| diff::prior_order(previous, p, TrackKind::Person)),
            TrackKind::Person,
            request.person,
            &request.timeline.picture(TrackKind::Person, covered_through, currency),
            covered_through,
            currency,
        );

        let correlation_id = predecessor
            .map(Settlement::correlation_id)
            .unwrap_or_else(CorrelationId::new_v7);

        let mut settlement = Self::assemble(
            correlation_id,
            request.kind,
            request.timeline,
            period,
            employer,
            person,
            request.batch_id,
        );
        info!(
            settlement_id = %settlement.id,
            correlation_id = %settlement.correlation_id,
            continues = predecessor.is_some(),
            employer_net = %settlement.employer.net(),
            person_net = %settlement.person.net(),
            "settlement created"
        );
        settlement.apply_policy(request.approval_policy)?;
        Ok(settlement)
    }

    /// A cancellation terminating everything the chain of `latest` leaves
    /// active in the ledger
    pub(crate) fn cancelling(
        previous: &[Settlement],
        latest: &Settlement,
        batch_id: Option<BatchId>,
        policy: ApprovalPolicy,
    ) -> Result<Self, SettlementError> {
        let terminate = |track: TrackKind| match diff::prior_order(previous, latest, track) {
            Some(order) => diff::cancellation_order(order),
            None => {
                let order = latest.order(track);
                PaymentOrder::empty(track, order.payee().clone(), order.currency())
            }
        };
        let mut cancellation = Self::assemble(
            latest.correlation_id,
            SettlementKind::Cancellation,
            EconomicTimeline::empty(),
            latest.period,
            terminate(TrackKind::EmployerRefund),
            terminate(TrackKind::Person),
            batch_id,
        );
        info!(
            settlement_id = %cancellation.id,
            correlation_id = %cancellation.correlation_id,
            cancels = %latest.id,
            "cancellation created"
        );
        cancellation.apply_policy(policy)?;
        Ok(cancellation)
    }

    fn assemble(
        correlation_id: CorrelationId,
        kind: SettlementKind,
        timeline: EconomicTimeline,
        period: Period,
        employer: PaymentOrder,
        person: PaymentOrder,
        batch_id: Option<BatchId>,
    ) -> Self {
        let now = Utc::now();
        let id = SettlementId::new_v7();
        Self {
            id,
            correlation_id,
            kind,
            status: SettlementStatus::Created,
            timeline,
            period,
            employer,
            person,
            approval: None,
            batch_id,
            superseded_by: None,
            created_at: now,
            updated_at: now,
            events: vec![SettlementEvent::SettlementCreated {
                settlement_id: id,
                correlation_id,
                kind,
                timestamp: now,
            }],
        }
    }

    fn apply_policy(&mut self, policy: ApprovalPolicy) -> Result<(), SettlementError> {
        match policy {
            ApprovalPolicy::Manual => Ok(()),
            ApprovalPolicy::Automatic { approver } => self.approve(Approval::automatic(approver)),
        }
    }

    // Getters

    pub fn id(&self) -> SettlementId {
        self.id
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn kind(&self) -> SettlementKind {
        self.kind
    }

    pub fn status(&self) -> SettlementStatus {
        self.status
    }

    pub fn timeline(&self) -> &EconomicTimeline {
        &self.timeline
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn covered_through(&self) -> NaiveDate {
        self.period.end
    }

    pub fn employer(&self) -> &PaymentOrder {
        &self.employer
    }

    pub fn person(&self) -> &PaymentOrder {
        &self.person
    }

    pub fn order(&self, track: TrackKind) -> &PaymentOrder {
        match track {
            TrackKind::EmployerRefund => &self.employer,
            TrackKind::Person => &self.person,
        }
    }

    /// Employer order first, then person order
    pub fn orders(&self) -> impl Iterator<Item = &PaymentOrder> {
        [&self.employer, &self.person].into_iter()
    }

    pub fn approval(&self) -> Option<&Approval> {
        self.approval.as_ref()
    }

    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }

    pub fn superseded_by(&self) -> Option<SettlementId> {
        self.superseded_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn consumed_days(&self) -> u32 {
        self.timeline.consumed_days
    }

    pub fn remaining_days(&self) -> u32 {
        self.timeline.remaining_days
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.timeline.max_date
    }

    pub fn gross(&self, track: TrackKind) -> Money {
        self.order(track).gross()
    }

    pub fn net(&self, track: TrackKind) -> Money {
        self.order(track).net()
    }

    /// True when at least one order has something to send
    pub fn has_payable_content(&self) -> bool {
        self.orders().any(PaymentOrder::has_changes)
    }

    /// True while an order is transferred but not yet acknowledged
    pub fn is_in_flight(&self) -> bool {
        self.orders().any(PaymentOrder::is_in_flight)
    }

    /// Track whose order carries `ledger_id`
    pub fn track_for(&self, ledger_id: LedgerId) -> Option<TrackKind> {
        self.orders()
            .find(|order| order.ledger_id() == Some(ledger_id))
            .map(PaymentOrder::track)
    }

    /// Records an approval decision
    ///
    /// A positive decision sends the settlement, or closes it as approved
    /// without payment when neither order has anything to send. A negative
    /// decision discards it.
    pub fn approve(&mut self, approval: Approval) -> Result<(), SettlementError> {
        let target = if !approval.approved {
            SettlementStatus::Discarded
        } else if self.has_payable_content() {
            SettlementStatus::Sent
        } else {
            SettlementStatus::ApprovedWithoutPayment
        };
        if self.status != SettlementStatus::Created {
            return Err(SettlementError::invalid_transition(self.status, target));
        }

        self.events.push(SettlementEvent::SettlementApproved {
            settlement_id: self.id,
            approver: approval.approver.clone(),
            automatic: approval.automatic,
            timestamp: approval.timestamp,
        });
        self.approval = Some(approval);
        self.transition(target);
        Ok(())
    }

    /// Dry-run requests for the orders that have something to send
    pub fn preview(
        &self,
        as_of: DateTime<Utc>,
        actor: &str,
    ) -> Result<Vec<PreviewRequest>, SettlementError> {
        if !matches!(self.status, SettlementStatus::Created | SettlementStatus::Sent) {
            return Err(SettlementError::invalid_transition(
                self.status,
                OrderStatus::Previewed,
            ));
        }
        Ok(self
            .orders()
            .filter_map(|order| order.preview_request(self.id, self.correlation_id, as_of, actor))
            .collect())
    }

    /// Transfer requests for the orders that have something to send
    pub fn request_transfer(
        &self,
        as_of: DateTime<Utc>,
        actor: &str,
    ) -> Result<Vec<TransferRequest>, SettlementError> {
        if self.status != SettlementStatus::Sent {
            return Err(SettlementError::invalid_transition(
                self.status,
                SettlementStatus::Transferred,
            ));
        }
        Ok(self
            .orders()
            .filter_map(|order| order.transfer_request(self.id, self.correlation_id, as_of, actor))
            .collect())
    }

    pub fn record_preview(&mut self, result: &PreviewResult) -> EventOutcome {
        self.route(result.settlement_id, "preview", |order| order.record_preview(result))
    }

    pub fn record_transferred(&mut self, confirmation: &TransferConfirmation) -> EventOutcome {
        self.route(confirmation.settlement_id, "transfer confirmation", |order| {
            order.record_transferred(confirmation)
        })
    }

    pub fn record_receipt(&mut self, receipt: &Receipt) -> EventOutcome {
        let outcome = self.route(receipt.settlement_id, "receipt", |order| {
            order.record_receipt(receipt)
        });
        if outcome.is_applied() && receipt.status == ReceiptStatus::Rejected {
            warn!(
                settlement_id = %self.id,
                ledger_id = %receipt.ledger_id,
                message = receipt.message.as_deref().unwrap_or(""),
                "ledger rejected order"
            );
        }
        outcome
    }

    /// Offers a ledger event to both orders and recomputes the status
    fn route(
        &mut self,
        settlement_id: SettlementId,
        what: &str,
        apply: impl Fn(&mut PaymentOrder) -> EventOutcome,
    ) -> EventOutcome {
        if settlement_id != self.id {
            debug!(settlement_id = %self.id, addressed_to = %settlement_id, what, "ignoring event for another settlement");
            return EventOutcome::Ignored;
        }

        let before = [self.employer.status(), self.person.status()];
        let employer = apply(&mut self.employer);
        let person = apply(&mut self.person);
        let outcome = employer.or(person);

        match outcome {
            EventOutcome::Applied => {
                self.note_order_change(TrackKind::EmployerRefund, before[0]);
                self.note_order_change(TrackKind::Person, before[1]);
                self.updated_at = Utc::now();
                self.recompute_status();
            }
            EventOutcome::Duplicate => {
                debug!(settlement_id = %self.id, what, "duplicate event");
            }
            EventOutcome::Ignored => {
                debug!(settlement_id = %self.id, what, "event matches no order");
            }
        }
        outcome
    }

    fn note_order_change(&mut self, track: TrackKind, before: OrderStatus) {
        let order = self.order(track);
        let after = order.status();
        if after == before {
            return;
        }
        if let Some(ledger_id) = order.ledger_id() {
            self.events.push(SettlementEvent::OrderStatusChanged {
                settlement_id: self.id,
                ledger_id,
                track,
                from: before,
                to: after,
                timestamp: Utc::now(),
            });
        }
    }

    /// Re-derives the aggregate status from the order statuses
    pub fn recompute_status(&mut self) {
        let next = SettlementStatus::derive(
            self.status,
            self.employer.pending_status(),
            self.person.pending_status(),
        );
        self.transition(next);
    }

    fn transition(&mut self, to: SettlementStatus) {
        if self.status == to {
            return;
        }
        let now = Utc::now();
        self.events.push(SettlementEvent::StatusChanged {
            settlement_id: self.id,
            from: self.status,
            to,
            timestamp: now,
        });
        info!(settlement_id = %self.id, from = ?self.status, to = ?to, "settlement status changed");
        self.status = to;
        self.updated_at = now;
    }

    /// True when this settlement may be discarded
    ///
    /// `chain` is the caller's settlement history, oldest first. Settlements
    /// past `Created` are only discardable once a later cancellation of the
    /// same chain succeeded.
    pub fn can_discard(&self, chain: &[Settlement]) -> bool {
        if self.is_in_flight() {
            return false;
        }
        match self.status {
            SettlementStatus::Created
            | SettlementStatus::SettlementFailed
            | SettlementStatus::Discarded => true,
            _ => {
                let later = chain
                    .iter()
                    .position(|s| s.id == self.id)
                    .map_or(chain, |index| &chain[index + 1..]);
                later.iter().any(|s| {
                    s.kind == SettlementKind::Cancellation
                        && s.correlation_id == self.correlation_id
                        && s.status.is_successful()
                })
            }
        }
    }

    /// Abandons this settlement
    pub fn discard(&mut self, chain: &[Settlement]) -> Result<(), SettlementError> {
        if !self.can_discard(chain) {
            return Err(SettlementError::NotDiscardable {
                id: self.id.to_string(),
                status: format!("{:?}", self.status),
            });
        }
        self.mark_discarded();
        Ok(())
    }

    pub(crate) fn mark_discarded(&mut self) {
        self.transition(SettlementStatus::Discarded);
    }

    /// Records the cancellation that ends this settlement's chain
    pub fn mark_superseded(&mut self, by: SettlementId) {
        if self.superseded_by.is_some() {
            return;
        }
        let now = Utc::now();
        self.superseded_by = Some(by);
        self.updated_at = now;
        self.events.push(SettlementEvent::SettlementSuperseded {
            settlement_id: self.id,
            superseded_by: by,
            timestamp: now,
        });
        info!(settlement_id = %self.id, superseded_by = %by, "settlement superseded");
    }

    /// Takes and clears uncommitted events
    pub fn take_events(&mut self) -> Vec<SettlementEvent> {
        std::mem::take(&mut self.events)
    }
}
