//! Cancellation and discard
//!
//! A cancellation ends a chain: it terminates every line the chain's latest
//! settlement still pays, keeps the chain's correlation id, and marks that
//! settlement superseded. The next settlement for the person starts a new
//! chain with new ledger ids.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{BatchId, SettlementId};

use crate::adjustment::{find_track, latest_in_chain};
use crate::error::SettlementError;
use crate::order::TrackKind;
use crate::settlement::{ApprovalPolicy, Settlement, SettlementKind, SettlementStatus};

/// Request to cancel the chain carrying an employer-refund ledger id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub ledger_id: String,
    pub requested_by: String,
    pub batch_id: Option<BatchId>,
    pub approval_policy: ApprovalPolicy,
}

impl CancellationRequest {
    pub fn new(ledger_id: impl Into<String>, requested_by: impl Into<String>) -> Self {
        Self {
            ledger_id: ledger_id.into(),
            requested_by: requested_by.into(),
            batch_id: None,
            approval_policy: ApprovalPolicy::Manual,
        }
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

/// Cancels the chain carrying `request.ledger_id`
///
/// `settlements` is the person's settlement history, oldest first. The
/// chain's latest settlement is marked superseded in place; the returned
/// cancellation is for the caller to store.
///
/// # Errors
///
/// - `NotFound` when no settlement carries the ledger id
/// - `UnsupportedCancellationTarget` for a person-track ledger id
/// - `ChainCancelled` when the chain already ends in a cancellation
/// - `NotCancellable` while the latest settlement is unapproved or in flight
#[instrument(skip_all, fields(ledger_id = %request.ledger_id, requested_by = %request.requested_by))]
pub fn cancel(
    settlements: &mut [Settlement],
    request: &CancellationRequest,
) -> Result<Settlement, SettlementError> {
    let (found, track) = find_track(&request.ledger_id, settlements)
        .ok_or_else(|| SettlementError::NotFound(request.ledger_id.clone()))?;
    if track == TrackKind::Person {
        return Err(SettlementError::UnsupportedCancellationTarget(
            request.ledger_id.clone(),
        ));
    }

    let latest = latest_in_chain(found, settlements).unwrap_or(found);
    if latest.kind() == SettlementKind::Cancellation {
        return Err(SettlementError::ChainCancelled(
            latest.correlation_id().to_string(),
        ));
    }
    let settled = matches!(
        latest.status(),
        SettlementStatus::Settled
            | SettlementStatus::ApprovedWithoutPayment
            | SettlementStatus::SettlementFailed
    );
    if !settled || latest.is_in_flight() {
        return Err(SettlementError::NotCancellable(format!(
            "latest settlement {} is {:?}",
            latest.id(),
            latest.status()
        )));
    }

    let latest_id = latest.id();
    let cancellation = Settlement::cancelling(
        settlements,
        latest,
        request.batch_id,
        request.approval_policy.clone(),
    )?;

    if let Some(superseded) = settlements.iter_mut().find(|s| s.id() == latest_id) {
        superseded.mark_superseded(cancellation.id());
    }
    info!(
        cancellation = %cancellation.id(),
        correlation_id = %cancellation.correlation_id(),
        "chain cancelled"
    );
    Ok(cancellation)
}

/// Discards the settlement `id` within `settlements`
///
/// # Errors
///
/// - `NotFound` when `id` is not in `settlements`
/// - `NotDiscardable` when the settlement is in flight or was sent and has
///   not been superseded by a successful cancellation
pub fn discard(settlements: &mut [Settlement], id: SettlementId) -> Result<(), SettlementError> {
    let index = settlements
        .iter()
        .position(|s| s.id() == id)
        .ok_or_else(|| SettlementError::NotFound(id.to_string()))?;

    let target = &settlements[index];
    if !target.can_discard(settlements) {
        return Err(SettlementError::NotDiscardable {
            id: id.to_string(),
            status: format!("{:?}", target.status()),
        });
    }
    settlements[index].mark_discarded();
    Ok(())
}
