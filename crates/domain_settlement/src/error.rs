//! Settlement domain errors
//!
//! Only caller and precondition failures are errors. A ledger rejecting an
//! order is recorded as data on the order, and stale or duplicate ledger
//! events are reported through `EventOutcome`, never through this type.

use thiserror::Error;

use core_kernel::CoreError;

/// Errors that can occur in the settlement domain
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Invalid economic timeline: {0}")]
    InvalidTimeline(String),

    #[error("Settlement kind {0} cannot be created directly")]
    UnsupportedKind(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Settlement {id} cannot be discarded in status {status}")]
    NotDiscardable { id: String, status: String },

    #[error("Settlement chain cannot be cancelled: {0}")]
    NotCancellable(String),

    #[error("Cancellation by person-track ledger id {0} is not supported")]
    UnsupportedCancellationTarget(String),

    #[error("No settlement found for {0}")]
    NotFound(String),

    #[error("Settlement chain {0} already ends in a cancellation")]
    ChainCancelled(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SettlementError {
    pub fn invalid_timeline(message: impl Into<String>) -> Self {
        SettlementError::InvalidTimeline(message.into())
    }

    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        SettlementError::InvalidStatusTransition {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}
