//! Settlement Domain
//!
//! This crate turns day-by-day sickness-benefit determinations into payment
//! orders for an external ledger and reconciles the ledger's answers.
//!
//! # Settlement Lifecycle
//!
//! ```text
//! Create -> Approve -> Preview? -> Transfer -> Receipt -> Settled | SettlementFailed
//! ```
//!
//! Successive settlements for the same sickness period form a chain sharing
//! one correlation id. Each new settlement is diffed against the previous one
//! so only changed lines reach the ledger. A cancellation ends the chain.

pub mod config;
pub mod error;
pub mod events;
pub mod line;
pub mod order;
pub mod timeline;
pub mod diff;
pub mod settlement;
pub mod cancellation;
pub mod adjustment;

pub use config::EngineConfig;
pub use error::SettlementError;
pub use events::{
    Acknowledgement, EventOutcome, OrderPayload, PreviewPeriod, PreviewRequest, PreviewResult,
    Receipt, ReceiptStatus, SettlementEvent, TransferConfirmation, TransferRequest,
};
pub use line::{ChangeCode, DayPicture, LineRate, LineReference, PaymentLine, RateType, StatusCode, Termination};
pub use order::{OrderStatus, PayeeId, PaymentOrder, TrackKind};
pub use timeline::{EconomicDay, EconomicTimeline};
pub use settlement::{
    Approval, ApprovalPolicy, Settlement, SettlementKind, SettlementRequest, SettlementStatus,
};
pub use cancellation::{cancel, discard, CancellationRequest};
pub use adjustment::{find_by_ledger_id, find_track, plan_basic_rate_adjustment};
