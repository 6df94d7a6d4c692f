//! Core Kernel - Foundational types for the settlement engine
//!
//! This crate provides the building blocks shared by the settlement domain:
//! - Money types with precise decimal arithmetic
//! - Calendar periods with weekday (benefit day) arithmetic
//! - Strongly-typed identifiers for settlements, chains and ledger orders

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{Period, TemporalError, is_weekday};
pub use identifiers::{
    SettlementId, CorrelationId, LedgerId, BatchId,
};
pub use error::CoreError;
