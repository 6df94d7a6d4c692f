//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! settlement engine test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built dates, payees, amounts and ledger messages
//! - `builders`: Builders for economic timelines and settlement requests
//! - `ledger`: Simulated external ledger answering transfer requests
//! - `assertions`: Custom assertion helpers for settlement types
//! - `generators`: Property-based timeline generators
//! - `logging`: One-time test subscriber setup

pub mod fixtures;
pub mod builders;
pub mod ledger;
pub mod assertions;
pub mod generators;
pub mod logging;

pub use fixtures::*;
pub use builders::*;
pub use ledger::*;
pub use assertions::*;
pub use generators::*;
pub use logging::init_test_tracing;
