//! Pre-built Test Fixtures
//!
//! Ready-to-use dates, payees, amounts and ledger messages. The dates follow
//! the 2018 calendar the scenario tests are written against: January 1st is
//! a Monday.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{Currency, LedgerId, Money};
use domain_settlement::{
    EngineConfig, PayeeId, PreviewPeriod, PreviewResult, Receipt, ReceiptStatus, Settlement,
    TrackKind, TransferConfirmation,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Case handler used for manual approvals
pub const CASE_HANDLER: &str = "Z999999";

/// System user used for automatic approvals
pub const SYSTEM_USER: &str = "settlement-engine";

/// Fixture for calendar dates
pub struct DateFixtures;

impl DateFixtures {
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
    }

    /// A day in January 2018
    pub fn jan(day: u32) -> NaiveDate {
        Self::date(2018, 1, day)
    }

    /// A day in February 2018
    pub fn feb(day: u32) -> NaiveDate {
        Self::date(2018, 2, day)
    }

    /// A day in March 2018
    pub fn mar(day: u32) -> NaiveDate {
        Self::date(2018, 3, day)
    }

    /// Fixed timestamp for ledger acknowledgements
    pub fn ack_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 2, 1, 12, 0, 0).unwrap()
    }
}

/// Fixture for payees
pub struct PayeeFixtures;

impl PayeeFixtures {
    /// Organisation number of the employer
    pub fn employer() -> PayeeId {
        PayeeId::new("987654321")
    }

    /// Person number of the sick person
    pub fn person() -> PayeeId {
        PayeeId::new("12029240045")
    }
}

/// Fixture for amounts
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn nok(amount: Decimal) -> Money {
        Money::new(amount, Currency::NOK)
    }

    /// Full daily rate for a 1431 NOK daily income
    pub fn daily_rate() -> Decimal {
        dec!(1431)
    }

    /// Reference daily income
    pub fn reference_income() -> Decimal {
        dec!(1431)
    }
}

/// Default engine configuration
pub fn engine_config() -> EngineConfig {
    EngineConfig::default()
}

/// Fixture for ledger acknowledgements addressed to a settlement's orders
pub struct LedgerFixtures;

impl LedgerFixtures {
    /// Ledger id of one of the settlement's orders
    ///
    /// # Panics
    ///
    /// Panics if the track never had content
    pub fn ledger_id(settlement: &Settlement, track: TrackKind) -> LedgerId {
        settlement
            .order(track)
            .ledger_id()
            .expect("track has a ledger id")
    }

    pub fn reconciliation_key(settlement: &Settlement, track: TrackKind) -> String {
        format!("{}-{:?}", settlement.id(), track)
    }

    pub fn preview(settlement: &Settlement, track: TrackKind) -> PreviewResult {
        let order = settlement.order(track);
        PreviewResult {
            settlement_id: settlement.id(),
            ledger_id: Self::ledger_id(settlement, track),
            track,
            total: order.net(),
            periods: order
                .changed_lines()
                .map(|line| PreviewPeriod {
                    period: line.period(),
                    amount: line.total(),
                })
                .collect(),
        }
    }

    pub fn transferred(settlement: &Settlement, track: TrackKind) -> TransferConfirmation {
        TransferConfirmation {
            settlement_id: settlement.id(),
            ledger_id: Self::ledger_id(settlement, track),
            reconciliation_key: Self::reconciliation_key(settlement, track),
            timestamp: DateFixtures::ack_time(),
        }
    }

    pub fn receipt(settlement: &Settlement, track: TrackKind, status: ReceiptStatus) -> Receipt {
        Receipt {
            settlement_id: settlement.id(),
            ledger_id: Self::ledger_id(settlement, track),
            status,
            reconciliation_key: Self::reconciliation_key(settlement, track),
            timestamp: DateFixtures::ack_time(),
            message: match status {
                ReceiptStatus::Rejected => Some("Invalid account".to_string()),
                _ => None,
            },
        }
    }
}
