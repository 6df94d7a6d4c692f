//! Payment lines
//!
//! A line is one contiguous sub-period paid at a fixed daily rate under one
//! external-ledger identifier. Lines are never edited: carrying a line into
//! the next order or terminating it produces a new value with the same
//! sequence number.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{is_weekday, LedgerId, Money, Period};

/// Paid days of a track, keyed by date
pub type DayPicture = BTreeMap<NaiveDate, LineRate>;

/// Change marker of a line or an order relative to its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeCode {
    /// First appearance, in a chain that had no lines before
    New,
    /// Carried forward as-is
    Unchanged,
    /// Appended to, or terminated within, an existing chain
    Changed,
}

/// How the daily amount is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateType {
    /// Paid per weekday in the line's period
    Daily,
    /// Paid once for the whole line
    Single,
}

impl Default for RateType {
    fn default() -> Self {
        RateType::Daily
    }
}

/// Ledger status code carried by a termination marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Terminated,
}

/// Closes a line early: payments stop from `effective_from`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub effective_from: NaiveDate,
    pub status: StatusCode,
}

/// Points at the line a new line continues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReference {
    pub sequence: u32,
    pub ledger_id: LedgerId,
}

/// The attributes that must match for two benefit days to share a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRate {
    pub daily_amount: Money,
    /// Degree of incapacity, 0-100
    pub degree: u8,
    pub reference_income: Money,
    pub rate_type: RateType,
}

/// A contiguous, amount-bearing sub-period within a payment order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLine {
    period: Period,
    rate: LineRate,
    sequence: u32,
    reference: Option<LineReference>,
    change: ChangeCode,
    termination: Option<Termination>,
}

impl PaymentLine {
    pub fn new(
        period: Period,
        rate: LineRate,
        sequence: u32,
        reference: Option<LineReference>,
        change: ChangeCode,
    ) -> Self {
        Self {
            period,
            rate,
            sequence,
            reference,
            change,
            termination: None,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn start(&self) -> NaiveDate {
        self.period.start
    }

    pub fn end(&self) -> NaiveDate {
        self.period.end
    }

    pub fn rate(&self) -> &LineRate {
        &self.rate
    }

    pub fn daily_amount(&self) -> Money {
        self.rate.daily_amount
    }

    pub fn degree(&self) -> u8 {
        self.rate.degree
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn reference(&self) -> Option<&LineReference> {
        self.reference.as_ref()
    }

    pub fn change(&self) -> ChangeCode {
        self.change
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }

    /// True when this line is part of what gets sent to the ledger
    pub fn is_changed(&self) -> bool {
        !matches!(self.change, ChangeCode::Unchanged)
    }

    /// Number of paid units: weekdays for daily rates, one for single payments
    pub fn units(&self) -> u32 {
        match self.rate.rate_type {
            RateType::Daily => self.period.weekdays(),
            RateType::Single => 1,
        }
    }

    /// Dates the line pays for, ignoring any termination
    pub fn paid_dates(&self) -> Vec<NaiveDate> {
        match self.rate.rate_type {
            RateType::Daily => self.period.dates().filter(|d| is_weekday(*d)).collect(),
            RateType::Single => vec![self.period.start],
        }
    }

    /// Full amount of the line, ignoring any termination
    pub fn total(&self) -> Money {
        self.rate.daily_amount.multiply(Decimal::from(self.units()))
    }

    /// Copy of this line for the next order in the chain
    pub fn carried(&self) -> Self {
        Self {
            change: ChangeCode::Unchanged,
            ..self.clone()
        }
    }

    /// Copy of this line with a termination marker from `date`
    pub fn terminated_from(&self, date: NaiveDate) -> Self {
        Self {
            change: ChangeCode::Changed,
            termination: Some(Termination {
                effective_from: date,
                status: StatusCode::Terminated,
            }),
            ..self.clone()
        }
    }
}
