//! Economic timeline input
//!
//! The timeline is the day-by-day economic determination produced upstream:
//! for each date, what the employer is refunded and what the person is paid
//! directly. Days outside the benefit (waiting period, holidays, weekends)
//! are simply unpaid.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{is_weekday, Currency, Money};

use crate::error::SettlementError;
use crate::line::{DayPicture, LineRate, RateType};
use crate::order::TrackKind;

/// One day of the economic determination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomicDay {
    pub date: NaiveDate,
    /// Daily amount refunded to the employer
    pub employer_amount: Decimal,
    /// Daily amount paid to the person
    pub person_amount: Decimal,
    /// Degree of incapacity, 0-100
    pub degree: u8,
    /// Daily income the amounts were derived from
    pub reference_income: Decimal,
    pub rate_type: RateType,
}

impl EconomicDay {
    /// A paid day split between employer and person
    pub fn paid(
        date: NaiveDate,
        employer_amount: Decimal,
        person_amount: Decimal,
        degree: u8,
        reference_income: Decimal,
    ) -> Self {
        Self {
            date,
            employer_amount,
            person_amount,
            degree,
            reference_income,
            rate_type: RateType::Daily,
        }
    }

    /// A day without payment (waiting period, rejected day, ...)
    pub fn unpaid(date: NaiveDate) -> Self {
        Self {
            date,
            employer_amount: Decimal::ZERO,
            person_amount: Decimal::ZERO,
            degree: 0,
            reference_income: Decimal::ZERO,
            rate_type: RateType::Daily,
        }
    }

    pub fn amount(&self, track: TrackKind) -> Decimal {
        match track {
            TrackKind::EmployerRefund => self.employer_amount,
            TrackKind::Person => self.person_amount,
        }
    }

    /// Daily rates are paid on weekdays only; single payments on any day
    fn is_payable_date(&self) -> bool {
        match self.rate_type {
            RateType::Daily => is_weekday(self.date),
            RateType::Single => true,
        }
    }

    fn is_paid(&self, track: TrackKind) -> bool {
        self.is_payable_date() && self.amount(track) > Decimal::ZERO
    }
}

/// The economic determination a settlement is computed from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomicTimeline {
    pub days: Vec<EconomicDay>,
    /// Benefit days consumed so far
    pub consumed_days: u32,
    /// Benefit days left
    pub remaining_days: u32,
    /// Last date benefit can be paid
    pub max_date: Option<NaiveDate>,
}

impl EconomicTimeline {
    pub fn new(days: Vec<EconomicDay>) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    /// A timeline with no days, e.g. for a cancellation
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_counters(
        mut self,
        consumed_days: u32,
        remaining_days: u32,
        max_date: Option<NaiveDate>,
    ) -> Self {
        self.consumed_days = consumed_days;
        self.remaining_days = remaining_days;
        self.max_date = max_date;
        self
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    /// Rejects timelines the diff cannot be computed from
    pub fn validate(&self, covered_through: NaiveDate) -> Result<(), SettlementError> {
        for pair in self.days.windows(2) {
            if pair[0].date >= pair[1].date {
                return Err(SettlementError::invalid_timeline(format!(
                    "dates must be strictly increasing: {} is followed by {}",
                    pair[0].date, pair[1].date
                )));
            }
        }

        for day in &self.days {
            if day.degree > 100 {
                return Err(SettlementError::invalid_timeline(format!(
                    "degree {} on {} is above 100",
                    day.degree, day.date
                )));
            }
            if day.employer_amount.is_sign_negative()
                || day.person_amount.is_sign_negative()
                || day.reference_income.is_sign_negative()
            {
                return Err(SettlementError::invalid_timeline(format!(
                    "negative amount on {}",
                    day.date
                )));
            }
            let paid = day.employer_amount > Decimal::ZERO || day.person_amount > Decimal::ZERO;
            if paid && day.degree == 0 {
                return Err(SettlementError::invalid_timeline(format!(
                    "{} is paid with degree 0",
                    day.date
                )));
            }
        }

        if let Some(first) = self.first_date() {
            if covered_through < first {
                return Err(SettlementError::invalid_timeline(format!(
                    "covered period ends {} before the first day {}",
                    covered_through, first
                )));
            }
        }
        Ok(())
    }

    /// Paid days of one track up to and including `covered_through`
    pub fn picture(
        &self,
        track: TrackKind,
        covered_through: NaiveDate,
        currency: Currency,
    ) -> DayPicture {
        self.days
            .iter()
            .take_while(|day| day.date <= covered_through)
            .filter(|day| day.is_paid(track))
            .map(|day| {
                let rate = LineRate {
                    daily_amount: Money::new(day.amount(track), currency),
                    degree: day.degree,
                    reference_income: Money::new(day.reference_income, currency),
                    rate_type: day.rate_type,
                };
                (day.date, rate)
            })
            .collect()
    }

    /// First paid day on either track up to `covered_through`
    pub fn first_paid_date(&self, covered_through: NaiveDate) -> Option<NaiveDate> {
        self.days
            .iter()
            .take_while(|day| day.date <= covered_through)
            .find(|day| day.is_paid(TrackKind::EmployerRefund) || day.is_paid(TrackKind::Person))
            .map(|day| day.date)
    }
}
