//! Test Data Builders
//!
//! Builders for economic timelines and settlement requests. Timelines are
//! built day by day from a start date, one segment after another, so a test
//! reads like the case it describes: a waiting period, then paid days.

use chrono::NaiveDate;
use domain_settlement::{
    ApprovalPolicy, EconomicDay, EconomicTimeline, PayeeId, RateType, SettlementKind,
    SettlementRequest,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{MoneyFixtures, PayeeFixtures, SYSTEM_USER};

/// Builder for an economic timeline
pub struct TimelineBuilder {
    next: NaiveDate,
    days: Vec<EconomicDay>,
    degree: u8,
    reference_income: Decimal,
    consumed_days: u32,
    remaining_days: u32,
    max_date: Option<NaiveDate>,
}

impl TimelineBuilder {
    /// Starts a timeline on `start`
    pub fn starting(start: NaiveDate) -> Self {
        Self {
            next: start,
            days: Vec::new(),
            degree: 100,
            reference_income: MoneyFixtures::reference_income(),
            consumed_days: 0,
            remaining_days: 248,
            max_date: None,
        }
    }

    /// Degree of incapacity for the following segments
    pub fn with_degree(mut self, degree: u8) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_reference_income(mut self, income: Decimal) -> Self {
        self.reference_income = income;
        self
    }

    pub fn with_counters(mut self, consumed: u32, remaining: u32, max_date: NaiveDate) -> Self {
        self.consumed_days = consumed;
        self.remaining_days = remaining;
        self.max_date = Some(max_date);
        self
    }

    /// Employer-paid waiting period of `days` calendar days
    pub fn waiting_period(self, days: u32) -> Self {
        self.unpaid(days)
    }

    /// `days` calendar days without payment
    pub fn unpaid(mut self, days: u32) -> Self {
        for _ in 0..days {
            let date = self.advance();
            self.days.push(EconomicDay::unpaid(date));
        }
        self
    }

    /// `days` calendar days split between employer and person
    ///
    /// Weekend days are included in the timeline; they are never paid.
    pub fn paid(mut self, days: u32, employer: Decimal, person: Decimal) -> Self {
        for _ in 0..days {
            let date = self.advance();
            self.days.push(EconomicDay::paid(
                date,
                employer,
                person,
                self.degree,
                self.reference_income,
            ));
        }
        self
    }

    /// `days` calendar days fully refunded to the employer
    pub fn refunded(self, days: u32, amount: Decimal) -> Self {
        self.paid(days, amount, dec!(0))
    }

    /// One single payment on the next day
    pub fn single(mut self, employer: Decimal, person: Decimal) -> Self {
        let date = self.advance();
        let mut day = EconomicDay::paid(date, employer, person, self.degree, self.reference_income);
        day.rate_type = RateType::Single;
        self.days.push(day);
        self
    }

    /// Skips `days` calendar days without adding them to the timeline
    pub fn gap(mut self, days: u32) -> Self {
        for _ in 0..days {
            self.advance();
        }
        self
    }

    /// Last date added so far
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|day| day.date)
    }

    pub fn build(self) -> EconomicTimeline {
        EconomicTimeline::new(self.days).with_counters(
            self.consumed_days,
            self.remaining_days,
            self.max_date,
        )
    }

    fn advance(&mut self) -> NaiveDate {
        let date = self.next;
        self.next = date.succ_opt().expect("date within calendar range");
        date
    }
}

/// Builder for a settlement request
pub struct SettlementRequestBuilder {
    person: PayeeId,
    employer: PayeeId,
    timeline: EconomicTimeline,
    covered_through: Option<NaiveDate>,
    kind: SettlementKind,
    approval_policy: ApprovalPolicy,
}

impl SettlementRequestBuilder {
    pub fn new(timeline: EconomicTimeline) -> Self {
        Self {
            person: PayeeFixtures::person(),
            employer: PayeeFixtures::employer(),
            timeline,
            covered_through: None,
            kind: SettlementKind::Ordinary,
            approval_policy: ApprovalPolicy::Manual,
        }
    }

    /// Defaults to the timeline's last day
    pub fn covered_through(mut self, date: NaiveDate) -> Self {
        self.covered_through = Some(date);
        self
    }

    pub fn kind(mut self, kind: SettlementKind) -> Self {
        self.kind = kind;
        self
    }

    /// Approve automatically on creation
    pub fn automatic(mut self) -> Self {
        self.approval_policy = ApprovalPolicy::Automatic {
            approver: SYSTEM_USER.to_string(),
        };
        self
    }

    pub fn build(self) -> SettlementRequest {
        let covered_through = self
            .covered_through
            .or_else(|| self.timeline.days.last().map(|day| day.date))
            .expect("covered_through or a non-empty timeline");
        SettlementRequest::new(self.person, self.employer, self.timeline, covered_through)
            .with_kind(self.kind)
            .with_approval_policy(self.approval_policy)
    }
}
