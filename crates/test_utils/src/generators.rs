//! Property-Based Test Generators
//!
//! Proptest strategies for economic timelines that satisfy the structural
//! rules (increasing dates, degree within 0-100, non-negative amounts).

use chrono::NaiveDate;
use domain_settlement::{EconomicTimeline, ReceiptStatus};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::builders::TimelineBuilder;
use crate::fixtures::DateFixtures;

/// One segment of a generated timeline
#[derive(Debug, Clone)]
pub enum Segment {
    Unpaid(u32),
    Paid { days: u32, employer: Decimal, person: Decimal, degree: u8 },
}

/// Whole-kroner daily amounts, zero included
pub fn daily_amount_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        1 => Just(Decimal::ZERO),
        4 => (1i64..2_000i64).prop_map(Decimal::from),
    ]
}

pub fn degree_strategy() -> impl Strategy<Value = u8> {
    prop_oneof![Just(100u8), Just(50u8), 20u8..=100u8]
}

pub fn segment_strategy() -> impl Strategy<Value = Segment> {
    prop_oneof![
        1 => (1u32..10).prop_map(Segment::Unpaid),
        3 => (1u32..25, daily_amount_strategy(), daily_amount_strategy(), degree_strategy())
            .prop_map(|(days, employer, person, degree)| Segment::Paid {
                days,
                employer,
                person,
                degree,
            }),
    ]
}

/// Timelines of up to eight segments starting on `start`
pub fn timeline_from_strategy(start: NaiveDate) -> impl Strategy<Value = EconomicTimeline> {
    prop::collection::vec(segment_strategy(), 1..8).prop_map(move |segments| {
        segments
            .into_iter()
            .fold(TimelineBuilder::starting(start), |builder, segment| match segment {
                Segment::Unpaid(days) => builder.unpaid(days),
                Segment::Paid { days, employer, person, degree } => {
                    builder.with_degree(degree).paid(days, employer, person)
                }
            })
            .build()
    })
}

/// Timelines starting January 1st 2018
pub fn timeline_strategy() -> impl Strategy<Value = EconomicTimeline> {
    timeline_from_strategy(DateFixtures::jan(1))
}

/// Successive recomputations of the same sickness period
pub fn timeline_sequence_strategy(len: usize) -> impl Strategy<Value = Vec<EconomicTimeline>> {
    prop::collection::vec(timeline_strategy(), 1..=len)
}

pub fn receipt_status_strategy() -> impl Strategy<Value = ReceiptStatus> {
    prop_oneof![
        Just(ReceiptStatus::Accepted),
        Just(ReceiptStatus::AcceptedWithWarning),
        Just(ReceiptStatus::Rejected),
    ]
}
