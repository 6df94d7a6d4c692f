//! Correlation and diff engine
//!
//! Decides whether a new settlement continues the previous chain and, per
//! track, which lines the next order carries forward, terminates and appends.
//!
//! # Algorithm
//!
//! The previous order's active days are compared with the desired days of
//! the new timeline. The first date, up to the last previously paid day,
//! where the two disagree is the termination date: the chain's payments stop
//! from there (one termination marker on the highest line) and the desired
//! days from that date on are appended as new lines. Without a disagreement
//! only the days after the last previously paid day are appended, so an
//! unchanged or merely extended timeline never re-sends what the ledger
//! already pays.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use core_kernel::{is_weekday, Currency, LedgerId, Money, Period};

use crate::line::{ChangeCode, DayPicture, LineRate, LineReference, PaymentLine, RateType};
use crate::order::{OrderStatus, PayeeId, PaymentOrder, TrackKind};
use crate::settlement::{Settlement, SettlementKind, SettlementStatus};

/// Picks the settlement a new computation continues, if any
///
/// Each correlation chain in `previous` is represented by its latest member
/// that was not discarded. Chains ending in a cancellation are closed. Of the
/// open chains with an order near `first_paid_date`, the nearest one is
/// continued; the most recent chain wins a tie. Without a first paid date
/// the most recent open chain is continued so its payments get terminated.
pub fn predecessor<'a>(
    previous: &'a [Settlement],
    first_paid_date: Option<NaiveDate>,
    near_threshold_days: i64,
) -> Option<&'a Settlement> {
    let heads = chain_heads(previous);
    let mut open = heads
        .iter()
        .copied()
        .filter(|head| head.kind() != SettlementKind::Cancellation);

    let Some(date) = first_paid_date else {
        return open.next();
    };

    let nearest = open
        .filter(|head| {
            head.orders()
                .any(|order| order.is_near(date, near_threshold_days))
        })
        .min_by_key(|head| {
            head.orders()
                .filter_map(|order| order.distance_to(date))
                .min()
        });

    if nearest.is_none() {
        debug!(
            %date,
            chains = heads.len(),
            "timeline is not near an open chain, starting a new chain"
        );
    }
    nearest
}

/// Latest non-discarded member of every chain, most recent chain first
fn chain_heads(previous: &[Settlement]) -> Vec<&Settlement> {
    let mut seen = HashSet::new();
    previous
        .iter()
        .rev()
        .filter(|s| s.status() != SettlementStatus::Discarded)
        .filter(|s| seen.insert(s.correlation_id()))
        .collect()
}

/// Last order of `track` in the chain of `predecessor` that the ledger did
/// not reject
///
/// A rejected order never reached the ledger, so the next order is diffed
/// against the one before it.
pub fn prior_order<'a>(
    previous: &'a [Settlement],
    predecessor: &'a Settlement,
    track: TrackKind,
) -> Option<&'a PaymentOrder> {
    let chain = previous.iter().rev().filter(|s| {
        s.correlation_id() == predecessor.correlation_id()
            && s.status() != SettlementStatus::Discarded
    });
    std::iter::once(predecessor)
        .chain(chain)
        .map(|s| s.order(track))
        .find(|order| order.status() != OrderStatus::Rejected)
}

/// Computes the next order of a track
///
/// `previous` is the same track's order in the predecessor settlement. A
/// previous order without a ledger id never had content and is treated as
/// absent.
pub fn next_order(
    previous: Option<&PaymentOrder>,
    track: TrackKind,
    payee: PayeeId,
    desired: &DayPicture,
    covered_through: NaiveDate,
    currency: Currency,
) -> PaymentOrder {
    match previous.and_then(|p| p.ledger_id().map(|ledger_id| (p, ledger_id))) {
        None => fresh_order(track, payee, desired, currency),
        Some((previous, ledger_id)) => {
            continued_order(previous, ledger_id, payee, desired, covered_through)
        }
    }
}

/// An order that terminates everything `previous` still pays
pub fn cancellation_order(previous: &PaymentOrder) -> PaymentOrder {
    let mut lines: Vec<PaymentLine> = previous.lines().iter().map(PaymentLine::carried).collect();
    let first_active = previous.active_days().keys().next().copied();

    let change = match first_active {
        Some(date) => {
            terminate_highest(&mut lines, date);
            ChangeCode::Changed
        }
        None => ChangeCode::Unchanged,
    };

    PaymentOrder::new(
        previous.track(),
        previous.payee().clone(),
        previous.ledger_id(),
        change,
        lines,
        previous.currency(),
        previous.gross(),
    )
}

fn fresh_order(
    track: TrackKind,
    payee: PayeeId,
    desired: &DayPicture,
    currency: Currency,
) -> PaymentOrder {
    if desired.is_empty() {
        return PaymentOrder::empty(track, payee, currency);
    }

    let ledger_id = LedgerId::new();
    let lines = append_lines(ledger_id, 0, ChangeCode::New, build_lines(desired));
    PaymentOrder::new(
        track,
        payee,
        Some(ledger_id),
        ChangeCode::New,
        lines,
        currency,
        Money::zero(currency),
    )
}

fn continued_order(
    previous: &PaymentOrder,
    ledger_id: LedgerId,
    payee: PayeeId,
    desired: &DayPicture,
    covered_through: NaiveDate,
) -> PaymentOrder {
    let old = previous.active_days();
    let mut desired = desired.clone();

    // Days after the covered period are outside this computation
    if let Some(after) = covered_through.succ_opt() {
        for (date, rate) in old.range(after..) {
            desired.insert(*date, *rate);
        }
    }

    let mut lines: Vec<PaymentLine> = previous.lines().iter().map(PaymentLine::carried).collect();
    let last_paid = old.keys().next_back().copied();
    let termination = last_paid.and_then(|last| first_difference(&old, &desired, last));

    let append_from = match (termination, last_paid) {
        (Some(date), _) => {
            terminate_highest(&mut lines, date);
            Some(date)
        }
        (None, Some(last)) => last.succ_opt(),
        (None, None) => Some(NaiveDate::MIN),
    };

    let line_change = if previous.is_empty() {
        ChangeCode::New
    } else {
        ChangeCode::Changed
    };
    if let Some(from) = append_from {
        let runs = build_lines(desired.range(from..));
        lines.extend(append_lines(
            ledger_id,
            previous.highest_sequence(),
            line_change,
            runs,
        ));
    }

    let change = if lines.iter().any(PaymentLine::is_changed) {
        ChangeCode::Changed
    } else {
        ChangeCode::Unchanged
    };

    PaymentOrder::new(
        previous.track(),
        payee,
        Some(ledger_id),
        change,
        lines,
        previous.currency(),
        previous.gross(),
    )
}

/// First date up to `through` where the two pictures disagree
pub fn first_difference(old: &DayPicture, new: &DayPicture, through: NaiveDate) -> Option<NaiveDate> {
    let dates: BTreeSet<NaiveDate> = old
        .range(..=through)
        .chain(new.range(..=through))
        .map(|(date, _)| *date)
        .collect();
    dates.into_iter().find(|date| old.get(date) != new.get(date))
}

/// Groups paid days into line periods
///
/// Consecutive days with the same daily rate share a line when only weekend
/// days lie between them. Single payments always get a line of their own.
pub fn build_lines<'a>(
    days: impl IntoIterator<Item = (&'a NaiveDate, &'a LineRate)>,
) -> Vec<(Period, LineRate)> {
    let mut runs: Vec<(Period, LineRate)> = Vec::new();
    for (date, rate) in days {
        if let Some((period, current)) = runs.last_mut() {
            if current == rate
                && rate.rate_type == RateType::Daily
                && only_weekend_between(period.end, *date)
            {
                period.end = *date;
                continue;
            }
        }
        runs.push((Period::single(*date), *rate));
    }
    runs
}

fn only_weekend_between(end: NaiveDate, next: NaiveDate) -> bool {
    end.iter_days()
        .skip(1)
        .take_while(|date| *date < next)
        .all(|date| !is_weekday(date))
}

fn append_lines(
    ledger_id: LedgerId,
    highest_sequence: u32,
    change: ChangeCode,
    runs: Vec<(Period, LineRate)>,
) -> Vec<PaymentLine> {
    runs.into_iter()
        .zip(highest_sequence + 1..)
        .map(|((period, rate), sequence)| {
            let reference = (sequence > 1).then(|| LineReference {
                sequence: sequence - 1,
                ledger_id,
            });
            PaymentLine::new(period, rate, sequence, reference, change)
        })
        .collect()
}

fn terminate_highest(lines: &mut [PaymentLine], date: NaiveDate) {
    if let Some(highest) = lines.iter_mut().max_by_key(|line| line.sequence()) {
        *highest = highest.terminated_from(date);
    }
}
