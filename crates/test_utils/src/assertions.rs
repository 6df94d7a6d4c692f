//! Custom Test Assertions
//!
//! Assertion helpers for settlement types that give more meaningful failure
//! messages than bare `assert_eq!` on nested structures.

use core_kernel::Money;
use domain_settlement::{PaymentOrder, Settlement, TrackKind};
use rust_decimal::Decimal;

/// Asserts that a Money value has the expected amount
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Expected {} {}, got {} {}",
        actual.currency().symbol(),
        expected,
        actual.currency().symbol(),
        actual.amount()
    );
}

/// Asserts that an order's sequence numbers run 1..=n and every reference
/// points at the previous number under the order's own ledger id
pub fn assert_sequences_contiguous(order: &PaymentOrder) {
    let mut sequences: Vec<u32> = order.lines().iter().map(|l| l.sequence()).collect();
    sequences.sort_unstable();
    let expected: Vec<u32> = (1..=sequences.len() as u32).collect();
    assert_eq!(
        sequences, expected,
        "{:?} order sequence numbers are not contiguous",
        order.track()
    );

    for line in order.lines() {
        match line.reference() {
            None => assert_eq!(
                line.sequence(),
                1,
                "line {} of {:?} order has no reference",
                line.sequence(),
                order.track()
            ),
            Some(reference) => {
                assert_eq!(
                    reference.sequence,
                    line.sequence() - 1,
                    "line {} references {}",
                    line.sequence(),
                    reference.sequence
                );
                assert_eq!(
                    Some(reference.ledger_id),
                    order.ledger_id(),
                    "line {} references another ledger id",
                    line.sequence()
                );
            }
        }
    }
}

/// Asserts that an order sends nothing to the ledger
pub fn assert_nothing_to_send(order: &PaymentOrder) {
    assert!(
        !order.has_changes(),
        "{:?} order has {} changed lines",
        order.track(),
        order.changed_lines().count()
    );
}

/// Asserts that `next` continues the chain of `previous`
pub fn assert_same_chain(previous: &Settlement, next: &Settlement) {
    assert_eq!(
        previous.correlation_id(),
        next.correlation_id(),
        "settlement {} does not continue {}",
        next.id(),
        previous.id()
    );
    for track in [TrackKind::EmployerRefund, TrackKind::Person] {
        if let Some(ledger_id) = previous.order(track).ledger_id() {
            assert_eq!(
                next.order(track).ledger_id(),
                Some(ledger_id),
                "{:?} ledger id changed within a chain",
                track
            );
        }
    }
}

/// Asserts that `next` starts a chain of its own
pub fn assert_new_chain(previous: &Settlement, next: &Settlement) {
    assert_ne!(
        previous.correlation_id(),
        next.correlation_id(),
        "settlement {} reuses the correlation id of {}",
        next.id(),
        previous.id()
    );
    for track in [TrackKind::EmployerRefund, TrackKind::Person] {
        if let Some(ledger_id) = next.order(track).ledger_id() {
            assert_ne!(
                previous.order(track).ledger_id(),
                Some(ledger_id),
                "{:?} ledger id reused across chains",
                track
            );
        }
    }
}
