//! Settlement aggregate lifecycle tests

use rust_decimal_macros::dec;

use core_kernel::{Period, SettlementId};
use domain_settlement::{
    Approval, ChangeCode, EconomicTimeline, EventOutcome, OrderStatus, ReceiptStatus, Settlement,
    SettlementError, SettlementEvent, SettlementStatus, TrackKind,
};
use test_utils::{
    assert_money_eq, engine_config, init_test_tracing, DateFixtures, LedgerFixtures,
    LedgerSimulator, SettlementRequestBuilder, TimelineBuilder, CASE_HANDLER,
};

/// 16-day waiting period, then January 17-31 refunded to the employer
fn employer_only() -> EconomicTimeline {
    TimelineBuilder::starting(DateFixtures::jan(1))
        .waiting_period(16)
        .refunded(15, dec!(1431))
        .build()
}

/// Same period split between employer and person
fn split() -> EconomicTimeline {
    TimelineBuilder::starting(DateFixtures::jan(1))
        .waiting_period(16)
        .paid(15, dec!(1000), dec!(431))
        .build()
}

fn create(timeline: EconomicTimeline) -> Settlement {
    init_test_tracing();
    Settlement::create(
        &[],
        SettlementRequestBuilder::new(timeline).build(),
        &engine_config(),
    )
    .unwrap()
}

// ============================================================================
// Creation
// ============================================================================

mod creation_tests {
    use super::*;

    #[test]
    fn test_first_settlement_starts_a_chain() {
        let mut settlement = create(employer_only());

        assert_eq!(settlement.status(), SettlementStatus::Created);
        let employer = settlement.employer();
        assert!(employer.ledger_id().is_some());
        assert_eq!(employer.change(), ChangeCode::New);
        assert_eq!(employer.lines().len(), 1);
        assert!(employer.lines()[0].reference().is_none());
        assert_eq!(
            employer.lines()[0].period(),
            Period::new(DateFixtures::jan(17), DateFixtures::jan(31)).unwrap()
        );

        // No person amount: no ledger id, nothing to send
        assert!(settlement.person().ledger_id().is_none());
        assert!(settlement.person().is_empty());

        let events = settlement.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SettlementEvent::SettlementCreated { .. }));
        assert!(settlement.take_events().is_empty());
    }

    #[test]
    fn test_invalid_timeline_is_rejected() {
        let mut days = employer_only().days;
        days.swap(0, 1);
        let request = SettlementRequestBuilder::new(EconomicTimeline::new(days))
            .covered_through(DateFixtures::jan(31))
            .build();

        let result = Settlement::create(&[], request, &engine_config());
        assert!(matches!(result, Err(SettlementError::InvalidTimeline(_))));
    }

    #[test]
    fn test_counters_are_exposed() {
        let timeline = TimelineBuilder::starting(DateFixtures::jan(1))
            .with_counters(11, 237, DateFixtures::date(2018, 12, 28))
            .waiting_period(16)
            .refunded(15, dec!(1431))
            .build();
        let settlement = create(timeline);

        assert_eq!(settlement.consumed_days(), 11);
        assert_eq!(settlement.remaining_days(), 237);
        assert_eq!(settlement.max_date(), Some(DateFixtures::date(2018, 12, 28)));
        assert_eq!(settlement.covered_through(), DateFixtures::jan(31));
        assert_money_eq(&settlement.gross(TrackKind::EmployerRefund), dec!(15741));
        assert_money_eq(&settlement.gross(TrackKind::Person), dec!(0));
    }
}

// ============================================================================
// Approval
// ============================================================================

mod approval_tests {
    use super::*;

    #[test]
    fn test_manual_approval_sends() {
        let mut settlement = create(employer_only());
        settlement.approve(Approval::manual(CASE_HANDLER, true)).unwrap();

        assert_eq!(settlement.status(), SettlementStatus::Sent);
        let approval = settlement.approval().unwrap();
        assert_eq!(approval.approver, CASE_HANDLER);
        assert!(!approval.automatic);
    }

    #[test]
    fn test_automatic_approval_on_creation() {
        init_test_tracing();
        let request = SettlementRequestBuilder::new(employer_only())
            .automatic()
            .build();
        let settlement = Settlement::create(&[], request, &engine_config()).unwrap();

        assert_eq!(settlement.status(), SettlementStatus::Sent);
        assert!(settlement.approval().unwrap().automatic);
    }

    #[test]
    fn test_negative_decision_discards() {
        let mut settlement = create(employer_only());
        settlement.approve(Approval::manual(CASE_HANDLER, false)).unwrap();
        assert_eq!(settlement.status(), SettlementStatus::Discarded);
    }

    #[test]
    fn test_approval_outside_created_fails() {
        let mut settlement = create(employer_only());
        settlement.approve(Approval::manual(CASE_HANDLER, true)).unwrap();

        let result = settlement.approve(Approval::manual(CASE_HANDLER, true));
        assert!(matches!(
            result,
            Err(SettlementError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_approval_emits_events() {
        let mut settlement = create(employer_only());
        settlement.take_events();
        settlement.approve(Approval::manual(CASE_HANDLER, true)).unwrap();

        let events = settlement.take_events();
        assert!(matches!(events[0], SettlementEvent::SettlementApproved { automatic: false, .. }));
        assert!(matches!(
            events[1],
            SettlementEvent::StatusChanged {
                from: SettlementStatus::Created,
                to: SettlementStatus::Sent,
                ..
            }
        ));
    }
}

// ============================================================================
// Outbound requests
// ============================================================================

mod request_tests {
    use super::*;

    #[test]
    fn test_preview_allowed_before_approval() {
        let settlement = create(split());
        let requests = settlement
            .preview(DateFixtures::ack_time(), CASE_HANDLER)
            .unwrap();

        assert_eq!(requests.len(), 2);
        let employer = &requests[0].order;
        assert_eq!(employer.track, TrackKind::EmployerRefund);
        assert_eq!(employer.correlation_id, settlement.correlation_id());
        assert_eq!(employer.lines.len(), 1);
        assert_money_eq(&employer.gross, dec!(11000));
        assert_money_eq(&requests[1].order.net, dec!(4741));
        assert_eq!(requests[0].actor, CASE_HANDLER);
    }

    #[test]
    fn test_transfer_requires_sent() {
        let settlement = create(employer_only());
        let result = settlement.request_transfer(DateFixtures::ack_time(), CASE_HANDLER);
        assert!(matches!(
            result,
            Err(SettlementError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_empty_track_sends_no_request() {
        let mut settlement = create(employer_only());
        LedgerSimulator::approve(&mut settlement);
        let requests = settlement
            .request_transfer(DateFixtures::ack_time(), CASE_HANDLER)
            .unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].order.track, TrackKind::EmployerRefund);
        assert_eq!(requests[0].order.payee, settlement.employer().payee().clone());
    }
}

// ============================================================================
// Ledger events
// ============================================================================

mod ledger_event_tests {
    use super::*;

    #[test]
    fn test_preview_result_is_routed_by_ledger_id_and_track() {
        let mut settlement = create(split());
        let mut misrouted = LedgerFixtures::preview(&settlement, TrackKind::EmployerRefund);
        misrouted.track = TrackKind::Person;

        assert_eq!(settlement.record_preview(&misrouted), EventOutcome::Ignored);
        assert_eq!(settlement.employer().status(), OrderStatus::Created);

        let preview = LedgerFixtures::preview(&settlement, TrackKind::EmployerRefund);
        assert_eq!(settlement.record_preview(&preview), EventOutcome::Applied);
        assert_eq!(settlement.employer().status(), OrderStatus::Previewed);
        assert_eq!(settlement.employer().preview(), Some(&preview));
        assert_eq!(settlement.person().status(), OrderStatus::Created);
        assert_eq!(settlement.status(), SettlementStatus::Created);
    }

    #[test]
    fn test_event_for_another_settlement_is_ignored() {
        let mut settlement = create(employer_only());
        LedgerSimulator::approve(&mut settlement);
        let mut confirmation = LedgerFixtures::transferred(&settlement, TrackKind::EmployerRefund);
        confirmation.settlement_id = SettlementId::new();

        assert_eq!(settlement.record_transferred(&confirmation), EventOutcome::Ignored);
        assert_eq!(settlement.employer().status(), OrderStatus::Created);
        assert!(settlement.employer().acknowledgements().is_empty());
    }

    #[test]
    fn test_transfer_and_receipt_settle() {
        let mut settlement = create(split());
        LedgerSimulator::approve(&mut settlement);

        LedgerSimulator::transfer(&mut settlement);
        assert_eq!(settlement.status(), SettlementStatus::Transferred);
        assert!(settlement.is_in_flight());
        assert_eq!(
            settlement.employer().reconciliation_key(),
            Some(LedgerFixtures::reconciliation_key(&settlement, TrackKind::EmployerRefund).as_str())
        );

        LedgerSimulator::answer(&mut settlement, TrackKind::EmployerRefund, ReceiptStatus::Accepted);
        assert_eq!(settlement.status(), SettlementStatus::Transferred);

        LedgerSimulator::answer(
            &mut settlement,
            TrackKind::Person,
            ReceiptStatus::AcceptedWithWarning,
        );
        assert_eq!(settlement.status(), SettlementStatus::Settled);
        assert!(!settlement.is_in_flight());
        assert_eq!(
            settlement.person().acknowledged_at(),
            Some(DateFixtures::ack_time())
        );
    }

    #[test]
    fn test_replayed_events_are_duplicates() {
        let mut settlement = create(employer_only());
        LedgerSimulator::approve(&mut settlement);
        let confirmation = LedgerFixtures::transferred(&settlement, TrackKind::EmployerRefund);
        let receipt =
            LedgerFixtures::receipt(&settlement, TrackKind::EmployerRefund, ReceiptStatus::Accepted);

        assert_eq!(settlement.record_transferred(&confirmation), EventOutcome::Applied);
        assert_eq!(settlement.record_receipt(&receipt), EventOutcome::Applied);
        let events_once = settlement.take_events().len();
        let status_once = settlement.status();

        assert_eq!(settlement.record_transferred(&confirmation), EventOutcome::Duplicate);
        assert_eq!(settlement.record_receipt(&receipt), EventOutcome::Duplicate);
        assert!(settlement.take_events().is_empty());
        assert!(events_once > 0);
        assert_eq!(settlement.status(), status_once);
        assert_eq!(settlement.employer().acknowledgements().len(), 2);
    }

    #[test]
    fn test_empty_order_never_leaves_created() {
        let mut settlement = create(employer_only());
        LedgerSimulator::settle(&mut settlement);

        assert_eq!(settlement.status(), SettlementStatus::Settled);
        assert_eq!(settlement.person().status(), OrderStatus::Created);
        assert!(settlement.person().transferred_at().is_none());
    }

    #[test]
    fn test_order_status_changes_are_recorded_as_events() {
        let mut settlement = create(employer_only());
        LedgerSimulator::approve(&mut settlement);
        settlement.take_events();
        LedgerSimulator::transfer(&mut settlement);

        let events = settlement.take_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SettlementEvent::OrderStatusChanged {
                track: TrackKind::EmployerRefund,
                from: OrderStatus::Created,
                to: OrderStatus::Transferred,
                ..
            }
        )));
    }
}

// ============================================================================
// Discard
// ============================================================================

mod discard_tests {
    use super::*;

    #[test]
    fn test_created_settlement_can_be_discarded() {
        let mut settlement = create(employer_only());
        settlement.discard(&[]).unwrap();
        assert_eq!(settlement.status(), SettlementStatus::Discarded);

        // Discarding again is a no-op
        settlement.discard(&[]).unwrap();
        assert_eq!(settlement.status(), SettlementStatus::Discarded);
    }

    #[test]
    fn test_sent_settlement_cannot_be_discarded() {
        let mut settlement = create(employer_only());
        LedgerSimulator::approve(&mut settlement);

        let result = settlement.discard(&[]);
        assert!(matches!(result, Err(SettlementError::NotDiscardable { .. })));
    }

    #[test]
    fn test_in_flight_settlement_cannot_be_discarded() {
        let mut settlement = create(employer_only());
        LedgerSimulator::approve(&mut settlement);
        LedgerSimulator::transfer(&mut settlement);

        assert!(settlement.is_in_flight());
        assert!(!settlement.can_discard(&[]));
    }

    #[test]
    fn test_failed_settlement_can_be_discarded() {
        let mut settlement = create(employer_only());
        LedgerSimulator::approve(&mut settlement);
        LedgerSimulator::transfer(&mut settlement);
        LedgerSimulator::answer(&mut settlement, TrackKind::EmployerRefund, ReceiptStatus::Rejected);

        assert_eq!(settlement.status(), SettlementStatus::SettlementFailed);
        assert!(settlement.can_discard(&[]));
    }
}

// ============================================================================
// Serialization
// ============================================================================

mod serialization_tests {
    use super::*;

    #[test]
    fn test_settlement_survives_a_json_round_trip() {
        let mut settlement = create(split());
        LedgerSimulator::settle(&mut settlement);

        let json = serde_json::to_string(&settlement).unwrap();
        let mut restored: Settlement = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id(), settlement.id());
        assert_eq!(restored.correlation_id(), settlement.correlation_id());
        assert_eq!(restored.status(), SettlementStatus::Settled);
        assert_eq!(restored.employer().lines(), settlement.employer().lines());
        assert_eq!(
            restored.person().acknowledgements(),
            settlement.person().acknowledgements()
        );
        assert!(restored.take_events().is_empty());
    }
}
