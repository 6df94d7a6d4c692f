//! Cancellation, ledger-id lookup and basic-rate adjustment tests

use rust_decimal_macros::dec;

use core_kernel::LedgerId;
use domain_settlement::{
    cancel, find_by_ledger_id, find_track, plan_basic_rate_adjustment, ApprovalPolicy,
    CancellationRequest, ChangeCode, EconomicTimeline, ReceiptStatus, Settlement,
    SettlementError, SettlementKind, SettlementStatus, TrackKind,
};
use test_utils::{
    assert_money_eq, assert_same_chain, assert_sequences_contiguous, engine_config,
    init_test_tracing, DateFixtures as D, LedgerFixtures, LedgerSimulator, PayeeFixtures,
    SettlementRequestBuilder, TimelineBuilder, CASE_HANDLER, SYSTEM_USER,
};

fn january(employer: rust_decimal::Decimal, person: rust_decimal::Decimal) -> EconomicTimeline {
    TimelineBuilder::starting(D::jan(1))
        .waiting_period(16)
        .paid(15, employer, person)
        .build()
}

fn create(previous: &[Settlement], timeline: EconomicTimeline) -> Settlement {
    init_test_tracing();
    Settlement::create(
        previous,
        SettlementRequestBuilder::new(timeline).build(),
        &engine_config(),
    )
    .unwrap()
}

fn settled(previous: &[Settlement], timeline: EconomicTimeline) -> Settlement {
    let mut settlement = create(previous, timeline);
    LedgerSimulator::settle(&mut settlement);
    settlement
}

fn ledger_id(settlement: &Settlement, track: TrackKind) -> String {
    LedgerFixtures::ledger_id(settlement, track).to_string()
}

// ============================================================================
// Lookup
// ============================================================================

mod lookup_tests {
    use super::*;

    #[test]
    fn test_finds_settlement_by_either_track() {
        let settlement = settled(&[], january(dec!(1000), dec!(431)));
        let all = vec![settlement];

        let employer = ledger_id(&all[0], TrackKind::EmployerRefund);
        let person = ledger_id(&all[0], TrackKind::Person);

        assert_eq!(
            find_track(&employer, &all).map(|(s, t)| (s.id(), t)),
            Some((all[0].id(), TrackKind::EmployerRefund))
        );
        assert_eq!(
            find_track(&person, &all).map(|(s, t)| (s.id(), t)),
            Some((all[0].id(), TrackKind::Person))
        );
    }

    #[test]
    fn test_unknown_or_malformed_id_matches_nothing() {
        let all = vec![settled(&[], january(dec!(1431), dec!(0)))];

        assert!(find_by_ledger_id(&LedgerId::new().to_string(), &all).is_none());
        assert!(find_by_ledger_id("not-a-ledger-id", &all).is_none());
        assert!(find_by_ledger_id("", &all).is_none());
    }

    #[test]
    fn test_bare_uuid_is_accepted() {
        let all = vec![settled(&[], january(dec!(1431), dec!(0)))];
        let uuid = LedgerFixtures::ledger_id(&all[0], TrackKind::EmployerRefund)
            .as_uuid()
            .to_string();

        assert_eq!(find_by_ledger_id(&uuid, &all).map(Settlement::id), Some(all[0].id()));
    }

    #[test]
    fn test_latest_settlement_of_the_chain_wins() {
        let first = settled(&[], january(dec!(1431), dec!(0)));
        let extended = TimelineBuilder::starting(D::jan(1))
            .waiting_period(16)
            .refunded(20, dec!(1431))
            .build();
        let second = create(&[first.clone()], extended);
        let all = vec![first, second];

        let found = find_by_ledger_id(&ledger_id(&all[0], TrackKind::EmployerRefund), &all);
        assert_eq!(found.map(Settlement::id), Some(all[1].id()));
    }

    #[test]
    fn test_discarded_settlements_are_skipped() {
        let mut only = create(&[], january(dec!(1431), dec!(0)));
        let id = ledger_id(&only, TrackKind::EmployerRefund);
        only.discard(&[]).unwrap();

        assert!(find_by_ledger_id(&id, &[only]).is_none());
    }
}

// ============================================================================
// Cancel
// ============================================================================

mod cancel_tests {
    use super::*;

    #[test]
    fn test_unknown_ledger_id_is_not_found() {
        let mut chain = vec![settled(&[], january(dec!(1431), dec!(0)))];
        let request = CancellationRequest::new(LedgerId::new().to_string(), CASE_HANDLER);

        assert!(matches!(
            cancel(&mut chain, &request),
            Err(SettlementError::NotFound(_))
        ));
    }

    #[test]
    fn test_person_ledger_id_is_unsupported() {
        let mut chain = vec![settled(&[], january(dec!(1000), dec!(431)))];
        let request = CancellationRequest::new(ledger_id(&chain[0], TrackKind::Person), CASE_HANDLER);

        assert!(matches!(
            cancel(&mut chain, &request),
            Err(SettlementError::UnsupportedCancellationTarget(_))
        ));
        assert!(chain[0].superseded_by().is_none());
    }

    #[test]
    fn test_unsent_or_in_flight_chain_is_not_cancellable() {
        let mut chain = vec![create(&[], january(dec!(1431), dec!(0)))];
        let request =
            CancellationRequest::new(ledger_id(&chain[0], TrackKind::EmployerRefund), CASE_HANDLER);
        assert!(matches!(
            cancel(&mut chain, &request),
            Err(SettlementError::NotCancellable(_))
        ));

        LedgerSimulator::approve(&mut chain[0]);
        LedgerSimulator::transfer(&mut chain[0]);
        assert!(matches!(
            cancel(&mut chain, &request),
            Err(SettlementError::NotCancellable(_))
        ));
    }

    #[test]
    fn test_chain_cannot_be_cancelled_twice() {
        let mut chain = vec![settled(&[], january(dec!(1431), dec!(0)))];
        let request =
            CancellationRequest::new(ledger_id(&chain[0], TrackKind::EmployerRefund), CASE_HANDLER)
                .with_approval_policy(ApprovalPolicy::Automatic {
                    approver: SYSTEM_USER.to_string(),
                });
        let mut cancellation = cancel(&mut chain, &request).unwrap();
        LedgerSimulator::settle(&mut cancellation);
        chain.push(cancellation);

        assert!(matches!(
            cancel(&mut chain, &request),
            Err(SettlementError::ChainCancelled(_))
        ));
    }

    #[test]
    fn test_cancellation_covers_the_whole_chain() {
        let first = settled(&[], january(dec!(1431), dec!(0)));
        let extended = TimelineBuilder::starting(D::jan(1))
            .waiting_period(16)
            .refunded(15, dec!(1431))
            .with_degree(50)
            .refunded(15, dec!(715.5))
            .build();
        let second = settled(&[first.clone()], extended);
        let mut chain = vec![first, second];

        // Addressed by the id both settlements share
        let request =
            CancellationRequest::new(ledger_id(&chain[0], TrackKind::EmployerRefund), CASE_HANDLER);
        let cancellation = cancel(&mut chain, &request).unwrap();

        let employer = cancellation.employer();
        assert_eq!(employer.lines().len(), 2);
        let terminated = employer.lines().iter().find(|l| l.is_terminated()).unwrap();
        assert_eq!(terminated.sequence(), 2);
        assert_eq!(terminated.termination().unwrap().effective_from, D::jan(17));
        assert_money_eq(&employer.gross(), dec!(0));
        assert_money_eq(&employer.net(), dec!(-23611.5));
        assert_sequences_contiguous(employer);

        assert!(chain[0].superseded_by().is_none());
        assert_eq!(chain[1].superseded_by(), Some(cancellation.id()));
    }

    #[test]
    fn test_failed_chain_cancels_only_what_the_ledger_holds() {
        let mut first = create(&[], january(dec!(1000), dec!(431)));
        LedgerSimulator::approve(&mut first);
        LedgerSimulator::transfer(&mut first);
        LedgerSimulator::answer(&mut first, TrackKind::EmployerRefund, ReceiptStatus::Accepted);
        LedgerSimulator::answer(&mut first, TrackKind::Person, ReceiptStatus::Rejected);
        assert_eq!(first.status(), SettlementStatus::SettlementFailed);

        let mut chain = vec![first];
        let request =
            CancellationRequest::new(ledger_id(&chain[0], TrackKind::EmployerRefund), CASE_HANDLER);
        let cancellation = cancel(&mut chain, &request).unwrap();

        assert_eq!(cancellation.employer().changed_lines().count(), 1);
        assert!(!cancellation.person().has_changes());
        assert_eq!(cancellation.person().payee(), &PayeeFixtures::person());
    }

    #[test]
    fn test_cancellation_events() {
        let mut chain = vec![settled(&[], january(dec!(1431), dec!(0)))];
        chain[0].take_events();
        let request =
            CancellationRequest::new(ledger_id(&chain[0], TrackKind::EmployerRefund), CASE_HANDLER);
        let mut cancellation = cancel(&mut chain, &request).unwrap();

        assert_eq!(chain[0].take_events().len(), 1);
        assert_eq!(cancellation.take_events().len(), 1);
    }
}

// ============================================================================
// Basic-rate adjustment
// ============================================================================

mod adjustment_tests {
    use super::*;

    #[test]
    fn test_adjustment_continues_the_chain() {
        let first = settled(&[], january(dec!(1431), dec!(0)));
        let all = vec![first];
        let raised = SettlementRequestBuilder::new(january(dec!(1500), dec!(0))).build();

        let supplement = plan_basic_rate_adjustment(
            &all,
            &ledger_id(&all[0], TrackKind::EmployerRefund),
            raised,
            &engine_config(),
        )
        .unwrap();

        assert_eq!(supplement.kind(), SettlementKind::YearEndSupplement);
        assert_same_chain(&all[0], &supplement);
        let lines = supplement.employer().lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].change(), ChangeCode::Changed);
        // 11 weekdays raised by 69
        assert_money_eq(&supplement.net(TrackKind::EmployerRefund), dec!(759));
    }

    #[test]
    fn test_adjustment_of_unknown_id_fails() {
        let all = vec![settled(&[], january(dec!(1431), dec!(0)))];
        let request = SettlementRequestBuilder::new(january(dec!(1500), dec!(0))).build();

        let result = plan_basic_rate_adjustment(
            &all,
            &LedgerId::new().to_string(),
            request,
            &engine_config(),
        );
        assert!(matches!(result, Err(SettlementError::NotFound(_))));
    }

    #[test]
    fn test_adjustment_of_cancelled_chain_fails() {
        let mut chain = vec![settled(&[], january(dec!(1431), dec!(0)))];
        let id = ledger_id(&chain[0], TrackKind::EmployerRefund);
        let cancellation = cancel(&mut chain, &CancellationRequest::new(id.clone(), CASE_HANDLER))
            .unwrap();
        chain.push(cancellation);

        let request = SettlementRequestBuilder::new(january(dec!(1500), dec!(0))).build();
        let result = plan_basic_rate_adjustment(&chain, &id, request, &engine_config());
        assert!(matches!(result, Err(SettlementError::ChainCancelled(_))));
    }
}
