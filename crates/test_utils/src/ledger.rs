//! Simulated External Ledger
//!
//! Drives settlements through the ledger round trip the way the payment
//! system answers: a transfer confirmation per transferred order, then a
//! receipt per order.

use domain_settlement::{Approval, ReceiptStatus, Settlement, SettlementStatus, TrackKind};

use crate::fixtures::{DateFixtures, LedgerFixtures, CASE_HANDLER};

/// Answers transfer requests for a settlement
pub struct LedgerSimulator;

impl LedgerSimulator {
    /// Approves a created settlement on behalf of the case handler
    pub fn approve(settlement: &mut Settlement) {
        if settlement.status() == SettlementStatus::Created {
            settlement
                .approve(Approval::manual(CASE_HANDLER, true))
                .expect("created settlement can be approved");
        }
    }

    /// Tracks the settlement sends transfer requests for
    pub fn requested_tracks(settlement: &Settlement) -> Vec<TrackKind> {
        settlement
            .request_transfer(DateFixtures::ack_time(), CASE_HANDLER)
            .expect("settlement is sent")
            .into_iter()
            .map(|request| request.order.track)
            .collect()
    }

    /// Confirms every transfer request
    pub fn transfer(settlement: &mut Settlement) {
        for track in Self::requested_tracks(settlement) {
            let confirmation = LedgerFixtures::transferred(settlement, track);
            settlement.record_transferred(&confirmation);
        }
    }

    /// Sends a receipt for one order
    pub fn answer(settlement: &mut Settlement, track: TrackKind, status: ReceiptStatus) {
        let receipt = LedgerFixtures::receipt(settlement, track, status);
        settlement.record_receipt(&receipt);
    }

    /// Approves, transfers and accepts every order with something to send
    pub fn settle(settlement: &mut Settlement) {
        Self::approve(settlement);
        if settlement.status() != SettlementStatus::Sent {
            return;
        }
        let tracks = Self::requested_tracks(settlement);
        Self::transfer(settlement);
        for track in tracks {
            Self::answer(settlement, track, ReceiptStatus::Accepted);
        }
    }
}
