//! Ledger-id lookup and basic-rate adjustment
//!
//! Ledger messages and case handlers address a chain by the flat ledger id of
//! one of its orders. These helpers find the settlement behind such an id and
//! plan the year-end supplement that re-settles a chain with a new basic rate.

use tracing::{info, instrument};

use core_kernel::LedgerId;

use crate::config::EngineConfig;
use crate::error::SettlementError;
use crate::order::TrackKind;
use crate::settlement::{Settlement, SettlementKind, SettlementRequest, SettlementStatus};

/// Settlement, and the track within it, that carries `ledger_id`
///
/// Discarded settlements are skipped. When several settlements of a chain
/// carry the id, the latest one wins.
pub fn find_track<'a>(
    ledger_id: &str,
    settlements: &'a [Settlement],
) -> Option<(&'a Settlement, TrackKind)> {
    let ledger_id: LedgerId = ledger_id.trim().parse().ok()?;
    settlements
        .iter()
        .rev()
        .filter(|s| s.status() != SettlementStatus::Discarded)
        .find_map(|s| s.track_for(ledger_id).map(|track| (s, track)))
}

/// Settlement whose employer or person order carries `ledger_id`
pub fn find_by_ledger_id<'a>(
    ledger_id: &str,
    settlements: &'a [Settlement],
) -> Option<&'a Settlement> {
    find_track(ledger_id, settlements).map(|(settlement, _)| settlement)
}

/// Latest non-discarded settlement of the chain `member` belongs to
pub(crate) fn latest_in_chain<'a>(
    member: &Settlement,
    settlements: &'a [Settlement],
) -> Option<&'a Settlement> {
    settlements.iter().rev().find(|s| {
        s.correlation_id() == member.correlation_id() && s.status() != SettlementStatus::Discarded
    })
}

/// Computes a year-end supplement for the chain carrying `ledger_id`
///
/// The supplement continues the chain's latest settlement regardless of the
/// gap rule, so the recomputed rates replace the old ones on the same ledger
/// ids.
///
/// # Errors
///
/// - `NotFound` when no settlement carries the id
/// - `ChainCancelled` when the chain already ends in a cancellation
/// - `InvalidTimeline` when the recomputed timeline is structurally invalid
#[instrument(skip_all, fields(ledger_id = ledger_id))]
pub fn plan_basic_rate_adjustment(
    settlements: &[Settlement],
    ledger_id: &str,
    request: SettlementRequest,
    config: &EngineConfig,
) -> Result<Settlement, SettlementError> {
    let found = find_by_ledger_id(ledger_id, settlements)
        .ok_or_else(|| SettlementError::NotFound(ledger_id.to_string()))?;
    let latest = latest_in_chain(found, settlements).unwrap_or(found);
    if latest.kind() == SettlementKind::Cancellation {
        return Err(SettlementError::ChainCancelled(
            latest.correlation_id().to_string(),
        ));
    }

    let request = request.with_kind(SettlementKind::YearEndSupplement);
    request.timeline.validate(request.covered_through)?;

    let supplement = Settlement::continuing(settlements, Some(latest), request, config)?;
    info!(
        continues = %latest.id(),
        supplement = %supplement.id(),
        "basic-rate adjustment planned"
    );
    Ok(supplement)
}
