//! End-to-end lifecycle tests for the Rumor engine.
//!
//! Each test drives an engine over a ledger with a simulated clock: claims
//! are created, voted on, swept, and settled, and the ledger is checked
//! afterwards. Most run in memory; the dwell lifecycle also runs on RocksDB.

use rumor_core::constants::{DAY_MS, HOUR_MS, INITIAL_POINTS};
use rumor_core::ledger::LedgerStore;
use rumor_core::resolution::ResolutionCheck;
use rumor_core::error::VoteError;
use rumor_core::types::{ClaimStance, ClaimStatus, EvidenceKind, EvidenceStance, ResolutionReason, VoteOutcome};
use rumor_tests::helpers::*;

#[test]
fn single_helpful_vote_moves_score_up() {
    let t = TestEngine::new();
    let claim = t.claim("the library is open 24h during finals");
    let ev = t.evidence(claim.id, EvidenceKind::Supporting, "librarian");

    let receipt = t.engine.submit_evidence_vote("reader", ev.id, EvidenceStance::Helpful, 1).unwrap();
    assert!(receipt.new_score > 0.5 && receipt.new_score < 1.0);
    assert_eq!(receipt.new_status, ClaimStatus::Active);
    assert_eq!(t.score(claim.id), receipt.new_score);
}

fn verifies_after_dwell_and_settles_once(t: TestEngine) {
    let claim = t.claim("midterm moved to thursday");
    let ev = t.evidence(claim.id, EvidenceKind::Supporting, "ta");
    for n in 0..4 {
        t.engine.submit_evidence_vote(&user(n), ev.id, EvidenceStance::Helpful, 5).unwrap();
        t.gap();
    }
    assert!(t.score(claim.id) >= 0.75);

    t.advance_hours(24);
    let candidates = t.engine.resolution_candidates().unwrap();
    assert!(!candidates[0].can_resolve);
    assert_eq!(candidates[0].expected_status, None);
    assert!(candidates[0].reason.contains("need 48"), "{}", candidates[0].reason);
    assert_eq!(candidates[0].created_at, T0);
    assert!(candidates[0].score_above_since.is_some());
    assert_eq!(candidates[0].score_below_since, None);
    assert_eq!(candidates[0].content_preview, "midterm moved to thursday");

    t.advance_hours(25);
    let report = t.engine.run_resolution_sweep().unwrap();
    assert_eq!(report.resolved_count, 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, ClaimStatus::Verified);
    assert_eq!(outcome.reason, Some(ResolutionReason::SustainedHigh));
    assert_eq!((outcome.settled_votes, outcome.failed_votes), (4, 0));

    for n in 0..4 {
        let stats = t.stats(&user(n));
        assert_eq!(stats.total_points, INITIAL_POINTS + 1);
        assert_eq!(stats.points_staked, 0);
        assert_eq!((stats.correct_votes, stats.total_votes), (1, 1));
    }

    let again = t.engine.run_resolution_sweep().unwrap();
    assert_eq!((again.resolved_count, again.resumed_settlements), (0, 0));
    assert!(t.engine.resolve_expired_claim(claim.id).unwrap().is_none());
    assert_eq!(t.stats(&user(0)).total_points, INITIAL_POINTS + 1);
    let votes = t.store.evidence_votes_for_claim(claim.id).unwrap();
    assert!(votes.iter().all(|v| v.settlement.map(|s| s.outcome) == Some(VoteOutcome::Correct)));
}

#[test]
fn sustained_high_score_verifies_after_dwell() {
    verifies_after_dwell_and_settles_once(TestEngine::new());
}

#[test]
fn sustained_high_score_verifies_after_dwell_on_rocksdb() {
    verifies_after_dwell_and_settles_once(TestEngine::with_rocks());
}

#[test]
fn sustained_low_score_debunks_and_charges_backers() {
    let t = TestEngine::new();
    let claim = t.claim("campus closes tomorrow");
    let ev = t.evidence(claim.id, EvidenceKind::Disputing, "registrar");
    for n in 0..4 {
        t.engine.submit_evidence_vote(&user(n), ev.id, EvidenceStance::Helpful, 5).unwrap();
        t.gap();
    }
    for n in 4..7 {
        t.engine.submit_claim_vote(&user(n), claim.id, ClaimStance::Debunk, 10).unwrap();
        t.gap();
    }
    t.engine.submit_claim_vote("believer", claim.id, ClaimStance::Verify, 2).unwrap();
    assert!(t.score(claim.id) <= 0.25, "score {}", t.score(claim.id));

    t.advance_hours(49);
    let report = t.engine.run_resolution_sweep().unwrap();
    assert_eq!(report.outcomes[0].status, ClaimStatus::Debunked);

    // Helpful on disputing evidence backed the right verdict.
    assert_eq!(t.stats(&user(0)).total_points, INITIAL_POINTS + 1);
    let believer = t.stats("believer");
    assert_eq!(believer.total_points, INITIAL_POINTS - 2);
    assert!(believer.reputation < 0.5);
}

#[test]
fn undecided_claim_goes_inconclusive_after_a_week() {
    let t = TestEngine::new();
    let claim = t.claim("the vending machine eats quarters");
    t.engine.submit_claim_vote("yes", claim.id, ClaimStance::Verify, 7).unwrap();
    t.gap();
    t.engine.submit_claim_vote("no", claim.id, ClaimStance::Debunk, 7).unwrap();

    t.clock.advance(6 * DAY_MS);
    assert_eq!(t.engine.run_resolution_sweep().unwrap().resolved_count, 0);

    t.clock.advance(2 * DAY_MS);
    let report = t.engine.run_resolution_sweep().unwrap();
    assert_eq!(report.outcomes[0].status, ClaimStatus::Inconclusive);
    assert_eq!(report.outcomes[0].reason, Some(ResolutionReason::Stale));

    for identity in ["yes", "no"] {
        let stats = t.stats(identity);
        assert_eq!((stats.total_points, stats.points_staked, stats.total_votes), (INITIAL_POINTS, 0, 0));
        assert_eq!(stats.reputation, 0.5);
    }
    let votes = t.store.claim_votes_for_claim(claim.id).unwrap();
    assert!(votes.iter().all(|v| v.settlement.map(|s| s.outcome) == Some(VoteOutcome::Neutral)));
}

#[test]
fn expiry_takes_precedence_and_uses_current_score() {
    let t = TestEngine::new();
    let claim = t.engine.create_claim("flash sale ends at noon", None, Some(T0 + 3 * HOUR_MS)).unwrap();
    let ev = t.evidence(claim.id, EvidenceKind::Supporting, "shopkeeper");
    for n in 0..3 {
        t.engine.submit_evidence_vote(&user(n), ev.id, EvidenceStance::Helpful, 10).unwrap();
        t.gap();
    }
    assert!(t.score(claim.id) >= 0.75);

    // Expired well before the 48h dwell would have verified it.
    t.advance_hours(4);
    let outcome = t.engine.resolve_expired_claim(claim.id).unwrap().unwrap();
    assert_eq!(outcome.status, ClaimStatus::Verified);
    assert_eq!(outcome.reason, Some(ResolutionReason::Expired));
}

#[test]
fn votes_rejected_once_claim_is_terminal() {
    let t = TestEngine::new();
    let claim = t.claim("quiet rumor");
    let ev = t.evidence(claim.id, EvidenceKind::Supporting, "someone");
    t.clock.advance(8 * DAY_MS);
    t.engine.run_resolution_sweep().unwrap();

    assert_eq!(
        t.engine.submit_claim_vote("late", claim.id, ClaimStance::Verify, 1),
        Err(VoteError::ClaimNotVotable(claim.id))
    );
    assert_eq!(
        t.engine.submit_evidence_vote("late", ev.id, EvidenceStance::Helpful, 1),
        Err(VoteError::ClaimNotVotable(claim.id))
    );
    assert!(t.engine.create_evidence(claim.id, EvidenceKind::Supporting, "more", "x").is_err());
    assert_eq!(t.stats("late").points_staked, 0);
}

#[test]
fn repeated_sweeps_never_settle_twice() {
    let t = TestEngine::new();
    let claim = t.claim("double pay day");
    let ev = t.evidence(claim.id, EvidenceKind::Supporting, "hr");
    for n in 0..3 {
        t.engine.submit_evidence_vote(&user(n), ev.id, EvidenceStance::Helpful, 10).unwrap();
        t.gap();
    }
    t.advance_hours(49);

    t.engine.run_resolution_sweep().unwrap();
    let after_first: Vec<_> = (0..3).map(|n| t.stats(&user(n))).collect();
    for _ in 0..5 {
        let report = t.engine.run_resolution_sweep().unwrap();
        assert_eq!((report.resolved_count, report.resumed_settlements), (0, 0));
        assert!(t.engine.resolve_expired_claim(claim.id).unwrap().is_none());
    }
    let after_many: Vec<_> = (0..3).map(|n| t.stats(&user(n))).collect();
    assert_eq!(after_first, after_many);
}

#[test]
fn score_drop_resets_dwell_timer() {
    let t = TestEngine::new();
    let claim = t.claim("free parking this weekend");
    let support = t.evidence(claim.id, EvidenceKind::Supporting, "guard");
    t.engine.submit_evidence_vote(&user(0), support.id, EvidenceStance::Helpful, 10).unwrap();
    assert!(t.score(claim.id) >= 0.75);
    let first_stamp = t.store.get_claim(claim.id).unwrap().unwrap().score_above_since;

    t.advance_hours(30);
    let dispute = t.evidence(claim.id, EvidenceKind::Disputing, "city");
    for n in 1..4 {
        t.engine.submit_evidence_vote(&user(n), dispute.id, EvidenceStance::Helpful, 10).unwrap();
        t.gap();
    }
    let mid = t.store.get_claim(claim.id).unwrap().unwrap();
    assert!(mid.trust_score < 0.75);
    assert!(mid.score_above_since.is_none());

    t.advance_hours(20);
    assert_eq!(t.engine.run_resolution_sweep().unwrap().resolved_count, 0);
    assert!(first_stamp.is_some());
}

#[test]
fn claim_detail_reports_history_newest_first() {
    let t = TestEngine::new();
    let claim = t.claim("concert tickets half price");
    let ev = t.evidence(claim.id, EvidenceKind::Supporting, "promoter");
    t.engine.submit_evidence_vote("fan", ev.id, EvidenceStance::Helpful, 3).unwrap();
    t.gap();
    t.engine.submit_claim_vote("critic", claim.id, ClaimStance::Debunk, 3).unwrap();

    let detail = t.engine.get_claim(claim.id).unwrap();
    assert_eq!(detail.evidence.len(), 1);
    assert_eq!(detail.evidence[0].helpful_count, 1);
    assert_eq!(detail.history.len(), 2);
    assert!(detail.history[0].created_at >= detail.history[1].created_at);
    assert_eq!(detail.history[0].new_score, detail.claim.trust_score);
}

#[test]
fn pending_explanations_match_sweep() {
    let t = TestEngine::new();
    let claim = t.claim("snow day friday");
    t.advance_hours(12);
    let stored = t.store.get_claim(claim.id).unwrap().unwrap();
    match rumor_core::resolution::evaluate(&stored, t.engine.now()) {
        ResolutionCheck::Pending { explanation } => assert!(explanation.contains("undecided")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(t.engine.run_resolution_sweep().unwrap().resolved_count, 0);
}
