//! Bayesian trust score aggregation.
//!
//! A claim's score is the mean of a Beta(alpha, beta) posterior. Starting from
//! a uniform prior, each piece of evidence the community finds net-helpful
//! adds `1 + ln(max(1, net))` to alpha (supporting) or beta (disputing), and
//! the summed weight of direct verify/debunk votes adds `1 + ln(1 + sum)` to
//! alpha or beta. Log scaling gives diminishing returns to large vote blocs.
//!
//! Every contribution is at least 1, so alpha and beta stay finite and
//! `>= 1`, and the score always lies strictly inside `(0, 1)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{DEBUNKED_THRESHOLD, PRIOR_ALPHA, PRIOR_BETA, VERIFIED_THRESHOLD};
use crate::types::{
    Claim, ClaimStance, ClaimVote, Evidence, EvidenceId, EvidenceKind, EvidenceStance,
    EvidenceVote, effective_weight,
};

/// Summed vote weight on one piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvidenceTally {
    pub kind: EvidenceKind,
    pub helpful_weight: f64,
    pub misleading_weight: f64,
}

impl EvidenceTally {
    pub fn net(&self) -> f64 {
        self.helpful_weight - self.misleading_weight
    }
}

/// Summed weight of direct votes on a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectTally {
    pub verify_weight: f64,
    pub debunk_weight: f64,
}

/// Result of an aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub alpha: f64,
    pub beta: f64,
    pub score: f64,
}

/// Clamp a running sum into the finite non-negative range.
fn sanitize(sum: f64) -> f64 {
    if sum.is_nan() || sum <= 0.0 {
        0.0
    } else {
        sum.min(f64::MAX)
    }
}

/// Posterior increment for evidence with positive net weight.
pub fn evidence_increment(net: f64) -> f64 {
    1.0 + sanitize(net).max(1.0).ln()
}

/// Posterior increment for a positive sum of direct vote weight.
pub fn direct_increment(sum: f64) -> f64 {
    1.0 + sanitize(sum).ln_1p()
}

/// Sum helpful and misleading weight per evidence item.
///
/// Votes referring to evidence not in `evidence` are ignored.
pub fn tally_evidence(evidence: &[Evidence], votes: &[EvidenceVote]) -> Vec<EvidenceTally> {
    let mut tallies: HashMap<EvidenceId, EvidenceTally> = evidence
        .iter()
        .map(|ev| {
            (
                ev.id,
                EvidenceTally { kind: ev.kind, helpful_weight: 0.0, misleading_weight: 0.0 },
            )
        })
        .collect();

    for vote in votes {
        if let Some(tally) = tallies.get_mut(&vote.evidence_id) {
            let w = effective_weight(vote.weight);
            match vote.stance {
                EvidenceStance::Helpful => tally.helpful_weight += w,
                EvidenceStance::Misleading => tally.misleading_weight += w,
            }
        }
    }

    // Deterministic order keeps floating-point sums reproducible.
    let mut ids: Vec<EvidenceId> = tallies.keys().copied().collect();
    ids.sort_unstable();
    ids.into_iter().filter_map(|id| tallies.remove(&id)).collect()
}

/// Sum verify and debunk weight across direct claim votes.
pub fn tally_direct(votes: &[ClaimVote]) -> DirectTally {
    votes.iter().fold(DirectTally::default(), |mut acc, vote| {
        let w = effective_weight(vote.weight);
        match vote.stance {
            ClaimStance::Verify => acc.verify_weight += w,
            ClaimStance::Debunk => acc.debunk_weight += w,
        }
        acc
    })
}

/// Compute the Beta posterior and its mean.
pub fn aggregate(evidence: &[EvidenceTally], direct: DirectTally) -> ScoreBreakdown {
    let mut alpha = PRIOR_ALPHA;
    let mut beta = PRIOR_BETA;

    for tally in evidence {
        let net = tally.net();
        if net > 0.0 {
            let inc = evidence_increment(net);
            match tally.kind {
                EvidenceKind::Supporting => alpha += inc,
                EvidenceKind::Disputing => beta += inc,
            }
        }
    }

    if sanitize(direct.verify_weight) > 0.0 {
        alpha += direct_increment(direct.verify_weight);
    }
    if sanitize(direct.debunk_weight) > 0.0 {
        beta += direct_increment(direct.debunk_weight);
    }

    // Avoid an inf/inf division in the (unreachable in practice) overflow case.
    let alpha = alpha.min(f64::MAX / 2.0);
    let beta = beta.min(f64::MAX / 2.0);

    ScoreBreakdown { alpha, beta, score: alpha / (alpha + beta) }
}

/// Convenience: tally and aggregate straight from stored records.
pub fn score_claim(evidence: &[Evidence], evidence_votes: &[EvidenceVote], claim_votes: &[ClaimVote]) -> ScoreBreakdown {
    aggregate(&tally_evidence(evidence, evidence_votes), tally_direct(claim_votes))
}

/// Apply a new score to a claim and maintain its threshold-crossing stamps.
///
/// A stamp is set the first time the score is at or past its threshold and
/// cleared as soon as the score falls back. Status is left untouched.
pub fn apply_score(claim: &mut Claim, score: f64, now: u64) {
    claim.trust_score = score;
    claim.updated_at = now;

    if score >= VERIFIED_THRESHOLD {
        claim.score_above_since.get_or_insert(now);
    } else {
        claim.score_above_since = None;
    }

    if score <= DEBUNKED_THRESHOLD {
        claim.score_below_since.get_or_insert(now);
    } else {
        claim.score_below_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClaimStatus, Hash256};
    use proptest::prelude::*;

    fn supporting(helpful: f64, misleading: f64) -> EvidenceTally {
        EvidenceTally { kind: EvidenceKind::Supporting, helpful_weight: helpful, misleading_weight: misleading }
    }

    fn disputing(helpful: f64, misleading: f64) -> EvidenceTally {
        EvidenceTally { kind: EvidenceKind::Disputing, helpful_weight: helpful, misleading_weight: misleading }
    }

    #[test]
    fn empty_claim_is_neutral() {
        let b = aggregate(&[], DirectTally::default());
        assert_eq!(b.alpha, 1.0);
        assert_eq!(b.beta, 1.0);
        assert_eq!(b.score, 0.5);
    }

    #[test]
    fn small_net_weight_adds_one() {
        // A single fresh helpful vote weighs 0.75; max(1, 0.75) keeps ln at zero.
        let b = aggregate(&[supporting(0.75, 0.0)], DirectTally::default());
        assert_eq!(b.alpha, 2.0);
        assert!((b.score - 2.0 / 3.0).abs() < 1e-12);
        assert!(b.score > 0.5 && b.score < 1.0);
    }

    #[test]
    fn log_scaling() {
        let b = aggregate(&[supporting(std::f64::consts::E, 0.0)], DirectTally::default());
        assert!((b.alpha - 3.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_net_contributes_nothing() {
        let b = aggregate(&[supporting(2.0, 2.0), disputing(1.0, 3.0)], DirectTally::default());
        assert_eq!(b.score, 0.5);
    }

    #[test]
    fn disputing_evidence_lowers_score() {
        let b = aggregate(&[disputing(5.0, 0.0)], DirectTally::default());
        assert!(b.score < 0.5);
    }

    #[test]
    fn direct_votes_use_ln_1p() {
        let b = aggregate(&[], DirectTally { verify_weight: 1.0, debunk_weight: 0.0 });
        assert!((b.alpha - (2.0 + 2f64.ln())).abs() < 1e-12);
        assert_eq!(b.beta, 1.0);
    }

    #[test]
    fn tally_groups_by_evidence() {
        let ev = vec![
            Evidence { id: 1, ..Evidence::new(1, EvidenceKind::Supporting, "a".into(), Hash256::ZERO, 0) },
            Evidence { id: 2, ..Evidence::new(1, EvidenceKind::Disputing, "b".into(), Hash256::ZERO, 0) },
        ];
        let vote = |evidence_id, stance, weight| EvidenceVote {
            id: 0,
            evidence_id,
            claim_id: 1,
            vote_key: Hash256::ZERO,
            voter: Hash256::ZERO,
            stance,
            stake: 1,
            weight,
            reputation_snapshot: 0.5,
            created_at: 0,
            settlement: None,
        };
        let votes = vec![
            vote(1, EvidenceStance::Helpful, 2.0),
            vote(1, EvidenceStance::Misleading, 0.5),
            vote(2, EvidenceStance::Helpful, 0.0), // unset weight counts as 1
            vote(99, EvidenceStance::Helpful, 7.0),
        ];
        let tallies = tally_evidence(&ev, &votes);
        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0], supporting(2.0, 0.5));
        assert_eq!(tallies[1], disputing(1.0, 0.0));
    }

    #[test]
    fn stamps_set_and_clear() {
        let mut claim = Claim::new("c".into(), None, None, 0);
        apply_score(&mut claim, 0.8, 10);
        assert_eq!(claim.score_above_since, Some(10));
        apply_score(&mut claim, 0.9, 20);
        assert_eq!(claim.score_above_since, Some(10), "stamp must not move while above");
        apply_score(&mut claim, 0.6, 30);
        assert_eq!(claim.score_above_since, None);
        apply_score(&mut claim, 0.25, 40);
        assert_eq!(claim.score_below_since, Some(40));
        apply_score(&mut claim, 0.3, 50);
        assert_eq!(claim.score_below_since, None);
        assert_eq!(claim.status, ClaimStatus::Active);
    }

    #[test]
    fn threshold_boundaries_are_inclusive() {
        let mut claim = Claim::new("c".into(), None, None, 0);
        apply_score(&mut claim, VERIFIED_THRESHOLD, 1);
        assert!(claim.score_above_since.is_some());
        apply_score(&mut claim, DEBUNKED_THRESHOLD, 2);
        assert!(claim.score_below_since.is_some());
        assert!(claim.score_above_since.is_none());
    }

    fn arb_tally() -> impl Strategy<Value = EvidenceTally> {
        (any::<bool>(), 0.0f64..1e6, 0.0f64..1e6).prop_map(|(support, h, m)| EvidenceTally {
            kind: if support { EvidenceKind::Supporting } else { EvidenceKind::Disputing },
            helpful_weight: h,
            misleading_weight: m,
        })
    }

    proptest! {
        #[test]
        fn score_strictly_inside_unit_interval(
            tallies in prop::collection::vec(arb_tally(), 0..50),
            verify in prop_oneof![Just(0.0), 0.0f64..1e9, Just(f64::MAX), Just(f64::INFINITY), Just(f64::NAN)],
            debunk in prop_oneof![Just(0.0), 0.0f64..1e9, Just(f64::MAX)],
        ) {
            let b = aggregate(&tallies, DirectTally { verify_weight: verify, debunk_weight: debunk });
            prop_assert!(b.score > 0.0 && b.score < 1.0, "score {} out of bounds", b.score);
            prop_assert!(b.alpha >= 1.0 && b.beta >= 1.0);
        }

        #[test]
        fn more_support_never_lowers_score(extra in 0.0f64..1e4, base in 0.0f64..1e4) {
            let lo = aggregate(&[supporting(base, 0.0)], DirectTally::default()).score;
            let hi = aggregate(&[supporting(base + extra, 0.0)], DirectTally::default()).score;
            prop_assert!(hi >= lo);
        }
    }
}
