//! Resolution rules: when an Active claim becomes terminal, and how each vote
//! is judged once it does.
//!
//! Rules are checked in priority order:
//!
//! 1. **Expiry**: `now >= expires_at` resolves on the *current* score,
//!    skipping the dwell period.
//! 2. **Verified**: score has been `>= 0.75` for at least 48 hours.
//! 3. **Debunked**: score has been `<= 0.25` for at least 48 hours.
//! 4. **Inconclusive**: claim is at least 7 days old and its score lies
//!    strictly between the two thresholds.
//!
//! Everything in this module is a pure function of the claim and `now`, so a
//! sweep can be rerun from scratch at any time.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEBUNKED_THRESHOLD, HOUR_MS, INCONCLUSIVE_AGE_MS, RESOLUTION_DWELL_MS, VERIFIED_THRESHOLD,
};
use crate::types::{
    Claim, ClaimId, ClaimStance, ClaimStatus, EvidenceKind, EvidenceStance, ResolutionReason,
    VoteOutcome,
};

/// Result of evaluating one claim.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionCheck {
    /// The claim should transition now.
    Resolve { status: ClaimStatus, reason: ResolutionReason },
    /// Not yet; `explanation` says what is missing.
    Pending { explanation: String },
}

/// Terminal status implied by a score with no dwell requirement.
pub fn verdict_for_score(score: f64) -> ClaimStatus {
    if score >= VERIFIED_THRESHOLD {
        ClaimStatus::Verified
    } else if score <= DEBUNKED_THRESHOLD {
        ClaimStatus::Debunked
    } else {
        ClaimStatus::Inconclusive
    }
}

fn hours(ms: u64) -> f64 {
    ms as f64 / HOUR_MS as f64
}

/// Evaluate an Active claim against the resolution rules.
///
/// Terminal claims always report `Pending`; nothing leaves a terminal state.
pub fn evaluate(claim: &Claim, now: u64) -> ResolutionCheck {
    if claim.status.is_terminal() {
        return ResolutionCheck::Pending {
            explanation: format!("already {}", claim.status),
        };
    }

    if claim.is_expired(now) {
        return ResolutionCheck::Resolve {
            status: verdict_for_score(claim.trust_score),
            reason: ResolutionReason::Expired,
        };
    }

    if let Some(since) = claim.score_above_since {
        let held = now.saturating_sub(since);
        if held >= RESOLUTION_DWELL_MS {
            return ResolutionCheck::Resolve {
                status: ClaimStatus::Verified,
                reason: ResolutionReason::SustainedHigh,
            };
        }
        return ResolutionCheck::Pending {
            explanation: format!(
                "score >= {VERIFIED_THRESHOLD} for only {:.1} hours (need {})",
                hours(held),
                RESOLUTION_DWELL_MS / HOUR_MS
            ),
        };
    }

    if let Some(since) = claim.score_below_since {
        let held = now.saturating_sub(since);
        if held >= RESOLUTION_DWELL_MS {
            return ResolutionCheck::Resolve {
                status: ClaimStatus::Debunked,
                reason: ResolutionReason::SustainedLow,
            };
        }
        return ResolutionCheck::Pending {
            explanation: format!(
                "score <= {DEBUNKED_THRESHOLD} for only {:.1} hours (need {})",
                hours(held),
                RESOLUTION_DWELL_MS / HOUR_MS
            ),
        };
    }

    let age = now.saturating_sub(claim.created_at);
    let undecided = claim.trust_score > DEBUNKED_THRESHOLD && claim.trust_score < VERIFIED_THRESHOLD;
    if age >= INCONCLUSIVE_AGE_MS && undecided {
        return ResolutionCheck::Resolve {
            status: ClaimStatus::Inconclusive,
            reason: ResolutionReason::Stale,
        };
    }

    let explanation = if undecided {
        format!(
            "score {:.3} undecided; age {:.1} days (inconclusive at {})",
            claim.trust_score,
            hours(age) / 24.0,
            INCONCLUSIVE_AGE_MS / (24 * HOUR_MS)
        )
    } else {
        // Score is extreme but the stamp has not been written yet.
        format!("score {:.3} awaiting threshold stamp", claim.trust_score)
    };
    ResolutionCheck::Pending { explanation }
}

/// How an evidence vote fares under a verdict.
///
/// Under Verified, helpful-on-supporting and misleading-on-disputing are
/// correct. Debunked mirrors it. Inconclusive is always neutral.
pub fn evidence_vote_outcome(verdict: ClaimStatus, kind: EvidenceKind, stance: EvidenceStance) -> VoteOutcome {
    decided(verdict, evidence_vote_backs_claim(kind, stance))
}

/// Whether a vote on evidence of `kind` argues that the claim is true.
pub fn evidence_vote_backs_claim(kind: EvidenceKind, stance: EvidenceStance) -> bool {
    matches!(
        (kind, stance),
        (EvidenceKind::Supporting, EvidenceStance::Helpful)
            | (EvidenceKind::Disputing, EvidenceStance::Misleading)
    )
}

/// How a direct claim vote fares under a verdict.
pub fn claim_vote_outcome(verdict: ClaimStatus, stance: ClaimStance) -> VoteOutcome {
    decided(verdict, stance == ClaimStance::Verify)
}

fn decided(verdict: ClaimStatus, backs_claim: bool) -> VoteOutcome {
    match verdict {
        ClaimStatus::Verified if backs_claim => VoteOutcome::Correct,
        ClaimStatus::Debunked if !backs_claim => VoteOutcome::Correct,
        ClaimStatus::Verified | ClaimStatus::Debunked => VoteOutcome::Incorrect,
        ClaimStatus::Inconclusive | ClaimStatus::Active => VoteOutcome::Neutral,
    }
}

/// Characters of claim content shown in a candidate listing.
pub const PREVIEW_CHARS: usize = 50;

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Diagnostic view of an Active claim for moderators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionCandidate {
    pub claim_id: ClaimId,
    /// First [`PREVIEW_CHARS`] characters of the content.
    pub content_preview: String,
    pub trust_score: f64,
    pub created_at: u64,
    pub score_above_since: Option<u64>,
    pub score_below_since: Option<u64>,
    pub can_resolve: bool,
    /// Status the claim would take if resolved now.
    pub expected_status: Option<ClaimStatus>,
    pub reason: String,
}

impl ResolutionCandidate {
    pub fn for_claim(claim: &Claim, now: u64) -> Self {
        let (can_resolve, expected_status, reason) = match evaluate(claim, now) {
            ResolutionCheck::Resolve { status, reason } => {
                let text = match reason {
                    ResolutionReason::Expired => format!("expired; current score gives {status}"),
                    ResolutionReason::SustainedHigh => {
                        format!("score >= {VERIFIED_THRESHOLD} for at least 48 hours")
                    }
                    ResolutionReason::SustainedLow => {
                        format!("score <= {DEBUNKED_THRESHOLD} for at least 48 hours")
                    }
                    ResolutionReason::Stale => "older than 7 days with an undecided score".to_string(),
                };
                (true, Some(status), text)
            }
            ResolutionCheck::Pending { explanation } => (false, None, explanation),
        };
        Self {
            claim_id: claim.id,
            content_preview: preview(&claim.content),
            trust_score: claim.trust_score,
            created_at: claim.created_at,
            score_above_since: claim.score_above_since,
            score_below_since: claim.score_below_since,
            can_resolve,
            expected_status,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DAY_MS;

    fn claim_at(score: f64) -> Claim {
        let mut c = Claim::new("c".into(), None, None, 0);
        c.id = 1;
        c.trust_score = score;
        c
    }

    fn resolves_to(check: &ResolutionCheck) -> Option<ClaimStatus> {
        match check {
            ResolutionCheck::Resolve { status, .. } => Some(*status),
            ResolutionCheck::Pending { .. } => None,
        }
    }

    #[test]
    fn fresh_claim_pends() {
        assert_eq!(resolves_to(&evaluate(&claim_at(0.5), HOUR_MS)), None);
    }

    #[test]
    fn verified_after_dwell() {
        let mut c = claim_at(0.8);
        c.score_above_since = Some(0);
        assert_eq!(resolves_to(&evaluate(&c, 47 * HOUR_MS)), None);
        assert_eq!(resolves_to(&evaluate(&c, 48 * HOUR_MS)), Some(ClaimStatus::Verified));
    }

    #[test]
    fn debunked_after_dwell() {
        let mut c = claim_at(0.1);
        c.score_below_since = Some(10);
        assert_eq!(
            resolves_to(&evaluate(&c, 10 + RESOLUTION_DWELL_MS)),
            Some(ClaimStatus::Debunked)
        );
    }

    #[test]
    fn pending_explains_remaining_dwell() {
        let mut c = claim_at(0.8);
        c.score_above_since = Some(0);
        match evaluate(&c, 12 * HOUR_MS) {
            ResolutionCheck::Pending { explanation } => {
                assert_eq!(explanation, "score >= 0.75 for only 12.0 hours (need 48)")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn inconclusive_after_seven_days() {
        let c = claim_at(0.5);
        assert_eq!(resolves_to(&evaluate(&c, 7 * DAY_MS - 1)), None);
        assert_eq!(resolves_to(&evaluate(&c, 7 * DAY_MS)), Some(ClaimStatus::Inconclusive));
    }

    #[test]
    fn old_extreme_claim_waits_for_dwell() {
        // A week-old claim that only recently went extreme is not Inconclusive.
        let mut c = claim_at(0.9);
        c.score_above_since = Some(8 * DAY_MS - HOUR_MS);
        assert_eq!(resolves_to(&evaluate(&c, 8 * DAY_MS)), None);
    }

    #[test]
    fn expiry_uses_current_score() {
        for (score, status) in [
            (0.8, ClaimStatus::Verified),
            (0.75, ClaimStatus::Verified),
            (0.2, ClaimStatus::Debunked),
            (0.5, ClaimStatus::Inconclusive),
        ] {
            let mut c = claim_at(score);
            c.expires_at = Some(100);
            let check = evaluate(&c, 100);
            assert_eq!(
                check,
                ResolutionCheck::Resolve { status, reason: ResolutionReason::Expired },
                "score {score}"
            );
        }
    }

    #[test]
    fn terminal_never_resolves_again() {
        let mut c = claim_at(0.9);
        c.status = ClaimStatus::Debunked;
        c.expires_at = Some(0);
        c.score_above_since = Some(0);
        assert_eq!(resolves_to(&evaluate(&c, 30 * DAY_MS)), None);
    }

    #[test]
    fn evidence_outcome_mapping() {
        use EvidenceKind::*;
        use EvidenceStance::*;
        let v = ClaimStatus::Verified;
        let d = ClaimStatus::Debunked;
        assert_eq!(evidence_vote_outcome(v, Supporting, Helpful), VoteOutcome::Correct);
        assert_eq!(evidence_vote_outcome(v, Disputing, Misleading), VoteOutcome::Correct);
        assert_eq!(evidence_vote_outcome(v, Supporting, Misleading), VoteOutcome::Incorrect);
        assert_eq!(evidence_vote_outcome(v, Disputing, Helpful), VoteOutcome::Incorrect);
        assert_eq!(evidence_vote_outcome(d, Disputing, Helpful), VoteOutcome::Correct);
        assert_eq!(evidence_vote_outcome(d, Supporting, Misleading), VoteOutcome::Correct);
        assert_eq!(evidence_vote_outcome(d, Supporting, Helpful), VoteOutcome::Incorrect);
        assert_eq!(
            evidence_vote_outcome(ClaimStatus::Inconclusive, Supporting, Helpful),
            VoteOutcome::Neutral
        );
    }

    #[test]
    fn claim_outcome_mapping() {
        assert_eq!(claim_vote_outcome(ClaimStatus::Verified, ClaimStance::Verify), VoteOutcome::Correct);
        assert_eq!(claim_vote_outcome(ClaimStatus::Verified, ClaimStance::Debunk), VoteOutcome::Incorrect);
        assert_eq!(claim_vote_outcome(ClaimStatus::Debunked, ClaimStance::Debunk), VoteOutcome::Correct);
        assert_eq!(claim_vote_outcome(ClaimStatus::Inconclusive, ClaimStance::Debunk), VoteOutcome::Neutral);
    }

    #[test]
    fn candidate_reports_expected_status() {
        let mut c = claim_at(0.8);
        c.score_above_since = Some(0);
        let cand = ResolutionCandidate::for_claim(&c, 49 * HOUR_MS);
        assert!(cand.can_resolve);
        assert_eq!(cand.expected_status, Some(ClaimStatus::Verified));

        let cand = ResolutionCandidate::for_claim(&claim_at(0.5), HOUR_MS);
        assert!(!cand.can_resolve);
        assert!(cand.reason.contains("undecided"), "{}", cand.reason);
    }

    #[test]
    fn candidate_carries_stamps_and_preview() {
        let mut c = claim_at(0.8);
        c.content = "é".repeat(PREVIEW_CHARS + 10);
        c.created_at = 7;
        c.score_above_since = Some(HOUR_MS);
        let cand = ResolutionCandidate::for_claim(&c, 2 * HOUR_MS);
        assert_eq!(cand.created_at, 7);
        assert_eq!((cand.score_above_since, cand.score_below_since), (Some(HOUR_MS), None));
        assert_eq!(cand.content_preview, format!("{}...", "é".repeat(PREVIEW_CHARS)));

        let short = ResolutionCandidate::for_claim(&claim_at(0.5), HOUR_MS);
        assert_eq!(short.content_preview, "c");
    }
}
