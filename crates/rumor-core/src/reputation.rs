//! Reputation, point balances, and vote pricing.
//!
//! Staking locks points rather than spending them: `points_staked` grows when
//! a vote is accepted and shrinks when it settles, while `total_points` only
//! changes on settlement.

use crate::constants::{
    CORRECT_REWARD_PERCENT, CREDIBILITY_SATURATION_POINTS, INITIAL_POINTS, INITIAL_REPUTATION,
    MAX_STAKE, MIN_STAKE,
};
use crate::error::VoteError;
use crate::types::{Hash256, Settlement, UserAccount, UserStats, VoteOutcome};

/// Reject stakes outside the accepted range.
pub fn validate_stake(stake: u64) -> Result<(), VoteError> {
    if (MIN_STAKE..=MAX_STAKE).contains(&stake) {
        Ok(())
    } else {
        Err(VoteError::InvalidStake(stake))
    }
}

/// Wealth-based credibility for direct claim votes, saturating at 1.0.
pub fn credibility(total_points: u64) -> f64 {
    let c = (total_points as f64).ln_1p() / (CREDIBILITY_SATURATION_POINTS as f64).ln_1p();
    c.min(1.0)
}

/// `reputation × (1 + quality) × stake × multiplier`.
pub fn evidence_vote_weight(reputation: f64, quality: f64, stake: u64, multiplier: f64) -> f64 {
    reputation * (1.0 + quality) * stake as f64 * multiplier
}

/// `reputation × credibility × stake × multiplier`.
pub fn claim_vote_weight(reputation: f64, credibility: f64, stake: u64, multiplier: f64) -> f64 {
    reputation * credibility * stake as f64 * multiplier
}

/// Points awarded for a correct vote: 20% of the stake, floored, at least 1.
pub fn reward_for(stake: u64) -> u64 {
    (stake.saturating_mul(CORRECT_REWARD_PERCENT) / 100).max(1)
}

/// Laplace-smoothed accuracy.
pub fn smoothed_reputation(correct: u64, total: u64) -> f64 {
    (correct as f64 + 1.0) / (total as f64 + 2.0)
}

/// Stats reported for an identity that has never voted.
pub fn default_stats() -> UserStats {
    UserStats {
        reputation: INITIAL_REPUTATION,
        total_points: INITIAL_POINTS,
        points_staked: 0,
        correct_votes: 0,
        total_votes: 0,
    }
}

impl UserAccount {
    /// A fresh account with the starting balance and neutral reputation.
    pub fn new(key: Hash256, now: u64) -> Self {
        Self {
            key,
            reputation: INITIAL_REPUTATION,
            total_points: INITIAL_POINTS,
            points_staked: 0,
            correct_votes: 0,
            total_votes: 0,
            created_at: now,
        }
    }

    /// Points not locked by unresolved votes.
    pub fn available(&self) -> u64 {
        self.total_points.saturating_sub(self.points_staked)
    }

    /// Admission check for a new stake.
    pub fn check_stake(&self, stake: u64) -> Result<(), VoteError> {
        let available = self.available();
        if stake > available {
            return Err(VoteError::InsufficientPoints { available, stake });
        }
        Ok(())
    }

    /// Check and lock `stake` in one step.
    pub fn lock_stake(&mut self, stake: u64) -> Result<(), VoteError> {
        self.check_stake(stake)?;
        self.points_staked += stake;
        Ok(())
    }

    /// Settle a vote of `stake` points and return the settlement record.
    ///
    /// The stake is always unlocked. A decided outcome also moves points and
    /// counts toward reputation; a neutral one does neither.
    pub fn settle(&mut self, stake: u64, outcome: VoteOutcome, now: u64) -> Settlement {
        self.points_staked = self.points_staked.saturating_sub(stake);

        let (points_gained, points_lost) = match outcome {
            VoteOutcome::Correct => (reward_for(stake), 0),
            VoteOutcome::Incorrect => (0, stake.min(self.total_points)),
            VoteOutcome::Neutral => (0, 0),
        };

        if outcome != VoteOutcome::Neutral {
            self.total_points = self.total_points.saturating_add(points_gained) - points_lost;
            self.total_votes = self.total_votes.saturating_add(1);
            if outcome == VoteOutcome::Correct {
                self.correct_votes = self.correct_votes.saturating_add(1);
            }
            self.reputation = smoothed_reputation(self.correct_votes, self.total_votes);
        }

        // Losing points can never leave more locked than owned.
        self.points_staked = self.points_staked.min(self.total_points);

        Settlement { outcome, points_gained, points_lost, resolved_at: now }
    }
}
