//! Core data model: claims, evidence, votes, users, and the audit trail.
//!
//! Timestamps are Unix milliseconds. Points are whole integers; scores,
//! weights, and reputation are `f64`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{DEFAULT_EVIDENCE_QUALITY, NEUTRAL_SCORE};

/// Claim identifier, assigned sequentially by the store.
pub type ClaimId = u64;
/// Evidence identifier, assigned sequentially by the store.
pub type EvidenceId = u64;
/// Vote identifier, assigned sequentially by the store.
pub type VoteId = u64;

/// A 32-byte keyed digest.
///
/// Used for user ledger keys, per-resource duplicate-vote keys, and evidence
/// creator keys. None of these can be reversed to the raw identity.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated hex form for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Lifecycle state of a claim. Only `Active` is non-terminal.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
pub enum ClaimStatus {
    #[default]
    Active,
    Verified,
    Debunked,
    Inconclusive,
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Verified => "Verified",
            Self::Debunked => "Debunked",
            Self::Inconclusive => "Inconclusive",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unverified statement under community evaluation (a "rumor").
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct Claim {
    pub id: ClaimId,
    pub content: String,
    pub image_url: Option<String>,
    /// Current Beta-posterior mean in `(0, 1)`.
    pub trust_score: f64,
    pub status: ClaimStatus,
    pub created_at: u64,
    pub updated_at: u64,
    /// External deadline after which the claim resolves on its current score.
    pub expires_at: Option<u64>,
    /// When the score last rose to or above the Verified threshold, if it is still there.
    pub score_above_since: Option<u64>,
    /// When the score last fell to or below the Debunked threshold, if it is still there.
    pub score_below_since: Option<u64>,
    pub resolved_at: Option<u64>,
}

impl Claim {
    /// A fresh Active claim with a neutral score. The store assigns `id`.
    pub fn new(content: String, image_url: Option<String>, expires_at: Option<u64>, now: u64) -> Self {
        Self {
            id: 0,
            content,
            image_url,
            trust_score: NEUTRAL_SCORE,
            status: ClaimStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at,
            score_above_since: None,
            score_below_since: None,
            resolved_at: None,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Whether a piece of evidence argues for or against its claim.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum EvidenceKind {
    Supporting,
    Disputing,
}

/// A supporting or disputing submission attached to a claim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct Evidence {
    pub id: EvidenceId,
    pub claim_id: ClaimId,
    pub kind: EvidenceKind,
    pub content: String,
    /// Creator key of the submitter; used to block self-votes.
    pub creator_key: Hash256,
    /// Cached count of helpful votes, maintained by the vote commit.
    pub helpful_count: u64,
    /// Cached count of misleading votes, maintained by the vote commit.
    pub misleading_count: u64,
    pub created_at: u64,
}

impl Evidence {
    pub fn new(claim_id: ClaimId, kind: EvidenceKind, content: String, creator_key: Hash256, now: u64) -> Self {
        Self {
            id: 0,
            claim_id,
            kind,
            content,
            creator_key,
            helpful_count: 0,
            misleading_count: 0,
            created_at: now,
        }
    }

    /// Share of prior votes that found this evidence helpful, or 0.5 if unvoted.
    pub fn quality(&self) -> f64 {
        let total = self.helpful_count + self.misleading_count;
        if total == 0 {
            return DEFAULT_EVIDENCE_QUALITY;
        }
        self.helpful_count as f64 / total as f64
    }

    /// Bump the cached tally for one new vote.
    pub fn count_vote(&mut self, stance: EvidenceStance) {
        match stance {
            EvidenceStance::Helpful => self.helpful_count = self.helpful_count.saturating_add(1),
            EvidenceStance::Misleading => {
                self.misleading_count = self.misleading_count.saturating_add(1)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// A voter's judgement of a piece of evidence.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum EvidenceStance {
    Helpful,
    Misleading,
}

/// A voter's direct judgement of a claim.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum ClaimStance {
    Verify,
    Debunk,
}

/// How a vote fared once its claim resolved.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum VoteOutcome {
    Correct,
    Incorrect,
    /// Inconclusive verdict: stake unlocked, nothing gained or lost.
    Neutral,
}

/// Post-resolution bookkeeping for a vote. Written exactly once.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Settlement {
    pub outcome: VoteOutcome,
    pub points_gained: u64,
    pub points_lost: u64,
    pub resolved_at: u64,
}

impl Settlement {
    /// `Some(true/false)` for a decided vote, `None` for an inconclusive one.
    pub fn was_correct(&self) -> Option<bool> {
        match self.outcome {
            VoteOutcome::Correct => Some(true),
            VoteOutcome::Incorrect => Some(false),
            VoteOutcome::Neutral => None,
        }
    }
}

/// A staked vote on the quality of a piece of evidence.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct EvidenceVote {
    pub id: VoteId,
    pub evidence_id: EvidenceId,
    /// Denormalized so a claim's votes can be loaded without joining through evidence.
    pub claim_id: ClaimId,
    /// Duplicate-vote key, unique per identity per evidence.
    pub vote_key: Hash256,
    /// Ledger key of the voter, needed to settle the stake.
    pub voter: Hash256,
    pub stance: EvidenceStance,
    pub stake: u64,
    pub weight: f64,
    /// Voter reputation at the time of the vote.
    pub reputation_snapshot: f64,
    pub created_at: u64,
    pub settlement: Option<Settlement>,
}

/// A staked vote directly on a claim's truth.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct ClaimVote {
    pub id: VoteId,
    pub claim_id: ClaimId,
    pub vote_key: Hash256,
    pub voter: Hash256,
    pub stance: ClaimStance,
    pub stake: u64,
    pub weight: f64,
    pub reputation_snapshot: f64,
    pub credibility_snapshot: f64,
    pub created_at: u64,
    pub settlement: Option<Settlement>,
}

/// Weight of a vote as seen by the aggregator; unset or corrupt weights count as 1.
pub fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 { weight } else { 1.0 }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Reputation and point ledger for one identity.
///
/// Invariant: `points_staked <= total_points`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct UserAccount {
    pub key: Hash256,
    /// Laplace-smoothed accuracy, `(correct + 1) / (total + 2)`.
    pub reputation: f64,
    pub total_points: u64,
    /// Points locked by unresolved votes.
    pub points_staked: u64,
    pub correct_votes: u64,
    pub total_votes: u64,
    pub created_at: u64,
}

/// Public view of a user's ledger entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserStats {
    pub reputation: f64,
    pub total_points: u64,
    pub points_staked: u64,
    pub correct_votes: u64,
    pub total_votes: u64,
}

impl From<&UserAccount> for UserStats {
    fn from(user: &UserAccount) -> Self {
        Self {
            reputation: user.reputation,
            total_points: user.total_points,
            points_staked: user.points_staked,
            correct_votes: user.correct_votes,
            total_votes: user.total_votes,
        }
    }
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// Why a claim reached its terminal status.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum ResolutionReason {
    /// Score held at or above the Verified threshold for the dwell period.
    SustainedHigh,
    /// Score held at or below the Debunked threshold for the dwell period.
    SustainedLow,
    /// Claim aged out with an undecided score.
    Stale,
    /// External expiry deadline passed.
    Expired,
}

/// What an audit entry records.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub enum AuditEvent {
    ScoreUpdate { alpha: f64, beta: f64 },
    Resolution { status: ClaimStatus, reason: ResolutionReason },
}

/// Append-only record of a score change or resolution.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct AuditLogEntry {
    pub id: u64,
    pub claim_id: ClaimId,
    pub old_score: f64,
    pub new_score: f64,
    pub event: AuditEvent,
    pub created_at: u64,
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
pub enum RelationshipKind {
    #[default]
    DependsOn,
    RelatedTo,
    Contradicts,
}

/// A typed edge from a parent claim to a child claim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Relationship {
    pub id: u64,
    pub parent: ClaimId,
    pub child: ClaimId,
    pub kind: RelationshipKind,
    pub created_at: u64,
}
