//! Bot and collusion heuristics.
//!
//! Two advisory signals are tracked per identity:
//!
//! - **Rapid voting**: a vote arriving less than [`RAPID_VOTE_WINDOW_MS`]
//!   after the same identity's previous vote marks the fingerprint suspicious.
//! - **Collusion**: for every pair of identities that voted on the same
//!   resource, an [`AgreementRecord`] counts shared votes and agreements. Once
//!   the pair has at least [`COLLUSION_MIN_SHARED_VOTES`] shared votes and
//!   agrees more than [`COLLUSION_AGREEMENT_RATE`] of the time, both
//!   fingerprints are flagged and their future vote weight is multiplied by
//!   [`COLLUSION_WEIGHT_MULTIPLIER`].
//!
//! Nothing here rejects a vote.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{
    COLLUSION_AGREEMENT_RATE, COLLUSION_MIN_SHARED_VOTES, COLLUSION_WEIGHT_MULTIPLIER,
    FINGERPRINT_HISTORY, MAX_FLAG_EVENTS, RAPID_VOTE_WINDOW_MS,
};
use crate::types::Hash256;

/// Kind of suspicious behaviour observed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum FlagKind {
    RapidVoting,
    /// Voted in lockstep with `partner`.
    Collusion { partner: Hash256 },
}

/// A single flag event.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct BotFlag {
    pub kind: FlagKind,
    pub at: u64,
}

/// Per-identity voting telemetry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct Fingerprint {
    pub key: Hash256,
    pub vote_count: u64,
    /// Most recent vote timestamps, newest last, at most [`FINGERPRINT_HISTORY`].
    pub recent_votes: Vec<u64>,
    pub suspicious: bool,
    pub flags: Vec<BotFlag>,
    /// Multiplier applied to this identity's vote weight (1.0 unless flagged for collusion).
    pub weight_multiplier: f64,
}

impl Fingerprint {
    pub fn new(key: Hash256) -> Self {
        Self {
            key,
            vote_count: 0,
            recent_votes: Vec::with_capacity(FINGERPRINT_HISTORY),
            suspicious: false,
            flags: Vec::new(),
            weight_multiplier: 1.0,
        }
    }

    /// Record a vote at `now`. Returns `true` if it was flagged as rapid.
    pub fn record_vote(&mut self, now: u64) -> bool {
        let rapid = self
            .recent_votes
            .last()
            .is_some_and(|&prev| now.saturating_sub(prev) < RAPID_VOTE_WINDOW_MS);

        self.vote_count = self.vote_count.saturating_add(1);
        if self.recent_votes.len() == FINGERPRINT_HISTORY {
            self.recent_votes.remove(0);
        }
        self.recent_votes.push(now);

        if rapid {
            self.push_flag(BotFlag { kind: FlagKind::RapidVoting, at: now });
            warn!(identity = %self.key.short(), "detector: rapid voting");
        }
        rapid
    }

    /// Mark this identity as colluding with `partner` and down-weight it.
    pub fn flag_collusion(&mut self, partner: Hash256, now: u64) {
        self.weight_multiplier = self.weight_multiplier.min(COLLUSION_WEIGHT_MULTIPLIER);
        self.push_flag(BotFlag { kind: FlagKind::Collusion { partner }, at: now });
        warn!(identity = %self.key.short(), partner = %partner.short(), "detector: collusion flagged");
    }

    fn push_flag(&mut self, flag: BotFlag) {
        self.suspicious = true;
        if self.flags.len() == MAX_FLAG_EVENTS {
            self.flags.remove(0);
        }
        self.flags.push(flag);
    }
}

/// Multiplier to apply for an identity that may have no fingerprint yet.
pub fn weight_multiplier(fingerprint: Option<&Fingerprint>) -> f64 {
    match fingerprint {
        Some(fp) if fp.weight_multiplier.is_finite() && fp.weight_multiplier > 0.0 => fp.weight_multiplier,
        _ => 1.0,
    }
}

/// Agreement statistics for an unordered pair of identities.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct AgreementRecord {
    /// Lower key of the pair.
    pub a: Hash256,
    /// Higher key of the pair.
    pub b: Hash256,
    pub shared_votes: u64,
    pub agreements: u64,
    pub flagged: bool,
}

impl AgreementRecord {
    /// New record; the pair is stored in canonical (sorted) order.
    pub fn new(x: Hash256, y: Hash256) -> Self {
        let (a, b) = ordered_pair(x, y);
        Self { a, b, shared_votes: 0, agreements: 0, flagged: false }
    }

    pub fn agreement_rate(&self) -> f64 {
        if self.shared_votes == 0 {
            return 0.0;
        }
        self.agreements as f64 / self.shared_votes as f64
    }

    /// Count one more shared vote. Returns `true` exactly once: the first time
    /// the pair crosses the collusion threshold.
    pub fn record(&mut self, agreed: bool) -> bool {
        self.shared_votes = self.shared_votes.saturating_add(1);
        if agreed {
            self.agreements = self.agreements.saturating_add(1);
        }
        if !self.flagged
            && self.shared_votes >= COLLUSION_MIN_SHARED_VOTES
            && self.agreement_rate() > COLLUSION_AGREEMENT_RATE
        {
            self.flagged = true;
            return true;
        }
        false
    }
}

/// Canonical ordering for an unordered identity pair.
pub fn ordered_pair(x: Hash256, y: Hash256) -> (Hash256, Hash256) {
    if x <= y { (x, y) } else { (y, x) }
}

/// Storage key for an unordered identity pair (64 bytes, order-independent).
pub fn pair_key(x: &Hash256, y: &Hash256) -> [u8; 64] {
    let (a, b) = ordered_pair(*x, *y);
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(a.as_bytes());
    key[32..].copy_from_slice(b.as_bytes());
    key
}
