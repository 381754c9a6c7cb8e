//! The trust engine: vote admission, score recomputation, and resolution.
//!
//! [`Engine`] implements every externally visible operation on top of a
//! [`LedgerStore`]. Concurrency discipline:
//!
//! - Work on a claim (a vote on it or on its evidence, a resolution) holds
//!   that claim's lock for its whole duration. Votes therefore see a stable
//!   claim status and evidence tallies, and a resolution never races a vote.
//! - Reading, pricing, and locking a user's stake holds that user's lock, so
//!   two votes by the same identity cannot both pass the balance check.
//! - Locks are always taken claim first, then user. No path holds two claim
//!   locks or two user locks at once.
//! - Lock map entries live only while some caller holds or waits on them.
//!
//! Store calls that fail with a retryable error are retried once, then the
//! error is surfaced.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rumor_core::clock::Clock;
use rumor_core::constants::{MAX_CONTENT_LEN, NEUTRAL_SCORE};
use rumor_core::detector::{AgreementRecord, Fingerprint, weight_multiplier};
use rumor_core::error::{LedgerError, VoteError};
use rumor_core::identity::{IdentityHasher, VoteTarget};
use rumor_core::ledger::LedgerStore;
use rumor_core::reputation::{self, claim_vote_weight, credibility, evidence_vote_weight, validate_stake};
use rumor_core::resolution::{
    ResolutionCandidate, ResolutionCheck, claim_vote_outcome, evaluate, evidence_vote_backs_claim,
    evidence_vote_outcome, verdict_for_score,
};
use rumor_core::score::score_claim;
use rumor_core::types::{
    AuditLogEntry, Claim, ClaimId, ClaimStance, ClaimStatus, ClaimVote, Evidence, EvidenceId,
    EvidenceKind, EvidenceStance, EvidenceVote, Hash256, Relationship, RelationshipKind,
    ResolutionReason, UserAccount, UserStats, VoteId,
};

/// Result of an accepted vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: VoteId,
    pub new_score: f64,
    pub new_status: ClaimStatus,
}

/// What happened to one claim during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub claim_id: ClaimId,
    pub status: ClaimStatus,
    pub reason: Option<ResolutionReason>,
    pub settled_votes: usize,
    pub failed_votes: usize,
}

/// Result of a resolution sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Claims that moved from Active to a terminal status in this sweep.
    pub resolved_count: usize,
    pub outcomes: Vec<ClaimOutcome>,
    /// Votes on previously resolved claims that were settled in this sweep.
    pub resumed_settlements: usize,
}

/// Claim row for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub claim: Claim,
    pub evidence_count: usize,
}

/// A claim with its evidence, edges, and audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDetail {
    pub claim: Claim,
    pub evidence: Vec<Evidence>,
    pub relationships: Vec<Relationship>,
    /// Newest first.
    pub history: Vec<AuditLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: ClaimId,
    pub content: String,
    pub status: ClaimStatus,
    pub trust_score: f64,
}

/// Connected component of the claim relationship graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Relationship>,
}

type LockMap<K> = DashMap<K, Arc<Mutex<()>>>;

/// Handle on one keyed mutex. Dropping the last handle removes the entry.
struct KeyedLock<'a, K: Hash + Eq> {
    map: &'a LockMap<K>,
    key: K,
    mutex: Arc<Mutex<()>>,
}

impl<K: Hash + Eq> KeyedLock<'_, K> {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock()
    }
}

impl<K: Hash + Eq> Drop for KeyedLock<'_, K> {
    fn drop(&mut self) {
        // Handles are only cloned out under the shard lock `remove_if` takes,
        // so a count of two (map and self) cannot grow during the check.
        self.map.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}

fn lock_for<'a, K: Hash + Eq + Clone>(map: &'a LockMap<K>, key: &K) -> KeyedLock<'a, K> {
    let mutex = map.entry(key.clone()).or_default().clone();
    KeyedLock { map, key: key.clone(), mutex }
}

/// Run a store call, retrying once on a retryable failure.
fn retry_once<T>(op: &str, mut f: impl FnMut() -> Result<T, LedgerError>) -> Result<T, LedgerError> {
    match f() {
        Err(e) if e.is_retryable() => {
            warn!(op, error = %e, "store call failed, retrying once");
            f()
        }
        other => other,
    }
}

/// Trim and bound free text.
fn validate_content(content: &str) -> Result<String, LedgerError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::EmptyContent);
    }
    let len = trimmed.chars().count();
    if len > MAX_CONTENT_LEN {
        return Err(LedgerError::ContentTooLong { len, max: MAX_CONTENT_LEN });
    }
    Ok(trimmed.to_string())
}

/// One identity's stance on a shared resource, for agreement tracking.
struct PeerVote {
    voter: Hash256,
    backs: bool,
}

pub struct Engine {
    store: Arc<dyn LedgerStore>,
    hasher: IdentityHasher,
    clock: Arc<dyn Clock>,
    claim_locks: LockMap<ClaimId>,
    user_locks: LockMap<Hash256>,
    /// Serializes fingerprint and agreement read-modify-writes.
    detector_lock: Mutex<()>,
}

impl Engine {
    pub fn new(store: Arc<dyn LedgerStore>, salt: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            hasher: IdentityHasher::new(salt),
            clock,
            claim_locks: DashMap::new(),
            user_locks: DashMap::new(),
            detector_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    // ------------------------------------------------------------------
    // Claims and evidence
    // ------------------------------------------------------------------

    /// Create a new Active claim. `expires_at` is stored as given.
    pub fn create_claim(
        &self,
        content: &str,
        image_url: Option<String>,
        expires_at: Option<u64>,
    ) -> Result<Claim, LedgerError> {
        let content = validate_content(content)?;
        let claim = Claim::new(content, image_url, expires_at, self.now());
        let claim = retry_once("insert_claim", || self.store.insert_claim(claim.clone()))?;
        info!(claim = claim.id, expires_at = ?claim.expires_at, "claim created");
        Ok(claim)
    }

    /// Attach evidence to an Active claim on behalf of `creator`.
    pub fn create_evidence(
        &self,
        claim_id: ClaimId,
        kind: EvidenceKind,
        content: &str,
        creator: &str,
    ) -> Result<Evidence, LedgerError> {
        let content = validate_content(content)?;
        let claim = self.store.get_claim(claim_id)?.ok_or(LedgerError::ClaimNotFound(claim_id))?;
        if claim.status.is_terminal() {
            return Err(LedgerError::ClaimResolved(claim_id));
        }
        let evidence = Evidence::new(claim_id, kind, content, self.hasher.creator_key(creator), self.now());
        let evidence = retry_once("insert_evidence", || self.store.insert_evidence(evidence.clone()))?;
        debug!(claim = claim_id, evidence = evidence.id, ?kind, "evidence created");
        Ok(evidence)
    }

    // ------------------------------------------------------------------
    // Votes
    // ------------------------------------------------------------------

    /// Stake points on whether a piece of evidence is helpful.
    pub fn submit_evidence_vote(
        &self,
        identity: &str,
        evidence_id: EvidenceId,
        stance: EvidenceStance,
        stake: u64,
    ) -> Result<VoteReceipt, VoteError> {
        validate_stake(stake)?;
        let found = retry_once("get_evidence", || self.store.get_evidence(evidence_id))?
            .ok_or_else(|| VoteError::ClaimOrEvidenceNotFound(format!("evidence {evidence_id}")))?;
        let claim_id = found.claim_id;

        let claim_lock = lock_for(&self.claim_locks, &claim_id);
        let _claim_guard = claim_lock.lock();
        let now = self.now();
        self.ensure_votable(claim_id, now)?;

        // Tallies only change under the claim lock; re-read for the current quality.
        let evidence = retry_once("get_evidence", || self.store.get_evidence(evidence_id))?
            .ok_or_else(|| VoteError::ClaimOrEvidenceNotFound(format!("evidence {evidence_id}")))?;
        if self.hasher.creator_key(identity) == evidence.creator_key {
            return Err(VoteError::SelfVote);
        }

        let user_key = self.hasher.user_key(identity);
        let vote_key = self.hasher.vote_key(identity, VoteTarget::Evidence(evidence_id));

        let vote = {
            let user_lock = lock_for(&self.user_locks, &user_key);
            let _user_guard = user_lock.lock();

            if retry_once("has_vote_key", || self.store.has_vote_key(&vote_key))? {
                return Err(VoteError::DuplicateVote);
            }
            let mut user = self.load_user(&user_key, now)?;
            user.check_stake(stake)?;

            let multiplier = self.multiplier_for(&user_key);
            let weight = evidence_vote_weight(user.reputation, evidence.quality(), stake, multiplier);
            let reputation_snapshot = user.reputation;
            user.lock_stake(stake)?;

            let vote = EvidenceVote {
                id: 0,
                evidence_id,
                claim_id,
                vote_key,
                voter: user_key,
                stance,
                stake,
                weight,
                reputation_snapshot,
                created_at: now,
                settlement: None,
            };
            retry_once("commit_evidence_vote", || self.store.commit_evidence_vote(vote.clone(), user.clone()))?
        };
        debug!(
            claim = claim_id,
            evidence = evidence_id,
            vote = vote.id,
            voter = %user_key.short(),
            stake,
            weight = vote.weight,
            "evidence vote accepted"
        );

        let peers = self.evidence_peers(claim_id, evidence_id, &evidence, &vote);
        self.observe_vote(&user_key, evidence_vote_backs_claim(evidence.kind, stance), peers, now);

        let (new_score, new_status) = self.recompute_locked(claim_id, now);
        Ok(VoteReceipt { vote_id: vote.id, new_score, new_status })
    }

    /// Stake points directly on whether a claim is true.
    pub fn submit_claim_vote(
        &self,
        identity: &str,
        claim_id: ClaimId,
        stance: ClaimStance,
        stake: u64,
    ) -> Result<VoteReceipt, VoteError> {
        validate_stake(stake)?;

        let claim_lock = lock_for(&self.claim_locks, &claim_id);
        let _claim_guard = claim_lock.lock();
        let now = self.now();
        self.ensure_votable(claim_id, now)?;

        let user_key = self.hasher.user_key(identity);
        let vote_key = self.hasher.vote_key(identity, VoteTarget::Claim(claim_id));

        let vote = {
            let user_lock = lock_for(&self.user_locks, &user_key);
            let _user_guard = user_lock.lock();

            if retry_once("has_vote_key", || self.store.has_vote_key(&vote_key))? {
                return Err(VoteError::DuplicateVote);
            }
            let mut user = self.load_user(&user_key, now)?;
            user.check_stake(stake)?;

            let multiplier = self.multiplier_for(&user_key);
            let credibility_snapshot = credibility(user.total_points);
            let weight = claim_vote_weight(user.reputation, credibility_snapshot, stake, multiplier);
            let reputation_snapshot = user.reputation;
            user.lock_stake(stake)?;

            let vote = ClaimVote {
                id: 0,
                claim_id,
                vote_key,
                voter: user_key,
                stance,
                stake,
                weight,
                reputation_snapshot,
                credibility_snapshot,
                created_at: now,
                settlement: None,
            };
            retry_once("commit_claim_vote", || self.store.commit_claim_vote(vote.clone(), user.clone()))?
        };
        debug!(
            claim = claim_id,
            vote = vote.id,
            voter = %user_key.short(),
            stake,
            weight = vote.weight,
            "claim vote accepted"
        );

        let peers = self.claim_peers(claim_id, &vote);
        self.observe_vote(&user_key, stance == ClaimStance::Verify, peers, now);

        let (new_score, new_status) = self.recompute_locked(claim_id, now);
        Ok(VoteReceipt { vote_id: vote.id, new_score, new_status })
    }

    /// Reject votes on missing, terminal, or expired claims. An expired
    /// Active claim is resolved before the rejection. Caller holds the claim lock.
    fn ensure_votable(&self, claim_id: ClaimId, now: u64) -> Result<(), VoteError> {
        let claim = retry_once("get_claim", || self.store.get_claim(claim_id))?
            .ok_or_else(|| VoteError::ClaimOrEvidenceNotFound(format!("claim {claim_id}")))?;
        if claim.status.is_terminal() {
            return Err(VoteError::ClaimNotVotable(claim_id));
        }
        if claim.is_expired(now) {
            let status = verdict_for_score(claim.trust_score);
            if let Err(e) = self.resolve_locked(&claim, status, ResolutionReason::Expired, now) {
                warn!(claim = claim_id, error = %e, "expiry resolution failed");
            }
            return Err(VoteError::ClaimNotVotable(claim_id));
        }
        Ok(())
    }

    fn load_user(&self, key: &Hash256, now: u64) -> Result<UserAccount, LedgerError> {
        Ok(retry_once("get_user", || self.store.get_user(key))?.unwrap_or_else(|| UserAccount::new(*key, now)))
    }

    /// Down-weight multiplier for an identity. Detector failures count as unflagged.
    fn multiplier_for(&self, key: &Hash256) -> f64 {
        match self.store.get_fingerprint(key) {
            Ok(fp) => weight_multiplier(fp.as_ref()),
            Err(e) => {
                warn!(voter = %key.short(), error = %e, "fingerprint lookup failed");
                1.0
            }
        }
    }

    // ------------------------------------------------------------------
    // Detector
    // ------------------------------------------------------------------

    fn evidence_peers(
        &self,
        claim_id: ClaimId,
        evidence_id: EvidenceId,
        evidence: &Evidence,
        vote: &EvidenceVote,
    ) -> Vec<PeerVote> {
        match self.store.evidence_votes_for_claim(claim_id) {
            Ok(votes) => votes
                .into_iter()
                .filter(|v| v.evidence_id == evidence_id && v.id != vote.id && v.voter != vote.voter)
                .map(|v| PeerVote { voter: v.voter, backs: evidence_vote_backs_claim(evidence.kind, v.stance) })
                .collect(),
            Err(e) => {
                warn!(claim = claim_id, error = %e, "peer lookup failed; skipping agreement check");
                Vec::new()
            }
        }
    }

    fn claim_peers(&self, claim_id: ClaimId, vote: &ClaimVote) -> Vec<PeerVote> {
        match self.store.claim_votes_for_claim(claim_id) {
            Ok(votes) => votes
                .into_iter()
                .filter(|v| v.id != vote.id && v.voter != vote.voter)
                .map(|v| PeerVote { voter: v.voter, backs: v.stance == ClaimStance::Verify })
                .collect(),
            Err(e) => {
                warn!(claim = claim_id, error = %e, "peer lookup failed; skipping agreement check");
                Vec::new()
            }
        }
    }

    /// Feed a committed vote to the timing and agreement heuristics.
    ///
    /// Advisory only: every failure is logged and swallowed.
    fn observe_vote(&self, voter: &Hash256, backs: bool, peers: Vec<PeerVote>, now: u64) {
        let _guard = self.detector_lock.lock();
        if let Err(e) = self.observe_vote_inner(voter, backs, peers, now) {
            warn!(voter = %voter.short(), error = %e, "detector update failed");
        }
    }

    fn observe_vote_inner(
        &self,
        voter: &Hash256,
        backs: bool,
        peers: Vec<PeerVote>,
        now: u64,
    ) -> Result<(), LedgerError> {
        let mut fp = self.store.get_fingerprint(voter)?.unwrap_or_else(|| Fingerprint::new(*voter));
        fp.record_vote(now);

        let mut flagged_partners = Vec::new();
        for peer in peers {
            let mut record = self
                .store
                .get_agreement(voter, &peer.voter)?
                .unwrap_or_else(|| AgreementRecord::new(*voter, peer.voter));
            if record.record(peer.backs == backs) {
                flagged_partners.push(peer.voter);
            }
            self.store.put_agreement(&record)?;
        }

        for partner in flagged_partners {
            fp.flag_collusion(partner, now);
            let mut other = self.store.get_fingerprint(&partner)?.unwrap_or_else(|| Fingerprint::new(partner));
            other.flag_collusion(*voter, now);
            self.store.put_fingerprint(&other)?;
        }
        self.store.put_fingerprint(&fp)
    }

    /// Moderator view of an identity's detector state.
    pub fn get_fingerprint(&self, identity: &str) -> Result<Option<Fingerprint>, LedgerError> {
        self.store.get_fingerprint(&self.hasher.user_key(identity))
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    /// Recompute and store a claim's score. Caller holds the claim lock.
    ///
    /// The vote that triggered this has already committed, so a failure here
    /// is logged and the last stored score is returned.
    fn recompute_locked(&self, claim_id: ClaimId, now: u64) -> (f64, ClaimStatus) {
        match self.recompute_inner(claim_id, now, false) {
            Ok(claim) => (claim.trust_score, claim.status),
            Err(e) => {
                warn!(claim = claim_id, error = %e, "score recompute failed");
                match self.store.get_claim(claim_id) {
                    Ok(Some(claim)) => (claim.trust_score, claim.status),
                    _ => (NEUTRAL_SCORE, ClaimStatus::Active),
                }
            }
        }
    }

    /// Recompute from the full persisted vote set. With `only_if_changed`,
    /// skip the write when the stored score already matches.
    fn recompute_inner(&self, claim_id: ClaimId, now: u64, only_if_changed: bool) -> Result<Claim, LedgerError> {
        let evidence = retry_once("evidence_for_claim", || self.store.evidence_for_claim(claim_id))?;
        let evidence_votes = retry_once("evidence_votes", || self.store.evidence_votes_for_claim(claim_id))?;
        let claim_votes = retry_once("claim_votes", || self.store.claim_votes_for_claim(claim_id))?;
        let breakdown = score_claim(&evidence, &evidence_votes, &claim_votes);

        if only_if_changed {
            if let Some(claim) = self.store.get_claim(claim_id)? {
                if (claim.trust_score - breakdown.score).abs() < 1e-12 {
                    return Ok(claim);
                }
            }
        }

        let claim = retry_once("apply_score", || self.store.apply_score(claim_id, breakdown, now))?;
        debug!(
            claim = claim_id,
            alpha = breakdown.alpha,
            beta = breakdown.beta,
            score = breakdown.score,
            "score updated"
        );
        Ok(claim)
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Evaluate every claim and resolve those that qualify.
    ///
    /// Safe to run repeatedly and concurrently with votes. Terminal claims
    /// with unsettled votes (from an interrupted earlier run) are finished.
    pub fn run_resolution_sweep(&self) -> Result<SweepReport, LedgerError> {
        let claims = retry_once("list_claims", || self.store.list_claims())?;
        let mut report = SweepReport::default();

        for listed in claims {
            let claim_lock = lock_for(&self.claim_locks, &listed.id);
            let _guard = claim_lock.lock();
            let now = self.now();

            let claim = match retry_once("get_claim", || self.store.get_claim(listed.id)) {
                Ok(Some(claim)) => claim,
                Ok(None) => continue,
                Err(e) => {
                    warn!(claim = listed.id, error = %e, "sweep: claim load failed");
                    continue;
                }
            };

            if claim.status.is_terminal() {
                let (settled, failed) = self.settle_all(&claim, claim.status, now);
                if settled > 0 || failed > 0 {
                    info!(claim = claim.id, settled, failed, "sweep: resumed settlement");
                }
                report.resumed_settlements += settled;
                continue;
            }

            // Heal a score left stale by a failed post-vote recompute.
            let claim = match self.recompute_inner(claim.id, now, true) {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(claim = claim.id, error = %e, "sweep: score refresh failed");
                    claim
                }
            };

            if let ResolutionCheck::Resolve { status, reason } = evaluate(&claim, now) {
                match self.resolve_locked(&claim, status, reason, now) {
                    Ok(outcome) => {
                        report.resolved_count += 1;
                        report.outcomes.push(outcome);
                    }
                    Err(e) => warn!(claim = claim.id, error = %e, "sweep: resolution failed"),
                }
            }
        }

        if report.resolved_count > 0 {
            info!(resolved = report.resolved_count, "resolution sweep complete");
        }
        Ok(report)
    }

    /// Resolve a claim whose expiry has passed.
    ///
    /// Returns `None` if the claim is not expired or was already terminal.
    pub fn resolve_expired_claim(&self, claim_id: ClaimId) -> Result<Option<ClaimOutcome>, LedgerError> {
        let claim_lock = lock_for(&self.claim_locks, &claim_id);
        let _guard = claim_lock.lock();
        let now = self.now();
        let claim = retry_once("get_claim", || self.store.get_claim(claim_id))?
            .ok_or(LedgerError::ClaimNotFound(claim_id))?;

        if claim.status.is_terminal() {
            self.settle_all(&claim, claim.status, now);
            return Ok(None);
        }
        if !claim.is_expired(now) {
            return Ok(None);
        }
        let status = verdict_for_score(claim.trust_score);
        self.resolve_locked(&claim, status, ResolutionReason::Expired, now).map(Some)
    }

    /// Flip a claim to terminal and settle its votes. Caller holds the claim lock.
    fn resolve_locked(
        &self,
        claim: &Claim,
        status: ClaimStatus,
        reason: ResolutionReason,
        now: u64,
    ) -> Result<ClaimOutcome, LedgerError> {
        let finalized = retry_once("finalize_claim", || self.store.finalize_claim(claim.id, status, reason, now))?;
        let Some(finalized) = finalized else {
            // Lost to an earlier resolution; settle under the stored verdict.
            let stored = self.store.get_claim(claim.id)?.ok_or(LedgerError::ClaimNotFound(claim.id))?;
            let (settled_votes, failed_votes) = self.settle_all(&stored, stored.status, now);
            return Ok(ClaimOutcome { claim_id: claim.id, status: stored.status, reason: None, settled_votes, failed_votes });
        };

        info!(
            claim = claim.id,
            status = %status,
            ?reason,
            score = finalized.trust_score,
            "claim resolved"
        );
        let (settled_votes, failed_votes) = self.settle_all(&finalized, status, now);
        Ok(ClaimOutcome { claim_id: claim.id, status, reason: Some(reason), settled_votes, failed_votes })
    }

    /// Settle every unsettled vote on a terminal claim.
    ///
    /// Per-vote failures are logged and counted; they never stop the rest.
    /// Returns `(settled, failed)`.
    fn settle_all(&self, claim: &Claim, verdict: ClaimStatus, now: u64) -> (usize, usize) {
        let mut settled = 0;
        let mut failed = 0;

        let kinds: HashMap<EvidenceId, EvidenceKind> = match self.store.evidence_for_claim(claim.id) {
            Ok(evidence) => evidence.into_iter().map(|e| (e.id, e.kind)).collect(),
            Err(e) => {
                warn!(claim = claim.id, error = %e, "settlement: evidence load failed");
                return (0, 1);
            }
        };

        match self.store.evidence_votes_for_claim(claim.id) {
            Ok(votes) => {
                for vote in votes.into_iter().filter(|v| v.settlement.is_none()) {
                    let Some(kind) = kinds.get(&vote.evidence_id).copied() else {
                        warn!(claim = claim.id, vote = vote.id, "settlement: evidence missing");
                        failed += 1;
                        continue;
                    };
                    let outcome = evidence_vote_outcome(verdict, kind, vote.stance);
                    let user_lock = lock_for(&self.user_locks, &vote.voter);
                    let _user_guard = user_lock.lock();
                    match retry_once("settle_evidence_vote", || {
                        self.store.settle_evidence_vote(claim.id, vote.id, outcome, now)
                    }) {
                        Ok(Some(_)) => settled += 1,
                        Ok(None) => {}
                        Err(e) => {
                            warn!(claim = claim.id, vote = vote.id, error = %e, "settlement failed");
                            failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(claim = claim.id, error = %e, "settlement: evidence vote load failed");
                failed += 1;
            }
        }

        match self.store.claim_votes_for_claim(claim.id) {
            Ok(votes) => {
                for vote in votes.into_iter().filter(|v| v.settlement.is_none()) {
                    let outcome = claim_vote_outcome(verdict, vote.stance);
                    let user_lock = lock_for(&self.user_locks, &vote.voter);
                    let _user_guard = user_lock.lock();
                    match retry_once("settle_claim_vote", || {
                        self.store.settle_claim_vote(claim.id, vote.id, outcome, now)
                    }) {
                        Ok(Some(_)) => settled += 1,
                        Ok(None) => {}
                        Err(e) => {
                            warn!(claim = claim.id, vote = vote.id, error = %e, "settlement failed");
                            failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(claim = claim.id, error = %e, "settlement: claim vote load failed");
                failed += 1;
            }
        }

        if settled > 0 {
            debug!(claim = claim.id, settled, failed, verdict = %verdict, "votes settled");
        }
        (settled, failed)
    }

    /// Diagnostic evaluation of every Active claim.
    pub fn resolution_candidates(&self) -> Result<Vec<ResolutionCandidate>, LedgerError> {
        let now = self.now();
        Ok(self
            .store
            .list_claims()?
            .iter()
            .filter(|c| c.status == ClaimStatus::Active)
            .map(|c| ResolutionCandidate::for_claim(c, now))
            .collect())
    }

    // ------------------------------------------------------------------
    // Read models
    // ------------------------------------------------------------------

    /// Ledger stats for an identity; defaults if it has never voted.
    pub fn get_user_stats(&self, identity: &str) -> Result<UserStats, LedgerError> {
        let key = self.hasher.user_key(identity);
        Ok(self
            .store
            .get_user(&key)?
            .map(|u| UserStats::from(&u))
            .unwrap_or_else(reputation::default_stats))
    }

    /// All claims, newest first.
    pub fn list_claims(&self) -> Result<Vec<ClaimSummary>, LedgerError> {
        let mut claims = self.store.list_claims()?;
        claims.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        claims
            .into_iter()
            .map(|claim| {
                let evidence_count = self.store.evidence_for_claim(claim.id)?.len();
                Ok(ClaimSummary { claim, evidence_count })
            })
            .collect()
    }

    pub fn get_claim(&self, claim_id: ClaimId) -> Result<ClaimDetail, LedgerError> {
        let claim = self.store.get_claim(claim_id)?.ok_or(LedgerError::ClaimNotFound(claim_id))?;
        let evidence = self.store.evidence_for_claim(claim_id)?;
        let relationships = self.store.relationships_for(claim_id)?;
        let mut history = self.store.audit_for_claim(claim_id)?;
        history.reverse();
        Ok(ClaimDetail { claim, evidence, relationships, history })
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    pub fn link_claims(
        &self,
        parent: ClaimId,
        child: ClaimId,
        kind: RelationshipKind,
    ) -> Result<Relationship, LedgerError> {
        if parent == child {
            return Err(LedgerError::SelfRelationship);
        }
        for id in [parent, child] {
            if self.store.get_claim(id)?.is_none() {
                return Err(LedgerError::ClaimNotFound(id));
            }
        }
        let rel = Relationship { id: 0, parent, child, kind, created_at: self.now() };
        let rel = retry_once("insert_relationship", || self.store.insert_relationship(rel.clone()))?;
        debug!(parent, child, ?kind, edge = rel.id, "claims linked");
        Ok(rel)
    }

    pub fn list_relationships(&self, claim_id: ClaimId) -> Result<Vec<Relationship>, LedgerError> {
        self.store.relationships_for(claim_id)
    }

    /// Breadth-first walk of the undirected component containing `root`.
    pub fn claim_graph(&self, root: ClaimId) -> Result<ClaimGraph, LedgerError> {
        if self.store.get_claim(root)?.is_none() {
            return Err(LedgerError::ClaimNotFound(root));
        }

        let mut graph = ClaimGraph::default();
        let mut seen_nodes = HashSet::from([root]);
        let mut seen_edges = HashSet::new();
        let mut queue = VecDeque::from([root]);

        while let Some(id) = queue.pop_front() {
            let Some(claim) = self.store.get_claim(id)? else {
                continue;
            };
            graph.nodes.push(GraphNode {
                id,
                content: claim.content,
                status: claim.status,
                trust_score: claim.trust_score,
            });

            for edge in self.store.relationships_for(id)? {
                let next = if edge.parent == id { edge.child } else { edge.parent };
                if seen_nodes.insert(next) {
                    queue.push_back(next);
                }
                if seen_edges.insert(edge.id) {
                    graph.edges.push(edge);
                }
            }
        }
        Ok(graph)
    }
}
