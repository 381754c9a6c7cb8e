//! Ledger storage interface and in-memory implementation.
//!
//! Provides the [`LedgerStore`] trait for claims, evidence, votes, user
//! balances, detector state, relationships and the audit log. The
//! [`MemoryLedgerStore`] is suitable for testing; the production node uses
//! RocksDB (rumor-node).
//!
//! Every method that touches more than one record is a single call so an
//! implementation can make it atomic: a vote commit writes the vote, its
//! duplicate key, the evidence tallies, and the voter's locked stake
//! together, or none of them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::detector::{AgreementRecord, Fingerprint, ordered_pair};
use crate::error::LedgerError;
use crate::score::{self, ScoreBreakdown};
use crate::types::{
    AuditEvent, AuditLogEntry, Claim, ClaimId, ClaimStatus, ClaimVote, Evidence, EvidenceId,
    EvidenceVote, Hash256, Relationship, ResolutionReason, Settlement, UserAccount, VoteId,
    VoteOutcome,
};

/// Durable keyed storage for the engine.
///
/// Implementations must be safe to share across threads. Callers serialize
/// per-claim and per-user work themselves; the store only guarantees that
/// each call is atomic.
pub trait LedgerStore: Send + Sync {
    // --- Claims ---

    /// Insert a new claim, assigning its id.
    fn insert_claim(&self, claim: Claim) -> Result<Claim, LedgerError>;

    fn get_claim(&self, id: ClaimId) -> Result<Option<Claim>, LedgerError>;

    /// All claims in ascending id order.
    fn list_claims(&self) -> Result<Vec<Claim>, LedgerError>;

    /// Store a recomputed score on an Active claim, maintain its threshold
    /// stamps, and append a score-update audit entry.
    ///
    /// Fails with [`LedgerError::ClaimResolved`] if the claim is terminal.
    fn apply_score(&self, id: ClaimId, breakdown: ScoreBreakdown, now: u64) -> Result<Claim, LedgerError>;

    /// Conditionally move a claim from Active to `status`.
    ///
    /// Returns the updated claim, or `None` if it was already terminal. A
    /// resolution audit entry is written in the same step.
    fn finalize_claim(
        &self,
        id: ClaimId,
        status: ClaimStatus,
        reason: ResolutionReason,
        now: u64,
    ) -> Result<Option<Claim>, LedgerError>;

    // --- Evidence ---

    /// Insert new evidence under an existing claim, assigning its id.
    fn insert_evidence(&self, evidence: Evidence) -> Result<Evidence, LedgerError>;

    fn get_evidence(&self, id: EvidenceId) -> Result<Option<Evidence>, LedgerError>;

    fn evidence_for_claim(&self, claim_id: ClaimId) -> Result<Vec<Evidence>, LedgerError>;

    // --- Votes ---

    /// Whether a duplicate-vote key has been used.
    fn has_vote_key(&self, key: &Hash256) -> Result<bool, LedgerError>;

    /// Atomically record an evidence vote.
    ///
    /// Writes the vote (assigning its id), reserves its vote key, bumps the
    /// evidence tallies, and stores `voter` (whose stake the caller has
    /// already locked). Fails without writing anything if the key is taken
    /// or the claim is no longer Active.
    fn commit_evidence_vote(&self, vote: EvidenceVote, voter: UserAccount) -> Result<EvidenceVote, LedgerError>;

    /// Atomically record a direct claim vote. Same contract as
    /// [`commit_evidence_vote`](Self::commit_evidence_vote).
    fn commit_claim_vote(&self, vote: ClaimVote, voter: UserAccount) -> Result<ClaimVote, LedgerError>;

    fn evidence_votes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<EvidenceVote>, LedgerError>;

    fn claim_votes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<ClaimVote>, LedgerError>;

    /// Settle one evidence vote and its voter's balance together.
    ///
    /// Returns `None` if the vote was already settled.
    fn settle_evidence_vote(
        &self,
        claim_id: ClaimId,
        vote_id: VoteId,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Option<Settlement>, LedgerError>;

    /// Settle one direct claim vote and its voter's balance together.
    fn settle_claim_vote(
        &self,
        claim_id: ClaimId,
        vote_id: VoteId,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Option<Settlement>, LedgerError>;

    // --- Users ---

    fn get_user(&self, key: &Hash256) -> Result<Option<UserAccount>, LedgerError>;

    // --- Detector state ---

    fn get_fingerprint(&self, key: &Hash256) -> Result<Option<Fingerprint>, LedgerError>;

    fn put_fingerprint(&self, fingerprint: &Fingerprint) -> Result<(), LedgerError>;

    fn get_agreement(&self, x: &Hash256, y: &Hash256) -> Result<Option<AgreementRecord>, LedgerError>;

    fn put_agreement(&self, record: &AgreementRecord) -> Result<(), LedgerError>;

    // --- Relationships ---

    /// Insert an edge, or return the existing one with the same endpoints and kind.
    fn insert_relationship(&self, relationship: Relationship) -> Result<Relationship, LedgerError>;

    /// All edges with `claim_id` as parent or child.
    fn relationships_for(&self, claim_id: ClaimId) -> Result<Vec<Relationship>, LedgerError>;

    // --- Audit ---

    /// Audit entries for a claim in insertion order.
    fn audit_for_claim(&self, claim_id: ClaimId) -> Result<Vec<AuditLogEntry>, LedgerError>;
}

/// Build the resolution audit entry written by `finalize_claim`.
pub fn resolution_entry(claim: &Claim, status: ClaimStatus, reason: ResolutionReason, now: u64) -> AuditLogEntry {
    AuditLogEntry {
        id: 0,
        claim_id: claim.id,
        old_score: claim.trust_score,
        new_score: claim.trust_score,
        event: AuditEvent::Resolution { status, reason },
        created_at: now,
    }
}

/// Apply a score to `claim` and build its audit entry. Shared by store
/// implementations so both produce identical records.
pub fn score_update(claim: &mut Claim, breakdown: ScoreBreakdown, now: u64) -> Result<AuditLogEntry, LedgerError> {
    if claim.status.is_terminal() {
        return Err(LedgerError::ClaimResolved(claim.id));
    }
    let old_score = claim.trust_score;
    score::apply_score(claim, breakdown.score, now);
    Ok(AuditLogEntry {
        id: 0,
        claim_id: claim.id,
        old_score,
        new_score: breakdown.score,
        event: AuditEvent::ScoreUpdate { alpha: breakdown.alpha, beta: breakdown.beta },
        created_at: now,
    })
}

/// Mark `claim` terminal. Returns `false` if it already was.
pub fn mark_resolved(claim: &mut Claim, status: ClaimStatus, now: u64) -> bool {
    if claim.status.is_terminal() || !status.is_terminal() {
        return false;
    }
    claim.status = status;
    claim.resolved_at = Some(now);
    claim.updated_at = now;
    true
}

#[derive(Default)]
struct Tables {
    claims: BTreeMap<ClaimId, Claim>,
    evidence: BTreeMap<EvidenceId, Evidence>,
    evidence_votes: BTreeMap<VoteId, EvidenceVote>,
    claim_votes: BTreeMap<VoteId, ClaimVote>,
    users: HashMap<Hash256, UserAccount>,
    vote_keys: HashSet<Hash256>,
    audit_log: Vec<AuditLogEntry>,
    fingerprints: HashMap<Hash256, Fingerprint>,
    agreements: HashMap<(Hash256, Hash256), AgreementRecord>,
    relationships: Vec<Relationship>,
    next_claim_id: u64,
    next_evidence_id: u64,
    next_vote_id: u64,
    next_relationship_id: u64,
}

impl Tables {
    fn next(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }

    fn append_audit(&mut self, mut entry: AuditLogEntry) {
        entry.id = self.audit_log.len() as u64 + 1;
        self.audit_log.push(entry);
    }

    fn check_votable(&self, claim_id: ClaimId) -> Result<(), LedgerError> {
        let claim = self.claims.get(&claim_id).ok_or(LedgerError::ClaimNotFound(claim_id))?;
        if claim.status.is_terminal() {
            return Err(LedgerError::ClaimResolved(claim_id));
        }
        Ok(())
    }

    fn settle_user(
        &mut self,
        voter: &Hash256,
        stake: u64,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Settlement, LedgerError> {
        let user = self
            .users
            .get_mut(voter)
            .ok_or_else(|| LedgerError::UserNotFound(voter.short()))?;
        Ok(user.settle(stake, outcome, now))
    }
}

/// In-memory ledger for tests.
///
/// A single lock covers every table, so each trait call is trivially atomic.
/// Write failures can be injected with
/// [`fail_next_writes`](Self::fail_next_writes) to exercise error paths.
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
    injected_failures: AtomicU32,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` mutating calls fail with [`LedgerError::Storage`]
    /// before touching any table.
    pub fn fail_next_writes(&self, n: u32) {
        self.injected_failures.store(n, Ordering::SeqCst);
    }

    /// Number of users with a ledger entry.
    pub fn user_count(&self) -> usize {
        self.tables.read().users.len()
    }

    fn check_write(&self) -> Result<(), LedgerError> {
        let tripped = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(LedgerError::Storage("injected write failure".into()));
        }
        Ok(())
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn insert_claim(&self, mut claim: Claim) -> Result<Claim, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        claim.id = Tables::next(&mut t.next_claim_id);
        t.claims.insert(claim.id, claim.clone());
        Ok(claim)
    }

    fn get_claim(&self, id: ClaimId) -> Result<Option<Claim>, LedgerError> {
        Ok(self.tables.read().claims.get(&id).cloned())
    }

    fn list_claims(&self) -> Result<Vec<Claim>, LedgerError> {
        Ok(self.tables.read().claims.values().cloned().collect())
    }

    fn apply_score(&self, id: ClaimId, breakdown: ScoreBreakdown, now: u64) -> Result<Claim, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        let mut claim = t.claims.get(&id).cloned().ok_or(LedgerError::ClaimNotFound(id))?;
        let entry = score_update(&mut claim, breakdown, now)?;
        t.claims.insert(id, claim.clone());
        t.append_audit(entry);
        Ok(claim)
    }

    fn finalize_claim(
        &self,
        id: ClaimId,
        status: ClaimStatus,
        reason: ResolutionReason,
        now: u64,
    ) -> Result<Option<Claim>, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        let mut claim = t.claims.get(&id).cloned().ok_or(LedgerError::ClaimNotFound(id))?;
        if !mark_resolved(&mut claim, status, now) {
            return Ok(None);
        }
        let entry = resolution_entry(&claim, status, reason, now);
        t.claims.insert(id, claim.clone());
        t.append_audit(entry);
        Ok(Some(claim))
    }

    fn insert_evidence(&self, mut evidence: Evidence) -> Result<Evidence, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        if !t.claims.contains_key(&evidence.claim_id) {
            return Err(LedgerError::ClaimNotFound(evidence.claim_id));
        }
        evidence.id = Tables::next(&mut t.next_evidence_id);
        t.evidence.insert(evidence.id, evidence.clone());
        Ok(evidence)
    }

    fn get_evidence(&self, id: EvidenceId) -> Result<Option<Evidence>, LedgerError> {
        Ok(self.tables.read().evidence.get(&id).cloned())
    }

    fn evidence_for_claim(&self, claim_id: ClaimId) -> Result<Vec<Evidence>, LedgerError> {
        Ok(self
            .tables
            .read()
            .evidence
            .values()
            .filter(|e| e.claim_id == claim_id)
            .cloned()
            .collect())
    }

    fn has_vote_key(&self, key: &Hash256) -> Result<bool, LedgerError> {
        Ok(self.tables.read().vote_keys.contains(key))
    }

    fn commit_evidence_vote(&self, mut vote: EvidenceVote, voter: UserAccount) -> Result<EvidenceVote, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        if t.vote_keys.contains(&vote.vote_key) {
            return Err(LedgerError::DuplicateVoteKey(vote.vote_key.short()));
        }
        t.check_votable(vote.claim_id)?;
        let evidence = t
            .evidence
            .get_mut(&vote.evidence_id)
            .ok_or(LedgerError::EvidenceNotFound(vote.evidence_id))?;
        evidence.count_vote(vote.stance);

        vote.id = Tables::next(&mut t.next_vote_id);
        t.vote_keys.insert(vote.vote_key);
        t.users.insert(voter.key, voter);
        t.evidence_votes.insert(vote.id, vote.clone());
        Ok(vote)
    }

    fn commit_claim_vote(&self, mut vote: ClaimVote, voter: UserAccount) -> Result<ClaimVote, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        if t.vote_keys.contains(&vote.vote_key) {
            return Err(LedgerError::DuplicateVoteKey(vote.vote_key.short()));
        }
        t.check_votable(vote.claim_id)?;

        vote.id = Tables::next(&mut t.next_vote_id);
        t.vote_keys.insert(vote.vote_key);
        t.users.insert(voter.key, voter);
        t.claim_votes.insert(vote.id, vote.clone());
        Ok(vote)
    }

    fn evidence_votes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<EvidenceVote>, LedgerError> {
        Ok(self
            .tables
            .read()
            .evidence_votes
            .values()
            .filter(|v| v.claim_id == claim_id)
            .cloned()
            .collect())
    }

    fn claim_votes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<ClaimVote>, LedgerError> {
        Ok(self
            .tables
            .read()
            .claim_votes
            .values()
            .filter(|v| v.claim_id == claim_id)
            .cloned()
            .collect())
    }

    fn settle_evidence_vote(
        &self,
        claim_id: ClaimId,
        vote_id: VoteId,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Option<Settlement>, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        let vote = t
            .evidence_votes
            .get(&vote_id)
            .filter(|v| v.claim_id == claim_id)
            .cloned()
            .ok_or(LedgerError::VoteNotFound(vote_id))?;
        if vote.settlement.is_some() {
            return Ok(None);
        }
        let settlement = t.settle_user(&vote.voter, vote.stake, outcome, now)?;
        if let Some(v) = t.evidence_votes.get_mut(&vote_id) {
            v.settlement = Some(settlement);
        }
        Ok(Some(settlement))
    }

    fn settle_claim_vote(
        &self,
        claim_id: ClaimId,
        vote_id: VoteId,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Option<Settlement>, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        let vote = t
            .claim_votes
            .get(&vote_id)
            .filter(|v| v.claim_id == claim_id)
            .cloned()
            .ok_or(LedgerError::VoteNotFound(vote_id))?;
        if vote.settlement.is_some() {
            return Ok(None);
        }
        let settlement = t.settle_user(&vote.voter, vote.stake, outcome, now)?;
        if let Some(v) = t.claim_votes.get_mut(&vote_id) {
            v.settlement = Some(settlement);
        }
        Ok(Some(settlement))
    }

    fn get_user(&self, key: &Hash256) -> Result<Option<UserAccount>, LedgerError> {
        Ok(self.tables.read().users.get(key).cloned())
    }

    fn get_fingerprint(&self, key: &Hash256) -> Result<Option<Fingerprint>, LedgerError> {
        Ok(self.tables.read().fingerprints.get(key).cloned())
    }

    fn put_fingerprint(&self, fingerprint: &Fingerprint) -> Result<(), LedgerError> {
        self.check_write()?;
        self.tables.write().fingerprints.insert(fingerprint.key, fingerprint.clone());
        Ok(())
    }

    fn get_agreement(&self, x: &Hash256, y: &Hash256) -> Result<Option<AgreementRecord>, LedgerError> {
        Ok(self.tables.read().agreements.get(&ordered_pair(*x, *y)).cloned())
    }

    fn put_agreement(&self, record: &AgreementRecord) -> Result<(), LedgerError> {
        self.check_write()?;
        self.tables
            .write()
            .agreements
            .insert(ordered_pair(record.a, record.b), record.clone());
        Ok(())
    }

    fn insert_relationship(&self, mut relationship: Relationship) -> Result<Relationship, LedgerError> {
        self.check_write()?;
        let mut t = self.tables.write();
        if let Some(existing) = t.relationships.iter().find(|r| {
            r.parent == relationship.parent && r.child == relationship.child && r.kind == relationship.kind
        }) {
            return Ok(existing.clone());
        }
        relationship.id = Tables::next(&mut t.next_relationship_id);
        t.relationships.push(relationship.clone());
        Ok(relationship)
    }

    fn relationships_for(&self, claim_id: ClaimId) -> Result<Vec<Relationship>, LedgerError> {
        Ok(self
            .tables
            .read()
            .relationships
            .iter()
            .filter(|r| r.parent == claim_id || r.child == claim_id)
            .cloned()
            .collect())
    }

    fn audit_for_claim(&self, claim_id: ClaimId) -> Result<Vec<AuditLogEntry>, LedgerError> {
        Ok(self
            .tables
            .read()
            .audit_log
            .iter()
            .filter(|e| e.claim_id == claim_id)
            .cloned()
            .collect())
    }
}
