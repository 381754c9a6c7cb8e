//! RocksDB-backed persistent ledger storage.
//!
//! Implements [`LedgerStore`] using RocksDB column families for claims,
//! evidence, votes, users, duplicate-vote keys, the audit log, detector state,
//! relationships, and metadata. Every mutation is a single atomic
//! [`WriteBatch`]; read-check-write sequences are serialized by an internal
//! write lock so conditional updates cannot interleave.
//!
//! Evidence, vote, audit and relationship keys are `claim_id ‖ id`
//! (big-endian) so a claim's records can be read with one prefix scan. A
//! relationship is stored under both of its endpoints; evidence has a
//! secondary `evidence_id → claim_id` index for lookups by id.

use std::path::Path;

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, SliceTransform, WriteBatch};

use rumor_core::detector::{AgreementRecord, Fingerprint, pair_key};
use rumor_core::error::LedgerError;
use rumor_core::ledger::{LedgerStore, mark_resolved, resolution_entry, score_update};
use rumor_core::score::ScoreBreakdown;
use rumor_core::types::{
    AuditLogEntry, Claim, ClaimId, ClaimStatus, ClaimVote, Evidence, EvidenceId, EvidenceVote,
    Hash256, Relationship, ResolutionReason, Settlement, UserAccount, VoteId, VoteOutcome,
};

// --- Column family names ---

const CF_CLAIMS: &str = "claims";
const CF_EVIDENCE: &str = "evidence";
const CF_EVIDENCE_CLAIMS: &str = "evidence_claims";
const CF_EVIDENCE_VOTES: &str = "evidence_votes";
const CF_CLAIM_VOTES: &str = "claim_votes";
const CF_USERS: &str = "users";
const CF_VOTE_KEYS: &str = "vote_keys";
const CF_AUDIT_LOG: &str = "audit_log";
const CF_FINGERPRINTS: &str = "fingerprints";
const CF_AGREEMENTS: &str = "agreements";
const CF_RELATIONSHIPS: &str = "relationships";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[
    CF_CLAIMS,
    CF_EVIDENCE,
    CF_EVIDENCE_CLAIMS,
    CF_EVIDENCE_VOTES,
    CF_CLAIM_VOTES,
    CF_USERS,
    CF_VOTE_KEYS,
    CF_AUDIT_LOG,
    CF_FINGERPRINTS,
    CF_AGREEMENTS,
    CF_RELATIONSHIPS,
    CF_METADATA,
];

/// Column families keyed by `claim_id ‖ id`.
const CLAIM_PREFIXED_CFS: &[&str] = &[CF_EVIDENCE, CF_EVIDENCE_VOTES, CF_CLAIM_VOTES, CF_AUDIT_LOG, CF_RELATIONSHIPS];

// --- Metadata keys ---

const META_NEXT_CLAIM_ID: &[u8] = b"next_claim_id";
const META_NEXT_EVIDENCE_ID: &[u8] = b"next_evidence_id";
const META_NEXT_VOTE_ID: &[u8] = b"next_vote_id";
const META_NEXT_AUDIT_ID: &[u8] = b"next_audit_id";
const META_NEXT_RELATIONSHIP_ID: &[u8] = b"next_relationship_id";

fn storage_err(e: rocksdb::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, LedgerError> {
    bincode::encode_to_vec(value, bincode::config::standard()).map_err(|e| LedgerError::Codec(e.to_string()))
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, LedgerError> {
    let (value, _): (T, usize) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| LedgerError::Codec(e.to_string()))?;
    Ok(value)
}

/// Encode an id as big-endian bytes for ordered iteration.
fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// `claim_id ‖ id`, both big-endian.
fn scoped_key(claim_id: ClaimId, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&claim_id.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

/// RocksDB-backed persistent ledger.
pub struct RocksStore {
    db: DB,
    /// Serializes every read-check-write sequence.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all column families if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| {
                let mut opts = Options::default();
                if CLAIM_PREFIXED_CFS.contains(name) {
                    opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(8));
                }
                ColumnFamilyDescriptor::new(*name, opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors).map_err(storage_err)?;

        Ok(Self { db, write_lock: Mutex::new(()) })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush().map_err(storage_err)
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, LedgerError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("missing column family: {name}")))
    }

    fn get<T: bincode::Decode<()>>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>, LedgerError> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_in<T: bincode::Encode>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<(), LedgerError> {
        let cf = self.cf_handle(cf_name)?;
        batch.put_cf(cf, key, encode(value)?);
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), LedgerError> {
        self.db.write(batch).map_err(storage_err)
    }

    /// Decode every value in a column family.
    fn scan_all<T: bincode::Decode<()>>(&self, cf_name: &str) -> Result<Vec<T>, LedgerError> {
        let cf = self.cf_handle(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(storage_err)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Decode every value whose key starts with `claim_id`.
    fn scan_claim<T: bincode::Decode<()>>(&self, cf_name: &str, claim_id: ClaimId) -> Result<Vec<T>, LedgerError> {
        let cf = self.cf_handle(cf_name)?;
        let prefix = id_key(claim_id);
        let mut out = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, prefix) {
            let (key, value) = item.map_err(storage_err)?;
            // The prefix iterator may run past the prefix.
            if !key.starts_with(&prefix) {
                break;
            }
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn get_meta_u64(&self, key: &[u8]) -> Result<u64, LedgerError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LedgerError::Storage("invalid metadata counter length".into()))?;
                Ok(u64::from_le_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Allocate the next id for a counter, staging the bump in `batch`.
    ///
    /// Must be called with `write_lock` held.
    fn next_id(&self, batch: &mut WriteBatch, key: &[u8]) -> Result<u64, LedgerError> {
        let id = self.get_meta_u64(key)? + 1;
        let cf = self.cf_handle(CF_METADATA)?;
        batch.put_cf(cf, key, id.to_le_bytes());
        Ok(id)
    }

    fn stage_audit(&self, batch: &mut WriteBatch, mut entry: AuditLogEntry) -> Result<(), LedgerError> {
        entry.id = self.next_id(batch, META_NEXT_AUDIT_ID)?;
        self.put_in(batch, CF_AUDIT_LOG, &scoped_key(entry.claim_id, entry.id), &entry)
    }

    /// Full `CF_EVIDENCE` key for an evidence id, via the index.
    fn evidence_key(&self, id: EvidenceId) -> Result<Option<[u8; 16]>, LedgerError> {
        let cf = self.cf_handle(CF_EVIDENCE_CLAIMS)?;
        match self.db.get_cf(cf, id_key(id)).map_err(storage_err)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LedgerError::Storage("invalid evidence index entry".into()))?;
                Ok(Some(scoped_key(u64::from_be_bytes(raw), id)))
            }
            None => Ok(None),
        }
    }

    fn vote_key_taken(&self, key: &Hash256) -> Result<bool, LedgerError> {
        let cf = self.cf_handle(CF_VOTE_KEYS)?;
        Ok(self.db.get_cf(cf, key.as_bytes()).map_err(storage_err)?.is_some())
    }

    fn check_votable(&self, claim_id: ClaimId) -> Result<(), LedgerError> {
        let claim: Claim = self
            .get(CF_CLAIMS, &id_key(claim_id))?
            .ok_or(LedgerError::ClaimNotFound(claim_id))?;
        if claim.status.is_terminal() {
            return Err(LedgerError::ClaimResolved(claim_id));
        }
        Ok(())
    }

    /// Stage the vote key, the voter, and the id counter for a new vote.
    fn stage_vote_common(
        &self,
        batch: &mut WriteBatch,
        vote_key: &Hash256,
        claim_id: ClaimId,
        voter: &UserAccount,
    ) -> Result<VoteId, LedgerError> {
        if self.vote_key_taken(vote_key)? {
            return Err(LedgerError::DuplicateVoteKey(vote_key.short()));
        }
        self.check_votable(claim_id)?;
        let id = self.next_id(batch, META_NEXT_VOTE_ID)?;
        batch.put_cf(self.cf_handle(CF_VOTE_KEYS)?, vote_key.as_bytes(), id_key(id));
        self.put_in(batch, CF_USERS, voter.key.as_bytes(), voter)?;
        Ok(id)
    }

    /// Settle a voter's stake, staging the updated account.
    fn stage_user_settlement(
        &self,
        batch: &mut WriteBatch,
        voter: &Hash256,
        stake: u64,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Settlement, LedgerError> {
        let mut user: UserAccount = self
            .get(CF_USERS, voter.as_bytes())?
            .ok_or_else(|| LedgerError::UserNotFound(voter.short()))?;
        let settlement = user.settle(stake, outcome, now);
        self.put_in(batch, CF_USERS, voter.as_bytes(), &user)?;
        Ok(settlement)
    }
}

impl LedgerStore for RocksStore {
    fn insert_claim(&self, mut claim: Claim) -> Result<Claim, LedgerError> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        claim.id = self.next_id(&mut batch, META_NEXT_CLAIM_ID)?;
        self.put_in(&mut batch, CF_CLAIMS, &id_key(claim.id), &claim)?;
        self.write(batch)?;
        Ok(claim)
    }

    fn get_claim(&self, id: ClaimId) -> Result<Option<Claim>, LedgerError> {
        self.get(CF_CLAIMS, &id_key(id))
    }

    fn list_claims(&self) -> Result<Vec<Claim>, LedgerError> {
        self.scan_all(CF_CLAIMS)
    }

    fn apply_score(&self, id: ClaimId, breakdown: ScoreBreakdown, now: u64) -> Result<Claim, LedgerError> {
        let _guard = self.write_lock.lock();
        let mut claim: Claim = self.get(CF_CLAIMS, &id_key(id))?.ok_or(LedgerError::ClaimNotFound(id))?;
        let entry = score_update(&mut claim, breakdown, now)?;

        let mut batch = WriteBatch::default();
        self.put_in(&mut batch, CF_CLAIMS, &id_key(id), &claim)?;
        self.stage_audit(&mut batch, entry)?;
        self.write(batch)?;
        Ok(claim)
    }

    fn finalize_claim(
        &self,
        id: ClaimId,
        status: ClaimStatus,
        reason: ResolutionReason,
        now: u64,
    ) -> Result<Option<Claim>, LedgerError> {
        let _guard = self.write_lock.lock();
        let mut claim: Claim = self.get(CF_CLAIMS, &id_key(id))?.ok_or(LedgerError::ClaimNotFound(id))?;
        if !mark_resolved(&mut claim, status, now) {
            return Ok(None);
        }

        let mut batch = WriteBatch::default();
        self.put_in(&mut batch, CF_CLAIMS, &id_key(id), &claim)?;
        self.stage_audit(&mut batch, resolution_entry(&claim, status, reason, now))?;
        self.write(batch)?;
        Ok(Some(claim))
    }

    fn insert_evidence(&self, mut evidence: Evidence) -> Result<Evidence, LedgerError> {
        let _guard = self.write_lock.lock();
        if self.get_claim(evidence.claim_id)?.is_none() {
            return Err(LedgerError::ClaimNotFound(evidence.claim_id));
        }
        let mut batch = WriteBatch::default();
        evidence.id = self.next_id(&mut batch, META_NEXT_EVIDENCE_ID)?;
        self.put_in(&mut batch, CF_EVIDENCE, &scoped_key(evidence.claim_id, evidence.id), &evidence)?;
        batch.put_cf(self.cf_handle(CF_EVIDENCE_CLAIMS)?, id_key(evidence.id), id_key(evidence.claim_id));
        self.write(batch)?;
        Ok(evidence)
    }

    fn get_evidence(&self, id: EvidenceId) -> Result<Option<Evidence>, LedgerError> {
        match self.evidence_key(id)? {
            Some(key) => self.get(CF_EVIDENCE, &key),
            None => Ok(None),
        }
    }

    fn evidence_for_claim(&self, claim_id: ClaimId) -> Result<Vec<Evidence>, LedgerError> {
        self.scan_claim(CF_EVIDENCE, claim_id)
    }

    fn has_vote_key(&self, key: &Hash256) -> Result<bool, LedgerError> {
        self.vote_key_taken(key)
    }

    fn commit_evidence_vote(&self, mut vote: EvidenceVote, voter: UserAccount) -> Result<EvidenceVote, LedgerError> {
        let _guard = self.write_lock.lock();
        let evidence_key = self
            .evidence_key(vote.evidence_id)?
            .ok_or(LedgerError::EvidenceNotFound(vote.evidence_id))?;
        let mut evidence: Evidence = self
            .get(CF_EVIDENCE, &evidence_key)?
            .ok_or(LedgerError::EvidenceNotFound(vote.evidence_id))?;

        let mut batch = WriteBatch::default();
        vote.id = self.stage_vote_common(&mut batch, &vote.vote_key, vote.claim_id, &voter)?;
        evidence.count_vote(vote.stance);
        self.put_in(&mut batch, CF_EVIDENCE, &evidence_key, &evidence)?;
        self.put_in(&mut batch, CF_EVIDENCE_VOTES, &scoped_key(vote.claim_id, vote.id), &vote)?;
        self.write(batch)?;
        Ok(vote)
    }

    fn commit_claim_vote(&self, mut vote: ClaimVote, voter: UserAccount) -> Result<ClaimVote, LedgerError> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        vote.id = self.stage_vote_common(&mut batch, &vote.vote_key, vote.claim_id, &voter)?;
        self.put_in(&mut batch, CF_CLAIM_VOTES, &scoped_key(vote.claim_id, vote.id), &vote)?;
        self.write(batch)?;
        Ok(vote)
    }

    fn evidence_votes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<EvidenceVote>, LedgerError> {
        self.scan_claim(CF_EVIDENCE_VOTES, claim_id)
    }

    fn claim_votes_for_claim(&self, claim_id: ClaimId) -> Result<Vec<ClaimVote>, LedgerError> {
        self.scan_claim(CF_CLAIM_VOTES, claim_id)
    }

    fn settle_evidence_vote(
        &self,
        claim_id: ClaimId,
        vote_id: VoteId,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Option<Settlement>, LedgerError> {
        let _guard = self.write_lock.lock();
        let key = scoped_key(claim_id, vote_id);
        let mut vote: EvidenceVote = self
            .get(CF_EVIDENCE_VOTES, &key)?
            .ok_or(LedgerError::VoteNotFound(vote_id))?;
        if vote.settlement.is_some() {
            return Ok(None);
        }

        let mut batch = WriteBatch::default();
        let settlement = self.stage_user_settlement(&mut batch, &vote.voter, vote.stake, outcome, now)?;
        vote.settlement = Some(settlement);
        self.put_in(&mut batch, CF_EVIDENCE_VOTES, &key, &vote)?;
        self.write(batch)?;
        Ok(Some(settlement))
    }

    fn settle_claim_vote(
        &self,
        claim_id: ClaimId,
        vote_id: VoteId,
        outcome: VoteOutcome,
        now: u64,
    ) -> Result<Option<Settlement>, LedgerError> {
        let _guard = self.write_lock.lock();
        let key = scoped_key(claim_id, vote_id);
        let mut vote: ClaimVote = self
            .get(CF_CLAIM_VOTES, &key)?
            .ok_or(LedgerError::VoteNotFound(vote_id))?;
        if vote.settlement.is_some() {
            return Ok(None);
        }

        let mut batch = WriteBatch::default();
        let settlement = self.stage_user_settlement(&mut batch, &vote.voter, vote.stake, outcome, now)?;
        vote.settlement = Some(settlement);
        self.put_in(&mut batch, CF_CLAIM_VOTES, &key, &vote)?;
        self.write(batch)?;
        Ok(Some(settlement))
    }

    fn get_user(&self, key: &Hash256) -> Result<Option<UserAccount>, LedgerError> {
        self.get(CF_USERS, key.as_bytes())
    }

    fn get_fingerprint(&self, key: &Hash256) -> Result<Option<Fingerprint>, LedgerError> {
        self.get(CF_FINGERPRINTS, key.as_bytes())
    }

    fn put_fingerprint(&self, fingerprint: &Fingerprint) -> Result<(), LedgerError> {
        let mut batch = WriteBatch::default();
        self.put_in(&mut batch, CF_FINGERPRINTS, fingerprint.key.as_bytes(), fingerprint)?;
        self.write(batch)
    }

    fn get_agreement(&self, x: &Hash256, y: &Hash256) -> Result<Option<AgreementRecord>, LedgerError> {
        self.get(CF_AGREEMENTS, &pair_key(x, y))
    }

    fn put_agreement(&self, record: &AgreementRecord) -> Result<(), LedgerError> {
        let mut batch = WriteBatch::default();
        self.put_in(&mut batch, CF_AGREEMENTS, &pair_key(&record.a, &record.b), record)?;
        self.write(batch)
    }

    fn insert_relationship(&self, mut relationship: Relationship) -> Result<Relationship, LedgerError> {
        let _guard = self.write_lock.lock();
        let existing = self
            .scan_claim::<Relationship>(CF_RELATIONSHIPS, relationship.parent)?
            .into_iter()
            .find(|r| r.parent == relationship.parent && r.child == relationship.child && r.kind == relationship.kind);
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let mut batch = WriteBatch::default();
        relationship.id = self.next_id(&mut batch, META_NEXT_RELATIONSHIP_ID)?;
        for endpoint in [relationship.parent, relationship.child] {
            self.put_in(&mut batch, CF_RELATIONSHIPS, &scoped_key(endpoint, relationship.id), &relationship)?;
        }
        self.write(batch)?;
        Ok(relationship)
    }

    fn relationships_for(&self, claim_id: ClaimId) -> Result<Vec<Relationship>, LedgerError> {
        self.scan_claim(CF_RELATIONSHIPS, claim_id)
    }

    fn audit_for_claim(&self, claim_id: ClaimId) -> Result<Vec<AuditLogEntry>, LedgerError> {
        self.scan_claim(CF_AUDIT_LOG, claim_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumor_core::types::{AuditEvent, EvidenceKind, EvidenceStance, RelationshipKind};

    /// Create a temporary RocksStore.
    fn temp_store() -> (RocksStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("ledger")).unwrap();
        (store, dir)
    }

    fn voter(seed: u8, stake: u64) -> UserAccount {
        let mut u = UserAccount::new(Hash256([seed; 32]), 0);
        u.lock_stake(stake).unwrap();
        u
    }

    #[test]
    fn scoped_keys_sort_by_claim_then_id() {
        assert!(scoped_key(1, u64::MAX) < scoped_key(2, 0));
        assert!(scoped_key(3, 1) < scoped_key(3, 2));
    }

    proptest::proptest! {
        #[test]
        fn scoped_key_order_matches_tuple_order(a: (u64, u64), b: (u64, u64)) {
            proptest::prop_assert_eq!(scoped_key(a.0, a.1).cmp(&scoped_key(b.0, b.1)), a.cmp(&b));
        }
    }

    #[test]
    fn claim_ids_are_sequential() {
        let (store, _dir) = temp_store();
        let a = store.insert_claim(Claim::new("a".into(), None, None, 0)).unwrap();
        let b = store.insert_claim(Claim::new("b".into(), None, None, 0)).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.get_claim(2).unwrap().unwrap().content, "b");
        assert!(store.get_claim(3).unwrap().is_none());
    }

    #[test]
    fn votes_are_scoped_to_their_claim() {
        let (store, _dir) = temp_store();
        let c1 = store.insert_claim(Claim::new("a".into(), None, None, 0)).unwrap();
        let c2 = store.insert_claim(Claim::new("b".into(), None, None, 0)).unwrap();
        let ev = store
            .insert_evidence(Evidence::new(c1.id, EvidenceKind::Supporting, "e".into(), Hash256::ZERO, 0))
            .unwrap();

        let u = voter(1, 3);
        let vote = EvidenceVote {
            id: 0,
            evidence_id: ev.id,
            claim_id: c1.id,
            vote_key: Hash256([9; 32]),
            voter: u.key,
            stance: EvidenceStance::Misleading,
            stake: 3,
            weight: 0.75,
            reputation_snapshot: 0.5,
            created_at: 1,
            settlement: None,
        };
        store.commit_evidence_vote(vote, u.clone()).unwrap();

        assert_eq!(store.evidence_votes_for_claim(c1.id).unwrap().len(), 1);
        assert!(store.evidence_votes_for_claim(c2.id).unwrap().is_empty());
        assert_eq!(store.get_evidence(ev.id).unwrap().unwrap().misleading_count, 1);
        assert_eq!(store.get_user(&u.key).unwrap().unwrap().points_staked, 3);
    }

    #[test]
    fn audit_entries_in_order() {
        let (store, _dir) = temp_store();
        let c = store.insert_claim(Claim::new("a".into(), None, None, 0)).unwrap();
        store.apply_score(c.id, ScoreBreakdown { alpha: 2.0, beta: 1.0, score: 2.0 / 3.0 }, 1).unwrap();
        store.finalize_claim(c.id, ClaimStatus::Inconclusive, ResolutionReason::Stale, 2).unwrap();
        let audit = store.audit_for_claim(c.id).unwrap();
        assert_eq!(audit.len(), 2);
        assert!(matches!(audit[0].event, AuditEvent::ScoreUpdate { .. }));
        assert!(matches!(audit[1].event, AuditEvent::Resolution { .. }));
        assert!(audit[0].id < audit[1].id);
    }

    #[test]
    fn evidence_is_scoped_and_indexed_by_id() {
        let (store, _dir) = temp_store();
        let c1 = store.insert_claim(Claim::new("a".into(), None, None, 0)).unwrap();
        let c2 = store.insert_claim(Claim::new("b".into(), None, None, 0)).unwrap();
        let mut ids = Vec::new();
        for claim_id in [c2.id, c1.id, c2.id] {
            let ev = store
                .insert_evidence(Evidence::new(claim_id, EvidenceKind::Disputing, "e".into(), Hash256::ZERO, 0))
                .unwrap();
            ids.push(ev.id);
        }

        let for_c2: Vec<_> = store.evidence_for_claim(c2.id).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(for_c2, vec![ids[0], ids[2]]);
        assert_eq!(store.evidence_for_claim(c1.id).unwrap().len(), 1);
        assert_eq!(store.get_evidence(ids[1]).unwrap().unwrap().claim_id, c1.id);
        assert!(store.get_evidence(99).unwrap().is_none());
    }

    #[test]
    fn relationships_found_from_either_endpoint() {
        let (store, _dir) = temp_store();
        let ids: Vec<_> = (0..3)
            .map(|n| store.insert_claim(Claim::new(format!("c{n}"), None, None, 0)).unwrap().id)
            .collect();
        let link = |parent, child| {
            store
                .insert_relationship(Relationship {
                    id: 0,
                    parent,
                    child,
                    kind: RelationshipKind::DependsOn,
                    created_at: 0,
                })
                .unwrap()
        };
        let first = link(ids[0], ids[1]);
        let again = link(ids[0], ids[1]);
        link(ids[1], ids[2]);

        assert_eq!(first.id, again.id);
        assert_eq!(store.relationships_for(ids[0]).unwrap(), vec![first.clone()]);
        assert_eq!(store.relationships_for(ids[1]).unwrap().len(), 2);
        assert_eq!(store.relationships_for(ids[2]).unwrap().len(), 1);
    }

    #[test]
    fn reopen_preserves_state_and_counters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger");
        {
            let store = RocksStore::open(&path).unwrap();
            store.insert_claim(Claim::new("a".into(), None, None, 0)).unwrap();
            store.flush().unwrap();
        }
        let store = RocksStore::open(&path).unwrap();
        let next = store.insert_claim(Claim::new("b".into(), None, None, 0)).unwrap();
        assert_eq!(next.id, 2);
        assert_eq!(store.list_claims().unwrap().len(), 2);
    }
}
