//! JSON-RPC server for the Rumor engine.
//!
//! Uses jsonrpsee 0.24. Every engine call runs on the blocking pool under the
//! configured call timeout; the engine itself is synchronous.

use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;

use rumor_core::detector::Fingerprint;
use rumor_core::error::{LedgerError, RumorError, VoteError};
use rumor_core::resolution::ResolutionCandidate;
use rumor_core::types::{
    Claim, ClaimId, ClaimStance, Evidence, EvidenceId, EvidenceKind, EvidenceStance, Relationship,
    RelationshipKind, UserStats,
};

use crate::engine::{ClaimDetail, ClaimGraph, ClaimOutcome, ClaimSummary, Engine, SweepReport, VoteReceipt};
use crate::node::Node;

/// Stable JSON-RPC error codes.
pub mod codes {
    pub const INTERNAL: i32 = -1;
    pub const INVALID_STAKE: i32 = -3;
    pub const DUPLICATE_VOTE: i32 = -4;
    pub const SELF_VOTE: i32 = -5;
    pub const INSUFFICIENT_POINTS: i32 = -6;
    pub const CLAIM_NOT_VOTABLE: i32 = -7;
    pub const NOT_FOUND: i32 = -8;
    /// Backend failure; the request may be retried unchanged.
    pub const STORAGE: i32 = -9;
    pub const INVALID_INPUT: i32 = -10;
    pub const TIMEOUT: i32 = -11;
}

fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

pub fn vote_error_code(err: &VoteError) -> i32 {
    match err {
        VoteError::DuplicateVote => codes::DUPLICATE_VOTE,
        VoteError::SelfVote => codes::SELF_VOTE,
        VoteError::InsufficientPoints { .. } => codes::INSUFFICIENT_POINTS,
        VoteError::ClaimNotVotable(_) => codes::CLAIM_NOT_VOTABLE,
        VoteError::ClaimOrEvidenceNotFound(_) => codes::NOT_FOUND,
        VoteError::InvalidStake(_) => codes::INVALID_STAKE,
        VoteError::Storage(_) => codes::STORAGE,
    }
}

pub fn ledger_error_code(err: &LedgerError) -> i32 {
    match err {
        LedgerError::Storage(_) => codes::STORAGE,
        LedgerError::Codec(_) => codes::INTERNAL,
        LedgerError::ClaimNotFound(_)
        | LedgerError::EvidenceNotFound(_)
        | LedgerError::VoteNotFound(_)
        | LedgerError::UserNotFound(_) => codes::NOT_FOUND,
        LedgerError::DuplicateVoteKey(_) => codes::DUPLICATE_VOTE,
        LedgerError::ClaimResolved(_) => codes::CLAIM_NOT_VOTABLE,
        LedgerError::EmptyContent | LedgerError::ContentTooLong { .. } | LedgerError::SelfRelationship => {
            codes::INVALID_INPUT
        }
    }
}

fn from_vote(err: VoteError) -> ErrorObjectOwned {
    rpc_error(vote_error_code(&err), &err.to_string())
}

fn from_ledger(err: LedgerError) -> ErrorObjectOwned {
    rpc_error(ledger_error_code(&err), &err.to_string())
}

/// The Rumor JSON-RPC interface.
#[rpc(server)]
pub trait RumorRpc {
    /// Creates an Active claim. `expires_at` is Unix milliseconds.
    #[method(name = "createclaim")]
    async fn create_claim(
        &self,
        content: String,
        image_url: Option<String>,
        expires_at: Option<u64>,
    ) -> Result<Claim, ErrorObjectOwned>;

    #[method(name = "createevidence")]
    async fn create_evidence(
        &self,
        claim_id: ClaimId,
        kind: EvidenceKind,
        content: String,
        creator: String,
    ) -> Result<Evidence, ErrorObjectOwned>;

    /// Stakes on whether a piece of evidence is helpful.
    #[method(name = "submitevidencevote")]
    async fn submit_evidence_vote(
        &self,
        identity: String,
        evidence_id: EvidenceId,
        stance: EvidenceStance,
        stake: u64,
    ) -> Result<VoteReceipt, ErrorObjectOwned>;

    /// Stakes directly on whether a claim is true.
    #[method(name = "submitclaimvote")]
    async fn submit_claim_vote(
        &self,
        identity: String,
        claim_id: ClaimId,
        stance: ClaimStance,
        stake: u64,
    ) -> Result<VoteReceipt, ErrorObjectOwned>;

    #[method(name = "getuserstats")]
    async fn get_user_stats(&self, identity: String) -> Result<UserStats, ErrorObjectOwned>;

    #[method(name = "getclaim")]
    async fn get_claim(&self, claim_id: ClaimId) -> Result<ClaimDetail, ErrorObjectOwned>;

    /// Lists claims newest first.
    #[method(name = "listclaims")]
    async fn list_claims(&self) -> Result<Vec<ClaimSummary>, ErrorObjectOwned>;

    #[method(name = "linkclaims")]
    async fn link_claims(
        &self,
        parent: ClaimId,
        child: ClaimId,
        kind: Option<RelationshipKind>,
    ) -> Result<Relationship, ErrorObjectOwned>;

    #[method(name = "listrelationships")]
    async fn list_relationships(&self, claim_id: ClaimId) -> Result<Vec<Relationship>, ErrorObjectOwned>;

    #[method(name = "getclaimgraph")]
    async fn get_claim_graph(&self, claim_id: ClaimId) -> Result<ClaimGraph, ErrorObjectOwned>;

    /// Runs one resolution sweep immediately.
    #[method(name = "runresolutionsweep")]
    async fn run_resolution_sweep(&self) -> Result<SweepReport, ErrorObjectOwned>;

    /// Resolves a claim whose expiry has passed; `null` if there was nothing to do.
    #[method(name = "resolveexpiredclaim")]
    async fn resolve_expired_claim(&self, claim_id: ClaimId) -> Result<Option<ClaimOutcome>, ErrorObjectOwned>;

    #[method(name = "getresolutioncandidates")]
    async fn get_resolution_candidates(&self) -> Result<Vec<ResolutionCandidate>, ErrorObjectOwned>;

    /// Detector state for an identity (moderator view).
    #[method(name = "getfingerprint")]
    async fn get_fingerprint(&self, identity: String) -> Result<Option<Fingerprint>, ErrorObjectOwned>;
}

/// Implementation of the RPC server.
pub struct RpcServerImpl {
    engine: Arc<Engine>,
    timeout: Duration,
}

impl RpcServerImpl {
    pub fn new(engine: Arc<Engine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Run `f` on the blocking pool, bounded by the call timeout.
    ///
    /// A timed-out call keeps running to completion; its effects stay
    /// consistent, the caller only loses the reply.
    async fn call<T, F>(&self, f: F) -> Result<T, ErrorObjectOwned>
    where
        T: Send + 'static,
        F: FnOnce(&Engine) -> Result<T, ErrorObjectOwned> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || f(&engine));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(rpc_error(codes::INTERNAL, &format!("engine task failed: {e}"))),
            Err(_) => Err(rpc_error(codes::TIMEOUT, "engine call timed out")),
        }
    }
}

#[async_trait]
impl RumorRpcServer for RpcServerImpl {
    async fn create_claim(
        &self,
        content: String,
        image_url: Option<String>,
        expires_at: Option<u64>,
    ) -> Result<Claim, ErrorObjectOwned> {
        self.call(move |e| e.create_claim(&content, image_url, expires_at).map_err(from_ledger))
            .await
    }

    async fn create_evidence(
        &self,
        claim_id: ClaimId,
        kind: EvidenceKind,
        content: String,
        creator: String,
    ) -> Result<Evidence, ErrorObjectOwned> {
        self.call(move |e| e.create_evidence(claim_id, kind, &content, &creator).map_err(from_ledger))
            .await
    }

    async fn submit_evidence_vote(
        &self,
        identity: String,
        evidence_id: EvidenceId,
        stance: EvidenceStance,
        stake: u64,
    ) -> Result<VoteReceipt, ErrorObjectOwned> {
        self.call(move |e| e.submit_evidence_vote(&identity, evidence_id, stance, stake).map_err(from_vote))
            .await
    }

    async fn submit_claim_vote(
        &self,
        identity: String,
        claim_id: ClaimId,
        stance: ClaimStance,
        stake: u64,
    ) -> Result<VoteReceipt, ErrorObjectOwned> {
        self.call(move |e| e.submit_claim_vote(&identity, claim_id, stance, stake).map_err(from_vote))
            .await
    }

    async fn get_user_stats(&self, identity: String) -> Result<UserStats, ErrorObjectOwned> {
        self.call(move |e| e.get_user_stats(&identity).map_err(from_ledger)).await
    }

    async fn get_claim(&self, claim_id: ClaimId) -> Result<ClaimDetail, ErrorObjectOwned> {
        self.call(move |e| e.get_claim(claim_id).map_err(from_ledger)).await
    }

    async fn list_claims(&self) -> Result<Vec<ClaimSummary>, ErrorObjectOwned> {
        self.call(|e| e.list_claims().map_err(from_ledger)).await
    }

    async fn link_claims(
        &self,
        parent: ClaimId,
        child: ClaimId,
        kind: Option<RelationshipKind>,
    ) -> Result<Relationship, ErrorObjectOwned> {
        let kind = kind.unwrap_or_default();
        self.call(move |e| e.link_claims(parent, child, kind).map_err(from_ledger)).await
    }

    async fn list_relationships(&self, claim_id: ClaimId) -> Result<Vec<Relationship>, ErrorObjectOwned> {
        self.call(move |e| e.list_relationships(claim_id).map_err(from_ledger)).await
    }

    async fn get_claim_graph(&self, claim_id: ClaimId) -> Result<ClaimGraph, ErrorObjectOwned> {
        self.call(move |e| e.claim_graph(claim_id).map_err(from_ledger)).await
    }

    async fn run_resolution_sweep(&self) -> Result<SweepReport, ErrorObjectOwned> {
        self.call(|e| e.run_resolution_sweep().map_err(from_ledger)).await
    }

    async fn resolve_expired_claim(&self, claim_id: ClaimId) -> Result<Option<ClaimOutcome>, ErrorObjectOwned> {
        self.call(move |e| e.resolve_expired_claim(claim_id).map_err(from_ledger)).await
    }

    async fn get_resolution_candidates(&self) -> Result<Vec<ResolutionCandidate>, ErrorObjectOwned> {
        self.call(|e| e.resolution_candidates().map_err(from_ledger)).await
    }

    async fn get_fingerprint(&self, identity: String) -> Result<Option<Fingerprint>, ErrorObjectOwned> {
        self.call(move |e| e.get_fingerprint(&identity).map_err(from_ledger)).await
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns a handle that can be used to stop the server.
pub async fn start_rpc_server(addr: &str, node: Arc<Node>) -> Result<ServerHandle, RumorError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| RumorError::Config(format!("RPC server error: {e}")))?;

    let rpc_impl = RpcServerImpl::new(Arc::clone(node.engine()), node.config().call_timeout());
    let handle = server.start(rpc_impl.into_rpc());

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumor_core::clock::ManualClock;
    use rumor_core::ledger::MemoryLedgerStore;
    use rumor_core::types::ClaimStatus;

    fn server() -> RpcServerImpl {
        let engine = Engine::new(
            Arc::new(MemoryLedgerStore::new()),
            b"rpc-test-salt",
            Arc::new(ManualClock::new(1_700_000_000_000)),
        );
        RpcServerImpl::new(Arc::new(engine), Duration::from_secs(5))
    }

    #[test]
    fn vote_error_codes_are_distinct() {
        let errors = [
            VoteError::DuplicateVote,
            VoteError::SelfVote,
            VoteError::InsufficientPoints { available: 0, stake: 1 },
            VoteError::ClaimNotVotable(1),
            VoteError::ClaimOrEvidenceNotFound("claim 1".into()),
            VoteError::InvalidStake(0),
            VoteError::Storage("down".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(vote_error_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn ledger_and_vote_codes_agree() {
        assert_eq!(
            ledger_error_code(&LedgerError::ClaimNotFound(3)),
            vote_error_code(&VoteError::ClaimOrEvidenceNotFound("claim 3".into()))
        );
        assert_eq!(ledger_error_code(&LedgerError::Storage("x".into())), codes::STORAGE);
        assert_eq!(ledger_error_code(&LedgerError::EmptyContent), codes::INVALID_INPUT);
    }

    #[test]
    fn params_and_results_use_plain_json() {
        let stance: EvidenceStance = serde_json::from_str("\"Misleading\"").unwrap();
        assert_eq!(stance, EvidenceStance::Misleading);
        let kind: Option<RelationshipKind> = serde_json::from_str("null").unwrap();
        assert_eq!(kind.unwrap_or_default(), RelationshipKind::DependsOn);

        let receipt = VoteReceipt { vote_id: 7, new_score: 0.5, new_status: ClaimStatus::Active };
        let json = serde_json::to_string(&receipt).unwrap();
        assert!(json.contains("\"vote_id\":7"));
        assert!(json.contains("\"new_status\":\"Active\""));
    }

    #[tokio::test]
    async fn vote_flow_over_rpc_methods() {
        let rpc = server();
        let claim = rpc.create_claim("free pizza at noon".into(), None, None).await.unwrap();
        let ev = rpc
            .create_evidence(claim.id, EvidenceKind::Supporting, "photo of flyer".into(), "poster".into())
            .await
            .unwrap();

        let receipt = rpc
            .submit_evidence_vote("student".into(), ev.id, EvidenceStance::Helpful, 1)
            .await
            .unwrap();
        assert_eq!(receipt.new_status, ClaimStatus::Active);
        assert!(receipt.new_score > 0.5);

        let err = rpc
            .submit_evidence_vote("student".into(), ev.id, EvidenceStance::Helpful, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::DUPLICATE_VOTE);

        let err = rpc
            .submit_evidence_vote("poster".into(), ev.id, EvidenceStance::Helpful, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::SELF_VOTE);

        let err = rpc.submit_claim_vote("student".into(), claim.id, ClaimStance::Verify, 11).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_STAKE);

        let stats = rpc.get_user_stats("student".into()).await.unwrap();
        assert_eq!(stats.points_staked, 1);
    }

    #[tokio::test]
    async fn read_models_over_rpc_methods() {
        let rpc = server();
        let a = rpc.create_claim("a".into(), None, None).await.unwrap();
        let b = rpc.create_claim("b".into(), None, None).await.unwrap();
        let edge = rpc.link_claims(a.id, b.id, None).await.unwrap();
        assert_eq!(edge.kind, RelationshipKind::DependsOn);

        assert_eq!(rpc.list_claims().await.unwrap().len(), 2);
        assert_eq!(rpc.list_relationships(b.id).await.unwrap().len(), 1);
        assert_eq!(rpc.get_claim_graph(b.id).await.unwrap().nodes.len(), 2);
        assert_eq!(rpc.get_resolution_candidates().await.unwrap().len(), 2);
        assert!(rpc.get_fingerprint("nobody".into()).await.unwrap().is_none());
        assert!(rpc.resolve_expired_claim(a.id).await.unwrap().is_none());
        assert_eq!(rpc.run_resolution_sweep().await.unwrap().resolved_count, 0);

        let err = rpc.get_claim(99).await.unwrap_err();
        assert_eq!(err.code(), codes::NOT_FOUND);
        let err = rpc.create_claim("   ".into(), None, None).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_INPUT);
    }
}
