//! Shared test helpers for E2E and adversarial tests.

use std::sync::Arc;

use rumor_core::clock::ManualClock;
use rumor_core::ledger::{LedgerStore, MemoryLedgerStore};
use rumor_core::types::{Claim, Evidence, EvidenceKind, UserStats};
use rumor_node_lib::engine::Engine;
use rumor_node_lib::storage::RocksStore;
use tempfile::TempDir;

/// Fixed start of simulated time.
pub const T0: u64 = 1_700_000_000_000;

/// Gap between consecutive simulated votes, wide enough to stay clear of
/// the rapid-voting heuristic.
pub const VOTE_GAP_MS: u64 = 5_000;

const SALT: &[u8] = b"rumor-tests-salt";

/// An engine over a ledger with a manual clock.
pub struct TestEngine {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn LedgerStore>,
    pub clock: Arc<ManualClock>,
    /// Backing directory of an on-disk ledger; removed on drop.
    _dir: Option<TempDir>,
}

impl TestEngine {
    /// Engine over an in-memory ledger.
    pub fn new() -> Self {
        Self::over(Arc::new(MemoryLedgerStore::new()), None)
    }

    /// Engine over a RocksDB ledger in a fresh temporary directory.
    pub fn with_rocks() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RocksStore::open(dir.path().join("ledger")).unwrap());
        Self::over(store, Some(dir))
    }

    fn over(store: Arc<dyn LedgerStore>, dir: Option<TempDir>) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let engine = Arc::new(Engine::new(store.clone(), SALT, clock.clone()));
        Self { engine, store, clock, _dir: dir }
    }

    pub fn claim(&self, content: &str) -> Claim {
        self.engine.create_claim(content, None, None).unwrap()
    }

    pub fn evidence(&self, claim_id: u64, kind: EvidenceKind, creator: &str) -> Evidence {
        self.engine.create_evidence(claim_id, kind, "evidence body", creator).unwrap()
    }

    pub fn stats(&self, identity: &str) -> UserStats {
        self.engine.get_user_stats(identity).unwrap()
    }

    pub fn score(&self, claim_id: u64) -> f64 {
        self.store.get_claim(claim_id).unwrap().unwrap().trust_score
    }

    pub fn advance_hours(&self, hours: u64) {
        self.clock.advance(hours * rumor_core::constants::HOUR_MS);
    }

    pub fn gap(&self) {
        self.clock.advance(VOTE_GAP_MS);
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable identity name for the `n`th simulated user.
pub fn user(n: usize) -> String {
    format!("student-{n}")
}
