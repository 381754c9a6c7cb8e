//! Node composition: storage, engine, and the periodic resolution sweep.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use rumor_core::clock::{Clock, SystemClock};
use rumor_core::error::RumorError;
use rumor_core::ledger::LedgerStore;

use crate::config::NodeConfig;
use crate::engine::{Engine, SweepReport};
use crate::storage::RocksStore;

/// A running Rumor node.
pub struct Node {
    config: NodeConfig,
    store: Arc<RocksStore>,
    engine: Arc<Engine>,
}

impl Node {
    /// Open the ledger under `config.data_dir` and build the engine.
    pub fn open(config: NodeConfig) -> Result<Arc<Self>, RumorError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>, RumorError> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| RumorError::Config(format!("create {}: {e}", config.data_dir.display())))?;

        let salt = config.load_or_create_salt()?;
        let store = Arc::new(RocksStore::open(config.db_path())?);
        let claims = store.list_claims()?.len();
        info!(path = %config.db_path().display(), claims, "ledger opened");

        let ledger: Arc<dyn LedgerStore> = store.clone();
        let engine = Arc::new(Engine::new(ledger, &salt, clock));
        Ok(Arc::new(Self { config, store, engine }))
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run one sweep on the blocking pool.
    pub async fn sweep_once(&self) -> Result<SweepReport, RumorError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.run_resolution_sweep())
            .await
            .map_err(|e| RumorError::Config(format!("sweep task: {e}")))?
            .map_err(RumorError::from)
    }

    /// Sweep every `sweep_interval` until the task is dropped.
    ///
    /// A failed sweep is logged; the next tick tries again.
    pub async fn run(self: &Arc<Self>) {
        let period = self.config.sweep_interval().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "resolution sweeper started");

        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(report) if report.resolved_count > 0 || report.resumed_settlements > 0 => {
                    info!(
                        resolved = report.resolved_count,
                        resumed = report.resumed_settlements,
                        "sweep finished"
                    );
                }
                Ok(_) => debug!("sweep finished; nothing to resolve"),
                Err(e) => warn!(error = %e, "sweep failed"),
            }
        }
    }

    /// Flush the ledger to disk.
    pub fn shutdown(&self) {
        if let Err(e) = self.store.flush() {
            error!(error = %e, "ledger flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumor_core::clock::ManualClock;
    use rumor_core::constants::DAY_MS;
    use rumor_core::types::{ClaimStance, ClaimStatus};

    fn config(dir: &std::path::Path) -> NodeConfig {
        NodeConfig { data_dir: dir.to_path_buf(), ..NodeConfig::default() }
    }

    #[test]
    fn open_creates_salt_and_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::open(config(dir.path())).unwrap();
        assert!(dir.path().join("identity.salt").exists());
        assert!(node.engine().list_claims().unwrap().is_empty());
    }

    #[test]
    fn identities_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let claim_id = {
            let node = Node::open(config(dir.path())).unwrap();
            let claim = node.engine().create_claim("library open late", None, None).unwrap();
            node.engine().submit_claim_vote("alice", claim.id, ClaimStance::Verify, 3).unwrap();
            node.shutdown();
            claim.id
        };

        let node = Node::open(config(dir.path())).unwrap();
        assert_eq!(node.engine().get_user_stats("alice").unwrap().points_staked, 3);
        assert_eq!(
            node.engine().submit_claim_vote("alice", claim_id, ClaimStance::Debunk, 1),
            Err(rumor_core::error::VoteError::DuplicateVote)
        );
    }

    #[tokio::test]
    async fn sweep_once_resolves_on_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let node = Node::open_with_clock(config(dir.path()), clock.clone()).unwrap();
        let claim = node.engine().create_claim("quiet claim", None, None).unwrap();

        clock.advance(8 * DAY_MS);
        let report = node.sweep_once().await.unwrap();
        assert_eq!(report.resolved_count, 1);
        assert_eq!(node.engine().get_claim(claim.id).unwrap().claim.status, ClaimStatus::Inconclusive);
    }
}
