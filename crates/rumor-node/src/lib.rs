//! # rumor-node: engine composition, RocksDB, resolution sweep, RPC.
//!
//! Wires the `rumor-core` rules into a running service:
//! - [`storage::RocksStore`]: persistent ledger backed by RocksDB
//! - [`engine::Engine`]: vote admission, scoring, and resolution with per-claim and per-user locking
//! - [`node::Node`]: opens the ledger, owns the engine, runs the periodic sweep
//! - [`rpc`]: JSON-RPC server for external access
//! - [`config::NodeConfig`]: node configuration

pub mod config;
pub mod engine;
pub mod node;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use engine::Engine;
pub use node::Node;
pub use rpc::start_rpc_server;
pub use storage::RocksStore;
