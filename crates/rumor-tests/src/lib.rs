//! Adversarial and end-to-end test suite for the Rumor engine.
//!
//! Integration tests here drive the engine the way clients would and check
//! ledger invariants (stake conservation, exactly-once settlement, terminal
//! status) under hostile or concurrent use.

pub mod helpers;
