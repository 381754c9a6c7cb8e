//! # rumor-core
//! Foundation types, scoring math, and storage contracts for the Rumor engine.

pub mod clock;
pub mod constants;
pub mod detector;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod reputation;
pub mod resolution;
pub mod score;
pub mod types;
