//! Salted one-way identity keys.
//!
//! A raw caller identity is never stored. Instead it is hashed together with a
//! purpose tag under a BLAKE3 key derived from the server salt:
//!
//! - `user`            → stable ledger key (reputation, points)
//! - `creator`         → stored on evidence to block self-votes
//! - `vote:<resource>` → duplicate-vote key, one per identity per resource
//!
//! Keys for different purposes cannot be linked without the salt.

use std::fmt;

use crate::types::{ClaimId, EvidenceId, Hash256};

/// BLAKE3 key-derivation context. Changing it rotates every key in the ledger.
const KEY_CONTEXT: &str = "rumor 2026-01 identity hasher v1";

const PURPOSE_USER: &str = "user";
const PURPOSE_CREATOR: &str = "creator";

/// A resource that can be voted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Evidence(EvidenceId),
    Claim(ClaimId),
}

impl VoteTarget {
    /// Purpose tag used for the duplicate-vote key.
    pub fn purpose(&self) -> String {
        match self {
            Self::Evidence(id) => format!("vote:evidence:{id}"),
            Self::Claim(id) => format!("vote:claim:{id}"),
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evidence(id) => write!(f, "evidence {id}"),
            Self::Claim(id) => write!(f, "claim {id}"),
        }
    }
}

/// Deterministic keyed hasher for caller identities.
#[derive(Clone)]
pub struct IdentityHasher {
    key: [u8; 32],
}

impl IdentityHasher {
    /// Build a hasher from the server secret.
    pub fn new(salt: &[u8]) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, salt),
        }
    }

    /// Digest `identity` for an arbitrary purpose.
    ///
    /// The purpose is length-prefixed so no (purpose, identity) pair can
    /// collide with another by shifting bytes across the boundary.
    pub fn digest(&self, identity: &str, purpose: &str) -> Hash256 {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&(purpose.len() as u64).to_le_bytes());
        hasher.update(purpose.as_bytes());
        hasher.update(identity.as_bytes());
        Hash256(hasher.finalize().into())
    }

    pub fn user_key(&self, identity: &str) -> Hash256 {
        self.digest(identity, PURPOSE_USER)
    }

    pub fn creator_key(&self, identity: &str) -> Hash256 {
        self.digest(identity, PURPOSE_CREATOR)
    }

    pub fn vote_key(&self, identity: &str, target: VoteTarget) -> Hash256 {
        self.digest(identity, &target.purpose())
    }
}

impl fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityHasher").finish_non_exhaustive()
    }
}
