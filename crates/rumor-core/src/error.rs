//! Error types for the Rumor engine.
use thiserror::Error;

use crate::constants::{MAX_STAKE, MIN_STAKE};

/// Reasons a vote submission is rejected.
///
/// Every variant except [`VoteError::Storage`] is raised before anything is
/// written. `Storage` is retryable; the vote was not recorded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("already voted on this resource")] DuplicateVote,
    #[error("cannot vote on your own evidence")] SelfVote,
    #[error("insufficient points: available {available}, stake {stake}")] InsufficientPoints { available: u64, stake: u64 },
    #[error("claim {0} is not accepting votes")] ClaimNotVotable(u64),
    #[error("claim or evidence not found: {0}")] ClaimOrEvidenceNotFound(String),
    #[error("stake {0} outside {MIN_STAKE}..={MAX_STAKE}")] InvalidStake(u64),
    #[error("storage: {0}")] Storage(String),
}

impl VoteError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Failures raised by a [`LedgerStore`](crate::ledger::LedgerStore) or by
/// non-vote engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("storage: {0}")] Storage(String),
    #[error("codec: {0}")] Codec(String),
    #[error("claim not found: {0}")] ClaimNotFound(u64),
    #[error("evidence not found: {0}")] EvidenceNotFound(u64),
    #[error("vote not found: {0}")] VoteNotFound(u64),
    #[error("user not found: {0}")] UserNotFound(String),
    #[error("vote key already used: {0}")] DuplicateVoteKey(String),
    #[error("claim {0} is already resolved")] ClaimResolved(u64),
    #[error("content is empty")] EmptyContent,
    #[error("content too long: {len} > {max}")] ContentTooLong { len: usize, max: usize },
    #[error("a claim cannot be related to itself")] SelfRelationship,
}

impl LedgerError {
    /// Whether the failure came from the storage backend rather than the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<LedgerError> for VoteError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ClaimNotFound(id) => Self::ClaimOrEvidenceNotFound(format!("claim {id}")),
            LedgerError::EvidenceNotFound(id) => {
                Self::ClaimOrEvidenceNotFound(format!("evidence {id}"))
            }
            LedgerError::DuplicateVoteKey(_) => Self::DuplicateVote,
            LedgerError::ClaimResolved(id) => Self::ClaimNotVotable(id),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum RumorError {
    #[error(transparent)] Vote(#[from] VoteError),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error("config: {0}")] Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_maps_to_duplicate_vote() {
        let err: VoteError = LedgerError::DuplicateVoteKey("ab".into()).into();
        assert_eq!(err, VoteError::DuplicateVote);
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err: VoteError = LedgerError::EvidenceNotFound(7).into();
        assert_eq!(err, VoteError::ClaimOrEvidenceNotFound("evidence 7".into()));
    }

    #[test]
    fn storage_is_retryable() {
        let err: VoteError = LedgerError::Storage("io".into()).into();
        assert!(err.is_retryable());
        assert!(!VoteError::SelfVote.is_retryable());
    }

    #[test]
    fn invalid_stake_message_names_range() {
        let msg = VoteError::InvalidStake(11).to_string();
        assert!(msg.contains("1..=10"), "{msg}");
    }
}
