use {
    crate::forks::ForkVotingResult,
    ledger_constraint_machine::{substate::ValidatorSystemMetadata, ValidatorSet},
    ledger_sdk::Hash,
};

/// Ledger header signed by a quorum of the current validator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerProof {
    pub epoch: u64,
    pub view: u64,
    pub state_version: u64,
    pub accumulator: Hash,
    pub timestamp: u64,
    /// Present on the final proof of an epoch.
    pub next_validator_set: Option<ValidatorSet>,
}

impl LedgerProof {
    pub fn genesis(timestamp: u64) -> Self {
        Self {
            epoch: 0,
            view: 0,
            state_version: 0,
            accumulator: Hash::default(),
            timestamp,
            next_validator_set: None,
        }
    }

    /// Header of the batch following this one, before its accumulator is
    /// known.
    pub fn next(&self, view: u64, num_txns: u64, timestamp: u64) -> Self {
        Self {
            epoch: self.resulting_epoch(),
            view,
            state_version: self.state_version + num_txns,
            accumulator: self.accumulator,
            timestamp,
            next_validator_set: None,
        }
    }

    pub fn with_accumulator(self, accumulator: Hash) -> Self {
        Self {
            accumulator,
            ..self
        }
    }

    pub fn with_next_validator_set(self, validator_set: ValidatorSet) -> Self {
        Self {
            next_validator_set: Some(validator_set),
            ..self
        }
    }

    pub fn is_end_of_epoch(&self) -> bool {
        self.next_validator_set.is_some()
    }

    /// The epoch the ledger is in once this proof is committed.
    pub fn resulting_epoch(&self) -> u64 {
        if self.is_end_of_epoch() {
            self.epoch + 1
        } else {
            self.epoch
        }
    }
}

/// A [`LedgerProof`] together with the facts the engine derives while
/// committing the batch it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAndBFTProof {
    proof: LedgerProof,
    current_fork: String,
    next_fork: Option<String>,
    validators_system_metadata: Option<Vec<ValidatorSystemMetadata>>,
    fork_voting_results: Option<Vec<ForkVotingResult>>,
}

impl LedgerAndBFTProof {
    pub fn new(proof: LedgerProof, current_fork: impl Into<String>) -> Self {
        Self {
            proof,
            current_fork: current_fork.into(),
            next_fork: None,
            validators_system_metadata: None,
            fork_voting_results: None,
        }
    }

    pub fn proof(&self) -> &LedgerProof {
        &self.proof
    }

    pub fn current_fork(&self) -> &str {
        &self.current_fork
    }

    pub fn next_fork(&self) -> Option<&str> {
        self.next_fork.as_deref()
    }

    pub fn validators_system_metadata(&self) -> Option<&[ValidatorSystemMetadata]> {
        self.validators_system_metadata.as_deref()
    }

    pub fn fork_voting_results(&self) -> Option<&[ForkVotingResult]> {
        self.fork_voting_results.as_deref()
    }

    pub fn with_next_fork(self, next_fork: impl Into<String>) -> Self {
        Self {
            next_fork: Some(next_fork.into()),
            ..self
        }
    }

    pub fn with_validators_system_metadata(self, metadata: Vec<ValidatorSystemMetadata>) -> Self {
        Self {
            validators_system_metadata: Some(metadata),
            ..self
        }
    }

    pub fn with_fork_voting_results(self, results: Vec<ForkVotingResult>) -> Self {
        Self {
            fork_voting_results: Some(results),
            ..self
        }
    }
}
