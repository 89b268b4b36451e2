use {
    ledger_constraint_machine::{
        procedure::ProcedureRegistryError, serialization::DeserializeError,
        ConstraintMachineError, TxnParseError, ValidatorSet,
    },
    ledger_sdk::Hash,
    thiserror::Error,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("txn {txn_id} at index {index} failed to parse: {error}")]
    Parse {
        index: usize,
        txn_id: Hash,
        #[source]
        error: TxnParseError,
    },
    #[error("txn {txn_id} at index {index} failed verification: {error}")]
    Verification {
        index: usize,
        txn_id: Hash,
        #[source]
        error: Box<ConstraintMachineError>,
    },
    #[error("txn {txn_id} at index {index} was already committed")]
    AlreadyCommitted { index: usize, txn_id: Hash },
    #[error(transparent)]
    BatchVerifier(#[from] BatchVerifierError),
    #[error(transparent)]
    PostProcessor(#[from] PostProcessorError),
}

impl EngineError {
    /// Index of the transaction that failed, if a single one did.
    pub fn txn_index(&self) -> Option<usize> {
        match self {
            Self::Parse { index, .. }
            | Self::Verification { index, .. }
            | Self::AlreadyCommitted { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchVerifierError {
    #[error("txn at index {index} follows an epoch change")]
    TxnAfterEpochChange { index: usize },
    #[error("epoch changed but the proof carries no next validator set")]
    MissingNextValidatorSet,
    #[error("proof carries a next validator set but the epoch did not change")]
    UnexpectedNextValidatorSet,
    #[error("next validator set {computed:?} does not match the signed {signed:?}")]
    ValidatorSetMismatch {
        computed: ValidatorSet,
        signed: ValidatorSet,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PostProcessorError {
    #[error("indexed substate could not be decoded: {0}")]
    Deserialize(#[from] DeserializeError),
    #[error("indexed substate is not validator system metadata")]
    UnexpectedSubstate,
    #[error("next validator set has no voting power")]
    EmptyValidatorSet,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForksError {
    #[error("fork name {0} is used more than once")]
    DuplicateName(String),
    #[error("only one candidate fork is allowed, got {0:?}")]
    MultipleCandidates(Vec<String>),
    #[error("at least one fixed epoch fork is required")]
    NoFixedEpochFork,
    #[error("the first fork must start at epoch 0, not {0}")]
    GenesisNotAtEpochZero(u64),
    #[error("more than one fixed fork at epoch {0}")]
    DuplicateEpoch(u64),
    #[error(
        "candidate fork min epoch {min_epoch} must be after the last fixed fork at {last_fixed_epoch}"
    )]
    CandidateBeforeLastFixedFork { min_epoch: u64, last_fixed_epoch: u64 },
    #[error("candidate fork {0} has no thresholds")]
    NoThresholds(String),
    #[error("unknown fork {0}")]
    UnknownFork(String),
    #[error(transparent)]
    Registry(#[from] ProcedureRegistryError),
    #[error("candidate fork should have been enacted at epoch {expected}, but was at {actual}")]
    CandidateEpochMismatch { expected: u64, actual: u64 },
    #[error("stored fork {name} at epoch {epoch} is not configured")]
    UnexpectedFork { name: String, epoch: u64 },
    #[error("fork {name} at epoch {epoch} was never stored")]
    MissedFork { name: String, epoch: u64 },
    #[error("fork {name} stored at epoch {epoch}, after the current epoch {current_epoch}")]
    ForkAfterCurrentEpoch {
        name: String,
        epoch: u64,
        current_epoch: u64,
    },
}
