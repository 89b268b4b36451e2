use {
    ledger_constraint_machine::{serialization::DeserializeError, substate::SubstateTypeId},
    ledger_engine::{EngineError, ForksError},
    ledger_sdk::ECPublicKey,
    std::{io, path::PathBuf},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Forks(#[from] ForksError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SystemTxnError {
    #[error("no {0:?} substate is up")]
    MissingSubstate(SubstateTypeId),
    #[error("index of {0:?} returned a substate of another type")]
    UnexpectedSubstate(SubstateTypeId),
    #[error("no stake data for validator {0}")]
    MissingStakeData(ECPublicKey),
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    #[error("amount overflow")]
    Overflow,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateComputerError {
    /// A committed batch contains a transaction that does not verify.
    #[error("committed batch contains a bad txn: {0}")]
    CommittedBadTxn(#[source] EngineError),
    /// The signed proof disagrees with what the ledger computed.
    #[error("byzantine quorum: {0}")]
    ByzantineQuorum(#[source] EngineError),
    #[error("previously prepared txns failed to re-execute: {0}")]
    PreparedTxnReexecutionFailed(#[source] EngineError),
    #[error("system txn failed: {0}")]
    SystemTxnFailed(#[source] EngineError),
    #[error(transparent)]
    SystemTxn(#[from] SystemTxnError),
    #[error(transparent)]
    Forks(#[from] ForksError),
    #[error("ledger already has a genesis")]
    AlreadyInitialized,
}

impl StateComputerError {
    /// Whether the error means the ledger or its quorum can no longer be
    /// trusted.
    pub fn is_byzantine(&self) -> bool {
        matches!(
            self,
            Self::CommittedBadTxn(_)
                | Self::ByzantineQuorum(_)
                | Self::PreparedTxnReexecutionFailed(_)
        )
    }
}
