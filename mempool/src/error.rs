use {ledger_engine::EngineError, ledger_sdk::Hash, thiserror::Error};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("txn {0} is already in the mempool")]
    Duplicate(Hash),
    #[error("mempool is full ({max_size} txns)")]
    Full { max_size: usize },
    #[error("txn rejected: {0}")]
    Rejected(#[from] EngineError),
}
