use {
    crossbeam_channel::{Receiver, Sender},
    ledger_constraint_machine::ValidatorSet,
    ledger_engine::{EngineError, LedgerAndBFTProof},
    ledger_mempool::{MempoolError, MempoolEviction},
    ledger_sdk::Txn,
};

/// Everything the state computer reports to the rest of the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    MempoolAddSuccess {
        txn: Txn,
    },
    MempoolAddFailure {
        txn: Txn,
        error: MempoolError,
    },
    /// A proposed txn that failed while a proposal was prepared.
    InvalidProposedTxn {
        txn: Txn,
        error: EngineError,
    },
    TxnsRemovedFromMempool {
        evictions: Vec<MempoolEviction>,
    },
    EpochChange {
        epoch: u64,
        validator_set: ValidatorSet,
    },
    LedgerUpdate {
        txns: Vec<Txn>,
        proof: LedgerAndBFTProof,
    },
}

pub type LedgerEventSender = Sender<LedgerEvent>;
pub type LedgerEventReceiver = Receiver<LedgerEvent>;
