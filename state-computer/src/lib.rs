//! Prepares and commits ledger batches on behalf of consensus, and keeps
//! the mempool in step with what is committed.

pub mod config;
pub mod error;
pub mod events;
pub mod fork_vote_status;
pub mod genesis;
pub mod state_computer;
pub mod system_txn;

pub use {
    config::{StateComputerConfig, GENESIS_FORK_NAME},
    error::{ConfigError, StateComputerError, SystemTxnError},
    events::{LedgerEvent, LedgerEventReceiver, LedgerEventSender},
    fork_vote_status::{ForkVoteStatus, ForkVoteStatusService},
    genesis::Genesis,
    state_computer::{PreparedBatch, StateComputer},
};
