//! Stores the engine commits to.
//!
//! [`EngineStore`] is the durable side; [`TransientEngineStore`] overlays any
//! engine store and is used both for speculative branches and for staging a
//! batch before it is committed.

mod in_memory;
mod transient;

pub use {in_memory::InMemoryEngineStore, transient::TransientEngineStore};

use {
    crate::{
        forks::{CandidateForkId, ForkVotingResult},
        proof::LedgerAndBFTProof,
    },
    ledger_constraint_machine::{substate::ValidatorSystemMetadata, REStateUpdate, SubstateStore},
    ledger_sdk::Hash,
    std::collections::BTreeMap,
};

/// Fork bookkeeping kept alongside the ledger.
pub trait ForksEpochStore {
    /// Enacted fork names keyed by the epoch they took effect in.
    fn stored_forks(&self) -> BTreeMap<u64, String>;

    /// Results for one candidate fork with `from_epoch <= epoch < to_epoch`,
    /// in epoch order.
    fn fork_voting_results(
        &self,
        from_epoch: u64,
        to_epoch: u64,
        candidate_fork_id: &CandidateForkId,
    ) -> Vec<ForkVotingResult>;

    /// System metadata of the validators of `epoch`, snapshotted when the
    /// previous epoch closed.
    fn validators_system_metadata(&self, epoch: u64) -> Vec<ValidatorSystemMetadata>;
}

/// Everything a single commit changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreDelta {
    pub state_updates: Vec<REStateUpdate>,
    /// Ids of the transactions that produced `state_updates`.
    pub txn_ids: Vec<Hash>,
    /// Forks recorded directly, keyed by epoch.
    pub forks: BTreeMap<u64, String>,
    pub proof: Option<LedgerAndBFTProof>,
}

pub trait EngineStore: SubstateStore + ForksEpochStore + Send + Sync {
    fn last_proof(&self) -> Option<LedgerAndBFTProof>;

    /// Whether a transaction with this id has been committed.
    fn contains_txn(&self, txn_id: &Hash) -> bool;

    /// Applies the delta atomically. Fork facts carried by the proof (next
    /// fork, voting results, metadata snapshot) are recorded against the
    /// epoch that follows the proof.
    fn commit(&mut self, delta: StoreDelta);

    fn store_fork(&mut self, epoch: u64, name: &str);
}
