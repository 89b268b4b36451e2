//! The ledger engine.
//!
//! Wraps the constraint machine with stores, batch verification, proof
//! post-processing and fork management. Batches are executed either on a
//! transient branch, which never touches the store, or durably, in which
//! case they commit atomically together with their proof.

pub mod engine;
pub mod error;
pub mod forks;
pub mod post_processor;
pub mod proof;
pub mod rules;
pub mod store;
pub mod txn;
pub mod verifier;

pub use {
    engine::{Engine, EngineBranch, EngineResult},
    error::{BatchVerifierError, EngineError, ForksError, PostProcessorError},
    forks::{
        CandidateForkConfig, CandidateForkId, FixedEpochForkConfig, ForkConfig, ForkVotingResult,
        Forks, Threshold,
    },
    proof::{LedgerAndBFTProof, LedgerProof},
    rules::EngineRules,
    store::{EngineStore, ForksEpochStore, InMemoryEngineStore, StoreDelta, TransientEngineStore},
    txn::ProcessedTxn,
};
