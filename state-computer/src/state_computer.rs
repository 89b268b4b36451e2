//! Adapter between consensus and the ledger engine.
//!
//! Proposals are prepared on transient branches of the engine and never
//! touch the store. Commits are executed durably with the proof consensus
//! signed; a commit that fails is a byzantine fault and persists nothing.
//! Locks are always taken engine first, then mempool.

use {
    crate::{
        config::StateComputerConfig,
        error::StateComputerError,
        events::{LedgerEvent, LedgerEventSender},
        fork_vote_status::{ForkVoteStatus, ForkVoteStatusService},
        genesis::Genesis,
        system_txn,
    },
    ledger_constraint_machine::{PermissionLevel, ValidatorSet},
    ledger_engine::{
        Engine, EngineError, EngineStore, Forks, LedgerAndBFTProof, LedgerProof, ProcessedTxn,
    },
    ledger_mempool::{Mempool, MempoolError},
    ledger_sdk::{ECPublicKey, Txn},
    log::*,
    std::sync::{Arc, Mutex, RwLock, RwLockReadGuard},
};

/// Result of preparing a proposal on top of a chain of uncommitted
/// ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBatch {
    /// The system transaction followed by the proposed transactions that
    /// executed.
    pub prepared: Vec<ProcessedTxn>,
    pub rejected: Vec<(Txn, EngineError)>,
    /// Set when the batch closes the epoch.
    pub next_validator_set: Option<ValidatorSet>,
}

impl PreparedBatch {
    pub fn txns(&self) -> Vec<Txn> {
        self.prepared.iter().map(|txn| txn.txn().clone()).collect()
    }

    pub fn is_epoch_change(&self) -> bool {
        self.next_validator_set.is_some()
    }
}

pub struct StateComputer<S> {
    engine: RwLock<Engine<S>>,
    mempool: Mutex<Mempool>,
    forks: Arc<Forks>,
    fork_vote_status: ForkVoteStatusService,
    events: LedgerEventSender,
}

impl<S> std::fmt::Debug for StateComputer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateComputer").finish_non_exhaustive()
    }
}

impl<S: EngineStore> StateComputer<S> {
    /// Reconciles the store's fork records with `config` and starts with
    /// the rules of the fork the ledger is currently in.
    pub fn new(
        mut store: S,
        config: &StateComputerConfig,
        events: LedgerEventSender,
    ) -> Result<Self, StateComputerError> {
        let forks = Arc::new(Forks::create(config.forks.clone())?);
        forks.init(&mut store)?;
        let current_fork = forks.current_fork(&store.stored_forks()).to_string();
        info!("starting state computer in fork {current_fork}");
        let rules = forks.engine_rules(&current_fork)?;

        Ok(Self {
            engine: RwLock::new(Engine::new(store, rules)),
            mempool: Mutex::new(Mempool::new(config.mempool.clone())),
            fork_vote_status: ForkVoteStatusService::new(forks.clone()),
            forks,
            events,
        })
    }

    pub fn forks(&self) -> &Forks {
        &self.forks
    }

    /// Read access to the engine. Must not be held across calls that take
    /// the engine lock themselves.
    pub fn engine(&self) -> RwLockReadGuard<'_, Engine<S>> {
        self.engine.read().unwrap()
    }

    /// Shuts the state computer down, handing back its store.
    pub fn into_store(self) -> S {
        self.engine.into_inner().unwrap().into_store()
    }

    pub fn last_proof(&self) -> Option<LedgerAndBFTProof> {
        self.engine.read().unwrap().store().last_proof()
    }

    pub fn mempool_size(&self) -> usize {
        self.mempool.lock().unwrap().len()
    }

    fn dispatch(&self, event: LedgerEvent) {
        if let Err(err) = self.events.send(event) {
            warn!("ledger event dropped, receiver disconnected: {err:?}");
        }
    }

    /// Commits the genesis transaction with the genesis proof.
    pub fn commit_genesis(&self, genesis: &Genesis) -> Result<(), StateComputerError> {
        let mut engine = self.engine.write().unwrap();
        if engine.store().last_proof().is_some() {
            return Err(StateComputerError::AlreadyInitialized);
        }
        let txn = genesis.txn();
        let metadata = LedgerAndBFTProof::new(
            LedgerProof::genesis(genesis.timestamp),
            &self.forks.genesis_fork().name,
        );
        engine
            .execute(std::slice::from_ref(&txn), Some(metadata), PermissionLevel::System)
            .map_err(|err| {
                error!("genesis failed to commit: {err}");
                StateComputerError::CommittedBadTxn(err)
            })?;
        info!("committed genesis {}", txn.id());

        if let Some(proof) = engine.store().last_proof() {
            self.dispatch(LedgerEvent::LedgerUpdate {
                txns: vec![txn],
                proof,
            });
        }
        Ok(())
    }

    /// Verifies `txn` against committed state and adds it to the mempool.
    pub fn add_to_mempool(&self, txn: Txn) -> Result<(), MempoolError> {
        let engine = self.engine.read().unwrap();
        let result = self.mempool.lock().unwrap().add(txn.clone(), &*engine);
        match &result {
            Ok(()) => self.dispatch(LedgerEvent::MempoolAddSuccess { txn }),
            Err(error) => {
                debug!("mempool rejected txn {}: {error}", txn.id());
                self.dispatch(LedgerEvent::MempoolAddFailure {
                    txn,
                    error: error.clone(),
                });
            }
        }
        result
    }

    /// Transactions to propose on top of `prepared`.
    pub fn get_next_txns_from_mempool(&self, prepared: &[ProcessedTxn]) -> Vec<Txn> {
        let engine = self.engine.read().unwrap();
        let limit = engine.rules().config().max_sigs_per_round;
        self.mempool.lock().unwrap().get_txns(limit, prepared)
    }

    /// Executes `txn` on a throwaway branch of committed state.
    pub fn test_txn(&self, txn: &Txn) -> Result<ProcessedTxn, EngineError> {
        let engine = self.engine.read().unwrap();
        let mut branch = engine.transient_branch();
        let mut processed = branch.execute(std::slice::from_ref(txn), PermissionLevel::User)?;
        Ok(processed.remove(0))
    }

    /// Prepares the batch for `view`: re-executes the uncommitted ancestors
    /// in `previous`, runs the system transaction and then as many of
    /// `proposed` as execute, up to the signature limit of a round.
    pub fn prepare(
        &self,
        previous: &[Txn],
        proposed: &[Txn],
        view: u64,
        timestamp: u64,
    ) -> Result<PreparedBatch, StateComputerError> {
        let engine = self.engine.read().unwrap();
        let mut branch = engine.transient_branch();
        let ancestors = branch
            .execute(previous, PermissionLevel::SuperUser)
            .map_err(|err| {
                error!("previously prepared txns failed to re-execute: {err}");
                StateComputerError::PreparedTxnReexecutionFailed(err)
            })?;
        let mut batch = PreparedBatch {
            prepared: Vec::new(),
            rejected: Vec::new(),
            next_validator_set: None,
        };
        if ancestors.iter().any(ProcessedTxn::is_epoch_change) {
            debug!("ancestors of view {view} already close the epoch");
            return Ok(batch);
        }

        let config = branch.rules().config().clone();
        let txn = system_txn::build_system_txn(branch.store(), view, timestamp, config.max_rounds)?;
        let system = branch
            .execute(&[txn], PermissionLevel::SuperUser)
            .map_err(|err| {
                warn!("system txn for view {view} failed: {err}");
                StateComputerError::SystemTxnFailed(err)
            })?;
        batch.next_validator_set = system
            .iter()
            .find_map(ProcessedTxn::next_validator_set)
            .map(|(epoch, validator_set)| {
                info!("view {view} closes the epoch, next epoch {epoch}");
                validator_set.clone()
            });
        batch.prepared.extend(system);
        if batch.is_epoch_change() {
            return Ok(batch);
        }

        let mut user_txns = 0;
        for txn in proposed {
            if user_txns >= config.max_sigs_per_round {
                break;
            }
            match branch.execute(std::slice::from_ref(txn), PermissionLevel::User) {
                Ok(processed) => {
                    user_txns += 1;
                    batch.prepared.extend(processed);
                }
                Err(error) => {
                    debug!("proposed txn {} rejected: {error}", txn.id());
                    self.dispatch(LedgerEvent::InvalidProposedTxn {
                        txn: txn.clone(),
                        error: error.clone(),
                    });
                    batch.rejected.push((txn.clone(), error));
                }
            }
        }
        Ok(batch)
    }

    /// Durably commits `txns` under `proof`. Any failure means the batch
    /// consensus agreed on cannot be trusted; nothing is persisted.
    pub fn commit(&self, txns: &[Txn], proof: LedgerProof) -> Result<(), StateComputerError> {
        let mut engine = self.engine.write().unwrap();
        let current_fork = self
            .forks
            .current_fork(&engine.store().stored_forks())
            .to_string();
        // Resolved up front so nothing after the durable commit can fail.
        let next_rules = self
            .forks
            .next_fork(&current_fork)
            .map(|name| {
                self.forks
                    .engine_rules(name)
                    .map(|rules| (name.to_string(), rules))
            })
            .transpose()?;
        let metadata = LedgerAndBFTProof::new(proof, current_fork);
        let processed = engine
            .execute(txns, Some(metadata), PermissionLevel::SuperUser)
            .map_err(|err| {
                error!("byzantine fault while committing {} txns: {err}", txns.len());
                match err {
                    EngineError::BatchVerifier(_) | EngineError::PostProcessor(_) => {
                        StateComputerError::ByzantineQuorum(err)
                    }
                    _ => StateComputerError::CommittedBadTxn(err),
                }
            })?;
        let Some(committed_proof) = engine.store().last_proof() else {
            return Ok(());
        };

        if let Some(next_fork) = committed_proof.next_fork() {
            match next_rules {
                Some((name, rules)) if name == next_fork => {
                    info!(
                        "switching from fork {} to {next_fork}",
                        committed_proof.current_fork()
                    );
                    engine.replace_rules(rules);
                }
                _ => error!(
                    "proof enacts fork {next_fork} which cannot follow {}, keeping its rules",
                    committed_proof.current_fork()
                ),
            }
        }

        let evictions = self.mempool.lock().unwrap().committed(&processed, &*engine);
        if !evictions.is_empty() {
            debug!("{} txns removed from mempool", evictions.len());
            self.dispatch(LedgerEvent::TxnsRemovedFromMempool { evictions });
        }
        drop(engine);

        if let Some((epoch, validator_set)) =
            processed.iter().find_map(ProcessedTxn::next_validator_set)
        {
            info!("epoch change to {epoch} with {} validators", validator_set.len());
            self.dispatch(LedgerEvent::EpochChange {
                epoch,
                validator_set: validator_set.clone(),
            });
        }
        self.dispatch(LedgerEvent::LedgerUpdate {
            txns: txns.to_vec(),
            proof: committed_proof,
        });
        Ok(())
    }

    pub fn candidate_fork_remaining_epochs(&self) -> Option<u64> {
        let engine = self.engine.read().unwrap();
        self.fork_vote_status
            .candidate_fork_remaining_epochs(engine.store())
    }

    pub fn fork_vote_status(
        &self,
        validator: &ECPublicKey,
    ) -> Result<ForkVoteStatus, StateComputerError> {
        let engine = self.engine.read().unwrap();
        self.fork_vote_status
            .fork_vote_status(validator, engine.store())
    }
}
