//! Branch and commit on top of the constraint machine.
//!
//! Every batch is first staged in a [`TransientEngineStore`] layered over
//! the target store. Transactions see the effects of the ones before them
//! through the overlay. Only once the whole batch, the batch verifier and
//! every post-processor have succeeded is the staged delta committed, so a
//! failed batch leaves no trace.

use {
    crate::{
        error::EngineError,
        proof::LedgerAndBFTProof,
        rules::EngineRules,
        store::{EngineStore, StoreDelta, TransientEngineStore},
        txn::ProcessedTxn,
    },
    ledger_constraint_machine::{parse_txn, ExecutionContext, PermissionLevel},
    ledger_sdk::Txn,
    log::*,
};

pub type EngineResult = Result<Vec<ProcessedTxn>, EngineError>;

fn execute_batch<S: EngineStore>(
    rules: &EngineRules,
    store: &mut S,
    txns: &[Txn],
    metadata: Option<LedgerAndBFTProof>,
    level: PermissionLevel,
) -> EngineResult {
    let mut processed = Vec::with_capacity(txns.len());
    for (index, txn) in txns.iter().enumerate() {
        // The store sees every earlier txn of the batch through the overlay.
        if store.contains_txn(&txn.id()) {
            debug!("txn {} was already committed", txn.id());
            return Err(EngineError::AlreadyCommitted {
                index,
                txn_id: txn.id(),
            });
        }
        let parsed = parse_txn(txn).map_err(|error| {
            debug!("txn {} failed to parse: {error}", txn.id());
            EngineError::Parse {
                index,
                txn_id: txn.id(),
                error,
            }
        })?;
        let level = if parsed.signed_by().is_some() {
            PermissionLevel::User
        } else {
            level
        };
        let context = ExecutionContext::new(parsed.id(), txn.len(), level)
            .with_key(parsed.signed_by().copied())
            .with_resource_alloc_and_destroy_disabled(parsed.disable_resource_alloc_and_destroy());
        let output = rules
            .machine()
            .verify(&*store, context, parsed.instructions())
            .map_err(|error| {
                debug!("txn {} rejected: {error}", txn.id());
                EngineError::Verification {
                    index,
                    txn_id: txn.id(),
                    error: Box::new(error),
                }
            })?;

        store.commit(StoreDelta {
            state_updates: output.state_updates.iter().flatten().cloned().collect(),
            txn_ids: vec![txn.id()],
            ..StoreDelta::default()
        });
        processed.push(ProcessedTxn::new(parsed, level, output));
    }

    rules
        .batch_verifier()
        .verify(&processed, metadata.as_ref().map(LedgerAndBFTProof::proof))?;

    if let Some(mut metadata) = metadata {
        for post_processor in rules.post_processors() {
            metadata = post_processor.process(metadata, &*store, &processed)?;
        }
        store.commit(StoreDelta {
            proof: Some(metadata),
            ..StoreDelta::default()
        });
    }
    Ok(processed)
}

/// The ledger state machine: an engine store plus the rules of the
/// current fork.
pub struct Engine<S> {
    store: S,
    rules: EngineRules,
}

impl<S: EngineStore> Engine<S> {
    pub fn new(store: S, rules: EngineRules) -> Self {
        Self { store, rules }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn rules(&self) -> &EngineRules {
        &self.rules
    }

    /// Swaps the rules at a fork boundary.
    pub fn replace_rules(&mut self, rules: EngineRules) {
        debug!("replacing engine rules with {rules:?}");
        self.rules = rules;
    }

    /// A speculative view of the current state. Nothing executed on it
    /// reaches the store; dropping it discards everything.
    pub fn transient_branch(&self) -> EngineBranch<'_> {
        EngineBranch {
            rules: &self.rules,
            store: TransientEngineStore::new(&self.store),
        }
    }

    /// Executes and commits a batch atomically. With `metadata`, the batch
    /// is also checked against the proof and post-processed, and the
    /// resulting proof becomes the store's last proof.
    pub fn execute(
        &mut self,
        txns: &[Txn],
        metadata: Option<LedgerAndBFTProof>,
        level: PermissionLevel,
    ) -> EngineResult {
        let (processed, delta) = {
            let mut staged = TransientEngineStore::new(&self.store);
            let processed = execute_batch(&self.rules, &mut staged, txns, metadata, level)?;
            (processed, staged.into_delta())
        };
        trace!(
            "committing {} txns with {} state updates",
            processed.len(),
            delta.state_updates.len()
        );
        self.store.commit(delta);
        Ok(processed)
    }
}

/// A transient branch of an [`Engine`].
pub struct EngineBranch<'a> {
    rules: &'a EngineRules,
    store: TransientEngineStore<'a>,
}

impl<'a> EngineBranch<'a> {
    pub fn rules(&self) -> &EngineRules {
        self.rules
    }

    pub fn store(&self) -> &TransientEngineStore<'a> {
        &self.store
    }

    /// Executes `txns` on the branch. On failure the branch is left as it
    /// was before the call.
    pub fn execute(&mut self, txns: &[Txn], level: PermissionLevel) -> EngineResult {
        let (processed, delta) = {
            let mut staged = TransientEngineStore::new(&self.store);
            let processed = execute_batch(self.rules, &mut staged, txns, None, level)?;
            (processed, staged.into_delta())
        };
        self.store.commit(delta);
        Ok(processed)
    }
}
