use {
    crate::{config::MempoolConfig, error::MempoolError},
    indexmap::IndexMap,
    ledger_constraint_machine::PermissionLevel,
    ledger_engine::{Engine, EngineError, EngineStore, ProcessedTxn},
    ledger_sdk::{Hash, SubstateId, Txn},
    log::*,
    std::collections::HashSet,
};

#[derive(Debug, Clone)]
struct MempoolEntry {
    txn: Txn,
    downs: HashSet<SubstateId>,
}

impl MempoolEntry {
    fn new(processed: &ProcessedTxn) -> Self {
        Self {
            txn: processed.txn().clone(),
            downs: processed.downed_substates().cloned().collect(),
        }
    }

    fn conflicts_with(&self, downs: &HashSet<SubstateId>) -> bool {
        !self.downs.is_disjoint(downs)
    }
}

/// A mempool transaction that no longer verifies after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolEviction {
    pub txn: Txn,
    pub error: EngineError,
}

/// Verified transactions in arrival order.
#[derive(Debug)]
pub struct Mempool {
    config: MempoolConfig,
    entries: IndexMap<Hash, MempoolEntry>,
}

fn verify<S: EngineStore>(engine: &Engine<S>, txn: &Txn) -> Result<ProcessedTxn, EngineError> {
    let mut processed = engine
        .transient_branch()
        .execute(std::slice::from_ref(txn), PermissionLevel::User)?;
    Ok(processed.remove(0))
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            entries: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, txn_id: &Hash) -> bool {
        self.entries.contains_key(txn_id)
    }

    /// Verifies `txn` against the engine's committed state and admits it.
    pub fn add<S: EngineStore>(
        &mut self,
        txn: Txn,
        engine: &Engine<S>,
    ) -> Result<(), MempoolError> {
        let txn_id = txn.id();
        if self.entries.len() >= self.config.max_size {
            return Err(MempoolError::Full {
                max_size: self.config.max_size,
            });
        }
        if self.entries.contains_key(&txn_id) {
            return Err(MempoolError::Duplicate(txn_id));
        }

        let processed = verify(engine, &txn)?;
        self.entries.insert(txn_id, MempoolEntry::new(&processed));
        trace!("added txn {txn_id} to mempool, size {}", self.entries.len());
        Ok(())
    }

    /// Drops the committed transactions and re-verifies everything else
    /// against the new committed state. Returns what was evicted.
    pub fn committed<S: EngineStore>(
        &mut self,
        committed: &[ProcessedTxn],
        engine: &Engine<S>,
    ) -> Vec<MempoolEviction> {
        for txn in committed {
            self.entries.shift_remove(&txn.id());
        }

        let mut evictions = Vec::new();
        self.entries.retain(|txn_id, entry| match verify(engine, &entry.txn) {
            Ok(processed) => {
                *entry = MempoolEntry::new(&processed);
                true
            }
            Err(error) => {
                debug!("evicting txn {txn_id} from mempool: {error}");
                evictions.push(MempoolEviction {
                    txn: entry.txn.clone(),
                    error,
                });
                false
            }
        });
        evictions
    }

    /// Up to `limit` transactions in arrival order. Transactions already in
    /// `prepared`, or consuming a substate that `prepared` or an earlier
    /// pick consumes, are left out.
    pub fn get_txns(&self, limit: usize, prepared: &[ProcessedTxn]) -> Vec<Txn> {
        let prepared_ids: HashSet<_> = prepared.iter().map(ProcessedTxn::id).collect();
        let mut downs: HashSet<SubstateId> = prepared
            .iter()
            .flat_map(|txn| txn.downed_substates().cloned())
            .collect();

        let mut txns = Vec::new();
        for (txn_id, entry) in &self.entries {
            if txns.len() >= limit {
                break;
            }
            if prepared_ids.contains(txn_id) || entry.conflicts_with(&downs) {
                continue;
            }
            downs.extend(entry.downs.iter().cloned());
            txns.push(entry.txn.clone());
        }
        txns
    }
}
