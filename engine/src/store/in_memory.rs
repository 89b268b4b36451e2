use {
    super::{EngineStore, ForksEpochStore, StoreDelta},
    crate::{
        forks::{CandidateForkId, ForkVotingResult},
        proof::LedgerAndBFTProof,
    },
    ledger_constraint_machine::{
        error::ResourceError,
        substate::{Particle, SubstateIndex, ValidatorSystemMetadata},
        RawSubstate, REStateUpdate, StateUpdateOp, SubstateStore,
    },
    ledger_sdk::{Hash, REAddr, SubstateId},
    log::*,
    std::collections::{BTreeMap, HashMap, HashSet},
};

/// Ordered in-memory ledger state.
#[derive(Debug, Default)]
pub struct InMemoryEngineStore {
    substates: BTreeMap<SubstateId, Vec<u8>>,
    spent: HashSet<SubstateId>,
    virtual_downs: HashSet<SubstateId>,
    txns: HashSet<Hash>,
    resources: HashMap<REAddr, Vec<u8>>,
    forks: BTreeMap<u64, String>,
    fork_voting_results: BTreeMap<u64, Vec<ForkVotingResult>>,
    system_metadata: BTreeMap<u64, Vec<ValidatorSystemMetadata>>,
    last_proof: Option<LedgerAndBFTProof>,
}

impl InMemoryEngineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_substates(&self) -> usize {
        self.substates.len()
    }

    fn apply(&mut self, update: &REStateUpdate) {
        let id = &update.substate.id;
        match update.op {
            StateUpdateOp::Up if self.contains_substate(id) => {
                warn!("substate {id} was already booted up, ignoring");
            }
            StateUpdateOp::Up => {
                if let Particle::TokenResource(resource) = &update.substate.particle {
                    self.resources.insert(resource.addr, update.bytes.clone());
                }
                self.substates.insert(id.clone(), update.bytes.clone());
            }
            StateUpdateOp::Down if id.is_virtual() => {
                self.virtual_downs.insert(id.clone());
            }
            StateUpdateOp::Down => {
                self.substates.remove(id);
                self.spent.insert(id.clone());
            }
        }
    }

    fn record_proof(&mut self, proof: LedgerAndBFTProof) {
        let next_epoch = proof.proof().epoch + 1;
        if let Some(name) = proof.next_fork() {
            self.store_fork(next_epoch, name);
        }
        if let Some(results) = proof.fork_voting_results() {
            for result in results {
                self.fork_voting_results
                    .entry(result.epoch)
                    .or_default()
                    .push(*result);
            }
        }
        if let Some(metadata) = proof.validators_system_metadata() {
            self.system_metadata.insert(next_epoch, metadata.to_vec());
        }
        self.last_proof = Some(proof);
    }
}

impl SubstateStore for InMemoryEngineStore {
    fn load_substate(&self, id: &SubstateId) -> Option<Vec<u8>> {
        self.substates.get(id).cloned()
    }

    fn contains_substate(&self, id: &SubstateId) -> bool {
        self.substates.contains_key(id) || self.spent.contains(id)
    }

    fn load_resource(&self, addr: &REAddr) -> Option<Vec<u8>> {
        self.resources.get(addr).cloned()
    }

    fn verify_virtual_substate(&self, id: &SubstateId) -> Result<Vec<u8>, ResourceError> {
        if self.virtual_downs.contains(id) {
            return Err(ResourceError::VirtualSubstateAlreadyDown(id.clone()));
        }
        id.virtual_parent()
            .and_then(|parent| self.substates.get(&parent).cloned())
            .ok_or_else(|| ResourceError::VirtualParentNotFound(id.clone()))
    }

    fn open_indexed_cursor(
        &self,
        index: &SubstateIndex,
    ) -> Box<dyn Iterator<Item = RawSubstate> + '_> {
        let mut matching: Vec<_> = self
            .substates
            .iter()
            .filter(|(_, data)| index.matches(data))
            .map(|(id, data)| RawSubstate {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();
        matching.sort_by(|a, b| a.data.cmp(&b.data));
        Box::new(matching.into_iter())
    }
}

impl ForksEpochStore for InMemoryEngineStore {
    fn stored_forks(&self) -> BTreeMap<u64, String> {
        self.forks.clone()
    }

    fn fork_voting_results(
        &self,
        from_epoch: u64,
        to_epoch: u64,
        candidate_fork_id: &CandidateForkId,
    ) -> Vec<ForkVotingResult> {
        if from_epoch >= to_epoch {
            return Vec::new();
        }
        self.fork_voting_results
            .range(from_epoch..to_epoch)
            .flat_map(|(_, results)| results)
            .filter(|result| result.candidate_fork_id == *candidate_fork_id)
            .copied()
            .collect()
    }

    fn validators_system_metadata(&self, epoch: u64) -> Vec<ValidatorSystemMetadata> {
        self.system_metadata
            .get(&epoch)
            .cloned()
            .unwrap_or_default()
    }
}

impl EngineStore for InMemoryEngineStore {
    fn last_proof(&self) -> Option<LedgerAndBFTProof> {
        self.last_proof.clone()
    }

    fn contains_txn(&self, txn_id: &Hash) -> bool {
        self.txns.contains(txn_id)
    }

    fn commit(&mut self, delta: StoreDelta) {
        for update in &delta.state_updates {
            self.apply(update);
        }
        self.txns.extend(delta.txn_ids);
        for (epoch, name) in &delta.forks {
            self.store_fork(*epoch, name);
        }
        if let Some(proof) = delta.proof {
            self.record_proof(proof);
        }
    }

    fn store_fork(&mut self, epoch: u64, name: &str) {
        if let Some(existing) = self.forks.get(&epoch) {
            warn!("fork {existing} already stored at epoch {epoch}, ignoring {name}");
            return;
        }
        self.forks.insert(epoch, name.to_string());
    }
}
