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
    std::collections::{BTreeMap, HashMap, HashSet},
};

/// Copy-on-write overlay over another engine store. Nothing reaches the
/// parent until the overlay is turned into a [`StoreDelta`] and committed.
pub struct TransientEngineStore<'a> {
    parent: &'a dyn EngineStore,
    ups: BTreeMap<SubstateId, Vec<u8>>,
    downs: HashSet<SubstateId>,
    resources: HashMap<REAddr, Vec<u8>>,
    forks: BTreeMap<u64, String>,
    updates: Vec<REStateUpdate>,
    txn_ids: Vec<Hash>,
    last_proof: Option<LedgerAndBFTProof>,
}

impl<'a> TransientEngineStore<'a> {
    pub fn new(parent: &'a dyn EngineStore) -> Self {
        Self {
            parent,
            ups: BTreeMap::new(),
            downs: HashSet::new(),
            resources: HashMap::new(),
            forks: BTreeMap::new(),
            updates: Vec::new(),
            txn_ids: Vec::new(),
            last_proof: None,
        }
    }

    /// Whether nothing has been committed to the overlay.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
            && self.txn_ids.is_empty()
            && self.forks.is_empty()
            && self.last_proof.is_none()
    }

    /// Everything committed to the overlay, in order, ready for the parent.
    pub fn into_delta(self) -> StoreDelta {
        StoreDelta {
            state_updates: self.updates,
            txn_ids: self.txn_ids,
            forks: self.forks,
            proof: self.last_proof,
        }
    }

    fn apply(&mut self, update: &REStateUpdate) {
        let id = &update.substate.id;
        match update.op {
            StateUpdateOp::Up => {
                if let Particle::TokenResource(resource) = &update.substate.particle {
                    self.resources.insert(resource.addr, update.bytes.clone());
                }
                self.ups.insert(id.clone(), update.bytes.clone());
            }
            StateUpdateOp::Down => {
                self.ups.remove(id);
                self.downs.insert(id.clone());
            }
        }
        self.updates.push(update.clone());
    }
}

impl SubstateStore for TransientEngineStore<'_> {
    fn load_substate(&self, id: &SubstateId) -> Option<Vec<u8>> {
        if self.downs.contains(id) {
            return None;
        }
        self.ups
            .get(id)
            .cloned()
            .or_else(|| self.parent.load_substate(id))
    }

    fn contains_substate(&self, id: &SubstateId) -> bool {
        self.ups.contains_key(id) || self.downs.contains(id) || self.parent.contains_substate(id)
    }

    fn load_resource(&self, addr: &REAddr) -> Option<Vec<u8>> {
        self.resources
            .get(addr)
            .cloned()
            .or_else(|| self.parent.load_resource(addr))
    }

    fn verify_virtual_substate(&self, id: &SubstateId) -> Result<Vec<u8>, ResourceError> {
        if self.downs.contains(id) {
            return Err(ResourceError::VirtualSubstateAlreadyDown(id.clone()));
        }
        let parent_id = id
            .virtual_parent()
            .ok_or_else(|| ResourceError::VirtualParentNotFound(id.clone()))?;
        if self.downs.contains(&parent_id) {
            return Err(ResourceError::VirtualParentNotFound(id.clone()));
        }
        match self.ups.get(&parent_id) {
            Some(parent) => Ok(parent.clone()),
            None => self.parent.verify_virtual_substate(id),
        }
    }

    fn open_indexed_cursor(
        &self,
        index: &SubstateIndex,
    ) -> Box<dyn Iterator<Item = RawSubstate> + '_> {
        let mut matching: Vec<_> = self
            .parent
            .open_indexed_cursor(index)
            .filter(|substate| !self.downs.contains(&substate.id))
            .chain(
                self.ups
                    .iter()
                    .filter(|(_, data)| index.matches(data))
                    .map(|(id, data)| RawSubstate {
                        id: id.clone(),
                        data: data.clone(),
                    }),
            )
            .collect();
        matching.sort_by(|a, b| a.data.cmp(&b.data));
        Box::new(matching.into_iter())
    }
}

impl ForksEpochStore for TransientEngineStore<'_> {
    fn stored_forks(&self) -> BTreeMap<u64, String> {
        let mut forks = self.parent.stored_forks();
        for (epoch, name) in &self.forks {
            forks.entry(*epoch).or_insert_with(|| name.clone());
        }
        forks
    }

    fn fork_voting_results(
        &self,
        from_epoch: u64,
        to_epoch: u64,
        candidate_fork_id: &CandidateForkId,
    ) -> Vec<ForkVotingResult> {
        self.parent
            .fork_voting_results(from_epoch, to_epoch, candidate_fork_id)
    }

    fn validators_system_metadata(&self, epoch: u64) -> Vec<ValidatorSystemMetadata> {
        self.parent.validators_system_metadata(epoch)
    }
}

impl EngineStore for TransientEngineStore<'_> {
    fn last_proof(&self) -> Option<LedgerAndBFTProof> {
        self.last_proof
            .clone()
            .or_else(|| self.parent.last_proof())
    }

    fn contains_txn(&self, txn_id: &Hash) -> bool {
        self.txn_ids.contains(txn_id) || self.parent.contains_txn(txn_id)
    }

    fn commit(&mut self, delta: StoreDelta) {
        for update in &delta.state_updates {
            self.apply(update);
        }
        self.txn_ids.extend(delta.txn_ids);
        for (epoch, name) in &delta.forks {
            self.store_fork(*epoch, name);
        }
        if let Some(proof) = delta.proof {
            self.last_proof = Some(proof);
        }
    }

    fn store_fork(&mut self, epoch: u64, name: &str) {
        self.forks.entry(epoch).or_insert_with(|| name.to_string());
    }
}
