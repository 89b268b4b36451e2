//! Transaction-local view of substate liveness during verification.

use {
    crate::{
        codec,
        error::ResourceError,
        procedure::ResourceLoader,
        store::SubstateStore,
        substate::{Particle, Substate, SubstateIndex, TokenResource, VirtualParent},
    },
    ledger_sdk::{REAddr, SubstateId},
    std::collections::{HashMap, HashSet},
};

pub struct CMValidationState<'a> {
    store: &'a dyn SubstateStore,
    /// Substates booted by this transaction, by local index.
    local_ups: Vec<(Substate, Vec<u8>)>,
    /// Everything brought down by this transaction, local or not.
    consumed: HashSet<SubstateId>,
    resources: HashMap<REAddr, TokenResource>,
}

impl<'a> CMValidationState<'a> {
    pub fn new(store: &'a dyn SubstateStore) -> Self {
        Self {
            store,
            local_ups: Vec::new(),
            consumed: HashSet::new(),
            resources: HashMap::new(),
        }
    }

    /// A substate id is booted up at most once over the life of the ledger.
    pub fn boot_up(&mut self, substate: Substate, bytes: Vec<u8>) -> Result<(), ResourceError> {
        if self.store.contains_substate(&substate.id)
            || self.local_ups.iter().any(|(up, _)| up.id == substate.id)
        {
            return Err(ResourceError::SubstateAlreadyExists(substate.id));
        }
        if let Particle::TokenResource(resource) = &substate.particle {
            self.resources.insert(resource.addr, *resource);
        }
        self.local_ups.push((substate, bytes));
        Ok(())
    }

    pub fn local_read(&self, index: u16) -> Result<Substate, ResourceError> {
        self.local_ups
            .get(index as usize)
            .map(|(substate, _)| substate)
            .filter(|substate| !self.consumed.contains(&substate.id))
            .cloned()
            .ok_or(ResourceError::LocalSubstateNotFound(index))
    }

    pub fn local_shutdown(&mut self, index: u16) -> Result<Substate, ResourceError> {
        let substate = self.local_read(index)?;
        self.consumed.insert(substate.id.clone());
        Ok(substate)
    }

    pub fn read(&self, id: &SubstateId) -> Result<Substate, ResourceError> {
        if self.consumed.contains(id) {
            return Err(ResourceError::SubstateNotFound(id.clone()));
        }
        let bytes = self
            .store
            .load_substate(id)
            .ok_or_else(|| ResourceError::SubstateNotFound(id.clone()))?;
        Ok(Substate {
            id: id.clone(),
            particle: codec::deserialize(&bytes)?,
        })
    }

    pub fn shutdown(&mut self, id: &SubstateId) -> Result<Substate, ResourceError> {
        let substate = self.read(id)?;
        self.consumed.insert(id.clone());
        Ok(substate)
    }

    pub fn virtual_read(&self, id: &SubstateId) -> Result<Substate, ResourceError> {
        if self.consumed.contains(id) {
            return Err(ResourceError::VirtualSubstateAlreadyDown(id.clone()));
        }
        let (Some(parent_id), Some(key)) = (id.virtual_parent(), id.virtual_key()) else {
            return Err(ResourceError::SubstateNotFound(id.clone()));
        };
        let parent_bytes = self.store.verify_virtual_substate(id)?;
        if self.consumed.contains(&parent_id) {
            return Err(ResourceError::VirtualParentNotFound(id.clone()));
        }
        let parent = virtual_parent(&parent_id, &codec::deserialize(&parent_bytes)?)?;
        Ok(Substate {
            id: id.clone(),
            particle: codec::key_to_substate(parent.child_type, key)?,
        })
    }

    pub fn virtual_shutdown(&mut self, id: &SubstateId) -> Result<Substate, ResourceError> {
        let substate = self.virtual_read(id)?;
        self.consumed.insert(id.clone());
        Ok(substate)
    }

    pub fn local_virtual_read(&self, index: u16, key: &[u8]) -> Result<Substate, ResourceError> {
        let parent_substate = self.local_read(index)?;
        let parent = virtual_parent(&parent_substate.id, &parent_substate.particle)?;
        let id = SubstateId::of_virtual_substate(&parent_substate.id, key)
            .ok_or_else(|| ResourceError::NotAVirtualParent(parent_substate.id.clone()))?;
        if self.consumed.contains(&id) {
            return Err(ResourceError::VirtualSubstateAlreadyDown(id));
        }
        Ok(Substate {
            particle: codec::key_to_substate(parent.child_type, key)?,
            id,
        })
    }

    pub fn local_virtual_shutdown(
        &mut self,
        index: u16,
        key: &[u8],
    ) -> Result<Substate, ResourceError> {
        let substate = self.local_virtual_read(index, key)?;
        self.consumed.insert(substate.id.clone());
        Ok(substate)
    }

    /// Live substates matching `index`: this transaction's ups first, then the
    /// store's in prefix order.
    pub fn indexed_substates(&self, index: &SubstateIndex) -> Result<Vec<Substate>, ResourceError> {
        let local = self
            .local_ups
            .iter()
            .filter(|(substate, bytes)| {
                !self.consumed.contains(&substate.id) && index.matches(bytes)
            })
            .map(|(substate, _)| Ok(substate.clone()));
        let remote = self
            .store
            .open_indexed_cursor(index)
            .filter(|raw| !self.consumed.contains(&raw.id))
            .map(|raw| {
                let particle = codec::deserialize(&raw.data)?;
                if particle.type_id() != index.type_id() {
                    return Err(ResourceError::IndexTypeMismatch);
                }
                Ok(Substate {
                    id: raw.id,
                    particle,
                })
            });
        local.chain(remote).collect()
    }

    pub fn shutdown_all(&mut self, substates: &[Substate]) {
        self.consumed
            .extend(substates.iter().map(|substate| substate.id.clone()));
    }
}

fn virtual_parent(id: &SubstateId, particle: &Particle) -> Result<VirtualParent, ResourceError> {
    match particle {
        Particle::VirtualParent(parent) => Ok(*parent),
        _ => Err(ResourceError::NotAVirtualParent(id.clone())),
    }
}

impl ResourceLoader for CMValidationState<'_> {
    fn load_resource(&mut self, addr: &REAddr) -> Result<TokenResource, ResourceError> {
        if let Some(resource) = self.resources.get(addr) {
            return Ok(*resource);
        }
        let bytes = self
            .store
            .load_resource(addr)
            .ok_or(ResourceError::NotAResource(*addr))?;
        match codec::deserialize(&bytes)? {
            Particle::TokenResource(resource) => {
                self.resources.insert(*addr, resource);
                Ok(resource)
            }
            _ => Err(ResourceError::NotAResource(*addr)),
        }
    }
}
