use {
    crate::{error::ResourceError, substate::SubstateIndex},
    ledger_sdk::{REAddr, SubstateId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSubstate {
    pub id: SubstateId,
    pub data: Vec<u8>,
}

/// Read-only view of committed (or branch-local) state that the constraint
/// machine verifies against.
pub trait SubstateStore {
    /// Serialized substate if it is currently up.
    fn load_substate(&self, id: &SubstateId) -> Option<Vec<u8>>;

    /// Whether `id` was ever booted up, including substates that have been
    /// brought down since.
    fn contains_substate(&self, id: &SubstateId) -> bool;

    /// Serialized `TokenResource` registered at `addr`.
    fn load_resource(&self, addr: &REAddr) -> Option<Vec<u8>>;

    /// Checks that the virtual substate `id` has not been brought down and
    /// that its parent is up. Returns the parent's serialized bytes.
    fn verify_virtual_substate(&self, id: &SubstateId) -> Result<Vec<u8>, ResourceError>;

    /// Up substates whose serialization starts with the index prefix, in
    /// ascending byte order.
    fn open_indexed_cursor(
        &self,
        index: &SubstateIndex,
    ) -> Box<dyn Iterator<Item = RawSubstate> + '_>;
}
