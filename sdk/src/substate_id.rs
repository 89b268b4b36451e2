//! Substate identifiers.
//!
//! A durable substate is identified by the id of the transaction that booted
//! it up and its position among that transaction's `UP` instructions. A
//! virtual substate is identified by its parent's durable id followed by a
//! derivation key.

use {
    crate::hash::{Hash, HASH_BYTES},
    std::fmt,
};

pub const DURABLE_ID_BYTES: usize = HASH_BYTES + 4;
pub const MAX_VIRTUAL_KEY_BYTES: usize = 128;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubstateId(Vec<u8>);

impl SubstateId {
    pub fn of_substate(txn_id: &Hash, index: u32) -> Self {
        let mut bytes = Vec::with_capacity(DURABLE_ID_BYTES);
        bytes.extend_from_slice(txn_id.as_ref());
        bytes.extend_from_slice(&index.to_be_bytes());
        Self(bytes)
    }

    /// Virtual child of `parent` derived from `key`. Returns `None` if
    /// `parent` is itself virtual.
    pub fn of_virtual_substate(parent: &SubstateId, key: &[u8]) -> Option<Self> {
        if parent.is_virtual() {
            return None;
        }
        let mut bytes = parent.0.clone();
        bytes.extend_from_slice(key);
        Some(Self(bytes))
    }

    /// Accepts either encoding; anything shorter than a durable id is invalid.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < DURABLE_ID_BYTES
            || bytes.len() > DURABLE_ID_BYTES + MAX_VIRTUAL_KEY_BYTES
        {
            return None;
        }
        Some(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_virtual(&self) -> bool {
        self.0.len() > DURABLE_ID_BYTES
    }

    pub fn txn_id(&self) -> Hash {
        let mut bytes = [0u8; HASH_BYTES];
        bytes.copy_from_slice(&self.0[..HASH_BYTES]);
        Hash(bytes)
    }

    pub fn index(&self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.0[HASH_BYTES..DURABLE_ID_BYTES]);
        u32::from_be_bytes(bytes)
    }

    pub fn virtual_parent(&self) -> Option<SubstateId> {
        self.is_virtual()
            .then(|| Self(self.0[..DURABLE_ID_BYTES].to_vec()))
    }

    pub fn virtual_key(&self) -> Option<&[u8]> {
        self.is_virtual().then(|| &self.0[DURABLE_ID_BYTES..])
    }
}

impl fmt::Display for SubstateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for SubstateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = self.virtual_key() {
            write!(
                f,
                "SubstateId({}:{} / {})",
                self.txn_id(),
                self.index(),
                hex::encode(key)
            )
        } else {
            write!(f, "SubstateId({}:{})", self.txn_id(), self.index())
        }
    }
}
