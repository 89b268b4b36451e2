use {crate::hash::Hash, std::fmt};

/// A raw transaction payload. The id is the double SHA-256 of the payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Txn {
    id: Hash,
    payload: Vec<u8>,
}

impl Txn {
    pub fn create(payload: Vec<u8>) -> Self {
        Self {
            id: Hash::of(&payload),
            payload,
        }
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Debug for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({} [{} bytes])", self.id, self.payload.len())
    }
}
