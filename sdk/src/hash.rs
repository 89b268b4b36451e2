//! Double SHA-256 hashes.

use {
    serde_derive::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    std::fmt,
};

pub const HASH_BYTES: usize = 32;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; HASH_BYTES]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_BYTES]) -> Self {
        Self(bytes)
    }

    /// SHA-256 applied twice.
    pub fn of(bytes: &[u8]) -> Self {
        Self::hashv(&[bytes])
    }

    /// Double SHA-256 over the concatenation of `vals`.
    pub fn hashv(vals: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for val in vals {
            hasher.update(val);
        }
        let first = hasher.finalize();
        Self(Sha256::digest(first).into())
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; HASH_BYTES]>::try_from(bytes).ok().map(Self)
    }

    pub fn to_bytes(self) -> [u8; HASH_BYTES] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}
