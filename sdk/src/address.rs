//! Engine addresses.

use {
    crate::{
        hash::Hash,
        signature::{ECPublicKey, PUBLIC_KEY_BYTES},
    },
    std::fmt,
    thiserror::Error,
};

pub const HASHED_KEY_BYTES: usize = 26;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("unknown address type {0:#04x}")]
    UnknownType(u8),
    #[error("address of type {addr_type:#04x} must be {expected} bytes but was {actual}")]
    InvalidLength {
        addr_type: u8,
        expected: usize,
        actual: usize,
    },
    #[error("invalid public key in address")]
    InvalidKey,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum REAddr {
    System,
    NativeToken,
    HashedKey([u8; HASHED_KEY_BYTES]),
    PubKey(ECPublicKey),
}

impl REAddr {
    pub const SYSTEM: u8 = 0x00;
    pub const NATIVE_TOKEN: u8 = 0x01;
    pub const HASHED_KEY: u8 = 0x03;
    pub const PUB_KEY: u8 = 0x04;

    /// Resource address owned by `key` and named `name`.
    pub fn of_hashed_key(key: &ECPublicKey, name: &str) -> Self {
        let hash = Hash::hashv(&[key.as_ref(), name.as_bytes()]);
        let mut bytes = [0u8; HASHED_KEY_BYTES];
        bytes.copy_from_slice(&hash.0[32 - HASHED_KEY_BYTES..]);
        Self::HashedKey(bytes)
    }

    pub fn of_pub_key(key: ECPublicKey) -> Self {
        Self::PubKey(key)
    }

    pub fn type_byte(&self) -> u8 {
        match self {
            Self::System => Self::SYSTEM,
            Self::NativeToken => Self::NATIVE_TOKEN,
            Self::HashedKey(_) => Self::HASHED_KEY,
            Self::PubKey(_) => Self::PUB_KEY,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    pub fn is_native_token(&self) -> bool {
        matches!(self, Self::NativeToken)
    }

    /// Encoded size in bytes given the leading type byte.
    pub fn encoded_len(type_byte: u8) -> Result<usize, AddressError> {
        match type_byte {
            Self::SYSTEM | Self::NATIVE_TOKEN => Ok(1),
            Self::HASHED_KEY => Ok(1 + HASHED_KEY_BYTES),
            Self::PUB_KEY => Ok(1 + PUBLIC_KEY_BYTES),
            other => Err(AddressError::UnknownType(other)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.type_byte()];
        match self {
            Self::System | Self::NativeToken => {}
            Self::HashedKey(hash) => bytes.extend_from_slice(hash),
            Self::PubKey(key) => bytes.extend_from_slice(key.as_ref()),
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let type_byte = *bytes.first().ok_or(AddressError::Empty)?;
        let expected = Self::encoded_len(type_byte)?;
        if bytes.len() != expected {
            return Err(AddressError::InvalidLength {
                addr_type: type_byte,
                expected,
                actual: bytes.len(),
            });
        }
        match type_byte {
            Self::SYSTEM => Ok(Self::System),
            Self::NATIVE_TOKEN => Ok(Self::NativeToken),
            Self::HASHED_KEY => {
                let mut hash = [0u8; HASHED_KEY_BYTES];
                hash.copy_from_slice(&bytes[1..]);
                Ok(Self::HashedKey(hash))
            }
            _ => ECPublicKey::from_bytes(&bytes[1..])
                .map(Self::PubKey)
                .map_err(|_| AddressError::InvalidKey),
        }
    }
}

impl fmt::Debug for REAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "REAddr::System"),
            Self::NativeToken => write!(f, "REAddr::NativeToken"),
            Self::HashedKey(hash) => write!(f, "REAddr::HashedKey({})", hex::encode(hash)),
            Self::PubKey(key) => write!(f, "REAddr::PubKey({key:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*, crate::signature::ECKeyPair, assert_matches::assert_matches,
        test_case::test_case,
    };

    #[test_case(REAddr::System; "system")]
    #[test_case(REAddr::NativeToken; "native")]
    #[test_case(REAddr::of_hashed_key(&ECKeyPair::from_seed(b"a").public_key(), "gold"); "hashed")]
    #[test_case(REAddr::of_pub_key(ECKeyPair::from_seed(b"a").public_key()); "pub_key")]
    fn test_addr_bytes(addr: REAddr) {
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), REAddr::encoded_len(bytes[0]).unwrap());
        assert_eq!(REAddr::from_bytes(&bytes).unwrap(), addr);
    }

    #[test]
    fn test_addr_errors() {
        assert_matches!(REAddr::from_bytes(&[]), Err(AddressError::Empty));
        assert_matches!(REAddr::from_bytes(&[0x02]), Err(AddressError::UnknownType(2)));
        assert_matches!(
            REAddr::from_bytes(&[0x03, 1, 2]),
            Err(AddressError::InvalidLength { expected: 27, .. })
        );
        assert_matches!(
            REAddr::from_bytes(&[0x00, 0x00]),
            Err(AddressError::InvalidLength { expected: 1, .. })
        );
    }
}
