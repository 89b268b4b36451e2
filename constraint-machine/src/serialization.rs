//! Field level (de)serialization shared by the instruction decoder and the
//! substate codec. All integers are big-endian.

use {
    ledger_sdk::{
        address::AddressError,
        signature::{ECPublicKey, PUBLIC_KEY_BYTES},
        REAddr,
    },
    thiserror::Error,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeserializeError {
    #[error("unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("length {len} out of bounds [{min}, {max}]")]
    LengthOutOfBounds { len: usize, min: usize, max: usize },
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBoolean(u8),
    #[error("reserved byte must be zero but was {0:#04x}")]
    InvalidReservedByte(u8),
    #[error("invalid public key")]
    InvalidKey,
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("unknown substate type {0:#04x}")]
    UnknownSubstateType(u8),
    #[error("substate type {0:#04x} cannot be virtual")]
    VirtualNotSupported(u8),
    #[error("invalid virtual key")]
    InvalidVirtualKey,
}

pub struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DeserializeError> {
        if self.remaining() < len {
            return Err(DeserializeError::UnexpectedEnd {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DeserializeError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8, DeserializeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DeserializeError> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, DeserializeError> {
        self.read_array().map(u32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, DeserializeError> {
        self.read_array().map(u64::from_be_bytes)
    }

    pub fn read_u128(&mut self) -> Result<u128, DeserializeError> {
        self.read_array().map(u128::from_be_bytes)
    }

    pub fn read_bool(&mut self) -> Result<bool, DeserializeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DeserializeError::InvalidBoolean(other)),
        }
    }

    pub fn read_reserved(&mut self) -> Result<(), DeserializeError> {
        match self.read_u8()? {
            0 => Ok(()),
            other => Err(DeserializeError::InvalidReservedByte(other)),
        }
    }

    pub fn read_key(&mut self) -> Result<ECPublicKey, DeserializeError> {
        let bytes = self.read_bytes(PUBLIC_KEY_BYTES)?;
        ECPublicKey::from_bytes(bytes).map_err(|_| DeserializeError::InvalidKey)
    }

    pub fn read_addr(&mut self) -> Result<REAddr, DeserializeError> {
        let type_byte = *self
            .bytes
            .get(self.position)
            .ok_or(DeserializeError::UnexpectedEnd {
                needed: 1,
                remaining: 0,
            })?;
        let len = REAddr::encoded_len(type_byte)?;
        let bytes = self.read_bytes(len)?;
        Ok(REAddr::from_bytes(bytes)?)
    }

    /// A u16 length followed by that many bytes; the length must lie in
    /// `[min, max]`.
    pub fn read_length_prefixed(
        &mut self,
        min: usize,
        max: usize,
    ) -> Result<&'a [u8], DeserializeError> {
        let len = self.read_u16()? as usize;
        if len < min || len > max {
            return Err(DeserializeError::LengthOutOfBounds { len, min, max });
        }
        self.read_bytes(len)
    }

    pub fn expect_end(&self) -> Result<(), DeserializeError> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(DeserializeError::TrailingBytes(trailing)),
        }
    }
}

pub(crate) fn write_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    #[test]
    fn test_read_integers() {
        let bytes = [0x01, 0x02, 0x00, 0x00, 0x00, 0x03, 0xff];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_u32().unwrap(), 3);
        assert_eq!(reader.remaining(), 1);
        assert_matches!(
            reader.read_u16(),
            Err(DeserializeError::UnexpectedEnd {
                needed: 2,
                remaining: 1
            })
        );
        assert_matches!(reader.expect_end(), Err(DeserializeError::TrailingBytes(1)));
    }

    #[test]
    fn test_read_bool_and_reserved() {
        let mut reader = ByteReader::new(&[1, 0, 2, 5]);
        assert!(reader.read_bool().unwrap());
        assert!(!reader.read_bool().unwrap());
        assert_matches!(reader.read_bool(), Err(DeserializeError::InvalidBoolean(2)));
        assert_matches!(
            reader.read_reserved(),
            Err(DeserializeError::InvalidReservedByte(5))
        );
    }

    #[test]
    fn test_read_length_prefixed() {
        let mut buf = vec![];
        write_length_prefixed(&mut buf, b"hello");
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_length_prefixed(1, 255).unwrap(), b"hello");
        reader.expect_end().unwrap();

        let mut reader = ByteReader::new(&buf);
        assert_matches!(
            reader.read_length_prefixed(6, 255),
            Err(DeserializeError::LengthOutOfBounds {
                len: 5,
                min: 6,
                max: 255
            })
        );
    }

    #[test]
    fn test_read_addr() {
        let mut reader = ByteReader::new(&[0x01, 0x00]);
        assert_eq!(reader.read_addr().unwrap(), REAddr::NativeToken);
        assert_eq!(reader.read_addr().unwrap(), REAddr::System);
        assert_matches!(
            reader.read_addr(),
            Err(DeserializeError::UnexpectedEnd { .. })
        );
    }
}
