//! Instruction wire format.
//!
//! Each instruction is a one byte opcode followed by an opcode specific
//! payload. Variable length payloads carry a big-endian u16 length.

use {
    crate::{
        error::TxnParseError,
        serialization::{write_length_prefixed, ByteReader},
        substate::SubstateIndex,
    },
    ledger_sdk::{
        hash::Hash,
        signature::{ECSignature, SIGNATURE_BYTES},
        substate_id::{DURABLE_ID_BYTES, MAX_VIRTUAL_KEY_BYTES},
        SubstateId,
    },
};

pub const MAX_MESSAGE_BYTES: usize = 255;
pub const MAX_INDEX_PREFIX_BYTES: usize = 255;
pub const MAX_SYSCALL_BYTES: usize = 257;
pub const MIN_SYSCALL_BYTES: usize = 2;
pub const HEADER_VERSION: u8 = 0;
/// Header flag that forbids minting and burning for the whole transaction.
pub const HEADER_FLAG_DISABLE_RESOURCE_ALLOC_AND_DESTROY: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum REMicroOp {
    End = 0x00,
    Syscall = 0x01,
    Up = 0x02,
    Read = 0x03,
    LocalRead = 0x04,
    VirtualRead = 0x05,
    LocalVirtualRead = 0x06,
    Down = 0x07,
    LocalDown = 0x08,
    VirtualDown = 0x09,
    LocalVirtualDown = 0x0a,
    Sig = 0x0b,
    Msg = 0x0c,
    Header = 0x0d,
    ReadIndex = 0x0e,
    DownIndex = 0x0f,
}

impl REMicroOp {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::End,
            0x01 => Self::Syscall,
            0x02 => Self::Up,
            0x03 => Self::Read,
            0x04 => Self::LocalRead,
            0x05 => Self::VirtualRead,
            0x06 => Self::LocalVirtualRead,
            0x07 => Self::Down,
            0x08 => Self::LocalDown,
            0x09 => Self::VirtualDown,
            0x0a => Self::LocalVirtualDown,
            0x0b => Self::Sig,
            0x0c => Self::Msg,
            0x0d => Self::Header,
            0x0e => Self::ReadIndex,
            0x0f => Self::DownIndex,
            _ => return None,
        })
    }

    pub fn byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum REInstruction {
    End,
    Syscall(Vec<u8>),
    /// The id is assigned during decoding from the transaction id and the
    /// number of preceding `Up`s.
    Up {
        id: SubstateId,
        bytes: Vec<u8>,
    },
    Read(SubstateId),
    LocalRead(u16),
    VirtualRead(SubstateId),
    LocalVirtualRead {
        index: u16,
        key: Vec<u8>,
    },
    Down(SubstateId),
    LocalDown(u16),
    VirtualDown(SubstateId),
    LocalVirtualDown {
        index: u16,
        key: Vec<u8>,
    },
    Sig(ECSignature),
    Msg(Vec<u8>),
    Header {
        version: u8,
        flags: u8,
    },
    ReadIndex(SubstateIndex),
    DownIndex(SubstateIndex),
}

impl REInstruction {
    pub fn micro_op(&self) -> REMicroOp {
        match self {
            Self::End => REMicroOp::End,
            Self::Syscall(_) => REMicroOp::Syscall,
            Self::Up { .. } => REMicroOp::Up,
            Self::Read(_) => REMicroOp::Read,
            Self::LocalRead(_) => REMicroOp::LocalRead,
            Self::VirtualRead(_) => REMicroOp::VirtualRead,
            Self::LocalVirtualRead { .. } => REMicroOp::LocalVirtualRead,
            Self::Down(_) => REMicroOp::Down,
            Self::LocalDown(_) => REMicroOp::LocalDown,
            Self::VirtualDown(_) => REMicroOp::VirtualDown,
            Self::LocalVirtualDown { .. } => REMicroOp::LocalVirtualDown,
            Self::Sig(_) => REMicroOp::Sig,
            Self::Msg(_) => REMicroOp::Msg,
            Self::Header { .. } => REMicroOp::Header,
            Self::ReadIndex(_) => REMicroOp::ReadIndex,
            Self::DownIndex(_) => REMicroOp::DownIndex,
        }
    }

    /// Decodes one instruction. `txn_id` and `num_ups` give `Up` its
    /// substate id and bound local indices.
    pub fn read_from(
        reader: &mut ByteReader,
        txn_id: &Hash,
        num_ups: u32,
    ) -> Result<Self, TxnParseError> {
        let opcode = reader.read_u8()?;
        let micro_op = REMicroOp::from_byte(opcode).ok_or(TxnParseError::UnknownOpcode(opcode))?;
        let instruction = match micro_op {
            REMicroOp::End => Self::End,
            REMicroOp::Syscall => Self::Syscall(
                reader
                    .read_length_prefixed(MIN_SYSCALL_BYTES, MAX_SYSCALL_BYTES)?
                    .to_vec(),
            ),
            REMicroOp::Up => {
                let bytes = reader.read_length_prefixed(1, u16::MAX as usize)?.to_vec();
                Self::Up {
                    id: SubstateId::of_substate(txn_id, num_ups),
                    bytes,
                }
            }
            REMicroOp::Read => Self::Read(read_durable_id(reader)?),
            REMicroOp::Down => Self::Down(read_durable_id(reader)?),
            REMicroOp::LocalRead => Self::LocalRead(read_local_index(reader, num_ups)?),
            REMicroOp::LocalDown => Self::LocalDown(read_local_index(reader, num_ups)?),
            REMicroOp::VirtualRead => Self::VirtualRead(read_virtual_id(reader)?),
            REMicroOp::VirtualDown => Self::VirtualDown(read_virtual_id(reader)?),
            REMicroOp::LocalVirtualRead => {
                let (index, key) = read_local_virtual(reader, num_ups)?;
                Self::LocalVirtualRead { index, key }
            }
            REMicroOp::LocalVirtualDown => {
                let (index, key) = read_local_virtual(reader, num_ups)?;
                Self::LocalVirtualDown { index, key }
            }
            REMicroOp::Sig => {
                let bytes = reader.read_bytes(SIGNATURE_BYTES)?;
                Self::Sig(ECSignature::from_bytes(bytes)?)
            }
            REMicroOp::Msg => Self::Msg(
                reader
                    .read_length_prefixed(1, MAX_MESSAGE_BYTES)?
                    .to_vec(),
            ),
            REMicroOp::Header => {
                let version = reader.read_u8()?;
                let flags = reader.read_u8()?;
                if version != HEADER_VERSION || flags > HEADER_FLAG_DISABLE_RESOURCE_ALLOC_AND_DESTROY
                {
                    return Err(TxnParseError::InvalidHeader { version, flags });
                }
                Self::Header { version, flags }
            }
            REMicroOp::ReadIndex => Self::ReadIndex(read_index(reader)?),
            REMicroOp::DownIndex => Self::DownIndex(read_index(reader)?),
        };
        Ok(instruction)
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.micro_op().byte());
        match self {
            Self::End => {}
            Self::Syscall(bytes) | Self::Up { bytes, .. } | Self::Msg(bytes) => {
                write_length_prefixed(buf, bytes)
            }
            Self::Read(id) | Self::Down(id) => buf.extend_from_slice(id.as_bytes()),
            Self::VirtualRead(id) | Self::VirtualDown(id) => {
                write_length_prefixed(buf, id.as_bytes())
            }
            Self::LocalRead(index) | Self::LocalDown(index) => {
                buf.extend_from_slice(&index.to_be_bytes())
            }
            Self::LocalVirtualRead { index, key } | Self::LocalVirtualDown { index, key } => {
                buf.extend_from_slice(&((key.len() + 2) as u16).to_be_bytes());
                buf.extend_from_slice(&index.to_be_bytes());
                buf.extend_from_slice(key);
            }
            Self::Sig(signature) => buf.extend_from_slice(&signature.to_bytes()),
            Self::Header { version, flags } => buf.extend_from_slice(&[*version, *flags]),
            Self::ReadIndex(index) | Self::DownIndex(index) => {
                write_length_prefixed(buf, index.prefix())
            }
        }
    }
}

fn read_durable_id(reader: &mut ByteReader) -> Result<SubstateId, TxnParseError> {
    let bytes = reader.read_bytes(DURABLE_ID_BYTES)?;
    SubstateId::from_bytes(bytes).ok_or(TxnParseError::InvalidSubstateId)
}

fn read_virtual_id(reader: &mut ByteReader) -> Result<SubstateId, TxnParseError> {
    let bytes = reader.read_length_prefixed(
        DURABLE_ID_BYTES + 1,
        DURABLE_ID_BYTES + MAX_VIRTUAL_KEY_BYTES,
    )?;
    SubstateId::from_bytes(bytes).ok_or(TxnParseError::InvalidSubstateId)
}

fn read_local_index(reader: &mut ByteReader, num_ups: u32) -> Result<u16, TxnParseError> {
    let index = reader.read_u16()?;
    if u32::from(index) >= num_ups {
        return Err(TxnParseError::LocalIndexOutOfRange { index, num_ups });
    }
    Ok(index)
}

fn read_local_virtual(
    reader: &mut ByteReader,
    num_ups: u32,
) -> Result<(u16, Vec<u8>), TxnParseError> {
    let bytes = reader.read_length_prefixed(3, 2 + MAX_VIRTUAL_KEY_BYTES)?;
    let mut inner = ByteReader::new(bytes);
    let index = read_local_index(&mut inner, num_ups)?;
    Ok((index, inner.read_bytes(inner.remaining())?.to_vec()))
}

fn read_index(reader: &mut ByteReader) -> Result<SubstateIndex, TxnParseError> {
    let prefix = reader.read_length_prefixed(1, MAX_INDEX_PREFIX_BYTES)?;
    Ok(SubstateIndex::from_prefix(prefix)?)
}

#[cfg(test)]
mod tests {
    use {
        super::*, crate::serialization::DeserializeError, assert_matches::assert_matches,
        test_case::test_case,
    };

    fn decode(bytes: &[u8], num_ups: u32) -> Result<REInstruction, TxnParseError> {
        let mut reader = ByteReader::new(bytes);
        let instruction = REInstruction::read_from(&mut reader, &Hash::default(), num_ups)?;
        reader.expect_end()?;
        Ok(instruction)
    }

    #[test]
    fn test_up_is_assigned_id() {
        let instruction = decode(&[0x02, 0x00, 0x02, 0x03, 0x00], 4).unwrap();
        assert_eq!(
            instruction,
            REInstruction::Up {
                id: SubstateId::of_substate(&Hash::default(), 4),
                bytes: vec![0x03, 0x00],
            }
        );
    }

    #[test_case(&[0x10]; "unknown")]
    #[test_case(&[0xff]; "high")]
    fn test_unknown_opcode(bytes: &[u8]) {
        assert_matches!(decode(bytes, 0), Err(TxnParseError::UnknownOpcode(_)));
    }

    #[test]
    fn test_local_index_bound() {
        assert_eq!(decode(&[0x08, 0x00, 0x01], 2).unwrap(), REInstruction::LocalDown(1));
        assert_matches!(
            decode(&[0x08, 0x00, 0x02], 2),
            Err(TxnParseError::LocalIndexOutOfRange {
                index: 2,
                num_ups: 2
            })
        );
    }

    #[test_case(1, 0; "bad_version")]
    #[test_case(0, 2; "bad_flags")]
    fn test_invalid_header(version: u8, flags: u8) {
        assert_matches!(
            decode(&[0x0d, version, flags], 0),
            Err(TxnParseError::InvalidHeader { .. })
        );
    }

    #[test]
    fn test_msg_bounds() {
        assert_matches!(
            decode(&[0x0c, 0x00, 0x00], 0),
            Err(TxnParseError::Deserialize(
                DeserializeError::LengthOutOfBounds { len: 0, .. }
            ))
        );
        let mut bytes = vec![0x0c, 0x01, 0x00];
        bytes.extend_from_slice(&[0u8; 256]);
        assert_matches!(
            decode(&bytes, 0),
            Err(TxnParseError::Deserialize(
                DeserializeError::LengthOutOfBounds { len: 256, .. }
            ))
        );
    }

    #[test]
    fn test_syscall_bounds() {
        assert_matches!(
            decode(&[0x01, 0x00, 0x01, 0x00], 0),
            Err(TxnParseError::Deserialize(
                DeserializeError::LengthOutOfBounds { len: 1, .. }
            ))
        );
        assert_eq!(
            decode(&[0x01, 0x00, 0x02, 0x00, 0x07], 0).unwrap(),
            REInstruction::Syscall(vec![0x00, 0x07])
        );
    }

    #[test]
    fn test_virtual_key_bound() {
        let parent = SubstateId::of_substate(&Hash::default(), 0);
        let id = SubstateId::of_virtual_substate(&parent, &[1u8; MAX_VIRTUAL_KEY_BYTES]).unwrap();
        let mut buf = vec![];
        REInstruction::VirtualDown(id.clone()).write_to(&mut buf);
        assert_eq!(decode(&buf, 0).unwrap(), REInstruction::VirtualDown(id));

        let mut buf = vec![0x09];
        let oversized = [1u8; DURABLE_ID_BYTES + MAX_VIRTUAL_KEY_BYTES + 1];
        write_length_prefixed(&mut buf, &oversized);
        assert_matches!(
            decode(&buf, 0),
            Err(TxnParseError::Deserialize(
                DeserializeError::LengthOutOfBounds { .. }
            ))
        );
    }

    #[test]
    fn test_local_virtual_down() {
        let instruction = REInstruction::LocalVirtualDown {
            index: 0,
            key: vec![9, 9],
        };
        let mut buf = vec![];
        instruction.write_to(&mut buf);
        assert_eq!(buf, [0x0a, 0x00, 0x04, 0x00, 0x00, 9, 9]);
        assert_eq!(decode(&buf, 1).unwrap(), instruction);
    }
}
