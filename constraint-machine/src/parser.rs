//! Structural decoding of a transaction into instructions.

use {
    crate::{
        error::TxnParseError,
        instruction::{REInstruction, HEADER_FLAG_DISABLE_RESOURCE_ALLOC_AND_DESTROY},
        serialization::ByteReader,
    },
    ledger_sdk::{hash::Hash, signature::ECPublicKey, Txn},
    log::*,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTxn {
    txn: Txn,
    instructions: Vec<REInstruction>,
    signed_by: Option<ECPublicKey>,
    message: Option<Vec<u8>>,
    disable_resource_alloc_and_destroy: bool,
}

impl ParsedTxn {
    pub fn txn(&self) -> &Txn {
        &self.txn
    }

    pub fn id(&self) -> Hash {
        self.txn.id()
    }

    pub fn instructions(&self) -> &[REInstruction] {
        &self.instructions
    }

    pub fn signed_by(&self) -> Option<&ECPublicKey> {
        self.signed_by.as_ref()
    }

    pub fn message(&self) -> Option<&[u8]> {
        self.message.as_deref()
    }

    pub fn disable_resource_alloc_and_destroy(&self) -> bool {
        self.disable_resource_alloc_and_destroy
    }

    pub fn num_ups(&self) -> usize {
        self.instructions
            .iter()
            .filter(|instruction| matches!(instruction, REInstruction::Up { .. }))
            .count()
    }
}

/// Decodes every instruction and recovers the signer. The signature covers
/// all bytes preceding the `SIG` instruction.
pub fn parse_txn(txn: &Txn) -> Result<ParsedTxn, TxnParseError> {
    let txn_id = txn.id();
    let payload = txn.payload();
    let mut reader = ByteReader::new(payload);
    let mut instructions = Vec::new();
    let mut num_ups = 0u32;
    let mut message = None;
    let mut disable_resource_alloc_and_destroy = false;
    let mut signed_by = None;

    while reader.has_remaining() {
        if signed_by.is_some() {
            return Err(TxnParseError::InstructionAfterSignature);
        }
        let start = reader.position();
        let instruction = REInstruction::read_from(&mut reader, &txn_id, num_ups)?;
        match &instruction {
            REInstruction::Header { flags, .. } => {
                if !instructions.is_empty() {
                    return Err(TxnParseError::HeaderNotFirst);
                }
                disable_resource_alloc_and_destroy =
                    flags & HEADER_FLAG_DISABLE_RESOURCE_ALLOC_AND_DESTROY != 0;
            }
            REInstruction::Msg(bytes) => {
                if message.is_some() {
                    return Err(TxnParseError::DuplicateMessage);
                }
                message = Some(bytes.clone());
            }
            REInstruction::Up { .. } => num_ups += 1,
            REInstruction::Sig(signature) => {
                let hash = Hash::of(&payload[..start]);
                signed_by = Some(signature.recover(&hash)?);
            }
            _ => {}
        }
        instructions.push(instruction);
    }

    trace!(
        "parsed txn {} into {} instructions, signed by {:?}",
        txn_id,
        instructions.len(),
        signed_by
    );

    Ok(ParsedTxn {
        txn: txn.clone(),
        instructions,
        signed_by,
        message,
        disable_resource_alloc_and_destroy,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{builder::TxLowLevelBuilder, substate::EpochData},
        assert_matches::assert_matches,
        ledger_sdk::signature::{ECKeyPair, SignatureError},
    };

    #[test]
    fn test_parse_signed() {
        let keypair = ECKeyPair::from_seed(b"signer");
        let mut builder = TxLowLevelBuilder::new();
        builder.message(b"hello").up(&EpochData { epoch: 1 }.into()).end();
        let txn = builder.sign_and_build(&keypair);

        let parsed = parse_txn(&txn).unwrap();
        assert_eq!(parsed.signed_by(), Some(&keypair.public_key()));
        assert_eq!(parsed.message(), Some(&b"hello"[..]));
        assert_eq!(parsed.num_ups(), 1);
        assert_eq!(parsed.instructions().len(), 4);
    }

    #[test]
    fn test_header_must_be_first() {
        let mut builder = TxLowLevelBuilder::new();
        builder.end().header(0, 1);
        assert_matches!(
            parse_txn(&builder.build()),
            Err(TxnParseError::HeaderNotFirst)
        );

        let mut builder = TxLowLevelBuilder::new();
        builder.header(0, 1).end();
        assert!(parse_txn(&builder.build())
            .unwrap()
            .disable_resource_alloc_and_destroy());
    }

    #[test]
    fn test_single_message() {
        let mut builder = TxLowLevelBuilder::new();
        builder.message(b"a").message(b"b");
        assert_matches!(
            parse_txn(&builder.build()),
            Err(TxnParseError::DuplicateMessage)
        );
    }

    #[test]
    fn test_signature_must_be_last() {
        let keypair = ECKeyPair::from_seed(b"signer");
        let mut builder = TxLowLevelBuilder::new();
        builder.end();
        let mut payload = builder.sign_and_build(&keypair).payload().to_vec();
        payload.push(0x00);
        assert_matches!(
            parse_txn(&Txn::create(payload)),
            Err(TxnParseError::InstructionAfterSignature)
        );
    }

    #[test]
    fn test_truncated_signature() {
        let payload = vec![0x00, 0x0b, 0x00, 0x01];
        assert_matches!(
            parse_txn(&Txn::create(payload)),
            Err(TxnParseError::Deserialize(_))
        );
        let mut payload = vec![0x0b, 0x09];
        payload.extend_from_slice(&[0u8; 64]);
        assert_matches!(
            parse_txn(&Txn::create(payload)),
            Err(TxnParseError::InvalidSignature(
                SignatureError::InvalidRecoveryId(9)
            ))
        );
    }
}
