//! Byte-exact substate serialization.
//!
//! Every substate starts with its type byte. All types except
//! [`VirtualParent`] follow it with a reserved zero byte. Deserialization
//! rejects trailing bytes, so serialization is canonical.

use {
    crate::{
        serialization::{ByteReader, DeserializeError},
        substate::*,
    },
    ledger_sdk::signature::ECPublicKey,
};

pub fn serialize(particle: &Particle) -> Vec<u8> {
    let mut buf = vec![particle.type_id().byte()];
    if !matches!(particle, Particle::VirtualParent(_)) {
        buf.push(0);
    }
    match particle {
        Particle::VirtualParent(parent) => buf.push(parent.child_type.byte()),
        Particle::RoundData(round) => {
            buf.extend_from_slice(&round.view.to_be_bytes());
            buf.extend_from_slice(&round.timestamp.to_be_bytes());
        }
        Particle::EpochData(epoch) => buf.extend_from_slice(&epoch.epoch.to_be_bytes()),
        Particle::TokenResource(resource) => {
            buf.extend_from_slice(&resource.addr.to_bytes());
            buf.push(resource.is_mutable as u8);
            match &resource.owner {
                Some(owner) => {
                    buf.push(1);
                    buf.extend_from_slice(owner.as_ref());
                }
                None => buf.push(0),
            }
        }
        Particle::Tokens(tokens) => {
            buf.extend_from_slice(&tokens.resource.to_bytes());
            buf.extend_from_slice(tokens.holder.as_ref());
            buf.extend_from_slice(&tokens.amount.to_be_bytes());
        }
        Particle::PreparedStake(stake) => {
            buf.extend_from_slice(stake.owner.as_ref());
            buf.extend_from_slice(stake.validator.as_ref());
            buf.extend_from_slice(&stake.amount.to_be_bytes());
        }
        Particle::ValidatorStakeData(stake) => {
            buf.extend_from_slice(stake.validator.as_ref());
            buf.push(stake.is_registered as u8);
            buf.extend_from_slice(&stake.total_stake.to_be_bytes());
        }
        Particle::ValidatorSystemMetadata(metadata) => {
            buf.extend_from_slice(metadata.validator.as_ref());
            buf.extend_from_slice(&metadata.data);
        }
    }
    buf
}

pub fn deserialize(bytes: &[u8]) -> Result<Particle, DeserializeError> {
    let mut reader = ByteReader::new(bytes);
    let type_id = SubstateTypeId::try_from(reader.read_u8()?)?;
    if type_id != SubstateTypeId::VirtualParent {
        reader.read_reserved()?;
    }
    let particle = match type_id {
        SubstateTypeId::VirtualParent => VirtualParent {
            child_type: SubstateTypeId::try_from(reader.read_u8()?)?,
        }
        .into(),
        SubstateTypeId::RoundData => RoundData {
            view: reader.read_u64()?,
            timestamp: reader.read_u64()?,
        }
        .into(),
        SubstateTypeId::EpochData => EpochData {
            epoch: reader.read_u64()?,
        }
        .into(),
        SubstateTypeId::TokenResource => {
            let addr = reader.read_addr()?;
            let is_mutable = reader.read_bool()?;
            let owner = if reader.read_bool()? {
                Some(reader.read_key()?)
            } else {
                None
            };
            TokenResource {
                addr,
                is_mutable,
                owner,
            }
            .into()
        }
        SubstateTypeId::Tokens => Tokens {
            resource: reader.read_addr()?,
            holder: reader.read_key()?,
            amount: reader.read_u128()?,
        }
        .into(),
        SubstateTypeId::PreparedStake => PreparedStake {
            owner: reader.read_key()?,
            validator: reader.read_key()?,
            amount: reader.read_u128()?,
        }
        .into(),
        SubstateTypeId::ValidatorStakeData => ValidatorStakeData {
            validator: reader.read_key()?,
            is_registered: reader.read_bool()?,
            total_stake: reader.read_u128()?,
        }
        .into(),
        SubstateTypeId::ValidatorSystemMetadata => {
            let validator = reader.read_key()?;
            let mut data = [0u8; SYSTEM_METADATA_BYTES];
            data.copy_from_slice(reader.read_bytes(SYSTEM_METADATA_BYTES)?);
            ValidatorSystemMetadata { validator, data }.into()
        }
    };
    reader.expect_end()?;
    Ok(particle)
}

/// Materializes the default value of a virtual child of type `child_type`
/// from its derivation key.
pub fn key_to_substate(
    child_type: SubstateTypeId,
    key: &[u8],
) -> Result<Particle, DeserializeError> {
    match child_type {
        SubstateTypeId::ValidatorSystemMetadata => {
            let validator =
                ECPublicKey::from_bytes(key).map_err(|_| DeserializeError::InvalidVirtualKey)?;
            Ok(ValidatorSystemMetadata::empty(validator).into())
        }
        other => Err(DeserializeError::VirtualNotSupported(other.byte())),
    }
}

/// Inverse of [`key_to_substate`] for particles that can live virtually.
pub fn virtual_key(particle: &Particle) -> Option<Vec<u8>> {
    match particle {
        Particle::ValidatorSystemMetadata(metadata) => Some(metadata.validator.as_ref().to_vec()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        assert_matches::assert_matches,
        ledger_sdk::{signature::ECKeyPair, REAddr},
        test_case::test_case,
    };

    fn key(seed: &[u8]) -> ECPublicKey {
        ECKeyPair::from_seed(seed).public_key()
    }

    #[test_case(VirtualParent { child_type: SubstateTypeId::ValidatorSystemMetadata }.into(); "virtual_parent")]
    #[test_case(RoundData { view: 5, timestamp: 1_000 }.into(); "round")]
    #[test_case(TokenResource { addr: REAddr::NativeToken, is_mutable: false, owner: None }.into(); "native_resource")]
    #[test_case(TokenResource { addr: REAddr::of_hashed_key(&key(b"o"), "gold"), is_mutable: true, owner: Some(key(b"o")) }.into(); "owned_resource")]
    #[test_case(Tokens { resource: REAddr::NativeToken, holder: key(b"h"), amount: 10 }.into(); "tokens")]
    #[test_case(ValidatorStakeData { validator: key(b"v"), is_registered: true, total_stake: 0 }.into(); "stake_data")]
    fn test_serialize_canonical(particle: Particle) {
        let bytes = serialize(&particle);
        assert_eq!(bytes[0], particle.type_id().byte());
        assert_eq!(deserialize(&bytes).unwrap(), particle);
    }

    #[test]
    fn test_layout() {
        let bytes = serialize(&EpochData { epoch: 2 }.into());
        assert_eq!(bytes, [0x03, 0x00, 0, 0, 0, 0, 0, 0, 0, 2]);
        let bytes = serialize(&VirtualParent {
            child_type: SubstateTypeId::ValidatorSystemMetadata,
        }
        .into());
        assert_eq!(bytes, [0x00, 0x0f]);
    }

    #[test]
    fn test_deserialize_errors() {
        let mut bytes = serialize(&EpochData { epoch: 2 }.into());
        bytes.push(0);
        assert_matches!(deserialize(&bytes), Err(DeserializeError::TrailingBytes(1)));

        let mut bytes = serialize(&EpochData { epoch: 2 }.into());
        bytes[1] = 1;
        assert_matches!(
            deserialize(&bytes),
            Err(DeserializeError::InvalidReservedByte(1))
        );

        assert_matches!(
            deserialize(&[0x05, 0x00]),
            Err(DeserializeError::UnknownSubstateType(0x05))
        );

        let mut bytes = serialize(
            &ValidatorStakeData {
                validator: key(b"v"),
                is_registered: true,
                total_stake: 0,
            }
            .into(),
        );
        bytes[35] = 2;
        assert_matches!(deserialize(&bytes), Err(DeserializeError::InvalidBoolean(2)));
    }

    #[test]
    fn test_virtual_substates() {
        let validator = key(b"v");
        let particle =
            key_to_substate(SubstateTypeId::ValidatorSystemMetadata, validator.as_ref()).unwrap();
        assert_eq!(
            particle,
            Particle::ValidatorSystemMetadata(ValidatorSystemMetadata::empty(validator))
        );
        assert_eq!(virtual_key(&particle), Some(validator.as_ref().to_vec()));
        assert_matches!(
            key_to_substate(SubstateTypeId::ValidatorSystemMetadata, b"short"),
            Err(DeserializeError::InvalidVirtualKey)
        );
        assert_matches!(
            key_to_substate(SubstateTypeId::Tokens, validator.as_ref()),
            Err(DeserializeError::VirtualNotSupported(0x06))
        );
    }
}
