//! Substate model: the typed particles the application layer understands.

use {
    crate::serialization::DeserializeError,
    ledger_sdk::{signature::ECPublicKey, REAddr, SubstateId},
    serde_derive::{Deserialize, Serialize},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SubstateTypeId {
    VirtualParent = 0x00,
    RoundData = 0x02,
    EpochData = 0x03,
    TokenResource = 0x04,
    Tokens = 0x06,
    PreparedStake = 0x07,
    ValidatorStakeData = 0x0c,
    ValidatorSystemMetadata = 0x0f,
}

impl SubstateTypeId {
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SubstateTypeId {
    type Error = DeserializeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x00 => Self::VirtualParent,
            0x02 => Self::RoundData,
            0x03 => Self::EpochData,
            0x04 => Self::TokenResource,
            0x06 => Self::Tokens,
            0x07 => Self::PreparedStake,
            0x0c => Self::ValidatorStakeData,
            0x0f => Self::ValidatorSystemMetadata,
            other => return Err(DeserializeError::UnknownSubstateType(other)),
        })
    }
}

/// Marks a durable substate under which virtual children of `child_type`
/// can be brought down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualParent {
    pub child_type: SubstateTypeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    pub view: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochData {
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenResource {
    pub addr: REAddr,
    pub is_mutable: bool,
    pub owner: Option<ECPublicKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokens {
    pub resource: REAddr,
    pub holder: ECPublicKey,
    pub amount: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedStake {
    pub owner: ECPublicKey,
    pub validator: ECPublicKey,
    pub amount: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorStakeData {
    pub validator: ECPublicKey,
    pub is_registered: bool,
    pub total_stake: u128,
}

pub const SYSTEM_METADATA_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorSystemMetadata {
    pub validator: ECPublicKey,
    pub data: [u8; SYSTEM_METADATA_BYTES],
}

impl ValidatorSystemMetadata {
    /// Value of a never-written virtual metadata substate.
    pub fn empty(validator: ECPublicKey) -> Self {
        Self {
            validator,
            data: [0u8; SYSTEM_METADATA_BYTES],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Particle {
    VirtualParent(VirtualParent),
    RoundData(RoundData),
    EpochData(EpochData),
    TokenResource(TokenResource),
    Tokens(Tokens),
    PreparedStake(PreparedStake),
    ValidatorStakeData(ValidatorStakeData),
    ValidatorSystemMetadata(ValidatorSystemMetadata),
}

/// Implemented by every particle struct so procedures can be registered
/// against a concrete type.
pub trait SubstateType: Sized + 'static {
    const TYPE_ID: SubstateTypeId;

    fn from_particle(particle: &Particle) -> Option<&Self>;

    fn into_particle(self) -> Particle;
}

macro_rules! substate_types {
    ($($ty:ident),* $(,)?) => {
        impl Particle {
            pub fn type_id(&self) -> SubstateTypeId {
                match self {
                    $(Self::$ty(_) => SubstateTypeId::$ty,)*
                }
            }
        }

        $(
            impl SubstateType for $ty {
                const TYPE_ID: SubstateTypeId = SubstateTypeId::$ty;

                fn from_particle(particle: &Particle) -> Option<&Self> {
                    match particle {
                        Particle::$ty(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn into_particle(self) -> Particle {
                    Particle::$ty(self)
                }
            }

            impl From<$ty> for Particle {
                fn from(inner: $ty) -> Self {
                    Particle::$ty(inner)
                }
            }
        )*
    };
}

substate_types!(
    VirtualParent,
    RoundData,
    EpochData,
    TokenResource,
    Tokens,
    PreparedStake,
    ValidatorStakeData,
    ValidatorSystemMetadata,
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substate {
    pub id: SubstateId,
    pub particle: Particle,
}

impl Substate {
    pub fn new(id: SubstateId, particle: impl Into<Particle>) -> Self {
        Self {
            id,
            particle: particle.into(),
        }
    }
}

/// A byte-prefix over serialized substates. The first byte is always a
/// substate type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubstateIndex {
    prefix: Vec<u8>,
    type_id: SubstateTypeId,
}

impl SubstateIndex {
    pub fn of_type(type_id: SubstateTypeId) -> Self {
        Self {
            prefix: vec![type_id.byte()],
            type_id,
        }
    }

    pub fn from_prefix(prefix: &[u8]) -> Result<Self, DeserializeError> {
        let type_byte = *prefix.first().ok_or(DeserializeError::UnexpectedEnd {
            needed: 1,
            remaining: 0,
        })?;
        Ok(Self {
            prefix: prefix.to_vec(),
            type_id: SubstateTypeId::try_from(type_byte)?,
        })
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn type_id(&self) -> SubstateTypeId {
        self.type_id
    }

    pub fn matches(&self, serialized: &[u8]) -> bool {
        serialized.starts_with(&self.prefix)
    }
}
