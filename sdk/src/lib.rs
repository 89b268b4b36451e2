//! Primitive types shared by every ledger core crate.
//!
//! Nothing in here knows about the Constraint Machine. These are the values
//! that travel across crate boundaries: transaction payloads and their ids,
//! secp256k1 keys and recoverable signatures, engine addresses and the
//! identifiers of substates.

pub mod address;
pub mod hash;
pub mod signature;
pub mod substate_id;
pub mod txn;

pub use {
    address::REAddr,
    hash::Hash,
    signature::{ECKeyPair, ECPublicKey, ECSignature},
    substate_id::SubstateId,
    txn::Txn,
};
