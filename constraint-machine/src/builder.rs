//! Instruction-level transaction builder.

use {
    crate::{
        application::tokens::{FEE_RESERVE_PUT, FEE_RESERVE_TAKE},
        codec,
        instruction::{REInstruction, REMicroOp},
        serialization::write_length_prefixed,
        substate::{Particle, SubstateIndex},
    },
    ledger_sdk::{
        hash::Hash,
        signature::{ECKeyPair, ECSignature},
        SubstateId, Txn,
    },
};

#[derive(Debug, Default, Clone)]
pub struct TxLowLevelBuilder {
    payload: Vec<u8>,
    num_ups: u16,
}

impl TxLowLevelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn instruction(&mut self, instruction: REInstruction) -> &mut Self {
        instruction.write_to(&mut self.payload);
        self
    }

    pub fn num_ups(&self) -> u16 {
        self.num_ups
    }

    /// Local index the next `up` will be assigned.
    pub fn next_up_index(&self) -> u16 {
        self.num_ups
    }

    pub fn header(&mut self, version: u8, flags: u8) -> &mut Self {
        self.instruction(REInstruction::Header { version, flags })
    }

    pub fn message(&mut self, message: &[u8]) -> &mut Self {
        self.instruction(REInstruction::Msg(message.to_vec()))
    }

    pub fn up(&mut self, particle: &Particle) -> &mut Self {
        self.num_ups += 1;
        self.payload.push(REMicroOp::Up.byte());
        write_length_prefixed(&mut self.payload, &codec::serialize(particle));
        self
    }

    pub fn read(&mut self, id: &SubstateId) -> &mut Self {
        self.instruction(REInstruction::Read(id.clone()))
    }

    pub fn local_read(&mut self, index: u16) -> &mut Self {
        self.instruction(REInstruction::LocalRead(index))
    }

    pub fn virtual_read(&mut self, id: &SubstateId) -> &mut Self {
        self.instruction(REInstruction::VirtualRead(id.clone()))
    }

    pub fn local_virtual_read(&mut self, index: u16, key: &[u8]) -> &mut Self {
        self.instruction(REInstruction::LocalVirtualRead {
            index,
            key: key.to_vec(),
        })
    }

    pub fn down(&mut self, id: &SubstateId) -> &mut Self {
        self.instruction(REInstruction::Down(id.clone()))
    }

    pub fn local_down(&mut self, index: u16) -> &mut Self {
        self.instruction(REInstruction::LocalDown(index))
    }

    pub fn virtual_down(&mut self, id: &SubstateId) -> &mut Self {
        self.instruction(REInstruction::VirtualDown(id.clone()))
    }

    pub fn local_virtual_down(&mut self, index: u16, key: &[u8]) -> &mut Self {
        self.instruction(REInstruction::LocalVirtualDown {
            index,
            key: key.to_vec(),
        })
    }

    pub fn read_index(&mut self, index: &SubstateIndex) -> &mut Self {
        self.instruction(REInstruction::ReadIndex(index.clone()))
    }

    pub fn down_index(&mut self, index: &SubstateIndex) -> &mut Self {
        self.instruction(REInstruction::DownIndex(index.clone()))
    }

    pub fn syscall(&mut self, id: u8, amount: u128) -> &mut Self {
        let mut data = vec![id];
        data.extend_from_slice(&amount.to_be_bytes());
        self.instruction(REInstruction::Syscall(data))
    }

    pub fn fee_reserve_put(&mut self, amount: u128) -> &mut Self {
        self.syscall(FEE_RESERVE_PUT, amount)
    }

    pub fn fee_reserve_take(&mut self, amount: u128) -> &mut Self {
        self.syscall(FEE_RESERVE_TAKE, amount)
    }

    pub fn end(&mut self) -> &mut Self {
        self.instruction(REInstruction::End)
    }

    /// The hash a signer must sign: every byte written so far.
    pub fn hash_to_sign(&self) -> Hash {
        Hash::of(&self.payload)
    }

    pub fn sig(&mut self, signature: &ECSignature) -> &mut Self {
        self.instruction(REInstruction::Sig(*signature))
    }

    pub fn build(&self) -> Txn {
        Txn::create(self.payload.clone())
    }

    pub fn sign_and_build(&mut self, keypair: &ECKeyPair) -> Txn {
        let signature = keypair.sign(&self.hash_to_sign());
        self.sig(&signature).build()
    }
}
