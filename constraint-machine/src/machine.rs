//! The constraint machine: walks a transaction's instructions, threading a
//! reducer state through the registered procedures.

use {
    crate::{
        codec,
        context::{ExecutionContext, FeeReceipt, PermissionLevel},
        error::{AuthorizationError, ConstraintMachineError, VerificationError},
        events::REEvent,
        instruction::REInstruction,
        meter::Meter,
        procedure::{
            Authorizer, OpSignature, ProcedureKey, ProcedureParam, Procedures, REOp,
            ResourceLoader,
        },
        reducer::{tag_of, ReducerState},
        state::CMValidationState,
        store::SubstateStore,
        substate::Substate,
    },
    ledger_sdk::{signature::ECPublicKey, REAddr},
    log::*,
    std::{mem, sync::Arc},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdateOp {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct REStateUpdate {
    pub op: StateUpdateOp,
    pub instruction_index: usize,
    pub substate: Substate,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintMachineOutput {
    /// State updates grouped by `END`.
    pub state_updates: Vec<Vec<REStateUpdate>>,
    pub events: Vec<REEvent>,
    pub fee_receipt: FeeReceipt,
}

#[derive(Clone)]
pub struct ConstraintMachine {
    procedures: Arc<Procedures>,
    meter: Arc<dyn Meter>,
}

impl ConstraintMachine {
    pub fn new(procedures: Procedures, meter: Arc<dyn Meter>) -> Self {
        Self {
            procedures: Arc::new(procedures),
            meter,
        }
    }

    pub fn procedures(&self) -> &Procedures {
        &self.procedures
    }

    pub fn verify(
        &self,
        store: &dyn SubstateStore,
        context: ExecutionContext,
        instructions: &[REInstruction],
    ) -> Result<ConstraintMachineOutput, ConstraintMachineError> {
        let mut verifier = Verifier {
            machine: self,
            state: CMValidationState::new(store),
            context,
            reducer_state: None,
            expect_end: false,
            grouped_updates: Vec::new(),
            updates: Vec::new(),
            events: Vec::new(),
        };
        let fail = |index: usize,
                    reducer_state: Option<&ReducerState>,
                    error: VerificationError| ConstraintMachineError {
            instruction_index: index,
            instructions: instructions.to_vec(),
            reducer_state: tag_of(reducer_state),
            error,
        };

        self.meter
            .on_start(&mut verifier.context)
            .map_err(|err| fail(0, None, err.into()))?;

        for (index, instruction) in instructions.iter().enumerate() {
            verifier
                .step(index, instruction)
                .map_err(|err| fail(index, verifier.reducer_state.as_ref(), err))?;
        }

        let end = instructions.len();
        if let Some(state) = &verifier.reducer_state {
            return Err(fail(
                end,
                Some(state),
                VerificationError::UnterminatedState(state.tag()),
            ));
        }
        if !verifier.updates.is_empty() {
            verifier.grouped_updates.push(mem::take(&mut verifier.updates));
        }

        let Verifier {
            context,
            grouped_updates,
            events,
            ..
        } = verifier;
        let txn_id = *context.txn_id();
        let fee_receipt = context
            .destroy()
            .map_err(|err| fail(end, None, err.into()))?;

        trace!(
            "verified txn {} with {} groups, fee {}",
            txn_id,
            grouped_updates.len(),
            fee_receipt.fee_collected
        );

        Ok(ConstraintMachineOutput {
            state_updates: grouped_updates,
            events,
            fee_receipt,
        })
    }
}

struct Verifier<'a> {
    machine: &'a ConstraintMachine,
    state: CMValidationState<'a>,
    context: ExecutionContext,
    reducer_state: Option<ReducerState>,
    expect_end: bool,
    grouped_updates: Vec<Vec<REStateUpdate>>,
    updates: Vec<REStateUpdate>,
    events: Vec<REEvent>,
}

impl Verifier<'_> {
    fn step(&mut self, index: usize, instruction: &REInstruction) -> Result<(), VerificationError> {
        if self.expect_end && !matches!(instruction, REInstruction::End) {
            return Err(VerificationError::MissingExpectedEnd);
        }

        match instruction {
            REInstruction::Header { .. } | REInstruction::Msg(_) => {}
            REInstruction::Sig(_) => {
                if self.context.level() != PermissionLevel::System {
                    self.machine.meter.on_sig_instruction(&mut self.context)?;
                }
            }
            REInstruction::Syscall(data) => {
                let signature = OpSignature::of_method(REOp::Syscall, REAddr::System);
                self.call(signature, &ProcedureParam::Bytes(data))?;
            }
            REInstruction::Up { id, bytes } => {
                let particle = codec::deserialize(bytes)?;
                let substate = Substate {
                    id: id.clone(),
                    particle,
                };
                self.state.boot_up(substate.clone(), bytes.clone())?;
                self.update(StateUpdateOp::Up, index, substate, bytes.clone())?;
            }
            REInstruction::Down(id) => {
                let substate = self.state.shutdown(id)?;
                self.down(index, substate)?;
            }
            REInstruction::LocalDown(local) => {
                let substate = self.state.local_shutdown(*local)?;
                self.down(index, substate)?;
            }
            REInstruction::VirtualDown(id) => {
                let substate = self.state.virtual_shutdown(id)?;
                self.down(index, substate)?;
            }
            REInstruction::LocalVirtualDown { index: local, key } => {
                let substate = self.state.local_virtual_shutdown(*local, key)?;
                self.down(index, substate)?;
            }
            REInstruction::Read(id) => {
                let substate = self.state.read(id)?;
                self.read(substate)?;
            }
            REInstruction::LocalRead(local) => {
                let substate = self.state.local_read(*local)?;
                self.read(substate)?;
            }
            REInstruction::VirtualRead(id) => {
                let substate = self.state.virtual_read(id)?;
                self.read(substate)?;
            }
            REInstruction::LocalVirtualRead { index: local, key } => {
                let substate = self.state.local_virtual_read(*local, key)?;
                self.read(substate)?;
            }
            REInstruction::ReadIndex(substate_index) => {
                let substates = self.state.indexed_substates(substate_index)?;
                let signature = OpSignature::of_substate(REOp::ReadIndex, substate_index.type_id());
                self.call(signature, &ProcedureParam::Substates(&substates))?;
            }
            REInstruction::DownIndex(substate_index) => {
                let substates = self.state.indexed_substates(substate_index)?;
                self.state.shutdown_all(&substates);
                for substate in &substates {
                    self.updates.push(REStateUpdate {
                        op: StateUpdateOp::Down,
                        instruction_index: index,
                        bytes: codec::serialize(&substate.particle),
                        substate: substate.clone(),
                    });
                }
                let signature = OpSignature::of_substate(REOp::DownIndex, substate_index.type_id());
                self.call(signature, &ProcedureParam::Substates(&substates))?;
            }
            REInstruction::End => {
                self.grouped_updates.push(mem::take(&mut self.updates));
                if let Some(state) = &self.reducer_state {
                    let tag = state.tag();
                    self.call(OpSignature::end(), &ProcedureParam::None)?;
                    if self.reducer_state.is_some() {
                        return Err(VerificationError::EndLeftState(tag));
                    }
                }
                self.expect_end = false;
            }
        }
        Ok(())
    }

    fn down(&mut self, index: usize, substate: Substate) -> Result<(), VerificationError> {
        let bytes = codec::serialize(&substate.particle);
        self.update(StateUpdateOp::Down, index, substate, bytes)
    }

    fn update(
        &mut self,
        op: StateUpdateOp,
        index: usize,
        substate: Substate,
        bytes: Vec<u8>,
    ) -> Result<(), VerificationError> {
        let re_op = match op {
            StateUpdateOp::Up => REOp::Up,
            StateUpdateOp::Down => REOp::Down,
        };
        let signature = OpSignature::of_substate(re_op, substate.particle.type_id());
        self.updates.push(REStateUpdate {
            op,
            instruction_index: index,
            substate: substate.clone(),
            bytes,
        });
        self.call(signature, &ProcedureParam::Particle(&substate.particle))?;
        self.expect_end = self.reducer_state.is_none();
        Ok(())
    }

    fn read(&mut self, substate: Substate) -> Result<(), VerificationError> {
        let signature = OpSignature::of_substate(REOp::Read, substate.particle.type_id());
        self.call(signature, &ProcedureParam::Particle(&substate.particle))?;
        self.expect_end = self.reducer_state.is_none();
        Ok(())
    }

    fn call(
        &mut self,
        signature: OpSignature,
        param: &ProcedureParam<'_>,
    ) -> Result<(), VerificationError> {
        let machine = self.machine;
        let key = ProcedureKey::new(tag_of(self.reducer_state.as_ref()), signature);
        let procedure = machine
            .procedures
            .get(&key)
            .ok_or(VerificationError::MissingProcedure(key))?;

        let required = procedure.level();
        self.context.verify_permission_level(required)?;
        if self.context.level() != PermissionLevel::System {
            match required {
                PermissionLevel::User => machine.meter.on_user_procedure(&key, &mut self.context)?,
                PermissionLevel::SuperUser => {
                    machine.meter.on_super_user_procedure(&key, &mut self.context)?
                }
                PermissionLevel::System => {}
            }
            if !self.context.skip_authorization() {
                let authorizer = procedure.authorizer(param);
                verify_authorizer(authorizer, &mut self.state, &self.context)?;
            }
        }

        let result = procedure.call(
            self.reducer_state.take(),
            param,
            &mut self.state,
            &mut self.context,
        )?;
        self.reducer_state = result.state;
        self.events.extend(result.events);
        Ok(())
    }
}

fn verify_authorizer(
    authorizer: Authorizer,
    resources: &mut dyn ResourceLoader,
    context: &ExecutionContext,
) -> Result<(), VerificationError> {
    match authorizer {
        Authorizer::Unrestricted => Ok(()),
        Authorizer::Signer(expected) => verify_signer(&expected, context),
        Authorizer::ResourceOwner(addr) => {
            let resource = resources.load_resource(&addr)?;
            let owner = resource
                .owner
                .ok_or(AuthorizationError::NoResourceOwner(addr))?;
            verify_signer(&owner, context)
        }
        Authorizer::Denied => Err(AuthorizationError::Denied.into()),
    }
}

fn verify_signer(
    expected: &ECPublicKey,
    context: &ExecutionContext,
) -> Result<(), VerificationError> {
    match context.key() {
        None => Err(AuthorizationError::MissingSignature(*expected).into()),
        Some(actual) if actual != expected => Err(AuthorizationError::IncorrectSigner {
            expected: *expected,
            actual: *actual,
        }
        .into()),
        Some(_) => Ok(()),
    }
}
