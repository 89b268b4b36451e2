//! Resource metering hooks invoked by the constraint machine.

use {
    crate::{
        context::{ExecutionContext, PermissionLevel},
        error::MeterError,
        procedure::{OpTarget, ProcedureKey, REOp},
        substate::SubstateTypeId,
    },
    std::collections::HashMap,
};

/// Hooks into verification. Only `on_start` is called for a SYSTEM
/// context.
pub trait Meter: Send + Sync {
    fn on_start(&self, _context: &mut ExecutionContext) -> Result<(), MeterError> {
        Ok(())
    }

    fn on_user_procedure(
        &self,
        _key: &ProcedureKey,
        _context: &mut ExecutionContext,
    ) -> Result<(), MeterError> {
        Ok(())
    }

    fn on_super_user_procedure(
        &self,
        _key: &ProcedureKey,
        _context: &mut ExecutionContext,
    ) -> Result<(), MeterError> {
        Ok(())
    }

    fn on_sig_instruction(&self, _context: &mut ExecutionContext) -> Result<(), MeterError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EmptyMeter;

impl Meter for EmptyMeter {}

/// Bounds the serialized transaction size and charges a per-byte fee. The
/// fee is advanced as a system loan so the transaction can pay it later
/// from its own tokens.
#[derive(Debug)]
pub struct TxnSizeFeeMeter {
    fee_per_byte: u128,
    max_txn_size: usize,
}

impl TxnSizeFeeMeter {
    pub fn new(fee_per_byte: u128, max_txn_size: usize) -> Self {
        Self {
            fee_per_byte,
            max_txn_size,
        }
    }
}

impl Meter for TxnSizeFeeMeter {
    fn on_start(&self, context: &mut ExecutionContext) -> Result<(), MeterError> {
        let size = context.txn_size();
        if size > self.max_txn_size {
            return Err(MeterError::TxnTooLarge {
                size,
                max: self.max_txn_size,
            });
        }
        if context.level() != PermissionLevel::User {
            return Ok(());
        }
        let fee = self.fee_per_byte.saturating_mul(size as u128);
        if fee > 0 {
            context.add_system_loan(fee)?;
            context.charge(fee)?;
        }
        Ok(())
    }
}

/// Charges a fixed fee for each substate of a configured type booted up by
/// a user procedure.
#[derive(Debug, Default)]
pub struct UpSubstateFeeMeter {
    fees: HashMap<SubstateTypeId, u128>,
}

impl UpSubstateFeeMeter {
    pub fn new(fees: impl IntoIterator<Item = (SubstateTypeId, u128)>) -> Self {
        Self {
            fees: fees.into_iter().collect(),
        }
    }
}

impl Meter for UpSubstateFeeMeter {
    fn on_user_procedure(
        &self,
        key: &ProcedureKey,
        context: &mut ExecutionContext,
    ) -> Result<(), MeterError> {
        if key.signature.op != REOp::Up {
            return Ok(());
        }
        let OpTarget::Substate(type_id) = key.signature.target else {
            return Ok(());
        };
        if let Some(fee) = self.fees.get(&type_id) {
            context.charge(*fee)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SigsPerTxnMeter {
    max_sigs: usize,
}

impl SigsPerTxnMeter {
    pub fn new(max_sigs: usize) -> Self {
        Self { max_sigs }
    }
}

impl Meter for SigsPerTxnMeter {
    fn on_sig_instruction(&self, context: &mut ExecutionContext) -> Result<(), MeterError> {
        if context.sig_instruction() > self.max_sigs {
            return Err(MeterError::TooManySignatures { max: self.max_sigs });
        }
        Ok(())
    }
}

/// Runs each meter in order; the first error wins.
#[derive(Default)]
pub struct CombinedMeter {
    meters: Vec<Box<dyn Meter>>,
}

impl CombinedMeter {
    pub fn new(meters: Vec<Box<dyn Meter>>) -> Self {
        Self { meters }
    }
}

impl Meter for CombinedMeter {
    fn on_start(&self, context: &mut ExecutionContext) -> Result<(), MeterError> {
        self.meters
            .iter()
            .try_for_each(|meter| meter.on_start(context))
    }

    fn on_user_procedure(
        &self,
        key: &ProcedureKey,
        context: &mut ExecutionContext,
    ) -> Result<(), MeterError> {
        self.meters
            .iter()
            .try_for_each(|meter| meter.on_user_procedure(key, context))
    }

    fn on_super_user_procedure(
        &self,
        key: &ProcedureKey,
        context: &mut ExecutionContext,
    ) -> Result<(), MeterError> {
        self.meters
            .iter()
            .try_for_each(|meter| meter.on_super_user_procedure(key, context))
    }

    fn on_sig_instruction(&self, context: &mut ExecutionContext) -> Result<(), MeterError> {
        self.meters
            .iter()
            .try_for_each(|meter| meter.on_sig_instruction(context))
    }
}
