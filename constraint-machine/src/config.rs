use {
    crate::{
        application,
        machine::ConstraintMachine,
        meter::{CombinedMeter, Meter, SigsPerTxnMeter, TxnSizeFeeMeter, UpSubstateFeeMeter},
        procedure::ProcedureRegistryError,
        substate::SubstateTypeId,
    },
    serde_derive::{Deserialize, Serialize},
    std::sync::Arc,
};

pub const DEFAULT_MAX_ROUNDS: u64 = 10_000;
pub const DEFAULT_MAX_SIGS_PER_ROUND: usize = 50;
pub const DEFAULT_MAX_VALIDATORS: usize = 100;
pub const DEFAULT_MAX_TXN_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpSubstateFee {
    pub substate: SubstateTypeId,
    pub fee: u128,
}

/// Parameters of the ledger rules that are fixed for the lifetime of a fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    pub max_rounds: u64,
    pub max_sigs_per_round: usize,
    pub max_validators: usize,
    pub min_stake: u128,
    pub fee_per_byte: u128,
    pub max_txn_size: usize,
    pub max_sigs_per_txn: usize,
    pub up_substate_fees: Vec<UpSubstateFee>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_sigs_per_round: DEFAULT_MAX_SIGS_PER_ROUND,
            max_validators: DEFAULT_MAX_VALIDATORS,
            min_stake: 0,
            fee_per_byte: 0,
            max_txn_size: DEFAULT_MAX_TXN_SIZE,
            max_sigs_per_txn: 1,
            up_substate_fees: Vec::new(),
        }
    }
}

impl RulesConfig {
    pub fn meter(&self) -> CombinedMeter {
        let meters: Vec<Box<dyn Meter>> = vec![
            Box::new(TxnSizeFeeMeter::new(self.fee_per_byte, self.max_txn_size)),
            Box::new(UpSubstateFeeMeter::new(
                self.up_substate_fees
                    .iter()
                    .map(|fee| (fee.substate, fee.fee)),
            )),
            Box::new(SigsPerTxnMeter::new(self.max_sigs_per_txn)),
        ];
        CombinedMeter::new(meters)
    }

    pub fn constraint_machine(&self) -> Result<ConstraintMachine, ProcedureRegistryError> {
        Ok(ConstraintMachine::new(
            application::standard_procedures(self)?,
            Arc::new(self.meter()),
        ))
    }
}
