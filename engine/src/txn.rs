use {
    ledger_constraint_machine::{
        ConstraintMachineOutput, ParsedTxn, PermissionLevel, REEvent, REStateUpdate,
        StateUpdateOp, ValidatorSet,
    },
    ledger_sdk::{Hash, SubstateId, Txn},
};

/// A transaction that passed verification, with everything it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTxn {
    parsed: ParsedTxn,
    level: PermissionLevel,
    output: ConstraintMachineOutput,
}

impl ProcessedTxn {
    pub fn new(parsed: ParsedTxn, level: PermissionLevel, output: ConstraintMachineOutput) -> Self {
        Self {
            parsed,
            level,
            output,
        }
    }

    pub fn txn(&self) -> &Txn {
        self.parsed.txn()
    }

    pub fn id(&self) -> Hash {
        self.parsed.id()
    }

    pub fn parsed(&self) -> &ParsedTxn {
        &self.parsed
    }

    pub fn level(&self) -> PermissionLevel {
        self.level
    }

    pub fn output(&self) -> &ConstraintMachineOutput {
        &self.output
    }

    pub fn events(&self) -> &[REEvent] {
        &self.output.events
    }

    pub fn fee_collected(&self) -> u128 {
        self.output.fee_receipt.fee_collected
    }

    pub fn state_updates(&self) -> impl Iterator<Item = &REStateUpdate> {
        self.output.state_updates.iter().flatten()
    }

    /// Substates this transaction brought down, including virtual ones.
    pub fn downed_substates(&self) -> impl Iterator<Item = &SubstateId> {
        self.state_updates()
            .filter(|update| update.op == StateUpdateOp::Down)
            .map(|update| &update.substate.id)
    }

    /// The validator set and epoch of the epoch this transaction started.
    pub fn next_validator_set(&self) -> Option<(u64, &ValidatorSet)> {
        self.events().iter().find_map(|event| match event {
            REEvent::NextValidatorSet {
                epoch,
                validator_set,
            } => Some((*epoch, validator_set)),
            _ => None,
        })
    }

    pub fn is_epoch_change(&self) -> bool {
        self.next_validator_set().is_some()
    }

    pub fn is_user(&self) -> bool {
        self.level == PermissionLevel::User
    }
}
