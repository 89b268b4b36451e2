//! The constraint machine verifies a transaction instruction by instruction.
//!
//! A transaction is a flat stream of instructions (see [`instruction`])
//! grouped by `END`. Each instruction that touches state is dispatched to a
//! procedure looked up by the current reducer state and the instruction's
//! operation signature; the procedure returns the next reducer state. A
//! group is well formed when the reducer state returns to void at its `END`.
//!
//! The application (rounds, epochs, tokens, staking and fork votes) lives in
//! [`application`] as procedures registered against this machine.

pub mod application;
pub mod builder;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod instruction;
pub mod machine;
pub mod meter;
pub mod parser;
pub mod procedure;
pub mod reducer;
pub mod serialization;
pub mod state;
pub mod store;
pub mod substate;

pub use {
    builder::TxLowLevelBuilder,
    config::RulesConfig,
    context::{ExecutionContext, PermissionLevel},
    error::{ConstraintMachineError, TxnParseError, VerificationError},
    events::{REEvent, ValidatorSet},
    machine::{ConstraintMachine, ConstraintMachineOutput, REStateUpdate, StateUpdateOp},
    parser::{parse_txn, ParsedTxn},
    store::{RawSubstate, SubstateStore},
};
