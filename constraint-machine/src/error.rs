use {
    crate::{
        context::PermissionLevel, instruction::REInstruction, procedure::ProcedureKey,
        reducer::ReducerStateTag, serialization::DeserializeError,
    },
    ledger_sdk::{signature::SignatureError, ECPublicKey, REAddr, SubstateId},
    std::fmt,
    thiserror::Error,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxnParseError {
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    #[error("invalid header version {version} flags {flags}")]
    InvalidHeader { version: u8, flags: u8 },
    #[error("header must be the first instruction")]
    HeaderNotFirst,
    #[error("only one message is allowed")]
    DuplicateMessage,
    #[error("signature must be the last instruction")]
    InstructionAfterSignature,
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("invalid substate id")]
    InvalidSubstateId,
    #[error("local index {index} out of range, {num_ups} substates booted")]
    LocalIndexOutOfRange { index: u16, num_ups: u32 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeReserveError {
    #[error("not enough fees: requested {requested}, available {available}")]
    NotEnoughFees { requested: u128, available: u128 },
    #[error("system loan of {0} was not repaid")]
    DefaultedSystemLoan(u128),
    #[error("fee reserve overflow")]
    Overflow,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeterError {
    #[error("transaction of {size} bytes exceeds the maximum of {max}")]
    TxnTooLarge { size: usize, max: usize },
    #[error("transaction carries more than {max} signatures")]
    TooManySignatures { max: usize },
    #[error(transparent)]
    FeeReserve(#[from] FeeReserveError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("requires {required:?} permission but context is {actual:?}")]
    InsufficientPermission {
        required: PermissionLevel,
        actual: PermissionLevel,
    },
    #[error("signed transactions cannot run {0:?} procedures")]
    SignedPrivilegedProcedure(PermissionLevel),
    #[error("missing signature from {0}")]
    MissingSignature(ECPublicKey),
    #[error("signed by {actual} but requires {expected}")]
    IncorrectSigner {
        expected: ECPublicKey,
        actual: ECPublicKey,
    },
    #[error("resource {0:?} has no owner")]
    NoResourceOwner(REAddr),
    #[error("procedure is not authorized")]
    Denied,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("substate {0} not found")]
    SubstateNotFound(SubstateId),
    #[error("local substate {0} not found")]
    LocalSubstateNotFound(u16),
    #[error("substate {0} was already booted up")]
    SubstateAlreadyExists(SubstateId),
    #[error("virtual substate {0} is already down")]
    VirtualSubstateAlreadyDown(SubstateId),
    #[error("virtual parent of {0} not found")]
    VirtualParentNotFound(SubstateId),
    #[error("substate {0} is not a virtual parent")]
    NotAVirtualParent(SubstateId),
    #[error("{0:?} is not a resource")]
    NotAResource(REAddr),
    #[error("substate in index has unexpected type")]
    IndexTypeMismatch,
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcedureError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    FeeReserve(#[from] FeeReserveError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("not enough tokens: requested {requested}, available {available}")]
    NotEnoughTokens { requested: u128, available: u128 },
    #[error("expected resource {expected:?} but got {actual:?}")]
    ResourceMismatch { expected: REAddr, actual: REAddr },
    #[error("{amount} of {resource:?} left unaccounted for")]
    RemainderNotZero { resource: REAddr, amount: u128 },
    #[error("resource allocation and destruction are disabled")]
    ResourceAllocationDisabled,
    #[error("resource {0:?} is not mutable")]
    ImmutableResource(REAddr),
    #[error("unknown syscall {0:#04x}")]
    UnknownSyscall(u8),
    #[error("amount overflow")]
    Overflow,
    #[error("{0}")]
    Invalid(String),
    #[error("procedure called with the wrong parameter kind")]
    ParameterMismatch,
    #[error("procedure called in the wrong reducer state")]
    StateMismatch,
}

impl ProcedureError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    #[error("no procedure for {0:?}")]
    MissingProcedure(ProcedureKey),
    #[error("expected an END instruction")]
    MissingExpectedEnd,
    #[error("reducer state {0:?} left incomplete")]
    UnterminatedState(ReducerStateTag),
    #[error("END procedure for {0:?} did not complete")]
    EndLeftState(ReducerStateTag),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Meter(#[from] MeterError),
    #[error(transparent)]
    FeeReserve(#[from] FeeReserveError),
    #[error(transparent)]
    Procedure(#[from] ProcedureError),
}

/// A failed verification with the position it failed at.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub struct ConstraintMachineError {
    pub instruction_index: usize,
    pub instructions: Vec<REInstruction>,
    pub reducer_state: ReducerStateTag,
    #[source]
    pub error: VerificationError,
}

impl ConstraintMachineError {
    pub fn error(&self) -> &VerificationError {
        &self.error
    }
}

impl fmt::Display for ConstraintMachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "instruction {} of {} in state {:?}: {}",
            self.instruction_index,
            self.instructions.len(),
            self.reducer_state,
            self.error
        )
    }
}
