//! Procedure registry.
//!
//! A procedure is keyed by the current reducer state and the operation
//! signature of the instruction being processed. Registration is typed: the
//! helpers below downcast the incoming reducer state and particle before the
//! application closure sees them.

use {
    crate::{
        context::{ExecutionContext, PermissionLevel},
        error::{ProcedureError, ResourceError},
        reducer::{ReducerResult, ReducerState, ReducerStateTag, ReducerStateType},
        substate::{Particle, Substate, SubstateType, SubstateTypeId, TokenResource},
    },
    ledger_sdk::{signature::ECPublicKey, REAddr},
    std::{collections::HashMap, fmt, sync::Arc},
    thiserror::Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum REOp {
    Up,
    Down,
    Read,
    ReadIndex,
    DownIndex,
    End,
    Syscall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpTarget {
    Substate(SubstateTypeId),
    Addr(REAddr),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpSignature {
    pub op: REOp,
    pub target: OpTarget,
}

impl OpSignature {
    pub fn of_substate(op: REOp, type_id: SubstateTypeId) -> Self {
        Self {
            op,
            target: OpTarget::Substate(type_id),
        }
    }

    pub fn of_method(op: REOp, addr: REAddr) -> Self {
        Self {
            op,
            target: OpTarget::Addr(addr),
        }
    }

    pub fn end() -> Self {
        Self {
            op: REOp::End,
            target: OpTarget::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcedureKey {
    pub state: ReducerStateTag,
    pub signature: OpSignature,
}

impl ProcedureKey {
    pub fn new(state: ReducerStateTag, signature: OpSignature) -> Self {
        Self { state, signature }
    }
}

/// Who must have signed the transaction for a procedure to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorizer {
    Unrestricted,
    Signer(ECPublicKey),
    /// The owner of the resource at this address.
    ResourceOwner(REAddr),
    Denied,
}

/// The value an instruction hands to its procedure.
#[derive(Debug, Clone, Copy)]
pub enum ProcedureParam<'a> {
    Particle(&'a Particle),
    Substates(&'a [Substate]),
    Bytes(&'a [u8]),
    None,
}

pub trait ResourceLoader {
    fn load_resource(&mut self, addr: &REAddr) -> Result<TokenResource, ResourceError>;
}

pub type ProcedureResult = Result<ReducerResult, ProcedureError>;

type AuthorizerFn = Arc<dyn Fn(&ProcedureParam<'_>) -> Authorizer + Send + Sync>;
type ReducerFn = Arc<
    dyn Fn(
            Option<ReducerState>,
            &ProcedureParam<'_>,
            &mut dyn ResourceLoader,
            &mut ExecutionContext,
        ) -> Result<ReducerResult, ProcedureError>
        + Send
        + Sync,
>;

fn unrestricted() -> AuthorizerFn {
    Arc::new(|_: &ProcedureParam<'_>| Authorizer::Unrestricted)
}

#[derive(Clone)]
pub struct Procedure {
    level: PermissionLevel,
    authorizer: AuthorizerFn,
    reducer: ReducerFn,
}

impl Procedure {
    pub fn level(&self) -> PermissionLevel {
        self.level
    }

    pub fn authorizer(&self, param: &ProcedureParam<'_>) -> Authorizer {
        (self.authorizer)(param)
    }

    pub fn call(
        &self,
        state: Option<ReducerState>,
        param: &ProcedureParam<'_>,
        resources: &mut dyn ResourceLoader,
        context: &mut ExecutionContext,
    ) -> Result<ReducerResult, ProcedureError> {
        (self.reducer)(state, param, resources, context)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcedureRegistryError {
    #[error("procedure {0:?} registered twice")]
    Duplicate(ProcedureKey),
}

#[derive(Debug, Clone, Default)]
pub struct Procedures {
    procedures: HashMap<ProcedureKey, Procedure>,
}

impl Procedures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ProcedureKey) -> Option<&Procedure> {
        self.procedures.get(key)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ProcedureKey> {
        self.procedures.keys()
    }

    pub fn insert(
        &mut self,
        key: ProcedureKey,
        procedure: Procedure,
    ) -> Result<(), ProcedureRegistryError> {
        if self.procedures.contains_key(&key) {
            return Err(ProcedureRegistryError::Duplicate(key));
        }
        self.procedures.insert(key, procedure);
        Ok(())
    }

    /// Union of two registries. Keys must be disjoint.
    pub fn combine(mut self, other: Procedures) -> Result<Self, ProcedureRegistryError> {
        for (key, procedure) in other.procedures {
            self.insert(key, procedure)?;
        }
        Ok(self)
    }

    pub fn up<S, T>(
        &mut self,
        level: PermissionLevel,
        authorizer: impl Fn(&T) -> Authorizer + Send + Sync + 'static,
        reducer: impl Fn(S, &T, &mut dyn ResourceLoader, &mut ExecutionContext) -> ProcedureResult
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
        T: SubstateType,
    {
        self.register_particle::<S, T>(REOp::Up, level, authorizer, reducer)
    }

    /// Handles every kind of down: durable, local and virtual.
    pub fn down<S, T>(
        &mut self,
        level: PermissionLevel,
        authorizer: impl Fn(&T) -> Authorizer + Send + Sync + 'static,
        reducer: impl Fn(S, &T, &mut dyn ResourceLoader, &mut ExecutionContext) -> ProcedureResult
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
        T: SubstateType,
    {
        self.register_particle::<S, T>(REOp::Down, level, authorizer, reducer)
    }

    pub fn read<S, T>(
        &mut self,
        level: PermissionLevel,
        authorizer: impl Fn(&T) -> Authorizer + Send + Sync + 'static,
        reducer: impl Fn(S, &T, &mut dyn ResourceLoader, &mut ExecutionContext) -> ProcedureResult
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
        T: SubstateType,
    {
        self.register_particle::<S, T>(REOp::Read, level, authorizer, reducer)
    }

    pub fn read_index<S, T>(
        &mut self,
        level: PermissionLevel,
        reducer: impl Fn(S, Vec<&T>, &mut ExecutionContext) -> Result<ReducerResult, ProcedureError>
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
        T: SubstateType,
    {
        self.register_index::<S, T>(REOp::ReadIndex, level, reducer)
    }

    pub fn down_index<S, T>(
        &mut self,
        level: PermissionLevel,
        reducer: impl Fn(S, Vec<&T>, &mut ExecutionContext) -> Result<ReducerResult, ProcedureError>
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
        T: SubstateType,
    {
        self.register_index::<S, T>(REOp::DownIndex, level, reducer)
    }

    pub fn end<S>(
        &mut self,
        level: PermissionLevel,
        reducer: impl Fn(S, &mut dyn ResourceLoader, &mut ExecutionContext) -> ProcedureResult
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
    {
        let key = ProcedureKey::new(S::TAG, OpSignature::end());
        self.insert(
            key,
            Procedure {
                level,
                authorizer: unrestricted(),
                reducer: Arc::new(
                    move |state: Option<ReducerState>,
                          param: &ProcedureParam<'_>,
                          resources: &mut dyn ResourceLoader,
                          context: &mut ExecutionContext| {
                        let ProcedureParam::None = param else {
                            return Err(ProcedureError::ParameterMismatch);
                        };
                        let state = S::from_state(state).ok_or(ProcedureError::StateMismatch)?;
                        reducer(state, resources, context)
                    },
                ),
            },
        )?;
        Ok(self)
    }

    /// Syscalls on the system address.
    pub fn syscall<S>(
        &mut self,
        level: PermissionLevel,
        reducer: impl Fn(S, &[u8], &mut ExecutionContext) -> Result<ReducerResult, ProcedureError>
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
    {
        let key = ProcedureKey::new(S::TAG, OpSignature::of_method(REOp::Syscall, REAddr::System));
        self.insert(
            key,
            Procedure {
                level,
                authorizer: unrestricted(),
                reducer: Arc::new(
                    move |state: Option<ReducerState>,
                          param: &ProcedureParam<'_>,
                          _: &mut dyn ResourceLoader,
                          context: &mut ExecutionContext| {
                        let ProcedureParam::Bytes(bytes) = param else {
                            return Err(ProcedureError::ParameterMismatch);
                        };
                        let state = S::from_state(state).ok_or(ProcedureError::StateMismatch)?;
                        reducer(state, bytes, context)
                    },
                ),
            },
        )?;
        Ok(self)
    }

    fn register_particle<S, T>(
        &mut self,
        op: REOp,
        level: PermissionLevel,
        authorizer: impl Fn(&T) -> Authorizer + Send + Sync + 'static,
        reducer: impl Fn(S, &T, &mut dyn ResourceLoader, &mut ExecutionContext) -> ProcedureResult
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
        T: SubstateType,
    {
        let key = ProcedureKey::new(S::TAG, OpSignature::of_substate(op, T::TYPE_ID));
        self.insert(
            key,
            Procedure {
                level,
                authorizer: Arc::new(move |param: &ProcedureParam<'_>| match param {
                    ProcedureParam::Particle(particle) => {
                        T::from_particle(particle).map_or(Authorizer::Denied, &authorizer)
                    }
                    _ => Authorizer::Denied,
                }),
                reducer: Arc::new(
                    move |state: Option<ReducerState>,
                          param: &ProcedureParam<'_>,
                          resources: &mut dyn ResourceLoader,
                          context: &mut ExecutionContext| {
                        let ProcedureParam::Particle(particle) = param else {
                            return Err(ProcedureError::ParameterMismatch);
                        };
                        let particle =
                            T::from_particle(particle).ok_or(ProcedureError::ParameterMismatch)?;
                        let state = S::from_state(state).ok_or(ProcedureError::StateMismatch)?;
                        reducer(state, particle, resources, context)
                    },
                ),
            },
        )?;
        Ok(self)
    }

    fn register_index<S, T>(
        &mut self,
        op: REOp,
        level: PermissionLevel,
        reducer: impl Fn(S, Vec<&T>, &mut ExecutionContext) -> Result<ReducerResult, ProcedureError>
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, ProcedureRegistryError>
    where
        S: ReducerStateType,
        T: SubstateType,
    {
        let key = ProcedureKey::new(S::TAG, OpSignature::of_substate(op, T::TYPE_ID));
        self.insert(
            key,
            Procedure {
                level,
                authorizer: unrestricted(),
                reducer: Arc::new(
                    move |state: Option<ReducerState>,
                          param: &ProcedureParam<'_>,
                          _: &mut dyn ResourceLoader,
                          context: &mut ExecutionContext| {
                        let ProcedureParam::Substates(substates) = param else {
                            return Err(ProcedureError::ParameterMismatch);
                        };
                        let particles = substates
                            .iter()
                            .map(|substate| T::from_particle(&substate.particle))
                            .collect::<Option<Vec<_>>>()
                            .ok_or(ProcedureError::ParameterMismatch)?;
                        let state = S::from_state(state).ok_or(ProcedureError::StateMismatch)?;
                        reducer(state, particles, context)
                    },
                ),
            },
        )?;
        Ok(self)
    }
}
