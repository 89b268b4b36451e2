//! Reducer states threaded between procedures within one transaction.

use crate::{
    application::{system::*, tokens::*, validators::*},
    events::REEvent,
};

/// A Rust type that can appear as the incoming state of a procedure.
pub trait ReducerStateType: Sized + 'static {
    const TAG: ReducerStateTag;

    fn from_state(state: Option<ReducerState>) -> Option<Self>;
}

/// The absence of a reducer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoidReducerState;

impl ReducerStateType for VoidReducerState {
    const TAG: ReducerStateTag = ReducerStateTag::Void;

    fn from_state(state: Option<ReducerState>) -> Option<Self> {
        state.is_none().then_some(VoidReducerState)
    }
}

macro_rules! reducer_states {
    ($($ty:ident),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum ReducerState {
            $($ty($ty),)*
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ReducerStateTag {
            Void,
            $($ty,)*
        }

        impl ReducerState {
            pub fn tag(&self) -> ReducerStateTag {
                match self {
                    $(Self::$ty(_) => ReducerStateTag::$ty,)*
                }
            }
        }

        $(
            impl ReducerStateType for $ty {
                const TAG: ReducerStateTag = ReducerStateTag::$ty;

                fn from_state(state: Option<ReducerState>) -> Option<Self> {
                    match state {
                        Some(ReducerState::$ty(inner)) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for ReducerState {
                fn from(inner: $ty) -> Self {
                    ReducerState::$ty(inner)
                }
            }
        )*
    };
}

reducer_states!(
    RoundClosed,
    UpdatingEpoch,
    PreparingStake,
    UpdatingValidatorStake,
    PreparingNextValidatorSet,
    CreatingNextEpoch,
    StartingEpochRound,
    TokenHoldingBucket,
    StakingToValidator,
    UpdatingRegistration,
    UpdatingSystemMetadata,
);

pub fn tag_of(state: Option<&ReducerState>) -> ReducerStateTag {
    state.map_or(ReducerStateTag::Void, ReducerState::tag)
}

/// Output of a procedure: the next reducer state (`None` completes the
/// current group) and any events it emitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReducerResult {
    pub state: Option<ReducerState>,
    pub events: Vec<REEvent>,
}

impl ReducerResult {
    pub fn complete() -> Self {
        Self::default()
    }

    pub fn complete_with(event: REEvent) -> Self {
        Self {
            state: None,
            events: vec![event],
        }
    }

    pub fn incomplete(state: impl Into<ReducerState>) -> Self {
        Self {
            state: Some(state.into()),
            events: vec![],
        }
    }

    pub fn with_event(mut self, event: REEvent) -> Self {
        self.events.push(event);
        self
    }
}
