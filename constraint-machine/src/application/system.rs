//! Genesis, round and epoch procedures.
//!
//! A round change brings the current `RoundData` down and boots the next
//! one up. An epoch change closes the final round of the epoch, folds every
//! `PreparedStake` into its validator's `ValidatorStakeData` (in validator
//! key order), elects the next validator set from the updated stake data
//! and starts round 0 of the new epoch.

use {
    crate::{
        application::ConstraintScrypt,
        context::{ExecutionContext, PermissionLevel},
        error::ProcedureError,
        events::{REEvent, ValidatorSet},
        procedure::{Authorizer, ProcedureRegistryError, Procedures, ResourceLoader},
        reducer::{ReducerResult, VoidReducerState},
        substate::{
            EpochData, PreparedStake, RoundData, TokenResource, ValidatorStakeData, VirtualParent,
        },
    },
    itertools::Itertools,
    ledger_sdk::signature::ECPublicKey,
    std::collections::BTreeMap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochTransition {
    pub closed_round: RoundData,
    pub prev_epoch: EpochData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundClosed {
    pub prev: RoundData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatingEpoch {
    pub transition: EpochTransition,
}

/// Pending stake not yet folded into stake data, keyed by validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparingStake {
    pub transition: EpochTransition,
    pub pending: BTreeMap<ECPublicKey, u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatingValidatorStake {
    pub transition: EpochTransition,
    pub pending: BTreeMap<ECPublicKey, u128>,
    pub expected: ValidatorStakeData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparingNextValidatorSet {
    pub transition: EpochTransition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatingNextEpoch {
    pub transition: EpochTransition,
    pub validator_set: ValidatorSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartingEpochRound {
    pub transition: EpochTransition,
}

fn unrestricted<T>(_: &T) -> Authorizer {
    Authorizer::Unrestricted
}

fn boot<T>(
    _: VoidReducerState,
    _: &T,
    _: &mut dyn ResourceLoader,
    _: &mut ExecutionContext,
) -> Result<ReducerResult, ProcedureError> {
    Ok(ReducerResult::complete())
}

fn next_stake_state(
    transition: EpochTransition,
    pending: BTreeMap<ECPublicKey, u128>,
) -> ReducerResult {
    if pending.is_empty() {
        ReducerResult::incomplete(PreparingNextValidatorSet { transition })
    } else {
        ReducerResult::incomplete(PreparingStake {
            transition,
            pending,
        })
    }
}

/// Registered validators with non-zero stake, largest stake first (ties by
/// key), capped at `max_validators`.
pub fn elect_validator_set<'a>(
    stakes: impl IntoIterator<Item = &'a ValidatorStakeData>,
    max_validators: usize,
) -> ValidatorSet {
    ValidatorSet::new(
        stakes
            .into_iter()
            .filter(|stake| stake.is_registered && stake.total_stake > 0)
            .sorted_by(|a, b| {
                b.total_stake
                    .cmp(&a.total_stake)
                    .then_with(|| a.validator.cmp(&b.validator))
            })
            .take(max_validators)
            .map(|stake| (stake.validator, stake.total_stake)),
    )
}

#[derive(Debug, Clone, Copy)]
pub struct SystemConstraintScrypt {
    max_rounds: u64,
    max_validators: usize,
}

impl SystemConstraintScrypt {
    pub fn new(max_rounds: u64, max_validators: usize) -> Self {
        Self {
            max_rounds,
            max_validators,
        }
    }

    fn genesis(procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        procedures
            .up::<VoidReducerState, RoundData>(PermissionLevel::System, unrestricted, boot)?
            .up::<VoidReducerState, EpochData>(PermissionLevel::System, unrestricted, boot)?
            .up::<VoidReducerState, VirtualParent>(PermissionLevel::System, unrestricted, boot)?
            .up::<VoidReducerState, ValidatorStakeData>(
                PermissionLevel::System,
                unrestricted,
                boot,
            )?
            .up::<VoidReducerState, TokenResource>(PermissionLevel::System, unrestricted, boot)?;
        Ok(())
    }

    fn rounds(&self, procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        let max_rounds = self.max_rounds;
        procedures
            .down::<VoidReducerState, RoundData>(
                PermissionLevel::SuperUser,
                unrestricted,
                |_, prev, _, _| Ok(ReducerResult::incomplete(RoundClosed { prev: *prev })),
            )?
            .up::<RoundClosed, RoundData>(
                PermissionLevel::SuperUser,
                unrestricted,
                move |closed, next, _, _| {
                    if next.view <= closed.prev.view {
                        return Err(ProcedureError::invalid(format!(
                            "next view {} must be greater than {}",
                            next.view, closed.prev.view
                        )));
                    }
                    if next.view > max_rounds {
                        return Err(ProcedureError::invalid(format!(
                            "view {} exceeds the maximum of {max_rounds} rounds",
                            next.view
                        )));
                    }
                    if next.timestamp < closed.prev.timestamp {
                        return Err(ProcedureError::invalid("round timestamp went backwards"));
                    }
                    Ok(ReducerResult::complete_with(REEvent::RoundUpdate {
                        view: next.view,
                        timestamp: next.timestamp,
                    }))
                },
            )?;
        Ok(())
    }

    fn epochs(&self, procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        let max_rounds = self.max_rounds;
        let max_validators = self.max_validators;
        procedures
            .down::<RoundClosed, EpochData>(
                PermissionLevel::SuperUser,
                unrestricted,
                move |closed, prev_epoch, _, _| {
                    if closed.prev.view != max_rounds {
                        return Err(ProcedureError::invalid(format!(
                            "epoch can only end after round {max_rounds}, current round is {}",
                            closed.prev.view
                        )));
                    }
                    Ok(ReducerResult::incomplete(UpdatingEpoch {
                        transition: EpochTransition {
                            closed_round: closed.prev,
                            prev_epoch: *prev_epoch,
                        },
                    }))
                },
            )?
            .down_index::<UpdatingEpoch, PreparedStake>(
                PermissionLevel::SuperUser,
                |updating, stakes, _| {
                    let mut pending = BTreeMap::new();
                    for stake in stakes {
                        let total: &mut u128 = pending.entry(stake.validator).or_default();
                        *total = total
                            .checked_add(stake.amount)
                            .ok_or(ProcedureError::Overflow)?;
                    }
                    Ok(next_stake_state(updating.transition, pending))
                },
            )?
            .down::<PreparingStake, ValidatorStakeData>(
                PermissionLevel::SuperUser,
                unrestricted,
                |mut preparing, current, _, _| {
                    let Some((validator, amount)) = preparing.pending.pop_first() else {
                        return Err(ProcedureError::StateMismatch);
                    };
                    if current.validator != validator {
                        return Err(ProcedureError::invalid(format!(
                            "expected stake data of {validator} but got {}",
                            current.validator
                        )));
                    }
                    let total_stake = current
                        .total_stake
                        .checked_add(amount)
                        .ok_or(ProcedureError::Overflow)?;
                    Ok(ReducerResult::incomplete(UpdatingValidatorStake {
                        transition: preparing.transition,
                        pending: preparing.pending,
                        expected: ValidatorStakeData {
                            total_stake,
                            ..*current
                        },
                    }))
                },
            )?
            .up::<UpdatingValidatorStake, ValidatorStakeData>(
                PermissionLevel::SuperUser,
                unrestricted,
                |updating, next, _, _| {
                    if *next != updating.expected {
                        return Err(ProcedureError::invalid(format!(
                            "stake data {next:?} does not match {:?}",
                            updating.expected
                        )));
                    }
                    Ok(next_stake_state(updating.transition, updating.pending))
                },
            )?
            .read_index::<PreparingNextValidatorSet, ValidatorStakeData>(
                PermissionLevel::SuperUser,
                move |preparing, stakes, _| {
                    let validator_set = elect_validator_set(stakes, max_validators);
                    if validator_set.is_empty() {
                        return Err(ProcedureError::invalid("next validator set is empty"));
                    }
                    Ok(ReducerResult::incomplete(CreatingNextEpoch {
                        transition: preparing.transition,
                        validator_set,
                    }))
                },
            )?
            .up::<CreatingNextEpoch, EpochData>(
                PermissionLevel::SuperUser,
                unrestricted,
                |creating, next, _, _| {
                    let expected = creating.transition.prev_epoch.epoch + 1;
                    if next.epoch != expected {
                        return Err(ProcedureError::invalid(format!(
                            "next epoch must be {expected} but was {}",
                            next.epoch
                        )));
                    }
                    Ok(ReducerResult::incomplete(StartingEpochRound {
                        transition: creating.transition,
                    })
                    .with_event(REEvent::NextValidatorSet {
                        epoch: next.epoch,
                        validator_set: creating.validator_set,
                    }))
                },
            )?
            .up::<StartingEpochRound, RoundData>(
                PermissionLevel::SuperUser,
                unrestricted,
                |starting, round, _, _| {
                    if round.view != 0 {
                        return Err(ProcedureError::invalid("epoch must start at round 0"));
                    }
                    if round.timestamp < starting.transition.closed_round.timestamp {
                        return Err(ProcedureError::invalid("round timestamp went backwards"));
                    }
                    Ok(ReducerResult::complete_with(REEvent::RoundUpdate {
                        view: round.view,
                        timestamp: round.timestamp,
                    }))
                },
            )?;
        Ok(())
    }
}

impl ConstraintScrypt for SystemConstraintScrypt {
    fn name(&self) -> &'static str {
        "system"
    }

    fn procedures(&self) -> Result<Procedures, ProcedureRegistryError> {
        let mut procedures = Procedures::new();
        Self::genesis(&mut procedures)?;
        self.rounds(&mut procedures)?;
        self.epochs(&mut procedures)?;
        Ok(procedures)
    }
}
