//! Validator registration, staking and system metadata (fork vote)
//! procedures.

use {
    crate::{
        application::{tokens::TokenHoldingBucket, ConstraintScrypt},
        context::PermissionLevel,
        error::ProcedureError,
        events::REEvent,
        procedure::{Authorizer, ProcedureRegistryError, Procedures},
        reducer::{ReducerResult, VoidReducerState},
        substate::{PreparedStake, ValidatorStakeData, ValidatorSystemMetadata},
    },
    ledger_sdk::{signature::ECPublicKey, REAddr},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingToValidator {
    pub bucket: TokenHoldingBucket,
    pub validator: ECPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatingRegistration {
    pub prev: ValidatorStakeData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatingSystemMetadata {
    pub validator: ECPublicKey,
}

#[derive(Debug, Clone, Copy)]
pub struct ValidatorConstraintScrypt {
    min_stake: u128,
}

impl ValidatorConstraintScrypt {
    pub fn new(min_stake: u128) -> Self {
        Self { min_stake }
    }

    fn registration(procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        procedures
            .down::<VoidReducerState, ValidatorStakeData>(
                PermissionLevel::User,
                |stake| Authorizer::Signer(stake.validator),
                |_, prev, _, _| Ok(ReducerResult::incomplete(UpdatingRegistration { prev: *prev })),
            )?
            .up::<UpdatingRegistration, ValidatorStakeData>(
                PermissionLevel::User,
                |_| Authorizer::Unrestricted,
                |updating, next, _, _| {
                    if next.validator != updating.prev.validator {
                        return Err(ProcedureError::invalid("validator key cannot change"));
                    }
                    if next.total_stake != updating.prev.total_stake {
                        return Err(ProcedureError::invalid(
                            "stake cannot change with registration",
                        ));
                    }
                    Ok(ReducerResult::complete_with(
                        REEvent::ValidatorRegistration {
                            validator: next.validator,
                            is_registered: next.is_registered,
                        },
                    ))
                },
            )?;
        Ok(())
    }

    fn staking(&self, procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        let min_stake = self.min_stake;
        procedures
            .read::<TokenHoldingBucket, ValidatorStakeData>(
                PermissionLevel::User,
                |_| Authorizer::Unrestricted,
                |bucket, stake, _, _| {
                    if !stake.is_registered {
                        return Err(ProcedureError::invalid(format!(
                            "validator {} is not registered",
                            stake.validator
                        )));
                    }
                    if bucket.resource != REAddr::NativeToken {
                        return Err(ProcedureError::ResourceMismatch {
                            expected: REAddr::NativeToken,
                            actual: bucket.resource,
                        });
                    }
                    if bucket.holder.is_none() {
                        return Err(ProcedureError::invalid("fee reserve tokens cannot be staked"));
                    }
                    Ok(ReducerResult::incomplete(StakingToValidator {
                        bucket,
                        validator: stake.validator,
                    }))
                },
            )?
            .up::<StakingToValidator, PreparedStake>(
                PermissionLevel::User,
                |_| Authorizer::Unrestricted,
                move |staking, stake, _, _| {
                    let StakingToValidator {
                        mut bucket,
                        validator,
                    } = staking;
                    if stake.validator != validator {
                        return Err(ProcedureError::invalid(format!(
                            "staking to {} but read {validator}",
                            stake.validator
                        )));
                    }
                    if bucket.holder != Some(stake.owner) {
                        return Err(ProcedureError::invalid("stake owner must be the token holder"));
                    }
                    if stake.amount < min_stake {
                        return Err(ProcedureError::invalid(format!(
                            "stake of {} is below the minimum of {min_stake}",
                            stake.amount
                        )));
                    }
                    bucket.withdraw(&REAddr::NativeToken, stake.amount)?;
                    Ok(ReducerResult::incomplete(bucket).with_event(REEvent::StakePrepared {
                        owner: stake.owner,
                        validator: stake.validator,
                        amount: stake.amount,
                    }))
                },
            )?;
        Ok(())
    }

    fn system_metadata(procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        procedures
            .down::<VoidReducerState, ValidatorSystemMetadata>(
                PermissionLevel::User,
                |metadata| Authorizer::Signer(metadata.validator),
                |_, metadata, _, _| {
                    Ok(ReducerResult::incomplete(UpdatingSystemMetadata {
                        validator: metadata.validator,
                    }))
                },
            )?
            .up::<UpdatingSystemMetadata, ValidatorSystemMetadata>(
                PermissionLevel::User,
                |_| Authorizer::Unrestricted,
                |updating, metadata, _, _| {
                    if metadata.validator != updating.validator {
                        return Err(ProcedureError::invalid("validator key cannot change"));
                    }
                    Ok(ReducerResult::complete_with(
                        REEvent::SystemMetadataUpdated {
                            validator: metadata.validator,
                            data: metadata.data,
                        },
                    ))
                },
            )?;
        Ok(())
    }
}

impl ConstraintScrypt for ValidatorConstraintScrypt {
    fn name(&self) -> &'static str {
        "validators"
    }

    fn procedures(&self) -> Result<Procedures, ProcedureRegistryError> {
        let mut procedures = Procedures::new();
        Self::registration(&mut procedures)?;
        self.staking(&mut procedures)?;
        Self::system_metadata(&mut procedures)?;
        Ok(procedures)
    }
}
