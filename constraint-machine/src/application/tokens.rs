//! Token transfer, mint, burn and fee reserve procedures.
//!
//! Bringing `Tokens` down moves them into a [`TokenHoldingBucket`]; booting
//! `Tokens` up draws from it. Whatever is left in the bucket at `END` is
//! burned, which only the resource owner may do.

use {
    crate::{
        application::ConstraintScrypt,
        context::{ExecutionContext, PermissionLevel},
        error::ProcedureError,
        events::REEvent,
        procedure::{Authorizer, ProcedureRegistryError, Procedures, ResourceLoader},
        reducer::{ReducerResult, VoidReducerState},
        serialization::ByteReader,
        substate::Tokens,
    },
    ledger_sdk::{signature::ECPublicKey, REAddr},
};

pub const FEE_RESERVE_PUT: u8 = 0x00;
pub const FEE_RESERVE_TAKE: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHoldingBucket {
    pub resource: REAddr,
    /// `None` for tokens taken out of the fee reserve.
    pub holder: Option<ECPublicKey>,
    pub amount: u128,
}

impl TokenHoldingBucket {
    pub fn deposit(&mut self, resource: &REAddr, amount: u128) -> Result<(), ProcedureError> {
        if *resource != self.resource {
            return Err(ProcedureError::ResourceMismatch {
                expected: self.resource,
                actual: *resource,
            });
        }
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(ProcedureError::Overflow)?;
        Ok(())
    }

    pub fn withdraw(&mut self, resource: &REAddr, amount: u128) -> Result<(), ProcedureError> {
        if *resource != self.resource {
            return Err(ProcedureError::ResourceMismatch {
                expected: self.resource,
                actual: *resource,
            });
        }
        if amount > self.amount {
            return Err(ProcedureError::NotEnoughTokens {
                requested: amount,
                available: self.amount,
            });
        }
        self.amount -= amount;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeReserveCall {
    Put(u128),
    Take(u128),
}

impl FeeReserveCall {
    pub fn decode(data: &[u8]) -> Result<Self, ProcedureError> {
        let mut reader = ByteReader::new(data);
        let id = reader
            .read_u8()
            .map_err(|err| ProcedureError::invalid(err.to_string()))?;
        let amount = reader
            .read_u128()
            .map_err(|err| ProcedureError::invalid(err.to_string()))?;
        reader
            .expect_end()
            .map_err(|err| ProcedureError::invalid(err.to_string()))?;
        match id {
            FEE_RESERVE_PUT => Ok(Self::Put(amount)),
            FEE_RESERVE_TAKE => Ok(Self::Take(amount)),
            other => Err(ProcedureError::UnknownSyscall(other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokensConstraintScrypt;

impl TokensConstraintScrypt {
    fn transfers(procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        procedures
            .down::<VoidReducerState, Tokens>(
                PermissionLevel::User,
                |tokens| Authorizer::Signer(tokens.holder),
                |_, tokens, _, _| {
                    Ok(ReducerResult::incomplete(TokenHoldingBucket {
                        resource: tokens.resource,
                        holder: Some(tokens.holder),
                        amount: tokens.amount,
                    }))
                },
            )?
            .down::<TokenHoldingBucket, Tokens>(
                PermissionLevel::User,
                |tokens| Authorizer::Signer(tokens.holder),
                |mut bucket, tokens, _, _| {
                    if bucket.holder != Some(tokens.holder) {
                        return Err(ProcedureError::invalid(
                            "tokens from different holders cannot share a bucket",
                        ));
                    }
                    bucket.deposit(&tokens.resource, tokens.amount)?;
                    Ok(ReducerResult::incomplete(bucket))
                },
            )?
            .up::<TokenHoldingBucket, Tokens>(
                PermissionLevel::User,
                |_| Authorizer::Unrestricted,
                |mut bucket, tokens, _, _| {
                    bucket.withdraw(&tokens.resource, tokens.amount)?;
                    Ok(ReducerResult::incomplete(bucket))
                },
            )?
            .end::<TokenHoldingBucket>(PermissionLevel::User, |bucket, resources, context| {
                if bucket.is_empty() {
                    return Ok(ReducerResult::complete());
                }
                let remainder = Err(ProcedureError::RemainderNotZero {
                    resource: bucket.resource,
                    amount: bucket.amount,
                });
                if context.resource_alloc_and_destroy_disabled() {
                    return remainder;
                }
                let resource = resources.load_resource(&bucket.resource)?;
                let owner_signed = resource.owner.is_some() && resource.owner.as_ref() == context.key();
                if !resource.is_mutable || !owner_signed {
                    return remainder;
                }
                Ok(ReducerResult::complete_with(REEvent::TokensBurned {
                    resource: bucket.resource,
                    amount: bucket.amount,
                }))
            })?;
        Ok(())
    }

    fn mint(procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        procedures.up::<VoidReducerState, Tokens>(
            PermissionLevel::User,
            |tokens| Authorizer::ResourceOwner(tokens.resource),
            |_, tokens, resources, context| {
                if context.resource_alloc_and_destroy_disabled() {
                    return Err(ProcedureError::ResourceAllocationDisabled);
                }
                let resource = resources.load_resource(&tokens.resource)?;
                if !resource.is_mutable && context.level() != PermissionLevel::System {
                    return Err(ProcedureError::ImmutableResource(tokens.resource));
                }
                Ok(ReducerResult::complete_with(REEvent::TokensMinted {
                    resource: tokens.resource,
                    amount: tokens.amount,
                }))
            },
        )?;
        Ok(())
    }

    fn fee_reserve(procedures: &mut Procedures) -> Result<(), ProcedureRegistryError> {
        procedures
            .syscall::<VoidReducerState>(PermissionLevel::User, |_, data, context| {
                match FeeReserveCall::decode(data)? {
                    FeeReserveCall::Take(amount) => {
                        context.withdraw_fee_reserve(amount)?;
                        Ok(ReducerResult::incomplete(TokenHoldingBucket {
                            resource: REAddr::NativeToken,
                            holder: None,
                            amount,
                        }))
                    }
                    FeeReserveCall::Put(_) => {
                        Err(ProcedureError::invalid("no tokens to put into the fee reserve"))
                    }
                }
            })?
            .syscall::<TokenHoldingBucket>(PermissionLevel::User, |mut bucket, data, context| {
                match FeeReserveCall::decode(data)? {
                    FeeReserveCall::Put(amount) => {
                        bucket.withdraw(&REAddr::NativeToken, amount)?;
                        context.deposit_fee_reserve(amount)?;
                    }
                    FeeReserveCall::Take(amount) => {
                        bucket.deposit(&REAddr::NativeToken, amount)?;
                        context.withdraw_fee_reserve(amount)?;
                    }
                }
                Ok(ReducerResult::incomplete(bucket))
            })?;
        Ok(())
    }
}

impl ConstraintScrypt for TokensConstraintScrypt {
    fn name(&self) -> &'static str {
        "tokens"
    }

    fn procedures(&self) -> Result<Procedures, ProcedureRegistryError> {
        let mut procedures = Procedures::new();
        Self::transfers(&mut procedures)?;
        Self::mint(&mut procedures)?;
        Self::fee_reserve(&mut procedures)?;
        Ok(procedures)
    }
}
