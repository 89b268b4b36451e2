//! Per-transaction execution context: permission level, signer and the fee
//! reserve.

use {
    crate::error::{AuthorizationError, FeeReserveError},
    ledger_sdk::{hash::Hash, signature::ECPublicKey},
    log::*,
    serde_derive::{Deserialize, Serialize},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    User,
    SuperUser,
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeReceipt {
    pub fee_collected: u128,
}

#[derive(Debug)]
pub struct ExecutionContext {
    txn_id: Hash,
    txn_size: usize,
    level: PermissionLevel,
    key: Option<ECPublicKey>,
    skip_authorization: bool,
    disable_resource_alloc_and_destroy: bool,
    sig_instructions: usize,
    fee_reserve: u128,
    system_loan: u128,
    fee_charged: u128,
}

impl ExecutionContext {
    pub fn new(txn_id: Hash, txn_size: usize, level: PermissionLevel) -> Self {
        Self {
            txn_id,
            txn_size,
            level,
            key: None,
            skip_authorization: false,
            disable_resource_alloc_and_destroy: false,
            sig_instructions: 0,
            fee_reserve: 0,
            system_loan: 0,
            fee_charged: 0,
        }
    }

    pub fn with_key(mut self, key: Option<ECPublicKey>) -> Self {
        self.key = key;
        self
    }

    pub fn with_skip_authorization(mut self, skip_authorization: bool) -> Self {
        self.skip_authorization = skip_authorization;
        self
    }

    pub fn with_resource_alloc_and_destroy_disabled(mut self, disabled: bool) -> Self {
        self.disable_resource_alloc_and_destroy = disabled;
        self
    }

    pub fn txn_id(&self) -> &Hash {
        &self.txn_id
    }

    pub fn txn_size(&self) -> usize {
        self.txn_size
    }

    pub fn level(&self) -> PermissionLevel {
        self.level
    }

    pub fn key(&self) -> Option<&ECPublicKey> {
        self.key.as_ref()
    }

    pub fn skip_authorization(&self) -> bool {
        self.skip_authorization
    }

    pub fn resource_alloc_and_destroy_disabled(&self) -> bool {
        self.disable_resource_alloc_and_destroy
    }

    pub fn fee_reserve(&self) -> u128 {
        self.fee_reserve
    }

    pub fn system_loan(&self) -> u128 {
        self.system_loan
    }

    /// A procedure requiring more than USER may never run under a signer, and
    /// no procedure may require more than the context holds.
    pub fn verify_permission_level(
        &self,
        required: PermissionLevel,
    ) -> Result<(), AuthorizationError> {
        if self.level < required {
            return Err(AuthorizationError::InsufficientPermission {
                required,
                actual: self.level,
            });
        }
        if required > PermissionLevel::User && self.key.is_some() {
            return Err(AuthorizationError::SignedPrivilegedProcedure(required));
        }
        Ok(())
    }

    pub fn sig_instruction(&mut self) -> usize {
        self.sig_instructions += 1;
        self.sig_instructions
    }

    /// Credits the reserve against a loan that must be repaid by deposits
    /// before the context is destroyed.
    pub fn add_system_loan(&mut self, amount: u128) -> Result<(), FeeReserveError> {
        self.system_loan = self
            .system_loan
            .checked_add(amount)
            .ok_or(FeeReserveError::Overflow)?;
        self.fee_reserve = self
            .fee_reserve
            .checked_add(amount)
            .ok_or(FeeReserveError::Overflow)?;
        Ok(())
    }

    /// Deposits repay any outstanding system loan first.
    pub fn deposit_fee_reserve(&mut self, amount: u128) -> Result<(), FeeReserveError> {
        let repaid = amount.min(self.system_loan);
        self.system_loan -= repaid;
        self.fee_reserve = self
            .fee_reserve
            .checked_add(amount - repaid)
            .ok_or(FeeReserveError::Overflow)?;
        Ok(())
    }

    pub fn withdraw_fee_reserve(&mut self, amount: u128) -> Result<(), FeeReserveError> {
        if amount > self.fee_reserve {
            return Err(FeeReserveError::NotEnoughFees {
                requested: amount,
                available: self.fee_reserve,
            });
        }
        self.fee_reserve -= amount;
        Ok(())
    }

    pub fn charge(&mut self, amount: u128) -> Result<(), FeeReserveError> {
        self.withdraw_fee_reserve(amount)?;
        self.fee_charged += amount;
        Ok(())
    }

    /// Closes the context. Whatever is left in the reserve is collected
    /// along with the charged fees.
    pub fn destroy(self) -> Result<FeeReceipt, FeeReserveError> {
        if self.system_loan > 0 {
            debug!(
                "txn {} defaulted on system loan of {}",
                self.txn_id, self.system_loan
            );
            return Err(FeeReserveError::DefaultedSystemLoan(self.system_loan));
        }
        Ok(FeeReceipt {
            fee_collected: self.fee_charged + self.fee_reserve,
        })
    }
}
