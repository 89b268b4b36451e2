use {
    ledger_constraint_machine::{
        substate::{
            EpochData, RoundData, SubstateTypeId, TokenResource, Tokens, ValidatorStakeData,
            VirtualParent,
        },
        TxLowLevelBuilder, ValidatorSet,
    },
    ledger_sdk::{ECPublicKey, REAddr, Txn},
};

/// Initial ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Genesis {
    pub timestamp: u64,
    /// Registered validators with their initial stake.
    pub validators: Vec<(ECPublicKey, u128)>,
    /// Native token balances.
    pub balances: Vec<(ECPublicKey, u128)>,
}

impl Genesis {
    pub fn validator_set(&self) -> ValidatorSet {
        ValidatorSet::new(self.validators.iter().copied())
    }

    /// The genesis transaction. Executed at system level, it creates the
    /// native token, balances, validator stake, the parent of validator
    /// system metadata, epoch 0 and round 0.
    pub fn txn(&self) -> Txn {
        let mut builder = TxLowLevelBuilder::new();
        builder
            .up(&TokenResource {
                addr: REAddr::NativeToken,
                is_mutable: false,
                owner: None,
            }
            .into())
            .end();
        for (holder, amount) in &self.balances {
            builder
                .up(&Tokens {
                    resource: REAddr::NativeToken,
                    holder: *holder,
                    amount: *amount,
                }
                .into())
                .end();
        }
        for (validator, total_stake) in &self.validators {
            builder
                .up(&ValidatorStakeData {
                    validator: *validator,
                    is_registered: true,
                    total_stake: *total_stake,
                }
                .into())
                .end();
        }
        builder
            .up(&VirtualParent {
                child_type: SubstateTypeId::ValidatorSystemMetadata,
            }
            .into())
            .end()
            .up(&EpochData { epoch: 0 }.into())
            .end()
            .up(&RoundData {
                view: 0,
                timestamp: self.timestamp,
            }
            .into())
            .end();
        builder.build()
    }
}
