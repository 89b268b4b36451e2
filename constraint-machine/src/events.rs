use {
    ledger_sdk::{signature::ECPublicKey, REAddr},
    std::collections::BTreeMap,
};

/// A set of validators and their voting power.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: BTreeMap<ECPublicKey, u128>,
}

impl ValidatorSet {
    pub fn new(validators: impl IntoIterator<Item = (ECPublicKey, u128)>) -> Self {
        Self {
            validators: validators.into_iter().collect(),
        }
    }

    pub fn power(&self, validator: &ECPublicKey) -> Option<u128> {
        self.validators.get(validator).copied()
    }

    pub fn contains(&self, validator: &ECPublicKey) -> bool {
        self.validators.contains_key(validator)
    }

    pub fn total_power(&self) -> u128 {
        self.validators.values().sum()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ECPublicKey, &u128)> {
        self.validators.iter()
    }
}

/// Events emitted by procedures while a transaction is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum REEvent {
    RoundUpdate {
        view: u64,
        timestamp: u64,
    },
    NextValidatorSet {
        epoch: u64,
        validator_set: ValidatorSet,
    },
    TokensMinted {
        resource: REAddr,
        amount: u128,
    },
    TokensBurned {
        resource: REAddr,
        amount: u128,
    },
    StakePrepared {
        owner: ECPublicKey,
        validator: ECPublicKey,
        amount: u128,
    },
    ValidatorRegistration {
        validator: ECPublicKey,
        is_registered: bool,
    },
    SystemMetadataUpdated {
        validator: ECPublicKey,
        data: [u8; 32],
    },
}
