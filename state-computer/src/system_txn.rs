//! The unsigned system transaction that opens every proposal: either the
//! next round or, once the round ceiling of the epoch is passed, the epoch
//! change.

use {
    crate::error::SystemTxnError,
    ledger_constraint_machine::{
        codec,
        substate::{
            EpochData, PreparedStake, RoundData, SubstateIndex, SubstateType, SubstateTypeId,
            ValidatorStakeData, ValidatorSystemMetadata,
        },
        SubstateStore, TxLowLevelBuilder,
    },
    ledger_sdk::{ECPublicKey, SubstateId, Txn},
    std::collections::{BTreeMap, HashMap},
};

fn indexed<T: SubstateType + Copy>(
    store: &dyn SubstateStore,
) -> Result<Vec<(SubstateId, T)>, SystemTxnError> {
    store
        .open_indexed_cursor(&SubstateIndex::of_type(T::TYPE_ID))
        .map(|raw| {
            let particle = codec::deserialize(&raw.data)?;
            let substate = T::from_particle(&particle)
                .copied()
                .ok_or(SystemTxnError::UnexpectedSubstate(T::TYPE_ID))?;
            Ok((raw.id, substate))
        })
        .collect()
}

fn single<T: SubstateType + Copy>(
    store: &dyn SubstateStore,
) -> Result<(SubstateId, T), SystemTxnError> {
    indexed(store)?
        .into_iter()
        .next()
        .ok_or(SystemTxnError::MissingSubstate(T::TYPE_ID))
}

pub fn current_round(store: &dyn SubstateStore) -> Result<RoundData, SystemTxnError> {
    single::<RoundData>(store).map(|(_, round)| round)
}

pub fn current_epoch(store: &dyn SubstateStore) -> Result<u64, SystemTxnError> {
    single::<EpochData>(store).map(|(_, epoch)| epoch.epoch)
}

/// The validator's system metadata, empty if it never wrote any.
pub fn validator_system_metadata(
    store: &dyn SubstateStore,
    validator: &ECPublicKey,
) -> Result<ValidatorSystemMetadata, SystemTxnError> {
    Ok(indexed::<ValidatorSystemMetadata>(store)?
        .into_iter()
        .map(|(_, metadata)| metadata)
        .find(|metadata| metadata.validator == *validator)
        .unwrap_or_else(|| ValidatorSystemMetadata::empty(*validator)))
}

/// What the system transaction for a proposal will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemUpdate {
    NextRound { view: u64 },
    NextEpoch,
}

impl SystemUpdate {
    pub fn for_view(view: u64, max_rounds: u64) -> Self {
        if view <= max_rounds {
            Self::NextRound { view }
        } else {
            Self::NextEpoch
        }
    }
}

/// Builds the system transaction for `view` against the state in `store`.
pub fn build_system_txn(
    store: &dyn SubstateStore,
    view: u64,
    timestamp: u64,
    max_rounds: u64,
) -> Result<Txn, SystemTxnError> {
    let (round_id, round) = single::<RoundData>(store)?;
    let mut builder = TxLowLevelBuilder::new();
    match SystemUpdate::for_view(view, max_rounds) {
        SystemUpdate::NextRound { view } => {
            builder
                .down(&round_id)
                .up(&RoundData { view, timestamp }.into())
                .end();
        }
        SystemUpdate::NextEpoch => {
            if round.view < max_rounds {
                // Close the epoch's remaining rounds first.
                let index = builder.next_up_index();
                builder
                    .down(&round_id)
                    .up(&RoundData {
                        view: max_rounds,
                        timestamp,
                    }
                    .into())
                    .end()
                    .local_down(index);
            } else {
                builder.down(&round_id);
            }
            next_epoch(store, &mut builder, timestamp)?;
        }
    }
    Ok(builder.build())
}

fn next_epoch(
    store: &dyn SubstateStore,
    builder: &mut TxLowLevelBuilder,
    timestamp: u64,
) -> Result<(), SystemTxnError> {
    let (epoch_id, epoch) = single::<EpochData>(store)?;

    let mut pending: BTreeMap<ECPublicKey, u128> = BTreeMap::new();
    for (_, stake) in indexed::<PreparedStake>(store)? {
        let total = pending.entry(stake.validator).or_default();
        *total = total
            .checked_add(stake.amount)
            .ok_or(SystemTxnError::Overflow)?;
    }
    let stake_data: HashMap<_, _> = indexed::<ValidatorStakeData>(store)?
        .into_iter()
        .map(|(id, data)| (data.validator, (id, data)))
        .collect();

    builder
        .down(&epoch_id)
        .down_index(&SubstateIndex::of_type(SubstateTypeId::PreparedStake));
    for (validator, amount) in pending {
        let (id, current) = stake_data
            .get(&validator)
            .ok_or(SystemTxnError::MissingStakeData(validator))?;
        let total_stake = current
            .total_stake
            .checked_add(amount)
            .ok_or(SystemTxnError::Overflow)?;
        builder.down(id).up(&ValidatorStakeData {
            total_stake,
            ..*current
        }
        .into());
    }
    builder
        .read_index(&SubstateIndex::of_type(SubstateTypeId::ValidatorStakeData))
        .up(&EpochData {
            epoch: epoch.epoch + 1,
        }
        .into())
        .up(&RoundData { view: 0, timestamp }.into())
        .end();
    Ok(())
}
