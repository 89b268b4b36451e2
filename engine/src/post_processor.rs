//! Batch post-processors.
//!
//! Each one receives the proof metadata of a durable commit, may enrich it
//! with facts derived from the staged state, and hands it on. They run in
//! the order the [`EngineRules`](crate::rules::EngineRules) declare them,
//! after the batch verifier.

use {
    crate::{
        error::PostProcessorError,
        forks::{
            should_candidate_fork_be_enacted, CandidateForkConfig, CandidateForkId,
            FixedEpochForkConfig, ForkVotingResult, ONE_HUNDRED_PERCENT,
        },
        proof::LedgerAndBFTProof,
        store::EngineStore,
        txn::ProcessedTxn,
    },
    ledger_constraint_machine::{
        codec,
        substate::{SubstateIndex, SubstateType, SubstateTypeId, ValidatorSystemMetadata},
        ValidatorSet,
    },
    log::*,
    std::collections::BTreeMap,
};

/// Voting results below this share of stake are not recorded.
pub const MIN_RECORDED_STAKE_PERCENTAGE: u16 = 1_000;

pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(
        &self,
        metadata: LedgerAndBFTProof,
        store: &dyn EngineStore,
        txns: &[ProcessedTxn],
    ) -> Result<LedgerAndBFTProof, PostProcessorError>;
}

fn load_system_metadata(
    store: &dyn EngineStore,
) -> Result<Vec<ValidatorSystemMetadata>, PostProcessorError> {
    store
        .open_indexed_cursor(&SubstateIndex::of_type(SubstateTypeId::ValidatorSystemMetadata))
        .map(|raw| {
            let particle = codec::deserialize(&raw.data)?;
            ValidatorSystemMetadata::from_particle(&particle)
                .copied()
                .ok_or(PostProcessorError::UnexpectedSubstate)
        })
        .collect()
}

/// Snapshots the system metadata of the next epoch's validators. A
/// validator that never wrote metadata is recorded as empty.
#[derive(Debug, Default)]
pub struct ValidatorSystemMetadataPostProcessor;

impl PostProcessor for ValidatorSystemMetadataPostProcessor {
    fn name(&self) -> &'static str {
        "validator_system_metadata"
    }

    fn process(
        &self,
        metadata: LedgerAndBFTProof,
        store: &dyn EngineStore,
        _txns: &[ProcessedTxn],
    ) -> Result<LedgerAndBFTProof, PostProcessorError> {
        let Some(validator_set) = &metadata.proof().next_validator_set else {
            return Ok(metadata);
        };
        let mut written: BTreeMap<_, _> = load_system_metadata(store)?
            .into_iter()
            .map(|entry| (entry.validator, entry))
            .collect();
        let snapshot = validator_set
            .iter()
            .map(|(validator, _)| {
                written
                    .remove(validator)
                    .unwrap_or_else(|| ValidatorSystemMetadata::empty(*validator))
            })
            .collect();
        Ok(metadata.with_validators_system_metadata(snapshot))
    }
}

/// Tallies fork votes of the next epoch's validators, weighted by their
/// power in that epoch.
#[derive(Debug, Default)]
pub struct CandidateForkVotesPostProcessor;

impl CandidateForkVotesPostProcessor {
    fn tally(
        validator_set: &ValidatorSet,
        votes: &[ValidatorSystemMetadata],
        epoch: u64,
    ) -> Result<Vec<ForkVotingResult>, PostProcessorError> {
        let total_power = validator_set.total_power();
        if total_power == 0 {
            return Err(PostProcessorError::EmptyValidatorSet);
        }

        let mut power_by_fork: BTreeMap<CandidateForkId, u128> = BTreeMap::new();
        for vote in votes {
            let (Some(candidate_fork_id), Some(power)) = (
                CandidateForkId::from_vote(&vote.data),
                validator_set.power(&vote.validator),
            ) else {
                continue;
            };
            *power_by_fork.entry(candidate_fork_id).or_default() += power;
        }

        Ok(power_by_fork
            .into_iter()
            .filter_map(|(candidate_fork_id, power)| {
                let percentage = power.saturating_mul(u128::from(ONE_HUNDRED_PERCENT)) / total_power;
                let stake_percentage_voted = u16::try_from(percentage).ok()?;
                (stake_percentage_voted >= MIN_RECORDED_STAKE_PERCENTAGE).then_some(
                    ForkVotingResult {
                        epoch,
                        candidate_fork_id,
                        stake_percentage_voted,
                    },
                )
            })
            .collect())
    }
}

impl PostProcessor for CandidateForkVotesPostProcessor {
    fn name(&self) -> &'static str {
        "candidate_fork_votes"
    }

    fn process(
        &self,
        metadata: LedgerAndBFTProof,
        store: &dyn EngineStore,
        _txns: &[ProcessedTxn],
    ) -> Result<LedgerAndBFTProof, PostProcessorError> {
        let Some(validator_set) = &metadata.proof().next_validator_set else {
            return Ok(metadata);
        };
        let next_epoch = metadata.proof().epoch + 1;
        let results = Self::tally(validator_set, &load_system_metadata(store)?, next_epoch)?;
        for result in &results {
            info!(
                "fork voting result for epoch {}: {} has {}.{:02}% of stake",
                result.epoch,
                result.candidate_fork_id,
                result.stake_percentage_voted / 100,
                result.stake_percentage_voted % 100
            );
        }
        Ok(metadata.with_fork_voting_results(results))
    }
}

/// Switches to the next fixed fork when its epoch begins.
#[derive(Debug)]
pub struct NextFixedEpochForkPostProcessor {
    fork: FixedEpochForkConfig,
}

impl NextFixedEpochForkPostProcessor {
    pub fn new(fork: FixedEpochForkConfig) -> Self {
        Self { fork }
    }
}

impl PostProcessor for NextFixedEpochForkPostProcessor {
    fn name(&self) -> &'static str {
        "next_fixed_epoch_fork"
    }

    fn process(
        &self,
        metadata: LedgerAndBFTProof,
        _store: &dyn EngineStore,
        _txns: &[ProcessedTxn],
    ) -> Result<LedgerAndBFTProof, PostProcessorError> {
        let proof = metadata.proof();
        if !proof.is_end_of_epoch() || proof.epoch + 1 != self.fork.epoch {
            return Ok(metadata);
        }
        info!("enacting fork {} at epoch {}", self.fork.name, self.fork.epoch);
        Ok(metadata.with_next_fork(self.fork.name.clone()))
    }
}

/// Switches to the candidate fork once its votes pass a threshold.
#[derive(Debug)]
pub struct NextCandidateForkPostProcessor {
    candidate: CandidateForkConfig,
}

impl NextCandidateForkPostProcessor {
    pub fn new(candidate: CandidateForkConfig) -> Self {
        Self { candidate }
    }
}

impl PostProcessor for NextCandidateForkPostProcessor {
    fn name(&self) -> &'static str {
        "next_candidate_fork"
    }

    fn process(
        &self,
        metadata: LedgerAndBFTProof,
        store: &dyn EngineStore,
        _txns: &[ProcessedTxn],
    ) -> Result<LedgerAndBFTProof, PostProcessorError> {
        if !should_candidate_fork_be_enacted(&self.candidate, &metadata, store) {
            return Ok(metadata);
        }
        info!(
            "enacting candidate fork {} at epoch {}",
            self.candidate.name,
            metadata.proof().epoch + 1
        );
        Ok(metadata.with_next_fork(self.candidate.name.clone()))
    }
}
