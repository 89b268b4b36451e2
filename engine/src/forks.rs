//! Ruleset versions ("forks") and the rules for switching between them.
//!
//! Fixed epoch forks are enacted at a configured epoch. On top of the last
//! fixed fork there may be one candidate fork, enacted once enough stake
//! has voted for it for long enough. Votes are cast through validator
//! system metadata and tallied at every epoch boundary.

use {
    crate::{
        error::ForksError,
        post_processor::{NextCandidateForkPostProcessor, NextFixedEpochForkPostProcessor},
        proof::LedgerAndBFTProof,
        rules::EngineRules,
        store::{EngineStore, ForksEpochStore},
    },
    itertools::Itertools,
    ledger_constraint_machine::{substate::SYSTEM_METADATA_BYTES, RulesConfig},
    ledger_sdk::{ECPublicKey, Hash},
    log::*,
    serde_derive::{Deserialize, Serialize},
    std::{collections::BTreeMap, fmt, sync::Arc},
};

/// Stake percentages use a scale where 10000 is 100%.
pub const ONE_HUNDRED_PERCENT: u16 = 10_000;

pub const CANDIDATE_FORK_ID_BYTES: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidateForkId(pub [u8; CANDIDATE_FORK_ID_BYTES]);

impl CandidateForkId {
    /// The fork id a validator system metadata vote refers to, if the
    /// metadata is a vote at all.
    pub fn from_vote(data: &[u8; SYSTEM_METADATA_BYTES]) -> Option<Self> {
        if data.iter().all(|b| *b == 0) {
            return None;
        }
        let mut id = [0u8; CANDIDATE_FORK_ID_BYTES];
        id.copy_from_slice(&data[..CANDIDATE_FORK_ID_BYTES]);
        Some(Self(id))
    }
}

impl fmt::Display for CandidateForkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CandidateForkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CandidateForkId({self})")
    }
}

/// Stake share voting for a candidate fork as of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkVotingResult {
    pub epoch: u64,
    pub candidate_fork_id: CandidateForkId,
    pub stake_percentage_voted: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Threshold {
    /// On the [`ONE_HUNDRED_PERCENT`] scale.
    pub required_stake: u16,
    pub epochs_before_enacted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedEpochForkConfig {
    pub name: String,
    pub epoch: u64,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateForkConfig {
    pub name: String,
    pub min_epoch: u64,
    pub max_epoch: u64,
    pub thresholds: Vec<Threshold>,
    #[serde(default)]
    pub rules: RulesConfig,
}

impl CandidateForkConfig {
    pub fn id(&self) -> CandidateForkId {
        let mut thresholds = Vec::with_capacity(self.thresholds.len() * 10);
        for threshold in &self.thresholds {
            thresholds.extend_from_slice(&threshold.required_stake.to_be_bytes());
            thresholds.extend_from_slice(&threshold.epochs_before_enacted.to_be_bytes());
        }
        let hash = Hash::hashv(&[
            self.name.as_bytes(),
            &self.min_epoch.to_be_bytes(),
            &self.max_epoch.to_be_bytes(),
            &thresholds,
        ]);
        let mut id = [0u8; CANDIDATE_FORK_ID_BYTES];
        id.copy_from_slice(&hash.as_ref()[..CANDIDATE_FORK_ID_BYTES]);
        CandidateForkId(id)
    }

    /// The system metadata a validator publishes to vote for this fork.
    pub fn vote(&self, validator: &ECPublicKey) -> [u8; SYSTEM_METADATA_BYTES] {
        let id = self.id();
        let hash = Hash::hashv(&[validator.as_ref(), &id.0]);
        let mut vote = [0u8; SYSTEM_METADATA_BYTES];
        vote[..CANDIDATE_FORK_ID_BYTES].copy_from_slice(&id.0);
        vote[CANDIDATE_FORK_ID_BYTES..]
            .copy_from_slice(&hash.as_ref()[..SYSTEM_METADATA_BYTES - CANDIDATE_FORK_ID_BYTES]);
        vote
    }

    pub fn longest_threshold_epochs(&self) -> u64 {
        self.thresholds
            .iter()
            .map(|threshold| threshold.epochs_before_enacted)
            .max()
            .unwrap_or_default()
    }

    fn within_epoch_range(&self, epoch: u64) -> bool {
        (self.min_epoch..=self.max_epoch).contains(&epoch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForkConfig {
    Fixed(FixedEpochForkConfig),
    Candidate(CandidateForkConfig),
}

impl ForkConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Fixed(fork) => &fork.name,
            Self::Candidate(fork) => &fork.name,
        }
    }

    pub fn rules(&self) -> &RulesConfig {
        match self {
            Self::Fixed(fork) => &fork.rules,
            Self::Candidate(fork) => &fork.rules,
        }
    }
}

/// Number of consecutive epochs, ending at `at_epoch`, in which each
/// threshold was met. A gap between results restarts the counts. Empty
/// unless the latest result is for `at_epoch`.
pub fn calculate_thresholds_passing_epochs(
    thresholds: &[Threshold],
    results: &[ForkVotingResult],
    at_epoch: u64,
) -> Vec<(Threshold, u64)> {
    let mut results = results.iter();
    let Some(mut next) = results.next() else {
        return Vec::new();
    };
    let passes = |threshold: &Threshold, result: &ForkVotingResult| {
        result.stake_percentage_voted >= threshold.required_stake
    };

    let mut counts: Vec<u64> = thresholds
        .iter()
        .map(|threshold| u64::from(passes(threshold, next)))
        .collect();
    while next.epoch <= at_epoch {
        let Some(result) = results.next() else {
            break;
        };
        let contiguous = result.epoch == next.epoch + 1;
        next = result;
        for (count, threshold) in counts.iter_mut().zip(thresholds) {
            *count = match (passes(threshold, next), contiguous) {
                (false, _) => 0,
                (true, true) => *count + 1,
                (true, false) => 1,
            };
        }
    }

    if next.epoch == at_epoch {
        thresholds.iter().copied().zip(counts).collect()
    } else {
        Vec::new()
    }
}

fn any_threshold_enacted(passing: &[(Threshold, u64)]) -> bool {
    passing
        .iter()
        .any(|(threshold, epochs)| *epochs >= threshold.epochs_before_enacted)
}

/// Whether the candidate fork should be enacted at the epoch following
/// `metadata`. Voting results for that epoch must already be attached.
pub fn should_candidate_fork_be_enacted<S: ForksEpochStore + ?Sized>(
    candidate: &CandidateForkConfig,
    metadata: &LedgerAndBFTProof,
    store: &S,
) -> bool {
    let Some(results) = metadata.fork_voting_results() else {
        return false;
    };
    if !metadata.proof().is_end_of_epoch() {
        return false;
    }
    let next_epoch = metadata.proof().epoch + 1;
    if !candidate.within_epoch_range(next_epoch) {
        return false;
    }
    let id = candidate.id();
    let Some(current) = results.iter().find(|result| result.candidate_fork_id == id) else {
        return false;
    };

    let from_epoch = next_epoch.saturating_sub(candidate.longest_threshold_epochs());
    let mut history = store.fork_voting_results(from_epoch, next_epoch, &id);
    history.push(*current);
    any_threshold_enacted(&calculate_thresholds_passing_epochs(
        &candidate.thresholds,
        &history,
        next_epoch,
    ))
}

/// Validated set of fork configurations.
#[derive(Debug, Clone)]
pub struct Forks {
    fixed_epoch_forks: Vec<FixedEpochForkConfig>,
    candidate_fork: Option<CandidateForkConfig>,
}

impl Forks {
    pub fn create(configs: Vec<ForkConfig>) -> Result<Self, ForksError> {
        if let Some(name) = configs.iter().map(ForkConfig::name).duplicates().next() {
            return Err(ForksError::DuplicateName(name.to_string()));
        }

        let (fixed, candidates): (Vec<_>, Vec<_>) =
            configs.into_iter().partition_map(|config| match config {
                ForkConfig::Fixed(fork) => itertools::Either::Left(fork),
                ForkConfig::Candidate(fork) => itertools::Either::Right(fork),
            });
        if candidates.len() > 1 {
            return Err(ForksError::MultipleCandidates(
                candidates.into_iter().map(|fork| fork.name).collect(),
            ));
        }
        let candidate_fork = candidates.into_iter().next();

        let fixed_epoch_forks: Vec<_> = fixed
            .into_iter()
            .sorted_by_key(|fork| fork.epoch)
            .collect();
        let Some(genesis) = fixed_epoch_forks.first() else {
            return Err(ForksError::NoFixedEpochFork);
        };
        if genesis.epoch != 0 {
            return Err(ForksError::GenesisNotAtEpochZero(genesis.epoch));
        }
        if let Some((_, fork)) = fixed_epoch_forks
            .iter()
            .tuple_windows()
            .find(|(prev, next)| prev.epoch >= next.epoch)
        {
            return Err(ForksError::DuplicateEpoch(fork.epoch));
        }

        if let (Some(candidate), Some(last)) = (&candidate_fork, fixed_epoch_forks.last()) {
            if candidate.min_epoch <= last.epoch {
                return Err(ForksError::CandidateBeforeLastFixedFork {
                    min_epoch: candidate.min_epoch,
                    last_fixed_epoch: last.epoch,
                });
            }
            if candidate.thresholds.is_empty() {
                return Err(ForksError::NoThresholds(candidate.name.clone()));
            }
        }

        Ok(Self {
            fixed_epoch_forks,
            candidate_fork,
        })
    }

    pub fn candidate_fork(&self) -> Option<&CandidateForkConfig> {
        self.candidate_fork.as_ref()
    }

    pub fn fixed_epoch_forks(&self) -> &[FixedEpochForkConfig] {
        &self.fixed_epoch_forks
    }

    pub fn genesis_fork(&self) -> &FixedEpochForkConfig {
        // `create` guarantees at least one fixed fork.
        &self.fixed_epoch_forks[0]
    }

    /// The fork that can be enacted directly after `name`: the next fixed
    /// fork, or the candidate after the last fixed one.
    pub fn next_fork(&self, name: &str) -> Option<&str> {
        let position = self
            .fixed_epoch_forks
            .iter()
            .position(|fork| fork.name == name)?;
        match self.fixed_epoch_forks.get(position + 1) {
            Some(next) => Some(&next.name),
            None => self.candidate_fork.as_ref().map(|fork| fork.name.as_str()),
        }
    }

    pub fn rules_config(&self, name: &str) -> Option<&RulesConfig> {
        self.fixed_epoch_forks
            .iter()
            .find(|fork| fork.name == name)
            .map(|fork| &fork.rules)
            .or_else(|| {
                self.candidate_fork
                    .as_ref()
                    .filter(|fork| fork.name == name)
                    .map(|fork| &fork.rules)
            })
    }

    /// Engine rules of the named fork, watching for the fork that follows
    /// it.
    pub fn engine_rules(&self, name: &str) -> Result<EngineRules, ForksError> {
        let config = self
            .rules_config(name)
            .ok_or_else(|| ForksError::UnknownFork(name.to_string()))?;
        let rules = EngineRules::new(config)?;

        let Some(position) = self
            .fixed_epoch_forks
            .iter()
            .position(|fork| fork.name == name)
        else {
            return Ok(rules);
        };
        Ok(match self.fixed_epoch_forks.get(position + 1) {
            Some(next) => rules.with_post_processor(Arc::new(
                NextFixedEpochForkPostProcessor::new(next.clone()),
            )),
            None => match &self.candidate_fork {
                Some(candidate) => rules.with_post_processor(Arc::new(
                    NextCandidateForkPostProcessor::new(candidate.clone()),
                )),
                None => rules,
            },
        })
    }

    /// The fork enacted most recently according to the store.
    pub fn current_fork<'a>(&'a self, stored_forks: &'a BTreeMap<u64, String>) -> &'a str {
        stored_forks
            .values()
            .next_back()
            .and_then(|name| self.rules_config(name).map(|_| name.as_str()))
            .unwrap_or(&self.genesis_fork().name)
    }

    /// Epoch at which the stored voting results say the candidate fork
    /// should have been enacted.
    pub fn find_execute_epoch_for_candidate<S: ForksEpochStore + ?Sized>(
        &self,
        store: &S,
    ) -> Option<u64> {
        let candidate = self.candidate_fork.as_ref()?;
        let from_epoch = candidate
            .min_epoch
            .saturating_sub(candidate.longest_threshold_epochs());
        let to_epoch = candidate.max_epoch.saturating_add(1);
        let results = store.fork_voting_results(from_epoch, to_epoch, &candidate.id());

        let mut counts = vec![0u64; candidate.thresholds.len()];
        let mut previous_epoch: Option<u64> = None;
        for result in results {
            let contiguous = previous_epoch.map_or(true, |prev| prev + 1 == result.epoch);
            for (count, threshold) in counts.iter_mut().zip(&candidate.thresholds) {
                let passes = result.stake_percentage_voted >= threshold.required_stake;
                *count = match (passes, contiguous) {
                    (false, _) => 0,
                    (true, true) => *count + 1,
                    (true, false) => 1,
                };
            }
            let enacted = counts
                .iter()
                .zip(&candidate.thresholds)
                .any(|(count, threshold)| *count >= threshold.epochs_before_enacted);
            if candidate.within_epoch_range(result.epoch) && enacted {
                return Some(result.epoch);
            }
            previous_epoch = Some(result.epoch);
        }
        None
    }

    /// Epochs until the candidate fork could be enacted at the earliest,
    /// given the votes recorded up to `current_epoch`. `None` when there is
    /// no candidate or it can no longer be enacted within its epoch range.
    pub fn calculate_candidate_fork_remaining_epochs<S: ForksEpochStore + ?Sized>(
        &self,
        store: &S,
        current_epoch: u64,
    ) -> Option<u64> {
        let candidate = self.candidate_fork.as_ref()?;
        let from_epoch = current_epoch.saturating_sub(candidate.longest_threshold_epochs());
        let results =
            store.fork_voting_results(from_epoch, current_epoch.saturating_add(1), &candidate.id());
        let passing =
            calculate_thresholds_passing_epochs(&candidate.thresholds, &results, current_epoch);

        let until_min_epoch = candidate.min_epoch.saturating_sub(current_epoch);
        passing
            .iter()
            .filter(|(_, epochs)| *epochs > 0)
            .map(|(threshold, epochs)| {
                threshold
                    .epochs_before_enacted
                    .saturating_sub(*epochs)
                    .max(until_min_epoch)
            })
            .filter(|remaining| current_epoch.saturating_add(*remaining) <= candidate.max_epoch)
            .min()
    }

    /// Brings the store's fork records in line with the configuration after
    /// a restart and checks that what was enacted matches it.
    pub fn init(&self, store: &mut dyn EngineStore) -> Result<(), ForksError> {
        let current_epoch = store
            .last_proof()
            .map(|proof| proof.proof().resulting_epoch())
            .unwrap_or_default();
        let stored_forks = store.stored_forks();
        info!(
            "forks init: stored {:?}, configured {:?}",
            stored_forks,
            self.fixed_epoch_forks
                .iter()
                .map(|fork| fork.name.as_str())
                .chain(self.candidate_fork.iter().map(|fork| fork.name.as_str()))
                .collect::<Vec<_>>()
        );

        for fork in &self.fixed_epoch_forks {
            let already_stored = stored_forks.values().any(|name| *name == fork.name);
            if current_epoch >= fork.epoch && !already_stored {
                info!("storing missed fork {} at epoch {}", fork.name, fork.epoch);
                store.store_fork(fork.epoch, &fork.name);
            }
        }

        if let Some(candidate) = &self.candidate_fork {
            let stored_epoch = stored_forks
                .iter()
                .find(|(_, name)| **name == candidate.name)
                .map(|(epoch, _)| *epoch);
            match (self.find_execute_epoch_for_candidate(&*store), stored_epoch) {
                (Some(expected), Some(actual)) if expected != actual => {
                    return Err(ForksError::CandidateEpochMismatch { expected, actual });
                }
                (Some(expected), None) => {
                    info!(
                        "storing missed candidate fork {} at epoch {expected}",
                        candidate.name
                    );
                    store.store_fork(expected, &candidate.name);
                }
                (None, Some(actual)) => {
                    return Err(ForksError::UnexpectedFork {
                        name: candidate.name.clone(),
                        epoch: actual,
                    });
                }
                _ => {}
            }
        }

        self.sanity_check(&store.stored_forks(), current_epoch)
    }

    fn sanity_check(
        &self,
        stored_forks: &BTreeMap<u64, String>,
        current_epoch: u64,
    ) -> Result<(), ForksError> {
        for fork in &self.fixed_epoch_forks {
            if fork.epoch == 0 || fork.epoch > current_epoch {
                continue;
            }
            if stored_forks.get(&fork.epoch) != Some(&fork.name) {
                return Err(ForksError::MissedFork {
                    name: fork.name.clone(),
                    epoch: fork.epoch,
                });
            }
        }

        for (epoch, name) in stored_forks {
            if *epoch > current_epoch {
                return Err(ForksError::ForkAfterCurrentEpoch {
                    name: name.clone(),
                    epoch: *epoch,
                    current_epoch,
                });
            }
            let fixed_matches = self
                .fixed_epoch_forks
                .iter()
                .any(|fork| fork.epoch == *epoch && fork.name == *name);
            let candidate_matches = self.candidate_fork.as_ref().is_some_and(|fork| {
                fork.within_epoch_range(*epoch) && fork.name == *name
            });
            if !fixed_matches && !candidate_matches {
                return Err(ForksError::UnexpectedFork {
                    name: name.clone(),
                    epoch: *epoch,
                });
            }
        }
        Ok(())
    }
}
