use {
    crate::{error::StateComputerError, system_txn},
    ledger_engine::{EngineStore, Forks},
    ledger_sdk::ECPublicKey,
    log::*,
    std::sync::{Arc, Mutex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkVoteStatus {
    VoteRequired,
    NoActionNeeded,
}

/// Answers whether a validator still has to vote for the candidate fork,
/// and how far the candidate is from being enacted.
#[derive(Debug)]
pub struct ForkVoteStatusService {
    forks: Arc<Forks>,
    /// Remaining epochs for the candidate, as of the cached epoch.
    remaining_epochs: Mutex<Option<(u64, Option<u64>)>>,
}

impl ForkVoteStatusService {
    pub fn new(forks: Arc<Forks>) -> Self {
        Self {
            forks,
            remaining_epochs: Mutex::new(None),
        }
    }

    fn current_epoch<S: EngineStore + ?Sized>(store: &S) -> u64 {
        store
            .last_proof()
            .map(|proof| proof.proof().resulting_epoch())
            .unwrap_or_default()
    }

    /// Epochs until the candidate fork can be enacted at the earliest.
    /// Only recomputed once the ledger has moved to a new epoch.
    pub fn candidate_fork_remaining_epochs<S: EngineStore + ?Sized>(
        &self,
        store: &S,
    ) -> Option<u64> {
        let epoch = Self::current_epoch(store);
        let mut cache = self.remaining_epochs.lock().unwrap();
        match *cache {
            Some((cached_epoch, remaining)) if cached_epoch >= epoch => remaining,
            _ => {
                let remaining = self
                    .forks
                    .calculate_candidate_fork_remaining_epochs(store, epoch);
                debug!("candidate fork remaining epochs at epoch {epoch}: {remaining:?}");
                *cache = Some((epoch, remaining));
                remaining
            }
        }
    }

    pub fn fork_vote_status<S: EngineStore>(
        &self,
        validator: &ECPublicKey,
        store: &S,
    ) -> Result<ForkVoteStatus, StateComputerError> {
        let Some(candidate) = self.forks.candidate_fork() else {
            return Ok(ForkVoteStatus::NoActionNeeded);
        };
        if self.forks.current_fork(&store.stored_forks()) == candidate.name {
            return Ok(ForkVoteStatus::NoActionNeeded);
        }
        let metadata = system_txn::validator_system_metadata(store, validator)?;
        Ok(if metadata.data == candidate.vote(validator) {
            ForkVoteStatus::NoActionNeeded
        } else {
            ForkVoteStatus::VoteRequired
        })
    }
}
