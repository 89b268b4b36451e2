use {
    assert_matches::assert_matches,
    ledger_constraint_machine::{
        error::ResourceError,
        substate::{PreparedStake, Tokens, ValidatorSystemMetadata},
        PermissionLevel, REEvent, RulesConfig, TxLowLevelBuilder, ValidatorSet,
        VerificationError,
    },
    ledger_engine::{
        BatchVerifierError, CandidateForkConfig, EngineError, EngineStore, FixedEpochForkConfig,
        ForkConfig, ForksEpochStore, InMemoryEngineStore, LedgerProof, Threshold,
    },
    ledger_mempool::MempoolError,
    ledger_sdk::{ECKeyPair, REAddr, SubstateId, Txn},
    ledger_state_computer::{
        system_txn, ForkVoteStatus, Genesis, LedgerEvent, LedgerEventReceiver, PreparedBatch,
        StateComputer, StateComputerConfig, StateComputerError, GENESIS_FORK_NAME,
    },
};

const ALICE_TOKENS: u32 = 1;
const V2_STAKE: u32 = 3;
const METADATA_PARENT: u32 = 4;

struct TestNode {
    computer: StateComputer<InMemoryEngineStore>,
    events: LedgerEventReceiver,
    genesis: Txn,
    alice: ECKeyPair,
    validators: [ECKeyPair; 2],
    proof: LedgerProof,
}

impl TestNode {
    fn new(forks: Vec<ForkConfig>) -> Self {
        ledger_logger::setup();
        let alice = ECKeyPair::from_seed(b"alice");
        let validators = [ECKeyPair::from_seed(b"v1"), ECKeyPair::from_seed(b"v2")];
        let genesis = Genesis {
            timestamp: 0,
            validators: vec![
                (validators[0].public_key(), 100),
                (validators[1].public_key(), 50),
            ],
            balances: vec![(alice.public_key(), 1_000)],
        };

        let config = StateComputerConfig {
            forks,
            ..StateComputerConfig::default()
        };
        let (sender, events) = crossbeam_channel::unbounded();
        let computer = StateComputer::new(InMemoryEngineStore::new(), &config, sender).unwrap();
        computer.commit_genesis(&genesis).unwrap();

        Self {
            computer,
            events,
            genesis: genesis.txn(),
            alice,
            validators,
            proof: LedgerProof::genesis(0),
        }
    }

    fn genesis_id(&self, index: u32) -> SubstateId {
        SubstateId::of_substate(&self.genesis.id(), index)
    }

    fn events(&self) -> Vec<LedgerEvent> {
        self.events.try_iter().collect()
    }

    /// Alice sends `amount` of her genesis tokens to `to`.
    fn spend(&self, to: &[u8], amount: u128) -> Txn {
        let mut builder = TxLowLevelBuilder::new();
        builder
            .down(&self.genesis_id(ALICE_TOKENS))
            .up(&Tokens {
                resource: REAddr::NativeToken,
                holder: ECKeyPair::from_seed(to).public_key(),
                amount,
            }
            .into())
            .up(&Tokens {
                resource: REAddr::NativeToken,
                holder: self.alice.public_key(),
                amount: 1_000 - amount,
            }
            .into())
            .end();
        builder.sign_and_build(&self.alice)
    }

    fn stake_to_v2(&self, amount: u128) -> Txn {
        let mut builder = TxLowLevelBuilder::new();
        builder
            .down(&self.genesis_id(ALICE_TOKENS))
            .read(&self.genesis_id(V2_STAKE))
            .up(&PreparedStake {
                owner: self.alice.public_key(),
                validator: self.validators[1].public_key(),
                amount,
            }
            .into())
            .up(&Tokens {
                resource: REAddr::NativeToken,
                holder: self.alice.public_key(),
                amount: 1_000 - amount,
            }
            .into())
            .end();
        builder.sign_and_build(&self.alice)
    }

    fn vote_txn(&self, validator: usize, candidate: &CandidateForkConfig) -> Txn {
        let key = self.validators[validator].public_key();
        let parent = self.genesis_id(METADATA_PARENT);
        let mut builder = TxLowLevelBuilder::new();
        builder
            .virtual_down(&SubstateId::of_virtual_substate(&parent, key.as_ref()).unwrap())
            .up(&ValidatorSystemMetadata {
                validator: key,
                data: candidate.vote(&key),
            }
            .into())
            .end();
        builder.sign_and_build(&self.validators[validator])
    }

    fn proof_for(&self, batch: &PreparedBatch, view: u64, timestamp: u64) -> LedgerProof {
        let proof = self
            .proof
            .next(view, batch.prepared.len() as u64, timestamp);
        match &batch.next_validator_set {
            Some(validator_set) => proof.with_next_validator_set(validator_set.clone()),
            None => proof,
        }
    }

    fn prepare_and_commit(&mut self, proposed: &[Txn], view: u64, timestamp: u64) -> PreparedBatch {
        let batch = self
            .computer
            .prepare(&[], proposed, view, timestamp)
            .unwrap();
        let proof = self.proof_for(&batch, view, timestamp);
        self.computer.commit(&batch.txns(), proof.clone()).unwrap();
        self.proof = proof;
        batch
    }

    fn current_epoch(&self) -> u64 {
        system_txn::current_epoch(self.computer.engine().store()).unwrap()
    }
}

fn genesis_fork(max_rounds: u64) -> ForkConfig {
    ForkConfig::Fixed(FixedEpochForkConfig {
        name: GENESIS_FORK_NAME.to_string(),
        epoch: 0,
        rules: RulesConfig {
            max_rounds,
            ..RulesConfig::default()
        },
    })
}

fn candidate() -> CandidateForkConfig {
    CandidateForkConfig {
        name: "candidate".to_string(),
        min_epoch: 2,
        max_epoch: 10,
        thresholds: vec![Threshold {
            required_stake: 8_000,
            epochs_before_enacted: 1,
        }],
        rules: RulesConfig {
            max_rounds: 1,
            ..RulesConfig::default()
        },
    }
}

#[test]
fn test_genesis_is_committed_once() {
    let node = TestNode::new(vec![genesis_fork(10)]);
    assert_matches!(
        node.events().as_slice(),
        [LedgerEvent::LedgerUpdate { txns, proof }]
            if *txns == vec![node.genesis.clone()] && proof.current_fork() == GENESIS_FORK_NAME
    );
    assert_eq!(node.current_epoch(), 0);
    assert_eq!(
        node.computer.commit_genesis(&Genesis::default()),
        Err(StateComputerError::AlreadyInitialized)
    );
}

#[test]
fn test_mempool_txn_is_prepared_and_committed() {
    let mut node = TestNode::new(vec![genesis_fork(10)]);
    node.events();
    let txn = node.spend(b"bob", 10);
    node.computer.add_to_mempool(txn.clone()).unwrap();
    assert_eq!(
        node.events(),
        vec![LedgerEvent::MempoolAddSuccess { txn: txn.clone() }]
    );

    let proposed = node.computer.get_next_txns_from_mempool(&[]);
    assert_eq!(proposed, vec![txn.clone()]);
    let batch = node.prepare_and_commit(&proposed, 1, 10);
    assert_eq!(batch.prepared.len(), 2);
    assert_eq!(batch.prepared[0].level(), PermissionLevel::SuperUser);
    assert!(batch.prepared[1].is_user());
    assert!(batch.rejected.is_empty());
    assert!(!batch.is_epoch_change());

    assert_eq!(node.computer.mempool_size(), 0);
    assert_matches!(
        node.events().as_slice(),
        [LedgerEvent::LedgerUpdate { txns, proof }]
            if txns.len() == 2 && txns[1] == txn && proof.proof().state_version == 2
    );
    let round = system_txn::current_round(node.computer.engine().store()).unwrap();
    assert_eq!((round.view, round.timestamp), (1, 10));
}

#[test]
fn test_mempool_rejects_double_spend_of_committed_substate() {
    let mut node = TestNode::new(vec![genesis_fork(10)]);
    node.prepare_and_commit(&[node.spend(b"bob", 10)], 1, 10);
    node.events();

    let double_spend = node.spend(b"carol", 10);
    let result = node.computer.add_to_mempool(double_spend.clone());
    assert_matches!(
        &result,
        Err(MempoolError::Rejected(EngineError::Verification { error, .. }))
            if error.error == VerificationError::Resource(
                ResourceError::SubstateNotFound(node.genesis_id(ALICE_TOKENS))
            )
    );
    assert_eq!(node.computer.mempool_size(), 0);
    assert_eq!(
        node.events(),
        vec![LedgerEvent::MempoolAddFailure {
            txn: double_spend,
            error: result.unwrap_err(),
        }]
    );
}

#[test]
fn test_commit_evicts_conflicting_mempool_txns() {
    let mut node = TestNode::new(vec![genesis_fork(10)]);
    let pending = node.spend(b"bob", 10);
    node.computer.add_to_mempool(pending.clone()).unwrap();
    node.events();

    node.prepare_and_commit(&[node.spend(b"carol", 20)], 1, 10);
    assert_eq!(node.computer.mempool_size(), 0);
    let events = node.events();
    assert_matches!(
        events.as_slice(),
        [LedgerEvent::TxnsRemovedFromMempool { evictions }, LedgerEvent::LedgerUpdate { .. }]
            if evictions.len() == 1 && evictions[0].txn == pending
    );
}

#[test]
fn test_prepare_skips_invalid_proposed_txns() {
    let node = TestNode::new(vec![genesis_fork(10)]);
    node.events();
    let first = node.spend(b"bob", 10);
    let conflicting = node.spend(b"carol", 20);

    let batch = node
        .computer
        .prepare(&[], &[first.clone(), conflicting.clone()], 1, 10)
        .unwrap();
    assert_eq!(batch.txns()[1..], [first]);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].0, conflicting);
    assert_matches!(
        node.events().as_slice(),
        [LedgerEvent::InvalidProposedTxn { txn, .. }] if *txn == conflicting
    );
    // Preparing never touches committed state.
    assert_eq!(node.computer.last_proof().unwrap().proof(), &node.proof);
}

#[test]
fn test_prepare_respects_round_signature_limit() {
    let node = TestNode::new(vec![ForkConfig::Fixed(FixedEpochForkConfig {
        name: GENESIS_FORK_NAME.to_string(),
        epoch: 0,
        rules: RulesConfig {
            max_sigs_per_round: 1,
            ..RulesConfig::default()
        },
    })]);
    let vote = node.vote_txn(0, &candidate());
    let batch = node
        .computer
        .prepare(&[], &[node.spend(b"bob", 10), vote], 1, 10)
        .unwrap();
    assert_eq!(batch.prepared.len(), 2);
    assert!(batch.rejected.is_empty());
}

#[test]
fn test_prepare_fails_when_ancestors_do_not_reexecute() {
    let node = TestNode::new(vec![genesis_fork(10)]);
    let previous = [node.spend(b"bob", 10), node.spend(b"carol", 20)];
    let error = node.computer.prepare(&previous, &[], 2, 10).unwrap_err();
    assert_matches!(
        error,
        StateComputerError::PreparedTxnReexecutionFailed(EngineError::Verification {
            index: 1,
            ..
        })
    );
    assert!(error.is_byzantine());
}

#[test]
fn test_prepare_on_top_of_uncommitted_ancestors() {
    let node = TestNode::new(vec![genesis_fork(10)]);
    let first = node.computer.prepare(&[], &[], 1, 10).unwrap();
    let second = node
        .computer
        .prepare(&first.txns(), &[node.spend(b"bob", 10)], 2, 20)
        .unwrap();
    assert_eq!(second.prepared.len(), 2);
    assert_eq!(
        second.prepared[0].events(),
        &[REEvent::RoundUpdate {
            view: 2,
            timestamp: 20,
        }]
    );
}

#[test]
fn test_epoch_change_applies_prepared_stake() {
    let mut node = TestNode::new(vec![genesis_fork(2)]);
    node.prepare_and_commit(&[node.stake_to_v2(50)], 1, 10);
    node.events();

    // View 3 is past the epoch's last round; user txns wait for the next
    // epoch.
    let batch = node.prepare_and_commit(&[node.spend(b"bob", 10)], 3, 20);
    let expected = ValidatorSet::new([
        (node.validators[0].public_key(), 100),
        (node.validators[1].public_key(), 100),
    ]);
    assert_eq!(batch.prepared.len(), 1);
    assert_eq!(batch.next_validator_set, Some(expected.clone()));

    assert_eq!(node.current_epoch(), 1);
    let round = system_txn::current_round(node.computer.engine().store()).unwrap();
    assert_eq!((round.view, round.timestamp), (0, 20));
    assert_matches!(
        node.events().as_slice(),
        [
            LedgerEvent::EpochChange { epoch: 1, validator_set },
            LedgerEvent::LedgerUpdate { proof, .. },
        ] if *validator_set == expected && proof.proof().resulting_epoch() == 1
    );
    assert_eq!(
        node.computer.last_proof().unwrap().validators_system_metadata().map(<[_]>::len),
        Some(2)
    );
}

#[test]
fn test_byzantine_validator_set_persists_nothing() {
    let node = TestNode::new(vec![genesis_fork(2)]);
    node.events();
    let before = node.computer.last_proof();

    let batch = node.computer.prepare(&[], &[], 3, 10).unwrap();
    assert!(batch.is_epoch_change());
    let forged = ValidatorSet::new([(node.validators[0].public_key(), 100)]);
    let proof = node.proof.next(3, 1, 10).with_next_validator_set(forged);
    let error = node.computer.commit(&batch.txns(), proof).unwrap_err();
    assert_matches!(
        &error,
        StateComputerError::ByzantineQuorum(EngineError::BatchVerifier(
            BatchVerifierError::ValidatorSetMismatch { .. }
        ))
    );
    assert!(error.is_byzantine());
    assert_eq!(node.computer.last_proof(), before);
    assert_eq!(node.current_epoch(), 0);
    assert!(node.events().is_empty());
}

#[test]
fn test_committing_invalid_txn_is_byzantine() {
    let node = TestNode::new(vec![genesis_fork(10)]);
    let txns = [node.spend(b"bob", 10), node.spend(b"carol", 10)];
    let error = node
        .computer
        .commit(&txns, node.proof.next(1, 2, 10))
        .unwrap_err();
    assert_matches!(
        error,
        StateComputerError::CommittedBadTxn(EngineError::Verification { index: 1, .. })
    );
    assert_eq!(node.computer.mempool_size(), 0);
}

#[test]
fn test_recommitting_a_batch_is_byzantine() {
    let mut node = TestNode::new(vec![genesis_fork(10)]);
    let batch = node.prepare_and_commit(&[node.spend(b"bob", 10)], 1, 10);
    node.events();
    let before = node.computer.last_proof();

    let error = node
        .computer
        .commit(&batch.txns(), node.proof.next(2, 2, 20))
        .unwrap_err();
    assert_matches!(
        error,
        StateComputerError::CommittedBadTxn(EngineError::AlreadyCommitted { index: 0, .. })
    );
    assert_eq!(node.computer.last_proof(), before);
    assert!(node.events().is_empty());
}

#[test]
fn test_fixed_fork_switches_rules_and_survives_restart() {
    let forks = vec![
        genesis_fork(1),
        ForkConfig::Fixed(FixedEpochForkConfig {
            name: "next".to_string(),
            epoch: 2,
            rules: RulesConfig {
                max_rounds: 1,
                max_sigs_per_round: 7,
                ..RulesConfig::default()
            },
        }),
    ];
    let mut node = TestNode::new(forks.clone());
    node.prepare_and_commit(&[], 2, 10);
    assert_eq!(node.current_epoch(), 1);
    assert_ne!(node.computer.engine().rules().config().max_sigs_per_round, 7);

    node.prepare_and_commit(&[], 2, 20);
    assert_eq!(node.current_epoch(), 2);
    assert_eq!(node.computer.engine().rules().config().max_sigs_per_round, 7);
    assert_eq!(
        node.computer.last_proof().unwrap().next_fork(),
        Some("next")
    );

    let config = StateComputerConfig {
        forks,
        ..StateComputerConfig::default()
    };
    let (sender, _events) = crossbeam_channel::unbounded();
    let restarted = StateComputer::new(node.computer.into_store(), &config, sender).unwrap();
    assert_eq!(restarted.engine().rules().config().max_sigs_per_round, 7);
    assert_eq!(
        restarted
            .forks()
            .current_fork(&restarted.engine().store().stored_forks()),
        "next"
    );
}

#[test]
fn test_fork_vote_status() {
    let candidate = candidate();
    let mut node = TestNode::new(vec![
        genesis_fork(1),
        ForkConfig::Candidate(candidate.clone()),
    ]);
    let v1 = node.validators[0].public_key();
    let v2 = node.validators[1].public_key();
    assert_eq!(
        node.computer.fork_vote_status(&v1),
        Ok(ForkVoteStatus::VoteRequired)
    );
    assert_eq!(node.computer.candidate_fork_remaining_epochs(), None);

    node.prepare_and_commit(
        &[node.vote_txn(0, &candidate), node.vote_txn(1, &candidate)],
        1,
        10,
    );
    assert_eq!(
        node.computer.fork_vote_status(&v1),
        Ok(ForkVoteStatus::NoActionNeeded)
    );
    assert_eq!(
        node.computer.fork_vote_status(&v2),
        Ok(ForkVoteStatus::NoActionNeeded)
    );
    // Still cached for epoch 0.
    assert_eq!(node.computer.candidate_fork_remaining_epochs(), None);

    node.prepare_and_commit(&[], 2, 20);
    assert_eq!(node.current_epoch(), 1);
    assert_eq!(node.computer.candidate_fork_remaining_epochs(), Some(1));
    assert_eq!(
        node.computer
            .engine()
            .store()
            .fork_voting_results(0, 2, &candidate.id())
            .len(),
        1
    );
}

#[test]
fn test_restart_rejects_unknown_stored_fork() {
    let mut node = TestNode::new(vec![genesis_fork(1)]);
    node.prepare_and_commit(&[], 2, 10);
    let mut store = node.computer.into_store();
    store.store_fork(1, "unknown");

    let config = StateComputerConfig {
        forks: vec![genesis_fork(1)],
        ..StateComputerConfig::default()
    };
    let (sender, _events) = crossbeam_channel::unbounded();
    assert_matches!(
        StateComputer::new(store, &config, sender),
        Err(StateComputerError::Forks(_))
    );
}
