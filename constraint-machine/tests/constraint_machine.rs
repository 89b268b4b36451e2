use {
    assert_matches::assert_matches,
    ledger_constraint_machine::{
        error::{AuthorizationError, FeeReserveError, ProcedureError, ResourceError},
        instruction::HEADER_FLAG_DISABLE_RESOURCE_ALLOC_AND_DESTROY,
        parse_txn,
        reducer::ReducerStateTag,
        store::{RawSubstate, SubstateStore},
        substate::*,
        ConstraintMachine, ConstraintMachineError, ConstraintMachineOutput, ExecutionContext,
        PermissionLevel, REEvent, RulesConfig, StateUpdateOp, TxLowLevelBuilder,
        VerificationError,
    },
    ledger_sdk::{ECKeyPair, ECPublicKey, REAddr, SubstateId, Txn},
    std::collections::{BTreeMap, HashMap, HashSet},
};

#[derive(Default)]
struct TestStore {
    ups: BTreeMap<SubstateId, Vec<u8>>,
    spent: HashSet<SubstateId>,
    virtual_downs: HashSet<SubstateId>,
    resources: HashMap<REAddr, Vec<u8>>,
}

impl TestStore {
    fn apply(&mut self, output: &ConstraintMachineOutput) {
        for update in output.state_updates.iter().flatten() {
            let id = update.substate.id.clone();
            match update.op {
                StateUpdateOp::Up => {
                    if let Particle::TokenResource(resource) = &update.substate.particle {
                        self.resources.insert(resource.addr, update.bytes.clone());
                    }
                    self.ups.insert(id, update.bytes.clone());
                }
                StateUpdateOp::Down if id.is_virtual() => {
                    self.virtual_downs.insert(id);
                }
                StateUpdateOp::Down => {
                    self.ups.remove(&id);
                    self.spent.insert(id);
                }
            }
        }
    }
}

impl SubstateStore for TestStore {
    fn load_substate(&self, id: &SubstateId) -> Option<Vec<u8>> {
        self.ups.get(id).cloned()
    }

    fn contains_substate(&self, id: &SubstateId) -> bool {
        self.ups.contains_key(id) || self.spent.contains(id)
    }

    fn load_resource(&self, addr: &REAddr) -> Option<Vec<u8>> {
        self.resources.get(addr).cloned()
    }

    fn verify_virtual_substate(&self, id: &SubstateId) -> Result<Vec<u8>, ResourceError> {
        if self.virtual_downs.contains(id) {
            return Err(ResourceError::VirtualSubstateAlreadyDown(id.clone()));
        }
        id.virtual_parent()
            .and_then(|parent| self.ups.get(&parent).cloned())
            .ok_or_else(|| ResourceError::VirtualParentNotFound(id.clone()))
    }

    fn open_indexed_cursor(
        &self,
        index: &SubstateIndex,
    ) -> Box<dyn Iterator<Item = RawSubstate> + '_> {
        let mut matching: Vec<_> = self
            .ups
            .iter()
            .filter(|(_, data)| index.matches(data))
            .map(|(id, data)| RawSubstate {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();
        matching.sort_by(|a, b| a.data.cmp(&b.data));
        Box::new(matching.into_iter())
    }
}

fn up_id(txn: &Txn, index: u32) -> SubstateId {
    SubstateId::of_substate(&txn.id(), index)
}

struct TestLedger {
    machine: ConstraintMachine,
    store: TestStore,
    alice: ECKeyPair,
    bob: ECKeyPair,
    validator: ECKeyPair,
    gold: REAddr,
    genesis: Txn,
}

// Genesis up indices.
const ALICE_TOKENS: u32 = 2;
const STAKE_DATA: u32 = 3;
const METADATA_PARENT: u32 = 4;
const EPOCH: u32 = 5;
const ROUND: u32 = 6;

impl TestLedger {
    fn new(config: RulesConfig) -> Self {
        let alice = ECKeyPair::from_seed(b"alice");
        let bob = ECKeyPair::from_seed(b"bob");
        let validator = ECKeyPair::from_seed(b"validator");
        let gold = REAddr::of_hashed_key(&alice.public_key(), "gold");

        let mut builder = TxLowLevelBuilder::new();
        builder
            .up(&TokenResource {
                addr: REAddr::NativeToken,
                is_mutable: false,
                owner: None,
            }
            .into())
            .end()
            .up(&TokenResource {
                addr: gold,
                is_mutable: true,
                owner: Some(alice.public_key()),
            }
            .into())
            .end()
            .up(&Tokens {
                resource: REAddr::NativeToken,
                holder: alice.public_key(),
                amount: 1_000,
            }
            .into())
            .end()
            .up(&ValidatorStakeData {
                validator: validator.public_key(),
                is_registered: true,
                total_stake: 100,
            }
            .into())
            .end()
            .up(&VirtualParent {
                child_type: SubstateTypeId::ValidatorSystemMetadata,
            }
            .into())
            .end()
            .up(&EpochData { epoch: 0 }.into())
            .end()
            .up(&RoundData {
                view: 0,
                timestamp: 0,
            }
            .into())
            .end();
        let genesis = builder.build();

        let mut ledger = Self {
            machine: config.constraint_machine().unwrap(),
            store: TestStore::default(),
            alice,
            bob,
            validator,
            gold,
            genesis: genesis.clone(),
        };
        ledger.commit(&genesis, PermissionLevel::System).unwrap();
        ledger
    }

    fn execute(
        &self,
        txn: &Txn,
        level: PermissionLevel,
    ) -> Result<ConstraintMachineOutput, ConstraintMachineError> {
        let parsed = parse_txn(txn).unwrap();
        let context = ExecutionContext::new(parsed.id(), txn.len(), level)
            .with_key(parsed.signed_by().copied())
            .with_resource_alloc_and_destroy_disabled(parsed.disable_resource_alloc_and_destroy());
        self.machine
            .verify(&self.store, context, parsed.instructions())
    }

    fn commit(
        &mut self,
        txn: &Txn,
        level: PermissionLevel,
    ) -> Result<ConstraintMachineOutput, ConstraintMachineError> {
        let output = self.execute(txn, level)?;
        self.store.apply(&output);
        Ok(output)
    }

    fn genesis_id(&self, index: u32) -> SubstateId {
        up_id(&self.genesis, index)
    }

    fn transfer(&self, signer: &ECKeyPair, to: ECPublicKey, amount: u128) -> Txn {
        let mut builder = TxLowLevelBuilder::new();
        builder
            .down(&self.genesis_id(ALICE_TOKENS))
            .up(&Tokens {
                resource: REAddr::NativeToken,
                holder: to,
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
        builder.sign_and_build(signer)
    }
}

fn error(result: Result<ConstraintMachineOutput, ConstraintMachineError>) -> VerificationError {
    result.unwrap_err().error
}

#[test]
fn test_transfer() {
    ledger_logger::setup();
    let mut ledger = TestLedger::new(RulesConfig::default());
    let txn = ledger.transfer(&ledger.alice, ledger.bob.public_key(), 300);
    let output = ledger.commit(&txn, PermissionLevel::User).unwrap();
    assert_eq!(output.state_updates.len(), 1);
    assert_eq!(output.state_updates[0].len(), 3);
    assert!(ledger.store.load_substate(&up_id(&txn, 0)).is_some());
    assert!(ledger
        .store
        .load_substate(&ledger.genesis_id(ALICE_TOKENS))
        .is_none());

    // The same input cannot be spent twice.
    let replay = ledger.transfer(&ledger.alice, ledger.bob.public_key(), 200);
    let err = ledger.execute(&replay, PermissionLevel::User).unwrap_err();
    assert_eq!(err.instruction_index, 0);
    assert_eq!(
        err.error,
        VerificationError::Resource(ResourceError::SubstateNotFound(
            ledger.genesis_id(ALICE_TOKENS)
        ))
    );
}

#[test]
fn test_stream_must_end_in_void_state() {
    let ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ALICE_TOKENS))
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.bob.public_key(),
            amount: 300,
        }
        .into());
    let txn = builder.sign_and_build(&ledger.alice);
    let err = ledger.execute(&txn, PermissionLevel::User).unwrap_err();
    assert_eq!(err.instruction_index, 3);
    assert_eq!(err.reducer_state, ReducerStateTag::TokenHoldingBucket);
    assert_eq!(
        err.error,
        VerificationError::UnterminatedState(ReducerStateTag::TokenHoldingBucket)
    );
}

#[test]
fn test_local_up_spent_in_same_txn() {
    let mut ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ALICE_TOKENS))
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.alice.public_key(),
            amount: 1_000,
        }
        .into())
        .end()
        .local_down(0)
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.bob.public_key(),
            amount: 1_000,
        }
        .into())
        .end();
    let txn = builder.sign_and_build(&ledger.alice);
    let output = ledger.commit(&txn, PermissionLevel::User).unwrap();

    let ops: Vec<_> = output
        .state_updates
        .iter()
        .flatten()
        .map(|update| (update.op, update.instruction_index))
        .collect();
    assert_eq!(
        ops,
        vec![
            (StateUpdateOp::Down, 0),
            (StateUpdateOp::Up, 1),
            (StateUpdateOp::Down, 3),
            (StateUpdateOp::Up, 4),
        ]
    );
    assert!(ledger.store.load_substate(&up_id(&txn, 0)).is_none());
    assert!(ledger.store.load_substate(&up_id(&txn, 1)).is_some());
}

#[test]
fn test_local_down_twice() {
    let ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ALICE_TOKENS))
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.alice.public_key(),
            amount: 1_000,
        }
        .into())
        .local_down(0)
        .local_down(0)
        .end();
    let txn = builder.sign_and_build(&ledger.alice);
    let err = ledger.execute(&txn, PermissionLevel::User).unwrap_err();
    assert_eq!(err.instruction_index, 3);
    assert_eq!(
        err.error,
        VerificationError::Resource(ResourceError::LocalSubstateNotFound(0))
    );
}

#[test]
fn test_spent_substate_cannot_be_booted_again() {
    let mut ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder
        .up(&Tokens {
            resource: ledger.gold,
            holder: ledger.bob.public_key(),
            amount: 5,
        }
        .into())
        .end();
    let mint = builder.sign_and_build(&ledger.alice);
    let coin = up_id(&mint, 0);
    ledger.commit(&mint, PermissionLevel::User).unwrap();

    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&coin)
        .up(&Tokens {
            resource: ledger.gold,
            holder: ledger.alice.public_key(),
            amount: 5,
        }
        .into())
        .end();
    let spend = builder.sign_and_build(&ledger.bob);
    ledger.commit(&spend, PermissionLevel::User).unwrap();
    assert!(ledger.store.load_substate(&coin).is_none());

    let err = ledger.execute(&mint, PermissionLevel::User).unwrap_err();
    assert_eq!(err.instruction_index, 0);
    assert_eq!(
        err.error,
        VerificationError::Resource(ResourceError::SubstateAlreadyExists(coin))
    );
}

#[test]
fn test_transfer_requires_holder_signature() {
    let ledger = TestLedger::new(RulesConfig::default());
    let txn = ledger.transfer(&ledger.bob, ledger.bob.public_key(), 300);
    assert_matches!(
        error(ledger.execute(&txn, PermissionLevel::User)),
        VerificationError::Authorization(AuthorizationError::IncorrectSigner { .. })
    );
}

#[test]
fn test_unbalanced_transfer() {
    let ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ALICE_TOKENS))
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.bob.public_key(),
            amount: 1_001,
        }
        .into())
        .end();
    let txn = builder.sign_and_build(&ledger.alice);
    assert_matches!(
        error(ledger.execute(&txn, PermissionLevel::User)),
        VerificationError::Procedure(ProcedureError::NotEnoughTokens {
            requested: 1_001,
            available: 1_000
        })
    );

    // Leftover native tokens cannot be burned.
    let mut builder = TxLowLevelBuilder::new();
    builder.down(&ledger.genesis_id(ALICE_TOKENS)).end();
    let txn = builder.sign_and_build(&ledger.alice);
    let err = ledger.execute(&txn, PermissionLevel::User).unwrap_err();
    assert_eq!(err.instruction_index, 1);
    assert_matches!(
        err.error,
        VerificationError::Procedure(ProcedureError::RemainderNotZero { amount: 1_000, .. })
    );
}

#[test]
fn test_next_round() {
    let mut ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ROUND))
        .up(&RoundData {
            view: 1,
            timestamp: 10,
        }
        .into())
        .end();
    let txn = builder.build();
    let output = ledger.commit(&txn, PermissionLevel::SuperUser).unwrap();
    assert_eq!(
        output.events,
        vec![REEvent::RoundUpdate {
            view: 1,
            timestamp: 10
        }]
    );

    // Views must strictly increase.
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&up_id(&txn, 0))
        .up(&RoundData {
            view: 1,
            timestamp: 20,
        }
        .into())
        .end();
    assert_matches!(
        error(ledger.execute(&builder.build(), PermissionLevel::SuperUser)),
        VerificationError::Procedure(ProcedureError::Invalid(_))
    );
}

#[test]
fn test_user_cannot_run_system_procedures() {
    let ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ROUND))
        .up(&RoundData {
            view: 1,
            timestamp: 10,
        }
        .into())
        .end();

    assert_matches!(
        error(ledger.execute(&builder.build(), PermissionLevel::User)),
        VerificationError::Authorization(AuthorizationError::InsufficientPermission { .. })
    );

    let signed = builder.clone().sign_and_build(&ledger.alice);
    assert_matches!(
        error(ledger.execute(&signed, PermissionLevel::SuperUser)),
        VerificationError::Authorization(AuthorizationError::SignedPrivilegedProcedure(
            PermissionLevel::SuperUser
        ))
    );
}

#[test]
fn test_missing_procedure_and_end() {
    let ledger = TestLedger::new(RulesConfig::default());
    let mut builder = TxLowLevelBuilder::new();
    builder.up(&EpochData { epoch: 9 }.into()).up(&EpochData { epoch: 10 }.into());
    let err = ledger
        .execute(&builder.build(), PermissionLevel::System)
        .unwrap_err();
    assert_eq!(err.instruction_index, 1);
    assert_matches!(err.error, VerificationError::MissingExpectedEnd);

    let mut builder = TxLowLevelBuilder::new();
    builder
        .up(&PreparedStake {
            owner: ledger.alice.public_key(),
            validator: ledger.validator.public_key(),
            amount: 1,
        }
        .into())
        .end();
    assert_matches!(
        error(ledger.execute(&builder.build(), PermissionLevel::System)),
        VerificationError::MissingProcedure(_)
    );
}

#[test]
fn test_trailing_substate_bytes() {
    let ledger = TestLedger::new(RulesConfig::default());
    let mut bytes = codec_bytes(&EpochData { epoch: 1 }.into());
    bytes.push(0);
    let mut payload = vec![0x02];
    payload.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    payload.extend_from_slice(&bytes);
    payload.push(0x00);
    assert_matches!(
        error(ledger.execute(&Txn::create(payload), PermissionLevel::System)),
        VerificationError::Deserialize(_)
    );
}

fn codec_bytes(particle: &Particle) -> Vec<u8> {
    ledger_constraint_machine::codec::serialize(particle)
}

#[test]
fn test_virtual_system_metadata() {
    let mut ledger = TestLedger::new(RulesConfig::default());
    let validator = ledger.validator.public_key();
    let id =
        SubstateId::of_virtual_substate(&ledger.genesis_id(METADATA_PARENT), validator.as_ref())
            .unwrap();
    let vote = ValidatorSystemMetadata {
        validator,
        data: [7u8; SYSTEM_METADATA_BYTES],
    };

    let mut builder = TxLowLevelBuilder::new();
    builder.virtual_down(&id).up(&vote.into()).end();
    let txn = builder.sign_and_build(&ledger.validator);
    let output = ledger.commit(&txn, PermissionLevel::User).unwrap();
    assert_eq!(
        output.events,
        vec![REEvent::SystemMetadataUpdated {
            validator,
            data: [7u8; SYSTEM_METADATA_BYTES]
        }]
    );

    let mut builder = TxLowLevelBuilder::new();
    builder.virtual_down(&id).up(&vote.into()).end();
    let txn = builder.sign_and_build(&ledger.validator);
    assert_matches!(
        error(ledger.execute(&txn, PermissionLevel::User)),
        VerificationError::Resource(ResourceError::VirtualSubstateAlreadyDown(_))
    );

    // Someone else cannot vote on the validator's behalf.
    let other = SubstateId::of_virtual_substate(
        &ledger.genesis_id(METADATA_PARENT),
        ledger.bob.public_key().as_ref(),
    )
    .unwrap();
    let mut builder = TxLowLevelBuilder::new();
    builder
        .virtual_down(&other)
        .up(&ValidatorSystemMetadata::empty(ledger.bob.public_key()).into())
        .end();
    let txn = builder.sign_and_build(&ledger.alice);
    assert_matches!(
        error(ledger.execute(&txn, PermissionLevel::User)),
        VerificationError::Authorization(AuthorizationError::IncorrectSigner { .. })
    );
}

#[test]
fn test_mint_and_burn() {
    let mut ledger = TestLedger::new(RulesConfig::default());
    let gold = ledger.gold;
    let mint = |signer: &ECKeyPair, flags: u8| {
        let mut builder = TxLowLevelBuilder::new();
        builder
            .header(0, flags)
            .up(&Tokens {
                resource: gold,
                holder: ledger.bob.public_key(),
                amount: 5,
            }
            .into())
            .end();
        builder.sign_and_build(signer)
    };

    assert_matches!(
        error(ledger.execute(&mint(&ledger.bob, 0), PermissionLevel::User)),
        VerificationError::Authorization(AuthorizationError::IncorrectSigner { .. })
    );
    assert_matches!(
        error(ledger.execute(
            &mint(&ledger.alice, HEADER_FLAG_DISABLE_RESOURCE_ALLOC_AND_DESTROY),
            PermissionLevel::User
        )),
        VerificationError::Procedure(ProcedureError::ResourceAllocationDisabled)
    );
    let txn = mint(&ledger.alice, 0);
    let output = ledger.commit(&txn, PermissionLevel::User).unwrap();
    assert_eq!(
        output.events,
        vec![REEvent::TokensMinted {
            resource: gold,
            amount: 5
        }]
    );

    // Bob holds the gold but only alice owns the resource.
    let burn = |signer: &ECKeyPair| {
        let mut builder = TxLowLevelBuilder::new();
        builder.down(&up_id(&txn, 0)).end();
        builder.sign_and_build(signer)
    };
    assert_matches!(
        error(ledger.execute(&burn(&ledger.bob), PermissionLevel::User)),
        VerificationError::Procedure(ProcedureError::RemainderNotZero { amount: 5, .. })
    );
}

#[test]
fn test_fee_is_paid_from_reserve() {
    let config = RulesConfig {
        fee_per_byte: 1,
        ..RulesConfig::default()
    };
    let ledger = TestLedger::new(config);

    let unpaid = ledger.transfer(&ledger.alice, ledger.bob.public_key(), 300);
    assert_matches!(
        error(ledger.execute(&unpaid, PermissionLevel::User)),
        VerificationError::FeeReserve(FeeReserveError::DefaultedSystemLoan(_))
    );

    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ALICE_TOKENS))
        .fee_reserve_put(500)
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.bob.public_key(),
            amount: 100,
        }
        .into())
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.alice.public_key(),
            amount: 400,
        }
        .into())
        .end();
    let txn = builder.sign_and_build(&ledger.alice);
    let output = ledger.execute(&txn, PermissionLevel::User).unwrap();
    assert_eq!(output.fee_receipt.fee_collected, 500);
}

#[test]
fn test_stake_and_epoch_change() {
    let config = RulesConfig {
        max_rounds: 1,
        min_stake: 10,
        ..RulesConfig::default()
    };
    let mut ledger = TestLedger::new(config);
    let validator = ledger.validator.public_key();

    // Alice stakes 50 to the validator.
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ALICE_TOKENS))
        .read(&ledger.genesis_id(STAKE_DATA))
        .up(&PreparedStake {
            owner: ledger.alice.public_key(),
            validator,
            amount: 50,
        }
        .into())
        .up(&Tokens {
            resource: REAddr::NativeToken,
            holder: ledger.alice.public_key(),
            amount: 950,
        }
        .into())
        .end();
    let stake_txn = builder.sign_and_build(&ledger.alice);
    let output = ledger.commit(&stake_txn, PermissionLevel::User).unwrap();
    assert_matches!(
        output.events.as_slice(),
        [REEvent::StakePrepared { amount: 50, .. }]
    );

    // Round 0 -> 1, which is the last round of the epoch.
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ROUND))
        .up(&RoundData {
            view: 1,
            timestamp: 5,
        }
        .into())
        .end();
    let round_txn = builder.build();
    ledger
        .commit(&round_txn, PermissionLevel::SuperUser)
        .unwrap();

    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&up_id(&round_txn, 0))
        .down(&ledger.genesis_id(EPOCH))
        .down_index(&SubstateIndex::of_type(SubstateTypeId::PreparedStake))
        .down(&ledger.genesis_id(STAKE_DATA))
        .up(&ValidatorStakeData {
            validator,
            is_registered: true,
            total_stake: 150,
        }
        .into())
        .read_index(&SubstateIndex::of_type(SubstateTypeId::ValidatorStakeData))
        .up(&EpochData { epoch: 1 }.into())
        .up(&RoundData {
            view: 0,
            timestamp: 6,
        }
        .into())
        .end();
    let output = ledger
        .commit(&builder.build(), PermissionLevel::SuperUser)
        .unwrap();
    let validator_set = output
        .events
        .iter()
        .find_map(|event| match event {
            REEvent::NextValidatorSet {
                epoch: 1,
                validator_set,
            } => Some(validator_set.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(validator_set.power(&validator), Some(150));
    assert!(ledger
        .store
        .open_indexed_cursor(&SubstateIndex::of_type(SubstateTypeId::PreparedStake))
        .next()
        .is_none());
}

#[test]
fn test_epoch_cannot_end_early() {
    let config = RulesConfig {
        max_rounds: 5,
        ..RulesConfig::default()
    };
    let ledger = TestLedger::new(config);
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ROUND))
        .down(&ledger.genesis_id(EPOCH))
        .end();
    let err = ledger
        .execute(&builder.build(), PermissionLevel::SuperUser)
        .unwrap_err();
    assert_eq!(err.instruction_index, 1);
    assert_matches!(
        err.error,
        VerificationError::Procedure(ProcedureError::Invalid(_))
    );
}

#[test]
fn test_stake_below_minimum() {
    let config = RulesConfig {
        min_stake: 100,
        ..RulesConfig::default()
    };
    let ledger = TestLedger::new(config);
    let mut builder = TxLowLevelBuilder::new();
    builder
        .down(&ledger.genesis_id(ALICE_TOKENS))
        .read(&ledger.genesis_id(STAKE_DATA))
        .up(&PreparedStake {
            owner: ledger.alice.public_key(),
            validator: ledger.validator.public_key(),
            amount: 99,
        }
        .into())
        .end();
    let txn = builder.sign_and_build(&ledger.alice);
    assert_matches!(
        error(ledger.execute(&txn, PermissionLevel::User)),
        VerificationError::Procedure(ProcedureError::Invalid(_))
    );
}
