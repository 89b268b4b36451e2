use {
    crate::{
        post_processor::{
            CandidateForkVotesPostProcessor, PostProcessor, ValidatorSystemMetadataPostProcessor,
        },
        verifier::{BatchVerifier, EpochProofVerifier},
    },
    ledger_constraint_machine::{procedure::ProcedureRegistryError, ConstraintMachine, RulesConfig},
    std::{fmt, sync::Arc},
};

/// Everything that changes between forks: the configured constraint
/// machine, the batch verifier and the post-processor chain.
#[derive(Clone)]
pub struct EngineRules {
    config: RulesConfig,
    machine: ConstraintMachine,
    batch_verifier: Arc<dyn BatchVerifier>,
    post_processors: Vec<Arc<dyn PostProcessor>>,
}

impl EngineRules {
    pub fn new(config: &RulesConfig) -> Result<Self, ProcedureRegistryError> {
        Ok(Self {
            config: config.clone(),
            machine: config.constraint_machine()?,
            batch_verifier: Arc::new(EpochProofVerifier),
            post_processors: vec![
                Arc::new(ValidatorSystemMetadataPostProcessor),
                Arc::new(CandidateForkVotesPostProcessor),
            ],
        })
    }

    /// Appends a post-processor; it sees the output of every earlier one.
    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processors.push(post_processor);
        self
    }

    pub fn with_batch_verifier(self, batch_verifier: Arc<dyn BatchVerifier>) -> Self {
        Self {
            batch_verifier,
            ..self
        }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub fn machine(&self) -> &ConstraintMachine {
        &self.machine
    }

    pub fn batch_verifier(&self) -> &dyn BatchVerifier {
        self.batch_verifier.as_ref()
    }

    pub fn post_processors(&self) -> &[Arc<dyn PostProcessor>] {
        &self.post_processors
    }
}

impl fmt::Debug for EngineRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRules")
            .field("config", &self.config)
            .field(
                "post_processors",
                &self
                    .post_processors
                    .iter()
                    .map(|post_processor| post_processor.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
