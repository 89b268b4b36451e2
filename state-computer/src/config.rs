use {
    crate::error::ConfigError,
    ledger_constraint_machine::RulesConfig,
    ledger_engine::{FixedEpochForkConfig, ForkConfig, Forks},
    ledger_mempool::MempoolConfig,
    serde_derive::{Deserialize, Serialize},
    std::{fs, path::Path},
};

pub const GENESIS_FORK_NAME: &str = "genesis";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateComputerConfig {
    pub mempool: MempoolConfig,
    /// Every fork the node knows about. The rules of each fork live with
    /// the fork.
    pub forks: Vec<ForkConfig>,
}

impl Default for StateComputerConfig {
    fn default() -> Self {
        Self {
            mempool: MempoolConfig::default(),
            forks: vec![ForkConfig::Fixed(FixedEpochForkConfig {
                name: GENESIS_FORK_NAME.to_string(),
                epoch: 0,
                rules: RulesConfig::default(),
            })],
        }
    }
}

impl StateComputerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.forks()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn forks(&self) -> Result<Forks, ConfigError> {
        Ok(Forks::create(self.forks.clone())?)
    }
}
