use serde_derive::{Deserialize, Serialize};

pub const DEFAULT_MAX_MEMPOOL_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MempoolConfig {
    pub max_size: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_MEMPOOL_SIZE,
        }
    }
}
