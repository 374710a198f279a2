use crate::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_PEER_TIMEOUT_MS, HASH_HEX_SIZE},
    error::LedgerError,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex characters a block hash must carry.
    pub difficulty: u32,
    /// Upper bound on nonces tried per block; `None` searches without limit.
    pub max_attempts: Option<u64>,
    /// Per-peer bound on a chain fetch during consensus.
    pub peer_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_attempts: None,
            peer_timeout: Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS),
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Rejects a difficulty no hash can meet.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty as usize > HASH_HEX_SIZE {
            return Err(LedgerError::UnreachableDifficulty {
                difficulty: self.difficulty,
                max: HASH_HEX_SIZE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_bound_example() {
        assert!(LedgerConfig::with_difficulty(0).validate().is_ok());
        assert!(LedgerConfig::with_difficulty(64).validate().is_ok());
        assert!(matches!(
            LedgerConfig::with_difficulty(65).validate(),
            Err(LedgerError::UnreachableDifficulty { difficulty: 65, max: 64 })
        ));
    }
}
