//! Batch salt evaluation.
//!
//! A search unit drives its engine through bounded batches; the engine owns
//! the per-unit seed state and advances it across calls. The production
//! engine is [`keccak::KeccakEngine`]; tests substitute scripted engines
//! through [`EngineFactory`].

mod keccak;

pub use keccak::{KeccakEngine, KeccakEngineFactory};

use thiserror::Error;

use crate::config::SearchConfig;

/// A salt that produced a matching address.
#[derive(Debug, Clone)]
pub struct FoundSalt {
    /// The full 32-byte salt, 0x-prefixed hex.
    pub salt: String,
    /// The derived address, EIP-55 checksummed.
    pub address: String,
    /// The pattern that was matched, 0x-prefixed hex.
    pub pattern: String,
}

/// Outcome of one batch evaluation.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Salt candidates consumed by this batch.
    pub attempts: u64,
    /// Matches found, usually empty.
    pub matches: Vec<FoundSalt>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine rejected the search configuration: {0}")]
    InvalidConfig(String),
    #[error("batch evaluation failed: {0}")]
    Batch(String),
}

/// One unit's view of the hash engine.
///
/// Implementations must be callable repeatedly, advancing whatever seed state
/// they track privately, and must fail with an [`EngineError`] rather than
/// panic on bad input.
pub trait SaltEngine: Send {
    fn evaluate_batch(&mut self, batch_size: u32) -> Result<BatchOutcome, EngineError>;
}

/// Builds one engine instance per search unit.
pub trait EngineFactory: Send {
    fn create(&self, config: &SearchConfig, seed: u32, unit_id: u32) -> Box<dyn SaltEngine>;
}
