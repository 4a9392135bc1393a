//! CPU Keccak-256 batch evaluator.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{SearchConfig, MAX_PATTERN_BYTES};
use crate::crypto::{assemble_salt, checksum_address, create2_address};

use super::{BatchOutcome, EngineError, EngineFactory, FoundSalt, SaltEngine};

/// Evaluates salt batches by direct CREATE2 derivation.
///
/// Each batch seeds a fresh ChaCha8 stream from `seed ^ unit_id`, draws a
/// 4-byte segment and a random starting nonce, then steps the nonce through
/// `batch_size` candidates. The seed advances by one per batch so successive
/// batches explore different regions.
pub struct KeccakEngine {
    config: SearchConfig,
    unit_id: u32,
    seed: u64,
}

impl KeccakEngine {
    pub fn new(config: SearchConfig, seed: u32, unit_id: u32) -> Self {
        Self {
            config,
            unit_id,
            seed: u64::from(seed),
        }
    }
}

impl SaltEngine for KeccakEngine {
    fn evaluate_batch(&mut self, batch_size: u32) -> Result<BatchOutcome, EngineError> {
        let pattern = &self.config.pattern;
        if pattern.is_empty() || pattern.len() > MAX_PATTERN_BYTES {
            return Err(EngineError::InvalidConfig(format!(
                "pattern must be 1..={} bytes, got {}",
                MAX_PATTERN_BYTES,
                pattern.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ u64::from(self.unit_id));
        let segment: [u8; 4] = rng.gen();
        let start_nonce: u64 = rng.gen();

        let mut matches = Vec::new();
        for i in 0..batch_size {
            let nonce = start_nonce.wrapping_add(u64::from(i)).to_le_bytes();
            let salt = assemble_salt(&self.config.caller, &segment, &nonce);
            let address = create2_address(&self.config.factory, &salt, &self.config.init_code_hash);

            if address.starts_with(pattern) {
                matches.push(FoundSalt {
                    salt: format!("0x{}", hex::encode(salt)),
                    address: checksum_address(&address),
                    pattern: format!("0x{}", hex::encode(pattern)),
                });
            }
        }

        self.seed = self.seed.wrapping_add(1);

        Ok(BatchOutcome {
            attempts: u64::from(batch_size),
            matches,
        })
    }
}

/// Default factory: one [`KeccakEngine`] per unit.
pub struct KeccakEngineFactory;

impl EngineFactory for KeccakEngineFactory {
    fn create(&self, config: &SearchConfig, seed: u32, unit_id: u32) -> Box<dyn SaltEngine> {
        Box::new(KeccakEngine::new(config.clone(), seed, unit_id))
    }
}
