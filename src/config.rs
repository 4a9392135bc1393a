//! Search configuration parsing and validation.

use thiserror::Error;

/// Addresses are 20 bytes, so a pattern can never be longer.
pub const MAX_PATTERN_BYTES: usize = 20;

/// Salt candidates evaluated per round across all units (0x4400000).
pub const DEFAULT_WORK_SIZE: u32 = 0x0440_0000;

/// Unvalidated configuration as received from the CLI or another front-end.
///
/// All hex fields accept an optional `0x`/`0X` prefix.
#[derive(Debug, Clone)]
pub struct RawSearchConfig {
    pub factory: String,
    pub caller: String,
    pub codehash: String,
    pub pattern: String,
    pub work_size: u32,
}

/// A validated search configuration. Immutable once a run starts.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Deployer factory address.
    pub factory: [u8; 20],
    /// Caller address, embedded as the first 20 bytes of every salt.
    pub caller: [u8; 20],
    /// keccak256 of the contract init code.
    pub init_code_hash: [u8; 32],
    /// Bytes the derived address must start with (1..=20).
    pub pattern: Vec<u8>,
    /// Salt candidates per round, split evenly across units.
    pub work_size: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be {expected} hex characters, got {actual}")]
    BadFieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{field} is not valid hex: '{value}'")]
    InvalidHex { field: &'static str, value: String },
    #[error("pattern cannot be empty")]
    EmptyPattern,
    #[error("pattern is too long ({0} bytes), addresses are only 20 bytes")]
    PatternTooLong(usize),
    #[error("work size must be at least 1")]
    ZeroWorkSize,
}

impl SearchConfig {
    /// Validates a raw configuration and parses it into byte form.
    ///
    /// Fails fast on the first violation: factory, caller, codehash length
    /// and hex validity, then pattern emptiness and length, then work size.
    pub fn parse(raw: &RawSearchConfig) -> Result<Self, ConfigError> {
        let factory = parse_fixed_hex::<20>(&raw.factory, "factory")?;
        let caller = parse_fixed_hex::<20>(&raw.caller, "caller")?;
        let init_code_hash = parse_fixed_hex::<32>(&raw.codehash, "codehash")?;
        let pattern = parse_pattern(&raw.pattern)?;
        if raw.work_size == 0 {
            return Err(ConfigError::ZeroWorkSize);
        }

        Ok(Self {
            factory,
            caller,
            init_code_hash,
            pattern,
            work_size: raw.work_size,
        })
    }

    /// Pattern length in bytes.
    pub fn pattern_len(&self) -> usize {
        self.pattern.len()
    }
}

fn strip_0x(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

fn parse_fixed_hex<const N: usize>(
    input: &str,
    field: &'static str,
) -> Result<[u8; N], ConfigError> {
    let stripped = strip_0x(input);
    if stripped.len() != N * 2 {
        return Err(ConfigError::BadFieldLength {
            field,
            expected: N * 2,
            actual: stripped.len(),
        });
    }
    let bytes = hex::decode(stripped).map_err(|_| ConfigError::InvalidHex {
        field,
        value: input.to_string(),
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn parse_pattern(input: &str) -> Result<Vec<u8>, ConfigError> {
    let stripped = strip_0x(input);
    if stripped.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    let bytes = hex::decode(stripped).map_err(|_| ConfigError::InvalidHex {
        field: "pattern",
        value: input.to_string(),
    })?;
    if bytes.len() > MAX_PATTERN_BYTES {
        return Err(ConfigError::PatternTooLong(bytes.len()));
    }
    Ok(bytes)
}
