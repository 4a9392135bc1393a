//! # create2_vanity
//!
//! Parallel CREATE2 vanity-salt miner.
//!
//! Searches for salts that make a factory contract deploy to an address
//! starting with a chosen byte pattern. The salt space is partitioned across
//! independent search units (one OS thread each), driven through bounded
//! batches and torn down the moment any unit reports a match.
//!
//! ## Architecture
//!
//! - `config`: search configuration parsing and validation
//! - `crypto`: Keccak-256 and CREATE2 address derivation
//! - `engine`: batch salt evaluation
//! - `model`: difficulty and completion-probability estimates
//! - `miner`: search units and the run coordinator

pub mod config;
pub mod crypto;
pub mod engine;
pub mod miner;
pub mod model;

pub use config::{ConfigError, RawSearchConfig, SearchConfig};
pub use engine::{BatchOutcome, EngineError, EngineFactory, FoundSalt, SaltEngine};
pub use miner::{
    CancelSignal, Coordinator, MinerEvent, RunSummary, StartError, StatusSnapshot,
};
