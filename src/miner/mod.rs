//! Search units and the run coordinator.
//!
//! This module owns the whole run lifecycle:
//! - fan-out of per-unit assignments to dedicated OS threads
//! - progress aggregation into run-wide statistics
//! - cooperative cancellation the moment any unit finds a match

mod coordinator;
mod signal;
mod unit;

pub use coordinator::{
    split_batch_size, Coordinator, MinerEvent, RunSummary, StartError, StatusSnapshot,
};
pub use signal::CancelSignal;
pub use unit::{
    derive_unit_seed, ProgressReport, SearchUnit, UnitAssignment, UnitCommand, UnitMessage,
    UnitState, SEED_STRIDE,
};
