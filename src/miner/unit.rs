//! Search unit: one batch loop against the hash engine.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::engine::{EngineError, FoundSalt, SaltEngine};

use super::signal::CancelSignal;

/// Gap between consecutive unit seeds, large enough that the engines'
/// pseudo-random streams do not overlap for realistic unit counts.
pub const SEED_STRIDE: u32 = 9973;

/// Derives the seed for one unit from a run-wide base seed.
///
/// Pure so tests can pin the base seed; the wall clock only enters at the
/// CLI boundary.
pub fn derive_unit_seed(base_seed: u32, unit_index: u32) -> u32 {
    base_seed.wrapping_add(unit_index.wrapping_mul(SEED_STRIDE))
}

/// Work handed to one unit at run start.
#[derive(Debug, Clone, Copy)]
pub struct UnitAssignment {
    pub unit_id: u32,
    pub seed: u32,
    pub batch_size: u32,
}

/// Emitted once per completed non-matching batch.
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub unit_id: u32,
    /// Salt candidates consumed by the batch.
    pub attempts: u64,
    /// Wall time of the engine call.
    pub elapsed: Duration,
}

/// Messages a unit sends to the coordinator.
#[derive(Debug)]
pub enum UnitMessage {
    Progress(ProgressReport),
    Found {
        unit_id: u32,
        results: Vec<FoundSalt>,
    },
    Failed {
        unit_id: u32,
        error: EngineError,
    },
}

/// Commands the coordinator sends to a unit.
#[derive(Debug, Clone, Copy)]
pub enum UnitCommand {
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Active,
    Halted,
}

/// One independent search loop. Runs on its own thread; between batches it
/// checks the shared cancel signal and its command inbox, so stop latency is
/// at most one batch.
pub struct SearchUnit {
    assignment: UnitAssignment,
    engine: Box<dyn SaltEngine>,
    cancel: CancelSignal,
    commands: Receiver<UnitCommand>,
    messages: Sender<UnitMessage>,
    state: UnitState,
}

impl SearchUnit {
    pub fn new(
        assignment: UnitAssignment,
        engine: Box<dyn SaltEngine>,
        cancel: CancelSignal,
        commands: Receiver<UnitCommand>,
        messages: Sender<UnitMessage>,
    ) -> Self {
        Self {
            assignment,
            engine,
            cancel,
            commands,
            messages,
            state: UnitState::Idle,
        }
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Runs the batch loop until cancelled, failed, or a match is found.
    ///
    /// A match sets the shared cancel signal before the result is reported,
    /// so sibling units begin halting even if the coordinator is busy.
    pub fn run(&mut self) {
        let unit_id = self.assignment.unit_id;
        self.state = UnitState::Active;

        loop {
            if self.cancel.is_set() || matches!(self.commands.try_recv(), Ok(UnitCommand::Stop)) {
                break;
            }

            let started = Instant::now();
            let outcome = self.engine.evaluate_batch(self.assignment.batch_size);
            let elapsed = started.elapsed();

            match outcome {
                Err(error) => {
                    log::debug!("unit {} engine failure: {}", unit_id, error);
                    let _ = self.messages.send(UnitMessage::Failed { unit_id, error });
                    break;
                }
                Ok(outcome) if !outcome.matches.is_empty() => {
                    self.cancel.set();
                    let _ = self.messages.send(UnitMessage::Found {
                        unit_id,
                        results: outcome.matches,
                    });
                    break;
                }
                Ok(outcome) => {
                    let _ = self.messages.send(UnitMessage::Progress(ProgressReport {
                        unit_id,
                        attempts: outcome.attempts,
                        elapsed,
                    }));
                }
            }

            thread::yield_now();
        }

        self.state = UnitState::Halted;
    }
}
