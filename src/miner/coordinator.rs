//! Run lifecycle: unit fan-out, progress aggregation, teardown.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use num_bigint::BigUint;
use thiserror::Error;

use crate::config::{ConfigError, RawSearchConfig, SearchConfig};
use crate::engine::{EngineFactory, FoundSalt, KeccakEngineFactory};
use crate::model;

use super::signal::CancelSignal;
use super::unit::{
    derive_unit_seed, ProgressReport, SearchUnit, UnitAssignment, UnitCommand, UnitMessage,
};

/// Outbound events for the presentation layer.
#[derive(Debug, Clone)]
pub enum MinerEvent {
    Started {
        unit_count: usize,
        batch_size: u32,
        pattern_len: usize,
    },
    Status(StatusSnapshot),
    Found {
        unit_id: u32,
        results: Vec<FoundSalt>,
    },
    UnitFailed {
        unit_id: u32,
        error: String,
    },
    Stopped(RunSummary),
}

/// Run-wide statistics at the time of one progress report.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub elapsed: Duration,
    pub total_attempts: u64,
    /// Arithmetic mean of all units' last-known rates, attempts/second.
    pub aggregate_rate: f64,
    /// Estimated chance the run has already passed a match.
    pub probability: f64,
}

/// Final statistics, emitted once when every unit has halted.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub total_attempts: u64,
    pub matches: usize,
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Validation(#[from] ConfigError),
    #[error("a search is already running; stop it first")]
    AlreadyRunning,
}

/// Splits the per-round work budget evenly across units.
///
/// Even division keeps per-unit batch durations comparable, which keeps the
/// per-unit rate samples meaningful and bounds cancellation latency by a
/// single batch regardless of unit count.
pub fn split_batch_size(work_size: u32, unit_count: usize) -> u32 {
    let share = u64::from(work_size) / unit_count.max(1) as u64;
    share.max(1) as u32
}

/// Per-run statistics, owned exclusively by the aggregation loop. Units only
/// ever exchange messages with it, never touch it directly.
struct RunState {
    started_at: Instant,
    difficulty: BigUint,
    total_attempts: u64,
    unit_rates: Vec<f64>,
    matches: Vec<FoundSalt>,
    stopping: bool,
}

impl RunState {
    fn new(unit_count: usize, pattern_len: usize) -> Self {
        Self {
            started_at: Instant::now(),
            difficulty: model::difficulty(pattern_len),
            total_attempts: 0,
            unit_rates: vec![0.0; unit_count],
            matches: Vec::new(),
            stopping: false,
        }
    }

    fn apply_progress(&mut self, report: &ProgressReport) -> StatusSnapshot {
        self.total_attempts += report.attempts;
        let secs = report.elapsed.as_secs_f64();
        if secs > 0.0 {
            if let Some(rate) = self.unit_rates.get_mut(report.unit_id as usize) {
                *rate = report.attempts as f64 / secs;
            }
        }
        StatusSnapshot {
            elapsed: self.started_at.elapsed(),
            total_attempts: self.total_attempts,
            aggregate_rate: self.aggregate_rate(),
            probability: model::match_probability(self.total_attempts, &self.difficulty),
        }
    }

    /// Mean of the latest per-unit samples; units that have not reported yet
    /// count as zero. A deliberate smoothing choice, not a time-weighted
    /// average.
    fn aggregate_rate(&self) -> f64 {
        if self.unit_rates.is_empty() {
            return 0.0;
        }
        self.unit_rates.iter().sum::<f64>() / self.unit_rates.len() as f64
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            elapsed: self.started_at.elapsed(),
            total_attempts: self.total_attempts,
            matches: self.matches.len(),
        }
    }
}

/// Resources of a live run, released by `stop`.
struct ActiveRun {
    cancel: CancelSignal,
    command_txs: Vec<Sender<UnitCommand>>,
    units: Vec<JoinHandle<()>>,
    aggregator: Option<JoinHandle<()>>,
}

/// Creates search units, feeds them disjoint seed streams, merges their
/// progress into run statistics and tears everything down exactly once when
/// any unit reports a match.
pub struct Coordinator {
    unit_count: usize,
    engines: Box<dyn EngineFactory>,
    event_tx: Sender<MinerEvent>,
    run: Option<ActiveRun>,
}

impl Coordinator {
    /// A coordinator with the production Keccak engine. Returns the
    /// coordinator and the event stream observers should drain.
    pub fn new(unit_count: usize) -> (Self, Receiver<MinerEvent>) {
        Self::with_engine_factory(unit_count, Box::new(KeccakEngineFactory))
    }

    pub fn with_engine_factory(
        unit_count: usize,
        engines: Box<dyn EngineFactory>,
    ) -> (Self, Receiver<MinerEvent>) {
        let (event_tx, event_rx) = unbounded();
        (
            Self {
                unit_count: unit_count.max(1),
                engines,
                event_tx,
                run: None,
            },
            event_rx,
        )
    }

    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// True while a run handle is held, even if the search has internally
    /// finished; callers must `stop` before starting again.
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// A clone of the live run's cancel signal, e.g. for a Ctrl-C handler.
    pub fn cancel_signal(&self) -> Option<CancelSignal> {
        self.run.as_ref().map(|run| run.cancel.clone())
    }

    /// Validates the configuration and launches the search. Non-blocking:
    /// units and the aggregation loop run on their own threads and report
    /// through the event stream.
    pub fn start(&mut self, raw: &RawSearchConfig, base_seed: u32) -> Result<(), StartError> {
        if self.run.is_some() {
            return Err(StartError::AlreadyRunning);
        }
        let config = SearchConfig::parse(raw)?;

        let unit_count = self.unit_count;
        let batch_size = split_batch_size(config.work_size, unit_count);
        let cancel = CancelSignal::new();
        let state = RunState::new(unit_count, config.pattern_len());

        let _ = self.event_tx.send(MinerEvent::Started {
            unit_count,
            batch_size,
            pattern_len: config.pattern_len(),
        });
        log::info!(
            "starting search: {} unit(s), batch size {}, pattern {} byte(s)",
            unit_count,
            batch_size,
            config.pattern_len()
        );

        let (msg_tx, msg_rx) = unbounded();
        let mut command_txs = Vec::with_capacity(unit_count);
        let mut units = Vec::with_capacity(unit_count);

        for unit_index in 0..unit_count {
            let (cmd_tx, cmd_rx) = unbounded();
            command_txs.push(cmd_tx);

            let assignment = UnitAssignment {
                unit_id: unit_index as u32,
                seed: derive_unit_seed(base_seed, unit_index as u32),
                batch_size,
            };
            let engine = self
                .engines
                .create(&config, assignment.seed, assignment.unit_id);
            let msg_tx = msg_tx.clone();
            let cancel = cancel.clone();

            let handle = thread::Builder::new()
                .name(format!("search-unit-{}", unit_index))
                .spawn(move || {
                    let mut unit = SearchUnit::new(assignment, engine, cancel, cmd_rx, msg_tx);
                    unit.run();
                })
                .expect("spawn search unit");
            units.push(handle);
        }
        // The aggregation loop must see the channel close once every unit
        // halts, so no sender may outlive the units.
        drop(msg_tx);

        let aggregator = {
            let events = self.event_tx.clone();
            let cancel = cancel.clone();
            let command_txs = command_txs.clone();
            thread::Builder::new()
                .name("search-coordinator".into())
                .spawn(move || aggregate(msg_rx, events, state, command_txs, cancel))
                .expect("spawn aggregation thread")
        };

        self.run = Some(ActiveRun {
            cancel,
            command_txs,
            units,
            aggregator: Some(aggregator),
        });
        Ok(())
    }

    /// Halts every unit and releases the run's resources. Idempotent;
    /// calling it with no live run is a no-op.
    pub fn stop(&mut self) {
        let Some(mut run) = self.run.take() else {
            return;
        };
        run.cancel.set();
        for tx in &run.command_txs {
            let _ = tx.send(UnitCommand::Stop);
        }
        for handle in run.units.drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = run.aggregator.take() {
            let _ = handle.join();
        }
        log::info!("search stopped");
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single consumer of unit messages; serializing them here keeps the run
/// statistics consistent without locks. Exits, emitting `Stopped`, once every
/// unit has halted and dropped its sender.
fn aggregate(
    messages: Receiver<UnitMessage>,
    events: Sender<MinerEvent>,
    mut state: RunState,
    command_txs: Vec<Sender<UnitCommand>>,
    cancel: CancelSignal,
) {
    while let Ok(message) = messages.recv() {
        match message {
            UnitMessage::Progress(report) => {
                let snapshot = state.apply_progress(&report);
                let _ = events.send(MinerEvent::Status(snapshot));
            }
            UnitMessage::Found { unit_id, results } => {
                if state.stopping {
                    // First reporter already won; keep the extra results but
                    // do not tear down again.
                    log::info!(
                        "unit {} reported {} additional match(es) after stop",
                        unit_id,
                        results.len()
                    );
                    state.matches.extend(results);
                    continue;
                }
                state.stopping = true;
                cancel.set();
                for tx in &command_txs {
                    let _ = tx.send(UnitCommand::Stop);
                }
                log::info!("unit {} found {} match(es)", unit_id, results.len());
                state.matches.extend(results.iter().cloned());
                let _ = events.send(MinerEvent::Found { unit_id, results });
            }
            UnitMessage::Failed { unit_id, error } => {
                // One unit's failure never aborts its siblings.
                log::warn!("unit {} halted on engine error: {}", unit_id, error);
                let _ = events.send(MinerEvent::UnitFailed {
                    unit_id,
                    error: error.to_string(),
                });
            }
        }
    }
    let _ = events.send(MinerEvent::Stopped(state.summary()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BatchOutcome, EngineError, SaltEngine};

    fn valid_raw() -> RawSearchConfig {
        RawSearchConfig {
            factory: "0x".to_string() + &"11".repeat(20),
            caller: "0x".to_string() + &"22".repeat(20),
            codehash: "0x".to_string() + &"33".repeat(32),
            pattern: "0102".into(),
            work_size: 1_000_000,
        }
    }

    fn dummy_match() -> FoundSalt {
        FoundSalt {
            salt: "0xab".into(),
            address: "0xcd".into(),
            pattern: "0x0102".into(),
        }
    }

    /// Scripted engine: runs through its steps, then keeps reporting slow
    /// empty batches until cancelled.
    #[derive(Clone, Copy)]
    enum Step {
        Progress,
        Match,
        Fail,
    }

    struct ScriptedEngine {
        steps: Vec<Step>,
        cursor: usize,
    }

    impl SaltEngine for ScriptedEngine {
        fn evaluate_batch(&mut self, batch_size: u32) -> Result<BatchOutcome, EngineError> {
            thread::sleep(Duration::from_millis(1));
            let step = self
                .steps
                .get(self.cursor)
                .copied()
                .unwrap_or(Step::Progress);
            self.cursor += 1;
            match step {
                Step::Progress => Ok(BatchOutcome {
                    attempts: u64::from(batch_size),
                    matches: vec![],
                }),
                Step::Match => Ok(BatchOutcome {
                    attempts: u64::from(batch_size),
                    matches: vec![dummy_match()],
                }),
                Step::Fail => Err(EngineError::Batch("scripted failure".into())),
            }
        }
    }

    struct ScriptedFactory {
        scripts: Vec<Vec<Step>>,
    }

    impl EngineFactory for ScriptedFactory {
        fn create(&self, _: &SearchConfig, _: u32, unit_id: u32) -> Box<dyn SaltEngine> {
            let steps = self
                .scripts
                .get(unit_id as usize)
                .cloned()
                .unwrap_or_default();
            Box::new(ScriptedEngine { steps, cursor: 0 })
        }
    }

    fn scripted_coordinator(
        scripts: Vec<Vec<Step>>,
    ) -> (Coordinator, Receiver<MinerEvent>) {
        let unit_count = scripts.len();
        Coordinator::with_engine_factory(unit_count, Box::new(ScriptedFactory { scripts }))
    }

    /// Drains events until `Stopped` arrives or the timeout expires.
    fn drain_until_stopped(events: &Receiver<MinerEvent>) -> Vec<MinerEvent> {
        let mut seen = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            match events.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => {
                    let stopped = matches!(event, MinerEvent::Stopped(_));
                    seen.push(event);
                    if stopped {
                        return seen;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
        seen
    }

    #[test]
    fn batch_size_divides_evenly() {
        assert_eq!(split_batch_size(1_000_000, 4), 250_000);
    }

    #[test]
    fn batch_size_floors_remainders() {
        assert_eq!(split_batch_size(1_000_001, 4), 250_000);
        assert_eq!(split_batch_size(10, 3), 3);
    }

    #[test]
    fn batch_size_is_at_least_one() {
        assert_eq!(split_batch_size(3, 4), 1);
        assert_eq!(split_batch_size(1, 128), 1);
    }

    #[test]
    fn total_attempts_accumulates_monotonically() {
        let mut state = RunState::new(2, 2);
        for _ in 0..5 {
            let before = state.total_attempts;
            let snapshot = state.apply_progress(&ProgressReport {
                unit_id: 0,
                attempts: 1_000,
                elapsed: Duration::from_millis(100),
            });
            assert_eq!(snapshot.total_attempts, before + 1_000);
        }
        assert_eq!(state.total_attempts, 5_000);
    }

    #[test]
    fn aggregate_rate_counts_silent_units_as_zero() {
        // Unit 0 reports 1000 attempts in 500ms => 2000/s; with 4 units the
        // aggregate mean is 500/s.
        let mut state = RunState::new(4, 2);
        let snapshot = state.apply_progress(&ProgressReport {
            unit_id: 0,
            attempts: 1_000,
            elapsed: Duration::from_millis(500),
        });
        assert!((snapshot.aggregate_rate - 500.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_report_leaves_rate_untouched() {
        let mut state = RunState::new(1, 2);
        let snapshot = state.apply_progress(&ProgressReport {
            unit_id: 0,
            attempts: 1_000,
            elapsed: Duration::ZERO,
        });
        assert_eq!(snapshot.aggregate_rate, 0.0);
        assert_eq!(snapshot.total_attempts, 1_000);
    }

    #[test]
    fn probability_grows_with_attempts() {
        let mut state = RunState::new(1, 1);
        let first = state.apply_progress(&ProgressReport {
            unit_id: 0,
            attempts: 50,
            elapsed: Duration::from_millis(10),
        });
        let second = state.apply_progress(&ProgressReport {
            unit_id: 0,
            attempts: 50,
            elapsed: Duration::from_millis(10),
        });
        assert!(second.probability > first.probability);
    }

    #[test]
    fn start_rejects_invalid_config() {
        let (mut coordinator, _events) = scripted_coordinator(vec![vec![]]);
        let mut raw = valid_raw();
        raw.factory.pop(); // 39 hex chars
        let err = coordinator.start(&raw, 0).unwrap_err();
        assert!(matches!(err, StartError::Validation(_)));
        assert!(!coordinator.is_running());
    }

    #[test]
    fn start_while_running_is_rejected() {
        let (mut coordinator, _events) = scripted_coordinator(vec![vec![], vec![]]);
        coordinator.start(&valid_raw(), 0).unwrap();
        assert!(matches!(
            coordinator.start(&valid_raw(), 0),
            Err(StartError::AlreadyRunning)
        ));
        coordinator.stop();
        assert!(!coordinator.is_running());
        // A stopped coordinator accepts a new run.
        coordinator.start(&valid_raw(), 1).unwrap();
        coordinator.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut coordinator, _events) = scripted_coordinator(vec![vec![]]);
        coordinator.start(&valid_raw(), 0).unwrap();
        coordinator.stop();
        coordinator.stop();
        assert!(!coordinator.is_running());
    }

    #[test]
    fn match_halts_all_units_exactly_once() {
        // Unit 2 matches on its second batch; units 0, 1 and 3 keep mining
        // until the cancellation reaches them.
        let (mut coordinator, events) = scripted_coordinator(vec![
            vec![],
            vec![],
            vec![Step::Progress, Step::Match],
            vec![],
        ]);
        coordinator.start(&valid_raw(), 0).unwrap();
        let signal = coordinator.cancel_signal().unwrap();

        let seen = drain_until_stopped(&events);
        coordinator.stop();

        assert!(signal.is_set());
        let found: Vec<_> = seen
            .iter()
            .filter(|e| matches!(e, MinerEvent::Found { .. }))
            .collect();
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0], MinerEvent::Found { unit_id: 2, .. }));
        let stopped = seen.iter().filter(|e| matches!(e, MinerEvent::Stopped(_)));
        assert_eq!(stopped.count(), 1);
        assert!(!coordinator.is_running());
    }

    #[test]
    fn simultaneous_matches_cause_single_teardown() {
        let (mut coordinator, events) =
            scripted_coordinator(vec![vec![Step::Match], vec![Step::Match]]);
        coordinator.start(&valid_raw(), 0).unwrap();

        let seen = drain_until_stopped(&events);
        coordinator.stop();

        // Whichever unit reports second is logged, not re-emitted.
        let found = seen
            .iter()
            .filter(|e| matches!(e, MinerEvent::Found { .. }))
            .count();
        assert_eq!(found, 1);
        let summary = seen.iter().find_map(|e| match e {
            MinerEvent::Stopped(summary) => Some(summary.clone()),
            _ => None,
        });
        assert!(summary.unwrap().matches >= 1);
    }

    #[test]
    fn unit_failure_does_not_abort_siblings() {
        // Unit 0 fails immediately; unit 1 still completes the search.
        let (mut coordinator, events) = scripted_coordinator(vec![
            vec![Step::Fail],
            vec![Step::Progress, Step::Progress, Step::Match],
        ]);
        coordinator.start(&valid_raw(), 0).unwrap();

        let seen = drain_until_stopped(&events);
        coordinator.stop();

        assert!(seen
            .iter()
            .any(|e| matches!(e, MinerEvent::UnitFailed { unit_id: 0, .. })));
        assert!(seen
            .iter()
            .any(|e| matches!(e, MinerEvent::Found { unit_id: 1, .. })));
    }

    #[test]
    fn external_signal_stops_the_run() {
        let (mut coordinator, events) = scripted_coordinator(vec![vec![], vec![]]);
        coordinator.start(&valid_raw(), 0).unwrap();

        // A Ctrl-C handler would do exactly this.
        coordinator.cancel_signal().unwrap().set();

        let seen = drain_until_stopped(&events);
        coordinator.stop();
        assert!(seen.iter().any(|e| matches!(e, MinerEvent::Stopped(_))));
        assert!(!seen.iter().any(|e| matches!(e, MinerEvent::Found { .. })));
    }

    #[test]
    fn started_event_reports_division() {
        let (mut coordinator, events) = scripted_coordinator(vec![vec![], vec![], vec![], vec![]]);
        coordinator.start(&valid_raw(), 0).unwrap();
        let first = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            first,
            MinerEvent::Started {
                unit_count: 4,
                batch_size: 250_000,
                pattern_len: 2,
            }
        ));
        coordinator.stop();
    }
}
