//! CREATE2 vanity salt miner CLI.
//!
//! Usage:
//!   create2_vanity --factory 0x00..97 --caller 0xd8..45 \
//!       --codehash 0x64..07 --pattern 010101

use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;

use create2_vanity::config::DEFAULT_WORK_SIZE;
use create2_vanity::{model, Coordinator, MinerEvent, RawSearchConfig, SearchConfig};

mod display;

use display::{format_count, group_digits, StatusBoard};

/// CREATE2 Vanity Salt Miner
///
/// Searches salts until the factory's CREATE2-derived deployment address
/// starts with the given byte pattern.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Deployer factory address (20 bytes, hex with or without 0x)
    #[arg(short, long)]
    factory: String,

    /// Caller address, embedded in every salt to prevent frontrunning
    #[arg(short, long)]
    caller: String,

    /// keccak256 of the contract init code (32 bytes hex)
    #[arg(short = 'i', long)]
    codehash: String,

    /// Hex byte pattern the address must start with (e.g. '010101')
    #[arg(short, long)]
    pattern: String,

    /// Salt candidates per round, split evenly across units
    #[arg(short, long, default_value_t = DEFAULT_WORK_SIZE)]
    worksize: u32,

    /// Number of search units (default: number of CPU cores)
    #[arg(short, long)]
    units: Option<usize>,

    /// Event poll interval in milliseconds
    #[arg(short, long, default_value = "500")]
    refresh_ms: u64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let raw = RawSearchConfig {
        factory: cli.factory,
        caller: cli.caller,
        codehash: cli.codehash,
        pattern: cli.pattern,
        work_size: cli.worksize,
    };

    let config = match SearchConfig::parse(&raw) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let unit_count = cli.units.unwrap_or_else(num_cpus::get);
    let difficulty = model::difficulty(config.pattern_len());
    let median = model::median_attempts(&difficulty);

    println!("CREATE2 Vanity Salt Miner");
    println!("=========================");
    println!("Pattern:    0x{} ({} bytes)", hex::encode(&config.pattern), config.pattern_len());
    println!("Difficulty: 1 in {}", group_digits(&difficulty));
    println!("Median:     {} attempts", group_digits(&median));
    println!("Units:      {}", unit_count);
    println!();

    let (mut coordinator, events) = Coordinator::new(unit_count);
    let base_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0);

    if let Err(e) = coordinator.start(&raw, base_seed) {
        eprintln!("Failed to start search: {}", e);
        process::exit(1);
    }

    let signal = coordinator
        .cancel_signal()
        .expect("run is live after start");
    ctrlc::set_handler(move || signal.set()).expect("set Ctrl-C handler");

    println!("Searching... (Press Ctrl+C to stop)\n");
    let board = StatusBoard::new(&median);

    let refresh = Duration::from_millis(cli.refresh_ms.max(1));
    let summary = loop {
        match events.recv_timeout(refresh) {
            Ok(MinerEvent::Started { batch_size, .. }) => {
                board.println(&format!("Batch size per unit: {}", format_count(u64::from(batch_size))));
            }
            Ok(MinerEvent::Status(snapshot)) => board.update(&snapshot, &median),
            Ok(MinerEvent::Found { unit_id, results }) => {
                for found in &results {
                    board.println(&format!(
                        "Match from unit {}: {}\n  Salt:    {}\n  Pattern: {}",
                        unit_id, found.address, found.salt, found.pattern
                    ));
                }
            }
            Ok(MinerEvent::UnitFailed { unit_id, error }) => {
                board.println(&format!("Unit {} halted: {}", unit_id, error));
            }
            Ok(MinerEvent::Stopped(summary)) => break Some(summary),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break None,
        }
    };

    board.finish();
    coordinator.stop();

    if let Some(summary) = summary {
        println!("\n--- Final Statistics ---");
        println!("Total attempts: {}", format_count(summary.total_attempts));
        println!("Matches found:  {}", summary.matches);
        println!("Time elapsed:   {:.2}s", summary.elapsed.as_secs_f64());
        if summary.matches == 0 {
            println!("\nStopped before a match was found.");
        }
    }
}
