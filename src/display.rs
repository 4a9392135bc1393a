//! Terminal status board for a running search.

use std::time::Duration;

use indicatif::{HumanDuration, MultiProgress, ProgressBar, ProgressStyle};
use num_bigint::BigUint;

use create2_vanity::StatusSnapshot;

/// Granularity of the probability bar (0.01% steps).
const CHANCE_TICKS: u64 = 10_000;

pub struct StatusBoard {
    mp: MultiProgress,
    runtime: ProgressBar,
    attempts: ProgressBar,
    chance: ProgressBar,
}

impl StatusBoard {
    pub fn new(median: &BigUint) -> Self {
        let mp = MultiProgress::new();

        let spinner_style = ProgressStyle::with_template("{spinner:.blue} {msg}")
            .expect("spinner template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        let runtime = mp.add(ProgressBar::new_spinner());
        runtime.set_style(spinner_style.clone());
        runtime.enable_steady_tick(Duration::from_millis(80));
        runtime.set_message("Runtime: 0s");

        let attempts = mp.add(ProgressBar::new_spinner());
        attempts.set_style(spinner_style);
        attempts.enable_steady_tick(Duration::from_millis(80));
        attempts.set_message(format!("Attempts: 0 (median {})", group_digits(median)));

        let chance = mp.add(ProgressBar::new(CHANCE_TICKS));
        chance.set_style(
            ProgressStyle::with_template("{bar:40.green} {msg}").expect("bar template"),
        );
        chance.set_message("0.00% chance");

        Self {
            mp,
            runtime,
            attempts,
            chance,
        }
    }

    pub fn update(&self, snapshot: &StatusSnapshot, median: &BigUint) {
        self.runtime.set_message(format!(
            "Runtime: {} | Speed: {} attempts/s",
            HumanDuration(snapshot.elapsed),
            format_count(snapshot.aggregate_rate as u64),
        ));
        self.attempts.set_message(format!(
            "Attempts: {} (median {})",
            format_count(snapshot.total_attempts),
            group_digits(median),
        ));
        let pct = snapshot.probability * 100.0;
        self.chance
            .set_position((snapshot.probability * CHANCE_TICKS as f64) as u64);
        self.chance.set_message(format!("{:.2}% chance", pct));
    }

    /// Prints a line above the live bars.
    pub fn println(&self, line: &str) {
        let _ = self.mp.println(line);
    }

    pub fn finish(&self) {
        self.runtime.finish_and_clear();
        self.attempts.finish_and_clear();
        self.chance.finish_and_clear();
    }
}

/// Compact count: 1.23K / 4.56M / 7.89B.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1e9)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1e6)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1e3)
    } else {
        n.to_string()
    }
}

/// Groups an arbitrarily large integer into thousands: 18 446 744 073...
pub fn group_digits(value: &BigUint) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && i % 3 == lead % 3 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}
