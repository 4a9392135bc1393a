//! Shared cancellation signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation flag shared by the coordinator and every search unit.
///
/// Cheap to clone and safe to read from any thread; units poll it at every
/// batch boundary, so stop latency is bounded by one batch's duration. A
/// fresh cleared signal is created per run. Stop messages on the unit command
/// channels are layered on top of this flag, so cancellation reaches a unit
/// through whichever arrives first.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_cleared() {
        assert!(!CancelSignal::new().is_set());
    }

    #[test]
    fn set_is_visible_through_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        clone.set();
        assert!(signal.is_set());
    }

    #[test]
    fn set_is_visible_across_threads() {
        let signal = CancelSignal::new();
        let remote = signal.clone();
        thread::spawn(move || remote.set()).join().unwrap();
        assert!(signal.is_set());
    }
}
