//! Difficulty and completion-probability estimates.
//!
//! Models the search as independent uniform trials: a pattern of `p` bytes at
//! a fixed position carves a space of 2^(8p) addresses, so attempts follow an
//! exponential law with mean `difficulty`.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

/// ln 2 scaled by 1e6 for exact integer median math.
const LN2_SCALED: u64 = 693_147;
const LN2_SCALE: u64 = 1_000_000;

/// Size of the space a uniformly random salt must search to expect one match:
/// 2^(8 * pattern_bytes). Exact for any pattern length, including the full
/// 20-byte address (2^160).
pub fn difficulty(pattern_bytes: usize) -> BigUint {
    BigUint::one() << (pattern_bytes * 8)
}

/// Attempt count at which cumulative match probability crosses 0.5:
/// floor(difficulty * ln 2).
pub fn median_attempts(difficulty: &BigUint) -> BigUint {
    difficulty * LN2_SCALED / LN2_SCALE
}

/// Probability of at least one match after `attempts` tries:
/// 1 - e^(-attempts / difficulty), clamped to [0, 1].
///
/// The difficulty stays exact until this point; it is converted to `f64` only
/// for the final exponential. A difficulty too large for `f64` yields 0.0 —
/// accepted precision loss, since the true probability is then vanishingly
/// small anyway.
pub fn match_probability(attempts: u64, difficulty: &BigUint) -> f64 {
    if attempts == 0 || difficulty.is_zero() {
        return 0.0;
    }
    match difficulty.to_f64() {
        Some(d) if d.is_finite() && d > 0.0 => {
            (1.0 - (-(attempts as f64) / d).exp()).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_is_exact_for_all_pattern_lengths() {
        for p in 1..=20usize {
            let expected = BigUint::from(2u32).pow((8 * p) as u32);
            assert_eq!(difficulty(p), expected, "pattern length {}", p);
        }
    }

    #[test]
    fn difficulty_one_byte() {
        assert_eq!(difficulty(1), BigUint::from(256u32));
    }

    #[test]
    fn median_of_one_byte_pattern() {
        // 256 * ln 2 = 177.44..., floor 177
        assert_eq!(median_attempts(&difficulty(1)), BigUint::from(177u32));
    }

    #[test]
    fn probability_starts_at_zero() {
        assert_eq!(match_probability(0, &difficulty(4)), 0.0);
    }

    #[test]
    fn probability_is_monotone() {
        let d = difficulty(2);
        let mut last = 0.0;
        for attempts in [1u64, 10, 100, 1_000, 10_000, 100_000, 1_000_000] {
            let p = match_probability(attempts, &d);
            assert!(p >= last, "probability decreased at {} attempts", attempts);
            last = p;
        }
    }

    #[test]
    fn probability_approaches_one() {
        let d = difficulty(1);
        let p = match_probability(1_000_000, &d);
        assert!(p > 0.999_999);
        assert!(p <= 1.0);
    }

    #[test]
    fn probability_at_median_is_near_half() {
        let d = difficulty(3);
        let median = median_attempts(&d).to_u64().unwrap();
        let p = match_probability(median, &d);
        assert!((p - 0.5).abs() < 0.001);
    }

    #[test]
    fn probability_stays_clamped() {
        let d = difficulty(1);
        let p = match_probability(u64::MAX, &d);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn huge_difficulty_reports_zero() {
        // 2^160 still fits an f64 exponent, so the estimate is tiny but real.
        let p = match_probability(1, &difficulty(20));
        assert!(p >= 0.0 && p < 1e-40);
    }
}
