//! Per-cycle mining parameters: try-budget sized to difficulty, then
//! jittered along with the start delay so independent miners drift apart.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::config::SchedulerConfig;

/// Tries per unit of difficulty before the safety factor.
pub const BASE_TRIES: u64 = 1_000_000;

/// Headroom multiplier on the difficulty-scaled budget.
pub const SAFETY_FACTOR: u64 = 10;

/// Smallest try-budget ever requested.
pub const MIN_TRIES: u64 = 1_000_000;

/// Largest try-budget ever requested.
pub const MAX_TRIES: u64 = 100_000_000;

/// Unjittered try-budget for `difficulty`, clamped to
/// `[MIN_TRIES, MAX_TRIES]`.
///
/// Zero, negative and NaN difficulties get `MIN_TRIES`.
pub fn base_try_budget(difficulty: f64) -> u64 {
    let raw = BASE_TRIES as f64 * difficulty * SAFETY_FACTOR as f64;
    if raw.is_nan() {
        return MIN_TRIES;
    }
    raw.clamp(MIN_TRIES as f64, MAX_TRIES as f64) as u64
}

/// Parameters for one scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MiningParameters {
    /// Try-budget handed to the backend.
    pub max_tries: u64,
    /// Pause before the attempt.
    pub delay: Duration,
    /// Difficulty the budget was derived from.
    pub difficulty: f64,
}

impl MiningParameters {
    /// Draw this cycle's budget and delay.
    ///
    /// The budget is uniform within `±jitter` of [`base_try_budget`],
    /// intersected with `[MIN_TRIES, MAX_TRIES]`; the delay is uniform in the
    /// configured range.
    pub fn sample<R: Rng + ?Sized>(difficulty: f64, config: &SchedulerConfig, rng: &mut R) -> Self {
        let base = base_try_budget(difficulty);
        let spread = (base as f64 * config.jitter()) as u64;
        let lo = base.saturating_sub(spread).max(MIN_TRIES);
        let hi = base.saturating_add(spread).min(MAX_TRIES);
        let max_tries = rng.gen_range(lo..=hi);

        let (min_delay, max_delay) = config.delay_range();
        let delay_ms = rng.gen_range(min_delay.as_millis() as u64..=max_delay.as_millis() as u64);

        MiningParameters {
            max_tries,
            delay: Duration::from_millis(delay_ms),
            difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_base_budget_examples() {
        assert_eq!(base_try_budget(1.0), 10_000_000);
        assert_eq!(base_try_budget(0.5), 5_000_000);
        assert_eq!(base_try_budget(0.0), MIN_TRIES);
        assert_eq!(base_try_budget(0.01), MIN_TRIES);
        assert_eq!(base_try_budget(1e12), MAX_TRIES);
    }

    #[test]
    fn test_base_budget_always_bounded() {
        let odd = [
            -1.0,
            f64::NAN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::MIN_POSITIVE,
            f64::MAX,
            83_148_355_189_239.0,
        ];
        for d in odd {
            let budget = base_try_budget(d);
            assert!((MIN_TRIES..=MAX_TRIES).contains(&budget), "difficulty {}", d);
        }
    }

    #[test]
    fn test_jitter_window_for_difficulty_one() {
        let config = SchedulerConfig::default();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..1_000 {
            let params = MiningParameters::sample(1.0, &config, &mut rng);
            assert!((8_000_000..=12_000_000).contains(&params.max_tries));
            assert!((10..=50).contains(&(params.delay.as_millis() as u64)));
            assert_eq!(params.difficulty, 1.0);
        }
    }

    #[test]
    fn test_jittered_budget_stays_clamped() {
        let config = SchedulerConfig::default();
        let mut rng = StdRng::seed_from_u64(2);

        for _ in 0..1_000 {
            let low = MiningParameters::sample(0.0, &config, &mut rng);
            assert!((MIN_TRIES..=1_200_000).contains(&low.max_tries));

            let high = MiningParameters::sample(1e9, &config, &mut rng);
            assert!((80_000_000..=MAX_TRIES).contains(&high.max_tries));
        }
    }

    #[test]
    fn test_jitter_has_variance() {
        let config = SchedulerConfig::default();
        let mut rng = StdRng::seed_from_u64(3);

        let budgets: Vec<u64> = (0..50)
            .map(|_| MiningParameters::sample(1.0, &config, &mut rng).max_tries)
            .collect();
        let delays: Vec<Duration> = (0..50)
            .map(|_| MiningParameters::sample(1.0, &config, &mut rng).delay)
            .collect();

        assert!(budgets.iter().any(|b| *b != budgets[0]));
        assert!(delays.iter().any(|d| *d != delays[0]));
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let config = SchedulerConfig::default();
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);

        for _ in 0..10 {
            assert_eq!(
                MiningParameters::sample(2.5, &config, &mut a),
                MiningParameters::sample(2.5, &config, &mut b)
            );
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let config = SchedulerConfig {
            tries_jitter: 0.0,
            min_delay_ms: 25,
            max_delay_ms: 25,
            ..SchedulerConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        let params = MiningParameters::sample(3.0, &config, &mut rng);
        assert_eq!(params.max_tries, 30_000_000);
        assert_eq!(params.delay, Duration::from_millis(25));
    }
}
