//! Pure interval math: the same formulas the answer processor uses, with
//! no side effects, so they can back both the mutating pipeline and the
//! side-effect-free `next_interval` preview. Grounded in the teacher's
//! `schedulers/fsrs/utils.rs::get_fuzz_range`, generalized from FSRS
//! duration ranges to the plain day-interval fuzz this scheduler uses.

use crate::config::RevConfig;
use crate::helpers::FractionalDays;
use crate::model::{Grade, MIN_FACTOR};
use chrono::Duration;
use rand::{Rng, RngCore};
use std::cmp;

/// Result of a graduated review-state answer (HARD/GOOD/EASY), before
/// clamping and fuzz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub ivl: i64,
    pub factor: i64,
}

/// `delay_days` is `max(0, today - due)`, how many days late the card was.
pub fn review_pass_outcome(
    ivl: i64,
    factor: i64,
    delay_days: i64,
    grade: Grade,
    cfg: &RevConfig,
) -> ReviewOutcome {
    let ivl = ivl as f64;
    let delay = delay_days as f64;
    let ease = factor as f64 / 1000.0;
    match grade {
        Grade::Hard => ReviewOutcome {
            ivl: ((ivl + delay / 4.0) * 1.2).round() as i64,
            factor: factor - 150,
        },
        Grade::Good => ReviewOutcome {
            ivl: ((ivl + delay / 2.0) * ease).round() as i64,
            factor,
        },
        Grade::Easy => ReviewOutcome {
            ivl: ((ivl + delay) * ease * cfg.ease4).round() as i64,
            factor: factor + 150,
        },
        Grade::Again => unreachable!("AGAIN on a review card is handled by the lapse path"),
    }
}

pub fn clamp_factor(factor: i64) -> i64 {
    cmp::max(MIN_FACTOR, factor)
}

/// New interval on a lapse: `max(lapse.minInt, floor(ivl * lapse.mult))`.
pub fn lapse_interval(ivl: i64, mult: f64, min_int: i64) -> i64 {
    cmp::max(min_int, (ivl as f64 * mult).floor() as i64)
}

/// Applies `±fuzz` fractional jitter to a graduated interval, at least ±1
/// day once `ivl > 2`, mirroring the teacher's `FuzzRange` banding (here
/// collapsed to the single `rev.fuzz` fraction this scheduler exposes).
/// `rng = None` disables fuzz entirely (used by the pure preview).
pub fn fuzzed_interval(ivl: i64, fuzz_fraction: f64, rng: Option<&mut dyn RngCore>) -> i64 {
    let Some(rng) = rng else { return ivl };
    if ivl <= 2 || fuzz_fraction <= 0.0 {
        return ivl;
    }
    let delta = ((ivl as f64) * fuzz_fraction).max(1.0);
    let delta = Duration::fractional_days(delta).num_fractional_days().round() as i64;
    let min_ivl = cmp::max(1, ivl - delta);
    let max_ivl = ivl + delta;
    if min_ivl >= max_ivl {
        return ivl;
    }
    rng.gen_range(min_ivl..=max_ivl)
}

/// Fuzzed learning-step due offset, in whole seconds.
pub fn fuzzed_step_seconds(minutes: f64, rng: Option<&mut dyn RngCore>) -> i64 {
    let base = (minutes * 60.0).round() as i64;
    let Some(rng) = rng else { return base };
    let delta = cmp::max(1, base / 4);
    rng.gen_range((base - delta).max(0)..=(base + delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn review_pass_matches_scenario_3() {
        let cfg = RevConfig::default();
        let hard = review_pass_outcome(100, 2500, 8, Grade::Hard, &cfg);
        assert_eq!(hard, ReviewOutcome { ivl: 122, factor: 2350 });
        let good = review_pass_outcome(100, 2500, 8, Grade::Good, &cfg);
        assert_eq!(good, ReviewOutcome { ivl: 260, factor: 2500 });
        let easy = review_pass_outcome(100, 2500, 8, Grade::Easy, &cfg);
        assert_eq!(easy, ReviewOutcome { ivl: 351, factor: 2650 });
    }

    #[test]
    fn lapse_matches_scenario_4() {
        assert_eq!(lapse_interval(100, 0.0, 1), 1);
    }

    #[test]
    fn fuzz_disabled_is_identity() {
        assert_eq!(fuzzed_interval(260, 0.05, None), 260);
    }
}
