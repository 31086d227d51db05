//! Deterministic answer scoring: a speed-weighted base plus a streak bonus.

/// Bonus per consecutive correct answer beyond the first.
pub const STREAK_BONUS_STEP: u32 = 100;
/// Ceiling on the streak bonus.
pub const MAX_STREAK_BONUS: u32 = 500;

/// Speed-weighted base score for a correct answer.
///
/// With `T` the question time limit and `e` the pause-adjusted elapsed time
/// (both in ms), a correct answer scores `round(points * (1 - 0.5 * e/T))`:
/// full points at `e = 0`, half at `e = T`. `e` outside `[0, T]` is clamped.
/// Wrong answers score zero (callers never reach here for them).
pub fn base_score(points: u32, elapsed_ms: i64, limit_ms: i64) -> u32 {
    debug_assert!(limit_ms > 0);
    let elapsed = elapsed_ms.clamp(0, limit_ms) as f64;
    let fraction = 1.0 - 0.5 * (elapsed / limit_ms as f64);
    (f64::from(points) * fraction).round() as u32
}

/// Streak bonus for the `streak`-th consecutive correct answer.
///
/// The first correct answer of a run earns nothing; from the second onward the
/// bonus is `100 * (streak - 1)` capped at 500.
pub fn streak_bonus(streak: u32) -> u32 {
    if streak < 2 {
        return 0;
    }
    (STREAK_BONUS_STEP * (streak - 1)).min(MAX_STREAK_BONUS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_points_at_instant_answer() {
        assert_eq!(base_score(1000, 0, 10_000), 1000);
    }

    #[test]
    fn half_points_at_the_limit() {
        assert_eq!(base_score(1000, 10_000, 10_000), 500);
    }

    #[test]
    fn late_submissions_clamp_to_the_limit() {
        assert_eq!(base_score(1000, 15_000, 10_000), 500);
        assert_eq!(base_score(1000, i64::MAX, 10_000), 500);
    }

    #[test]
    fn negative_elapsed_clamps_to_zero() {
        // Clock skew between pause bookkeeping and submission must not
        // produce more than full points.
        assert_eq!(base_score(1000, -500, 10_000), 1000);
    }

    #[test]
    fn linear_in_between() {
        // e = 2s of T = 10s: 1000 * (1 - 0.5 * 0.2) = 900
        assert_eq!(base_score(1000, 2_000, 10_000), 900);
        // e = 4s: 1000 * 0.8 = 800
        assert_eq!(base_score(1000, 4_000, 10_000), 800);
        // Rounding: 555 * (1 - 0.5 * 0.5) = 416.25 -> 416
        assert_eq!(base_score(555, 5_000, 10_000), 416);
    }

    #[test]
    fn streak_bonus_schedule() {
        assert_eq!(streak_bonus(0), 0);
        assert_eq!(streak_bonus(1), 0);
        assert_eq!(streak_bonus(2), 100);
        assert_eq!(streak_bonus(3), 200);
        assert_eq!(streak_bonus(5), 400);
        assert_eq!(streak_bonus(6), 500);
        assert_eq!(streak_bonus(7), 500);
        assert_eq!(streak_bonus(u32::MAX), 500);
    }
}
