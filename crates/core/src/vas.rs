//! Progressive VAS model: how pain typically eases over a course of sessions.
//!
//! Used to generate realistic demo data. The random source is injected so callers can
//! seed it.

use rand::Rng;

/// Share of the initial pain expected to be gone by the last session.
const COURSE_REDUCTION: f64 = 0.6;
/// Upper bound on the pain drop within a single session.
const MAX_SESSION_IMPROVEMENT: u8 = 3;

/// Pain readings of one modelled session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VasReading {
    pub before: u8,
    pub after: u8,
}

/// VAS before and after session `n` (1-based) of a `total`-session course starting at
/// `initial`.
///
/// `before` stays in `1..=10` and `after` in `0..=before`. An `n` past `total` is
/// treated as the last session.
pub fn progressive_vas<R: Rng + ?Sized>(rng: &mut R, initial: u8, n: u32, total: u32) -> VasReading {
    let initial = f64::from(initial.min(10));
    let progress = if total == 0 {
        1.0
    } else {
        f64::from(n.min(total)) / f64::from(total)
    };
    let noise: f64 = rng.gen_range(-1.0..=1.0);

    let raw = (initial - initial * COURSE_REDUCTION * progress + noise).round();
    let before = raw.clamp(1.0, 10.0) as u8;
    let improvement = rng.gen_range(1..=2).min(MAX_SESSION_IMPROVEMENT);

    VasReading {
        before,
        after: before.saturating_sub(improvement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pain_trends_down_over_the_course() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = progressive_vas(&mut rng, 8, 1, 10);
        let last = progressive_vas(&mut rng, 8, 10, 10);
        // 8 - 0.48 +- 1 versus 8 - 4.8 +- 1.
        assert!(first.before >= 7);
        assert!(last.before <= 4);
    }

    #[test]
    fn zero_initial_pain_still_reports_one() {
        let mut rng = StdRng::seed_from_u64(1);
        for n in 1..=5 {
            let reading = progressive_vas(&mut rng, 0, n, 5);
            assert_eq!(reading.before, 1);
            assert_eq!(reading.after, 0);
        }
    }

    proptest! {
        #[test]
        fn readings_stay_on_the_scale(
            seed in any::<u64>(),
            initial in 0u8..=10,
            n in 0u32..30,
            total in 0u32..20,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let reading = progressive_vas(&mut rng, initial, n, total);
            prop_assert!((1..=10).contains(&reading.before));
            prop_assert!(reading.after <= reading.before);
            prop_assert!(reading.before - reading.after <= MAX_SESSION_IMPROVEMENT);
        }
    }
}
