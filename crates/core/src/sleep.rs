use rand::Rng;
use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;

/// Something that can block the current loop for a while.
///
/// The dispatcher pauses between every synthetic input step; tests swap in
/// a recorder so sequences can be checked without real waiting.
pub trait Pause: Send {
    fn pause(&mut self, d: Duration);
}

/// Real blocking sleep.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

/// Uniform random duration in `[min, max]` seconds.
pub fn uniform_secs<R: Rng + ?Sized>(rng: &mut R, range: RangeInclusive<f64>) -> Duration {
    let (lo, hi) = (*range.start(), *range.end());
    let secs = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
    Duration::from_secs_f64(secs.max(0.0))
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn uniform_secs_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let d = uniform_secs(&mut rng, 0.1..=0.3).as_secs_f64();
            assert!((0.1..=0.3).contains(&d), "{d}");
        }
    }

    #[test]
    fn degenerate_range_returns_lower_bound() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(uniform_secs(&mut rng, 0.25..=0.25), Duration::from_millis(250));
    }
}
