//! Injectable randomness for endpoint and word selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform indices.
pub trait RandomSource: Send {
    /// Return an index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// `StdRng`-backed source, seeded from the OS or from a fixed seed.
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Seed from the operating system.
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when `seed` is set, OS-seeded otherwise.
    pub fn from_seed_opt(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_os(),
        }
    }
}

impl RandomSource for StdRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Replays a fixed sequence of indices, wrapping around at the end.
///
/// Each value is reduced modulo `len`, so the same sequence can drive
/// picks over collections of different sizes.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    picks: Vec<usize>,
    next: usize,
}

impl SequenceRandom {
    /// Create from a non-empty sequence. An empty sequence always yields 0.
    pub fn new(picks: Vec<usize>) -> Self {
        Self { picks, next: 0 }
    }
}

impl RandomSource for SequenceRandom {
    fn pick(&mut self, len: usize) -> usize {
        if self.picks.is_empty() {
            return 0;
        }
        let value = self.picks[self.next % self.picks.len()];
        self.next += 1;
        value % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_random_wraps_and_reduces() {
        let mut rng = SequenceRandom::new(vec![0, 5]);
        assert_eq!(rng.pick(3), 0);
        assert_eq!(rng.pick(3), 2);
        assert_eq!(rng.pick(3), 0);
        assert_eq!(rng.pick(4), 1);
    }

    #[test]
    fn test_sequence_random_empty() {
        let mut rng = SequenceRandom::new(vec![]);
        assert_eq!(rng.pick(10), 0);
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mut a = StdRandom::seeded(42);
        let mut b = StdRandom::seeded(42);
        let first: Vec<usize> = (0..32).map(|_| a.pick(1000)).collect();
        let second: Vec<usize> = (0..32).map(|_| b.pick(1000)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_std_random_in_range() {
        let mut rng = StdRandom::from_os();
        for _ in 0..1000 {
            assert!(rng.pick(7) < 7);
        }
        assert_eq!(rng.pick(1), 0);
    }

    #[test]
    fn test_std_random_is_roughly_uniform() {
        let mut rng = StdRandom::seeded(1);
        let mut counts = [0usize; 4];
        let draws = 40_000;
        for _ in 0..draws {
            counts[rng.pick(4)] += 1;
        }
        for count in counts {
            let freq = count as f64 / draws as f64;
            assert!((freq - 0.25).abs() < 0.02, "frequency {freq} too far from 1/4");
        }
    }
}
