//! Seedable randomness for a session: map layout, token placement, items, shuffles.

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SessionRng {
    rng: StdRng,
    seed: u64,
}

impl SessionRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn from_random() -> Self {
        let seed: u64 = rand::rng().random();
        Self::new(seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform integer in `0..upper`.
    pub fn below(&mut self, upper: usize) -> usize {
        self.rng.random_range(0..upper)
    }

    /// True with the given chance in percent.
    pub fn percent(&mut self, chance: u8) -> bool {
        self.rng.random_range(0..100u8) < chance
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SessionRng::new(7);
        let mut b = SessionRng::new(7);
        let xs: Vec<usize> = (0..16).map(|_| a.below(1000)).collect();
        let ys: Vec<usize> = (0..16).map(|_| b.below(1000)).collect();
        assert_eq!(xs, ys);
        assert_eq!(a.seed(), 7);
    }

    #[test]
    fn test_percent_bounds() {
        let mut rng = SessionRng::new(1);
        assert!((0..100).all(|_| !rng.percent(0)));
        assert!((0..100).all(|_| rng.percent(100)));
    }
}
