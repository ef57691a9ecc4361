//! Random-number source backing the `random` opcode (Standard §15).

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

pub struct ZRand {
    rng: Box<dyn RngCore + Send>,
}

impl ZRand {
    pub fn new_uniform() -> ZRand {
        ZRand { rng: Box::new(StdRng::from_entropy()) }
    }

    pub fn new_predictable(seed: u64) -> ZRand {
        ZRand { rng: Box::new(StdRng::seed_from_u64(seed)) }
    }

    /// Implements `random n`: n>0 draws uniformly from [1,n]; n<0 reseeds
    /// predictably from |n| and returns 0; n==0 reseeds from entropy and
    /// returns 0 (Standard §15 `random`).
    pub fn random(&mut self, n: i16) -> u16 {
        match n.cmp(&0) {
            std::cmp::Ordering::Greater => self.rng.gen_range(1..=n as u32) as u16,
            std::cmp::Ordering::Less => {
                *self = ZRand::new_predictable(n.unsigned_abs() as u64);
                0
            }
            std::cmp::Ordering::Equal => {
                *self = ZRand::new_uniform();
                0
            }
        }
    }
}

impl Default for ZRand {
    fn default() -> Self {
        ZRand::new_uniform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_n_stays_in_range() {
        let mut r = ZRand::new_predictable(42);
        for _ in 0..50 {
            let v = r.random(6);
            assert!((1..=6).contains(&v));
        }
    }

    #[test]
    fn negative_n_reseeds_and_returns_zero() {
        let mut r = ZRand::new_uniform();
        assert_eq!(r.random(-7), 0);
    }
}
