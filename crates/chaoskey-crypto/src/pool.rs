//! Bounded worker pool for prime search.

use num_bigint::BigUint;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{derivation::DerivedSeedPair, error::CryptoError, primes::prime_from_seed};

/// Minimum worker count. Each key generation runs exactly two searches.
pub const MIN_WORKERS: usize = 2;

/// Dedicated rayon pool that runs the p and q searches side by side.
///
/// Searches are CPU bound and can take hundreds of milliseconds at full
/// width, so they never run on the caller's thread or on an async runtime.
pub struct PrimePool {
    pool: ThreadPool,
    prime_bits: u64,
}

impl PrimePool {
    /// Build a pool with `workers` threads (raised to [`MIN_WORKERS`]).
    pub fn new(workers: usize, prime_bits: u64) -> Result<Self, CryptoError> {
        let workers = workers.max(MIN_WORKERS);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("prime-search-{i}"))
            .build()
            .map_err(|e| CryptoError::Pool(e.to_string()))?;

        Ok(Self { pool, prime_bits })
    }

    /// Width of each prime this pool searches for.
    pub fn prime_bits(&self) -> u64 {
        self.prime_bits
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Search both seeds concurrently and wait for both results.
    ///
    /// If either search fails the whole pair fails; the other result is
    /// discarded.
    pub fn search_pair(&self, seeds: &DerivedSeedPair) -> Result<(BigUint, BigUint), CryptoError> {
        let bits = self.prime_bits;
        let (p, q) = self.pool.join(
            || prime_from_seed(seeds.seed_p(), bits),
            || prime_from_seed(seeds.seed_q(), bits),
        );
        Ok((p?, q?))
    }
}

impl std::fmt::Debug for PrimePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimePool")
            .field("workers", &self.workers())
            .field("prime_bits", &self.prime_bits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_minimum_workers() {
        let pool = PrimePool::new(0, 128).unwrap();
        assert_eq!(pool.workers(), MIN_WORKERS);

        let pool = PrimePool::new(4, 128).unwrap();
        assert_eq!(pool.workers(), 4);
    }

    #[test]
    fn pair_matches_sequential_search() {
        let pool = PrimePool::new(2, 256).unwrap();
        let seeds = DerivedSeedPair::from_seeds([3u8; 32], [4u8; 32]);

        let (p, q) = pool.search_pair(&seeds).unwrap();

        assert_eq!(p, prime_from_seed(&[3u8; 32], 256).unwrap());
        assert_eq!(q, prime_from_seed(&[4u8; 32], 256).unwrap());
        assert_ne!(p, q);
    }
}
