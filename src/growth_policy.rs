use core::fmt::Debug;

use crate::error::Error;
use crate::error::Result;

/// Bucket count a table starts with when no explicit count is requested.
pub const DEFAULT_INIT_BUCKETS_SIZE: usize = 16;

/// Strategy deciding how many buckets a table has and which bucket a hash
/// belongs to.
///
/// Implementations must guarantee that [`bucket_for_hash`] is always strictly
/// less than [`bucket_count`], and that [`next_bucket_count`] never returns a
/// count smaller than the current one.
///
/// [`Default`] must produce a policy holding at least
/// [`DEFAULT_INIT_BUCKETS_SIZE`] buckets.
///
/// [`bucket_for_hash`]: GrowthPolicy::bucket_for_hash
/// [`bucket_count`]: GrowthPolicy::bucket_count
/// [`next_bucket_count`]: GrowthPolicy::next_bucket_count
pub trait GrowthPolicy: Sized + Clone + Debug + Default {
    /// `true` when [`bucket_for_hash`](GrowthPolicy::bucket_for_hash) only
    /// looks at the low bits of the hash. Tables storing truncated hashes
    /// require this.
    const MASK_BASED: bool = false;

    /// Creates a policy able to address at least `min_bucket_count` buckets.
    ///
    /// The actual bucket count is available through
    /// [`bucket_count`](GrowthPolicy::bucket_count) and may be larger than
    /// requested.
    fn new(min_bucket_count: usize) -> Result<Self>;

    /// Number of addressable buckets.
    fn bucket_count(&self) -> usize;

    /// Maps a hash into `0..bucket_count()`.
    fn bucket_for_hash(&self, hash: u64) -> usize;

    /// Bucket count to request when the table grows.
    fn next_bucket_count(&self) -> Result<usize>;

    /// Largest bucket count this policy can represent.
    fn max_bucket_count(&self) -> usize;
}

/// Grows by `FACTOR` and keeps the bucket count a power of two, so a hash is
/// mapped with a mask instead of a modulo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerOfTwoGrowthPolicy<const FACTOR: usize = 2> {
    mask: usize,
}

impl<const FACTOR: usize> PowerOfTwoGrowthPolicy<FACTOR> {
    const MIN_BUCKETS_SIZE: usize = 2;
    const MAX_BUCKET_COUNT: usize = usize::MAX / 2 + 1;

    const CHECK_FACTOR: () = assert!(
        FACTOR.is_power_of_two() && FACTOR >= 2,
        "growth factor must be a power of two >= 2"
    );
}

impl<const FACTOR: usize> Default for PowerOfTwoGrowthPolicy<FACTOR> {
    fn default() -> Self {
        Self {
            mask: DEFAULT_INIT_BUCKETS_SIZE - 1,
        }
    }
}

impl<const FACTOR: usize> GrowthPolicy for PowerOfTwoGrowthPolicy<FACTOR> {
    const MASK_BASED: bool = true;

    fn new(min_bucket_count: usize) -> Result<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::CHECK_FACTOR;

        if min_bucket_count > Self::MAX_BUCKET_COUNT {
            return Err(Error::CapacityExceeded {
                max_bucket_count: Self::MAX_BUCKET_COUNT,
            });
        }

        let count = min_bucket_count
            .max(Self::MIN_BUCKETS_SIZE)
            .next_power_of_two();
        Ok(Self { mask: count - 1 })
    }

    #[inline(always)]
    fn bucket_count(&self) -> usize {
        self.mask + 1
    }

    #[inline(always)]
    fn bucket_for_hash(&self, hash: u64) -> usize {
        hash as usize & self.mask
    }

    fn next_bucket_count(&self) -> Result<usize> {
        if self.mask + 1 > Self::MAX_BUCKET_COUNT / FACTOR {
            return Err(Error::CapacityExceeded {
                max_bucket_count: Self::MAX_BUCKET_COUNT,
            });
        }

        Ok((self.mask + 1) * FACTOR)
    }

    fn max_bucket_count(&self) -> usize {
        Self::MAX_BUCKET_COUNT
    }
}

/// Grows by the ratio `NUM / DEN` (at least 1.1) and maps a hash with a
/// modulo by the current bucket count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModGrowthPolicy<const NUM: usize = 3, const DEN: usize = 2> {
    bucket_count: usize,
}

impl<const NUM: usize, const DEN: usize> ModGrowthPolicy<NUM, DEN> {
    const MIN_BUCKETS_SIZE: usize = 2;

    const CHECK_RATIO: () = assert!(
        DEN > 0 && NUM * 10 >= DEN * 11,
        "growth ratio must be >= 1.1"
    );

    const MAX_BUCKET_COUNT: usize = usize::MAX / NUM * DEN;
}

impl<const NUM: usize, const DEN: usize> Default for ModGrowthPolicy<NUM, DEN> {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_INIT_BUCKETS_SIZE,
        }
    }
}

impl<const NUM: usize, const DEN: usize> GrowthPolicy for ModGrowthPolicy<NUM, DEN> {
    fn new(min_bucket_count: usize) -> Result<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::CHECK_RATIO;

        if min_bucket_count > Self::MAX_BUCKET_COUNT {
            return Err(Error::CapacityExceeded {
                max_bucket_count: Self::MAX_BUCKET_COUNT,
            });
        }

        Ok(Self {
            bucket_count: min_bucket_count.max(Self::MIN_BUCKETS_SIZE),
        })
    }

    #[inline(always)]
    fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    #[inline(always)]
    fn bucket_for_hash(&self, hash: u64) -> usize {
        (hash % self.bucket_count as u64) as usize
    }

    fn next_bucket_count(&self) -> Result<usize> {
        if self.bucket_count >= Self::MAX_BUCKET_COUNT {
            return Err(Error::CapacityExceeded {
                max_bucket_count: Self::MAX_BUCKET_COUNT,
            });
        }

        let next = (self.bucket_count as u128 * NUM as u128).div_ceil(DEN as u128);
        Ok(next.min(Self::MAX_BUCKET_COUNT as u128) as usize)
    }

    fn max_bucket_count(&self) -> usize {
        Self::MAX_BUCKET_COUNT
    }
}

/// Bucket counts available to [`PrimeGrowthPolicy`], in ascending order.
pub const PRIMES: [u64; 38] = [
    17, 29, 37, 53, 67, 79, 97, 131, 193, 257, 389, 521, 769, 1031, 1543, 2053, 3079, 6151, 12289,
    24593, 49157, 98317, 196613, 393241, 786433, 1572869, 3145739, 6291469, 12582917, 25165843,
    50331653, 100663319, 201326611, 402653189, 805306457, 1610612741, 3221225473, 4294967291,
];

/// Walks the [`PRIMES`] table, using the smallest prime at least as large as
/// the requested count. Spreads poorly distributed hashes better than a mask
/// at the cost of a modulo per lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PrimeGrowthPolicy {
    index: usize,
}

impl PrimeGrowthPolicy {
    fn prime(index: usize) -> Option<usize> {
        PRIMES
            .get(index)
            .and_then(|&prime| usize::try_from(prime).ok())
    }

    fn largest_prime() -> usize {
        PRIMES
            .iter()
            .rev()
            .find_map(|&prime| usize::try_from(prime).ok())
            .unwrap_or(0)
    }

    fn exhausted() -> Error {
        Error::CapacityExceeded {
            max_bucket_count: Self::largest_prime(),
        }
    }
}

impl GrowthPolicy for PrimeGrowthPolicy {
    fn new(min_bucket_count: usize) -> Result<Self> {
        let index = PRIMES.partition_point(|&prime| prime < min_bucket_count as u64);
        match Self::prime(index) {
            Some(_) => Ok(Self { index }),
            None => Err(Self::exhausted()),
        }
    }

    #[inline(always)]
    fn bucket_count(&self) -> usize {
        PRIMES[self.index] as usize
    }

    #[inline(always)]
    fn bucket_for_hash(&self, hash: u64) -> usize {
        (hash % PRIMES[self.index]) as usize
    }

    fn next_bucket_count(&self) -> Result<usize> {
        Self::prime(self.index + 1).ok_or_else(Self::exhausted)
    }

    fn max_bucket_count(&self) -> usize {
        Self::largest_prime()
    }
}
