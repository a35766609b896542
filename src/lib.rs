#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bucket;

pub mod error;

/// Policies mapping hashes to buckets and deciding how the bucket array grows.
///
/// - [`PowerOfTwoGrowthPolicy`]: power-of-two counts, masks the hash.
/// - [`ModGrowthPolicy`]: grows by a rational factor, reduces with a modulo.
/// - [`PrimeGrowthPolicy`]: walks a fixed table of primes.
pub mod growth_policy;

/// Stores for entries that do not fit in their home neighborhood.
pub mod overflow;

/// The hopscotch hashing engine shared by the map and set.
pub mod hash_table;

/// A HashMap implementation using hopscotch hashing.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers.
pub mod hash_map;

/// A hash set implementation using hopscotch hashing.
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable hashers.
pub mod hash_set;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used when none is specified.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used when none is specified.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder for the default hasher builder when neither `foldhash`
        /// nor `std` is enabled. Tables must be given an explicit hasher.
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}
    }
}

pub use bucket::MAX_NEIGHBORHOOD_SIZE;
pub use error::Error;
pub use error::Result;
pub use growth_policy::DEFAULT_INIT_BUCKETS_SIZE;
pub use growth_policy::GrowthPolicy;
pub use growth_policy::ModGrowthPolicy;
pub use growth_policy::PowerOfTwoGrowthPolicy;
pub use growth_policy::PrimeGrowthPolicy;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::DEFAULT_MAX_LOAD_FACTOR;
pub use hash_table::DEFAULT_NEIGHBORHOOD_SIZE;
pub use hash_table::HashTable;
pub use hash_table::Position;
pub use overflow::KeyCompare;
pub use overflow::ListOverflow;
pub use overflow::NaturalOrder;
pub use overflow::OrderedOverflow;
pub use overflow::OverflowEntry;
pub use overflow::OverflowStore;
