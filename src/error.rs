//! Error types for the `hopscotch-table` crate

/// Errors reported by fallible table operations.
///
/// Every operation that returns an [`Error`] leaves the table it was called on
/// with the same contents it had before the call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested or required bucket count is larger than the growth policy
    /// or the bucket array can represent.
    #[error("the hash table exceeds its maximum size of {max_bucket_count} buckets")]
    CapacityExceeded {
        /// Largest bucket count the table could have grown to.
        max_bucket_count: usize,
    },

    /// A checked accessor such as [`crate::HashTable::at`] was called with a
    /// key that is not present.
    #[error("couldn't find key")]
    KeyNotFound,
}

/// Shorthand for results carrying this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
