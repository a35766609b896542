//! A single slot of the bucket array.

/// Largest neighborhood a bucket can track.
pub const MAX_NEIGHBORHOOD_SIZE: usize = 62;

/// One slot of the bucket array.
///
/// Bit `i` of `neighbors` is set iff the bucket `i` slots after this one holds
/// an entry whose home is this bucket. `overflow` is set iff at least one entry
/// whose home is this bucket lives in the overflow store. `hash` is only
/// meaningful when the owning table stores hashes.
#[derive(Clone)]
pub(crate) struct Bucket<K, V> {
    neighbors: u64,
    overflow: bool,
    hash: u32,
    entry: Option<(K, V)>,
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self {
            neighbors: 0,
            overflow: false,
            hash: 0,
            entry: None,
        }
    }
}

impl<K, V> Bucket<K, V> {
    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    #[inline(always)]
    pub(crate) fn get(&self) -> Option<(&K, &V)> {
        self.entry.as_ref().map(|(k, v)| (k, v))
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self) -> Option<(&K, &mut V)> {
        self.entry.as_mut().map(|(k, v)| (&*k, v))
    }

    #[inline(always)]
    pub(crate) fn key(&self) -> Option<&K> {
        self.entry.as_ref().map(|(k, _)| k)
    }

    /// Stores `key`/`value`, dropping whatever the bucket held before.
    pub(crate) fn set_value<const STORE_HASH: bool>(&mut self, hash: u64, key: K, value: V) {
        if STORE_HASH {
            self.hash = hash as u32;
        }
        self.entry = Some((key, value));
    }

    /// Swaps the stored key for `key`, which must compare equal to it.
    pub(crate) fn replace_key(&mut self, key: K) -> Option<K> {
        self.entry
            .as_mut()
            .map(|(stored, _)| core::mem::replace(stored, key))
    }

    pub(crate) fn remove_value(&mut self) -> Option<(K, V)> {
        self.entry.take()
    }

    #[inline(always)]
    pub(crate) fn neighbors(&self) -> u64 {
        self.neighbors
    }

    #[inline(always)]
    pub(crate) fn check_neighbor_presence(&self, offset: usize) -> bool {
        debug_assert!(offset <= MAX_NEIGHBORHOOD_SIZE);
        self.neighbors & (1 << offset) != 0
    }

    #[inline(always)]
    pub(crate) fn toggle_neighbor_presence(&mut self, offset: usize) {
        debug_assert!(offset <= MAX_NEIGHBORHOOD_SIZE);
        self.neighbors ^= 1 << offset;
    }

    #[inline(always)]
    pub(crate) fn has_overflow(&self) -> bool {
        self.overflow
    }

    #[inline(always)]
    pub(crate) fn set_overflow(&mut self, has_overflow: bool) {
        self.overflow = has_overflow;
    }

    /// Cheap pre-check before comparing keys. Always `true` when hashes are
    /// not stored.
    #[inline(always)]
    pub(crate) fn bucket_hash_equal<const STORE_HASH: bool>(&self, hash: u64) -> bool {
        !STORE_HASH || self.hash == hash as u32
    }

    pub(crate) fn truncated_hash(&self) -> u32 {
        self.hash
    }

    /// Moves this bucket's entry (and stored hash) into `empty`, leaving this
    /// bucket without a value. Neighborhood bits are untouched.
    pub(crate) fn swap_value_into_empty_bucket(&mut self, empty: &mut Self) {
        debug_assert!(empty.is_empty());
        debug_assert!(!self.is_empty());

        empty.entry = self.entry.take();
        empty.hash = self.hash;
    }

    /// Takes the entry out and resets all bookkeeping.
    pub(crate) fn clear(&mut self) -> Option<(K, V)> {
        self.neighbors = 0;
        self.overflow = false;
        self.entry.take()
    }

    pub(crate) fn into_entry(self) -> Option<(K, V)> {
        self.entry
    }
}
