use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

/// An entry that could not be placed in its home neighborhood.
///
/// The full hash computed on insertion is kept alongside the key so the home
/// bucket can be found again without rehashing the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverflowEntry<K, V> {
    hash: u64,
    key: K,
    value: V,
}

impl<K, V> OverflowEntry<K, V> {
    /// Creates an entry for `key` hashed to `hash`.
    pub fn new(hash: u64, key: K, value: V) -> Self {
        Self { hash, key, value }
    }

    /// The hash the entry was inserted with.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The entry's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The entry's value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Mutable access to the entry's value. Keys are never handed out mutably
    /// since that could break an ordered store.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub(crate) fn key_value_mut(&mut self) -> (&K, &mut V) {
        (&self.key, &mut self.value)
    }

    /// Swaps the key for one that compares equal, so store order holds.
    pub(crate) fn replace_key(&mut self, key: K) -> K {
        core::mem::replace(&mut self.key, key)
    }

    /// Splits the entry into its hash, key and value.
    pub fn into_parts(self) -> (u64, K, V) {
        (self.hash, self.key, self.value)
    }
}

/// Storage for entries displaced out of the bucket array.
///
/// Stores keep their entries in a slice so a table can address an overflow
/// entry by index. [`remove`](OverflowStore::remove) must preserve the relative
/// order of the remaining entries.
pub trait OverflowStore<K, V>: Sized {
    /// Below this load factor a table places entries in the overflow store
    /// instead of growing when a neighborhood is full.
    const MIN_LOAD_FACTOR_FOR_REHASH: f32;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, in store order.
    fn entries(&self) -> &[OverflowEntry<K, V>];

    /// All entries, in store order, with mutable access to values.
    fn entries_mut(&mut self) -> &mut [OverflowEntry<K, V>];

    /// Index of the entry whose key matches `key`.
    fn find(&self, key: &K) -> Option<usize>;

    /// Adds an entry whose key is not yet present, returning its index.
    fn insert(&mut self, entry: OverflowEntry<K, V>) -> usize;

    /// Removes the entry at `index`, shifting later entries down by one.
    fn remove(&mut self, index: usize) -> OverflowEntry<K, V>;

    /// Removes every entry.
    fn clear(&mut self);

    /// Moves every entry out, leaving the store empty.
    fn take_entries(&mut self) -> Vec<OverflowEntry<K, V>>;
}

/// Unordered overflow store searched linearly with `Eq`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListOverflow<K, V> {
    entries: Vec<OverflowEntry<K, V>>,
}

impl<K, V> ListOverflow<K, V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K, V> Default for ListOverflow<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq, V> OverflowStore<K, V> for ListOverflow<K, V> {
    const MIN_LOAD_FACTOR_FOR_REHASH: f32 = 0.15;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> &[OverflowEntry<K, V>] {
        &self.entries
    }

    fn entries_mut(&mut self) -> &mut [OverflowEntry<K, V>] {
        &mut self.entries
    }

    fn find(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == *key)
    }

    fn insert(&mut self, entry: OverflowEntry<K, V>) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    fn remove(&mut self, index: usize) -> OverflowEntry<K, V> {
        self.entries.remove(index)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn take_entries(&mut self) -> Vec<OverflowEntry<K, V>> {
        core::mem::take(&mut self.entries)
    }
}

/// A strict weak ordering over keys.
///
/// Implemented for [`NaturalOrder`] and for any `Fn(&K, &K) -> Ordering`.
pub trait KeyCompare<K: ?Sized> {
    /// Compares two keys.
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys with their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> KeyCompare<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

impl<K: ?Sized, F> KeyCompare<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// Overflow store kept sorted by a comparator and searched with a binary
/// search.
///
/// Keys that compare [`Ordering::Equal`] are treated as the same key, so the
/// comparator must agree with the key type's `Eq`.
#[derive(Clone)]
pub struct OrderedOverflow<K, V, C = NaturalOrder> {
    entries: Vec<OverflowEntry<K, V>>,
    compare: C,
}

impl<K, V, C> OrderedOverflow<K, V, C> {
    /// Creates an empty store ordered by `compare`.
    pub fn with_comparator(compare: C) -> Self {
        Self {
            entries: Vec::new(),
            compare,
        }
    }

    /// The comparator ordering the store.
    pub fn key_comp(&self) -> &C {
        &self.compare
    }
}

impl<K, V, C: Default> OrderedOverflow<K, V, C> {
    /// Creates an empty store ordered by `C::default()`.
    pub fn new() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K, V, C: Default> Default for OrderedOverflow<K, V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Debug, V: Debug, C> Debug for OrderedOverflow<K, V, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderedOverflow")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl<K, V, C> OverflowStore<K, V> for OrderedOverflow<K, V, C>
where
    C: KeyCompare<K>,
{
    const MIN_LOAD_FACTOR_FOR_REHASH: f32 = 0.30;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> &[OverflowEntry<K, V>] {
        &self.entries
    }

    fn entries_mut(&mut self) -> &mut [OverflowEntry<K, V>] {
        &mut self.entries
    }

    fn find(&self, key: &K) -> Option<usize> {
        self.entries
            .binary_search_by(|entry| self.compare.compare(&entry.key, key))
            .ok()
    }

    fn insert(&mut self, entry: OverflowEntry<K, V>) -> usize {
        let index = self
            .entries
            .partition_point(|e| self.compare.compare(&e.key, &entry.key) == Ordering::Less);
        self.entries.insert(index, entry);
        index
    }

    fn remove(&mut self, index: usize) -> OverflowEntry<K, V> {
        self.entries.remove(index)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn take_entries(&mut self) -> Vec<OverflowEntry<K, V>> {
        core::mem::take(&mut self.entries)
    }
}
