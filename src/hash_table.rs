use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem;

use tracing::debug;
use tracing::trace;

use crate::DefaultHashBuilder;
use crate::bucket::Bucket;
use crate::bucket::MAX_NEIGHBORHOOD_SIZE;
use crate::error::Error;
use crate::error::Result;
use crate::growth_policy::GrowthPolicy;
use crate::growth_policy::PowerOfTwoGrowthPolicy;
use crate::overflow::ListOverflow;
use crate::overflow::OrderedOverflow;
use crate::overflow::OverflowEntry;
use crate::overflow::OverflowStore;

/// Neighborhood size used when none is specified.
pub const DEFAULT_NEIGHBORHOOD_SIZE: usize = 62;

/// Max load factor used when none is specified.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.95;

const MIN_MAX_LOAD_FACTOR: f32 = 0.1;
const MAX_MAX_LOAD_FACTOR: f32 = 0.95;

/// Smallest bucket count keeping `len` entries at or below `max_load_factor`.
fn min_bucket_count_for(len: usize, max_load_factor: f32) -> usize {
    let exact = len as f64 / max_load_factor as f64;
    let truncated = exact as usize;
    if (truncated as f64) < exact {
        truncated.saturating_add(1)
    } else {
        truncated
    }
}

/// Location of an entry inside a [`HashTable`].
///
/// A position either points at a bucket of the bucket array or, once the
/// bucket array is exhausted, at an index of the overflow store. The position
/// one past the last overflow entry is the table's [`end`](HashTable::end).
///
/// Positions are only meaningful for the table that produced them and are
/// invalidated by any insertion or rehash. Erasing an entry only invalidates
/// positions of that entry and of later overflow entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    bucket: usize,
    buckets_end: usize,
    overflow: usize,
}

impl Position {
    /// Index into the bucket array, if the position refers to a bucket.
    pub fn bucket_index(&self) -> Option<usize> {
        (self.bucket < self.buckets_end).then_some(self.bucket)
    }

    /// Index into the overflow store, if the position is past the bucket
    /// array. The end position reports the overflow store's length.
    pub fn overflow_index(&self) -> Option<usize> {
        self.in_overflow().then_some(self.overflow)
    }

    #[inline(always)]
    fn in_overflow(&self) -> bool {
        self.bucket >= self.buckets_end
    }
}

/// Debug statistics for hash table analysis.
///
/// Compiled with `cfg(test)` or the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of elements currently in the table
    pub populated: usize,
    /// Number of addressable buckets
    pub bucket_count: usize,
    /// Bucket-resident elements allowed before the next insert grows the table
    pub load_threshold: usize,
    /// Physical size of the bucket array
    pub total_slots: usize,
    /// Number of buckets currently holding an entry
    pub occupied_slots: usize,
    /// Number of entries in the overflow store
    pub overflow_entries: usize,
    /// Load factor (populated / bucket_count)
    pub load_factor: f64,
    /// Slot utilization (occupied_slots / total_slots)
    pub slot_utilization: f64,
    /// Total memory in bytes used by the bucket array and overflow store
    pub total_bytes: usize,
    /// Bytes reserved for entries in empty buckets
    pub wasted_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} buckets ({:.2}% load factor, threshold {})",
            self.populated,
            self.bucket_count,
            self.load_factor * 100.0,
            self.load_threshold
        );
        println!(
            "Slot Usage: {}/{} ({:.2}% utilization)",
            self.occupied_slots,
            self.total_slots,
            self.slot_utilization * 100.0
        );
        println!("Overflow: {} entries", self.overflow_entries);
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// Distribution of entries by distance from their home bucket.
///
/// Bin `i` for `i < N` counts entries living `i` buckets after their home; the
/// last bin counts entries in the overflow store.
///
/// Compiled with `cfg(test)` or the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    bins: Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// All bins, the overflow bin last.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Number of entries in the overflow store.
    pub fn overflow(&self) -> usize {
        self.bins.last().copied().unwrap_or(0)
    }

    /// Pretty-prints the histogram as a horizontal bar chart, skipping empty
    /// trailing displacement bins.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.bins.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!("probe histogram ({} entries):", self.bins.iter().sum::<usize>());

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];
            if units % 8 > 0 {
                bar.push(partial[units % 8 - 1]);
            }
            bar
        };

        let (displaced, overflow) = self.bins.split_at(self.bins.len().saturating_sub(1));
        let last_used = displaced.iter().rposition(|&c| c != 0).map_or(0, |i| i + 1);
        for (i, &count) in displaced.iter().take(last_used).enumerate() {
            println!("{:>2} | {} ({})", i, make_bar(count), count);
        }

        let of_count = overflow.first().copied().unwrap_or(0);
        println!("OF | {} ({})", make_bar(of_count), of_count);
    }
}

/// A hash table using hopscotch hashing with a bounded neighborhood and an
/// overflow store.
///
/// Every key has a home bucket chosen by the growth policy `G`. An entry always
/// lives within `N` buckets of its home, and each bucket keeps a bitmap of
/// which of the following `N` buckets hold entries that call it home, so a
/// lookup inspects at most `N` buckets. Entries that cannot be moved into their
/// neighborhood without growing the table land in the overflow store `O`, and
/// their home bucket is flagged so lookups know to search there.
///
/// ## Type parameters
///
/// - `S`: hasher builder.
/// - `G`: [`GrowthPolicy`] mapping hashes to buckets and deciding how the
///   bucket array grows.
/// - `O`: [`OverflowStore`] for displaced entries.
/// - `N`: neighborhood size, `1..=62`.
/// - `STORE_HASH`: keep the low 32 bits of each hash in its bucket. Skips most
///   key comparisons and avoids rehashing keys when the table grows. Requires a
///   mask-based growth policy.
///
/// ## Example
///
/// ```rust
/// use hopscotch_table::HashTable;
///
/// let mut table: HashTable<u64, &str> = HashTable::new();
/// let (position, inserted) = table.insert(7, "seven").unwrap();
/// assert!(inserted);
/// assert_eq!(table.get_at(position), Some((&7, &"seven")));
///
/// // Inserting an existing key leaves the table untouched.
/// let (_, inserted) = table.insert(7, "SEVEN").unwrap();
/// assert!(!inserted);
/// assert_eq!(table.get(&7), Some(&"seven"));
/// ```
#[derive(Clone)]
pub struct HashTable<
    K,
    V,
    S = DefaultHashBuilder,
    G = PowerOfTwoGrowthPolicy,
    O = ListOverflow<K, V>,
    const N: usize = DEFAULT_NEIGHBORHOOD_SIZE,
    const STORE_HASH: bool = false,
> {
    buckets: Vec<Bucket<K, V>>,
    overflow: O,

    len: usize,
    growth_policy: G,
    max_load_factor: f32,
    load_threshold: usize,

    hash_builder: S,
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> Debug
    for HashTable<K, V, S, G, O, N, STORE_HASH>
where
    K: Debug,
    V: Debug,
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;

        f.debug_struct("HashTable")
            .field(
                "metadata",
                &self
                    .buckets
                    .iter()
                    .map(|b| {
                        format!(
                            "{}{} {:0width$b}",
                            if b.is_empty() { '.' } else { 'x' },
                            if b.has_overflow() { 'o' } else { '.' },
                            b.neighbors(),
                            width = N
                        )
                    })
                    .collect::<Vec<_>>(),
            )
            .field("entries", &self.iter().collect::<Vec<_>>())
            .field("populated", &self.len)
            .field("bucket_count", &self.bucket_count())
            .field("load_threshold", &self.load_threshold)
            .field("overflow", &self.overflow.len())
            .finish()
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> HashTable<K, V, S, G, O, N, STORE_HASH>
where
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    const CHECK_PARAMS: () = {
        assert!(
            N > 0 && N <= MAX_NEIGHBORHOOD_SIZE,
            "neighborhood size must be in 1..=62"
        );
        assert!(
            !STORE_HASH || G::MASK_BASED,
            "storing hashes requires a mask-based growth policy"
        );
    };

    const MAX_PROBES_FOR_EMPTY_BUCKET: usize = 10 * N;

    fn storage_max_bucket_count() -> usize {
        let slots = if STORE_HASH {
            u32::MAX as usize
        } else {
            isize::MAX as usize / mem::size_of::<Bucket<K, V>>().max(1)
        };
        slots.saturating_sub(N - 1)
    }

    fn check_bucket_count(bucket_count: usize) -> Result<()> {
        let max_bucket_count = Self::storage_max_bucket_count();
        if bucket_count > max_bucket_count {
            return Err(Error::CapacityExceeded { max_bucket_count });
        }
        Ok(())
    }

    fn allocate_buckets(bucket_count: usize) -> Vec<Bucket<K, V>> {
        let mut buckets = Vec::new();
        buckets.resize_with(bucket_count + N - 1, Bucket::default);
        buckets
    }

    fn from_policy(growth_policy: G, hash_builder: S, overflow: O) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CHECK_PARAMS;

        let mut table = Self {
            buckets: Self::allocate_buckets(growth_policy.bucket_count()),
            overflow,
            len: 0,
            growth_policy,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            load_threshold: 0,
            hash_builder,
        };
        table.set_max_load_factor(DEFAULT_MAX_LOAD_FACTOR);
        table
    }

    /// Creates an empty table with the default bucket count and the given
    /// hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self
    where
        O: Default,
    {
        Self::from_policy(G::default(), hash_builder, O::default())
    }

    /// Creates an empty table with room for at least `bucket_count` buckets.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the growth policy or the bucket array
    /// cannot represent `bucket_count` buckets.
    pub fn with_bucket_count_and_hasher(bucket_count: usize, hash_builder: S) -> Result<Self>
    where
        O: Default,
    {
        Self::with_settings(
            bucket_count,
            hash_builder,
            DEFAULT_MAX_LOAD_FACTOR,
            O::default(),
        )
    }

    /// Creates an empty table from every tunable at once.
    ///
    /// `overflow` is typically an empty store; a comparator for an
    /// [`OrderedOverflow`] is passed this way.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the growth policy or the bucket array
    /// cannot represent `bucket_count` buckets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::DefaultHashBuilder;
    /// use hopscotch_table::HashTable;
    /// use hopscotch_table::OrderedOverflow;
    /// use hopscotch_table::PowerOfTwoGrowthPolicy;
    ///
    /// let descending = OrderedOverflow::with_comparator(|a: &u32, b: &u32| b.cmp(a));
    /// let table: HashTable<u32, (), _, PowerOfTwoGrowthPolicy, _> =
    ///     HashTable::with_settings(100, DefaultHashBuilder::default(), 0.5, descending)
    ///         .unwrap();
    /// assert_eq!(table.bucket_count(), 128);
    /// assert_eq!(table.max_load_factor(), 0.5);
    /// assert!(table.key_comp()(&1, &2).is_gt());
    /// ```
    pub fn with_settings(
        bucket_count: usize,
        hash_builder: S,
        max_load_factor: f32,
        overflow: O,
    ) -> Result<Self> {
        Self::check_bucket_count(bucket_count)?;
        let growth_policy = G::new(bucket_count)?;
        Self::check_bucket_count(growth_policy.bucket_count())?;

        let mut table = Self::from_policy(growth_policy, hash_builder, overflow);
        table.set_max_load_factor(max_load_factor);
        Ok(table)
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of entries, in buckets and in the overflow store.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Upper bound on the number of entries the table could address.
    pub fn max_size(&self) -> usize {
        isize::MAX as usize / mem::size_of::<(K, V)>().max(1)
    }

    /// Number of buckets entries can call home.
    ///
    /// The bucket array is `N - 1` buckets longer so the last home bucket
    /// still has a full neighborhood.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len() - N + 1
    }

    /// Largest bucket count the table can grow to.
    pub fn max_bucket_count(&self) -> usize {
        Self::storage_max_bucket_count().min(self.growth_policy.max_bucket_count())
    }

    /// `len() / bucket_count()`.
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.bucket_count() as f32
    }

    /// Load factor above which an insert grows the table.
    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Sets the max load factor, clamped to `[0.1, 0.95]`, and recomputes the
    /// growth threshold as `floor(bucket_count * max_load_factor)`.
    ///
    /// The table is not resized until the next insert needs room.
    pub fn set_max_load_factor(&mut self, max_load_factor: f32) {
        self.max_load_factor = if max_load_factor.is_nan() {
            DEFAULT_MAX_LOAD_FACTOR
        } else {
            max_load_factor.clamp(MIN_MAX_LOAD_FACTOR, MAX_MAX_LOAD_FACTOR)
        };
        self.load_threshold = (self.bucket_count() as f32 * self.max_load_factor) as usize;
    }

    /// Number of entries living in the overflow store.
    pub fn overflow_size(&self) -> usize {
        self.overflow.len()
    }

    /// The overflow store's entries, in store order.
    pub fn overflow_entries(&self) -> &[OverflowEntry<K, V>] {
        self.overflow.entries()
    }

    /// The hasher builder used for keys.
    pub fn hash_function(&self) -> &S {
        &self.hash_builder
    }

    /// The active growth policy.
    pub fn growth_policy(&self) -> &G {
        &self.growth_policy
    }

    /// Removes every entry, keeping the bucket count.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.overflow.clear();
        self.len = 0;
    }

    /// Swaps the contents, hasher and settings of two tables.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Position of the first entry, or [`end`](Self::end) if the table is
    /// empty.
    pub fn begin(&self) -> Position {
        match self.buckets.iter().position(|b| !b.is_empty()) {
            Some(index) => self.bucket_position(index),
            None => self.overflow_position(0),
        }
    }

    /// Position one past the last entry.
    pub fn end(&self) -> Position {
        self.overflow_position(self.overflow.len())
    }

    /// Position of the entry following `position` in iteration order.
    pub fn next_position(&self, position: Position) -> Position {
        if !position.in_overflow() {
            let start = position.bucket + 1;
            let next = self
                .buckets
                .get(start..)
                .and_then(|rest| rest.iter().position(|b| !b.is_empty()));
            return match next {
                Some(offset) => self.bucket_position(start + offset),
                None => self.overflow_position(0),
            };
        }

        self.overflow_position((position.overflow + 1).min(self.overflow.len()))
    }

    /// Entry at `position`, if it refers to one.
    pub fn get_at(&self, position: Position) -> Option<(&K, &V)> {
        if position.buckets_end != self.buckets.len() {
            return None;
        }

        if position.in_overflow() {
            self.overflow
                .entries()
                .get(position.overflow)
                .map(|e| (e.key(), e.value()))
        } else {
            self.buckets[position.bucket].get()
        }
    }

    /// Entry at `position` with a mutable value, if it refers to one.
    pub fn get_at_mut(&mut self, position: Position) -> Option<(&K, &mut V)> {
        if position.buckets_end != self.buckets.len() {
            return None;
        }

        if position.in_overflow() {
            self.overflow
                .entries_mut()
                .get_mut(position.overflow)
                .map(OverflowEntry::key_value_mut)
        } else {
            self.buckets[position.bucket].get_mut()
        }
    }

    /// Removes and returns the entry at `position`, if it refers to one.
    pub fn remove_at(&mut self, position: Position) -> Option<(K, V)> {
        if position.buckets_end != self.buckets.len() {
            return None;
        }

        if position.in_overflow() {
            (position.overflow < self.overflow.len())
                .then(|| self.erase_from_overflow(position.overflow))
        } else {
            let home = self.home_of(position.bucket)?;
            self.erase_from_bucket(position.bucket, home)
        }
    }

    /// Erases the entry at `position` and returns the position of the entry
    /// that followed it.
    pub fn erase_at(&mut self, position: Position) -> Position {
        self.remove_at(position);
        if position.in_overflow() {
            self.overflow_position(position.overflow.min(self.overflow.len()))
        } else {
            self.next_position(position)
        }
    }

    /// Erases every entry in `[first, last)` and returns the position
    /// following the erased range.
    pub fn erase_range(&mut self, first: Position, last: Position) -> Position {
        let mut position = first;
        let mut last = last;
        while position != last {
            let end = self.end();
            if position == end {
                break;
            }

            if position.in_overflow() && last.in_overflow() && last.overflow > 0 {
                last.overflow -= 1;
            }
            position = self.erase_at(position);
        }
        position
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        let mut position = self.begin();
        while let Some((key, value)) = self.get_at_mut(position) {
            position = if f(key, value) {
                self.next_position(position)
            } else {
                self.erase_at(position)
            };
        }
    }

    /// Iterates over all entries: buckets in array order, then the overflow
    /// store.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.buckets, self.overflow.entries(), self.len)
    }

    /// Iterates over all entries with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            buckets: self.buckets.iter_mut(),
            overflow: self.overflow.entries_mut().iter_mut(),
            remaining: self.len,
        }
    }

    /// Removes every entry, yielding them. The bucket count is kept.
    ///
    /// The table is empty as soon as this returns. Entries not consumed by
    /// the time the iterator is dropped are dropped with it.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        let fresh = Self::allocate_buckets(self.bucket_count());
        let buckets = mem::replace(&mut self.buckets, fresh);
        let remaining = mem::replace(&mut self.len, 0);
        Drain {
            buckets: buckets.into_iter(),
            overflow: self.overflow.take_entries().into_iter(),
            remaining,
            _table: PhantomData,
        }
    }

    /// Computes a histogram of entry displacement from the home bucket.
    ///
    /// Compiled with `cfg(test)` or the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut bins = alloc::vec![0usize; N + 1];
        for bucket in &self.buckets {
            let mut neighbors = bucket.neighbors();
            while neighbors != 0 {
                bins[neighbors.trailing_zeros() as usize] += 1;
                neighbors &= neighbors - 1;
            }
        }
        bins[N] = self.overflow.len();

        ProbeHistogram { bins }
    }

    /// Returns detailed utilization statistics for debugging.
    ///
    /// Compiled with `cfg(test)` or the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let total_slots = self.buckets.len();
        let occupied_slots = self.buckets.iter().filter(|b| !b.is_empty()).count();
        let bucket_count = self.bucket_count();

        DebugStats {
            populated: self.len,
            bucket_count,
            load_threshold: self.load_threshold,
            total_slots,
            occupied_slots,
            overflow_entries: self.overflow.len(),
            load_factor: self.len as f64 / bucket_count as f64,
            slot_utilization: occupied_slots as f64 / total_slots as f64,
            total_bytes: self.buckets.capacity() * mem::size_of::<Bucket<K, V>>()
                + self.overflow.len() * mem::size_of::<OverflowEntry<K, V>>(),
            wasted_bytes: (total_slots - occupied_slots) * mem::size_of::<(K, V)>(),
        }
    }

    #[inline(always)]
    fn bucket_for_hash(&self, hash: u64) -> usize {
        self.growth_policy.bucket_for_hash(hash)
    }

    #[inline(always)]
    fn bucket_position(&self, index: usize) -> Position {
        Position {
            bucket: index,
            buckets_end: self.buckets.len(),
            overflow: 0,
        }
    }

    #[inline(always)]
    fn overflow_position(&self, index: usize) -> Position {
        Position {
            bucket: self.buckets.len(),
            buckets_end: self.buckets.len(),
            overflow: index,
        }
    }

    /// Entry at a position the caller knows to be occupied.
    pub(crate) fn occupied_at(&self, position: Position) -> (&K, &V) {
        match self.get_at(position) {
            Some(entry) => entry,
            None => unreachable!("{position:?} does not hold an entry"),
        }
    }

    /// Entry at a position the caller knows to be occupied.
    pub(crate) fn occupied_at_mut(&mut self, position: Position) -> (&K, &mut V) {
        match self.get_at_mut(position) {
            Some(entry) => entry,
            None => unreachable!("{position:?} does not hold an entry"),
        }
    }

    /// Removes the entry at a position the caller knows to be occupied.
    pub(crate) fn remove_occupied(&mut self, position: Position) -> (K, V) {
        match self.remove_at(position) {
            Some(entry) => entry,
            None => unreachable!("{position:?} does not hold an entry"),
        }
    }

    /// Swaps the stored key at `position` for an equal one.
    pub(crate) fn replace_key_at(&mut self, position: Position, key: K) -> Option<K> {
        if position.buckets_end != self.buckets.len() {
            return None;
        }

        if position.in_overflow() {
            self.overflow
                .entries_mut()
                .get_mut(position.overflow)
                .map(|entry| entry.replace_key(key))
        } else {
            self.buckets[position.bucket].replace_key(key)
        }
    }

    /// Home bucket of the entry stored at `index`, found through the
    /// neighborhood bitmaps of the preceding buckets.
    fn home_of(&self, index: usize) -> Option<usize> {
        if self.buckets.get(index)?.is_empty() {
            return None;
        }

        (index.saturating_sub(N - 1)..=index)
            .find(|&home| self.buckets[home].check_neighbor_presence(index - home))
    }

    fn erase_from_bucket(&mut self, index: usize, home: usize) -> Option<(K, V)> {
        let entry = self.buckets[index].remove_value()?;
        self.buckets[home].toggle_neighbor_presence(index - home);
        self.len -= 1;
        Some(entry)
    }

    fn erase_from_overflow(&mut self, index: usize) -> (K, V) {
        let (hash, key, value) = self.overflow.remove(index).into_parts();
        self.len -= 1;

        let home = self.bucket_for_hash(hash);
        debug_assert!(self.buckets[home].has_overflow());
        let home_still_overflows = self
            .overflow
            .entries()
            .iter()
            .any(|entry| self.bucket_for_hash(entry.hash()) == home);
        if !home_still_overflows {
            self.buckets[home].set_overflow(false);
        }

        (key, value)
    }

    /// Index of the first empty bucket in the probe window starting at
    /// `home`.
    fn find_empty_bucket(&self, home: usize) -> Option<usize> {
        let limit = home
            .saturating_add(Self::MAX_PROBES_FOR_EMPTY_BUCKET)
            .min(self.buckets.len());
        (home..limit).find(|&index| self.buckets[index].is_empty())
    }

    /// Moves an entry from the `N - 1` buckets preceding `empty` into it,
    /// provided the entry stays in its home's neighborhood. Returns the bucket
    /// that became empty. The first candidate found is used.
    fn swap_empty_bucket_closer(&mut self, empty: usize) -> Option<usize> {
        debug_assert!(empty >= N);
        debug_assert!(self.buckets[empty].is_empty());

        for to_check in empty - N + 1..empty {
            let neighbors = self.buckets[to_check].neighbors();
            if neighbors == 0 {
                continue;
            }

            let offset = neighbors.trailing_zeros() as usize;
            let to_swap = to_check + offset;
            if to_swap >= empty {
                continue;
            }

            let (head, tail) = self.buckets.split_at_mut(empty);
            head[to_swap].swap_value_into_empty_bucket(&mut tail[0]);

            let bucket = &mut self.buckets[to_check];
            debug_assert!(!bucket.check_neighbor_presence(empty - to_check));
            bucket.toggle_neighbor_presence(empty - to_check);
            bucket.toggle_neighbor_presence(offset);

            return Some(to_swap);
        }

        None
    }

    fn insert_in_bucket(
        &mut self,
        hash: u64,
        home: usize,
        empty: usize,
        key: K,
        value: V,
    ) -> Position {
        debug_assert!(empty >= home && empty - home < N);

        self.buckets[empty].set_value::<STORE_HASH>(hash, key, value);
        self.buckets[home].toggle_neighbor_presence(empty - home);
        self.len += 1;

        self.bucket_position(empty)
    }

    #[cold]
    #[inline(never)]
    fn insert_in_overflow(&mut self, hash: u64, home: usize, key: K, value: V) -> Position {
        let index = self.overflow.insert(OverflowEntry::new(hash, key, value));
        self.buckets[home].set_overflow(true);
        self.len += 1;

        trace!(
            home,
            overflow_size = self.overflow.len(),
            "neighborhood full, entry placed in overflow store"
        );

        self.overflow_position(index)
    }

    /// Places an absent entry in its neighborhood, moving entries towards
    /// their homes to free a bucket if needed. Hands the entry back if the
    /// neighborhood cannot take it.
    fn place_in_neighborhood(
        &mut self,
        hash: u64,
        home: usize,
        key: K,
        value: V,
    ) -> Result<Position, (K, V)> {
        let Some(mut empty) = self.find_empty_bucket(home) else {
            return Err((key, value));
        };

        loop {
            if empty - home < N {
                return Ok(self.insert_in_bucket(hash, home, empty, key, value));
            }

            match self.swap_empty_bucket_closer(empty) {
                Some(closer) => empty = closer,
                None => return Err((key, value)),
            }
        }
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> HashTable<K, V, S, G, O, N, STORE_HASH>
where
    S: Default,
    G: GrowthPolicy,
    O: OverflowStore<K, V> + Default,
{
    /// Creates an empty table with the default bucket count
    /// ([`DEFAULT_INIT_BUCKETS_SIZE`](crate::DEFAULT_INIT_BUCKETS_SIZE),
    /// rounded by the growth policy) and the default hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashTable;
    ///
    /// let table: HashTable<String, u32> = HashTable::new();
    /// assert!(table.is_empty());
    /// assert_eq!(table.bucket_count(), 16);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty table with room for at least `bucket_count` buckets.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if `bucket_count` cannot be represented.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::DefaultHashBuilder;
    /// use hopscotch_table::HashTable;
    /// use hopscotch_table::PrimeGrowthPolicy;
    ///
    /// let table: HashTable<u32, u32, DefaultHashBuilder, PrimeGrowthPolicy> =
    ///     HashTable::with_bucket_count(100).unwrap();
    /// assert_eq!(table.bucket_count(), 131);
    ///
    /// assert!(HashTable::<u32, u32>::with_bucket_count(usize::MAX).is_err());
    /// ```
    pub fn with_bucket_count(bucket_count: usize) -> Result<Self> {
        Self::with_bucket_count_and_hasher(bucket_count, S::default())
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> Default
    for HashTable<K, V, S, G, O, N, STORE_HASH>
where
    S: Default,
    G: GrowthPolicy,
    O: OverflowStore<K, V> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, G, C, const N: usize, const STORE_HASH: bool>
    HashTable<K, V, S, G, OrderedOverflow<K, V, C>, N, STORE_HASH>
{
    /// The comparator ordering the overflow store.
    pub fn key_comp(&self) -> &C {
        self.overflow.key_comp()
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> HashTable<K, V, S, G, O, N, STORE_HASH>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    #[inline(always)]
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Key equality used by the table.
    pub fn key_eq(&self) -> fn(&K, &K) -> bool {
        <K as PartialEq>::eq
    }

    fn find_in_buckets(&self, key: &K, hash: u64, home: usize) -> Option<usize> {
        let mut neighbors = self.buckets[home].neighbors();
        while neighbors != 0 {
            let index = home + neighbors.trailing_zeros() as usize;
            let bucket = &self.buckets[index];
            if bucket.bucket_hash_equal::<STORE_HASH>(hash) && bucket.key() == Some(key) {
                return Some(index);
            }
            neighbors &= neighbors - 1;
        }

        None
    }

    /// Lookup starting at `home`, which must be `bucket_for_hash(hash)`.
    fn find_from_home(&self, key: &K, hash: u64, home: usize) -> Option<Position> {
        if let Some(index) = self.find_in_buckets(key, hash, home) {
            return Some(self.bucket_position(index));
        }

        if !self.buckets[home].has_overflow() {
            return None;
        }

        self.overflow
            .find(key)
            .map(|index| self.overflow_position(index))
    }

    /// Finds the position of `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashTable;
    ///
    /// let mut table: HashTable<&str, i32> = HashTable::new();
    /// table.insert("a", 1).unwrap();
    ///
    /// let position = table.find(&"a").unwrap();
    /// assert_eq!(table.get_at(position), Some((&"a", &1)));
    /// assert!(table.find(&"b").is_none());
    /// ```
    pub fn find(&self, key: &K) -> Option<Position> {
        self.find_with_hash(key, self.hash_key(key))
    }

    /// Like [`find`](Self::find) with a precomputed `hash`, which must be the
    /// table hasher's hash of `key`.
    pub fn find_with_hash(&self, key: &K, hash: u64) -> Option<Position> {
        self.find_from_home(key, hash, self.bucket_for_hash(hash))
    }

    /// Returns a reference to the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_with_hash(key, self.hash_key(key))
    }

    /// Like [`get`](Self::get) with a precomputed hash.
    pub fn get_with_hash(&self, key: &K, hash: u64) -> Option<&V> {
        self.find_with_hash(key, hash)
            .map(|position| self.occupied_at(position).1)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.find(key).map(|position| self.occupied_at(position))
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_key(key);
        self.get_mut_with_hash(key, hash)
    }

    /// Like [`get_mut`](Self::get_mut) with a precomputed hash.
    pub fn get_mut_with_hash(&mut self, key: &K, hash: u64) -> Option<&mut V> {
        let position = self.find_with_hash(key, hash)?;
        Some(self.occupied_at_mut(position).1)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Like [`contains_key`](Self::contains_key) with a precomputed hash.
    pub fn contains_key_with_hash(&self, key: &K, hash: u64) -> bool {
        self.find_with_hash(key, hash).is_some()
    }

    /// Number of entries with `key`: `0` or `1`.
    pub fn count(&self, key: &K) -> usize {
        usize::from(self.contains_key(key))
    }

    /// Like [`count`](Self::count) with a precomputed hash.
    pub fn count_with_hash(&self, key: &K, hash: u64) -> usize {
        usize::from(self.contains_key_with_hash(key, hash))
    }

    /// Checked lookup.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::Error;
    /// use hopscotch_table::HashTable;
    ///
    /// let mut table: HashTable<u8, char> = HashTable::new();
    /// table.insert(1, 'x').unwrap();
    /// assert_eq!(table.at(&1), Ok(&'x'));
    /// assert_eq!(table.at(&2), Err(Error::KeyNotFound));
    /// ```
    pub fn at(&self, key: &K) -> Result<&V> {
        self.at_with_hash(key, self.hash_key(key))
    }

    /// Like [`at`](Self::at) with a precomputed hash.
    pub fn at_with_hash(&self, key: &K, hash: u64) -> Result<&V> {
        self.get_with_hash(key, hash).ok_or(Error::KeyNotFound)
    }

    /// Checked mutable lookup.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if `key` is absent.
    pub fn at_mut(&mut self, key: &K) -> Result<&mut V> {
        let hash = self.hash_key(key);
        self.at_mut_with_hash(key, hash)
    }

    /// Like [`at_mut`](Self::at_mut) with a precomputed hash.
    pub fn at_mut_with_hash(&mut self, key: &K, hash: u64) -> Result<&mut V> {
        self.get_mut_with_hash(key, hash).ok_or(Error::KeyNotFound)
    }

    /// Range of entries equal to `key`: `[position, next)` when present,
    /// `[end, end)` otherwise.
    pub fn equal_range(&self, key: &K) -> (Position, Position) {
        self.equal_range_with_hash(key, self.hash_key(key))
    }

    /// Like [`equal_range`](Self::equal_range) with a precomputed hash.
    pub fn equal_range_with_hash(&self, key: &K, hash: u64) -> (Position, Position) {
        match self.find_with_hash(key, hash) {
            Some(position) => (position, self.next_position(position)),
            None => (self.end(), self.end()),
        }
    }

    /// Inserts `key` with `value` unless `key` is already present.
    ///
    /// Returns the position of the entry for `key` and whether an insertion
    /// took place. When `key` was present, `key` and `value` are dropped and
    /// the stored value is left unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the table needed to grow past its
    /// maximum bucket count. The table keeps its previous entries and `key`
    /// is not inserted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashTable;
    ///
    /// let mut table: HashTable<u32, &str> = HashTable::new();
    /// for i in 0..100 {
    ///     table.insert(i, "v").unwrap();
    /// }
    /// assert_eq!(table.len(), 100);
    /// assert!(table.load_factor() <= table.max_load_factor());
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<(Position, bool)> {
        let hash = self.hash_key(&key);
        self.insert_with_hash(hash, key, value)
    }

    /// Like [`insert`](Self::insert) with a precomputed hash.
    pub fn insert_with_hash(&mut self, hash: u64, key: K, value: V) -> Result<(Position, bool)> {
        let home = self.bucket_for_hash(hash);
        if let Some(position) = self.find_from_home(&key, hash, home) {
            return Ok((position, false));
        }

        self.insert_absent(hash, key, value)
            .map(|position| (position, true))
    }

    /// Same as [`insert`](Self::insert).
    pub fn emplace(&mut self, key: K, value: V) -> Result<(Position, bool)> {
        self.insert(key, value)
    }

    /// Inserts unless `key` is present, skipping the lookup when `hint`
    /// already holds `key`. Returns the position of the entry for `key`.
    pub fn insert_with_hint(&mut self, hint: Position, key: K, value: V) -> Result<Position> {
        if self.key_at(hint) == Some(&key) {
            return Ok(hint);
        }

        self.insert(key, value).map(|(position, _)| position)
    }

    /// Same as [`insert_with_hint`](Self::insert_with_hint).
    pub fn emplace_hint(&mut self, hint: Position, key: K, value: V) -> Result<Position> {
        self.insert_with_hint(hint, key, value)
    }

    /// Inserts a value built by `make_value` unless `key` is present.
    /// `make_value` is not called when `key` is present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashTable;
    ///
    /// let mut table: HashTable<&str, Vec<u8>> = HashTable::new();
    /// let (_, inserted) = table.try_emplace("k", || vec![1, 2]).unwrap();
    /// assert!(inserted);
    /// let (_, inserted) = table.try_emplace("k", || unreachable!()).unwrap();
    /// assert!(!inserted);
    /// ```
    pub fn try_emplace(
        &mut self,
        key: K,
        make_value: impl FnOnce() -> V,
    ) -> Result<(Position, bool)> {
        let hash = self.hash_key(&key);
        if let Some(position) = self.find_with_hash(&key, hash) {
            return Ok((position, false));
        }

        self.insert_absent(hash, key, make_value())
            .map(|position| (position, true))
    }

    /// [`try_emplace`](Self::try_emplace) skipping the lookup when `hint`
    /// already holds `key`.
    pub fn try_emplace_with_hint(
        &mut self,
        hint: Position,
        key: K,
        make_value: impl FnOnce() -> V,
    ) -> Result<Position> {
        if self.key_at(hint) == Some(&key) {
            return Ok(hint);
        }

        self.try_emplace(key, make_value)
            .map(|(position, _)| position)
    }

    /// Inserts `key` with `value`, or assigns `value` to the existing entry.
    /// The returned flag is `true` if a new entry was created.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Result<(Position, bool)> {
        let hash = self.hash_key(&key);
        if let Some(position) = self.find_with_hash(&key, hash) {
            *self.occupied_at_mut(position).1 = value;
            return Ok((position, false));
        }

        self.insert_absent(hash, key, value)
            .map(|position| (position, true))
    }

    /// [`insert_or_assign`](Self::insert_or_assign) skipping the lookup when
    /// `hint` already holds `key`.
    pub fn insert_or_assign_with_hint(
        &mut self,
        hint: Position,
        key: K,
        value: V,
    ) -> Result<Position> {
        if self.key_at(hint) == Some(&key) {
            *self.occupied_at_mut(hint).1 = value;
            return Ok(hint);
        }

        self.insert_or_assign(key, value)
            .map(|(position, _)| position)
    }

    /// Inserts every entry of `entries` whose key is not yet present.
    ///
    /// Reserves room up front when the iterator's size hint exceeds the free
    /// room before the next growth.
    ///
    /// # Errors
    ///
    /// Stops at the first [`Error::CapacityExceeded`]. Entries inserted
    /// before the failure stay in the table.
    pub fn insert_range(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        let entries = entries.into_iter();
        let (additional, _) = entries.size_hint();
        let free = self
            .load_threshold
            .saturating_sub(self.len - self.overflow.len());
        if additional > 0 && free < additional {
            self.reserve(self.len.saturating_add(additional))?;
        }

        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Returns the value for `key`, inserting `V::default()` first if needed.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if inserting needed to grow the table past
    /// its maximum bucket count.
    pub fn get_or_insert_default(&mut self, key: K) -> Result<&mut V>
    where
        V: Default,
    {
        let (position, _) = self.try_emplace(key, V::default)?;
        Ok(self.occupied_at_mut(position).1)
    }

    /// Removes `key`, returning the number of erased entries (`0` or `1`).
    pub fn erase(&mut self, key: &K) -> usize {
        usize::from(self.remove_entry(key).is_some())
    }

    /// Like [`erase`](Self::erase) with a precomputed hash.
    pub fn erase_with_hash(&mut self, key: &K, hash: u64) -> usize {
        usize::from(self.remove_entry_with_hash(key, hash).is_some())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hash_key(key);
        self.remove_entry_with_hash(key, hash)
    }

    /// Like [`remove_entry`](Self::remove_entry) with a precomputed hash.
    pub fn remove_entry_with_hash(&mut self, key: &K, hash: u64) -> Option<(K, V)> {
        let home = self.bucket_for_hash(hash);
        if let Some(index) = self.find_in_buckets(key, hash, home) {
            return self.erase_from_bucket(index, home);
        }

        if !self.buckets[home].has_overflow() {
            return None;
        }

        let index = self.overflow.find(key)?;
        Some(self.erase_from_overflow(index))
    }

    /// Rebuilds the table with at least `bucket_count` buckets, and never
    /// fewer than needed to hold the current entries at the max load factor.
    ///
    /// May shrink the table. `rehash(0)` compacts it to the smallest size
    /// holding its entries.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the bucket count cannot be represented.
    /// The table is left unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashTable;
    ///
    /// let mut table: HashTable<u32, ()> = HashTable::new();
    /// table.rehash(1000).unwrap();
    /// assert_eq!(table.bucket_count(), 1024);
    ///
    /// table.insert(1, ()).unwrap();
    /// table.rehash(0).unwrap();
    /// assert_eq!(table.bucket_count(), 2);
    /// assert!(table.contains_key(&1));
    /// ```
    pub fn rehash(&mut self, bucket_count: usize) -> Result<()> {
        let bucket_count = bucket_count.max(min_bucket_count_for(self.len, self.max_load_factor));
        self.rehash_internal(bucket_count)
    }

    /// Makes room for at least `count` entries without growing on insert.
    /// Never shrinks the table.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the bucket count cannot be represented.
    /// The table is left unchanged.
    pub fn reserve(&mut self, count: usize) -> Result<()> {
        let bucket_count = min_bucket_count_for(count, self.max_load_factor);
        if bucket_count <= self.bucket_count() {
            return Ok(());
        }
        self.rehash(bucket_count)
    }

    /// Shrinks the bucket array as far as the current entries allow.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] only if the current entries already need
    /// more buckets than the table can represent.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.rehash(0)
    }

    /// The key stored at `position`, if it still refers to an entry.
    pub fn key_at(&self, position: Position) -> Option<&K> {
        self.get_at(position).map(|(key, _)| key)
    }

    fn grow(&mut self) -> Result<()> {
        let bucket_count = self.growth_policy.next_bucket_count().inspect_err(|err| {
            debug!(
                bucket_count = self.bucket_count(),
                len = self.len,
                %err,
                "growth policy refused to grow"
            );
        })?;
        self.rehash_internal(bucket_count)
    }

    /// Inserts a key known to be absent, growing the table first if the
    /// bucket-resident entries would exceed the load threshold.
    pub(crate) fn insert_absent(&mut self, hash: u64, key: K, value: V) -> Result<Position> {
        if self.len - self.overflow.len() + 1 > self.load_threshold {
            self.grow()?;
        }

        let (mut key, mut value) = (key, value);
        loop {
            let home = self.bucket_for_hash(hash);
            match self.place_in_neighborhood(hash, home, key, value) {
                Ok(position) => return Ok(position),
                Err(entry) => (key, value) = entry,
            }

            if self.load_factor() < O::MIN_LOAD_FACTOR_FOR_REHASH
                || !self.will_neighborhood_change_on_rehash(home)?
            {
                return Ok(self.insert_in_overflow(hash, home, key, value));
            }

            self.grow()?;
        }
    }

    /// Returns `true` if growing would move at least one entry of the full
    /// neighborhood of `home` to a different home. Otherwise growing cannot
    /// make room there and the overflow store is used instead.
    fn will_neighborhood_change_on_rehash(&self, home: usize) -> Result<bool> {
        let grown = G::new(self.growth_policy.next_bucket_count()?)?;

        let end = (home + N).min(self.buckets.len());
        for bucket in &self.buckets[home..end] {
            if let Some(key) = bucket.key() {
                let hash = self.hash_key(key);
                if self.bucket_for_hash(hash) != grown.bucket_for_hash(hash) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    fn rehash_internal(&mut self, bucket_count: usize) -> Result<()> {
        Self::check_bucket_count(bucket_count)?;
        let growth_policy = G::new(bucket_count)?;
        Self::check_bucket_count(growth_policy.bucket_count())?;

        debug!(
            old_bucket_count = self.bucket_count(),
            new_bucket_count = growth_policy.bucket_count(),
            len = self.len,
            overflow_size = self.overflow.len(),
            "rehashing hopscotch table"
        );

        let buckets = Self::allocate_buckets(growth_policy.bucket_count());
        let old_buckets = mem::replace(&mut self.buckets, buckets);
        let old_overflow = self.overflow.take_entries();
        self.growth_policy = growth_policy;
        self.len = 0;
        self.set_max_load_factor(self.max_load_factor);

        for bucket in old_buckets {
            let stored_hash = bucket.truncated_hash();
            let Some((key, value)) = bucket.into_entry() else {
                continue;
            };

            let hash = if STORE_HASH {
                u64::from(stored_hash)
            } else {
                self.hash_key(&key)
            };
            let home = self.bucket_for_hash(hash);
            if let Err((key, value)) = self.place_in_neighborhood(hash, home, key, value) {
                self.insert_in_overflow(hash, home, key, value);
            }
        }

        for entry in old_overflow {
            let home = self.bucket_for_hash(entry.hash());
            self.buckets[home].set_overflow(true);
            self.overflow.insert(entry);
            self.len += 1;
        }

        Ok(())
    }

    /// Checks the size, neighborhood and overflow-flag invariants.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let occupied = self.buckets.iter().filter(|b| !b.is_empty()).count();
        assert_eq!(occupied + self.overflow.len(), self.len, "size mismatch");
        assert_eq!(self.bucket_count(), self.growth_policy.bucket_count());

        let mut neighbor_bits = 0;
        for (home, bucket) in self.buckets.iter().enumerate() {
            let mut neighbors = bucket.neighbors();
            neighbor_bits += neighbors.count_ones() as usize;
            while neighbors != 0 {
                let offset = neighbors.trailing_zeros() as usize;
                assert!(offset < N, "bit {offset} set in bucket {home}");
                let key = self.buckets[home + offset]
                    .key()
                    .unwrap_or_else(|| {
                        panic!("bucket {home} points at empty bucket {}", home + offset)
                    });
                assert_eq!(self.bucket_for_hash(self.hash_key(key)), home);
                neighbors &= neighbors - 1;
            }
        }
        assert_eq!(neighbor_bits, occupied, "spurious or missing neighbor bits");

        for (index, bucket) in self.buckets.iter().enumerate() {
            if let Some(key) = bucket.key() {
                let hash = self.hash_key(key);
                let home = self.bucket_for_hash(hash);
                assert!(index >= home && index - home < N);
                assert!(self.buckets[home].check_neighbor_presence(index - home));
                if STORE_HASH {
                    assert_eq!(bucket.truncated_hash(), hash as u32);
                }
            }
        }

        for entry in self.overflow.entries() {
            let hash = self.hash_key(entry.key());
            assert_eq!(self.bucket_for_hash(entry.hash()), self.bucket_for_hash(hash));
        }
        for (index, bucket) in self.buckets.iter().enumerate() {
            let expected = self
                .overflow
                .entries()
                .iter()
                .any(|entry| self.bucket_for_hash(entry.hash()) == index);
            assert_eq!(bucket.has_overflow(), expected, "overflow flag of bucket {index}");
        }
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> PartialEq
    for HashTable<K, V, S, G, O, N, STORE_HASH>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> Eq
    for HashTable<K, V, S, G, O, N, STORE_HASH>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> Extend<(K, V)>
    for HashTable<K, V, S, G, O, N, STORE_HASH>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    /// Inserts every entry whose key is not yet present.
    ///
    /// # Panics
    ///
    /// Panics if the table cannot grow large enough.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        if let Err(err) = self.insert_range(iter) {
            panic!("{err}");
        }
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> FromIterator<(K, V)>
    for HashTable<K, V, S, G, O, N, STORE_HASH>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    G: GrowthPolicy,
    O: OverflowStore<K, V> + Default,
{
    /// # Panics
    ///
    /// Panics if the table cannot grow large enough.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

impl<'a, K, V, S, G, O, const N: usize, const STORE_HASH: bool> IntoIterator
    for &'a HashTable<K, V, S, G, O, N, STORE_HASH>
where
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, G, O, const N: usize, const STORE_HASH: bool> IntoIterator
    for &'a mut HashTable<K, V, S, G, O, N, STORE_HASH>
where
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S, G, O, const N: usize, const STORE_HASH: bool> IntoIterator
    for HashTable<K, V, S, G, O, N, STORE_HASH>
where
    G: GrowthPolicy,
    O: OverflowStore<K, V>,
{
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(mut self) -> Self::IntoIter {
        let overflow = self.overflow.take_entries();
        IntoIter {
            buckets: mem::take(&mut self.buckets).into_iter(),
            overflow: overflow.into_iter(),
            remaining: self.len,
        }
    }
}

/// An iterator over the entries of a [`HashTable`].
///
/// Two iterators over the same table compare equal when they are at the same
/// [`Position`].
pub struct Iter<'a, K, V> {
    buckets: &'a [Bucket<K, V>],
    overflow: &'a [OverflowEntry<K, V>],
    position: Position,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn new(
        buckets: &'a [Bucket<K, V>],
        overflow: &'a [OverflowEntry<K, V>],
        remaining: usize,
    ) -> Self {
        let mut iter = Self {
            buckets,
            overflow,
            position: Position {
                bucket: 0,
                buckets_end: buckets.len(),
                overflow: 0,
            },
            remaining,
        };
        iter.skip_empty_buckets();
        iter
    }

    fn skip_empty_buckets(&mut self) {
        while self.position.bucket < self.position.buckets_end
            && self.buckets[self.position.bucket].is_empty()
        {
            self.position.bucket += 1;
        }
    }

    /// Position of the entry the next call to `next` yields, or the table's
    /// end.
    pub fn position(&self) -> Position {
        self.position
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets,
            overflow: self.overflow,
            position: self.position,
            remaining: self.remaining,
        }
    }
}

impl<K, V> PartialEq for Iter<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = if !self.position.in_overflow() {
            let entry = self.buckets[self.position.bucket].get();
            self.position.bucket += 1;
            self.skip_empty_buckets();
            entry
        } else {
            let entry = self.overflow.get(self.position.overflow)?;
            self.position.overflow += 1;
            Some((entry.key(), entry.value()))
        };

        self.remaining = self.remaining.saturating_sub(1);
        entry
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the entries of a [`HashTable`].
pub struct IterMut<'a, K, V> {
    buckets: core::slice::IterMut<'a, Bucket<K, V>>,
    overflow: core::slice::IterMut<'a, OverflowEntry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self
            .buckets
            .by_ref()
            .find_map(|bucket| bucket.get_mut())
            .or_else(|| self.overflow.next().map(OverflowEntry::key_value_mut))?;

        self.remaining = self.remaining.saturating_sub(1);
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// A draining iterator over the entries of a [`HashTable`].
pub struct Drain<'a, K, V> {
    buckets: alloc::vec::IntoIter<Bucket<K, V>>,
    overflow: alloc::vec::IntoIter<OverflowEntry<K, V>>,
    remaining: usize,
    _table: PhantomData<&'a mut (K, V)>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self
            .buckets
            .by_ref()
            .find_map(Bucket::into_entry)
            .or_else(|| {
                self.overflow.next().map(|entry| {
                    let (_, key, value) = entry.into_parts();
                    (key, value)
                })
            })?;

        self.remaining = self.remaining.saturating_sub(1);
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}

impl<K, V> FusedIterator for Drain<'_, K, V> {}

/// An owning iterator over the entries of a [`HashTable`].
pub struct IntoIter<K, V> {
    buckets: alloc::vec::IntoIter<Bucket<K, V>>,
    overflow: alloc::vec::IntoIter<OverflowEntry<K, V>>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self
            .buckets
            .by_ref()
            .find_map(Bucket::into_entry)
            .or_else(|| {
                self.overflow.next().map(|entry| {
                    let (_, key, value) = entry.into_parts();
                    (key, value)
                })
            })?;

        self.remaining = self.remaining.saturating_sub(1);
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> FusedIterator for IntoIter<K, V> {}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cmp::Ordering;
    use core::hash::Hasher;

    use rand::RngCore;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::growth_policy::ModGrowthPolicy;
    use crate::growth_policy::PrimeGrowthPolicy;
    use crate::overflow::KeyCompare;

    #[derive(Clone)]
    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl Default for HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }
    }

    impl BuildHasher for HashState {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    /// Hashes an integer key to `(key % modulus) * multiplier`, for steering
    /// keys into chosen buckets.
    #[derive(Clone, Default)]
    struct CraftedState {
        modulus: u64,
        multiplier: u64,
    }

    impl CraftedState {
        fn constant() -> Self {
            Self {
                modulus: 1,
                multiplier: 1,
            }
        }

        fn modulo(modulus: u64) -> Self {
            Self {
                modulus,
                multiplier: 1,
            }
        }

        fn spread(multiplier: u64) -> Self {
            Self {
                modulus: u64::MAX,
                multiplier,
            }
        }
    }

    struct CraftedHasher {
        state: CraftedState,
        value: u64,
    }

    impl Hasher for CraftedHasher {
        fn finish(&self) -> u64 {
            (self.value % self.state.modulus).wrapping_mul(self.state.multiplier)
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.value = self.value.rotate_left(8) ^ u64::from(b);
            }
        }

        fn write_u64(&mut self, value: u64) {
            self.value = value;
        }
    }

    impl BuildHasher for CraftedState {
        type Hasher = CraftedHasher;

        fn build_hasher(&self) -> Self::Hasher {
            CraftedHasher {
                state: self.clone(),
                value: 0,
            }
        }
    }

    type Crafted<const N: usize, O = ListOverflow<u64, u64>> =
        HashTable<u64, u64, CraftedState, PowerOfTwoGrowthPolicy, O, N>;

    /// Prime policy that refuses to grow past 37 buckets.
    #[derive(Clone, Debug, Default)]
    struct CappedPolicy(PrimeGrowthPolicy);

    impl GrowthPolicy for CappedPolicy {
        fn new(min_bucket_count: usize) -> Result<Self> {
            if min_bucket_count > 37 {
                return Err(Error::CapacityExceeded {
                    max_bucket_count: 37,
                });
            }
            PrimeGrowthPolicy::new(min_bucket_count).map(Self)
        }

        fn bucket_count(&self) -> usize {
            self.0.bucket_count()
        }

        fn bucket_for_hash(&self, hash: u64) -> usize {
            self.0.bucket_for_hash(hash)
        }

        fn next_bucket_count(&self) -> Result<usize> {
            let next = self.0.next_bucket_count()?;
            if next > 37 {
                return Err(Error::CapacityExceeded {
                    max_bucket_count: 37,
                });
            }
            Ok(next)
        }

        fn max_bucket_count(&self) -> usize {
            37
        }
    }

    #[test]
    fn insert_and_find() {
        let mut table: HashTable<u64, i32, HashState> = HashTable::new();
        for k in 0..32u64 {
            let (position, inserted) = table.insert(k, (k as i32) * 2).unwrap();
            assert!(inserted, "{:#?}", table);
            assert_eq!(table.get_at(position), Some((&k, &((k as i32) * 2))));
        }
        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            assert_eq!(table.get(&k), Some(&((k as i32) * 2)), "{:#?}", table);
        }
        assert!(table.get(&999).is_none());
        table.assert_invariants();
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut table: HashTable<u64, i32, HashState> = HashTable::new();
        let (first, inserted) = table.insert(42, 7).unwrap();
        assert!(inserted);

        let (second, inserted) = table.insert(42, 11).unwrap();
        assert!(!inserted);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&42), Some(&7));
    }

    #[test]
    fn insert_or_assign_overwrites() {
        let mut table: HashTable<u64, i32, HashState> = HashTable::new();
        assert!(table.insert_or_assign(1, 1).unwrap().1);
        assert!(!table.insert_or_assign(1, 2).unwrap().1);
        assert_eq!(table.get(&1), Some(&2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn try_emplace_builds_lazily() {
        let mut table: HashTable<u64, String, HashState> = HashTable::new();
        let mut calls = 0;
        for _ in 0..3 {
            table
                .try_emplace(5, || {
                    calls += 1;
                    "five".to_string()
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        assert_eq!(table.get(&5).map(String::as_str), Some("five"));
    }

    #[test]
    fn hinted_inserts() {
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        let (position, _) = table.insert(3, 30).unwrap();

        assert_eq!(table.insert_with_hint(position, 3, 99).unwrap(), position);
        assert_eq!(table.get(&3), Some(&30));

        assert_eq!(table.insert_or_assign_with_hint(position, 3, 31).unwrap(), position);
        assert_eq!(table.get(&3), Some(&31));

        let other = table.emplace_hint(position, 4, 40).unwrap();
        assert_eq!(table.get_at(other), Some((&4, &40)));

        let lazy = table.try_emplace_with_hint(table.end(), 5, || 50).unwrap();
        assert_eq!(table.get_at(lazy), Some((&5, &50)));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn precomputed_hash_lookups() {
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        let hash = table.hash_function().hash_one(9u64);
        table.insert_with_hash(hash, 9, 90).unwrap();

        assert_eq!(table.get_with_hash(&9, hash), Some(&90));
        assert_eq!(table.count_with_hash(&9, hash), 1);
        assert!(table.contains_key_with_hash(&9, hash));
        assert_eq!(table.at_with_hash(&9, hash), Ok(&90));
        *table.at_mut_with_hash(&9, hash).unwrap() += 1;
        assert_eq!(table.get(&9), Some(&91));

        let (first, last) = table.equal_range_with_hash(&9, hash);
        assert_eq!(table.next_position(first), last);
        assert_eq!(table.erase_with_hash(&9, hash), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn at_reports_missing_keys() {
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        table.insert(1, 10).unwrap();
        assert_eq!(table.at(&1), Ok(&10));
        assert_eq!(table.at(&2), Err(Error::KeyNotFound));
        assert_eq!(table.at_mut(&2), Err(Error::KeyNotFound));
        assert_eq!(table.count(&1), 1);
        assert_eq!(table.count(&2), 0);
    }

    #[test]
    fn get_or_insert_default_inserts_once() {
        let mut table: HashTable<&str, u32, HashState> = HashTable::new();
        *table.get_or_insert_default("hits").unwrap() += 1;
        *table.get_or_insert_default("hits").unwrap() += 1;
        assert_eq!(table.get(&"hits"), Some(&2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn equal_range_of_missing_key_is_empty() {
        let mut table: HashTable<u64, (), HashState> = HashTable::new();
        table.insert(1, ()).unwrap();
        let (first, last) = table.equal_range(&2);
        assert_eq!(first, table.end());
        assert_eq!(last, table.end());

        let (first, last) = table.equal_range(&1);
        assert_eq!(table.get_at(first), Some((&1, &())));
        assert_eq!(last, table.end());
    }

    #[test]
    fn erase_round_trip() {
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        for k in 0..64 {
            table.insert(k, k).unwrap();
        }

        for k in 0..64 {
            assert_eq!(table.erase(&k), 1);
            assert!(table.find(&k).is_none());
            assert_eq!(table.erase(&k), 0);

            assert!(table.insert(k, k + 100).unwrap().1);
            assert_eq!(table.get(&k), Some(&(k + 100)));
        }
        table.assert_invariants();
    }

    #[test]
    fn colliding_keys_fill_neighborhood_then_overflow() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::constant());
        assert_eq!(table.bucket_count(), 16);

        for k in 0..16u64 {
            let (position, inserted) = table.insert(k, k * 10).unwrap();
            assert!(inserted);
            if k < 4 {
                assert_eq!(position.bucket_index(), Some(k as usize), "{:#?}", table);
            } else {
                assert_eq!(position.overflow_index(), Some(k as usize - 4), "{:#?}", table);
            }

            for seen in 0..=k {
                assert_eq!(table.get(&seen), Some(&(seen * 10)), "{:#?}", table);
            }
            table.assert_invariants();
        }

        assert_eq!(table.bucket_count(), 16);
        assert_eq!(table.overflow_size(), 12);
        assert!(table.buckets[0].has_overflow());
        assert_eq!(table.probe_histogram().bins(), &[1, 1, 1, 1, 12]);
    }

    #[test]
    fn colliding_keys_spread_by_rehash() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::spread(16));
        for k in 0..16u64 {
            table.insert(k, k).unwrap();
            table.assert_invariants();
        }

        assert!(table.bucket_count() > 16, "{:#?}", table);
        for k in 0..16u64 {
            assert_eq!(table.get(&k), Some(&k));
        }
    }

    #[test]
    fn displaced_entries_are_swapped_home() {
        // Ten homes with ten keys each in a neighborhood of four.
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::modulo(10));
        for k in 0..100u64 {
            table.insert(k, k).unwrap();
            table.assert_invariants();
        }

        let histogram = table.probe_histogram();
        assert!(histogram.bins()[1..4].iter().any(|&c| c > 0), "{histogram:?}");
        assert!(histogram.overflow() > 0);
        assert_eq!(table.bucket_count(), 16);
    }

    #[test]
    fn random_keys_grow_by_doubling() {
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        table.set_max_load_factor(0.95);

        let mut keys = Vec::new();
        let mut bucket_count = table.bucket_count();
        while keys.len() < 1000 {
            let key = rng.next_u64();
            if !table.insert(key, key ^ 0xFF).unwrap().1 {
                continue;
            }
            keys.push(key);

            let grown = table.bucket_count();
            if grown != bucket_count {
                assert_eq!(grown, bucket_count * 2);
                bucket_count = grown;
            }
            assert!(table.load_factor() <= table.max_load_factor());
        }

        assert_eq!(table.len(), 1000);
        assert!(table.bucket_count() >= 1024);
        assert!(table.bucket_count().is_power_of_two());
        for key in keys {
            assert_eq!(table.get(&key), Some(&(key ^ 0xFF)));
        }
        table.assert_invariants();
    }

    #[test]
    fn erasing_overflow_clears_flags() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::modulo(10));
        for k in 0..100u64 {
            table.insert(k, k).unwrap();
        }
        assert!(table.overflow_size() > 0);

        for k in (0..100u64).step_by(2) {
            assert_eq!(table.erase(&k), 1);
            table.assert_invariants();
        }

        for k in 0..100u64 {
            assert_eq!(table.contains_key(&k), k % 2 == 1, "{k}");
        }
        for home in 0..10 {
            assert_eq!(table.buckets[home].has_overflow(), home % 2 == 1, "{:#?}", table);
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn prime_policy_exhaustion_keeps_table_intact() {
        let mut table: HashTable<u64, u64, HashState, PrimeGrowthPolicy> = HashTable::new();
        for k in 0..100 {
            table.insert(k, k).unwrap();
        }
        let bucket_count = table.bucket_count();

        assert_eq!(
            table.rehash(4_294_967_292),
            Err(Error::CapacityExceeded {
                max_bucket_count: 4_294_967_291
            })
        );
        assert!(matches!(
            table.rehash(usize::MAX),
            Err(Error::CapacityExceeded { .. })
        ));
        assert_eq!(table.bucket_count(), bucket_count);
        assert_eq!(table.len(), 100);
        for k in 0..100 {
            assert_eq!(table.get(&k), Some(&k));
        }

        table.insert(100, 100).unwrap();
        assert_eq!(table.erase(&0), 1);
        table.assert_invariants();
    }

    #[test]
    fn growth_failure_on_insert_keeps_table_intact() {
        let mut table: HashTable<u64, u64, HashState, CappedPolicy> = HashTable::new();
        let mut failed_at = None;
        for k in 0..100u64 {
            match table.insert(k, k) {
                Ok((_, inserted)) => assert!(inserted),
                Err(err) => {
                    assert_eq!(
                        err,
                        Error::CapacityExceeded {
                            max_bucket_count: 37
                        }
                    );
                    failed_at = Some(k);
                    break;
                }
            }
        }

        assert_eq!(failed_at, Some(35));
        assert_eq!(table.len(), 35);
        assert_eq!(table.bucket_count(), 37);
        assert!(!table.contains_key(&35));
        for k in 0..35 {
            assert_eq!(table.get(&k), Some(&k));
        }
        table.assert_invariants();

        assert_eq!(table.erase(&0), 1);
        assert!(table.insert(35, 35).unwrap().1);
        assert_eq!(table.get(&35), Some(&35));
    }

    #[test]
    fn ordered_overflow_exposes_comparator() {
        let mut table: Crafted<4, OrderedOverflow<u64, u64>> =
            HashTable::with_hasher(CraftedState::constant());
        assert_eq!(table.key_comp().compare(&1u64, &2u64), Ordering::Less);

        for k in (0..12u64).rev() {
            table.insert(k, k + 1).unwrap();
        }
        table.assert_invariants();

        assert_eq!(table.overflow_size(), 8);
        let overflow = table.overflow_entries();
        assert!(
            overflow
                .windows(2)
                .all(|w| table.key_comp().compare(w[0].key(), w[1].key()) == Ordering::Less)
        );
        for k in 0..12u64 {
            assert_eq!(table.get(&k), Some(&(k + 1)));
        }
    }

    #[test]
    fn ordered_overflow_with_custom_comparator() {
        type Descending = fn(&u64, &u64) -> Ordering;
        fn descending(a: &u64, b: &u64) -> Ordering {
            b.cmp(a)
        }

        let mut table: Crafted<4, OrderedOverflow<u64, u64, Descending>> = HashTable::with_settings(
            16,
            CraftedState::constant(),
            DEFAULT_MAX_LOAD_FACTOR,
            OrderedOverflow::with_comparator(descending as Descending),
        )
        .unwrap();

        for k in 0..10u64 {
            table.insert(k, k).unwrap();
        }
        let keys: Vec<u64> = table.overflow_entries().iter().map(|e| *e.key()).collect();
        assert_eq!(keys, vec![9, 8, 7, 6, 5, 4]);
        assert_eq!((table.key_comp())(&1, &2), Ordering::Greater);

        table.rehash(64).unwrap();
        let keys: Vec<u64> = table.overflow_entries().iter().map(|e| *e.key()).collect();
        assert_eq!(keys, vec![9, 8, 7, 6, 5, 4]);
        table.assert_invariants();
    }

    #[test]
    fn store_hash_round_trip() {
        let mut table: HashTable<
            u64,
            u64,
            HashState,
            PowerOfTwoGrowthPolicy,
            ListOverflow<u64, u64>,
            8,
            true,
        > = HashTable::new();
        for k in 0..2000 {
            table.insert(k, k * 3).unwrap();
        }
        table.assert_invariants();
        for k in 0..2000 {
            assert_eq!(table.get(&k), Some(&(k * 3)));
        }
        assert!(table.max_bucket_count() <= u32::MAX as usize);
    }

    #[test]
    fn mod_policy_table() {
        let mut table: HashTable<u64, u64, HashState, ModGrowthPolicy> = HashTable::new();
        for k in 0..500 {
            table.insert(k, k).unwrap();
        }
        table.assert_invariants();
        assert_eq!(table.len(), 500);
        assert_eq!(table.bucket_count(), 620);
    }

    #[test]
    fn rehash_and_reserve() {
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        table.reserve(1000).unwrap();
        assert_eq!(table.bucket_count(), 2048);
        table.reserve(10).unwrap();
        assert_eq!(table.bucket_count(), 2048);

        for k in 0..100 {
            table.insert(k, k).unwrap();
        }
        table.rehash(0).unwrap();
        assert_eq!(table.bucket_count(), 128);
        table.assert_invariants();

        table.shrink_to_fit().unwrap();
        assert_eq!(table.len(), 100);
        assert!(table.rehash(usize::MAX).is_err());
        assert_eq!(table.bucket_count(), 128);
    }

    #[test]
    fn max_load_factor_is_clamped() {
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        table.set_max_load_factor(2.0);
        assert_eq!(table.max_load_factor(), 0.95);
        table.set_max_load_factor(0.0);
        assert_eq!(table.max_load_factor(), 0.1);
        table.set_max_load_factor(0.5);
        assert_eq!(table.max_load_factor(), 0.5);

        for k in 0..100 {
            table.insert(k, k).unwrap();
            assert!(table.load_factor() <= 0.5);
        }
    }

    #[test]
    fn construction_limits() {
        type Table = HashTable<u64, u64, HashState>;
        assert!(matches!(
            Table::with_bucket_count(usize::MAX),
            Err(Error::CapacityExceeded { .. })
        ));

        let table = Table::with_bucket_count(100).unwrap();
        assert_eq!(table.bucket_count(), 128);
        assert_eq!(table.buckets.len(), 128 + DEFAULT_NEIGHBORHOOD_SIZE - 1);
        assert!(table.max_bucket_count() >= table.bucket_count());
        assert!(table.max_size() > 0);
    }

    #[test]
    fn positions_walk_buckets_then_overflow() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::constant());
        for k in 0..6u64 {
            table.insert(k, k).unwrap();
        }

        let mut seen = Vec::new();
        let mut position = table.begin();
        while position != table.end() {
            seen.push(*table.get_at(position).unwrap().0);
            position = table.next_position(position);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(table.next_position(table.end()), table.end());
        assert_eq!(table.key_at(table.find(&5).unwrap()), Some(&5));
        assert_eq!(table.key_at(table.end()), None);

        let mut iter = table.iter();
        assert_eq!(iter.position(), table.begin());
        iter.nth(4);
        assert_eq!(iter.position().overflow_index(), Some(1));
        let rest: Vec<_> = iter.clone().collect();
        assert_eq!(rest, vec![(&5, &5)]);
        iter.next();
        assert_eq!(iter.position(), table.end());
    }

    #[test]
    fn empty_table_positions() {
        let table: HashTable<u64, u64, HashState> = HashTable::new();
        assert_eq!(table.begin(), table.end());
        assert!(table.get_at(table.begin()).is_none());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn erase_at_returns_next() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::constant());
        for k in 0..8u64 {
            table.insert(k, k).unwrap();
        }

        let position = table.find(&1).unwrap();
        let next = table.erase_at(position);
        assert_eq!(table.get_at(next), Some((&2, &2)));

        let position = table.find(&5).unwrap();
        let next = table.erase_at(position);
        assert_eq!(table.get_at(next), Some((&6, &6)));
        assert_eq!(table.len(), 6);
        table.assert_invariants();
    }

    #[test]
    fn erase_range_across_overflow() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::constant());
        for k in 0..10u64 {
            table.insert(k, k).unwrap();
        }

        let first = table.find(&2).unwrap();
        let last = table.find(&7).unwrap();
        let after = table.erase_range(first, last);
        assert_eq!(table.get_at(after), Some((&7, &7)));

        let mut left: Vec<u64> = table.iter().map(|(k, _)| *k).collect();
        left.sort_unstable();
        assert_eq!(left, vec![0, 1, 7, 8, 9]);
        table.assert_invariants();

        let end = table.erase_range(table.begin(), table.end());
        assert_eq!(end, table.end());
        assert!(table.is_empty());
        assert!(!table.buckets[0].has_overflow());
    }

    #[test]
    fn retain_and_drain() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::modulo(5));
        for k in 0..40u64 {
            table.insert(k, k).unwrap();
        }

        table.retain(|k, v| {
            *v += 1;
            k % 3 == 0
        });
        table.assert_invariants();
        assert_eq!(table.len(), 14);
        assert!(table.iter().all(|(k, v)| k % 3 == 0 && *v == k + 1));

        let mut drained: Vec<(u64, u64)> = table.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained.len(), 14);
        assert_eq!(drained[0], (0, 1));
        assert!(table.is_empty());
        table.assert_invariants();

        table.insert(3, 3).unwrap();
        {
            let mut drain = table.drain();
            assert_eq!(drain.len(), 1);
            drain.next();
        }
        table.assert_invariants();
    }

    #[test]
    fn partially_consumed_drain_empties_table() {
        let mut table: HashTable<u64, String, HashState> = HashTable::new();
        for k in 0..50 {
            table.insert(k, k.to_string()).unwrap();
        }
        let taken: Vec<_> = table.drain().take(5).collect();
        assert_eq!(taken.len(), 5);
        assert!(table.is_empty());
        assert!(table.iter().next().is_none());
        table.assert_invariants();
    }

    #[test]
    fn forgotten_drain_leaves_table_empty() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::constant());
        for k in 0..8u64 {
            table.insert(k, k).unwrap();
        }
        assert!(table.overflow_size() > 0);
        let bucket_count = table.bucket_count();

        core::mem::forget(table.drain());
        assert_eq!(table.len(), 0);
        assert_eq!(table.overflow_size(), 0);
        assert_eq!(table.bucket_count(), bucket_count);
        assert!(!table.contains_key(&0));
        assert_eq!(table.iter().len(), 0);
        assert_eq!(table.iter().count(), 0);
        table.assert_invariants();

        table.insert(3, 30).unwrap();
        assert_eq!(table.get(&3), Some(&30));
        table.assert_invariants();
    }

    #[test]
    fn iter_mut_and_into_iter() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::modulo(3));
        for k in 0..20u64 {
            table.insert(k, k).unwrap();
        }

        for (_, v) in table.iter_mut() {
            *v *= 2;
        }
        for (k, v) in &table {
            assert_eq!(*v, k * 2);
        }
        assert_eq!(table.iter_mut().len(), 20);

        let mut owned: Vec<(u64, u64)> = table.into_iter().collect();
        owned.sort_unstable();
        assert_eq!(owned.len(), 20);
        assert_eq!(owned[19], (19, 38));
    }

    #[test]
    fn clear_keeps_bucket_count() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::constant());
        for k in 0..10u64 {
            table.insert(k, k).unwrap();
        }
        let bucket_count = table.bucket_count();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.bucket_count(), bucket_count);
        assert_eq!(table.overflow_size(), 0);
        table.assert_invariants();
    }

    #[test]
    fn clone_eq_swap() {
        let mut a: HashTable<u64, u64, HashState> = HashTable::new();
        for k in 0..20 {
            a.insert(k, k).unwrap();
        }
        let b = a.clone();
        assert_eq!(a, b);

        let mut c: HashTable<u64, u64, HashState> = HashTable::new();
        c.swap(&mut a);
        assert!(a.is_empty());
        assert_eq!(c, b);
        assert_ne!(a, b);
    }

    #[test]
    fn insert_range_and_collect() {
        let mut table: HashTable<u64, u64, HashState> = HashTable::new();
        table.insert(0, 100).unwrap();
        table.insert_range((0..1000).map(|k| (k, k))).unwrap();
        assert_eq!(table.len(), 1000);
        assert_eq!(table.get(&0), Some(&100));
        assert!(table.load_factor() <= table.max_load_factor());

        let collected: HashTable<u64, u64, HashState> = (0..10).map(|k| (k, k)).collect();
        assert_eq!(collected.len(), 10);
    }

    #[test]
    fn key_eq_and_hash_function() {
        let table: HashTable<String, (), HashState> = HashTable::new();
        let eq = table.key_eq();
        assert!(eq(&"a".to_string(), &"a".to_string()));
        assert!(!eq(&"a".to_string(), &"b".to_string()));

        let hash = table.hash_function().hash_one("a".to_string());
        assert_eq!(hash, table.hash_function().hash_one("a".to_string()));
    }

    #[test]
    fn debug_stats_reports_layout() {
        let mut table: Crafted<4> = HashTable::with_hasher(CraftedState::constant());
        for k in 0..6u64 {
            table.insert(k, k).unwrap();
        }
        let stats = table.debug_stats();
        assert_eq!(stats.populated, 6);
        assert_eq!(stats.occupied_slots, 4);
        assert_eq!(stats.overflow_entries, 2);
        assert_eq!(stats.total_slots, 16 + 3);
        assert_eq!(stats.bucket_count, 16);
    }

    #[test]
    fn string_keys() {
        let mut table: HashTable<String, usize, HashState> = HashTable::new();
        let words = ["alpha", "beta", "gamma", "delta", "epsilon"];
        for (i, w) in words.iter().enumerate() {
            table.insert(w.to_string(), i).unwrap();
        }
        for (i, w) in words.iter().enumerate() {
            assert_eq!(table.get(&w.to_string()), Some(&i));
        }
        assert_eq!(table.remove(&"gamma".to_string()), Some(2));
        assert_eq!(table.len(), 4);
    }

    #[cfg(feature = "std")]
    mod model {
        use std::collections::HashMap as StdHashMap;

        use proptest::prelude::*;

        use super::*;

        #[derive(Clone, Debug)]
        enum Op {
            Insert(u16, u32),
            Assign(u16, u32),
            Erase(u16),
            Reserve(u16),
            Rehash(u16),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (any::<u16>(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
                2 => (any::<u16>(), any::<u32>()).prop_map(|(k, v)| Op::Assign(k, v)),
                3 => any::<u16>().prop_map(Op::Erase),
                1 => (0u16..512).prop_map(Op::Reserve),
                1 => (0u16..512).prop_map(Op::Rehash),
            ]
        }

        fn run<G, O, const STORE_HASH: bool>(ops: &[Op], modulus: u64)
        where
            G: GrowthPolicy,
            O: OverflowStore<u64, u32> + Default,
        {
            let mut table: HashTable<u64, u32, CraftedState, G, O, 4, STORE_HASH> =
                HashTable::with_hasher(CraftedState::modulo(modulus));
            let mut model = StdHashMap::new();

            for op in ops {
                let bucket_count = table.bucket_count();
                match *op {
                    Op::Insert(k, v) => {
                        let key = u64::from(k % 256);
                        let (_, inserted) = table.insert(key, v).unwrap();
                        assert_eq!(inserted, !model.contains_key(&key));
                        model.entry(key).or_insert(v);
                    }
                    Op::Assign(k, v) => {
                        let key = u64::from(k % 256);
                        table.insert_or_assign(key, v).unwrap();
                        model.insert(key, v);
                    }
                    Op::Erase(k) => {
                        let key = u64::from(k % 256);
                        assert_eq!(table.remove(&key), model.remove(&key));
                        assert!(!table.contains_key(&key));
                    }
                    Op::Reserve(n) => table.reserve(usize::from(n)).unwrap(),
                    Op::Rehash(n) => table.rehash(usize::from(n)).unwrap(),
                }

                if !matches!(op, Op::Rehash(_)) {
                    assert!(table.bucket_count() >= bucket_count);
                }
                assert_eq!(table.len(), model.len());
                table.assert_invariants();
            }

            for (key, value) in &model {
                assert_eq!(table.get(key), Some(value));
            }
            assert_eq!(table.iter().count(), model.len());
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn list_overflow_matches_model(
                ops in proptest::collection::vec(op(), 0..200),
                modulus in 1u64..64,
            ) {
                run::<PowerOfTwoGrowthPolicy, ListOverflow<u64, u32>, false>(&ops, modulus);
            }

            #[test]
            fn ordered_overflow_matches_model(
                ops in proptest::collection::vec(op(), 0..200),
                modulus in 1u64..64,
            ) {
                run::<PowerOfTwoGrowthPolicy, OrderedOverflow<u64, u32>, false>(&ops, modulus);
            }

            #[test]
            fn prime_policy_matches_model(
                ops in proptest::collection::vec(op(), 0..200),
                modulus in 1u64..64,
            ) {
                run::<PrimeGrowthPolicy, ListOverflow<u64, u32>, false>(&ops, modulus);
            }

            #[test]
            fn mod_policy_matches_model(
                ops in proptest::collection::vec(op(), 0..200),
                modulus in 1u64..64,
            ) {
                run::<ModGrowthPolicy, ListOverflow<u64, u32>, false>(&ops, modulus);
            }

            #[test]
            fn stored_hash_list_overflow_matches_model(
                ops in proptest::collection::vec(op(), 0..200),
                modulus in 1u64..64,
            ) {
                run::<PowerOfTwoGrowthPolicy, ListOverflow<u64, u32>, true>(&ops, modulus);
            }

            #[test]
            fn stored_hash_ordered_overflow_matches_model(
                ops in proptest::collection::vec(op(), 0..200),
                modulus in 1u64..64,
            ) {
                run::<PowerOfTwoGrowthPolicy, OrderedOverflow<u64, u32>, true>(&ops, modulus);
            }
        }
    }
}
