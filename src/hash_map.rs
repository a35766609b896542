use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::ops::Index;

use crate::DefaultHashBuilder;
use crate::error::Error;
use crate::error::Result;
use crate::growth_policy::GrowthPolicy;
use crate::growth_policy::PowerOfTwoGrowthPolicy;
use crate::hash_table::HashTable;
use crate::hash_table::Position;

/// An iterator over the key-value pairs of a `HashMap`.
pub type Iter<'a, K, V> = crate::hash_table::Iter<'a, K, V>;

/// A mutable iterator over the key-value pairs of a `HashMap`.
pub type IterMut<'a, K, V> = crate::hash_table::IterMut<'a, K, V>;

/// A draining iterator over the key-value pairs of a `HashMap`.
pub type Drain<'a, K, V> = crate::hash_table::Drain<'a, K, V>;

/// An owning iterator over the key-value pairs of a `HashMap`.
pub type IntoIter<K, V> = crate::hash_table::IntoIter<K, V>;

/// A hash map implemented using the hopscotch [`HashTable`] as the underlying
/// storage.
///
/// `HashMap<K, V, S, G>` stores key-value pairs where keys implement
/// `Hash + Eq`, using a configurable hasher builder `S` and growth policy `G`.
/// Colliding keys that cannot be placed near their home bucket go to a list
/// overflow store.
///
/// Unlike [`HashTable::insert`], [`insert`](HashMap::insert) replaces the value
/// of an existing key.
///
/// # Examples
///
/// ```rust
/// use hopscotch_table::HashMap;
///
/// # fn main() -> hopscotch_table::Result<()> {
/// let mut scores: HashMap<&str, u32> = HashMap::new();
/// scores.insert("alice", 10)?;
/// *scores.entry("bob").or_insert(0)? += 3;
///
/// assert_eq!(scores[&"alice"], 10);
/// assert_eq!(scores.get(&"bob"), Some(&3));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder, G = PowerOfTwoGrowthPolicy> {
    table: HashTable<K, V, S, G>,
}

impl<K, V, S, G> Debug for HashMap<K, V, S, G>
where
    K: Debug + Eq,
    V: Debug,
    G: GrowthPolicy,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.table.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S, G> HashMap<K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    /// Creates a new hash map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use hopscotch_table::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: HashTable::with_hasher(hash_builder),
        }
    }

    /// Creates a new hash map able to hold `capacity` entries without growing.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if `capacity` entries cannot be addressed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use hopscotch_table::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> =
    ///     HashMap::with_capacity_and_hasher(100, SimpleHasher).unwrap();
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Result<Self> {
        let mut table = HashTable::with_hasher(hash_builder);
        table.reserve(capacity)?;
        Ok(Self { table })
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of entries the map can hold before an insert grows it.
    pub fn capacity(&self) -> usize {
        (self.table.bucket_count() as f32 * self.table.max_load_factor()) as usize
    }

    /// The underlying hopscotch table.
    pub fn as_table(&self) -> &HashTable<K, V, S, G> {
        &self.table
    }

    /// Clears the map, removing all key-value pairs. Keeps the allocated
    /// buckets.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the bucket array as much as the current entries allow.
    ///
    /// # Errors
    ///
    /// See [`HashTable::shrink_to_fit`].
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.table.shrink_to_fit()
    }

    /// Reserves room for at least `additional` more entries.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the map cannot grow that large. The map
    /// is left unchanged.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.table.reserve(self.len().saturating_add(additional))
    }

    /// Inserts a key-value pair, returning the previous value for `key`.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the map needed to grow and could not.
    /// The map keeps its previous contents.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert_eq!(map.insert(1, "a"), Ok(None));
    /// assert_eq!(map.insert(1, "b"), Ok(Some("a")));
    /// assert_eq!(map[&1], "b");
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        match self.entry(key) {
            Entry::Occupied(mut entry) => Ok(Some(entry.insert(value))),
            Entry::Vacant(entry) => entry.insert(value).map(|_| None),
        }
    }

    /// Returns a reference to the value corresponding to the key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.table.get(key)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.table.get_mut(key)
    }

    /// Returns the stored key-value pair corresponding to the key.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.table.get_key_value(key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.table.remove(key)
    }

    /// Removes a key from the map, returning the stored key and value if the
    /// key was previously in the map.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        self.table.remove_entry(key)
    }

    /// Gets the given key's corresponding entry in the map for in-place
    /// manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashMap;
    ///
    /// let mut letters: HashMap<char, usize> = HashMap::new();
    /// for ch in "a short treatise on fungi".chars() {
    ///     *letters.entry(ch).or_default().unwrap() += 1;
    /// }
    /// assert_eq!(letters[&'s'], 2);
    /// assert_eq!(letters[&'t'], 3);
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, S, G> {
        let hash = self.table.hash_function().hash_one(&key);
        match self.table.find_with_hash(&key, hash) {
            Some(position) => Entry::Occupied(OccupiedEntry {
                table: &mut self.table,
                position,
            }),
            None => Entry::Vacant(VacantEntry {
                table: &mut self.table,
                hash,
                key,
            }),
        }
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, f: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(f);
    }

    /// An iterator visiting all key-value pairs in arbitrary order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.table.iter()
    }

    /// An iterator visiting all key-value pairs with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.table.iter_mut()
    }

    /// An iterator visiting all keys in arbitrary order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            inner: self.table.iter(),
        }
    }

    /// An iterator visiting all values in arbitrary order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values {
            inner: self.table.iter(),
        }
    }

    /// An iterator visiting all values mutably in arbitrary order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Clears the map, returning all key-value pairs as an iterator.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        self.table.drain()
    }
}

impl<K, V, S, G> HashMap<K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    G: GrowthPolicy,
{
    /// Creates an empty map with the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map able to hold `capacity` entries without growing.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if `capacity` entries cannot be addressed.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S, G> Default for HashMap<K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    G: GrowthPolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, G> PartialEq for HashMap<K, V, S, G>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl<K, V, S, G> Eq for HashMap<K, V, S, G>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
}

impl<K, V, S, G> Index<&K> for HashMap<K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &K) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("{}", Error::KeyNotFound),
        }
    }
}

impl<K, V, S, G> Extend<(K, V)> for HashMap<K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    /// Inserts every pair, replacing the values of existing keys.
    ///
    /// # Panics
    ///
    /// Panics if the map cannot grow large enough.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (additional, _) = iter.size_hint();
        if let Err(err) = self.reserve(additional) {
            panic!("{err}");
        }

        for (key, value) in iter {
            if let Err(err) = self.insert(key, value) {
                panic!("{err}");
            }
        }
    }
}

impl<K, V, S, G> FromIterator<(K, V)> for HashMap<K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    G: GrowthPolicy,
{
    /// # Panics
    ///
    /// Panics if the map cannot grow large enough.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S, G> IntoIterator for HashMap<K, V, S, G>
where
    K: Eq,
    G: GrowthPolicy,
{
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, K, V, S, G> IntoIterator for &'a HashMap<K, V, S, G>
where
    K: Eq,
    G: GrowthPolicy,
{
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.table.iter()
    }
}

impl<'a, K, V, S, G> IntoIterator for &'a mut HashMap<K, V, S, G>
where
    K: Eq,
    G: GrowthPolicy,
{
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.table.iter_mut()
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, S = DefaultHashBuilder, G = PowerOfTwoGrowthPolicy> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, S, G>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, S, G>),
}

impl<'a, K, V, S, G> Entry<'a, K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if inserting needed to grow the map and
    /// could not.
    pub fn or_insert(self, default: V) -> Result<&'a mut V> {
        match self {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference. The closure only runs for vacant entries.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if inserting needed to grow the map and
    /// could not.
    pub fn or_insert_with<F>(self, default: F) -> Result<&'a mut V>
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, S, G> Entry<'a, K, V, S, G>
where
    K: Hash + Eq,
    V: Default,
    S: BuildHasher,
    G: GrowthPolicy,
{
    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if inserting needed to grow the map and
    /// could not.
    pub fn or_default(self) -> Result<&'a mut V> {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, S = DefaultHashBuilder, G = PowerOfTwoGrowthPolicy> {
    table: &'a mut HashTable<K, V, S, G>,
    hash: u64,
    key: K,
}

impl<'a, K, V, S, G> VacantEntry<'a, K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if the map needed to grow and could not.
    pub fn insert(self, value: V) -> Result<&'a mut V> {
        let table = self.table;
        let position = table.insert_absent(self.hash, self.key, value)?;
        Ok(table.occupied_at_mut(position).1)
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, S = DefaultHashBuilder, G = PowerOfTwoGrowthPolicy> {
    table: &'a mut HashTable<K, V, S, G>,
    position: Position,
}

impl<'a, K, V, S, G> OccupiedEntry<'a, K, V, S, G>
where
    K: Eq,
    G: GrowthPolicy,
{
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        self.table.occupied_at(self.position).0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        self.table.occupied_at(self.position).1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        self.table.occupied_at_mut(self.position).1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        let table = self.table;
        table.occupied_at_mut(self.position).1
    }

    /// Inserts a value into the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.table.remove_occupied(self.position)
    }
}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// A mutable iterator over the values of a `HashMap`.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
