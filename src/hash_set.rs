use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;

use crate::DefaultHashBuilder;
use crate::error::Result;
use crate::growth_policy::GrowthPolicy;
use crate::growth_policy::PowerOfTwoGrowthPolicy;
use crate::hash_table::HashTable;

/// A hash set implemented using the hopscotch [`HashTable`] as the underlying
/// storage.
///
/// `HashSet<T, S, G>` stores values of type `T` where `T` implements
/// `Hash + Eq`, using a configurable hasher builder `S` and growth policy `G`.
///
/// # Examples
///
/// ```rust
/// use hopscotch_table::HashSet;
///
/// let mut set: HashSet<&str> = HashSet::new();
/// assert!(set.insert("a").unwrap());
/// assert!(!set.insert("a").unwrap());
/// assert!(set.contains(&"a"));
/// ```
#[derive(Clone)]
pub struct HashSet<T, S = DefaultHashBuilder, G = PowerOfTwoGrowthPolicy> {
    table: HashTable<T, (), S, G>,
}

impl<T, S, G> PartialEq for HashSet<T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }
}

impl<T, S, G> Eq for HashSet<T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
}

impl<T, S, G> Debug for HashSet<T, S, G>
where
    T: Debug + Eq,
    G: GrowthPolicy,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.table.iter().map(|(v, _)| v)).finish()
    }
}

impl<T, S, G> HashSet<T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    /// Creates a new hash set with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: HashTable::with_hasher(hash_builder),
        }
    }

    /// Creates a new hash set able to hold `capacity` values without growing.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) if
    /// `capacity` values cannot be addressed.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Result<Self> {
        let mut table = HashTable::with_hasher(hash_builder);
        table.reserve(capacity)?;
        Ok(Self { table })
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of values the set can hold before an insert grows it.
    pub fn capacity(&self) -> usize {
        (self.table.bucket_count() as f32 * self.table.max_load_factor()) as usize
    }

    /// The underlying hopscotch table.
    pub fn as_table(&self) -> &HashTable<T, (), S, G> {
        &self.table
    }

    /// Clears the set, removing all values. Keeps the allocated buckets.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the bucket array as much as the current values allow.
    ///
    /// # Errors
    ///
    /// See [`HashTable::shrink_to_fit`].
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.table.shrink_to_fit()
    }

    /// Reserves room for at least `additional` more values.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) if the set
    /// cannot grow that large. The set is left unchanged.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.table.reserve(self.len().saturating_add(additional))
    }

    /// Adds a value to the set. Returns whether the value was newly inserted.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) if the set
    /// needed to grow and could not.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashSet;
    ///
    /// let mut set: HashSet<i32> = HashSet::new();
    /// assert_eq!(set.insert(2), Ok(true));
    /// assert_eq!(set.insert(2), Ok(false));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> Result<bool> {
        self.table
            .insert(value, ())
            .map(|(_, inserted)| inserted)
    }

    /// Returns `true` if the set contains a value.
    pub fn contains(&self, value: &T) -> bool {
        self.table.contains_key(value)
    }

    /// Removes a value from the set. Returns whether the value was present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.table.erase(value) == 1
    }

    /// Adds a value to the set, replacing the existing value, if any, that is
    /// equal to the given one. Returns the replaced value.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) if the
    /// value was absent and the set needed to grow and could not.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashSet;
    ///
    /// let mut set: HashSet<i32> = HashSet::new();
    /// set.insert(1).unwrap();
    /// assert_eq!(set.replace(1), Ok(Some(1)));
    /// assert_eq!(set.replace(2), Ok(None));
    /// assert_eq!(set.len(), 2);
    /// ```
    pub fn replace(&mut self, value: T) -> Result<Option<T>> {
        let hash = self.table.hash_function().hash_one(&value);
        match self.table.find_with_hash(&value, hash) {
            Some(position) => Ok(self.table.replace_key_at(position, value)),
            None => self.table.insert_absent(hash, value, ()).map(|_| None),
        }
    }

    /// Removes and returns the value in the set, if any, that is equal to the
    /// given one.
    pub fn take(&mut self, value: &T) -> Option<T> {
        self.table.remove_entry(value).map(|(v, _)| v)
    }

    /// Returns a reference to the value in the set, if any, that is equal to
    /// the given value.
    pub fn get(&self, value: &T) -> Option<&T> {
        self.table.get_key_value(value).map(|(v, _)| v)
    }

    /// An iterator visiting all elements in arbitrary order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Clears the set, returning all elements as an iterator.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Retains only the elements specified by the predicate.
    pub fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        self.table.retain(|v, _| f(v));
    }

    /// Returns `true` if `self` has no elements in common with `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashSet;
    ///
    /// let a: HashSet<i32> = [1, 2].into_iter().collect();
    /// let b: HashSet<i32> = [3, 4].into_iter().collect();
    /// assert!(a.is_disjoint(&b));
    /// ```
    pub fn is_disjoint(&self, other: &Self) -> bool {
        if self.len() <= other.len() {
            self.iter().all(|v| !other.contains(v))
        } else {
            other.iter().all(|v| !self.contains(v))
        }
    }

    /// Returns `true` if `other` contains at least all the elements in `self`.
    pub fn is_subset(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }

    /// Returns `true` if `self` contains at least all the elements in `other`.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns an iterator over the union of `self` and `other`, without
    /// duplicates.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hopscotch_table::HashSet;
    ///
    /// let a: HashSet<i32> = [1, 2].into_iter().collect();
    /// let b: HashSet<i32> = [2, 3].into_iter().collect();
    /// assert_eq!(a.union(&b).count(), 3);
    /// ```
    pub fn union<'a>(&'a self, other: &'a Self) -> Union<'a, T, S, G> {
        Union {
            iter: self.iter(),
            rest: other.difference(self),
        }
    }

    /// Returns an iterator over the values in both `self` and `other`.
    pub fn intersection<'a>(&'a self, other: &'a Self) -> Intersection<'a, T, S, G> {
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        Intersection {
            iter: smaller.iter(),
            other: larger,
        }
    }

    /// Returns an iterator over the values in `self` but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a Self) -> Difference<'a, T, S, G> {
        Difference {
            iter: self.iter(),
            other,
        }
    }

    /// Returns an iterator over the values in exactly one of `self` and
    /// `other`.
    pub fn symmetric_difference<'a>(&'a self, other: &'a Self) -> SymmetricDifference<'a, T, S, G> {
        SymmetricDifference {
            iter: self.difference(other).chain(other.difference(self)),
        }
    }
}

impl<T, S, G> HashSet<T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    G: GrowthPolicy,
{
    /// Creates an empty set with the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty set able to hold `capacity` values without growing.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) if
    /// `capacity` values cannot be addressed.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S, G> Default for HashSet<T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    G: GrowthPolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

/// An iterator over the elements of a `HashSet`.
pub struct Iter<'a, T> {
    inner: crate::hash_table::Iter<'a, T, ()>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(v, _)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

/// A draining iterator over the elements of a `HashSet`.
pub struct Drain<'a, T> {
    inner: crate::hash_table::Drain<'a, T, ()>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(v, _)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An owning iterator over the elements of a `HashSet`.
pub struct IntoIter<T> {
    inner: crate::hash_table::IntoIter<T, ()>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(v, _)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, S, G> IntoIterator for HashSet<T, S, G>
where
    T: Eq,
    G: GrowthPolicy,
{
    type IntoIter = IntoIter<T>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, T, S, G> IntoIterator for &'a HashSet<T, S, G>
where
    T: Eq,
    G: GrowthPolicy,
{
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        Iter {
            inner: self.table.iter(),
        }
    }
}

impl<T, S, G> FromIterator<T> for HashSet<T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    G: GrowthPolicy,
{
    /// # Panics
    ///
    /// Panics if the set cannot grow large enough.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = HashSet::new();
        set.extend(iter);
        set
    }
}

impl<T, S, G> Extend<T> for HashSet<T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    /// # Panics
    ///
    /// Panics if the set cannot grow large enough.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.table.extend(iter.into_iter().map(|v| (v, ())));
    }
}

/// An iterator over the union of two sets.
pub struct Union<'a, T, S, G> {
    iter: Iter<'a, T>,
    rest: Difference<'a, T, S, G>,
}

impl<'a, T, S, G> Iterator for Union<'a, T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().or_else(|| self.rest.next())
    }
}

/// An iterator over the intersection of two sets.
pub struct Intersection<'a, T, S, G> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, S, G>,
}

impl<'a, T, S, G> Iterator for Intersection<'a, T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.iter.next()?;
            if self.other.contains(v) {
                return Some(v);
            }
        }
    }
}

/// An iterator over the difference of two sets.
pub struct Difference<'a, T, S, G> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, S, G>,
}

impl<'a, T, S, G> Iterator for Difference<'a, T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.iter.next()?;
            if !self.other.contains(v) {
                return Some(v);
            }
        }
    }
}

/// An iterator over the symmetric difference of two sets.
pub struct SymmetricDifference<'a, T, S, G> {
    iter: core::iter::Chain<Difference<'a, T, S, G>, Difference<'a, T, S, G>>,
}

impl<'a, T, S, G> Iterator for SymmetricDifference<'a, T, S, G>
where
    T: Hash + Eq,
    S: BuildHasher,
    G: GrowthPolicy,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}
