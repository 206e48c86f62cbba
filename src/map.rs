//! A lock-striped hash map built from chained bins.
//!
//! The map keeps a power-of-two array of bins. Each bin is the head of a singly
//! linked chain of nodes whose hashes map to it. A fixed set of sixteen
//! mutexes (the stripes) guards the bins: bin `i` belongs to stripe `i % 16`,
//! so lock contention stays bounded no matter how large the array grows.
//!
//! Every single-key operation hashes the key, reads the current bin array,
//! locks the bin's stripe and checks that the array was not replaced in the
//! meantime. Once that check passes, the thread owns the chain until it
//! unlocks.
//!
//! Growth is the only operation that takes every stripe. It doubles the array
//! and splits each chain into the two bins its nodes can land in, reusing the
//! nodes and their cached hashes. Nodes removed from a chain go back to a
//! [`NodePool`] to be reused by the next insertion.

pub(crate) mod augment;
pub(crate) mod bin_array;
pub(crate) mod node;
pub(crate) mod stripes;

use self::{
    bin_array::{BinArray, BinArrayRef},
    stripes::Stripes,
};
use crate::{
    builder::StripedHashMapBuilder,
    common::{
        self,
        constants::{DEFAULT_INITIAL_CAPACITY, LOAD_RATIO, MAX_TABLE_SIZE},
        error::Error,
    },
    iter::Iter,
    pool::NodePool,
};

use std::{
    borrow::Borrow,
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

#[cfg(feature = "logging")]
use std::sync::atomic::AtomicBool;

use crossbeam_epoch::{Atomic, Owned};
use crossbeam_utils::CachePadded;
use rand::Rng;

/// Default hasher for `StripedHashMap`.
pub type DefaultHashBuilder = RandomState;

/// A concurrent hash map that guards its bins with a fixed set of striped
/// locks.
///
/// All methods take `&self`; share the map between threads with an `Arc` or a
/// scoped borrow. Lookups return clones of the stored values.
///
/// Consistency is per key. Operations on the same key are serialized by the
/// bin's stripe. Operations on different keys are not ordered relative to each
/// other, [`len`](#method.len) is approximate while other threads are writing,
/// and iteration may miss entries changed concurrently (but never yields a key
/// twice).
///
/// The map grows by doubling once the number of entries reaches three per bin,
/// and never shrinks.
///
/// # Examples
///
/// ```rust
/// use stripe_map::StripedHashMap;
///
/// use std::{sync::Arc, thread};
///
/// let map = Arc::new(StripedHashMap::new());
///
/// let handles = (0..4u32)
///     .map(|t| {
///         let map = Arc::clone(&map);
///         thread::spawn(move || {
///             for i in 0..100 {
///                 map.insert(t * 100 + i, i);
///             }
///         })
///     })
///     .collect::<Vec<_>>();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// assert_eq!(map.len(), 400);
/// assert_eq!(map.try_get(&342), Some(42));
/// ```
pub struct StripedHashMap<K, V, S = DefaultHashBuilder> {
    bin_array: Atomic<BinArray<K, V>>,
    stripes: Stripes,
    len: CachePadded<AtomicUsize>,
    build_hasher: S,
    pool: Arc<NodePool<K, V>>,
    #[cfg(feature = "logging")]
    name: Option<String>,
    #[cfg(feature = "logging")]
    growth_capped: AtomicBool,
}

impl<K, V> StripedHashMap<K, V, RandomState> {
    /// Creates an empty map with the default initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// Creates an empty map with `capacity` bins, rounded up to a power of
    /// two. Capacities above the maximum table size are clamped.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::default())
    }

    /// Returns a [`StripedHashMapBuilder`], which can build a map with a name,
    /// a shared node pool and other configurations.
    pub fn builder() -> StripedHashMapBuilder<K, V> {
        StripedHashMapBuilder::default()
    }
}

impl<K, V, S> StripedHashMap<K, V, S> {
    /// Creates an empty map that hashes keys with `build_hasher`.
    pub fn with_hasher(build_hasher: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_INITIAL_CAPACITY, build_hasher)
    }

    /// Creates an empty map with `capacity` bins that hashes keys with
    /// `build_hasher`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity_and_hasher(capacity: usize, build_hasher: S) -> Self {
        Self::with_everything(None, capacity, build_hasher, Arc::default())
    }

    pub(crate) fn with_everything(
        _name: Option<String>,
        initial_capacity: usize,
        build_hasher: S,
        pool: Arc<NodePool<K, V>>,
    ) -> Self {
        assert!(
            initial_capacity > 0,
            "initial_capacity must be greater than zero"
        );

        let mut bin_count = initial_capacity.min(MAX_TABLE_SIZE).next_power_of_two();
        if bin_count > MAX_TABLE_SIZE {
            bin_count /= 2;
        }

        Self {
            bin_array: Atomic::new(BinArray::with_length(0, bin_count)),
            stripes: Stripes::new(),
            len: CachePadded::new(AtomicUsize::new(0)),
            build_hasher,
            pool,
            #[cfg(feature = "logging")]
            name: _name,
            #[cfg(feature = "logging")]
            growth_capped: AtomicBool::new(false),
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// The count is maintained with relaxed atomics and is only exact while no
    /// other thread is modifying the map.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns `true` if the map holds no entries. Approximate in the same way
    /// as [`len`](#method.len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current number of bins. Always a power of two.
    pub fn bin_count(&self) -> usize {
        let guard = &crossbeam_epoch::pin();
        self.bin_array_ref().current(guard).1.len()
    }

    /// Returns a reference to the map's [`BuildHasher`].
    pub fn hasher(&self) -> &S {
        &self.build_hasher
    }

    /// Returns the pool this map takes nodes from and returns them to.
    pub fn node_pool(&self) -> &Arc<NodePool<K, V>> {
        &self.pool
    }

    #[inline]
    pub(crate) fn bin_array_ref(&self) -> BinArrayRef<'_, K, V> {
        BinArrayRef {
            bin_array: &self.bin_array,
            stripes: &self.stripes,
        }
    }
}

impl<K, V, S> StripedHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts a key-value pair. An existing value for the key is overwritten
    /// in place.
    ///
    /// When several threads insert the same key at once, the last one to take
    /// the bin's lock wins.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash(&key);
        self.grow_if_needed();

        let guard = &crossbeam_epoch::pin();
        let mut bin = self.bin_array_ref().lock_bin(hash, guard);
        let slot = node::seek(bin.head_mut(), hash, &key);

        if let Some(node) = slot.as_mut() {
            node.value = value;
            return;
        }

        *slot = Some(self.pool.acquire(key, value, hash));
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Inserts a `(key, value)` pair. Same as [`insert`](#method.insert).
    pub fn insert_entry(&self, (key, value): (K, V)) {
        self.insert(key, value);
    }

    /// Returns a _clone_ of the value corresponding to the key, or
    /// [`Error::KeyNotFound`].
    ///
    /// Use [`try_get`](#method.try_get) when a missing key is an expected
    /// outcome.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::{Error, StripedHashMap};
    ///
    /// let map = StripedHashMap::new();
    /// map.insert("a", 1);
    ///
    /// assert_eq!(map.get("a"), Ok(1));
    /// assert_eq!(map.get("b"), Err(Error::KeyNotFound));
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Result<V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.try_get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns a _clone_ of the value corresponding to the key.
    pub fn try_get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_and(key, V::clone)
    }

    /// Returns the result of calling `with_value` on the value corresponding
    /// to the key.
    ///
    /// `with_value` runs while the key's bin is locked. It must not access
    /// this map.
    pub fn get_and<Q, F, T>(&self, key: &Q, with_value: F) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> T,
    {
        let hash = self.hash(key);
        let guard = &crossbeam_epoch::pin();
        let bin = self.bin_array_ref().lock_bin(hash, guard);

        node::find(bin.head(), hash, key).map(|node| with_value(&node.value))
    }

    /// Returns `true` if the map contains a value for the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_and(key, |_| ()).is_some()
    }

    /// Returns `true` if the map maps `key` to a value equal to `value`.
    pub fn contains_entry<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        self.get_and(key, |v| v == value).unwrap_or(false)
    }

    /// Removes the key from the map. Returns `true` if it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_if(key, |_| true).is_some()
    }

    /// Removes the key only if it maps to a value equal to `value`. Returns
    /// `true` if the entry was removed.
    pub fn remove_entry<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        self.remove_if(key, |v| v == value).is_some()
    }

    /// Removes the key from the map and returns its value.
    pub fn try_get_and_remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_if(key, |_| true)
    }

    /// Returns a clone of the value for the key and `true`, or inserts
    /// `default` and returns a clone of it and `false`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedHashMap;
    ///
    /// let map = StripedHashMap::new();
    ///
    /// assert_eq!(map.get_or_insert("k", 1), (1, false));
    /// assert_eq!(map.get_or_insert("k", 2), (1, true));
    /// ```
    pub fn get_or_insert(&self, key: K, default: V) -> (V, bool)
    where
        V: Clone,
    {
        self.get_or_insert_internal(key, |_| default)
    }

    /// Like [`get_or_insert`](#method.get_or_insert), but only calls `init` if
    /// the key is absent.
    ///
    /// `init` runs while the key's bin is locked, so it is called at most once
    /// per insertion and never races with another writer of the same key. It
    /// must not access this map.
    pub fn get_or_insert_with<F>(&self, key: K, init: F) -> (V, bool)
    where
        V: Clone,
        F: FnOnce() -> V,
    {
        self.get_or_insert_internal(key, |_| init())
    }

    /// Like [`get_or_insert_with`](#method.get_or_insert_with), but `init`
    /// receives the key.
    pub fn get_or_insert_with_key<F>(&self, key: K, init: F) -> (V, bool)
    where
        V: Clone,
        F: FnOnce(&K) -> V,
    {
        self.get_or_insert_internal(key, init)
    }

    /// Like [`get_or_insert_with_key`](#method.get_or_insert_with_key), but
    /// `init` also receives `param`.
    pub fn get_or_insert_with_param<P, F>(&self, key: K, param: P, init: F) -> (V, bool)
    where
        V: Clone,
        F: FnOnce(&K, P) -> V,
    {
        self.get_or_insert_internal(key, |k| init(k, param))
    }

    fn get_or_insert_internal<F>(&self, key: K, init: F) -> (V, bool)
    where
        V: Clone,
        F: FnOnce(&K) -> V,
    {
        let hash = self.hash(&key);
        self.grow_if_needed();

        let guard = &crossbeam_epoch::pin();
        let mut bin = self.bin_array_ref().lock_bin(hash, guard);
        let slot = node::seek(bin.head_mut(), hash, &key);

        if let Some(node) = slot.as_ref() {
            return (node.value.clone(), true);
        }

        let value = init(&key);
        let node = slot.insert(self.pool.acquire(key, value, hash));
        self.len.fetch_add(1, Ordering::Relaxed);
        (node.value.clone(), false)
    }

    fn remove_if<Q, F>(&self, key: &Q, condition: F) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> bool,
    {
        let hash = self.hash(key);
        let guard = &crossbeam_epoch::pin();
        let mut bin = self.bin_array_ref().lock_bin(hash, guard);
        let slot = node::seek(bin.head_mut(), hash, key);

        if !slot.as_ref().map_or(false, |node| condition(&node.value)) {
            return None;
        }

        let removed = node::unlink(slot)?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        drop(bin);

        let (_key, value) = self.pool.release(removed);
        Some(value)
    }

    #[inline]
    fn hash<Q>(&self, key: &Q) -> u32
    where
        Q: Hash + ?Sized,
    {
        common::hash(&self.build_hasher, key)
    }
}

impl<K, V, S> StripedHashMap<K, V, S> {
    /// Removes every entry. The bin array keeps its current size.
    pub fn clear(&self) {
        let chains = {
            let guard = &crossbeam_epoch::pin();
            let (_all, _, array) = self.bin_array_ref().lock_all(guard);
            // Safety: every stripe is held.
            unsafe { array.drain() }
                .filter(Option::is_some)
                .collect::<Vec<_>>()
        };

        let mut removed = 0;
        for mut link in chains {
            while let Some(mut node) = link {
                link = node.next.take();
                self.pool.release(node);
                removed += 1;
            }
        }
        self.len.fetch_sub(removed, Ordering::Relaxed);
    }

    /// Returns a snapshot of the keys.
    ///
    /// Unlike iteration, the snapshot is taken with every stripe locked, so it
    /// reflects a single instant. Every writer is blocked while it is taken.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.snapshot(|k, _| k.clone())
    }

    /// Returns a snapshot of the values. See [`keys`](#method.keys).
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.snapshot(|_, v| v.clone())
    }

    /// Copies a snapshot of every entry into `dest`, starting at `offset`.
    /// Returns the number of entries copied.
    ///
    /// Nothing is written if `dest` is too short.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::{Error, StripedHashMap};
    ///
    /// let map = StripedHashMap::new();
    /// map.insert(1, 'a');
    /// map.insert(2, 'b');
    ///
    /// let mut dest = vec![(0, ' '); 3];
    /// assert_eq!(map.copy_to(&mut dest, 1), Ok(2));
    /// dest[1..].sort();
    /// assert_eq!(dest, vec![(0, ' '), (1, 'a'), (2, 'b')]);
    ///
    /// assert_eq!(
    ///     map.copy_to(&mut dest, 2),
    ///     Err(Error::ArrayTooSmall { required: 2, available: 1 })
    /// );
    /// ```
    pub fn copy_to(&self, dest: &mut [(K, V)], offset: usize) -> Result<usize, Error>
    where
        K: Clone,
        V: Clone,
    {
        if offset > dest.len() {
            return Err(Error::OffsetOutOfRange {
                offset,
                len: dest.len(),
            });
        }

        let entries = self.snapshot(|k, v| (k.clone(), v.clone()));
        let available = dest.len() - offset;
        if entries.len() > available {
            return Err(Error::ArrayTooSmall {
                required: entries.len(),
                available,
            });
        }

        let copied = entries.len();
        for (slot, entry) in dest[offset..].iter_mut().zip(entries) {
            *slot = entry;
        }
        Ok(copied)
    }

    /// Returns an iterator over clones of the entries, starting from the first
    /// bin.
    ///
    /// The iterator locks one stripe at a time and never blocks writers for
    /// longer than one step. If the map grows while the iterator is in use,
    /// the iterator stops early. It never yields a key twice, but may miss
    /// entries inserted or moved after it started.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter::new(self, |_| 0)
    }

    /// Like [`iter`](#method.iter), but starts from a bin chosen with `rng`, so
    /// that repeated scans do not always favour the first bins.
    pub fn iter_random<R>(&self, rng: &mut R) -> Iter<'_, K, V, S>
    where
        R: Rng + ?Sized,
    {
        Iter::new(self, |bin_count| rng.gen_range(0..bin_count))
    }

    fn snapshot<T>(&self, mut f: impl FnMut(&K, &V) -> T) -> Vec<T> {
        let guard = &crossbeam_epoch::pin();
        let (_all, _, array) = self.bin_array_ref().lock_all(guard);

        let mut out = Vec::with_capacity(self.len());
        // Safety: every stripe is held.
        unsafe { array.for_each(|k, v| out.push(f(k, v))) };
        out
    }

    /// Doubles the bin array if the map holds `LOAD_RATIO` entries per bin.
    ///
    /// Called before anything that may insert, without any stripe held.
    fn grow_if_needed(&self) {
        let guard = &crossbeam_epoch::pin();
        let bin_array_ref = self.bin_array_ref();

        if !self.should_grow(bin_array_ref.current(guard).1.len()) {
            return;
        }

        let (_all, snapshot, array) = bin_array_ref.lock_all(guard);

        // Another thread may have grown the array while we were waiting.
        if !self.should_grow(array.len()) {
            return;
        }

        // Safety: every stripe is held.
        let doubled = unsafe { array.split_into_doubled() };

        #[cfg(feature = "logging")]
        log::debug!(
            "{}Grew the bin array from {} to {} bins ({} entries)",
            self.log_prefix(),
            array.len(),
            doubled.len(),
            self.len()
        );

        self.bin_array.store(Owned::new(doubled), Ordering::Release);

        // Safety: the old array is no longer reachable from the map, it holds
        // no nodes anymore, and the epoch guard keeps it alive for threads that
        // loaded it before the swap.
        unsafe { guard.defer_destroy(snapshot) };
    }

    fn should_grow(&self, bin_count: usize) -> bool {
        let len = self.len();
        if len < bin_count.saturating_mul(LOAD_RATIO) {
            return false;
        }

        if len >= MAX_TABLE_SIZE || bin_count > MAX_TABLE_SIZE / 2 {
            #[cfg(feature = "logging")]
            self.log_growth_capped(bin_count);
            return false;
        }

        true
    }

    #[cfg(feature = "logging")]
    fn log_growth_capped(&self, bin_count: usize) {
        if !self.growth_capped.swap(true, Ordering::Relaxed) {
            log::warn!(
                "{}Reached the maximum table size with {} bins; chains will grow longer \
                instead of the bin array",
                self.log_prefix(),
                bin_count
            );
        }
    }

    #[cfg(feature = "logging")]
    fn log_prefix(&self) -> String {
        self.name
            .as_ref()
            .map(|name| format!("[{name}] "))
            .unwrap_or_default()
    }
}

impl<K, V, S> Drop for StripedHashMap<K, V, S> {
    fn drop(&mut self) {
        // Safety: `&mut self` proves no other thread can be using the map, and
        // replaced arrays were handed to the epoch collector when they were
        // swapped out.
        let guard = unsafe { crossbeam_epoch::unprotected() };
        let current = self.bin_array.load(Ordering::Relaxed, guard);
        if !current.is_null() {
            drop(unsafe { current.into_owned() });
        }
    }
}

impl<K, V, S> Default for StripedHashMap<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> fmt::Debug for StripedHashMap<K, V, S>
where
    K: fmt::Debug + Clone,
    V: fmt::Debug + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> FromIterator<(K, V)> for StripedHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for StripedHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a StripedHashMap<K, V, S>
where
    K: Clone,
    V: Clone,
{
    type Item = (K, V);

    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
