use super::{
    node::{self, Link},
    StripedHashMap,
};

use std::{
    hash::{BuildHasher, Hash},
    sync::atomic::Ordering,
};

use rand::Rng;

/// The outcome of [`StripedHashMap::augment`] and its variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AugmentationResult<K, V> {
    key: K,
    existed_before: bool,
    exists_after: bool,
    value: V,
}

impl<K, V> AugmentationResult<K, V> {
    fn new(key: K, existed_before: bool, exists_after: bool, value: V) -> Self {
        Self {
            key,
            existed_before,
            exists_after,
            value,
        }
    }

    /// Returns the key that was augmented.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns `true` if the key had an entry before the augmentation.
    pub fn existed_before(&self) -> bool {
        self.existed_before
    }

    /// Returns `true` if the key has an entry after the augmentation.
    pub fn exists_after(&self) -> bool {
        self.exists_after
    }

    /// Returns the value stored for the key after the augmentation, or
    /// `V::default()` if the key has no entry.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the key and the value.
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V, S> StripedHashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone + Default,
    S: BuildHasher,
{
    /// Atomically reads, changes, inserts or deletes the entry for `key`.
    ///
    /// `f` is called with the key, an `exists` flag and the value:
    ///
    /// - If the key has an entry, `exists` is `true` and the value is the
    ///   stored one. Changes to the value are kept in place. Setting `exists`
    ///   to `false` deletes the entry.
    /// - Otherwise `exists` is `false` and the value is `V::default()`.
    ///   Setting `exists` to `true` inserts the value. Leaving it `false`
    ///   inserts nothing.
    ///
    /// `f` runs while the key's bin is locked. It must not block for long or
    /// access this map, or it will deadlock.
    ///
    /// If `f` panics, the lock is released and the map is left structurally
    /// unchanged: a missing key is not inserted and an existing entry is not
    /// deleted, though it keeps any change `f` made to the value before
    /// panicking.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stripe_map::StripedHashMap;
    ///
    /// let counters = StripedHashMap::new();
    ///
    /// // Increment, creating the counter on first use.
    /// let bump = |_: &&str, exists: &mut bool, count: &mut u32| {
    ///     *exists = true;
    ///     *count += 1;
    /// };
    /// counters.augment("hits", bump);
    /// let result = counters.augment("hits", bump);
    /// assert!(result.existed_before());
    /// assert_eq!(*result.value(), 2);
    ///
    /// // Decrement, deleting the counter when it reaches zero.
    /// let drop_one = |_: &&str, exists: &mut bool, count: &mut u32| {
    ///     *count -= 1;
    ///     *exists = *count > 0;
    /// };
    /// counters.augment("hits", drop_one);
    /// let result = counters.augment("hits", drop_one);
    /// assert!(!result.exists_after());
    /// assert!(counters.is_empty());
    /// ```
    pub fn augment<F>(&self, key: K, f: F) -> AugmentationResult<K, V>
    where
        F: FnOnce(&K, &mut bool, &mut V),
    {
        self.augment_with(key, (), |k, exists, v, ()| f(k, exists, v))
    }

    /// Like [`augment`](#method.augment), but passes `param` through to `f`.
    pub fn augment_with<P, F>(&self, key: K, param: P, f: F) -> AugmentationResult<K, V>
    where
        F: FnOnce(&K, &mut bool, &mut V, P),
    {
        let hash = self.hash(&key);
        self.grow_if_needed();

        let guard = &crossbeam_epoch::pin();
        let mut bin = self.bin_array_ref().lock_bin(hash, guard);
        let slot = node::seek(bin.head_mut(), hash, &key);

        let (param, f) = match self.augment_existing(slot, param, f) {
            Ok(result) => return result,
            Err(unused) => unused,
        };

        let mut exists = false;
        let mut value = V::default();
        f(&key, &mut exists, &mut value, param);

        if !exists {
            return AugmentationResult::new(key, false, false, V::default());
        }

        let entry = slot.insert(self.pool.acquire(key, value, hash));
        self.len.fetch_add(1, Ordering::Relaxed);
        AugmentationResult::new(entry.key.clone(), false, true, entry.value.clone())
    }

    /// Augments an existing entry picked at random, or does nothing if the
    /// pick lands on an empty bin.
    ///
    /// A random hash selects a bin. If the bin is empty, `f` is not called at
    /// all (there is no key to give it) and `None` is returned. Otherwise the walk starts at the head and moves on
    /// while a coin flip says so and the chain continues, so the head is not
    /// always the one picked. The selection favours entries near the front of
    /// short chains and is not uniform over the map.
    ///
    /// `f` is called with `exists` set to `true`. Setting it to `false`
    /// deletes the entry. This method never inserts.
    ///
    /// The locking rules of [`augment`](#method.augment) apply to `f`.
    pub fn augment_random<R, F>(&self, rng: &mut R, f: F) -> Option<AugmentationResult<K, V>>
    where
        R: Rng + ?Sized,
        F: FnOnce(&K, &mut bool, &mut V),
    {
        self.augment_random_with(rng, (), |k, exists, v, ()| f(k, exists, v))
    }

    /// Like [`augment_random`](#method.augment_random), but passes `param`
    /// through to `f`.
    pub fn augment_random_with<R, P, F>(
        &self,
        rng: &mut R,
        param: P,
        f: F,
    ) -> Option<AugmentationResult<K, V>>
    where
        R: Rng + ?Sized,
        F: FnOnce(&K, &mut bool, &mut V, P),
    {
        let hash = rng.gen::<u32>();

        let guard = &crossbeam_epoch::pin();
        let mut bin = self.bin_array_ref().lock_bin(hash, guard);
        let mut slot = bin.head_mut();

        while slot.as_ref().map_or(false, |entry| entry.next.is_some()) && rng.gen::<bool>() {
            if let Some(entry) = slot {
                slot = &mut entry.next;
            }
        }

        self.augment_existing(slot, param, f).ok()
    }

    /// Runs `f` on the node at `slot`, writing its changes back or unlinking
    /// the node. Hands `param` and `f` back if `slot` is empty.
    fn augment_existing<P, F>(
        &self,
        slot: &mut Link<K, V>,
        param: P,
        f: F,
    ) -> Result<AugmentationResult<K, V>, (P, F)>
    where
        F: FnOnce(&K, &mut bool, &mut V, P),
    {
        let entry = match slot.as_mut() {
            Some(entry) => entry,
            None => return Err((param, f)),
        };

        let mut exists = true;
        f(&entry.key, &mut exists, &mut entry.value, param);

        if exists {
            return Ok(AugmentationResult::new(
                entry.key.clone(),
                true,
                true,
                entry.value.clone(),
            ));
        }

        let removed = match node::unlink(slot) {
            Some(removed) => removed,
            None => unreachable!("the slot held a node a moment ago"),
        };
        self.len.fetch_sub(1, Ordering::Relaxed);
        let (key, _value) = self.pool.release(removed);
        Ok(AugmentationResult::new(key, true, false, V::default()))
    }
}
