use crate::{
    common::constants::{DEFAULT_INITIAL_CAPACITY, DEFAULT_POOL_CAPACITY},
    pool::NodePool,
    StripedHashMap,
};

use std::{collections::hash_map::RandomState, hash::BuildHasher, sync::Arc};

/// Builds a [`StripedHashMap`] with various configuration knobs.
///
/// # Examples
///
/// ```rust
/// use stripe_map::StripedHashMapBuilder;
///
/// let map = StripedHashMapBuilder::new()
///     // Start with 1,024 bins.
///     .initial_capacity(1024)
///     // Keep up to 4,096 released nodes for reuse.
///     .pool_capacity(4096)
///     // Prefix log records of this map with "[sessions]".
///     .name("sessions")
///     .build();
///
/// map.insert(1, "alice");
/// assert_eq!(map.bin_count(), 1024);
/// ```
pub struct StripedHashMapBuilder<K, V> {
    name: Option<String>,
    initial_capacity: Option<usize>,
    pool_capacity: Option<usize>,
    node_pool: Option<Arc<NodePool<K, V>>>,
}

impl<K, V> Default for StripedHashMapBuilder<K, V> {
    fn default() -> Self {
        Self {
            name: None,
            initial_capacity: None,
            pool_capacity: None,
            node_pool: None,
        }
    }
}

impl<K, V> StripedHashMapBuilder<K, V> {
    /// Constructs a new `StripedHashMapBuilder` with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the map. The name prefixes the log records the map
    /// emits when the `logging` feature is enabled.
    pub fn name(self, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..self
        }
    }

    /// Sets the initial number of bins. Rounded up to a power of two and
    /// clamped to the maximum table size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn initial_capacity(self, capacity: usize) -> Self {
        assert!(capacity > 0, "initial_capacity must be greater than zero");
        Self {
            initial_capacity: Some(capacity),
            ..self
        }
    }

    /// Sets the number of released nodes the map's own pool keeps. Zero
    /// disables node recycling.
    ///
    /// Ignored when a shared pool is given with
    /// [`node_pool`](#method.node_pool).
    pub fn pool_capacity(self, capacity: usize) -> Self {
        Self {
            pool_capacity: Some(capacity),
            ..self
        }
    }

    /// Makes the map take nodes from, and return them to, the given pool
    /// instead of a pool of its own. A pool can be shared by any number of
    /// maps with the same key and value types.
    pub fn node_pool(self, pool: Arc<NodePool<K, V>>) -> Self {
        Self {
            node_pool: Some(pool),
            ..self
        }
    }

    /// Builds a `StripedHashMap<K, V>` hashing keys with the default hasher.
    pub fn build(self) -> StripedHashMap<K, V, RandomState> {
        self.build_with_hasher(RandomState::default())
    }

    /// Builds a `StripedHashMap<K, V, S>` hashing keys with `hasher`.
    pub fn build_with_hasher<S>(self, hasher: S) -> StripedHashMap<K, V, S>
    where
        S: BuildHasher,
    {
        let pool = self.node_pool.unwrap_or_else(|| {
            Arc::new(NodePool::new(
                self.pool_capacity.unwrap_or(DEFAULT_POOL_CAPACITY),
            ))
        });

        StripedHashMap::with_everything(
            self.name,
            self.initial_capacity.unwrap_or(DEFAULT_INITIAL_CAPACITY),
            hasher,
            pool,
        )
    }
}
