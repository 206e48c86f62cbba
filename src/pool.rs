//! Recycling of bin nodes.
//!
//! Every insertion needs a node and every removal frees one. A [`NodePool`]
//! keeps the allocations of released nodes in a bounded lock-free queue so
//! that steady insert/remove traffic reuses them instead of going back to the
//! allocator. When the queue is full, released nodes are simply freed.

use crate::map::node::Node;

use std::{fmt, mem::MaybeUninit, ptr};

use crossbeam_channel::{Receiver, Sender, TrySendError};

/// The storage of a released node. Holds no key or value.
type Slot<K, V> = Box<MaybeUninit<Node<K, V>>>;

/// A bounded free list of node allocations.
///
/// A pool may be shared by any number of maps with the same key and value
/// types (see [`StripedHashMapBuilder::node_pool`][builder-pool]); all of its
/// operations are safe to call concurrently.
///
/// [builder-pool]: crate::StripedHashMapBuilder::node_pool
///
/// # Examples
///
/// ```rust
/// use stripe_map::{NodePool, StripedHashMap};
/// use std::sync::Arc;
///
/// let pool = Arc::new(NodePool::new(128));
///
/// let a: StripedHashMap<u32, String> =
///     StripedHashMap::builder().node_pool(Arc::clone(&pool)).build();
/// let b: StripedHashMap<u32, String> =
///     StripedHashMap::builder().node_pool(Arc::clone(&pool)).build();
///
/// a.insert(1, "one".to_string());
/// a.remove(&1);
/// assert_eq!(pool.len(), 1);
///
/// // `b` reuses the node `a` released.
/// b.insert(2, "two".to_string());
/// assert_eq!(pool.len(), 0);
/// ```
pub struct NodePool<K, V> {
    sender: Sender<Slot<K, V>>,
    receiver: Receiver<Slot<K, V>>,
    capacity: usize,
}

impl<K, V> NodePool<K, V> {
    /// Creates a pool that keeps at most `capacity` idle nodes.
    ///
    /// A capacity of zero disables recycling.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Returns the maximum number of idle nodes this pool keeps.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of idle nodes currently in the pool.
    ///
    /// Other threads may take or return nodes at any time.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if the pool holds no idle nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a node, reusing an idle allocation when one is available.
    pub(crate) fn acquire(&self, key: K, value: V, hash: u32) -> Box<Node<K, V>> {
        let node = Node {
            key,
            value,
            hash,
            next: None,
        };

        match self.receiver.try_recv() {
            Ok(mut slot) => {
                *slot = MaybeUninit::new(node);
                // Safety: the slot was initialized on the line above, and
                // `MaybeUninit<T>` has the same layout as `T`.
                unsafe { Box::from_raw(Box::into_raw(slot).cast::<Node<K, V>>()) }
            }
            Err(_) => Box::new(node),
        }
    }

    /// Moves the key and value out of a detached node and keeps its
    /// allocation for a later `acquire`.
    pub(crate) fn release(&self, node: Box<Node<K, V>>) -> (K, V) {
        debug_assert!(
            node.next.is_none(),
            "released a node still linked to a chain"
        );

        let raw = Box::into_raw(node);
        // Safety: `raw` comes from a live box. The fields are read out exactly
        // once, after which the allocation is only treated as uninitialized
        // storage with the same layout.
        let Node { key, value, .. } = unsafe { ptr::read(raw) };
        let slot = unsafe { Box::from_raw(raw.cast::<MaybeUninit<Node<K, V>>>()) };

        if let Err(TrySendError::Full(_slot)) = self.sender.try_send(slot) {
            #[cfg(feature = "logging")]
            log::trace!(
                "Node pool is full ({} idle nodes); freeing the released node",
                self.capacity
            );
        }

        (key, value)
    }
}

impl<K, V> Default for NodePool<K, V> {
    fn default() -> Self {
        Self::new(crate::common::constants::DEFAULT_POOL_CAPACITY)
    }
}

impl<K, V> fmt::Debug for NodePool<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("capacity", &self.capacity)
            .field("idle", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::NodePool;
    use crate::test_util::DropTracker;

    #[test]
    fn reuses_released_allocations() {
        let pool = NodePool::new(4);

        let node = pool.acquire(1u32, "one".to_string(), 7);
        let addr = &*node as *const _ as usize;

        assert_eq!(pool.release(node), (1, "one".to_string()));
        assert_eq!(pool.len(), 1);

        let node = pool.acquire(2u32, "two".to_string(), 9);
        assert_eq!(&*node as *const _ as usize, addr);
        assert_eq!((node.key, node.hash), (2, 9));
        assert!(pool.is_empty());
    }

    #[test]
    fn frees_nodes_beyond_capacity() {
        let pool = NodePool::new(1);

        let a = pool.acquire(1u8, (), 1);
        let b = pool.acquire(2u8, (), 2);
        pool.release(a);
        pool.release(b);

        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn zero_capacity_disables_recycling() {
        let pool = NodePool::new(0);
        let node = pool.acquire(1u8, 1u8, 1);
        pool.release(node);
        assert!(pool.is_empty());
    }

    #[test]
    fn released_keys_and_values_drop_once() {
        let tracker = DropTracker::new();
        let pool = NodePool::new(8);

        let node = pool.acquire(tracker.track(1), tracker.track(2), 0);
        let (key, value) = pool.release(node);
        assert_eq!(tracker.dropped(), 0);

        drop((key, value));
        assert_eq!(tracker.dropped(), 2);

        // Dropping the pool frees idle slots without touching their contents.
        drop(pool);
        assert_eq!(tracker.dropped(), 2);
    }
}
