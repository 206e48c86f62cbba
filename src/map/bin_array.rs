use super::{
    node::{self, Link, Node},
    stripes::{AllStripesGuard, Stripes},
};

use std::{cell::UnsafeCell, sync::atomic::Ordering};

use crossbeam_epoch::{Atomic, Guard, Shared};
use parking_lot::MutexGuard;

/// A power-of-two sized array of bin heads.
///
/// The array itself is never resized. Growing the map builds a new array and
/// swaps it in; only the bin heads of the current array are mutated, and only
/// by a thread holding the stripe that guards the bin.
pub(crate) struct BinArray<K, V> {
    bins: Box<[UnsafeCell<Link<K, V>>]>,
    /// Incremented on every resize. Lets an enumerator tell whether the array
    /// it started on is still current without comparing addresses.
    epoch: usize,
}

// Safety: a bin is only read or written while its stripe is held, so keys and
// values are never accessed from two threads at once.
unsafe impl<K: Send, V: Send> Send for BinArray<K, V> {}
unsafe impl<K: Send, V: Send> Sync for BinArray<K, V> {}

impl<K, V> BinArray<K, V> {
    pub(crate) fn with_length(epoch: usize, length: usize) -> Self {
        assert!(length.is_power_of_two());

        let bins = std::iter::repeat_with(|| UnsafeCell::new(None))
            .take(length)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { bins, epoch }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.bins.len()
    }

    #[inline]
    pub(crate) fn epoch(&self) -> usize {
        self.epoch
    }

    #[inline]
    pub(crate) fn bin_index(&self, hash: u32) -> usize {
        let index = hash as usize % self.bins.len();
        debug_assert!(index < self.bins.len());
        index
    }

    /// # Safety
    ///
    /// The caller must hold the stripe guarding `index`, and no mutable
    /// reference into the same bin may be alive.
    #[inline]
    pub(crate) unsafe fn bin(&self, index: usize) -> &Link<K, V> {
        &*self.bins[index].get()
    }

    /// # Safety
    ///
    /// The caller must hold the stripe guarding `index`, and must not create
    /// a second reference into the same bin while this one is alive.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub(crate) unsafe fn bin_mut(&self, index: usize) -> &mut Link<K, V> {
        &mut *self.bins[index].get()
    }

    /// Moves every chain into a new array of twice the length and returns it.
    /// This array is left with every bin empty.
    ///
    /// With the length doubling, a node in bin `i` lands either in bin `i` or
    /// in bin `i + len` of the new array. Each chain is walked once and split
    /// into those two halves, keeping the relative order of its nodes. Nodes
    /// are relinked, never reallocated, and their cached hashes are reused.
    ///
    /// # Safety
    ///
    /// The caller must hold every stripe.
    pub(crate) unsafe fn split_into_doubled(&self) -> BinArray<K, V> {
        let old_len = self.bins.len();
        let new_len = old_len * 2;
        let mut doubled = BinArray::with_length(self.epoch.wrapping_add(1), new_len);
        let (low, high) = doubled.bins.split_at_mut(old_len);

        for (index, bin) in self.bins.iter().enumerate() {
            let mut chain = (*bin.get()).take();
            let mut low_tail = low[index].get_mut();
            let mut high_tail = high[index].get_mut();

            while let Some(mut node) = chain {
                chain = node.next.take();

                let target = node.hash as usize % new_len;
                if target == index {
                    low_tail = &mut low_tail.insert(node).next;
                } else {
                    debug_assert_eq!(target, index + old_len);
                    high_tail = &mut high_tail.insert(node).next;
                }
            }
        }

        doubled
    }

    /// Takes every chain out of the array.
    ///
    /// # Safety
    ///
    /// The caller must hold every stripe.
    pub(crate) unsafe fn drain(&self) -> impl Iterator<Item = Link<K, V>> + '_ {
        self.bins.iter().map(|bin| (*bin.get()).take())
    }

    /// Calls `f` with every entry in the array.
    ///
    /// # Safety
    ///
    /// The caller must hold every stripe.
    pub(crate) unsafe fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for bin in self.bins.iter() {
            let mut link: &Link<K, V> = &*bin.get();
            while let Some(node) = link {
                f(&node.key, &node.value);
                link = &node.next;
            }
        }
    }
}

impl<K, V> Drop for BinArray<K, V> {
    fn drop(&mut self) {
        for bin in self.bins.iter_mut() {
            node::drop_chain(bin.get_mut().take());
        }
    }
}

/// The current bin array of a map together with the stripes guarding it.
pub(crate) struct BinArrayRef<'a, K, V> {
    pub(crate) bin_array: &'a Atomic<BinArray<K, V>>,
    pub(crate) stripes: &'a Stripes,
}

impl<'a, K, V> BinArrayRef<'a, K, V> {
    /// Returns the array that is current at the time of the call. Another
    /// thread may replace it right after.
    #[inline]
    pub(crate) fn current<'g>(
        &self,
        guard: &'g Guard,
    ) -> (Shared<'g, BinArray<K, V>>, &'g BinArray<K, V>)
    where
        'a: 'g,
    {
        let ptr = self.bin_array.load(Ordering::Acquire, guard);
        // Safety: the pointer is never null while the map is alive, and a
        // replaced array is only destroyed once no guard can observe it.
        (ptr, unsafe { ptr.deref() })
    }

    /// Locks the bin that `hash` maps to in the current array.
    ///
    /// The array is read before its stripe is taken, so a resize may slip in
    /// between. After locking, the current array is read again; if it changed,
    /// the stripe is released and the bin is resolved against the new array.
    /// A resize needs every stripe, so once the check passes the returned bin
    /// stays in place until the lock is dropped.
    pub(crate) fn lock_bin<'g>(&self, hash: u32, guard: &'g Guard) -> LockedBin<'g, K, V>
    where
        'a: 'g,
    {
        loop {
            let (snapshot, array) = self.current(guard);
            let index = array.bin_index(hash);
            let stripe = self.stripes.lock_for_bin(index);

            if self.bin_array.load(Ordering::Acquire, guard) == snapshot {
                return LockedBin {
                    array,
                    index,
                    _stripe: stripe,
                };
            }
        }
    }

    /// Locks bin `index` of the array with the given epoch. Returns `None` if
    /// that array has been replaced.
    pub(crate) fn lock_bin_in_epoch<'g>(
        &self,
        epoch: usize,
        index: usize,
        guard: &'g Guard,
    ) -> Option<LockedBin<'g, K, V>>
    where
        'a: 'g,
    {
        let (snapshot, array) = self.current(guard);
        if array.epoch() != epoch {
            return None;
        }

        let stripe = self.stripes.lock_for_bin(index);
        if self.bin_array.load(Ordering::Acquire, guard) != snapshot {
            return None;
        }

        Some(LockedBin {
            array,
            index,
            _stripe: stripe,
        })
    }

    /// Locks every stripe and returns the array, which cannot be replaced
    /// until the returned guard is dropped.
    pub(crate) fn lock_all<'g>(
        &self,
        guard: &'g Guard,
    ) -> (
        AllStripesGuard<'a>,
        Shared<'g, BinArray<K, V>>,
        &'g BinArray<K, V>,
    )
    where
        'a: 'g,
    {
        let all = self.stripes.lock_all();
        let (ptr, array) = self.current(guard);
        (all, ptr, array)
    }
}

/// Exclusive access to one bin, held for as long as the stripe is locked.
pub(crate) struct LockedBin<'g, K, V> {
    array: &'g BinArray<K, V>,
    index: usize,
    _stripe: MutexGuard<'g, ()>,
}

impl<'g, K, V> LockedBin<'g, K, V> {
    #[inline]
    pub(crate) fn head(&self) -> &Link<K, V> {
        // Safety: the stripe guarding this bin is held, and the only other
        // reference into the bin would come from `head_mut`, which borrows
        // `self` mutably.
        unsafe { self.array.bin(self.index) }
    }

    #[inline]
    pub(crate) fn head_mut(&mut self) -> &mut Link<K, V> {
        // Safety: as above.
        unsafe { self.array.bin_mut(self.index) }
    }

    /// Returns the node `position` links from the head.
    pub(crate) fn nth(&self, position: usize) -> Option<&Node<K, V>> {
        let mut node = self.head().as_deref();
        for _ in 0..position {
            node = node?.next.as_deref();
        }
        node
    }
}
