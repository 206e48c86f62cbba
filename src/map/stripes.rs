use crate::common::constants::STRIPE_COUNT;

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

/// The fixed set of mutexes guarding the bins of a map.
///
/// The number of stripes never changes, only the number of bins does, so after
/// a resize the same stripe may guard different bins. At any instant each bin
/// is guarded by exactly one stripe.
pub(crate) struct Stripes {
    // One cache line per stripe.
    locks: Box<[CachePadded<Mutex<()>>]>,
}

impl Stripes {
    pub(crate) fn new() -> Self {
        let locks = std::iter::repeat_with(|| CachePadded::new(Mutex::new(())))
            .take(STRIPE_COUNT)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { locks }
    }

    #[inline]
    pub(crate) fn stripe_index(&self, bin_index: usize) -> usize {
        let stripe = bin_index % self.locks.len();
        debug_assert!(stripe < self.locks.len());
        stripe
    }

    /// Locks the stripe guarding `bin_index`.
    #[inline]
    pub(crate) fn lock_for_bin(&self, bin_index: usize) -> MutexGuard<'_, ()> {
        self.locks[self.stripe_index(bin_index)].lock()
    }

    /// Locks every stripe, in ascending order so that two threads doing this
    /// at the same time cannot deadlock.
    pub(crate) fn lock_all(&self) -> AllStripesGuard<'_> {
        let guards = self.locks.iter().map(|lock| lock.lock()).collect();
        AllStripesGuard { guards }
    }
}

/// Holds every stripe of a map. Unlocks them in reverse order when dropped.
pub(crate) struct AllStripesGuard<'a> {
    guards: SmallVec<[MutexGuard<'a, ()>; STRIPE_COUNT]>,
}

impl Drop for AllStripesGuard<'_> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Stripes, STRIPE_COUNT};

    #[test]
    fn bins_map_onto_stripes_modulo_count() {
        let stripes = Stripes::new();

        assert_eq!(stripes.stripe_index(3), 3);
        assert_eq!(stripes.stripe_index(STRIPE_COUNT + 3), 3);
        assert_eq!(stripes.stripe_index(STRIPE_COUNT * 7), 0);
    }

    #[test]
    fn lock_all_excludes_bin_locks() {
        let stripes = Stripes::new();

        {
            let _all = stripes.lock_all();
            for bin in 0..STRIPE_COUNT {
                let stripe = &stripes.locks[stripes.stripe_index(bin)];
                assert!(stripe.try_lock().is_none());
            }
        }

        let _bin = stripes.lock_for_bin(5);
        assert!(stripes.locks[5].try_lock().is_none());
        assert!(stripes.locks[6].try_lock().is_some());
    }
}
