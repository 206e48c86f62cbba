use crate::StripedHashMap;

use std::iter::FusedIterator;

/// An iterator over clones of the entries of a [`StripedHashMap`].
///
/// Created by [`StripedHashMap::iter`] and [`StripedHashMap::iter_random`].
///
/// The iterator remembers the bin array it started on and a cursor of (bin,
/// position in the bin). Every call to `next` locks the stripe of the cursor's
/// bin, walks `position` links from the head and releases the lock again, so
/// writers are never blocked for more than one step.
///
/// What this guarantees while other threads write to the map:
///
/// - `next` never panics or loops forever.
/// - No key is yielded twice.
/// - Entries may be missed. A removal in a bin shifts the remaining nodes one
///   position back, so the node after it is skipped. If the map grows, the
///   iterator stops at once and yields nothing more.
pub struct Iter<'a, K, V, S> {
    map: &'a StripedHashMap<K, V, S>,
    epoch: usize,
    bin_count: usize,
    start: usize,
    bins_visited: usize,
    position: usize,
    is_done: bool,
}

impl<'a, K, V, S> Iter<'a, K, V, S> {
    /// `start` receives the bin count and returns the bin to start from.
    pub(crate) fn new(
        map: &'a StripedHashMap<K, V, S>,
        start: impl FnOnce(usize) -> usize,
    ) -> Self {
        let guard = &crossbeam_epoch::pin();
        let (_, array) = map.bin_array_ref().current(guard);
        let bin_count = array.len();

        Self {
            map,
            epoch: array.epoch(),
            bin_count,
            start: start(bin_count) % bin_count,
            bins_visited: 0,
            position: 0,
            is_done: false,
        }
    }
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S>
where
    K: Clone,
    V: Clone,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.is_done && self.bins_visited < self.bin_count {
            let index = (self.start + self.bins_visited) % self.bin_count;
            let guard = &crossbeam_epoch::pin();

            let bin = match self
                .map
                .bin_array_ref()
                .lock_bin_in_epoch(self.epoch, index, guard)
            {
                Some(bin) => bin,
                // The map grew since this iterator started.
                None => break,
            };

            if let Some(node) = bin.nth(self.position) {
                self.position += 1;
                return Some((node.key.clone(), node.value.clone()));
            }

            self.bins_visited += 1;
            self.position = 0;
        }

        self.is_done = true;
        None
    }
}

impl<K, V, S> FusedIterator for Iter<'_, K, V, S>
where
    K: Clone,
    V: Clone,
{
}

#[cfg(test)]
mod tests {
    use crate::StripedHashMap;

    use std::collections::HashSet;

    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn visits_every_entry_once() {
        let map = StripedHashMap::with_capacity(4);
        for i in 0..100u32 {
            map.insert(i, i * 3);
        }

        let entries = map.iter().collect::<Vec<_>>();
        assert_eq!(entries.len(), map.len());

        let keys = entries.iter().map(|(k, _)| *k).collect::<HashSet<_>>();
        assert_eq!(keys.len(), 100);
        assert!(entries.iter().all(|(k, v)| *v == k * 3));
    }

    #[test]
    fn empty_map_yields_nothing() {
        let map = StripedHashMap::<u8, u8>::new();
        let mut iter = map.iter();
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn random_start_still_covers_everything() {
        let map = StripedHashMap::with_capacity(8);
        for i in 0..50u32 {
            map.insert(i, ());
        }
        let mut rng = SmallRng::seed_from_u64(3);

        for _ in 0..10 {
            let keys = map
                .iter_random(&mut rng)
                .map(|(k, _)| k)
                .collect::<HashSet<_>>();
            assert_eq!(keys.len(), 50);
        }
    }

    #[test]
    fn random_starts_differ() {
        let map = StripedHashMap::with_capacity(64);
        for i in 0..64u32 {
            map.insert(i, ());
        }
        let mut rng = SmallRng::seed_from_u64(11);

        let firsts = (0..20)
            .filter_map(|_| map.iter_random(&mut rng).next())
            .map(|(k, _)| k)
            .collect::<HashSet<_>>();
        assert!(firsts.len() > 1);
    }

    #[test]
    fn stops_when_the_map_grows() {
        let map = StripedHashMap::with_capacity(1);
        for i in 0..3u32 {
            map.insert(i, i);
        }

        let mut iter = map.iter();
        assert!(iter.next().is_some());

        // The fourth entry doubles the single bin.
        map.insert(3, 3);
        assert_eq!(map.bin_count(), 2);

        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn removal_behind_the_cursor_never_repeats_keys() {
        let map = StripedHashMap::with_capacity(1);
        for i in 0..3u32 {
            map.insert(i, i);
        }

        let mut iter = map.iter();
        let (first, _) = iter.next().expect("first entry");
        assert!(map.remove(&first));

        let rest = iter.map(|(k, _)| k).collect::<Vec<_>>();
        assert!(!rest.contains(&first));
        // The entry that moved into the visited position is skipped.
        assert_eq!(rest.len(), 1);
    }
}
