use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Barrier,
    },
    thread,
};

use paste::paste;
use rand::{rngs::SmallRng, SeedableRng};
use stripe_map::{NodePool, StripedHashMap};

const NUM_THREADS: u64 = 8;
const KEYS_PER_THREAD: u64 = 500;

macro_rules! generate_concurrent_tests {
    ($name:ident, $map_init:expr) => {
        paste! {
            #[test]
            fn [<test_ $name _insert_remove_contention>]() {
                let map: Arc<StripedHashMap<u64, u64>> = Arc::new($map_init);
                let barrier = Arc::new(Barrier::new(NUM_THREADS as usize));

                let threads: Vec<_> = (0..NUM_THREADS)
                    .map(|t| {
                        let map = Arc::clone(&map);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            let keys = t * KEYS_PER_THREAD..(t + 1) * KEYS_PER_THREAD;
                            for round in 0..4 {
                                for key in keys.clone() {
                                    map.insert(key, round);
                                }
                                for key in keys.clone() {
                                    assert_eq!(map.try_get(&key), Some(round));
                                }
                                for key in keys.clone() {
                                    assert!(map.remove(&key));
                                }
                            }
                        })
                    })
                    .collect();

                threads
                    .into_iter()
                    .for_each(|t| t.join().expect("Thread failed"));

                assert!(map.is_empty());
                assert!(map.keys().is_empty());
                assert!(map.iter().next().is_none());
            }

            #[test]
            fn [<test_ $name _augment_counters>]() {
                let map: Arc<StripedHashMap<u64, u64>> = Arc::new($map_init);
                let barrier = Arc::new(Barrier::new(NUM_THREADS as usize));

                let threads: Vec<_> = (0..NUM_THREADS)
                    .map(|_| {
                        let map = Arc::clone(&map);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            for key in 0..KEYS_PER_THREAD {
                                map.augment(key, |_key, exists, count| {
                                    *exists = true;
                                    *count += 1;
                                });
                            }
                        })
                    })
                    .collect();

                threads
                    .into_iter()
                    .for_each(|t| t.join().expect("Thread failed"));

                assert_eq!(map.len(), KEYS_PER_THREAD as usize);
                for key in 0..KEYS_PER_THREAD {
                    assert_eq!(map.try_get(&key), Some(NUM_THREADS));
                }
            }

            #[test]
            fn [<test_ $name _iterate_while_growing>]() {
                let map: Arc<StripedHashMap<u64, u64>> = Arc::new($map_init);
                let done = Arc::new(AtomicBool::new(false));

                let writer = {
                    let map = Arc::clone(&map);
                    let done = Arc::clone(&done);
                    thread::spawn(move || {
                        for key in 0..NUM_THREADS * KEYS_PER_THREAD {
                            map.insert(key, key);
                            if key % 3 == 0 {
                                map.remove(&(key / 2));
                            }
                        }
                        done.store(true, Ordering::Release);
                    })
                };

                let readers: Vec<_> = (0..4)
                    .map(|seed| {
                        let map = Arc::clone(&map);
                        let done = Arc::clone(&done);
                        thread::spawn(move || {
                            let mut rng = SmallRng::seed_from_u64(seed);
                            while !done.load(Ordering::Acquire) {
                                let mut seen = HashSet::new();
                                for (key, value) in map.iter_random(&mut rng) {
                                    assert_eq!(key, value);
                                    assert!(seen.insert(key), "key {key} yielded twice");
                                }
                            }
                        })
                    })
                    .collect();

                writer.join().expect("Writer failed");
                readers
                    .into_iter()
                    .for_each(|t| t.join().expect("Reader failed"));

                // Quiescent now: a full pass sees exactly the live entries.
                let live = map.iter().count();
                assert_eq!(live, map.len());
                assert_eq!(live, map.keys().len());
            }

            #[test]
            fn [<test_ $name _random_eviction>]() {
                const CAPACITY: usize = 200;

                let map: Arc<StripedHashMap<u64, u64>> = Arc::new($map_init);
                let barrier = Arc::new(Barrier::new(NUM_THREADS as usize));

                let threads: Vec<_> = (0..NUM_THREADS)
                    .map(|t| {
                        let map = Arc::clone(&map);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            let mut rng = SmallRng::seed_from_u64(t);
                            barrier.wait();
                            for key in t * KEYS_PER_THREAD..(t + 1) * KEYS_PER_THREAD {
                                map.insert(key, key);
                                while map.len() > CAPACITY {
                                    map.augment_random(&mut rng, |_key, exists, _value| {
                                        *exists = false;
                                    });
                                }
                            }
                        })
                    })
                    .collect();

                threads
                    .into_iter()
                    .for_each(|t| t.join().expect("Thread failed"));

                assert!(map.len() <= CAPACITY);
                assert_eq!(map.keys().len(), map.len());
            }
        }
    };
}

generate_concurrent_tests!(map, StripedHashMap::with_capacity(1));
generate_concurrent_tests!(
    shared_pool_map,
    StripedHashMap::builder()
        .initial_capacity(1)
        .node_pool(Arc::new(NodePool::new(64)))
        .build()
);
generate_concurrent_tests!(
    no_recycle_map,
    StripedHashMap::builder().pool_capacity(0).build()
);
