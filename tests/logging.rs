#![cfg(feature = "logging")]

use std::sync::Arc;

use stripe_map::{NodePool, StripedHashMap};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn named_map_logs_growth() {
    init_logger();

    let map = StripedHashMap::builder()
        .name("growth")
        .initial_capacity(2)
        .build();
    for i in 0..100u32 {
        map.insert(i, i);
    }

    // Five doublings from 2 to 64 bins, one debug record each.
    assert_eq!(map.bin_count(), 64);
    assert_eq!(map.len(), 100);
}

#[test]
fn full_pool_logs_and_frees_nodes() {
    init_logger();

    let pool = Arc::new(NodePool::new(4));
    let map = StripedHashMap::builder()
        .node_pool(Arc::clone(&pool))
        .build();
    for i in 0..10u32 {
        map.insert(i, i.to_string());
    }

    map.clear();
    assert_eq!(pool.len(), 4);
    assert!(map.is_empty());
}
