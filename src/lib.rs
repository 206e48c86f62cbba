#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Stripe-map provides [`StripedHashMap`], a concurrent hash map that guards
//! its bins with a small, fixed set of striped locks.
//!
//! # Features
//!
//! - All operations take `&self`. Share a map between threads with an `Arc`.
//! - In-place, atomic read-modify-write of a single entry with
//!   [`augment`][augment], which can also create or delete the entry.
//!   [`augment_random`][augment-random] does the same for an entry picked at
//!   random, which is handy for sampling-based eviction.
//! - Removed nodes are recycled through a [`NodePool`], which can be shared by
//!   several maps.
//! - The bin array doubles under load and never shrinks. Iteration keeps going
//!   while other threads write and stops early if the map grows.
//!
//! [augment]: ./struct.StripedHashMap.html#method.augment
//! [augment-random]: ./struct.StripedHashMap.html#method.augment_random
//!
//! # Example
//!
//! ```rust
//! use stripe_map::StripedHashMap;
//!
//! let hits = StripedHashMap::new();
//!
//! for page in ["/", "/about", "/"] {
//!     hits.augment(page, |_page, exists, count: &mut u32| {
//!         *exists = true;
//!         *count += 1;
//!     });
//! }
//!
//! assert_eq!(hits.get("/"), Ok(2));
//! assert_eq!(hits.get("/about"), Ok(1));
//! ```
//!
//! # Logging
//!
//! Enable the `logging` feature to have maps report growth through the
//! [`log`](https://docs.rs/log) crate.
//!
//! # Minimum Supported Rust Versions
//!
//! This crate's minimum supported Rust version (MSRV) is 1.65.

pub(crate) mod builder;
pub(crate) mod common;
pub(crate) mod iter;
pub(crate) mod map;
pub(crate) mod pool;

#[cfg(test)]
pub(crate) mod test_util;

pub use builder::StripedHashMapBuilder;
pub use common::error::Error;
pub use iter::Iter;
pub use map::{augment::AugmentationResult, DefaultHashBuilder, StripedHashMap};
pub use pool::NodePool;
