use std::hash::{BuildHasher, Hash, Hasher};

pub(crate) mod constants;
pub(crate) mod error;

/// Hashes `key` with `build_hasher` and folds the 64-bit result into the
/// unsigned 32-bit hash that selects a bin.
///
/// Bin indices are always taken modulo a power of two, so keeping the hash
/// unsigned is what makes a node's bin after a doubling either its old index or
/// its old index plus the old length.
#[inline]
pub(crate) fn hash<Q, S>(build_hasher: &S, key: &Q) -> u32
where
    Q: Hash + ?Sized,
    S: BuildHasher,
{
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as u32
}
