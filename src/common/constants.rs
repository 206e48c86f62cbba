/// Number of mutexes guarding the bins. Bin `i` is guarded by stripe
/// `i % STRIPE_COUNT`. This never changes over the lifetime of a map.
pub(crate) const STRIPE_COUNT: usize = 16;

/// Target average chain length. The bin array doubles once the item count
/// reaches `bin_count * LOAD_RATIO`.
pub(crate) const LOAD_RATIO: usize = 3;

/// Upper bound for both the bin count and the item count that still triggers
/// growth.
pub(crate) const MAX_TABLE_SIZE: usize = 0x3FFF_FFFF;

pub(crate) const DEFAULT_INITIAL_CAPACITY: usize = 32;

/// Number of idle nodes a pool keeps before it starts freeing released nodes.
pub(crate) const DEFAULT_POOL_CAPACITY: usize = 1024;
