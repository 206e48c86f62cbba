/// The error type for the fallible accessors of [`StripedHashMap`].
///
/// Lookups that are expected to miss (`try_get`, `contains_key`,
/// `try_get_and_remove` and friends) return `Option` or `bool` instead.
///
/// [`StripedHashMap`]: crate::StripedHashMap
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The key passed to [`StripedHashMap::get`] is not in the map.
    ///
    /// [`StripedHashMap::get`]: crate::StripedHashMap::get
    #[error("The given key was not present in the map")]
    KeyNotFound,

    /// The destination slice passed to [`StripedHashMap::copy_to`] cannot hold
    /// every entry after the given offset.
    ///
    /// [`StripedHashMap::copy_to`]: crate::StripedHashMap::copy_to
    #[error(
        "The destination has room for {available} entries after the offset, \
    but the map holds {required} entries"
    )]
    ArrayTooSmall { required: usize, available: usize },

    /// The offset passed to [`StripedHashMap::copy_to`] lies past the end of
    /// the destination slice.
    ///
    /// [`StripedHashMap::copy_to`]: crate::StripedHashMap::copy_to
    #[error("The offset {offset} is out of range for a destination of length {len}")]
    OffsetOutOfRange { offset: usize, len: usize },
}
