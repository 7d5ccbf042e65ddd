//! Splitter seam for interval maps.

use bytes::Bytes;

use crate::key::IntervalKey;

/// Produces the sub-value for a sub-range of an existing entry.
///
/// `split(offset, len, value)` must return the value corresponding to
/// `[offset, offset + len)` within `value`'s own range. Implementations
/// must be pure and total on any sub-range of any value the map holds;
/// they are invoked while the map rebuilds the surviving prefix and suffix
/// of a partially overwritten entry.
///
/// Splitters are carried as a type parameter and invoked through an
/// associated function, so a stateless splitter costs nothing per map.
pub trait Split<K: IntervalKey, V> {
    /// The value for `[offset, offset + len)` within `value`.
    fn split(offset: K, len: K, value: &V) -> V;
}

/// Splitter for raw [`Bytes`] payload maps: a sub-range of an entry is the
/// matching sub-slice of its payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BytesSplit;

impl Split<u64, Bytes> for BytesSplit {
    fn split(offset: u64, len: u64, value: &Bytes) -> Bytes {
        let start = usize::try_from(offset).expect("payload offset fits usize");
        let len = usize::try_from(len).expect("payload length fits usize");
        value.slice(start..start + len)
    }
}
