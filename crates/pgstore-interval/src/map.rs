//! The interval map itself.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::key::IntervalKey;
use crate::split::Split;

/// Ordered, non-overlapping mapping from half-open ranges `[off, off + len)`
/// to values, with last-writer-wins overlap resolution.
///
/// Entries are stored by range start; each start maps to `(len, value)`.
/// Invariants, maintained by every operation:
///
/// - entries never overlap: for neighbors `(a, la)` and `(b, lb)` with
///   `a < b`, `a + la <= b`;
/// - every entry has `len > 0`;
/// - iteration yields entries in ascending start order.
///
/// `S` supplies the [`Split`] used to cut an existing entry's value down to
/// its surviving prefix or suffix when a new range partially overlaps it.
pub struct IntervalMap<K, V, S> {
    entries: BTreeMap<K, (K, V)>,
    _split: PhantomData<S>,
}

impl<K, V, S> IntervalMap<K, V, S> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            _split: PhantomData,
        }
    }
}

impl<K, V, S> Default for IntervalMap<K, V, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone, S> Clone for IntervalMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            _split: PhantomData,
        }
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug, S> std::fmt::Debug for IntervalMap<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(&self.entries).finish()
    }
}

impl<K: PartialEq, V: PartialEq, S> PartialEq for IntervalMap<K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K, V, S> IntervalMap<K, V, S>
where
    K: IntervalKey,
    S: Split<K, V>,
{
    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stored entries (extents), not covered bytes.
    #[must_use]
    pub fn ext_count(&self) -> usize {
        self.entries.len()
    }

    /// Insert `value` over `[off, off + len)`, overwriting the overlapped
    /// portion of any existing entries; their non-overlapping tails survive
    /// as split sub-ranges.
    ///
    /// Inserting an empty range is a programming error.
    pub fn insert(&mut self, off: K, len: K, value: V) {
        assert!(
            len > K::ZERO,
            "IntervalMap::insert: empty range at {off:?}"
        );
        self.erase(off, len);
        self.entries.insert(off, (len, value));
    }

    /// Erase `[off, off + len)`. Entries straddling either boundary are
    /// split and their surviving prefix/suffix reinserted. `len == 0` is a
    /// no-op; `off + len` saturates, so a length of `K::MAX - off` erases
    /// to the end of the key space.
    pub fn erase(&mut self, off: K, len: K) {
        if len == K::ZERO {
            return;
        }
        let end = off.saturating_add(len);

        let mut doomed: SmallVec<[K; 8]> = SmallVec::new();
        let mut remnants: SmallVec<[(K, (K, V)); 2]> = SmallVec::new();
        for (&start, &(elen, ref value)) in self.overlap_window(off, end) {
            doomed.push(start);
            if start < off {
                let head = off - start;
                remnants.push((start, (head, S::split(K::ZERO, head, value))));
            }
            let entry_end = start.saturating_add(elen);
            if end < entry_end {
                let tail = entry_end - end;
                remnants.push((end, (tail, S::split(elen - tail, tail, value))));
            }
        }

        for start in doomed {
            self.entries.remove(&start);
        }
        for (start, entry) in remnants {
            self.entries.insert(start, entry);
        }
    }

    /// The sub-sequence of entries whose ranges intersect `[off, off + len)`,
    /// in ascending start order.
    pub fn get_containing_range(&self, off: K, len: K) -> RangeIter<'_, K, V> {
        let end = off.saturating_add(len);
        RangeIter {
            inner: self.overlap_window(off, end),
        }
    }

    /// Iterate all entries as `(start, len, &value)` in ascending start order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Entries intersecting `[off, end)`.
    ///
    /// The only candidate starting at or before `off` is the last such
    /// entry; it is part of the window iff it extends past `off`. Every
    /// entry starting inside `(off, end)` intersects by construction.
    fn overlap_window(&self, off: K, end: K) -> btree_map::Range<'_, K, (K, V)> {
        let lo = match self.entries.range(..=off).next_back() {
            Some((&start, &(len, _))) if start.saturating_add(len) > off => start,
            _ => off,
        };
        self.entries.range(lo..end)
    }
}

impl<'a, K: IntervalKey, V, S: Split<K, V>> IntoIterator for &'a IntervalMap<K, V, S> {
    type Item = (K, K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward iterator over all entries of an [`IntervalMap`].
pub struct Iter<'a, K, V> {
    inner: btree_map::Iter<'a, K, (K, V)>,
}

impl<'a, K: IntervalKey, V> Iterator for Iter<'a, K, V> {
    type Item = (K, K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(&start, &(len, ref value))| (start, len, value))
    }
}

impl<K: IntervalKey, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner
            .next_back()
            .map(|(&start, &(len, ref value))| (start, len, value))
    }
}

/// Iterator over the entries intersecting a queried range.
pub struct RangeIter<'a, K, V> {
    inner: btree_map::Range<'a, K, (K, V)>,
}

impl<'a, K: IntervalKey, V> Iterator for RangeIter<'a, K, V> {
    type Item = (K, K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(&start, &(len, ref value))| (start, len, value))
    }
}
