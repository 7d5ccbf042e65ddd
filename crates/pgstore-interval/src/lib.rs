//! Interval map with split-on-overlap semantics.
//!
//! [`IntervalMap`] associates half-open integer ranges `[off, off + len)`
//! with opaque values. Inserting or erasing over an existing range splits
//! any overlapping entries through a [`Split`] implementation, so more
//! recent insertions overwrite older ones and the non-overlapping tails of
//! older entries survive as sub-ranges. This is the opposite of the usual
//! interval-aggregation structures, whose merge concept assumes
//! commutativity and cannot express last-writer-wins.
//!
//! The map never coalesces adjacent entries, even when their values happen
//! to be equal: values are opaque and equality is not meaningful here.

pub mod key;
pub mod map;
pub mod split;

pub use key::IntervalKey;
pub use map::{IntervalMap, Iter, RangeIter};
pub use split::{BytesSplit, Split};
