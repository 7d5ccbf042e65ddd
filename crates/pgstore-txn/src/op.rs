//! Per-object operation records.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;

use pgstore_interval::{IntervalMap, Split};
use pgstore_types::{AllocHint, ObjectId, OmapUpdateKind, SnapId};

/// How an object comes into being within a transaction.
///
/// The default (`None`) means the object is assumed to exist already; the
/// other variants make the operation a "fresh object" operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Init {
    /// No initialization; the object already exists (or is being deleted).
    #[default]
    None,
    /// Create the object from scratch.
    Create,
    /// Clone the object from `source`.
    Clone {
        /// Object to clone from.
        source: ObjectId,
    },
    /// Rename the object from `source`, which must be a temp object.
    Rename {
        /// Temp object to rename from.
        source: ObjectId,
    },
}

/// One buffered content mutation over a single range of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferUpdate {
    /// Write a payload at the range, with backend fadvise hints.
    Write {
        /// Payload bytes; length equals the range length.
        data: Bytes,
        /// Backend-defined fadvise flags.
        fadvise_flags: u32,
    },
    /// Zero the range.
    Zero,
    /// Copy `len` bytes from `offset` in `from` into the range.
    CloneRange {
        /// Object to copy from; must not be modified by this transaction.
        from: ObjectId,
        /// Offset within `from`.
        offset: u64,
        /// Bytes to copy; equals the range length.
        len: u64,
    },
}

/// Splitter slicing a [`BufferUpdate`] down to a sub-range.
///
/// A `Write` keeps the matching payload sub-slice, a `Zero` stays a zero,
/// and a `CloneRange` advances its source offset and takes the sub-range
/// length; the source object is unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferUpdateSplit;

impl Split<u64, BufferUpdate> for BufferUpdateSplit {
    fn split(offset: u64, len: u64, value: &BufferUpdate) -> BufferUpdate {
        match value {
            BufferUpdate::Write {
                data,
                fadvise_flags,
            } => {
                let start = usize::try_from(offset).expect("write offset fits usize");
                let sub = usize::try_from(len).expect("write length fits usize");
                BufferUpdate::Write {
                    data: data.slice(start..start + sub),
                    fadvise_flags: *fadvise_flags,
                }
            }
            BufferUpdate::Zero => BufferUpdate::Zero,
            BufferUpdate::CloneRange {
                from,
                offset: from_offset,
                len: _,
            } => BufferUpdate::CloneRange {
                from: from.clone(),
                offset: from_offset + offset,
                len,
            },
        }
    }
}

/// The buffered content mutations of one object, keyed by byte range.
pub type BufferUpdates = IntervalMap<u64, BufferUpdate, BufferUpdateSplit>;

/// Every pending mutation against a single object.
///
/// Field semantics are what the backend applies, in this order of concern:
/// optional delete, optional init (create/clone/rename), then attribute,
/// omap, truncate, and buffer edits.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ObjectOperation {
    /// How the object comes into being, if at all.
    pub init: Init,
    /// Delete the object before applying the rest of the operation.
    pub delete_first: bool,
    /// Drop the whole omap before applying `omap_updates`.
    pub clear_omap: bool,
    /// Truncate point; `None` when untouched. Lowering wins (see
    /// `PgTransaction::truncate`).
    pub truncate: Option<u64>,
    /// Attribute edits: `Some` sets the value, `None` removes the key.
    pub attr_updates: BTreeMap<String, Option<Bytes>>,
    /// Ordered omap edits; append order is significant and preserved.
    pub omap_updates: Vec<(OmapUpdateKind, Bytes)>,
    /// Replacement omap header, if any.
    pub omap_header: Option<Bytes>,
    /// Replacement snapshot set, if any. Set at most once per operation.
    pub updated_snaps: Option<BTreeSet<SnapId>>,
    /// Allocation hint for the backend, if any.
    pub alloc_hint: Option<AllocHint>,
    /// Overlapping buffer writes, resolved last-writer-wins at insert.
    pub buffer_updates: BufferUpdates,
}

impl ObjectOperation {
    /// Whether this operation deletes the object and nothing else.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.init == Init::None && self.delete_first
    }

    /// Whether the object is neither deleted nor initialized here.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.init == Init::None && !self.delete_first
    }

    /// Whether the operation produces a fresh object (create/clone/rename).
    #[must_use]
    pub fn is_fresh_object(&self) -> bool {
        self.init != Init::None
    }

    /// The clone or rename source, if the init carries one.
    #[must_use]
    pub fn source(&self) -> Option<&ObjectId> {
        match &self.init {
            Init::Clone { source } | Init::Rename { source } => Some(source),
            Init::None | Init::Create => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_operation_is_none() {
        let op = ObjectOperation::default();
        assert!(op.is_none());
        assert!(!op.is_delete());
        assert!(!op.is_fresh_object());
        assert!(op.source().is_none());
    }

    #[test]
    fn delete_flag_flips_classification() {
        let op = ObjectOperation {
            delete_first: true,
            ..ObjectOperation::default()
        };
        assert!(op.is_delete());
        assert!(!op.is_none());
        assert!(!op.is_fresh_object());
    }

    #[test]
    fn init_variants_classify_as_fresh() {
        let source = ObjectId::new(1, "src");

        let create = ObjectOperation {
            init: Init::Create,
            ..ObjectOperation::default()
        };
        assert!(create.is_fresh_object());
        assert!(create.source().is_none());

        let clone = ObjectOperation {
            init: Init::Clone {
                source: source.clone(),
            },
            ..ObjectOperation::default()
        };
        assert!(clone.is_fresh_object());
        assert_eq!(clone.source(), Some(&source));

        // A fresh object with delete_first still deletes first, but it is
        // not a bare delete.
        let recreate = ObjectOperation {
            init: Init::Create,
            delete_first: true,
            ..ObjectOperation::default()
        };
        assert!(!recreate.is_delete());
        assert!(recreate.is_fresh_object());
    }

    #[test]
    fn write_split_slices_payload() {
        let update = BufferUpdate::Write {
            data: Bytes::from_static(b"0123456789"),
            fadvise_flags: 7,
        };
        let sub = BufferUpdateSplit::split(3, 4, &update);
        assert_eq!(
            sub,
            BufferUpdate::Write {
                data: Bytes::from_static(b"3456"),
                fadvise_flags: 7,
            }
        );
    }

    #[test]
    fn zero_split_stays_zero() {
        assert_eq!(
            BufferUpdateSplit::split(5, 2, &BufferUpdate::Zero),
            BufferUpdate::Zero
        );
    }

    #[test]
    fn clone_range_split_advances_source_offset() {
        let from = ObjectId::new(2, "donor");
        let update = BufferUpdate::CloneRange {
            from: from.clone(),
            offset: 100,
            len: 50,
        };
        let sub = BufferUpdateSplit::split(10, 5, &update);
        assert_eq!(
            sub,
            BufferUpdate::CloneRange {
                from,
                offset: 110,
                len: 5,
            }
        );
    }

    #[test]
    fn buffer_updates_split_through_the_interval_map() {
        let mut updates = BufferUpdates::new();
        updates.insert(
            0,
            10,
            BufferUpdate::Write {
                data: Bytes::from_static(b"aaaaaaaaaa"),
                fadvise_flags: 0,
            },
        );
        updates.insert(4, 2, BufferUpdate::Zero);

        let got: Vec<_> = updates.iter().map(|(o, l, v)| (o, l, v.clone())).collect();
        assert_eq!(
            got,
            vec![
                (
                    0,
                    4,
                    BufferUpdate::Write {
                        data: Bytes::from_static(b"aaaa"),
                        fadvise_flags: 0,
                    }
                ),
                (4, 2, BufferUpdate::Zero),
                (
                    6,
                    4,
                    BufferUpdate::Write {
                        data: Bytes::from_static(b"aaaa"),
                        fadvise_flags: 0,
                    }
                ),
            ]
        );
    }
}
