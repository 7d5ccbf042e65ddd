//! The placement-group transaction.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use bytes::Bytes;

use pgstore_types::{AllocHint, ObcRef, ObjectId, OmapUpdateKind, SnapId};

use crate::omap;
use crate::op::{BufferUpdate, Init, ObjectOperation};

/// An ordered batch of per-object mutations against one placement group.
///
/// Built by a single logical owner, then handed to the backend, which
/// consumes it through [`PgTransaction::safe_create_traverse`]. Mutation
/// preconditions are programming-error assertions: a transaction that
/// violates them is a bug in the caller layer, not a runtime failure.
///
/// Caller obligations the mutation path cannot check locally (acyclicity
/// of the clone/rename graph, clone-range sources untouched by the same
/// transaction) are validated on demand by [`crate::validate`].
#[derive(Default)]
pub struct PgTransaction {
    ops: BTreeMap<ObjectId, ObjectOperation>,
    obc_map: BTreeMap<ObjectId, ObcRef>,
}

impl PgTransaction {
    /// Create an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the operation at `hoid` for further mutation.
    fn op_for_modify(&mut self, hoid: &ObjectId) -> &mut ObjectOperation {
        let op = self.ops.entry(hoid.clone()).or_default();
        assert!(
            !op.is_delete(),
            "PgTransaction: mutation of deleted object {hoid}"
        );
        op
    }

    /// Record an object-context handle, keyed by the id embedded in it.
    pub fn add_obc(&mut self, obc: ObcRef) {
        let hoid = obc.object_id().clone();
        self.obc_map.insert(hoid, obc);
    }

    /// The context handle recorded for `hoid`, if any.
    #[must_use]
    pub fn get_obc(&self, hoid: &ObjectId) -> Option<ObcRef> {
        self.obc_map.get(hoid).cloned()
    }

    /// All recorded context handles in id order.
    pub fn obcs(&self) -> impl Iterator<Item = (&ObjectId, &ObcRef)> {
        self.obc_map.iter()
    }

    /// Set up state for a new object.
    pub fn create(&mut self, hoid: &ObjectId) {
        let op = self.ops.entry(hoid.clone()).or_default();
        assert!(
            op.is_none() || op.is_delete(),
            "PgTransaction: create of already-initialized object {hoid}"
        );
        op.init = Init::Create;
    }

    /// Set up state for `target` cloned from `source`.
    pub fn clone_object(&mut self, target: &ObjectId, source: &ObjectId) {
        let op = self.ops.entry(target.clone()).or_default();
        assert!(
            op.is_none() || op.is_delete(),
            "PgTransaction: clone onto already-initialized object {target}"
        );
        op.init = Init::Clone {
            source: source.clone(),
        };
    }

    /// Set up state for `target` renamed from the temp object `source`.
    ///
    /// Any operation already pending on `source` moves onto `target`
    /// (buffer updates, attrs, everything), so the rename encapsulates the
    /// modifications made to the temp object. The source key is erased.
    pub fn rename(&mut self, target: &ObjectId, source: &ObjectId) {
        assert!(
            source.is_temp(),
            "PgTransaction: rename source {source} must be a temp object"
        );
        assert!(
            !target.is_temp(),
            "PgTransaction: rename target {target} must not be a temp object"
        );

        let moved = self.ops.remove(source);
        let op = self.ops.entry(target.clone()).or_default();
        assert!(
            op.is_none() || op.is_delete(),
            "PgTransaction: rename onto already-initialized object {target}"
        );
        if let Some(pending) = moved {
            tracing::debug!(
                source = %source,
                target = %target,
                "rename carries the pending source operation"
            );
            *op = pending;
        }
        op.init = Init::Rename {
            source: source.clone(),
        };
    }

    /// Queue removal of the object. Any mutations already recorded against
    /// it are dropped.
    pub fn remove(&mut self, hoid: &ObjectId) {
        let op = self.op_for_modify(hoid);
        assert!(
            op.updated_snaps.is_none(),
            "PgTransaction: remove of {hoid} with a pending snap update"
        );
        *op = ObjectOperation::default();
        op.delete_first = true;
        tracing::trace!(object = %hoid, "queued delete");
    }

    /// Replace the object's snapshot set. May be issued at most once per
    /// operation.
    pub fn update_snaps(&mut self, hoid: &ObjectId, snaps: BTreeSet<SnapId>) {
        let op = self.op_for_modify(hoid);
        assert!(
            op.updated_snaps.is_none(),
            "PgTransaction: snap set of {hoid} already updated"
        );
        op.updated_snaps = Some(snaps);
    }

    /// Drop the object's whole omap, discarding omap edits queued so far.
    pub fn omap_clear(&mut self, hoid: &ObjectId) {
        let op = self.op_for_modify(hoid);
        op.clear_omap = true;
        op.omap_updates.clear();
        op.omap_header = None;
    }

    /// Truncate the object to `off`.
    ///
    /// Buffered writes at or past `off` are dropped. Lowering wins: a
    /// truncate above an already-recorded truncate point is ignored. Fresh
    /// objects record no truncate point at all; trimming the buffered
    /// writes is enough, there is nothing on disk to cut.
    pub fn truncate(&mut self, hoid: &ObjectId, off: u64) {
        let op = self.op_for_modify(hoid);
        if matches!(op.truncate, Some(existing) if existing <= off) {
            return;
        }
        op.buffer_updates.erase(off, u64::MAX - off);
        if !op.is_fresh_object() {
            op.truncate = Some(off);
        }
        tracing::trace!(object = %hoid, offset = off, "truncate trims buffered writes");
    }

    /// Set several attributes at once.
    pub fn setattrs(&mut self, hoid: &ObjectId, attrs: impl IntoIterator<Item = (String, Bytes)>) {
        let op = self.op_for_modify(hoid);
        for (name, value) in attrs {
            op.attr_updates.insert(name, Some(value));
        }
    }

    /// Set one attribute.
    pub fn setattr(&mut self, hoid: &ObjectId, name: impl Into<String>, value: Bytes) {
        let op = self.op_for_modify(hoid);
        op.attr_updates.insert(name.into(), Some(value));
    }

    /// Remove one attribute.
    pub fn rmattr(&mut self, hoid: &ObjectId, name: impl Into<String>) {
        let op = self.op_for_modify(hoid);
        op.attr_updates.insert(name.into(), None);
    }

    /// Record an allocation hint for the backend.
    pub fn set_alloc_hint(&mut self, hoid: &ObjectId, hint: AllocHint) {
        let op = self.op_for_modify(hoid);
        op.alloc_hint = Some(hint);
    }

    /// Buffer a payload write over `[off, off + data.len())`.
    pub fn write(&mut self, hoid: &ObjectId, off: u64, data: Bytes, fadvise_flags: u32) {
        let len = data.len() as u64;
        let op = self.op_for_modify(hoid);
        op.buffer_updates.insert(
            off,
            len,
            BufferUpdate::Write {
                data,
                fadvise_flags,
            },
        );
    }

    /// Buffer zeroing of `[off, off + len)`.
    pub fn zero(&mut self, hoid: &ObjectId, off: u64, len: u64) {
        let op = self.op_for_modify(hoid);
        op.buffer_updates.insert(off, len, BufferUpdate::Zero);
    }

    /// Buffer a copy of `[fromoff, fromoff + len)` in `from` into
    /// `[tooff, tooff + len)` of `to`.
    ///
    /// It is a caller obligation that `from` is not modified by this same
    /// transaction; [`crate::validate`] checks it in debug flows.
    pub fn clone_range(
        &mut self,
        from: &ObjectId,
        to: &ObjectId,
        fromoff: u64,
        len: u64,
        tooff: u64,
    ) {
        let op = self.op_for_modify(to);
        op.buffer_updates.insert(
            tooff,
            len,
            BufferUpdate::CloneRange {
                from: from.clone(),
                offset: fromoff,
                len,
            },
        );
    }

    /// Append a pre-encoded key/value insert payload to the omap edits.
    pub fn omap_setkeys(&mut self, hoid: &ObjectId, payload: Bytes) {
        let op = self.op_for_modify(hoid);
        op.omap_updates.push((OmapUpdateKind::Insert, payload));
    }

    /// Typed variant of [`Self::omap_setkeys`].
    pub fn omap_setkeys_map(&mut self, hoid: &ObjectId, entries: &BTreeMap<String, Bytes>) {
        self.omap_setkeys(hoid, omap::encode_entries(entries));
    }

    /// Append a pre-encoded key-removal payload to the omap edits.
    pub fn omap_rmkeys(&mut self, hoid: &ObjectId, payload: Bytes) {
        let op = self.op_for_modify(hoid);
        op.omap_updates.push((OmapUpdateKind::Remove, payload));
    }

    /// Typed variant of [`Self::omap_rmkeys`].
    pub fn omap_rmkeys_set(&mut self, hoid: &ObjectId, keys: &BTreeSet<String>) {
        self.omap_rmkeys(hoid, omap::encode_keys(keys));
    }

    /// Replace the omap header.
    pub fn omap_setheader(&mut self, hoid: &ObjectId, header: Bytes) {
        let op = self.op_for_modify(hoid);
        op.omap_header = Some(header);
    }

    /// Ensure an operation entry exists for `hoid` without mutating it.
    pub fn nop(&mut self, hoid: &ObjectId) {
        let _ = self.op_for_modify(hoid);
    }

    /// Whether no operations are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of objects with a recorded operation.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// The operation recorded for `hoid`, if any.
    #[must_use]
    pub fn op(&self, hoid: &ObjectId) -> Option<&ObjectOperation> {
        self.ops.get(hoid)
    }

    /// All recorded operations in id order.
    pub fn ops(&self) -> impl Iterator<Item = (&ObjectId, &ObjectOperation)> {
        self.ops.iter()
    }

    /// Total bytes covered by buffer updates across all objects.
    #[must_use]
    pub fn get_bytes_written(&self) -> u64 {
        self.ops
            .values()
            .map(|op| op.buffer_updates.iter().map(|(_, len, _)| len).sum::<u64>())
            .sum()
    }

    /// Visit every recorded operation exactly once, in an order where each
    /// clone/rename target is visited before its source.
    ///
    /// The visitor receives the operation mutably and may move field
    /// contents out; ownership of the batch contents passes to the backend
    /// here. Relies on the clone/rename graph being acyclic (caller
    /// obligation) and on each operation having at most one source.
    pub fn safe_create_traverse(&mut self, mut visit: impl FnMut(&ObjectId, &mut ObjectOperation)) {
        // Reverse adjacency: source -> every object initialized from it.
        let mut dgraph: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::new();

        for (hoid, op) in &self.ops {
            if let Some(source) = op.source() {
                let targets = dgraph.entry(source.clone()).or_default();
                if targets.is_empty() && !self.ops.contains_key(source) {
                    // Sources absent from the op map still order their
                    // targets; seed them as roots exactly once.
                    stack.push_back(source.clone());
                }
                targets.push(hoid.clone());
            } else {
                stack.push_back(hoid.clone());
            }
        }

        // Post-order walk: an object with outstanding targets splices them
        // in front of itself and stays put; when it surfaces again its
        // adjacency entry is gone and it is emitted as a leaf. Nodes are
        // never reached twice because each has at most one source edge.
        let mut visited = 0_usize;
        while let Some(cur) = stack.front().cloned() {
            if let Some(targets) = dgraph.remove(&cur) {
                debug_assert!(!targets.is_empty());
                for target in targets.into_iter().rev() {
                    stack.push_front(target);
                }
            } else {
                stack.pop_front();
                if let Some(op) = self.ops.get_mut(&cur) {
                    visit(&cur, op);
                    visited += 1;
                }
            }
        }
        tracing::debug!(ops = visited, "safe-order traversal complete");
    }
}
