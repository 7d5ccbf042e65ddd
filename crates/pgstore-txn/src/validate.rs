//! Debug-mode transaction validation.
//!
//! The mutation API asserts everything it can check locally. Two caller
//! obligations are only visible across the whole batch and are deliberately
//! not checked on the hot path: the clone/rename source graph must be
//! acyclic, and a clone-range source must not be modified by the same
//! transaction. [`validate`] checks both (plus that no rename source was
//! touched again after its rename), so test harnesses and debug builds can
//! reject a malformed batch before handing it to a backend.

use std::collections::BTreeSet;

use pgstore_error::{PgError, Result};
use pgstore_types::ObjectId;

use crate::op::{BufferUpdate, ObjectOperation};
use crate::transaction::PgTransaction;

/// Check the whole-batch caller obligations of `txn`.
///
/// Returns the first violation found. A transaction that passes is safe to
/// hand to [`PgTransaction::safe_create_traverse`].
pub fn validate(txn: &PgTransaction) -> Result<()> {
    check_acyclic(txn)?;
    for (hoid, op) in txn.ops() {
        check_clone_range_sources(txn, hoid, op)?;
        check_rename_source_retired(txn, hoid, op)?;
    }
    Ok(())
}

/// Walk every source chain. Each operation has at most one source, so a
/// chain either terminates, reaches an already-cleared object, or loops.
fn check_acyclic(txn: &PgTransaction) -> Result<()> {
    let mut cleared: BTreeSet<&ObjectId> = BTreeSet::new();
    for (start, _) in txn.ops() {
        let mut path: Vec<&ObjectId> = Vec::new();
        let mut cur = start;
        loop {
            if cleared.contains(cur) {
                break;
            }
            if path.contains(&cur) {
                return Err(PgError::CloneCycle {
                    object: cur.clone(),
                });
            }
            path.push(cur);
            match txn.op(cur).and_then(ObjectOperation::source) {
                Some(next) => cur = next,
                None => break,
            }
        }
        cleared.extend(path);
    }
    Ok(())
}

fn check_clone_range_sources(
    txn: &PgTransaction,
    hoid: &ObjectId,
    op: &ObjectOperation,
) -> Result<()> {
    for (_, _, update) in &op.buffer_updates {
        if let BufferUpdate::CloneRange { from, .. } = update {
            let modified = txn
                .op(from)
                .is_some_and(|src| *src != ObjectOperation::default());
            if modified {
                return Err(PgError::CloneRangeSourceModified {
                    source: from.clone(),
                    target: hoid.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_rename_source_retired(
    txn: &PgTransaction,
    hoid: &ObjectId,
    op: &ObjectOperation,
) -> Result<()> {
    if let crate::op::Init::Rename { source } = &op.init {
        if txn.op(source).is_some() {
            return Err(PgError::RenameSourceRevived {
                source: source.clone(),
                target: hoid.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn head(name: &str) -> ObjectId {
        ObjectId::new(1, name)
    }

    #[test]
    fn empty_transaction_is_valid() {
        assert_eq!(validate(&PgTransaction::new()), Ok(()));
    }

    #[test]
    fn straight_clone_chain_is_valid() {
        let mut txn = PgTransaction::new();
        let (a, b, c) = (head("a"), head("b"), head("c"));
        txn.clone_object(&b, &a);
        txn.clone_object(&c, &b);
        txn.create(&a);
        assert_eq!(validate(&txn), Ok(()));
    }

    #[test]
    fn clone_cycle_is_rejected() {
        let mut txn = PgTransaction::new();
        let (a, b) = (head("a"), head("b"));
        // Legal at mutation time: neither clone sees the other's init.
        txn.clone_object(&a, &b);
        txn.clone_object(&b, &a);

        let err = validate(&txn).expect_err("cycle must be rejected");
        assert!(matches!(err, PgError::CloneCycle { .. }));
    }

    #[test]
    fn self_clone_is_rejected() {
        let mut txn = PgTransaction::new();
        let a = head("a");
        txn.clone_object(&a, &a);

        let err = validate(&txn).expect_err("self-cycle must be rejected");
        assert_eq!(err, PgError::CloneCycle { object: a });
    }

    #[test]
    fn clone_range_from_untouched_source_is_valid() {
        let mut txn = PgTransaction::new();
        let (donor, target) = (head("donor"), head("target"));
        txn.create(&target);
        txn.clone_range(&donor, &target, 0, 16, 0);
        assert_eq!(validate(&txn), Ok(()));
    }

    #[test]
    fn clone_range_from_modified_source_is_rejected() {
        let mut txn = PgTransaction::new();
        let (donor, target) = (head("donor"), head("target"));
        txn.write(&donor, 0, Bytes::from_static(b"zz"), 0);
        txn.clone_range(&donor, &target, 0, 16, 0);

        let err = validate(&txn).expect_err("modified source must be rejected");
        assert_eq!(
            err,
            PgError::CloneRangeSourceModified {
                source: donor,
                target,
            }
        );
    }

    #[test]
    fn clone_range_from_nop_source_is_valid() {
        let mut txn = PgTransaction::new();
        let (donor, target) = (head("donor"), head("target"));
        txn.nop(&donor);
        txn.clone_range(&donor, &target, 0, 16, 0);
        assert_eq!(validate(&txn), Ok(()));
    }

    #[test]
    fn revived_rename_source_is_rejected() {
        let mut txn = PgTransaction::new();
        let target = head("dst");
        let temp = head("dst").to_temp();
        txn.write(&temp, 0, Bytes::from_static(b"abcd"), 0);
        txn.rename(&target, &temp);
        // Touching the temp id again recreates an entry at the source key.
        txn.write(&temp, 0, Bytes::from_static(b"oops"), 0);

        let err = validate(&txn).expect_err("revived source must be rejected");
        assert_eq!(
            err,
            PgError::RenameSourceRevived {
                source: temp,
                target,
            }
        );
    }

    #[test]
    fn clean_rename_is_valid() {
        let mut txn = PgTransaction::new();
        let target = head("dst");
        let temp = head("dst").to_temp();
        txn.write(&temp, 0, Bytes::from_static(b"abcd"), 0);
        txn.rename(&target, &temp);
        assert_eq!(validate(&txn), Ok(()));
    }
}
