//! Public API facade for the pgstore data plane.
//!
//! Re-exports the transaction surface a backend consumes: build a
//! [`PgTransaction`] keyed by [`ObjectId`], then drain it with
//! [`PgTransaction::safe_create_traverse`], which visits every operation
//! once with clone/rename targets ahead of their sources.

pub use pgstore_error::{PgError, Result};
pub use pgstore_interval::{BytesSplit, IntervalKey, IntervalMap, Split};
pub use pgstore_txn::{
    omap, validate, BufferUpdate, BufferUpdateSplit, Init, ObjectOperation, PgTransaction,
};
pub use pgstore_types::{AllocHint, ObcRef, ObjectContext, ObjectId, OmapUpdateKind, SnapId};
