//! Placement-group transactions.
//!
//! A [`PgTransaction`] batches the per-object mutations destined for the
//! backend responsible for one placement group: object creation, cloning,
//! rename from a temp object, removal, attribute and omap edits, truncate,
//! allocation hints, and overlapping buffer writes. Overlap between buffer
//! writes on one object is resolved at insertion time through an interval
//! map, so the batch at rest is order-independent within an object.
//!
//! Across objects, clone and rename introduce source/target dependencies;
//! [`PgTransaction::safe_create_traverse`] hands operations to the backend
//! in an order where every clone/rename target is visited before its
//! source, so a backend may apply them in sequence without destroying a
//! source it still needs.
//!
//! A transaction is built by a single logical owner and handed off whole;
//! it performs no I/O and is not thread-safe.

pub mod omap;
pub mod op;
pub mod transaction;
pub mod validate;

pub use op::{BufferUpdate, BufferUpdateSplit, Init, ObjectOperation};
pub use transaction::PgTransaction;
pub use validate::validate;
