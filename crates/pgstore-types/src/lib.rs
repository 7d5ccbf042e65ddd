//! Shared domain types for the pgstore data plane.
//!
//! Everything here is plain metadata: ordered object identities, snapshot
//! ids, allocation hints, and the opaque object-context handle the backend
//! threads through a transaction. None of these types perform I/O.

use std::fmt;
use std::sync::Arc;

/// A point-in-time version identifier attached to an object.
///
/// `SnapId::HEAD` denotes the live (unsnapshotted) object and sorts after
/// every real snapshot id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct SnapId(u64);

impl SnapId {
    /// The live object (no snapshot).
    pub const HEAD: Self = Self(u64::MAX);

    /// Create a snapshot id from a raw u64.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this id denotes the live object.
    #[inline]
    #[must_use]
    pub const fn is_head(self) -> bool {
        self.0 == u64::MAX
    }
}

impl fmt::Display for SnapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_head() {
            f.write_str("head")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identity of a single object version within a placement group.
///
/// Object ids are totally ordered (lexicographic over pool, namespace,
/// name, snap) so they can key ordered maps directly. Temp objects live in
/// a negated pool: they are scratch identities that a transaction may later
/// rename onto a durable (non-temp) id.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ObjectId {
    /// Pool the object lives in; negative pools hold temp objects.
    pub pool: i64,
    /// Namespace within the pool (empty for the default namespace).
    pub namespace: String,
    /// Object name.
    pub name: String,
    /// Object version; `SnapId::HEAD` for the live object.
    pub snap: SnapId,
}

impl ObjectId {
    /// Create a head object id in the default namespace.
    #[must_use]
    pub fn new(pool: i64, name: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: String::new(),
            name: name.into(),
            snap: SnapId::HEAD,
        }
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the snapshot id.
    #[must_use]
    pub fn with_snap(mut self, snap: SnapId) -> Self {
        self.snap = snap;
        self
    }

    /// Whether this id names a temp object (legal rename source).
    #[inline]
    #[must_use]
    pub const fn is_temp(&self) -> bool {
        self.pool < 0
    }

    /// The temp counterpart of this id, in the negated pool.
    ///
    /// Maps pool `p >= 0` to `-p - 1`, so pool 0 has a distinct temp pool.
    /// Calling this on an id that is already temp is a programming error.
    #[must_use]
    pub fn to_temp(&self) -> Self {
        assert!(
            !self.is_temp(),
            "ObjectId::to_temp: {self} is already a temp object"
        );
        Self {
            pool: -self.pool - 1,
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            snap: self.snap,
        }
    }

    /// The pool this id maps back to when promoted out of temp space.
    #[inline]
    #[must_use]
    pub const fn base_pool(&self) -> i64 {
        if self.pool < 0 { -self.pool - 1 } else { self.pool }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}:{}@{}", self.pool, self.name, self.snap)
        } else {
            write!(f, "{}:{}/{}@{}", self.pool, self.namespace, self.name, self.snap)
        }
    }
}

impl std::error::Error for ObjectId {}

/// Allocation hint forwarded to the backend for a single object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct AllocHint {
    /// Expected final object size in bytes.
    pub expected_object_size: u64,
    /// Expected size of individual writes in bytes.
    pub expected_write_size: u64,
    /// Backend-defined hint flags.
    pub flags: u32,
}

/// Kind of a single omap edit; the payload bytes stay opaque to the core.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum OmapUpdateKind {
    /// Insert (or overwrite) the encoded keys.
    Insert,
    /// Remove the encoded keys.
    Remove,
}

/// Opaque object-context handle supplied by the layer above.
///
/// The transaction stores these in a side table keyed by the id embedded in
/// the context and never looks past `object_id`. Lifetime is managed by the
/// caller through the `Arc`.
pub trait ObjectContext: Send + Sync {
    /// The id of the object this context describes.
    fn object_id(&self) -> &ObjectId;
}

/// Shared handle to an [`ObjectContext`].
pub type ObcRef = Arc<dyn ObjectContext>;
