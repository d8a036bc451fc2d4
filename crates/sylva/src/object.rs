//! Object identity and persistence metadata.
//!
//! Containers that the external store can persist (arrays, structs, maps,
//! blocks, heap items, packages) carry an [`ObjectInfo`]. An unloaded
//! persisted object is represented by a [`RefValue`] placeholder until the
//! first access hydrates it in place.

use crate::store::Store;
use crate::value::Value;

/// Identity of a persisted object within the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "oid:{}", self.0)
    }
}

/// Content hash of a persisted value, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueHash(pub [u8; 20]);

/// Persistence metadata attached to container values.
///
/// `id` is `None` for values that have never been persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectInfo {
    /// Store identity, if assigned.
    pub id: Option<ObjectId>,
    /// Content hash as of the last persist, if any.
    pub hash: Option<ValueHash>,
}

impl ObjectInfo {
    /// Metadata for a value already known to the store.
    pub fn with_id(id: ObjectId) -> Self {
        Self {
            id: Some(id),
            hash: None,
        }
    }
}

/// Placeholder for a persisted object that has not been loaded yet.
///
/// A `RefValue` stands in a slot until first access, at which point the
/// resolved object overwrites it in place; it is never re-resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RefValue {
    /// Identity of the referenced object.
    pub id: ObjectId,
    /// Whether the object escaped its original owner.
    pub escaped: bool,
    /// Package path, when the reference denotes a package rather than an
    /// ordinary object. Empty otherwise.
    pub pkg_path: String,
    /// Content hash recorded when the reference was written out.
    pub hash: Option<ValueHash>,
}

impl RefValue {
    /// A reference to an ordinary persisted object.
    pub fn object(id: ObjectId) -> Self {
        Self {
            id,
            escaped: false,
            pkg_path: String::new(),
            hash: None,
        }
    }

    /// A reference to a persisted package.
    pub fn package(id: ObjectId, pkg_path: impl Into<String>) -> Self {
        Self {
            id,
            escaped: false,
            pkg_path: pkg_path.into(),
            hash: None,
        }
    }

    /// Load the referenced value from the store.
    ///
    /// Missing objects mean the store handed out a dangling identity,
    /// which is a fatal state.
    pub fn resolve(&self, store: &dyn Store) -> Value {
        if self.pkg_path.is_empty() {
            match store.object(self.id) {
                Some(v) => v,
                None => crate::error::fault!("dangling object reference {}", self.id),
            }
        } else {
            match store.package(&self.pkg_path, false) {
                Some(pv) => Value::Package(pv),
                None => crate::error::fault!("missing package {:?}", self.pkg_path),
            }
        }
    }
}
