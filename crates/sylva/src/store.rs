//! Store and realm seams.
//!
//! The value layer never owns persistence. It reads through [`Store`] to
//! hydrate [`crate::object::RefValue`] placeholders and unresolved types,
//! and reports ownership-affecting writes to a [`Realm`] as explicit
//! [`RefUpdate`] deltas. Both traits are implemented by the embedding
//! runtime; [`MemStore`] is the in-memory implementation used by tests and
//! ephemeral execution.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::object::ObjectId;
use crate::path::{NodeLocation, ScopeNode};
use crate::types::{Type, TypeId};
use crate::value::{PackageRef, Value};

/// Read access to persisted objects, types, packages, and scope sources.
pub trait Store {
    /// The persisted object for an identity, if the store knows it.
    fn object(&self, id: ObjectId) -> Option<Value>;

    /// The type a [`Type::Ref`] identity resolves to.
    fn typ(&self, id: &TypeId) -> Option<Type>;

    /// A package by path. `load` requests materialization of packages the
    /// store knows about but has not instantiated.
    fn package(&self, pkg_path: &str, load: bool) -> Option<PackageRef>;

    /// The scope-owning node at a location.
    fn node(&self, loc: &NodeLocation) -> Option<Rc<ScopeNode>>;
}

/// An ownership delta produced by a pointer write.
///
/// `owner` is the container whose slot changed; `old` and `new` are the
/// first reachable container objects behind the slot before and after the
/// write, when they differ. The realm uses these to maintain reference
/// counts and ownership roots.
#[derive(Debug, Clone)]
pub struct RefUpdate {
    /// The container whose slot was written.
    pub owner: Value,
    /// First object previously reachable through the slot.
    pub old: Option<Value>,
    /// First object now reachable through the slot.
    pub new: Option<Value>,
}

/// Ownership bookkeeping hook.
pub trait Realm {
    /// Observe one slot write's ownership delta.
    fn did_update(&self, update: RefUpdate);
}

/// In-memory store.
///
/// Entries are registered by the embedder; insertion order is preserved so
/// repeated runs observe identical iteration.
#[derive(Default)]
pub struct MemStore {
    objects: RefCell<IndexMap<ObjectId, Value>>,
    types: RefCell<IndexMap<TypeId, Type>>,
    packages: RefCell<IndexMap<String, PackageRef>>,
    nodes: RefCell<IndexMap<NodeLocation, Rc<ScopeNode>>>,
}

impl MemStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object under an identity.
    pub fn set_object(&self, id: ObjectId, value: Value) {
        self.objects.borrow_mut().insert(id, value);
    }

    /// Register a resolvable type.
    pub fn set_type(&self, t: &Type) {
        self.types.borrow_mut().insert(t.id(), t.clone());
    }

    /// Register a package under its path.
    pub fn set_package(&self, pkg_path: impl Into<String>, pkg: PackageRef) {
        self.packages.borrow_mut().insert(pkg_path.into(), pkg);
    }

    /// Register a scope-owning node.
    pub fn set_node(&self, node: Rc<ScopeNode>) {
        self.nodes
            .borrow_mut()
            .insert(node.location.clone(), node);
    }
}

impl Store for MemStore {
    fn object(&self, id: ObjectId) -> Option<Value> {
        self.objects.borrow().get(&id).cloned()
    }

    fn typ(&self, id: &TypeId) -> Option<Type> {
        self.types.borrow().get(id).cloned()
    }

    fn package(&self, pkg_path: &str, _load: bool) -> Option<PackageRef> {
        self.packages.borrow().get(pkg_path).cloned()
    }

    fn node(&self, loc: &NodeLocation) -> Option<Rc<ScopeNode>> {
        self.nodes.borrow().get(loc).cloned()
    }
}

/// A store that knows nothing. Suitable for execution over fully
/// materialized values, where hydration can never be reached.
pub struct NullStore;

impl Store for NullStore {
    fn object(&self, _id: ObjectId) -> Option<Value> {
        None
    }

    fn typ(&self, _id: &TypeId) -> Option<Type> {
        None
    }

    fn package(&self, _pkg_path: &str, _load: bool) -> Option<PackageRef> {
        None
    }

    fn node(&self, _loc: &NodeLocation) -> Option<Rc<ScopeNode>> {
        None
    }
}
