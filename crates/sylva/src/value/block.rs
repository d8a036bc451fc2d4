//! Lexical scope frames, heap-escape boxes, and packages.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::fault;
use crate::object::{ObjectInfo, RefValue};
use crate::path::{NameKind, ScopeNode, ValuePath};
use crate::store::Store;
use crate::types::{Name, Type};
use crate::value::{BlockRef, HeapRef, PackageRef, PointerValue, TypedValue, Value};

/// A lexical scope frame: one slot per declared name, a parent link
/// fixed at construction, and a dedicated slot for the blank identifier.
///
/// Parent links are construct-once so the chain stays acyclic; the only
/// later mutation is hydration of a placeholder parent, which is one-way.
#[derive(Debug)]
pub struct Block {
    /// Persistence metadata.
    pub info: ObjectInfo,
    /// The node this frame was instantiated from.
    pub source: Rc<ScopeNode>,
    values: Vec<TypedValue>,
    parent: Parent,
    blank: TypedValue,
}

/// A block's parent link.
#[derive(Debug)]
pub enum Parent {
    /// Root scope.
    None,
    /// Live parent frame.
    Block(BlockRef),
    /// Unloaded parent frame.
    Ref(RefValue),
}

impl Block {
    /// A frame for `source`, slots initialized undefined.
    pub fn new(source: Rc<ScopeNode>, parent: Option<BlockRef>) -> BlockRef {
        let values = vec![TypedValue::undefined(); source.num_names()];
        BlockRef::new(Self {
            info: ObjectInfo::default(),
            source,
            values,
            parent: match parent {
                Some(b) => Parent::Block(b),
                None => Parent::None,
            },
            blank: TypedValue::undefined(),
        })
    }

    /// A frame whose parent has not been loaded yet.
    pub fn with_parent_ref(source: Rc<ScopeNode>, parent: RefValue) -> BlockRef {
        let values = vec![TypedValue::undefined(); source.num_names()];
        BlockRef::new(Self {
            info: ObjectInfo::default(),
            source,
            values,
            parent: Parent::Ref(parent),
            blank: TypedValue::undefined(),
        })
    }

    /// The slot values in declaration order.
    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    /// Mutable slot values.
    pub fn values_mut(&mut self) -> &mut [TypedValue] {
        &mut self.values
    }

    /// The blank-identifier slot.
    pub fn blank(&self) -> &TypedValue {
        &self.blank
    }

    /// Mutable blank-identifier slot.
    pub fn blank_mut(&mut self) -> &mut TypedValue {
        &mut self.blank
    }

    /// The raw parent link.
    pub fn parent(&self) -> &Parent {
        &self.parent
    }

    /// Grow the slot array to `size` (switch clauses declare extra names
    /// after construction). Never shrinks.
    pub fn expand_to_size(&mut self, size: usize) {
        if size > self.values.len() {
            self.values.resize(size, TypedValue::undefined());
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        let same_parent = match (&self.parent, &other.parent) {
            (Parent::None, Parent::None) => true,
            (Parent::Block(a), Parent::Block(b)) => BlockRef::ptr_eq(a, b),
            (Parent::Ref(a), Parent::Ref(b)) => a.id == b.id,
            _ => false,
        };
        same_parent && self.values == other.values && self.blank == other.blank
    }
}

impl BlockRef {
    /// The parent frame, hydrating and memoizing a placeholder link.
    pub fn get_parent(&self, store: &dyn Store) -> Option<BlockRef> {
        let unresolved = match &self.borrow().parent {
            Parent::None => return None,
            Parent::Block(b) => return Some(b.clone()),
            Parent::Ref(r) => r.clone(),
        };
        let parent = match unresolved.resolve(store) {
            Value::Block(b) => b,
            other => fault!("block parent resolved to non-block {}", other),
        };
        self.borrow_mut().parent = Parent::Block(parent.clone());
        Some(parent)
    }

    fn at_depth(&self, store: &dyn Store, depth: u8) -> BlockRef {
        let mut b = self.clone();
        for _ in 1..depth.max(1) {
            b = match b.get_parent(store) {
                Some(p) => p,
                None => fault!("path depth walks past the root scope"),
            };
        }
        b
    }

    /// Pointer to the slot a block path addresses: the dedicated blank
    /// slot for a blank path, otherwise the indexed slot of the frame
    /// `depth - 1` parent hops up.
    pub fn get_pointer_to(&self, store: &dyn Store, path: &ValuePath) -> PointerValue {
        if path.is_blank() {
            return self.get_blank_ref();
        }
        let b = self.at_depth(store, path.depth);
        PointerValue::block_slot(b, path.index as usize)
    }

    /// Pointer to this frame's blank slot.
    pub fn get_blank_ref(&self) -> PointerValue {
        PointerValue::block_blank(self.clone())
    }

    /// First definition of a variable known to escape: overwrite the slot
    /// with a fresh single-slot heap box and return a pointer into the
    /// box. The promotion is one-way.
    pub fn get_pointer_to_heap_define(&self, store: &dyn Store, path: &ValuePath) -> PointerValue {
        let b = self.at_depth(store, path.depth);
        let hiv = HeapItemValue::new(TypedValue::undefined());
        b.borrow_mut().values[path.index as usize] =
            TypedValue::with_value(Type::HeapItem, Some(Value::HeapItem(hiv.clone())));
        PointerValue::heap_slot(hiv)
    }

    /// Access to a variable already promoted: the slot must hold a heap
    /// box, and the pointer lands in the box's single slot.
    pub fn get_pointer_to_heap_use(&self, store: &dyn Store, path: &ValuePath) -> PointerValue {
        let b = self.at_depth(store, path.depth);
        let slot = b.borrow().values[path.index as usize].clone();
        match slot.v {
            Some(Value::HeapItem(h)) => PointerValue::heap_slot(h),
            other => fault!(
                "heap use of {:?} but slot holds {:?} instead of a heap item",
                path.name,
                other
            ),
        }
    }

    /// Slot pointer for a definition site, routing through heap promotion
    /// when escape analysis marked the name.
    pub fn get_pointer_to_maybe_heap_define(
        &self,
        store: &dyn Store,
        path: &ValuePath,
        nk: NameKind,
    ) -> PointerValue {
        match nk {
            NameKind::HeapDefine => self.get_pointer_to_heap_define(store, path),
            _ => self.get_pointer_to(store, path),
        }
    }

    /// Slot pointer for a use site, routing through the heap box when the
    /// name was promoted.
    pub fn get_pointer_to_maybe_heap_use(
        &self,
        store: &dyn Store,
        path: &ValuePath,
        nk: NameKind,
    ) -> PointerValue {
        match nk {
            NameKind::HeapUse => self.get_pointer_to_heap_use(store, path),
            _ => self.get_pointer_to(store, path),
        }
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block(")?;
        for (i, (name, tv)) in self.source.names.iter().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", name, tv)?;
        }
        write!(f, ")")
    }
}

/// Single-slot box giving an escaped variable a stable heap identity.
#[derive(Debug, PartialEq)]
pub struct HeapItemValue {
    /// Persistence metadata.
    pub info: ObjectInfo,
    /// The boxed slot.
    pub value: TypedValue,
}

impl HeapItemValue {
    /// Box a value.
    pub fn new(value: TypedValue) -> HeapRef {
        HeapRef::new(Self {
            info: ObjectInfo::default(),
            value,
        })
    }
}

#[derive(Debug)]
enum LazyBlock {
    Live(BlockRef),
    Ref(RefValue),
}

impl LazyBlock {
    fn get(&self, store: &dyn Store) -> BlockRef {
        match self {
            LazyBlock::Live(b) => b.clone(),
            LazyBlock::Ref(r) => match r.resolve(store) {
                Value::Block(b) => b,
                other => fault!("package block resolved to non-block {}", other),
            },
        }
    }
}

/// A package: its top-level block, per-file blocks, and identity.
#[derive(Debug)]
pub struct PackageValue {
    /// Persistence metadata.
    pub info: ObjectInfo,
    /// Declared package name.
    pub pkg_name: Name,
    /// Import path.
    pub pkg_path: String,
    /// Whether the package lives at a realm path and persists state.
    pub realm: bool,
    block: LazyBlock,
    fblocks: IndexMap<Name, LazyBlock>,
}

impl PackageValue {
    /// A package wrapping its top-level block.
    pub fn new(pkg_name: impl Into<Name>, pkg_path: impl Into<String>, block: BlockRef) -> PackageRef {
        let pkg_path = pkg_path.into();
        PackageRef::new(Self {
            info: ObjectInfo::default(),
            pkg_name: pkg_name.into(),
            realm: is_realm_path(&pkg_path),
            pkg_path,
            block: LazyBlock::Live(block),
            fblocks: IndexMap::new(),
        })
    }

    /// A package whose top-level block has not been loaded yet.
    pub fn with_block_ref(
        pkg_name: impl Into<Name>,
        pkg_path: impl Into<String>,
        block: RefValue,
    ) -> PackageRef {
        let pkg_path = pkg_path.into();
        PackageRef::new(Self {
            info: ObjectInfo::default(),
            pkg_name: pkg_name.into(),
            realm: is_realm_path(&pkg_path),
            pkg_path,
            block: LazyBlock::Ref(block),
            fblocks: IndexMap::new(),
        })
    }
}

/// Whether a package path denotes a realm (stateful) package.
pub fn is_realm_path(pkg_path: &str) -> bool {
    pkg_path.starts_with("r/")
}

impl PartialEq for PackageValue {
    fn eq(&self, other: &Self) -> bool {
        self.pkg_path == other.pkg_path
    }
}

impl PackageRef {
    /// The package's top-level block, hydrating and memoizing a
    /// placeholder.
    pub fn get_block(&self, store: &dyn Store) -> BlockRef {
        let resolved = self.borrow().block.get(store);
        if matches!(self.borrow().block, LazyBlock::Ref(_)) {
            self.borrow_mut().block = LazyBlock::Live(resolved.clone());
        }
        resolved
    }

    /// Value of the package-level slot at `index`.
    pub fn get_value_at(&self, store: &dyn Store, index: usize) -> TypedValue {
        let block = self.get_block(store);
        let tv = block.borrow().values()[index].clone();
        tv
    }

    /// Register a file's block under its file name.
    pub fn add_file_block(&self, name: impl Into<Name>, block: BlockRef) {
        self.borrow_mut()
            .fblocks
            .insert(name.into(), LazyBlock::Live(block));
    }

    /// The block of one file, if registered.
    pub fn get_file_block(&self, store: &dyn Store, name: &str) -> Option<BlockRef> {
        let resolved = {
            let pv = self.borrow();
            pv.fblocks.get(name).map(|lb| lb.get(store))
        }?;
        self.borrow_mut()
            .fblocks
            .insert(name.to_string(), LazyBlock::Live(resolved.clone()));
        Some(resolved)
    }
}
