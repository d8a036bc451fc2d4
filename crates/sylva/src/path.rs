//! Lexical addressing paths.
//!
//! The external preprocessor resolves every name to a [`ValuePath`]: how
//! many parent scopes to walk, which slot to land on, and what kind of
//! selection is being performed (plain slot, implicit dereference, method
//! binding, interface dispatch). This layer only executes paths; it never
//! computes them.

use std::rc::Rc;

use crate::types::Name;

/// Name of the blank identifier, whose writes land in a block's shared
/// blank slot.
pub const BLANK_NAME: &str = "_";

/// The kind of selection a path performs once the target value is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Slot in a block (or in a package's block), reached by walking
    /// `depth - 1` parent links.
    Block,
    /// Struct field by index.
    Field,
    /// Field of a struct reached through a pointer, where the *address of
    /// the field pointer itself* is wanted (embedded pointer promotion).
    SubrefField,
    /// Struct field requiring an implicit pointer dereference first.
    DerefField,
    /// Method with a value receiver; binding copies the receiver.
    ValMethod,
    /// Method with a pointer receiver; binding retains the pointer and
    /// supports a nil receiver.
    PtrMethod,
    /// Value-receiver method reached through a pointer.
    DerefValMethod,
    /// Pointer-receiver method reached through a pointer.
    DerefPtrMethod,
    /// Interface method dispatch; walks the embedding chain.
    Interface,
    /// Interface method dispatch through a pointer.
    DerefInterface,
}

/// A resolved lexical path: selection kind, scope depth, slot index, and
/// the source name (kept for diagnostics and interface dispatch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePath {
    /// What kind of selection to perform.
    pub kind: PathKind,
    /// Parent links to walk for block paths (1 targets the current block).
    pub depth: u8,
    /// Slot or field index within the target container.
    pub index: u16,
    /// The selected name.
    pub name: Name,
}

impl ValuePath {
    /// Path into a block slot.
    pub fn block(depth: u8, index: u16, name: impl Into<Name>) -> Self {
        Self {
            kind: PathKind::Block,
            depth,
            index,
            name: name.into(),
        }
    }

    /// Path selecting a struct field.
    pub fn field(index: u16, name: impl Into<Name>) -> Self {
        Self {
            kind: PathKind::Field,
            depth: 0,
            index,
            name: name.into(),
        }
    }

    /// Path selecting a method or interface member by name.
    pub fn method(kind: PathKind, index: u16, name: impl Into<Name>) -> Self {
        Self {
            kind,
            depth: 0,
            index,
            name: name.into(),
        }
    }

    /// The reserved path of the blank identifier.
    pub fn blank() -> Self {
        Self::block(0, 0, BLANK_NAME)
    }

    /// Whether this path addresses a block's blank slot.
    pub fn is_blank(&self) -> bool {
        self.kind == PathKind::Block && self.name == BLANK_NAME
    }
}

/// How a name expression accesses its block slot.
///
/// Heap residency is decided by external escape analysis; this layer only
/// executes the access mode it is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// Plain read or write of the slot.
    Normal,
    /// First definition of the slot.
    Define,
    /// First definition of a variable known to escape; promotes the slot
    /// to a heap box.
    HeapDefine,
    /// Access to a variable already promoted to a heap box.
    HeapUse,
}

/// Location of a lexical node, the store's lookup key for scope sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeLocation {
    /// Package the node was declared in.
    pub pkg_path: String,
    /// File within the package.
    pub file: String,
    /// Line and column of the node.
    pub span: (u32, u32),
}

impl NodeLocation {
    /// Location within a package file.
    pub fn new(pkg_path: impl Into<String>, file: impl Into<String>, span: (u32, u32)) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            file: file.into(),
            span,
        }
    }
}

/// The slice of lexical structure this layer needs from a scope-owning
/// node: its location and the names it declares, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeNode {
    /// Where the node lives.
    pub location: NodeLocation,
    /// Declared names, in slot order.
    pub names: Vec<Name>,
}

impl ScopeNode {
    /// A scope node declaring the given names.
    pub fn new(location: NodeLocation, names: Vec<Name>) -> Rc<Self> {
        Rc::new(Self { location, names })
    }

    /// Number of addressable slots a block for this node needs.
    pub fn num_names(&self) -> usize {
        self.names.len()
    }
}
