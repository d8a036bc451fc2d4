//! # Sylva
//!
//! Runtime value representation and addressing layer for a tree-walking
//! virtual machine: a statically-typed, embeddable, smart-contract
//! oriented language runtime.
//!
//! This crate is the substrate the evaluator and the persistence layer
//! are built on. It provides:
//!
//! - **TypedValue**: the universal value slot (type tag, polymorphic
//!   payload, inline scalar buffer).
//! - **Value variants**: a closed polymorphic set covering strings,
//!   arbitrary-precision numerics, arrays, slices, structs, a
//!   deterministic insertion-ordered map, functions and bound methods,
//!   packages, scope blocks, pointers, heap boxes, and unresolved
//!   placeholders.
//! - **PointerValue**: a uniform addressable handle into any container,
//!   through which all reads and writes funnel.
//! - **Blocks & heap escape**: lexical scope chains with one-way
//!   promotion of captured variables to stable heap boxes.
//! - **Lazy hydration**: placeholder references promoted to live objects
//!   on first access, memoized in place, so persisted object graphs page
//!   in incrementally.
//!
//! Parsing, type-checking, evaluation, and the persistent store itself
//! are external collaborators behind the [`store::Store`],
//! [`store::Realm`], and [`path::ValuePath`] seams. Execution is
//! single-threaded per logical transaction; the object graph is shared
//! with `Rc`/`RefCell` and never locked.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod object;
pub mod path;
pub mod store;
pub mod types;
pub mod value;

// Re-export main types
pub use error::{Exception, Result};
pub use object::{ObjectId, ObjectInfo, RefValue, ValueHash};
pub use path::{NameKind, NodeLocation, PathKind, ScopeNode, ValuePath, BLANK_NAME};
pub use store::{MemStore, NullStore, Realm, RefUpdate, Store};
pub use types::{
    convert_untyped, default_type_of, default_typed_value, default_value,
    find_embedded_field_type, ArrayType, DeclaredType, FieldType, FuncType, InterfaceType, Kind,
    MapType, Name, PointerType, PrimitiveType, SliceType, StructType, Type, TypeId,
};
pub use value::{
    compute_map_key, deep_fill, fill_value, is_realm_path, ArrayRef, ArrayRepr, ArrayValue, Block, BlockRef,
    BoundMethodValue, Closure, DataByteValue, FuncValue, HeapItemValue, HeapRef, MapKey, MapRef,
    MapValue, PackageRef, PackageValue, Parent, PointerTarget, PointerValue, SliceBase, SliceRef,
    SliceValue, SlotRef, StructRef, StructValue, TypedValue, Value, INDEX_BLANK, INDEX_MAP,
};

/// Sylva version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
