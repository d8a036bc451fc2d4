//! The closed set of runtime values.
//!
//! Every variant the evaluator can observe lives in [`Value`]; the set is
//! fixed by the language's runtime kinds and matched exhaustively
//! everywhere. Containers are shared behind single-threaded
//! [`Rc<RefCell>`] handles: one logical execution owns the object graph
//! at a time, so no synchronization exists at this layer.

mod array;
mod block;
mod fill;
mod func;
mod map;
mod mapkey;
mod pointer;
mod strukt;
mod typed;

pub use array::{ArrayRepr, ArrayValue, SliceBase, SliceValue};
pub use block::{is_realm_path, Block, HeapItemValue, PackageValue, Parent};
pub use fill::{deep_fill, fill_value};
pub use func::{BoundMethodValue, Closure, FuncValue};
pub use map::MapValue;
pub use mapkey::{compute_map_key, MapKey};
pub use pointer::{PointerTarget, PointerValue, INDEX_BLANK, INDEX_MAP};
pub use strukt::StructValue;
pub use typed::TypedValue;

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use num_bigint::BigInt;
use rust_decimal::Decimal;

use crate::object::{ObjectId, RefValue};
use crate::store::Store;
use crate::types::Type;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident => $inner:ty) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Rc<RefCell<$inner>>);

        impl $name {
            /// Wrap a value in a fresh shared handle.
            pub fn new(inner: $inner) -> Self {
                Self(Rc::new(RefCell::new(inner)))
            }

            /// Immutable access to the shared value.
            pub fn borrow(&self) -> Ref<'_, $inner> {
                self.0.borrow()
            }

            /// Mutable access to the shared value.
            pub fn borrow_mut(&self) -> RefMut<'_, $inner> {
                self.0.borrow_mut()
            }

            /// Whether two handles name the same shared value.
            pub fn ptr_eq(a: &Self, b: &Self) -> bool {
                Rc::ptr_eq(&a.0, &b.0)
            }

            /// Stable in-memory address, used for identity-keyed encodings.
            pub fn addr(&self) -> usize {
                Rc::as_ptr(&self.0) as usize
            }
        }

        // Structural equality; identity comparisons go through `ptr_eq`.
        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Self::ptr_eq(self, other) || *self.borrow() == *other.borrow()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.0.try_borrow() {
                    Ok(inner) => inner.fmt(f),
                    Err(_) => write!(f, "<in use>"),
                }
            }
        }
    };
}

handle! {
    /// Shared handle to an [`ArrayValue`].
    ArrayRef => ArrayValue
}
handle! {
    /// Shared handle to a [`SliceValue`]. The cell is mutated only to
    /// memoize base hydration; slice geometry is fixed at construction.
    SliceRef => SliceValue
}
handle! {
    /// Shared handle to a [`StructValue`].
    StructRef => StructValue
}
handle! {
    /// Shared handle to a [`MapValue`].
    MapRef => MapValue
}
handle! {
    /// Shared handle to a [`Block`].
    BlockRef => Block
}
handle! {
    /// Shared handle to a [`HeapItemValue`].
    HeapRef => HeapItemValue
}
handle! {
    /// Shared handle to a [`PackageValue`].
    PackageRef => PackageValue
}
handle! {
    /// Shared handle to a free-floating [`TypedValue`] slot.
    SlotRef => TypedValue
}

/// A runtime value payload. Closed set; every match over this type is
/// exhaustive by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Immutable string contents. Strings are byte strings; slicing and
    /// indexing operate on bytes, so the contents need not be valid UTF-8.
    Str(Rc<[u8]>),
    /// Arbitrary-precision integer (untyped integer constants).
    BigInt(Rc<BigInt>),
    /// Arbitrary-precision decimal (untyped decimal constants).
    BigDec(Decimal),
    /// One packed byte inside a data-backed array.
    DataByte(DataByteValue),
    /// Fixed-length array.
    Array(ArrayRef),
    /// View into an array.
    Slice(SliceRef),
    /// Struct with ordered fields.
    Struct(StructRef),
    /// Addressable handle into a container slot.
    Pointer(PointerValue),
    /// Function.
    Func(Rc<FuncValue>),
    /// Method with its receiver captured.
    BoundMethod(Rc<BoundMethodValue>),
    /// Ordered map.
    Map(MapRef),
    /// A type used as a value.
    Type(Type),
    /// Package.
    Package(PackageRef),
    /// Lexical scope frame.
    Block(BlockRef),
    /// Unloaded persisted object; replaced in place on first access.
    Ref(RefValue),
    /// Heap box created by escape promotion.
    HeapItem(HeapRef),
}

/// Alias for one byte of a data-backed array, read and written in place.
#[derive(Debug, Clone)]
pub struct DataByteValue {
    /// The data-backed array holding the byte.
    pub base: ArrayRef,
    /// Absolute index of the byte within the array's buffer.
    pub index: usize,
    /// Declared element type (kind `Uint8`, possibly a declared type).
    pub elem: Type,
}

impl DataByteValue {
    /// Read the aliased byte.
    pub fn get(&self) -> u8 {
        self.base.borrow().byte_at(self.index)
    }

    /// Overwrite the aliased byte.
    pub fn set(&self, b: u8) {
        self.base.borrow_mut().set_byte_at(self.index, b);
    }
}

impl PartialEq for DataByteValue {
    fn eq(&self, other: &Self) -> bool {
        ArrayRef::ptr_eq(&self.base, &other.base) && self.index == other.index
    }
}

impl Value {
    /// Store identity of this value, when it is a container that has one.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Array(a) => a.borrow().info.id,
            Value::Struct(s) => s.borrow().info.id,
            Value::Map(m) => m.borrow().info.id,
            Value::Block(b) => b.borrow().info.id,
            Value::HeapItem(h) => h.borrow().info.id,
            Value::Package(p) => p.borrow().info.id,
            Value::Ref(r) => Some(r.id),
            _ => None,
        }
    }

    /// Whether two values are the same object (handle identity).
    pub fn same_object(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Array(x), Value::Array(y)) => ArrayRef::ptr_eq(x, y),
            (Value::Struct(x), Value::Struct(y)) => StructRef::ptr_eq(x, y),
            (Value::Map(x), Value::Map(y)) => MapRef::ptr_eq(x, y),
            (Value::Block(x), Value::Block(y)) => BlockRef::ptr_eq(x, y),
            (Value::HeapItem(x), Value::HeapItem(y)) => HeapRef::ptr_eq(x, y),
            (Value::Package(x), Value::Package(y)) => PackageRef::ptr_eq(x, y),
            (Value::BoundMethod(x), Value::BoundMethod(y)) => Rc::ptr_eq(x, y),
            (Value::Ref(x), Value::Ref(y)) => x.id == y.id,
            _ => false,
        }
    }

    /// The first object (container trackable by the store) reachable from
    /// this value: containers yield themselves, views yield their backing
    /// container, pointers yield their owner, placeholders resolve first.
    pub fn first_object(&self, store: &dyn Store) -> Option<Value> {
        match self {
            Value::Array(_)
            | Value::Struct(_)
            | Value::Map(_)
            | Value::Block(_)
            | Value::HeapItem(_)
            | Value::Package(_)
            | Value::BoundMethod(_) => Some(self.clone()),
            Value::Slice(s) => s.borrow().base(store).map(Value::Array),
            Value::Pointer(p) => p.owner(store),
            Value::Ref(r) => r.resolve(store).first_object(store),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
            Value::BigInt(n) => write!(f, "{}", n),
            Value::BigDec(d) => write!(f, "{}", d),
            Value::DataByte(db) => write!(f, "{}", db.get()),
            Value::Array(a) => write!(f, "{}", a.borrow()),
            Value::Slice(s) => write!(f, "{}", s.borrow()),
            Value::Struct(s) => write!(f, "{}", s.borrow()),
            Value::Pointer(p) => write!(f, "&<{}>", p.index()),
            Value::Func(fv) => write!(f, "{}", fv),
            Value::BoundMethod(bm) => write!(f, "{}", bm),
            Value::Map(m) => write!(f, "{}", m.borrow()),
            Value::Type(t) => write!(f, "{}", t),
            Value::Package(p) => write!(f, "package({})", p.borrow().pkg_path),
            Value::Block(b) => write!(f, "{}", b.borrow()),
            Value::Ref(r) => write!(f, "ref({})", r.id),
            Value::HeapItem(h) => write!(f, "heapitem({})", h.borrow().value),
        }
    }
}
