//! Arrays and slice views.

use crate::error::{fault, Exception, Result};
use crate::object::{ObjectInfo, RefValue};
use crate::store::Store;
use crate::types::Type;
use crate::value::{ArrayRef, PointerValue, SliceRef, TypedValue, Value};

/// Fixed-length sequence. Exactly one representation is active, chosen at
/// construction and immutable thereafter: a typed element list, or a raw
/// byte buffer when the element kind is a single-byte scalar.
#[derive(Debug, PartialEq)]
pub struct ArrayValue {
    /// Persistence metadata.
    pub info: ObjectInfo,
    repr: ArrayRepr,
}

/// The two array representations.
#[derive(Debug, PartialEq)]
pub enum ArrayRepr {
    /// Typed element slots.
    List(Vec<TypedValue>),
    /// Packed bytes.
    Data(Vec<u8>),
}

impl ArrayValue {
    /// A list-represented array.
    pub fn new_list(list: Vec<TypedValue>) -> ArrayRef {
        ArrayRef::new(Self {
            info: ObjectInfo::default(),
            repr: ArrayRepr::List(list),
        })
    }

    /// A data-represented (packed byte) array.
    pub fn new_data(data: Vec<u8>) -> ArrayRef {
        ArrayRef::new(Self {
            info: ObjectInfo::default(),
            repr: ArrayRepr::Data(data),
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match &self.repr {
            ArrayRepr::List(l) => l.len(),
            ArrayRepr::Data(d) => d.len(),
        }
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the packed-byte representation is active.
    pub fn is_data(&self) -> bool {
        matches!(self.repr, ArrayRepr::Data(_))
    }

    /// The active representation.
    pub fn repr(&self) -> &ArrayRepr {
        &self.repr
    }

    /// Element slots of a list array.
    pub fn list(&self) -> &[TypedValue] {
        match &self.repr {
            ArrayRepr::List(l) => l,
            ArrayRepr::Data(_) => fault!("list access on data-backed array"),
        }
    }

    /// Mutable element slots of a list array.
    pub fn list_mut(&mut self) -> &mut [TypedValue] {
        match &mut self.repr {
            ArrayRepr::List(l) => l,
            ArrayRepr::Data(_) => fault!("list access on data-backed array"),
        }
    }

    /// The raw bytes of a data array.
    pub fn readonly_bytes(&self) -> &[u8] {
        match &self.repr {
            ArrayRepr::Data(d) => d,
            ArrayRepr::List(_) => fault!("byte access on list-backed array"),
        }
    }

    /// One byte of a data array.
    pub fn byte_at(&self, index: usize) -> u8 {
        self.readonly_bytes()[index]
    }

    /// Overwrite one byte of a data array.
    pub fn set_byte_at(&mut self, index: usize, b: u8) {
        match &mut self.repr {
            ArrayRepr::Data(d) => d[index] = b,
            ArrayRepr::List(_) => fault!("byte access on list-backed array"),
        }
    }

    /// Deep copy preserving the representation. The copy is a fresh
    /// object with no persistence identity.
    pub fn copy(&self) -> ArrayRef {
        match &self.repr {
            ArrayRepr::List(l) => ArrayValue::new_list(l.iter().map(TypedValue::copy).collect()),
            ArrayRepr::Data(d) => ArrayValue::new_data(d.clone()),
        }
    }
}

impl ArrayRef {
    /// Pointer into element `index`. Bounds are the caller's concern.
    pub fn element_pointer(&self, index: usize, elem: &Type) -> PointerValue {
        if self.borrow().is_data() {
            PointerValue::array_byte(self.clone(), index, elem.clone())
        } else {
            PointerValue::array_elem(self.clone(), index)
        }
    }
}

impl std::fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.repr {
            ArrayRepr::List(l) => {
                write!(f, "array[")?;
                for (i, tv) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", tv)?;
                }
                write!(f, "]")
            }
            ArrayRepr::Data(d) => write!(f, "array[0x{}]", hex(d)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A view over an array: never owns storage, many slices may alias one
/// array. Geometry is fixed at construction; only base hydration mutates
/// the value afterwards.
#[derive(Debug)]
pub struct SliceValue {
    base: SliceBase,
    /// Start of the view within the base array.
    pub offset: usize,
    /// Number of visible elements.
    pub length: usize,
    /// Maximum capacity reachable by reslicing, relative to `offset`.
    pub maxcap: usize,
}

/// Backing storage of a slice: live, or a placeholder awaiting hydration.
#[derive(Debug)]
pub enum SliceBase {
    /// Live backing array.
    Array(ArrayRef),
    /// Unloaded backing array.
    Ref(RefValue),
}

impl SliceValue {
    /// A view over `base`.
    pub fn over(base: ArrayRef, offset: usize, length: usize, maxcap: usize) -> Self {
        Self {
            base: SliceBase::Array(base),
            offset,
            length,
            maxcap,
        }
    }

    /// A view whose backing array has not been loaded yet.
    pub fn unresolved(base: RefValue, offset: usize, length: usize, maxcap: usize) -> Self {
        Self {
            base: SliceBase::Ref(base),
            offset,
            length,
            maxcap,
        }
    }

    /// The backing array, loading it if still a placeholder. Does not
    /// memoize; see [`SliceRef::hydrated_base`].
    pub fn base(&self, store: &dyn Store) -> Option<ArrayRef> {
        match &self.base {
            SliceBase::Array(a) => Some(a.clone()),
            SliceBase::Ref(r) => match r.resolve(store) {
                Value::Array(a) => Some(a),
                other => fault!("slice base resolved to non-array {}", other),
            },
        }
    }

    /// The live backing array. Faults on an unhydrated base.
    pub fn base_array(&self) -> ArrayRef {
        match &self.base {
            SliceBase::Array(a) => a.clone(),
            SliceBase::Ref(r) => fault!("slice base not hydrated (ref {})", r.id),
        }
    }

    /// A narrower view over the same base. `low` is relative to this
    /// view's offset; bounds were validated by the caller.
    pub fn reslice(&self, low: usize, length: usize, maxcap: usize) -> SliceValue {
        let base = match &self.base {
            SliceBase::Array(a) => SliceBase::Array(a.clone()),
            SliceBase::Ref(r) => SliceBase::Ref(r.clone()),
        };
        SliceValue {
            base,
            offset: self.offset + low,
            length,
            maxcap,
        }
    }
}

impl PartialEq for SliceValue {
    fn eq(&self, other: &Self) -> bool {
        let same_base = match (&self.base, &other.base) {
            (SliceBase::Array(a), SliceBase::Array(b)) => ArrayRef::ptr_eq(a, b),
            (SliceBase::Ref(a), SliceBase::Ref(b)) => a.id == b.id,
            _ => false,
        };
        same_base
            && self.offset == other.offset
            && self.length == other.length
            && self.maxcap == other.maxcap
    }
}

impl SliceRef {
    /// The backing array, hydrating and memoizing a placeholder base.
    pub fn hydrated_base(&self, store: &dyn Store) -> ArrayRef {
        let needs_fill = matches!(self.borrow().base, SliceBase::Ref(_));
        if needs_fill {
            let resolved = match self.borrow().base(store) {
                Some(a) => a,
                None => fault!("slice base failed to resolve"),
            };
            self.borrow_mut().base = SliceBase::Array(resolved);
        }
        self.borrow().base_array()
    }

    /// Pointer into visible element `index`, bounds-checked against the
    /// view's length.
    pub fn element_pointer(
        &self,
        store: &dyn Store,
        index: i64,
        elem: &Type,
    ) -> Result<PointerValue> {
        if index < 0 {
            return Err(Exception::NegativeIndex { index });
        }
        let (offset, length) = {
            let sv = self.borrow();
            (sv.offset, sv.length)
        };
        if index as usize >= length {
            return Err(Exception::IndexOutOfBounds { index, length });
        }
        let base = self.hydrated_base(store);
        Ok(base.element_pointer(offset + index as usize, elem))
    }
}

impl std::fmt::Display for SliceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slice[{}:{}:{}]", self.offset, self.offset + self.length, self.maxcap)
    }
}
