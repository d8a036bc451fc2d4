//! Pointers: the uniform addressing abstraction.
//!
//! A [`PointerValue`] names one slot inside any container (or a
//! free-floating heap slot with no owner). All reads go through
//! [`PointerValue::deref`] and all writes through
//! [`PointerValue::assign2`], which reports the ownership delta of the
//! write so the persistence layer can track object-graph edges without
//! this layer depending on it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{fault, Exception, Result};
use crate::object::RefValue;
use crate::path::{PathKind, ValuePath};
use crate::store::{RefUpdate, Store};
use crate::types::{Kind, Type};
use crate::value::{
    ArrayRef, BlockRef, BoundMethodValue, DataByteValue, HeapRef, MapKey, MapRef, SlotRef,
    StructRef, TypedValue, Value,
};

/// Sentinel index of a block's blank slot.
pub const INDEX_BLANK: i64 = -1;
/// Sentinel index of a keyed map value slot.
pub const INDEX_MAP: i64 = -2;

/// Where a pointer lands.
#[derive(Debug, Clone)]
pub enum PointerTarget {
    /// Free-floating heap slot with no owning container.
    Slot(SlotRef),
    /// Element of a list-backed array.
    ArrayElem(ArrayRef, usize),
    /// Packed byte of a data-backed array, with its declared element
    /// type. Dereferencing materializes an aliasing [`DataByteValue`].
    ArrayByte(ArrayRef, usize, Type),
    /// Field of a struct.
    StructField(StructRef, usize),
    /// Slot of a block.
    BlockSlot(BlockRef, usize),
    /// A block's blank slot.
    BlockBlank(BlockRef),
    /// The single slot of a heap box.
    HeapSlot(HeapRef),
    /// Keyed value slot of a map, addressed by canonical key bytes with
    /// a snapshot of the key value.
    MapSlot(MapRef, MapKey, Rc<TypedValue>),
    /// Base not loaded yet; re-derived into a concrete target on first
    /// access, by the resolved base's container kind.
    Unresolved {
        /// Placeholder for the owning container.
        base: RefValue,
        /// Slot index within the container (sentinels included).
        index: i64,
        /// Static element type, needed to re-derive data-array targets.
        elem: Type,
    },
}

/// Addressable handle into a container slot.
///
/// Clones share the target cell, so hydrating a placeholder base through
/// one clone is visible through all of them.
#[derive(Debug, Clone)]
pub struct PointerValue {
    target: Rc<RefCell<PointerTarget>>,
}

impl PointerValue {
    fn from_target(t: PointerTarget) -> Self {
        Self {
            target: Rc::new(RefCell::new(t)),
        }
    }

    /// Pointer to a free-floating slot.
    pub fn free_slot(slot: SlotRef) -> Self {
        Self::from_target(PointerTarget::Slot(slot))
    }

    /// Pointer to a list-array element.
    pub fn array_elem(base: ArrayRef, index: usize) -> Self {
        Self::from_target(PointerTarget::ArrayElem(base, index))
    }

    /// Pointer to a data-array byte.
    pub fn array_byte(base: ArrayRef, index: usize, elem: Type) -> Self {
        Self::from_target(PointerTarget::ArrayByte(base, index, elem))
    }

    /// Pointer to a struct field.
    pub fn struct_field(base: StructRef, index: usize) -> Self {
        Self::from_target(PointerTarget::StructField(base, index))
    }

    /// Pointer to a block slot.
    pub fn block_slot(base: BlockRef, index: usize) -> Self {
        Self::from_target(PointerTarget::BlockSlot(base, index))
    }

    /// Pointer to a block's blank slot.
    pub fn block_blank(base: BlockRef) -> Self {
        Self::from_target(PointerTarget::BlockBlank(base))
    }

    /// Pointer into a heap box.
    pub fn heap_slot(base: HeapRef) -> Self {
        Self::from_target(PointerTarget::HeapSlot(base))
    }

    /// Pointer to a map value slot.
    pub fn map_slot(base: MapRef, mkey: MapKey, key: Rc<TypedValue>) -> Self {
        Self::from_target(PointerTarget::MapSlot(base, mkey, key))
    }

    /// Pointer whose base is an unloaded object.
    pub fn unresolved(base: RefValue, index: i64, elem: Type) -> Self {
        Self::from_target(PointerTarget::Unresolved { base, index, elem })
    }

    /// Slot index within the owner; `-1` for a blank slot, `-2` for a
    /// keyed map slot, `0` for free-floating and heap slots.
    pub fn index(&self) -> i64 {
        match &*self.target.borrow() {
            PointerTarget::Slot(_) | PointerTarget::HeapSlot(_) => 0,
            PointerTarget::ArrayElem(_, i)
            | PointerTarget::ArrayByte(_, i, _)
            | PointerTarget::StructField(_, i)
            | PointerTarget::BlockSlot(_, i) => *i as i64,
            PointerTarget::BlockBlank(_) => INDEX_BLANK,
            PointerTarget::MapSlot(..) => INDEX_MAP,
            PointerTarget::Unresolved { index, .. } => *index,
        }
    }

    /// Snapshot of the lookup key, present only for map slots.
    pub fn key(&self) -> Option<Rc<TypedValue>> {
        match &*self.target.borrow() {
            PointerTarget::MapSlot(_, _, k) => Some(k.clone()),
            _ => None,
        }
    }

    /// Re-derive an unresolved target by loading the base and indexing
    /// into it according to its concrete container kind. Idempotent and
    /// permanent. Bound-method and map bases cannot be pointer bases.
    pub fn resolve_base(&self, store: &dyn Store) {
        let (base, index, elem) = match &*self.target.borrow() {
            PointerTarget::Unresolved { base, index, elem } => {
                (base.clone(), *index, elem.clone())
            }
            _ => return,
        };
        let concrete = match base.resolve(store) {
            Value::Array(a) => {
                let is_data = a.borrow().is_data();
                if is_data {
                    PointerTarget::ArrayByte(a, index as usize, elem)
                } else {
                    PointerTarget::ArrayElem(a, index as usize)
                }
            }
            Value::Struct(s) => PointerTarget::StructField(s, index as usize),
            Value::Block(b) => {
                if index == INDEX_BLANK {
                    PointerTarget::BlockBlank(b)
                } else {
                    PointerTarget::BlockSlot(b, index as usize)
                }
            }
            Value::HeapItem(h) => PointerTarget::HeapSlot(h),
            other => fault!("value {} cannot own a pointer target", other),
        };
        *self.target.borrow_mut() = concrete;
    }

    /// The owning container, if any. Resolves a placeholder base first.
    pub fn owner(&self, store: &dyn Store) -> Option<Value> {
        self.resolve_base(store);
        match &*self.target.borrow() {
            PointerTarget::Slot(_) => None,
            PointerTarget::ArrayElem(a, _) | PointerTarget::ArrayByte(a, _, _) => {
                Some(Value::Array(a.clone()))
            }
            PointerTarget::StructField(s, _) => Some(Value::Struct(s.clone())),
            PointerTarget::BlockSlot(b, _) | PointerTarget::BlockBlank(b) => {
                Some(Value::Block(b.clone()))
            }
            PointerTarget::HeapSlot(h) => Some(Value::HeapItem(h.clone())),
            PointerTarget::MapSlot(m, _, _) => Some(Value::Map(m.clone())),
            PointerTarget::Unresolved { .. } => fault!("pointer base still unresolved"),
        }
    }

    /// Read through the pointer. A packed data byte materializes as a
    /// `DataByteValue` aliasing the backing buffer, so scalar writes on
    /// the result propagate; a map slot whose entry was deleted reads as
    /// undefined.
    pub fn deref(&self, store: &dyn Store) -> TypedValue {
        self.resolve_base(store);
        let target = self.target.borrow().clone();
        match target {
            PointerTarget::Slot(s) => s.borrow().clone(),
            PointerTarget::ArrayElem(a, i) => a.borrow().list()[i].clone(),
            PointerTarget::ArrayByte(a, i, elem) => TypedValue::with_value(
                Type::DataByte,
                Some(Value::DataByte(DataByteValue { base: a, index: i, elem })),
            ),
            PointerTarget::StructField(s, i) => s.borrow().fields[i].clone(),
            PointerTarget::BlockSlot(b, i) => b.borrow().values()[i].clone(),
            PointerTarget::BlockBlank(b) => b.borrow().blank().clone(),
            PointerTarget::HeapSlot(h) => h.borrow().value.clone(),
            PointerTarget::MapSlot(m, mkey, _) => m
                .borrow()
                .value_for(&mkey)
                .cloned()
                .unwrap_or_else(TypedValue::undefined),
            PointerTarget::Unresolved { .. } => fault!("pointer base still unresolved"),
        }
    }

    /// Write through the pointer, with untyped coercion when `cu`.
    ///
    /// Returns the ownership delta when the slot has an owning container:
    /// the first object reachable through the slot before and after the
    /// write, for the realm to consume. Free-floating slots and packed
    /// bytes carry no delta. A map slot whose entry was deleted re-enters
    /// the map at the tail.
    pub fn assign2(
        &self,
        store: &dyn Store,
        tv2: &TypedValue,
        cu: bool,
    ) -> Result<Option<RefUpdate>> {
        self.resolve_base(store);
        let target = self.target.borrow().clone();
        match target {
            PointerTarget::Slot(s) => {
                s.borrow_mut().assign(tv2, cu);
                Ok(None)
            }
            PointerTarget::ArrayByte(a, i, _) => {
                a.borrow_mut().set_byte_at(i, tv2.get_uint8());
                Ok(None)
            }
            PointerTarget::ArrayElem(a, i) => {
                let owner = Value::Array(a.clone());
                let old = first_object_of(store, &a.borrow().list()[i]);
                a.borrow_mut().list_mut()[i].assign(tv2, cu);
                let new = first_object_of(store, &a.borrow().list()[i]);
                Ok(Some(RefUpdate { owner, old, new }))
            }
            PointerTarget::StructField(s, i) => {
                let owner = Value::Struct(s.clone());
                let old = first_object_of(store, &s.borrow().fields[i]);
                s.borrow_mut().fields[i].assign(tv2, cu);
                let new = first_object_of(store, &s.borrow().fields[i]);
                Ok(Some(RefUpdate { owner, old, new }))
            }
            PointerTarget::BlockSlot(b, i) => {
                let owner = Value::Block(b.clone());
                let old = first_object_of(store, &b.borrow().values()[i]);
                b.borrow_mut().values_mut()[i].assign(tv2, cu);
                let new = first_object_of(store, &b.borrow().values()[i]);
                Ok(Some(RefUpdate { owner, old, new }))
            }
            PointerTarget::BlockBlank(b) => {
                // Blank writes are discarded values; no delta.
                b.borrow_mut().blank_mut().assign(tv2, cu);
                Ok(None)
            }
            PointerTarget::HeapSlot(h) => {
                let owner = Value::HeapItem(h.clone());
                let old = first_object_of(store, &h.borrow().value);
                h.borrow_mut().value.assign(tv2, cu);
                let new = first_object_of(store, &h.borrow().value);
                Ok(Some(RefUpdate { owner, old, new }))
            }
            PointerTarget::MapSlot(m, mkey, key) => {
                let owner = Value::Map(m.clone());
                if !m.borrow().contains(&mkey) {
                    m.borrow_mut()
                        .insert_tail(mkey.clone(), (*key).clone(), TypedValue::undefined());
                }
                let old = m
                    .borrow()
                    .value_for(&mkey)
                    .and_then(|tv| first_object_of(store, tv));
                match m.borrow_mut().value_for_mut(&mkey) {
                    Some(slot) => slot.assign(tv2, cu),
                    None => fault!("map slot vanished during write"),
                }
                let new = m
                    .borrow()
                    .value_for(&mkey)
                    .and_then(|tv| first_object_of(store, tv));
                Ok(Some(RefUpdate { owner, old, new }))
            }
            PointerTarget::Unresolved { .. } => fault!("pointer base still unresolved"),
        }
    }

    /// Identity bytes of the pointed-to slot, for pointer-valued map
    /// keys. Two pointers to the same slot encode identically.
    pub fn identity_bytes(&self) -> Vec<u8> {
        match &*self.target.borrow() {
            PointerTarget::Slot(s) => format!("slot:{:x}", s.addr()).into_bytes(),
            PointerTarget::ArrayElem(a, i) | PointerTarget::ArrayByte(a, i, _) => {
                format!("arr:{:x}:{}", a.addr(), i).into_bytes()
            }
            PointerTarget::StructField(s, i) => {
                format!("str:{:x}:{}", s.addr(), i).into_bytes()
            }
            PointerTarget::BlockSlot(b, i) => format!("blk:{:x}:{}", b.addr(), i).into_bytes(),
            PointerTarget::BlockBlank(b) => format!("blk:{:x}:blank", b.addr()).into_bytes(),
            PointerTarget::HeapSlot(h) => format!("heap:{:x}", h.addr()).into_bytes(),
            PointerTarget::MapSlot(m, mkey, _) => {
                let mut bz = format!("map:{:x}:", m.addr()).into_bytes();
                bz.extend_from_slice(mkey.bytes());
                bz
            }
            PointerTarget::Unresolved { base, index, .. } => {
                format!("ref:{}:{}", base.id.0, index).into_bytes()
            }
        }
    }
}

// Equality is slot identity: two pointers are equal when they address
// the same slot of the same container.
impl PartialEq for PointerValue {
    fn eq(&self, other: &Self) -> bool {
        use PointerTarget::*;
        match (&*self.target.borrow(), &*other.target.borrow()) {
            (Slot(a), Slot(b)) => SlotRef::ptr_eq(a, b),
            (ArrayElem(a, i), ArrayElem(b, j)) => ArrayRef::ptr_eq(a, b) && i == j,
            (ArrayByte(a, i, _), ArrayByte(b, j, _)) => ArrayRef::ptr_eq(a, b) && i == j,
            (StructField(a, i), StructField(b, j)) => StructRef::ptr_eq(a, b) && i == j,
            (BlockSlot(a, i), BlockSlot(b, j)) => BlockRef::ptr_eq(a, b) && i == j,
            (BlockBlank(a), BlockBlank(b)) => BlockRef::ptr_eq(a, b),
            (HeapSlot(a), HeapSlot(b)) => HeapRef::ptr_eq(a, b),
            (MapSlot(a, k1, _), MapSlot(b, k2, _)) => MapRef::ptr_eq(a, b) && k1 == k2,
            (Unresolved { base: a, index: i, .. }, Unresolved { base: b, index: j, .. }) => {
                a.id == b.id && i == j
            }
            _ => false,
        }
    }
}

fn first_object_of(store: &dyn Store, tv: &TypedValue) -> Option<Value> {
    tv.v.as_ref().and_then(|v| v.first_object(store))
}

impl TypedValue {
    /// Pointer into element `iv` of a string, array, slice, or map
    /// operand. Map access inserts a zero-initialized entry when the key
    /// is absent and the declared value type is not an interface.
    pub fn get_pointer_at_index(
        &self,
        store: &dyn Store,
        iv: &TypedValue,
    ) -> Result<PointerValue> {
        let bt = match &self.t {
            Some(t) => t.base_of(),
            None => fault!("index into undefined value"),
        };
        match bt {
            Type::Primitive(p) if p.kind() == Kind::String => {
                let s = self.get_string();
                let ii = iv.as_index();
                if ii < 0 {
                    return Err(Exception::NegativeIndex { index: ii });
                }
                if ii as usize >= s.len() {
                    return Err(Exception::IndexOutOfBounds {
                        index: ii,
                        length: s.len(),
                    });
                }
                let bv = TypedValue::uint8_value(s[ii as usize]);
                Ok(PointerValue::free_slot(SlotRef::new(bv)))
            }
            Type::Array(at) => {
                let a = match &self.v {
                    Some(Value::Array(a)) => a.clone(),
                    other => fault!("array-typed slot holds {:?}", other),
                };
                let ii = iv.as_index();
                if ii < 0 {
                    return Err(Exception::NegativeIndex { index: ii });
                }
                let length = a.borrow().len();
                if ii as usize >= length {
                    return Err(Exception::IndexOutOfBounds { index: ii, length });
                }
                Ok(a.element_pointer(ii as usize, &at.elem))
            }
            Type::Slice(st) => {
                let s = match &self.v {
                    Some(Value::Slice(s)) => s.clone(),
                    None => return Err(Exception::NilSliceIndex),
                    other => fault!("slice-typed slot holds {:?}", other),
                };
                s.element_pointer(store, iv.as_index(), &st.elem)
            }
            Type::Map(mt) => {
                let m = match &self.v {
                    Some(Value::Map(m)) => m.clone(),
                    None => return Err(Exception::UninitializedMap),
                    other => fault!("map-typed slot holds {:?}", other),
                };
                Ok(m.get_pointer_for_key(store, iv, Some(&mt.value)))
            }
            t => fault!("type {} cannot be indexed", t),
        }
    }

    /// Resolve a symbolic path against this value, producing a pointer
    /// into the selected slot, or a free-floating bound-method value for
    /// method paths.
    pub fn get_pointer_to(&self, store: &dyn Store, path: &ValuePath) -> Result<PointerValue> {
        debug_assert!(self.is_defined(), "path resolution on undefined value");

        // Implicit dereference and receiver shaping, per path kind.
        let mut eff = path.kind;
        let mut dtv = match path.kind {
            PathKind::SubrefField => self.deref_pointer(store)?,
            PathKind::DerefField => {
                eff = PathKind::Field;
                self.deref_pointer(store)?
            }
            PathKind::DerefValMethod => {
                // Re-type under the static element type, in case the
                // method is called on a converted pointer.
                let target = self.deref_pointer(store)?;
                eff = PathKind::ValMethod;
                TypedValue {
                    t: self.t.as_ref().map(Type::elem),
                    v: target.v,
                    n: target.n,
                }
            }
            PathKind::DerefPtrMethod => {
                // The receiver stays the pointer itself; nil is allowed.
                eff = PathKind::PtrMethod;
                self.clone()
            }
            PathKind::DerefInterface => {
                eff = PathKind::Interface;
                self.deref_pointer(store)?
            }
            _ => self.clone(),
        };
        crate::value::fill_value(store, &mut dtv);

        match eff {
            PathKind::Block => match &dtv.v {
                Some(Value::Package(pv)) => {
                    Ok(pv.get_block(store).get_pointer_to(store, path))
                }
                other => fault!("block path into non-package value {:?}", other),
            },
            PathKind::Field => {
                let bt = dtv.t.as_ref().map(Type::base_of);
                match bt {
                    Some(Type::Struct(_)) => match &dtv.v {
                        Some(Value::Struct(s)) => Ok(s.field_pointer(path.index as usize)),
                        other => fault!("struct-typed slot holds {:?}", other),
                    },
                    Some(Type::Meta) => {
                        // Method selection on a type expression.
                        let dt = match dtv.get_type_value() {
                            Type::Pointer(pt) => match &pt.elem {
                                Type::Declared(dt) => dt.clone(),
                                t => fault!("no method table on type {}", t),
                            },
                            Type::Declared(dt) => dt,
                            t => fault!("no method table on type {}", t),
                        };
                        let mtv = dt.value_at(path);
                        Ok(PointerValue::free_slot(SlotRef::new(mtv)))
                    }
                    t => fault!("field path into {:?}", t),
                }
            }
            PathKind::SubrefField => {
                let bt = dtv.t.as_ref().map(Type::base_of);
                match (bt, &dtv.v) {
                    (Some(Type::Struct(st)), Some(Value::Struct(s))) => {
                        let ft = &st.fields[path.index as usize].typ;
                        Ok(s.subref_field_pointer(path.index as usize, ft))
                    }
                    (t, _) => fault!("subref path into {:?}", t),
                }
            }
            PathKind::ValMethod => {
                let dt = match &dtv.t {
                    Some(Type::Declared(dt)) => dt.clone(),
                    t => fault!("value-method path on non-declared type {:?}", t),
                };
                let mtv = dt.value_at(path);
                let mv = mtv.get_func();
                let mt = mv.get_type(store);
                debug_assert!(!mt.has_pointer_receiver());
                let bmv = BoundMethodValue::new(mv, dtv.copy());
                let slot = TypedValue::with_value(mt.bound_type(), Some(Value::BoundMethod(bmv)));
                Ok(PointerValue::free_slot(SlotRef::new(slot)))
            }
            PathKind::PtrMethod => {
                // The operand is normally pointer-typed, with the declared
                // type hanging off the pointee; nil receivers are allowed.
                // Interface dispatch can also land here with the declared
                // value itself, which binds as the receiver directly.
                let dt = match &self.t {
                    Some(Type::Pointer(pt)) => match &pt.elem {
                        Type::Declared(dt) => dt.clone(),
                        t => fault!("pointer-method path on non-declared type {}", t),
                    },
                    Some(Type::Declared(dt)) => dt.clone(),
                    t => fault!("pointer-method path on {:?}", t),
                };
                let mtv = dt.value_at(path);
                let mv = mtv.get_func();
                let mt = mv.get_type(store);
                debug_assert!(mt.has_pointer_receiver());
                let bmv = BoundMethodValue::new(mv, self.clone());
                let slot = TypedValue::with_value(mt.bound_type(), Some(Value::BoundMethod(bmv)));
                Ok(PointerValue::free_slot(SlotRef::new(slot)))
            }
            PathKind::Interface => {
                if dtv.is_undefined() {
                    fault!("interface method call on undefined value");
                }
                let t = match &dtv.t {
                    Some(t) => t.clone(),
                    None => fault!("interface dispatch without a dynamic type"),
                };
                let trail = match crate::types::find_embedded_field_type(&t, &path.name) {
                    Some(tr) if !tr.is_empty() => tr,
                    _ => fault!("method {} not found in type {}", path.name, t),
                };
                let mut bv = dtv;
                for (i, hop) in trail.iter().enumerate() {
                    let ptr = bv.get_pointer_to(store, hop)?;
                    if i == trail.len() - 1 {
                        return Ok(ptr);
                    }
                    bv = ptr.deref(store);
                }
                fault!("embedding walk ended without a selection")
            }
            PathKind::DerefField
            | PathKind::DerefValMethod
            | PathKind::DerefPtrMethod
            | PathKind::DerefInterface => fault!("deref path kind survived normalization"),
        }
    }

    fn deref_pointer(&self, store: &dyn Store) -> Result<TypedValue> {
        match &self.v {
            Some(Value::Pointer(p)) => Ok(p.deref(store)),
            None => Err(Exception::NilPointer),
            other => fault!("implicit deref of non-pointer value {:?}", other),
        }
    }
}
