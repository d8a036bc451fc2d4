//! Lazy hydration of persisted object graphs.
//!
//! Persisted slots may hold a [`crate::object::RefValue`] placeholder, or
//! a pointer whose base is a placeholder. [`fill_value`] promotes such a
//! slot to the live object, memoized in place: once a slot holds a direct
//! reference it is never re-resolved ("swizzling"). [`deep_fill`]
//! hydrates an entire reachable graph synchronously.

use crate::store::Store;
use crate::value::{TypedValue, Value};

/// Hydrate one slot in place.
///
/// A placeholder payload is resolved through the store and overwritten;
/// a pointer payload gets its base resolved and its target re-derived.
/// Everything else is left untouched. Idempotent.
pub fn fill_value(store: &dyn Store, tv: &mut TypedValue) {
    match &tv.v {
        Some(Value::Ref(r)) => {
            let resolved = r.resolve(store);
            tv.v = Some(resolved);
        }
        Some(Value::Pointer(p)) => p.resolve_base(store),
        _ => {}
    }
}

/// Hydrate the whole graph reachable from a slot.
///
/// Follows container ownership edges only; aliasing views (slices,
/// pointers) get their base hydrated without recursing through it, so
/// traversal terminates on the ownership tree.
pub fn deep_fill(store: &dyn Store, tv: &mut TypedValue) {
    fill_value(store, tv);
    let Some(v) = &tv.v else {
        return;
    };
    match v.clone() {
        Value::Array(a) => {
            let mut av = a.borrow_mut();
            if !av.is_data() {
                for elem in av.list_mut() {
                    deep_fill(store, elem);
                }
            }
        }
        Value::Slice(s) => {
            s.hydrated_base(store);
        }
        Value::Struct(s) => {
            for field in &mut s.borrow_mut().fields {
                deep_fill(store, field);
            }
        }
        Value::Map(m) => {
            m.borrow_mut().for_each_slot_mut(|k, v| {
                deep_fill(store, k);
                deep_fill(store, v);
            });
        }
        Value::Block(b) => {
            let _ = b.get_parent(store);
            let mut bv = b.borrow_mut();
            for slot in bv.values_mut() {
                deep_fill(store, slot);
            }
            deep_fill(store, bv.blank_mut());
        }
        Value::HeapItem(h) => {
            deep_fill(store, &mut h.borrow_mut().value);
        }
        Value::Package(p) => {
            p.get_block(store);
        }
        Value::Func(f) => {
            let _ = f.get_closure(store);
        }
        Value::Pointer(_)
        | Value::BoundMethod(_)
        | Value::Str(_)
        | Value::BigInt(_)
        | Value::BigDec(_)
        | Value::DataByte(_)
        | Value::Type(_)
        | Value::Ref(_) => {}
    }
}
