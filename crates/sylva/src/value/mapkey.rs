//! Canonical map-key encoding.
//!
//! The byte form serves simultaneously as hash key and equality witness,
//! and it is consensus-visible: map iteration order and key equality
//! observable by every participant derive from these bytes, so the
//! encoding must stay bit-identical across releases and implementations.

use crate::error::fault;
use crate::store::Store;
use crate::types::{Kind, Type};
use crate::value::{fill_value, TypedValue, Value};

/// Canonical key bytes for one map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapKey(pub Vec<u8>);

impl MapKey {
    /// The encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Encode `tv` as canonical key bytes.
///
/// `omit_type` is set when the static field/element type already pins the
/// runtime type (any non-interface static type), making the type tag
/// redundant. Encoding rules: undefined encodes as a nil sentinel;
/// primitives as fixed-width little-endian bytes (raw bytes for strings);
/// arrays as `[e,e,...]` (data-backed arrays contribute their packed
/// bytes verbatim between the brackets) and structs as `{f,f,...}` with
/// the omit rule applied per element/field from its *static* type;
/// pointers as the identity of the pointed-to slot; packages as the
/// quoted package path. Placeholder payloads are hydrated from the store
/// before encoding. Slice, map, and func values are not comparable; a
/// key of one of those kinds means the type-checker failed and is a
/// fatal fault.
pub fn compute_map_key(store: &dyn Store, tv: &TypedValue, omit_type: bool) -> MapKey {
    let mut bz = Vec::new();
    let mut tv = tv.clone();
    fill_value(store, &mut tv);
    encode(store, &tv, omit_type, &mut bz);
    MapKey(bz)
}

impl TypedValue {
    /// Canonical key bytes for this value; see [`compute_map_key`].
    pub fn compute_map_key(&self, store: &dyn Store, omit_type: bool) -> MapKey {
        compute_map_key(store, self, omit_type)
    }
}

fn encode(store: &dyn Store, tv: &TypedValue, omit_type: bool, bz: &mut Vec<u8>) {
    let Some(t) = &tv.t else {
        bz.extend_from_slice(b"nil");
        return;
    };
    if !omit_type {
        bz.extend_from_slice(t.id().bytes());
        bz.push(b':');
    }
    match t.base_of() {
        Type::Primitive(_) => bz.extend_from_slice(&tv.primitive_bytes()),
        Type::Pointer(_) => match &tv.v {
            Some(Value::Pointer(p)) => bz.extend_from_slice(&p.identity_bytes()),
            None => bz.extend_from_slice(b"nil"),
            Some(v) => fault!("pointer-typed key without pointer payload: {}", v),
        },
        Type::Array(at) => {
            let elem_omit = at.elem.kind() != Kind::Interface;
            let av = match &tv.v {
                Some(Value::Array(a)) => a.clone(),
                other => fault!("array-typed key without array payload: {:?}", other),
            };
            bz.push(b'[');
            if av.borrow().is_data() {
                bz.extend_from_slice(av.borrow().readonly_bytes());
            } else {
                {
                    let mut av = av.borrow_mut();
                    for ev in av.list_mut() {
                        fill_value(store, ev);
                    }
                }
                let av = av.borrow();
                for (i, ev) in av.list().iter().enumerate() {
                    if i > 0 {
                        bz.push(b',');
                    }
                    encode(store, ev, elem_omit, bz);
                }
            }
            bz.push(b']');
        }
        Type::Struct(st) => {
            let sv = match &tv.v {
                Some(Value::Struct(s)) => s.clone(),
                other => fault!("struct-typed key without struct payload: {:?}", other),
            };
            {
                let mut sv = sv.borrow_mut();
                for ftv in sv.fields.iter_mut() {
                    fill_value(store, ftv);
                }
            }
            bz.push(b'{');
            let sv = sv.borrow();
            for (i, ftv) in sv.fields.iter().enumerate() {
                if i > 0 {
                    bz.push(b',');
                }
                let field_omit = st.fields[i].typ.kind() != Kind::Interface;
                encode(store, ftv, field_omit, bz);
            }
            bz.push(b'}');
        }
        Type::Package => match &tv.v {
            Some(Value::Package(p)) => {
                bz.extend_from_slice(format!("{:?}", p.borrow().pkg_path).as_bytes());
            }
            other => fault!("package-typed key without package payload: {:?}", other),
        },
        other => fault!("type {} is not comparable and cannot be a map key", other),
    }
}
