//! Structs.

use crate::object::ObjectInfo;
use crate::types::Type;
use crate::value::{PointerValue, SlotRef, StructRef, TypedValue, Value};

/// Ordered field sequence.
///
/// Copying is deep per field so by-value struct semantics hold even
/// though the field storage is heap-indirected behind a handle.
#[derive(Debug, PartialEq)]
pub struct StructValue {
    /// Persistence metadata.
    pub info: ObjectInfo,
    /// Field slots in declaration order.
    pub fields: Vec<TypedValue>,
}

impl StructValue {
    /// A struct with the given field slots.
    pub fn new(fields: Vec<TypedValue>) -> StructRef {
        StructRef::new(Self {
            info: ObjectInfo::default(),
            fields,
        })
    }

    /// Deep copy: every field is copied by its own copy rule. The copy
    /// is a fresh object with no persistence identity.
    pub fn copy(&self) -> StructRef {
        StructValue::new(self.fields.iter().map(TypedValue::copy).collect())
    }
}

impl StructRef {
    /// Pointer to field `index`.
    pub fn field_pointer(&self, index: usize) -> PointerValue {
        PointerValue::struct_field(self.clone(), index)
    }

    /// Free-floating pointer to a pointer to field `index`, used when an
    /// embedded pointer field is itself taken by reference
    /// (`&outer.innerPointerField`). The outer slot has no owning
    /// container, so writes through it carry no ownership delta.
    pub fn subref_field_pointer(&self, index: usize, field_type: &Type) -> PointerValue {
        let inner = self.field_pointer(index);
        let outer = TypedValue::with_value(
            Type::pointer_to(field_type.clone()),
            Some(Value::Pointer(inner)),
        );
        PointerValue::free_slot(SlotRef::new(outer))
    }
}

impl std::fmt::Display for StructValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "struct{{")?;
        for (i, tv) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", tv)?;
        }
        write!(f, "}}")
    }
}
