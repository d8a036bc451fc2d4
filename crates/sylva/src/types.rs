//! Type descriptors consumed by the value layer.
//!
//! The type-checker owns type construction and correctness; this module
//! only carries the shape the runtime needs: kind classification, stable
//! type identity (consensus-visible through map keys), element/field
//! lookup, zero values, and untyped-constant coercion.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::fault;
use crate::path::{PathKind, ValuePath};
use crate::value::{ArrayValue, StructValue, TypedValue, Value};

/// Declared names are plain strings, interned upstream.
pub type Name = String;

/// Runtime kind of a type: the discriminator every kind-keyed operation
/// switches on. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Kind {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    BigInt,
    BigDec,
    Array,
    Slice,
    Struct,
    Map,
    Pointer,
    Func,
    Interface,
    Package,
    Type,
    Block,
    HeapItem,
}

/// Primitive (scalar) types, including the untyped constant forms the
/// source language assigns to literals before coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PrimitiveType {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    BigInt,
    BigDec,
    UntypedBool,
    UntypedString,
    UntypedRune,
    UntypedBigInt,
    UntypedBigDec,
}

impl PrimitiveType {
    /// Runtime kind of this primitive.
    pub fn kind(self) -> Kind {
        use PrimitiveType::*;
        match self {
            Bool | UntypedBool => Kind::Bool,
            String | UntypedString => Kind::String,
            Int => Kind::Int,
            Int8 => Kind::Int8,
            Int16 => Kind::Int16,
            Int32 | UntypedRune => Kind::Int32,
            Int64 => Kind::Int64,
            Uint => Kind::Uint,
            Uint8 => Kind::Uint8,
            Uint16 => Kind::Uint16,
            Uint32 => Kind::Uint32,
            Uint64 => Kind::Uint64,
            Float32 => Kind::Float32,
            Float64 => Kind::Float64,
            BigInt | UntypedBigInt => Kind::BigInt,
            BigDec | UntypedBigDec => Kind::BigDec,
        }
    }

    /// Whether this is an untyped constant form.
    pub fn is_untyped(self) -> bool {
        use PrimitiveType::*;
        matches!(
            self,
            UntypedBool | UntypedString | UntypedRune | UntypedBigInt | UntypedBigDec
        )
    }

    /// The concrete default type an untyped constant converts to.
    pub fn default_concrete(self) -> PrimitiveType {
        use PrimitiveType::*;
        match self {
            UntypedBool => Bool,
            UntypedString => String,
            UntypedRune => Int32,
            UntypedBigInt => Int,
            UntypedBigDec => Float64,
            other => other,
        }
    }

    fn name(self) -> &'static str {
        use PrimitiveType::*;
        match self {
            Bool => "bool",
            String => "string",
            Int => "int",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Uint => "uint",
            Uint8 => "uint8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Float32 => "float32",
            Float64 => "float64",
            BigInt => "bigint",
            BigDec => "bigdec",
            UntypedBool => "untyped bool",
            UntypedString => "untyped string",
            UntypedRune => "untyped rune",
            UntypedBigInt => "untyped bigint",
            UntypedBigDec => "untyped bigdec",
        }
    }
}

/// Stable textual identity of a type.
///
/// Identity bytes prefix map keys, so they are consensus-visible and must
/// not change across releases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub String);

impl TypeId {
    /// The identity as raw bytes for canonical encodings.
    pub fn bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// A runtime type descriptor. Composite descriptors are shared behind
/// `Rc`; two descriptors are equal when their identities are.
#[derive(Clone)]
pub enum Type {
    /// Scalar type.
    Primitive(PrimitiveType),
    /// Pseudo-type of one packed byte inside a data-backed array. Kind
    /// `Uint8`, but never stored in a slot the evaluator sees.
    DataByte,
    /// Fixed-length array.
    Array(Rc<ArrayType>),
    /// Slice view over an array.
    Slice(Rc<SliceType>),
    /// Struct with ordered fields.
    Struct(Rc<StructType>),
    /// Associative map with deterministic iteration order.
    Map(Rc<MapType>),
    /// Pointer to an addressable slot.
    Pointer(Rc<PointerType>),
    /// Function or method signature.
    Func(Rc<FuncType>),
    /// Interface (method set).
    Interface(Rc<InterfaceType>),
    /// Named type declared in a package, carrying its method table.
    Declared(Rc<DeclaredType>),
    /// The type of package values.
    Package,
    /// The type of type values.
    Meta,
    /// The type of block values (scope frames).
    Block,
    /// The type of heap-item boxes produced by escape promotion.
    HeapItem,
    /// Unresolved type reference, hydrated through the store on first use.
    Ref(TypeId),
}

/// Fixed-length array type.
pub struct ArrayType {
    /// Element type.
    pub elem: Type,
    /// Declared length.
    pub len: usize,
}

/// Slice type.
pub struct SliceType {
    /// Element type.
    pub elem: Type,
}

/// One struct field or interface method entry.
pub struct FieldType {
    /// Field or method name.
    pub name: Name,
    /// Static type of the field (or method signature).
    pub typ: Type,
    /// Whether the field is embedded (participates in promotion).
    pub embedded: bool,
}

/// Struct type: ordered field list.
pub struct StructType {
    /// Fields in declaration order; indices match value slots.
    pub fields: Vec<FieldType>,
}

impl StructType {
    /// Index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Static type of the field a path selects.
    pub fn static_type_at(&self, path: &ValuePath) -> &Type {
        &self.fields[path.index as usize].typ
    }
}

/// Map type.
pub struct MapType {
    /// Key type.
    pub key: Type,
    /// Value type.
    pub value: Type,
}

/// Pointer type.
pub struct PointerType {
    /// Pointed-to type.
    pub elem: Type,
}

/// Function signature. For unbound methods the receiver is `params[0]`.
pub struct FuncType {
    /// Parameter types, receiver first for unbound methods.
    pub params: Vec<Type>,
    /// Result types.
    pub results: Vec<Type>,
}

impl FuncType {
    /// Whether the (unbound) receiver is a pointer.
    pub fn has_pointer_receiver(&self) -> bool {
        matches!(self.params.first(), Some(Type::Pointer(_)))
    }

    /// The signature with the receiver bound away.
    pub fn bound_type(&self) -> Type {
        Type::Func(Rc::new(FuncType {
            params: self.params.iter().skip(1).cloned().collect(),
            results: self.results.clone(),
        }))
    }
}

/// Interface type: a method set.
pub struct InterfaceType {
    /// Declared methods, name plus signature.
    pub methods: Vec<FieldType>,
}

/// A named type declared in a package. The method table is populated by
/// the type-checker after construction; paths index into it.
pub struct DeclaredType {
    /// Declared name.
    pub name: Name,
    /// Declaring package path.
    pub pkg_path: String,
    /// Underlying type.
    pub base: Type,
    /// Method values in declaration order (func-typed TypedValues).
    pub methods: RefCell<Vec<TypedValue>>,
}

impl DeclaredType {
    /// A declared type with an empty method table.
    pub fn new(pkg_path: impl Into<String>, name: impl Into<Name>, base: Type) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            pkg_path: pkg_path.into(),
            base,
            methods: RefCell::new(Vec::new()),
        })
    }

    /// Append a method value (the type-checker's registration hook).
    pub fn add_method(&self, method: TypedValue) {
        self.methods.borrow_mut().push(method);
    }

    /// Find a method by name, returning its table index and value.
    pub fn method_entry(&self, name: &str) -> Option<(usize, TypedValue)> {
        self.methods
            .borrow()
            .iter()
            .enumerate()
            .find(|(_, tv)| tv.func_value().is_some_and(|fv| fv.name == name))
            .map(|(i, tv)| (i, tv.clone()))
    }

    /// The method value a path indexes.
    pub fn value_at(&self, path: &ValuePath) -> TypedValue {
        match self.methods.borrow().get(path.index as usize) {
            Some(tv) => tv.clone(),
            None => fault!(
                "method index {} out of range for type {}.{}",
                path.index,
                self.pkg_path,
                self.name
            ),
        }
    }
}

impl Type {
    /// Runtime kind of this type.
    pub fn kind(&self) -> Kind {
        match self {
            Type::Primitive(p) => p.kind(),
            Type::DataByte => Kind::Uint8,
            Type::Array(_) => Kind::Array,
            Type::Slice(_) => Kind::Slice,
            Type::Struct(_) => Kind::Struct,
            Type::Map(_) => Kind::Map,
            Type::Pointer(_) => Kind::Pointer,
            Type::Func(_) => Kind::Func,
            Type::Interface(_) => Kind::Interface,
            Type::Declared(dt) => dt.base.kind(),
            Type::Package => Kind::Package,
            Type::Meta => Kind::Type,
            Type::Block => Kind::Block,
            Type::HeapItem => Kind::HeapItem,
            Type::Ref(id) => fault!("kind of unresolved type {:?}", id),
        }
    }

    /// Stable identity. Bit-identical across nodes; prefixes map keys.
    pub fn id(&self) -> TypeId {
        TypeId(self.id_string())
    }

    fn id_string(&self) -> String {
        match self {
            Type::Primitive(p) => p.name().to_string(),
            Type::DataByte => "databyte".to_string(),
            Type::Array(at) => format!("[{}]{}", at.len, at.elem.id_string()),
            Type::Slice(st) => format!("[]{}", st.elem.id_string()),
            Type::Struct(st) => {
                let fields: Vec<String> = st
                    .fields
                    .iter()
                    .map(|f| format!("{} {}", f.name, f.typ.id_string()))
                    .collect();
                format!("struct{{{}}}", fields.join(";"))
            }
            Type::Map(mt) => format!("map[{}]{}", mt.key.id_string(), mt.value.id_string()),
            Type::Pointer(pt) => format!("*{}", pt.elem.id_string()),
            Type::Func(ft) => {
                let params: Vec<String> = ft.params.iter().map(|t| t.id_string()).collect();
                let results: Vec<String> = ft.results.iter().map(|t| t.id_string()).collect();
                format!("func({})({})", params.join(","), results.join(","))
            }
            Type::Interface(it) => {
                let methods: Vec<String> = it
                    .methods
                    .iter()
                    .map(|m| format!("{} {}", m.name, m.typ.id_string()))
                    .collect();
                format!("interface{{{}}}", methods.join(";"))
            }
            Type::Declared(dt) => format!("{}.{}", dt.pkg_path, dt.name),
            Type::Package => "package".to_string(),
            Type::Meta => "type".to_string(),
            Type::Block => "block".to_string(),
            Type::HeapItem => "heapitem".to_string(),
            Type::Ref(id) => id.0.clone(),
        }
    }

    /// The underlying type: declared types resolve to their base,
    /// everything else resolves to itself.
    pub fn base_of(&self) -> Type {
        match self {
            Type::Declared(dt) => dt.base.clone(),
            other => other.clone(),
        }
    }

    /// Element type of an array, slice, or pointer type.
    pub fn elem(&self) -> Type {
        match self.base_of() {
            Type::Array(at) => at.elem.clone(),
            Type::Slice(st) => st.elem.clone(),
            Type::Pointer(pt) => pt.elem.clone(),
            other => fault!("elem() on non-element type {:?}", other.id()),
        }
    }

    /// Whether this is an untyped constant type.
    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_untyped())
    }

    /// Shorthand constructors for common composite types.
    pub fn array_of(elem: Type, len: usize) -> Type {
        Type::Array(Rc::new(ArrayType { elem, len }))
    }

    /// Slice-of-element type.
    pub fn slice_of(elem: Type) -> Type {
        Type::Slice(Rc::new(SliceType { elem }))
    }

    /// Pointer-to-element type.
    pub fn pointer_to(elem: Type) -> Type {
        Type::Pointer(Rc::new(PointerType { elem }))
    }

    /// Map type from key and value types.
    pub fn map_of(key: Type, value: Type) -> Type {
        Type::Map(Rc::new(MapType { key, value }))
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Type {}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_string())
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_string())
    }
}

/// Zero value payload for a type, or `None` where the zero value is the
/// empty payload (nil slice/map/pointer/func, zero scalar).
pub fn default_value(t: &Type) -> Option<Value> {
    match t.base_of() {
        Type::Array(at) => Some(Value::Array(default_array_value(&at))),
        Type::Struct(st) => Some(Value::Struct(default_struct_value(&st))),
        _ => None,
    }
}

fn default_array_value(at: &ArrayType) -> crate::value::ArrayRef {
    if at.elem.kind() == Kind::Uint8 {
        return ArrayValue::new_data(vec![0u8; at.len]);
    }
    let mut list = Vec::with_capacity(at.len);
    for _ in 0..at.len {
        list.push(default_typed_value(&at.elem));
    }
    ArrayValue::new_list(list)
}

fn default_struct_value(st: &StructType) -> crate::value::StructRef {
    let fields = st
        .fields
        .iter()
        .map(|f| default_typed_value(&f.typ))
        .collect();
    StructValue::new(fields)
}

/// Zero TypedValue for a type. Interface kinds stay fully undefined.
pub fn default_typed_value(t: &Type) -> TypedValue {
    if t.kind() == Kind::Interface {
        return TypedValue::undefined();
    }
    TypedValue::with_value(t.clone(), default_value(t))
}

/// The concrete type an untyped constant type defaults to. Identity for
/// types that are already concrete.
pub fn default_type_of(t: &Type) -> Type {
    match t {
        Type::Primitive(p) if p.is_untyped() => Type::Primitive(p.default_concrete()),
        other => other.clone(),
    }
}

/// Coerce an untyped constant in place to its kind's default concrete
/// type. No-op for values that are already concretely typed.
pub fn convert_untyped(tv: &mut TypedValue) {
    let Some(Type::Primitive(p)) = tv.t.clone() else {
        return;
    };
    if !p.is_untyped() {
        return;
    }
    match p {
        PrimitiveType::UntypedBool => tv.t = Some(Type::Primitive(PrimitiveType::Bool)),
        PrimitiveType::UntypedString => tv.t = Some(Type::Primitive(PrimitiveType::String)),
        PrimitiveType::UntypedRune => tv.t = Some(Type::Primitive(PrimitiveType::Int32)),
        PrimitiveType::UntypedBigInt => {
            let bi = tv.take_bigint();
            let n: i64 = match i64::try_from(&*bi) {
                Ok(n) => n,
                Err(_) => fault!("untyped integer constant {} overflows int", bi),
            };
            tv.t = Some(Type::Primitive(PrimitiveType::Int));
            tv.set_int(n);
        }
        PrimitiveType::UntypedBigDec => {
            use rust_decimal::prelude::ToPrimitive;
            let d = tv.take_bigdec();
            let f = match d.to_f64() {
                Some(f) => f,
                None => fault!("untyped decimal constant does not fit float64"),
            };
            tv.t = Some(Type::Primitive(PrimitiveType::Float64));
            tv.set_float64(f);
        }
        _ => unreachable!(),
    }
}

/// Locate `name` on `t` through the embedding chain, producing the path
/// trajectory to execute: zero or more embedded-field hops followed by the
/// method (or field) selection itself. Returns `None` when the chain ends
/// without a match.
pub fn find_embedded_field_type(t: &Type, name: &str) -> Option<Vec<ValuePath>> {
    if let Type::Pointer(pt) = t {
        // The pointee's selection executes through an implicit deref, so
        // the first hop switches to its deref form. A pointer's method
        // table includes the pointee's value-receiver methods too.
        let mut trail = find_embedded_field_type(&pt.elem, name)?;
        trail[0].kind = match trail[0].kind {
            PathKind::Field => PathKind::DerefField,
            PathKind::ValMethod => PathKind::DerefValMethod,
            PathKind::PtrMethod => PathKind::DerefPtrMethod,
            PathKind::Interface => PathKind::DerefInterface,
            k => k,
        };
        return Some(trail);
    }
    if let Type::Declared(dt) = t {
        if let Some((idx, mtv)) = dt.method_entry(name) {
            let kind = if mtv
                .func_value()
                .is_some_and(|fv| fv.unbound_type().has_pointer_receiver())
            {
                PathKind::PtrMethod
            } else {
                PathKind::ValMethod
            };
            return Some(vec![ValuePath::method(kind, idx as u16, name)]);
        }
    }
    if let Type::Struct(st) = t.base_of() {
        if let Some(idx) = st.field_index(name) {
            return Some(vec![ValuePath::field(idx as u16, name)]);
        }
        for (idx, field) in st.fields.iter().enumerate() {
            if !field.embedded {
                continue;
            }
            // Embedded pointers promote through an implicit dereference.
            let (hop_kind, inner) = match field.typ.base_of() {
                Type::Pointer(pt) => (PathKind::DerefField, pt.elem.clone()),
                _ => (PathKind::Field, field.typ.clone()),
            };
            if let Some(mut rest) = find_embedded_field_type(&inner, name) {
                let mut trail = vec![ValuePath {
                    kind: hop_kind,
                    depth: 0,
                    index: idx as u16,
                    name: field.name.clone(),
                }];
                trail.append(&mut rest);
                return Some(trail);
            }
        }
    }
    None
}
