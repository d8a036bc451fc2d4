//! The universal value slot.
//!
//! A [`TypedValue`] is a type tag, an optional polymorphic payload, and an
//! 8-byte inline buffer holding scalar payloads little-endian. Scalar
//! accessors trust the caller's kind; mismatches are caught only under
//! debug assertions, as the upstream type-checker is responsible for
//! never producing them.

use std::rc::Rc;

use num_bigint::BigInt;
use rust_decimal::Decimal;

use crate::error::{fault, Exception, Result};
use crate::types::{convert_untyped, Kind, PrimitiveType, Type};
use crate::value::{FuncValue, SliceRef, SliceValue, Value};

/// Tagged (type, payload) tuple; the universal value slot.
///
/// Invariants: `t == None` means fully undefined (`v` empty, `n` zero);
/// an interface-typed slot with empty `v` is a nil interface and `n` is
/// zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedValue {
    /// Type descriptor, absent only for the undefined value.
    pub t: Option<Type>,
    /// Polymorphic payload, absent for inline scalars and nil values.
    pub v: Option<Value>,
    /// Inline scalar buffer, little-endian.
    pub n: [u8; 8],
}

impl TypedValue {
    /// The undefined value.
    pub fn undefined() -> Self {
        Self::default()
    }

    /// A typed slot with an optional payload.
    pub fn with_value(t: Type, v: Option<Value>) -> Self {
        Self { t: Some(t), v, n: [0; 8] }
    }

    /// A concretely typed bool.
    pub fn bool_value(b: bool) -> Self {
        let mut tv = Self::with_value(Type::Primitive(PrimitiveType::Bool), None);
        tv.set_bool(b);
        tv
    }

    /// A concretely typed int.
    pub fn int_value(n: i64) -> Self {
        let mut tv = Self::with_value(Type::Primitive(PrimitiveType::Int), None);
        tv.set_int(n);
        tv
    }

    /// A concretely typed uint8.
    pub fn uint8_value(b: u8) -> Self {
        let mut tv = Self::with_value(Type::Primitive(PrimitiveType::Uint8), None);
        tv.set_uint8(b);
        tv
    }

    /// A concretely typed float64.
    pub fn float64_value(x: f64) -> Self {
        let mut tv = Self::with_value(Type::Primitive(PrimitiveType::Float64), None);
        tv.set_float64(x);
        tv
    }

    /// A concretely typed string.
    pub fn string_value(s: impl AsRef<str>) -> Self {
        Self::with_value(
            Type::Primitive(PrimitiveType::String),
            Some(Value::Str(Rc::from(s.as_ref().as_bytes()))),
        )
    }

    /// An untyped big-integer constant.
    pub fn bigint_value(n: BigInt) -> Self {
        Self::with_value(
            Type::Primitive(PrimitiveType::UntypedBigInt),
            Some(Value::BigInt(Rc::new(n))),
        )
    }

    /// An untyped big-decimal constant.
    pub fn bigdec_value(d: Decimal) -> Self {
        Self::with_value(
            Type::Primitive(PrimitiveType::UntypedBigDec),
            Some(Value::BigDec(d)),
        )
    }

    /// Whether this slot is fully undefined.
    pub fn is_undefined(&self) -> bool {
        self.t.is_none() && self.v.is_none() && self.n == [0; 8]
    }

    /// Whether this slot holds any defined value.
    pub fn is_defined(&self) -> bool {
        !self.is_undefined()
    }

    /// Whether this is an interface-typed slot holding nil.
    pub fn is_nil_interface(&self) -> bool {
        match &self.t {
            Some(t) if t.kind() == Kind::Interface => {
                debug_assert!(self.n == [0; 8], "nil interface with dirty scalar buffer");
                self.v.is_none()
            }
            _ => false,
        }
    }

    /// Runtime kind of the slot's type. Faults on undefined.
    pub fn kind(&self) -> Kind {
        match &self.t {
            Some(t) => t.kind(),
            None => fault!("kind() on undefined value"),
        }
    }

    /// Whether the slot's type has the given kind.
    pub fn has_kind(&self, k: Kind) -> bool {
        self.t.as_ref().is_some_and(|t| t.kind() == k)
    }

    fn check_kind(&self, k: Kind) {
        debug_assert!(
            self.has_kind(k),
            "scalar accessor kind mismatch: have {:?}, want {:?}",
            self.t,
            k
        );
    }

    /// Read the bool payload.
    pub fn get_bool(&self) -> bool {
        self.check_kind(Kind::Bool);
        self.n[0] != 0
    }

    /// Write the bool payload.
    pub fn set_bool(&mut self, b: bool) {
        self.check_kind(Kind::Bool);
        self.n = [0; 8];
        self.n[0] = b as u8;
    }

    /// Read the string payload as its raw bytes.
    pub fn get_string(&self) -> Rc<[u8]> {
        self.check_kind(Kind::String);
        match &self.v {
            Some(Value::Str(s)) => s.clone(),
            _ => fault!("string slot without string payload"),
        }
    }

    /// Read the int payload.
    pub fn get_int(&self) -> i64 {
        self.check_kind(Kind::Int);
        i64::from_le_bytes(self.n)
    }

    /// Write the int payload.
    pub fn set_int(&mut self, x: i64) {
        self.check_kind(Kind::Int);
        self.n = x.to_le_bytes();
    }

    /// Read the int8 payload.
    pub fn get_int8(&self) -> i8 {
        self.check_kind(Kind::Int8);
        self.n[0] as i8
    }

    /// Write the int8 payload.
    pub fn set_int8(&mut self, x: i8) {
        self.check_kind(Kind::Int8);
        self.n = [0; 8];
        self.n[0] = x as u8;
    }

    /// Read the int16 payload.
    pub fn get_int16(&self) -> i16 {
        self.check_kind(Kind::Int16);
        i16::from_le_bytes([self.n[0], self.n[1]])
    }

    /// Write the int16 payload.
    pub fn set_int16(&mut self, x: i16) {
        self.check_kind(Kind::Int16);
        self.n = [0; 8];
        self.n[..2].copy_from_slice(&x.to_le_bytes());
    }

    /// Read the int32 payload.
    pub fn get_int32(&self) -> i32 {
        self.check_kind(Kind::Int32);
        i32::from_le_bytes([self.n[0], self.n[1], self.n[2], self.n[3]])
    }

    /// Write the int32 payload.
    pub fn set_int32(&mut self, x: i32) {
        self.check_kind(Kind::Int32);
        self.n = [0; 8];
        self.n[..4].copy_from_slice(&x.to_le_bytes());
    }

    /// Read the int64 payload.
    pub fn get_int64(&self) -> i64 {
        self.check_kind(Kind::Int64);
        i64::from_le_bytes(self.n)
    }

    /// Write the int64 payload.
    pub fn set_int64(&mut self, x: i64) {
        self.check_kind(Kind::Int64);
        self.n = x.to_le_bytes();
    }

    /// Read the uint payload.
    pub fn get_uint(&self) -> u64 {
        self.check_kind(Kind::Uint);
        u64::from_le_bytes(self.n)
    }

    /// Write the uint payload.
    pub fn set_uint(&mut self, x: u64) {
        self.check_kind(Kind::Uint);
        self.n = x.to_le_bytes();
    }

    /// Read the uint8 payload, reading through a packed data byte.
    pub fn get_uint8(&self) -> u8 {
        if let Some(Value::DataByte(db)) = &self.v {
            return db.get();
        }
        self.check_kind(Kind::Uint8);
        self.n[0]
    }

    /// Write the uint8 payload, writing through a packed data byte.
    pub fn set_uint8(&mut self, x: u8) {
        if let Some(Value::DataByte(db)) = &self.v {
            db.set(x);
            return;
        }
        self.check_kind(Kind::Uint8);
        self.n = [0; 8];
        self.n[0] = x;
    }

    /// Read the uint16 payload.
    pub fn get_uint16(&self) -> u16 {
        self.check_kind(Kind::Uint16);
        u16::from_le_bytes([self.n[0], self.n[1]])
    }

    /// Write the uint16 payload.
    pub fn set_uint16(&mut self, x: u16) {
        self.check_kind(Kind::Uint16);
        self.n = [0; 8];
        self.n[..2].copy_from_slice(&x.to_le_bytes());
    }

    /// Read the uint32 payload.
    pub fn get_uint32(&self) -> u32 {
        self.check_kind(Kind::Uint32);
        u32::from_le_bytes([self.n[0], self.n[1], self.n[2], self.n[3]])
    }

    /// Write the uint32 payload.
    pub fn set_uint32(&mut self, x: u32) {
        self.check_kind(Kind::Uint32);
        self.n = [0; 8];
        self.n[..4].copy_from_slice(&x.to_le_bytes());
    }

    /// Read the uint64 payload.
    pub fn get_uint64(&self) -> u64 {
        self.check_kind(Kind::Uint64);
        u64::from_le_bytes(self.n)
    }

    /// Write the uint64 payload.
    pub fn set_uint64(&mut self, x: u64) {
        self.check_kind(Kind::Uint64);
        self.n = x.to_le_bytes();
    }

    /// Read the float32 payload.
    pub fn get_float32(&self) -> f32 {
        self.check_kind(Kind::Float32);
        f32::from_le_bytes([self.n[0], self.n[1], self.n[2], self.n[3]])
    }

    /// Write the float32 payload.
    pub fn set_float32(&mut self, x: f32) {
        self.check_kind(Kind::Float32);
        self.n = [0; 8];
        self.n[..4].copy_from_slice(&x.to_le_bytes());
    }

    /// Read the float64 payload.
    pub fn get_float64(&self) -> f64 {
        self.check_kind(Kind::Float64);
        f64::from_le_bytes(self.n)
    }

    /// Write the float64 payload.
    pub fn set_float64(&mut self, x: f64) {
        self.check_kind(Kind::Float64);
        self.n = x.to_le_bytes();
    }

    /// Read the big-integer payload.
    pub fn get_bigint(&self) -> Rc<BigInt> {
        self.check_kind(Kind::BigInt);
        match &self.v {
            Some(Value::BigInt(b)) => b.clone(),
            _ => fault!("bigint slot without bigint payload"),
        }
    }

    /// Read the big-decimal payload.
    pub fn get_bigdec(&self) -> Decimal {
        self.check_kind(Kind::BigDec);
        match &self.v {
            Some(Value::BigDec(d)) => *d,
            _ => fault!("bigdec slot without bigdec payload"),
        }
    }

    pub(crate) fn take_bigint(&mut self) -> Rc<BigInt> {
        match self.v.take() {
            Some(Value::BigInt(b)) => b,
            other => fault!("expected bigint payload, found {:?}", other),
        }
    }

    pub(crate) fn take_bigdec(&mut self) -> Decimal {
        match self.v.take() {
            Some(Value::BigDec(d)) => d,
            other => fault!("expected bigdec payload, found {:?}", other),
        }
    }

    /// The function payload.
    pub fn get_func(&self) -> Rc<FuncValue> {
        match &self.v {
            Some(Value::Func(fv)) => fv.clone(),
            _ => fault!("func slot without func payload"),
        }
    }

    /// The function payload, if any.
    pub fn func_value(&self) -> Option<Rc<FuncValue>> {
        match &self.v {
            Some(Value::Func(fv)) => Some(fv.clone()),
            _ => None,
        }
    }

    /// The type payload of a type-valued slot.
    pub fn get_type_value(&self) -> Type {
        match &self.v {
            Some(Value::Type(t)) => t.clone(),
            _ => fault!("type slot without type payload"),
        }
    }

    /// Widen any integer-kinded slot to `i64`, for use as an index.
    pub fn as_index(&self) -> i64 {
        match self.kind() {
            Kind::Int | Kind::Int64 => i64::from_le_bytes(self.n),
            Kind::Int8 => self.get_int8() as i64,
            Kind::Int16 => self.get_int16() as i64,
            Kind::Int32 => self.get_int32() as i64,
            Kind::Uint | Kind::Uint64 => match i64::try_from(u64::from_le_bytes(self.n)) {
                Ok(n) => n,
                Err(_) => fault!(
                    "index {} overflows int",
                    u64::from_le_bytes(self.n)
                ),
            },
            Kind::Uint8 => self.get_uint8() as i64,
            Kind::Uint16 => self.get_uint16() as i64,
            Kind::Uint32 => self.get_uint32() as i64,
            Kind::BigInt => match i64::try_from(&*self.get_bigint()) {
                Ok(n) => n,
                Err(_) => fault!("index constant overflows int"),
            },
            k => fault!("non-integer index kind {:?}", k),
        }
    }

    /// Arithmetic sign of a numeric slot: -1, 0, or 1.
    pub fn sign(&self) -> i8 {
        match self.kind() {
            Kind::Int | Kind::Int8 | Kind::Int16 | Kind::Int32 | Kind::Int64 => {
                let x = match self.kind() {
                    Kind::Int8 => self.get_int8() as i64,
                    Kind::Int16 => self.get_int16() as i64,
                    Kind::Int32 => self.get_int32() as i64,
                    _ => i64::from_le_bytes(self.n),
                };
                x.signum() as i8
            }
            Kind::Uint | Kind::Uint8 | Kind::Uint16 | Kind::Uint32 | Kind::Uint64 => {
                (u64::from_le_bytes(self.n) != 0) as i8
            }
            Kind::Float32 => {
                let x = self.get_float32();
                if x > 0.0 { 1 } else if x < 0.0 { -1 } else { 0 }
            }
            Kind::Float64 => {
                let x = self.get_float64();
                if x > 0.0 { 1 } else if x < 0.0 { -1 } else { 0 }
            }
            Kind::BigInt => match self.get_bigint().sign() {
                num_bigint::Sign::Minus => -1,
                num_bigint::Sign::NoSign => 0,
                num_bigint::Sign::Plus => 1,
            },
            Kind::BigDec => {
                let d = self.get_bigdec();
                if d.is_sign_negative() && !d.is_zero() { -1 } else if d.is_zero() { 0 } else { 1 }
            }
            k => fault!("sign() on non-numeric kind {:?}", k),
        }
    }

    /// Number of elements (string bytes, array/slice elements, map
    /// entries). Nil slices and maps have length zero.
    pub fn get_length(&self) -> usize {
        match &self.v {
            Some(Value::Str(s)) => s.len(),
            Some(Value::Array(a)) => a.borrow().len(),
            Some(Value::Slice(s)) => s.borrow().length,
            Some(Value::Map(m)) => m.borrow().len(),
            None => match self.kind() {
                Kind::Slice | Kind::Map | Kind::String => 0,
                k => fault!("length of nil non-composite kind {:?}", k),
            },
            Some(v) => fault!("length of non-sequence value {}", v),
        }
    }

    /// Capacity: string/array length, slice max-capacity.
    pub fn get_capacity(&self) -> usize {
        match &self.v {
            Some(Value::Str(s)) => s.len(),
            Some(Value::Array(a)) => a.borrow().len(),
            Some(Value::Slice(s)) => s.borrow().maxcap,
            None => match self.kind() {
                Kind::Slice | Kind::String => 0,
                k => fault!("capacity of nil non-composite kind {:?}", k),
            },
            Some(v) => fault!("capacity of non-sequence value {}", v),
        }
    }

    /// Copy with by-value semantics: deep for array and struct payloads,
    /// handle copy for everything else (slice, map, pointer, string, func
    /// backing storage is not owned by the slot).
    pub fn copy(&self) -> TypedValue {
        match &self.v {
            Some(Value::Array(a)) => TypedValue {
                t: self.t.clone(),
                v: Some(Value::Array(a.borrow().copy())),
                n: self.n,
            },
            Some(Value::Struct(s)) => TypedValue {
                t: self.t.clone(),
                v: Some(Value::Struct(s.borrow().copy())),
                n: self.n,
            },
            _ => self.clone(),
        }
    }

    /// Like [`copy`](Self::copy), but a placeholder payload is resolved
    /// through the store first so the copy is of the live object.
    pub fn unref_copy(&self, store: &dyn crate::store::Store) -> TypedValue {
        match &self.v {
            Some(Value::Ref(r)) => {
                let resolved = TypedValue {
                    t: self.t.clone(),
                    v: Some(r.resolve(store)),
                    n: self.n,
                };
                resolved.copy()
            }
            _ => self.copy(),
        }
    }

    /// Overwrite this slot with a copy of `tv2`. When `cu` is set and the
    /// source is an untyped constant, coerce to its default concrete type.
    pub fn assign(&mut self, tv2: &TypedValue, cu: bool) {
        *self = tv2.copy();
        if cu {
            convert_untyped(self);
        }
    }

    /// Fixed-width little-endian scalar encoding (raw bytes for strings,
    /// decimal text for arbitrary-precision numerics). Consensus-visible
    /// through map keys; must not change across releases.
    pub fn primitive_bytes(&self) -> Vec<u8> {
        match self.kind() {
            Kind::Bool => vec![self.get_bool() as u8],
            Kind::String => self.get_string().to_vec(),
            Kind::Int | Kind::Int64 | Kind::Uint | Kind::Uint64 => self.n.to_vec(),
            Kind::Int8 | Kind::Uint8 => vec![self.get_uint8_raw()],
            Kind::Int16 | Kind::Uint16 => self.n[..2].to_vec(),
            Kind::Int32 | Kind::Uint32 | Kind::Float32 => self.n[..4].to_vec(),
            Kind::Float64 => self.n.to_vec(),
            Kind::BigInt => self.get_bigint().to_string().into_bytes(),
            Kind::BigDec => self.get_bigdec().to_string().into_bytes(),
            k => fault!("primitive bytes of non-primitive kind {:?}", k),
        }
    }

    fn get_uint8_raw(&self) -> u8 {
        if let Some(Value::DataByte(db)) = &self.v {
            db.get()
        } else {
            self.n[0]
        }
    }

    /// Slice expression `self[low:high]`. Aliases the operand's backing
    /// storage; elements are never copied.
    pub fn get_slice(&self, low: i64, high: i64) -> Result<TypedValue> {
        if low < 0 {
            return Err(Exception::NegativeIndex { index: low });
        }
        if high < low {
            return Err(Exception::InvertedSliceIndices { low, high });
        }
        if self.has_kind(Kind::String) {
            let s = self.get_string();
            if high as usize > s.len() {
                return Err(Exception::SliceOutOfBounds { low, high, cap: s.len() });
            }
            return Ok(TypedValue::with_value(
                self.t.clone().unwrap_or(Type::Primitive(PrimitiveType::String)),
                Some(Value::Str(Rc::from(&s[low as usize..high as usize]))),
            ));
        }
        let cap = self.get_capacity();
        if high as usize > cap {
            return Err(Exception::SliceOutOfBounds { low, high, cap });
        }
        let (low, high) = (low as usize, high as usize);
        match &self.v {
            Some(Value::Array(a)) => {
                let elem = self.slice_elem_type();
                Ok(TypedValue::with_value(
                    Type::slice_of(elem),
                    Some(Value::Slice(SliceRef::new(SliceValue::over(
                        a.clone(),
                        low,
                        high - low,
                        cap - low,
                    )))),
                ))
            }
            Some(Value::Slice(s)) => {
                let sv = s.borrow();
                Ok(TypedValue::with_value(
                    self.t.clone().unwrap_or_else(|| Type::slice_of(self.slice_elem_type())),
                    Some(Value::Slice(SliceRef::new(sv.reslice(low, high - low, cap - low)))),
                ))
            }
            None => {
                // Nil slice: only the empty slice of it exists.
                debug_assert!(low == 0 && high == 0);
                Ok(self.clone())
            }
            Some(v) => fault!("slice expression over non-sliceable value {}", v),
        }
    }

    /// Three-index slice expression `self[low:high:max]`, capping the
    /// result's capacity at `max - low`.
    pub fn get_slice2(&self, low: i64, high: i64, max: i64) -> Result<TypedValue> {
        if low < 0 {
            return Err(Exception::NegativeIndex { index: low });
        }
        if high < low {
            return Err(Exception::InvertedSliceIndices { low, high });
        }
        if max < high {
            return Err(Exception::InvertedSliceIndices { low: high, high: max });
        }
        let cap = self.get_capacity();
        if max as usize > cap {
            return Err(Exception::SliceOutOfBounds { low, high: max, cap });
        }
        let (low, high, max) = (low as usize, high as usize, max as usize);
        match &self.v {
            Some(Value::Array(a)) => {
                let elem = self.slice_elem_type();
                Ok(TypedValue::with_value(
                    Type::slice_of(elem),
                    Some(Value::Slice(SliceRef::new(SliceValue::over(
                        a.clone(),
                        low,
                        high - low,
                        max - low,
                    )))),
                ))
            }
            Some(Value::Slice(s)) => {
                let sv = s.borrow();
                Ok(TypedValue::with_value(
                    self.t.clone().unwrap_or_else(|| Type::slice_of(self.slice_elem_type())),
                    Some(Value::Slice(SliceRef::new(sv.reslice(low, high - low, max - low)))),
                ))
            }
            None => {
                debug_assert!(low == 0 && high == 0 && max == 0);
                Ok(self.clone())
            }
            Some(v) => fault!("slice expression over non-sliceable value {}", v),
        }
    }

    fn slice_elem_type(&self) -> Type {
        match &self.t {
            Some(t) => t.elem(),
            None => fault!("slice expression over untyped operand"),
        }
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_undefined() {
            return write!(f, "undefined");
        }
        match self.kind() {
            Kind::Bool => write!(f, "{}", self.get_bool()),
            Kind::Int => write!(f, "{}", self.get_int()),
            Kind::Int8 => write!(f, "{}", self.get_int8()),
            Kind::Int16 => write!(f, "{}", self.get_int16()),
            Kind::Int32 => write!(f, "{}", self.get_int32()),
            Kind::Int64 => write!(f, "{}", self.get_int64()),
            Kind::Uint => write!(f, "{}", self.get_uint()),
            Kind::Uint8 => write!(f, "{}", self.get_uint8()),
            Kind::Uint16 => write!(f, "{}", self.get_uint16()),
            Kind::Uint32 => write!(f, "{}", self.get_uint32()),
            Kind::Uint64 => write!(f, "{}", self.get_uint64()),
            Kind::Float32 => write!(f, "{}", self.get_float32()),
            Kind::Float64 => write!(f, "{}", self.get_float64()),
            _ => match &self.v {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "nil"),
            },
        }
    }
}
