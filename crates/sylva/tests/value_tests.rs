//! TypedValue core: scalar accessors, copy semantics, slicing.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use sylva::*;

fn int_type() -> Type {
    Type::Primitive(PrimitiveType::Int)
}

fn int_array(vals: &[i64]) -> TypedValue {
    let list = vals.iter().map(|&n| TypedValue::int_value(n)).collect();
    let a = ArrayValue::new_list(list);
    TypedValue::with_value(
        Type::array_of(int_type(), vals.len()),
        Some(Value::Array(a)),
    )
}

fn elem_at(store: &dyn Store, tv: &TypedValue, i: i64) -> TypedValue {
    tv.get_pointer_at_index(store, &TypedValue::int_value(i))
        .unwrap()
        .deref(store)
}

#[test]
fn test_undefined_and_nil_interface() {
    let und = TypedValue::undefined();
    assert!(und.is_undefined());
    assert!(!und.is_defined());

    let iface = Type::Interface(Rc::new(InterfaceType { methods: vec![] }));
    let nil_iface = TypedValue::with_value(iface, None);
    assert!(nil_iface.is_nil_interface());
    assert!(nil_iface.is_defined());
    assert!(!TypedValue::int_value(0).is_nil_interface());
}

#[test]
fn test_scalar_roundtrips() {
    let mut tv = TypedValue::with_value(Type::Primitive(PrimitiveType::Int16), None);
    tv.set_int16(-300);
    assert_eq!(tv.get_int16(), -300);

    let mut tv = TypedValue::with_value(Type::Primitive(PrimitiveType::Uint32), None);
    tv.set_uint32(0xdead_beef);
    assert_eq!(tv.get_uint32(), 0xdead_beef);

    let mut tv = TypedValue::float64_value(0.0);
    tv.set_float64(-2.5);
    assert_eq!(tv.get_float64(), -2.5);

    assert_eq!(TypedValue::int_value(-1).get_int(), -1);
    assert_eq!(TypedValue::bool_value(true).get_bool(), true);
    assert_eq!(&*TypedValue::string_value("hi").get_string(), b"hi");
}

#[test]
fn test_sign() {
    assert_eq!(TypedValue::int_value(-7).sign(), -1);
    assert_eq!(TypedValue::int_value(0).sign(), 0);
    assert_eq!(TypedValue::int_value(7).sign(), 1);
    assert_eq!(TypedValue::float64_value(-0.5).sign(), -1);
    assert_eq!(TypedValue::bigint_value((-3).into()).sign(), -1);
}

#[test]
fn test_copy_idempotence() {
    let v = int_array(&[1, 2, 3]);
    let c1 = v.copy();
    let c2 = c1.copy();
    assert_eq!(c1, c2);
    assert_eq!(v, c1);
}

#[test]
fn test_copy_depth_array() {
    let store = NullStore;
    let v = int_array(&[1, 2, 3]);
    let c = v.copy();

    // Mutating the copy's element leaves the source untouched.
    c.get_pointer_at_index(&store, &TypedValue::int_value(0))
        .unwrap()
        .assign2(&store, &TypedValue::int_value(99), false)
        .unwrap();
    assert_eq!(elem_at(&store, &c, 0).get_int(), 99);
    assert_eq!(elem_at(&store, &v, 0).get_int(), 1);
}

#[test]
fn test_copy_depth_struct_fields() {
    let store = NullStore;
    let st = Type::Struct(Rc::new(StructType {
        fields: vec![FieldType {
            name: "xs".into(),
            typ: Type::array_of(int_type(), 2),
            embedded: false,
        }],
    }));
    let sv = StructValue::new(vec![int_array(&[10, 20])]);
    let v = TypedValue::with_value(st, Some(Value::Struct(sv.clone())));

    let c = v.copy();
    let Some(Value::Struct(cs)) = &c.v else {
        panic!("struct copy lost its payload");
    };
    cs.field_pointer(0)
        .deref(&store)
        .get_pointer_at_index(&store, &TypedValue::int_value(1))
        .unwrap()
        .assign2(&store, &TypedValue::int_value(-1), false)
        .unwrap();

    // Field arrays were copied per field.
    assert_eq!(elem_at(&store, &sv.borrow().fields[0], 1).get_int(), 20);
}

#[test]
fn test_copy_shares_slice_storage() {
    let store = NullStore;
    let arr = int_array(&[1, 2, 3, 4, 5]);
    let sl = arr.get_slice(0, 5).unwrap();

    // Slice copy is a handle copy; writes through it reach the shared
    // backing array.
    let c = sl.copy();
    c.get_pointer_at_index(&store, &TypedValue::int_value(2))
        .unwrap()
        .assign2(&store, &TypedValue::int_value(42), false)
        .unwrap();
    assert_eq!(elem_at(&store, &arr, 2).get_int(), 42);
}

#[test]
fn test_slice_aliasing_overlap() {
    let store = NullStore;
    let arr = int_array(&[0, 1, 2, 3, 4]);
    let s1 = arr.get_slice(1, 3).unwrap();
    let s2 = arr.get_slice(2, 4).unwrap();

    // s1[1] and s2[0] are both backing index 2.
    s1.get_pointer_at_index(&store, &TypedValue::int_value(1))
        .unwrap()
        .assign2(&store, &TypedValue::int_value(77), false)
        .unwrap();
    assert_eq!(elem_at(&store, &s2, 0).get_int(), 77);
}

#[test]
fn test_slice_geometry_and_reslice() {
    let arr = int_array(&[0, 1, 2, 3, 4]);
    let sl = arr.get_slice(1, 3).unwrap();
    assert_eq!(sl.get_length(), 2);
    assert_eq!(sl.get_capacity(), 4);

    // Reslicing past the length but within capacity is allowed.
    let wide = sl.get_slice(0, 4).unwrap();
    assert_eq!(wide.get_length(), 4);

    let three = arr.get_slice2(1, 2, 3).unwrap();
    assert_eq!(three.get_length(), 1);
    assert_eq!(three.get_capacity(), 2);
}

#[test]
fn test_index_bounds_payloads() {
    let store = NullStore;
    let arr = int_array(&[0, 1, 2, 3, 4]);
    let sl = arr.get_slice(1, 3).unwrap();

    let err = sl
        .get_pointer_at_index(&store, &TypedValue::int_value(2))
        .unwrap_err();
    assert_eq!(err, Exception::IndexOutOfBounds { index: 2, length: 2 });

    let err = sl
        .get_pointer_at_index(&store, &TypedValue::int_value(-1))
        .unwrap_err();
    assert_eq!(err, Exception::NegativeIndex { index: -1 });
}

#[test]
fn test_slice_bounds_payloads() {
    let arr = int_array(&[0, 1, 2]);
    assert_eq!(
        arr.get_slice(2, 1).unwrap_err(),
        Exception::InvertedSliceIndices { low: 2, high: 1 }
    );
    assert_eq!(
        arr.get_slice(0, 4).unwrap_err(),
        Exception::SliceOutOfBounds { low: 0, high: 4, cap: 3 }
    );
    assert_eq!(
        arr.get_slice2(0, 1, 5).unwrap_err(),
        Exception::SliceOutOfBounds { low: 0, high: 5, cap: 3 }
    );
}

#[test]
fn test_nil_slice() {
    let store = NullStore;
    let nil = TypedValue::with_value(Type::slice_of(int_type()), None);
    assert_eq!(nil.get_length(), 0);
    assert_eq!(nil.get_capacity(), 0);
    assert_eq!(
        nil.get_pointer_at_index(&store, &TypedValue::int_value(0))
            .unwrap_err(),
        Exception::NilSliceIndex
    );
    // The empty slice of a nil slice is still nil.
    assert_eq!(nil.get_slice(0, 0).unwrap(), nil);
    assert_eq!(
        nil.get_slice(0, 1).unwrap_err(),
        Exception::SliceOutOfBounds { low: 0, high: 1, cap: 0 }
    );
}

#[test]
fn test_string_index_and_slice() {
    let store = NullStore;
    let s = TypedValue::string_value("hello");
    assert_eq!(s.get_length(), 5);

    // String bytes come back as free-floating scalars.
    let b = s
        .get_pointer_at_index(&store, &TypedValue::int_value(1))
        .unwrap()
        .deref(&store);
    assert_eq!(b.get_uint8(), b'e');

    let sub = s.get_slice(1, 3).unwrap();
    assert_eq!(&*sub.get_string(), b"el");

    assert_eq!(
        s.get_pointer_at_index(&store, &TypedValue::int_value(5))
            .unwrap_err(),
        Exception::IndexOutOfBounds { index: 5, length: 5 }
    );
}

#[test]
#[should_panic(expected = "index 18446744073709551615 overflows int")]
fn test_huge_uint_index_faults_with_magnitude() {
    let mut tv = TypedValue::with_value(Type::Primitive(PrimitiveType::Uint64), None);
    tv.set_uint64(u64::MAX);
    tv.as_index();
}

#[test]
fn test_string_slice_is_byte_wise() {
    let store = NullStore;
    let s = TypedValue::string_value("héllo");
    assert_eq!(s.get_length(), 6);

    // Offsets inside the two-byte 'é' are valid; strings slice by byte.
    let sub = s.get_slice(0, 2).unwrap();
    assert_eq!(&*sub.get_string(), &[b'h', 0xc3][..]);
    assert_eq!(sub.get_length(), 2);

    let b = s
        .get_pointer_at_index(&store, &TypedValue::int_value(2))
        .unwrap()
        .deref(&store);
    assert_eq!(b.get_uint8(), 0xa9);
}

#[test]
fn test_data_array_packed_bytes() {
    let store = NullStore;
    let u8t = Type::Primitive(PrimitiveType::Uint8);
    let a = ArrayValue::new_data(vec![1, 2, 3]);
    let tv = TypedValue::with_value(Type::array_of(u8t, 3), Some(Value::Array(a.clone())));

    // Deref materializes an aliasing data byte.
    let p = tv
        .get_pointer_at_index(&store, &TypedValue::int_value(1))
        .unwrap();
    assert_eq!(p.deref(&store).get_uint8(), 2);

    // Writes land in the packed buffer, with no ownership delta.
    let delta = p.assign2(&store, &TypedValue::uint8_value(9), false).unwrap();
    assert!(delta.is_none());
    assert_eq!(a.borrow().readonly_bytes(), &[1, 9, 3]);
}

#[test]
fn test_data_byte_deref_aliases_backing_buffer() {
    let store = NullStore;
    let u8t = Type::Primitive(PrimitiveType::Uint8);
    let a = ArrayValue::new_data(vec![10, 20, 30]);
    let tv = TypedValue::with_value(Type::array_of(u8t, 3), Some(Value::Array(a.clone())));

    let mut b = tv
        .get_pointer_at_index(&store, &TypedValue::int_value(0))
        .unwrap()
        .deref(&store);
    assert!(matches!(b.v, Some(Value::DataByte(_))));
    assert_eq!(b.kind(), Kind::Uint8);

    // Scalar writes on the materialized byte reach the array.
    b.set_uint8(0xFF);
    assert_eq!(a.borrow().readonly_bytes(), &[0xFF, 20, 30]);

    // And later buffer writes are visible through it.
    a.borrow_mut().set_byte_at(0, 7);
    assert_eq!(b.get_uint8(), 7);
}

#[test]
fn test_zero_values() {
    let arr_t = Type::array_of(int_type(), 3);
    let zero = default_typed_value(&arr_t);
    assert_eq!(zero.get_length(), 3);

    let byte_arr_t = Type::array_of(Type::Primitive(PrimitiveType::Uint8), 2);
    let zero = default_typed_value(&byte_arr_t);
    let Some(Value::Array(a)) = &zero.v else {
        panic!("zero array missing payload");
    };
    assert!(a.borrow().is_data());

    let iface = Type::Interface(Rc::new(InterfaceType { methods: vec![] }));
    assert!(default_typed_value(&iface).is_undefined());

    assert!(default_typed_value(&Type::slice_of(int_type())).v.is_none());
}

#[test]
fn test_assign_converts_untyped() {
    let slot = SlotRef::new(TypedValue::undefined());
    let p = PointerValue::free_slot(slot.clone());
    let store = NullStore;

    p.assign2(&store, &TypedValue::bigint_value(41.into()), true)
        .unwrap();
    let got = slot.borrow().clone();
    assert_eq!(got.t, Some(Type::Primitive(PrimitiveType::Int)));
    assert_eq!(got.get_int(), 41);

    // Without conversion the constant stays untyped.
    p.assign2(&store, &TypedValue::bigint_value(41.into()), false)
        .unwrap();
    let got = slot.borrow().clone();
    assert_eq!(got.t, Some(Type::Primitive(PrimitiveType::UntypedBigInt)));
}

#[test]
fn test_display() {
    assert_eq!(TypedValue::int_value(3).to_string(), "3");
    assert_eq!(TypedValue::undefined().to_string(), "undefined");
    assert_eq!(int_array(&[1, 2]).to_string(), "array[1,2]");
}
