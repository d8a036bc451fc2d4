//! Ordered map determinism and key canonicalization.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use sylva::*;

fn str_type() -> Type {
    Type::Primitive(PrimitiveType::String)
}

fn int_type() -> Type {
    Type::Primitive(PrimitiveType::Int)
}

fn str_int_map() -> (TypedValue, MapRef) {
    let m = MapValue::make(0);
    let tv = TypedValue::with_value(Type::map_of(str_type(), int_type()), Some(Value::Map(m.clone())));
    (tv, m)
}

fn set(store: &dyn Store, m: &TypedValue, k: &str, v: i64) {
    m.get_pointer_at_index(store, &TypedValue::string_value(k))
        .unwrap()
        .assign2(store, &TypedValue::int_value(v), false)
        .unwrap();
}

fn keys_of(m: &MapRef) -> Vec<String> {
    m.borrow()
        .keys()
        .iter()
        .map(|k| String::from_utf8_lossy(&k.get_string()).into_owned())
        .collect()
}

#[test]
fn test_insertion_order_iteration() {
    let store = NullStore;
    let (tv, m) = str_int_map();
    for (i, k) in ["x", "y", "z"].iter().enumerate() {
        set(&store, &tv, k, i as i64);
    }
    assert_eq!(keys_of(&m), vec!["x", "y", "z"]);
    let values: Vec<i64> = m.borrow().entries().iter().map(|(_, v)| v.get_int()).collect();
    assert_eq!(values, vec![0, 1, 2]);
}

#[test]
fn test_delete_then_reinsert_appends_at_tail() {
    let store = NullStore;
    let (tv, m) = str_int_map();
    set(&store, &tv, "a", 1);
    set(&store, &tv, "b", 2);
    assert!(m.delete_for_key(&store, &TypedValue::string_value("a")));
    set(&store, &tv, "a", 3);

    assert_eq!(keys_of(&m), vec!["b", "a"]);
    let values: Vec<i64> = m.borrow().entries().iter().map(|(_, v)| v.get_int()).collect();
    assert_eq!(values, vec![2, 3]);
    assert_eq!(tv.get_length(), 2);
}

#[test]
fn test_delete_preserves_surrounding_order() {
    let store = NullStore;
    let (tv, m) = str_int_map();
    for k in ["a", "b", "c", "d"] {
        set(&store, &tv, k, 0);
    }
    m.delete_for_key(&store, &TypedValue::string_value("b"));
    m.delete_for_key(&store, &TypedValue::string_value("d"));
    assert_eq!(keys_of(&m), vec!["a", "c"]);

    // Freed arena slots are recycled without disturbing order.
    set(&store, &tv, "e", 0);
    set(&store, &tv, "f", 0);
    assert_eq!(keys_of(&m), vec!["a", "c", "e", "f"]);
}

#[test]
fn test_get_value_for_key() {
    let store = NullStore;
    let (tv, m) = str_int_map();
    set(&store, &tv, "k", 7);
    let got = m
        .get_value_for_key(&store, &TypedValue::string_value("k"))
        .unwrap();
    assert_eq!(got.get_int(), 7);
    assert!(m
        .get_value_for_key(&store, &TypedValue::string_value("nope"))
        .is_none());
    assert!(!m.delete_for_key(&store, &TypedValue::string_value("nope")));
}

#[test]
fn test_missing_key_initialized_to_zero_value() {
    let store = NullStore;
    let (tv, m) = str_int_map();

    // Reading through the pointer of an absent key sees the declared
    // value type's zero value.
    let p = tv
        .get_pointer_at_index(&store, &TypedValue::string_value("fresh"))
        .unwrap();
    assert_eq!(p.deref(&store).get_int(), 0);
    assert_eq!(m.borrow().len(), 1);

    // Interface-valued maps leave fresh slots undefined.
    let iface = Type::Interface(Rc::new(InterfaceType { methods: vec![] }));
    let mi = MapValue::make(0);
    let tvi = TypedValue::with_value(
        Type::map_of(str_type(), iface),
        Some(Value::Map(mi.clone())),
    );
    let p = tvi
        .get_pointer_at_index(&store, &TypedValue::string_value("fresh"))
        .unwrap();
    assert!(p.deref(&store).is_undefined());
}

#[test]
fn test_uninitialized_map_index() {
    let store = NullStore;
    let nil = TypedValue::with_value(Type::map_of(str_type(), int_type()), None);
    assert_eq!(nil.get_length(), 0);
    assert_eq!(
        nil.get_pointer_at_index(&store, &TypedValue::string_value("k"))
            .unwrap_err(),
        Exception::UninitializedMap
    );
}

#[test]
fn test_key_bytes_equal_for_equal_values() {
    let store = NullStore;
    let a = TypedValue::string_value("abc");
    let b = TypedValue::string_value("abc");
    assert_eq!(a.compute_map_key(&store, false), b.compute_map_key(&store, false));
    assert_ne!(
        a.compute_map_key(&store, false),
        TypedValue::string_value("abd").compute_map_key(&store, false)
    );
}

#[test]
fn test_key_type_prefix_discriminates_dynamic_types() {
    let store = NullStore;
    // Same little-endian payload bytes, different dynamic type.
    let mut i64v = TypedValue::with_value(Type::Primitive(PrimitiveType::Int64), None);
    i64v.set_int64(7);
    let mut u64v = TypedValue::with_value(Type::Primitive(PrimitiveType::Uint64), None);
    u64v.set_uint64(7);

    // With the tag omitted (static type pins the kind) the bytes agree;
    // inside an interface-typed slot the tag keeps them apart.
    assert_eq!(
        i64v.compute_map_key(&store, true),
        u64v.compute_map_key(&store, true)
    );
    assert_ne!(
        i64v.compute_map_key(&store, false),
        u64v.compute_map_key(&store, false)
    );
}

#[test]
fn test_composite_key_encoding() {
    let store = NullStore;
    let arr = {
        let a = ArrayValue::new_list(vec![TypedValue::int_value(1), TypedValue::int_value(2)]);
        TypedValue::with_value(Type::array_of(int_type(), 2), Some(Value::Array(a)))
    };
    let same = {
        let a = ArrayValue::new_list(vec![TypedValue::int_value(1), TypedValue::int_value(2)]);
        TypedValue::with_value(Type::array_of(int_type(), 2), Some(Value::Array(a)))
    };
    // Structurally equal arrays of the same static type key identically
    // even though the handles differ.
    assert_eq!(
        arr.compute_map_key(&store, false),
        same.compute_map_key(&store, false)
    );

    let bytes = arr.compute_map_key(&store, true);
    assert_eq!(bytes.bytes()[0], b'[');
    assert_eq!(*bytes.bytes().last().unwrap(), b']');
}

#[test]
fn test_pointer_keys_use_slot_identity() {
    let store = NullStore;
    let sv = StructValue::new(vec![TypedValue::int_value(1), TypedValue::int_value(2)]);
    let pt = Type::pointer_to(int_type());

    let p0 = TypedValue::with_value(pt.clone(), Some(Value::Pointer(sv.field_pointer(0))));
    let p0b = TypedValue::with_value(pt.clone(), Some(Value::Pointer(sv.field_pointer(0))));
    let p1 = TypedValue::with_value(pt, Some(Value::Pointer(sv.field_pointer(1))));

    assert_eq!(
        p0.compute_map_key(&store, false),
        p0b.compute_map_key(&store, false)
    );
    assert_ne!(
        p0.compute_map_key(&store, false),
        p1.compute_map_key(&store, false)
    );
}

#[test]
fn test_struct_keys() {
    let store = NullStore;
    let st = Type::Struct(Rc::new(StructType {
        fields: vec![
            FieldType { name: "x".into(), typ: int_type(), embedded: false },
            FieldType { name: "y".into(), typ: int_type(), embedded: false },
        ],
    }));
    let make = |x: i64, y: i64| {
        TypedValue::with_value(
            st.clone(),
            Some(Value::Struct(StructValue::new(vec![
                TypedValue::int_value(x),
                TypedValue::int_value(y),
            ]))),
        )
    };

    let m = MapValue::make(0);
    let tv = TypedValue::with_value(Type::map_of(st.clone(), int_type()), Some(Value::Map(m.clone())));
    tv.get_pointer_at_index(&store, &make(1, 2))
        .unwrap()
        .assign2(&store, &TypedValue::int_value(10), false)
        .unwrap();

    // A structurally equal struct finds the same entry.
    let got = m.get_value_for_key(&store, &make(1, 2)).unwrap();
    assert_eq!(got.get_int(), 10);
    assert!(m.get_value_for_key(&store, &make(2, 1)).is_none());
}

#[test]
fn test_data_array_keys_use_raw_bytes() {
    let store = NullStore;
    let u8t = Type::Primitive(PrimitiveType::Uint8);
    // 0x2C is ',' itself: the packed form carries no separators, so the
    // byte passes through untouched.
    let a = ArrayValue::new_data(vec![1, 0x2C, 3]);
    let tv = TypedValue::with_value(Type::array_of(u8t, 3), Some(Value::Array(a)));

    let key = tv.compute_map_key(&store, true);
    assert_eq!(key.bytes(), &[b'[', 1, 0x2C, 3, b']']);
}

#[test]
fn test_keys_hydrate_placeholder_payloads() {
    let store = MemStore::new();
    let inner_st = Type::Struct(Rc::new(StructType {
        fields: vec![FieldType { name: "x".into(), typ: int_type(), embedded: false }],
    }));
    let outer_st = Type::Struct(Rc::new(StructType {
        fields: vec![FieldType { name: "inner".into(), typ: inner_st.clone(), embedded: false }],
    }));

    let live = StructValue::new(vec![TypedValue::int_value(7)]);
    store.set_object(ObjectId(40), Value::Struct(live.clone()));

    // One key holds the live struct, the other a persisted placeholder
    // for the same object; both must encode to the same bytes.
    let lazy = TypedValue::with_value(
        outer_st.clone(),
        Some(Value::Struct(StructValue::new(vec![TypedValue::with_value(
            inner_st.clone(),
            Some(Value::Ref(RefValue::object(ObjectId(40)))),
        )]))),
    );
    let direct = TypedValue::with_value(
        outer_st,
        Some(Value::Struct(StructValue::new(vec![TypedValue::with_value(
            inner_st,
            Some(Value::Struct(live)),
        )]))),
    );

    assert_eq!(
        lazy.compute_map_key(&store, false),
        direct.compute_map_key(&store, false)
    );
}

#[test]
fn test_package_keys_encode_quoted_path() {
    let store = NullStore;
    let blk = Block::new(
        ScopeNode::new(NodeLocation::new("demo/math", "math.sy", (1, 1)), vec![]),
        None,
    );
    let pv = PackageValue::new("math", "demo/math", blk);
    let tv = TypedValue::with_value(Type::Package, Some(Value::Package(pv)));

    let key = tv.compute_map_key(&store, true);
    assert_eq!(key.bytes(), b"\"demo/math\"");
}
