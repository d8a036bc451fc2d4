//! Lazy hydration: placeholder resolution, memoization, deep fill.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use sylva::*;

fn int_type() -> Type {
    Type::Primitive(PrimitiveType::Int)
}

fn node(names: &[&str]) -> Rc<ScopeNode> {
    ScopeNode::new(
        NodeLocation::new("p", "p.sy", (1, 1)),
        names.iter().map(|n| n.to_string()).collect(),
    )
}

#[test]
fn test_fill_value_overwrites_placeholder() {
    let store = MemStore::new();
    let a = ArrayValue::new_list(vec![TypedValue::int_value(7)]);
    store.set_object(ObjectId(1), Value::Array(a.clone()));

    let mut tv = TypedValue::with_value(
        Type::array_of(int_type(), 1),
        Some(Value::Ref(RefValue::object(ObjectId(1)))),
    );
    fill_value(&store, &mut tv);
    let Some(Value::Array(got)) = &tv.v else {
        panic!("placeholder must resolve to the stored array");
    };
    assert!(ArrayRef::ptr_eq(got, &a));

    // Idempotent: a second fill leaves the live handle alone.
    let before = got.clone();
    fill_value(&store, &mut tv);
    let Some(Value::Array(got)) = &tv.v else { unreachable!() };
    assert!(ArrayRef::ptr_eq(got, &before));
}

#[test]
fn test_two_slots_resolve_to_one_object() {
    let store = MemStore::new();
    let a = ArrayValue::new_list(vec![TypedValue::int_value(1)]);
    store.set_object(ObjectId(3), Value::Array(a));

    let make = || {
        TypedValue::with_value(
            Type::array_of(int_type(), 1),
            Some(Value::Ref(RefValue::object(ObjectId(3)))),
        )
    };
    let mut x = make();
    let mut y = make();
    fill_value(&store, &mut x);
    fill_value(&store, &mut y);
    let (Some(vx), Some(vy)) = (&x.v, &y.v) else { unreachable!() };
    assert!(Value::same_object(vx, vy));
}

#[test]
fn test_unresolved_pointer_rederives_array_target() {
    let store = MemStore::new();
    let a = ArrayValue::new_list(vec![TypedValue::int_value(0), TypedValue::int_value(0)]);
    store.set_object(ObjectId(4), Value::Array(a.clone()));

    let p = PointerValue::unresolved(RefValue::object(ObjectId(4)), 1, int_type());
    p.assign2(&store, &TypedValue::int_value(9), false).unwrap();
    assert_eq!(a.borrow().list()[1].get_int(), 9);
    assert_eq!(p, a.element_pointer(1, &int_type()));
}

#[test]
fn test_unresolved_pointer_rederives_data_byte_target() {
    let store = MemStore::new();
    let a = ArrayValue::new_data(vec![0, 0, 0]);
    store.set_object(ObjectId(5), Value::Array(a.clone()));

    let byte_t = Type::Primitive(PrimitiveType::Uint8);
    let p = PointerValue::unresolved(RefValue::object(ObjectId(5)), 2, byte_t);
    p.assign2(&store, &TypedValue::uint8_value(0xAB), false).unwrap();
    assert_eq!(a.borrow().readonly_bytes(), &[0, 0, 0xAB]);
    assert_eq!(p.deref(&store).get_uint8(), 0xAB);
}

#[test]
fn test_unresolved_pointer_rederives_struct_and_block_targets() {
    let store = MemStore::new();

    let s = StructValue::new(vec![TypedValue::int_value(1)]);
    store.set_object(ObjectId(6), Value::Struct(s.clone()));
    let p = PointerValue::unresolved(RefValue::object(ObjectId(6)), 0, int_type());
    assert_eq!(p.deref(&store).get_int(), 1);
    assert!(Value::same_object(
        &p.owner(&store).unwrap(),
        &Value::Struct(s)
    ));

    let b = Block::new(node(&["x"]), None);
    b.borrow_mut().values_mut()[0] = TypedValue::int_value(2);
    store.set_object(ObjectId(7), Value::Block(b.clone()));
    let p = PointerValue::unresolved(RefValue::object(ObjectId(7)), 0, int_type());
    assert_eq!(p.deref(&store).get_int(), 2);

    // Sentinel -1 lands on the blank slot.
    let p = PointerValue::unresolved(RefValue::object(ObjectId(7)), INDEX_BLANK, int_type());
    assert_eq!(p.index(), INDEX_BLANK);
    let delta = p.assign2(&store, &TypedValue::int_value(3), false).unwrap();
    assert!(delta.is_none());
    assert_eq!(b.borrow().blank().get_int(), 3);

    let h = HeapItemValue::new(TypedValue::int_value(4));
    store.set_object(ObjectId(8), Value::HeapItem(h));
    let p = PointerValue::unresolved(RefValue::object(ObjectId(8)), 0, int_type());
    assert_eq!(p.deref(&store).get_int(), 4);
}

#[test]
fn test_pointer_clones_share_resolution() {
    let store = MemStore::new();
    let s = StructValue::new(vec![TypedValue::int_value(1)]);
    store.set_object(ObjectId(9), Value::Struct(s));

    let p = PointerValue::unresolved(RefValue::object(ObjectId(9)), 0, int_type());
    let q = p.clone();
    p.resolve_base(&store);

    // The clone sees the resolved target without touching the store.
    let empty = NullStore;
    assert_eq!(q.deref(&empty).get_int(), 1);
}

#[test]
fn test_slice_base_hydration_is_memoized() {
    let store = MemStore::new();
    let a = ArrayValue::new_list(vec![
        TypedValue::int_value(10),
        TypedValue::int_value(20),
        TypedValue::int_value(30),
    ]);
    store.set_object(ObjectId(10), Value::Array(a.clone()));

    let s = SliceRef::new(SliceValue::unresolved(
        RefValue::object(ObjectId(10)),
        1,
        2,
        2,
    ));
    let base = s.hydrated_base(&store);
    assert!(ArrayRef::ptr_eq(&base, &a));
    assert!(ArrayRef::ptr_eq(&s.borrow().base_array(), &a));

    // Geometry is preserved across hydration.
    let p = s.element_pointer(&store, 0, &int_type()).unwrap();
    assert_eq!(p.deref(&store).get_int(), 20);
}

#[test]
fn test_block_parent_hydration() {
    let store = MemStore::new();
    let parent = Block::new(node(&["x"]), None);
    parent.borrow_mut().values_mut()[0] = TypedValue::int_value(5);
    store.set_object(ObjectId(11), Value::Block(parent.clone()));

    let child = Block::with_parent_ref(node(&["y"]), RefValue::object(ObjectId(11)));
    let got = child.get_parent(&store).unwrap();
    assert!(BlockRef::ptr_eq(&got, &parent));

    // Memoized: depth walks work against a store that knows nothing.
    let empty = NullStore;
    let p = child.get_pointer_to(&empty, &ValuePath::block(2, 0, "x"));
    assert_eq!(p.deref(&empty).get_int(), 5);
}

#[test]
fn test_package_block_hydration() {
    let store = MemStore::new();
    let blk = Block::new(node(&["Version"]), None);
    blk.borrow_mut().values_mut()[0] = TypedValue::int_value(1);
    store.set_object(ObjectId(12), Value::Block(blk.clone()));

    let pkg = PackageValue::with_block_ref("demo", "p/demo", RefValue::object(ObjectId(12)));
    assert!(BlockRef::ptr_eq(&pkg.get_block(&store), &blk));
    assert_eq!(pkg.get_value_at(&store, 0).get_int(), 1);
}

#[test]
fn test_package_placeholder_resolves_by_path() {
    let store = MemStore::new();
    let blk = Block::new(node(&[]), None);
    let pkg = PackageValue::new("demo", "p/demo", blk);
    store.set_package("p/demo", pkg.clone());

    let r = RefValue::package(ObjectId(13), "p/demo");
    let got = r.resolve(&store);
    assert!(Value::same_object(&got, &Value::Package(pkg)));
}

#[test]
fn test_closure_hydration() {
    let store = MemStore::new();
    let scope = Block::new(node(&["captured"]), None);
    store.set_object(ObjectId(14), Value::Block(scope.clone()));

    let ft = Type::Func(Rc::new(FuncType {
        params: vec![],
        results: vec![],
    }));
    let fv = FuncValue::new(
        "f",
        ft,
        false,
        NodeLocation::new("p", "p.sy", (2, 1)),
        "p",
        Some(Closure::Ref(RefValue::object(ObjectId(14)))),
        vec![],
    );
    let got = fv.get_closure(&store).unwrap();
    assert!(BlockRef::ptr_eq(&got, &scope));

    // Memoized in place.
    let empty = NullStore;
    assert!(fv.get_closure(&empty).is_some());
}

#[test]
fn test_func_type_reference_resolution() {
    let store = MemStore::new();
    let ft = Type::Func(Rc::new(FuncType {
        params: vec![int_type()],
        results: vec![int_type()],
    }));
    store.set_type(&ft);

    let fv = FuncValue::new(
        "g",
        Type::Ref(ft.id()),
        false,
        NodeLocation::new("p", "p.sy", (3, 1)),
        "p",
        None,
        vec![],
    );
    assert_eq!(Type::Func(fv.get_type(&store)), ft);

    // Memoized: the slot now holds the live type.
    let empty = NullStore;
    assert_eq!(Type::Func(fv.get_type(&empty)), ft);
}

#[test]
fn test_unref_copy_resolves_then_copies() {
    let store = MemStore::new();
    let a = ArrayValue::new_list(vec![TypedValue::int_value(1)]);
    store.set_object(ObjectId(15), Value::Array(a.clone()));

    let tv = TypedValue::with_value(
        Type::array_of(int_type(), 1),
        Some(Value::Ref(RefValue::object(ObjectId(15)))),
    );
    let copy = tv.unref_copy(&store);

    // The copy is a distinct deep object, and the original slot still
    // holds its placeholder.
    let Some(Value::Array(ca)) = &copy.v else {
        panic!("copy must hold a live array");
    };
    assert!(!ArrayRef::ptr_eq(ca, &a));
    assert_eq!(ca.borrow().list()[0].get_int(), 1);
    assert!(matches!(tv.v, Some(Value::Ref(_))));
}

#[test]
fn test_deep_fill_hydrates_nested_graph() {
    let store = MemStore::new();

    let inner = ArrayValue::new_list(vec![TypedValue::int_value(9)]);
    store.set_object(ObjectId(20), Value::Array(inner.clone()));

    let outer = StructValue::new(vec![TypedValue::with_value(
        Type::array_of(int_type(), 1),
        Some(Value::Ref(RefValue::object(ObjectId(20)))),
    )]);
    store.set_object(ObjectId(21), Value::Struct(outer));

    let st = Type::Struct(Rc::new(StructType {
        fields: vec![FieldType {
            name: "a".into(),
            typ: Type::array_of(int_type(), 1),
            embedded: false,
        }],
    }));
    let mut tv = TypedValue::with_value(st, Some(Value::Ref(RefValue::object(ObjectId(21)))));
    deep_fill(&store, &mut tv);

    let Some(Value::Struct(s)) = &tv.v else {
        panic!("outer placeholder must resolve to the struct");
    };
    let Some(Value::Array(got)) = &s.borrow().fields[0].v else {
        panic!("inner placeholder must resolve to the array");
    };
    assert!(ArrayRef::ptr_eq(got, &inner));
}

#[test]
fn test_deep_fill_hydrates_map_slots() {
    let store = MemStore::new();
    let a = ArrayValue::new_list(vec![TypedValue::int_value(1)]);
    store.set_object(ObjectId(22), Value::Array(a.clone()));

    let m = MapValue::make(0);
    let tv = TypedValue::with_value(
        Type::map_of(Type::Primitive(PrimitiveType::String), Type::array_of(int_type(), 1)),
        Some(Value::Map(m.clone())),
    );
    let p = tv
        .get_pointer_at_index(&store, &TypedValue::string_value("k"))
        .unwrap();
    p.assign2(
        &store,
        &TypedValue::with_value(
            Type::array_of(int_type(), 1),
            Some(Value::Ref(RefValue::object(ObjectId(22)))),
        ),
        false,
    )
    .unwrap();

    let mut tv = tv;
    deep_fill(&store, &mut tv);
    let got = m
        .get_value_for_key(&store, &TypedValue::string_value("k"))
        .unwrap();
    assert!(matches!(got.v, Some(Value::Array(_))));
}
