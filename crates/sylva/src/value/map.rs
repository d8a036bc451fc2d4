//! Insertion-ordered map.
//!
//! A hash index over canonical key bytes plus an arena-backed doubly
//! linked list. Iteration follows the list from head, never hash order;
//! deletion unlinks without disturbing the remainder; re-inserting a
//! deleted key appends at the tail. Replicas that apply the same
//! insert/delete sequence therefore observe byte-identical traversal.

use std::collections::HashMap;
use std::rc::Rc;

use crate::object::ObjectInfo;
use crate::store::Store;
use crate::types::{default_typed_value, Kind, Type};
use crate::value::mapkey::{compute_map_key, MapKey};
use crate::value::{MapRef, PointerValue, TypedValue};

/// Ordered associative container.
#[derive(Debug)]
pub struct MapValue {
    /// Persistence metadata.
    pub info: ObjectInfo,
    index: HashMap<MapKey, usize>,
    nodes: Vec<Option<MapNode>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    size: usize,
}

#[derive(Debug)]
struct MapNode {
    key: TypedValue,
    value: TypedValue,
    prev: Option<usize>,
    next: Option<usize>,
}

impl MapValue {
    /// An empty map with capacity for `size_hint` entries.
    pub fn make(size_hint: usize) -> MapRef {
        MapRef::new(Self {
            info: ObjectInfo::default(),
            index: HashMap::with_capacity(size_hint),
            nodes: Vec::with_capacity(size_hint),
            free: Vec::new(),
            head: None,
            tail: None,
            size: 0,
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether a canonical key is present.
    pub fn contains(&self, mkey: &MapKey) -> bool {
        self.index.contains_key(mkey)
    }

    /// The value slot for a canonical key.
    pub fn value_for(&self, mkey: &MapKey) -> Option<&TypedValue> {
        self.index.get(mkey).map(|&i| &self.node(i).value)
    }

    /// Mutable value slot for a canonical key.
    pub fn value_for_mut(&mut self, mkey: &MapKey) -> Option<&mut TypedValue> {
        let i = *self.index.get(mkey)?;
        Some(&mut self.node_mut(i).value)
    }

    /// Append a new entry at the tail. The key must be absent.
    pub fn insert_tail(&mut self, mkey: MapKey, key: TypedValue, value: TypedValue) {
        debug_assert!(!self.index.contains_key(&mkey), "insert of present key");
        let node = MapNode {
            key,
            value,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                i
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        if let Some(t) = self.tail {
            self.node_mut(t).next = Some(slot);
        } else {
            self.head = Some(slot);
        }
        self.tail = Some(slot);
        self.index.insert(mkey, slot);
        self.size += 1;
    }

    /// Unlink and de-index an entry. Surviving entries keep their order.
    pub fn delete(&mut self, mkey: &MapKey) -> bool {
        let Some(slot) = self.index.remove(mkey) else {
            return false;
        };
        let (prev, next) = {
            let n = self.node(slot);
            (n.prev, n.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(nx) => self.node_mut(nx).prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot] = None;
        self.free.push(slot);
        self.size -= 1;
        true
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<(TypedValue, TypedValue)> {
        let mut out = Vec::with_capacity(self.size);
        let mut cur = self.head;
        while let Some(i) = cur {
            let n = self.node(i);
            out.push((n.key.clone(), n.value.clone()));
            cur = n.next;
        }
        out
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<TypedValue> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// Visit every entry's key and value slots mutably, in list order.
    pub fn for_each_slot_mut(&mut self, mut f: impl FnMut(&mut TypedValue, &mut TypedValue)) {
        let mut cur = self.head;
        while let Some(i) = cur {
            let n = match &mut self.nodes[i] {
                Some(n) => n,
                None => crate::error::fault!("map arena slot {} is vacant", i),
            };
            f(&mut n.key, &mut n.value);
            cur = n.next;
        }
    }

    fn node(&self, i: usize) -> &MapNode {
        match &self.nodes[i] {
            Some(n) => n,
            None => crate::error::fault!("map arena slot {} is vacant", i),
        }
    }

    fn node_mut(&mut self, i: usize) -> &mut MapNode {
        match &mut self.nodes[i] {
            Some(n) => n,
            None => crate::error::fault!("map arena slot {} is vacant", i),
        }
    }
}

impl PartialEq for MapValue {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.entries() == other.entries()
    }
}

impl MapRef {
    /// Pointer to the value slot for `key`, inserting an entry at the
    /// tail when absent. A fresh slot is initialized to the declared
    /// value type's zero value unless that type is an interface, which
    /// stays undefined.
    pub fn get_pointer_for_key(
        &self,
        store: &dyn Store,
        key: &TypedValue,
        value_type: Option<&Type>,
    ) -> PointerValue {
        let mkey = compute_map_key(store, key, false);
        if !self.borrow().contains(&mkey) {
            let init = match value_type {
                Some(vt) if vt.kind() != Kind::Interface => default_typed_value(vt),
                _ => TypedValue::undefined(),
            };
            self.borrow_mut().insert_tail(mkey.clone(), key.copy(), init);
        }
        PointerValue::map_slot(self.clone(), mkey, Rc::new(key.copy()))
    }

    /// The value for `key` without inserting; `None` when absent.
    pub fn get_value_for_key(&self, store: &dyn Store, key: &TypedValue) -> Option<TypedValue> {
        let mkey = compute_map_key(store, key, false);
        self.borrow().value_for(&mkey).cloned()
    }

    /// Remove the entry for `key`, if present.
    pub fn delete_for_key(&self, store: &dyn Store, key: &TypedValue) -> bool {
        let mkey = compute_map_key(store, key, false);
        self.borrow_mut().delete(&mkey)
    }
}

impl std::fmt::Display for MapValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "map{{")?;
        for (i, (k, v)) in self.entries().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", k, v)?;
        }
        write!(f, "}}")
    }
}
