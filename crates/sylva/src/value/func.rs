//! Functions and bound methods.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::fault;
use crate::object::RefValue;
use crate::path::NodeLocation;
use crate::store::Store;
use crate::types::{FuncType, Name, Type};
use crate::value::{BlockRef, TypedValue, Value};

/// A function's enclosing scope: live, or a placeholder awaiting
/// hydration.
#[derive(Debug, Clone)]
pub enum Closure {
    /// Live enclosing block.
    Block(BlockRef),
    /// Unloaded enclosing block.
    Ref(RefValue),
}

/// A function value.
///
/// The signature and closure may start as placeholders (a type reference
/// and a block reference) and are memoized on first resolution.
#[derive(Debug)]
pub struct FuncValue {
    /// Declared name; empty for literals.
    pub name: Name,
    /// Whether this is a method (receiver is the first parameter of the
    /// unbound signature).
    pub is_method: bool,
    /// Source node of the definition.
    pub source: NodeLocation,
    /// Declaring package path.
    pub pkg_path: String,
    /// Heap items captured from enclosing scopes.
    pub captures: Vec<TypedValue>,
    typ: RefCell<Type>,
    closure: RefCell<Option<Closure>>,
}

impl FuncValue {
    /// A function value. `typ` must be a func type or a type reference
    /// resolving to one.
    pub fn new(
        name: impl Into<Name>,
        typ: Type,
        is_method: bool,
        source: NodeLocation,
        pkg_path: impl Into<String>,
        closure: Option<Closure>,
        captures: Vec<TypedValue>,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            is_method,
            source,
            pkg_path: pkg_path.into(),
            captures,
            typ: RefCell::new(typ),
            closure: RefCell::new(closure),
        })
    }

    /// A func-typed slot holding this function.
    pub fn typed(self: &Rc<Self>) -> TypedValue {
        TypedValue::with_value(self.typ.borrow().clone(), Some(Value::Func(self.clone())))
    }

    /// The unbound signature. Faults while still a type reference; use
    /// [`get_type`](Self::get_type) when the store may be needed.
    pub fn unbound_type(&self) -> Rc<FuncType> {
        match &*self.typ.borrow() {
            Type::Func(ft) => ft.clone(),
            t => fault!("function type not resolved: {}", t),
        }
    }

    /// The unbound signature, resolving and memoizing a type reference
    /// through the store.
    pub fn get_type(&self, store: &dyn Store) -> Rc<FuncType> {
        let unresolved = match &*self.typ.borrow() {
            Type::Func(ft) => return ft.clone(),
            Type::Ref(id) => id.clone(),
            t => fault!("function carries non-func type {}", t),
        };
        let resolved = match store.typ(&unresolved) {
            Some(Type::Func(ft)) => ft,
            Some(t) => fault!("type {} resolved to non-func {}", unresolved.0, t),
            None => fault!("dangling type reference {}", unresolved.0),
        };
        *self.typ.borrow_mut() = Type::Func(resolved.clone());
        resolved
    }

    /// The enclosing scope, hydrating and memoizing a placeholder.
    pub fn get_closure(&self, store: &dyn Store) -> Option<BlockRef> {
        let unresolved = match &*self.closure.borrow() {
            None => return None,
            Some(Closure::Block(b)) => return Some(b.clone()),
            Some(Closure::Ref(r)) => r.clone(),
        };
        let block = match unresolved.resolve(store) {
            Value::Block(b) => b,
            other => fault!("closure resolved to non-block {}", other),
        };
        *self.closure.borrow_mut() = Some(Closure::Block(block.clone()));
        Some(block)
    }
}

impl PartialEq for FuncValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.pkg_path == other.pkg_path && self.source == other.source
    }
}

impl std::fmt::Display for FuncValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "func(lit)@{}", self.pkg_path)
        } else {
            write!(f, "func {}.{}", self.pkg_path, self.name)
        }
    }
}

/// A method paired with its captured receiver.
///
/// Value receivers hold a copy; pointer receivers hold the pointer and
/// may be nil.
#[derive(Debug, PartialEq)]
pub struct BoundMethodValue {
    /// The unbound method.
    pub func: Rc<FuncValue>,
    /// The captured receiver.
    pub receiver: TypedValue,
}

impl BoundMethodValue {
    /// Bind `func` to `receiver`.
    pub fn new(func: Rc<FuncValue>, receiver: TypedValue) -> Rc<Self> {
        Rc::new(Self { func, receiver })
    }
}

impl std::fmt::Display for BoundMethodValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(bound to {})", self.func, self.receiver)
    }
}
