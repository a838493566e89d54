use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::value::Value;

struct Binding {
    value: Value,
    mutable: bool,
}

pub struct ScopeData {
    bindings: RefCell<FxHashMap<Rc<str>, Binding>>,
    parent: Option<Scope>,
}

/// Lexical environment. Cloning shares the same environment.
#[derive(Clone)]
pub struct Scope(Rc<ScopeData>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    NotDefined,
    Constant,
}

impl Scope {
    pub fn root() -> Self {
        Scope(Rc::new(ScopeData {
            bindings: RefCell::new(FxHashMap::default()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        Scope(Rc::new(ScopeData {
            bindings: RefCell::new(FxHashMap::default()),
            parent: Some(self.clone()),
        }))
    }

    /// Declares a new binding; `false` when the name already exists in this scope.
    pub fn declare(&self, name: &Rc<str>, value: Value, mutable: bool) -> bool {
        let mut bindings = self.0.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return false;
        }
        bindings.insert(name.clone(), Binding { value, mutable });
        true
    }

    /// Declares or replaces a binding (parameters, hoisted functions).
    pub fn define(&self, name: &Rc<str>, value: Value, mutable: bool) {
        self.0
            .bindings
            .borrow_mut()
            .insert(name.clone(), Binding { value, mutable });
    }

    /// Copies this scope's own bindings, not its parents', into `target`.
    pub fn copy_into(&self, target: &Scope) {
        let bindings = self.0.bindings.borrow();
        for (name, binding) in bindings.iter() {
            target.define(name, binding.value.clone(), binding.mutable);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.0.bindings.borrow().get(name) {
                return Some(binding.value.clone());
            }
            scope = current.0.parent.as_ref();
        }
        None
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.0.bindings.borrow_mut().get_mut(name) {
                if !binding.mutable {
                    return Err(AssignError::Constant);
                }
                binding.value = value;
                return Ok(());
            }
            scope = current.0.parent.as_ref();
        }
        Err(AssignError::NotDefined)
    }

    fn downgrade(&self) -> Weak<ScopeData> {
        Rc::downgrade(&self.0)
    }
}

/// Owner of every scope created while running one loaded module.
///
/// Closures capture their defining scope and scopes hold closures, so the
/// scopes of a module form reference cycles. Dropping the realm (when the
/// cache lets go of the module) clears every scope it still tracks, which
/// breaks those cycles.
pub struct Realm {
    globals: Scope,
    scopes: RefCell<Vec<Weak<ScopeData>>>,
    prune_at: Cell<usize>,
}

impl Realm {
    const INITIAL_PRUNE_AT: usize = 256;

    pub fn new(globals: Scope) -> Rc<Self> {
        Rc::new(Self {
            globals,
            scopes: RefCell::new(Vec::new()),
            prune_at: Cell::new(Self::INITIAL_PRUNE_AT),
        })
    }

    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    pub fn track(&self, scope: &Scope) {
        let mut scopes = self.scopes.borrow_mut();
        scopes.push(scope.downgrade());
        if scopes.len() >= self.prune_at.get() {
            scopes.retain(|scope| scope.strong_count() > 0);
            self.prune_at
                .set((scopes.len() * 2).max(Self::INITIAL_PRUNE_AT));
        }
    }

    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.scopes
            .borrow()
            .iter()
            .filter(|scope| scope.strong_count() > 0)
            .count()
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        let scopes = std::mem::take(self.scopes.get_mut());
        for scope in scopes.iter().filter_map(Weak::upgrade) {
            let bindings = std::mem::take(&mut *scope.bindings.borrow_mut());
            drop(bindings);
        }
        let globals = std::mem::take(&mut *self.globals.0.bindings.borrow_mut());
        drop(globals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parents() {
        let root = Scope::root();
        root.declare(&Rc::from("a"), Value::Number(1.0), false);
        let child = root.child();
        assert!(matches!(child.lookup("a"), Some(Value::Number(n)) if n == 1.0));
        assert!(child.lookup("b").is_none());
    }

    #[test]
    fn constants_reject_assignment() {
        let scope = Scope::root();
        scope.declare(&Rc::from("a"), Value::Null, false);
        scope.declare(&Rc::from("b"), Value::Null, true);
        assert_eq!(scope.assign("a", Value::Null), Err(AssignError::Constant));
        assert_eq!(scope.assign("b", Value::Bool(true)), Ok(()));
        assert_eq!(scope.assign("c", Value::Null), Err(AssignError::NotDefined));
    }

    #[test]
    fn redeclaration_is_refused() {
        let scope = Scope::root();
        assert!(scope.declare(&Rc::from("a"), Value::Null, true));
        assert!(!scope.declare(&Rc::from("a"), Value::Null, true));
    }

    #[test]
    fn dropping_the_realm_breaks_cycles() {
        use crate::parser::{Function as Definition, FunctionBody};
        use crate::value::{Closure, Function};

        let realm = Realm::new(Scope::root());
        let scope = realm.globals().child();
        realm.track(&scope);
        let closure = Value::Function(Rc::new(Function::Closure(Closure {
            definition: Rc::new(Definition {
                name: None,
                params: Vec::new(),
                body: FunctionBody::Block(Vec::new()),
                is_arrow: true,
                is_async: false,
            }),
            scope: scope.clone(),
        })));
        scope.define(&Rc::from("render"), closure, false);
        let weak = scope.downgrade();
        drop(scope);
        assert!(weak.upgrade().is_some(), "the closure keeps its scope alive");
        assert_eq!(realm.tracked(), 1);
        drop(realm);
        assert!(weak.upgrade().is_none());
    }
}
