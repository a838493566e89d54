//! The closed set of host capabilities and the resolver loaded code uses to
//! reach them.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::ConfigError;
use crate::interpreter::Exception;
use crate::value::{Frozen, Value};

/// Fixed mapping from capability name to host value.
///
/// Built once through [`CapabilityRegistryBuilder`]; there is no way to add
/// or replace entries afterwards.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: IndexMap<String, Value>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    entries: IndexMap<String, Value>,
    duplicate: Option<String>,
}

impl CapabilityRegistryBuilder {
    /// Adds a capability. The value is frozen deeply so loaded code can
    /// never write through it.
    pub fn register(mut self, name: impl Into<String>, value: Value) -> Self {
        match self.entries.entry(name.into()) {
            Entry::Occupied(entry) => {
                self.duplicate.get_or_insert_with(|| entry.key().clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(value.freeze());
            }
        }
        self
    }

    pub fn build(self) -> Result<CapabilityRegistry, ConfigError> {
        match self.duplicate {
            Some(name) => Err(ConfigError::DuplicateCapability(name)),
            None => Ok(CapabilityRegistry {
                entries: self.entries,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Module \"{name}\" is not allowed or cannot be resolved.")]
pub struct ResolutionError {
    pub name: String,
}

impl ResolutionError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Strict lookup of capability names for one load.
///
/// Every request is recorded in order, including misses.
pub struct Resolver {
    registry: Rc<CapabilityRegistry>,
    requested: RefCell<Vec<String>>,
}

impl Resolver {
    pub fn new(registry: Rc<CapabilityRegistry>) -> Rc<Self> {
        Rc::new(Self {
            registry,
            requested: RefCell::new(Vec::new()),
        })
    }

    pub fn resolve(&self, name: &str) -> Result<Value, ResolutionError> {
        self.requested.borrow_mut().push(name.to_string());
        match self.registry.get(name) {
            Some(value) => {
                log::trace!(target: "artifex::loader", "resolved capability {name}");
                Ok(value.clone())
            }
            None => {
                log::debug!(target: "artifex::loader", "refused capability {name}");
                Err(ResolutionError::new(name))
            }
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    /// The `require(name, interop?)` function injected into a unit.
    ///
    /// With `"default"` as the second argument the default-import interop
    /// applies: a namespace that has a `default` member yields that member,
    /// anything else yields the capability itself.
    pub fn binding(self: &Rc<Self>) -> Value {
        let resolver = self.clone();
        Value::native("require", move |_, args| {
            let Some(Value::String(name)) = args.first() else {
                return Err(Exception::type_error("require expects a capability name"));
            };
            let value = resolver.resolve(name)?;
            let default_import = matches!(args.get(1), Some(Value::String(mode)) if &**mode == "default");
            Ok(if default_import {
                default_member(value)
            } else {
                value
            })
        })
    }
}

fn default_member(value: Value) -> Value {
    if let Value::Frozen(frozen) = &value {
        if let Frozen::Record(members) = frozen.as_ref() {
            if let Some(member) = members.get("default") {
                return member.clone();
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Interpreter, Limits, Realm, intrinsics};
    use crate::value::Properties;

    fn registry() -> Rc<CapabilityRegistry> {
        let namespace = Value::object(Properties::from_iter([(
            Rc::from("default"),
            Value::string("the default"),
        )]));
        Rc::new(
            CapabilityRegistry::builder()
                .register("with-default", namespace)
                .register("plain", Value::string("plain value"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn duplicates_are_rejected() {
        let result = CapabilityRegistry::builder()
            .register("react", Value::Null)
            .register("react", Value::Null)
            .build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::DuplicateCapability("react".into())
        );
    }

    #[test]
    fn registered_values_are_frozen() {
        let registry = registry();
        assert!(matches!(registry.get("with-default"), Some(Value::Frozen(_))));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["with-default", "plain"]);
    }

    #[test]
    fn resolver_records_requests_and_refuses_unknown_names() {
        let resolver = Resolver::new(registry());
        assert!(resolver.resolve("plain").is_ok());
        let error = resolver.resolve("fs").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Module \"fs\" is not allowed or cannot be resolved."
        );
        assert_eq!(resolver.requested(), ["plain", "fs"]);
    }

    #[test]
    fn require_applies_default_interop() {
        let resolver = Resolver::new(registry());
        let require = resolver.binding();
        let mut interpreter = Interpreter::new(Realm::new(intrinsics()), Limits::default());
        let default = Value::string("default");
        let call = |interpreter: &mut Interpreter, args: &[Value]| {
            interpreter.call(&require, args).unwrap().to_display()
        };
        assert_eq!(
            call(&mut interpreter, &[Value::string("with-default"), default.clone()]),
            "the default"
        );
        assert_eq!(
            call(&mut interpreter, &[Value::string("plain"), default]),
            "plain value"
        );
        let missing = interpreter.call(&require, &[Value::string("nope")]);
        assert!(matches!(missing, Err(Exception::Resolution(_))));
    }
}
