//! Runs executable units and extracts their exported component factory.

use std::fmt;
use std::rc::Rc;

use crate::capability::{CapabilityRegistry, ResolutionError, Resolver};
use crate::error::{ConfigError, ExecutionError, TransformError};
use crate::interpreter::{Interpreter, Limits, Realm, intrinsics};
use crate::source::SourceUnit;
use crate::transform::{self, TransformOptions, Unit};
use crate::value::{Properties, Value};

/// Lifecycle of one source identity inside the engine.
///
/// ```text
/// Unloaded -> Transforming -> TransformFailed
///                          -> Transformed -> Executing -> LoadFailed
///                                                      -> Loaded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Unloaded,
    Transforming,
    TransformFailed,
    Transformed,
    Executing,
    LoadFailed,
    Loaded,
}

impl ModuleState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ModuleState::TransformFailed | ModuleState::LoadFailed | ModuleState::Loaded
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModuleState::Unloaded => "unloaded",
            ModuleState::Transforming => "transforming",
            ModuleState::TransformFailed => "transform failed",
            ModuleState::Transformed => "transformed",
            ModuleState::Executing => "executing",
            ModuleState::LoadFailed => "load failed",
            ModuleState::Loaded => "loaded",
        })
    }
}

/// A unit that ran to completion.
///
/// Owns the realm its closures live in; dropping the module releases them.
pub struct LoadedModule {
    factory: Value,
    exports: Value,
    export_names: Vec<String>,
    requested: Vec<String>,
    realm: Rc<Realm>,
    steps: u64,
}

impl LoadedModule {
    /// The primary export: `exports.default`, or the whole output record
    /// when nothing was exported as default.
    pub fn factory(&self) -> &Value {
        &self.factory
    }

    /// Frozen snapshot of the output record.
    pub fn exports(&self) -> &Value {
        &self.exports
    }

    pub fn export_names(&self) -> &[String] {
        &self.export_names
    }

    /// Capability names the unit asked for, in request order.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Evaluation steps the load took.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn realm(&self) -> &Rc<Realm> {
        &self.realm
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("factory", &self.factory)
            .field("export_names", &self.export_names)
            .field("requested", &self.requested)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

pub struct ModuleLoader {
    registry: Rc<CapabilityRegistry>,
    options: TransformOptions,
    limits: Limits,
}

impl ModuleLoader {
    pub fn new(registry: Rc<CapabilityRegistry>, options: TransformOptions, limits: Limits) -> Self {
        Self {
            registry,
            options,
            limits,
        }
    }

    pub fn registry(&self) -> &Rc<CapabilityRegistry> {
        &self.registry
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn transform(&self, source: &SourceUnit) -> Result<Unit, TransformError> {
        transform::transform(source, &self.options)
    }

    /// Transform and execute, reporting each state transition.
    pub fn load_with(
        &self,
        source: &SourceUnit,
        mut on_state: impl FnMut(ModuleState),
    ) -> Result<LoadedModule, ExecutionError> {
        on_state(ModuleState::Transforming);
        let unit = match self.transform(source) {
            Ok(unit) => unit,
            Err(error) => {
                log::debug!(target: "artifex::loader", "{} failed to transform: {error}", source.id());
                on_state(ModuleState::TransformFailed);
                return Err(error.into());
            }
        };
        on_state(ModuleState::Transformed);
        on_state(ModuleState::Executing);
        let loaded = self.execute(&unit);
        on_state(match loaded {
            Ok(_) => ModuleState::Loaded,
            Err(_) => ModuleState::LoadFailed,
        });
        loaded
    }

    pub fn load(&self, source: &SourceUnit) -> Result<LoadedModule, ExecutionError> {
        self.load_with(source, |_| {})
    }

    /// Runs a unit once with `require`, `exports` and `module` as its only
    /// free bindings.
    pub fn execute(&self, unit: &Unit) -> Result<LoadedModule, ExecutionError> {
        // Every import is checked before any module code runs.
        if let Some(missing) = unit
            .capabilities
            .iter()
            .find(|name| !self.registry.contains(name))
        {
            log::debug!(target: "artifex::loader", "{} imports unknown capability {missing}", unit.source_id);
            return Err(ResolutionError::new(missing.as_str()).into());
        }
        if let Some(runtime) = &unit.jsx_runtime {
            if !self.registry.contains(runtime) {
                return Err(ConfigError::MissingRuntime(runtime.clone()).into());
            }
        }

        let realm = Realm::new(intrinsics());
        let mut interpreter = Interpreter::new(realm.clone(), self.limits);
        let resolver = Resolver::new(self.registry.clone());
        let exports = Value::object(Properties::new());
        let module = Value::object(Properties::from_iter([(Rc::from("exports"), exports.clone())]));
        interpreter
            .run(
                &unit.body,
                vec![
                    ("require", resolver.binding()),
                    ("exports", exports),
                    ("module", module.clone()),
                ],
            )
            .map_err(ExecutionError::from_load)?;

        // `module.exports = ...` replaces the output record.
        let output = interpreter
            .get_property(&module, "exports")
            .map_err(ExecutionError::from_load)?;
        let default = if output.is_nullish() {
            Value::Undefined
        } else {
            interpreter
                .get_property(&output, "default")
                .map_err(ExecutionError::from_load)?
        };
        let factory = match default {
            Value::Undefined => output.clone(),
            default => default,
        };
        let export_names = output
            .entries()
            .map(|entries| entries.into_iter().map(|(name, _)| name.to_string()).collect())
            .unwrap_or_default();
        let steps = interpreter.steps();
        log::debug!(
            target: "artifex::loader",
            "loaded {} in {steps} steps, exports {export_names:?}",
            unit.source_id
        );
        Ok(LoadedModule {
            factory,
            exports: output.freeze(),
            export_names,
            requested: resolver.requested(),
            realm,
            steps,
        })
    }
}
