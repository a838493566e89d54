//! Tree-walking evaluator for lowered units.
//!
//! The interpreter only ever sees base syntax: import/export and JSX are
//! gone by the time a unit gets here. Every evaluation and execution step
//! counts against a step budget and every call against a depth limit, so
//! runaway component code fails instead of hanging or overflowing the host.

use std::cmp::Ordering;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::capability::ResolutionError;
use crate::parser::{
    Argument, ArrayElement, AssignmentOperator, BinaryOperator, DeclarationKind, Expression,
    FunctionBody, LogicalOperator, MemberProperty, ObjectMember, Pattern, PropertyKey, Statement,
    SwitchCase, TemplatePart, UnaryOperator, UpdateOperator,
};
use crate::value::{Closure, Frozen, Function, Properties, Value};

mod builtins;
mod methods;
mod scope;

pub use scope::{Realm, Scope};
use scope::AssignError;

/// Largest array an index or `length` write may grow to.
const MAX_ARRAY_GROWTH: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub step_budget: u64,
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            step_budget: 1_000_000,
            max_call_depth: 128,
        }
    }
}

/// Abrupt completion of evaluation.
///
/// Only `Thrown` is visible to `try`/`catch` in loaded code; the other two
/// unwind straight back to the host.
#[derive(Debug)]
pub enum Exception {
    Thrown(Value),
    Resolution(ResolutionError),
    BudgetExhausted { budget: u64 },
}

impl Exception {
    pub fn error(name: &str, message: impl AsRef<str>) -> Self {
        Exception::Thrown(error_value(name, message.as_ref()))
    }

    pub fn type_error(message: impl AsRef<str>) -> Self {
        Self::error("TypeError", message)
    }

    pub fn range_error(message: impl AsRef<str>) -> Self {
        Self::error("RangeError", message)
    }

    pub fn reference_error(message: impl AsRef<str>) -> Self {
        Self::error("ReferenceError", message)
    }

    pub fn syntax_error(message: impl AsRef<str>) -> Self {
        Self::error("SyntaxError", message)
    }
}

impl From<ResolutionError> for Exception {
    fn from(error: ResolutionError) -> Self {
        Exception::Resolution(error)
    }
}

/// Plain error object with `name` and `message`, as `new Error()` builds.
pub fn error_value(name: &str, message: &str) -> Value {
    Value::object(Properties::from_iter([
        (Rc::from("name"), Value::string(name)),
        (Rc::from("message"), Value::string(message)),
    ]))
}

/// Builds the intrinsic global scope (`Math`, `JSON`, `console`, ...).
pub fn intrinsics() -> Scope {
    builtins::globals()
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingKind {
    Const,
    Let,
    Parameter,
}

impl From<DeclarationKind> for BindingKind {
    fn from(kind: DeclarationKind) -> Self {
        match kind {
            DeclarationKind::Const => BindingKind::Const,
            DeclarationKind::Let | DeclarationKind::Var => BindingKind::Let,
        }
    }
}

enum Reference {
    Binding(Rc<str>),
    Property { object: Value, key: Rc<str> },
}

type Arguments = SmallVec<[Value; 4]>;

pub struct Interpreter {
    realm: Rc<Realm>,
    limits: Limits,
    steps: u64,
    depth: usize,
    random_state: u64,
}

impl Interpreter {
    const RANDOM_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

    pub fn new(realm: Rc<Realm>, limits: Limits) -> Self {
        Self {
            realm,
            limits,
            steps: 0,
            depth: 0,
            random_state: Self::RANDOM_SEED,
        }
    }

    pub fn realm(&self) -> &Rc<Realm> {
        &self.realm
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn tick(&mut self) -> Result<(), Exception> {
        self.steps += 1;
        if self.steps > self.limits.step_budget {
            return Err(Exception::BudgetExhausted {
                budget: self.limits.step_budget,
            });
        }
        Ok(())
    }

    /// xorshift64*; deterministic so repeated renders agree.
    pub(crate) fn next_random(&mut self) -> f64 {
        let mut state = self.random_state;
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        self.random_state = state;
        (state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11) as f64 / (1u64 << 53) as f64
    }

    fn new_scope(&self, parent: &Scope) -> Scope {
        let scope = parent.child();
        self.realm.track(&scope);
        scope
    }

    /// Runs a unit body with `bindings` as its only free names besides the
    /// intrinsics.
    pub fn run(&mut self, body: &[Statement], bindings: Vec<(&str, Value)>) -> Result<(), Exception> {
        let injected = self.new_scope(self.realm.globals());
        for (name, value) in bindings {
            injected.define(&Rc::from(name), value, false);
        }
        let module = self.new_scope(&injected);
        self.execute_block(body, &module)?;
        Ok(())
    }

    pub fn call(&mut self, function: &Value, arguments: &[Value]) -> Result<Value, Exception> {
        let Value::Function(function) = function else {
            return Err(Exception::type_error(format!(
                "{} is not a function",
                describe(function)
            )));
        };
        if self.depth >= self.limits.max_call_depth {
            return Err(Exception::range_error("Maximum call stack size exceeded"));
        }
        self.depth += 1;
        let result = match function.as_ref() {
            Function::Native(native) => (native.callback)(self, arguments),
            Function::Closure(closure) => self.invoke_closure(function, closure, arguments),
        };
        self.depth -= 1;
        result
    }

    fn invoke_closure(
        &mut self,
        function: &Rc<Function>,
        closure: &Closure,
        arguments: &[Value],
    ) -> Result<Value, Exception> {
        let definition = &closure.definition;
        if definition.is_async {
            return Err(Exception::type_error(format!(
                "{} is an async function; async functions cannot run during a static render",
                definition.name.as_deref().unwrap_or("anonymous")
            )));
        }
        let scope = self.new_scope(&closure.scope);
        if let (Some(name), false) = (&definition.name, definition.is_arrow) {
            scope.define(name, Value::Function(function.clone()), false);
        }
        for (index, parameter) in definition.params.iter().enumerate() {
            let mut value = if parameter.rest {
                Value::array(arguments.get(index..).map(<[Value]>::to_vec).unwrap_or_default())
            } else {
                arguments.get(index).cloned().unwrap_or_default()
            };
            if matches!(value, Value::Undefined) {
                if let Some(default) = &parameter.default {
                    value = self.evaluate(default, &scope)?;
                }
            }
            self.bind_pattern(&parameter.pattern, value, &scope, BindingKind::Parameter)?;
        }
        match &definition.body {
            FunctionBody::Expression(body) => self.evaluate(body, &scope),
            FunctionBody::Block(body) => match self.execute_block(body, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn closure(&self, definition: &Rc<crate::parser::Function>, scope: &Scope) -> Value {
        Value::Function(Rc::new(Function::Closure(Closure {
            definition: definition.clone(),
            scope: scope.clone(),
        })))
    }

    // --- Properties -------------------------------------------------------

    pub fn get_property(&mut self, object: &Value, key: &str) -> Result<Value, Exception> {
        Ok(match object {
            Value::Undefined | Value::Null => {
                return Err(Exception::type_error(format!(
                    "Cannot read properties of {} (reading '{key}')",
                    object.to_display()
                )));
            }
            Value::String(text) => match key {
                "length" => Value::Number(text.chars().count() as f64),
                _ => match parse_index(key) {
                    Some(index) => text
                        .chars()
                        .nth(index)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or_default(),
                    None => methods::bound(object, key).unwrap_or_default(),
                },
            },
            Value::Array(items) => match key {
                "length" => Value::Number(items.borrow().len() as f64),
                _ => match parse_index(key) {
                    Some(index) => items.borrow().get(index).cloned().unwrap_or_default(),
                    None => methods::bound(object, key).unwrap_or_default(),
                },
            },
            Value::Frozen(frozen) => match frozen.as_ref() {
                Frozen::Record(properties) => match properties.get(key) {
                    Some(value) => value.clone(),
                    None => methods::bound(object, key).unwrap_or_default(),
                },
                Frozen::List(items) => match key {
                    "length" => Value::Number(items.len() as f64),
                    _ => match parse_index(key) {
                        Some(index) => items.get(index).cloned().unwrap_or_default(),
                        None => methods::bound(object, key).unwrap_or_default(),
                    },
                },
            },
            Value::Object(properties) => {
                let found = properties.borrow().get(key).cloned();
                match found {
                    Some(value) => value,
                    None => methods::bound(object, key).unwrap_or_default(),
                }
            }
            Value::Function(function) => match function.as_ref() {
                Function::Native(native) => match native.statics.get(key) {
                    Some(value) => value.clone(),
                    None if key == "name" => Value::String(native.name.clone()),
                    None => Value::Undefined,
                },
                Function::Closure(closure) => match key {
                    "name" => Value::string(closure.definition.name.as_deref().unwrap_or("")),
                    "length" => Value::Number(closure.definition.params.len() as f64),
                    _ => Value::Undefined,
                },
            },
            Value::Element(element) => match key {
                "props" => Value::Frozen(element.props.clone()),
                "type" => element.element_type.clone(),
                "key" => element
                    .key
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                _ => Value::Undefined,
            },
            Value::Number(_) | Value::Bool(_) => methods::bound(object, key).unwrap_or_default(),
        })
    }

    fn get_member(&mut self, object: &Value, key: &Value) -> Result<Value, Exception> {
        if let Value::Number(index) = key {
            if let Some(value) = index_access(object, *index) {
                return Ok(value);
            }
        }
        match key {
            Value::String(name) => self.get_property(object, name),
            other => self.get_property(object, &other.to_display()),
        }
    }

    pub fn set_property(&mut self, object: &Value, key: &str, value: Value) -> Result<(), Exception> {
        match object {
            Value::Object(properties) => {
                properties.borrow_mut().insert(Rc::from(key), value);
                Ok(())
            }
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                if key == "length" {
                    let length = value.to_number();
                    if length < 0.0 || length.fract() != 0.0 || length as usize > MAX_ARRAY_GROWTH {
                        return Err(Exception::range_error("Invalid array length"));
                    }
                    items.resize(length as usize, Value::Undefined);
                    return Ok(());
                }
                if let Some(index) = parse_index(key) {
                    if index >= items.len() {
                        if index > items.len() + MAX_ARRAY_GROWTH {
                            return Err(Exception::range_error("Invalid array length"));
                        }
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            Value::Undefined | Value::Null => Err(Exception::type_error(format!(
                "Cannot set properties of {} (setting '{key}')",
                object.to_display()
            ))),
            Value::Frozen(_) | Value::Element(_) | Value::Function(_) => Err(Exception::type_error(
                format!("Cannot assign to read only property '{key}' of object"),
            )),
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Err(Exception::type_error(
                format!("Cannot create property '{key}' on {} '{}'", object.type_of(), object.to_display()),
            )),
        }
    }

    /// Snapshot of the items `for...of`, spread and array patterns walk over.
    pub fn iterate(&self, value: &Value) -> Result<Vec<Value>, Exception> {
        value
            .list_items()
            .ok_or_else(|| Exception::type_error(format!("{} is not iterable", describe(value))))
    }

    // --- Statements -------------------------------------------------------

    fn execute_block(&mut self, statements: &[Statement], scope: &Scope) -> Result<Flow, Exception> {
        for statement in statements {
            if let Statement::Function(definition) = statement {
                if let Some(name) = &definition.name {
                    scope.define(name, self.closure(definition, scope), true);
                }
            }
        }
        for statement in statements {
            match self.execute(statement, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, statement: &Statement, scope: &Scope) -> Result<Flow, Exception> {
        self.tick()?;
        match statement {
            Statement::Declaration { kind, declarators } => {
                for declarator in declarators {
                    let value = match &declarator.init {
                        Some(init) => self.evaluate(init, scope)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&declarator.pattern, value, scope, (*kind).into())?;
                }
                Ok(Flow::Normal)
            }
            Statement::Function(_) | Statement::Empty => Ok(Flow::Normal),
            Statement::Return(argument) => Ok(Flow::Return(match argument {
                Some(argument) => self.evaluate(argument, scope)?,
                None => Value::Undefined,
            })),
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, scope)?.is_truthy() {
                    self.execute(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.execute(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::For {
                init,
                test,
                update,
                body,
            } => self.execute_for(init.as_deref(), test.as_ref(), update.as_ref(), body, scope),
            Statement::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                let iterable = self.evaluate(iterable, scope)?;
                for item in self.iterate(&iterable)? {
                    let iteration = self.new_scope(scope);
                    self.bind_pattern(pattern, item, &iteration, (*kind).into())?;
                    match self.execute(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::While { test, body } => {
                while self.evaluate(test, scope)?.is_truthy() {
                    match self.execute(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Switch {
                discriminant,
                cases,
            } => self.execute_switch(discriminant, cases, scope),
            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),
            Statement::Throw(argument) => Err(Exception::Thrown(self.evaluate(argument, scope)?)),
            Statement::Try {
                block,
                handler,
                finalizer,
            } => {
                let block_scope = self.new_scope(scope);
                let mut outcome = self.execute_block(block, &block_scope);
                let caught = match (&outcome, handler) {
                    (Err(Exception::Thrown(thrown)), Some(handler)) => Some((thrown.clone(), handler)),
                    _ => None,
                };
                if let Some((thrown, handler)) = caught {
                    let catch_scope = self.new_scope(scope);
                    outcome = match &handler.param {
                        Some(param) => self
                            .bind_pattern(param, thrown, &catch_scope, BindingKind::Let)
                            .and_then(|()| self.execute_block(&handler.body, &catch_scope)),
                        None => self.execute_block(&handler.body, &catch_scope),
                    };
                }
                if let Some(finalizer) = finalizer {
                    let finally_scope = self.new_scope(scope);
                    match self.execute_block(finalizer, &finally_scope)? {
                        Flow::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                outcome
            }
            Statement::Block(statements) => {
                let inner = self.new_scope(scope);
                self.execute_block(statements, &inner)
            }
            Statement::Expression(expression) => {
                self.evaluate(expression, scope)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn execute_for(
        &mut self,
        init: Option<&Statement>,
        test: Option<&Expression>,
        update: Option<&Expression>,
        body: &Statement,
        scope: &Scope,
    ) -> Result<Flow, Exception> {
        let mut iteration = self.new_scope(scope);
        if let Some(init) = init {
            self.execute(init, &iteration)?;
        }
        // `let` bindings are copied into a fresh scope per iteration, so
        // closures created in the body keep that iteration's values.
        let per_iteration = matches!(
            init,
            Some(Statement::Declaration {
                kind: DeclarationKind::Let,
                ..
            })
        );
        if per_iteration {
            iteration = self.next_iteration(&iteration, scope);
        }
        loop {
            if let Some(test) = test {
                if !self.evaluate(test, &iteration)?.is_truthy() {
                    break;
                }
            }
            match self.execute(body, &iteration)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if per_iteration {
                iteration = self.next_iteration(&iteration, scope);
            }
            if let Some(update) = update {
                self.evaluate(update, &iteration)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn next_iteration(&self, previous: &Scope, parent: &Scope) -> Scope {
        let next = self.new_scope(parent);
        previous.copy_into(&next);
        next
    }

    fn execute_switch(
        &mut self,
        discriminant: &Expression,
        cases: &[SwitchCase],
        scope: &Scope,
    ) -> Result<Flow, Exception> {
        let value = self.evaluate(discriminant, scope)?;
        let switch_scope = self.new_scope(scope);
        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.evaluate(test, &switch_scope)?.strict_equals(&value) {
                    start = Some(index);
                    break;
                }
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|case| case.test.is_none())) else {
            return Ok(Flow::Normal);
        };
        for case in &cases[start..] {
            match self.execute_block(&case.body, &switch_scope)? {
                Flow::Normal => {}
                Flow::Break => break,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: &Scope,
        kind: BindingKind,
    ) -> Result<(), Exception> {
        match pattern {
            Pattern::Identifier(name) => bind_name(name, value, scope, kind),
            Pattern::Object { properties, rest } => {
                if value.is_nullish() {
                    let key = properties.first().map(|property| &*property.key).unwrap_or("");
                    return Err(Exception::type_error(format!(
                        "Cannot destructure property '{key}' of '{0}' as it is {0}.",
                        value.to_display()
                    )));
                }
                for property in properties {
                    let mut item = self.get_property(&value, &property.key)?;
                    if matches!(item, Value::Undefined) {
                        if let Some(default) = &property.default {
                            item = self.evaluate(default, scope)?;
                        }
                    }
                    self.bind_pattern(&property.value, item, scope, kind)?;
                }
                if let Some(rest) = rest {
                    let remaining: Properties = value
                        .entries()
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|(key, _)| !properties.iter().any(|property| property.key == *key))
                        .collect();
                    bind_name(rest, Value::object(remaining), scope, kind)?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    let Some(element) = element else { continue };
                    let mut item = items.get(index).cloned().unwrap_or_default();
                    if matches!(item, Value::Undefined) {
                        if let Some(default) = &element.default {
                            item = self.evaluate(default, scope)?;
                        }
                    }
                    self.bind_pattern(&element.pattern, item, scope, kind)?;
                }
                if let Some(rest) = rest {
                    let remaining = items.get(elements.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    self.bind_pattern(rest, Value::array(remaining), scope, kind)?;
                }
                Ok(())
            }
        }
    }

    // --- Expressions ------------------------------------------------------

    fn evaluate(&mut self, expression: &Expression, scope: &Scope) -> Result<Value, Exception> {
        self.tick()?;
        match expression {
            Expression::Number(number) => Ok(Value::Number(*number)),
            Expression::String(text) => Ok(Value::String(text.clone())),
            Expression::Boolean(value) => Ok(Value::Bool(*value)),
            Expression::Null => Ok(Value::Null),
            Expression::Undefined => Ok(Value::Undefined),
            Expression::Template(parts) => self.evaluate_template(parts, scope),
            Expression::Identifier(name) => lookup(name, scope),
            Expression::Array(elements) => self.evaluate_array(elements, scope),
            Expression::Object(members) => self.evaluate_object(members, scope),
            Expression::Function(definition) => Ok(self.closure(definition, scope)),
            Expression::Unary { operator, argument } => self.evaluate_unary(*operator, argument, scope),
            Expression::Update {
                operator,
                prefix,
                target,
            } => self.evaluate_update(*operator, *prefix, target, scope),
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, scope)?;
                let right = self.evaluate(right, scope)?;
                Ok(binary(*operator, &left, &right))
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, scope)?;
                if short_circuits(*operator, &left) {
                    Ok(left)
                } else {
                    self.evaluate(right, scope)
                }
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, scope)?.is_truthy() {
                    self.evaluate(consequent, scope)
                } else {
                    self.evaluate(alternate, scope)
                }
            }
            Expression::Assignment {
                operator,
                target,
                value,
            } => self.evaluate_assignment(*operator, target, value, scope),
            Expression::Member { .. } | Expression::Call { .. } => {
                Ok(self.evaluate_chain(expression, scope)?.unwrap_or_default())
            }
            Expression::New { callee, arguments } => {
                let constructor = self.evaluate(callee, scope)?;
                let arguments = self.evaluate_arguments(arguments, scope)?;
                match &constructor {
                    Value::Function(function)
                        if matches!(function.as_ref(), Function::Native(native) if native.constructor) =>
                    {
                        self.call(&constructor, &arguments)
                    }
                    _ => Err(Exception::type_error(format!(
                        "{} is not a constructor",
                        callee_text(callee)
                    ))),
                }
            }
            Expression::Await(argument) => self.evaluate(argument, scope),
            Expression::Jsx(_) => Err(Exception::syntax_error(
                "element syntax reached the interpreter without being lowered",
            )),
        }
    }

    fn evaluate_template(&mut self, parts: &[TemplatePart], scope: &Scope) -> Result<Value, Exception> {
        let mut text = String::new();
        for part in parts {
            match part {
                TemplatePart::String(chunk) => text.push_str(chunk),
                TemplatePart::Expression(expression) => {
                    text.push_str(&self.evaluate(expression, scope)?.to_display())
                }
            }
        }
        Ok(Value::from(text))
    }

    fn evaluate_array(&mut self, elements: &[ArrayElement], scope: &Scope) -> Result<Value, Exception> {
        let mut items = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                ArrayElement::Item(expression) => items.push(self.evaluate(expression, scope)?),
                ArrayElement::Spread(expression) => {
                    let spread = self.evaluate(expression, scope)?;
                    items.extend(self.iterate(&spread)?);
                }
            }
        }
        Ok(Value::array(items))
    }

    fn evaluate_object(&mut self, members: &[ObjectMember], scope: &Scope) -> Result<Value, Exception> {
        let mut properties = Properties::with_capacity(members.len());
        for member in members {
            match member {
                ObjectMember::Property { key, value } => {
                    let key = match key {
                        PropertyKey::Named(name) => name.clone(),
                        PropertyKey::Computed(expression) => {
                            Rc::from(self.evaluate(expression, scope)?.to_display())
                        }
                    };
                    let value = self.evaluate(value, scope)?;
                    properties.insert(key, value);
                }
                ObjectMember::Spread(expression) => {
                    let source = self.evaluate(expression, scope)?;
                    if let Some(entries) = source.entries() {
                        properties.extend(entries);
                    } else if let Value::String(text) = &source {
                        for (index, c) in text.chars().enumerate() {
                            properties.insert(Rc::from(index.to_string()), Value::string(c.to_string()));
                        }
                    }
                }
            }
        }
        Ok(Value::object(properties))
    }

    fn evaluate_unary(
        &mut self,
        operator: UnaryOperator,
        argument: &Expression,
        scope: &Scope,
    ) -> Result<Value, Exception> {
        if let (UnaryOperator::TypeOf, Expression::Identifier(name)) = (operator, argument) {
            return Ok(Value::string(
                scope.lookup(name).map(|value| value.type_of()).unwrap_or("undefined"),
            ));
        }
        let value = self.evaluate(argument, scope)?;
        Ok(match operator {
            UnaryOperator::Not => Value::Bool(!value.is_truthy()),
            UnaryOperator::Negate => Value::Number(-value.to_number()),
            UnaryOperator::Plus => Value::Number(value.to_number()),
            UnaryOperator::TypeOf => Value::string(value.type_of()),
        })
    }

    fn evaluate_update(
        &mut self,
        operator: UpdateOperator,
        prefix: bool,
        target: &Expression,
        scope: &Scope,
    ) -> Result<Value, Exception> {
        let reference = self.reference(target, scope)?;
        let old = self.read_reference(&reference, scope)?.to_number();
        let new = match operator {
            UpdateOperator::Increment => old + 1.0,
            UpdateOperator::Decrement => old - 1.0,
        };
        self.write_reference(&reference, Value::Number(new), scope)?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    fn evaluate_assignment(
        &mut self,
        operator: AssignmentOperator,
        target: &Expression,
        value: &Expression,
        scope: &Scope,
    ) -> Result<Value, Exception> {
        let reference = self.reference(target, scope)?;
        let value = match (operator.binary(), operator.logical()) {
            (Some(arithmetic), _) => {
                let current = self.read_reference(&reference, scope)?;
                let right = self.evaluate(value, scope)?;
                binary(arithmetic, &current, &right)
            }
            (None, Some(logical)) => {
                let current = self.read_reference(&reference, scope)?;
                if short_circuits(logical, &current) {
                    return Ok(current);
                }
                self.evaluate(value, scope)?
            }
            (None, None) => self.evaluate(value, scope)?,
        };
        self.write_reference(&reference, value.clone(), scope)?;
        Ok(value)
    }

    fn reference(&mut self, target: &Expression, scope: &Scope) -> Result<Reference, Exception> {
        match target {
            Expression::Identifier(name) => Ok(Reference::Binding(name.clone())),
            Expression::Member {
                object,
                property,
                optional: false,
            } => {
                let object = self.evaluate(object, scope)?;
                let key = match property {
                    MemberProperty::Named(name) => name.clone(),
                    MemberProperty::Computed(expression) => {
                        Rc::from(self.evaluate(expression, scope)?.to_display())
                    }
                };
                Ok(Reference::Property { object, key })
            }
            _ => Err(Exception::syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn read_reference(&mut self, reference: &Reference, scope: &Scope) -> Result<Value, Exception> {
        match reference {
            Reference::Binding(name) => lookup(name, scope),
            Reference::Property { object, key } => self.get_property(object, key),
        }
    }

    fn write_reference(&mut self, reference: &Reference, value: Value, scope: &Scope) -> Result<(), Exception> {
        match reference {
            Reference::Binding(name) => scope.assign(name, value).map_err(|error| match error {
                AssignError::NotDefined => Exception::reference_error(format!("{name} is not defined")),
                AssignError::Constant => Exception::type_error("Assignment to constant variable."),
            }),
            Reference::Property { object, key } => self.set_property(object, key, value),
        }
    }

    /// Member and call chains. `None` means an optional link short-circuited
    /// the rest of the chain.
    fn evaluate_chain(&mut self, expression: &Expression, scope: &Scope) -> Result<Option<Value>, Exception> {
        match expression {
            Expression::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.evaluate_link(object, scope)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                self.get_member(&object, &key).map(Some)
            }
            Expression::Call {
                callee,
                arguments,
                optional,
            } => {
                if let Expression::Member {
                    object,
                    property,
                    optional: member_optional,
                } = callee.as_ref()
                {
                    let Some(receiver) = self.evaluate_link(object, scope)? else {
                        return Ok(None);
                    };
                    if *member_optional && receiver.is_nullish() {
                        return Ok(None);
                    }
                    let key = self.member_key(property, scope)?;
                    let name: Rc<str> = match &key {
                        Value::String(name) => name.clone(),
                        other => Rc::from(other.to_display()),
                    };
                    let arguments = self.evaluate_arguments(arguments, scope)?;
                    if let Some(result) = methods::call(self, &receiver, &name, &arguments) {
                        return result.map(Some);
                    }
                    let function = self.get_member(&receiver, &key)?;
                    if *optional && function.is_nullish() {
                        return Ok(None);
                    }
                    if !function.is_function() {
                        return Err(Exception::type_error(format!(
                            "{} is not a function",
                            callee_text(callee)
                        )));
                    }
                    return self.call(&function, &arguments).map(Some);
                }
                let Some(function) = self.evaluate_link(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                if !function.is_function() {
                    return Err(Exception::type_error(format!(
                        "{} is not a function",
                        callee_text(callee)
                    )));
                }
                let arguments = self.evaluate_arguments(arguments, scope)?;
                self.call(&function, &arguments).map(Some)
            }
            other => self.evaluate(other, scope).map(Some),
        }
    }

    fn evaluate_link(&mut self, expression: &Expression, scope: &Scope) -> Result<Option<Value>, Exception> {
        match expression {
            Expression::Member { .. } | Expression::Call { .. } => {
                self.tick()?;
                self.evaluate_chain(expression, scope)
            }
            other => self.evaluate(other, scope).map(Some),
        }
    }

    fn member_key(&mut self, property: &MemberProperty, scope: &Scope) -> Result<Value, Exception> {
        match property {
            MemberProperty::Named(name) => Ok(Value::String(name.clone())),
            MemberProperty::Computed(expression) => self.evaluate(expression, scope),
        }
    }

    fn evaluate_arguments(&mut self, arguments: &[Argument], scope: &Scope) -> Result<Arguments, Exception> {
        let mut values = Arguments::new();
        for argument in arguments {
            match argument {
                Argument::Value(expression) => values.push(self.evaluate(expression, scope)?),
                Argument::Spread(expression) => {
                    let spread = self.evaluate(expression, scope)?;
                    values.extend(self.iterate(&spread)?);
                }
            }
        }
        Ok(values)
    }
}

fn lookup(name: &str, scope: &Scope) -> Result<Value, Exception> {
    scope
        .lookup(name)
        .ok_or_else(|| Exception::reference_error(format!("{name} is not defined")))
}

fn bind_name(name: &Rc<str>, value: Value, scope: &Scope, kind: BindingKind) -> Result<(), Exception> {
    match kind {
        BindingKind::Parameter => {
            scope.define(name, value, true);
            Ok(())
        }
        BindingKind::Const | BindingKind::Let => {
            if scope.declare(name, value, kind == BindingKind::Let) {
                Ok(())
            } else {
                Err(Exception::syntax_error(format!(
                    "Identifier '{name}' has already been declared"
                )))
            }
        }
    }
}

fn short_circuits(operator: LogicalOperator, left: &Value) -> bool {
    match operator {
        LogicalOperator::And => !left.is_truthy(),
        LogicalOperator::Or => left.is_truthy(),
        LogicalOperator::Coalesce => !left.is_nullish(),
    }
}

pub(crate) fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Value {
    use BinaryOperator::*;
    match operator {
        Add => {
            let textual = !left.is_primitive()
                || !right.is_primitive()
                || matches!(left, Value::String(_))
                || matches!(right, Value::String(_));
            if textual {
                let mut text = left.to_display();
                text.push_str(&right.to_display());
                Value::from(text)
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        Subtract => Value::Number(left.to_number() - right.to_number()),
        Multiply => Value::Number(left.to_number() * right.to_number()),
        Divide => Value::Number(left.to_number() / right.to_number()),
        Remainder => Value::Number(left.to_number() % right.to_number()),
        Less => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        LessOrEqual => Value::Bool(matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal))),
        Greater => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        GreaterOrEqual => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        Equal => Value::Bool(left.loose_equals(right)),
        NotEqual => Value::Bool(!left.loose_equals(right)),
        StrictEqual => Value::Bool(left.strict_equals(right)),
        StrictNotEqual => Value::Bool(!left.strict_equals(right)),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn index_access(object: &Value, index: f64) -> Option<Value> {
    if index < 0.0 || index.fract() != 0.0 {
        return None;
    }
    let index = index as usize;
    match object {
        Value::Array(items) => Some(items.borrow().get(index).cloned().unwrap_or_default()),
        Value::Frozen(frozen) => frozen
            .as_list()
            .map(|items| items.get(index).cloned().unwrap_or_default()),
        Value::String(text) => Some(
            text.chars()
                .nth(index)
                .map(|c| Value::string(c.to_string()))
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

/// Short description of a value for error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::String(text) => format!("\"{text}\""),
        Value::Function(function) if !function.name().is_empty() => function.name().to_string(),
        Value::Array(_) | Value::Object(_) | Value::Frozen(_) | Value::Element(_) => {
            value.type_of().to_string()
        }
        other => other.to_display(),
    }
}

/// Source-like text of a callee, e.g. `user.profile.getName`.
fn callee_text(expression: &Expression) -> String {
    match expression {
        Expression::Identifier(name) => name.to_string(),
        Expression::Member {
            object, property, ..
        } => match property {
            MemberProperty::Named(name) => format!("{}.{name}", callee_text(object)),
            MemberProperty::Computed(_) => format!("{}[...]", callee_text(object)),
        },
        Expression::Call { callee, .. } => format!("{}(...)", callee_text(callee)),
        _ => "expression".to_string(),
    }
}
