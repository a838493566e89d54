//! Runtime values of loaded component code.
//!
//! Mutable containers (`Array`, `Object`) are created by the code itself.
//! Everything the host hands in (capabilities, render data, element props) is
//! `Frozen`: reads work like any object, writes throw a `TypeError`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::interpreter::{Exception, Interpreter, Scope};
use crate::parser;

pub type Properties = IndexMap<Rc<str>, Value>;

pub type NativeCallback = dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, Exception>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Properties>>),
    Frozen(Rc<Frozen>),
    Function(Rc<Function>),
    Element(Rc<Element>),
}

/// Read-only record or list.
#[derive(Debug)]
pub enum Frozen {
    Record(Properties),
    List(Vec<Value>),
}

pub enum Function {
    Closure(Closure),
    Native(NativeFunction),
}

pub struct Closure {
    pub definition: Rc<parser::Function>,
    pub scope: Scope,
}

pub struct NativeFunction {
    pub name: Rc<str>,
    pub callback: Rc<NativeCallback>,
    /// Whether `new` may be applied (the `Error` family).
    pub constructor: bool,
    /// Static members, e.g. `Number.isInteger`.
    pub statics: Properties,
}

/// Result of the element factory: a description of what to render.
#[derive(Debug)]
pub struct Element {
    pub element_type: Value,
    pub key: Option<Rc<str>>,
    /// Always a `Frozen::Record`.
    pub props: Rc<Frozen>,
}

impl Element {
    pub fn props(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.props.as_record().into_iter().flatten()
    }

    pub fn prop(&self, name: &str) -> Value {
        self.props
            .as_record()
            .and_then(|properties| properties.get(name))
            .cloned()
            .unwrap_or_default()
    }
}

impl Frozen {
    pub fn as_record(&self) -> Option<&Properties> {
        match self {
            Frozen::Record(properties) => Some(properties),
            Frozen::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Frozen::List(items) => Some(items),
            Frozen::Record(_) => None,
        }
    }
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure(closure) => closure.definition.name.as_deref().unwrap_or(""),
            Function::Native(native) => &native.name,
        }
    }
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(properties: Properties) -> Self {
        Value::Object(Rc::new(RefCell::new(properties)))
    }

    /// Frozen record built from `(name, value)` pairs.
    pub fn record<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Frozen(Rc::new(Frozen::Record(
            entries
                .into_iter()
                .map(|(key, value)| (Rc::from(key.as_ref()), value))
                .collect(),
        )))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::Frozen(Rc::new(Frozen::List(items)))
    }

    pub fn native(
        name: &str,
        callback: impl Fn(&mut Interpreter, &[Value]) -> Result<Value, Exception> + 'static,
    ) -> Self {
        Value::Function(Rc::new(Function::Native(NativeFunction {
            name: Rc::from(name),
            callback: Rc::new(callback),
            constructor: false,
            statics: Properties::new(),
        })))
    }

    pub fn native_with(
        name: &str,
        constructor: bool,
        statics: Properties,
        callback: impl Fn(&mut Interpreter, &[Value]) -> Result<Value, Exception> + 'static,
    ) -> Self {
        Value::Function(Rc::new(Function::Native(NativeFunction {
            name: Rc::from(name),
            callback: Rc::new(callback),
            constructor,
            statics,
        })))
    }

    /// Converts host JSON into a deeply frozen value.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(text) => Value::string(text),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(entries) => Value::record(
                entries
                    .iter()
                    .map(|(key, value)| (key.as_str(), Value::from_json(value))),
            ),
        }
    }

    /// Same as `from_json` but producing mutable containers (`JSON.parse`).
    pub fn from_json_mutable(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json_mutable).collect())
            }
            serde_json::Value::Object(entries) => Value::object(
                entries
                    .iter()
                    .map(|(key, value)| (Rc::from(key.as_str()), Value::from_json_mutable(value)))
                    .collect(),
            ),
            other => Value::from_json(other),
        }
    }

    /// JSON form used by `JSON.stringify`; `None` for values JSON omits.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Value::Undefined | Value::Function(_) => return None,
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Number(number) => json_number(*number),
            Value::String(text) => serde_json::Value::String(text.to_string()),
            Value::Array(items) => json_array(&items.borrow()),
            Value::Frozen(frozen) => match frozen.as_ref() {
                Frozen::List(items) => json_array(items),
                Frozen::Record(properties) => json_object(properties),
            },
            Value::Object(properties) => json_object(&properties.borrow()),
            Value::Element(element) => {
                let mut object = serde_json::Map::new();
                if let Some(element_type) = element.element_type.to_json() {
                    object.insert("type".into(), element_type);
                }
                if let Some(props) = element.props.as_record() {
                    object.insert("props".into(), json_object(props));
                }
                serde_json::Value::Object(object)
            }
        })
    }

    /// Recursively freezes mutable containers. Registries call this so no
    /// host value is ever writable from loaded code.
    pub fn freeze(self) -> Value {
        match self {
            Value::Array(items) => {
                let items = items.borrow().iter().cloned().map(Value::freeze).collect();
                Value::list(items)
            }
            Value::Object(properties) => Value::Frozen(Rc::new(Frozen::Record(
                properties
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone().freeze()))
                    .collect(),
            ))),
            other => other,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Frozen(_)
            | Value::Element(_) => "object",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(value) => *value,
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::String(text) => !text.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(value) => f64::from(u8::from(*value)),
            Value::Number(number) => *number,
            Value::String(text) => string_to_number(text),
            Value::Array(_) | Value::Frozen(_) => string_to_number(&self.to_display()),
            _ => f64::NAN,
        }
    }

    /// The string conversion JavaScript code observes (`String(value)`).
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Number(number) => number_to_string(*number),
            Value::String(text) => text.to_string(),
            Value::Array(items) => join_display(&items.borrow(), ","),
            Value::Frozen(frozen) => match frozen.as_ref() {
                Frozen::List(items) => join_display(items, ","),
                Frozen::Record(properties) => record_display(properties),
            },
            Value::Object(properties) => record_display(&properties.borrow()),
            Value::Function(function) => format!("function {}() {{ [native code] }}", function.name()),
            Value::Element(_) => "[object Object]".to_string(),
        }
    }

    /// Snapshot of list items, for arrays, frozen lists and strings.
    pub fn list_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.borrow().clone()),
            Value::Frozen(frozen) => frozen.as_list().map(<[Value]>::to_vec),
            Value::String(text) => Some(text.chars().map(|c| Value::string(c.to_string())).collect()),
            _ => None,
        }
    }

    /// Snapshot of own enumerable entries, for records and lists.
    pub fn entries(&self) -> Option<Vec<(Rc<str>, Value)>> {
        match self {
            Value::Object(properties) => Some(
                properties
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            Value::Frozen(frozen) => match frozen.as_ref() {
                Frozen::Record(properties) => Some(
                    properties
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                ),
                Frozen::List(items) => Some(indexed_entries(items)),
            },
            Value::Array(items) => Some(indexed_entries(&items.borrow())),
            _ => None,
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Frozen(a), Value::Frozen(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Element(a), Value::Element(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    /// Whether `+` treats the operand as text.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }
}

fn json_number(number: f64) -> serde_json::Value {
    if !number.is_finite() {
        return serde_json::Value::Null;
    }
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(number as i64);
    }
    serde_json::Number::from_f64(number)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn json_array(items: &[Value]) -> serde_json::Value {
    serde_json::Value::Array(
        items
            .iter()
            .map(|item| item.to_json().unwrap_or(serde_json::Value::Null))
            .collect(),
    )
}

fn json_object(properties: &Properties) -> serde_json::Value {
    serde_json::Value::Object(
        properties
            .iter()
            .filter_map(|(key, value)| Some((key.to_string(), value.to_json()?)))
            .collect(),
    )
}

fn join_display(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|item| {
            if item.is_nullish() {
                String::new()
            } else {
                item.to_display()
            }
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// Error objects print as `Name: message`, everything else as `[object Object]`.
fn record_display(properties: &Properties) -> String {
    match (properties.get("name"), properties.get("message")) {
        (Some(Value::String(name)), Some(Value::String(message))) if name.ends_with("Error") => {
            if message.is_empty() {
                name.to_string()
            } else {
                format!("{name}: {message}")
            }
        }
        _ => "[object Object]".to_string(),
    }
}

fn indexed_entries(items: &[Value]) -> Vec<(Rc<str>, Value)> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| (Rc::from(index.to_string()), item.clone()))
        .collect()
}

pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|value| value as f64)
            .unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

/// Number formatting as JavaScript prints it (`1`, `0.5`, `1e+21`, `NaN`).
pub fn number_to_string(number: f64) -> String {
    if number.is_nan() {
        return "NaN".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if number == 0.0 {
        return "0".to_string();
    }
    let magnitude = number.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{number}");
    }
    let formatted = format!("{number:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
        _ => formatted,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(number) => write!(f, "{}", number_to_string(*number)),
            Value::String(text) => write!(f, "{text:?}"),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(properties) => f.debug_map().entries(properties.borrow().iter()).finish(),
            Value::Frozen(frozen) => match frozen.as_ref() {
                Frozen::List(items) => f.debug_list().entries(items.iter()).finish(),
                Frozen::Record(properties) => f.debug_map().entries(properties.iter()).finish(),
            },
            Value::Function(function) => write!(f, "[Function: {}]", function.name()),
            Value::Element(element) => write!(f, "<{:?}>", element.element_type),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_print_like_javascript() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e-8), "1.5e-8");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_conversion_to_number() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("12px").is_nan());
    }

    #[test]
    fn host_json_is_frozen() {
        let value = Value::from_json(&json!({ "items": [1, 2], "name": "x" }));
        let Value::Frozen(record) = &value else {
            panic!("expected frozen record")
        };
        assert!(matches!(record.as_record().and_then(|r| r.get("items")), Some(Value::Frozen(_))));
        assert_eq!(value.to_json(), Some(json!({ "items": [1, 2], "name": "x" })));
    }

    #[test]
    fn equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::string("1").loose_equals(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        let array = Value::array(vec![]);
        assert!(array.strict_equals(&array.clone()));
        assert!(!array.strict_equals(&Value::array(vec![])));
    }

    #[test]
    fn display_of_containers() {
        let array = Value::array(vec![Value::Number(1.0), Value::Null, Value::string("a")]);
        assert_eq!(array.to_display(), "1,,a");
        let error = Value::record([("name", Value::string("TypeError")), ("message", Value::string("bad"))]);
        assert_eq!(error.to_display(), "TypeError: bad");
        assert_eq!(Value::record([("a", Value::Null)]).to_display(), "[object Object]");
    }
}
