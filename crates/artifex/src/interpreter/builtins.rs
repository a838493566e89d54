//! Intrinsic globals available to every loaded unit.
//!
//! This is a deliberately small slice of the usual JavaScript globals: what
//! component code reaches for while computing a render. Nothing here touches
//! the host (no timers fire, no network, no storage); `console` is routed to
//! the `log` facade.

use std::rc::Rc;

use serde::Serialize;

use super::{Exception, Interpreter, Scope, describe, error_value};
use crate::value::{Properties, Value, string_to_number};

pub(super) fn globals() -> Scope {
    let scope = Scope::root();
    let define = |name: &str, value: Value| {
        scope.define(&Rc::from(name), value, false);
    };
    define("NaN", Value::Number(f64::NAN));
    define("Infinity", Value::Number(f64::INFINITY));
    define("Math", math());
    define("JSON", json());
    define("Object", object());
    define("Array", array());
    define("String", string());
    define("Number", number());
    define("Boolean", Value::native("Boolean", |_, args| Ok(Value::Bool(arg(args, 0).is_truthy()))));
    define("parseInt", Value::native("parseInt", parse_int));
    define("parseFloat", Value::native("parseFloat", parse_float));
    define("isNaN", Value::native("isNaN", |_, args| Ok(Value::Bool(arg(args, 0).to_number().is_nan()))));
    define(
        "isFinite",
        Value::native("isFinite", |_, args| Ok(Value::Bool(arg(args, 0).to_number().is_finite()))),
    );
    for name in ["Error", "TypeError", "RangeError", "SyntaxError", "ReferenceError"] {
        define(name, error_constructor(name));
    }
    define("console", console());
    for name in ["setTimeout", "setInterval"] {
        // Timers never fire during a static render; the id is all callers get.
        define(name, Value::native(name, |_, _| Ok(Value::Number(0.0))));
    }
    for name in ["clearTimeout", "clearInterval"] {
        define(name, Value::native(name, |_, _| Ok(Value::Undefined)));
    }
    scope
}

pub(super) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn statics(entries: impl IntoIterator<Item = (&'static str, Value)>) -> Properties {
    entries
        .into_iter()
        .map(|(name, value)| (Rc::from(name), value))
        .collect()
}

fn math() -> Value {
    fn unary(name: &'static str, f: fn(f64) -> f64) -> (&'static str, Value) {
        (name, Value::native(name, move |_, args| Ok(Value::Number(f(arg(args, 0).to_number())))))
    }
    fn fold(name: &'static str, initial: f64, f: fn(f64, f64) -> f64) -> (&'static str, Value) {
        let callback = move |_: &mut Interpreter, args: &[Value]| {
            let mut result = initial;
            for value in args {
                let number = value.to_number();
                if number.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                result = f(result, number);
            }
            Ok(Value::Number(result))
        };
        (name, Value::native(name, callback))
    }
    Value::record([
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("round", |n| (n + 0.5).floor()),
        unary("trunc", f64::trunc),
        unary("sign", |n| if n == 0.0 || n.is_nan() { n } else { n.signum() }),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("log", f64::ln),
        unary("log10", f64::log10),
        unary("log2", f64::log2),
        unary("exp", f64::exp),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("atan", f64::atan),
        fold("max", f64::NEG_INFINITY, f64::max),
        fold("min", f64::INFINITY, f64::min),
        (
            "pow",
            Value::native("pow", |_, args| {
                Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
            }),
        ),
        (
            "atan2",
            Value::native("atan2", |_, args| {
                Ok(Value::Number(arg(args, 0).to_number().atan2(arg(args, 1).to_number())))
            }),
        ),
        (
            "hypot",
            Value::native("hypot", |_, args| {
                Ok(Value::Number(
                    args.iter().map(|value| value.to_number().powi(2)).sum::<f64>().sqrt(),
                ))
            }),
        ),
        (
            "random",
            Value::native("random", |interpreter, _| Ok(Value::Number(interpreter.next_random()))),
        ),
    ])
}

fn json() -> Value {
    Value::record([
        ("stringify", Value::native("stringify", stringify)),
        (
            "parse",
            Value::native("parse", |_, args| {
                let text = arg(args, 0).to_display();
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(|json| Value::from_json_mutable(&json))
                    .map_err(|error| Exception::syntax_error(format!("JSON.parse: {error}")))
            }),
        ),
    ])
}

fn stringify(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let Some(json) = arg(args, 0).to_json() else {
        return Ok(Value::Undefined);
    };
    let indent = match arg(args, 2) {
        Value::Number(width) if width >= 1.0 => Some(" ".repeat(width.min(10.0) as usize)),
        Value::String(text) if !text.is_empty() => Some(text.chars().take(10).collect()),
        _ => None,
    };
    let text = match indent {
        None => serde_json::to_string(&json),
        Some(indent) => {
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), formatter);
            json.serialize(&mut serializer)
                .map(|()| String::from_utf8_lossy(&serializer.into_inner()).into_owned())
        }
    };
    text.map(Value::from)
        .map_err(|error| Exception::type_error(format!("JSON.stringify: {error}")))
}

fn object() -> Value {
    let entries_of = |value: &Value| -> Result<Vec<(Rc<str>, Value)>, Exception> {
        match value {
            Value::String(text) => Ok(text
                .chars()
                .enumerate()
                .map(|(index, c)| (Rc::from(index.to_string()), Value::string(c.to_string())))
                .collect()),
            other if other.is_nullish() => Err(Exception::type_error(
                "Cannot convert undefined or null to object",
            )),
            other => Ok(other.entries().unwrap_or_default()),
        }
    };
    Value::native_with(
        "Object",
        false,
        statics([
            (
                "keys",
                Value::native("keys", move |_, args| {
                    Ok(Value::array(
                        entries_of(&arg(args, 0))?
                            .into_iter()
                            .map(|(key, _)| Value::String(key))
                            .collect(),
                    ))
                }),
            ),
            (
                "values",
                Value::native("values", move |_, args| {
                    Ok(Value::array(
                        entries_of(&arg(args, 0))?
                            .into_iter()
                            .map(|(_, value)| value)
                            .collect(),
                    ))
                }),
            ),
            (
                "entries",
                Value::native("entries", move |_, args| {
                    Ok(Value::array(
                        entries_of(&arg(args, 0))?
                            .into_iter()
                            .map(|(key, value)| Value::array(vec![Value::String(key), value]))
                            .collect(),
                    ))
                }),
            ),
            (
                "fromEntries",
                Value::native("fromEntries", |interpreter, args| {
                    let mut properties = Properties::new();
                    for entry in interpreter.iterate(&arg(args, 0))? {
                        let pair = entry.list_items().unwrap_or_default();
                        let key = arg(&pair, 0).to_display();
                        properties.insert(Rc::from(key), arg(&pair, 1));
                    }
                    Ok(Value::object(properties))
                }),
            ),
            (
                "assign",
                Value::native("assign", |interpreter, args| {
                    let target = arg(args, 0);
                    for source in args.iter().skip(1) {
                        for (key, value) in source.entries().unwrap_or_default() {
                            interpreter.set_property(&target, &key, value)?;
                        }
                    }
                    Ok(target)
                }),
            ),
            ("freeze", Value::native("freeze", |_, args| Ok(arg(args, 0).freeze()))),
        ]),
        |_, args| {
            Ok(match arg(args, 0) {
                value if value.is_nullish() => Value::object(Properties::new()),
                value => value,
            })
        },
    )
}

fn array() -> Value {
    Value::native_with(
        "Array",
        false,
        statics([
            (
                "isArray",
                Value::native("isArray", |_, args| {
                    Ok(Value::Bool(match arg(args, 0) {
                        Value::Array(_) => true,
                        Value::Frozen(frozen) => frozen.as_list().is_some(),
                        _ => false,
                    }))
                }),
            ),
            ("from", Value::native("from", array_from)),
            ("of", Value::native("of", |_, args| Ok(Value::array(args.to_vec())))),
        ]),
        |_, args| match args {
            [Value::Number(length)] => {
                if *length < 0.0 || length.fract() != 0.0 || *length > super::MAX_ARRAY_GROWTH as f64 {
                    return Err(Exception::range_error("Invalid array length"));
                }
                Ok(Value::array(vec![Value::Undefined; *length as usize]))
            }
            _ => Ok(Value::array(args.to_vec())),
        },
    )
}

/// `Array.from(iterable | { length }, mapFn?)`.
fn array_from(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let source = arg(args, 0);
    let items = match source.list_items() {
        Some(items) => items,
        None if source.is_nullish() => {
            return Err(Exception::type_error(format!(
                "{} is not iterable",
                describe(&source)
            )));
        }
        None => {
            let length = interpreter.get_property(&source, "length")?.to_number();
            if length.is_nan() || length <= 0.0 {
                Vec::new()
            } else if length > super::MAX_ARRAY_GROWTH as f64 {
                return Err(Exception::range_error("Invalid array length"));
            } else {
                vec![Value::Undefined; length as usize]
            }
        }
    };
    let mapper = arg(args, 1);
    if mapper.is_nullish() {
        return Ok(Value::array(items));
    }
    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        mapped.push(interpreter.call(&mapper, &[item, Value::Number(index as f64)])?);
    }
    Ok(Value::array(mapped))
}

fn string() -> Value {
    Value::native_with(
        "String",
        false,
        statics([(
            "fromCharCode",
            Value::native("fromCharCode", |_, args| {
                Ok(Value::from(
                    args.iter()
                        .filter_map(|code| char::from_u32(code.to_number() as u32))
                        .collect::<String>(),
                ))
            }),
        )]),
        |_, args| {
            Ok(match args.first() {
                Some(value) => Value::from(value.to_display()),
                None => Value::string(""),
            })
        },
    )
}

fn number() -> Value {
    let predicate = |name: &'static str, f: fn(f64) -> bool| {
        (
            name,
            Value::native(name, move |_, args| {
                Ok(Value::Bool(match arg(args, 0) {
                    Value::Number(number) => f(number),
                    _ => false,
                }))
            }),
        )
    };
    Value::native_with(
        "Number",
        false,
        statics([
            predicate("isInteger", |n| n.is_finite() && n.fract() == 0.0),
            predicate("isSafeInteger", |n| n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0),
            predicate("isFinite", f64::is_finite),
            predicate("isNaN", f64::is_nan),
            ("parseFloat", Value::native("parseFloat", parse_float)),
            ("parseInt", Value::native("parseInt", parse_int)),
            ("MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0)),
            ("MIN_SAFE_INTEGER", Value::Number(-9_007_199_254_740_991.0)),
            ("EPSILON", Value::Number(f64::EPSILON)),
            ("MAX_VALUE", Value::Number(f64::MAX)),
            ("POSITIVE_INFINITY", Value::Number(f64::INFINITY)),
            ("NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY)),
        ]),
        |_, args| {
            Ok(Value::Number(match args.first() {
                Some(value) => value.to_number(),
                None => 0.0,
            }))
        },
    )
}

fn parse_int(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let text = arg(args, 0).to_display();
    let mut rest = text.trim_start();
    let negative = rest.starts_with('-');
    if let Some(stripped) = rest.strip_prefix(['-', '+']) {
        rest = stripped;
    }
    let mut radix = match arg(args, 1) {
        Value::Undefined => 10,
        value => value.to_number() as u32,
    };
    if radix == 0 {
        radix = 10;
    }
    if radix == 16 || arg(args, 1).is_nullish() {
        if let Some(stripped) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            rest = stripped;
            radix = 16;
        }
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let digits: Vec<u32> = rest.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let magnitude = digits
        .iter()
        .fold(0.0, |total, digit| total * f64::from(radix) + f64::from(*digit));
    Ok(Value::Number(if negative { -magnitude } else { magnitude }))
}

fn parse_float(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let text = arg(args, 0).to_display();
    Ok(Value::Number(float_prefix(text.trim_start())))
}

/// Longest prefix of `text` that reads as a decimal number.
fn float_prefix(text: &str) -> f64 {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return if text.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count()
    };
    let integer = digits_from(end);
    end += integer;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits_from(end + 1);
        if integer > 0 || fraction > 0 {
            end += 1 + fraction;
        }
    }
    if integer == 0 && fraction == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_digits = digits_from(exponent);
        if exponent_digits > 0 {
            end = exponent + exponent_digits;
        }
    }
    string_to_number(&text[..end])
}

fn error_constructor(name: &'static str) -> Value {
    Value::native_with(name, true, Properties::new(), move |_, args| {
        let message = match arg(args, 0) {
            Value::Undefined => String::new(),
            value => value.to_display(),
        };
        Ok(error_value(name, &message))
    })
}

/// `console.*` output goes to the `artifex::console` log target.
fn console() -> Value {
    fn method(name: &'static str, level: log::Level) -> (&'static str, Value) {
        (
            name,
            Value::native(name, move |_, args| {
                let line = args.iter().map(inspect).collect::<Vec<_>>().join(" ");
                log::log!(target: "artifex::console", level, "{line}");
                Ok(Value::Undefined)
            }),
        )
    }
    Value::record([
        method("log", log::Level::Info),
        method("info", log::Level::Info),
        method("debug", log::Level::Debug),
        method("warn", log::Level::Warn),
        method("error", log::Level::Error),
    ])
}

fn inspect(value: &Value) -> String {
    match value {
        Value::String(text) => text.to_string(),
        Value::Function(function) => format!("[Function: {}]", function.name()),
        other if other.is_primitive() => other.to_display(),
        other => match other.to_json() {
            Some(json) => json.to_string(),
            None => other.to_display(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Limits, Realm};

    fn interpreter() -> Interpreter {
        Interpreter::new(Realm::new(globals()), Limits::default())
    }

    fn call_global(path: &[&str], args: &[Value]) -> Value {
        let mut interpreter = interpreter();
        let mut target = interpreter
            .realm()
            .globals()
            .lookup(path[0])
            .unwrap_or_default();
        for key in &path[1..] {
            target = interpreter.get_property(&target, key).unwrap_or_default();
        }
        match interpreter.call(&target, args) {
            Ok(value) => value,
            Err(error) => panic!("{path:?} failed: {error:?}"),
        }
    }

    #[test]
    fn parse_int_and_float() {
        let number = |path: &[&str], text: &str| call_global(path, &[Value::string(text)]).to_number();
        assert_eq!(number(&["parseInt"], "42px"), 42.0);
        assert_eq!(number(&["parseInt"], "  -0x1A"), -26.0);
        assert!(number(&["parseInt"], "px").is_nan());
        assert_eq!(number(&["parseFloat"], "3.25rem"), 3.25);
        assert_eq!(number(&["parseFloat"], ".5"), 0.5);
        assert_eq!(number(&["parseFloat"], "1e3x"), 1000.0);
        assert!(number(&["Number", "parseFloat"], "abc").is_nan());
    }

    #[test]
    fn json_round_trips_with_indentation() {
        let value = Value::record([
            ("b", Value::Number(1.0)),
            ("a", Value::list(vec![Value::Bool(true), Value::Undefined])),
        ]);
        let text = call_global(&["JSON", "stringify"], &[value.clone()]).to_display();
        assert_eq!(text, r#"{"b":1,"a":[true,null]}"#);
        let pretty = call_global(
            &["JSON", "stringify"],
            &[Value::record([("a", Value::Number(1.5))]), Value::Null, Value::Number(2.0)],
        );
        assert_eq!(pretty.to_display(), "{\n  \"a\": 1.5\n}");
        let parsed = call_global(&["JSON", "parse"], &[Value::string(text)]);
        assert!(matches!(parsed, Value::Object(_)));
    }

    #[test]
    fn math_helpers() {
        let max = call_global(&["Math", "max"], &[Value::Number(1.0), Value::Number(7.0), Value::Number(3.0)]);
        assert_eq!(max.to_number(), 7.0);
        assert_eq!(call_global(&["Math", "max"], &[]).to_number(), f64::NEG_INFINITY);
        assert_eq!(call_global(&["Math", "round"], &[Value::Number(-2.5)]).to_number(), -2.0);
        assert_eq!(call_global(&["Math", "round"], &[Value::Number(2.5)]).to_number(), 3.0);
    }

    #[test]
    fn array_from_length() {
        let mapper = Value::native("index", |_, args| Ok(arg(args, 1)));
        let source = Value::record([("length", Value::Number(3.0))]);
        let array = call_global(&["Array", "from"], &[source, mapper]);
        assert_eq!(array.to_display(), "0,1,2");
    }

    #[test]
    fn errors_carry_name_and_message() {
        let error = call_global(&["RangeError"], &[Value::string("too far")]);
        assert_eq!(error.to_display(), "RangeError: too far");
    }

    #[test]
    fn object_entries_keep_insertion_order() {
        let record = Value::record([("z", Value::Number(1.0)), ("a", Value::Number(2.0))]);
        let keys = call_global(&["Object", "keys"], &[record]);
        assert_eq!(keys.to_display(), "z,a");
    }
}
