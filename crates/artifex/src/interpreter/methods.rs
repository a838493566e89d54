//! Built-in methods on arrays, strings, numbers and records.
//!
//! There are no prototypes: a member call on one of these receivers is
//! dispatched by name here first. Reading such a member without calling it
//! yields a bound native function, so `typeof items.map` and passing
//! `items.includes` around keep working.
//!
//! String positions count Unicode scalar values, not UTF-16 code units.

use std::cmp::Ordering;
use std::rc::Rc;

use super::builtins::arg;
use super::{Exception, Interpreter, describe, index_access};
use crate::value::{Frozen, Value, number_to_string};

const ARRAY_METHODS: &[&str] = &[
    "at", "concat", "every", "fill", "filter", "find", "findIndex", "findLast", "findLastIndex",
    "flat", "flatMap", "forEach", "includes", "indexOf", "join", "lastIndexOf", "map", "pop",
    "push", "reduce", "reduceRight", "reverse", "shift", "slice", "some", "sort", "splice",
    "toReversed", "toSorted", "toString", "unshift",
];

const STRING_METHODS: &[&str] = &[
    "at", "charAt", "charCodeAt", "concat", "endsWith", "includes", "indexOf", "lastIndexOf",
    "localeCompare", "padEnd", "padStart", "repeat", "replace", "replaceAll", "slice", "split",
    "startsWith", "substring", "toLocaleLowerCase", "toLocaleUpperCase", "toLowerCase",
    "toString", "toUpperCase", "trim", "trimEnd", "trimStart",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toLocaleString", "toPrecision", "toString"];

const RECORD_METHODS: &[&str] = &["hasOwnProperty", "toString"];

/// Longest string `repeat` and the padding methods may produce.
const MAX_STRING_LENGTH: usize = 1 << 24;

enum Receiver {
    List,
    Text,
    Number,
    Record,
}

fn receiver_kind(receiver: &Value) -> Option<Receiver> {
    match receiver {
        Value::Array(_) => Some(Receiver::List),
        Value::Frozen(frozen) => Some(match frozen.as_ref() {
            Frozen::List(_) => Receiver::List,
            Frozen::Record(_) => Receiver::Record,
        }),
        Value::Object(_) => Some(Receiver::Record),
        Value::String(_) => Some(Receiver::Text),
        Value::Number(_) => Some(Receiver::Number),
        _ => None,
    }
}

fn has_method(receiver: &Value, name: &str) -> bool {
    let table = match receiver_kind(receiver) {
        Some(Receiver::List) => ARRAY_METHODS,
        Some(Receiver::Text) => STRING_METHODS,
        Some(Receiver::Number) => NUMBER_METHODS,
        Some(Receiver::Record) => RECORD_METHODS,
        None => return false,
    };
    table.contains(&name)
}

/// Calls built-in method `name` on `receiver`; `None` when there is no such
/// built-in and the caller should look the member up as a property.
pub(super) fn call(
    interpreter: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, Exception>> {
    if !has_method(receiver, name) {
        return None;
    }
    match receiver {
        Value::String(text) => Some(string_method(interpreter, text, name, args)),
        Value::Number(number) => Some(number_method(*number, name, args)),
        Value::Object(properties) => {
            if properties.borrow().contains_key(name) {
                return None;
            }
            Some(Ok(record_method(receiver, name, args)))
        }
        Value::Frozen(frozen) => match frozen.as_ref() {
            Frozen::Record(properties) if properties.contains_key(name) => None,
            Frozen::Record(_) => Some(Ok(record_method(receiver, name, args))),
            Frozen::List(_) => Some(array_method(interpreter, receiver, name, args)),
        },
        _ => Some(array_method(interpreter, receiver, name, args)),
    }
}

/// The built-in method `name` as a function value bound to `receiver`.
pub(super) fn bound(receiver: &Value, name: &str) -> Option<Value> {
    if !has_method(receiver, name) {
        return None;
    }
    let receiver = receiver.clone();
    let method: Rc<str> = Rc::from(name);
    Some(Value::native(name, move |interpreter, args| {
        call(interpreter, &receiver, &method, args).unwrap_or(Ok(Value::Undefined))
    }))
}

fn callback(args: &[Value]) -> Result<Value, Exception> {
    match arg(args, 0) {
        function @ Value::Function(_) => Ok(function),
        other => Err(Exception::type_error(format!("{} is not a function", describe(&other)))),
    }
}

fn visit(
    interpreter: &mut Interpreter,
    function: &Value,
    item: &Value,
    index: usize,
    receiver: &Value,
) -> Result<Value, Exception> {
    interpreter.call(function, &[item.clone(), Value::Number(index as f64), receiver.clone()])
}

fn mutate<R>(receiver: &Value, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, Exception> {
    match receiver {
        Value::Array(items) => Ok(f(&mut items.borrow_mut())),
        _ => Err(Exception::type_error("Cannot modify a read-only array")),
    }
}

/// Resolves a possibly negative position argument against `length`.
fn relative_index(value: Option<&Value>, length: usize, default: usize) -> usize {
    let Some(value) = value.filter(|value| !matches!(value, Value::Undefined)) else {
        return default;
    };
    let position = value.to_number();
    if position.is_nan() {
        return 0;
    }
    let position = position.trunc();
    if position < 0.0 {
        (length as f64 + position).max(0.0) as usize
    } else {
        position.min(length as f64) as usize
    }
}

fn same_value_zero(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) if left.is_nan() && right.is_nan() => true,
        _ => left.strict_equals(right),
    }
}

fn array_method(
    interpreter: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Result<Value, Exception> {
    let items = receiver.list_items().unwrap_or_default();
    let length = items.len();
    match name {
        "map" => {
            let function = callback(args)?;
            let mut mapped = Vec::with_capacity(length);
            for (index, item) in items.iter().enumerate() {
                mapped.push(visit(interpreter, &function, item, index, receiver)?);
            }
            Ok(Value::array(mapped))
        }
        "filter" => {
            let function = callback(args)?;
            let mut kept = Vec::new();
            for (index, item) in items.iter().enumerate() {
                if visit(interpreter, &function, item, index, receiver)?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Ok(Value::array(kept))
        }
        "forEach" => {
            let function = callback(args)?;
            for (index, item) in items.iter().enumerate() {
                visit(interpreter, &function, item, index, receiver)?;
            }
            Ok(Value::Undefined)
        }
        "find" | "findIndex" | "findLast" | "findLastIndex" => {
            let function = callback(args)?;
            let mut order: Box<dyn Iterator<Item = (usize, &Value)>> = if name.starts_with("findLast") {
                Box::new(items.iter().enumerate().rev())
            } else {
                Box::new(items.iter().enumerate())
            };
            let wants_index = name.ends_with("Index");
            let found = loop {
                let Some((index, item)) = order.next() else {
                    break None;
                };
                if visit(interpreter, &function, item, index, receiver)?.is_truthy() {
                    break Some((index, item.clone()));
                }
            };
            Ok(match (found, wants_index) {
                (Some((index, _)), true) => Value::Number(index as f64),
                (None, true) => Value::Number(-1.0),
                (Some((_, item)), false) => item,
                (None, false) => Value::Undefined,
            })
        }
        "some" | "every" => {
            let function = callback(args)?;
            let looking_for = name == "some";
            for (index, item) in items.iter().enumerate() {
                if visit(interpreter, &function, item, index, receiver)?.is_truthy() == looking_for {
                    return Ok(Value::Bool(looking_for));
                }
            }
            Ok(Value::Bool(!looking_for))
        }
        "reduce" | "reduceRight" => {
            let function = callback(args)?;
            let mut order: Vec<usize> = (0..length).collect();
            if name == "reduceRight" {
                order.reverse();
            }
            let mut order = order.into_iter();
            let mut accumulator = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match order.next() {
                    Some(index) => items[index].clone(),
                    None => {
                        return Err(Exception::type_error(
                            "Reduce of empty array with no initial value",
                        ));
                    }
                },
            };
            for index in order {
                accumulator = interpreter.call(
                    &function,
                    &[accumulator, items[index].clone(), Value::Number(index as f64), receiver.clone()],
                )?;
            }
            Ok(accumulator)
        }
        "includes" => {
            let target = arg(args, 0);
            let from = relative_index(args.get(1), length, 0);
            Ok(Value::Bool(items[from..].iter().any(|item| same_value_zero(item, &target))))
        }
        "indexOf" => {
            let target = arg(args, 0);
            let from = relative_index(args.get(1), length, 0);
            Ok(Value::Number(
                items[from..]
                    .iter()
                    .position(|item| item.strict_equals(&target))
                    .map(|position| (from + position) as f64)
                    .unwrap_or(-1.0),
            ))
        }
        "lastIndexOf" => {
            let target = arg(args, 0);
            Ok(Value::Number(
                items
                    .iter()
                    .rposition(|item| item.strict_equals(&target))
                    .map(|position| position as f64)
                    .unwrap_or(-1.0),
            ))
        }
        "join" | "toString" => {
            let separator = match args.first() {
                Some(Value::Undefined) | None => ",".to_string(),
                Some(separator) if name == "join" => separator.to_display(),
                Some(_) => ",".to_string(),
            };
            Ok(Value::from(
                items
                    .iter()
                    .map(|item| if item.is_nullish() { String::new() } else { item.to_display() })
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        "slice" => {
            let start = relative_index(args.first(), length, 0);
            let end = relative_index(args.get(1), length, length);
            Ok(Value::array(items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default()))
        }
        "at" => {
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            let index = if index < 0.0 { length as f64 + index } else { index };
            Ok(if index < 0.0 {
                Value::Undefined
            } else {
                items.get(index as usize).cloned().unwrap_or_default()
            })
        }
        "concat" => {
            let mut joined = items;
            for value in args {
                match value {
                    Value::Array(_) | Value::Frozen(_) => match value.list_items() {
                        Some(more) => joined.extend(more),
                        None => joined.push(value.clone()),
                    },
                    other => joined.push(other.clone()),
                }
            }
            Ok(Value::array(joined))
        }
        "flat" => {
            let depth = match arg(args, 0) {
                Value::Undefined => 1.0,
                value => value.to_number(),
            };
            let mut flattened = Vec::new();
            flatten(interpreter, &items, depth.min(64.0), &mut flattened)?;
            Ok(Value::array(flattened))
        }
        "flatMap" => {
            let function = callback(args)?;
            let mut mapped = Vec::with_capacity(length);
            for (index, item) in items.iter().enumerate() {
                mapped.push(visit(interpreter, &function, item, index, receiver)?);
            }
            let mut flattened = Vec::new();
            flatten(interpreter, &mapped, 1.0, &mut flattened)?;
            Ok(Value::array(flattened))
        }
        "toSorted" => Ok(Value::array(sort_values(interpreter, items, comparator(args)?.as_ref())?)),
        "toReversed" => Ok(Value::array(items.into_iter().rev().collect())),
        "sort" => {
            let sorted = sort_values(interpreter, items, comparator(args)?.as_ref())?;
            mutate(receiver, |items| *items = sorted)?;
            Ok(receiver.clone())
        }
        "reverse" => {
            mutate(receiver, |items| items.reverse())?;
            Ok(receiver.clone())
        }
        "push" => mutate(receiver, |items| {
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }),
        "pop" => mutate(receiver, |items| items.pop().unwrap_or_default()),
        "shift" => mutate(receiver, |items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }),
        "unshift" => mutate(receiver, |items| {
            items.splice(0..0, args.iter().cloned());
            Value::Number(items.len() as f64)
        }),
        "splice" => {
            let start = relative_index(args.first(), length, 0);
            let delete = match args.get(1) {
                None => length - start,
                Some(count) => {
                    let count = count.to_number();
                    if count.is_nan() || count <= 0.0 {
                        0
                    } else {
                        (count as usize).min(length - start)
                    }
                }
            };
            mutate(receiver, |items| {
                let removed = items
                    .splice(start..start + delete, args.iter().skip(2).cloned())
                    .collect();
                Value::array(removed)
            })
        }
        "fill" => {
            let value = arg(args, 0);
            let start = relative_index(args.get(1), length, 0);
            let end = relative_index(args.get(2), length, length);
            mutate(receiver, |items| {
                for item in items.iter_mut().take(end).skip(start) {
                    *item = value.clone();
                }
            })?;
            Ok(receiver.clone())
        }
        _ => Ok(Value::Undefined),
    }
}

fn flatten(
    interpreter: &mut Interpreter,
    items: &[Value],
    depth: f64,
    output: &mut Vec<Value>,
) -> Result<(), Exception> {
    for item in items {
        interpreter.tick()?;
        let nested = match item {
            Value::Array(_) | Value::Frozen(_) if depth >= 1.0 => item.list_items(),
            _ => None,
        };
        match nested {
            Some(nested) => flatten(interpreter, &nested, depth - 1.0, output)?,
            None => output.push(item.clone()),
        }
    }
    Ok(())
}

fn comparator(args: &[Value]) -> Result<Option<Value>, Exception> {
    match arg(args, 0) {
        Value::Undefined => Ok(None),
        function @ Value::Function(_) => Ok(Some(function)),
        other => Err(Exception::type_error(format!(
            "The comparison function must be either a function or undefined, got {}",
            describe(&other)
        ))),
    }
}

fn order(
    interpreter: &mut Interpreter,
    left: &Value,
    right: &Value,
    comparator: Option<&Value>,
) -> Result<Ordering, Exception> {
    match (left, right) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    match comparator {
        Some(function) => {
            let result = interpreter.call(function, &[left.clone(), right.clone()])?.to_number();
            Ok(result.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
        }
        None => Ok(left.to_display().cmp(&right.to_display())),
    }
}

/// Stable merge sort. The comparator is user code: it may throw, and it may
/// be inconsistent, which `slice::sort_by` is not prepared for.
fn sort_values(
    interpreter: &mut Interpreter,
    mut items: Vec<Value>,
    comparator: Option<&Value>,
) -> Result<Vec<Value>, Exception> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = sort_values(interpreter, items, comparator)?;
    let right = sort_values(interpreter, right, comparator)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if order(interpreter, &right[j], &left[i], comparator)? == Ordering::Less {
            merged.push(right[j].clone());
            j += 1;
        } else {
            merged.push(left[i].clone());
            i += 1;
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);
    Ok(merged)
}

fn string_method(
    interpreter: &mut Interpreter,
    text: &Rc<str>,
    name: &str,
    args: &[Value],
) -> Result<Value, Exception> {
    let chars = || text.chars().collect::<Vec<char>>();
    let search = || arg(args, 0).to_display();
    Ok(match name {
        "toUpperCase" | "toLocaleUpperCase" => Value::from(text.to_uppercase()),
        "toLowerCase" | "toLocaleLowerCase" => Value::from(text.to_lowercase()),
        "trim" => Value::string(text.trim()),
        "trimStart" => Value::string(text.trim_start()),
        "trimEnd" => Value::string(text.trim_end()),
        "toString" => Value::String(text.clone()),
        "concat" => {
            let mut joined = text.to_string();
            for value in args {
                joined.push_str(&value.to_display());
            }
            Value::from(joined)
        }
        "includes" => Value::Bool(text.contains(search().as_str())),
        "startsWith" => {
            let chars = chars();
            let from = relative_index(args.get(1), chars.len(), 0);
            let rest: String = chars[from..].iter().collect();
            Value::Bool(rest.starts_with(search().as_str()))
        }
        "endsWith" => {
            let chars = chars();
            let end = relative_index(args.get(1), chars.len(), chars.len());
            let head: String = chars[..end].iter().collect();
            Value::Bool(head.ends_with(search().as_str()))
        }
        "indexOf" => Value::Number(
            text.find(search().as_str())
                .map(|byte| text[..byte].chars().count() as f64)
                .unwrap_or(-1.0),
        ),
        "lastIndexOf" => Value::Number(
            text.rfind(search().as_str())
                .map(|byte| text[..byte].chars().count() as f64)
                .unwrap_or(-1.0),
        ),
        "slice" => {
            let chars = chars();
            let start = relative_index(args.first(), chars.len(), 0);
            let end = relative_index(args.get(1), chars.len(), chars.len());
            Value::from(chars[start..end.max(start)].iter().collect::<String>())
        }
        "substring" => {
            let chars = chars();
            let clamp = |value: Option<&Value>, default: usize| match value {
                None | Some(Value::Undefined) => default,
                Some(value) => {
                    let position = value.to_number();
                    if position.is_nan() {
                        0
                    } else {
                        position.clamp(0.0, chars.len() as f64) as usize
                    }
                }
            };
            let start = clamp(args.first(), 0);
            let end = clamp(args.get(1), chars.len());
            let (start, end) = if start > end { (end, start) } else { (start, end) };
            Value::from(chars[start..end].iter().collect::<String>())
        }
        "charAt" => index_access(&Value::String(text.clone()), arg(args, 0).to_number().max(0.0).trunc())
            .filter(|value| !matches!(value, Value::Undefined))
            .unwrap_or_else(|| Value::string("")),
        "charCodeAt" => {
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            Value::Number(
                text.chars()
                    .nth(index.max(0.0) as usize)
                    .filter(|_| index >= 0.0)
                    .map(|c| f64::from(u32::from(c)))
                    .unwrap_or(f64::NAN),
            )
        }
        "at" => {
            let chars = chars();
            let index = arg(args, 0).to_number().trunc();
            let index = if index < 0.0 { chars.len() as f64 + index } else { index };
            if index < 0.0 {
                Value::Undefined
            } else {
                chars
                    .get(index as usize)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_default()
            }
        }
        "split" => {
            let limit = match arg(args, 1) {
                Value::Undefined => usize::MAX,
                value => value.to_number().max(0.0) as usize,
            };
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::String(text.clone())],
                separator => {
                    let separator = separator.to_display();
                    if separator.is_empty() {
                        text.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        text.split(separator.as_str()).map(Value::string).collect()
                    }
                }
            };
            Value::array(parts.into_iter().take(limit).collect())
        }
        "replace" | "replaceAll" => {
            let pattern = search();
            let replacement = arg(args, 1);
            let mut result = String::with_capacity(text.len());
            let mut rest = 0;
            let matches: Vec<usize> = if name == "replace" {
                text.find(pattern.as_str()).into_iter().collect()
            } else if pattern.is_empty() {
                text.char_indices().map(|(byte, _)| byte).chain([text.len()]).collect()
            } else {
                text.match_indices(pattern.as_str()).map(|(byte, _)| byte).collect()
            };
            for byte in matches {
                result.push_str(&text[rest..byte]);
                let substitute = if replacement.is_function() {
                    let offset = text[..byte].chars().count() as f64;
                    interpreter
                        .call(
                            &replacement,
                            &[Value::string(&pattern), Value::Number(offset), Value::String(text.clone())],
                        )?
                        .to_display()
                } else {
                    replacement.to_display().replace("$&", &pattern)
                };
                result.push_str(&substitute);
                rest = byte + pattern.len();
            }
            result.push_str(&text[rest.min(text.len())..]);
            Value::from(result)
        }
        "repeat" => {
            let count = arg(args, 0).to_number();
            let count = if count.is_nan() { 0.0 } else { count.trunc() };
            if count < 0.0 || count.is_infinite() {
                return Err(Exception::range_error(format!("Invalid count value: {}", number_to_string(count))));
            }
            if text.len() as f64 * count > MAX_STRING_LENGTH as f64 {
                return Err(Exception::range_error("Invalid string length"));
            }
            Value::from(text.repeat(count as usize))
        }
        "padStart" | "padEnd" => {
            let target = arg(args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            if target > MAX_STRING_LENGTH {
                return Err(Exception::range_error("Invalid string length"));
            }
            let filler = match arg(args, 1) {
                Value::Undefined => " ".to_string(),
                value => value.to_display(),
            };
            let current = text.chars().count();
            if target <= current || filler.is_empty() {
                return Ok(Value::String(text.clone()));
            }
            let padding: String = filler.chars().cycle().take(target - current).collect();
            Value::from(if name == "padStart" {
                format!("{padding}{text}")
            } else {
                format!("{text}{padding}")
            })
        }
        "localeCompare" => {
            let other = search();
            let ordering = text
                .to_lowercase()
                .cmp(&other.to_lowercase())
                .then_with(|| other.as_str().cmp(&**text));
            Value::Number(match ordering {
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
                Ordering::Greater => 1.0,
            })
        }
        _ => Value::Undefined,
    })
}

fn number_method(number: f64, name: &str, args: &[Value]) -> Result<Value, Exception> {
    Ok(match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            if !(0.0..=100.0).contains(&digits) {
                return Err(Exception::range_error(
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            if !number.is_finite() || number.abs() >= 1e21 {
                Value::from(number_to_string(number))
            } else {
                Value::from(format_fixed(number, digits as usize))
            }
        }
        "toPrecision" => match arg(args, 0) {
            Value::Undefined => Value::from(number_to_string(number)),
            precision => {
                let precision = precision.to_number().trunc();
                if !(1.0..=100.0).contains(&precision) {
                    return Err(Exception::range_error(
                        "toPrecision() argument must be between 1 and 100",
                    ));
                }
                Value::from(format_precision(number, precision as usize))
            }
        },
        "toString" => match arg(args, 0) {
            Value::Undefined => Value::from(number_to_string(number)),
            radix => {
                let radix = radix.to_number().trunc();
                if !(2.0..=36.0).contains(&radix) {
                    return Err(Exception::range_error(
                        "toString() radix must be between 2 and 36",
                    ));
                }
                Value::from(format_radix(number, radix as u32))
            }
        },
        "toLocaleString" => Value::from(locale_string(number, &arg(args, 1))),
        _ => Value::Undefined,
    })
}

fn record_method(receiver: &Value, name: &str, args: &[Value]) -> Value {
    match name {
        "hasOwnProperty" => {
            let key = arg(args, 0).to_display();
            Value::Bool(
                receiver
                    .entries()
                    .is_some_and(|entries| entries.iter().any(|(name, _)| **name == *key)),
            )
        }
        "toString" => Value::from(receiver.to_display()),
        _ => Value::Undefined,
    }
}

/// Fixed-point formatting with ties rounded away from zero.
fn format_fixed(number: f64, digits: usize) -> String {
    let scale = 10f64.powi(digits as i32);
    let scaled = number * scale;
    let rounded = if scaled.is_finite() {
        scaled.round() / scale
    } else {
        number
    };
    let formatted = format!("{rounded:.digits$}");
    if formatted.starts_with('-') && formatted[1..].chars().all(|c| c == '0' || c == '.') {
        formatted[1..].to_string()
    } else {
        formatted
    }
}

fn format_precision(number: f64, precision: usize) -> String {
    if !number.is_finite() || number == 0.0 {
        return if number == 0.0 {
            format_fixed(0.0, precision - 1)
        } else {
            number_to_string(number)
        };
    }
    let exponent = number.abs().log10().floor() as i32;
    if exponent < -6 || exponent >= precision as i32 {
        let formatted = format!("{:.*e}", precision - 1, number);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
            _ => formatted,
        }
    } else {
        format_fixed(number, (precision as i32 - 1 - exponent).max(0) as usize)
    }
}

fn format_radix(number: f64, radix: u32) -> String {
    if radix == 10 || !number.is_finite() {
        return number_to_string(number);
    }
    let negative = number < 0.0;
    let magnitude = number.abs();
    let mut integer = magnitude.trunc();
    let mut digits = Vec::new();
    loop {
        let digit = (integer % f64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        integer = (integer / f64::from(radix)).trunc();
        if integer < 1.0 {
            break;
        }
    }
    let mut text: String = digits.iter().rev().collect();
    let mut fraction = magnitude.fract();
    if fraction > 0.0 {
        text.push('.');
        for _ in 0..52 {
            fraction *= f64::from(radix);
            let digit = fraction.trunc() as u32;
            text.push(char::from_digit(digit, radix).unwrap_or('0'));
            fraction = fraction.fract();
            if fraction == 0.0 {
                break;
            }
        }
    }
    if negative {
        text.insert(0, '-');
    }
    text
}

fn own(options: &Value, key: &str) -> Value {
    options
        .entries()
        .and_then(|entries| entries.into_iter().find(|(name, _)| &**name == key))
        .map(|(_, value)| value)
        .unwrap_or_default()
}

/// `toLocaleString` in the `en-US` style, with the `style`, `currency` and
/// fraction digit options.
fn locale_string(number: f64, options: &Value) -> String {
    if number.is_nan() {
        return "NaN".to_string();
    }
    let style = own(options, "style").to_display();
    let (mut minimum, mut maximum) = match style.as_str() {
        "currency" => (2, 2),
        "percent" => (0, 0),
        _ => (0, 3),
    };
    if let Value::Number(digits) = own(options, "minimumFractionDigits") {
        minimum = digits.clamp(0.0, 20.0) as usize;
        maximum = maximum.max(minimum);
    }
    if let Value::Number(digits) = own(options, "maximumFractionDigits") {
        maximum = digits.clamp(0.0, 20.0) as usize;
        minimum = minimum.min(maximum);
    }
    let value = if style == "percent" { number * 100.0 } else { number };
    let body = if value.is_infinite() {
        "∞".to_string()
    } else {
        let fixed = format_fixed(value.abs(), maximum);
        let (integer, fraction) = fixed.split_once('.').unwrap_or((&fixed, ""));
        let mut fraction = fraction.to_string();
        while fraction.len() > minimum && fraction.ends_with('0') {
            fraction.pop();
        }
        let mut grouped = String::new();
        for (index, digit) in integer.chars().enumerate() {
            if index > 0 && (integer.len() - index) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }
        if fraction.is_empty() {
            grouped
        } else {
            format!("{grouped}.{fraction}")
        }
    };
    let sign = if value < 0.0 && body.chars().any(|c| c != '0' && c != '.' && c != ',') {
        "-"
    } else {
        ""
    };
    match style.as_str() {
        "currency" => {
            let symbol = match own(options, "currency").to_display().as_str() {
                "USD" => "$".to_string(),
                "EUR" => "€".to_string(),
                "GBP" => "£".to_string(),
                "JPY" => "¥".to_string(),
                "INR" => "₹".to_string(),
                other => format!("{other} "),
            };
            format!("{sign}{symbol}{body}")
        }
        "percent" => format!("{sign}{body}%"),
        _ => format!("{sign}{body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Limits, Realm, intrinsics};

    fn interpreter() -> Interpreter {
        Interpreter::new(Realm::new(intrinsics()), Limits::default())
    }

    fn numbers(values: &[f64]) -> Value {
        Value::array(values.iter().copied().map(Value::Number).collect())
    }

    fn invoke(receiver: &Value, name: &str, args: &[Value]) -> Value {
        let mut interpreter = interpreter();
        match call(&mut interpreter, receiver, name, args) {
            Some(Ok(value)) => value,
            Some(Err(error)) => panic!("{name} threw {error:?}"),
            None => panic!("{name} is not a built-in"),
        }
    }

    #[test]
    fn sort_is_stable_and_numeric_with_comparator() {
        let array = numbers(&[10.0, 9.0, 1.0, 100.0]);
        invoke(&array, "sort", &[]);
        assert_eq!(array.to_display(), "1,10,100,9");
        let by_value = Value::native("compare", |_, args| {
            Ok(Value::Number(arg(args, 0).to_number() - arg(args, 1).to_number()))
        });
        invoke(&array, "sort", &[by_value]);
        assert_eq!(array.to_display(), "1,9,10,100");
    }

    #[test]
    fn inconsistent_comparators_do_not_panic() {
        let array = numbers(&[5.0, 3.0, 8.0, 1.0, 9.0, 2.0, 7.0]);
        let random = Value::native("chaos", |interpreter, _| {
            Ok(Value::Number(interpreter.next_random() - 0.5))
        });
        let sorted = invoke(&array, "toSorted", &[random]);
        assert_eq!(sorted.list_items().map(|items| items.len()), Some(7));
    }

    #[test]
    fn frozen_lists_reject_mutation() {
        let frozen = Value::list(vec![Value::Number(1.0)]);
        let mut interpreter = interpreter();
        let result = call(&mut interpreter, &frozen, "push", &[Value::Number(2.0)]);
        assert!(matches!(result, Some(Err(Exception::Thrown(_)))));
        let mapped = invoke(&frozen, "concat", &[numbers(&[2.0])]);
        assert_eq!(mapped.to_display(), "1,2");
    }

    #[test]
    fn splice_and_slice() {
        let array = numbers(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let removed = invoke(&array, "splice", &[Value::Number(1.0), Value::Number(2.0), Value::string("x")]);
        assert_eq!(removed.to_display(), "2,3");
        assert_eq!(array.to_display(), "1,x,4,5");
        assert_eq!(invoke(&array, "slice", &[Value::Number(-2.0)]).to_display(), "4,5");
    }

    #[test]
    fn flat_and_includes() {
        let nested = Value::array(vec![
            Value::Number(1.0),
            Value::array(vec![Value::Number(2.0), numbers(&[3.0])]),
        ]);
        assert_eq!(invoke(&nested, "flat", &[]).list_items().map(|items| items.len()), Some(3));
        assert_eq!(
            invoke(&nested, "flat", &[Value::Number(f64::INFINITY)]).to_display(),
            "1,2,3"
        );
        let with_nan = numbers(&[f64::NAN]);
        assert!(invoke(&with_nan, "includes", &[Value::Number(f64::NAN)]).is_truthy());
        assert_eq!(invoke(&with_nan, "indexOf", &[Value::Number(f64::NAN)]).to_number(), -1.0);
    }

    #[test]
    fn string_helpers() {
        let text = Value::string("Hello, wörld");
        assert_eq!(invoke(&text, "indexOf", &[Value::string("ö")]).to_number(), 8.0);
        assert_eq!(invoke(&text, "slice", &[Value::Number(-5.0)]).to_display(), "wörld");
        assert_eq!(
            invoke(&text, "split", &[Value::string(", ")]).to_display(),
            "Hello,wörld"
        );
        assert_eq!(
            invoke(&text, "replaceAll", &[Value::string("l"), Value::string("L")]).to_display(),
            "HeLLo, wörLd"
        );
        assert_eq!(
            invoke(&Value::string("7"), "padStart", &[Value::Number(3.0), Value::string("0")]).to_display(),
            "007"
        );
        assert_eq!(
            invoke(&Value::string("a"), "localeCompare", &[Value::string("B")]).to_number(),
            -1.0
        );
    }

    #[test]
    fn repeat_rejects_huge_strings() {
        let mut interpreter = interpreter();
        let result = call(
            &mut interpreter,
            &Value::string("abc"),
            "repeat",
            &[Value::Number(1e12)],
        );
        assert!(matches!(result, Some(Err(_))));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_fixed(2.5, 0), "3");
        assert_eq!(format_fixed(1.005, 2), "1.00");
        assert_eq!(format_fixed(-0.0001, 2), "0.00");
        assert_eq!(format_precision(123.456, 4), "123.5");
        assert_eq!(format_precision(123456.0, 2), "1.2e+5");
        assert_eq!(format_radix(255.0, 16), "ff");
        assert_eq!(format_radix(-5.0, 2), "-101");
        assert_eq!(locale_string(1234567.891, &Value::Undefined), "1,234,567.891");
        assert_eq!(locale_string(-0.5, &Value::Undefined), "-0.5");
        let currency = Value::record([("style", Value::string("currency")), ("currency", Value::string("USD"))]);
        assert_eq!(locale_string(1234.5, &currency), "$1,234.50");
        let percent = Value::record([("style", Value::string("percent"))]);
        assert_eq!(locale_string(0.256, &percent), "26%");
    }

    #[test]
    fn bound_methods_are_functions() {
        let array = numbers(&[1.0]);
        assert!(bound(&array, "map").is_some_and(|value| value.is_function()));
        assert!(bound(&array, "nope").is_none());
        let record = Value::record([("toString", Value::Number(1.0))]);
        let mut interpreter = interpreter();
        assert!(call(&mut interpreter, &record, "toString", &[]).is_none());
    }
}
