//! Element runtime for hosts: the `createElement`/`Fragment` pair lowered
//! JSX calls into, plus hooks that behave as one static render.
//!
//! Hosts register [`namespace`] under the capability name configured as
//! `TransformOptions::jsx_runtime` (usually `react`).

use std::rc::Rc;

use crate::interpreter::{Exception, Interpreter};
use crate::value::{Element, Frozen, Properties, Value};

/// The runtime namespace: `createElement`, `Fragment` and the hooks.
pub fn namespace() -> Value {
    let entries: Vec<(&str, Value)> = vec![
        ("createElement", Value::native("createElement", create_element)),
        ("Fragment", fragment()),
        ("useState", Value::native("useState", use_state)),
        ("useReducer", Value::native("useReducer", use_reducer)),
        ("useEffect", inert("useEffect")),
        ("useLayoutEffect", inert("useLayoutEffect")),
        ("useMemo", Value::native("useMemo", use_memo)),
        ("useCallback", Value::native("useCallback", |_, args| Ok(arg(args, 0)))),
        ("useRef", Value::native("useRef", use_ref)),
        ("useId", Value::native("useId", |_, _| Ok(Value::string(":r0:")))),
        ("createContext", Value::native("createContext", create_context)),
        ("useContext", Value::native("useContext", use_context)),
        ("memo", Value::native("memo", |_, args| Ok(arg(args, 0)))),
        ("forwardRef", Value::native("forwardRef", forward_ref)),
    ];
    let record = Value::record(entries.iter().cloned());
    // `import React from 'react'` and `import * as React` both work.
    Value::record(entries.into_iter().chain([("default", record)]))
}

/// Builds an element value from host code, e.g. a capability component
/// returning a `<div>`.
pub fn element(element_type: Value, props: Properties, children: Vec<Value>) -> Value {
    let mut props = props;
    match children.len() {
        0 => {}
        1 => {
            props.insert(Rc::from("children"), children.into_iter().next().unwrap_or_default());
        }
        _ => {
            props.insert(Rc::from("children"), Value::list(children));
        }
    }
    Value::Element(Rc::new(Element {
        element_type,
        key: None,
        props: Rc::new(Frozen::Record(props)),
    }))
}

/// Wraps a host render function as a component: it receives the frozen
/// props record.
pub fn component(
    name: &str,
    render: impl Fn(&mut Interpreter, &Value) -> Result<Value, Exception> + 'static,
) -> Value {
    Value::native(name, move |interpreter, args| {
        let props = arg(args, 0);
        render(interpreter, &props)
    })
}

/// Reads a member of a props record; `undefined` when absent.
pub fn prop(props: &Value, name: &str) -> Value {
    match props {
        Value::Frozen(frozen) => frozen
            .as_record()
            .and_then(|record| record.get(name))
            .cloned()
            .unwrap_or_default(),
        Value::Object(properties) => properties.borrow().get(name).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// `createElement(type, props, ...children)`
fn create_element(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let element_type = arg(args, 0);
    let mut props = Properties::new();
    let mut key = None;
    if let Some(entries) = arg(args, 1).entries() {
        for (name, value) in entries {
            match &*name {
                "key" => {
                    if !value.is_nullish() {
                        key = Some(Rc::from(value.to_display()));
                    }
                }
                "ref" => {}
                _ => {
                    props.insert(name, value);
                }
            }
        }
    }
    let children = args.get(2..).unwrap_or_default();
    match children {
        [] => {}
        [child] => {
            props.insert(Rc::from("children"), child.clone());
        }
        children => {
            props.insert(Rc::from("children"), Value::list(children.to_vec()));
        }
    }
    Ok(Value::Element(Rc::new(Element {
        element_type,
        key,
        props: Rc::new(Frozen::Record(props)),
    })))
}

/// A component that renders its children unchanged.
fn fragment() -> Value {
    component("Fragment", |_, props| Ok(prop(props, "children")))
}

fn inert(name: &str) -> Value {
    Value::native(name, |_, _| Ok(Value::Undefined))
}

fn setter(name: &str) -> Value {
    let hook = name.to_string();
    Value::native(name, move |_, _| {
        log::debug!(
            target: "artifex::sandbox",
            "{hook} called during a static render; the update is ignored"
        );
        Ok(Value::Undefined)
    })
}

/// `useState(initial)`: lazy initializers are called once.
fn use_state(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let initial = arg(args, 0);
    let state = if initial.is_function() {
        interpreter.call(&initial, &[])?
    } else {
        initial
    };
    Ok(Value::array(vec![state, setter("setState")]))
}

/// `useReducer(reducer, initialArg, init?)`
fn use_reducer(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let initial = arg(args, 1);
    let init = arg(args, 2);
    let state = if init.is_function() {
        interpreter.call(&init, &[initial])?
    } else {
        initial
    };
    Ok(Value::array(vec![state, setter("dispatch")]))
}

fn use_memo(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let factory = arg(args, 0);
    interpreter.call(&factory, &[])
}

fn use_ref(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::object(Properties::from_iter([(
        Rc::from("current"),
        arg(args, 0),
    )])))
}

/// Contexts carry only their default; a `Provider` renders its children.
fn create_context(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::record([
        ("defaultValue", arg(args, 0)),
        ("Provider", fragment()),
        ("Consumer", fragment()),
    ]))
}

fn use_context(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    Ok(prop(&arg(args, 0), "defaultValue"))
}

fn forward_ref(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let render = arg(args, 0);
    Ok(Value::native("ForwardRef", move |interpreter, args| {
        interpreter.call(&render, &[arg(args, 0), Value::Null])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Limits, Realm, intrinsics};

    fn interpreter() -> Interpreter {
        Interpreter::new(Realm::new(intrinsics()), Limits::default())
    }

    fn member(interpreter: &mut Interpreter, name: &str) -> Value {
        interpreter.get_property(&namespace(), name).unwrap()
    }

    #[test]
    fn create_element_packs_children_and_key() {
        let mut interpreter = interpreter();
        let create = member(&mut interpreter, "createElement");
        let props = Value::object(Properties::from_iter([
            (Rc::from("key"), Value::Number(3.0)),
            (Rc::from("id"), Value::string("a")),
        ]));
        let element = interpreter
            .call(
                &create,
                &[Value::string("li"), props, Value::string("x"), Value::string("y")],
            )
            .unwrap();
        let Value::Element(element) = element else {
            panic!("expected an element");
        };
        assert_eq!(element.key.as_deref(), Some("3"));
        assert_eq!(element.prop("id").to_display(), "a");
        assert!(element.prop("key").is_nullish());
        assert_eq!(element.prop("children").list_items().map(|items| items.len()), Some(2));
    }

    #[test]
    fn single_child_is_not_wrapped() {
        let mut interpreter = interpreter();
        let create = member(&mut interpreter, "createElement");
        let element = interpreter
            .call(&create, &[Value::string("b"), Value::Null, Value::string("bold")])
            .unwrap();
        let Value::Element(element) = element else {
            panic!("expected an element");
        };
        assert_eq!(element.prop("children").as_str(), Some("bold"));
    }

    #[test]
    fn fragment_renders_children() {
        let mut interpreter = interpreter();
        let fragment = member(&mut interpreter, "Fragment");
        let props = Value::record([("children", Value::string("inside"))]);
        let rendered = interpreter.call(&fragment, &[props]).unwrap();
        assert_eq!(rendered.as_str(), Some("inside"));
    }

    #[test]
    fn hooks_render_statically() {
        let mut interpreter = interpreter();
        let use_state = member(&mut interpreter, "useState");
        let pair = interpreter.call(&use_state, &[Value::Number(5.0)]).unwrap();
        let items = pair.list_items().unwrap();
        assert_eq!(items[0].as_number(), Some(5.0));
        let set = items[1].clone();
        assert!(matches!(interpreter.call(&set, &[Value::Number(6.0)]), Ok(Value::Undefined)));

        let use_ref = member(&mut interpreter, "useRef");
        let reference = interpreter.call(&use_ref, &[Value::Null]).unwrap();
        interpreter
            .set_property(&reference, "current", Value::Bool(true))
            .unwrap();

        let use_effect = member(&mut interpreter, "useEffect");
        let effect = Value::native("effect", |_, _| Err(Exception::type_error("ran")));
        assert!(interpreter.call(&use_effect, &[effect]).is_ok());
    }

    #[test]
    fn default_member_mirrors_the_namespace() {
        let mut interpreter = interpreter();
        let default = member(&mut interpreter, "default");
        assert!(interpreter.get_property(&default, "createElement").unwrap().is_function());
    }
}
