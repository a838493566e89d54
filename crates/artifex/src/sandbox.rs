//! The isolation boundary around invoking a loaded factory and turning its
//! element tree into a scene.

use std::rc::Rc;

use artifex_scene::{AttributeValue, ElementNode, Node};

use crate::error::{ExecutionError, RenderPhase, ScriptFailure};
use crate::interpreter::{Exception, Interpreter, Limits};
use crate::loader::LoadedModule;
use crate::value::{Element, Frozen, Value, number_to_string};

/// CSS properties that take plain numbers; every other number gets `px`.
const UNITLESS_PROPERTIES: &[&str] = &[
    "animationIterationCount",
    "aspectRatio",
    "borderImageOutset",
    "borderImageSlice",
    "borderImageWidth",
    "columnCount",
    "columns",
    "fillOpacity",
    "flex",
    "flexGrow",
    "flexShrink",
    "floodOpacity",
    "fontWeight",
    "gridArea",
    "gridColumn",
    "gridColumnEnd",
    "gridColumnStart",
    "gridRow",
    "gridRowEnd",
    "gridRowStart",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "scale",
    "stopOpacity",
    "strokeDasharray",
    "strokeDashoffset",
    "strokeMiterlimit",
    "strokeOpacity",
    "strokeWidth",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
];

/// Invokes the module's factory with the optional host data and
/// materializes the result.
pub fn render(
    module: &LoadedModule,
    data: Option<&serde_json::Value>,
    limits: Limits,
) -> Result<Vec<Node>, ExecutionError> {
    let factory = module.factory();
    if !factory.is_function() {
        return Err(ExecutionError::Render {
            phase: RenderPhase::Construction,
            failure: ScriptFailure::new("", "Component must be a function"),
        });
    }
    let mut interpreter = Interpreter::new(module.realm().clone(), limits);
    let arguments: Vec<Value> = data.map(Value::from_json).into_iter().collect();
    let tree = interpreter
        .call(factory, &arguments)
        .map_err(|exception| ExecutionError::from_render(RenderPhase::Construction, exception))?;

    let mut materializer = Materializer {
        interpreter: &mut interpreter,
        depth: 0,
        max_depth: limits.max_call_depth,
    };
    let mut nodes = Vec::new();
    materializer
        .materialize(&tree, &mut nodes)
        .map_err(|exception| ExecutionError::from_render(RenderPhase::Materialization, exception))?;
    log::debug!(
        target: "artifex::sandbox",
        "rendered {} top-level nodes in {} steps",
        nodes.len(),
        interpreter.steps()
    );
    Ok(nodes)
}

struct Materializer<'a> {
    interpreter: &'a mut Interpreter,
    depth: usize,
    max_depth: usize,
}

impl Materializer<'_> {
    fn materialize(&mut self, value: &Value, out: &mut Vec<Node>) -> Result<(), Exception> {
        self.interpreter.tick()?;
        match value {
            Value::Undefined | Value::Null | Value::Bool(_) => Ok(()),
            Value::String(text) => {
                push_text(out, text);
                Ok(())
            }
            Value::Number(number) => {
                push_text(out, &number_to_string(*number));
                Ok(())
            }
            Value::Array(items) => {
                let items = items.borrow().clone();
                self.materialize_all(&items, out)
            }
            Value::Frozen(frozen) => match frozen.as_ref() {
                Frozen::List(items) => self.materialize_all(items, out),
                Frozen::Record(properties) => Err(object_child(properties.keys())),
            },
            Value::Object(properties) => {
                let keys: Vec<_> = properties.borrow().keys().cloned().collect();
                Err(object_child(keys.iter()))
            }
            Value::Function(function) => {
                log::warn!(
                    target: "artifex::sandbox",
                    "function {} used as a child renders nothing",
                    if function.name().is_empty() { "(anonymous)" } else { function.name() }
                );
                Ok(())
            }
            Value::Element(element) => self.element(element, out),
        }
    }

    fn materialize_all(&mut self, items: &[Value], out: &mut Vec<Node>) -> Result<(), Exception> {
        items.iter().try_for_each(|item| self.materialize(item, out))
    }

    fn element(&mut self, element: &Element, out: &mut Vec<Node>) -> Result<(), Exception> {
        match &element.element_type {
            Value::String(tag) => {
                let mut node = ElementNode::new(tag.to_string());
                for (name, value) in element.props() {
                    if let Some((name, value)) = attribute(name, value) {
                        node.attributes.insert(name, value);
                    }
                }
                if !node.is_void() {
                    self.materialize(&element.prop("children"), &mut node.children)?;
                }
                out.push(Node::Element(node));
                Ok(())
            }
            component @ Value::Function(_) => {
                if self.depth >= self.max_depth {
                    return Err(Exception::range_error("Maximum call stack size exceeded"));
                }
                self.depth += 1;
                let props = Value::Frozen(element.props.clone());
                let result = self
                    .interpreter
                    .call(component, &[props])
                    .and_then(|rendered| self.materialize(&rendered, out));
                self.depth -= 1;
                result
            }
            other => Err(Exception::type_error(format!(
                "Element type is invalid: expected a string or a function but got: {}",
                other.type_of()
            ))),
        }
    }
}

fn push_text(out: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(Node::Text { text: previous }) => previous.push_str(text),
        _ => out.push(Node::text(text)),
    }
}

fn object_child<'a>(keys: impl Iterator<Item = &'a Rc<str>>) -> Exception {
    let keys: Vec<&str> = keys.map(|key| &**key).collect();
    Exception::type_error(format!(
        "Objects are not valid as a child (found: object with keys {{{}}})",
        keys.join(", ")
    ))
}

/// Scene attribute for one prop, or `None` when the prop does not render.
fn attribute(name: &str, value: &Value) -> Option<(String, AttributeValue)> {
    if matches!(name, "children" | "key" | "ref") {
        return None;
    }
    let rendered = match value {
        Value::Undefined | Value::Null | Value::Bool(false) | Value::Function(_) => return None,
        Value::Bool(true) => AttributeValue::Flag(true),
        _ if name == "style" => match value.entries() {
            Some(entries) => AttributeValue::Text(inline_style(&entries)?),
            None => AttributeValue::Text(value.to_display()),
        },
        Value::Number(number) => AttributeValue::Text(number_to_string(*number)),
        other => AttributeValue::Text(other.to_display()),
    };
    Some((attribute_name(name), rendered))
}

fn attribute_name(name: &str) -> String {
    match name {
        "className" => "class".to_string(),
        "htmlFor" => "for".to_string(),
        "strokeWidth" | "strokeLinecap" | "strokeLinejoin" | "strokeDasharray" | "fillOpacity"
        | "fillRule" | "clipRule" | "stopColor" | "textAnchor" => kebab_case(name),
        other => other.to_string(),
    }
}

/// `{ backgroundColor: 'red', width: 10 }` becomes
/// `background-color:red;width:10px`. `None` when nothing is left.
fn inline_style(entries: &[(Rc<str>, Value)]) -> Option<String> {
    let declarations: Vec<String> = entries
        .iter()
        .filter_map(|(property, value)| {
            let value = match value {
                Value::Number(number)
                    if *number != 0.0
                        && !property.starts_with("--")
                        && !UNITLESS_PROPERTIES.contains(&&**property) =>
                {
                    format!("{}px", number_to_string(*number))
                }
                Value::Number(number) => number_to_string(*number),
                Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
                _ => return None,
            };
            Some(format!("{}:{value}", css_property(property)))
        })
        .collect();
    (!declarations.is_empty()).then(|| declarations.join(";"))
}

fn css_property(property: &str) -> String {
    if property.starts_with("--") {
        return property.to_string();
    }
    let kebab = kebab_case(property);
    if kebab.starts_with("ms-") {
        format!("-{kebab}")
    } else {
        kebab
    }
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// The placeholder shown instead of a scene when any phase failed.
pub fn error_display(error: &ExecutionError) -> Node {
    let mut container = ElementNode::new("div")
        .with_attribute("class", "artifex-error")
        .with_attribute("role", "alert")
        .with_attribute("data-phase", format!("{:?}", error.kind()).to_lowercase())
        .with_attribute(
            "style",
            "border:1px solid #e53e3e;border-radius:4px;padding:12px;color:#9b2c2c;background:#fff5f5",
        );
    if let ExecutionError::Render { phase, .. } = error {
        container = container.with_attribute("data-render-phase", phase.to_string());
    }
    Node::Element(
        container
            .with_child(Node::Element(ElementNode::new("strong").with_text(error.title())))
            .with_child(Node::Element(
                ElementNode::new("pre")
                    .with_attribute("style", "white-space:pre-wrap;margin:8px 0 0")
                    .with_text(error.message()),
            )),
    )
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::error::ErrorKind;
    use crate::loader::ModuleLoader;
    use crate::runtime;
    use crate::source::SourceUnit;
    use crate::transform::TransformOptions;

    fn render_source(code: &str, data: Option<serde_json::Value>) -> Result<Vec<Node>, ExecutionError> {
        let registry = CapabilityRegistry::builder()
            .register("react", runtime::namespace())
            .build()
            .unwrap();
        let loader = ModuleLoader::new(Rc::new(registry), TransformOptions::default(), Limits::default());
        let module = loader.load(&SourceUnit::new(code))?;
        render(&module, data.as_ref(), Limits::default())
    }

    fn html(code: &str) -> String {
        artifex_scene::to_html(&render_source(code, None).unwrap())
    }

    #[test]
    fn intrinsic_elements_and_attributes() {
        assert_eq!(
            html(
                r#"export default () => (
                  <label className="field" htmlFor="name" hidden onClick={() => 1} title={null}>
                    Name: {"Ada"} {3}
                  </label>
                );"#
            ),
            r#"<label class="field" for="name" hidden>Name: Ada 3</label>"#
        );
    }

    #[test]
    fn style_objects_become_inline_css() {
        assert_eq!(
            html("export default () => <div style={{ backgroundColor: 'red', width: 10, opacity: 0.5, margin: 0, msTransform: 'none' }} />;"),
            r#"<div style="background-color:red;width:10px;opacity:0.5;margin:0;-ms-transform:none"></div>"#
        );
    }

    #[test]
    fn components_receive_props_and_children() {
        let code = r#"
            function Item({ label, children }) {
              return <li>{label}: {children}</li>;
            }
            export default ({ items }) => (
              <ul>
                {items.map((item) => <Item key={item} label={item}>{item.length}</Item>)}
                {false}{null}
              </ul>
            );
        "#;
        let nodes = render_source(code, Some(serde_json::json!({ "items": ["ab", "c"] }))).unwrap();
        assert_eq!(
            artifex_scene::to_html(&nodes),
            "<ul><li>ab: 2</li><li>c: 1</li></ul>"
        );
    }

    #[test]
    fn fragments_flatten() {
        assert_eq!(
            html("export default () => <><b>a</b>{[<i>b</i>, 'c']}</>;"),
            "<b>a</b><i>b</i>c"
        );
    }

    #[test]
    fn non_function_exports_fail_construction() {
        let error = render_source("export default 42;", None).unwrap_err();
        assert_eq!(
            error,
            ExecutionError::Render {
                phase: RenderPhase::Construction,
                failure: ScriptFailure::new("", "Component must be a function"),
            }
        );
    }

    #[test]
    fn throwing_factories_fail_construction() {
        let error = render_source("export default () => { throw new Error('boom'); };", None).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Render);
        assert_eq!(error.message(), "boom");
        assert!(matches!(error, ExecutionError::Render { phase: RenderPhase::Construction, .. }));
    }

    #[test]
    fn throwing_children_fail_materialization() {
        let code = r#"
            const Broken = () => { throw new Error('child broke'); };
            export default () => <div><Broken /></div>;
        "#;
        let error = render_source(code, None).unwrap_err();
        assert!(matches!(error, ExecutionError::Render { phase: RenderPhase::Materialization, .. }));
        assert_eq!(error.message(), "child broke");
    }

    #[test]
    fn objects_are_not_valid_children() {
        let error = render_source("export default () => <p>{{ a: 1 }}</p>;", None).unwrap_err();
        assert!(error.message().contains("object with keys {a}"), "{}", error.message());
        let error = render_source("export default () => { const X = 5; return <X />; };", None).unwrap_err();
        assert!(error.message().contains("Element type is invalid"));
    }

    #[test]
    fn self_rendering_components_hit_the_depth_limit() {
        let error = render_source("const Loop = () => <Loop />;\nexport default Loop;", None).unwrap_err();
        assert!(error.message().contains("Maximum call stack size exceeded"));
    }

    #[test]
    fn functions_as_children_render_nothing() {
        assert_eq!(html("export default () => <p>{() => 1}</p>;"), "<p></p>");
    }

    #[test]
    fn placeholder_names_the_phase() {
        let error = ExecutionError::Render {
            phase: RenderPhase::Materialization,
            failure: ScriptFailure::new("TypeError", "bad"),
        };
        let Node::Element(node) = error_display(&error) else {
            panic!("expected an element");
        };
        assert_eq!(node.attribute("data-phase"), Some("render"));
        assert_eq!(node.attribute("data-render-phase"), Some("materialization"));
        assert_eq!(node.find("strong").map(|strong| strong.children.clone()), Some(vec![Node::text("Render Error")]));
        assert_eq!(node.find("pre").map(|pre| pre.children.clone()), Some(vec![Node::text("TypeError: bad")]));
    }
}
