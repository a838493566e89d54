//! End-to-end behaviour of the engine facade.

use std::cell::Cell;
use std::rc::Rc;

use artifex::runtime;
use artifex::{
    CapabilityRegistry, Engine, EngineConfig, ErrorKind, ModuleState, Rendered, Value,
};

fn registry() -> Rc<CapabilityRegistry> {
    Rc::new(
        CapabilityRegistry::builder()
            .register("react", runtime::namespace())
            .build()
            .unwrap(),
    )
}

fn engine() -> Engine {
    Engine::new(registry(), EngineConfig::default()).unwrap()
}

fn kind(rendered: &Rendered) -> Option<ErrorKind> {
    rendered.error().map(|error| error.kind())
}

#[test]
fn valid_source_renders_a_stable_tree() {
    let mut engine = engine();
    let source = r#"
        import React, { useState } from 'react';

        export default function Counter() {
          const [count] = useState(2);
          return (
            <div className="counter">
              <span>Count: {count}</span>
              <button onClick={() => {}}>+</button>
            </div>
          );
        }
    "#;
    let first = engine.render(Some(source), None);
    assert!(matches!(*first, Rendered::Tree(_)));
    assert_eq!(
        first.to_html(),
        r#"<div class="counter"><span>Count: 2</span><button>+</button></div>"#
    );
    for _ in 0..3 {
        assert!(Rc::ptr_eq(&first, &engine.render(Some(source), None)));
    }
}

#[test]
fn unknown_capability_is_a_resolution_error_without_side_effects() {
    let effects = Rc::new(Cell::new(0));
    let counter = effects.clone();
    let registry = CapabilityRegistry::builder()
        .register("react", runtime::namespace())
        .register(
            "tracker",
            Value::native("tracker", move |_, _| {
                counter.set(counter.get() + 1);
                Ok(Value::Undefined)
            }),
        )
        .build()
        .unwrap();
    let mut engine = Engine::new(Rc::new(registry), EngineConfig::default()).unwrap();
    let rendered = engine.render(
        Some(
            "import tracker from 'tracker';\ntracker();\nimport { Foo } from 'not-registered';\nexport default () => Foo();",
        ),
        None,
    );
    assert_eq!(kind(&rendered), Some(ErrorKind::Resolution));
    assert!(rendered.error().unwrap().message().contains("not-registered"));
    assert_eq!(effects.get(), 0);
}

#[test]
fn caught_resolution_failures_still_fail() {
    let mut engine = engine();
    let rendered = engine.render(
        Some("let x;\ntry { x = require('fs'); } catch (e) { x = null; }\nexport default () => null;"),
        None,
    );
    assert_eq!(kind(&rendered), Some(ErrorKind::Resolution));
}

#[test]
fn unbalanced_jsx_is_a_transform_error() {
    let mut engine = engine();
    let rendered = engine.render(Some("export default () => <div>"), None);
    let error = rendered.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Transform);
    assert!(!error.message().is_empty());
    assert_eq!(engine.state("export default () => <div>"), ModuleState::TransformFailed);
    assert_eq!(engine.stats().renders, 0);
}

#[test]
fn identical_text_is_transformed_once() {
    let mut engine = engine();
    let source = "export default () => <p>same</p>;";
    engine.render(Some(source), None);
    let transforms = engine.stats().transforms;
    engine.render(Some(source), Some(&serde_json::json!({ "n": 1 })));
    engine.render(Some(source), None);
    assert_eq!(engine.stats().transforms, transforms);
    assert_eq!(engine.stats().loads, 1);
}

#[test]
fn empty_source_renders_nothing() {
    let mut engine = engine();
    assert_eq!(*engine.render(None, None), Rendered::Nothing);
    assert_eq!(*engine.render(Some(""), None), Rendered::Nothing);
    assert_eq!(engine.stats().transforms, 0);
}

#[test]
fn null_component_with_an_empty_registry() {
    let mut engine = Engine::new(Rc::new(CapabilityRegistry::empty()), EngineConfig::default()).unwrap();
    let rendered = engine.render(Some("export default () => null;"), None);
    assert_eq!(*rendered, Rendered::Tree(Vec::new()));
    assert!(rendered.to_scene().is_empty());
}

#[test]
fn thrown_errors_become_render_errors() {
    let mut engine = engine();
    let rendered = engine.render(
        Some("export default function App() { throw new Error(\"boom\"); }"),
        None,
    );
    assert_eq!(kind(&rendered), Some(ErrorKind::Render));
    assert!(rendered.to_html().contains("boom"));
}

#[test]
fn infinite_loops_fail_the_load() {
    let config = EngineConfig {
        step_budget: 50_000,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(registry(), config).unwrap();
    let rendered = engine.render(Some("for (;;) {}\nexport default () => null;"), None);
    assert_eq!(kind(&rendered), Some(ErrorKind::Load));

    // The engine keeps working afterwards.
    let rendered = engine.render(Some("export default () => <i>ok</i>;"), None);
    assert_eq!(rendered.to_html(), "<i>ok</i>");
}

#[test]
fn unbounded_recursion_is_a_range_error() {
    let config = EngineConfig {
        max_call_depth: 32,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(registry(), config).unwrap();
    let rendered = engine.render(
        Some("const f = (n) => f(n + 1);\nexport default () => f(0);"),
        None,
    );
    let error = rendered.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Render);
    assert!(error.message().contains("Maximum call stack size exceeded"));
}

#[test]
fn host_data_is_frozen() {
    let mut engine = engine();
    let rendered = engine.render(
        Some("export default (data) => { data.items.push(4); return null; };"),
        Some(&serde_json::json!({ "items": [1, 2, 3] })),
    );
    assert_eq!(kind(&rendered), Some(ErrorKind::Render));
    assert!(rendered.error().unwrap().message().contains("TypeError"));
}

#[test]
fn whitespace_between_expression_children_stays_single() {
    let mut engine = engine();
    let rendered = engine.render(
        Some("export default ({ name, count }) => <p>{name} {count}</p>;"),
        Some(&serde_json::json!({ "name": "Ada", "count": 3 })),
    );
    assert_eq!(rendered.to_html(), "<p>Ada 3</p>");
}

#[test]
fn deep_nesting_is_a_transform_error() {
    let mut engine = engine();
    let parentheses = format!("export default () => {}1{};", "(".repeat(10_000), ")".repeat(10_000));
    let elements = format!(
        "export default () => {}x{};",
        "<div>".repeat(5_000),
        "</div>".repeat(5_000)
    );
    for source in [parentheses.as_str(), elements.as_str()] {
        let rendered = engine.render(Some(source), None);
        let error = rendered.error().unwrap();
        assert_eq!(error.kind(), ErrorKind::Transform);
        assert!(error.message().contains("nesting depth exceeds 64"));
        assert_eq!(engine.state(source), ModuleState::TransformFailed);
    }

    let nested = format!("export default () => {}x{};", "<b>".repeat(20), "</b>".repeat(20));
    let rendered = engine.render(Some(nested.as_str()), None);
    assert_eq!(
        rendered.to_html(),
        format!("{}x{}", "<b>".repeat(20), "</b>".repeat(20))
    );
}
