//! Realistic generated components rendered against a small host kit.

use std::rc::Rc;

use artifex::runtime::{self, element, prop};
use artifex::value::Properties;
use artifex::{CapabilityRegistry, Engine, EngineConfig, Value};

fn card_kit() -> Value {
    let part = |name: &'static str, class: &'static str| {
        runtime::component(name, move |_, props| {
            let mut attributes = Properties::new();
            let extra = prop(props, "className");
            let class = if extra.is_nullish() {
                class.to_string()
            } else {
                format!("{class} {}", extra.to_display())
            };
            attributes.insert(Rc::from("className"), Value::string(class));
            Ok(element(Value::string("div"), attributes, vec![prop(props, "children")]))
        })
    };
    Value::record([
        ("Card", part("Card", "card")),
        ("CardHeader", part("CardHeader", "card-header")),
        ("CardContent", part("CardContent", "card-content")),
    ])
}

fn engine() -> Engine {
    let registry = CapabilityRegistry::builder()
        .register("react", runtime::namespace())
        .register("@/components/ui/card", card_kit())
        .build()
        .unwrap();
    Engine::new(Rc::new(registry), EngineConfig::default()).unwrap()
}

#[test]
fn dashboard_with_host_components() {
    let source = r#"
        import React, { useMemo, useState } from 'react';
        import { Card, CardHeader, CardContent } from '@/components/ui/card';

        const rows = [
          { name: 'Alpha', score: 3 },
          { name: 'Beta', score: 9 },
          { name: 'Gamma', score: 6 }
        ];

        export default function Dashboard() {
          const [filter] = useState('');
          const sorted = useMemo(
            () => [...rows].sort((a, b) => b.score - a.score).filter((row) => row.name.includes(filter)),
            [filter]
          );
          const total = sorted.reduce((sum, row) => sum + row.score, 0);
          return (
            <Card className="shadow">
              <CardHeader>Scores ({sorted.length})</CardHeader>
              <CardContent>
                <ol>
                  {sorted.map((row, index) => (
                    <li key={row.name} data-rank={index + 1}>
                      {row.name}: {row.score.toFixed(1)}
                    </li>
                  ))}
                </ol>
                <p>Average {(total / sorted.length).toFixed(2)}</p>
              </CardContent>
            </Card>
          );
        }
    "#;
    let mut engine = engine();
    let rendered = engine.render(Some(source), None);
    assert_eq!(
        rendered.to_html(),
        concat!(
            r#"<div class="card shadow">"#,
            r#"<div class="card-header">Scores (3)</div>"#,
            r#"<div class="card-content"><ol>"#,
            r#"<li data-rank="1">Beta: 9.0</li>"#,
            r#"<li data-rank="2">Gamma: 6.0</li>"#,
            r#"<li data-rank="3">Alpha: 3.0</li>"#,
            r#"</ol><p>Average 6.00</p></div></div>"#,
        )
    );
}

#[test]
fn conditional_rendering_and_templates() {
    let source = r#"
        export default ({ user, notices = [] }) => {
          const greeting = `Welcome back, ${user?.name ?? 'guest'}!`;
          return (
            <section>
              <h2 title={greeting}>{greeting}</h2>
              {notices.length > 0 ? (
                <ul>{notices.map((n) => <li key={n}>{n.toUpperCase()}</li>)}</ul>
              ) : (
                <p>No notices</p>
              )}
              {user && user.admin && <button disabled>Admin</button>}
            </section>
          );
        };
    "#;
    let mut engine = engine();
    let rendered = engine.render(Some(source), Some(&serde_json::json!({ "user": { "name": "Ada", "admin": true } })));
    assert_eq!(
        rendered.to_html(),
        concat!(
            r#"<section><h2 title="Welcome back, Ada!">Welcome back, Ada!</h2>"#,
            r#"<p>No notices</p><button disabled>Admin</button></section>"#,
        )
    );
    let rendered = engine.render(Some(source), Some(&serde_json::json!({ "notices": ["a", "b"] })));
    assert_eq!(
        rendered.to_html(),
        concat!(
            r#"<section><h2 title="Welcome back, guest!">Welcome back, guest!</h2>"#,
            r#"<ul><li>A</li><li>B</li></ul></section>"#,
        )
    );
}

#[test]
fn named_exports_without_default_fail_construction() {
    let mut engine = engine();
    let rendered = engine.render(Some("export const Widget = () => null;"), None);
    assert_eq!(
        rendered.error().map(|error| error.message()),
        Some("Component must be a function".to_string())
    );
}
