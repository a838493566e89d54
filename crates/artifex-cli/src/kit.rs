//! Reference capability kit: what generated components may import when
//! rendered from the command line.

mod charts;
mod icons;
mod ui;

use std::rc::Rc;

use artifex::runtime;
use artifex::value::Properties;
use artifex::{CapabilityRegistry, ConfigError, Value};

/// One registered capability, for `artifex capabilities`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Capability {
    pub name: &'static str,
    pub summary: &'static str,
    pub members: Vec<String>,
}

fn entries() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        ("react", "element runtime and static hooks", runtime::namespace()),
        ("@/components/ui/card", "card layout primitives", ui::card()),
        ("@/components/ui/button", "button with variants and sizes", ui::button()),
        ("@/components/ui/badge", "inline status badge", ui::badge()),
        ("@/components/ui/input", "text input", ui::input()),
        ("@/components/ui/alert", "callout box", ui::alert()),
        ("@/lib/utils", "class name helper `cn`", ui::utils()),
        ("@/components/apiAccess", "data fetch helper, static loading state", api_access()),
        ("recharts", "chart primitives as annotated placeholders", charts::namespace()),
        ("lucide-react", "icon set as tagged svg elements", icons::namespace()),
    ]
}

pub fn registry() -> Result<CapabilityRegistry, ConfigError> {
    entries()
        .into_iter()
        .fold(CapabilityRegistry::builder(), |builder, (name, _, value)| {
            builder.register(name, value)
        })
        .build()
}

pub fn describe() -> Vec<Capability> {
    entries()
        .into_iter()
        .map(|(name, summary, value)| Capability {
            name,
            summary,
            members: value
                .entries()
                .map(|entries| {
                    entries
                        .into_iter()
                        .map(|(member, _)| member.to_string())
                        .filter(|member| member != "default")
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

/// `ApiAccess` fetches after mount; a static render only ever shows its
/// loading state.
fn api_access() -> Value {
    let component = runtime::component("ApiAccess", |_, props| {
        log::debug!(
            target: "artifex::sandbox",
            "ApiAccess for {} renders its loading state",
            runtime::prop(props, "url").to_display()
        );
        Ok(runtime::element(
            Value::string("div"),
            Properties::new(),
            vec![Value::string("Loading...")],
        ))
    });
    Value::record([("default", component.clone()), ("ApiAccess", component)])
}

/// Copies every prop except `skip` and the class name, which is merged
/// after `base`.
pub(crate) fn pass_through(props: &Value, base: &str, skip: &[&str]) -> Properties {
    let mut properties = Properties::new();
    let class = ui::join_classes([base, runtime::prop(props, "className").as_str().unwrap_or("")]);
    if !class.is_empty() {
        properties.insert(Rc::from("className"), Value::string(class));
    }
    for (name, value) in props.entries().unwrap_or_default() {
        if !matches!(&*name, "className" | "children") && !skip.contains(&&*name) {
            properties.insert(name, value);
        }
    }
    properties
}

/// The `children` prop as an element child list.
pub(crate) fn children(props: &Value) -> Vec<Value> {
    match runtime::prop(props, "children") {
        Value::Undefined => Vec::new(),
        children => vec![children],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifex::{Engine, EngineConfig};

    pub(crate) fn render(source: &str) -> String {
        let registry = registry().unwrap();
        let mut engine = Engine::new(Rc::new(registry), EngineConfig::default()).unwrap();
        let rendered = engine.render(Some(source), None);
        assert!(!rendered.is_failed(), "{:?}", rendered.error());
        rendered.to_html()
    }

    #[test]
    fn every_capability_registers() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 10);
        assert!(registry.contains("@/components/apiAccess"));
    }

    #[test]
    fn descriptions_list_members() {
        let card = describe()
            .into_iter()
            .find(|capability| capability.name == "@/components/ui/card")
            .unwrap();
        assert!(card.members.contains(&"CardHeader".to_string()));
    }

    #[test]
    fn api_access_shows_loading() {
        let html = render(
            "import ApiAccess from '@/components/apiAccess';\n\
             export default () => <ApiAccess url=\"/weather\">{(data) => <p>{data.temp}</p>}</ApiAccess>;",
        );
        assert_eq!(html, "<div>Loading...</div>");
    }

    #[test]
    fn generated_clock_renders() {
        let html = render(
            "import React, { useState, useEffect } from 'react';\n\
             import { Clock } from 'lucide-react';\n\
             import { Card, CardContent } from '@/components/ui/card';\n\
             const Time = () => {\n\
               const [time] = useState('12:00');\n\
               useEffect(() => { const id = setInterval(() => {}, 1000); return () => clearInterval(id); }, []);\n\
               return <Card><CardContent><Clock size={16} />{time}</CardContent></Card>;\n\
             };\n\
             export default Time;",
        );
        assert!(html.contains("data-icon=\"clock\""));
        assert!(html.ends_with("12:00</div></div>"));
    }
}
