//! `recharts` stand-ins. Nothing is drawn: each chart renders a labelled
//! box describing what it would plot.

use std::rc::Rc;

use artifex::runtime;
use artifex::value::Properties;
use artifex::Value;

use super::children;

const CHARTS: &[&str] = &[
    "LineChart",
    "BarChart",
    "AreaChart",
    "PieChart",
    "RadarChart",
    "ScatterChart",
    "ComposedChart",
    "RadialBarChart",
];

const SERIES: &[&str] = &["Line", "Bar", "Area", "Pie", "Radar", "Scatter", "RadialBar"];

const PARTS: &[&str] = &[
    "XAxis",
    "YAxis",
    "ZAxis",
    "CartesianGrid",
    "Tooltip",
    "Legend",
    "Cell",
    "LabelList",
    "ReferenceLine",
    "PolarGrid",
    "PolarAngleAxis",
    "PolarRadiusAxis",
];

pub fn namespace() -> Value {
    let mut members: Vec<(&str, Value)> = Vec::new();
    members.push(("ResponsiveContainer", container()));
    members.extend(CHARTS.iter().map(|name| (*name, chart(*name))));
    members.extend(SERIES.iter().map(|name| (*name, series(*name))));
    members.extend(PARTS.iter().map(|name| (*name, part(*name))));
    Value::record(members)
}

fn text(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) | Value::Number(_) => Some(Value::string(value.to_display())),
        _ => None,
    }
}

fn container() -> Value {
    runtime::component("ResponsiveContainer", |_, props| {
        let mut style = Properties::new();
        for dimension in ["width", "height"] {
            let value = runtime::prop(props, dimension);
            if text(&value).is_some() {
                style.insert(Rc::from(dimension), value);
            }
        }
        let mut properties = Properties::new();
        properties.insert(Rc::from("className"), Value::string("recharts-responsive-container"));
        if !style.is_empty() {
            properties.insert(Rc::from("style"), Value::object(style));
        }
        Ok(runtime::element(Value::string("div"), properties, children(props)))
    })
}

fn chart(name: &'static str) -> Value {
    runtime::component(name, move |_, props| {
        let points = runtime::prop(props, "data")
            .list_items()
            .map_or(0, |items| items.len());
        let properties = Properties::from_iter([
            (Rc::from("className"), Value::string("artifex-chart")),
            (Rc::from("data-chart"), Value::string(name)),
            (Rc::from("data-points"), Value::Number(points as f64)),
        ]);
        let mut content = vec![runtime::element(
            Value::string("figcaption"),
            Properties::new(),
            vec![Value::string(format!("{name} with {points} data points"))],
        )];
        content.extend(children(props));
        Ok(runtime::element(Value::string("figure"), properties, content))
    })
}

fn series(name: &'static str) -> Value {
    runtime::component(name, move |_, props| {
        let mut properties = Properties::from_iter([(Rc::from("data-series"), Value::string(name))]);
        let annotated = [
            ("dataKey", "data-key"),
            ("name", "data-name"),
            ("stroke", "data-color"),
            ("fill", "data-fill"),
        ];
        for (prop, attribute) in annotated {
            if let Some(value) = text(&runtime::prop(props, prop)) {
                properties.insert(Rc::from(attribute), value);
            }
        }
        Ok(runtime::element(Value::string("div"), properties, Vec::new()))
    })
}

/// Axes, grids and overlays: marked but otherwise empty.
fn part(name: &'static str) -> Value {
    runtime::component(name, move |_, props| {
        let mut properties = Properties::from_iter([(Rc::from("data-chart-part"), Value::string(name))]);
        if let Some(key) = text(&runtime::prop(props, "dataKey")) {
            properties.insert(Rc::from("data-key"), key);
        }
        Ok(runtime::element(Value::string("div"), properties, Vec::new()))
    })
}
