//! `lucide-react` icons as empty `<svg data-icon=...>` elements.

use std::rc::Rc;

use artifex::runtime;
use artifex::value::Properties;
use artifex::Value;

use super::pass_through;

const ICONS: &[&str] = &[
    "Activity", "AlertCircle", "AlertTriangle", "ArrowDown", "ArrowLeft", "ArrowRight",
    "ArrowUp", "BarChart3", "Bell", "Calendar", "Check", "CheckCircle", "ChevronDown",
    "ChevronLeft", "ChevronRight", "ChevronUp", "Clock", "Cloud", "CloudRain", "Copy",
    "DollarSign", "Download", "Edit", "ExternalLink", "Eye", "EyeOff", "Filter", "Heart",
    "Home", "Info", "Loader2", "Lock", "Mail", "MapPin", "Menu", "Minus", "Moon",
    "MoreHorizontal", "Pause", "Phone", "Play", "Plus", "RefreshCw", "Save", "Search",
    "Send", "Settings", "Share2", "ShoppingCart", "Star", "Sun", "Thermometer", "Trash2",
    "TrendingDown", "TrendingUp", "Upload", "User", "Users", "Wind", "X", "XCircle", "Zap",
];

pub fn namespace() -> Value {
    Value::record(ICONS.iter().map(|name| (*name, icon(*name))))
}

fn icon(name: &'static str) -> Value {
    let slug = slug(name);
    runtime::component(name, move |_, props| {
        let size = match runtime::prop(props, "size") {
            Value::Undefined => Value::Number(24.0),
            size => size,
        };
        let stroke = match runtime::prop(props, "color") {
            Value::Undefined => Value::string("currentColor"),
            color => color,
        };
        let stroke_width = match runtime::prop(props, "strokeWidth") {
            Value::Undefined => Value::Number(2.0),
            width => width,
        };
        let mut properties = pass_through(
            props,
            &format!("lucide lucide-{slug}"),
            &["size", "color", "strokeWidth"],
        );
        for (attribute, value) in [
            ("data-icon", Value::string(&slug)),
            ("width", size.clone()),
            ("height", size),
            ("viewBox", Value::string("0 0 24 24")),
            ("fill", Value::string("none")),
            ("stroke", stroke),
            ("strokeWidth", stroke_width),
            ("aria-hidden", Value::string("true")),
        ] {
            properties.entry(Rc::from(attribute)).or_insert(value);
        }
        Ok(runtime::element(Value::string("svg"), properties, Vec::new()))
    })
}

/// `Trash2` -> `trash-2`, `XCircle` -> `x-circle`.
fn slug(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (index, &c) in chars.iter().enumerate() {
        if let Some(&previous) = index.checked_sub(1).and_then(|i| chars.get(i)) {
            let next_lower = chars.get(index + 1).is_some_and(char::is_ascii_lowercase);
            let boundary = if c.is_ascii_uppercase() {
                !previous.is_ascii_uppercase() || next_lower
            } else {
                c.is_ascii_digit() && !previous.is_ascii_digit()
            };
            if boundary {
                out.push('-');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}
