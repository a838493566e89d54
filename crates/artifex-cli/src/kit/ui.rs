//! Styled primitives under `@/components/ui/*` and the `cn` helper.

use artifex::Value;
use artifex::interpreter::{Exception, Interpreter};
use artifex::runtime;

use super::{children, pass_through};

/// A component rendering `tag` with `base` classes in front of its own.
fn styled(name: &str, tag: &'static str, base: &'static str) -> Value {
    runtime::component(name, move |_, props| {
        Ok(runtime::element(
            Value::string(tag),
            pass_through(props, base, &[]),
            children(props),
        ))
    })
}

pub fn card() -> Value {
    Value::record([
        ("Card", styled("Card", "div", "rounded-lg border bg-card text-card-foreground shadow-sm")),
        ("CardHeader", styled("CardHeader", "div", "flex flex-col space-y-1.5 p-6")),
        (
            "CardTitle",
            styled("CardTitle", "h3", "text-2xl font-semibold leading-none tracking-tight"),
        ),
        (
            "CardDescription",
            styled("CardDescription", "p", "text-sm text-muted-foreground"),
        ),
        ("CardContent", styled("CardContent", "div", "p-6 pt-0")),
        ("CardFooter", styled("CardFooter", "div", "flex items-center p-6 pt-0")),
    ])
}

const BUTTON_BASE: &str = "inline-flex items-center justify-center rounded-md text-sm font-medium";

fn button_variant(variant: &str) -> &'static str {
    match variant {
        "destructive" => "bg-destructive text-destructive-foreground hover:bg-destructive/90",
        "outline" => "border border-input bg-background hover:bg-accent",
        "secondary" => "bg-secondary text-secondary-foreground hover:bg-secondary/80",
        "ghost" => "hover:bg-accent hover:text-accent-foreground",
        "link" => "text-primary underline-offset-4 hover:underline",
        _ => "bg-primary text-primary-foreground hover:bg-primary/90",
    }
}

fn button_size(size: &str) -> &'static str {
    match size {
        "sm" => "h-9 rounded-md px-3",
        "lg" => "h-11 rounded-md px-8",
        "icon" => "h-10 w-10",
        _ => "h-10 px-4 py-2",
    }
}

pub fn button() -> Value {
    let button = runtime::component("Button", |_, props| {
        let variant = runtime::prop(props, "variant");
        let size = runtime::prop(props, "size");
        let base = join_classes([
            BUTTON_BASE,
            button_variant(variant.as_str().unwrap_or_default()),
            button_size(size.as_str().unwrap_or_default()),
        ]);
        Ok(runtime::element(
            Value::string("button"),
            pass_through(props, &base, &["variant", "size", "asChild"]),
            children(props),
        ))
    });
    Value::record([("Button", button)])
}

pub fn badge() -> Value {
    let badge = runtime::component("Badge", |_, props| {
        let variant = match runtime::prop(props, "variant").as_str() {
            Some("secondary") => "border-transparent bg-secondary text-secondary-foreground",
            Some("destructive") => "border-transparent bg-destructive text-destructive-foreground",
            Some("outline") => "text-foreground",
            _ => "border-transparent bg-primary text-primary-foreground",
        };
        let base = join_classes([
            "inline-flex items-center rounded-full border px-2.5 py-0.5 text-xs font-semibold",
            variant,
        ]);
        Ok(runtime::element(
            Value::string("div"),
            pass_through(props, &base, &["variant"]),
            children(props),
        ))
    });
    Value::record([("Badge", badge)])
}

pub fn input() -> Value {
    Value::record([(
        "Input",
        styled(
            "Input",
            "input",
            "flex h-10 w-full rounded-md border border-input bg-background px-3 py-2 text-sm",
        ),
    )])
}

pub fn alert() -> Value {
    let alert = runtime::component("Alert", |_, props| {
        let variant = match runtime::prop(props, "variant").as_str() {
            Some("destructive") => "border-destructive/50 text-destructive",
            _ => "bg-background text-foreground",
        };
        let mut properties = pass_through(
            props,
            &join_classes(["relative w-full rounded-lg border p-4", variant]),
            &["variant"],
        );
        properties.insert("role".into(), Value::string("alert"));
        Ok(runtime::element(Value::string("div"), properties, children(props)))
    });
    Value::record([
        ("Alert", alert),
        (
            "AlertTitle",
            styled("AlertTitle", "h5", "mb-1 font-medium leading-none tracking-tight"),
        ),
        ("AlertDescription", styled("AlertDescription", "div", "text-sm")),
    ])
}

pub fn utils() -> Value {
    Value::record([("cn", Value::native("cn", cn))])
}

/// `cn(...inputs)`: strings, numbers, nested arrays and `{ class: flag }`
/// records, falsy inputs skipped.
fn cn(_: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    let mut classes = Vec::new();
    collect_classes(args, &mut classes);
    Ok(Value::string(classes.join(" ")))
}

fn collect_classes(inputs: &[Value], out: &mut Vec<String>) {
    for input in inputs {
        if !input.is_truthy() {
            continue;
        }
        match input {
            Value::String(_) | Value::Number(_) => out.push(input.to_display()),
            Value::Array(_) => collect_classes(&input.list_items().unwrap_or_default(), out),
            Value::Frozen(frozen) if frozen.as_list().is_some() => {
                collect_classes(&input.list_items().unwrap_or_default(), out)
            }
            Value::Object(_) | Value::Frozen(_) => out.extend(
                input
                    .entries()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|(_, enabled)| enabled.is_truthy())
                    .map(|(class, _)| class.to_string()),
            ),
            _ => {}
        }
    }
}

pub(crate) fn join_classes<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit::tests::render;

    #[test]
    fn card_parts_merge_classes() {
        let html = render(
            "import { Card, CardTitle } from '@/components/ui/card';\n\
             export default () => <Card className=\"w-64\" id=\"c\"><CardTitle>Hi</CardTitle></Card>;",
        );
        assert_eq!(
            html,
            "<div class=\"rounded-lg border bg-card text-card-foreground shadow-sm w-64\" id=\"c\">\
             <h3 class=\"text-2xl font-semibold leading-none tracking-tight\">Hi</h3></div>"
        );
    }

    #[test]
    fn button_variants_pick_classes() {
        let html = render(
            "import { Button } from '@/components/ui/button';\n\
             export default () => <Button variant=\"outline\" size=\"sm\" disabled>Go</Button>;",
        );
        assert!(html.starts_with("<button class=\"inline-flex"));
        assert!(html.contains("border border-input"));
        assert!(html.contains("h-9"));
        assert!(html.contains(" disabled"));
        assert!(!html.contains("variant"));
    }

    #[test]
    fn alerts_carry_a_role() {
        let html = render(
            "import { Alert, AlertDescription } from '@/components/ui/alert';\n\
             export default () => <Alert variant=\"destructive\"><AlertDescription>Down</AlertDescription></Alert>;",
        );
        assert!(html.contains("role=\"alert\""));
        assert!(html.contains("text-destructive"));
    }

    #[test]
    fn cn_flattens_inputs() {
        let html = render(
            "import { cn } from '@/lib/utils';\n\
             export default () => <p className={cn('a', false && 'b', ['c', ['d']], { e: true, f: 0 }, null)} />;",
        );
        assert_eq!(html, "<p class=\"a c d e\"></p>");
    }

    #[test]
    fn join_classes_normalizes_whitespace() {
        assert_eq!(join_classes(["  a b ", "", "c"]), "a b c");
    }
}
