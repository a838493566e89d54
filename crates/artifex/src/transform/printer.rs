//! Prints lowered units back as source text, for `artifex transform` and
//! for inspecting what the loader actually runs.

use crate::parser::{
    Argument, ArrayElement, Expression, Function, FunctionBody, LogicalOperator, MemberProperty,
    ObjectMember, Parameter, Pattern, PropertyKey, Statement, TemplatePart,
};
use crate::value::number_to_string;

const ASSIGNMENT: u8 = 2;
const CONDITIONAL: u8 = 4;
const PREFIX: u8 = 15;
const POSTFIX: u8 = 16;
const CALL: u8 = 18;
const PRIMARY: u8 = 20;

pub(super) fn print(statements: &[Statement]) -> String {
    let mut printer = Printer::default();
    for statement in statements {
        printer.statement(statement);
    }
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn start_line(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn block(&mut self, statements: &[Statement]) {
        if statements.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{\n");
        self.indent += 1;
        for statement in statements {
            self.statement(statement);
        }
        self.indent -= 1;
        self.start_line();
        self.push("}");
    }

    /// Statement used as an `if`/loop body: blocks stay on the same line.
    fn body(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(statements) => {
                self.push(" ");
                self.block(statements);
            }
            other => {
                self.push("\n");
                self.indent += 1;
                self.start_line();
                self.statement_inline(other);
                self.indent -= 1;
            }
        }
    }

    fn statement(&mut self, statement: &Statement) {
        self.start_line();
        self.statement_inline(statement);
        self.push("\n");
    }

    fn statement_inline(&mut self, statement: &Statement) {
        match statement {
            Statement::Declaration { .. } | Statement::Expression(_) => {
                self.head(statement);
                self.push(";");
            }
            Statement::Function(function) => self.function(function),
            Statement::Return(argument) => {
                self.push("return");
                if let Some(argument) = argument {
                    self.push(" ");
                    self.expression(argument, 0);
                }
                self.push(";");
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                self.push("if (");
                self.expression(test, 0);
                self.push(")");
                self.body(consequent);
                if let Some(alternate) = alternate {
                    if matches!(**consequent, Statement::Block(_)) {
                        self.push(" else");
                    } else {
                        self.push("\n");
                        self.start_line();
                        self.push("else");
                    }
                    match &**alternate {
                        Statement::If { .. } => {
                            self.push(" ");
                            self.statement_inline(alternate);
                        }
                        other => self.body(other),
                    }
                }
            }
            Statement::For {
                init,
                test,
                update,
                body,
            } => {
                self.push("for (");
                if let Some(init) = init {
                    self.head(init);
                }
                self.push(";");
                if let Some(test) = test {
                    self.push(" ");
                    self.expression(test, 0);
                }
                self.push(";");
                if let Some(update) = update {
                    self.push(" ");
                    self.expression(update, 0);
                }
                self.push(")");
                self.body(body);
            }
            Statement::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                self.push("for (");
                self.push(kind.as_str());
                self.push(" ");
                self.pattern(pattern);
                self.push(" of ");
                self.expression(iterable, ASSIGNMENT);
                self.push(")");
                self.body(body);
            }
            Statement::While { test, body } => {
                self.push("while (");
                self.expression(test, 0);
                self.push(")");
                self.body(body);
            }
            Statement::Switch {
                discriminant,
                cases,
            } => {
                self.push("switch (");
                self.expression(discriminant, 0);
                self.push(") {\n");
                self.indent += 1;
                for case in cases {
                    self.start_line();
                    match &case.test {
                        Some(test) => {
                            self.push("case ");
                            self.expression(test, 0);
                            self.push(":\n");
                        }
                        None => self.push("default:\n"),
                    }
                    self.indent += 1;
                    for statement in &case.body {
                        self.statement(statement);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.start_line();
                self.push("}");
            }
            Statement::Break => self.push("break;"),
            Statement::Continue => self.push("continue;"),
            Statement::Throw(argument) => {
                self.push("throw ");
                self.expression(argument, 0);
                self.push(";");
            }
            Statement::Try {
                block,
                handler,
                finalizer,
            } => {
                self.push("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.push(" catch ");
                    if let Some(param) = &handler.param {
                        self.push("(");
                        self.pattern(param);
                        self.push(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.push(" finally ");
                    self.block(finalizer);
                }
            }
            Statement::Block(statements) => self.block(statements),
            Statement::Empty => self.push(";"),
        }
    }

    /// Declarations and expression statements without the semicolon, as
    /// they appear in a `for` head.
    fn head(&mut self, statement: &Statement) {
        match statement {
            Statement::Declaration { kind, declarators } => {
                self.push(kind.as_str());
                self.push(" ");
                for (index, declarator) in declarators.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    self.pattern(&declarator.pattern);
                    if let Some(init) = &declarator.init {
                        self.push(" = ");
                        self.expression(init, ASSIGNMENT);
                    }
                }
            }
            Statement::Expression(expression) => {
                let text = self.nested(|printer| printer.expression(expression, 0));
                if text.starts_with('{') || text.starts_with("function") {
                    self.push("(");
                    self.push(&text);
                    self.push(")");
                } else {
                    self.push(&text);
                }
            }
            other => self.statement_inline(other),
        }
    }

    /// Prints into a scratch buffer at the current indentation.
    fn nested(&mut self, print: impl FnOnce(&mut Printer)) -> String {
        let mut printer = Printer {
            out: String::new(),
            indent: self.indent,
        };
        print(&mut printer);
        printer.out
    }

    fn function(&mut self, function: &Function) {
        if function.is_async {
            self.push("async ");
        }
        if function.is_arrow {
            self.parameters(&function.params);
            self.push(" => ");
            match &function.body {
                FunctionBody::Expression(body) if matches!(**body, Expression::Object(_)) => {
                    self.push("(");
                    self.expression(body, 0);
                    self.push(")");
                }
                FunctionBody::Expression(body) => self.expression(body, ASSIGNMENT),
                FunctionBody::Block(statements) => self.block(statements),
            }
            return;
        }
        self.push("function");
        if let Some(name) = &function.name {
            self.push(" ");
            self.push(name);
        }
        self.parameters(&function.params);
        self.push(" ");
        match &function.body {
            FunctionBody::Block(statements) => self.block(statements),
            FunctionBody::Expression(body) => {
                self.push("{ return ");
                self.expression(body, 0);
                self.push("; }");
            }
        }
    }

    fn parameters(&mut self, parameters: &[Parameter]) {
        self.push("(");
        for (index, parameter) in parameters.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            if parameter.rest {
                self.push("...");
            }
            self.pattern(&parameter.pattern);
            if let Some(default) = &parameter.default {
                self.push(" = ");
                self.expression(default, ASSIGNMENT);
            }
        }
        self.push(")");
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Identifier(name) => self.push(name),
            Pattern::Object { properties, rest } => {
                if properties.is_empty() && rest.is_none() {
                    self.push("{}");
                    return;
                }
                self.push("{ ");
                for (index, property) in properties.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    match &property.value {
                        Pattern::Identifier(local) if *local == property.key => self.push(local),
                        value => {
                            self.key(&property.key);
                            self.push(": ");
                            self.pattern(value);
                        }
                    }
                    if let Some(default) = &property.default {
                        self.push(" = ");
                        self.expression(default, ASSIGNMENT);
                    }
                }
                if let Some(rest) = rest {
                    if !properties.is_empty() {
                        self.push(", ");
                    }
                    self.push("...");
                    self.push(rest);
                }
                self.push(" }");
            }
            Pattern::Array { elements, rest } => {
                self.push("[");
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    if let Some(element) = element {
                        self.pattern(&element.pattern);
                        if let Some(default) = &element.default {
                            self.push(" = ");
                            self.expression(default, ASSIGNMENT);
                        }
                    }
                }
                if matches!(elements.last(), Some(None)) && rest.is_none() {
                    self.push(",");
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        self.push(", ");
                    }
                    self.push("...");
                    self.pattern(rest);
                }
                self.push("]");
            }
        }
    }

    fn key(&mut self, key: &str) {
        if is_identifier_name(key) {
            self.push(key);
        } else {
            self.string(key);
        }
    }

    fn string(&mut self, text: &str) {
        match serde_json::to_string(text) {
            Ok(quoted) => self.push(&quoted),
            Err(_) => {
                self.push("\"");
                self.push(text);
                self.push("\"");
            }
        }
    }

    fn arguments(&mut self, arguments: &[Argument]) {
        self.push("(");
        for (index, argument) in arguments.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            match argument {
                Argument::Value(expression) => self.expression(expression, ASSIGNMENT),
                Argument::Spread(expression) => {
                    self.push("...");
                    self.expression(expression, ASSIGNMENT);
                }
            }
        }
        self.push(")");
    }

    /// Prints `expression`, parenthesized when it binds looser than
    /// `minimum`.
    fn expression(&mut self, expression: &Expression, minimum: u8) {
        if precedence(expression) < minimum {
            self.push("(");
            self.expression_unwrapped(expression);
            self.push(")");
        } else {
            self.expression_unwrapped(expression);
        }
    }

    fn expression_unwrapped(&mut self, expression: &Expression) {
        match expression {
            Expression::Number(number) => self.push(&number_to_string(*number)),
            Expression::String(text) => self.string(text),
            Expression::Template(parts) => {
                self.push("`");
                for part in parts {
                    match part {
                        TemplatePart::String(text) => {
                            let escaped = text
                                .replace('\\', "\\\\")
                                .replace('`', "\\`")
                                .replace("${", "\\${");
                            self.push(&escaped);
                        }
                        TemplatePart::Expression(expression) => {
                            self.push("${");
                            self.expression(expression, 0);
                            self.push("}");
                        }
                    }
                }
                self.push("`");
            }
            Expression::Boolean(value) => self.push(if *value { "true" } else { "false" }),
            Expression::Null => self.push("null"),
            Expression::Undefined => self.push("undefined"),
            Expression::Identifier(name) => self.push(name),
            Expression::Array(elements) => {
                self.push("[");
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    match element {
                        ArrayElement::Item(expression) => self.expression(expression, ASSIGNMENT),
                        ArrayElement::Spread(expression) => {
                            self.push("...");
                            self.expression(expression, ASSIGNMENT);
                        }
                    }
                }
                self.push("]");
            }
            Expression::Object(members) => {
                if members.is_empty() {
                    self.push("{}");
                    return;
                }
                self.push("{ ");
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    match member {
                        ObjectMember::Property { key, value } => {
                            match key {
                                PropertyKey::Named(name) => self.key(name),
                                PropertyKey::Computed(key) => {
                                    self.push("[");
                                    self.expression(key, ASSIGNMENT);
                                    self.push("]");
                                }
                            }
                            self.push(": ");
                            self.expression(value, ASSIGNMENT);
                        }
                        ObjectMember::Spread(expression) => {
                            self.push("...");
                            self.expression(expression, ASSIGNMENT);
                        }
                    }
                }
                self.push(" }");
            }
            Expression::Function(function) => self.function(function),
            Expression::Unary { operator, argument } => {
                self.push(operator.as_str());
                let text = self.nested(|printer| printer.expression(argument, PREFIX));
                let word = operator.as_str().ends_with(|c: char| c.is_ascii_alphabetic());
                let sign_clash = text.starts_with(['-', '+']) && !word;
                if word || sign_clash {
                    self.push(" ");
                }
                self.push(&text);
            }
            Expression::Update {
                operator,
                prefix,
                target,
            } => {
                if *prefix {
                    self.push(operator.as_str());
                    self.expression(target, POSTFIX);
                } else {
                    self.expression(target, POSTFIX);
                    self.push(operator.as_str());
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let precedence = operator.precedence();
                self.expression(left, precedence);
                self.push(" ");
                self.push(operator.as_str());
                self.push(" ");
                self.expression(right, precedence + 1);
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let precedence = operator.precedence();
                self.logical_operand(*operator, left, precedence);
                self.push(" ");
                self.push(operator.as_str());
                self.push(" ");
                self.logical_operand(*operator, right, precedence + 1);
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expression(test, CONDITIONAL + 1);
                self.push(" ? ");
                self.expression(consequent, ASSIGNMENT);
                self.push(" : ");
                self.expression(alternate, ASSIGNMENT);
            }
            Expression::Assignment {
                operator,
                target,
                value,
            } => {
                self.expression(target, POSTFIX);
                self.push(" ");
                self.push(operator.as_str());
                self.push(" ");
                self.expression(value, ASSIGNMENT);
            }
            Expression::Member {
                object,
                property,
                optional,
            } => {
                self.callee(object);
                match property {
                    MemberProperty::Named(name) => {
                        self.push(if *optional { "?." } else { "." });
                        self.push(name);
                    }
                    MemberProperty::Computed(key) => {
                        self.push(if *optional { "?.[" } else { "[" });
                        self.expression(key, 0);
                        self.push("]");
                    }
                }
            }
            Expression::Call {
                callee,
                arguments,
                optional,
            } => {
                self.callee(callee);
                if *optional {
                    self.push("?.");
                }
                self.arguments(arguments);
            }
            Expression::New { callee, arguments } => {
                self.push("new ");
                if matches!(**callee, Expression::Call { .. }) {
                    self.push("(");
                    self.expression_unwrapped(callee);
                    self.push(")");
                } else {
                    self.callee(callee);
                }
                self.arguments(arguments);
            }
            Expression::Await(argument) => {
                self.push("await ");
                self.expression(argument, PREFIX);
            }
            // Lowering removes every element before printing.
            Expression::Jsx(_) => self.push("null"),
        }
    }

    fn callee(&mut self, callee: &Expression) {
        if matches!(callee, Expression::Number(_)) {
            self.push("(");
            self.expression_unwrapped(callee);
            self.push(")");
        } else {
            self.expression(callee, CALL);
        }
    }

    /// `??` cannot be mixed with `&&`/`||` without parentheses.
    fn logical_operand(&mut self, operator: LogicalOperator, operand: &Expression, minimum: u8) {
        let mixes = match operand {
            Expression::Logical { operator: inner, .. } => {
                (operator == LogicalOperator::Coalesce) != (*inner == LogicalOperator::Coalesce)
            }
            _ => false,
        };
        if mixes {
            self.push("(");
            self.expression_unwrapped(operand);
            self.push(")");
        } else {
            self.expression(operand, minimum);
        }
    }
}

fn precedence(expression: &Expression) -> u8 {
    match expression {
        Expression::Assignment { .. } => ASSIGNMENT,
        Expression::Function(function) if function.is_arrow => ASSIGNMENT,
        Expression::Conditional { .. } => CONDITIONAL,
        Expression::Logical { operator, .. } => operator.precedence(),
        Expression::Binary { operator, .. } => operator.precedence(),
        Expression::Unary { .. } | Expression::Await(_) => PREFIX,
        Expression::Update { prefix: true, .. } => PREFIX,
        Expression::Update { prefix: false, .. } => POSTFIX,
        Expression::Member { .. } | Expression::Call { .. } | Expression::New { .. } => CALL,
        _ => PRIMARY,
    }
}

fn is_identifier_name(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use crate::source::SourceUnit;
    use crate::transform::{TransformOptions, transform};

    fn round_trip(code: &str) -> String {
        let unit = transform(&SourceUnit::new(code), &TransformOptions::default()).unwrap();
        unit.to_string()
    }

    #[test]
    fn precedence_is_kept_with_parentheses() {
        assert_eq!(round_trip("x = (a + b) * c;"), "x = (a + b) * c;\n");
        assert_eq!(round_trip("x = a - (b - c);"), "x = a - (b - c);\n");
        assert_eq!(round_trip("x = (a ?? b) || c;"), "x = (a ?? b) || c;\n");
        assert_eq!(round_trip("x = - -y;"), "x = - -y;\n");
        assert_eq!(round_trip("x = typeof y === 'string';"), "x = typeof y === \"string\";\n");
        assert_eq!(round_trip("(a, b) => ({ a });"), "(a, b) => ({ a: a });\n");
    }

    #[test]
    fn statements_are_indented() {
        let text = round_trip("function f(n) { if (n > 1) { return n; } else return 0; }");
        assert_eq!(
            text,
            "function f(n) {\n  if (n > 1) {\n    return n;\n  } else\n    return 0;\n}\n"
        );
    }

    #[test]
    fn reparses_the_lowered_output() {
        let code = r#"
            import { useState } from 'react';
            export default function Counter({ start = 0, ...rest }) {
              const [count, setCount] = useState(start);
              for (let i = 0; i < 3; i++) { if (i % 2) continue; }
              try { risky(); } catch (e) { console.log(`failed: ${e.message}`); }
              return <button onClick={() => setCount(count + 1)} {...rest}>{count}</button>;
            }
        "#;
        let lowered = round_trip(code);
        let again = round_trip(&lowered);
        assert_eq!(lowered, again);
    }
}
