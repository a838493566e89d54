//! Lowering of parsed component modules into executable units.
//!
//! A unit contains base syntax only:
//!
//! - every import becomes a `require` call, hoisted to the top of the unit in
//!   source order, so no module code runs before all imports resolved;
//! - JSX becomes nested calls to the element runtime's `createElement`,
//!   which itself is fetched through `require` in a prologue;
//! - exports become assignments onto the `exports` record.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::parser::{
    self, Argument, ArrayElement, CatchClause, DeclarationKind, Declarator, Expression, Function,
    FunctionBody, ImportDeclaration, JsxAttribute, JsxAttributeValue, JsxChild, JsxElement,
    MemberProperty, ModuleItem, Name, ObjectMember, Parameter, Pattern, PatternElement,
    PatternProperty, PropertyKey, Statement, SwitchCase, TemplatePart,
};
use crate::source::{SourceId, SourceUnit};

mod nesting;
mod printer;

/// Local name of the element factory inside lowered code.
pub const JSX_FACTORY: &str = "__jsx";
/// Local name of the fragment marker inside lowered code.
pub const JSX_FRAGMENT: &str = "__Fragment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TransformOptions {
    /// Capability providing `createElement` and `Fragment` for JSX.
    pub jsx_runtime: String,
    /// Deepest bracket, template and element nesting accepted; deeper
    /// sources fail to transform instead of exhausting the native stack.
    pub max_nesting: usize,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            jsx_runtime: "react".to_string(),
            max_nesting: 64,
        }
    }
}

/// An executable unit: base syntax plus what the loader needs to know
/// before running it.
#[derive(Debug, Clone)]
pub struct Unit {
    pub source_id: SourceId,
    /// Imported capability names, in source order, without duplicates.
    pub capabilities: Vec<String>,
    /// The element runtime capability, when the source uses JSX.
    pub jsx_runtime: Option<String>,
    pub body: Vec<Statement>,
}

impl Unit {
    pub fn uses_jsx(&self) -> bool {
        self.jsx_runtime.is_some()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printer::print(&self.body))
    }
}

pub fn transform(source: &SourceUnit, options: &TransformOptions) -> Result<Unit, TransformError> {
    if let Some(offset) = nesting::exceeds(source.as_str(), options.max_nesting) {
        log::warn!(
            target: "artifex::transform",
            "rejected {} ({}): nesting deeper than {}",
            source.name(),
            source.id(),
            options.max_nesting
        );
        return Err(failure(
            source,
            offset..offset + 1,
            format!("nesting depth exceeds {}", options.max_nesting),
        ));
    }
    let module = parser::parse_module(source.as_str()).map_err(|errors| {
        let first = errors.first();
        let range = first.map(|error| error.span().into_range()).unwrap_or(0..0);
        let message = first
            .map(|error| error.to_string())
            .unwrap_or_else(|| "invalid source".to_string());
        let report = parser::report_errors(source.name(), source.as_str(), &errors);
        let (line, column) = source.line_col(range.start);
        TransformError {
            message,
            line,
            column,
            report,
        }
    })?;

    let mut lowering = Lowering::default();
    let mut capabilities: Vec<String> = Vec::new();
    let mut imports = Vec::new();
    let mut body = Vec::new();
    let mut trailing = Vec::new();
    let mut exported = FxHashSet::default();

    for item in module.items {
        let range = item.span.into_range();
        let fail = |message: String| failure(source, range.clone(), message);
        match item.node {
            ModuleItem::Import(declaration) => {
                if !capabilities.iter().any(|name| **name == *declaration.source) {
                    capabilities.push(declaration.source.to_string());
                }
                imports.extend(import_statements(declaration));
            }
            ModuleItem::ExportDefault(expression) => {
                export_name(&mut exported, "default").map_err(fail)?;
                match expression {
                    Expression::Function(function) if function.name.is_some() && !function.is_arrow => {
                        let function = lowering.function(function).map_err(fail)?;
                        let name = function.name.clone().unwrap_or_else(|| Name::from("default"));
                        body.push(Statement::Function(function));
                        body.push(export_assignment("default", Expression::Identifier(name)));
                    }
                    other => {
                        let value = lowering.expression(other).map_err(fail)?;
                        body.push(export_assignment("default", value));
                    }
                }
            }
            ModuleItem::ExportDeclaration(statement) => {
                let names = declared_names(&statement);
                for name in &names {
                    export_name(&mut exported, name).map_err(fail)?;
                }
                body.push(lowering.statement(statement).map_err(fail)?);
                body.extend(
                    names
                        .into_iter()
                        .map(|name| export_assignment(&name, Expression::Identifier(name.clone()))),
                );
            }
            ModuleItem::ExportNamed(specifiers) => {
                for specifier in specifiers {
                    export_name(&mut exported, &specifier.exported).map_err(fail)?;
                    trailing.push(export_assignment(
                        &specifier.exported,
                        Expression::Identifier(specifier.local),
                    ));
                }
            }
            ModuleItem::Statement(statement) => body.push(lowering.statement(statement).map_err(fail)?),
        }
    }

    let jsx_runtime = lowering.uses_jsx.then(|| options.jsx_runtime.clone());
    let mut statements = Vec::with_capacity(imports.len() + body.len() + trailing.len() + 1);
    if let Some(runtime) = &jsx_runtime {
        statements.push(runtime_prologue(runtime));
    }
    statements.extend(imports);
    statements.extend(body);
    statements.extend(trailing);

    log::debug!(
        target: "artifex::transform",
        "lowered {} ({}) into {} statements, capabilities {:?}",
        source.name(),
        source.id(),
        statements.len(),
        capabilities
    );
    Ok(Unit {
        source_id: source.id(),
        capabilities,
        jsx_runtime,
        body: statements,
    })
}

fn failure(source: &SourceUnit, range: Range<usize>, message: String) -> TransformError {
    let (line, column) = source.line_col(range.start);
    let report = parser::render_report(source.name(), source.as_str(), range, &message, "here");
    TransformError {
        message,
        line,
        column,
        report,
    }
}

fn export_name(exported: &mut FxHashSet<Name>, name: &str) -> Result<(), String> {
    if exported.insert(Name::from(name)) {
        Ok(())
    } else {
        Err(format!("Duplicate export of '{name}'"))
    }
}

fn declared_names(statement: &Statement) -> Vec<Name> {
    match statement {
        Statement::Declaration { declarators, .. } => declarators
            .iter()
            .flat_map(|declarator| declarator.pattern.bound_names())
            .collect(),
        Statement::Function(function) => function.name.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

fn export_assignment(name: &str, value: Expression) -> Statement {
    Statement::Expression(Expression::assign(
        Expression::member(Expression::identifier("exports"), name),
        value,
    ))
}

fn require(name: &str, interop: Option<&str>) -> Expression {
    let mut arguments = vec![Expression::string(name)];
    arguments.extend(interop.map(Expression::string));
    Expression::call(Expression::identifier("require"), arguments)
}

fn constant(pattern: Pattern, init: Expression) -> Statement {
    Statement::Declaration {
        kind: DeclarationKind::Const,
        declarators: vec![Declarator {
            pattern,
            init: Some(init),
        }],
    }
}

fn destructure(members: impl IntoIterator<Item = (Name, Name)>) -> Pattern {
    Pattern::Object {
        properties: members
            .into_iter()
            .map(|(key, local)| PatternProperty {
                key,
                value: Pattern::Identifier(local),
                default: None,
            })
            .collect(),
        rest: None,
    }
}

fn import_statements(declaration: ImportDeclaration) -> Vec<Statement> {
    let ImportDeclaration { source, clause } = declaration;
    if clause.is_empty() {
        return vec![Statement::Expression(require(&source, None))];
    }
    let mut statements = Vec::new();
    if let Some(default) = clause.default {
        statements.push(constant(
            Pattern::Identifier(default),
            require(&source, Some("default")),
        ));
    }
    if let Some(namespace) = clause.namespace {
        statements.push(constant(Pattern::Identifier(namespace), require(&source, None)));
    }
    if !clause.named.is_empty() {
        let members = clause
            .named
            .into_iter()
            .map(|specifier| (specifier.imported, specifier.local));
        statements.push(constant(destructure(members), require(&source, None)));
    }
    statements
}

/// `const { createElement: __jsx, Fragment: __Fragment } = require(runtime);`
fn runtime_prologue(runtime: &str) -> Statement {
    constant(
        destructure([
            (Name::from("createElement"), Name::from(JSX_FACTORY)),
            (Name::from("Fragment"), Name::from(JSX_FRAGMENT)),
        ]),
        require(runtime, None),
    )
}

/// AST fold that removes JSX and validates assignment targets.
#[derive(Default)]
struct Lowering {
    uses_jsx: bool,
}

type Lowered<T> = Result<T, String>;

impl Lowering {
    fn statements(&mut self, statements: Vec<Statement>) -> Lowered<Vec<Statement>> {
        statements
            .into_iter()
            .map(|statement| self.statement(statement))
            .collect()
    }

    fn boxed(&mut self, statement: Box<Statement>) -> Lowered<Box<Statement>> {
        Ok(Box::new(self.statement(*statement)?))
    }

    fn statement(&mut self, statement: Statement) -> Lowered<Statement> {
        Ok(match statement {
            Statement::Declaration { kind, declarators } => Statement::Declaration {
                kind,
                declarators: declarators
                    .into_iter()
                    .map(|declarator| {
                        Ok(Declarator {
                            pattern: self.pattern(declarator.pattern)?,
                            init: self.optional(declarator.init)?,
                        })
                    })
                    .collect::<Lowered<_>>()?,
            },
            Statement::Function(function) => Statement::Function(self.function(function)?),
            Statement::Return(argument) => Statement::Return(self.optional(argument)?),
            Statement::If {
                test,
                consequent,
                alternate,
            } => Statement::If {
                test: self.expression(test)?,
                consequent: self.boxed(consequent)?,
                alternate: alternate.map(|alternate| self.boxed(alternate)).transpose()?,
            },
            Statement::For {
                init,
                test,
                update,
                body,
            } => Statement::For {
                init: init.map(|init| self.boxed(init)).transpose()?,
                test: self.optional(test)?,
                update: self.optional(update)?,
                body: self.boxed(body)?,
            },
            Statement::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => Statement::ForOf {
                kind,
                pattern: self.pattern(pattern)?,
                iterable: self.expression(iterable)?,
                body: self.boxed(body)?,
            },
            Statement::While { test, body } => Statement::While {
                test: self.expression(test)?,
                body: self.boxed(body)?,
            },
            Statement::Switch {
                discriminant,
                cases,
            } => Statement::Switch {
                discriminant: self.expression(discriminant)?,
                cases: cases
                    .into_iter()
                    .map(|case| {
                        Ok(SwitchCase {
                            test: self.optional(case.test)?,
                            body: self.statements(case.body)?,
                        })
                    })
                    .collect::<Lowered<_>>()?,
            },
            Statement::Throw(argument) => Statement::Throw(self.expression(argument)?),
            Statement::Try {
                block,
                handler,
                finalizer,
            } => Statement::Try {
                block: self.statements(block)?,
                handler: handler
                    .map(|handler| {
                        Ok::<_, String>(CatchClause {
                            param: handler.param.map(|param| self.pattern(param)).transpose()?,
                            body: self.statements(handler.body)?,
                        })
                    })
                    .transpose()?,
                finalizer: finalizer.map(|block| self.statements(block)).transpose()?,
            },
            Statement::Block(statements) => Statement::Block(self.statements(statements)?),
            Statement::Expression(expression) => Statement::Expression(self.expression(expression)?),
            other @ (Statement::Break | Statement::Continue | Statement::Empty) => other,
        })
    }

    fn pattern(&mut self, pattern: Pattern) -> Lowered<Pattern> {
        Ok(match pattern {
            Pattern::Identifier(name) => Pattern::Identifier(name),
            Pattern::Object { properties, rest } => Pattern::Object {
                properties: properties
                    .into_iter()
                    .map(|property| {
                        Ok(PatternProperty {
                            key: property.key,
                            value: self.pattern(property.value)?,
                            default: self.optional(property.default)?,
                        })
                    })
                    .collect::<Lowered<_>>()?,
                rest,
            },
            Pattern::Array { elements, rest } => Pattern::Array {
                elements: elements
                    .into_iter()
                    .map(|element| {
                        element
                            .map(|element| {
                                Ok(PatternElement {
                                    pattern: self.pattern(element.pattern)?,
                                    default: self.optional(element.default)?,
                                })
                            })
                            .transpose()
                    })
                    .collect::<Lowered<_>>()?,
                rest: rest
                    .map(|rest| Ok::<_, String>(Box::new(self.pattern(*rest)?)))
                    .transpose()?,
            },
        })
    }

    fn function(&mut self, function: Rc<Function>) -> Lowered<Rc<Function>> {
        let function = Rc::unwrap_or_clone(function);
        Ok(Rc::new(Function {
            params: function
                .params
                .into_iter()
                .map(|parameter| {
                    Ok(Parameter {
                        pattern: self.pattern(parameter.pattern)?,
                        default: self.optional(parameter.default)?,
                        rest: parameter.rest,
                    })
                })
                .collect::<Lowered<_>>()?,
            body: match function.body {
                FunctionBody::Block(statements) => FunctionBody::Block(self.statements(statements)?),
                FunctionBody::Expression(expression) => {
                    FunctionBody::Expression(Box::new(self.expression(*expression)?))
                }
            },
            ..function
        }))
    }

    fn optional(&mut self, expression: Option<Expression>) -> Lowered<Option<Expression>> {
        expression.map(|expression| self.expression(expression)).transpose()
    }

    fn inner(&mut self, expression: Box<Expression>) -> Lowered<Box<Expression>> {
        Ok(Box::new(self.expression(*expression)?))
    }

    fn arguments(&mut self, arguments: Vec<Argument>) -> Lowered<Vec<Argument>> {
        arguments
            .into_iter()
            .map(|argument| {
                Ok(match argument {
                    Argument::Value(expression) => Argument::Value(self.expression(expression)?),
                    Argument::Spread(expression) => Argument::Spread(self.expression(expression)?),
                })
            })
            .collect()
    }

    fn expression(&mut self, expression: Expression) -> Lowered<Expression> {
        Ok(match expression {
            Expression::Template(parts) => Expression::Template(
                parts
                    .into_iter()
                    .map(|part| {
                        Ok(match part {
                            TemplatePart::Expression(expression) => {
                                TemplatePart::Expression(self.expression(expression)?)
                            }
                            text => text,
                        })
                    })
                    .collect::<Lowered<_>>()?,
            ),
            Expression::Array(elements) => Expression::Array(
                elements
                    .into_iter()
                    .map(|element| {
                        Ok(match element {
                            ArrayElement::Item(expression) => ArrayElement::Item(self.expression(expression)?),
                            ArrayElement::Spread(expression) => {
                                ArrayElement::Spread(self.expression(expression)?)
                            }
                        })
                    })
                    .collect::<Lowered<_>>()?,
            ),
            Expression::Object(members) => Expression::Object(
                members
                    .into_iter()
                    .map(|member| self.object_member(member))
                    .collect::<Lowered<_>>()?,
            ),
            Expression::Function(function) => Expression::Function(self.function(function)?),
            Expression::Unary { operator, argument } => Expression::Unary {
                operator,
                argument: self.inner(argument)?,
            },
            Expression::Update {
                operator,
                prefix,
                target,
            } => {
                check_target(&target, "Invalid left-hand side expression in update operation")?;
                Expression::Update {
                    operator,
                    prefix,
                    target: self.inner(target)?,
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => Expression::Binary {
                operator,
                left: self.inner(left)?,
                right: self.inner(right)?,
            },
            Expression::Logical {
                operator,
                left,
                right,
            } => Expression::Logical {
                operator,
                left: self.inner(left)?,
                right: self.inner(right)?,
            },
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => Expression::Conditional {
                test: self.inner(test)?,
                consequent: self.inner(consequent)?,
                alternate: self.inner(alternate)?,
            },
            Expression::Assignment {
                operator,
                target,
                value,
            } => {
                check_target(&target, "Invalid left-hand side in assignment")?;
                Expression::Assignment {
                    operator,
                    target: self.inner(target)?,
                    value: self.inner(value)?,
                }
            }
            Expression::Member {
                object,
                property,
                optional,
            } => Expression::Member {
                object: self.inner(object)?,
                property: match property {
                    MemberProperty::Computed(key) => MemberProperty::Computed(self.inner(key)?),
                    named => named,
                },
                optional,
            },
            Expression::Call {
                callee,
                arguments,
                optional,
            } => Expression::Call {
                callee: self.inner(callee)?,
                arguments: self.arguments(arguments)?,
                optional,
            },
            Expression::New { callee, arguments } => Expression::New {
                callee: self.inner(callee)?,
                arguments: self.arguments(arguments)?,
            },
            Expression::Await(argument) => Expression::Await(self.inner(argument)?),
            Expression::Jsx(element) => self.element(*element)?,
            leaf @ (Expression::Number(_)
            | Expression::String(_)
            | Expression::Boolean(_)
            | Expression::Null
            | Expression::Undefined
            | Expression::Identifier(_)) => leaf,
        })
    }

    fn object_member(&mut self, member: ObjectMember) -> Lowered<ObjectMember> {
        Ok(match member {
            ObjectMember::Property { key, value } => ObjectMember::Property {
                key: match key {
                    PropertyKey::Computed(key) => PropertyKey::Computed(self.expression(key)?),
                    named => named,
                },
                value: self.expression(value)?,
            },
            ObjectMember::Spread(expression) => ObjectMember::Spread(self.expression(expression)?),
        })
    }

    /// `<T a="x" {...rest}>children</T>` becomes
    /// `__jsx(T, { a: "x", ...rest }, ...children)`.
    fn element(&mut self, element: JsxElement) -> Lowered<Expression> {
        self.uses_jsx = true;
        let element_type = match &element.name {
            None => Expression::identifier(JSX_FRAGMENT),
            Some(path) => tag_expression(path),
        };
        let props = if element.attributes.is_empty() {
            Expression::Null
        } else {
            Expression::Object(
                element
                    .attributes
                    .into_iter()
                    .map(|attribute| self.attribute(attribute))
                    .collect::<Lowered<_>>()?,
            )
        };
        let mut arguments = vec![Argument::Value(element_type), Argument::Value(props)];
        for child in element.children {
            let child = match child {
                JsxChild::Text(raw) => match clean_text(&raw) {
                    Some(text) => Expression::String(Name::from(decode_entities(&text))),
                    None => continue,
                },
                JsxChild::Expression(expression) => self.expression(expression)?,
                JsxChild::Element(element) => self.element(element)?,
                JsxChild::Empty => continue,
            };
            arguments.push(Argument::Value(child));
        }
        Ok(Expression::Call {
            callee: Box::new(Expression::identifier(JSX_FACTORY)),
            arguments,
            optional: false,
        })
    }

    fn attribute(&mut self, attribute: JsxAttribute) -> Lowered<ObjectMember> {
        Ok(match attribute {
            JsxAttribute::Named { name, value } => ObjectMember::Property {
                key: PropertyKey::Named(name),
                value: match value {
                    None => Expression::Boolean(true),
                    Some(JsxAttributeValue::String(raw)) => {
                        Expression::String(Name::from(decode_entities(&raw)))
                    }
                    Some(JsxAttributeValue::Expression(expression)) => self.expression(expression)?,
                    Some(JsxAttributeValue::Element(element)) => self.element(element)?,
                },
            },
            JsxAttribute::Spread(expression) => ObjectMember::Spread(self.expression(expression)?),
        })
    }
}

fn check_target(target: &Expression, message: &str) -> Lowered<()> {
    match target {
        Expression::Identifier(_) => Ok(()),
        Expression::Member { optional: false, .. } => Ok(()),
        _ => Err(message.to_string()),
    }
}

/// Lowercase and hyphenated tags are intrinsic (string) element types;
/// anything else, including `Card.Header`, is a reference.
fn tag_expression(path: &[Name]) -> Expression {
    match path {
        [name] if is_intrinsic(name) => Expression::String(name.clone()),
        [first, rest @ ..] => rest.iter().fold(Expression::Identifier(first.clone()), |object, name| {
            Expression::Member {
                object: Box::new(object),
                property: MemberProperty::Named(name.clone()),
                optional: false,
            }
        }),
        [] => Expression::identifier(JSX_FRAGMENT),
    }
}

fn is_intrinsic(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase()) || name.contains('-') || name.contains(':')
}

/// JSX text trimming: lines are trimmed, whitespace-only lines are dropped
/// and the remaining lines are joined with single spaces. Text without a
/// line break is kept as written.
fn clean_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split("\r\n").flat_map(|line| line.split(['\n', '\r'])).collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t'));
    let mut text = String::new();
    for (index, line) in lines.iter().enumerate() {
        let line = line.replace('\t', " ");
        let mut trimmed = line.as_str();
        if index != 0 {
            trimmed = trimmed.trim_start_matches(' ');
        }
        if index != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ');
        }
        if trimmed.is_empty() {
            continue;
        }
        text.push_str(trimmed);
        if last_non_empty.is_some_and(|last| index < last) {
            text.push(' ');
        }
    }
    (!text.is_empty()).then_some(text)
}

/// Decodes the HTML entities JSX text and attribute strings may contain.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        let tail = &rest[start..];
        let entity = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| entity_char(&tail[1..end]).map(|c| (c, end)));
        match entity {
            Some((c, end)) => {
                decoded.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = &tail[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn entity_char(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "copy" => Some('©'),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        "hellip" => Some('…'),
        "times" => Some('×'),
        "middot" => Some('·'),
        "bull" => Some('•'),
        "rarr" => Some('→'),
        "larr" => Some('←'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                name.strip_prefix('#').and_then(|decimal| decimal.parse().ok())
            };
            code.and_then(char::from_u32)
        }
    }
}
