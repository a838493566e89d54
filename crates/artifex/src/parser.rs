//! Grammar for the supported component language.
//!
//! The parser works directly on `&str` (see `lexer` for the token-level
//! combinators). Expressions use chumsky's Pratt parser; statements and
//! expressions are mutually recursive through function bodies, so
//! `statement_parser` is instantiated both inside `expression_parser` (for
//! bodies) and at the module level.

use std::rc::Rc;

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use chumsky::pratt::{infix, left, postfix, prefix, right};
use chumsky::prelude::*;

mod ast;
mod lexer;

pub use ast::*;
pub use lexer::is_reserved;
use lexer::{
    escape, identifier, jsx_name, jsx_string, keyword, number, op, property_name, punct,
    string_literal, trivia,
};

pub type Span = SimpleSpan;
pub type ParseError<'src> = Rich<'src, char, Span>;
pub(crate) type Extra<'src> = extra::Err<ParseError<'src>>;
pub(crate) type BoxedParser<'src, O> = Boxed<'src, 'src, &'src str, O, Extra<'src>>;

/// Parses a whole module (imports, exports and statements).
pub fn parse_module(source: &str) -> Result<Module, Vec<ParseError<'_>>> {
    module_parser().parse(source).into_result()
}

pub fn module_parser<'src>() -> impl Parser<'src, &'src str, Module, Extra<'src>> {
    let expression = expression_parser();
    let statement = statement_parser(expression.clone());
    let semicolon = punct(";").or_not().ignored();

    let import_specifier = property_name()
        .then(keyword("as").ignore_then(identifier()).or_not())
        .map(|(imported, local)| ImportSpecifier {
            local: local.unwrap_or_else(|| imported.clone()),
            imported,
        });
    let named_imports = import_specifier
        .separated_by(punct(","))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(punct("{"), punct("}"));
    let namespace_import = punct("*")
        .ignore_then(keyword("as"))
        .ignore_then(identifier());
    let secondary_clause = choice((
        namespace_import.map(|namespace| ImportClause {
            namespace: Some(namespace),
            ..ImportClause::default()
        }),
        named_imports.map(|named| ImportClause {
            named,
            ..ImportClause::default()
        }),
    ));
    let import_clause = choice((
        secondary_clause.clone(),
        identifier()
            .then(punct(",").ignore_then(secondary_clause).or_not())
            .map(|(default, rest)| ImportClause {
                default: Some(default),
                ..rest.unwrap_or_default()
            }),
    ));
    let import = keyword("import")
        .ignore_then(choice((
            string_literal().map(|source| ImportDeclaration {
                source,
                clause: ImportClause::default(),
            }),
            import_clause
                .then_ignore(keyword("from"))
                .then(string_literal())
                .map(|(clause, source)| ImportDeclaration { source, clause }),
        )))
        .then_ignore(semicolon.clone())
        .map(ModuleItem::Import);

    let export_specifier = property_name()
        .then(keyword("as").ignore_then(property_name()).or_not())
        .map(|(local, exported)| ExportSpecifier {
            exported: exported.unwrap_or_else(|| local.clone()),
            local,
        });
    let export_named = export_specifier
        .separated_by(punct(","))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(punct("{"), punct("}"))
        .then_ignore(semicolon.clone())
        .map(ModuleItem::ExportNamed);
    let export_default = keyword("default")
        .ignore_then(expression)
        .then_ignore(semicolon)
        .map(ModuleItem::ExportDefault);
    let export = keyword("export").ignore_then(choice((
        export_default,
        export_named,
        statement.clone().map(ModuleItem::ExportDeclaration),
    )));

    let item = choice((import, export, statement.map(ModuleItem::Statement)))
        .map_with(|node, extra| Spanned {
            node,
            span: extra.span(),
        });

    trivia()
        .ignore_then(item.repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|items| Module { items })
}

pub fn statement_parser<'src, P>(expression: P) -> BoxedParser<'src, Statement>
where
    P: Parser<'src, &'src str, Expression, Extra<'src>> + Clone + 'src,
{
    recursive(|statement| {
        let pattern = pattern_parser(expression.clone());
        let block = statement
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(punct("{"), punct("}"))
            .boxed();
        let parameters = parameters_parser(pattern.clone(), expression.clone());
        let semicolon = punct(";").or_not().ignored();
        let parenthesized = expression.clone().delimited_by(punct("("), punct(")"));

        let declaration_kind = choice((
            keyword("const").to(DeclarationKind::Const),
            keyword("let").to(DeclarationKind::Let),
            keyword("var").to(DeclarationKind::Var),
        ));
        let declarator = pattern
            .clone()
            .then(op("=", "=>").ignore_then(expression.clone()).or_not())
            .map(|(pattern, init)| Declarator { pattern, init });
        let declaration = declaration_kind
            .clone()
            .then(
                declarator
                    .separated_by(punct(","))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .map(|(kind, declarators)| Statement::Declaration { kind, declarators });

        let function_declaration = keyword("async")
            .or_not()
            .then_ignore(keyword("function"))
            .then(identifier())
            .then(parameters)
            .then(block.clone())
            .map(|(((is_async, name), params), body)| {
                Statement::Function(Rc::new(Function {
                    name: Some(name),
                    params,
                    body: FunctionBody::Block(body),
                    is_arrow: false,
                    is_async: is_async.is_some(),
                }))
            });

        let return_statement = keyword("return")
            .ignore_then(expression.clone().or_not())
            .then_ignore(semicolon.clone())
            .map(Statement::Return);

        let if_statement = keyword("if")
            .ignore_then(parenthesized.clone())
            .then(statement.clone())
            .then(keyword("else").ignore_then(statement.clone()).or_not())
            .map(|((test, consequent), alternate)| Statement::If {
                test,
                consequent: Box::new(consequent),
                alternate: alternate.map(Box::new),
            });

        let for_of_statement = keyword("for")
            .ignore_then(punct("("))
            .ignore_then(declaration_kind)
            .then(pattern.clone())
            .then_ignore(keyword("of"))
            .then(expression.clone())
            .then_ignore(punct(")"))
            .then(statement.clone())
            .map(|(((kind, pattern), iterable), body)| Statement::ForOf {
                kind,
                pattern,
                iterable,
                body: Box::new(body),
            });

        let for_init = choice((
            declaration.clone(),
            expression.clone().map(Statement::Expression),
        ));
        let for_statement = keyword("for")
            .ignore_then(punct("("))
            .ignore_then(for_init.or_not())
            .then_ignore(punct(";"))
            .then(expression.clone().or_not())
            .then_ignore(punct(";"))
            .then(expression.clone().or_not())
            .then_ignore(punct(")"))
            .then(statement.clone())
            .map(|(((init, test), update), body)| Statement::For {
                init: init.map(Box::new),
                test,
                update,
                body: Box::new(body),
            });

        let while_statement = keyword("while")
            .ignore_then(parenthesized.clone())
            .then(statement.clone())
            .map(|(test, body)| Statement::While {
                test,
                body: Box::new(body),
            });

        let switch_case = choice((
            keyword("case").ignore_then(expression.clone()).map(Some),
            keyword("default").to(None),
        ))
        .then_ignore(punct(":"))
        .then(statement.clone().repeated().collect::<Vec<_>>())
        .map(|(test, body)| SwitchCase { test, body });
        let switch_statement = keyword("switch")
            .ignore_then(parenthesized)
            .then(
                switch_case
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(punct("{"), punct("}")),
            )
            .map(|(discriminant, cases)| Statement::Switch {
                discriminant,
                cases,
            });

        let break_statement = keyword("break")
            .then_ignore(semicolon.clone())
            .to(Statement::Break);
        let continue_statement = keyword("continue")
            .then_ignore(semicolon.clone())
            .to(Statement::Continue);
        let throw_statement = keyword("throw")
            .ignore_then(expression.clone())
            .then_ignore(semicolon.clone())
            .map(Statement::Throw);

        let catch_clause = keyword("catch")
            .ignore_then(
                pattern
                    .clone()
                    .delimited_by(punct("("), punct(")"))
                    .or_not(),
            )
            .then(block.clone())
            .map(|(param, body)| CatchClause { param, body });
        let try_statement = keyword("try")
            .ignore_then(block.clone())
            .then(catch_clause.or_not())
            .then(keyword("finally").ignore_then(block.clone()).or_not())
            .try_map(|((block, handler), finalizer), span| {
                if handler.is_none() && finalizer.is_none() {
                    Err(Rich::custom(span, "missing catch or finally after try"))
                } else {
                    Ok(Statement::Try {
                        block,
                        handler,
                        finalizer,
                    })
                }
            });

        let empty_statement = punct(";").to(Statement::Empty);
        let expression_statement = expression
            .clone()
            .then_ignore(semicolon.clone())
            .map(Statement::Expression);

        choice((
            block.map(Statement::Block),
            declaration.then_ignore(semicolon),
            function_declaration,
            return_statement,
            if_statement,
            for_of_statement,
            for_statement,
            while_statement,
            switch_statement,
            break_statement,
            continue_statement,
            throw_statement,
            try_statement,
            empty_statement,
            expression_statement,
        ))
    })
    .boxed()
}

pub fn pattern_parser<'src, P>(expression: P) -> BoxedParser<'src, Pattern>
where
    P: Parser<'src, &'src str, Expression, Extra<'src>> + Clone + 'src,
{
    recursive(|pattern| {
        let default = op("=", "=>").ignore_then(expression.clone()).or_not();

        let property = property_name()
            .or(string_literal())
            .then(punct(":").ignore_then(pattern.clone()).or_not())
            .then(default.clone())
            .map(|((key, value), default)| PatternProperty {
                value: value.unwrap_or_else(|| Pattern::Identifier(key.clone())),
                key,
                default,
            });
        let object = property
            .separated_by(punct(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .then(punct("...").ignore_then(identifier()).or_not())
            .then_ignore(punct(",").or_not())
            .delimited_by(punct("{"), punct("}"))
            .map(|(properties, rest)| Pattern::Object { properties, rest });

        enum Slot {
            Element(PatternElement),
            Rest(Pattern),
        }
        let slot = choice((
            punct("...").ignore_then(pattern.clone()).map(Slot::Rest),
            pattern
                .clone()
                .then(default)
                .map(|(pattern, default)| Slot::Element(PatternElement { pattern, default })),
        ));
        let array = slot
            .or_not()
            .separated_by(punct(","))
            .collect::<Vec<_>>()
            .delimited_by(punct("["), punct("]"))
            .try_map(|slots, span| {
                let mut elements = Vec::new();
                let mut rest = None;
                let count = slots.len();
                for (index, slot) in slots.into_iter().enumerate() {
                    match slot {
                        Some(Slot::Rest(pattern)) if index + 1 == count => {
                            rest = Some(Box::new(pattern))
                        }
                        Some(Slot::Rest(_)) => {
                            return Err(Rich::custom(span, "rest element must be last"));
                        }
                        Some(Slot::Element(element)) => elements.push(Some(element)),
                        None => elements.push(None),
                    }
                }
                while matches!(elements.last(), Some(None)) {
                    elements.pop();
                }
                Ok(Pattern::Array { elements, rest })
            });

        choice((object, array, identifier().map(Pattern::Identifier)))
    })
    .boxed()
}

fn parameters_parser<'src, P, E>(
    pattern: P,
    expression: E,
) -> impl Parser<'src, &'src str, Vec<Parameter>, Extra<'src>> + Clone
where
    P: Parser<'src, &'src str, Pattern, Extra<'src>> + Clone + 'src,
    E: Parser<'src, &'src str, Expression, Extra<'src>> + Clone + 'src,
{
    choice((
        punct("...")
            .ignore_then(pattern.clone())
            .map(|pattern| Parameter {
                pattern,
                default: None,
                rest: true,
            }),
        pattern
            .then(op("=", "=>").ignore_then(expression).or_not())
            .map(|(pattern, default)| Parameter {
                pattern,
                default,
                rest: false,
            }),
    ))
    .separated_by(punct(","))
    .allow_trailing()
    .collect::<Vec<_>>()
    .delimited_by(punct("("), punct(")"))
}

#[derive(Clone)]
enum ChainLink {
    Named(Name),
    Computed(Expression),
    Call(Vec<Argument>),
}

impl ChainLink {
    fn attach(self, object: Expression, optional: bool) -> Expression {
        match self {
            ChainLink::Named(name) => Expression::Member {
                object: Box::new(object),
                property: MemberProperty::Named(name),
                optional,
            },
            ChainLink::Computed(property) => Expression::Member {
                object: Box::new(object),
                property: MemberProperty::Computed(Box::new(property)),
                optional,
            },
            ChainLink::Call(arguments) => Expression::Call {
                callee: Box::new(object),
                arguments,
                optional,
            },
        }
    }
}

#[derive(Clone, Copy)]
enum PrefixOperator {
    Update(UpdateOperator),
    Unary(UnaryOperator),
    Await,
}

fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Expression {
    Expression::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(left: Expression, operator: LogicalOperator, right: Expression) -> Expression {
    Expression::Logical {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn expression_parser<'src>() -> BoxedParser<'src, Expression> {
    recursive(|expression| {
        let statement = statement_parser(expression.clone());
        let block = statement
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(punct("{"), punct("}"))
            .boxed();
        let pattern = pattern_parser(expression.clone());
        let parameters = parameters_parser(pattern, expression.clone()).boxed();

        let arguments = choice((
            punct("...")
                .ignore_then(expression.clone())
                .map(Argument::Spread),
            expression.clone().map(Argument::Value),
        ))
        .separated_by(punct(","))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(punct("("), punct(")"))
        .boxed();

        let literal = choice((
            number().map(Expression::Number),
            string_literal().map(Expression::String),
            keyword("true").to(Expression::Boolean(true)),
            keyword("false").to(Expression::Boolean(false)),
            keyword("null").to(Expression::Null),
            keyword("undefined").to(Expression::Undefined),
        ));

        let template_text = choice((
            none_of("`\\$"),
            escape(),
            just('$').then_ignore(just('{').not()),
        ))
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(|text| TemplatePart::String(Name::from(text.as_str())));
        let template_substitution = just("${")
            .ignore_then(trivia())
            .ignore_then(expression.clone())
            .then_ignore(just('}'))
            .map(TemplatePart::Expression);
        let template = choice((template_text, template_substitution))
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just('`'), just('`'))
            .then_ignore(trivia())
            .map(Expression::Template);

        let array_element = choice((
            punct("...")
                .ignore_then(expression.clone())
                .map(ArrayElement::Spread),
            expression.clone().map(ArrayElement::Item),
        ));
        let array = array_element
            .separated_by(punct(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(punct("["), punct("]"))
            .map(Expression::Array);

        let property_key = choice((
            property_name().map(PropertyKey::Named),
            string_literal().map(PropertyKey::Named),
            number().map(|value| PropertyKey::Named(Name::from(crate::value::number_to_string(value)))),
            expression
                .clone()
                .delimited_by(punct("["), punct("]"))
                .map(PropertyKey::Computed),
        ));
        let property = property_key
            .clone()
            .then_ignore(punct(":"))
            .then(expression.clone())
            .map(|(key, value)| ObjectMember::Property { key, value });
        let method = property_key
            .then(parameters.clone())
            .then(block.clone())
            .map(|((key, params), body)| {
                let name = match &key {
                    PropertyKey::Named(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                ObjectMember::Property {
                    key,
                    value: Expression::Function(Rc::new(Function {
                        name,
                        params,
                        body: FunctionBody::Block(body),
                        is_arrow: false,
                        is_async: false,
                    })),
                }
            });
        let shorthand = identifier().map(|name| ObjectMember::Property {
            key: PropertyKey::Named(name.clone()),
            value: Expression::Identifier(name),
        });
        let object = choice((
            punct("...")
                .ignore_then(expression.clone())
                .map(ObjectMember::Spread),
            property,
            method,
            shorthand,
        ))
        .separated_by(punct(","))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(punct("{"), punct("}"))
        .map(Expression::Object);

        let arrow_parameters = choice((
            identifier().map(|name| {
                vec![Parameter {
                    pattern: Pattern::Identifier(name),
                    default: None,
                    rest: false,
                }]
            }),
            parameters.clone(),
        ));
        let arrow_body = choice((
            block.clone().map(FunctionBody::Block),
            expression
                .clone()
                .map(|body| FunctionBody::Expression(Box::new(body))),
        ));
        let arrow = keyword("async")
            .or_not()
            .then(arrow_parameters)
            .then_ignore(op("=>", ""))
            .then(arrow_body)
            .map(|((is_async, params), body)| {
                Expression::Function(Rc::new(Function {
                    name: None,
                    params,
                    body,
                    is_arrow: true,
                    is_async: is_async.is_some(),
                }))
            });

        let function = keyword("async")
            .or_not()
            .then_ignore(keyword("function"))
            .then(identifier().or_not())
            .then(parameters)
            .then(block)
            .map(|(((is_async, name), params), body)| {
                Expression::Function(Rc::new(Function {
                    name,
                    params,
                    body: FunctionBody::Block(body),
                    is_arrow: false,
                    is_async: is_async.is_some(),
                }))
            });

        let new_expression = keyword("new")
            .ignore_then(identifier().map(Expression::Identifier).foldl(
                punct(".").ignore_then(property_name()).repeated(),
                |object, name| Expression::Member {
                    object: Box::new(object),
                    property: MemberProperty::Named(name),
                    optional: false,
                },
            ))
            .then(arguments.clone().or_not())
            .map(|(callee, arguments)| Expression::New {
                callee: Box::new(callee),
                arguments: arguments.unwrap_or_default(),
            });

        let jsx = jsx_parser(expression.clone())
            .then_ignore(trivia())
            .map(|element| Expression::Jsx(Box::new(element)));

        let atom = choice((
            literal,
            template,
            jsx,
            arrow,
            function,
            new_expression,
            identifier().map(Expression::Identifier),
            array,
            object,
            expression.clone().delimited_by(punct("("), punct(")")),
        ))
        .boxed();

        let computed = expression
            .clone()
            .delimited_by(punct("["), punct("]"))
            .boxed();
        let chain_link = choice((
            punct(".")
                .ignore_then(property_name())
                .map(|name| (ChainLink::Named(name), false)),
            op("?.", "0123456789")
                .ignore_then(choice((
                    property_name().map(ChainLink::Named),
                    computed.clone().map(ChainLink::Computed),
                    arguments.clone().map(ChainLink::Call),
                )))
                .map(|link| (link, true)),
            computed.map(|property| (ChainLink::Computed(property), false)),
            arguments.map(|arguments| (ChainLink::Call(arguments), false)),
        ));
        let prefix_operator = choice((
            op("++", "").to(PrefixOperator::Update(UpdateOperator::Increment)),
            op("--", "").to(PrefixOperator::Update(UpdateOperator::Decrement)),
            op("!", "").to(PrefixOperator::Unary(UnaryOperator::Not)),
            op("-", "-=").to(PrefixOperator::Unary(UnaryOperator::Negate)),
            op("+", "+=").to(PrefixOperator::Unary(UnaryOperator::Plus)),
            keyword("typeof").to(PrefixOperator::Unary(UnaryOperator::TypeOf)),
            keyword("await").to(PrefixOperator::Await),
        ));

        atom.pratt((
            postfix(18, chain_link, |object, (link, optional): (ChainLink, bool), _| {
                link.attach(object, optional)
            }),
            postfix(
                16,
                choice((
                    op("++", "").to(UpdateOperator::Increment),
                    op("--", "").to(UpdateOperator::Decrement),
                )),
                |target, operator, _| Expression::Update {
                    operator,
                    prefix: false,
                    target: Box::new(target),
                },
            ),
            prefix(15, prefix_operator, |operator, argument, _| match operator {
                PrefixOperator::Update(operator) => Expression::Update {
                    operator,
                    prefix: true,
                    target: Box::new(argument),
                },
                PrefixOperator::Unary(operator) => Expression::Unary {
                    operator,
                    argument: Box::new(argument),
                },
                PrefixOperator::Await => Expression::Await(Box::new(argument)),
            }),
            infix(
                left(13),
                choice((
                    op("*", "=").to(BinaryOperator::Multiply),
                    op("/", "=").to(BinaryOperator::Divide),
                    op("%", "=").to(BinaryOperator::Remainder),
                )),
                |left, operator, right, _| {
                    binary(left, operator, right)
                },
            ),
            infix(
                left(12),
                choice((
                    op("+", "+=").to(BinaryOperator::Add),
                    op("-", "-=").to(BinaryOperator::Subtract),
                )),
                |left, operator, right, _| {
                    binary(left, operator, right)
                },
            ),
            infix(
                left(10),
                choice((
                    op("<=", "").to(BinaryOperator::LessOrEqual),
                    op(">=", "").to(BinaryOperator::GreaterOrEqual),
                    op("<", "=<").to(BinaryOperator::Less),
                    op(">", "=>").to(BinaryOperator::Greater),
                )),
                |left, operator, right, _| {
                    binary(left, operator, right)
                },
            ),
            infix(
                left(9),
                choice((
                    op("===", "").to(BinaryOperator::StrictEqual),
                    op("!==", "").to(BinaryOperator::StrictNotEqual),
                    op("==", "=").to(BinaryOperator::Equal),
                    op("!=", "=").to(BinaryOperator::NotEqual),
                )),
                |left, operator, right, _| {
                    binary(left, operator, right)
                },
            ),
            infix(
                left(8),
                op("&&", "=").to(LogicalOperator::And),
                |left, operator, right, _| {
                    logical(left, operator, right)
                },
            ),
            infix(
                left(7),
                op("||", "=").to(LogicalOperator::Or),
                |left, operator, right, _| {
                    logical(left, operator, right)
                },
            ),
            infix(
                left(6),
                op("??", "=").to(LogicalOperator::Coalesce),
                |left, operator, right, _| {
                    logical(left, operator, right)
                },
            ),
            infix(
                right(4),
                op("?", "?.")
                    .ignore_then(expression.clone())
                    .then_ignore(punct(":")),
                |test, consequent, alternate, _| {
                    Expression::Conditional {
                        test: Box::new(test),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                    }
                },
            ),
            infix(
                right(2),
                choice((
                    op("=", "=>").to(AssignmentOperator::Assign),
                    op("+=", "").to(AssignmentOperator::Add),
                    op("-=", "").to(AssignmentOperator::Subtract),
                    op("*=", "").to(AssignmentOperator::Multiply),
                    op("/=", "").to(AssignmentOperator::Divide),
                    op("%=", "").to(AssignmentOperator::Remainder),
                    op("??=", "").to(AssignmentOperator::Coalesce),
                    op("||=", "").to(AssignmentOperator::Or),
                    op("&&=", "").to(AssignmentOperator::And),
                )),
                |target, operator, value, _| {
                    Expression::Assignment {
                        operator,
                        target: Box::new(target),
                        value: Box::new(value),
                    }
                },
            ),
        ))
    })
    .boxed()
}

/// JSX elements and fragments. Whitespace between tags is significant, so
/// the element itself never consumes trailing trivia.
fn jsx_parser<'src, P>(expression: P) -> BoxedParser<'src, JsxElement>
where
    P: Parser<'src, &'src str, Expression, Extra<'src>> + Clone + 'src,
{
    recursive(|element| {
        let tag_name = jsx_name()
            .separated_by(just('.'))
            .at_least(1)
            .collect::<Vec<_>>()
            .then_ignore(trivia());

        let attribute_value = choice((
            jsx_string().map(JsxAttributeValue::String),
            just('{')
                .ignore_then(trivia())
                .ignore_then(expression.clone())
                .then_ignore(just('}'))
                .map(JsxAttributeValue::Expression),
            element.clone().map(JsxAttributeValue::Element),
        ))
        .then_ignore(trivia());
        let attribute = choice((
            punct("{")
                .ignore_then(punct("..."))
                .ignore_then(expression.clone())
                .then_ignore(punct("}"))
                .map(JsxAttribute::Spread),
            jsx_name()
                .then_ignore(trivia())
                .then(punct("=").ignore_then(attribute_value).or_not())
                .map(|(name, value)| JsxAttribute::Named { name, value }),
        ));

        let text = none_of("{<}")
            .repeated()
            .at_least(1)
            .to_slice()
            .map(|text: &str| JsxChild::Text(text.to_string()));
        let container = just('{')
            .ignore_then(trivia())
            .ignore_then(expression.clone().or_not())
            .then_ignore(just('}'))
            .map(|expression| match expression {
                Some(expression) => JsxChild::Expression(expression),
                None => JsxChild::Empty,
            });
        let children = choice((text, container, element.clone().map(JsxChild::Element)))
            .repeated()
            .collect::<Vec<_>>();

        let closing_tag = just("</")
            .ignore_then(trivia())
            .ignore_then(tag_name.clone().or_not())
            .then_ignore(just('>'));

        let fragment = just('<')
            .ignore_then(trivia())
            .ignore_then(just('>'))
            .ignore_then(children.clone())
            .then(closing_tag.clone())
            .try_map(|(children, closing), span| match closing {
                None => Ok(JsxElement {
                    name: None,
                    attributes: Vec::new(),
                    children,
                }),
                Some(name) => Err(Rich::custom(
                    span,
                    format!("expected closing fragment </> but found </{}>", name.join(".")),
                )),
            });

        let body = choice((
            just("/>").to(None),
            just('>')
                .ignore_then(children)
                .then(closing_tag)
                .map(Some),
        ));
        let tagged = just('<')
            .ignore_then(trivia())
            .ignore_then(tag_name)
            .then(attribute.repeated().collect::<Vec<_>>())
            .then(body)
            .try_map(|((name, attributes), body), span| {
                let children = match body {
                    None => Vec::new(),
                    Some((children, closing)) => {
                        if closing.as_ref() != Some(&name) {
                            let found = closing
                                .map(|closing| format!("</{}>", closing.join(".")))
                                .unwrap_or_else(|| "</>".to_string());
                            return Err(Rich::custom(
                                span,
                                format!(
                                    "expected corresponding closing tag </{}> but found {found}",
                                    name.join(".")
                                ),
                            ));
                        }
                        children
                    }
                };
                Ok(JsxElement {
                    name: Some(name),
                    attributes,
                    children,
                })
            });

        choice((fragment, tagged))
    })
    .boxed()
}

/// Renders parse errors the way the Boon interpreter does: one ariadne
/// report per error, colour disabled, collected into a string.
pub fn report_errors(filename: &str, source_code: &str, errors: &[ParseError<'_>]) -> String {
    errors
        .iter()
        .map(|error| {
            render_report(
                filename,
                source_code,
                error.span().into_range(),
                &error.to_string(),
                &error.reason().to_string(),
            )
        })
        .collect()
}

pub(crate) fn render_report(
    filename: &str,
    source_code: &str,
    range: std::ops::Range<usize>,
    message: &str,
    label: &str,
) -> String {
    let mut buffer = Vec::new();
    let written = Report::build(ReportKind::Error, (filename, range.clone()))
        .with_config(
            Config::default()
                .with_color(false)
                .with_index_type(IndexType::Byte),
        )
        .with_message(message)
        .with_label(Label::new((filename, range)).with_message(label))
        .finish()
        .write((filename, Source::from(source_code)), &mut buffer);
    match written {
        Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
        Err(_) => format!("{message}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! parse_and_test {
        ($code:expr, |$module:ident| $body:block) => {{
            let code: &str = $code;
            match parse_module(code) {
                Ok($module) => $body,
                Err(errors) => panic!(
                    "failed to parse:\n{}",
                    report_errors("test.jsx", code, &errors)
                ),
            }
        }};
    }

    fn default_export(module: &Module) -> &Expression {
        module
            .items
            .iter()
            .find_map(|item| match &item.node {
                ModuleItem::ExportDefault(expression) => Some(expression),
                _ => None,
            })
            .expect("module has a default export")
    }

    #[test]
    fn imports() {
        parse_and_test!(
            r#"
            import React, { useState, useEffect as effect } from 'react';
            import * as Icons from "lucide-react";
            import './styles.css'
            "#,
            |module| {
                assert_eq!(module.items.len(), 3);
                let ModuleItem::Import(first) = &module.items[0].node else {
                    panic!("expected import")
                };
                assert_eq!(&*first.source, "react");
                assert_eq!(first.clause.default.as_deref(), Some("React"));
                assert_eq!(first.clause.named.len(), 2);
                assert_eq!(&*first.clause.named[1].imported, "useEffect");
                assert_eq!(&*first.clause.named[1].local, "effect");
                let ModuleItem::Import(second) = &module.items[1].node else {
                    panic!("expected import")
                };
                assert_eq!(second.clause.namespace.as_deref(), Some("Icons"));
                let ModuleItem::Import(third) = &module.items[2].node else {
                    panic!("expected import")
                };
                assert!(third.clause.is_empty());
            }
        );
    }

    #[test]
    fn default_export_arrow_with_jsx() {
        parse_and_test!(
            r#"export default () => <div className="box">Hello {name}!</div>;"#,
            |module| {
                let Expression::Function(function) = default_export(&module) else {
                    panic!("expected function")
                };
                assert!(function.is_arrow);
                let FunctionBody::Expression(body) = &function.body else {
                    panic!("expected expression body")
                };
                let Expression::Jsx(element) = body.as_ref() else {
                    panic!("expected jsx")
                };
                assert_eq!(element.name.as_ref().map(|name| name.len()), Some(1));
                assert_eq!(element.attributes.len(), 1);
                assert_eq!(element.children.len(), 3);
            }
        );
    }

    #[test]
    fn jsx_nesting_fragments_and_member_tags() {
        parse_and_test!(
            r#"
            const view = (
              <>
                <Card.Header {...rest} disabled>
                  {/* comment */}
                  <img src={url} />
                </Card.Header>
              </>
            );
            "#,
            |module| {
                let ModuleItem::Statement(Statement::Declaration { declarators, .. }) =
                    &module.items[0].node
                else {
                    panic!("expected declaration")
                };
                let Some(Expression::Jsx(fragment)) = &declarators[0].init else {
                    panic!("expected jsx")
                };
                assert!(fragment.name.is_none());
                let inner = fragment
                    .children
                    .iter()
                    .find_map(|child| match child {
                        JsxChild::Element(element) => Some(element),
                        _ => None,
                    })
                    .expect("inner element");
                assert_eq!(inner.name.as_ref().map(|name| name.join(".")), Some("Card.Header".into()));
                assert!(matches!(inner.attributes[0], JsxAttribute::Spread(_)));
                assert!(matches!(
                    inner.attributes[1],
                    JsxAttribute::Named { value: None, .. }
                ));
                assert!(inner.children.iter().any(|child| matches!(child, JsxChild::Empty)));
            }
        );
    }

    #[test]
    fn operator_precedence() {
        parse_and_test!("x = a + b * c === d && !e;", |module| {
            let ModuleItem::Statement(Statement::Expression(Expression::Assignment {
                value, ..
            })) = &module.items[0].node
            else {
                panic!("expected assignment")
            };
            let Expression::Logical { left, right, .. } = value.as_ref() else {
                panic!("expected &&")
            };
            assert!(matches!(
                right.as_ref(),
                Expression::Unary {
                    operator: UnaryOperator::Not,
                    ..
                }
            ));
            let Expression::Binary {
                operator: BinaryOperator::StrictEqual,
                left,
                ..
            } = left.as_ref()
            else {
                panic!("expected ===")
            };
            let Expression::Binary {
                operator: BinaryOperator::Add,
                right,
                ..
            } = left.as_ref()
            else {
                panic!("expected +")
            };
            assert!(matches!(
                right.as_ref(),
                Expression::Binary {
                    operator: BinaryOperator::Multiply,
                    ..
                }
            ));
        });
    }

    #[test]
    fn statements_and_patterns() {
        parse_and_test!(
            r#"
            function Counter({ initial = 0, ...rest }) {
              const [count, setCount] = useState(initial);
              let total = 0;
              for (let i = 0; i < 3; i++) { total += i; }
              for (const [key, value] of Object.entries(rest)) { if (!value) continue; }
              try { risky(); } catch (error) { console.error(error.message); } finally { done(); }
              switch (count) { case 1: break; default: total = -1; }
              return count > 0 ? <span>{count}</span> : null;
            }
            export default Counter
            "#,
            |module| {
                let ModuleItem::Statement(Statement::Function(function)) = &module.items[0].node
                else {
                    panic!("expected function declaration")
                };
                assert_eq!(function.name.as_deref(), Some("Counter"));
                let Pattern::Object { properties, rest } = &function.params[0].pattern else {
                    panic!("expected object pattern")
                };
                assert!(properties[0].default.is_some());
                assert_eq!(rest.as_deref(), Some("rest"));
                let FunctionBody::Block(body) = &function.body else {
                    panic!("expected block")
                };
                assert_eq!(body.len(), 7);
                assert!(matches!(body[3], Statement::ForOf { .. }));
            }
        );
    }

    #[test]
    fn templates_and_optional_chaining() {
        parse_and_test!(
            "const label = `${user?.name ?? 'anon'} has ${items?.[0]?.count} $`;",
            |module| {
                let ModuleItem::Statement(Statement::Declaration { declarators, .. }) =
                    &module.items[0].node
                else {
                    panic!("expected declaration")
                };
                let Some(Expression::Template(parts)) = &declarators[0].init else {
                    panic!("expected template")
                };
                assert_eq!(parts.len(), 4);
                assert!(matches!(&parts[3], TemplatePart::String(text) if &**text == " $"));
            }
        );
    }

    #[test]
    fn array_pattern_holes() {
        parse_and_test!("const [, second, ...others] = list;", |module| {
            let ModuleItem::Statement(Statement::Declaration { declarators, .. }) =
                &module.items[0].node
            else {
                panic!("expected declaration")
            };
            let Pattern::Array { elements, rest } = &declarators[0].pattern else {
                panic!("expected array pattern")
            };
            assert_eq!(elements.len(), 2);
            assert!(elements[0].is_none());
            assert!(rest.is_some());
        });
    }

    #[test]
    fn unterminated_element_is_an_error() {
        let errors = parse_module("export default () => <div>;").unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn mismatched_closing_tag_is_an_error() {
        let code = "const a = <div><span></div></span>;";
        let errors = parse_module(code).unwrap_err();
        let report = report_errors("test.jsx", code, &errors);
        assert!(report.contains("Error"), "{report}");
    }

    #[test]
    fn reserved_words_are_not_identifiers() {
        assert!(parse_module("const class = 1;").is_err());
    }
}
