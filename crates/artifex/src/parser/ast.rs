use std::rc::Rc;

use super::Span;

/// Identifier and property names are shared between the AST and runtime
/// scopes, so they are reference counted from the start.
pub type Name = Rc<str>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub items: Vec<Spanned<ModuleItem>>,
}

#[derive(Debug, Clone)]
pub enum ModuleItem {
    Import(ImportDeclaration),
    ExportDefault(Expression),
    /// `export const ...` / `export function ...`
    ExportDeclaration(Statement),
    ExportNamed(Vec<ExportSpecifier>),
    Statement(Statement),
}

#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    pub source: Name,
    pub clause: ImportClause,
}

#[derive(Debug, Clone, Default)]
pub struct ImportClause {
    pub default: Option<Name>,
    pub namespace: Option<Name>,
    pub named: Vec<ImportSpecifier>,
}

impl ImportClause {
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.namespace.is_none() && self.named.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ImportSpecifier {
    pub imported: Name,
    pub local: Name,
}

#[derive(Debug, Clone)]
pub struct ExportSpecifier {
    pub local: Name,
    pub exported: Name,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Declaration {
        kind: DeclarationKind,
        declarators: Vec<Declarator>,
    },
    Function(Rc<Function>),
    Return(Option<Expression>),
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    For {
        init: Option<Box<Statement>>,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    ForOf {
        kind: DeclarationKind,
        pattern: Pattern,
        iterable: Expression,
        body: Box<Statement>,
    },
    While {
        test: Expression,
        body: Box<Statement>,
    },
    Switch {
        discriminant: Expression,
        cases: Vec<SwitchCase>,
    },
    Break,
    Continue,
    Throw(Expression),
    Try {
        block: Vec<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Statement>>,
    },
    Block(Vec<Statement>),
    Expression(Expression),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Const,
    Let,
    Var,
}

impl DeclarationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Const => "const",
            Self::Let => "let",
            Self::Var => "var",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier(Name),
    Object {
        properties: Vec<PatternProperty>,
        rest: Option<Name>,
    },
    Array {
        elements: Vec<Option<PatternElement>>,
        rest: Option<Box<Pattern>>,
    },
}

impl Pattern {
    /// Every identifier the pattern binds, in source order.
    pub fn bound_names(&self) -> Vec<Name> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<Name>) {
        match self {
            Pattern::Identifier(name) => names.push(name.clone()),
            Pattern::Object { properties, rest } => {
                for property in properties {
                    property.value.collect_names(names);
                }
                names.extend(rest.iter().cloned());
            }
            Pattern::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    element.pattern.collect_names(names);
                }
                if let Some(rest) = rest {
                    rest.collect_names(names);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub key: Name,
    pub value: Pattern,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct PatternElement {
    pub pattern: Pattern,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<Name>,
    pub params: Vec<Parameter>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub pattern: Pattern,
    pub default: Option<Expression>,
    pub rest: bool,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    Expression(Box<Expression>),
}

#[derive(Debug, Clone)]
pub enum Expression {
    Number(f64),
    String(Name),
    Template(Vec<TemplatePart>),
    Boolean(bool),
    Null,
    Undefined,
    Identifier(Name),
    Array(Vec<ArrayElement>),
    Object(Vec<ObjectMember>),
    Function(Rc<Function>),
    Unary {
        operator: UnaryOperator,
        argument: Box<Expression>,
    },
    Update {
        operator: UpdateOperator,
        prefix: bool,
        target: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Assignment {
        operator: AssignmentOperator,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Member {
        object: Box<Expression>,
        property: MemberProperty,
        optional: bool,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
        optional: bool,
    },
    New {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
    },
    Await(Box<Expression>),
    Jsx(Box<JsxElement>),
}

impl Expression {
    pub fn identifier(name: &str) -> Self {
        Expression::Identifier(Name::from(name))
    }

    pub fn string(value: &str) -> Self {
        Expression::String(Name::from(value))
    }

    pub fn member(object: Expression, name: &str) -> Self {
        Expression::Member {
            object: Box::new(object),
            property: MemberProperty::Named(Name::from(name)),
            optional: false,
        }
    }

    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Self {
        Expression::Call {
            callee: Box::new(callee),
            arguments: arguments.into_iter().map(Argument::Value).collect(),
            optional: false,
        }
    }

    pub fn assign(target: Expression, value: Expression) -> Self {
        Expression::Assignment {
            operator: AssignmentOperator::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    String(Name),
    Expression(Expression),
}

#[derive(Debug, Clone)]
pub enum ArrayElement {
    Item(Expression),
    Spread(Expression),
}

#[derive(Debug, Clone)]
pub enum ObjectMember {
    Property { key: PropertyKey, value: Expression },
    Spread(Expression),
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Named(Name),
    Computed(Expression),
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Named(Name),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone)]
pub enum Argument {
    Value(Expression),
    Spread(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
    TypeOf,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Negate => "-",
            Self::Plus => "+",
            Self::TypeOf => "typeof ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

impl UpdateOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increment => "++",
            Self::Decrement => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Remainder => "%",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::StrictEqual => "===",
            Self::StrictNotEqual => "!==",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::Remainder => 13,
            Self::Add | Self::Subtract => 12,
            Self::Less | Self::LessOrEqual | Self::Greater | Self::GreaterOrEqual => 10,
            Self::Equal | Self::NotEqual | Self::StrictEqual | Self::StrictNotEqual => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Coalesce,
}

impl LogicalOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Coalesce => "??",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Self::And => 8,
            Self::Or => 7,
            Self::Coalesce => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Coalesce,
    Or,
    And,
}

impl AssignmentOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Add => "+=",
            Self::Subtract => "-=",
            Self::Multiply => "*=",
            Self::Divide => "/=",
            Self::Remainder => "%=",
            Self::Coalesce => "??=",
            Self::Or => "||=",
            Self::And => "&&=",
        }
    }

    /// Arithmetic operator a compound assignment applies, if any.
    pub fn binary(self) -> Option<BinaryOperator> {
        match self {
            Self::Add => Some(BinaryOperator::Add),
            Self::Subtract => Some(BinaryOperator::Subtract),
            Self::Multiply => Some(BinaryOperator::Multiply),
            Self::Divide => Some(BinaryOperator::Divide),
            Self::Remainder => Some(BinaryOperator::Remainder),
            Self::Assign | Self::Coalesce | Self::Or | Self::And => None,
        }
    }

    pub fn logical(self) -> Option<LogicalOperator> {
        match self {
            Self::Coalesce => Some(LogicalOperator::Coalesce),
            Self::Or => Some(LogicalOperator::Or),
            Self::And => Some(LogicalOperator::And),
            _ => None,
        }
    }
}

/// A JSX element or fragment as written in the source.
#[derive(Debug, Clone)]
pub struct JsxElement {
    /// `None` for fragments (`<>...</>`).
    pub name: Option<Vec<Name>>,
    pub attributes: Vec<JsxAttribute>,
    pub children: Vec<JsxChild>,
}

#[derive(Debug, Clone)]
pub enum JsxAttribute {
    Named {
        name: Name,
        value: Option<JsxAttributeValue>,
    },
    Spread(Expression),
}

#[derive(Debug, Clone)]
pub enum JsxAttributeValue {
    /// Raw text between quotes; entities are decoded during lowering.
    String(String),
    Expression(Expression),
    Element(JsxElement),
}

#[derive(Debug, Clone)]
pub enum JsxChild {
    Text(String),
    Expression(Expression),
    /// `{}` or `{/* comment */}`
    Empty,
    Element(JsxElement),
}
