//! Expression nodes.
//!
//! Every node struct carries an optional source [`Span`] for diagnostics and
//! an optional [`TypeId`] slot filled in by the resolver. Nodes own their
//! children; symbol types live in the compilation context's arena and are
//! referenced by id, never by pointer.

use serde::{Deserialize, Serialize};

use crate::ast::constant::Constant;
use crate::ast::query::{SelectQuery, SelectSetQuery, WindowExpr};
use crate::error::Span;
use crate::types::TypeId;

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl std::fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArithmeticOp::Add => write!(f, "+"),
            ArithmeticOp::Sub => write!(f, "-"),
            ArithmeticOp::Mul => write!(f, "*"),
            ArithmeticOp::Div => write!(f, "/"),
            ArithmeticOp::Mod => write!(f, "%"),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    ILike,
    NotLike,
    NotILike,
    Regex,
    NotRegex,
    In,
    NotIn,
}

impl CompareOp {
    /// The negated form, used when rewriting `NOT (a = b)` style constructs.
    pub fn negated(self) -> Option<CompareOp> {
        match self {
            CompareOp::Eq => Some(CompareOp::NotEq),
            CompareOp::NotEq => Some(CompareOp::Eq),
            CompareOp::Lt => Some(CompareOp::GtEq),
            CompareOp::LtEq => Some(CompareOp::Gt),
            CompareOp::Gt => Some(CompareOp::LtEq),
            CompareOp::GtEq => Some(CompareOp::Lt),
            CompareOp::Like => Some(CompareOp::NotLike),
            CompareOp::NotLike => Some(CompareOp::Like),
            CompareOp::ILike => Some(CompareOp::NotILike),
            CompareOp::NotILike => Some(CompareOp::ILike),
            CompareOp::Regex => Some(CompareOp::NotRegex),
            CompareOp::NotRegex => Some(CompareOp::Regex),
            CompareOp::In => Some(CompareOp::NotIn),
            CompareOp::NotIn => Some(CompareOp::In),
        }
    }
}

/// A dotted name reference: `event`, `events.timestamp`,
/// `events.properties.browser`. `*` is the chain `["*"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub chain: Vec<String>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantExpr {
    pub value: Constant,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

/// A function call. `params` carries the parameter list of parametric
/// aggregates, e.g. `quantile(0.95)(duration)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub params: Option<Vec<Expr>>,
    pub distinct: bool,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithmeticOperation {
    pub op: ArithmeticOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareOperation {
    pub op: CompareOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct And {
    pub exprs: Vec<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Or {
    pub exprs: Vec<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Not {
    pub expr: Box<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpr {
    pub items: Vec<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleExpr {
    pub items: Vec<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

/// `expr AS name`. Registers `name` as a column alias in the enclosing
/// select scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub expr: Box<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

/// `x -> x + 1` or `(x, y) -> x + y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub args: Vec<String>,
    pub body: Box<Expr>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

/// A named hole (`{interval}`) substituted from a caller-supplied mapping
/// before resolution. Must not survive to the printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    pub name: String,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

/// Reference to a window: either a name declared in the query's WINDOW
/// clause or an inline `OVER (...)` definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowRef {
    Name(String),
    Inline(WindowExpr),
}

/// `row_number() OVER (PARTITION BY ... ORDER BY ...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFunction {
    pub name: String,
    pub args: Vec<Expr>,
    pub over: WindowRef,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

/// Structured UI payload embedded in a query, e.g. a visualization tag with
/// attribute expressions. Carried through resolution untouched except for
/// its attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagExpr {
    pub kind: String,
    pub attributes: Vec<TagAttribute>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAttribute {
    pub name: String,
    pub value: Expr,
}

/// The closed set of expression node kinds. Both traversal strategies in
/// [`crate::ast::visit`] match exhaustively over this enum, so adding a kind
/// is a compile-time-checked change to every walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Field(Field),
    Constant(ConstantExpr),
    Call(Call),
    Arithmetic(ArithmeticOperation),
    Compare(CompareOperation),
    And(And),
    Or(Or),
    Not(Not),
    Array(ArrayExpr),
    Tuple(TupleExpr),
    Alias(Alias),
    Lambda(Lambda),
    Placeholder(Placeholder),
    Window(WindowFunction),
    Tag(TagExpr),
    Select(Box<SelectQuery>),
    SelectSet(Box<SelectSetQuery>),
}

impl Expr {
    /// A field reference from a dotted path, `"events.timestamp"` becoming
    /// the chain `["events", "timestamp"]`.
    pub fn field(path: &str) -> Expr {
        Expr::Field(Field {
            chain: path.split('.').map(str::to_string).collect(),
            span: None,
            ty: None,
        })
    }

    pub fn constant(value: impl Into<Constant>) -> Expr {
        Expr::Constant(ConstantExpr {
            value: value.into(),
            span: None,
            ty: None,
        })
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call(Call {
            name: name.to_string(),
            args,
            params: None,
            distinct: false,
            span: None,
            ty: None,
        })
    }

    pub fn alias(name: &str, expr: Expr) -> Expr {
        Expr::Alias(Alias {
            name: name.to_string(),
            expr: Box::new(expr),
            span: None,
            ty: None,
        })
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
        Expr::Compare(CompareOperation {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: None,
            ty: None,
        })
    }

    pub fn and(exprs: Vec<Expr>) -> Expr {
        Expr::And(And {
            exprs,
            span: None,
            ty: None,
        })
    }

    pub fn or(exprs: Vec<Expr>) -> Expr {
        Expr::Or(Or {
            exprs,
            span: None,
            ty: None,
        })
    }

    /// The source span of this node, if recorded.
    pub fn span(&self) -> Option<Span> {
        match self {
            Expr::Field(n) => n.span,
            Expr::Constant(n) => n.span,
            Expr::Call(n) => n.span,
            Expr::Arithmetic(n) => n.span,
            Expr::Compare(n) => n.span,
            Expr::And(n) => n.span,
            Expr::Or(n) => n.span,
            Expr::Not(n) => n.span,
            Expr::Array(n) => n.span,
            Expr::Tuple(n) => n.span,
            Expr::Alias(n) => n.span,
            Expr::Lambda(n) => n.span,
            Expr::Placeholder(n) => n.span,
            Expr::Window(n) => n.span,
            Expr::Tag(n) => n.span,
            Expr::Select(n) => n.span,
            Expr::SelectSet(n) => n.span,
        }
    }

    /// The resolved symbol type of this node, if the resolver has run.
    pub fn ty(&self) -> Option<TypeId> {
        match self {
            Expr::Field(n) => n.ty,
            Expr::Constant(n) => n.ty,
            Expr::Call(n) => n.ty,
            Expr::Arithmetic(n) => n.ty,
            Expr::Compare(n) => n.ty,
            Expr::And(n) => n.ty,
            Expr::Or(n) => n.ty,
            Expr::Not(n) => n.ty,
            Expr::Array(n) => n.ty,
            Expr::Tuple(n) => n.ty,
            Expr::Alias(n) => n.ty,
            Expr::Lambda(n) => n.ty,
            Expr::Placeholder(n) => n.ty,
            Expr::Window(n) => n.ty,
            Expr::Tag(n) => n.ty,
            Expr::Select(n) => n.ty,
            Expr::SelectSet(n) => n.ty,
        }
    }

    /// Human-readable kind name, used by internal errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Field(_) => "Field",
            Expr::Constant(_) => "Constant",
            Expr::Call(_) => "Call",
            Expr::Arithmetic(_) => "ArithmeticOperation",
            Expr::Compare(_) => "CompareOperation",
            Expr::And(_) => "And",
            Expr::Or(_) => "Or",
            Expr::Not(_) => "Not",
            Expr::Array(_) => "Array",
            Expr::Tuple(_) => "Tuple",
            Expr::Alias(_) => "Alias",
            Expr::Lambda(_) => "Lambda",
            Expr::Placeholder(_) => "Placeholder",
            Expr::Window(_) => "WindowFunction",
            Expr::Tag(_) => "Tag",
            Expr::Select(_) => "SelectQuery",
            Expr::SelectSet(_) => "SelectSetQuery",
        }
    }
}
