//! Query-level nodes: selects, joins, CTEs, windows, set operations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::expr::Expr;
use crate::error::Span;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExpr {
    pub expr: Box<Expr>,
    pub order: SortOrder,
    pub span: Option<Span>,
}

/// Join operator between two FROM targets. The first target of a select has
/// no operator; chained targets carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinOp {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl std::fmt::Display for JoinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinOp::Inner => write!(f, "INNER JOIN"),
            JoinOp::Left => write!(f, "LEFT JOIN"),
            JoinOp::Right => write!(f, "RIGHT JOIN"),
            JoinOp::Full => write!(f, "FULL JOIN"),
            JoinOp::Cross => write!(f, "CROSS JOIN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    On,
    Using,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinConstraint {
    pub expr: Box<Expr>,
    pub kind: ConstraintKind,
    pub span: Option<Span>,
}

/// `SAMPLE 0.1` / `SAMPLE 1/10 OFFSET 1/2`. Values are ratio expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleExpr {
    pub value: RatioExpr,
    pub offset: Option<RatioExpr>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioExpr {
    pub left: Box<Expr>,
    pub right: Option<Box<Expr>>,
    pub span: Option<Span>,
}

/// One FROM/JOIN target. Chained joins hang off `next_join`, mirroring the
/// textual order of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinExpr {
    /// A `Field` naming a table or CTE, or a `Select`/`SelectSet` subquery.
    pub table: Box<Expr>,
    pub alias: Option<String>,
    /// `None` for the leading FROM target.
    pub join_op: Option<JoinOp>,
    pub constraint: Option<JoinConstraint>,
    pub sample: Option<SampleExpr>,
    pub next_join: Option<Box<JoinExpr>>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

impl JoinExpr {
    pub fn table(name: &str) -> Self {
        JoinExpr {
            table: Box::new(Expr::field(name)),
            alias: None,
            join_op: None,
            constraint: None,
            sample: None,
            next_join: None,
            span: None,
            ty: None,
        }
    }

    pub fn subquery(select: SelectQuery, alias: &str) -> Self {
        JoinExpr {
            table: Box::new(Expr::Select(Box::new(select))),
            alias: Some(alias.to_string()),
            join_op: None,
            constraint: None,
            sample: None,
            next_join: None,
            span: None,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CteKind {
    /// `WITH expr AS name` - the expression is substituted wherever the name
    /// appears in the scope.
    Column,
    /// `WITH name AS (SELECT ...)` - a named virtual table for FROM/JOIN.
    Subquery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cte {
    pub name: String,
    pub expr: Box<Expr>,
    pub kind: CteKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    Rows,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u32),
    CurrentRow,
    Following(u32),
    UnboundedFollowing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFrame {
    pub kind: FrameKind,
    pub start: FrameBound,
    pub end: Option<FrameBound>,
}

/// A window definition: `(PARTITION BY a ORDER BY b ROWS BETWEEN ...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowExpr {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderExpr>,
    pub frame: Option<WindowFrame>,
    pub span: Option<Span>,
}

/// Engine knobs attached to a query, emitted as a trailing SETTINGS clause
/// in the execution dialect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_execution_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_experimental_object_type: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_algorithm: Option<String>,
}

impl QuerySettings {
    /// Settings in declaration order as `(name, rendered value)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(v) = self.readonly {
            out.push(("readonly", v.to_string()));
        }
        if let Some(v) = self.max_execution_time {
            out.push(("max_execution_time", v.to_string()));
        }
        if let Some(v) = self.allow_experimental_object_type {
            out.push(("allow_experimental_object_type", if v { "1" } else { "0" }.to_string()));
        }
        if let Some(v) = &self.join_algorithm {
            out.push(("join_algorithm", format!("'{}'", v.replace('\'', "\\'"))));
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    /// CTEs in declaration order. Later CTEs may reference earlier ones.
    pub ctes: IndexMap<String, Cte>,
    pub select: Vec<Expr>,
    pub distinct: bool,
    pub select_from: Option<JoinExpr>,
    pub where_expr: Option<Box<Expr>>,
    pub prewhere: Option<Box<Expr>>,
    pub group_by: Vec<Expr>,
    pub having: Option<Box<Expr>>,
    pub window_exprs: IndexMap<String, WindowExpr>,
    pub order_by: Vec<OrderExpr>,
    pub limit: Option<Box<Expr>>,
    pub offset: Option<Box<Expr>>,
    pub limit_with_ties: bool,
    pub settings: Option<QuerySettings>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a select expression.
    pub fn column(mut self, expr: Expr) -> Self {
        self.select.push(expr);
        self
    }

    /// Builder: set the FROM target to a named table.
    pub fn from_table(mut self, name: &str) -> Self {
        self.select_from = Some(JoinExpr::table(name));
        self
    }

    /// Builder: set the WHERE expression.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_expr = Some(Box::new(expr));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    UnionAll,
    UnionDistinct,
    Intersect,
    Except,
}

impl std::fmt::Display for SetOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetOperator::UnionAll => write!(f, "UNION ALL"),
            SetOperator::UnionDistinct => write!(f, "UNION DISTINCT"),
            SetOperator::Intersect => write!(f, "INTERSECT"),
            SetOperator::Except => write!(f, "EXCEPT"),
        }
    }
}

/// One `<set op> SELECT ...` continuation in a set query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectSetNode {
    pub op: SetOperator,
    /// A `Select` or nested `SelectSet` expression.
    pub select: Box<Expr>,
}

/// `SELECT ... UNION ALL SELECT ... EXCEPT SELECT ...`, preserving operator
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectSetQuery {
    pub initial: Box<Expr>,
    pub subsequent: Vec<SelectSetNode>,
    pub span: Option<Span>,
    pub ty: Option<TypeId>,
}
