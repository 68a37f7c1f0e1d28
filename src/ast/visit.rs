//! Tree traversal: a non-mutating walk and a cloning walk.
//!
//! Both dispatch through an exhaustive match over [`Expr`], so a node kind
//! added later fails to compile until every walk handles it. Rewrite passes
//! implement [`CloningVisitor`] and override only the kinds they care about;
//! the defaults reconstruct each node from its visited children.

use indexmap::IndexMap;

use crate::ast::expr::*;
use crate::ast::query::*;
use crate::error::QueryResult;

/// Non-mutating traversal. Per-kind hooks default to walking children.
pub trait Visitor: Sized {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Field(n) => self.visit_field(n),
            Expr::Constant(n) => self.visit_constant(n),
            Expr::Call(n) => self.visit_call(n),
            Expr::Arithmetic(n) => self.visit_arithmetic(n),
            Expr::Compare(n) => self.visit_compare(n),
            Expr::And(n) => self.visit_and(n),
            Expr::Or(n) => self.visit_or(n),
            Expr::Not(n) => self.visit_not(n),
            Expr::Array(n) => self.visit_array(n),
            Expr::Tuple(n) => self.visit_tuple(n),
            Expr::Alias(n) => self.visit_alias(n),
            Expr::Lambda(n) => self.visit_lambda(n),
            Expr::Placeholder(n) => self.visit_placeholder(n),
            Expr::Window(n) => self.visit_window_function(n),
            Expr::Tag(n) => self.visit_tag(n),
            Expr::Select(n) => self.visit_select_query(n),
            Expr::SelectSet(n) => self.visit_select_set_query(n),
        }
    }

    fn visit_field(&mut self, _node: &Field) {}

    fn visit_constant(&mut self, _node: &ConstantExpr) {}

    fn visit_call(&mut self, node: &Call) {
        walk_call(self, node);
    }

    fn visit_arithmetic(&mut self, node: &ArithmeticOperation) {
        self.visit_expr(&node.left);
        self.visit_expr(&node.right);
    }

    fn visit_compare(&mut self, node: &CompareOperation) {
        self.visit_expr(&node.left);
        self.visit_expr(&node.right);
    }

    fn visit_and(&mut self, node: &And) {
        for e in &node.exprs {
            self.visit_expr(e);
        }
    }

    fn visit_or(&mut self, node: &Or) {
        for e in &node.exprs {
            self.visit_expr(e);
        }
    }

    fn visit_not(&mut self, node: &Not) {
        self.visit_expr(&node.expr);
    }

    fn visit_array(&mut self, node: &ArrayExpr) {
        for e in &node.items {
            self.visit_expr(e);
        }
    }

    fn visit_tuple(&mut self, node: &TupleExpr) {
        for e in &node.items {
            self.visit_expr(e);
        }
    }

    fn visit_alias(&mut self, node: &Alias) {
        self.visit_expr(&node.expr);
    }

    fn visit_lambda(&mut self, node: &Lambda) {
        self.visit_expr(&node.body);
    }

    fn visit_placeholder(&mut self, _node: &Placeholder) {}

    fn visit_window_function(&mut self, node: &WindowFunction) {
        for e in &node.args {
            self.visit_expr(e);
        }
        if let WindowRef::Inline(w) = &node.over {
            self.visit_window_expr(w);
        }
    }

    fn visit_tag(&mut self, node: &TagExpr) {
        for attr in &node.attributes {
            self.visit_expr(&attr.value);
        }
    }

    fn visit_select_query(&mut self, node: &SelectQuery) {
        walk_select_query(self, node);
    }

    fn visit_select_set_query(&mut self, node: &SelectSetQuery) {
        self.visit_expr(&node.initial);
        for n in &node.subsequent {
            self.visit_expr(&n.select);
        }
    }

    fn visit_join_expr(&mut self, node: &JoinExpr) {
        walk_join_expr(self, node);
    }

    fn visit_order_expr(&mut self, node: &OrderExpr) {
        self.visit_expr(&node.expr);
    }

    fn visit_window_expr(&mut self, node: &WindowExpr) {
        for e in &node.partition_by {
            self.visit_expr(e);
        }
        for o in &node.order_by {
            self.visit_order_expr(o);
        }
    }

    fn visit_sample_expr(&mut self, node: &SampleExpr) {
        self.visit_ratio_expr(&node.value);
        if let Some(off) = &node.offset {
            self.visit_ratio_expr(off);
        }
    }

    fn visit_ratio_expr(&mut self, node: &RatioExpr) {
        self.visit_expr(&node.left);
        if let Some(r) = &node.right {
            self.visit_expr(r);
        }
    }
}

pub fn walk_call<V: Visitor>(v: &mut V, node: &Call) {
    for e in &node.args {
        v.visit_expr(e);
    }
    if let Some(params) = &node.params {
        for e in params {
            v.visit_expr(e);
        }
    }
}

pub fn walk_select_query<V: Visitor>(v: &mut V, node: &SelectQuery) {
    for cte in node.ctes.values() {
        v.visit_expr(&cte.expr);
    }
    for e in &node.select {
        v.visit_expr(e);
    }
    if let Some(from) = &node.select_from {
        v.visit_join_expr(from);
    }
    if let Some(e) = &node.prewhere {
        v.visit_expr(e);
    }
    if let Some(e) = &node.where_expr {
        v.visit_expr(e);
    }
    for e in &node.group_by {
        v.visit_expr(e);
    }
    if let Some(e) = &node.having {
        v.visit_expr(e);
    }
    for w in node.window_exprs.values() {
        v.visit_window_expr(w);
    }
    for o in &node.order_by {
        v.visit_order_expr(o);
    }
    if let Some(e) = &node.limit {
        v.visit_expr(e);
    }
    if let Some(e) = &node.offset {
        v.visit_expr(e);
    }
}

pub fn walk_join_expr<V: Visitor>(v: &mut V, node: &JoinExpr) {
    v.visit_expr(&node.table);
    if let Some(c) = &node.constraint {
        v.visit_expr(&c.expr);
    }
    if let Some(s) = &node.sample {
        v.visit_sample_expr(s);
    }
    if let Some(next) = &node.next_join {
        v.visit_join_expr(next);
    }
}

/// Cloning traversal: every hook returns a freshly built node. The defaults
/// reproduce the input structurally, so `visit_expr` on an untouched visitor
/// is a deep clone. Failures propagate, aborting the rewrite.
pub trait CloningVisitor: Sized {
    fn visit_expr(&mut self, expr: &Expr) -> QueryResult<Expr> {
        match expr {
            Expr::Field(n) => self.visit_field(n),
            Expr::Constant(n) => self.visit_constant(n),
            Expr::Call(n) => self.visit_call(n),
            Expr::Arithmetic(n) => self.visit_arithmetic(n),
            Expr::Compare(n) => self.visit_compare(n),
            Expr::And(n) => self.visit_and(n),
            Expr::Or(n) => self.visit_or(n),
            Expr::Not(n) => self.visit_not(n),
            Expr::Array(n) => self.visit_array(n),
            Expr::Tuple(n) => self.visit_tuple(n),
            Expr::Alias(n) => self.visit_alias(n),
            Expr::Lambda(n) => self.visit_lambda(n),
            Expr::Placeholder(n) => self.visit_placeholder(n),
            Expr::Window(n) => self.visit_window_function(n),
            Expr::Tag(n) => self.visit_tag(n),
            Expr::Select(n) => Ok(Expr::Select(Box::new(self.visit_select_query(n)?))),
            Expr::SelectSet(n) => Ok(Expr::SelectSet(Box::new(self.visit_select_set_query(n)?))),
        }
    }

    fn visit_field(&mut self, node: &Field) -> QueryResult<Expr> {
        Ok(Expr::Field(node.clone()))
    }

    fn visit_constant(&mut self, node: &ConstantExpr) -> QueryResult<Expr> {
        Ok(Expr::Constant(node.clone()))
    }

    fn visit_call(&mut self, node: &Call) -> QueryResult<Expr> {
        Ok(Expr::Call(clone_call(self, node)?))
    }

    fn visit_arithmetic(&mut self, node: &ArithmeticOperation) -> QueryResult<Expr> {
        Ok(Expr::Arithmetic(ArithmeticOperation {
            op: node.op,
            left: Box::new(self.visit_expr(&node.left)?),
            right: Box::new(self.visit_expr(&node.right)?),
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_compare(&mut self, node: &CompareOperation) -> QueryResult<Expr> {
        Ok(Expr::Compare(CompareOperation {
            op: node.op,
            left: Box::new(self.visit_expr(&node.left)?),
            right: Box::new(self.visit_expr(&node.right)?),
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_and(&mut self, node: &And) -> QueryResult<Expr> {
        Ok(Expr::And(And {
            exprs: self.visit_exprs(&node.exprs)?,
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_or(&mut self, node: &Or) -> QueryResult<Expr> {
        Ok(Expr::Or(Or {
            exprs: self.visit_exprs(&node.exprs)?,
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_not(&mut self, node: &Not) -> QueryResult<Expr> {
        Ok(Expr::Not(Not {
            expr: Box::new(self.visit_expr(&node.expr)?),
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_array(&mut self, node: &ArrayExpr) -> QueryResult<Expr> {
        Ok(Expr::Array(ArrayExpr {
            items: self.visit_exprs(&node.items)?,
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_tuple(&mut self, node: &TupleExpr) -> QueryResult<Expr> {
        Ok(Expr::Tuple(TupleExpr {
            items: self.visit_exprs(&node.items)?,
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_alias(&mut self, node: &Alias) -> QueryResult<Expr> {
        Ok(Expr::Alias(Alias {
            name: node.name.clone(),
            expr: Box::new(self.visit_expr(&node.expr)?),
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_lambda(&mut self, node: &Lambda) -> QueryResult<Expr> {
        Ok(Expr::Lambda(Lambda {
            args: node.args.clone(),
            body: Box::new(self.visit_expr(&node.body)?),
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_placeholder(&mut self, node: &Placeholder) -> QueryResult<Expr> {
        Ok(Expr::Placeholder(node.clone()))
    }

    fn visit_window_function(&mut self, node: &WindowFunction) -> QueryResult<Expr> {
        let over = match &node.over {
            WindowRef::Name(n) => WindowRef::Name(n.clone()),
            WindowRef::Inline(w) => WindowRef::Inline(self.visit_window_expr(w)?),
        };
        Ok(Expr::Window(WindowFunction {
            name: node.name.clone(),
            args: self.visit_exprs(&node.args)?,
            over,
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_tag(&mut self, node: &TagExpr) -> QueryResult<Expr> {
        let mut attributes = Vec::with_capacity(node.attributes.len());
        for attr in &node.attributes {
            attributes.push(TagAttribute {
                name: attr.name.clone(),
                value: self.visit_expr(&attr.value)?,
            });
        }
        Ok(Expr::Tag(TagExpr {
            kind: node.kind.clone(),
            attributes,
            span: node.span,
            ty: node.ty,
        }))
    }

    fn visit_select_query(&mut self, node: &SelectQuery) -> QueryResult<SelectQuery> {
        clone_select_query(self, node)
    }

    fn visit_select_set_query(&mut self, node: &SelectSetQuery) -> QueryResult<SelectSetQuery> {
        let mut subsequent = Vec::with_capacity(node.subsequent.len());
        for n in &node.subsequent {
            subsequent.push(SelectSetNode {
                op: n.op,
                select: Box::new(self.visit_expr(&n.select)?),
            });
        }
        Ok(SelectSetQuery {
            initial: Box::new(self.visit_expr(&node.initial)?),
            subsequent,
            span: node.span,
            ty: node.ty,
        })
    }

    fn visit_join_expr(&mut self, node: &JoinExpr) -> QueryResult<JoinExpr> {
        clone_join_expr(self, node)
    }

    fn visit_order_expr(&mut self, node: &OrderExpr) -> QueryResult<OrderExpr> {
        Ok(OrderExpr {
            expr: Box::new(self.visit_expr(&node.expr)?),
            order: node.order,
            span: node.span,
        })
    }

    fn visit_window_expr(&mut self, node: &WindowExpr) -> QueryResult<WindowExpr> {
        let mut order_by = Vec::with_capacity(node.order_by.len());
        for o in &node.order_by {
            order_by.push(self.visit_order_expr(o)?);
        }
        Ok(WindowExpr {
            partition_by: self.visit_exprs(&node.partition_by)?,
            order_by,
            frame: node.frame.clone(),
            span: node.span,
        })
    }

    fn visit_sample_expr(&mut self, node: &SampleExpr) -> QueryResult<SampleExpr> {
        Ok(SampleExpr {
            value: self.visit_ratio_expr(&node.value)?,
            offset: match &node.offset {
                Some(r) => Some(self.visit_ratio_expr(r)?),
                None => None,
            },
            span: node.span,
        })
    }

    fn visit_ratio_expr(&mut self, node: &RatioExpr) -> QueryResult<RatioExpr> {
        Ok(RatioExpr {
            left: Box::new(self.visit_expr(&node.left)?),
            right: match &node.right {
                Some(r) => Some(Box::new(self.visit_expr(r)?)),
                None => None,
            },
            span: node.span,
        })
    }

    fn visit_exprs(&mut self, exprs: &[Expr]) -> QueryResult<Vec<Expr>> {
        exprs.iter().map(|e| self.visit_expr(e)).collect()
    }
}

pub fn clone_call<V: CloningVisitor>(v: &mut V, node: &Call) -> QueryResult<Call> {
    Ok(Call {
        name: node.name.clone(),
        args: v.visit_exprs(&node.args)?,
        params: match &node.params {
            Some(params) => Some(v.visit_exprs(params)?),
            None => None,
        },
        distinct: node.distinct,
        span: node.span,
        ty: node.ty,
    })
}

pub fn clone_select_query<V: CloningVisitor>(
    v: &mut V,
    node: &SelectQuery,
) -> QueryResult<SelectQuery> {
    let mut ctes = IndexMap::with_capacity(node.ctes.len());
    for (name, cte) in &node.ctes {
        ctes.insert(
            name.clone(),
            Cte {
                name: cte.name.clone(),
                expr: Box::new(v.visit_expr(&cte.expr)?),
                kind: cte.kind,
            },
        );
    }
    let mut window_exprs = IndexMap::with_capacity(node.window_exprs.len());
    for (name, w) in &node.window_exprs {
        window_exprs.insert(name.clone(), v.visit_window_expr(w)?);
    }
    let mut order_by = Vec::with_capacity(node.order_by.len());
    for o in &node.order_by {
        order_by.push(v.visit_order_expr(o)?);
    }
    Ok(SelectQuery {
        ctes,
        select: v.visit_exprs(&node.select)?,
        distinct: node.distinct,
        select_from: match &node.select_from {
            Some(j) => Some(v.visit_join_expr(j)?),
            None => None,
        },
        where_expr: match &node.where_expr {
            Some(e) => Some(Box::new(v.visit_expr(e)?)),
            None => None,
        },
        prewhere: match &node.prewhere {
            Some(e) => Some(Box::new(v.visit_expr(e)?)),
            None => None,
        },
        group_by: v.visit_exprs(&node.group_by)?,
        having: match &node.having {
            Some(e) => Some(Box::new(v.visit_expr(e)?)),
            None => None,
        },
        window_exprs,
        order_by,
        limit: match &node.limit {
            Some(e) => Some(Box::new(v.visit_expr(e)?)),
            None => None,
        },
        offset: match &node.offset {
            Some(e) => Some(Box::new(v.visit_expr(e)?)),
            None => None,
        },
        limit_with_ties: node.limit_with_ties,
        settings: node.settings.clone(),
        span: node.span,
        ty: node.ty,
    })
}

pub fn clone_join_expr<V: CloningVisitor>(v: &mut V, node: &JoinExpr) -> QueryResult<JoinExpr> {
    Ok(JoinExpr {
        table: Box::new(v.visit_expr(&node.table)?),
        alias: node.alias.clone(),
        join_op: node.join_op,
        constraint: match &node.constraint {
            Some(c) => Some(JoinConstraint {
                expr: Box::new(v.visit_expr(&c.expr)?),
                kind: c.kind,
                span: c.span,
            }),
            None => None,
        },
        sample: match &node.sample {
            Some(s) => Some(v.visit_sample_expr(s)?),
            None => None,
        },
        next_join: match &node.next_join {
            Some(n) => Some(Box::new(v.visit_join_expr(n)?)),
            None => None,
        },
        span: node.span,
        ty: node.ty,
    })
}

/// The identity cloning walk. `visit(node)` is structurally equal to `node`.
pub struct IdentityClone;

impl CloningVisitor for IdentityClone {}

/// Whether the expression contains an aggregate call at the current query
/// level. Does not descend into subqueries, which aggregate independently.
pub fn contains_aggregate(expr: &Expr) -> bool {
    struct Finder {
        found: bool,
    }

    impl Visitor for Finder {
        fn visit_call(&mut self, node: &Call) {
            if crate::functions::registry().is_aggregate(&node.name) {
                self.found = true;
            }
            walk_call(self, node);
        }

        fn visit_select_query(&mut self, _node: &SelectQuery) {}

        fn visit_select_set_query(&mut self, _node: &SelectSetQuery) {}
    }

    let mut finder = Finder { found: false };
    finder.visit_expr(expr);
    finder.found
}

/// Collect the names of all placeholders in the tree.
pub fn gather_placeholders(expr: &Expr) -> Vec<String> {
    struct Gather {
        names: Vec<String>,
    }

    impl Visitor for Gather {
        fn visit_placeholder(&mut self, node: &Placeholder) {
            if !self.names.contains(&node.name) {
                self.names.push(node.name.clone());
            }
        }
    }

    let mut g = Gather { names: Vec::new() };
    g.visit_expr(expr);
    g.names
}
