//! Code generation: resolved AST to dialect-specific SQL text.
//!
//! One walk over the final AST. Function calls map through the registry to
//! their dialect form; constants become named placeholders with a parameter
//! side-table in the execution dialect, which is the sole injection defense
//! - no user value is ever concatenated into the SQL text.

pub mod clickhouse;
pub mod readable;
pub mod traits;

#[cfg(test)]
mod tests;

use indexmap::IndexMap;

use crate::ast::*;
use crate::context::Context;
use crate::error::{QueryError, QueryResult};
use crate::functions::{registry, FunctionMeta};
use crate::printer::clickhouse::ClickHouseGenerator;
use crate::printer::readable::ReadableGenerator;
use crate::printer::traits::SqlGenerator;
use crate::types::{SymbolType, TypeId};

/// Supported output dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// The execution dialect, parameterized.
    #[default]
    ClickHouse,
    /// A display-only form for echoing the query back to users.
    Readable,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::ClickHouse => Box::new(ClickHouseGenerator),
            Dialect::Readable => Box::new(ReadableGenerator),
        }
    }
}

/// Printed SQL plus the parameter values referenced by its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    pub params: IndexMap<String, Constant>,
}

/// Print a resolved (or, for the readable dialect, merely parsed) AST.
pub fn print_ast(expr: &Expr, ctx: &Context, dialect: Dialect) -> QueryResult<CompiledSql> {
    let mut printer = Printer {
        ctx,
        dialect,
        generator: dialect.generator(),
        params: IndexMap::new(),
        scopes: Vec::new(),
    };
    let sql = match expr {
        Expr::Select(query) => printer.print_select_query(query, true)?,
        Expr::SelectSet(set) => printer.print_select_set(set, true)?,
        other => printer.print_expr(other)?,
    };
    Ok(CompiledSql {
        sql,
        params: printer.params,
    })
}

struct Printer<'p, 'a> {
    ctx: &'p Context<'a>,
    dialect: Dialect,
    generator: Box<dyn SqlGenerator>,
    params: IndexMap<String, Constant>,
    scopes: Vec<TypeId>,
}

impl<'p, 'a> Printer<'p, 'a> {
    fn print_expr(&mut self, expr: &Expr) -> QueryResult<String> {
        match expr {
            Expr::Field(n) => self.print_field(n),
            Expr::Constant(n) => self.print_constant(&n.value),
            Expr::Call(n) => self.print_call(n),
            Expr::Arithmetic(n) => Ok(format!(
                "({} {} {})",
                self.print_expr(&n.left)?,
                n.op,
                self.print_expr(&n.right)?
            )),
            Expr::Compare(n) => self.print_compare(n),
            Expr::And(n) => self.print_boolean_group(&n.exprs, " AND "),
            Expr::Or(n) => self.print_boolean_group(&n.exprs, " OR "),
            Expr::Not(n) => Ok(format!("NOT ({})", self.print_expr(&n.expr)?)),
            Expr::Array(n) => {
                let items = self.print_list(&n.items)?;
                Ok(format!("[{}]", items))
            }
            Expr::Tuple(n) => {
                let items = self.print_list(&n.items)?;
                if n.items.len() == 1 {
                    Ok(format!("tuple({})", items))
                } else {
                    Ok(format!("({})", items))
                }
            }
            Expr::Alias(n) => Ok(format!(
                "{} AS {}",
                self.print_expr(&n.expr)?,
                self.generator.quote_identifier(&n.name)
            )),
            Expr::Lambda(n) => {
                let body = self.print_expr(&n.body)?;
                if n.args.len() == 1 {
                    Ok(format!("{} -> {}", n.args[0], body))
                } else {
                    Ok(format!("({}) -> {}", n.args.join(", "), body))
                }
            }
            Expr::Placeholder(n) => Err(QueryError::internal(format!(
                "no printer handler for node kind Placeholder ({{{}}} must be substituted before printing)",
                n.name
            ))),
            Expr::Window(n) => self.print_window_function(n),
            Expr::Tag(n) => Err(QueryError::internal(format!(
                "no printer handler for node kind Tag (<{}>)",
                n.kind
            ))),
            Expr::Select(q) => Ok(format!("({})", self.print_select_query(q, false)?)),
            Expr::SelectSet(s) => Ok(format!("({})", self.print_select_set(s, false)?)),
        }
    }

    fn print_list(&mut self, exprs: &[Expr]) -> QueryResult<String> {
        let parts: Vec<String> = exprs
            .iter()
            .map(|e| self.print_expr(e))
            .collect::<QueryResult<_>>()?;
        Ok(parts.join(", "))
    }

    fn print_boolean_group(&mut self, exprs: &[Expr], joiner: &str) -> QueryResult<String> {
        let parts: Vec<String> = exprs
            .iter()
            .map(|e| {
                let printed = self.print_expr(e)?;
                Ok(match e {
                    // Nested boolean groups keep explicit precedence.
                    Expr::And(_) | Expr::Or(_) => format!("({})", printed),
                    _ => printed,
                })
            })
            .collect::<QueryResult<_>>()?;
        Ok(parts.join(joiner))
    }

    /// The alias a table symbol is registered under in any open scope.
    fn alias_for_table(&self, table: TypeId) -> Option<String> {
        for scope_id in self.scopes.iter().rev() {
            if let Some(scope) = self.ctx.arena.scope(*scope_id) {
                if let Some(alias) = scope.alias_for_table(table) {
                    return Some(alias.to_string());
                }
            }
        }
        None
    }

    fn print_field_symbol(&mut self, id: TypeId) -> QueryResult<String> {
        match self.ctx.arena.get(id).clone() {
            SymbolType::Field { name, table } => {
                let qualified = self
                    .alias_for_table(table)
                    .filter(|alias| !alias.starts_with("__subquery"));
                match qualified {
                    Some(alias) => Ok(format!(
                        "{}.{}",
                        self.generator.quote_identifier(&alias),
                        self.generator.quote_identifier(&name)
                    )),
                    None => Ok(self.generator.quote_identifier(&name)),
                }
            }
            SymbolType::Property { chain, field } => {
                let base = self.print_field_symbol(field)?;
                Ok(self.generator.property_access(base, &chain))
            }
            SymbolType::Asterisk { .. } => Ok("*".to_string()),
            _ => Err(QueryError::internal(
                "print_field_symbol on a non-field symbol",
            )),
        }
    }

    fn print_field(&mut self, field: &Field) -> QueryResult<String> {
        if self.dialect == Dialect::Readable {
            return Ok(field
                .chain
                .iter()
                .map(|part| {
                    if part == "*" {
                        "*".to_string()
                    } else {
                        self.generator.quote_identifier(part)
                    }
                })
                .collect::<Vec<_>>()
                .join("."));
        }
        let symbol_backed = matches!(
            field.ty.map(|id| self.ctx.arena.get(id)),
            Some(SymbolType::Field { .. })
                | Some(SymbolType::Property { .. })
                | Some(SymbolType::Asterisk { .. })
        );
        if symbol_backed {
            return self.print_field_symbol(field.ty.expect("symbol-backed field"));
        }
        // Alias references and unresolved fields print as written.
        Ok(field
            .chain
            .iter()
            .map(|part| {
                if part == "*" {
                    "*".to_string()
                } else {
                    self.generator.quote_identifier(part)
                }
            })
            .collect::<Vec<_>>()
            .join("."))
    }

    fn print_constant(&mut self, value: &Constant) -> QueryResult<String> {
        if self.generator.parameterized() && needs_parameter(value) {
            let name = format!("p{}", self.params.len());
            self.params.insert(name.clone(), value.clone());
            return Ok(format!("{{{}}}", name));
        }
        Ok(self.render_literal(value))
    }

    /// Inline literal rendering, used by the readable dialect and for
    /// registry-supplied suffix arguments.
    fn render_literal(&self, value: &Constant) -> String {
        match value {
            Constant::Null => "NULL".to_string(),
            Constant::Bool(b) => b.to_string(),
            Constant::Int(n) => n.to_string(),
            Constant::Float(n) => n.to_string(),
            Constant::Decimal(d) => d.to_string(),
            Constant::Str(s) => self.generator.string_literal(s),
            Constant::Date(d) => match self.dialect {
                Dialect::ClickHouse => format!("toDate({})", self.generator.string_literal(&d.to_string())),
                Dialect::Readable => self.generator.string_literal(&d.to_string()),
            },
            Constant::DateTime(dt) => {
                let text = dt.format("%Y-%m-%d %H:%M:%S").to_string();
                match self.dialect {
                    Dialect::ClickHouse => {
                        format!("toDateTime({})", self.generator.string_literal(&text))
                    }
                    Dialect::Readable => self.generator.string_literal(&text),
                }
            }
            Constant::Uuid(u) => match self.dialect {
                Dialect::ClickHouse => {
                    format!("toUUID({})", self.generator.string_literal(&u.to_string()))
                }
                Dialect::Readable => self.generator.string_literal(&u.to_string()),
            },
            Constant::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.render_literal(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Constant::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.render_literal(v)).collect();
                if items.len() == 1 {
                    format!("tuple({})", parts.join(", "))
                } else {
                    format!("({})", parts.join(", "))
                }
            }
        }
    }

    fn print_call(&mut self, call: &Call) -> QueryResult<String> {
        let meta = registry().get(&call.name);
        if meta.is_none() && self.dialect == Dialect::ClickHouse {
            return Err(QueryError::internal(format!(
                "unknown function reached the printer: {}",
                call.name
            )));
        }

        let mut args: Vec<String> = call
            .args
            .iter()
            .map(|a| self.print_expr(a))
            .collect::<QueryResult<_>>()?;

        if self.dialect == Dialect::ClickHouse {
            if let Some(meta) = meta {
                for suffix in &meta.suffix_args {
                    args.push(self.render_literal(suffix));
                }
                if meta.tz_aware {
                    let tz = self.ctx.modifiers.effective_timezone().to_string();
                    args.push(self.generator.string_literal(&tz));
                }
                if let Some(rendered) = self.apply_template(meta, &args) {
                    return Ok(rendered);
                }
            }
        }

        let name = match (self.dialect, meta) {
            (Dialect::ClickHouse, Some(meta)) => meta.printed_name().to_string(),
            _ => call.name.clone(),
        };

        let params = match &call.params {
            Some(params) => Some(self.print_list(params)?),
            None => None,
        };
        let arg_list = if call.distinct {
            format!("DISTINCT {}", args.join(", "))
        } else {
            args.join(", ")
        };
        match params {
            Some(params) => Ok(format!("{}({})({})", name, params, arg_list)),
            None => Ok(format!("{}({})", name, arg_list)),
        }
    }

    /// Substitute a positional print template. Falls back to plain form when
    /// the template references an argument that was not supplied.
    fn apply_template(&self, meta: &FunctionMeta, args: &[String]) -> Option<String> {
        let template = meta.template?;
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let close = rest[open..].find('}')? + open;
            let index: usize = rest[open + 1..close].parse().ok()?;
            out.push_str(args.get(index)?);
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Some(out)
    }

    fn print_compare(&mut self, cmp: &CompareOperation) -> QueryResult<String> {
        let left = self.print_expr(&cmp.left)?;
        let right = self.print_expr(&cmp.right)?;
        let op = match cmp.op {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
            CompareOp::ILike => "ILIKE",
            CompareOp::NotILike => "NOT ILIKE",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT IN",
            CompareOp::Regex => {
                return Ok(self.generator.regex_match(left, right, false));
            }
            CompareOp::NotRegex => {
                return Ok(self.generator.regex_match(left, right, true));
            }
        };
        Ok(format!("{} {} {}", left, op, right))
    }

    fn print_window_function(&mut self, node: &WindowFunction) -> QueryResult<String> {
        let name = match (self.dialect, registry().get(&node.name)) {
            (Dialect::ClickHouse, Some(meta)) => meta.printed_name().to_string(),
            _ => node.name.clone(),
        };
        let args = self.print_list(&node.args)?;
        let over = match &node.over {
            WindowRef::Name(w) => self.generator.quote_identifier(w),
            WindowRef::Inline(w) => format!("({})", self.print_window_expr(w)?),
        };
        Ok(format!("{}({}) OVER {}", name, args, over))
    }

    fn print_window_expr(&mut self, window: &WindowExpr) -> QueryResult<String> {
        let mut parts: Vec<String> = Vec::new();
        if !window.partition_by.is_empty() {
            parts.push(format!(
                "PARTITION BY {}",
                self.print_list(&window.partition_by)?
            ));
        }
        if !window.order_by.is_empty() {
            let orders: Vec<String> = window
                .order_by
                .iter()
                .map(|o| self.print_order_expr(o))
                .collect::<QueryResult<_>>()?;
            parts.push(format!("ORDER BY {}", orders.join(", ")));
        }
        if let Some(frame) = &window.frame {
            parts.push(self.print_frame(frame));
        }
        Ok(parts.join(" "))
    }

    fn print_frame(&self, frame: &WindowFrame) -> String {
        let kind = match frame.kind {
            FrameKind::Rows => "ROWS",
            FrameKind::Range => "RANGE",
        };
        match &frame.end {
            Some(end) => format!(
                "{} BETWEEN {} AND {}",
                kind,
                print_bound(&frame.start),
                print_bound(end)
            ),
            None => format!("{} {}", kind, print_bound(&frame.start)),
        }
    }

    fn print_order_expr(&mut self, order: &OrderExpr) -> QueryResult<String> {
        let dir = match order.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        Ok(format!("{} {}", self.print_expr(&order.expr)?, dir))
    }

    fn print_join_chain(&mut self, join: &JoinExpr) -> QueryResult<String> {
        let mut out = String::new();
        let mut current = Some(join);
        while let Some(j) = current {
            if let Some(op) = j.join_op {
                out.push(' ');
                out.push_str(&op.to_string());
                out.push(' ');
            }
            let (target, target_name) = match &*j.table {
                Expr::Field(f) => {
                    let name = f
                        .chain
                        .iter()
                        .map(|p| self.generator.quote_identifier(p))
                        .collect::<Vec<_>>()
                        .join(".");
                    (name.clone(), Some(name))
                }
                Expr::Select(q) => (format!("({})", self.print_select_query(q, false)?), None),
                Expr::SelectSet(s) => (format!("({})", self.print_select_set(s, false)?), None),
                other => {
                    return Err(QueryError::internal(format!(
                        "no printer handler for join target kind {}",
                        other.kind_name()
                    )));
                }
            };
            out.push_str(&target);
            if let Some(alias) = &j.alias {
                let redundant = target_name.as_deref() == Some(alias.as_str());
                if !redundant {
                    out.push_str(" AS ");
                    out.push_str(&self.generator.quote_identifier(alias));
                }
            }
            if let Some(sample) = &j.sample {
                out.push_str(&self.print_sample(sample)?);
            }
            if let Some(constraint) = &j.constraint {
                match constraint.kind {
                    ConstraintKind::On => {
                        out.push_str(" ON ");
                        out.push_str(&self.print_expr(&constraint.expr)?);
                    }
                    ConstraintKind::Using => {
                        out.push_str(" USING (");
                        match &*constraint.expr {
                            Expr::Tuple(t) => out.push_str(&self.print_list(&t.items)?),
                            other => out.push_str(&self.print_expr(other)?),
                        }
                        out.push(')');
                    }
                }
            }
            current = j.next_join.as_deref();
        }
        Ok(out)
    }

    fn print_sample(&mut self, sample: &SampleExpr) -> QueryResult<String> {
        let mut out = format!(" SAMPLE {}", self.print_ratio(&sample.value)?);
        if let Some(offset) = &sample.offset {
            out.push_str(&format!(" OFFSET {}", self.print_ratio(offset)?));
        }
        Ok(out)
    }

    fn print_ratio(&mut self, ratio: &RatioExpr) -> QueryResult<String> {
        // Sampling ratios stay literal; a placeholder here would not be a
        // valid ClickHouse SAMPLE argument.
        let render = |expr: &Expr| -> QueryResult<String> {
            match expr {
                Expr::Constant(c) => Ok(self.render_literal(&c.value)),
                other => Err(QueryError::internal(format!(
                    "non-constant sample ratio: {}",
                    other.kind_name()
                ))),
            }
        };
        match &ratio.right {
            Some(right) => Ok(format!("{}/{}", render(&ratio.left)?, render(right)?)),
            None => render(&ratio.left),
        }
    }

    fn print_select_set(&mut self, set: &SelectSetQuery, _top_level: bool) -> QueryResult<String> {
        let mut out = self.print_set_operand(&set.initial)?;
        for node in &set.subsequent {
            out.push(' ');
            out.push_str(&node.op.to_string());
            out.push(' ');
            out.push_str(&self.print_set_operand(&node.select)?);
        }
        Ok(out)
    }

    fn print_set_operand(&mut self, expr: &Expr) -> QueryResult<String> {
        match expr {
            Expr::Select(q) => self.print_select_query(q, false),
            Expr::SelectSet(s) => Ok(format!("({})", self.print_select_set(s, false)?)),
            other => self.print_expr(other),
        }
    }

    fn print_select_query(&mut self, query: &SelectQuery, top_level: bool) -> QueryResult<String> {
        if let Some(scope) = query.ty {
            self.scopes.push(scope);
        }
        let result = self.print_select_query_inner(query, top_level);
        if query.ty.is_some() {
            self.scopes.pop();
        }
        result
    }

    fn print_select_query_inner(
        &mut self,
        query: &SelectQuery,
        top_level: bool,
    ) -> QueryResult<String> {
        let mut out = String::new();

        if !query.ctes.is_empty() {
            let mut parts = Vec::with_capacity(query.ctes.len());
            for cte in query.ctes.values() {
                match cte.kind {
                    CteKind::Column => parts.push(format!(
                        "{} AS {}",
                        self.print_expr(&cte.expr)?,
                        self.generator.quote_identifier(&cte.name)
                    )),
                    CteKind::Subquery => {
                        let inner = match &*cte.expr {
                            Expr::Select(q) => self.print_select_query(q, false)?,
                            Expr::SelectSet(s) => self.print_select_set(s, false)?,
                            other => self.print_expr(other)?,
                        };
                        parts.push(format!(
                            "{} AS ({})",
                            self.generator.quote_identifier(&cte.name),
                            inner
                        ));
                    }
                }
            }
            out.push_str("WITH ");
            out.push_str(&parts.join(", "));
            out.push(' ');
        }

        out.push_str("SELECT ");
        if query.distinct {
            out.push_str("DISTINCT ");
        }
        out.push_str(&self.print_list(&query.select)?);

        if let Some(from) = &query.select_from {
            out.push_str(" FROM ");
            out.push_str(&self.print_join_chain(from)?);
        }
        if let Some(prewhere) = &query.prewhere {
            out.push_str(" PREWHERE ");
            out.push_str(&self.print_expr(prewhere)?);
        }
        if let Some(where_expr) = &query.where_expr {
            out.push_str(" WHERE ");
            out.push_str(&self.print_expr(where_expr)?);
        }
        if !query.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            out.push_str(&self.print_list(&query.group_by)?);
        }
        if let Some(having) = &query.having {
            out.push_str(" HAVING ");
            out.push_str(&self.print_expr(having)?);
        }
        if !query.window_exprs.is_empty() {
            let mut parts = Vec::with_capacity(query.window_exprs.len());
            for (name, w) in &query.window_exprs {
                parts.push(format!(
                    "{} AS ({})",
                    self.generator.quote_identifier(name),
                    self.print_window_expr(w)?
                ));
            }
            out.push_str(" WINDOW ");
            out.push_str(&parts.join(", "));
        }
        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| self.print_order_expr(o))
                .collect::<QueryResult<_>>()?;
            out.push_str(" ORDER BY ");
            out.push_str(&orders.join(", "));
        }
        if let Some(limit) = &query.limit {
            out.push_str(" LIMIT ");
            out.push_str(&self.print_expr(limit)?);
            if query.limit_with_ties {
                out.push_str(" WITH TIES");
            }
            if let Some(offset) = &query.offset {
                out.push_str(" OFFSET ");
                out.push_str(&self.print_expr(offset)?);
            }
        }
        if top_level && self.generator.supports_settings() {
            if let Some(settings) = &query.settings {
                let entries = settings.entries();
                if !entries.is_empty() {
                    let parts: Vec<String> = entries
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect();
                    out.push_str(" SETTINGS ");
                    out.push_str(&parts.join(", "));
                }
            }
        }
        Ok(out)
    }
}

/// Values that can carry user-controlled text are parameterized; plain
/// numbers, booleans and NULL are not injection vectors and print inline.
fn needs_parameter(value: &Constant) -> bool {
    match value {
        Constant::Str(_) | Constant::Uuid(_) | Constant::Date(_) | Constant::DateTime(_) => true,
        Constant::Array(items) | Constant::Tuple(items) => items.iter().any(needs_parameter),
        Constant::Null | Constant::Bool(_) | Constant::Int(_) | Constant::Float(_)
        | Constant::Decimal(_) => false,
    }
}

fn print_bound(bound: &FrameBound) -> String {
    match bound {
        FrameBound::UnboundedPreceding => "UNBOUNDED PRECEDING".to_string(),
        FrameBound::Preceding(n) => format!("{} PRECEDING", n),
        FrameBound::CurrentRow => "CURRENT ROW".to_string(),
        FrameBound::Following(n) => format!("{} FOLLOWING", n),
        FrameBound::UnboundedFollowing => "UNBOUNDED FOLLOWING".to_string(),
    }
}
