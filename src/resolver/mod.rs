//! Name and type resolution.
//!
//! A cloning walk over the parsed AST that opens a lexical scope per select
//! query and lambda body, binds every field, table, alias and CTE reference
//! to a symbol in the context's arena, and computes each expression's value
//! type. Resolution failures are structural errors carrying the offending
//! node's source span; nothing is retried.

pub mod scope;

#[cfg(test)]
mod tests;

use indexmap::IndexMap;

use crate::ast::*;
use crate::context::Context;
use crate::error::{QueryError, QueryResult, Span};
use crate::functions::registry;
use crate::resolver::scope::{did_you_mean, with_suggestion, ScopeFrame};
use crate::schema::{ExpressionField, FieldOrTable, TableEntry};
use crate::types::{ScopeType, SymbolType, TypeId, ValueKind, ValueType};

/// Resolve an AST against the context's schema. Returns an annotated clone;
/// the input is left untouched.
pub fn resolve_types(expr: &Expr, ctx: &mut Context) -> QueryResult<Expr> {
    Resolver::new(ctx).visit_expr(expr)
}

pub struct Resolver<'c, 'a> {
    ctx: &'c mut Context<'a>,
    frames: Vec<ScopeFrame>,
    expanding_ctes: Vec<String>,
    anon_subqueries: usize,
}

/// Outcome of resolving one step of a field chain.
enum Step {
    Symbol(TypeId),
    /// A schema column defined as an expression; substituted at the use
    /// site.
    Expression(ExpressionField, TypeId),
}

/// Outcome of resolving the first segment of a field chain.
enum Base {
    Symbol(TypeId),
    ColumnCte(Cte),
    Expression(ExpressionField, TypeId),
}

impl<'c, 'a> Resolver<'c, 'a> {
    pub fn new(ctx: &'c mut Context<'a>) -> Self {
        Resolver {
            ctx,
            frames: Vec::new(),
            expanding_ctes: Vec::new(),
            anon_subqueries: 0,
        }
    }

    /// A resolver whose lookups run inside an existing scope, used by
    /// rewrite passes to resolve synthesized expressions in place.
    pub(crate) fn with_scope(ctx: &'c mut Context<'a>, scope: TypeId) -> Self {
        let mut resolver = Resolver::new(ctx);
        resolver.frames.push(ScopeFrame::new(scope));
        resolver
    }

    fn current_scope(&self) -> Option<TypeId> {
        self.frames.last().map(|f| f.scope)
    }

    fn value_type_of(&self, expr: &Expr) -> ValueType {
        match expr.ty() {
            Some(id) => self
                .ctx
                .arena
                .resolve_constant_type(self.ctx.database, id)
                .unwrap_or_else(|_| ValueType::unknown()),
            None => ValueType::unknown(),
        }
    }

    /// Names visible at this point, for suggestion messages.
    fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for frame in self.frames.iter().rev() {
            names.extend(frame.lambda_args.keys().cloned());
            names.extend(frame.aliases.keys().cloned());
            names.extend(frame.ctes.keys().cloned());
            if let Some(scope) = self.ctx.arena.scope(frame.scope) {
                for (alias, table) in &scope.tables {
                    names.push(alias.clone());
                    names.extend(self.child_names(*table));
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }

    fn child_names(&self, table: TypeId) -> Vec<String> {
        match self.ctx.arena.get(table) {
            SymbolType::Table { name } | SymbolType::LazyTable { name } => self
                .ctx
                .database
                .get_table(name)
                .map(|entry| entry.fields().keys().cloned().collect())
                .unwrap_or_default(),
            SymbolType::LazyJoin { join_table, .. } => self
                .ctx
                .database
                .get_table(join_table)
                .map(|entry| entry.fields().keys().cloned().collect())
                .unwrap_or_default(),
            SymbolType::TableAlias { table, .. }
            | SymbolType::SelectQueryAlias { select: table, .. } => self.child_names(*table),
            SymbolType::SelectQuery(scope) => scope.columns.keys().cloned().collect(),
            SymbolType::VirtualTable { fields, .. } => fields.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// The schema table name a table-like symbol ultimately refers to, if
    /// any.
    fn underlying_table_name(&self, id: TypeId) -> Option<String> {
        match self.ctx.arena.get(id) {
            SymbolType::Table { name } | SymbolType::LazyTable { name } => Some(name.clone()),
            SymbolType::LazyJoin { join_table, .. } => Some(join_table.clone()),
            SymbolType::TableAlias { table, .. } => self.underlying_table_name(*table),
            _ => None,
        }
    }

    fn is_lazy_backed(&self, id: TypeId) -> bool {
        match self.ctx.arena.get(id) {
            SymbolType::LazyTable { .. } | SymbolType::LazyJoin { .. } => true,
            SymbolType::TableAlias { table, .. } => self.is_lazy_backed(*table),
            _ => false,
        }
    }

    /// Resolve the first segment of a chain: aliases, then lambda
    /// parameters, then CTEs, then tables and their fields, then enclosing
    /// scopes.
    fn lookup_base(&mut self, name: &str, span: Option<Span>) -> QueryResult<Base> {
        enum Plan {
            Symbol(TypeId),
            Cte(Cte),
            Child(TypeId),
        }

        let mut plan: Option<Plan> = None;
        'frames: for frame in self.frames.iter().rev() {
            if let Some(id) = frame.lambda_args.get(name) {
                plan = Some(Plan::Symbol(*id));
                break;
            }
            if let Some(id) = frame.aliases.get(name) {
                plan = Some(Plan::Symbol(*id));
                break;
            }
            if let Some(cte) = frame.ctes.get(name) {
                if cte.kind == CteKind::Column {
                    plan = Some(Plan::Cte(cte.clone()));
                    break;
                }
            }
            if let Some(scope) = self.ctx.arena.scope(frame.scope) {
                if let Some(id) = scope.tables.get(name) {
                    plan = Some(Plan::Symbol(*id));
                    break;
                }
                let mut hits: Vec<TypeId> = Vec::new();
                for table in scope.tables.values() {
                    if self.ctx.arena.has_child(self.ctx.database, *table, name) {
                        hits.push(*table);
                    }
                }
                match hits.len() {
                    0 => {}
                    1 => {
                        plan = Some(Plan::Child(hits[0]));
                        break 'frames;
                    }
                    _ => {
                        return Err(QueryError::resolution(
                            format!("Ambiguous field: {}", name),
                            span,
                        ));
                    }
                }
            }
        }

        match plan {
            Some(Plan::Symbol(id)) => Ok(Base::Symbol(id)),
            Some(Plan::Cte(cte)) => Ok(Base::ColumnCte(cte)),
            Some(Plan::Child(parent)) => match self.step_chain(parent, name, span)? {
                Step::Symbol(id) => Ok(Base::Symbol(id)),
                Step::Expression(ef, owner) => Ok(Base::Expression(ef, owner)),
            },
            None => {
                let names = self.visible_names();
                let suggestion = did_you_mean(name, names.iter().map(String::as_str));
                Err(QueryError::resolution(
                    with_suggestion(format!("Unable to resolve field: {}", name), suggestion),
                    span,
                ))
            }
        }
    }

    /// Resolve one chain segment against a table-like or field-like symbol.
    fn step_chain(&mut self, parent: TypeId, seg: &str, span: Option<Span>) -> QueryResult<Step> {
        if seg == "*" {
            return Ok(Step::Symbol(
                self.ctx.arena.alloc(SymbolType::Asterisk { source: parent }),
            ));
        }
        let symbol = self.ctx.arena.get(parent).clone();
        match symbol {
            SymbolType::Table { .. }
            | SymbolType::LazyTable { .. }
            | SymbolType::LazyJoin { .. }
            | SymbolType::TableAlias { .. } => {
                let table_name = self.underlying_table_name(parent).ok_or_else(|| {
                    QueryError::internal("table alias chain with no underlying table")
                })?;
                self.schema_child(parent, &table_name, seg, span)
            }
            SymbolType::SelectQuery(ref scope_ty) => {
                if scope_ty.columns.contains_key(seg) {
                    Ok(Step::Symbol(self.ctx.arena.alloc(SymbolType::Field {
                        name: seg.to_string(),
                        table: parent,
                    })))
                } else {
                    let suggestion =
                        did_you_mean(seg, scope_ty.columns.keys().map(String::as_str));
                    Err(QueryError::resolution(
                        with_suggestion(format!("Column not found in scope: {}", seg), suggestion),
                        span,
                    ))
                }
            }
            SymbolType::SelectQueryAlias { select, .. } => {
                if self.ctx.arena.has_child(self.ctx.database, select, seg) {
                    Ok(Step::Symbol(self.ctx.arena.alloc(SymbolType::Field {
                        name: seg.to_string(),
                        table: parent,
                    })))
                } else {
                    Err(QueryError::resolution(
                        format!("Column not found in scope: {}", seg),
                        span,
                    ))
                }
            }
            SymbolType::SelectSetQuery { ref selects } => {
                let target = *selects
                    .first()
                    .ok_or_else(|| QueryError::internal("empty select set symbol"))?;
                if self.ctx.arena.has_child(self.ctx.database, target, seg) {
                    Ok(Step::Symbol(self.ctx.arena.alloc(SymbolType::Field {
                        name: seg.to_string(),
                        table: parent,
                    })))
                } else {
                    Err(QueryError::resolution(
                        format!("Column not found in scope: {}", seg),
                        span,
                    ))
                }
            }
            SymbolType::VirtualTable { ref fields, ref name } => {
                if fields.contains_key(seg) {
                    Ok(Step::Symbol(self.ctx.arena.alloc(SymbolType::Field {
                        name: seg.to_string(),
                        table: parent,
                    })))
                } else {
                    let suggestion = did_you_mean(seg, fields.keys().map(String::as_str));
                    Err(QueryError::resolution(
                        with_suggestion(
                            format!("Field not found on table {}: {}", name, seg),
                            suggestion,
                        ),
                        span,
                    ))
                }
            }
            SymbolType::Field { .. }
            | SymbolType::LambdaArgument { .. }
            | SymbolType::Call { .. }
            | SymbolType::Constant { .. }
            | SymbolType::ExpressionField { .. } => {
                Ok(Step::Symbol(self.ctx.arena.alloc(SymbolType::Property {
                    chain: vec![seg.to_string()],
                    field: parent,
                })))
            }
            SymbolType::Property { ref chain, field } => {
                let mut chain = chain.clone();
                chain.push(seg.to_string());
                Ok(Step::Symbol(
                    self.ctx.arena.alloc(SymbolType::Property { chain, field }),
                ))
            }
            SymbolType::Asterisk { .. }
            | SymbolType::FieldTraverser { .. }
            | SymbolType::Unresolved { .. } => Err(QueryError::resolution(
                format!("Cannot access '{}' on this expression", seg),
                span,
            )),
        }
    }

    /// A named child of a schema-backed table symbol.
    fn schema_child(
        &mut self,
        parent: TypeId,
        table_name: &str,
        seg: &str,
        span: Option<Span>,
    ) -> QueryResult<Step> {
        let entry = self.ctx.database.get_table(table_name)?;
        let field = match entry.get_field(seg) {
            Some(field) => field.clone(),
            None => {
                let suggestion = did_you_mean(seg, entry.fields().keys().map(String::as_str));
                return Err(QueryError::resolution(
                    with_suggestion(
                        format!("Field not found on table {}: {}", table_name, seg),
                        suggestion,
                    ),
                    span,
                ));
            }
        };
        if self.is_lazy_backed(parent) {
            self.ctx.record_lazy_access(parent, seg);
        }
        match field {
            FieldOrTable::Field(_) => Ok(Step::Symbol(self.ctx.arena.alloc(SymbolType::Field {
                name: seg.to_string(),
                table: parent,
            }))),
            FieldOrTable::LazyJoin(join) => {
                Ok(Step::Symbol(self.register_lazy_join(parent, seg, &join.join_table)?))
            }
            FieldOrTable::VirtualTable { name, fields } => Ok(Step::Symbol(
                self.ctx
                    .arena
                    .alloc(SymbolType::VirtualTable { name, fields }),
            )),
            FieldOrTable::Expression(ef) => Ok(Step::Expression(ef, parent)),
            FieldOrTable::Traverser { chain } => Ok(Step::Symbol(
                self.ctx
                    .arena
                    .alloc(SymbolType::FieldTraverser { chain, table: parent }),
            )),
        }
    }

    /// Lazy joins register once per scope under a key derived from the base
    /// table's alias, so repeated references share one join and one
    /// accessed-fields set.
    fn register_lazy_join(
        &mut self,
        from_table: TypeId,
        field: &str,
        join_table: &str,
    ) -> QueryResult<TypeId> {
        let scope_id = self
            .current_scope()
            .ok_or_else(|| QueryError::internal("lazy join outside of a select scope"))?;
        let base_alias = self
            .ctx
            .arena
            .scope(scope_id)
            .and_then(|s| s.alias_for_table(from_table).map(str::to_string))
            .or_else(|| self.underlying_table_name(from_table))
            .unwrap_or_else(|| "join".to_string());
        let key = format!("{}__{}", base_alias, field);
        if let Some(existing) = self
            .ctx
            .arena
            .scope(scope_id)
            .and_then(|s| s.tables.get(&key).copied())
        {
            return Ok(existing);
        }
        let id = self.ctx.arena.alloc(SymbolType::LazyJoin {
            field: field.to_string(),
            join_table: join_table.to_string(),
            from_table,
        });
        self.ctx
            .arena
            .scope_mut(scope_id)
            .expect("select scope")
            .tables
            .insert(key, id);
        Ok(id)
    }

    /// Substitute a schema expression field at its use site.
    fn resolve_expression_field(
        &mut self,
        ef: ExpressionField,
        owner: TypeId,
        name: &str,
    ) -> QueryResult<Expr> {
        if ef.isolate_scope {
            let alias = self
                .frames
                .last()
                .and_then(|f| self.ctx.arena.scope(f.scope))
                .and_then(|s| s.alias_for_table(owner).map(str::to_string))
                .or_else(|| self.underlying_table_name(owner))
                .unwrap_or_else(|| name.to_string());
            let mut tables = IndexMap::new();
            tables.insert(alias, owner);
            let scope = self.ctx.arena.alloc(SymbolType::SelectQuery(ScopeType {
                columns: IndexMap::new(),
                tables,
                parent: None,
            }));
            let saved = std::mem::take(&mut self.frames);
            self.frames.push(ScopeFrame::new(scope));
            let result = self.visit_expr(&ef.expr);
            self.frames = saved;
            result
        } else {
            self.visit_expr(&ef.expr)
        }
    }

    fn resolve_column_cte(&mut self, cte: Cte, span: Option<Span>) -> QueryResult<Expr> {
        if self.expanding_ctes.contains(&cte.name) {
            return Err(QueryError::resolution(
                format!("Recursive CTE: {}", cte.name),
                span,
            ));
        }
        self.expanding_ctes.push(cte.name.clone());
        let result = self.visit_expr(&cte.expr);
        self.expanding_ctes.pop();
        result
    }

    fn find_subquery_cte(&self, name: &str) -> Option<Cte> {
        for frame in self.frames.iter().rev() {
            if let Some(cte) = frame.ctes.get(name) {
                if cte.kind == CteKind::Subquery {
                    return Some(cte.clone());
                }
            }
        }
        None
    }

    /// Resolve one FROM/JOIN target, register it in the current scope, and
    /// continue down the join chain.
    fn resolve_join_chain(&mut self, join: &JoinExpr) -> QueryResult<JoinExpr> {
        let scope_id = self
            .current_scope()
            .ok_or_else(|| QueryError::internal("join outside of a select scope"))?;

        let (table_expr, registered, register_as) = match &*join.table {
            Expr::Field(f) if f.chain.len() == 1 => {
                let name = f.chain[0].clone();
                if let Some(cte) = self.find_subquery_cte(&name) {
                    let resolved = self.resolve_column_cte(
                        Cte {
                            name: cte.name.clone(),
                            expr: cte.expr,
                            kind: CteKind::Subquery,
                        },
                        f.span,
                    )?;
                    let select = resolved.ty().ok_or_else(|| {
                        QueryError::internal("resolved CTE subquery without a type")
                    })?;
                    let alias = join.alias.clone().unwrap_or_else(|| name.clone());
                    let id = self.ctx.arena.alloc(SymbolType::SelectQueryAlias {
                        alias: alias.clone(),
                        select,
                    });
                    (resolved, id, alias)
                } else if self.ctx.database.has_table(&name) {
                    let entry = self.ctx.database.get_table(&name)?;
                    let symbol = match entry {
                        TableEntry::Table(_) => SymbolType::Table { name: name.clone() },
                        TableEntry::Lazy(_) => SymbolType::LazyTable { name: name.clone() },
                    };
                    let tid = self.ctx.arena.alloc(symbol);
                    let alias = join.alias.clone().unwrap_or_else(|| name.clone());
                    let id = if alias != name {
                        self.ctx.arena.alloc(SymbolType::TableAlias {
                            alias: alias.clone(),
                            table: tid,
                        })
                    } else {
                        tid
                    };
                    let mut field = f.clone();
                    field.ty = Some(id);
                    (Expr::Field(field), id, alias)
                } else {
                    let mut candidates: Vec<String> =
                        self.ctx.database.table_names().map(str::to_string).collect();
                    for frame in &self.frames {
                        candidates.extend(frame.ctes.keys().cloned());
                    }
                    let suggestion = did_you_mean(&name, candidates.iter().map(String::as_str));
                    return Err(QueryError::resolution(
                        with_suggestion(format!("Unknown table: {}", name), suggestion),
                        f.span,
                    ));
                }
            }
            Expr::Select(_) | Expr::SelectSet(_) => {
                let resolved = self.visit_expr(&join.table)?;
                let select = resolved
                    .ty()
                    .ok_or_else(|| QueryError::internal("resolved subquery without a type"))?;
                let alias = join.alias.clone().unwrap_or_else(|| {
                    self.anon_subqueries += 1;
                    format!("__subquery_{}", self.anon_subqueries)
                });
                let id = self.ctx.arena.alloc(SymbolType::SelectQueryAlias {
                    alias: alias.clone(),
                    select,
                });
                (resolved, id, alias)
            }
            other => {
                return Err(QueryError::NotImplemented {
                    message: format!("Unsupported join target: {}", other.kind_name()),
                    span: other.span(),
                });
            }
        };

        let scope = self
            .ctx
            .arena
            .scope_mut(scope_id)
            .ok_or_else(|| QueryError::internal("current frame is not a select scope"))?;
        if scope.tables.contains_key(&register_as) {
            return Err(QueryError::resolution(
                format!("Duplicate table alias: {}", register_as),
                join.span,
            ));
        }
        scope.tables.insert(register_as, registered);

        let constraint = match &join.constraint {
            Some(c) => Some(JoinConstraint {
                expr: Box::new(self.visit_expr(&c.expr)?),
                kind: c.kind,
                span: c.span,
            }),
            None => None,
        };
        let sample = match &join.sample {
            Some(s) => Some(self.visit_sample_expr(s)?),
            None => None,
        };
        let next_join = match &join.next_join {
            Some(n) => Some(Box::new(self.resolve_join_chain(n)?)),
            None => None,
        };

        Ok(JoinExpr {
            table: Box::new(table_expr),
            alias: join.alias.clone(),
            join_op: join.join_op,
            constraint,
            sample,
            next_join,
            span: join.span,
            ty: Some(registered),
        })
    }

    /// The export name of a select item, taken from the unresolved node.
    fn column_name_of(item: &Expr) -> Option<String> {
        match item {
            Expr::Alias(alias) => Some(alias.name.clone()),
            Expr::Field(field) => {
                let last = field.chain.last()?;
                if last == "*" {
                    None
                } else {
                    Some(last.clone())
                }
            }
            _ => None,
        }
    }

    fn register_select_column(&mut self, item: &Expr, resolved: &Expr) -> QueryResult<()> {
        let Some(name) = Self::column_name_of(item) else {
            return Ok(());
        };
        let Some(ty) = resolved.ty() else {
            return Ok(());
        };
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| QueryError::internal("select column outside of a scope"))?;
        if matches!(item, Expr::Alias(_)) {
            if frame.aliases.contains_key(&name) {
                return Err(QueryError::resolution(
                    format!("Duplicate alias: {}", name),
                    resolved.span(),
                ));
            }
            frame.aliases.insert(name.clone(), ty);
        }
        let scope = self
            .ctx
            .arena
            .scope_mut(frame.scope)
            .ok_or_else(|| QueryError::internal("current frame is not a select scope"))?;
        // First declaration wins; columns keep declaration order.
        scope.columns.entry(name).or_insert(ty);
        Ok(())
    }

    fn resolve_select_parts(&mut self, node: &SelectQuery) -> QueryResult<SelectQuery> {
        let select_from = match &node.select_from {
            Some(join) => Some(self.resolve_join_chain(join)?),
            None => None,
        };

        let mut select = Vec::with_capacity(node.select.len());
        for item in &node.select {
            let resolved = self.visit_expr(item)?;
            self.register_select_column(item, &resolved)?;
            // A field select item substituted by a CTE or expression field
            // keeps its name in the output via an explicit alias.
            let resolved = match (item, &resolved) {
                (Expr::Field(f), other)
                    if !matches!(other, Expr::Field(_))
                        && f.chain.len() == 1
                        && f.chain[0] != "*" =>
                {
                    let ty = resolved.ty();
                    Expr::Alias(Alias {
                        name: f.chain[0].clone(),
                        expr: Box::new(resolved),
                        span: f.span,
                        ty,
                    })
                }
                _ => resolved,
            };
            select.push(resolved);
        }

        let prewhere = match &node.prewhere {
            Some(e) => Some(Box::new(self.visit_expr(e)?)),
            None => None,
        };
        let where_expr = match &node.where_expr {
            Some(e) => Some(Box::new(self.visit_expr(e)?)),
            None => None,
        };
        let group_by = self.visit_exprs(&node.group_by)?;
        let having = match &node.having {
            Some(e) => Some(Box::new(self.visit_expr(e)?)),
            None => None,
        };
        let mut window_exprs = IndexMap::with_capacity(node.window_exprs.len());
        for (name, w) in &node.window_exprs {
            window_exprs.insert(name.clone(), self.visit_window_expr(w)?);
        }
        let mut order_by = Vec::with_capacity(node.order_by.len());
        for o in &node.order_by {
            order_by.push(self.visit_order_expr(o)?);
        }
        let limit = match &node.limit {
            Some(e) => Some(Box::new(self.visit_expr(e)?)),
            None => None,
        };
        let offset = match &node.offset {
            Some(e) => Some(Box::new(self.visit_expr(e)?)),
            None => None,
        };

        Ok(SelectQuery {
            // CTEs are inlined at their use sites during resolution.
            ctes: IndexMap::new(),
            select,
            distinct: node.distinct,
            select_from,
            where_expr,
            prewhere,
            group_by,
            having,
            window_exprs,
            order_by,
            limit,
            offset,
            limit_with_ties: node.limit_with_ties,
            settings: node.settings.clone(),
            span: node.span,
            ty: None,
        })
    }
}

fn arithmetic_result_type(
    op: ArithmeticOp,
    left: &ValueType,
    right: &ValueType,
    span: Option<Span>,
) -> QueryResult<ValueType> {
    use ValueKind::*;
    let nullable = left.nullable || right.nullable;
    let kind = match (&left.kind, &right.kind) {
        (Unknown, _) | (_, Unknown) => Unknown,
        (Str | StrJson | StrArray, _) | (_, Str | StrJson | StrArray) => {
            return Err(QueryError::type_error(
                format!("Unsupported operation: {} {} {}", left, op, right),
                span,
            ));
        }
        (DateTime, Interval) | (Interval, DateTime) => DateTime,
        (Date, Interval) | (Interval, Date) => Date,
        (Interval, Interval) => Interval,
        (Float, _) | (_, Float) => Float,
        (Decimal, _) | (_, Decimal) => Decimal,
        (Int, Int) => {
            if op == ArithmeticOp::Div {
                Float
            } else {
                Int
            }
        }
        _ => Unknown,
    };
    Ok(ValueType {
        kind,
        nullable,
    })
}

impl<'c, 'a> CloningVisitor for Resolver<'c, 'a> {
    fn visit_field(&mut self, node: &Field) -> QueryResult<Expr> {
        if node.chain.is_empty() {
            return Err(QueryError::internal("field node with an empty chain"));
        }
        if node.chain.len() == 1 && node.chain[0] == "*" {
            let scope = self
                .current_scope()
                .ok_or_else(|| QueryError::resolution("'*' outside of a select scope", node.span))?;
            let ty = self.ctx.arena.alloc(SymbolType::Asterisk { source: scope });
            let mut out = node.clone();
            out.ty = Some(ty);
            return Ok(Expr::Field(out));
        }

        let base = self.lookup_base(&node.chain[0], node.span)?;
        let mut current = match base {
            Base::ColumnCte(cte) => {
                if node.chain.len() > 1 {
                    return Err(QueryError::NotImplemented {
                        message: format!(
                            "Cannot access fields on CTE expression: {}",
                            node.chain[0]
                        ),
                        span: node.span,
                    });
                }
                return self.resolve_column_cte(cte, node.span);
            }
            Base::Expression(ef, owner) => {
                if node.chain.len() > 1 {
                    return Err(QueryError::NotImplemented {
                        message: format!(
                            "Cannot access fields on expression field: {}",
                            node.chain[0]
                        ),
                        span: node.span,
                    });
                }
                return self.resolve_expression_field(ef, owner, &node.chain[0]);
            }
            Base::Symbol(id) => id,
        };

        for (idx, seg) in node.chain.iter().enumerate().skip(1) {
            match self.step_chain(current, seg, node.span)? {
                Step::Symbol(id) => current = id,
                Step::Expression(ef, owner) => {
                    if idx + 1 != node.chain.len() {
                        return Err(QueryError::NotImplemented {
                            message: format!(
                                "Cannot access fields on expression field: {}",
                                seg
                            ),
                            span: node.span,
                        });
                    }
                    return self.resolve_expression_field(ef, owner, seg);
                }
            }
        }

        let mut out = node.clone();
        out.ty = Some(current);
        Ok(Expr::Field(out))
    }

    fn visit_constant(&mut self, node: &ConstantExpr) -> QueryResult<Expr> {
        let ty = self.ctx.arena.alloc(SymbolType::Constant {
            value_type: node.value.value_type(),
        });
        let mut out = node.clone();
        out.ty = Some(ty);
        Ok(Expr::Constant(out))
    }

    fn visit_call(&mut self, node: &Call) -> QueryResult<Expr> {
        let Some(meta) = registry().get(&node.name) else {
            let suggestion = did_you_mean(&node.name, registry().names());
            return Err(QueryError::resolution(
                with_suggestion(format!("Unknown function: {}", node.name), suggestion),
                node.span,
            ));
        };
        registry().check_arity(
            meta,
            node.args.len(),
            node.params.as_ref().map(Vec::len).unwrap_or(0),
            node.span,
        )?;

        let args = self.visit_exprs(&node.args)?;
        let params = match &node.params {
            Some(params) => Some(self.visit_exprs(params)?),
            None => None,
        };
        let arg_types: Vec<ValueType> = args.iter().map(|a| self.value_type_of(a)).collect();
        let return_type = registry().find_signature(meta, &arg_types, node.span)?;
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: node.name.clone(),
            return_type,
        });
        Ok(Expr::Call(Call {
            name: node.name.clone(),
            args,
            params,
            distinct: node.distinct,
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_arithmetic(&mut self, node: &ArithmeticOperation) -> QueryResult<Expr> {
        let left = self.visit_expr(&node.left)?;
        let right = self.visit_expr(&node.right)?;
        let result = arithmetic_result_type(
            node.op,
            &self.value_type_of(&left),
            &self.value_type_of(&right),
            node.span,
        )?;
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: format!("{:?}", node.op).to_lowercase(),
            return_type: result,
        });
        Ok(Expr::Arithmetic(ArithmeticOperation {
            op: node.op,
            left: Box::new(left),
            right: Box::new(right),
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_compare(&mut self, node: &CompareOperation) -> QueryResult<Expr> {
        let left = self.visit_expr(&node.left)?;
        let right = self.visit_expr(&node.right)?;
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: "comparison".to_string(),
            return_type: ValueType::new(ValueKind::Bool),
        });
        Ok(Expr::Compare(CompareOperation {
            op: node.op,
            left: Box::new(left),
            right: Box::new(right),
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_and(&mut self, node: &And) -> QueryResult<Expr> {
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: "and".to_string(),
            return_type: ValueType::new(ValueKind::Bool),
        });
        Ok(Expr::And(And {
            exprs: self.visit_exprs(&node.exprs)?,
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_or(&mut self, node: &Or) -> QueryResult<Expr> {
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: "or".to_string(),
            return_type: ValueType::new(ValueKind::Bool),
        });
        Ok(Expr::Or(Or {
            exprs: self.visit_exprs(&node.exprs)?,
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_not(&mut self, node: &Not) -> QueryResult<Expr> {
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: "not".to_string(),
            return_type: ValueType::new(ValueKind::Bool),
        });
        Ok(Expr::Not(Not {
            expr: Box::new(self.visit_expr(&node.expr)?),
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_array(&mut self, node: &ArrayExpr) -> QueryResult<Expr> {
        let items = self.visit_exprs(&node.items)?;
        let item_type = items
            .first()
            .map(|i| self.value_type_of(i))
            .unwrap_or_else(ValueType::unknown);
        let ty = self.ctx.arena.alloc(SymbolType::Constant {
            value_type: ValueType::new(ValueKind::Array(Box::new(item_type))),
        });
        Ok(Expr::Array(ArrayExpr {
            items,
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_tuple(&mut self, node: &TupleExpr) -> QueryResult<Expr> {
        let items = self.visit_exprs(&node.items)?;
        let item_types: Vec<ValueType> = items.iter().map(|i| self.value_type_of(i)).collect();
        let ty = self.ctx.arena.alloc(SymbolType::Constant {
            value_type: ValueType::new(ValueKind::Tuple {
                items: item_types,
                repeat: false,
            }),
        });
        Ok(Expr::Tuple(TupleExpr {
            items,
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_alias(&mut self, node: &Alias) -> QueryResult<Expr> {
        let inner = self.visit_expr(&node.expr)?;
        let ty = inner.ty();
        Ok(Expr::Alias(Alias {
            name: node.name.clone(),
            expr: Box::new(inner),
            span: node.span,
            ty,
        }))
    }

    fn visit_lambda(&mut self, node: &Lambda) -> QueryResult<Expr> {
        let parent = self.current_scope();
        let scope = self
            .ctx
            .arena
            .alloc(SymbolType::SelectQuery(ScopeType {
                columns: IndexMap::new(),
                tables: IndexMap::new(),
                parent,
            }));
        let mut frame = ScopeFrame::new(scope);
        for arg in &node.args {
            let id = self
                .ctx
                .arena
                .alloc(SymbolType::LambdaArgument { name: arg.clone() });
            frame.lambda_args.insert(arg.clone(), id);
        }
        self.frames.push(frame);
        let body = self.visit_expr(&node.body);
        self.frames.pop();
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: "lambda".to_string(),
            return_type: ValueType::unknown(),
        });
        Ok(Expr::Lambda(Lambda {
            args: node.args.clone(),
            body: Box::new(body?),
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_placeholder(&mut self, node: &Placeholder) -> QueryResult<Expr> {
        Err(QueryError::resolution(
            format!("Unresolved placeholder: {{{}}}", node.name),
            node.span,
        ))
    }

    fn visit_window_function(&mut self, node: &WindowFunction) -> QueryResult<Expr> {
        if let Some(meta) = registry().get(&node.name) {
            registry().check_arity(meta, node.args.len(), 0, node.span)?;
        }
        let over = match &node.over {
            WindowRef::Name(name) => {
                let declared = self
                    .frames
                    .last()
                    .map(|f| f.windows.iter().any(|w| w == name))
                    .unwrap_or(false);
                if !declared {
                    return Err(QueryError::resolution(
                        format!("Unknown window: {}", name),
                        node.span,
                    ));
                }
                WindowRef::Name(name.clone())
            }
            WindowRef::Inline(w) => WindowRef::Inline(self.visit_window_expr(w)?),
        };
        let ty = self.ctx.arena.alloc(SymbolType::Call {
            name: node.name.clone(),
            return_type: ValueType::unknown(),
        });
        Ok(Expr::Window(WindowFunction {
            name: node.name.clone(),
            args: self.visit_exprs(&node.args)?,
            over,
            span: node.span,
            ty: Some(ty),
        }))
    }

    fn visit_select_query(&mut self, node: &SelectQuery) -> QueryResult<SelectQuery> {
        let parent = self.current_scope();
        let scope = self.ctx.arena.alloc(SymbolType::SelectQuery(ScopeType {
            columns: IndexMap::new(),
            tables: IndexMap::new(),
            parent,
        }));
        let mut frame = ScopeFrame::new(scope);
        frame.ctes = node.ctes.clone();
        frame.windows = node.window_exprs.keys().cloned().collect();
        self.frames.push(frame);
        let result = self.resolve_select_parts(node);
        self.frames.pop();
        let mut query = result?;
        query.ty = Some(scope);
        Ok(query)
    }

    fn visit_select_set_query(&mut self, node: &SelectSetQuery) -> QueryResult<SelectSetQuery> {
        let initial = self.visit_expr(&node.initial)?;
        let mut selects = Vec::with_capacity(node.subsequent.len() + 1);
        if let Some(id) = initial.ty() {
            selects.push(id);
        }
        let mut subsequent = Vec::with_capacity(node.subsequent.len());
        for n in &node.subsequent {
            let select = self.visit_expr(&n.select)?;
            if let Some(id) = select.ty() {
                selects.push(id);
            }
            subsequent.push(SelectSetNode {
                op: n.op,
                select: Box::new(select),
            });
        }
        let ty = self.ctx.arena.alloc(SymbolType::SelectSetQuery { selects });
        Ok(SelectSetQuery {
            initial: Box::new(initial),
            subsequent,
            span: node.span,
            ty: Some(ty),
        })
    }
}
