//! Wildcard expansion.
//!
//! Replaces `*` select items with one concrete field reference per column
//! exposed by the resolved source, in declared order. Idempotent: expanded
//! items are plain fields, which a second run leaves alone.

use crate::ast::{clone_select_query, CloningVisitor, Expr, Field, SelectQuery};
use crate::context::Context;
use crate::error::{QueryResult, Span};
use crate::schema::FieldOrTable;
use crate::types::{SymbolType, TypeId};

pub fn expand_asterisks(expr: &Expr, ctx: &mut Context) -> QueryResult<Expr> {
    Expander { ctx }.visit_expr(expr)
}

struct Expander<'c, 'a> {
    ctx: &'c mut Context<'a>,
}

impl<'c, 'a> Expander<'c, 'a> {
    fn is_lazy_backed(&self, id: TypeId) -> bool {
        match self.ctx.arena.get(id) {
            SymbolType::LazyTable { .. } => true,
            SymbolType::TableAlias { table, .. } => self.is_lazy_backed(*table),
            _ => false,
        }
    }

    /// The exported columns of a `*` source, in declared order.
    fn columns_of(&self, source: TypeId, query: &SelectQuery) -> Vec<(String, TypeId)> {
        match self.ctx.arena.get(source) {
            // A bare `*`: one entry per FROM/JOIN target, in join order.
            SymbolType::SelectQuery(_) => {
                let mut out = Vec::new();
                let mut join = query.select_from.as_ref();
                while let Some(j) = join {
                    if let Some(id) = j.ty {
                        out.extend(self.table_columns(id));
                    }
                    join = j.next_join.as_deref();
                }
                out
            }
            // A qualified `table.*`.
            _ => self.table_columns(source),
        }
    }

    fn table_columns(&self, table: TypeId) -> Vec<(String, TypeId)> {
        match self.ctx.arena.get(table) {
            SymbolType::Table { name } | SymbolType::LazyTable { name } => {
                match self.ctx.database.get_table(name) {
                    Ok(entry) => entry
                        .fields()
                        .iter()
                        .filter(|(_, field)| matches!(field, FieldOrTable::Field(_)))
                        .map(|(field_name, _)| (field_name.clone(), table))
                        .collect(),
                    Err(_) => Vec::new(),
                }
            }
            SymbolType::TableAlias { table: inner, .. } => self
                .table_columns(*inner)
                .into_iter()
                .map(|(name, _)| (name, table))
                .collect(),
            SymbolType::SelectQueryAlias { select, .. } => self
                .table_columns(*select)
                .into_iter()
                .map(|(name, _)| (name, table))
                .collect(),
            SymbolType::SelectQuery(scope) => scope
                .columns
                .keys()
                .map(|name| (name.clone(), table))
                .collect(),
            SymbolType::SelectSetQuery { selects } => selects
                .first()
                .map(|first| {
                    self.table_columns(*first)
                        .into_iter()
                        .map(|(name, _)| (name, table))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl<'c, 'a> CloningVisitor for Expander<'c, 'a> {
    fn visit_select_query(&mut self, node: &SelectQuery) -> QueryResult<SelectQuery> {
        let mut query = clone_select_query(self, node)?;
        let needs_expansion = query.select.iter().any(|item| {
            matches!(item.ty().map(|id| self.ctx.arena.get(id)), Some(SymbolType::Asterisk { .. }))
        });
        if !needs_expansion {
            return Ok(query);
        }

        let mut expanded: Vec<Expr> = Vec::with_capacity(query.select.len());
        let mut registrations: Vec<(String, TypeId)> = Vec::new();
        for item in std::mem::take(&mut query.select) {
            let source = match item.ty().map(|id| self.ctx.arena.get(id)) {
                Some(SymbolType::Asterisk { source }) => *source,
                _ => {
                    expanded.push(item);
                    continue;
                }
            };
            let span: Option<Span> = item.span();
            for (name, table) in self.columns_of(source, &query) {
                // Expanded fields count as requests against lazy sources, so
                // the materialization pass selects them.
                if self.is_lazy_backed(table) {
                    self.ctx.record_lazy_access(table, &name);
                }
                let field_ty = self.ctx.arena.alloc(SymbolType::Field {
                    name: name.clone(),
                    table,
                });
                registrations.push((name.clone(), field_ty));
                expanded.push(Expr::Field(Field {
                    chain: vec![name],
                    span,
                    ty: Some(field_ty),
                }));
            }
        }
        query.select = expanded;

        // Expanded columns become exports of this scope.
        if let Some(scope) = query.ty.and_then(|id| self.ctx.arena.scope_mut(id)) {
            for (name, field_ty) in registrations {
                scope.columns.entry(name).or_insert(field_ty);
            }
        }
        Ok(query)
    }
}
