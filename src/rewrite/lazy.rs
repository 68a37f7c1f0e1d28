//! Lazy table and lazy join materialization.
//!
//! Replaces references to lazy schema entries with the concrete queries
//! their builders produce for exactly the fields the surrounding query
//! requested. Field-access sets are recorded by the resolver; this pass
//! consumes them, splices the backing queries into the join chain, and
//! rewrites the lazy symbols so a second run finds nothing left to do.

use crate::ast::{
    clone_select_query, CloningVisitor, ConstraintKind, Expr, Field, JoinConstraint, JoinExpr,
    SelectQuery,
};
use crate::context::Context;
use crate::error::{QueryError, QueryResult};
use crate::resolver::Resolver;
use crate::schema::{FieldOrTable, TableEntry};
use crate::types::{SymbolType, TypeId};

pub fn materialize_lazy_tables(expr: &Expr, ctx: &mut Context) -> QueryResult<Expr> {
    Materializer { ctx }.visit_expr(expr)
}

struct Materializer<'c, 'a> {
    ctx: &'c mut Context<'a>,
}

impl<'c, 'a> Materializer<'c, 'a> {
    /// The lazy-table symbol a registered FROM target resolves to, if any.
    fn transitive_lazy(&self, id: TypeId) -> Option<TypeId> {
        match self.ctx.arena.get(id) {
            SymbolType::LazyTable { .. } => Some(id),
            SymbolType::TableAlias { table, .. } => self.transitive_lazy(*table),
            _ => None,
        }
    }

    fn underlying_table_name(&self, id: TypeId) -> Option<String> {
        match self.ctx.arena.get(id) {
            SymbolType::Table { name } | SymbolType::LazyTable { name } => Some(name.clone()),
            SymbolType::TableAlias { table, .. } => self.underlying_table_name(*table),
            _ => None,
        }
    }

    /// Replace lazy FROM targets along the join chain.
    fn materialize_chain(&mut self, mut join: JoinExpr) -> QueryResult<JoinExpr> {
        if let Some(registered) = join.ty {
            if let Some(lazy_id) = self.transitive_lazy(registered) {
                let SymbolType::LazyTable { name } = self.ctx.arena.get(lazy_id).clone() else {
                    return Err(QueryError::internal("lazy id is not a lazy table"));
                };
                let db = self.ctx.database;
                let entry = db.get_table(&name)?;
                let requested = self.ctx.lazy_access_fields(registered);
                let backing = entry
                    .lazy_select(&requested)
                    .ok_or_else(|| QueryError::internal("lazy table without a builder"))??;
                log::debug!(
                    "materializing lazy table {} with fields {:?}",
                    name,
                    requested
                );
                let resolved =
                    Resolver::new(self.ctx).visit_expr(&Expr::Select(Box::new(backing)))?;
                let select = resolved
                    .ty()
                    .ok_or_else(|| QueryError::internal("materialized query without a type"))?;
                let alias = join.alias.clone().unwrap_or_else(|| name.clone());
                *self.ctx.arena.get_mut(lazy_id) = SymbolType::SelectQueryAlias {
                    alias: alias.clone(),
                    select,
                };
                join.table = Box::new(resolved);
                join.alias = Some(alias);
            }
        }
        if let Some(next) = join.next_join.take() {
            join.next_join = Some(Box::new(self.materialize_chain(*next)?));
        }
        Ok(join)
    }

    /// Turn one scope-registered lazy join into a concrete JOIN clause.
    fn materialize_join(
        &mut self,
        scope_id: TypeId,
        key: &str,
        tid: TypeId,
        field: &str,
        join_table: &str,
        from_table: TypeId,
    ) -> QueryResult<JoinExpr> {
        let db = self.ctx.database;
        let from_name = self
            .underlying_table_name(from_table)
            .ok_or_else(|| QueryError::internal("lazy join from a non-table symbol"))?;
        let Some(FieldOrTable::LazyJoin(lazy_join)) =
            db.get_table(&from_name)?.get_field(field)
        else {
            return Err(QueryError::internal(format!(
                "schema entry for lazy join {}.{} disappeared",
                from_name, field
            )));
        };
        let from_alias = self
            .ctx
            .arena
            .scope(scope_id)
            .and_then(|s| s.alias_for_table(from_table).map(str::to_string))
            .unwrap_or(from_name);

        let requested = self.ctx.lazy_access_fields(tid);
        let (table_expr, replacement) = match db.get_table(join_table)? {
            TableEntry::Lazy(lazy) => {
                let backing = (lazy.builder)(&requested)?;
                let resolved =
                    Resolver::new(self.ctx).visit_expr(&Expr::Select(Box::new(backing)))?;
                let select = resolved
                    .ty()
                    .ok_or_else(|| QueryError::internal("materialized join without a type"))?;
                (
                    resolved,
                    SymbolType::SelectQueryAlias {
                        alias: key.to_string(),
                        select,
                    },
                )
            }
            TableEntry::Table(_) => {
                let table_id = self.ctx.arena.alloc(SymbolType::Table {
                    name: join_table.to_string(),
                });
                (
                    Expr::Field(Field {
                        chain: vec![join_table.to_string()],
                        span: None,
                        ty: Some(table_id),
                    }),
                    SymbolType::TableAlias {
                        alias: key.to_string(),
                        table: table_id,
                    },
                )
            }
        };

        // Rewrite the symbol first so the constraint resolves against the
        // materialized table and a rerun sees nothing lazy.
        *self.ctx.arena.get_mut(tid) = replacement;

        let on_expr = (lazy_join.constraint)(&from_alias, key);
        let resolved_on = Resolver::with_scope(self.ctx, scope_id).visit_expr(&on_expr)?;

        Ok(JoinExpr {
            table: Box::new(table_expr),
            alias: Some(key.to_string()),
            join_op: Some(lazy_join.join_op),
            constraint: Some(JoinConstraint {
                expr: Box::new(resolved_on),
                kind: ConstraintKind::On,
                span: None,
            }),
            sample: None,
            next_join: None,
            span: None,
            ty: Some(tid),
        })
    }
}

fn append_join(join: &mut JoinExpr, new_join: JoinExpr) {
    match &mut join.next_join {
        Some(next) => append_join(next, new_join),
        None => join.next_join = Some(Box::new(new_join)),
    }
}

impl<'c, 'a> CloningVisitor for Materializer<'c, 'a> {
    fn visit_select_query(&mut self, node: &SelectQuery) -> QueryResult<SelectQuery> {
        let mut query = clone_select_query(self, node)?;
        let Some(scope_id) = query.ty else {
            return Ok(query);
        };

        if let Some(from) = query.select_from.take() {
            query.select_from = Some(self.materialize_chain(from)?);
        }

        let lazy_joins: Vec<(String, TypeId, String, String, TypeId)> = self
            .ctx
            .arena
            .scope(scope_id)
            .map(|scope| {
                scope
                    .tables
                    .iter()
                    .filter_map(|(key, tid)| match self.ctx.arena.get(*tid) {
                        SymbolType::LazyJoin {
                            field,
                            join_table,
                            from_table,
                        } => Some((
                            key.clone(),
                            *tid,
                            field.clone(),
                            join_table.clone(),
                            *from_table,
                        )),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (key, tid, field, join_table, from_table) in lazy_joins {
            let join =
                self.materialize_join(scope_id, &key, tid, &field, &join_table, from_table)?;
            match &mut query.select_from {
                Some(from) => append_join(from, join),
                None => {
                    return Err(QueryError::internal(
                        "lazy join in a query with no FROM clause",
                    ));
                }
            }
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::modifiers::Modifiers;
    use crate::parser::parse_select;
    use crate::resolver::resolve_types;
    use crate::schema::test_database;
    use pretty_assertions::assert_eq;

    fn materialize(sql: &str) -> (Expr, Expr, Context<'static>) {
        let db = Box::leak(Box::new(test_database()));
        let mut ctx = Context::new(db, Modifiers::default());
        let parsed = parse_select(sql).unwrap();
        let resolved = resolve_types(&parsed, &mut ctx).unwrap();
        let once = materialize_lazy_tables(&resolved, &mut ctx).unwrap();
        let twice = materialize_lazy_tables(&once, &mut ctx).unwrap();
        (once, twice, ctx)
    }

    fn as_select(expr: &Expr) -> &SelectQuery {
        match expr {
            Expr::Select(q) => q,
            other => panic!("expected select, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_lazy_table_replaced_with_minimal_subquery() {
        let (once, _, _ctx) = materialize("SELECT duration FROM sessions");
        let query = as_select(&once);
        let from = query.select_from.as_ref().unwrap();
        assert_eq!(from.alias.as_deref(), Some("sessions"));
        let backing = match &*from.table {
            Expr::Select(q) => q,
            other => panic!("expected subquery, got {}", other.kind_name()),
        };
        // Join key plus the one requested field, nothing else.
        assert_eq!(backing.select.len(), 2);
        let names: Vec<String> = backing
            .select
            .iter()
            .map(|item| match item {
                Expr::Field(f) => f.chain.last().unwrap().clone(),
                Expr::Alias(a) => a.name.clone(),
                other => panic!("unexpected item {}", other.kind_name()),
            })
            .collect();
        assert_eq!(names, vec!["session_id", "duration"]);
    }

    #[test]
    fn test_materialization_is_idempotent() {
        let (once, twice, _ctx) = materialize("SELECT duration FROM sessions");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_lazy_join_appended_with_constraint() {
        let (once, twice, _ctx) = materialize("SELECT pdi.person_id FROM events");
        let query = as_select(&once);
        let from = query.select_from.as_ref().unwrap();
        let join = from.next_join.as_ref().expect("materialized join");
        assert_eq!(join.alias.as_deref(), Some("events__pdi"));
        match &*join.table {
            Expr::Field(f) => assert_eq!(f.chain, vec!["person_distinct_ids"]),
            other => panic!("expected table reference, got {}", other.kind_name()),
        }
        let constraint = join.constraint.as_ref().expect("on clause");
        assert_eq!(constraint.kind, ConstraintKind::On);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_lazy_table_with_multiple_fields() {
        let (once, _, _ctx) =
            materialize("SELECT start_time, duration FROM sessions WHERE duration > 60");
        let query = as_select(&once);
        let backing = match &*query.select_from.as_ref().unwrap().table {
            Expr::Select(q) => q,
            other => panic!("expected subquery, got {}", other.kind_name()),
        };
        assert_eq!(backing.select.len(), 3);
    }
}
