//! Preaggregation substitution.
//!
//! A structural matcher recognizes one canonical query shape - a single
//! known aggregate over the events table, filtered to one event name and a
//! timestamp range, grouped by a time bucket of the timestamp with an
//! optional breakdown key. When a caller-supplied provider reports a
//! precomputed table for that shape, the query is rewritten to read the
//! merge form from it. Anything else - no provider, no hit, an
//! unrecognized query - leaves the AST untouched. This pass fails open,
//! never closed.

use crate::ast::{
    clone_select_query, Alias, Call, CloningVisitor, CompareOp, Constant, Expr, Field, SelectQuery,
};
use crate::context::Context;
use crate::error::QueryResult;
use crate::types::{SymbolType, TypeId};

/// Readiness source for precomputed aggregates. Implementations may block
/// on I/O; the compiler imposes no timeout or retry of its own.
pub trait PreaggregationProvider: Send + Sync {
    fn lookup(&self, shape: &PreaggShape) -> Option<PreaggTable>;
}

/// The canonical shape the matcher recognizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreaggShape {
    pub event: String,
    pub aggregate: AggregateKind,
    pub bucket: TimeBucket,
    pub breakdown: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Uniq { field: String },
}

impl AggregateKind {
    /// The merge combinator that reads this aggregate's precomputed state.
    fn merge_function(&self) -> &'static str {
        match self {
            AggregateKind::Count => "sumMerge",
            AggregateKind::Uniq { .. } => "uniqMerge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Hour,
    Day,
    Week,
}

impl TimeBucket {
    fn from_function(name: &str) -> Option<TimeBucket> {
        match name {
            "toStartOfHour" => Some(TimeBucket::Hour),
            "toStartOfDay" => Some(TimeBucket::Day),
            "toStartOfWeek" => Some(TimeBucket::Week),
            _ => None,
        }
    }
}

/// Where a precomputed answer lives and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreaggTable {
    pub table: String,
    /// Aggregate-state column read through the matching merge combinator.
    pub state_column: String,
    pub bucket_column: String,
    pub event_column: String,
    pub breakdown_column: Option<String>,
}

pub fn substitute_preaggregated(expr: &Expr, ctx: &mut Context) -> QueryResult<Expr> {
    if !ctx.modifiers.use_preaggregated_tables || ctx.preaggregation.is_none() {
        return Ok(expr.clone());
    }
    Substituter { ctx }.visit_expr(expr)
}

struct Substituter<'c, 'a> {
    ctx: &'c mut Context<'a>,
}

impl<'c, 'a> Substituter<'c, 'a> {
    fn is_events_table(&self, query: &SelectQuery) -> bool {
        let Some(from) = &query.select_from else {
            return false;
        };
        if from.next_join.is_some() {
            return false;
        }
        let Some(ty) = from.ty else { return false };
        self.table_name(ty).as_deref() == Some("events")
    }

    fn table_name(&self, id: TypeId) -> Option<String> {
        match self.ctx.arena.get(id) {
            SymbolType::Table { name } | SymbolType::LazyTable { name } => Some(name.clone()),
            SymbolType::TableAlias { table, .. } => self.table_name(*table),
            _ => None,
        }
    }

    fn field_name(expr: &Expr) -> Option<&str> {
        match expr {
            Expr::Field(f) => f.chain.last().map(String::as_str),
            _ => None,
        }
    }

    fn string_constant(expr: &Expr) -> Option<&str> {
        match expr {
            Expr::Constant(c) => match &c.value {
                Constant::Str(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// Match `event = '<name>' AND timestamp >= x AND timestamp < y`, with
    /// nothing left over.
    fn match_filter(where_expr: Option<&Expr>) -> Option<String> {
        let conditions: Vec<&Expr> = match where_expr? {
            Expr::And(and) => and.exprs.iter().collect(),
            other => vec![other],
        };
        let mut event = None;
        let mut lower = false;
        let mut upper = false;
        for condition in conditions {
            let Expr::Compare(cmp) = condition else {
                return None;
            };
            match (Self::field_name(&cmp.left), cmp.op) {
                (Some("event"), CompareOp::Eq) => {
                    event = Some(Self::string_constant(&cmp.right)?.to_string());
                }
                (Some("timestamp"), CompareOp::GtEq) => lower = true,
                (Some("timestamp"), CompareOp::Lt) => upper = true,
                _ => return None,
            }
        }
        if lower && upper {
            event
        } else {
            None
        }
    }

    /// Match `toStartOfX(timestamp)`, possibly under an alias.
    fn match_bucket(expr: &Expr) -> Option<TimeBucket> {
        let expr = match expr {
            Expr::Alias(a) => &*a.expr,
            other => other,
        };
        let Expr::Call(call) = expr else { return None };
        let bucket = TimeBucket::from_function(&call.name)?;
        if call.args.len() == 1 && Self::field_name(&call.args[0]) == Some("timestamp") {
            Some(bucket)
        } else {
            None
        }
    }

    fn match_aggregate(expr: &Expr) -> Option<AggregateKind> {
        let expr = match expr {
            Expr::Alias(a) => &*a.expr,
            other => other,
        };
        let Expr::Call(call) = expr else { return None };
        match call.name.as_str() {
            "count" if call.args.is_empty() && !call.distinct => Some(AggregateKind::Count),
            "uniq" if call.args.len() == 1 => Some(AggregateKind::Uniq {
                field: Self::field_name(&call.args[0])?.to_string(),
            }),
            _ => None,
        }
    }

    /// The conservative structural match: bucket key first in GROUP BY, an
    /// optional breakdown key second, exactly one recognized aggregate, a
    /// recognized filter. Anything else is left for the raw-events plan;
    /// normalizing semantically-equivalent orderings is out of scope.
    fn match_shape(&self, query: &SelectQuery) -> Option<PreaggShape> {
        if !self.is_events_table(query) || query.distinct || query.having.is_some() {
            return None;
        }
        let bucket = Self::match_bucket(query.group_by.first()?)?;
        let breakdown = match query.group_by.len() {
            1 => None,
            2 => Some(Self::field_name(&query.group_by[1])?.to_string()),
            _ => return None,
        };
        let event = Self::match_filter(query.where_expr.as_deref())?;

        // Select items must be the group keys and exactly one aggregate.
        let mut aggregate = None;
        for item in &query.select {
            if let Some(kind) = Self::match_aggregate(item) {
                if aggregate.is_some() {
                    return None;
                }
                aggregate = Some(kind);
            } else if Self::match_bucket(item).is_none() {
                let name = match item {
                    Expr::Alias(a) => Self::field_name(&a.expr),
                    other => Self::field_name(other),
                };
                if name.map(str::to_string) != breakdown {
                    return None;
                }
            }
        }
        Some(PreaggShape {
            event,
            aggregate: aggregate?,
            bucket,
            breakdown,
        })
    }

    /// Rewrite the matched query to read from the precomputed table.
    fn apply(
        &mut self,
        mut query: SelectQuery,
        shape: &PreaggShape,
        target: &PreaggTable,
    ) -> SelectQuery {
        let table_id = self.ctx.arena.alloc(SymbolType::Table {
            name: target.table.clone(),
        });
        if let Some(from) = &mut query.select_from {
            from.table = Box::new(Expr::Field(Field {
                chain: vec![target.table.clone()],
                span: None,
                ty: Some(table_id),
            }));
            from.alias = None;
            from.ty = Some(table_id);
        }
        let rewriter = ColumnRewriter {
            target: target.clone(),
            breakdown_source: shape.breakdown.clone(),
        };
        query.select = query
            .select
            .into_iter()
            .map(|e| rewriter.rewrite(e))
            .collect();
        query.group_by = query
            .group_by
            .into_iter()
            .map(|e| rewriter.rewrite(e))
            .collect();
        if let Some(where_expr) = query.where_expr.take() {
            query.where_expr = Some(Box::new(rewriter.rewrite(*where_expr)));
        }
        for order in &mut query.order_by {
            let rewritten = rewriter.rewrite((*order.expr).clone());
            order.expr = Box::new(rewritten);
        }
        query
    }
}

/// Maps raw-event expressions onto precomputed-table columns.
struct ColumnRewriter {
    target: PreaggTable,
    breakdown_source: Option<String>,
}

impl ColumnRewriter {
    fn rewrite(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Alias(a) => Expr::Alias(Alias {
                name: a.name,
                expr: Box::new(self.rewrite(*a.expr)),
                span: a.span,
                ty: a.ty,
            }),
            Expr::And(mut and) => {
                and.exprs = and.exprs.into_iter().map(|e| self.rewrite(e)).collect();
                Expr::And(and)
            }
            Expr::Compare(mut cmp) => {
                cmp.left = Box::new(self.rewrite(*cmp.left));
                cmp.right = Box::new(self.rewrite(*cmp.right));
                Expr::Compare(cmp)
            }
            Expr::Call(call) => self.rewrite_call(call),
            Expr::Field(f) => self.rewrite_field(f),
            other => other,
        }
    }

    fn rewrite_call(&self, call: Call) -> Expr {
        // The time bucket collapses to the precomputed bucket column.
        if TimeBucket::from_function(&call.name).is_some()
            && call.args.len() == 1
            && matches!(&call.args[0], Expr::Field(f) if f.chain.last().map(String::as_str) == Some("timestamp"))
        {
            return self.column(&self.target.bucket_column);
        }
        // Recognized aggregates read their state through merge combinators.
        let merge = match call.name.as_str() {
            "count" if call.args.is_empty() => Some(AggregateKind::Count.merge_function()),
            "uniq" if call.args.len() == 1 => Some("uniqMerge"),
            _ => None,
        };
        if let Some(merge) = merge {
            return Expr::Call(Call {
                name: merge.to_string(),
                args: vec![self.column(&self.target.state_column)],
                params: None,
                distinct: false,
                span: call.span,
                ty: None,
            });
        }
        let mut call = call;
        call.args = call.args.into_iter().map(|e| self.rewrite(e)).collect();
        Expr::Call(call)
    }

    fn rewrite_field(&self, f: Field) -> Expr {
        let renamed = match f.chain.last().map(String::as_str) {
            Some("event") => Some(self.target.event_column.clone()),
            Some("timestamp") => Some(self.target.bucket_column.clone()),
            Some(name) => match (&self.breakdown_source, &self.target.breakdown_column) {
                (Some(source), Some(column)) if source == name => Some(column.clone()),
                _ => None,
            },
            None => None,
        };
        match renamed {
            Some(name) => Expr::Field(Field {
                chain: vec![name],
                span: f.span,
                ty: None,
            }),
            None => Expr::Field(f),
        }
    }

    fn column(&self, name: &str) -> Expr {
        Expr::Field(Field {
            chain: vec![name.to_string()],
            span: None,
            ty: None,
        })
    }
}

impl<'c, 'a> CloningVisitor for Substituter<'c, 'a> {
    fn visit_select_query(&mut self, node: &SelectQuery) -> QueryResult<SelectQuery> {
        let query = clone_select_query(self, node)?;
        let Some(shape) = self.match_shape(&query) else {
            return Ok(query);
        };
        let provider = match &self.ctx.preaggregation {
            Some(p) => p.clone(),
            None => return Ok(query),
        };
        match provider.lookup(&shape) {
            Some(target) => {
                log::debug!(
                    "substituting preaggregated table {} for event {:?}",
                    target.table,
                    shape.event
                );
                Ok(self.apply(query, &shape, &target))
            }
            // Not ready: keep the raw-events plan.
            None => Ok(query),
        }
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
    use std::sync::Arc;

    struct FixedProvider {
        ready: Option<PreaggTable>,
    }

    impl PreaggregationProvider for FixedProvider {
        fn lookup(&self, _shape: &PreaggShape) -> Option<PreaggTable> {
            self.ready.clone()
        }
    }

    fn daily_counts_table() -> PreaggTable {
        PreaggTable {
            table: "event_counts_daily".to_string(),
            state_column: "count_state".to_string(),
            bucket_column: "day_bucket".to_string(),
            event_column: "event_name".to_string(),
            breakdown_column: None,
        }
    }

    const CANONICAL: &str = "SELECT toStartOfDay(timestamp) AS day, count() FROM events \
         WHERE event = 'pageview' AND timestamp >= '2026-01-01' AND timestamp < '2026-02-01' \
         GROUP BY toStartOfDay(timestamp)";

    fn run(sql: &str, provider: Option<FixedProvider>, enabled: bool) -> Expr {
        let db = test_database();
        let mut ctx = Context::new(
            &db,
            Modifiers {
                use_preaggregated_tables: enabled,
                ..Default::default()
            },
        );
        if let Some(p) = provider {
            ctx.preaggregation = Some(Arc::new(p));
        }
        let parsed = parse_select(sql).unwrap();
        let resolved = resolve_types(&parsed, &mut ctx).unwrap();
        substitute_preaggregated(&resolved, &mut ctx).unwrap()
    }

    fn as_select(expr: &Expr) -> &SelectQuery {
        match expr {
            Expr::Select(q) => q,
            other => panic!("expected select, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_ready_shape_is_substituted() {
        let rewritten = run(
            CANONICAL,
            Some(FixedProvider {
                ready: Some(daily_counts_table()),
            }),
            true,
        );
        let query = as_select(&rewritten);
        let from = query.select_from.as_ref().unwrap();
        match &*from.table {
            Expr::Field(f) => assert_eq!(f.chain, vec!["event_counts_daily"]),
            other => panic!("expected table reference, got {}", other.kind_name()),
        }
        // count() became sumMerge(count_state).
        let found_merge = query.select.iter().any(|item| {
            matches!(item, Expr::Call(c) if c.name == "sumMerge")
        });
        assert!(found_merge, "expected a sumMerge call in {:?}", query.select);
        // The bucket call collapsed to the bucket column.
        match &query.select[0] {
            Expr::Alias(a) => match &*a.expr {
                Expr::Field(f) => assert_eq!(f.chain, vec!["day_bucket"]),
                other => panic!("expected field, got {}", other.kind_name()),
            },
            other => panic!("expected alias, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_not_ready_leaves_query_untouched() {
        let resolved_only = run(CANONICAL, None, false);
        let with_unready_provider = run(CANONICAL, Some(FixedProvider { ready: None }), true);
        assert_eq!(resolved_only, with_unready_provider);
    }

    #[test]
    fn test_disabled_modifier_skips_pass() {
        let disabled = run(
            CANONICAL,
            Some(FixedProvider {
                ready: Some(daily_counts_table()),
            }),
            false,
        );
        let query = as_select(&disabled);
        let from = query.select_from.as_ref().unwrap();
        match &*from.table {
            Expr::Field(f) => assert_eq!(f.chain, vec!["events"]),
            other => panic!("expected table reference, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_unrecognized_shape_fails_open() {
        // Extra filter condition: not the canonical shape.
        let sql = "SELECT toStartOfDay(timestamp), count() FROM events \
             WHERE event = 'pageview' AND timestamp >= '2026-01-01' AND timestamp < '2026-02-01' \
             AND distinct_id = 'u1' \
             GROUP BY toStartOfDay(timestamp)";
        let rewritten = run(
            sql,
            Some(FixedProvider {
                ready: Some(daily_counts_table()),
            }),
            true,
        );
        let query = as_select(&rewritten);
        match &*query.select_from.as_ref().unwrap().table {
            Expr::Field(f) => assert_eq!(f.chain, vec!["events"]),
            other => panic!("expected table reference, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_breakdown_shape_matched() {
        let sql = "SELECT toStartOfDay(timestamp), event, count() FROM events \
             WHERE event = 'pageview' AND timestamp >= '2026-01-01' AND timestamp < '2026-02-01' \
             GROUP BY toStartOfDay(timestamp), event";
        let rewritten = run(
            sql,
            Some(FixedProvider {
                ready: Some(PreaggTable {
                    breakdown_column: Some("event_name".to_string()),
                    ..daily_counts_table()
                }),
            }),
            true,
        );
        let query = as_select(&rewritten);
        match &query.group_by[1] {
            Expr::Field(f) => assert_eq!(f.chain, vec!["event_name"]),
            other => panic!("expected field, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_breakdown_before_bucket_not_matched() {
        // GROUP BY ordering is intentionally not normalized.
        let sql = "SELECT event, toStartOfDay(timestamp), count() FROM events \
             WHERE event = 'pageview' AND timestamp >= '2026-01-01' AND timestamp < '2026-02-01' \
             GROUP BY event, toStartOfDay(timestamp)";
        let rewritten = run(
            sql,
            Some(FixedProvider {
                ready: Some(daily_counts_table()),
            }),
            true,
        );
        let query = as_select(&rewritten);
        match &*query.select_from.as_ref().unwrap().table {
            Expr::Field(f) => assert_eq!(f.chain, vec!["events"]),
            other => panic!("expected table reference, got {}", other.kind_name()),
        }
    }
}
