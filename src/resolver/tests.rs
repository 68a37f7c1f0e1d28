use pretty_assertions::assert_eq;

use crate::ast::*;
use crate::context::Context;
use crate::error::QueryError;
use crate::modifiers::Modifiers;
use crate::parser::parse_select;
use crate::resolver::resolve_types;
use crate::schema::test_database;
use crate::types::{SymbolType, ValueKind, ValueType};

fn resolve(sql: &str) -> (Expr, Context<'static>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Box::leak(Box::new(test_database()));
    let mut ctx = Context::new(db, Modifiers::default());
    let expr = parse_select(sql).unwrap();
    let resolved = resolve_types(&expr, &mut ctx).unwrap();
    (resolved, ctx)
}

fn resolve_err(sql: &str) -> QueryError {
    let db = test_database();
    let mut ctx = Context::new(&db, Modifiers::default());
    let expr = parse_select(sql).unwrap();
    resolve_types(&expr, &mut ctx).unwrap_err()
}

fn as_select(expr: &Expr) -> &SelectQuery {
    match expr {
        Expr::Select(q) => q,
        other => panic!("expected select, got {}", other.kind_name()),
    }
}

#[test]
fn test_end_to_end_field_resolution() {
    let (resolved, ctx) = resolve(
        "SELECT event, events.timestamp FROM events WHERE events.event = 'test'",
    );
    let query = as_select(&resolved);

    // Both `event` references bind to the same field symbol.
    let select_event_ty = query.select[0].ty().unwrap();
    let where_cmp = match query.where_expr.as_deref().unwrap() {
        Expr::Compare(cmp) => cmp,
        other => panic!("expected comparison, got {}", other.kind_name()),
    };
    let where_event_ty = where_cmp.left.ty().unwrap();
    assert_eq!(
        ctx.arena.get(select_event_ty),
        ctx.arena.get(where_event_ty)
    );
    match ctx.arena.get(select_event_ty) {
        SymbolType::Field { name, .. } => assert_eq!(name, "event"),
        other => panic!("expected field symbol, got {:?}", other),
    }

    // The comparison types as Boolean.
    let cmp_ty = where_cmp.ty.unwrap();
    assert_eq!(
        ctx.arena.resolve_constant_type(ctx.database, cmp_ty).unwrap(),
        ValueType::new(ValueKind::Bool)
    );

    // The scope exports exactly {event, timestamp} in declaration order.
    let scope = ctx.arena.scope(query.ty.unwrap()).unwrap();
    let columns: Vec<&String> = scope.columns.keys().collect();
    assert_eq!(columns, vec!["event", "timestamp"]);
}

#[test]
fn test_field_value_types_come_from_schema() {
    let (resolved, ctx) = resolve("SELECT timestamp FROM events");
    let query = as_select(&resolved);
    let ty = query.select[0].ty().unwrap();
    assert_eq!(
        ctx.arena.resolve_constant_type(ctx.database, ty).unwrap(),
        ValueType::new(ValueKind::DateTime)
    );
}

#[test]
fn test_property_access_is_nullable() {
    let (resolved, ctx) = resolve("SELECT events.properties.browser FROM events");
    let query = as_select(&resolved);
    let ty = query.select[0].ty().unwrap();
    match ctx.arena.get(ty) {
        SymbolType::Property { chain, .. } => assert_eq!(chain, &vec!["browser".to_string()]),
        other => panic!("expected property symbol, got {:?}", other),
    }
    assert!(
        ctx.arena
            .resolve_constant_type(ctx.database, ty)
            .unwrap()
            .nullable
    );
}

#[test]
fn test_unknown_field_suggests() {
    let err = resolve_err("SELECT evnt FROM events");
    assert!(err.to_string().contains("Unable to resolve field: evnt"));
    assert!(err.to_string().contains("Did you mean 'event'?"));
    assert!(err.span().is_some());
}

#[test]
fn test_unknown_table_suggests() {
    let err = resolve_err("SELECT 1 FROM evnts");
    assert!(err.to_string().contains("Unknown table: evnts"));
    assert!(err.to_string().contains("Did you mean 'events'?"));
}

#[test]
fn test_unknown_function_errors() {
    let err = resolve_err("SELECT countt() FROM events");
    assert!(err.to_string().contains("Unknown function: countt"));
    assert!(err.to_string().contains("Did you mean 'count'?"));
}

#[test]
fn test_arity_error_through_resolution() {
    let err = resolve_err("SELECT toString() FROM events");
    assert_eq!(
        err.to_string(),
        "Function 'toString' expects exactly 1 argument, found 0"
    );
}

#[test]
fn test_ambiguous_field_across_tables() {
    // `properties` exists on both events and persons.
    let err = resolve_err(
        "SELECT properties FROM events e JOIN persons p ON e.distinct_id = toString(p.id)",
    );
    assert!(err.to_string().contains("Ambiguous field: properties"));
}

#[test]
fn test_qualified_fields_through_aliases() {
    let (resolved, ctx) = resolve(
        "SELECT e.event, p.properties FROM events e JOIN persons p ON e.distinct_id = toString(p.id)",
    );
    let query = as_select(&resolved);
    match ctx.arena.get(query.select[0].ty().unwrap()) {
        SymbolType::Field { name, table } => {
            assert_eq!(name, "event");
            assert!(matches!(
                ctx.arena.get(*table),
                SymbolType::TableAlias { alias, .. } if alias == "e"
            ));
        }
        other => panic!("expected field symbol, got {:?}", other),
    }
}

#[test]
fn test_subquery_alias_not_visible_outside() {
    let err = resolve_err(
        "SELECT inner_alias FROM (SELECT event AS other FROM events) sub",
    );
    assert!(err.to_string().contains("Unable to resolve field: inner_alias"));
}

#[test]
fn test_subquery_columns_visible_through_alias() {
    let (resolved, ctx) = resolve(
        "SELECT sub.renamed FROM (SELECT event AS renamed FROM events) sub",
    );
    let query = as_select(&resolved);
    match ctx.arena.get(query.select[0].ty().unwrap()) {
        SymbolType::Field { name, .. } => assert_eq!(name, "renamed"),
        other => panic!("expected field symbol, got {:?}", other),
    }
}

#[test]
fn test_correlated_subquery_sees_outer_scope() {
    // The inner query references the outer alias `e`.
    let (resolved, _ctx) = resolve(
        "SELECT event, (SELECT max(p.created_at) FROM persons p WHERE toString(p.id) = e.distinct_id) FROM events e",
    );
    as_select(&resolved);
}

#[test]
fn test_lambda_parameter_shadows_field() {
    // `event` is a field of events, but inside the lambda body the
    // parameter of the same name wins.
    let (resolved, ctx) = resolve(
        "SELECT arrayMap(event -> event, [1, 2]) FROM events",
    );
    let query = as_select(&resolved);
    let call = match &query.select[0] {
        Expr::Call(call) => call,
        other => panic!("expected call, got {}", other.kind_name()),
    };
    let lambda = match &call.args[0] {
        Expr::Lambda(lambda) => lambda,
        other => panic!("expected lambda, got {}", other.kind_name()),
    };
    match ctx.arena.get(lambda.body.ty().unwrap()) {
        SymbolType::LambdaArgument { name } => assert_eq!(name, "event"),
        other => panic!("expected lambda argument symbol, got {:?}", other),
    }
}

#[test]
fn test_lambda_body_sees_enclosing_scope() {
    let (resolved, _ctx) = resolve("SELECT arrayMap(x -> concat(event, toString(x)), [1]) FROM events");
    as_select(&resolved);
}

#[test]
fn test_lambda_parameter_invisible_outside_body() {
    let err = resolve_err("SELECT arrayMap(x -> x, [1]), x FROM events");
    assert!(err.to_string().contains("Unable to resolve field: x"));
}

#[test]
fn test_column_cte_substitution() {
    let (resolved, _ctx) = resolve("WITH 1 + 1 AS two SELECT two FROM events");
    let query = as_select(&resolved);
    // The select item keeps its name but carries the substituted expression.
    match &query.select[0] {
        Expr::Alias(alias) => {
            assert_eq!(alias.name, "two");
            assert!(matches!(*alias.expr, Expr::Arithmetic(_)));
        }
        other => panic!("expected alias, got {}", other.kind_name()),
    }
    // CTEs are consumed during resolution.
    assert!(query.ctes.is_empty());
}

#[test]
fn test_subquery_cte_inlined_in_from() {
    let (resolved, _ctx) = resolve(
        "WITH top AS (SELECT event FROM events LIMIT 10) SELECT event FROM top",
    );
    let query = as_select(&resolved);
    let from = query.select_from.as_ref().unwrap();
    assert!(matches!(*from.table, Expr::Select(_)));
}

#[test]
fn test_cte_referencing_earlier_cte() {
    let (resolved, _ctx) = resolve(
        "WITH 'signup' AS target, filtered AS (SELECT event FROM events WHERE event = target) \
         SELECT event FROM filtered",
    );
    as_select(&resolved);
}

#[test]
fn test_recursive_cte_rejected() {
    let err = resolve_err("WITH two AS (SELECT two FROM two) SELECT 1 FROM two");
    assert!(err.to_string().contains("Recursive CTE"));
}

#[test]
fn test_duplicate_alias_rejected() {
    let err = resolve_err("SELECT event AS x, timestamp AS x FROM events");
    assert!(err.to_string().contains("Duplicate alias: x"));
}

#[test]
fn test_duplicate_table_alias_rejected() {
    let err = resolve_err("SELECT 1 FROM events e JOIN persons e ON 1 = 1");
    assert!(err.to_string().contains("Duplicate table alias: e"));
}

#[test]
fn test_alias_usable_in_later_clauses() {
    let (resolved, _ctx) = resolve(
        "SELECT toStartOfDay(timestamp) AS day, count() FROM events GROUP BY day ORDER BY day",
    );
    as_select(&resolved);
}

#[test]
fn test_unresolved_placeholder_errors() {
    let err = resolve_err("SELECT event FROM events WHERE timestamp > {from_date}");
    assert!(err.to_string().contains("Unresolved placeholder: {from_date}"));
}

#[test]
fn test_string_arithmetic_is_a_type_error() {
    let err = resolve_err("SELECT event + 1 FROM events");
    match err {
        QueryError::Type { message, .. } => assert!(message.contains("Unsupported operation")),
        other => panic!("expected type error, got {}", other),
    }
}

#[test]
fn test_lazy_table_field_access_recorded() {
    let (resolved, ctx) = resolve("SELECT duration FROM sessions");
    let query = as_select(&resolved);
    let scope = ctx.arena.scope(query.ty.unwrap()).unwrap();
    let sessions_id = scope.tables["sessions"];
    assert_eq!(
        ctx.lazy_access_fields(sessions_id),
        vec!["duration".to_string()]
    );
}

#[test]
fn test_lazy_join_registered_in_scope() {
    let (resolved, ctx) = resolve("SELECT pdi.person_id FROM events");
    let query = as_select(&resolved);
    let scope = ctx.arena.scope(query.ty.unwrap()).unwrap();
    let join_id = scope.tables["events__pdi"];
    match ctx.arena.get(join_id) {
        SymbolType::LazyJoin { join_table, field, .. } => {
            assert_eq!(join_table, "person_distinct_ids");
            assert_eq!(field, "pdi");
        }
        other => panic!("expected lazy join symbol, got {:?}", other),
    }
    assert_eq!(
        ctx.lazy_access_fields(join_id),
        vec!["person_id".to_string()]
    );
}

#[test]
fn test_expression_field_substituted() {
    let (resolved, _ctx) = resolve("SELECT event_date FROM events");
    let query = as_select(&resolved);
    match &query.select[0] {
        Expr::Alias(alias) => {
            assert_eq!(alias.name, "event_date");
            match &*alias.expr {
                Expr::Call(call) => assert_eq!(call.name, "toDate"),
                other => panic!("expected call, got {}", other.kind_name()),
            }
        }
        other => panic!("expected alias, got {}", other.kind_name()),
    }
}

#[test]
fn test_virtual_table_field_access() {
    let (resolved, ctx) = resolve("SELECT poe.id FROM events");
    let query = as_select(&resolved);
    match ctx.arena.get(query.select[0].ty().unwrap()) {
        SymbolType::Field { name, table } => {
            assert_eq!(name, "id");
            assert!(matches!(
                ctx.arena.get(*table),
                SymbolType::VirtualTable { .. }
            ));
        }
        other => panic!("expected field symbol, got {:?}", other),
    }
}

#[test]
fn test_select_set_query_resolves_all_branches() {
    let (resolved, ctx) = resolve(
        "SELECT event FROM events UNION ALL SELECT event FROM events",
    );
    match &resolved {
        Expr::SelectSet(set) => {
            let ty = set.ty.unwrap();
            match ctx.arena.get(ty) {
                SymbolType::SelectSetQuery { selects } => assert_eq!(selects.len(), 2),
                other => panic!("expected select set symbol, got {:?}", other),
            }
        }
        other => panic!("expected select set, got {}", other.kind_name()),
    }
}

#[test]
fn test_overload_error_surfaces() {
    let err = resolve_err("SELECT position(event, 1) FROM events");
    match err {
        QueryError::Overload { message, .. } => {
            assert!(message.contains("no signature matching"));
        }
        other => panic!("expected overload error, got {}", other),
    }
}

#[test]
fn test_window_reference_checked() {
    let err = resolve_err("SELECT row_number() OVER missing FROM events");
    assert!(err.to_string().contains("Unknown window: missing"));
}
