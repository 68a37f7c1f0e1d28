use pretty_assertions::assert_eq;

use crate::ast::*;
use crate::parser::{parse_query, parse_select};

#[test]
fn test_simple_select() {
    let q = parse_query("SELECT event, timestamp FROM events").unwrap();
    assert_eq!(q.select.len(), 2);
    let from = q.select_from.expect("from clause");
    assert_eq!(*from.table, Expr::field("events"));
    assert!(from.next_join.is_none());
}

#[test]
fn test_select_distinct() {
    let q = parse_query("SELECT DISTINCT event FROM events").unwrap();
    assert!(q.distinct);
}

#[test]
fn test_select_with_alias() {
    let q = parse_query("SELECT count() AS total FROM events").unwrap();
    match &q.select[0] {
        Expr::Alias(alias) => assert_eq!(alias.name, "total"),
        other => panic!("expected alias, got {}", other.kind_name()),
    }
}

#[test]
fn test_where_group_having_order_limit() {
    let q = parse_query(
        "SELECT event, count() FROM events WHERE timestamp >= '2026-01-01' \
         GROUP BY event HAVING count() > 10 ORDER BY count() DESC LIMIT 100 OFFSET 10",
    )
    .unwrap();
    assert!(q.where_expr.is_some());
    assert_eq!(q.group_by.len(), 1);
    assert!(q.having.is_some());
    assert_eq!(q.order_by.len(), 1);
    assert_eq!(q.order_by[0].order, SortOrder::Desc);
    assert_eq!(*q.limit.unwrap(), Expr::constant(100));
    assert_eq!(*q.offset.unwrap(), Expr::constant(10));
}

#[test]
fn test_prewhere() {
    let q = parse_query("SELECT event FROM events PREWHERE event = 'x' WHERE 1 = 1").unwrap();
    assert!(q.prewhere.is_some());
    assert!(q.where_expr.is_some());
}

#[test]
fn test_limit_with_ties() {
    let q = parse_query("SELECT event FROM events ORDER BY event LIMIT 10 WITH TIES").unwrap();
    assert!(q.limit_with_ties);
}

#[test]
fn test_join_with_on() {
    let q = parse_query(
        "SELECT event FROM events e LEFT JOIN persons p ON e.person_id = p.id",
    )
    .unwrap();
    let from = q.select_from.expect("from");
    assert_eq!(from.alias.as_deref(), Some("e"));
    let join = from.next_join.expect("join");
    assert_eq!(join.join_op, Some(JoinOp::Left));
    assert_eq!(join.alias.as_deref(), Some("p"));
    let constraint = join.constraint.expect("constraint");
    assert_eq!(constraint.kind, ConstraintKind::On);
}

#[test]
fn test_join_with_using() {
    let q =
        parse_query("SELECT event FROM events JOIN sessions USING (session_id)").unwrap();
    let join = q.select_from.unwrap().next_join.expect("join");
    assert_eq!(join.join_op, Some(JoinOp::Inner));
    assert_eq!(join.constraint.unwrap().kind, ConstraintKind::Using);
}

#[test]
fn test_multiple_joins_in_order() {
    let q = parse_query(
        "SELECT 1 FROM events INNER JOIN persons ON 1 = 1 CROSS JOIN sessions",
    )
    .unwrap();
    let from = q.select_from.unwrap();
    let first = from.next_join.expect("first join");
    assert_eq!(first.join_op, Some(JoinOp::Inner));
    let second = first.next_join.expect("second join");
    assert_eq!(second.join_op, Some(JoinOp::Cross));
}

#[test]
fn test_subquery_in_from() {
    let q = parse_query("SELECT total FROM (SELECT count() AS total FROM events) agg").unwrap();
    let from = q.select_from.unwrap();
    assert_eq!(from.alias.as_deref(), Some("agg"));
    assert!(matches!(*from.table, Expr::Select(_)));
}

#[test]
fn test_sample_clause() {
    let q = parse_query("SELECT event FROM events SAMPLE 1/10 OFFSET 1/2").unwrap();
    let sample = q.select_from.unwrap().sample.expect("sample");
    assert!(sample.value.right.is_some());
    assert!(sample.offset.is_some());
}

#[test]
fn test_subquery_cte() {
    let q = parse_query(
        "WITH top_events AS (SELECT event FROM events LIMIT 10) \
         SELECT event FROM top_events",
    )
    .unwrap();
    assert_eq!(q.ctes.len(), 1);
    let cte = &q.ctes["top_events"];
    assert_eq!(cte.kind, CteKind::Subquery);
}

#[test]
fn test_column_cte() {
    let q = parse_query("WITH 1 + 1 AS two SELECT two FROM events").unwrap();
    let cte = &q.ctes["two"];
    assert_eq!(cte.kind, CteKind::Column);
}

#[test]
fn test_mixed_ctes_in_order() {
    let q = parse_query(
        "WITH 'signup' AS target, filtered AS (SELECT event FROM events WHERE event = target) \
         SELECT event FROM filtered",
    )
    .unwrap();
    let kinds: Vec<CteKind> = q.ctes.values().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![CteKind::Column, CteKind::Subquery]);
}

#[test]
fn test_union_all_chain_preserves_order() {
    let expr = parse_select(
        "SELECT 1 UNION ALL SELECT 2 INTERSECT SELECT 3 EXCEPT SELECT 4 UNION DISTINCT SELECT 5",
    )
    .unwrap();
    match expr {
        Expr::SelectSet(set) => {
            let ops: Vec<SetOperator> = set.subsequent.iter().map(|n| n.op).collect();
            assert_eq!(
                ops,
                vec![
                    SetOperator::UnionAll,
                    SetOperator::Intersect,
                    SetOperator::Except,
                    SetOperator::UnionDistinct,
                ]
            );
        }
        other => panic!("expected set query, got {}", other.kind_name()),
    }
}

#[test]
fn test_bare_union_is_rejected() {
    // The execution dialect requires ALL or DISTINCT after UNION.
    assert!(parse_select("SELECT 1 UNION SELECT 2").is_err());
}

#[test]
fn test_window_clause() {
    let q = parse_query(
        "SELECT row_number() OVER w FROM events \
         WINDOW w AS (PARTITION BY event ORDER BY timestamp ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)",
    )
    .unwrap();
    let w = &q.window_exprs["w"];
    assert_eq!(w.partition_by.len(), 1);
    let frame = w.frame.as_ref().expect("frame");
    assert_eq!(frame.kind, FrameKind::Rows);
    assert_eq!(frame.start, FrameBound::UnboundedPreceding);
    assert_eq!(frame.end, Some(FrameBound::CurrentRow));
}

#[test]
fn test_settings_clause() {
    let q = parse_query(
        "SELECT event FROM events SETTINGS readonly = 2, max_execution_time = 60, join_algorithm = 'hash'",
    )
    .unwrap();
    let settings = q.settings.expect("settings");
    assert_eq!(settings.readonly, Some(2));
    assert_eq!(settings.max_execution_time, Some(60));
    assert_eq!(settings.join_algorithm.as_deref(), Some("hash"));
}

#[test]
fn test_unknown_setting_rejected() {
    assert!(parse_query("SELECT 1 FROM events SETTINGS bogus = 1").is_err());
}

#[test]
fn test_subquery_expression() {
    let q = parse_query(
        "SELECT event FROM events WHERE person_id IN (SELECT id FROM persons)",
    )
    .unwrap();
    match q.where_expr.as_deref() {
        Some(Expr::Compare(cmp)) => {
            assert_eq!(cmp.op, CompareOp::In);
            assert!(matches!(&*cmp.right, Expr::Select(_)));
        }
        other => panic!("unexpected where: {:?}", other.map(|e| e.kind_name())),
    }
}

#[test]
fn test_select_star() {
    let q = parse_query("SELECT * FROM events").unwrap();
    match &q.select[0] {
        Expr::Field(f) => assert_eq!(f.chain, vec!["*"]),
        other => panic!("expected field, got {}", other.kind_name()),
    }
}

#[test]
fn test_query_span_covers_text() {
    let text = "SELECT event FROM events";
    let q = parse_query(text).unwrap();
    let span = q.span.expect("span");
    assert_eq!(&text[span.start..span.end], text);
}
