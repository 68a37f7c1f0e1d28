pub mod constant;
pub mod expr;
pub mod query;
pub mod visit;

pub use self::constant::Constant;
pub use self::expr::{
    Alias, And, ArithmeticOp, ArithmeticOperation, ArrayExpr, Call, CompareOp, CompareOperation,
    ConstantExpr, Expr, Field, Lambda, Not, Or, Placeholder, TagAttribute, TagExpr, TupleExpr,
    WindowFunction, WindowRef,
};
pub use self::query::{
    ConstraintKind, Cte, CteKind, FrameBound, FrameKind, JoinConstraint, JoinExpr, JoinOp,
    OrderExpr, QuerySettings, RatioExpr, SampleExpr, SelectQuery, SelectSetNode, SelectSetQuery,
    SetOperator, SortOrder, WindowExpr, WindowFrame,
};
pub use self::visit::{
    clone_call, clone_join_expr, clone_select_query, contains_aggregate, gather_placeholders,
    walk_call, walk_join_expr, walk_select_query, CloningVisitor, IdentityClone, Visitor,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_query() -> SelectQuery {
        let mut q = SelectQuery::new()
            .column(Expr::field("event"))
            .column(Expr::alias("ts", Expr::field("events.timestamp")))
            .from_table("events")
            .filter(Expr::compare(
                CompareOp::Eq,
                Expr::field("events.event"),
                Expr::constant("test"),
            ));
        q.ctes.insert(
            "cutoff".to_string(),
            Cte {
                name: "cutoff".to_string(),
                expr: Box::new(Expr::constant(100)),
                kind: CteKind::Column,
            },
        );
        q.group_by.push(Expr::call(
            "toStartOfDay",
            vec![Expr::field("timestamp")],
        ));
        q.order_by.push(OrderExpr {
            expr: Box::new(Expr::field("ts")),
            order: SortOrder::Desc,
            span: None,
        });
        q.limit = Some(Box::new(Expr::constant(10)));
        q.window_exprs.insert(
            "w".to_string(),
            WindowExpr {
                partition_by: vec![Expr::field("event")],
                order_by: vec![],
                frame: Some(WindowFrame {
                    kind: FrameKind::Rows,
                    start: FrameBound::UnboundedPreceding,
                    end: Some(FrameBound::CurrentRow),
                }),
                span: None,
            },
        );
        if let Some(from) = &mut q.select_from {
            from.sample = Some(SampleExpr {
                value: RatioExpr {
                    left: Box::new(Expr::constant(1)),
                    right: Some(Box::new(Expr::constant(10))),
                    span: None,
                },
                offset: None,
                span: None,
            });
            from.next_join = Some(Box::new(JoinExpr {
                table: Box::new(Expr::field("persons")),
                alias: Some("p".to_string()),
                join_op: Some(JoinOp::Left),
                constraint: Some(JoinConstraint {
                    expr: Box::new(Expr::compare(
                        CompareOp::Eq,
                        Expr::field("events.person_id"),
                        Expr::field("p.id"),
                    )),
                    kind: ConstraintKind::On,
                    span: None,
                }),
                sample: None,
                next_join: None,
                span: None,
                ty: None,
            }));
        }
        q
    }

    #[test]
    fn test_cloning_round_trip_select() {
        let q = sample_query();
        let cloned = IdentityClone.visit_select_query(&q).unwrap();
        assert_eq!(q, cloned);
    }

    #[test]
    fn test_cloning_round_trip_every_expr_kind() {
        let exprs = vec![
            Expr::field("a.b"),
            Expr::constant(1),
            Expr::Call(Call {
                name: "quantile".into(),
                args: vec![Expr::field("duration")],
                params: Some(vec![Expr::constant(0.95)]),
                distinct: true,
                span: None,
                ty: None,
            }),
            Expr::Arithmetic(ArithmeticOperation {
                op: ArithmeticOp::Add,
                left: Box::new(Expr::constant(1)),
                right: Box::new(Expr::constant(2)),
                span: None,
                ty: None,
            }),
            Expr::compare(CompareOp::In, Expr::field("x"), Expr::constant(1)),
            Expr::and(vec![Expr::constant(true), Expr::constant(false)]),
            Expr::or(vec![Expr::constant(true)]),
            Expr::Not(Not {
                expr: Box::new(Expr::constant(true)),
                span: None,
                ty: None,
            }),
            Expr::Array(ArrayExpr {
                items: vec![Expr::constant(1)],
                span: None,
                ty: None,
            }),
            Expr::Tuple(TupleExpr {
                items: vec![Expr::constant(1), Expr::constant("a")],
                span: None,
                ty: None,
            }),
            Expr::alias("n", Expr::constant(1)),
            Expr::Lambda(Lambda {
                args: vec!["x".into()],
                body: Box::new(Expr::field("x")),
                span: None,
                ty: None,
            }),
            Expr::Placeholder(Placeholder {
                name: "interval".into(),
                span: None,
                ty: None,
            }),
            Expr::Window(WindowFunction {
                name: "row_number".into(),
                args: vec![],
                over: WindowRef::Name("w".into()),
                span: None,
                ty: None,
            }),
            Expr::Tag(TagExpr {
                kind: "sparkline".into(),
                attributes: vec![TagAttribute {
                    name: "data".into(),
                    value: Expr::field("series"),
                }],
                span: None,
                ty: None,
            }),
            Expr::Select(Box::new(sample_query())),
            Expr::SelectSet(Box::new(SelectSetQuery {
                initial: Box::new(Expr::Select(Box::new(sample_query()))),
                subsequent: vec![SelectSetNode {
                    op: SetOperator::UnionAll,
                    select: Box::new(Expr::Select(Box::new(sample_query()))),
                }],
                span: None,
                ty: None,
            })),
        ];
        for expr in exprs {
            let cloned = IdentityClone.visit_expr(&expr).unwrap();
            assert_eq!(expr, cloned, "clone mismatch for {}", expr.kind_name());
        }
    }

    #[test]
    fn test_gather_placeholders() {
        let expr = Expr::and(vec![
            Expr::Placeholder(Placeholder {
                name: "from".into(),
                span: None,
                ty: None,
            }),
            Expr::Placeholder(Placeholder {
                name: "to".into(),
                span: None,
                ty: None,
            }),
            Expr::Placeholder(Placeholder {
                name: "from".into(),
                span: None,
                ty: None,
            }),
        ]);
        assert_eq!(gather_placeholders(&expr), vec!["from", "to"]);
    }

    #[test]
    fn test_contains_aggregate_skips_subqueries() {
        let inner = SelectQuery::new()
            .column(Expr::call("count", vec![]))
            .from_table("events");
        let outer = Expr::compare(
            CompareOp::Gt,
            Expr::field("n"),
            Expr::Select(Box::new(inner)),
        );
        assert!(!contains_aggregate(&outer));
        assert!(contains_aggregate(&Expr::call(
            "count",
            vec![]
        )));
    }
}
