use pretty_assertions::assert_eq;

use crate::ast::*;
use crate::parser::parse_expr;

#[test]
fn test_field_chain() {
    let expr = parse_expr("events.properties.browser").unwrap();
    match expr {
        Expr::Field(f) => assert_eq!(f.chain, vec!["events", "properties", "browser"]),
        other => panic!("expected field, got {}", other.kind_name()),
    }
}

#[test]
fn test_literals() {
    assert_eq!(parse_expr("42").unwrap(), Expr::constant(42));
    assert_eq!(parse_expr("'hi'").unwrap(), Expr::constant("hi"));
    assert_eq!(parse_expr("true").unwrap(), Expr::constant(true));
    match parse_expr("null").unwrap() {
        Expr::Constant(c) => assert_eq!(c.value, Constant::Null),
        other => panic!("expected constant, got {}", other.kind_name()),
    }
}

#[test]
fn test_arithmetic_precedence() {
    let expr = parse_expr("1 + 2 * 3").unwrap();
    match expr {
        Expr::Arithmetic(op) => {
            assert_eq!(op.op, ArithmeticOp::Add);
            match *op.right {
                Expr::Arithmetic(inner) => assert_eq!(inner.op, ArithmeticOp::Mul),
                other => panic!("expected multiplication, got {}", other.kind_name()),
            }
        }
        other => panic!("expected arithmetic, got {}", other.kind_name()),
    }
}

#[test]
fn test_left_associative_chain() {
    // (1 - 2) - 3
    let expr = parse_expr("1 - 2 - 3").unwrap();
    match expr {
        Expr::Arithmetic(op) => {
            assert_eq!(op.op, ArithmeticOp::Sub);
            assert!(matches!(*op.left, Expr::Arithmetic(_)));
            assert_eq!(*op.right, Expr::constant(3));
        }
        other => panic!("expected arithmetic, got {}", other.kind_name()),
    }
}

#[test]
fn test_boolean_precedence() {
    let expr = parse_expr("a = 1 or b = 2 and c = 3").unwrap();
    match expr {
        Expr::Or(or) => {
            assert_eq!(or.exprs.len(), 2);
            assert!(matches!(or.exprs[1], Expr::And(_)));
        }
        other => panic!("expected or, got {}", other.kind_name()),
    }
}

#[test]
fn test_not() {
    let expr = parse_expr("not a = 1").unwrap();
    assert!(matches!(expr, Expr::Not(_)));
}

#[test]
fn test_comparison_operators() {
    for (text, op) in [
        ("a = 1", CompareOp::Eq),
        ("a != 1", CompareOp::NotEq),
        ("a <> 1", CompareOp::NotEq),
        ("a < 1", CompareOp::Lt),
        ("a <= 1", CompareOp::LtEq),
        ("a > 1", CompareOp::Gt),
        ("a >= 1", CompareOp::GtEq),
        ("a like 'x%'", CompareOp::Like),
        ("a ilike 'x%'", CompareOp::ILike),
        ("a not like 'x%'", CompareOp::NotLike),
        ("a =~ 'x.*'", CompareOp::Regex),
        ("a !~ 'x.*'", CompareOp::NotRegex),
        ("a in (1, 2)", CompareOp::In),
        ("a not in (1, 2)", CompareOp::NotIn),
    ] {
        match parse_expr(text).unwrap() {
            Expr::Compare(cmp) => assert_eq!(cmp.op, op, "for {:?}", text),
            other => panic!("expected comparison for {:?}, got {}", text, other.kind_name()),
        }
    }
}

#[test]
fn test_call_and_parametric_call() {
    match parse_expr("count()").unwrap() {
        Expr::Call(call) => {
            assert_eq!(call.name, "count");
            assert!(call.args.is_empty());
            assert!(call.params.is_none());
        }
        other => panic!("expected call, got {}", other.kind_name()),
    }
    match parse_expr("quantile(0.95)(duration)").unwrap() {
        Expr::Call(call) => {
            assert_eq!(call.name, "quantile");
            assert_eq!(call.params, Some(vec![Expr::constant(0.95)]));
            assert_eq!(call.args, vec![Expr::field("duration")]);
        }
        other => panic!("expected call, got {}", other.kind_name()),
    }
}

#[test]
fn test_count_distinct() {
    match parse_expr("count(distinct event)").unwrap() {
        Expr::Call(call) => {
            assert!(call.distinct);
            assert_eq!(call.args, vec![Expr::field("event")]);
        }
        other => panic!("expected call, got {}", other.kind_name()),
    }
}

#[test]
fn test_case_desugars_to_if() {
    match parse_expr("case when a then 1 else 2 end").unwrap() {
        Expr::Call(call) => {
            assert_eq!(call.name, "if");
            assert_eq!(call.args.len(), 3);
        }
        other => panic!("expected call, got {}", other.kind_name()),
    }
}

#[test]
fn test_case_with_operand_desugars_to_multi_if() {
    match parse_expr("case x when 1 then 'a' when 2 then 'b' end").unwrap() {
        Expr::Call(call) => {
            assert_eq!(call.name, "multiIf");
            // Two branch pairs plus the implicit NULL else.
            assert_eq!(call.args.len(), 5);
            assert!(matches!(call.args[0], Expr::Compare(_)));
        }
        other => panic!("expected call, got {}", other.kind_name()),
    }
}

#[test]
fn test_lambda_forms() {
    match parse_expr("x -> x + 1").unwrap() {
        Expr::Lambda(lambda) => assert_eq!(lambda.args, vec!["x"]),
        other => panic!("expected lambda, got {}", other.kind_name()),
    }
    match parse_expr("(x, y) -> x + y").unwrap() {
        Expr::Lambda(lambda) => assert_eq!(lambda.args, vec!["x", "y"]),
        other => panic!("expected lambda, got {}", other.kind_name()),
    }
}

#[test]
fn test_lambda_inside_call() {
    match parse_expr("arrayMap(x -> x * 2, [1, 2, 3])").unwrap() {
        Expr::Call(call) => {
            assert_eq!(call.name, "arrayMap");
            assert!(matches!(call.args[0], Expr::Lambda(_)));
            assert!(matches!(call.args[1], Expr::Array(_)));
        }
        other => panic!("expected call, got {}", other.kind_name()),
    }
}

#[test]
fn test_placeholder() {
    match parse_expr("{interval}").unwrap() {
        Expr::Placeholder(p) => assert_eq!(p.name, "interval"),
        other => panic!("expected placeholder, got {}", other.kind_name()),
    }
}

#[test]
fn test_tuple_and_grouping() {
    assert!(matches!(parse_expr("(1, 2, 'a')").unwrap(), Expr::Tuple(_)));
    // A single parenthesized expression is just the expression.
    assert_eq!(parse_expr("(1)").unwrap(), Expr::constant(1));
}

#[test]
fn test_interval_literal() {
    match parse_expr("interval 3 day").unwrap() {
        Expr::Call(call) => {
            assert_eq!(call.name, "toIntervalDay");
            assert_eq!(call.args, vec![Expr::constant(3)]);
        }
        other => panic!("expected call, got {}", other.kind_name()),
    }
}

#[test]
fn test_unary_minus() {
    match parse_expr("-x").unwrap() {
        Expr::Call(call) => assert_eq!(call.name, "negate"),
        other => panic!("expected negate call, got {}", other.kind_name()),
    }
}

#[test]
fn test_window_function_over_name() {
    match parse_expr("row_number() over w").unwrap() {
        Expr::Window(w) => {
            assert_eq!(w.name, "row_number");
            assert_eq!(w.over, WindowRef::Name("w".to_string()));
        }
        other => panic!("expected window function, got {}", other.kind_name()),
    }
}

#[test]
fn test_window_function_inline() {
    match parse_expr("sum(amount) over (partition by user_id order by ts desc)").unwrap() {
        Expr::Window(w) => match w.over {
            WindowRef::Inline(def) => {
                assert_eq!(def.partition_by.len(), 1);
                assert_eq!(def.order_by.len(), 1);
                assert_eq!(def.order_by[0].order, SortOrder::Desc);
            }
            WindowRef::Name(n) => panic!("expected inline window, got name {}", n),
        },
        other => panic!("expected window function, got {}", other.kind_name()),
    }
}

#[test]
fn test_spans_recorded() {
    let text = "foo = 'bar'";
    let expr = parse_expr(text).unwrap();
    match &expr {
        Expr::Compare(cmp) => {
            let left_span = cmp.left.span().expect("left span");
            assert_eq!(&text[left_span.start..left_span.end], "foo");
            let right_span = cmp.right.span().expect("right span");
            assert_eq!(&text[right_span.start..right_span.end], "'bar'");
        }
        other => panic!("expected comparison, got {}", other.kind_name()),
    }
    let span = expr.span().expect("whole span");
    assert_eq!(span.start, 0);
    assert_eq!(span.end, text.len());
}

#[test]
fn test_parse_error_position() {
    let err = parse_expr("1 + ").unwrap_err();
    match err {
        crate::error::QueryError::Parse { position, .. } => assert_eq!(position, 4),
        other => panic!("expected parse error, got {}", other),
    }
}

#[test]
fn test_trailing_garbage_rejected() {
    let err = parse_expr("1 2").unwrap_err();
    assert!(err.to_string().contains("trailing"));
}
