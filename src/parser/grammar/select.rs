//! SELECT query grammar: clauses, joins, CTEs, set operations.

use indexmap::IndexMap;
use nom::{character::complete::char, combinator::opt, IResult, Parser};

use crate::ast::*;
use crate::parser::grammar::base::{
    comma_list1, keyword, keyword2, parse_identifier, parse_number, ws,
};
use crate::parser::grammar::expressions::{parse_expression, parse_expression_with_alias};
use crate::parser::span_between;

/// A select query or a parenthesized chain of them joined by set operators.
pub fn parse_select_set(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (mut rest, initial) = parse_select_operand(input)?;
    let mut subsequent: Vec<SelectSetNode> = Vec::new();
    loop {
        let checkpoint = rest;
        let (after, _) = ws(rest)?;
        let Some((after, op)) = parse_set_operator(after) else {
            rest = checkpoint;
            break;
        };
        let (after, _) = ws(after)?;
        let (after, select) = parse_select_operand(after)?;
        subsequent.push(SelectSetNode {
            op,
            select: Box::new(select),
        });
        rest = after;
    }
    if subsequent.is_empty() {
        Ok((rest, initial))
    } else {
        Ok((
            rest,
            Expr::SelectSet(Box::new(SelectSetQuery {
                initial: Box::new(initial),
                subsequent,
                span: span_between(start, rest),
                ty: None,
            })),
        ))
    }
}

fn parse_set_operator(input: &str) -> Option<(&str, SetOperator)> {
    if let Ok((rest, _)) = keyword("union")(input) {
        let (rest, _) = ws(rest).ok()?;
        if let Ok((rest, _)) = keyword("all")(rest) {
            return Some((rest, SetOperator::UnionAll));
        }
        if let Ok((rest, _)) = keyword("distinct")(rest) {
            return Some((rest, SetOperator::UnionDistinct));
        }
        return None;
    }
    if let Ok((rest, _)) = keyword("intersect")(input) {
        return Some((rest, SetOperator::Intersect));
    }
    if let Ok((rest, _)) = keyword("except")(input) {
        return Some((rest, SetOperator::Except));
    }
    None
}

fn parse_select_operand(input: &str) -> IResult<&str, Expr> {
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('(').parse(input) {
        let (rest, _) = ws(rest)?;
        let (rest, inner) = parse_select_set(rest)?;
        let (rest, _) = ws(rest)?;
        let (rest, _) = char(')').parse(rest)?;
        return Ok((rest, inner));
    }
    let (rest, query) = parse_select_query(input)?;
    Ok((rest, Expr::Select(Box::new(query))))
}

pub fn parse_select_query(input: &str) -> IResult<&str, SelectQuery> {
    let start = input;
    let (rest, ctes) = opt(parse_with_clause).parse(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = keyword("select")(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, distinct) = match keyword("distinct")(rest) {
        Ok((after, _)) => {
            let (after, _) = ws(after)?;
            (after, true)
        }
        Err(_) => (rest, false),
    };
    let (rest, select) = comma_list1(parse_expression_with_alias)(rest)?;

    let mut query = SelectQuery {
        ctes: ctes.unwrap_or_default(),
        select,
        distinct,
        ..SelectQuery::default()
    };

    let (rest, _) = ws(rest)?;
    let (mut rest, select_from) = opt(parse_from_clause).parse(rest)?;
    query.select_from = select_from;

    // PREWHERE / WHERE
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword("prewhere")(after) {
        let (after, _) = ws(after)?;
        let (after, expr) = parse_expression(after)?;
        query.prewhere = Some(Box::new(expr));
        rest = after;
    }
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword("where")(after) {
        let (after, _) = ws(after)?;
        let (after, expr) = parse_expression(after)?;
        query.where_expr = Some(Box::new(expr));
        rest = after;
    }

    // GROUP BY
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword2("group", "by")(after) {
        let (after, _) = ws(after)?;
        let (after, exprs) = comma_list1(parse_expression)(after)?;
        query.group_by = exprs;
        rest = after;
    }

    // HAVING
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword("having")(after) {
        let (after, _) = ws(after)?;
        let (after, expr) = parse_expression(after)?;
        query.having = Some(Box::new(expr));
        rest = after;
    }

    // WINDOW name AS (def), ...
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword("window")(after) {
        let (after, _) = ws(after)?;
        let (after, windows) = comma_list1(parse_named_window)(after)?;
        for (name, w) in windows {
            query.window_exprs.insert(name, w);
        }
        rest = after;
    }

    // ORDER BY
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword2("order", "by")(after) {
        let (after, _) = ws(after)?;
        let (after, orders) = comma_list1(parse_order_expr)(after)?;
        query.order_by = orders;
        rest = after;
    }

    // LIMIT [WITH TIES] / OFFSET
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword("limit")(after) {
        let (after, _) = ws(after)?;
        let (after, expr) = parse_expression(after)?;
        query.limit = Some(Box::new(expr));
        rest = after;
        let (after, _) = ws(rest)?;
        if let Ok((after, _)) = keyword2("with", "ties")(after) {
            query.limit_with_ties = true;
            rest = after;
        }
        let (after, _) = ws(rest)?;
        if let Ok((after, _)) = keyword("offset")(after) {
            let (after, _) = ws(after)?;
            let (after, expr) = parse_expression(after)?;
            query.offset = Some(Box::new(expr));
            rest = after;
        }
    }

    // SETTINGS k=v, ...
    let (after, _) = ws(rest)?;
    if let Ok((after, _)) = keyword("settings")(after) {
        let (after, _) = ws(after)?;
        let (after, settings) = parse_settings(after)?;
        query.settings = Some(settings);
        rest = after;
    }

    query.span = span_between(start, rest);
    Ok((rest, query))
}

/// `WITH expr AS name, name AS (SELECT ...), ...`
fn parse_with_clause(input: &str) -> IResult<&str, IndexMap<String, Cte>> {
    let (rest, _) = keyword("with")(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, ctes) = comma_list1(parse_cte)(rest)?;
    let mut map = IndexMap::with_capacity(ctes.len());
    for cte in ctes {
        map.insert(cte.name.clone(), cte);
    }
    Ok((rest, map))
}

fn parse_cte(input: &str) -> IResult<&str, Cte> {
    // Subquery form: name AS (SELECT ...)
    if let Ok((rest, name)) = parse_identifier(input) {
        let parsed: IResult<&str, Expr> = (|| {
            let (rest, _) = ws(rest)?;
            let (rest, _) = keyword("as")(rest)?;
            let (rest, _) = ws(rest)?;
            let (rest, _) = char('(').parse(rest)?;
            let (rest, _) = ws(rest)?;
            let (rest, select) = parse_select_set(rest)?;
            let (rest, _) = ws(rest)?;
            let (rest, _) = char(')').parse(rest)?;
            Ok((rest, select))
        })();
        if let Ok((rest, select)) = parsed {
            return Ok((
                rest,
                Cte {
                    name,
                    expr: Box::new(select),
                    kind: CteKind::Subquery,
                },
            ));
        }
    }
    // Column form: expr AS name
    let (rest, expr) = parse_expression(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = keyword("as")(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, name) = parse_identifier(rest)?;
    Ok((
        rest,
        Cte {
            name,
            expr: Box::new(expr),
            kind: CteKind::Column,
        },
    ))
}

fn parse_from_clause(input: &str) -> IResult<&str, JoinExpr> {
    let (rest, _) = keyword("from")(input)?;
    let (rest, _) = ws(rest)?;
    let (mut rest, mut first) = parse_join_target(rest)?;

    let mut joins: Vec<JoinExpr> = Vec::new();
    loop {
        let checkpoint = rest;
        let (after, _) = ws(rest)?;
        let Some((after, op)) = parse_join_operator(after) else {
            rest = checkpoint;
            break;
        };
        let (after, _) = ws(after)?;
        let (after, mut join) = parse_join_target(after)?;
        join.join_op = Some(op);
        let (after, constraint) = opt(parse_join_constraint).parse(after)?;
        join.constraint = constraint;
        rest = after;
        joins.push(join);
    }

    // Thread the chain in textual order.
    let mut next: Option<Box<JoinExpr>> = None;
    for mut join in joins.into_iter().rev() {
        join.next_join = next;
        next = Some(Box::new(join));
    }
    first.next_join = next;
    Ok((rest, first))
}

fn parse_join_operator(input: &str) -> Option<(&str, JoinOp)> {
    let (rest, op) = if let Ok((rest, _)) = keyword("inner")(input) {
        (rest, JoinOp::Inner)
    } else if let Ok((rest, _)) = keyword("left")(input) {
        let (rest, _) = ws(rest).ok()?;
        let rest = match keyword("outer")(rest) {
            Ok((r, _)) => {
                let (r, _) = ws(r).ok()?;
                r
            }
            Err(_) => rest,
        };
        return keyword("join")(rest).ok().map(|(r, _)| (r, JoinOp::Left));
    } else if let Ok((rest, _)) = keyword("right")(input) {
        let (rest, _) = ws(rest).ok()?;
        let rest = match keyword("outer")(rest) {
            Ok((r, _)) => {
                let (r, _) = ws(r).ok()?;
                r
            }
            Err(_) => rest,
        };
        return keyword("join")(rest).ok().map(|(r, _)| (r, JoinOp::Right));
    } else if let Ok((rest, _)) = keyword("full")(input) {
        let (rest, _) = ws(rest).ok()?;
        let rest = match keyword("outer")(rest) {
            Ok((r, _)) => {
                let (r, _) = ws(r).ok()?;
                r
            }
            Err(_) => rest,
        };
        return keyword("join")(rest).ok().map(|(r, _)| (r, JoinOp::Full));
    } else if let Ok((rest, _)) = keyword("cross")(input) {
        (rest, JoinOp::Cross)
    } else if let Ok((rest, _)) = keyword("join")(input) {
        return Some((rest, JoinOp::Inner));
    } else {
        return None;
    };
    let (after, _) = ws(rest).ok()?;
    keyword("join")(after).ok().map(|(r, _)| (r, op))
}

fn parse_join_target(input: &str) -> IResult<&str, JoinExpr> {
    let start = input;
    // Subquery target.
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('(').parse(input) {
        let (rest, _) = ws(rest)?;
        let (rest, select) = parse_select_set(rest)?;
        let (rest, _) = ws(rest)?;
        let (rest, _) = char(')').parse(rest)?;
        let (rest, alias) = parse_alias(rest)?;
        return Ok((
            rest,
            JoinExpr {
                table: Box::new(select),
                alias,
                join_op: None,
                constraint: None,
                sample: None,
                next_join: None,
                span: span_between(start, rest),
                ty: None,
            },
        ));
    }
    // Table name target.
    let (rest, name) = parse_identifier(input)?;
    let (rest, alias) = parse_alias(rest)?;
    let (rest, sample) = opt(parse_sample).parse(rest)?;
    Ok((
        rest,
        JoinExpr {
            table: Box::new(Expr::Field(Field {
                chain: vec![name],
                span: span_between(start, rest),
                ty: None,
            })),
            alias,
            join_op: None,
            constraint: None,
            sample,
            next_join: None,
            span: span_between(start, rest),
            ty: None,
        },
    ))
}

fn parse_alias(input: &str) -> IResult<&str, Option<String>> {
    let checkpoint = input;
    let (rest, _) = ws(input)?;
    if let Ok((rest, _)) = keyword("as")(rest) {
        let (rest, _) = ws(rest)?;
        let (rest, name) = parse_identifier(rest)?;
        return Ok((rest, Some(name)));
    }
    match parse_identifier(rest) {
        Ok((rest, name)) => Ok((rest, Some(name))),
        Err(_) => Ok((checkpoint, None)),
    }
}

fn parse_join_constraint(input: &str) -> IResult<&str, JoinConstraint> {
    let start = input;
    let (rest, _) = ws(input)?;
    if let Ok((rest, _)) = keyword("on")(rest) {
        let (rest, _) = ws(rest)?;
        let (rest, expr) = parse_expression(rest)?;
        return Ok((
            rest,
            JoinConstraint {
                expr: Box::new(expr),
                kind: ConstraintKind::On,
                span: span_between(start, rest),
            },
        ));
    }
    let (rest, _) = keyword("using")(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = char('(').parse(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, fields) = comma_list1(|i| {
        let (i, name) = parse_identifier(i)?;
        Ok((
            i,
            Expr::Field(Field {
                chain: vec![name],
                span: None,
                ty: None,
            }),
        ))
    })(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = char(')').parse(rest)?;
    let expr = if fields.len() == 1 {
        fields.into_iter().next().expect("single field")
    } else {
        Expr::Tuple(TupleExpr {
            items: fields,
            span: None,
            ty: None,
        })
    };
    Ok((
        rest,
        JoinConstraint {
            expr: Box::new(expr),
            kind: ConstraintKind::Using,
            span: span_between(start, rest),
        },
    ))
}

/// `SAMPLE 0.1`, `SAMPLE 1/10 OFFSET 1/2`.
fn parse_sample(input: &str) -> IResult<&str, SampleExpr> {
    let start = input;
    let (rest, _) = ws(input)?;
    let (rest, _) = keyword("sample")(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, value) = parse_ratio(rest)?;
    let checkpoint = rest;
    let (after, _) = ws(rest)?;
    let (rest, offset) = match keyword("offset")(after) {
        Ok((after, _)) => {
            let (after, _) = ws(after)?;
            let (after, ratio) = parse_ratio(after)?;
            (after, Some(ratio))
        }
        Err(_) => (checkpoint, None),
    };
    Ok((
        rest,
        SampleExpr {
            value,
            offset,
            span: span_between(start, rest),
        },
    ))
}

fn parse_ratio(input: &str) -> IResult<&str, RatioExpr> {
    let start = input;
    let (rest, left) = parse_number(input)?;
    let left = Expr::Constant(ConstantExpr {
        value: left,
        span: None,
        ty: None,
    });
    let checkpoint = rest;
    let (after, _) = ws(rest)?;
    let (rest, right) = match char::<_, nom::error::Error<&str>>('/').parse(after) {
        Ok((after, _)) => {
            let (after, _) = ws(after)?;
            let (after, value) = parse_number(after)?;
            (
                after,
                Some(Box::new(Expr::Constant(ConstantExpr {
                    value,
                    span: None,
                    ty: None,
                }))),
            )
        }
        Err(_) => (checkpoint, None),
    };
    Ok((
        rest,
        RatioExpr {
            left: Box::new(left),
            right,
            span: span_between(start, rest),
        },
    ))
}

fn parse_order_expr(input: &str) -> IResult<&str, OrderExpr> {
    let start = input;
    let (rest, expr) = parse_expression(input)?;
    let checkpoint = rest;
    let (after, _) = ws(rest)?;
    let (rest, order) = if let Ok((after, _)) = keyword("desc")(after) {
        (after, SortOrder::Desc)
    } else if let Ok((after, _)) = keyword("asc")(after) {
        (after, SortOrder::Asc)
    } else {
        (checkpoint, SortOrder::Asc)
    };
    Ok((
        rest,
        OrderExpr {
            expr: Box::new(expr),
            order,
            span: span_between(start, rest),
        },
    ))
}

fn parse_named_window(input: &str) -> IResult<&str, (String, WindowExpr)> {
    let (rest, name) = parse_identifier(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = keyword("as")(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = char('(').parse(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, window) = parse_window_expr(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = char(')').parse(rest)?;
    Ok((rest, (name, window)))
}

/// The inside of an OVER (...) or WINDOW ... AS (...) definition.
pub fn parse_window_expr(input: &str) -> IResult<&str, WindowExpr> {
    let start = input;
    let mut window = WindowExpr {
        partition_by: Vec::new(),
        order_by: Vec::new(),
        frame: None,
        span: None,
    };
    let mut rest = input;
    if let Ok((after, _)) = keyword2("partition", "by")(rest) {
        let (after, _) = ws(after)?;
        let (after, exprs) = comma_list1(parse_expression)(after)?;
        window.partition_by = exprs;
        let (after, _) = ws(after)?;
        rest = after;
    }
    if let Ok((after, _)) = keyword2("order", "by")(rest) {
        let (after, _) = ws(after)?;
        let (after, orders) = comma_list1(parse_order_expr)(after)?;
        window.order_by = orders;
        let (after, _) = ws(after)?;
        rest = after;
    }
    let (after, frame_kind) = if let Ok((after, _)) = keyword("rows")(rest) {
        (after, Some(FrameKind::Rows))
    } else if let Ok((after, _)) = keyword("range")(rest) {
        (after, Some(FrameKind::Range))
    } else {
        (rest, None)
    };
    if let Some(kind) = frame_kind {
        let (after, _) = ws(after)?;
        if let Ok((after, _)) = keyword("between")(after) {
            let (after, _) = ws(after)?;
            let (after, start_bound) = parse_frame_bound(after)?;
            let (after, _) = ws(after)?;
            let (after, _) = keyword("and")(after)?;
            let (after, _) = ws(after)?;
            let (after, end_bound) = parse_frame_bound(after)?;
            window.frame = Some(WindowFrame {
                kind,
                start: start_bound,
                end: Some(end_bound),
            });
            rest = after;
        } else {
            let (after, start_bound) = parse_frame_bound(after)?;
            window.frame = Some(WindowFrame {
                kind,
                start: start_bound,
                end: None,
            });
            rest = after;
        }
    }
    window.span = span_between(start, rest);
    Ok((rest, window))
}

fn parse_frame_bound(input: &str) -> IResult<&str, FrameBound> {
    if let Ok((rest, _)) = keyword2("unbounded", "preceding")(input) {
        return Ok((rest, FrameBound::UnboundedPreceding));
    }
    if let Ok((rest, _)) = keyword2("unbounded", "following")(input) {
        return Ok((rest, FrameBound::UnboundedFollowing));
    }
    if let Ok((rest, _)) = keyword2("current", "row")(input) {
        return Ok((rest, FrameBound::CurrentRow));
    }
    let (rest, n) = parse_number(input)?;
    let Constant::Int(n) = n else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    };
    let (rest, _) = ws(rest)?;
    if let Ok((rest, _)) = keyword("preceding")(rest) {
        return Ok((rest, FrameBound::Preceding(n as u32)));
    }
    let (rest, _) = keyword("following")(rest)?;
    Ok((rest, FrameBound::Following(n as u32)))
}

fn parse_settings(input: &str) -> IResult<&str, QuerySettings> {
    let (rest, pairs) = comma_list1(|i| {
        let (i, key) = parse_identifier(i)?;
        let (i, _) = ws(i)?;
        let (i, _) = char('=').parse(i)?;
        let (i, _) = ws(i)?;
        let start_value = i;
        let (i, value) = crate::parser::grammar::base::parse_literal(i)?;
        Ok((i, (key, value, start_value)))
    })(input)?;

    let mut settings = QuerySettings::default();
    for (key, value, at) in pairs {
        match (key.as_str(), &value) {
            ("readonly", Constant::Int(v)) => settings.readonly = Some(*v as u8),
            ("max_execution_time", Constant::Int(v)) => {
                settings.max_execution_time = Some(*v as u64)
            }
            ("allow_experimental_object_type", Constant::Bool(v)) => {
                settings.allow_experimental_object_type = Some(*v)
            }
            ("allow_experimental_object_type", Constant::Int(v)) => {
                settings.allow_experimental_object_type = Some(*v != 0)
            }
            ("join_algorithm", Constant::Str(v)) => settings.join_algorithm = Some(v.clone()),
            _ => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    at,
                    nom::error::ErrorKind::Tag,
                )))
            }
        }
    }
    Ok((rest, settings))
}
