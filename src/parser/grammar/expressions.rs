//! Expression parsing with precedence:
//! OR < AND < NOT < comparison < additive < multiplicative < unary < primary.

use nom::{
    bytes::complete::tag,
    character::complete::char,
    combinator::opt,
    IResult, Parser,
};

use crate::ast::*;
use crate::parser::grammar::base::{
    comma_list1, keyword, parse_identifier, parse_literal, ws,
};
use crate::parser::grammar::select::{parse_select_set, parse_window_expr};
use crate::parser::span_between;

pub fn parse_expression(input: &str) -> IResult<&str, Expr> {
    parse_or_expr(input)
}

/// An expression with an optional `AS alias` suffix, used in select lists.
pub fn parse_expression_with_alias(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, expr) = parse_expression(input)?;
    let (after_ws, _) = ws(rest)?;
    if let Ok((after_as, _)) = keyword("as")(after_ws) {
        let (after_as, _) = ws(after_as)?;
        let (after_alias, name) = parse_identifier(after_as)?;
        return Ok((
            after_alias,
            Expr::Alias(Alias {
                name,
                expr: Box::new(expr),
                span: span_between(start, after_alias),
                ty: None,
            }),
        ));
    }
    Ok((rest, expr))
}

fn parse_or_expr(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (mut rest, first) = parse_and_expr(input)?;
    let mut exprs = vec![first];
    loop {
        let checkpoint = rest;
        let Ok((after, _)) = ws(rest) else { break };
        match keyword("or")(after) {
            Ok((after, _)) => {
                let (after, _) = ws(after)?;
                let (after, next) = parse_and_expr(after)?;
                exprs.push(next);
                rest = after;
            }
            Err(_) => {
                rest = checkpoint;
                break;
            }
        }
    }
    if exprs.len() == 1 {
        Ok((rest, exprs.pop().expect("single operand")))
    } else {
        Ok((
            rest,
            Expr::Or(Or {
                exprs,
                span: span_between(start, rest),
                ty: None,
            }),
        ))
    }
}

fn parse_and_expr(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (mut rest, first) = parse_not_expr(input)?;
    let mut exprs = vec![first];
    loop {
        let checkpoint = rest;
        let Ok((after, _)) = ws(rest) else { break };
        match keyword("and")(after) {
            Ok((after, _)) => {
                let (after, _) = ws(after)?;
                let (after, next) = parse_not_expr(after)?;
                exprs.push(next);
                rest = after;
            }
            Err(_) => {
                rest = checkpoint;
                break;
            }
        }
    }
    if exprs.len() == 1 {
        Ok((rest, exprs.pop().expect("single operand")))
    } else {
        Ok((
            rest,
            Expr::And(And {
                exprs,
                span: span_between(start, rest),
                ty: None,
            }),
        ))
    }
}

fn parse_not_expr(input: &str) -> IResult<&str, Expr> {
    let start = input;
    if let Ok((after, _)) = keyword("not")(input) {
        let (after, _) = ws(after)?;
        let (after, inner) = parse_not_expr(after)?;
        return Ok((
            after,
            Expr::Not(Not {
                expr: Box::new(inner),
                span: span_between(start, after),
                ty: None,
            }),
        ));
    }
    parse_comparison(input)
}

fn compare_operator(input: &str) -> IResult<&str, CompareOp> {
    // Multi-character operators before their prefixes.
    let symbols: &[(&str, CompareOp)] = &[
        ("<=", CompareOp::LtEq),
        (">=", CompareOp::GtEq),
        ("!=", CompareOp::NotEq),
        ("<>", CompareOp::NotEq),
        ("=~", CompareOp::Regex),
        ("!~", CompareOp::NotRegex),
        ("=", CompareOp::Eq),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];
    for (text, op) in symbols {
        if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>(*text).parse(input) {
            return Ok((rest, *op));
        }
    }
    if let Ok((rest, _)) = keyword("ilike")(input) {
        return Ok((rest, CompareOp::ILike));
    }
    if let Ok((rest, _)) = keyword("like")(input) {
        return Ok((rest, CompareOp::Like));
    }
    if let Ok((rest, _)) = keyword("in")(input) {
        return Ok((rest, CompareOp::In));
    }
    if let Ok((after_not, _)) = keyword("not")(input) {
        let (after_not, _) = ws(after_not)?;
        if let Ok((rest, _)) = keyword("ilike")(after_not) {
            return Ok((rest, CompareOp::NotILike));
        }
        if let Ok((rest, _)) = keyword("like")(after_not) {
            return Ok((rest, CompareOp::NotLike));
        }
        if let Ok((rest, _)) = keyword("in")(after_not) {
            return Ok((rest, CompareOp::NotIn));
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

/// Comparisons are non-associative: `a = b = c` is a parse error downstream.
fn parse_comparison(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, left) = parse_additive(input)?;
    let checkpoint = rest;
    let Ok((after, _)) = ws(rest) else {
        return Ok((rest, left));
    };
    match compare_operator(after) {
        Ok((after, op)) => {
            let (after, _) = ws(after)?;
            let (after, right) = parse_additive(after)?;
            Ok((
                after,
                Expr::Compare(CompareOperation {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span: span_between(start, after),
                    ty: None,
                }),
            ))
        }
        Err(_) => Ok((checkpoint, left)),
    }
}

/// Generic left-associative binary chain parser.
fn parse_binary_chain<'a, F>(
    mut input: &'a str,
    start: &'a str,
    mut left: Expr,
    parse_operand: F,
    operators: &[(&str, ArithmeticOp)],
) -> IResult<&'a str, Expr>
where
    F: Fn(&'a str) -> IResult<&'a str, Expr>,
{
    loop {
        let (remaining, _) = ws(input)?;

        let mut matched = None;
        for (op_str, op_enum) in operators {
            if let Ok((after_op, _)) =
                tag::<_, _, nom::error::Error<&str>>(*op_str).parse(remaining)
            {
                matched = Some((after_op, *op_enum));
                break;
            }
        }

        if let Some((after_op, op)) = matched {
            let (after_ws, _) = ws(after_op)?;
            let (after_right, right) = parse_operand(after_ws)?;
            left = Expr::Arithmetic(ArithmeticOperation {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: span_between(start, after_right),
                ty: None,
            });
            input = after_right;
        } else {
            break;
        }
    }

    Ok((input, left))
}

fn parse_additive(input: &str) -> IResult<&str, Expr> {
    let (rest, left) = parse_multiplicative(input)?;
    parse_binary_chain(
        rest,
        input,
        left,
        parse_multiplicative,
        &[("+", ArithmeticOp::Add), ("-", ArithmeticOp::Sub)],
    )
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expr> {
    let (rest, left) = parse_unary(input)?;
    parse_binary_chain(
        rest,
        input,
        left,
        parse_unary,
        &[
            ("*", ArithmeticOp::Mul),
            ("/", ArithmeticOp::Div),
            ("%", ArithmeticOp::Mod),
        ],
    )
}

fn parse_unary(input: &str) -> IResult<&str, Expr> {
    let start = input;
    if let Ok((after, _)) = char::<_, nom::error::Error<&str>>('-').parse(input) {
        let (after, _) = ws(after)?;
        let (after, inner) = parse_unary(after)?;
        return Ok((
            after,
            Expr::Call(Call {
                name: "negate".to_string(),
                args: vec![inner],
                params: None,
                distinct: false,
                span: span_between(start, after),
                ty: None,
            }),
        ));
    }
    parse_primary(input)
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    if let Ok(result) = parse_interval(input) {
        return Ok(result);
    }
    if let Ok(result) = parse_case(input) {
        return Ok(result);
    }
    if let Ok(result) = parse_lambda(input) {
        return Ok(result);
    }
    if let Ok(result) = parse_placeholder(input) {
        return Ok(result);
    }
    if let Ok(result) = parse_array_literal(input) {
        return Ok(result);
    }
    if let Ok(result) = parse_parenthesized(input) {
        return Ok(result);
    }
    if let Ok(result) = parse_constant(input) {
        return Ok(result);
    }
    if let Ok(result) = parse_call_or_field(input) {
        return Ok(result);
    }
    parse_asterisk(input)
}

fn parse_constant(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, value) = parse_literal(input)?;
    Ok((
        rest,
        Expr::Constant(ConstantExpr {
            value,
            span: span_between(start, rest),
            ty: None,
        }),
    ))
}

fn parse_asterisk(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, _) = char('*').parse(input)?;
    Ok((
        rest,
        Expr::Field(Field {
            chain: vec!["*".to_string()],
            span: span_between(start, rest),
            ty: None,
        }),
    ))
}

/// `INTERVAL 3 DAY` and friends, desugared to the conversion calls.
fn parse_interval(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, _) = keyword("interval")(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, amount) = parse_literal(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, unit) = parse_identifier(rest)?;
    let func = match unit.to_lowercase().as_str() {
        "second" | "seconds" => "toIntervalSecond",
        "minute" | "minutes" => "toIntervalMinute",
        "hour" | "hours" => "toIntervalHour",
        "day" | "days" => "toIntervalDay",
        "week" | "weeks" => "toIntervalWeek",
        "month" | "months" => "toIntervalMonth",
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
    };
    Ok((
        rest,
        Expr::Call(Call {
            name: func.to_string(),
            args: vec![Expr::Constant(ConstantExpr {
                value: amount,
                span: None,
                ty: None,
            })],
            params: None,
            distinct: false,
            span: span_between(start, rest),
            ty: None,
        }),
    ))
}

/// CASE expressions desugar to `if` / `multiIf` calls.
fn parse_case(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, _) = keyword("case")(input)?;
    let (rest, _) = ws(rest)?;
    let (mut rest, operand) = opt(|i| {
        // An operand is present when the next token is not WHEN.
        if keyword("when")(i).is_ok() {
            return Err(nom::Err::Error(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Tag,
            )));
        }
        parse_expression(i)
    })
    .parse(rest)?;

    let mut branches: Vec<(Expr, Expr)> = Vec::new();
    loop {
        let (after, _) = ws(rest)?;
        let Ok((after, _)) = keyword("when")(after) else {
            break;
        };
        let (after, _) = ws(after)?;
        let (after, cond) = parse_expression(after)?;
        let (after, _) = ws(after)?;
        let (after, _) = keyword("then")(after)?;
        let (after, _) = ws(after)?;
        let (after, value) = parse_expression(after)?;
        branches.push((cond, value));
        rest = after;
    }
    if branches.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (rest, _) = ws(rest)?;
    let (rest, else_value) = opt(|i| {
        let (i, _) = keyword("else")(i)?;
        let (i, _) = ws(i)?;
        parse_expression(i)
    })
    .parse(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = keyword("end")(rest)?;

    let wrap_cond = |cond: Expr| match &operand {
        Some(op) => Expr::compare(CompareOp::Eq, op.clone(), cond),
        None => cond,
    };
    let else_expr = else_value.unwrap_or_else(|| Expr::constant(Constant::Null));

    let expr = if branches.len() == 1 {
        let (cond, value) = branches.remove(0);
        Expr::Call(Call {
            name: "if".to_string(),
            args: vec![wrap_cond(cond), value, else_expr],
            params: None,
            distinct: false,
            span: span_between(start, rest),
            ty: None,
        })
    } else {
        let mut args = Vec::with_capacity(branches.len() * 2 + 1);
        for (cond, value) in branches {
            args.push(wrap_cond(cond));
            args.push(value);
        }
        args.push(else_expr);
        Expr::Call(Call {
            name: "multiIf".to_string(),
            args,
            params: None,
            distinct: false,
            span: span_between(start, rest),
            ty: None,
        })
    };
    Ok((rest, expr))
}

fn parse_placeholder(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, _) = char('{').parse(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, name) = parse_identifier(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = char('}').parse(rest)?;
    Ok((
        rest,
        Expr::Placeholder(Placeholder {
            name,
            span: span_between(start, rest),
            ty: None,
        }),
    ))
}

fn parse_array_literal(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, _) = char('[').parse(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, items) = if rest.starts_with(']') {
        (rest, Vec::new())
    } else {
        comma_list1(parse_expression)(rest)?
    };
    let (rest, _) = ws(rest)?;
    let (rest, _) = char(']').parse(rest)?;
    Ok((
        rest,
        Expr::Array(ArrayExpr {
            items,
            span: span_between(start, rest),
            ty: None,
        }),
    ))
}

fn parse_lambda(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, args) = if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('(').parse(input)
    {
        let (rest, _) = ws(rest)?;
        let (rest, args) = comma_list1(|i| parse_identifier(i))(rest)?;
        let (rest, _) = ws(rest)?;
        let (rest, _) = char(')').parse(rest)?;
        (rest, args)
    } else {
        let (rest, arg) = parse_identifier(input)?;
        (rest, vec![arg])
    };
    let (rest, _) = ws(rest)?;
    let (rest, _) = tag("->").parse(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, body) = parse_expression(rest)?;
    Ok((
        rest,
        Expr::Lambda(Lambda {
            args,
            body: Box::new(body),
            span: span_between(start, rest),
            ty: None,
        }),
    ))
}

/// `(subquery)`, `(grouped)` or `(a, b, ...)` tuple.
fn parse_parenthesized(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, _) = char('(').parse(input)?;
    let (rest, _) = ws(rest)?;
    if let Ok((after, select)) = parse_select_set(rest) {
        let (after, _) = ws(after)?;
        let (after, _) = char(')').parse(after)?;
        return Ok((after, select));
    }
    let (rest, mut items) = comma_list1(parse_expression)(rest)?;
    let (rest, _) = ws(rest)?;
    let (rest, _) = char(')').parse(rest)?;
    if items.len() == 1 {
        Ok((rest, items.pop().expect("single item")))
    } else {
        Ok((
            rest,
            Expr::Tuple(TupleExpr {
                items,
                span: span_between(start, rest),
                ty: None,
            }),
        ))
    }
}

/// A name followed by call syntax, a field chain, or both:
/// `count()`, `quantile(0.95)(duration)`, `events.properties.browser`,
/// `row_number() OVER w`.
fn parse_call_or_field(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (rest, name) = parse_identifier(input)?;
    let (after_ws, _) = ws(rest)?;

    if after_ws.starts_with('(') {
        let (rest, first_group) = parse_call_args(after_ws)?;
        let (after_ws2, _) = ws(rest)?;
        // A second argument group means the first one held parameters.
        let (rest, params, args) = if after_ws2.starts_with('(') {
            let (rest, second_group) = parse_call_args(after_ws2)?;
            (rest, Some(first_group.args), second_group)
        } else {
            (rest, None, first_group)
        };

        // Optional OVER clause turns the call into a window function.
        let (after_ws3, _) = ws(rest)?;
        if let Ok((after_over, _)) = keyword("over")(after_ws3) {
            let (after_over, _) = ws(after_over)?;
            let (rest, over) = parse_over_target(after_over)?;
            return Ok((
                rest,
                Expr::Window(WindowFunction {
                    name,
                    args: args.args,
                    over,
                    span: span_between(start, rest),
                    ty: None,
                }),
            ));
        }

        return Ok((
            rest,
            Expr::Call(Call {
                name,
                args: args.args,
                params,
                distinct: args.distinct,
                span: span_between(start, rest),
                ty: None,
            }),
        ));
    }

    // Field chain: ident ('.' (ident | index | '*'))*
    let mut chain = vec![name];
    let mut rest = rest;
    loop {
        let checkpoint = rest;
        let Ok((after, _)) = char::<_, nom::error::Error<&str>>('.').parse(rest) else {
            break;
        };
        if let Ok((after, segment)) = parse_identifier(after) {
            chain.push(segment);
            rest = after;
        } else if let Ok((after, digits)) =
            nom::character::complete::digit1::<_, nom::error::Error<&str>>(after)
        {
            chain.push(digits.to_string());
            rest = after;
        } else if let Ok((after, _)) = char::<_, nom::error::Error<&str>>('*').parse(after) {
            chain.push("*".to_string());
            rest = after;
        } else {
            rest = checkpoint;
            break;
        }
    }
    Ok((
        rest,
        Expr::Field(Field {
            chain,
            span: span_between(start, rest),
            ty: None,
        }),
    ))
}

struct CallArgs {
    args: Vec<Expr>,
    distinct: bool,
}

fn parse_call_args(input: &str) -> IResult<&str, CallArgs> {
    let (rest, _) = char('(').parse(input)?;
    let (rest, _) = ws(rest)?;
    let (rest, distinct) = match keyword("distinct")(rest) {
        Ok((after, _)) => {
            let (after, _) = ws(after)?;
            (after, true)
        }
        Err(_) => (rest, false),
    };
    let (rest, args) = if rest.starts_with(')') {
        (rest, Vec::new())
    } else {
        comma_list1(parse_expression)(rest)?
    };
    let (rest, _) = ws(rest)?;
    let (rest, _) = char(')').parse(rest)?;
    Ok((rest, CallArgs { args, distinct }))
}

fn parse_over_target(input: &str) -> IResult<&str, WindowRef> {
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('(').parse(input) {
        let (rest, _) = ws(rest)?;
        let (rest, window) = parse_window_expr(rest)?;
        let (rest, _) = ws(rest)?;
        let (rest, _) = char(')').parse(rest)?;
        return Ok((rest, WindowRef::Inline(window)));
    }
    let (rest, name) = parse_identifier(input)?;
    Ok((rest, WindowRef::Name(name)))
}
