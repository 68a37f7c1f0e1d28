//! Text front-end for the query language.
//!
//! The grammar lives under [`grammar`]; this module owns the entry points,
//! span bookkeeping, and the conversion of nom failures into positioned
//! [`QueryError::Parse`] values.

pub mod grammar;

#[cfg(test)]
mod tests;

use std::cell::Cell;

use crate::ast::{Expr, SelectQuery};
use crate::error::{QueryError, QueryResult, Span};
use crate::parser::grammar::base::ws;
use crate::parser::grammar::expressions::parse_expression;
use crate::parser::grammar::select::{parse_select_query, parse_select_set};

thread_local! {
    /// Total length of the input being parsed on this thread. Grammar
    /// functions only see suffixes of the input; spans are derived from the
    /// suffix lengths against this total.
    static INPUT_LEN: Cell<usize> = const { Cell::new(0) };
}

/// Byte span between two suffixes of the current input.
pub(crate) fn span_between(before: &str, after: &str) -> Option<Span> {
    let total = INPUT_LEN.with(Cell::get);
    if total == 0 || before.len() > total || after.len() > total {
        return None;
    }
    Some(Span::new(total - before.len(), total - after.len()))
}

fn with_input<T>(input: &str, f: impl FnOnce() -> QueryResult<T>) -> QueryResult<T> {
    INPUT_LEN.with(|cell| cell.set(input.len()));
    let result = f();
    INPUT_LEN.with(|cell| cell.set(0));
    result
}

fn position_of(input: &str, err: nom::Err<nom::error::Error<&str>>) -> (usize, String) {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => (
            input.len() - e.input.len(),
            format!("expected {:?}", e.code),
        ),
        nom::Err::Incomplete(_) => (input.len(), "unexpected end of input".to_string()),
    }
}

fn expect_eof(input: &str, rest: &str) -> QueryResult<()> {
    let (rest, _) = ws(rest).map_err(|e| {
        let (position, message) = position_of(input, e);
        QueryError::parse(position, message)
    })?;
    if rest.is_empty() {
        Ok(())
    } else {
        Err(QueryError::parse(
            input.len() - rest.len(),
            format!("unexpected trailing input: {:?}", truncate(rest)),
        ))
    }
}

fn truncate(s: &str) -> &str {
    let mut end = s.len().min(20);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Parse a full query: a select, or a chain of selects under set operators.
/// Returns `Expr::Select` or `Expr::SelectSet`.
pub fn parse_select(input: &str) -> QueryResult<Expr> {
    with_input(input, || {
        let (rest, _) = ws(input).map_err(|e| {
            let (position, message) = position_of(input, e);
            QueryError::parse(position, message)
        })?;
        let (rest, expr) = parse_select_set(rest).map_err(|e| {
            let (position, message) = position_of(input, e);
            QueryError::parse(position, message)
        })?;
        expect_eof(input, rest)?;
        Ok(expr)
    })
}

/// Parse a single select query without set operators.
pub fn parse_query(input: &str) -> QueryResult<SelectQuery> {
    with_input(input, || {
        let (rest, _) = ws(input).map_err(|e| {
            let (position, message) = position_of(input, e);
            QueryError::parse(position, message)
        })?;
        let (rest, query) = parse_select_query(rest).map_err(|e| {
            let (position, message) = position_of(input, e);
            QueryError::parse(position, message)
        })?;
        expect_eof(input, rest)?;
        Ok(query)
    })
}

/// Parse a standalone expression, e.g. a placeholder value.
pub fn parse_expr(input: &str) -> QueryResult<Expr> {
    with_input(input, || {
        let (rest, _) = ws(input).map_err(|e| {
            let (position, message) = position_of(input, e);
            QueryError::parse(position, message)
        })?;
        let (rest, expr) = parse_expression(rest).map_err(|e| {
            let (position, message) = position_of(input, e);
            QueryError::parse(position, message)
        })?;
        expect_eof(input, rest)?;
        Ok(expr)
    })
}
