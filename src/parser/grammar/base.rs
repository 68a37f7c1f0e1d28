//! Shared low-level parsers: whitespace, identifiers, keywords, literals.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{map, opt, recognize},
    IResult, Parser,
};

use crate::ast::Constant;

/// Whitespace and `--` line comments.
pub fn ws(input: &str) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        let (after, skipped) = opt(multispace1).parse(rest)?;
        let mut progressed = skipped.is_some();
        rest = after;
        if let Ok((after, _)) = tag::<_, _, nom::error::Error<&str>>("--").parse(rest) {
            let (after, _) = take_while(|c| c != '\n').parse(after)?;
            rest = after;
            progressed = true;
        } else if let Ok((after, _)) = tag::<_, _, nom::error::Error<&str>>("/*").parse(rest) {
            let (after, _) = take_until("*/").parse(after)?;
            let (after, _) = tag("*/").parse(after)?;
            rest = after;
            progressed = true;
        }
        if !progressed {
            return Ok((rest, ()));
        }
    }
}

/// Case-insensitive keyword with a word boundary on the right.
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (rest, matched) = tag_no_case(word).parse(input)?;
        if rest
            .chars()
            .next()
            .map(|c| c.is_alphanumeric() || c == '_')
            .unwrap_or(false)
        {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        Ok((rest, matched))
    }
}

/// Two keywords separated by whitespace, e.g. `ORDER BY`.
pub fn keyword2<'a>(
    first: &'static str,
    second: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    move |input: &'a str| {
        let (input, _) = keyword(first)(input)?;
        let (input, _) = ws(input)?;
        let (input, _) = keyword(second)(input)?;
        Ok((input, ()))
    }
}

const RESERVED: &[&str] = &[
    "select", "from", "where", "prewhere", "group", "having", "order", "limit", "offset", "with",
    "as", "join", "inner", "left", "right", "full", "cross", "on", "using", "and", "or", "not",
    "union", "intersect", "except", "distinct", "by", "asc", "desc", "settings", "sample",
    "window", "case", "when", "then", "else", "end", "in", "like", "ilike", "interval", "ties",
];

/// A bare identifier (not a reserved word) or a backquoted one.
pub fn parse_identifier(input: &str) -> IResult<&str, String> {
    if let Ok((rest, quoted)) = quoted_identifier(input) {
        return Ok((rest, quoted));
    }
    let (rest, word) = recognize((
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)?;
    if RESERVED.contains(&word.to_lowercase().as_str()) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    Ok((rest, word.to_string()))
}

fn quoted_identifier(input: &str) -> IResult<&str, String> {
    let (input, _) = char('`').parse(input)?;
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Escaped,
                    )))
                }
            },
            '`' => return Ok((&input[i + 1..], out)),
            other => out.push(other),
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

/// Single-quoted string with backslash escapes.
pub fn parse_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('\'').parse(input)?;
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Escaped,
                    )))
                }
            },
            '\'' => return Ok((&input[i + 1..], out)),
            other => out.push(other),
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

/// Integer or float literal. The sign is handled at the expression level.
pub fn parse_number(input: &str) -> IResult<&str, Constant> {
    let (rest, text) = recognize((
        digit1,
        opt((char('.'), digit1)),
        opt((alt((char('e'), char('E'))), opt(alt((char('+'), char('-')))), digit1)),
    ))
    .parse(input)?;
    if text.contains('.') || text.contains('e') || text.contains('E') {
        match text.parse::<f64>() {
            Ok(v) => Ok((rest, Constant::Float(v))),
            Err(_) => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Float,
            ))),
        }
    } else {
        match text.parse::<i64>() {
            Ok(v) => Ok((rest, Constant::Int(v))),
            Err(_) => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            ))),
        }
    }
}

/// `true`, `false`, `null`, numbers, strings.
pub fn parse_literal(input: &str) -> IResult<&str, Constant> {
    alt((
        map(keyword("true"), |_| Constant::Bool(true)),
        map(keyword("false"), |_| Constant::Bool(false)),
        map(keyword("null"), |_| Constant::Null),
        parse_number,
        map(parse_string, Constant::Str),
    ))
    .parse(input)
}

/// A comma surrounded by optional whitespace.
pub fn comma(input: &str) -> IResult<&str, ()> {
    let (input, _) = ws(input)?;
    let (input, _) = char(',').parse(input)?;
    let (input, _) = ws(input)?;
    Ok((input, ()))
}

/// Comma-separated list of at least one item.
pub fn comma_list1<'a, T>(
    mut item: impl FnMut(&'a str) -> IResult<&'a str, T>,
) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<T>> {
    move |input: &'a str| {
        let (mut rest, first) = item(input)?;
        let mut out = vec![first];
        loop {
            let checkpoint = rest;
            match comma(rest) {
                Ok((after, _)) => match item(after) {
                    Ok((after, next)) => {
                        out.push(next);
                        rest = after;
                    }
                    Err(_) => return Ok((checkpoint, out)),
                },
                Err(_) => return Ok((checkpoint, out)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_skips_comments() {
        let (rest, _) = ws("  -- a comment\n  /* block */ x").unwrap();
        assert_eq!(rest, "x");
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("select")("selectx").is_err());
        assert!(keyword("select")("SELECT 1").is_ok());
    }

    #[test]
    fn test_identifier_rejects_reserved() {
        assert!(parse_identifier("from").is_err());
        assert_eq!(parse_identifier("events rest").unwrap().1, "events");
        assert_eq!(parse_identifier("`from`").unwrap().1, "from");
        assert_eq!(parse_identifier("`a\\`b`").unwrap().1, "a`b");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(parse_string("'it\\'s'").unwrap().1, "it's");
        assert_eq!(parse_string("'a\\nb'").unwrap().1, "a\nb");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_number("42 ").unwrap().1, Constant::Int(42));
        assert_eq!(parse_number("4.5").unwrap().1, Constant::Float(4.5));
        assert_eq!(parse_number("1e3").unwrap().1, Constant::Float(1000.0));
    }
}
