//! Dialect-specific emission: renames, templates, timezone and suffix
//! arguments, escaping, regex forms, and the preaggregation fail-open
//! guarantee.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use super::{compile_ch, compile_readable};
use crate::modifiers::Modifiers;
use crate::printer::Dialect;
use crate::rewrite::preagg::{PreaggShape, PreaggTable, PreaggregationProvider};
use crate::schema::test_database;
use crate::Compiler;

#[test]
fn test_function_rename() {
    let compiled = compile_ch("SELECT toInt(event) FROM events");
    assert_eq!(compiled.sql, "SELECT toInt64(events.event) FROM events");
    // The readable dialect keeps the source-level name.
    let readable = compile_readable("SELECT toInt(event) FROM events");
    assert_eq!(readable.sql, "SELECT toInt(event) FROM events");
}

#[test]
fn test_print_template() {
    let compiled = compile_ch("SELECT trim(event, 'x') FROM events");
    assert_eq!(
        compiled.sql,
        "SELECT trim(BOTH {p0} FROM events.event) FROM events"
    );
}

#[test]
fn test_template_falls_back_when_argument_missing() {
    let compiled = compile_ch("SELECT trim(event) FROM events");
    assert_eq!(compiled.sql, "SELECT trim(events.event) FROM events");
}

#[test]
fn test_timezone_appended_to_tz_aware_functions() {
    let compiled = compile_ch("SELECT toStartOfDay(timestamp) FROM events");
    assert_eq!(
        compiled.sql,
        "SELECT toStartOfDay(events.timestamp, 'UTC') FROM events"
    );

    let db = test_database();
    let compiled = Compiler::new(&db)
        .modifiers(Modifiers {
            timezone: "Europe/Berlin".to_string(),
            ..Default::default()
        })
        .compile("SELECT toStartOfDay(timestamp) FROM events", Dialect::ClickHouse)
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT toStartOfDay(events.timestamp, 'Europe/Berlin') FROM events"
    );
}

#[test]
fn test_suffix_args_before_timezone() {
    let compiled = compile_ch("SELECT toStartOfWeek(timestamp) FROM events");
    assert_eq!(
        compiled.sql,
        "SELECT toStartOfWeek(events.timestamp, 0, 'UTC') FROM events"
    );
}

#[test]
fn test_timezone_not_appended_in_readable() {
    let readable = compile_readable("SELECT toStartOfDay(timestamp) FROM events");
    assert_eq!(readable.sql, "SELECT toStartOfDay(timestamp) FROM events");
}

#[test]
fn test_regex_forms_differ_by_dialect() {
    let ch = compile_ch("SELECT event FROM events WHERE event =~ 'sign.*'");
    assert_eq!(
        ch.sql,
        "SELECT events.event FROM events WHERE match(events.event, {p0})"
    );
    let readable = compile_readable("SELECT event FROM events WHERE event =~ 'sign.*'");
    assert_eq!(
        readable.sql,
        "SELECT event FROM events WHERE event =~ 'sign.*'"
    );

    let negated = compile_ch("SELECT event FROM events WHERE event !~ 'sign.*'");
    assert!(negated.sql.contains("NOT match(events.event, {p0})"));
}

#[test]
fn test_identifier_escaping() {
    let compiled = compile_ch("SELECT `event` AS `my alias` FROM events");
    assert_eq!(
        compiled.sql,
        "SELECT events.event AS `my alias` FROM events"
    );
}

#[test]
fn test_string_escaping_in_parameters() {
    // The quote never reaches the SQL text; it stays in the value table.
    let compiled = compile_ch("SELECT event FROM events WHERE event = 'a\\'b'");
    assert!(!compiled.sql.contains("a'b"));
    assert_eq!(
        compiled.params["p0"],
        crate::ast::Constant::Str("a'b".to_string())
    );
}

#[test]
fn test_string_escaping_inline_readable() {
    let compiled = compile_readable("SELECT event FROM events WHERE event = 'a\\'b'");
    assert!(compiled.sql.contains("'a\\'b'"));
}

struct NeverReady;

impl PreaggregationProvider for NeverReady {
    fn lookup(&self, _shape: &PreaggShape) -> Option<PreaggTable> {
        None
    }
}

#[test]
fn test_preaggregation_fail_open_byte_identical() {
    let sql = "SELECT toStartOfDay(timestamp) AS day, count() FROM events \
         WHERE event = 'pageview' AND timestamp >= '2026-01-01' AND timestamp < '2026-02-01' \
         GROUP BY toStartOfDay(timestamp)";
    let db = test_database();

    let without_pass = Compiler::new(&db)
        .compile(sql, Dialect::ClickHouse)
        .unwrap();
    let with_unready = Compiler::new(&db)
        .modifiers(Modifiers {
            use_preaggregated_tables: true,
            ..Default::default()
        })
        .preaggregation(Arc::new(NeverReady))
        .compile(sql, Dialect::ClickHouse)
        .unwrap();

    assert_eq!(without_pass.sql, with_unready.sql);
    assert_eq!(without_pass.params, with_unready.params);
}

#[test]
fn test_interval_sql() {
    let compiled = compile_ch("SELECT timestamp + interval 7 day FROM events");
    assert_eq!(
        compiled.sql,
        "SELECT (events.timestamp + toIntervalDay(7)) FROM events"
    );
}

#[test]
fn test_in_tuple_sql() {
    let compiled = compile_ch("SELECT event FROM events WHERE event IN ('a', 'b')");
    assert_eq!(
        compiled.sql,
        "SELECT events.event FROM events WHERE events.event IN ({p0}, {p1})"
    );
}
