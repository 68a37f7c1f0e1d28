//! Declarative function tables for the execution dialect.
//!
//! Grouped roughly by concern. Overload order within an entry is meaningful:
//! resolution picks the first match.

use crate::ast::Constant;
use crate::functions::generics::{GenericFunction, GenericSig, GenericType};
use crate::functions::FunctionMeta;
use crate::types::{ValueKind, ValueType};

fn t(kind: ValueKind) -> ValueType {
    ValueType::new(kind)
}

fn array_of(kind: ValueKind) -> ValueType {
    ValueType::new(ValueKind::Array(Box::new(ValueType::new(kind))))
}

fn f(name: &'static str, min: usize, max: usize) -> FunctionMeta {
    FunctionMeta::new(name, min, Some(max))
}

fn fv(name: &'static str, min: usize) -> FunctionMeta {
    FunctionMeta::new(name, min, None)
}

/// Candidates for the scalar type variables used by the generic families.
fn scalar_candidates() -> Vec<GenericType> {
    vec![
        GenericType::concrete(ValueKind::Int),
        GenericType::concrete(ValueKind::Float),
        GenericType::concrete(ValueKind::Decimal),
        GenericType::concrete(ValueKind::Str),
        GenericType::concrete(ValueKind::Bool),
        GenericType::concrete(ValueKind::Date),
        GenericType::concrete(ValueKind::DateTime),
        GenericType::concrete(ValueKind::Uuid),
    ]
}

/// `if(Bool, T, T) -> T` for every scalar candidate.
fn if_family() -> GenericFunction {
    GenericFunction {
        vars: vec![("T", scalar_candidates())],
        sig: GenericSig {
            args: vec![
                GenericType::concrete(ValueKind::Bool),
                GenericType::Var("T"),
                GenericType::Var("T"),
            ],
            variadic: None,
            ret: GenericType::Var("T"),
        },
    }
}

/// `has(Array(T), T) -> Bool` for every scalar candidate.
fn has_family() -> GenericFunction {
    GenericFunction {
        vars: vec![("T", scalar_candidates())],
        sig: GenericSig {
            args: vec![
                GenericType::Array(Box::new(GenericType::Var("T"))),
                GenericType::Var("T"),
            ],
            variadic: None,
            ret: GenericType::concrete(ValueKind::Bool),
        },
    }
}

pub fn catalogue() -> Vec<FunctionMeta> {
    let mut out = Vec::new();

    // Aggregates. Case-insensitive per SQL convention.
    out.extend([
        FunctionMeta::new("count", 0, Some(1)).aggregate(),
        f("countIf", 1, 2).aggregate(),
        f("min", 1, 1).aggregate(),
        f("max", 1, 1).aggregate(),
        f("sum", 1, 1).aggregate(),
        f("sumIf", 2, 2).aggregate(),
        f("avg", 1, 1).aggregate(),
        f("avgIf", 2, 2).aggregate(),
        f("any", 1, 1).aggregate(),
        f("anyLast", 1, 1).aggregate(),
        f("argMax", 2, 2).aggregate(),
        f("argMin", 2, 2).aggregate(),
        fv("uniq", 1).aggregate(),
        fv("uniqExact", 1).aggregate(),
        f("groupArray", 1, 1).aggregate(),
        f("groupUniqArray", 1, 1).aggregate(),
        f("median", 1, 1).aggregate(),
        f("quantile", 1, 1).aggregate().params(1, Some(1)),
        f("quantiles", 1, 1).aggregate().params(1, None),
        f("stddevPop", 1, 1).aggregate(),
        f("stddevSamp", 1, 1).aggregate(),
        f("varPop", 1, 1).aggregate(),
        f("varSamp", 1, 1).aggregate(),
        f("corr", 2, 2).aggregate(),
        // Merge combinators read preaggregated states.
        f("sumMerge", 1, 1).aggregate(),
        f("avgMerge", 1, 1).aggregate(),
        f("uniqMerge", 1, 1).aggregate(),
        f("countMerge", 1, 1).aggregate(),
    ]);

    // Type conversions.
    out.extend([
        f("toString", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Str)),
        f("toInt", 1, 1)
            .renamed("toInt64")
            .sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("toFloat", 1, 1)
            .renamed("toFloat64")
            .sig(vec![t(ValueKind::Unknown)], t(ValueKind::Float)),
        f("toDecimal", 2, 2)
            .renamed("toDecimal64")
            .sig(
                vec![t(ValueKind::Unknown), t(ValueKind::Int)],
                t(ValueKind::Decimal),
            ),
        f("toBool", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Bool)),
        f("toDate", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Date)),
        f("toDateTime", 1, 2)
            .tz_aware()
            .sig(vec![t(ValueKind::Unknown)], t(ValueKind::DateTime)),
        f("toUUID", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Uuid)),
        f("toJSONString", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Str)),
        f("toNullable", 1, 1),
        f("assumeNotNull", 1, 1),
    ]);

    // Date and time.
    out.extend([
        f("now", 0, 0).tz_aware().sig(vec![], t(ValueKind::DateTime)),
        f("today", 0, 0).tz_aware().sig(vec![], t(ValueKind::Date)),
        f("yesterday", 0, 0).tz_aware().sig(vec![], t(ValueKind::Date)),
        f("toStartOfDay", 1, 1)
            .tz_aware()
            .sig(vec![t(ValueKind::DateTime)], t(ValueKind::DateTime)),
        f("toStartOfHour", 1, 1)
            .tz_aware()
            .sig(vec![t(ValueKind::DateTime)], t(ValueKind::DateTime)),
        f("toStartOfMinute", 1, 1).sig(vec![t(ValueKind::DateTime)], t(ValueKind::DateTime)),
        f("toStartOfWeek", 1, 1)
            .tz_aware()
            .suffix(vec![Constant::Int(0)])
            .sig(vec![t(ValueKind::DateTime)], t(ValueKind::Date)),
        f("toStartOfMonth", 1, 1)
            .tz_aware()
            .sig(vec![t(ValueKind::DateTime)], t(ValueKind::Date)),
        f("toStartOfQuarter", 1, 1)
            .tz_aware()
            .sig(vec![t(ValueKind::DateTime)], t(ValueKind::Date)),
        f("toStartOfYear", 1, 1)
            .tz_aware()
            .sig(vec![t(ValueKind::DateTime)], t(ValueKind::Date)),
        f("toStartOfInterval", 2, 2).sig(
            vec![t(ValueKind::DateTime), t(ValueKind::Interval)],
            t(ValueKind::DateTime),
        ),
        f("toTimeZone", 2, 2).sig(
            vec![t(ValueKind::DateTime), t(ValueKind::Str)],
            t(ValueKind::DateTime),
        ),
        f("toYear", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("toMonth", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("toDayOfMonth", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("toDayOfWeek", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("toHour", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("toYYYYMM", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("toUnixTimestamp", 1, 2).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Int)),
        f("fromUnixTimestamp", 1, 1).sig(vec![t(ValueKind::Int)], t(ValueKind::DateTime)),
        f("dateDiff", 3, 3).sig(
            vec![
                t(ValueKind::Str),
                t(ValueKind::Unknown),
                t(ValueKind::Unknown),
            ],
            t(ValueKind::Int),
        ),
        f("dateAdd", 2, 2),
        f("dateSub", 2, 2),
        f("dateTrunc", 2, 2).sig(
            vec![t(ValueKind::Str), t(ValueKind::DateTime)],
            t(ValueKind::DateTime),
        ),
        f("addDays", 2, 2),
        f("addHours", 2, 2),
        f("subtractDays", 2, 2),
        f("subtractHours", 2, 2),
        f("formatDateTime", 2, 3).sig(
            vec![t(ValueKind::DateTime), t(ValueKind::Str)],
            t(ValueKind::Str),
        ),
        f("toIntervalSecond", 1, 1).sig(vec![t(ValueKind::Int)], t(ValueKind::Interval)),
        f("toIntervalMinute", 1, 1).sig(vec![t(ValueKind::Int)], t(ValueKind::Interval)),
        f("toIntervalHour", 1, 1).sig(vec![t(ValueKind::Int)], t(ValueKind::Interval)),
        f("toIntervalDay", 1, 1).sig(vec![t(ValueKind::Int)], t(ValueKind::Interval)),
        f("toIntervalWeek", 1, 1).sig(vec![t(ValueKind::Int)], t(ValueKind::Interval)),
        f("toIntervalMonth", 1, 1).sig(vec![t(ValueKind::Int)], t(ValueKind::Interval)),
    ]);

    // Math.
    out.extend([
        f("negate", 1, 1),
        f("abs", 1, 1),
        f("round", 1, 2),
        f("floor", 1, 2),
        f("ceil", 1, 2),
        f("trunc", 1, 2),
        f("exp", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Float)),
        f("log", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Float)),
        f("log2", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Float)),
        f("log10", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Float)),
        f("sqrt", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Float)),
        f("pow", 2, 2).sig(
            vec![t(ValueKind::Unknown), t(ValueKind::Unknown)],
            t(ValueKind::Float),
        ),
        f("intDiv", 2, 2).sig(
            vec![t(ValueKind::Unknown), t(ValueKind::Unknown)],
            t(ValueKind::Int),
        ),
        fv("greatest", 1),
        fv("least", 1),
        f("e", 0, 0).sig(vec![], t(ValueKind::Float)),
        f("pi", 0, 0).sig(vec![], t(ValueKind::Float)),
    ]);

    // Strings.
    out.extend([
        f("length", 1, 1)
            .sig(vec![t(ValueKind::Str)], t(ValueKind::Int))
            .sig(
                vec![t(ValueKind::Array(Box::new(ValueType::unknown())))],
                t(ValueKind::Int),
            ),
        f("lower", 1, 1).sig(vec![t(ValueKind::Str)], t(ValueKind::Str)),
        f("upper", 1, 1).sig(vec![t(ValueKind::Str)], t(ValueKind::Str)),
        f("trim", 1, 2).template("trim(BOTH {1} FROM {0})"),
        f("trimLeft", 1, 1).sig(vec![t(ValueKind::Str)], t(ValueKind::Str)),
        f("trimRight", 1, 1).sig(vec![t(ValueKind::Str)], t(ValueKind::Str)),
        fv("concat", 1)
            .case_insensitive()
            .variadic_sig(vec![], t(ValueKind::Str), t(ValueKind::Str)),
        f("substring", 2, 3).sig(
            vec![t(ValueKind::Str), t(ValueKind::Int), t(ValueKind::Int)],
            t(ValueKind::Str),
        ),
        f("position", 2, 2).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Int),
        ),
        f("replaceAll", 3, 3).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Str),
        ),
        f("replaceOne", 3, 3).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Str),
        ),
        f("splitByChar", 2, 3).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str)],
            array_of(ValueKind::Str),
        ),
        f("splitByString", 2, 3).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str)],
            array_of(ValueKind::Str),
        ),
        f("startsWith", 2, 2).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Bool),
        ),
        f("endsWith", 2, 2).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Bool),
        ),
        f("match", 2, 2).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Bool),
        ),
        f("extract", 2, 2).sig(
            vec![t(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Str),
        ),
        f("repeat", 2, 2).sig(
            vec![t(ValueKind::Str), t(ValueKind::Int)],
            t(ValueKind::Str),
        ),
        f("leftPad", 2, 3).renamed("lpad"),
        f("rightPad", 2, 3).renamed("rpad"),
        f("empty", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Bool)),
        f("notEmpty", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Bool)),
    ]);

    // JSON. Extraction results are nullable by nature.
    out.extend([
        fv("JSONExtractRaw", 1).sig(
            vec![t(ValueKind::Str)],
            ValueType::nullable(ValueKind::Str),
        ),
        fv("JSONExtractString", 1),
        fv("JSONExtractInt", 1),
        fv("JSONExtractFloat", 1),
        fv("JSONExtractBool", 1),
        fv("JSONHas", 1),
        fv("JSONLength", 1),
        f("isValidJSON", 1, 1).sig(vec![t(ValueKind::Str)], t(ValueKind::Bool)),
    ]);

    // Arrays and lambdas.
    out.extend([
        fv("array", 0),
        fv("arrayMap", 2),
        fv("arrayFilter", 2),
        fv("arrayExists", 2),
        fv("arrayCount", 1),
        f("arrayDistinct", 1, 1),
        f("arraySort", 1, 2),
        f("arrayReverse", 1, 1),
        fv("arrayConcat", 1),
        f("arrayElement", 2, 2),
        f("arraySlice", 2, 3),
        f("arrayStringConcat", 1, 2).sig(
            vec![array_of(ValueKind::Str), t(ValueKind::Str)],
            t(ValueKind::Str),
        ),
        f("arraySum", 1, 1),
        f("arrayAvg", 1, 1),
        f("arrayMin", 1, 1),
        f("arrayMax", 1, 1),
        f("arrayJoin", 1, 1),
        f("has", 2, 2).generic(has_family()),
        f("indexOf", 2, 2).sig(
            vec![
                t(ValueKind::Array(Box::new(ValueType::unknown()))),
                t(ValueKind::Unknown),
            ],
            t(ValueKind::Int),
        ),
        f("range", 1, 3).sig(vec![t(ValueKind::Int)], array_of(ValueKind::Int)),
        fv("tuple", 0),
    ]);

    // Conditionals and null handling.
    out.extend([
        f("if", 3, 3).case_insensitive().generic(if_family()),
        fv("multiIf", 3),
        fv("coalesce", 1).case_insensitive(),
        f("ifNull", 2, 2),
        f("nullIf", 2, 2).case_insensitive(),
        f("isNull", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Bool)),
        f("isNotNull", 1, 1).sig(vec![t(ValueKind::Unknown)], t(ValueKind::Bool)),
    ]);

    // Window functions; printed with their OVER clause by the printer.
    out.extend([
        f("row_number", 0, 0),
        f("rank", 0, 0),
        f("dense_rank", 0, 0),
        f("lag", 1, 3).renamed("lagInFrame"),
        f("lead", 1, 3).renamed("leadInFrame"),
        f("first_value", 1, 1),
        f("last_value", 1, 1),
    ]);

    // Misc.
    out.extend([
        f("generateUUIDv4", 0, 0).sig(vec![], t(ValueKind::Uuid)),
        f("toUUIDOrNull", 1, 1).sig(
            vec![t(ValueKind::Str)],
            ValueType::nullable(ValueKind::Uuid),
        ),
    ]);

    out
}
