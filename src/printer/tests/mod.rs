mod dialects;

use crate::printer::{CompiledSql, Dialect};
use crate::schema::{test_database, Database};
use crate::Compiler;

pub(crate) fn compile_ch(sql: &str) -> CompiledSql {
    let db = test_database();
    compile_with(&db, sql, Dialect::ClickHouse)
}

pub(crate) fn compile_readable(sql: &str) -> CompiledSql {
    let db = test_database();
    compile_with(&db, sql, Dialect::Readable)
}

pub(crate) fn compile_with(db: &Database, sql: &str, dialect: Dialect) -> CompiledSql {
    Compiler::new(db).compile(sql, dialect).unwrap()
}
