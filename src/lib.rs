//! Analytics query language compiler.
//!
//! Compiles a user-facing query language into parameterized ClickHouse SQL
//! against a virtual schema of events, persons, sessions and lazily-joined
//! tables. The pipeline is parse -> resolve -> rewrite -> print; see
//! [`compile::Compiler`] for the one-call form.
//!
//! ```ignore
//! use chql::prelude::*;
//!
//! let compiled = Compiler::new(&database)
//!     .compile("SELECT event, count() FROM events GROUP BY event", Dialect::ClickHouse)?;
//! ```

pub mod ast;
pub mod compile;
pub mod context;
pub mod error;
pub mod functions;
pub mod modifiers;
pub mod parser;
pub mod placeholders;
pub mod printer;
pub mod resolver;
pub mod rewrite;
pub mod schema;
pub mod types;

pub use compile::Compiler;
pub use parser::parse_select;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::compile::Compiler;
    pub use crate::context::Context;
    pub use crate::error::{QueryError, QueryResult, Span};
    pub use crate::modifiers::Modifiers;
    pub use crate::parser::{parse_expr, parse_select};
    pub use crate::placeholders::replace_placeholders;
    pub use crate::printer::{print_ast, CompiledSql, Dialect};
    pub use crate::resolver::resolve_types;
    pub use crate::rewrite::{PreaggShape, PreaggTable, PreaggregationProvider};
    pub use crate::schema::{Database, LazyJoin, LazyTable, SchemaTable, TableEntry};
}
