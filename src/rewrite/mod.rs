//! Resolved-AST-to-resolved-AST rewrites, applied in a fixed order. Each
//! pass is idempotent on its own output.

pub mod asterisk;
pub mod lazy;
pub mod preagg;

use crate::ast::Expr;
use crate::context::Context;
use crate::error::QueryResult;

pub use self::asterisk::expand_asterisks;
pub use self::lazy::materialize_lazy_tables;
pub use self::preagg::{
    substitute_preaggregated, AggregateKind, PreaggShape, PreaggTable, PreaggregationProvider,
    TimeBucket,
};

/// Run the standard pass pipeline: wildcard expansion, lazy
/// materialization, preaggregation substitution.
pub fn rewrite(expr: &Expr, ctx: &mut Context) -> QueryResult<Expr> {
    let expr = expand_asterisks(expr, ctx)?;
    let expr = materialize_lazy_tables(&expr, ctx)?;
    substitute_preaggregated(&expr, ctx)
}
