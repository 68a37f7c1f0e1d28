//! Placeholder substitution.
//!
//! Named holes (`{interval}`) are replaced with caller-supplied expressions
//! before resolution. A placeholder with no supplied value is an error here;
//! one that sneaks past is an error in the resolver.

use std::collections::HashMap;

use crate::ast::{CloningVisitor, Expr, Placeholder};
use crate::error::{QueryError, QueryResult};

pub fn replace_placeholders(
    expr: &Expr,
    values: &HashMap<String, Expr>,
) -> QueryResult<Expr> {
    struct Replacer<'v> {
        values: &'v HashMap<String, Expr>,
    }

    impl CloningVisitor for Replacer<'_> {
        fn visit_placeholder(&mut self, node: &Placeholder) -> QueryResult<Expr> {
            self.values.get(&node.name).cloned().ok_or_else(|| {
                QueryError::resolution(
                    format!("Placeholder {{{}}} has no value", node.name),
                    node.span,
                )
            })
        }
    }

    Replacer { values }.visit_expr(expr)
}
