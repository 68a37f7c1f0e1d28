//! Pipeline orchestration: parse, substitute placeholders, resolve,
//! rewrite, print.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::Expr;
use crate::context::Context;
use crate::error::QueryResult;
use crate::modifiers::Modifiers;
use crate::parser::parse_select;
use crate::placeholders::replace_placeholders;
use crate::printer::{print_ast, CompiledSql, Dialect};
use crate::resolver::resolve_types;
use crate::rewrite::{rewrite, PreaggregationProvider};
use crate::schema::Database;

/// One compilation unit: a schema snapshot plus the configuration the
/// pipeline consults. Each call to [`compile`](Compiler::compile) builds its
/// own context, so a `Compiler` can be shared across threads.
pub struct Compiler<'a> {
    database: &'a Database,
    modifiers: Modifiers,
    placeholders: HashMap<String, Expr>,
    preaggregation: Option<Arc<dyn PreaggregationProvider>>,
}

impl<'a> Compiler<'a> {
    pub fn new(database: &'a Database) -> Self {
        Compiler {
            database,
            modifiers: Modifiers::default(),
            placeholders: HashMap::new(),
            preaggregation: None,
        }
    }

    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Supply a value for one named placeholder.
    pub fn placeholder(mut self, name: &str, value: Expr) -> Self {
        self.placeholders.insert(name.to_string(), value);
        self
    }

    pub fn preaggregation(mut self, provider: Arc<dyn PreaggregationProvider>) -> Self {
        self.preaggregation = Some(provider);
        self
    }

    /// Compile query text to SQL in the given dialect.
    pub fn compile(&self, query: &str, dialect: Dialect) -> QueryResult<CompiledSql> {
        let parsed = parse_select(query)?;
        self.compile_ast(&parsed, dialect)
    }

    /// Compile a hand-built (or previously parsed) AST.
    pub fn compile_ast(&self, expr: &Expr, dialect: Dialect) -> QueryResult<CompiledSql> {
        let (rewritten, ctx) = self.lower(expr)?;
        print_ast(&rewritten, &ctx, dialect)
    }

    /// Run the pipeline up to and including the rewrite passes, returning
    /// the final AST and its context for callers that keep transforming.
    pub fn lower(&self, expr: &Expr) -> QueryResult<(Expr, Context<'a>)> {
        let substituted = replace_placeholders(expr, &self.placeholders)?;
        let mut ctx = Context::new(self.database, self.modifiers.clone());
        ctx.preaggregation = self.preaggregation.clone();
        let resolved = resolve_types(&substituted, &mut ctx)?;
        let rewritten = rewrite(&resolved, &mut ctx)?;
        Ok((rewritten, ctx))
    }
}
