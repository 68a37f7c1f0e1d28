//! Per-compilation state.
//!
//! One [`Context`] is created per compilation and owns the symbol arena.
//! Nothing in it is shared across compilations, so independent compilations
//! can run on separate threads without locking.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::modifiers::Modifiers;
use crate::rewrite::preagg::PreaggregationProvider;
use crate::schema::Database;
use crate::types::{TypeArena, TypeId};

pub struct Context<'a> {
    pub database: &'a Database,
    pub modifiers: Modifiers,
    pub arena: TypeArena,
    /// Caller-supplied readiness source for the preaggregation pass.
    pub preaggregation: Option<Arc<dyn PreaggregationProvider>>,
    /// Fields requested against each lazy table or join symbol, recorded
    /// during resolution and consumed by the lazy materialization pass.
    pub(crate) lazy_accesses: HashMap<TypeId, IndexSet<String>>,
}

impl<'a> Context<'a> {
    pub fn new(database: &'a Database, modifiers: Modifiers) -> Self {
        Context {
            database,
            modifiers,
            arena: TypeArena::new(),
            preaggregation: None,
            lazy_accesses: HashMap::new(),
        }
    }

    pub fn with_preaggregation(mut self, provider: Arc<dyn PreaggregationProvider>) -> Self {
        self.preaggregation = Some(provider);
        self
    }

    pub(crate) fn record_lazy_access(&mut self, table: TypeId, field: &str) {
        self.lazy_accesses
            .entry(table)
            .or_default()
            .insert(field.to_string());
    }

    pub(crate) fn lazy_access_fields(&self, table: TypeId) -> Vec<String> {
        self.lazy_accesses
            .get(&table)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }
}
