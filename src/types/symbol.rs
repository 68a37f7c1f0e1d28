//! Symbol types: what a name is bound to.
//!
//! Scopes and table types live in a [`TypeArena`] owned by the compilation
//! context. AST nodes and other symbols reference them through [`TypeId`]
//! handles, which keeps back-references (a field pointing at its owning
//! table, a property pointing at its field) cycle-free and O(1).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::schema::{Database, FieldOrTable};
use crate::types::value::ValueType;

/// Handle into the [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The scope opened by a select query: exported columns, visible tables,
/// and the enclosing scope for correlated lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeType {
    /// Exported column name -> symbol, unique keys in declaration order.
    pub columns: IndexMap<String, TypeId>,
    /// In-scope table alias -> table-or-select symbol.
    pub tables: IndexMap<String, TypeId>,
    pub parent: Option<TypeId>,
}

impl ScopeType {
    /// The alias a table symbol is registered under. Left inverse of the
    /// `tables` mapping.
    pub fn alias_for_table(&self, id: TypeId) -> Option<&str> {
        self.tables
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolType {
    /// A concrete field of a table or select scope.
    Field { name: String, table: TypeId },
    /// Property access into a field, e.g. `properties.browser.version`.
    /// Always nullable.
    Property { chain: Vec<String>, field: TypeId },
    /// A schema table referenced directly.
    Table { name: String },
    /// A schema table backed by an on-demand select builder.
    LazyTable { name: String },
    /// A joined table reachable through a field of another table; the join
    /// is materialized by a rewrite pass.
    LazyJoin {
        field: String,
        join_table: String,
        from_table: TypeId,
    },
    TableAlias { alias: String, table: TypeId },
    /// A nested table exposed as a field group, with its own field map.
    VirtualTable {
        name: String,
        fields: IndexMap<String, ValueType>,
    },
    SelectQuery(ScopeType),
    SelectSetQuery { selects: Vec<TypeId> },
    SelectQueryAlias { alias: String, select: TypeId },
    /// `*` against a table or select scope.
    Asterisk { source: TypeId },
    /// A partial chain that needs further keys to reach a field.
    FieldTraverser { chain: Vec<String>, table: TypeId },
    /// A schema column defined as an expression over other fields.
    ExpressionField { name: String, table: TypeId },
    /// A function call with its resolved return type.
    Call { name: String, return_type: ValueType },
    /// A literal with its value type.
    Constant { value_type: ValueType },
    LambdaArgument { name: String },
    /// Placeholder symbol recorded just before resolution fails.
    Unresolved { name: String },
}

/// Append-only store for symbol types, owned by the compilation context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeArena {
    nodes: Vec<SymbolType>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, ty: SymbolType) -> TypeId {
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &SymbolType {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut SymbolType {
        &mut self.nodes[id.index()]
    }

    pub fn scope(&self, id: TypeId) -> Option<&ScopeType> {
        match self.get(id) {
            SymbolType::SelectQuery(scope) => Some(scope),
            _ => None,
        }
    }

    pub fn scope_mut(&mut self, id: TypeId) -> Option<&mut ScopeType> {
        match self.get_mut(id) {
            SymbolType::SelectQuery(scope) => Some(scope),
            _ => None,
        }
    }

    /// The value type a symbol evaluates to.
    ///
    /// Table-backed symbols consult the schema; alias symbols forward;
    /// property symbols defer to their owning field and force nullability;
    /// scope symbols and other non-value symbols are `Unknown`.
    pub fn resolve_constant_type(&self, db: &Database, id: TypeId) -> QueryResult<ValueType> {
        match self.get(id) {
            SymbolType::Constant { value_type } => Ok(value_type.clone()),
            SymbolType::Call { return_type, .. } => Ok(return_type.clone()),
            SymbolType::Field { name, table } => self.field_value_type(db, *table, name),
            SymbolType::Property { field, .. } => {
                Ok(self.resolve_constant_type(db, *field)?.as_nullable())
            }
            SymbolType::ExpressionField { .. } => Ok(ValueType::unknown()),
            SymbolType::TableAlias { .. }
            | SymbolType::Table { .. }
            | SymbolType::LazyTable { .. }
            | SymbolType::LazyJoin { .. }
            | SymbolType::VirtualTable { .. }
            | SymbolType::SelectQuery(_)
            | SymbolType::SelectSetQuery { .. }
            | SymbolType::SelectQueryAlias { .. }
            | SymbolType::Asterisk { .. }
            | SymbolType::FieldTraverser { .. }
            | SymbolType::LambdaArgument { .. }
            | SymbolType::Unresolved { .. } => Ok(ValueType::unknown()),
        }
    }

    /// The value type of a named field of a table-like symbol.
    pub fn field_value_type(
        &self,
        db: &Database,
        table: TypeId,
        name: &str,
    ) -> QueryResult<ValueType> {
        match self.get(table) {
            SymbolType::Table { name: table_name } | SymbolType::LazyTable { name: table_name } => {
                let entry = db.get_table(table_name)?;
                match entry.get_field(name) {
                    Some(FieldOrTable::Field(vt)) => Ok(vt.clone()),
                    Some(_) => Ok(ValueType::unknown()),
                    None => Err(QueryError::resolution(
                        format!("Field not found on table {}: {}", table_name, name),
                        None,
                    )),
                }
            }
            SymbolType::LazyJoin { join_table, .. } => {
                let entry = db.get_table(join_table)?;
                match entry.get_field(name) {
                    Some(FieldOrTable::Field(vt)) => Ok(vt.clone()),
                    Some(_) => Ok(ValueType::unknown()),
                    None => Err(QueryError::resolution(
                        format!("Field not found on table {}: {}", join_table, name),
                        None,
                    )),
                }
            }
            SymbolType::VirtualTable { fields, name: vt_name } => {
                fields.get(name).cloned().ok_or_else(|| {
                    QueryError::resolution(
                        format!("Field not found on table {}: {}", vt_name, name),
                        None,
                    )
                })
            }
            SymbolType::TableAlias { table, .. } => self.field_value_type(db, *table, name),
            SymbolType::SelectQueryAlias { select, .. } => {
                self.field_value_type(db, *select, name)
            }
            SymbolType::SelectQuery(scope) => match scope.columns.get(name) {
                Some(col) => self.resolve_constant_type(db, *col),
                None => Err(QueryError::resolution(
                    format!("Column not found in scope: {}", name),
                    None,
                )),
            },
            SymbolType::SelectSetQuery { selects } => match selects.first() {
                Some(first) => self.field_value_type(db, *first, name),
                None => Ok(ValueType::unknown()),
            },
            other => Err(QueryError::internal(format!(
                "field lookup against non-table symbol: {:?}",
                std::mem::discriminant(other)
            ))),
        }
    }

    /// Whether a table-like symbol exposes the named field or nested table.
    pub fn has_child(&self, db: &Database, table: TypeId, name: &str) -> bool {
        match self.get(table) {
            SymbolType::Table { name: t } | SymbolType::LazyTable { name: t } => db
                .get_table(t)
                .map(|entry| entry.has_field(name))
                .unwrap_or(false),
            SymbolType::LazyJoin { join_table, .. } => db
                .get_table(join_table)
                .map(|entry| entry.has_field(name))
                .unwrap_or(false),
            SymbolType::VirtualTable { fields, .. } => fields.contains_key(name),
            SymbolType::TableAlias { table, .. }
            | SymbolType::SelectQueryAlias { select: table, .. } => {
                self.has_child(db, *table, name)
            }
            SymbolType::SelectQuery(scope) => scope.columns.contains_key(name),
            SymbolType::SelectSetQuery { selects } => selects
                .first()
                .map(|s| self.has_child(db, *s, name))
                .unwrap_or(false),
            _ => false,
        }
    }
}
