//! The virtual schema the resolver compiles against.
//!
//! A [`Database`] maps table names to entries. An entry is either a plain
//! [`SchemaTable`] with a fixed field mapping, or a [`LazyTable`] whose
//! backing query is synthesized per usage from the columns actually
//! requested. Individual fields may themselves be lazy joins into other
//! tables, nested virtual tables, or expressions over sibling fields.
//!
//! The schema is built once per compilation unit from external metadata and
//! is read-only for the remainder of the pipeline.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::{Expr, JoinOp, SelectQuery};
use crate::error::{QueryError, QueryResult};
use crate::types::ValueType;

/// Builds the minimal backing query for a lazy table given the fields the
/// surrounding query actually requested.
pub type LazySelectFn = Arc<dyn Fn(&[String]) -> QueryResult<SelectQuery> + Send + Sync>;

/// Builds the ON condition for a lazy join given the aliases of the two
/// sides.
pub type ConstraintFn = Arc<dyn Fn(&str, &str) -> Expr + Send + Sync>;

/// A column defined as an expression over other fields of the same table.
#[derive(Clone)]
pub struct ExpressionField {
    pub expr: Expr,
    /// When set, field lookups inside the expression see only the owning
    /// table, so the surrounding scope's aliases cannot leak in.
    pub isolate_scope: bool,
}

impl std::fmt::Debug for ExpressionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionField")
            .field("isolate_scope", &self.isolate_scope)
            .finish_non_exhaustive()
    }
}

/// A join reachable through a field reference, materialized on demand by the
/// lazy-join rewrite pass.
#[derive(Clone)]
pub struct LazyJoin {
    pub join_table: String,
    pub join_op: JoinOp,
    pub constraint: ConstraintFn,
}

impl LazyJoin {
    /// An equality join `from.<from_field> = to.<to_field>`.
    pub fn on_equal(join_table: &str, from_field: &str, to_field: &str) -> Self {
        let from_field = from_field.to_string();
        let to_field = to_field.to_string();
        LazyJoin {
            join_table: join_table.to_string(),
            join_op: JoinOp::Left,
            constraint: Arc::new(move |from_alias, to_alias| {
                Expr::compare(
                    crate::ast::CompareOp::Eq,
                    Expr::field(&format!("{}.{}", from_alias, from_field)),
                    Expr::field(&format!("{}.{}", to_alias, to_field)),
                )
            }),
        }
    }
}

impl std::fmt::Debug for LazyJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyJoin")
            .field("join_table", &self.join_table)
            .field("join_op", &self.join_op)
            .finish_non_exhaustive()
    }
}

/// One entry in a table's field mapping.
#[derive(Debug, Clone)]
pub enum FieldOrTable {
    Field(ValueType),
    LazyJoin(LazyJoin),
    /// A nested table exposed under a field name, with its own fields.
    VirtualTable {
        name: String,
        fields: IndexMap<String, ValueType>,
    },
    Expression(ExpressionField),
    /// A chain prefix that forwards deeper keys to another part of the
    /// schema.
    Traverser { chain: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    pub fields: IndexMap<String, FieldOrTable>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a plain value field.
    pub fn field(mut self, name: &str, ty: ValueType) -> Self {
        self.fields.insert(name.to_string(), FieldOrTable::Field(ty));
        self
    }

    pub fn lazy_join(mut self, name: &str, join: LazyJoin) -> Self {
        self.fields
            .insert(name.to_string(), FieldOrTable::LazyJoin(join));
        self
    }

    pub fn expression(mut self, name: &str, expr: Expr, isolate_scope: bool) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldOrTable::Expression(ExpressionField {
                expr,
                isolate_scope,
            }),
        );
        self
    }
}

#[derive(Clone)]
pub struct LazyTable {
    pub fields: IndexMap<String, FieldOrTable>,
    pub builder: LazySelectFn,
}

impl std::fmt::Debug for LazyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTable")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum TableEntry {
    Table(SchemaTable),
    Lazy(LazyTable),
}

impl TableEntry {
    pub fn fields(&self) -> &IndexMap<String, FieldOrTable> {
        match self {
            TableEntry::Table(t) => &t.fields,
            TableEntry::Lazy(t) => &t.fields,
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldOrTable> {
        self.fields().get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields().contains_key(name)
    }

    /// The minimal backing query for a lazy table, or `None` for a concrete
    /// table.
    pub fn lazy_select(&self, requested: &[String]) -> Option<QueryResult<SelectQuery>> {
        match self {
            TableEntry::Table(_) => None,
            TableEntry::Lazy(t) => Some((t.builder)(requested)),
        }
    }
}

/// Read-only schema snapshot supplied by the caller for one compilation.
#[derive(Debug, Clone, Default)]
pub struct Database {
    tables: IndexMap<String, TableEntry>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: &str, entry: TableEntry) {
        self.tables.insert(name.to_string(), entry);
    }

    /// Builder form of [`add_table`](Self::add_table).
    pub fn with_table(mut self, name: &str, entry: TableEntry) -> Self {
        self.add_table(name, entry);
        self
    }

    pub fn get_table(&self, name: &str) -> QueryResult<&TableEntry> {
        self.tables.get(name).ok_or_else(|| {
            QueryError::resolution(format!("Unknown table: {}", name), None)
        })
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

#[cfg(test)]
pub use self::testing::test_database;

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::ast::{CompareOp, Expr, JoinExpr};
    use crate::types::ValueKind;

    /// An analytics schema exercising every entry kind: a concrete events
    /// table with a lazy join and a nested virtual table, a persons table,
    /// and a lazy sessions table aggregated from raw events.
    pub fn test_database() -> Database {
        let events = SchemaTable::new()
            .field("uuid", ValueType::new(ValueKind::Uuid))
            .field("event", ValueType::new(ValueKind::Str))
            .field("timestamp", ValueType::new(ValueKind::DateTime))
            .field("distinct_id", ValueType::new(ValueKind::Str))
            .field("session_id", ValueType::new(ValueKind::Str))
            .field("properties", ValueType::new(ValueKind::StrJson))
            .lazy_join(
                "pdi",
                LazyJoin::on_equal("person_distinct_ids", "distinct_id", "distinct_id"),
            )
            .expression(
                "event_date",
                Expr::call("toDate", vec![Expr::field("timestamp")]),
                true,
            );

        let mut events = events;
        events.fields.insert(
            "poe".to_string(),
            FieldOrTable::VirtualTable {
                name: "poe".to_string(),
                fields: IndexMap::from([
                    ("id".to_string(), ValueType::new(ValueKind::Uuid)),
                    (
                        "properties".to_string(),
                        ValueType::new(ValueKind::StrJson),
                    ),
                ]),
            },
        );

        let person_distinct_ids = SchemaTable::new()
            .field("distinct_id", ValueType::new(ValueKind::Str))
            .field("person_id", ValueType::new(ValueKind::Uuid));

        let persons = SchemaTable::new()
            .field("id", ValueType::new(ValueKind::Uuid))
            .field("created_at", ValueType::new(ValueKind::DateTime))
            .field("properties", ValueType::new(ValueKind::StrJson));

        let mut session_fields = IndexMap::new();
        session_fields.insert(
            "session_id".to_string(),
            FieldOrTable::Field(ValueType::new(ValueKind::Str)),
        );
        session_fields.insert(
            "start_time".to_string(),
            FieldOrTable::Field(ValueType::new(ValueKind::DateTime)),
        );
        session_fields.insert(
            "duration".to_string(),
            FieldOrTable::Field(ValueType::new(ValueKind::Int)),
        );

        let sessions = LazyTable {
            fields: session_fields,
            builder: Arc::new(|requested: &[String]| {
                let mut q = SelectQuery::new()
                    .column(Expr::field("session_id"))
                    .from_table("events");
                for field in requested {
                    match field.as_str() {
                        "session_id" => {}
                        "start_time" => {
                            q.select.push(Expr::alias(
                                "start_time",
                                Expr::call("min", vec![Expr::field("timestamp")]),
                            ));
                        }
                        "duration" => {
                            q.select.push(Expr::alias(
                                "duration",
                                Expr::call(
                                    "dateDiff",
                                    vec![
                                        Expr::constant("second"),
                                        Expr::call("min", vec![Expr::field("timestamp")]),
                                        Expr::call("max", vec![Expr::field("timestamp")]),
                                    ],
                                ),
                            ));
                        }
                        other => {
                            return Err(QueryError::resolution(
                                format!("Field not found on table sessions: {}", other),
                                None,
                            ));
                        }
                    }
                }
                q.group_by.push(Expr::field("session_id"));
                Ok(q)
            }),
        };

        Database::new()
            .with_table("events", TableEntry::Table(events))
            .with_table(
                "person_distinct_ids",
                TableEntry::Table(person_distinct_ids),
            )
            .with_table("persons", TableEntry::Table(persons))
            .with_table("sessions", TableEntry::Lazy(sessions))
    }

    #[test]
    fn test_lazy_select_minimality() {
        let db = test_database();
        let sessions = db.get_table("sessions").unwrap();
        let q = sessions
            .lazy_select(&["duration".to_string()])
            .unwrap()
            .unwrap();
        // session_id is the join key, duration was requested; nothing else.
        assert_eq!(q.select.len(), 2);
        assert_eq!(q.group_by.len(), 1);
    }

    #[test]
    fn test_unknown_table_error() {
        let db = test_database();
        let err = db.get_table("nope").unwrap_err();
        assert!(err.to_string().contains("Unknown table"));
    }

    #[test]
    fn test_join_constraint_builder() {
        let join = LazyJoin::on_equal("person_distinct_ids", "distinct_id", "distinct_id");
        let on = (join.constraint)("events", "pdi");
        match on {
            Expr::Compare(cmp) => {
                assert_eq!(cmp.op, CompareOp::Eq);
            }
            other => panic!("expected comparison, got {}", other.kind_name()),
        }
        // A join expr can be assembled from the entry by the rewrite pass.
        let _ = JoinExpr::table(&join.join_table);
    }
}
