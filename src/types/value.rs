//! Value types: what an expression evaluates to.
//!
//! Distinct from the symbol types in [`crate::types::symbol`], which describe
//! what a name is bound to (a field, a table, a scope). Every value type
//! carries a nullability flag; derived accesses such as JSON properties are
//! always nullable regardless of the source field.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Not yet inferrable. Matches every other kind during overload
    /// resolution.
    Unknown,
    Bool,
    Int,
    Float,
    Decimal,
    Str,
    /// A string column holding serialized JSON. Compatible wherever a plain
    /// string is required.
    StrJson,
    /// A string column holding a serialized array. Compatible wherever a
    /// plain string is required.
    StrArray,
    Date,
    DateTime,
    Interval,
    Uuid,
    Array(Box<ValueType>),
    Tuple {
        items: Vec<ValueType>,
        /// A repeating tuple matches any arity whose elements all match the
        /// declared item sequence cyclically.
        repeat: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueType {
    pub kind: ValueKind,
    pub nullable: bool,
}

impl ValueType {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub fn nullable(kind: ValueKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    pub fn unknown() -> Self {
        Self::new(ValueKind::Unknown)
    }

    /// Copy of this type with nullability forced on.
    pub fn as_nullable(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            nullable: true,
        }
    }

    /// Whether this type satisfies a required signature type.
    ///
    /// `Unknown` on either side matches anything; the JSON/array string
    /// subtypes satisfy a plain `Str` requirement; arrays and tuples match
    /// structurally. Nullability never affects matching.
    pub fn matches(&self, required: &ValueType) -> bool {
        self.kind.matches(&required.kind)
    }
}

impl ValueKind {
    fn matches(&self, required: &ValueKind) -> bool {
        match (self, required) {
            (ValueKind::Unknown, _) | (_, ValueKind::Unknown) => true,
            (ValueKind::StrJson | ValueKind::StrArray, ValueKind::Str) => true,
            (ValueKind::Array(a), ValueKind::Array(b)) => a.matches(b),
            (
                ValueKind::Tuple { items: a, .. },
                ValueKind::Tuple {
                    items: b,
                    repeat: true,
                },
            ) => {
                !b.is_empty() && a.iter().enumerate().all(|(i, t)| t.matches(&b[i % b.len()]))
            }
            (ValueKind::Tuple { items: a, .. }, ValueKind::Tuple { items: b, repeat: false }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Unknown => write!(f, "Unknown"),
            ValueKind::Bool => write!(f, "Boolean"),
            ValueKind::Int => write!(f, "Integer"),
            ValueKind::Float => write!(f, "Float"),
            ValueKind::Decimal => write!(f, "Decimal"),
            ValueKind::Str => write!(f, "String"),
            ValueKind::StrJson => write!(f, "JsonString"),
            ValueKind::StrArray => write!(f, "ArrayString"),
            ValueKind::Date => write!(f, "Date"),
            ValueKind::DateTime => write!(f, "DateTime"),
            ValueKind::Interval => write!(f, "Interval"),
            ValueKind::Uuid => write!(f, "UUID"),
            ValueKind::Array(item) => write!(f, "Array({})", item),
            ValueKind::Tuple { items, repeat } => {
                write!(f, "Tuple(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                if *repeat {
                    write!(f, ", ...")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_matches_everything() {
        let unknown = ValueType::unknown();
        let int = ValueType::new(ValueKind::Int);
        assert!(unknown.matches(&int));
        assert!(int.matches(&unknown));
    }

    #[test]
    fn test_string_subtypes_match_string() {
        let json = ValueType::new(ValueKind::StrJson);
        let plain = ValueType::new(ValueKind::Str);
        assert!(json.matches(&plain));
        // Not the other way around.
        assert!(!plain.matches(&json));
    }

    #[test]
    fn test_nullability_does_not_affect_matching() {
        let a = ValueType::nullable(ValueKind::Int);
        let b = ValueType::new(ValueKind::Int);
        assert!(a.matches(&b));
        assert!(b.matches(&a));
    }

    #[test]
    fn test_array_matches_structurally() {
        let ints = ValueType::new(ValueKind::Array(Box::new(ValueType::new(ValueKind::Int))));
        let strs = ValueType::new(ValueKind::Array(Box::new(ValueType::new(ValueKind::Str))));
        let unknowns = ValueType::new(ValueKind::Array(Box::new(ValueType::unknown())));
        assert!(!ints.matches(&strs));
        assert!(ints.matches(&unknowns));
    }

    #[test]
    fn test_repeating_tuple() {
        let pairs = ValueType::new(ValueKind::Tuple {
            items: vec![ValueType::new(ValueKind::Str), ValueType::new(ValueKind::Int)],
            repeat: true,
        });
        let four = ValueType::new(ValueKind::Tuple {
            items: vec![
                ValueType::new(ValueKind::Str),
                ValueType::new(ValueKind::Int),
                ValueType::new(ValueKind::Str),
                ValueType::new(ValueKind::Int),
            ],
            repeat: false,
        });
        assert!(four.matches(&pairs));
    }

    #[test]
    fn test_display() {
        let ty = ValueType::nullable(ValueKind::Array(Box::new(ValueType::new(ValueKind::Str))));
        assert_eq!(ty.to_string(), "Array(String)?");
    }
}
