use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ValueKind, ValueType};

/// A literal value carried by a `Constant` node or attached to function
/// metadata as a printer suffix argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Str(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Array(Vec<Constant>),
    Tuple(Vec<Constant>),
}

impl Constant {
    /// The value type this literal evaluates to. NULL is a nullable Unknown.
    pub fn value_type(&self) -> ValueType {
        match self {
            Constant::Null => ValueType::nullable(ValueKind::Unknown),
            Constant::Bool(_) => ValueType::new(ValueKind::Bool),
            Constant::Int(_) => ValueType::new(ValueKind::Int),
            Constant::Float(_) => ValueType::new(ValueKind::Float),
            Constant::Decimal(_) => ValueType::new(ValueKind::Decimal),
            Constant::Str(_) => ValueType::new(ValueKind::Str),
            Constant::Date(_) => ValueType::new(ValueKind::Date),
            Constant::DateTime(_) => ValueType::new(ValueKind::DateTime),
            Constant::Uuid(_) => ValueType::new(ValueKind::Uuid),
            Constant::Array(items) => {
                let item = items
                    .first()
                    .map(Constant::value_type)
                    .unwrap_or_else(ValueType::unknown);
                ValueType::new(ValueKind::Array(Box::new(item)))
            }
            Constant::Tuple(items) => ValueType::new(ValueKind::Tuple {
                items: items.iter().map(Constant::value_type).collect(),
                repeat: false,
            }),
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Null => write!(f, "NULL"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Float(n) => write!(f, "{}", n),
            Constant::Decimal(d) => write!(f, "{}", d),
            Constant::Str(s) => write!(f, "'{}'", s),
            Constant::Date(d) => write!(f, "'{}'", d),
            Constant::DateTime(dt) => write!(f, "'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            Constant::Uuid(u) => write!(f, "'{}'", u),
            Constant::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Constant::Tuple(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Constant::Bool(b)
    }
}

impl From<i32> for Constant {
    fn from(n: i32) -> Self {
        Constant::Int(n as i64)
    }
}

impl From<i64> for Constant {
    fn from(n: i64) -> Self {
        Constant::Int(n)
    }
}

impl From<f64> for Constant {
    fn from(n: f64) -> Self {
        Constant::Float(n)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::Str(s.to_string())
    }
}

impl From<String> for Constant {
    fn from(s: String) -> Self {
        Constant::Str(s)
    }
}

impl From<Uuid> for Constant {
    fn from(u: Uuid) -> Self {
        Constant::Uuid(u)
    }
}

impl From<Decimal> for Constant {
    fn from(d: Decimal) -> Self {
        Constant::Decimal(d)
    }
}
