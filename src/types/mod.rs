pub mod symbol;
pub mod value;

pub use self::symbol::{ScopeType, SymbolType, TypeArena, TypeId};
pub use self::value::{ValueKind, ValueType};
