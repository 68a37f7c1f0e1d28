//! Scope frames and name-suggestion helpers.

use indexmap::IndexMap;
use strsim::levenshtein;

use crate::ast::Cte;
use crate::types::TypeId;

/// One entry of the resolver's lexical scope stack.
///
/// Select queries and lambda bodies both push a frame; a lambda frame carries
/// its parameters and no tables of its own, so lookups fall through to the
/// enclosing select unless a parameter shadows the name.
#[derive(Debug)]
pub struct ScopeFrame {
    /// The `SymbolType::SelectQuery` scope symbol in the arena.
    pub scope: TypeId,
    /// CTEs visible in this scope, in declaration order.
    pub ctes: IndexMap<String, Cte>,
    /// Column aliases registered by the select list, visible to later
    /// clauses of the same query.
    pub aliases: IndexMap<String, TypeId>,
    /// Lambda parameters when this frame belongs to a lambda body.
    pub lambda_args: IndexMap<String, TypeId>,
    /// Names declared in this query's WINDOW clause.
    pub windows: Vec<String>,
}

impl ScopeFrame {
    pub fn new(scope: TypeId) -> Self {
        ScopeFrame {
            scope,
            ctes: IndexMap::new(),
            aliases: IndexMap::new(),
            lambda_args: IndexMap::new(),
            windows: Vec::new(),
        }
    }
}

/// Best fuzzy match for an unknown name, with a length-scaled distance
/// threshold so short names only match near-exactly.
pub fn did_you_mean<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };
    let mut best: Option<(usize, &str)> = None;
    for cand in candidates {
        let dist = levenshtein(input, cand);
        if dist <= threshold && best.map(|(d, _)| dist < d).unwrap_or(true) {
            best = Some((dist, cand));
        }
    }
    best.map(|(_, name)| name.to_string())
}

/// Render a resolution message with an optional suggestion attached.
pub fn with_suggestion(message: String, suggestion: Option<String>) -> String {
    match suggestion {
        Some(name) => format!("{}. Did you mean '{}'?", message, name),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_did_you_mean_thresholds() {
        let candidates = ["events", "persons", "sessions"];
        assert_eq!(
            did_you_mean("evets", candidates),
            Some("events".to_string())
        );
        assert_eq!(did_you_mean("ev", candidates), None);
        assert_eq!(did_you_mean("zzzzzz", candidates), None);
    }

    #[test]
    fn test_did_you_mean_picks_closest() {
        let candidates = ["timestamp", "timestamps_alt"];
        assert_eq!(
            did_you_mean("timestmap", candidates),
            Some("timestamp".to_string())
        );
    }
}
