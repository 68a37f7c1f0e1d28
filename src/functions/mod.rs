//! The function catalogue: callable names, arity bounds, typed overloads,
//! and printer metadata.
//!
//! The registry is built once at first use from the declarative tables in
//! [`clickhouse`] and never mutated afterwards. Declaration order of
//! overloads is a tie-break policy: the first matching signature wins.

pub mod clickhouse;
pub mod generics;

use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::ast::Constant;
use crate::error::{QueryError, QueryResult, Span};
use crate::functions::generics::GenericFunction;
use crate::types::ValueType;

/// One concrete overload: fixed argument types, optional variadic tail,
/// return type.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub arg_types: Vec<ValueType>,
    pub variadic: Option<ValueType>,
    pub return_type: ValueType,
}

#[derive(Debug, Clone)]
pub struct FunctionMeta {
    pub name: &'static str,
    /// Emitted name in the execution dialect when it differs from `name`.
    pub clickhouse_name: Option<&'static str>,
    /// Positional print template, e.g. `trim(BOTH {1} FROM {0})`. Takes
    /// precedence over plain name emission.
    pub template: Option<&'static str>,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub min_params: usize,
    pub max_params: Option<usize>,
    pub signatures: Vec<Signature>,
    pub generic_sigs: Vec<GenericFunction>,
    pub aggregate: bool,
    /// The printer appends the query timezone as a trailing argument.
    pub tz_aware: bool,
    pub case_sensitive: bool,
    /// Constant arguments the printer appends after the user's arguments.
    pub suffix_args: Vec<Constant>,
}

impl FunctionMeta {
    pub fn new(name: &'static str, min_args: usize, max_args: Option<usize>) -> Self {
        FunctionMeta {
            name,
            clickhouse_name: None,
            template: None,
            min_args,
            max_args,
            min_params: 0,
            max_params: Some(0),
            signatures: Vec::new(),
            generic_sigs: Vec::new(),
            aggregate: false,
            tz_aware: false,
            case_sensitive: true,
            suffix_args: Vec::new(),
        }
    }

    pub fn aggregate(mut self) -> Self {
        self.aggregate = true;
        self.case_sensitive = false;
        self
    }

    pub fn params(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_params = min;
        self.max_params = max;
        self
    }

    pub fn tz_aware(mut self) -> Self {
        self.tz_aware = true;
        self
    }

    pub fn renamed(mut self, clickhouse_name: &'static str) -> Self {
        self.clickhouse_name = Some(clickhouse_name);
        self
    }

    pub fn template(mut self, template: &'static str) -> Self {
        self.template = Some(template);
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn suffix(mut self, args: Vec<Constant>) -> Self {
        self.suffix_args = args;
        self
    }

    pub fn sig(mut self, arg_types: Vec<ValueType>, return_type: ValueType) -> Self {
        self.signatures.push(Signature {
            arg_types,
            variadic: None,
            return_type,
        });
        self
    }

    pub fn variadic_sig(
        mut self,
        arg_types: Vec<ValueType>,
        variadic: ValueType,
        return_type: ValueType,
    ) -> Self {
        self.signatures.push(Signature {
            arg_types,
            variadic: Some(variadic),
            return_type,
        });
        self
    }

    pub fn generic(mut self, family: GenericFunction) -> Self {
        self.generic_sigs.push(family);
        self
    }

    /// The name to emit in the execution dialect.
    pub fn printed_name(&self) -> &'static str {
        self.clickhouse_name.unwrap_or(self.name)
    }
}

/// Immutable, process-wide function catalogue.
#[derive(Debug)]
pub struct FunctionRegistry {
    functions: IndexMap<&'static str, FunctionMeta>,
    /// lowercase name -> declared name, for case-insensitive functions.
    insensitive: HashMap<String, &'static str>,
}

impl FunctionRegistry {
    /// Build the registry, expanding generic families and validating the
    /// final overload lists. Errors here are startup-blocking.
    pub fn build(entries: Vec<FunctionMeta>) -> QueryResult<Self> {
        let mut functions: IndexMap<&'static str, FunctionMeta> = IndexMap::new();
        let mut insensitive = HashMap::new();
        for mut meta in entries {
            for family in std::mem::take(&mut meta.generic_sigs) {
                meta.signatures.extend(family.expand()?);
            }
            validate_signatures(meta.name, &meta.signatures)?;
            if !meta.case_sensitive {
                insensitive.insert(meta.name.to_lowercase(), meta.name);
            }
            let name = meta.name;
            if functions.insert(name, meta).is_some() {
                return Err(QueryError::Generics(format!(
                    "function registered twice: {}",
                    name
                )));
            }
        }
        Ok(FunctionRegistry {
            functions,
            insensitive,
        })
    }

    pub fn get(&self, name: &str) -> Option<&FunctionMeta> {
        if let Some(meta) = self.functions.get(name) {
            return Some(meta);
        }
        self.insensitive
            .get(&name.to_lowercase())
            .and_then(|declared| self.functions.get(declared))
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.get(name).map(|m| m.aggregate).unwrap_or(false)
    }

    /// All declared function names, for suggestion messages.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Validate argument and parameter counts. Arity errors are distinct
    /// from type errors and phrase the expectation precisely.
    pub fn check_arity(
        &self,
        meta: &FunctionMeta,
        args: usize,
        params: usize,
        span: Option<Span>,
    ) -> QueryResult<()> {
        if let Some(msg) =
            arity_violation(meta.name, "argument", meta.min_args, meta.max_args, args)
        {
            return Err(QueryError::arity(msg, span));
        }
        if let Some(msg) = arity_violation(
            meta.name,
            "parameter",
            meta.min_params,
            meta.max_params,
            params,
        ) {
            return Err(QueryError::arity(msg, span));
        }
        Ok(())
    }

    /// Select the first declared signature compatible with the argument
    /// types. Functions with no typed signatures accept anything and return
    /// Unknown.
    pub fn find_signature(
        &self,
        meta: &FunctionMeta,
        arg_types: &[ValueType],
        span: Option<Span>,
    ) -> QueryResult<ValueType> {
        if meta.signatures.is_empty() {
            return Ok(ValueType::unknown());
        }
        for sig in &meta.signatures {
            if signature_matches(sig, arg_types) {
                return Ok(sig.return_type.clone());
            }
        }
        let got = arg_types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(QueryError::overload(
            format!(
                "Function '{}' has no signature matching argument types ({})",
                meta.name, got
            ),
            span,
        ))
    }
}

fn signature_matches(sig: &Signature, arg_types: &[ValueType]) -> bool {
    match &sig.variadic {
        None => {
            sig.arg_types.len() == arg_types.len()
                && arg_types
                    .iter()
                    .zip(&sig.arg_types)
                    .all(|(got, want)| got.matches(want))
        }
        Some(tail) => {
            arg_types.len() >= sig.arg_types.len()
                && arg_types[..sig.arg_types.len()]
                    .iter()
                    .zip(&sig.arg_types)
                    .all(|(got, want)| got.matches(want))
                && arg_types[sig.arg_types.len()..]
                    .iter()
                    .all(|got| got.matches(tail))
        }
    }
}

fn validate_signatures(name: &str, signatures: &[Signature]) -> QueryResult<()> {
    for (i, a) in signatures.iter().enumerate() {
        for b in &signatures[i + 1..] {
            if a.arg_types == b.arg_types && a.variadic == b.variadic {
                if a.return_type == b.return_type {
                    return Err(QueryError::Generics(format!(
                        "duplicate signature for function '{}'",
                        name
                    )));
                }
                return Err(QueryError::Generics(format!(
                    "ambiguous signatures for function '{}': identical arguments with different return types",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn arity_violation(
    name: &str,
    what: &str,
    min: usize,
    max: Option<usize>,
    found: usize,
) -> Option<String> {
    let plural = |n: usize| if n == 1 { "" } else { "s" };
    match max {
        Some(max) if min == max && found != min => Some(format!(
            "Function '{}' expects exactly {} {}{}, found {}",
            name,
            min,
            what,
            plural(min),
            found
        )),
        Some(max) if found > max => Some(format!(
            "Function '{}' expects at most {} {}{}, found {}",
            name,
            max,
            what,
            plural(max),
            found
        )),
        _ if found < min => Some(format!(
            "Function '{}' expects at least {} {}{}, found {}",
            name,
            min,
            what,
            plural(min),
            found
        )),
        _ => None,
    }
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(|| {
    FunctionRegistry::build(clickhouse::catalogue()).expect("function registry build failed")
});

/// The process-wide registry. First access builds it; declaration errors in
/// the catalogue abort the process rather than mis-resolving queries.
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}
