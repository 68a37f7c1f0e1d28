//! Parametric signature families.
//!
//! A [`GenericFunction`] declares one overload shape over named type
//! variables, each bound to a list of candidate types. At registry build
//! time the family is mechanically expanded into concrete [`Signature`]s by
//! substituting every combination of candidates. Templates are immutable;
//! expansion threads a substitution map instead of cloning partially-bound
//! signatures.

use std::collections::HashMap;

use crate::error::{QueryError, QueryResult};
use crate::functions::Signature;
use crate::types::{ValueKind, ValueType};

/// A type expression inside a generic declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericType {
    Concrete(ValueType),
    /// Reference to a declared type variable.
    Var(&'static str),
    /// Array of a generic item type.
    Array(Box<GenericType>),
}

impl GenericType {
    pub fn concrete(kind: ValueKind) -> Self {
        GenericType::Concrete(ValueType::new(kind))
    }
}

/// The shape of one overload family: argument types, optional variadic tail,
/// return type.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericSig {
    pub args: Vec<GenericType>,
    pub variadic: Option<GenericType>,
    pub ret: GenericType,
}

/// A family declaration: type variables with their candidate bindings, and
/// the signature shape to expand.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericFunction {
    pub vars: Vec<(&'static str, Vec<GenericType>)>,
    pub sig: GenericSig,
}

impl GenericFunction {
    /// Expand into the concrete signature list, in candidate declaration
    /// order. Rejects self-referential variable definitions.
    pub fn expand(&self) -> QueryResult<Vec<Signature>> {
        // Resolve each variable's candidates down to concrete types first.
        let mut resolved: Vec<(&'static str, Vec<ValueType>)> = Vec::with_capacity(self.vars.len());
        for (name, _) in &self.vars {
            let mut visiting = Vec::new();
            let candidates = self.resolve_candidates(name, &mut visiting)?;
            resolved.push((name, candidates));
        }

        let mut out: Vec<Signature> = Vec::new();
        let mut subst: HashMap<&'static str, ValueType> = HashMap::new();
        self.expand_rec(&resolved, 0, &mut subst, &mut out)?;
        // A variable unused by the signature shape produces exact duplicates;
        // collapse them. Same-arguments-different-return survives here and is
        // rejected by registry validation.
        let mut deduped: Vec<Signature> = Vec::with_capacity(out.len());
        for sig in out {
            if !deduped.contains(&sig) {
                deduped.push(sig);
            }
        }
        Ok(deduped)
    }

    fn expand_rec(
        &self,
        resolved: &[(&'static str, Vec<ValueType>)],
        depth: usize,
        subst: &mut HashMap<&'static str, ValueType>,
        out: &mut Vec<Signature>,
    ) -> QueryResult<()> {
        if depth == resolved.len() {
            out.push(Signature {
                arg_types: self
                    .sig
                    .args
                    .iter()
                    .map(|t| substitute(t, subst))
                    .collect::<QueryResult<_>>()?,
                variadic: match &self.sig.variadic {
                    Some(t) => Some(substitute(t, subst)?),
                    None => None,
                },
                return_type: substitute(&self.sig.ret, subst)?,
            });
            return Ok(());
        }
        let (name, candidates) = &resolved[depth];
        for candidate in candidates {
            subst.insert(name, candidate.clone());
            self.expand_rec(resolved, depth + 1, subst, out)?;
        }
        subst.remove(name);
        Ok(())
    }

    fn resolve_candidates(
        &self,
        name: &'static str,
        visiting: &mut Vec<&'static str>,
    ) -> QueryResult<Vec<ValueType>> {
        if visiting.contains(&name) {
            return Err(QueryError::Generics(format!(
                "cyclic type variable definition: {}",
                name
            )));
        }
        visiting.push(name);
        let (_, candidates) = self
            .vars
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| QueryError::Generics(format!("unbound type variable: {}", name)))?;
        let mut out = Vec::new();
        for candidate in candidates {
            match candidate {
                GenericType::Concrete(vt) => out.push(vt.clone()),
                GenericType::Var(other) => {
                    out.extend(self.resolve_candidates(other, visiting)?);
                }
                GenericType::Array(inner) => {
                    for item in self.resolve_array_candidates(inner, visiting)? {
                        out.push(ValueType::new(ValueKind::Array(Box::new(item))));
                    }
                }
            }
        }
        visiting.pop();
        Ok(out)
    }

    fn resolve_array_candidates(
        &self,
        inner: &GenericType,
        visiting: &mut Vec<&'static str>,
    ) -> QueryResult<Vec<ValueType>> {
        match inner {
            GenericType::Concrete(vt) => Ok(vec![vt.clone()]),
            GenericType::Var(name) => self.resolve_candidates(name, visiting),
            GenericType::Array(deeper) => Ok(self
                .resolve_array_candidates(deeper, visiting)?
                .into_iter()
                .map(|t| ValueType::new(ValueKind::Array(Box::new(t))))
                .collect()),
        }
    }
}

fn substitute(
    ty: &GenericType,
    subst: &HashMap<&'static str, ValueType>,
) -> QueryResult<ValueType> {
    match ty {
        GenericType::Concrete(vt) => Ok(vt.clone()),
        GenericType::Var(name) => subst
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::Generics(format!("unbound type variable: {}", name))),
        GenericType::Array(inner) => Ok(ValueType::new(ValueKind::Array(Box::new(substitute(
            inner, subst,
        )?)))),
    }
}
