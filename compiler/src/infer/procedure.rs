//! Procedure calls and the return-type cache.
//!
//! A procedure's return type is inferred on demand, once per distinct
//! tuple of argument inferences, and memoized on the procedure entity.
//! While an inference is on the call stack its key is marked in progress;
//! demanding the same key again before it finishes is a recursive
//! inference and fails with [`InferError::RecursiveInference`].
//!
//! The in-progress marker is held by an [`InProgressGuard`]. Dropping the
//! guard without resolving it removes the marker, so every early return
//! (`?` on an ordinary error, the recursive signal, or a panic) leaves the
//! cache as if the attempt never happened.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, FormalArg, ProcedureDef};
use crate::entity::{Entity, ProcedureEntry};
use crate::env::{add_ident, Env};
use crate::errors::InferError;
use crate::infer::{
    bind_type_variables, infer_type, infer_type_type, infer_value_type, reduce_type_variables,
    unify_or_mismatch, InferenceResult,
};
use crate::span::Span;
use crate::types::{deref, Type};

/// Argument inferences of one call, in order.
pub type CacheKey = Vec<InferenceResult>;

/// Where a cache key stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    NotStarted,
    InProgress,
    Resolved(Type),
}

/// Memo table from argument inferences to inferred types.
///
/// Only `InProgress` and `Resolved` are ever stored; an absent key is
/// `NotStarted`.
#[derive(Debug, Default)]
pub struct InferenceCache {
    entries: RefCell<HashMap<CacheKey, CacheState>>,
}

impl InferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &[InferenceResult]) -> CacheState {
        self.entries
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(CacheState::NotStarted)
    }

    /// Number of keys currently in progress or resolved.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Mark `key` in progress. The marker lives until the returned guard
    /// is resolved or dropped.
    pub fn begin(&self, key: CacheKey) -> InProgressGuard<'_> {
        self.entries
            .borrow_mut()
            .insert(key.clone(), CacheState::InProgress);
        InProgressGuard {
            cache: self,
            key,
            resolved: false,
        }
    }
}

/// Scoped ownership of an in-progress marker.
pub struct InProgressGuard<'a> {
    cache: &'a InferenceCache,
    key: CacheKey,
    resolved: bool,
}

impl InProgressGuard<'_> {
    /// Replace the marker with the finished result.
    pub fn resolve(mut self, ty: Type) {
        self.cache
            .entries
            .borrow_mut()
            .insert(self.key.clone(), CacheState::Resolved(ty));
        self.resolved = true;
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.cache.entries.borrow_mut().remove(&self.key);
        }
    }
}

// ── Procedure calls ─────────────────────────────────────────────────

/// Infer a call to a named procedure.
pub fn infer_procedure_call(
    entity: &Rc<Entity>,
    entry: &ProcedureEntry,
    call: &Expr,
    args: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    // Arguments are inferred in the caller's scope before the cache is
    // consulted, so their errors never touch it.
    let key = args
        .iter()
        .map(|arg| infer_type(arg, env))
        .collect::<Result<CacheKey, _>>()?;

    match entry.return_types.state(&key) {
        CacheState::Resolved(ty) => {
            tracing::trace!("return type of `{}` cached: {}", entity.name(), ty);
            return Ok(InferenceResult::value(ty));
        }
        CacheState::InProgress => {
            tracing::trace!("`{}` is already being inferred", entity.name());
            return Err(InferError::RecursiveInference { span: call.span });
        }
        CacheState::NotStarted => {}
    }

    let guard = entry.return_types.begin(key.clone());
    let ty = infer_return_type(entity, &entry.def, &key, args, call.span)?;
    tracing::debug!("resolved return type of `{}`: {}", entity.name(), ty);
    guard.resolve(ty.clone());
    Ok(InferenceResult::value(ty))
}

fn infer_return_type(
    entity: &Entity,
    def: &ProcedureDef,
    actuals: &[InferenceResult],
    args: &[Expr],
    span: Span,
) -> Result<Type, InferError> {
    if def.args.len() != actuals.len() {
        return Err(InferError::Arity {
            what: "argument(s)",
            expected: def.args.len(),
            found: actuals.len(),
            span,
        });
    }

    let scope = entity.declaring_scope(span)?;
    let (type_scope, vars) = bind_type_variables(&def.type_vars, &scope)?;

    for ((formal, actual), arg) in def.args.iter().zip(actuals).zip(args) {
        let type_expr = match formal {
            FormalArg::Value { type_expr, .. } => {
                if !actual.is_value {
                    return Err(InferError::ValueExpected { span: arg.span });
                }
                type_expr
            }
            FormalArg::Type { type_expr } => {
                if actual.is_value {
                    return Err(InferError::TypeExpected { span: arg.span });
                }
                type_expr
            }
        };
        let formal_ty = infer_type_type(type_expr, &type_scope, None)?;
        unify_or_mismatch(&formal_ty, &actual.ty, arg.span)?;
    }

    if let Some(condition) = def.type_conditions.first() {
        return Err(InferError::Unsupported {
            what: "type conditions",
            span: condition.span,
        });
    }

    reduce_type_variables(&vars, span)?;

    let body_scope = Env::child(&type_scope);
    for (formal, actual) in def.args.iter().zip(actuals) {
        let FormalArg::Value { name, by_ref, .. } = formal else {
            continue;
        };
        let ty = deref(&actual.ty).ok_or_else(|| InferError::UnresolvedTypeVariable {
            name: actual.ty.to_string(),
            span: name.span,
        })?;
        let ty = if *by_ref { Type::reference(ty) } else { ty };
        add_ident(&body_scope, name, Entity::local_variable(&body_scope, &name.name, ty))?;
    }

    let ty = match (&def.return_type, &def.body) {
        (Some(declared), _) => infer_type_type(declared, &body_scope, None)?,
        (None, Some(body)) => infer_value_type(body, &body_scope, None)?,
        (None, None) => Type::Void,
    };
    deref(&ty).ok_or_else(|| InferError::UnresolvedTypeVariable {
        name: ty.to_string(),
        span: def.span,
    })
}
