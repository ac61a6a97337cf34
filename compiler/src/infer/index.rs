//! Index expressions: generic instantiation and array indexing.
//!
//! `Array[Int]`, `ArrayValue[Char, 8]`, `Ref[T]` and `Pair[Int]` are
//! explicit instantiations handled by the named entity. Everything else,
//! `xs[i]` included, is array indexing.

use std::rc::Rc;

use crate::ast::Expr;
use crate::entity::{BuiltinType, Entity, EntityKind};
use crate::env::{lookup_ident, Env};
use crate::errors::InferError;
use crate::infer::{
    expect_arity, infer_type_type, infer_value_type, instantiate_aggregate, int_literal_value,
    invalid_type, InferenceResult,
};
use crate::types::Type;

pub(super) fn infer_index(
    expr: &Expr,
    base: &Expr,
    indexes: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    if let Some(name) = base.as_name() {
        let entity = lookup_ident(env, name)?;
        if let Some(result) = infer_named_index(&entity, expr, indexes, env) {
            return result;
        }
    }
    infer_array_indexing(expr, base, indexes, env)
}

/// `None` when the entity has no index handler.
fn infer_named_index(
    entity: &Rc<Entity>,
    expr: &Expr,
    indexes: &[Expr],
    env: &Env,
) -> Option<Result<InferenceResult, InferError>> {
    let result = match entity.kind() {
        EntityKind::BuiltinType(BuiltinType::Array) => {
            type_parameter(indexes, expr, env).map(Type::array)
        }
        EntityKind::BuiltinType(BuiltinType::ArrayValue) => array_value_type(indexes, expr, env),
        EntityKind::BuiltinType(BuiltinType::Ref) => {
            type_parameter(indexes, expr, env).map(Type::reference)
        }
        EntityKind::Record(_) | EntityKind::Struct(_) => indexes
            .iter()
            .map(|index| infer_type_type(index, env, None))
            .collect::<Result<Vec<_>, _>>()
            .and_then(|params| instantiate_aggregate(entity, params, expr.span)),
        EntityKind::BuiltinType(
            BuiltinType::Bool | BuiltinType::Char | BuiltinType::Int | BuiltinType::Void,
        )
        | EntityKind::Predicate(_)
        | EntityKind::Instance(_)
        | EntityKind::Procedure(_)
        | EntityKind::Overloadable(_)
        | EntityKind::Overload(_)
        | EntityKind::Variable(_)
        | EntityKind::TypeVar(_)
        | EntityKind::LocalVariable(_)
        | EntityKind::PrimOp(_) => return None,
    };
    Some(result.map(InferenceResult::denoting))
}

fn type_parameter(indexes: &[Expr], expr: &Expr, env: &Env) -> Result<Type, InferError> {
    expect_arity(indexes, 1, "type parameter(s)", expr.span)?;
    infer_type_type(&indexes[0], env, None)
}

fn array_value_type(indexes: &[Expr], expr: &Expr, env: &Env) -> Result<Type, InferError> {
    expect_arity(indexes, 2, "type parameter(s)", expr.span)?;
    let elem = infer_type_type(&indexes[0], env, None)?;
    let size = int_literal_value(&indexes[1])?;
    Ok(Type::array_value(elem, size))
}

fn infer_array_indexing(
    expr: &Expr,
    base: &Expr,
    indexes: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    let array = infer_value_type(base, env, Some(Type::is_indexable))?;
    expect_arity(indexes, 1, "index(es)", expr.span)?;
    infer_value_type(&indexes[0], env, Some(Type::is_int))?;
    array
        .element_type()
        .map(InferenceResult::value)
        .ok_or_else(|| invalid_type(&array, base.span))
}
