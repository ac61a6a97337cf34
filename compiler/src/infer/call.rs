//! Call expressions.
//!
//! A call on a bare name is handled by the named entity: primitive
//! operations check their fixed signatures, records and structs construct
//! a value by unifying field types with the arguments, procedures go
//! through the return-type cache. Any other callee must be a record or
//! struct type; the arguments are then compared against the instantiated
//! field types exactly, without unification.

use std::rc::Rc;

use crate::ast::{Expr, RecordDef};
use crate::entity::{Entity, EntityKind, PrimOp};
use crate::env::{lookup_ident, Env};
use crate::errors::InferError;
use crate::infer::procedure::infer_procedure_call;
use crate::infer::{
    bind_type_variables, expect_arity, field_types, infer_type, infer_type_type, infer_value_type,
    int_literal_value, invalid_type, mismatch, reduce_type_variables, unify_or_mismatch,
    InferenceResult, Verify,
};
use crate::types::{type_equals, AggregateKind, Type};

pub(super) fn infer_call(
    expr: &Expr,
    callee: &Expr,
    args: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    if let Some(name) = callee.as_name() {
        let entity = lookup_ident(env, name)?;
        if let Some(result) = infer_named_call(&entity, expr, args, env) {
            return result;
        }
    }
    infer_indirect_call(expr, callee, args, env)
}

/// `None` when the entity has no call handler.
fn infer_named_call(
    entity: &Rc<Entity>,
    expr: &Expr,
    args: &[Expr],
    env: &Env,
) -> Option<Result<InferenceResult, InferError>> {
    let result = match entity.kind() {
        EntityKind::PrimOp(op) => infer_prim_op(*op, expr, args, env),
        EntityKind::Record(def) => {
            infer_constructor(entity, AggregateKind::Record, def, expr, args, env)
        }
        EntityKind::Struct(def) => {
            infer_constructor(entity, AggregateKind::Struct, def, expr, args, env)
        }
        EntityKind::Procedure(entry) => infer_procedure_call(entity, entry, expr, args, env),
        EntityKind::Overloadable(_) => Err(InferError::Unsupported {
            what: "calls to overloadable procedures",
            span: expr.span,
        }),
        EntityKind::Predicate(_)
        | EntityKind::Instance(_)
        | EntityKind::Overload(_)
        | EntityKind::Variable(_)
        | EntityKind::TypeVar(_)
        | EntityKind::LocalVariable(_)
        | EntityKind::BuiltinType(_) => return None,
    };
    Some(result)
}

// ── Primitive operations ────────────────────────────────────────────

/// Fixed signature of the monomorphic primitives: every operand must
/// satisfy `operand`, and the result is `result`.
struct Signature {
    arity: usize,
    operand: Verify,
    operand_name: &'static str,
    result: Type,
}

impl Signature {
    fn new(arity: usize, operand: Verify, operand_name: &'static str, result: Type) -> Self {
        Self {
            arity,
            operand,
            operand_name,
            result,
        }
    }
}

fn signature(op: PrimOp) -> Option<Signature> {
    let sig = match op {
        PrimOp::BoolNot => Signature::new(1, Type::is_bool, "Bool", Type::Bool),
        PrimOp::CharToInt => Signature::new(1, Type::is_char, "Char", Type::Int),
        PrimOp::IntToChar => Signature::new(1, Type::is_int, "Int", Type::Char),
        PrimOp::IntNegate => Signature::new(1, Type::is_int, "Int", Type::Int),
        PrimOp::CharEquals
        | PrimOp::CharLesser
        | PrimOp::CharLesserEquals
        | PrimOp::CharGreater
        | PrimOp::CharGreaterEquals => Signature::new(2, Type::is_char, "Char", Type::Bool),
        PrimOp::IntAdd
        | PrimOp::IntSubtract
        | PrimOp::IntMultiply
        | PrimOp::IntDivide
        | PrimOp::IntModulus => Signature::new(2, Type::is_int, "Int", Type::Int),
        PrimOp::IntEquals
        | PrimOp::IntLesser
        | PrimOp::IntLesserEquals
        | PrimOp::IntGreater
        | PrimOp::IntGreaterEquals => Signature::new(2, Type::is_int, "Int", Type::Bool),
        PrimOp::Default | PrimOp::Array | PrimOp::ArraySize | PrimOp::ArrayValue => return None,
    };
    Some(sig)
}

/// Infer `arg` as a value whose type satisfies `accepts`.
fn expect_value(
    arg: &Expr,
    env: &Env,
    accepts: Verify,
    expected: &'static str,
) -> Result<Type, InferError> {
    let ty = infer_value_type(arg, env, None)?;
    if accepts(&ty) {
        Ok(ty)
    } else {
        Err(InferError::TypeMismatch {
            expected: expected.to_string(),
            found: ty.to_string(),
            span: arg.span,
        })
    }
}

fn infer_prim_op(
    op: PrimOp,
    expr: &Expr,
    args: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    if let Some(sig) = signature(op) {
        expect_arity(args, sig.arity, "argument(s)", expr.span)?;
        for arg in args {
            expect_value(arg, env, sig.operand, sig.operand_name)?;
        }
        return Ok(InferenceResult::value(sig.result));
    }

    let ty = match op {
        PrimOp::Default => {
            expect_arity(args, 1, "argument(s)", expr.span)?;
            infer_type_type(&args[0], env, None)?
        }
        PrimOp::Array => {
            expect_arity(args, 2, "argument(s)", expr.span)?;
            expect_value(&args[0], env, Type::is_int, "Int")?;
            Type::array(infer_value_type(&args[1], env, None)?)
        }
        PrimOp::ArraySize => {
            expect_arity(args, 1, "argument(s)", expr.span)?;
            expect_value(&args[0], env, Type::is_array, "an array")?;
            Type::Int
        }
        PrimOp::ArrayValue => {
            expect_arity(args, 2, "argument(s)", expr.span)?;
            let size = int_literal_value(&args[0])?;
            Type::array_value(infer_value_type(&args[1], env, None)?, size)
        }
        other => {
            return Err(InferError::KindMismatch {
                name: other.name().to_string(),
                expected: "a polymorphic primitive",
                span: expr.span,
            })
        }
    };
    Ok(InferenceResult::value(ty))
}

// ── Constructors ────────────────────────────────────────────────────

fn infer_constructor(
    entity: &Rc<Entity>,
    kind: AggregateKind,
    def: &RecordDef,
    expr: &Expr,
    args: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    expect_arity(args, def.fields.len(), "argument(s)", expr.span)?;

    let scope = entity.declaring_scope(expr.span)?;
    let (field_scope, vars) = bind_type_variables(&def.type_vars, &scope)?;
    for (field, arg) in def.fields.iter().zip(args) {
        let formal = infer_type_type(&field.type_expr, &field_scope, None)?;
        let actual = infer_value_type(arg, env, None)?;
        unify_or_mismatch(&formal, &actual, arg.span)?;
    }

    let params = reduce_type_variables(&vars, expr.span)?;
    Ok(InferenceResult::value(Type::aggregate(kind, entity.clone(), params)))
}

// ── Indirect calls ──────────────────────────────────────────────────

fn infer_indirect_call(
    expr: &Expr,
    callee: &Expr,
    args: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    let callee_ty = infer_type(callee, env)?.ty.pruned();
    if !callee_ty.is_callable() {
        return Err(invalid_type(&callee_ty, callee.span));
    }

    let fields = field_types(&callee_ty, callee.span)?;
    expect_arity(args, fields.len(), "argument(s)", expr.span)?;
    for ((_, field_ty), arg) in fields.iter().zip(args) {
        let actual = infer_value_type(arg, env, None)?;
        if !type_equals(field_ty, &actual) {
            return Err(mismatch(field_ty, &actual, arg.span));
        }
    }
    Ok(InferenceResult::value(callee_ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Field, Item, ProcedureDef, VariableDef};
    use crate::errors::ErrorKind;
    use crate::infer::test_support::*;

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::call(Expr::name(name), args)
    }

    fn pair_record() -> Item {
        Item::record(RecordDef::new(
            "Pair",
            &["T"],
            vec![Field::new("a", Expr::name("T")), Field::new("b", Expr::name("T"))],
        ))
    }

    #[test]
    fn test_int_add() {
        let m = module(vec![]);
        let result = check_ok(&m, &call("intAdd", vec![Expr::int(1), Expr::int(2)]));
        assert_eq!(result, InferenceResult::value(Type::Int));

        let err = check_err(&m, &call("intAdd", vec![Expr::int(1), Expr::boolean(true)]));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.to_string(), "type mismatch: expected Int, found Bool");

        let err = check_err(&m, &call("intAdd", vec![Expr::int(1)]));
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_monomorphic_primitives() {
        let m = module(vec![]);
        let cases = [
            (call("boolNot", vec![Expr::boolean(true)]), Type::Bool),
            (call("charToInt", vec![Expr::character('a')]), Type::Int),
            (call("intToChar", vec![Expr::int(97)]), Type::Char),
            (call("intNegate", vec![Expr::int(1)]), Type::Int),
            (
                call("charLesser", vec![Expr::character('a'), Expr::character('b')]),
                Type::Bool,
            ),
            (call("intModulus", vec![Expr::int(7), Expr::int(2)]), Type::Int),
            (call("intGreaterEquals", vec![Expr::int(7), Expr::int(2)]), Type::Bool),
        ];
        for (expr, expected) in cases {
            assert_eq!(check_ok(&m, &expr), InferenceResult::value(expected));
        }
    }

    #[test]
    fn test_char_comparison_rejects_int() {
        let m = module(vec![]);
        let err = check_err(&m, &call("charEquals", vec![Expr::character('a'), Expr::int(1)]));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_default() {
        let m = module(vec![]);
        let result = check_ok(&m, &call("default", vec![Expr::name("Int")]));
        assert_eq!(result, InferenceResult::value(Type::Int));
        let err = check_err(&m, &call("default", vec![Expr::int(1)]));
        assert_eq!(err.kind(), ErrorKind::TypeExpected);
    }

    #[test]
    fn test_array_primitives() {
        let m = module(vec![Item::variable(VariableDef::new(
            &["a"],
            call("array", vec![Expr::int(4), Expr::character('x')]),
        ))]);
        assert_eq!(
            check_ok(&m, &Expr::name("a")),
            InferenceResult::value(Type::array(Type::Char))
        );
        let result = check_ok(&m, &call("arraySize", vec![Expr::name("a")]));
        assert_eq!(result, InferenceResult::value(Type::Int));

        let err = check_err(&m, &call("arraySize", vec![Expr::int(3)]));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = check_err(&m, &call("array", vec![Expr::boolean(true), Expr::int(3)]));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_array_value_primitive() {
        let m = module(vec![]);
        let result = check_ok(&m, &call("arrayValue", vec![Expr::int(3), Expr::boolean(true)]));
        assert_eq!(result, InferenceResult::value(Type::array_value(Type::Bool, 3)));

        let size = call("intAdd", vec![Expr::int(1), Expr::int(2)]);
        let err = check_err(&m, &call("arrayValue", vec![size, Expr::boolean(true)]));
        assert_eq!(err.kind(), ErrorKind::IntLiteralExpected);
    }

    #[test]
    fn test_record_constructor() {
        let m = module(vec![pair_record()]);
        let result = check_ok(&m, &call("Pair", vec![Expr::int(1), Expr::int(2)]));
        assert!(result.is_value);
        assert!(result.ty.is_record());
        assert_eq!(result.ty.to_string(), "Pair[Int]");
    }

    #[test]
    fn test_record_constructor_conflicting_arguments() {
        let m = module(vec![pair_record()]);
        let err = check_err(&m, &call("Pair", vec![Expr::int(1), Expr::boolean(true)]));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_record_constructor_arity() {
        let m = module(vec![pair_record()]);
        let err = check_err(&m, &call("Pair", vec![Expr::int(1)]));
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_unused_type_variable_is_unresolved() {
        let m = module(vec![Item::structure(RecordDef::new(
            "Tagged",
            &["T"],
            vec![Field::new("id", Expr::name("Int"))],
        ))]);
        let err = check_err(&m, &call("Tagged", vec![Expr::int(1)]));
        assert_eq!(err.kind(), ErrorKind::UnresolvedTypeVariable);
    }

    #[test]
    fn test_struct_constructor_nested_types() {
        let m = module(vec![Item::structure(RecordDef::new(
            "Cell",
            &["T"],
            vec![Field::new(
                "slot",
                Expr::index(Expr::name("Ref"), vec![Expr::name("T")]),
            )],
        ))]);
        let result = check_ok(&m, &call("Cell", vec![Expr::address_of(Expr::character('a'))]));
        assert!(result.ty.is_struct());
        assert_eq!(result.ty.to_string(), "Cell[Char]");
    }

    #[test]
    fn test_indirect_call_exact_match() {
        let m = module(vec![
            pair_record(),
            Item::variable(VariableDef::new(
                &["p"],
                call("Pair", vec![Expr::int(1), Expr::int(2)]),
            )),
        ]);
        let result = check_ok(&m, &call("p", vec![Expr::int(3), Expr::int(4)]));
        assert_eq!(result.ty.to_string(), "Pair[Int]");

        let err = check_err(&m, &call("p", vec![Expr::int(1), Expr::boolean(true)]));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = check_err(&m, &call("p", vec![Expr::int(1)]));
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_indirect_call_on_instantiated_type() {
        let m = module(vec![pair_record()]);
        let callee = Expr::index(Expr::name("Pair"), vec![Expr::name("Bool")]);
        let result = check_ok(
            &m,
            &Expr::call(callee, vec![Expr::boolean(true), Expr::boolean(false)]),
        );
        assert!(result.is_value);
        assert_eq!(result.ty.to_string(), "Pair[Bool]");
    }

    #[test]
    fn test_indirect_call_on_non_callable() {
        let m = module(vec![Item::variable(VariableDef::new(&["n"], Expr::int(1)))]);
        let err = check_err(&m, &call("n", vec![]));
        assert_eq!(err.kind(), ErrorKind::InvalidType);
    }

    #[test]
    fn test_type_variable_callee_uses_indirect_path() {
        let m = module(vec![
            pair_record(),
            Item::procedure(
                ProcedureDef::new("build")
                    .type_vars(&["P"])
                    .type_arg(Expr::name("P"))
                    .body(call("P", vec![Expr::int(1), Expr::int(2)])),
            ),
        ]);
        let pair_int = Expr::index(Expr::name("Pair"), vec![Expr::name("Int")]);
        let result = check_ok(&m, &call("build", vec![pair_int]));
        assert_eq!(result.ty.to_string(), "Pair[Int]");
    }

    #[test]
    fn test_overloadable_call_unsupported() {
        let m = module(vec![
            Item::overloadable("show"),
            Item::overload(ProcedureDef::new("show").value_arg("x", Expr::name("Int"))),
        ]);
        let err = check_err(&m, &call("show", vec![Expr::int(1)]));
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_undefined_callee() {
        let m = module(vec![]);
        let err = check_err(&m, &call("nope", vec![]));
        assert_eq!(err.kind(), ErrorKind::UndefinedName);
    }
}
