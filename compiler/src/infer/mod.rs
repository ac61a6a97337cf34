//! Duality-checked type inference.
//!
//! Every expression either evaluates to a runtime value of some type or
//! denotes a type itself (`Array[Int]`, `Pair[Bool]`). [`infer_type`]
//! computes which, as an [`InferenceResult`]; [`infer_value_type`] and
//! [`infer_type_type`] are the projections the rest of the analyzer calls
//! when it needs one side of that duality specifically.
//!
//! Calls and index expressions on a bare name dispatch on the kind of the
//! named entity (see [`call`] and [`index`]). Anything without a named
//! handler falls through to the structural rule: indirect call on a
//! record/struct type, or array indexing.

pub mod call;
pub mod index;
pub mod procedure;

use std::fmt;
use std::rc::Rc;

use crate::ast::{Expr, ExprKind, Identifier};
use crate::entity::{Entity, EntityKind, TypeVarEntry, VariableDefEntry, VariableEntry};
use crate::env::{add_ident, lookup_ident, Env};
use crate::errors::InferError;
use crate::span::Span;
use crate::types::{deref, type_equals, unify, Type, TypeVariable};
use procedure::CacheState;

/// Optional predicate a projection checks the inferred type against.
pub type Verify = fn(&Type) -> bool;

/// What an expression stands for: a value of `ty`, or the type `ty` itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InferenceResult {
    pub is_value: bool,
    pub ty: Type,
}

impl InferenceResult {
    pub fn value(ty: Type) -> Self {
        Self { is_value: true, ty }
    }

    pub fn denoting(ty: Type) -> Self {
        Self {
            is_value: false,
            ty,
        }
    }
}

impl fmt::Display for InferenceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_value {
            write!(f, "value of type {}", self.ty)
        } else {
            write!(f, "type {}", self.ty)
        }
    }
}

// ── Entry points ────────────────────────────────────────────────────

/// Infer what `expr` stands for in `env`.
pub fn infer_type(expr: &Expr, env: &Env) -> Result<InferenceResult, InferError> {
    match &expr.kind {
        ExprKind::AddressOf(operand) => {
            let target = infer_value_type(operand, env, None)?;
            Ok(InferenceResult::value(Type::reference(target)))
        }
        ExprKind::Index { expr: base, indexes } => index::infer_index(expr, base, indexes, env),
        ExprKind::Call { expr: callee, args } => call::infer_call(expr, callee, args, env),
        ExprKind::FieldRef { expr: base, field } => infer_field_ref(base, field, env),
        ExprKind::TupleRef { expr: base, index } => infer_tuple_ref(expr, base, *index, env),
        ExprKind::PointerRef(base) => {
            let pointer = infer_value_type(base, env, Some(Type::is_ref))?;
            match pointer.pruned() {
                Type::Ref(target) => Ok(InferenceResult::value(*target)),
                other => Err(invalid_type(&other, base.span)),
            }
        }
        ExprKind::Array(elements) => infer_array_literal(expr, elements, env),
        ExprKind::Tuple(elements) => {
            let types = elements
                .iter()
                .map(|e| infer_value_type(e, env, None))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(InferenceResult::value(Type::Tuple(types)))
        }
        ExprKind::NameRef(name) => infer_name_ref(name, env),
        ExprKind::BoolLiteral(_) => Ok(InferenceResult::value(Type::Bool)),
        ExprKind::IntLiteral(_) => Ok(InferenceResult::value(Type::Int)),
        ExprKind::CharLiteral(_) => Ok(InferenceResult::value(Type::Char)),
    }
}

/// Infer `expr` as a value and return its type.
pub fn infer_value_type(expr: &Expr, env: &Env, verify: Option<Verify>) -> Result<Type, InferError> {
    let result = infer_type(expr, env)?;
    if !result.is_value {
        return Err(InferError::ValueExpected { span: expr.span });
    }
    verified(result.ty, verify, expr.span)
}

/// Infer `expr` as a type and return the type it denotes.
pub fn infer_type_type(expr: &Expr, env: &Env, verify: Option<Verify>) -> Result<Type, InferError> {
    let result = infer_type(expr, env)?;
    if result.is_value {
        return Err(InferError::TypeExpected { span: expr.span });
    }
    verified(result.ty, verify, expr.span)
}

fn verified(ty: Type, verify: Option<Verify>, span: Span) -> Result<Type, InferError> {
    match verify {
        Some(accepts) if !accepts(&ty) => Err(invalid_type(&ty, span)),
        _ => Ok(ty),
    }
}

// ── Structural rules ────────────────────────────────────────────────

fn infer_name_ref(name: &Identifier, env: &Env) -> Result<InferenceResult, InferError> {
    let entity = lookup_ident(env, name)?;
    match entity.kind() {
        EntityKind::BuiltinType(builtin) => match builtin.scalar() {
            Some(ty) => Ok(InferenceResult::denoting(ty)),
            None => Err(InferError::Arity {
                what: "type parameter(s)",
                expected: builtin.param_count(),
                found: 0,
                span: name.span,
            }),
        },
        EntityKind::Record(_) | EntityKind::Struct(_) => {
            instantiate_aggregate(&entity, Vec::new(), name.span).map(InferenceResult::denoting)
        }
        EntityKind::TypeVar(entry) => Ok(InferenceResult::denoting(type_var_type(entry))),
        EntityKind::LocalVariable(ty) => Ok(InferenceResult::value(ty.clone())),
        EntityKind::Variable(var) => {
            global_variable_type(&entity, var, name.span).map(InferenceResult::value)
        }
        EntityKind::Predicate(_)
        | EntityKind::Instance(_)
        | EntityKind::Procedure(_)
        | EntityKind::Overloadable(_)
        | EntityKind::Overload(_)
        | EntityKind::PrimOp(_) => Err(InferError::KindMismatch {
            name: name.name.clone(),
            expected: "a value or a type",
            span: name.span,
        }),
    }
}

/// The bound type of a type variable, resolved as far as it goes.
fn type_var_type(entry: &TypeVarEntry) -> Type {
    let ty = entry.ty();
    deref(&ty).unwrap_or(ty)
}

fn infer_field_ref(base: &Expr, field: &Identifier, env: &Env) -> Result<InferenceResult, InferError> {
    let ty = infer_value_type(base, env, Some(Type::is_aggregate))?;
    field_types(&ty, base.span)?
        .into_iter()
        .find(|(name, _)| *name == field.name)
        .map(|(_, field_ty)| InferenceResult::value(field_ty))
        .ok_or_else(|| InferError::UndefinedName {
            name: field.name.clone(),
            span: field.span,
        })
}

fn infer_tuple_ref(
    expr: &Expr,
    base: &Expr,
    index: usize,
    env: &Env,
) -> Result<InferenceResult, InferError> {
    let ty = infer_value_type(base, env, Some(Type::is_tuple))?;
    let Type::Tuple(elements) = ty.pruned() else {
        return Err(invalid_type(&ty, base.span));
    };
    match elements.get(index) {
        Some(element) => Ok(InferenceResult::value(element.clone())),
        None => Err(InferError::Arity {
            what: "tuple element(s)",
            expected: index + 1,
            found: elements.len(),
            span: expr.span,
        }),
    }
}

fn infer_array_literal(
    expr: &Expr,
    elements: &[Expr],
    env: &Env,
) -> Result<InferenceResult, InferError> {
    let Some((first, rest)) = elements.split_first() else {
        return Err(InferError::EmptyArrayLiteral { span: expr.span });
    };
    let elem = infer_value_type(first, env, None)?;
    for element in rest {
        let ty = infer_value_type(element, env, None)?;
        if !type_equals(&elem, &ty) {
            return Err(mismatch(&elem, &ty, element.span));
        }
    }
    Ok(InferenceResult::value(Type::array_value(
        elem,
        elements.len() as u64,
    )))
}

// ── Global variables ────────────────────────────────────────────────

fn global_variable_type(entity: &Entity, var: &VariableEntry, span: Span) -> Result<Type, InferError> {
    let scope = entity.declaring_scope(span)?;
    let def = &var.def.def;
    if let Some(type_expr) = &def.variables[var.index].type_expr {
        return infer_type_type(type_expr, &scope, None);
    }

    let init = initializer_type(&var.def, &scope, span)?;
    if def.variables.len() == 1 {
        return Ok(init);
    }
    match init.pruned() {
        Type::Tuple(elements) if elements.len() == def.variables.len() => {
            Ok(elements[var.index].clone())
        }
        Type::Tuple(elements) => Err(InferError::Arity {
            what: "tuple element(s)",
            expected: def.variables.len(),
            found: elements.len(),
            span: def.init.span,
        }),
        other => Err(invalid_type(&other, def.init.span)),
    }
}

/// Value type of a `var` initializer, inferred once and shared by every
/// name the definition binds.
fn initializer_type(entry: &VariableDefEntry, scope: &Env, span: Span) -> Result<Type, InferError> {
    let key: Vec<InferenceResult> = Vec::new();
    match entry.init_type.state(&key) {
        CacheState::Resolved(ty) => return Ok(ty),
        CacheState::InProgress => return Err(InferError::RecursiveInference { span }),
        CacheState::NotStarted => {}
    }
    let guard = entry.init_type.begin(key);
    let ty = infer_value_type(&entry.def.init, scope, None)?;
    guard.resolve(ty.clone());
    Ok(ty)
}

// ── Shared helpers ──────────────────────────────────────────────────

pub(crate) fn invalid_type(ty: &Type, span: Span) -> InferError {
    InferError::InvalidType {
        found: ty.to_string(),
        span,
    }
}

pub(crate) fn mismatch(expected: &Type, found: &Type, span: Span) -> InferError {
    InferError::TypeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
        span,
    }
}

/// Unify a declared type with an argument's type.
pub(crate) fn unify_or_mismatch(formal: &Type, actual: &Type, span: Span) -> Result<(), InferError> {
    if unify(formal, actual) {
        Ok(())
    } else {
        Err(mismatch(formal, actual, span))
    }
}

pub(crate) fn expect_arity(
    args: &[Expr],
    expected: usize,
    what: &'static str,
    span: Span,
) -> Result<(), InferError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(InferError::Arity {
            what,
            expected,
            found: args.len(),
            span,
        })
    }
}

/// A non-negative integer literal, as written.
pub(crate) fn int_literal_value(expr: &Expr) -> Result<u64, InferError> {
    match &expr.kind {
        ExprKind::IntLiteral(n) => {
            u64::try_from(*n).map_err(|_| InferError::IntLiteralExpected { span: expr.span })
        }
        _ => Err(InferError::IntLiteralExpected { span: expr.span }),
    }
}

fn bind_names(
    names: &[Identifier],
    parent: &Rc<Env>,
    types: Vec<Type>,
) -> Result<(Rc<Env>, Vec<Rc<Entity>>), InferError> {
    let scope = Env::child(parent);
    let mut vars = Vec::with_capacity(names.len());
    for (name, ty) in names.iter().zip(types) {
        let var = Entity::type_var(&scope, &name.name, name.span, ty);
        add_ident(&scope, name, var.clone())?;
        vars.push(var);
    }
    Ok((scope, vars))
}

/// Open a scope under `parent` binding each name to a fresh type variable.
pub(crate) fn bind_type_variables(
    names: &[Identifier],
    parent: &Rc<Env>,
) -> Result<(Rc<Env>, Vec<Rc<Entity>>), InferError> {
    let fresh = names.iter().map(|_| Type::Var(TypeVariable::fresh())).collect();
    bind_names(names, parent, fresh)
}

/// Resolve every type variable bound by [`bind_type_variables`], in
/// declaration order, and pin each entity to its concrete type.
pub(crate) fn reduce_type_variables(vars: &[Rc<Entity>], span: Span) -> Result<Vec<Type>, InferError> {
    let mut resolved = Vec::with_capacity(vars.len());
    for var in vars {
        let EntityKind::TypeVar(entry) = var.kind() else {
            continue;
        };
        let ty = deref(&entry.ty()).ok_or_else(|| InferError::UnresolvedTypeVariable {
            name: var.name().to_string(),
            span,
        })?;
        entry.set_ty(ty.clone());
        resolved.push(ty);
    }
    Ok(resolved)
}

/// A record or struct type for `entity` with explicit type parameters.
pub(crate) fn instantiate_aggregate(
    entity: &Rc<Entity>,
    params: Vec<Type>,
    span: Span,
) -> Result<Type, InferError> {
    let Some((kind, def)) = entity.aggregate() else {
        return Err(InferError::KindMismatch {
            name: entity.name().to_string(),
            expected: "a record or struct",
            span,
        });
    };
    if params.len() != def.type_vars.len() {
        return Err(InferError::Arity {
            what: "type parameter(s)",
            expected: def.type_vars.len(),
            found: params.len(),
            span,
        });
    }
    Ok(Type::aggregate(kind, entity.clone(), params))
}

/// Field names and types of an instantiated record or struct type.
///
/// The field type expressions are evaluated in the declaration's scope,
/// with the type variables bound directly to the stored parameters.
pub(crate) fn field_types(ty: &Type, span: Span) -> Result<Vec<(String, Type)>, InferError> {
    let (entity, params) = match ty.pruned() {
        Type::Record(entity, params) | Type::Struct(entity, params) => (entity, params),
        other => return Err(invalid_type(&other, span)),
    };
    let Some((_, def)) = entity.aggregate() else {
        return Err(invalid_type(ty, span));
    };
    let scope = entity.declaring_scope(span)?;
    let (field_scope, _) = bind_names(&def.type_vars, &scope, params)?;
    def.fields
        .iter()
        .map(|field| {
            let field_ty = infer_type_type(&field.type_expr, &field_scope, None)?;
            Ok((field.name.name.clone(), field_ty))
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::ast::{Field, Item, RecordDef, Variable, VariableDef};
    use crate::errors::ErrorKind;

    fn pair_record() -> Item {
        Item::record(RecordDef::new(
            "Pair",
            &["T"],
            vec![Field::new("a", Expr::name("T")), Field::new("b", Expr::name("T"))],
        ))
    }

    #[test]
    fn test_literals_are_values() {
        let m = module(vec![]);
        assert_eq!(check_ok(&m, &Expr::int(1)), InferenceResult::value(Type::Int));
        assert_eq!(check_ok(&m, &Expr::boolean(true)), InferenceResult::value(Type::Bool));
        assert_eq!(check_ok(&m, &Expr::character('c')), InferenceResult::value(Type::Char));
    }

    #[test]
    fn test_builtin_names_denote_types() {
        let m = module(vec![]);
        assert_eq!(check_ok(&m, &Expr::name("Int")), InferenceResult::denoting(Type::Int));
        let err = check_err(&m, &Expr::name("Array"));
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_value_expected() {
        let m = module(vec![]);
        let err = m.infer_value(&Expr::name("Int")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueExpected);
    }

    #[test]
    fn test_type_expected() {
        let m = module(vec![]);
        let err = m.infer_type(&Expr::int(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeExpected);
    }

    #[test]
    fn test_verify_rejects_with_invalid_type() {
        let m = module(vec![]);
        let err = infer_value_type(&Expr::int(3), m.env(), Some(Type::is_bool)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidType);
        let ty = infer_type_type(&Expr::name("Char"), m.env(), Some(Type::is_char)).unwrap();
        assert_eq!(ty, Type::Char);
    }

    #[test]
    fn test_address_of() {
        let m = module(vec![]);
        let result = check_ok(&m, &Expr::address_of(Expr::int(1)));
        assert_eq!(result, InferenceResult::value(Type::reference(Type::Int)));
        let err = check_err(&m, &Expr::address_of(Expr::name("Int")));
        assert_eq!(err.kind(), ErrorKind::ValueExpected);
    }

    #[test]
    fn test_pointer_ref() {
        let m = module(vec![]);
        let result = check_ok(&m, &Expr::pointer_ref(Expr::address_of(Expr::boolean(false))));
        assert_eq!(result, InferenceResult::value(Type::Bool));
        let err = check_err(&m, &Expr::pointer_ref(Expr::int(1)));
        assert_eq!(err.kind(), ErrorKind::InvalidType);
    }

    #[test]
    fn test_array_literal() {
        let m = module(vec![]);
        let result = check_ok(&m, &Expr::array(vec![Expr::int(1), Expr::int(2)]));
        assert_eq!(result, InferenceResult::value(Type::array_value(Type::Int, 2)));

        let err = check_err(&m, &Expr::array(vec![Expr::int(1), Expr::boolean(true)]));
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = check_err(&m, &Expr::array(vec![]));
        assert_eq!(err.kind(), ErrorKind::EmptyArrayLiteral);
    }

    #[test]
    fn test_tuple_and_tuple_ref() {
        let m = module(vec![]);
        let tuple = Expr::tuple(vec![Expr::int(1), Expr::character('x')]);
        let result = check_ok(&m, &Expr::tuple_ref(tuple.clone(), 1));
        assert_eq!(result, InferenceResult::value(Type::Char));
        let err = check_err(&m, &Expr::tuple_ref(tuple, 2));
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_field_ref() {
        let m = module(vec![pair_record()]);
        let pair = Expr::call(Expr::name("Pair"), vec![Expr::int(1), Expr::int(2)]);
        let result = check_ok(&m, &Expr::field(pair.clone(), "b"));
        assert_eq!(result, InferenceResult::value(Type::Int));

        let err = check_err(&m, &Expr::field(pair, "c"));
        assert_eq!(err.kind(), ErrorKind::UndefinedName);
        let err = check_err(&m, &Expr::field(Expr::int(1), "a"));
        assert_eq!(err.kind(), ErrorKind::InvalidType);
    }

    #[test]
    fn test_non_generic_record_name_denotes_type() {
        let m = module(vec![Item::record(RecordDef::new(
            "Point",
            &[],
            vec![Field::new("x", Expr::name("Int"))],
        ))]);
        let result = check_ok(&m, &Expr::name("Point"));
        assert!(!result.is_value);
        assert!(result.ty.is_record());
    }

    #[test]
    fn test_generic_record_name_needs_parameters() {
        let m = module(vec![pair_record()]);
        let err = check_err(&m, &Expr::name("Pair"));
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_global_variables() {
        let m = module(vec![
            Item::variable(VariableDef::new(&["x"], Expr::int(4))),
            Item::variable(VariableDef::new(
                &["a", "b"],
                Expr::tuple(vec![Expr::boolean(true), Expr::character('z')]),
            )),
        ]);
        assert_eq!(check_ok(&m, &Expr::name("x")), InferenceResult::value(Type::Int));
        assert_eq!(check_ok(&m, &Expr::name("a")), InferenceResult::value(Type::Bool));
        assert_eq!(check_ok(&m, &Expr::name("b")), InferenceResult::value(Type::Char));
    }

    #[test]
    fn test_global_variable_annotation_wins() {
        let m = module(vec![Item::variable(VariableDef {
            variables: vec![Variable {
                name: Identifier::new("r"),
                type_expr: Some(Expr::index(Expr::name("Ref"), vec![Expr::name("Int")])),
            }],
            init: Expr::boolean(false),
        })]);
        let result = check_ok(&m, &Expr::name("r"));
        assert_eq!(result, InferenceResult::value(Type::reference(Type::Int)));
    }

    #[test]
    fn test_global_tuple_arity() {
        let m = module(vec![Item::variable(VariableDef::new(
            &["a", "b", "c"],
            Expr::tuple(vec![Expr::int(1), Expr::int(2)]),
        ))]);
        let err = check_err(&m, &Expr::name("c"));
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_self_referential_global() {
        let m = module(vec![Item::variable(VariableDef::new(&["x"], Expr::name("x")))]);
        let err = check_err(&m, &Expr::name("x"));
        assert!(err.is_recursive());
        // The failed attempt leaves nothing behind.
        let err = check_err(&m, &Expr::name("x"));
        assert!(err.is_recursive());
    }

    #[test]
    fn test_procedure_name_is_not_a_value() {
        let m = module(vec![]);
        let err = check_err(&m, &Expr::name("intAdd"));
        assert_eq!(err.kind(), ErrorKind::KindMismatch);
    }

    #[test]
    fn test_int_literal_value() {
        assert_eq!(int_literal_value(&Expr::int(5)), Ok(5));
        assert_eq!(
            int_literal_value(&Expr::int(-1)).unwrap_err().kind(),
            ErrorKind::IntLiteralExpected
        );
        assert_eq!(
            int_literal_value(&Expr::name("n")).unwrap_err().kind(),
            ErrorKind::IntLiteralExpected
        );
    }

    #[test]
    fn test_reduce_reports_free_variable() {
        let env = Env::new();
        let (_, vars) = bind_type_variables(&[Identifier::new("T")], &env).unwrap();
        let err = reduce_type_variables(&vars, Span::default()).unwrap_err();
        assert_eq!(
            err,
            InferError::UnresolvedTypeVariable {
                name: "T".into(),
                span: Span::default()
            }
        );
    }
}
