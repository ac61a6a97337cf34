//! Types and the unification primitives the inference core relies on.
//!
//! # Key Concepts
//!
//! **Type variables** are mutable, single-assignment cells. A variable is
//! created fresh for each instantiation episode (one constructor call, one
//! procedure call), bound by [`unify`], and read back with [`deref`].
//! Every occurrence of a variable shares the same cell, so binding it once
//! binds it everywhere.
//!
//! **Unification** structurally matches a formal type against an actual
//! type and may bind free variables on either side. A failed unification
//! leaves no bindings behind.
//!
//! **Equality** ([`type_equals`]) is structural comparison after following
//! bindings. It never binds anything: the indirect-call path uses it where
//! the constructor path uses unification.
//!
//! Record and struct types refer to their declaring [`Entity`] and compare
//! by entity identity, not by name, so two same-named records in different
//! scopes are distinct types.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::entity::Entity;

// ── Type representation ─────────────────────────────────────────────

/// A Clay type.
#[derive(Debug, Clone)]
pub enum Type {
    Bool,
    Char,
    Int,
    Void,
    /// Growable array: `Array[T]`.
    Array(Box<Type>),
    /// Fixed-size array value: `ArrayValue[T, n]`.
    ArrayValue(Box<Type>, u64),
    /// Reference: `Ref[T]`.
    Ref(Box<Type>),
    /// Record instantiated with its type parameters, in declaration order.
    Record(Rc<Entity>, Vec<Type>),
    /// Struct instantiated with its type parameters, in declaration order.
    Struct(Rc<Entity>, Vec<Type>),
    /// Tuple value: `(A, B)`.
    Tuple(Vec<Type>),
    /// Placeholder resolved by unification.
    Var(TypeVariable),
}

/// Whether an aggregate declaration is a record or a struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Record,
    Struct,
}

impl Type {
    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn array_value(elem: Type, size: u64) -> Type {
        Type::ArrayValue(Box::new(elem), size)
    }

    pub fn reference(target: Type) -> Type {
        Type::Ref(Box::new(target))
    }

    pub fn aggregate(kind: AggregateKind, entity: Rc<Entity>, params: Vec<Type>) -> Type {
        match kind {
            AggregateKind::Record => Type::Record(entity, params),
            AggregateKind::Struct => Type::Struct(entity, params),
        }
    }

    /// Follow variable bindings at the top level only.
    pub fn pruned(&self) -> Type {
        match self {
            Type::Var(var) => match var.binding() {
                Some(bound) => bound.pruned(),
                None => self.clone(),
            },
            _ => self.clone(),
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.pruned(), Type::Bool)
    }

    pub fn is_char(&self) -> bool {
        matches!(self.pruned(), Type::Char)
    }

    pub fn is_int(&self) -> bool {
        matches!(self.pruned(), Type::Int)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.pruned(), Type::Array(_))
    }

    pub fn is_array_value(&self) -> bool {
        matches!(self.pruned(), Type::ArrayValue(..))
    }

    pub fn is_indexable(&self) -> bool {
        self.is_array() || self.is_array_value()
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.pruned(), Type::Ref(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self.pruned(), Type::Record(..))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.pruned(), Type::Struct(..))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self.pruned(), Type::Tuple(_))
    }

    pub fn is_aggregate(&self) -> bool {
        self.is_record() || self.is_struct()
    }

    /// Records and structs can be called like constructors.
    pub fn is_callable(&self) -> bool {
        self.is_aggregate()
    }

    /// Element type of an array or fixed-size array value.
    pub fn element_type(&self) -> Option<Type> {
        match self.pruned() {
            Type::Array(elem) | Type::ArrayValue(elem, _) => Some(*elem),
            _ => None,
        }
    }
}

// Identity-based equality: entities and variable cells compare by
// pointer. This is what inference-cache keys need; use `type_equals` for
// the semantic comparison that follows bindings.
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Bool, Type::Bool)
            | (Type::Char, Type::Char)
            | (Type::Int, Type::Int)
            | (Type::Void, Type::Void) => true,
            (Type::Array(a), Type::Array(b)) | (Type::Ref(a), Type::Ref(b)) => a == b,
            (Type::ArrayValue(a, n), Type::ArrayValue(b, m)) => n == m && a == b,
            (Type::Record(e1, p1), Type::Record(e2, p2))
            | (Type::Struct(e1, p1), Type::Struct(e2, p2)) => Rc::ptr_eq(e1, e2) && p1 == p2,
            (Type::Tuple(a), Type::Tuple(b)) => a == b,
            (Type::Var(a), Type::Var(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Type::Bool | Type::Char | Type::Int | Type::Void => {}
            Type::Array(elem) | Type::Ref(elem) => elem.hash(state),
            Type::ArrayValue(elem, size) => {
                elem.hash(state);
                size.hash(state);
            }
            Type::Record(entity, params) | Type::Struct(entity, params) => {
                std::ptr::hash(Rc::as_ptr(entity), state);
                params.hash(state);
            }
            Type::Tuple(elements) => elements.hash(state),
            Type::Var(var) => std::ptr::hash(Rc::as_ptr(&var.0), state),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "Bool"),
            Type::Char => write!(f, "Char"),
            Type::Int => write!(f, "Int"),
            Type::Void => write!(f, "Void"),
            Type::Array(elem) => write!(f, "Array[{}]", elem),
            Type::ArrayValue(elem, size) => write!(f, "ArrayValue[{}, {}]", elem, size),
            Type::Ref(target) => write!(f, "Ref[{}]", target),
            Type::Record(entity, params) | Type::Struct(entity, params) => {
                write!(f, "{}", entity.name())?;
                if !params.is_empty() {
                    write!(f, "[")?;
                    write_list(f, params)?;
                    write!(f, "]")?;
                }
                Ok(())
            }
            Type::Tuple(elements) => {
                write!(f, "(")?;
                write_list(f, elements)?;
                write!(f, ")")
            }
            Type::Var(var) => match var.binding() {
                Some(bound) => write!(f, "{}", bound),
                None => write!(f, "?{}", var.id()),
            },
        }
    }
}

// ── Type variables ──────────────────────────────────────────────────

static NEXT_VAR_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
struct VarCell {
    id: u32,
    binding: RefCell<Option<Type>>,
}

/// A shared, mutable binding cell. Cloning shares the cell.
#[derive(Debug, Clone)]
pub struct TypeVariable(Rc<VarCell>);

impl TypeVariable {
    /// Create a fresh, unbound variable.
    pub fn fresh() -> Self {
        TypeVariable(Rc::new(VarCell {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            binding: RefCell::new(None),
        }))
    }

    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn binding(&self) -> Option<Type> {
        self.0.binding.borrow().clone()
    }

    pub fn is_bound(&self) -> bool {
        self.0.binding.borrow().is_some()
    }

    pub fn ptr_eq(&self, other: &TypeVariable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn bind(&self, ty: Type) {
        debug_assert!(!self.is_bound(), "type variable ?{} bound twice", self.id());
        *self.0.binding.borrow_mut() = Some(ty);
    }

    fn unbind(&self) {
        *self.0.binding.borrow_mut() = None;
    }
}

// ── Unification ─────────────────────────────────────────────────────

/// Unify `formal` with `actual`, binding free variables on either side.
///
/// Returns `false` on incompatibility. Any variables bound while
/// attempting a failed unification are released again, so a `false`
/// result leaves no bindings behind.
pub fn unify(formal: &Type, actual: &Type) -> bool {
    let mut trail = Vec::new();
    if unify_into(formal, actual, &mut trail) {
        true
    } else {
        for var in trail.iter().rev() {
            var.unbind();
        }
        false
    }
}

fn unify_into(a: &Type, b: &Type, trail: &mut Vec<TypeVariable>) -> bool {
    let a = a.pruned();
    let b = b.pruned();

    match (&a, &b) {
        (Type::Var(x), Type::Var(y)) if x.ptr_eq(y) => true,

        (Type::Var(var), other) | (other, Type::Var(var)) => {
            // Occurs check: prevent infinite types like T = Array[T].
            if occurs(var, other) {
                return false;
            }
            var.bind(other.clone());
            trail.push(var.clone());
            true
        }

        (Type::Bool, Type::Bool)
        | (Type::Char, Type::Char)
        | (Type::Int, Type::Int)
        | (Type::Void, Type::Void) => true,

        (Type::Array(x), Type::Array(y)) | (Type::Ref(x), Type::Ref(y)) => {
            unify_into(x, y, trail)
        }

        (Type::ArrayValue(x, n), Type::ArrayValue(y, m)) => n == m && unify_into(x, y, trail),

        (Type::Record(e1, p1), Type::Record(e2, p2))
        | (Type::Struct(e1, p1), Type::Struct(e2, p2)) => {
            Rc::ptr_eq(e1, e2) && unify_all(p1, p2, trail)
        }

        (Type::Tuple(xs), Type::Tuple(ys)) => unify_all(xs, ys, trail),

        _ => false,
    }
}

fn unify_all(xs: &[Type], ys: &[Type], trail: &mut Vec<TypeVariable>) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| unify_into(x, y, trail))
}

/// Does `var` appear anywhere inside `ty`?
fn occurs(var: &TypeVariable, ty: &Type) -> bool {
    match ty.pruned() {
        Type::Var(other) => other.ptr_eq(var),
        Type::Array(elem) | Type::ArrayValue(elem, _) | Type::Ref(elem) => occurs(var, &elem),
        Type::Record(_, params) | Type::Struct(_, params) | Type::Tuple(params) => {
            params.iter().any(|p| occurs(var, p))
        }
        Type::Bool | Type::Char | Type::Int | Type::Void => false,
    }
}

// ── Dereference & equality ──────────────────────────────────────────

/// Fully resolve a type, including inside compound types.
///
/// Returns `None` if any free variable remains.
pub fn deref(ty: &Type) -> Option<Type> {
    let resolved = match ty {
        Type::Var(var) => return var.binding().and_then(|bound| deref(&bound)),
        Type::Bool | Type::Char | Type::Int | Type::Void => ty.clone(),
        Type::Array(elem) => Type::array(deref(elem)?),
        Type::ArrayValue(elem, size) => Type::array_value(deref(elem)?, *size),
        Type::Ref(target) => Type::reference(deref(target)?),
        Type::Record(entity, params) => Type::Record(entity.clone(), deref_all(params)?),
        Type::Struct(entity, params) => Type::Struct(entity.clone(), deref_all(params)?),
        Type::Tuple(elements) => Type::Tuple(deref_all(elements)?),
    };
    Some(resolved)
}

fn deref_all(types: &[Type]) -> Option<Vec<Type>> {
    types.iter().map(deref).collect()
}

/// Structural equality after following bindings. Binds nothing.
pub fn type_equals(a: &Type, b: &Type) -> bool {
    match (a.pruned(), b.pruned()) {
        (Type::Var(x), Type::Var(y)) => x.ptr_eq(&y),
        (Type::Bool, Type::Bool)
        | (Type::Char, Type::Char)
        | (Type::Int, Type::Int)
        | (Type::Void, Type::Void) => true,
        (Type::Array(x), Type::Array(y)) | (Type::Ref(x), Type::Ref(y)) => type_equals(&x, &y),
        (Type::ArrayValue(x, n), Type::ArrayValue(y, m)) => n == m && type_equals(&x, &y),
        (Type::Record(e1, p1), Type::Record(e2, p2))
        | (Type::Struct(e1, p1), Type::Struct(e2, p2)) => {
            Rc::ptr_eq(&e1, &e2) && all_equal(&p1, &p2)
        }
        (Type::Tuple(xs), Type::Tuple(ys)) => all_equal(&xs, &ys),
        _ => false,
    }
}

fn all_equal(xs: &[Type], ys: &[Type]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| type_equals(x, y))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::RecordDef;
    use crate::env::Env;

    fn var() -> (TypeVariable, Type) {
        let v = TypeVariable::fresh();
        (v.clone(), Type::Var(v))
    }

    fn pair_entity(env: &Rc<Env>) -> Rc<Entity> {
        Entity::record(env, Rc::new(RecordDef::new("Pair", &["T"], Vec::new())))
    }

    #[test]
    fn test_unify_binds_variable() {
        let (v, t) = var();
        assert!(unify(&t, &Type::Int));
        assert_eq!(v.binding(), Some(Type::Int));
        assert_eq!(deref(&t), Some(Type::Int));
    }

    #[test]
    fn test_unify_is_idempotent_once_bound() {
        let (_, t) = var();
        assert!(unify(&t, &Type::Int));
        assert!(unify(&t, &Type::Int));
        assert!(!unify(&t, &Type::Bool));
    }

    #[test]
    fn test_unify_shared_variable_conflict() {
        let (_, t) = var();
        let formal = Type::Tuple(vec![t.clone(), t.clone()]);
        let actual = Type::Tuple(vec![Type::Int, Type::Bool]);
        assert!(!unify(&formal, &actual));
    }

    #[test]
    fn test_failed_unify_leaves_no_bindings() {
        let (v, t) = var();
        let formal = Type::Tuple(vec![t, Type::Int]);
        let actual = Type::Tuple(vec![Type::Char, Type::Bool]);
        assert!(!unify(&formal, &actual));
        assert!(!v.is_bound());
    }

    #[test]
    fn test_occurs_check() {
        let (v, t) = var();
        assert!(!unify(&t, &Type::array(t.clone())));
        assert!(!v.is_bound());
    }

    #[test]
    fn test_array_value_sizes_must_match() {
        assert!(!unify(
            &Type::array_value(Type::Int, 3),
            &Type::array_value(Type::Int, 4)
        ));
        assert!(unify(
            &Type::array_value(Type::Int, 3),
            &Type::array_value(Type::Int, 3)
        ));
    }

    #[test]
    fn test_deref_unresolved_is_none() {
        let (_, t) = var();
        assert_eq!(deref(&Type::reference(t)), None);
    }

    #[test]
    fn test_type_equals_binds_nothing() {
        let (v, t) = var();
        assert!(!type_equals(&t, &Type::Int));
        assert!(!v.is_bound());
        assert!(type_equals(&t, &t.clone()));
    }

    #[test]
    fn test_type_equals_follows_bindings() {
        let (_, t) = var();
        assert!(unify(&t, &Type::Char));
        assert!(type_equals(&Type::array(t), &Type::array(Type::Char)));
    }

    #[test]
    fn test_records_compare_by_entity() {
        let env = Env::new();
        let a = pair_entity(&env);
        let b = pair_entity(&env);
        let ta = Type::Record(a.clone(), vec![Type::Int]);
        assert!(type_equals(&ta, &Type::Record(a, vec![Type::Int])));
        assert!(!type_equals(&ta, &Type::Record(b, vec![Type::Int])));
    }

    #[test]
    fn test_record_and_struct_never_unify() {
        let env = Env::new();
        let entity = pair_entity(&env);
        let record = Type::Record(entity.clone(), vec![Type::Int]);
        let structure = Type::Struct(entity, vec![Type::Int]);
        assert!(!unify(&record, &structure));
    }

    #[test]
    fn test_predicates_see_through_bindings() {
        let (_, t) = var();
        assert!(unify(&t, &Type::array(Type::Int)));
        assert!(t.is_array());
        assert!(t.is_indexable());
        assert_eq!(t.element_type(), Some(Type::Int));
    }

    #[test]
    fn test_display() {
        let env = Env::new();
        let entity = pair_entity(&env);
        assert_eq!(Type::array_value(Type::Char, 8).to_string(), "ArrayValue[Char, 8]");
        assert_eq!(
            Type::Record(entity, vec![Type::reference(Type::Int)]).to_string(),
            "Pair[Ref[Int]]"
        );
        assert_eq!(
            Type::Tuple(vec![Type::Bool, Type::Void]).to_string(),
            "(Bool, Void)"
        );
    }
}
