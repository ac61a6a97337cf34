//! Named entities: everything a scope can bind.
//!
//! Each [`Entity`] records the scope it was declared in, so that later
//! instantiations (record field types, procedure parameter scopes) can be
//! evaluated in the declaration's scope rather than the caller's. The
//! back-reference is weak: the driver owns the top-level scope, and
//! per-call scopes own the entities bound in them.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::ast::{InstanceDef, OverloadableDef, PredicateDef, ProcedureDef, RecordDef, VariableDef};
use crate::env::Env;
use crate::errors::InferError;
use crate::infer::procedure::InferenceCache;
use crate::span::Span;
use crate::types::{AggregateKind, Type};

pub struct Entity {
    name: String,
    scope: Weak<Env>,
    kind: EntityKind,
}

pub enum EntityKind {
    Predicate(PredicateEntry),
    Instance(Rc<InstanceDef>),
    Record(Rc<RecordDef>),
    Struct(Rc<RecordDef>),
    Procedure(ProcedureEntry),
    Overloadable(OverloadableEntry),
    Overload(Rc<ProcedureDef>),
    Variable(VariableEntry),
    TypeVar(TypeVarEntry),
    LocalVariable(Type),
    BuiltinType(BuiltinType),
    PrimOp(PrimOp),
}

impl Entity {
    fn new(scope: &Rc<Env>, name: impl Into<String>, kind: EntityKind) -> Rc<Entity> {
        Rc::new(Entity {
            name: name.into(),
            scope: Rc::downgrade(scope),
            kind,
        })
    }

    pub fn predicate(scope: &Rc<Env>, def: Rc<PredicateDef>) -> Rc<Entity> {
        let name = def.name.name.clone();
        Self::new(
            scope,
            name,
            EntityKind::Predicate(PredicateEntry {
                def,
                instances: RefCell::new(Vec::new()),
            }),
        )
    }

    pub fn instance(scope: &Rc<Env>, def: Rc<InstanceDef>) -> Rc<Entity> {
        let name = def.name.name.clone();
        Self::new(scope, name, EntityKind::Instance(def))
    }

    pub fn record(scope: &Rc<Env>, def: Rc<RecordDef>) -> Rc<Entity> {
        let name = def.name.name.clone();
        Self::new(scope, name, EntityKind::Record(def))
    }

    pub fn structure(scope: &Rc<Env>, def: Rc<RecordDef>) -> Rc<Entity> {
        let name = def.name.name.clone();
        Self::new(scope, name, EntityKind::Struct(def))
    }

    pub fn procedure(scope: &Rc<Env>, def: Rc<ProcedureDef>) -> Rc<Entity> {
        let name = def.name.name.clone();
        Self::new(
            scope,
            name,
            EntityKind::Procedure(ProcedureEntry {
                def,
                return_types: InferenceCache::new(),
            }),
        )
    }

    pub fn overloadable(scope: &Rc<Env>, def: Rc<OverloadableDef>) -> Rc<Entity> {
        let name = def.name.name.clone();
        Self::new(
            scope,
            name,
            EntityKind::Overloadable(OverloadableEntry {
                def,
                overloads: RefCell::new(Vec::new()),
            }),
        )
    }

    pub fn overload(scope: &Rc<Env>, def: Rc<ProcedureDef>) -> Rc<Entity> {
        let name = def.name.name.clone();
        Self::new(scope, name, EntityKind::Overload(def))
    }

    /// One positional binding of a (possibly multi-name) variable definition.
    pub fn variable(scope: &Rc<Env>, def: Rc<VariableDefEntry>, index: usize) -> Rc<Entity> {
        let name = def.def.variables[index].name.name.clone();
        Self::new(scope, name, EntityKind::Variable(VariableEntry { def, index }))
    }

    pub fn type_var(scope: &Rc<Env>, name: &str, span: Span, ty: Type) -> Rc<Entity> {
        Self::new(
            scope,
            name,
            EntityKind::TypeVar(TypeVarEntry {
                span,
                ty: RefCell::new(ty),
            }),
        )
    }

    pub fn local_variable(scope: &Rc<Env>, name: &str, ty: Type) -> Rc<Entity> {
        Self::new(scope, name, EntityKind::LocalVariable(ty))
    }

    pub fn builtin_type(scope: &Rc<Env>, builtin: BuiltinType) -> Rc<Entity> {
        Self::new(scope, builtin.name(), EntityKind::BuiltinType(builtin))
    }

    pub fn prim_op(scope: &Rc<Env>, op: PrimOp) -> Rc<Entity> {
        Self::new(scope, op.name(), EntityKind::PrimOp(op))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// The scope this entity was declared in, if it is still alive.
    pub fn scope(&self) -> Option<Rc<Env>> {
        self.scope.upgrade()
    }

    /// The declaring scope, or an error located at `span` if it is gone.
    pub fn declaring_scope(&self, span: Span) -> Result<Rc<Env>, InferError> {
        self.scope().ok_or_else(|| InferError::ScopeClosed {
            name: self.name.clone(),
            span,
        })
    }

    /// Record/struct declaration, if this entity is one.
    pub fn aggregate(&self) -> Option<(AggregateKind, &Rc<RecordDef>)> {
        match &self.kind {
            EntityKind::Record(def) => Some((AggregateKind::Record, def)),
            EntityKind::Struct(def) => Some((AggregateKind::Struct, def)),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&ProcedureEntry> {
        match &self.kind {
            EntityKind::Procedure(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_predicate(&self) -> Option<&PredicateEntry> {
        match &self.kind {
            EntityKind::Predicate(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_overloadable(&self) -> Option<&OverloadableEntry> {
        match &self.kind {
            EntityKind::Overloadable(entry) => Some(entry),
            _ => None,
        }
    }

    /// Human-readable kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            EntityKind::Predicate(_) => "predicate",
            EntityKind::Instance(_) => "instance",
            EntityKind::Record(_) => "record",
            EntityKind::Struct(_) => "struct",
            EntityKind::Procedure(_) => "procedure",
            EntityKind::Overloadable(_) => "overloadable",
            EntityKind::Overload(_) => "overload",
            EntityKind::Variable(_) => "variable",
            EntityKind::TypeVar(_) => "type variable",
            EntityKind::LocalVariable(_) => "local variable",
            EntityKind::BuiltinType(_) => "built-in type",
            EntityKind::PrimOp(_) => "primitive operation",
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("kind", &self.kind_name())
            .finish()
    }
}

// ── Entry payloads ──────────────────────────────────────────────────

pub struct PredicateEntry {
    pub def: Rc<PredicateDef>,
    instances: RefCell<Vec<Rc<Entity>>>,
}

impl PredicateEntry {
    pub fn add_instance(&self, instance: Rc<Entity>) {
        self.instances.borrow_mut().push(instance);
    }

    /// Instances in the order they were declared.
    pub fn instances(&self) -> Vec<Rc<Entity>> {
        self.instances.borrow().clone()
    }
}

pub struct OverloadableEntry {
    pub def: Rc<OverloadableDef>,
    overloads: RefCell<Vec<Rc<Entity>>>,
}

impl OverloadableEntry {
    pub fn add_overload(&self, overload: Rc<Entity>) {
        self.overloads.borrow_mut().push(overload);
    }

    /// Overloads in the order they were declared.
    pub fn overloads(&self) -> Vec<Rc<Entity>> {
        self.overloads.borrow().clone()
    }
}

pub struct ProcedureEntry {
    pub def: Rc<ProcedureDef>,
    /// Return types already inferred, keyed by the inferred arguments.
    pub return_types: InferenceCache,
}

/// A `var` definition, shared by every name it binds.
pub struct VariableDefEntry {
    pub def: Rc<VariableDef>,
    /// Value type of the initializer, inferred on first use.
    pub init_type: InferenceCache,
}

impl VariableDefEntry {
    pub fn new(def: Rc<VariableDef>) -> Rc<Self> {
        Rc::new(Self {
            def,
            init_type: InferenceCache::new(),
        })
    }
}

pub struct VariableEntry {
    pub def: Rc<VariableDefEntry>,
    pub index: usize,
}

pub struct TypeVarEntry {
    /// Where the variable was declared.
    pub span: Span,
    ty: RefCell<Type>,
}

impl TypeVarEntry {
    pub fn ty(&self) -> Type {
        self.ty.borrow().clone()
    }

    pub fn set_ty(&self, ty: Type) {
        *self.ty.borrow_mut() = ty;
    }
}

// ── Built-in types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Bool,
    Char,
    Int,
    Void,
    Array,
    ArrayValue,
    Ref,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 7] = [
        BuiltinType::Bool,
        BuiltinType::Char,
        BuiltinType::Int,
        BuiltinType::Void,
        BuiltinType::Array,
        BuiltinType::ArrayValue,
        BuiltinType::Ref,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Bool => "Bool",
            BuiltinType::Char => "Char",
            BuiltinType::Int => "Int",
            BuiltinType::Void => "Void",
            BuiltinType::Array => "Array",
            BuiltinType::ArrayValue => "ArrayValue",
            BuiltinType::Ref => "Ref",
        }
    }

    /// The type a bare reference to this entity denotes. Type constructors
    /// (`Array`, `ArrayValue`, `Ref`) denote nothing without parameters.
    pub fn scalar(self) -> Option<Type> {
        match self {
            BuiltinType::Bool => Some(Type::Bool),
            BuiltinType::Char => Some(Type::Char),
            BuiltinType::Int => Some(Type::Int),
            BuiltinType::Void => Some(Type::Void),
            BuiltinType::Array | BuiltinType::ArrayValue | BuiltinType::Ref => None,
        }
    }

    /// Number of parameters a type constructor takes.
    pub fn param_count(self) -> usize {
        match self {
            BuiltinType::Bool | BuiltinType::Char | BuiltinType::Int | BuiltinType::Void => 0,
            BuiltinType::Array | BuiltinType::Ref => 1,
            BuiltinType::ArrayValue => 2,
        }
    }
}

// ── Primitive operations ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    Default,
    Array,
    ArraySize,
    ArrayValue,
    BoolNot,
    CharToInt,
    IntToChar,
    CharEquals,
    CharLesser,
    CharLesserEquals,
    CharGreater,
    CharGreaterEquals,
    IntAdd,
    IntSubtract,
    IntMultiply,
    IntDivide,
    IntModulus,
    IntNegate,
    IntEquals,
    IntLesser,
    IntLesserEquals,
    IntGreater,
    IntGreaterEquals,
}

impl PrimOp {
    pub const ALL: [PrimOp; 23] = [
        PrimOp::Default,
        PrimOp::Array,
        PrimOp::ArraySize,
        PrimOp::ArrayValue,
        PrimOp::BoolNot,
        PrimOp::CharToInt,
        PrimOp::IntToChar,
        PrimOp::CharEquals,
        PrimOp::CharLesser,
        PrimOp::CharLesserEquals,
        PrimOp::CharGreater,
        PrimOp::CharGreaterEquals,
        PrimOp::IntAdd,
        PrimOp::IntSubtract,
        PrimOp::IntMultiply,
        PrimOp::IntDivide,
        PrimOp::IntModulus,
        PrimOp::IntNegate,
        PrimOp::IntEquals,
        PrimOp::IntLesser,
        PrimOp::IntLesserEquals,
        PrimOp::IntGreater,
        PrimOp::IntGreaterEquals,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimOp::Default => "default",
            PrimOp::Array => "array",
            PrimOp::ArraySize => "arraySize",
            PrimOp::ArrayValue => "arrayValue",
            PrimOp::BoolNot => "boolNot",
            PrimOp::CharToInt => "charToInt",
            PrimOp::IntToChar => "intToChar",
            PrimOp::CharEquals => "charEquals",
            PrimOp::CharLesser => "charLesser",
            PrimOp::CharLesserEquals => "charLesserEquals",
            PrimOp::CharGreater => "charGreater",
            PrimOp::CharGreaterEquals => "charGreaterEquals",
            PrimOp::IntAdd => "intAdd",
            PrimOp::IntSubtract => "intSubtract",
            PrimOp::IntMultiply => "intMultiply",
            PrimOp::IntDivide => "intDivide",
            PrimOp::IntModulus => "intModulus",
            PrimOp::IntNegate => "intNegate",
            PrimOp::IntEquals => "intEquals",
            PrimOp::IntLesser => "intLesser",
            PrimOp::IntLesserEquals => "intLesserEquals",
            PrimOp::IntGreater => "intGreater",
            PrimOp::IntGreaterEquals => "intGreaterEquals",
        }
    }
}
