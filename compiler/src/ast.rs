//! Abstract Syntax Tree: the node set the analyzer consumes.
//!
//! Every expression and top-level item carries a [`Span`] for error
//! reporting. Clay does not distinguish type syntax from value syntax:
//! `Array[Int]` and `xs[0]` are both index expressions, `Pair(1, 2)` and
//! `intAdd(1, 2)` are both calls. Whether an expression denotes a value or
//! a type is decided during inference, not by the grammar.
//!
//! The parser lives outside this crate. The small constructor helpers at
//! the bottom of this module let drivers and tests build trees directly.

use crate::span::Span;

/// A complete program is a sequence of top-level items, in file order.
pub type Program = Vec<Item>;

/// A name as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

// ── Top-level items ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Item {
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ItemKind {
    /// `predicate Name[T];`
    Predicate(PredicateDef),

    /// `instance Name[T] (Type);`
    Instance(InstanceDef),

    /// `record Name[T] { field: Type, ... }`
    Record(RecordDef),

    /// `struct Name[T] { field: Type, ... }`
    Struct(RecordDef),

    /// `var a, b = expr;`
    Variable(VariableDef),

    /// `procedure name[T](args) : Ret = body;`
    Procedure(ProcedureDef),

    /// `overloadable name;`
    Overloadable(OverloadableDef),

    /// `overload name[T](args) : Ret = body;`
    Overload(ProcedureDef),
}

#[derive(Debug, Clone)]
pub struct PredicateDef {
    pub name: Identifier,
    pub type_vars: Vec<Identifier>,
}

#[derive(Debug, Clone)]
pub struct InstanceDef {
    /// Name of the predicate this instance belongs to.
    pub name: Identifier,
    pub type_vars: Vec<Identifier>,
    pub type_args: Vec<Expr>,
}

/// Shared shape of record and struct declarations.
#[derive(Debug, Clone)]
pub struct RecordDef {
    pub name: Identifier,
    pub type_vars: Vec<Identifier>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Identifier,
    pub type_expr: Expr,
}

#[derive(Debug, Clone)]
pub struct VariableDef {
    pub variables: Vec<Variable>,
    pub init: Expr,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Identifier,
    pub type_expr: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ProcedureDef {
    pub name: Identifier,
    pub type_vars: Vec<Identifier>,
    pub args: Vec<FormalArg>,
    pub type_conditions: Vec<Expr>,
    pub return_type: Option<Expr>,
    /// The expression whose value the procedure returns, if any.
    pub body: Option<Expr>,
    pub span: Span,
}

/// A formal parameter of a procedure or overload.
#[derive(Debug, Clone)]
pub enum FormalArg {
    /// `x: T` or `ref x: T`
    Value {
        name: Identifier,
        type_expr: Expr,
        by_ref: bool,
    },

    /// `static T`: the caller passes a type, not a value.
    Type { type_expr: Expr },
}

#[derive(Debug, Clone)]
pub struct OverloadableDef {
    pub name: Identifier,
}

// ── Expressions ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// `&x`
    AddressOf(Box<Expr>),

    /// `expr[a, b]`: type instantiation or array indexing.
    Index { expr: Box<Expr>, indexes: Vec<Expr> },

    /// `expr(a, b)`: primitive op, constructor, or procedure call.
    Call { expr: Box<Expr>, args: Vec<Expr> },

    /// `point.x`
    FieldRef { expr: Box<Expr>, field: Identifier },

    /// `pair.0`
    TupleRef { expr: Box<Expr>, index: usize },

    /// `ptr^`
    PointerRef(Box<Expr>),

    /// `[1, 2, 3]`
    Array(Vec<Expr>),

    /// `(1, true)`
    Tuple(Vec<Expr>),

    /// `x`
    NameRef(Identifier),

    BoolLiteral(bool),

    IntLiteral(i64),

    CharLiteral(char),
}

// ── Constructors ─────────────────────────────────────────────────────

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

fn identifiers(names: &[&str]) -> Vec<Identifier> {
    names.iter().map(|n| Identifier::new(*n)).collect()
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn synthetic(kind: ExprKind) -> Self {
        Self::new(kind, Span::default())
    }

    pub fn name(name: &str) -> Self {
        Self::synthetic(ExprKind::NameRef(Identifier::new(name)))
    }

    pub fn int(value: i64) -> Self {
        Self::synthetic(ExprKind::IntLiteral(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::synthetic(ExprKind::BoolLiteral(value))
    }

    pub fn character(value: char) -> Self {
        Self::synthetic(ExprKind::CharLiteral(value))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::synthetic(ExprKind::Call {
            expr: Box::new(callee),
            args,
        })
    }

    pub fn index(base: Expr, indexes: Vec<Expr>) -> Self {
        Self::synthetic(ExprKind::Index {
            expr: Box::new(base),
            indexes,
        })
    }

    pub fn address_of(operand: Expr) -> Self {
        Self::synthetic(ExprKind::AddressOf(Box::new(operand)))
    }

    pub fn field(base: Expr, field: &str) -> Self {
        Self::synthetic(ExprKind::FieldRef {
            expr: Box::new(base),
            field: Identifier::new(field),
        })
    }

    pub fn tuple_ref(base: Expr, index: usize) -> Self {
        Self::synthetic(ExprKind::TupleRef {
            expr: Box::new(base),
            index,
        })
    }

    pub fn pointer_ref(base: Expr) -> Self {
        Self::synthetic(ExprKind::PointerRef(Box::new(base)))
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Self::synthetic(ExprKind::Array(elements))
    }

    pub fn tuple(elements: Vec<Expr>) -> Self {
        Self::synthetic(ExprKind::Tuple(elements))
    }

    /// The identifier, if this is a bare name. Only bare names are
    /// eligible for named-call and named-index dispatch.
    pub fn as_name(&self) -> Option<&Identifier> {
        match &self.kind {
            ExprKind::NameRef(name) => Some(name),
            _ => None,
        }
    }
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn predicate(name: &str, type_vars: &[&str]) -> Self {
        Self::new(ItemKind::Predicate(PredicateDef {
            name: Identifier::new(name),
            type_vars: identifiers(type_vars),
        }))
    }

    pub fn instance(name: &str, type_vars: &[&str], type_args: Vec<Expr>) -> Self {
        Self::new(ItemKind::Instance(InstanceDef {
            name: Identifier::new(name),
            type_vars: identifiers(type_vars),
            type_args,
        }))
    }

    pub fn record(def: RecordDef) -> Self {
        Self::new(ItemKind::Record(def))
    }

    pub fn structure(def: RecordDef) -> Self {
        Self::new(ItemKind::Struct(def))
    }

    pub fn variable(def: VariableDef) -> Self {
        Self::new(ItemKind::Variable(def))
    }

    pub fn procedure(def: ProcedureDef) -> Self {
        Self::new(ItemKind::Procedure(def))
    }

    pub fn overloadable(name: &str) -> Self {
        Self::new(ItemKind::Overloadable(OverloadableDef {
            name: Identifier::new(name),
        }))
    }

    pub fn overload(def: ProcedureDef) -> Self {
        Self::new(ItemKind::Overload(def))
    }
}

impl RecordDef {
    pub fn new(name: &str, type_vars: &[&str], fields: Vec<Field>) -> Self {
        Self {
            name: Identifier::new(name),
            type_vars: identifiers(type_vars),
            fields,
        }
    }
}

impl Field {
    pub fn new(name: &str, type_expr: Expr) -> Self {
        Self {
            name: Identifier::new(name),
            type_expr,
        }
    }
}

impl VariableDef {
    /// `var a, b = init;` with no type annotations.
    pub fn new(names: &[&str], init: Expr) -> Self {
        Self {
            variables: names
                .iter()
                .map(|n| Variable {
                    name: Identifier::new(*n),
                    type_expr: None,
                })
                .collect(),
            init,
        }
    }
}

impl ProcedureDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: Identifier::new(name),
            type_vars: Vec::new(),
            args: Vec::new(),
            type_conditions: Vec::new(),
            return_type: None,
            body: None,
            span: Span::default(),
        }
    }

    pub fn type_vars(mut self, names: &[&str]) -> Self {
        self.type_vars = identifiers(names);
        self
    }

    pub fn value_arg(mut self, name: &str, type_expr: Expr) -> Self {
        self.args.push(FormalArg::Value {
            name: Identifier::new(name),
            type_expr,
            by_ref: false,
        });
        self
    }

    pub fn ref_arg(mut self, name: &str, type_expr: Expr) -> Self {
        self.args.push(FormalArg::Value {
            name: Identifier::new(name),
            type_expr,
            by_ref: true,
        });
        self
    }

    pub fn type_arg(mut self, type_expr: Expr) -> Self {
        self.args.push(FormalArg::Type { type_expr });
        self
    }

    pub fn condition(mut self, condition: Expr) -> Self {
        self.type_conditions.push(condition);
        self
    }

    pub fn returns(mut self, return_type: Expr) -> Self {
        self.return_type = Some(return_type);
        self
    }

    pub fn body(mut self, body: Expr) -> Self {
        self.body = Some(body);
        self
    }
}
