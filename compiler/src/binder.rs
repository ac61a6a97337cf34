//! Top-level binding and the analysis driver.
//!
//! [`analyze`] walks a program's items once, in file order, and binds each
//! declaration in a fresh top-level scope whose parent holds the built-in
//! types and primitive operations. Instances and overloads are attached to
//! the predicate or overloadable they name, which must already be bound.
//!
//! Binding infers nothing. The returned [`Module`] runs inference on
//! demand, one expression at a time.

use std::rc::Rc;

use crate::ast::{Expr, Identifier, Item, ItemKind, Program};
use crate::entity::{BuiltinType, Entity, PrimOp, VariableDefEntry};
use crate::env::{add_ident, lookup_overloadable, lookup_predicate, Env};
use crate::errors::InferError;
use crate::infer::{infer_type, infer_type_type, infer_value_type, InferenceResult};
use crate::types::Type;

/// The root scope of built-in types and primitive operations.
pub fn primitives_env() -> Rc<Env> {
    let env = Env::new();
    for builtin in BuiltinType::ALL {
        env.add(builtin.name(), Entity::builtin_type(&env, builtin));
    }
    for op in PrimOp::ALL {
        env.add(op.name(), Entity::prim_op(&env, op));
    }
    env
}

/// Bind every item of `program` in a new top-level scope.
pub fn build_top_level_env(program: Program) -> Result<Rc<Env>, InferError> {
    let env = Env::child(&primitives_env());
    for item in program {
        add_top_level(&env, item)?;
    }
    Ok(env)
}

fn add_top_level(env: &Rc<Env>, item: Item) -> Result<(), InferError> {
    match item.kind {
        ItemKind::Predicate(def) => {
            let name = def.name.clone();
            bind(env, &name, Entity::predicate(env, Rc::new(def)))
        }
        ItemKind::Instance(def) => {
            let predicate = lookup_predicate(env, &def.name)?;
            let instance = Entity::instance(env, Rc::new(def));
            if let Some(entry) = predicate.as_predicate() {
                tracing::debug!("attached instance to predicate `{}`", predicate.name());
                entry.add_instance(instance);
            }
            Ok(())
        }
        ItemKind::Record(def) => {
            let name = def.name.clone();
            bind(env, &name, Entity::record(env, Rc::new(def)))
        }
        ItemKind::Struct(def) => {
            let name = def.name.clone();
            bind(env, &name, Entity::structure(env, Rc::new(def)))
        }
        ItemKind::Variable(def) => {
            let names: Vec<_> = def.variables.iter().map(|v| v.name.clone()).collect();
            let shared = VariableDefEntry::new(Rc::new(def));
            for (index, name) in names.iter().enumerate() {
                bind(env, name, Entity::variable(env, shared.clone(), index))?;
            }
            Ok(())
        }
        ItemKind::Procedure(def) => {
            let name = def.name.clone();
            bind(env, &name, Entity::procedure(env, Rc::new(def)))
        }
        ItemKind::Overloadable(def) => {
            let name = def.name.clone();
            bind(env, &name, Entity::overloadable(env, Rc::new(def)))
        }
        ItemKind::Overload(def) => {
            let overloadable = lookup_overloadable(env, &def.name)?;
            let overload = Entity::overload(env, Rc::new(def));
            if let Some(entry) = overloadable.as_overloadable() {
                tracing::debug!("attached overload to `{}`", overloadable.name());
                entry.add_overload(overload);
            }
            Ok(())
        }
    }
}

fn bind(env: &Env, name: &Identifier, entity: Rc<Entity>) -> Result<(), InferError> {
    let kind = entity.kind_name();
    add_ident(env, name, entity)?;
    tracing::debug!("bound {} `{}`", kind, name.name);
    Ok(())
}

// ── Driver ──────────────────────────────────────────────────────────

/// A bound program, ready for on-demand inference.
#[derive(Debug)]
pub struct Module {
    env: Rc<Env>,
}

/// Bind `program` and return a [`Module`] over its top-level scope.
pub fn analyze(program: Program) -> Result<Module, InferError> {
    let env = build_top_level_env(program)?;
    Ok(Module { env })
}

impl Module {
    /// The top-level scope.
    pub fn env(&self) -> &Rc<Env> {
        &self.env
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<Entity>> {
        self.env.lookup(name)
    }

    pub fn infer(&self, expr: &Expr) -> Result<InferenceResult, InferError> {
        infer_type(expr, &self.env)
    }

    pub fn infer_value(&self, expr: &Expr) -> Result<Type, InferError> {
        infer_value_type(expr, &self.env, None)
    }

    pub fn infer_type(&self, expr: &Expr) -> Result<Type, InferError> {
        infer_type_type(expr, &self.env, None)
    }
}
