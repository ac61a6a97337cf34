//! Scope environments.
//!
//! An [`Env`] maps names to [`Entity`]s and points at its parent scope.
//! Lookup walks the parent chain; a name must be unique within one scope,
//! but an inner scope may shadow an outer one.
//!
//! Scopes are shared (`Rc`) and immutable once their parent is set. A
//! scope's own table is mutable so that the binder and the per-call
//! instantiation code can add entries to a scope they have just created.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Identifier;
use crate::entity::{Entity, EntityKind};
use crate::errors::InferError;

pub struct Env {
    parent: Option<Rc<Env>>,
    entries: RefCell<HashMap<String, Rc<Entity>>>,
}

impl Env {
    /// A root scope with no parent.
    pub fn new() -> Rc<Env> {
        Rc::new(Env {
            parent: None,
            entries: RefCell::new(HashMap::new()),
        })
    }

    /// A fresh scope nested inside `parent`.
    pub fn child(parent: &Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            parent: Some(parent.clone()),
            entries: RefCell::new(HashMap::new()),
        })
    }

    pub fn parent(&self) -> Option<&Rc<Env>> {
        self.parent.as_ref()
    }

    /// Does this scope itself (not its ancestors) bind `name`?
    pub fn has_entry(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Bind `name` in this scope. Returns `false`, leaving the scope
    /// unchanged, if the name is already bound here.
    pub fn add(&self, name: &str, entity: Rc<Entity>) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), entity);
        true
    }

    /// Look up a name, searching this scope then its ancestors.
    pub fn lookup(&self, name: &str) -> Option<Rc<Entity>> {
        if let Some(entity) = self.entries.borrow().get(name) {
            return Some(entity.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Env")
            .field("names", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

// ── Checked operations ──────────────────────────────────────────────

/// Bind `name` in `env`, failing if this scope already defines it.
pub fn add_ident(env: &Env, name: &Identifier, entity: Rc<Entity>) -> Result<(), InferError> {
    if env.add(&name.name, entity) {
        Ok(())
    } else {
        Err(InferError::NameRedefinition {
            name: name.name.clone(),
            span: name.span,
        })
    }
}

/// Resolve `name` through the scope chain.
pub fn lookup_ident(env: &Env, name: &Identifier) -> Result<Rc<Entity>, InferError> {
    env.lookup(&name.name).ok_or_else(|| InferError::UndefinedName {
        name: name.name.clone(),
        span: name.span,
    })
}

/// Resolve `name` and require it to be a predicate.
pub fn lookup_predicate(env: &Env, name: &Identifier) -> Result<Rc<Entity>, InferError> {
    let entity = lookup_ident(env, name)?;
    match entity.kind() {
        EntityKind::Predicate(_) => Ok(entity),
        _ => Err(InferError::KindMismatch {
            name: name.name.clone(),
            expected: "a predicate",
            span: name.span,
        }),
    }
}

/// Resolve `name` and require it to be an overloadable.
pub fn lookup_overloadable(env: &Env, name: &Identifier) -> Result<Rc<Entity>, InferError> {
    let entity = lookup_ident(env, name)?;
    match entity.kind() {
        EntityKind::Overloadable(_) => Ok(entity),
        _ => Err(InferError::KindMismatch {
            name: name.name.clone(),
            expected: "an overloadable",
            span: name.span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ProcedureDef, RecordDef};
    use crate::errors::ErrorKind;
    use crate::types::Type;

    fn local(env: &Rc<Env>, name: &str, ty: Type) -> Rc<Entity> {
        Entity::local_variable(env, name, ty)
    }

    #[test]
    fn test_add_then_lookup() {
        let env = Env::new();
        add_ident(&env, &Identifier::new("x"), local(&env, "x", Type::Int)).unwrap();
        let found = lookup_ident(&env, &Identifier::new("x")).unwrap();
        assert_eq!(found.name(), "x");
    }

    #[test]
    fn test_redefinition_in_same_scope() {
        let env = Env::new();
        add_ident(&env, &Identifier::new("x"), local(&env, "x", Type::Int)).unwrap();
        let err = add_ident(&env, &Identifier::new("x"), local(&env, "x", Type::Bool)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameRedefinition);
    }

    #[test]
    fn test_shadowing_in_child_scope() {
        let root = Env::new();
        add_ident(&root, &Identifier::new("x"), local(&root, "x", Type::Int)).unwrap();

        let child = Env::child(&root);
        let sibling = Env::child(&root);
        add_ident(&child, &Identifier::new("x"), local(&child, "x", Type::Bool)).unwrap();

        let from_child = lookup_ident(&child, &Identifier::new("x")).unwrap();
        let from_sibling = lookup_ident(&sibling, &Identifier::new("x")).unwrap();
        assert!(matches!(from_child.kind(), EntityKind::LocalVariable(Type::Bool)));
        assert!(matches!(from_sibling.kind(), EntityKind::LocalVariable(Type::Int)));
    }

    #[test]
    fn test_undefined_name() {
        let env = Env::child(&Env::new());
        let err = lookup_ident(&env, &Identifier::new("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedName);
    }

    #[test]
    fn test_has_entry_ignores_ancestors() {
        let root = Env::new();
        root.add("x", local(&root, "x", Type::Int));
        let child = Env::child(&root);
        assert!(!child.has_entry("x"));
        assert!(child.lookup("x").is_some());
    }

    #[test]
    fn test_lookup_predicate_kind_mismatch() {
        let env = Env::new();
        let record = Entity::record(&env, Rc::new(RecordDef::new("Foo", &[], Vec::new())));
        env.add("Foo", record);
        let err = lookup_predicate(&env, &Identifier::new("Foo")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KindMismatch);
        assert_eq!(err.to_string(), "`Foo` is not a predicate");
    }

    #[test]
    fn test_lookup_overloadable_kind_mismatch() {
        let env = Env::new();
        let procedure = Entity::procedure(&env, Rc::new(ProcedureDef::new("f")));
        env.add("f", procedure);
        let err = lookup_overloadable(&env, &Identifier::new("f")).unwrap_err();
        assert_eq!(err.to_string(), "`f` is not an overloadable");
    }
}
