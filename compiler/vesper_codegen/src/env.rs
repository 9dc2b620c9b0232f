//! Lexical environment: an arena of scopes.
//!
//! Scopes are stored in a flat vector and navigated via parent indices,
//! so there is no shared ownership and no reference cycles; the whole
//! arena is dropped with the generator. `define` writes the current
//! scope only; `lookup` walks outward to the root. Shadowing is
//! positional: an inner binding hides an outer one for the lifetime of
//! the inner scope, and sibling scopes never see each other.

use rustc_hash::FxHashMap;
use std::fmt;

use vesper_ir::Value;

use crate::ty::TyDesc;

/// Identifier of a scope in the [`ScopeArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The root (global) scope.
    pub const ROOT: ScopeId = ScopeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({})", self.0)
    }
}

/// What a name is bound to.
#[derive(Clone, Debug)]
pub enum Binding {
    /// A stack slot (or global) holding a value of type `desc.repr`;
    /// reads load through the pointer, assignment stores through it.
    Slot { ptr: Value, desc: TyDesc },
    /// A handle used as-is: a function reference or an instance pointer.
    Direct { value: Value, desc: TyDesc },
}

struct ScopeData {
    parent: Option<ScopeId>,
    bindings: FxHashMap<String, Binding>,
}

/// All scopes of one compilation.
pub struct ScopeArena {
    scopes: Vec<ScopeData>,
}

impl ScopeArena {
    /// Create an arena holding just the root scope.
    pub fn new() -> Self {
        ScopeArena {
            scopes: vec![ScopeData {
                parent: None,
                bindings: FxHashMap::default(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    /// Open a new child scope under `parent`.
    pub fn push_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent: Some(parent),
            bindings: FxHashMap::default(),
        });
        id
    }

    /// Insert or overwrite a binding in `scope` (and only there).
    pub fn define(&mut self, scope: ScopeId, name: &str, binding: Binding) {
        self.scopes[scope.index()]
            .bindings
            .insert(name.to_owned(), binding);
    }

    /// Find a binding, searching `scope` then its ancestors.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Binding> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = &self.scopes[id.index()];
            if let Some(binding) = data.bindings.get(name) {
                return Some(binding);
            }
            current = data.parent;
        }
        None
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_ir::Ty;

    fn direct(n: i32) -> Binding {
        Binding::Direct {
            value: Value::ConstI32(n),
            desc: TyDesc::plain(Ty::I32),
        }
    }

    fn bound_const(binding: Option<&Binding>) -> Option<i32> {
        match binding {
            Some(Binding::Direct {
                value: Value::ConstI32(n),
                ..
            }) => Some(*n),
            _ => None,
        }
    }

    #[test]
    fn lookup_walks_outward() {
        let mut arena = ScopeArena::new();
        let outer = arena.push_child(arena.root());
        let inner = arena.push_child(outer);
        arena.define(outer, "x", direct(1));
        assert_eq!(bound_const(arena.lookup(inner, "x")), Some(1));
        assert_eq!(bound_const(arena.lookup(outer, "x")), Some(1));
        assert!(arena.lookup(arena.root(), "x").is_none());
    }

    #[test]
    fn shadowing_is_scoped() {
        let mut arena = ScopeArena::new();
        let outer = arena.push_child(arena.root());
        let inner = arena.push_child(outer);
        arena.define(outer, "x", direct(1));
        arena.define(inner, "x", direct(2));
        assert_eq!(bound_const(arena.lookup(inner, "x")), Some(2));
        // The outer binding is untouched once the inner scope is abandoned.
        assert_eq!(bound_const(arena.lookup(outer, "x")), Some(1));
    }

    #[test]
    fn siblings_do_not_leak() {
        let mut arena = ScopeArena::new();
        let parent = arena.push_child(arena.root());
        let left = arena.push_child(parent);
        let right = arena.push_child(parent);
        arena.define(left, "x", direct(1));
        assert!(arena.lookup(right, "x").is_none());
    }
}
