//! Cascading symbol table: a hashmap frame with a backup pointer to its
//! enclosing frame, rather than a single flat map or a `Vec<HashMap>` with
//! manual index math. Pushing a scope allocates a new frame backed by the
//! current top; looking up a name checks the top frame, then cascades to
//! its backup, and so on until it either finds a binding or runs off the
//! end of the chain.

use forge_base::Symbol;
use std::collections::HashMap;

use crate::ast::NodeId;

struct Frame {
    bindings: HashMap<Symbol, NodeId>,
    backup: Option<Box<Frame>>,
}

/// A stack of lexical scopes, innermost first.
pub struct ScopeChain {
    top: Option<Box<Frame>>,
}

impl ScopeChain {
    pub fn new() -> Self {
        ScopeChain { top: Some(Box::new(Frame { bindings: HashMap::new(), backup: None })) }
    }

    /// Opens a new, empty frame backed by the current top frame.
    pub fn push(&mut self) {
        let backup = self.top.take();
        self.top = Some(Box::new(Frame { bindings: HashMap::new(), backup }));
    }

    /// Closes the current frame, restoring its backup as the new top.
    ///
    /// # Panics
    ///
    /// Panics if called on the outermost (global) frame.
    pub fn pop(&mut self) {
        let top = self.top.take().expect("scope chain is never empty while in use");
        self.top = top.backup;
    }

    /// Binds `name` to `node` in the current (innermost) frame.
    ///
    /// Returns `false` without inserting if `name` is already bound in this
    /// same frame — that's the redeclaration case the caller must report.
    pub fn declare(&mut self, name: Symbol, node: NodeId) -> bool {
        let frame = self.top.as_mut().expect("scope chain is never empty while in use");
        if frame.bindings.contains_key(&name) {
            return false;
        }
        frame.bindings.insert(name, node);
        true
    }

    /// Looks up `name`, cascading from the innermost frame outward.
    pub fn lookup(&self, name: Symbol) -> Option<NodeId> {
        let mut frame = self.top.as_deref();
        while let Some(f) = frame {
            if let Some(&id) = f.bindings.get(&name) {
                return Some(id);
            }
            frame = f.backup.as_deref();
        }
        None
    }

    /// Depth of the scope chain, including the global frame (always >= 1).
    pub fn depth(&self) -> usize {
        let mut frame = self.top.as_deref();
        let mut n = 0;
        while let Some(f) = frame {
            n += 1;
            frame = f.backup.as_deref();
        }
        n
    }
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}
