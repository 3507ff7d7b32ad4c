//! Symbol resolution: a pre-order walk over the AST that binds every
//! identifier use to its declaration, detects redeclarations, and seeds
//! the global scope with the builtin `print`/`println` functions.

use forge_base::{Interner, Span, Symbol};
use tracing::instrument;

use crate::ast::{Ast, BasicType, NodeId, NodeKind};
use crate::error::ResolveError;
use crate::scope::ScopeChain;

/// The name carried by a struct field slot — a `FieldDecl` or a nested
/// `StructDecl` sitting inside an enclosing struct's `fields` list.
fn field_name(ast: &Ast, id: NodeId) -> Option<Symbol> {
    match &ast.get(id).kind {
        NodeKind::FieldDecl { name, .. } => Some(*name),
        NodeKind::StructDecl { name, .. } => Some(*name),
        _ => None,
    }
}

/// Checks a struct's field list for duplicate names and stamps each field's
/// own `symbol_id`, recursing into nested struct fields. Field names never
/// enter the lexical [`ScopeChain`] — they're reachable only by walking a
/// struct symbol's own `fields`, the way [`resolve_field_chain`] does.
fn validate_struct_fields(ast: &mut Ast, fields: &[NodeId]) -> Result<(), ResolveError> {
    let mut seen = std::collections::HashSet::new();
    for &f in fields {
        let name = field_name(ast, f).expect("struct fields are FieldDecl or nested StructDecl");
        if !seen.insert(name) {
            return Err(ResolveError::Redeclared { span: ast.get(f).span });
        }
        ast.set_symbol(f, f);
        if let NodeKind::StructDecl { fields: nested, .. } = ast.get(f).kind.clone() {
            validate_struct_fields(ast, &nested)?;
        }
    }
    Ok(())
}

/// Resolves a dot-access chain: the leftmost identifier through the normal
/// lexical scope, then each subsequent `.field` by walking the previously
/// resolved struct's own field sub-table rather than the scope chain.
/// Returns the `NodeId` the whole chain denotes (the innermost field's own
/// declaration, or the leftmost variable's declaration for a bare `Ident`).
fn resolve_field_chain(ast: &mut Ast, chain: &mut ScopeChain, id: NodeId) -> Result<NodeId, ResolveError> {
    let span = ast.get(id).span;
    match ast.get(id).kind.clone() {
        NodeKind::Ident { name } => {
            let decl = chain.lookup(name).ok_or(ResolveError::Undeclared { span })?;
            ast.set_symbol(id, decl);
            Ok(decl)
        }
        NodeKind::FieldAccess { base, field } => {
            let base_decl = resolve_field_chain(ast, chain, base)?;
            let fields = match &ast.get(base_decl).kind {
                NodeKind::StructDecl { fields, .. } => fields.clone(),
                _ => return Err(ResolveError::NotAStruct { span: ast.get(base).span }),
            };
            let field_decl = fields.into_iter().find(|&f| field_name(ast, f) == Some(field)).ok_or(ResolveError::Undeclared { span })?;
            ast.set_symbol(id, field_decl);
            Ok(field_decl)
        }
        _ => {
            resolve_node(ast, chain, id)?;
            Err(ResolveError::NotAStruct { span })
        }
    }
}

/// Pre-declares the builtins so calls to them resolve without a user
/// definition. Each builtin is represented by a synthetic `FuncDecl` node
/// with no body, parented to the program root.
fn seed_builtins(ast: &mut Ast, interner: &mut Interner, chain: &mut ScopeChain, root: NodeId) {
    for name in ["print", "println"] {
        let sym = interner.intern(name);
        let id = ast.push(
            NodeKind::FuncDecl { name: sym, params: Vec::new(), ret: BasicType::Void, body: root },
            Span::new(0, 0),
            Some(root),
        );
        ast.set_symbol(id, id);
        chain.declare(sym, id);
    }
}

/// Resolves every identifier reference in `ast` starting from `root`
/// (expected to be a `NodeKind::Program` node).
#[instrument(skip(ast, interner))]
pub fn resolve(ast: &mut Ast, interner: &mut Interner, root: NodeId) -> Result<(), ResolveError> {
    let mut chain = ScopeChain::new();
    seed_builtins(ast, interner, &mut chain, root);
    resolve_node(ast, &mut chain, root)
}

fn resolve_node(ast: &mut Ast, chain: &mut ScopeChain, id: NodeId) -> Result<(), ResolveError> {
    let span = ast.get(id).span;
    match ast.get(id).kind.clone() {
        NodeKind::Program { globals } => {
            for g in globals {
                resolve_node(ast, chain, g)?;
            }
        }

        NodeKind::VarDecl { name, init, .. } => {
            if let Some(init_id) = init {
                resolve_node(ast, chain, init_id)?;
            }
            if !chain.declare(name, id) {
                return Err(ResolveError::Redeclared { span });
            }
            ast.set_symbol(id, id);
        }

        NodeKind::FuncDecl { name, params, body, .. } => {
            if !chain.declare(name, id) {
                return Err(ResolveError::Redeclared { span });
            }
            ast.set_symbol(id, id);
            chain.push();
            for (pname, _) in &params {
                // Parameters bind to the function node itself; the type
                // checker resolves each parameter's type from `params`.
                chain.declare(*pname, id);
            }
            resolve_node(ast, chain, body)?;
            chain.pop();
        }

        NodeKind::Block { stmts } => {
            chain.push();
            for s in stmts {
                resolve_node(ast, chain, s)?;
            }
            chain.pop();
        }

        NodeKind::If { cond, then_branch, else_branch } => {
            resolve_node(ast, chain, cond)?;
            resolve_node(ast, chain, then_branch)?;
            if let Some(e) = else_branch {
                resolve_node(ast, chain, e)?;
            }
        }

        NodeKind::While { cond, body } => {
            resolve_node(ast, chain, cond)?;
            resolve_node(ast, chain, body)?;
        }

        NodeKind::Return { value } => {
            if let Some(v) = value {
                resolve_node(ast, chain, v)?;
            }
        }

        NodeKind::Break => {}

        NodeKind::ExprStmt { expr } => resolve_node(ast, chain, expr)?,

        NodeKind::Assign { target, value } => {
            resolve_node(ast, chain, target)?;
            resolve_node(ast, chain, value)?;
        }

        NodeKind::Binary { lhs, rhs, .. } => {
            resolve_node(ast, chain, lhs)?;
            resolve_node(ast, chain, rhs)?;
        }

        NodeKind::Unary { operand, .. } => resolve_node(ast, chain, operand)?,

        NodeKind::Cast { operand, .. } => resolve_node(ast, chain, operand)?,

        NodeKind::Call { callee, args } => {
            let decl = chain.lookup(callee).ok_or(ResolveError::Undeclared { span })?;
            ast.set_symbol(id, decl);
            for a in args {
                resolve_node(ast, chain, a)?;
            }
        }

        NodeKind::Ident { name } => {
            let decl = chain.lookup(name).ok_or(ResolveError::Undeclared { span })?;
            ast.set_symbol(id, decl);
        }

        NodeKind::StructDecl { name, fields } => {
            if !chain.declare(name, id) {
                return Err(ResolveError::Redeclared { span });
            }
            ast.set_symbol(id, id);
            validate_struct_fields(ast, &fields)?;
        }

        NodeKind::FieldDecl { .. } => {
            // Only ever reached through `validate_struct_fields`, which
            // already stamps the field's symbol; nothing to do standalone.
        }

        NodeKind::FieldAccess { .. } => {
            resolve_field_chain(ast, chain, id)?;
        }

        NodeKind::IntLit(_) | NodeKind::RealLit(_) | NodeKind::StringLit(_) | NodeKind::CharLit(_) | NodeKind::BoolLit(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::UnOp;

    #[test]
    fn undeclared_identifier_is_an_error() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let ident = ast.push(NodeKind::Ident { name: interner.intern("x") }, Span::new(0, 1), None);
        let root = ast.push(NodeKind::Program { globals: vec![ident] }, Span::new(0, 1), None);
        let err = resolve(&mut ast, &mut interner, root).unwrap_err();
        assert!(matches!(err, ResolveError::Undeclared { .. }));
    }

    #[test]
    fn var_decl_binds_its_own_name() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let decl = ast.push(NodeKind::VarDecl { ty: BasicType::Int, name, init: None }, Span::new(0, 5), None);
        let root = ast.push(NodeKind::Program { globals: vec![decl] }, Span::new(0, 5), None);
        resolve(&mut ast, &mut interner, root).unwrap();
        assert_eq!(ast.get(decl).symbol_id, Some(decl));
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let d1 = ast.push(NodeKind::VarDecl { ty: BasicType::Int, name, init: None }, Span::new(0, 5), None);
        let d2 = ast.push(NodeKind::VarDecl { ty: BasicType::Int, name, init: None }, Span::new(6, 11), None);
        let root = ast.push(NodeKind::Program { globals: vec![d1, d2] }, Span::new(0, 11), None);
        let err = resolve(&mut ast, &mut interner, root).unwrap_err();
        assert!(matches!(err, ResolveError::Redeclared { .. }));
    }

    #[test]
    fn identifier_resolves_to_enclosing_declaration() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let decl = ast.push(NodeKind::VarDecl { ty: BasicType::Int, name, init: None }, Span::new(0, 5), None);
        let ident = ast.push(NodeKind::Ident { name }, Span::new(6, 7), None);
        let stmt = ast.push(NodeKind::ExprStmt { expr: ident }, Span::new(6, 8), None);
        let root = ast.push(NodeKind::Program { globals: vec![decl, stmt] }, Span::new(0, 8), None);
        resolve(&mut ast, &mut interner, root).unwrap();
        assert_eq!(ast.get(ident).symbol_id, Some(decl));
    }

    #[test]
    fn call_to_builtin_println_resolves() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let callee = interner.intern("println");
        let call = ast.push(NodeKind::Call { callee, args: Vec::new() }, Span::new(0, 9), None);
        let stmt = ast.push(NodeKind::ExprStmt { expr: call }, Span::new(0, 10), None);
        let root = ast.push(NodeKind::Program { globals: vec![stmt] }, Span::new(0, 10), None);
        resolve(&mut ast, &mut interner, root).unwrap();
        assert!(ast.get(call).symbol_id.is_some());
    }

    #[test]
    fn block_scope_does_not_leak_to_sibling_block() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let decl = ast.push(NodeKind::VarDecl { ty: BasicType::Int, name, init: None }, Span::new(0, 5), None);
        let inner = ast.push(NodeKind::Block { stmts: vec![decl] }, Span::new(0, 6), None);
        let leaked_ident = ast.push(NodeKind::Ident { name }, Span::new(7, 8), None);
        let leaked_stmt = ast.push(NodeKind::ExprStmt { expr: leaked_ident }, Span::new(7, 9), None);
        let sibling = ast.push(NodeKind::Block { stmts: vec![leaked_stmt] }, Span::new(7, 10), None);
        let root = ast.push(NodeKind::Program { globals: vec![inner, sibling] }, Span::new(0, 10), None);
        let err = resolve(&mut ast, &mut interner, root).unwrap_err();
        assert!(matches!(err, ResolveError::Undeclared { .. }));
    }

    #[test]
    fn dot_access_resolves_through_the_struct_field_table() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let point = interner.intern("point");
        let field = ast.push(NodeKind::FieldDecl { ty: BasicType::Int, name: x }, Span::new(0, 5), None);
        let decl = ast.push(NodeKind::StructDecl { name: point, fields: vec![field] }, Span::new(0, 10), None);
        let base = ast.push(NodeKind::Ident { name: point }, Span::new(11, 16), None);
        let access = ast.push(NodeKind::FieldAccess { base, field: x }, Span::new(11, 18), None);
        let stmt = ast.push(NodeKind::ExprStmt { expr: access }, Span::new(11, 19), None);
        let root = ast.push(NodeKind::Program { globals: vec![decl, stmt] }, Span::new(0, 19), None);
        resolve(&mut ast, &mut interner, root).unwrap();
        assert_eq!(ast.get(access).symbol_id, Some(field));
    }

    #[test]
    fn chained_dot_access_resolves_through_nested_field_tables() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let inner_name = interner.intern("inner");
        let outer_name = interner.intern("outer");
        let inner_field = ast.push(NodeKind::FieldDecl { ty: BasicType::Int, name: x }, Span::new(0, 5), None);
        let inner_struct = ast.push(NodeKind::StructDecl { name: inner_name, fields: vec![inner_field] }, Span::new(0, 10), None);
        let outer_decl = ast.push(NodeKind::StructDecl { name: outer_name, fields: vec![inner_struct] }, Span::new(0, 20), None);

        let base = ast.push(NodeKind::Ident { name: outer_name }, Span::new(21, 26), None);
        let mid = ast.push(NodeKind::FieldAccess { base, field: inner_name }, Span::new(21, 32), None);
        let leaf = ast.push(NodeKind::FieldAccess { base: mid, field: x }, Span::new(21, 34), None);
        let stmt = ast.push(NodeKind::ExprStmt { expr: leaf }, Span::new(21, 35), None);
        let root = ast.push(NodeKind::Program { globals: vec![outer_decl, stmt] }, Span::new(0, 35), None);

        resolve(&mut ast, &mut interner, root).unwrap();
        assert_eq!(ast.get(leaf).symbol_id, Some(inner_field));
    }

    #[test]
    fn dot_access_on_a_scalar_variable_is_not_a_struct() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let field = interner.intern("y");
        let decl = ast.push(NodeKind::VarDecl { ty: BasicType::Int, name: x, init: None }, Span::new(0, 5), None);
        let base = ast.push(NodeKind::Ident { name: x }, Span::new(6, 7), None);
        let access = ast.push(NodeKind::FieldAccess { base, field }, Span::new(6, 9), None);
        let stmt = ast.push(NodeKind::ExprStmt { expr: access }, Span::new(6, 10), None);
        let root = ast.push(NodeKind::Program { globals: vec![decl, stmt] }, Span::new(0, 10), None);
        let err = resolve(&mut ast, &mut interner, root).unwrap_err();
        assert!(matches!(err, ResolveError::NotAStruct { .. }));
    }

    #[test]
    fn duplicate_field_names_in_the_same_struct_are_rejected() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let point = interner.intern("point");
        let f1 = ast.push(NodeKind::FieldDecl { ty: BasicType::Int, name: x }, Span::new(0, 5), None);
        let f2 = ast.push(NodeKind::FieldDecl { ty: BasicType::Real, name: x }, Span::new(5, 10), None);
        let decl = ast.push(NodeKind::StructDecl { name: point, fields: vec![f1, f2] }, Span::new(0, 15), None);
        let root = ast.push(NodeKind::Program { globals: vec![decl] }, Span::new(0, 15), None);
        let err = resolve(&mut ast, &mut interner, root).unwrap_err();
        assert!(matches!(err, ResolveError::Redeclared { .. }));
    }

    #[test]
    fn unary_operand_is_resolved() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let decl = ast.push(NodeKind::VarDecl { ty: BasicType::Int, name, init: None }, Span::new(0, 5), None);
        let ident = ast.push(NodeKind::Ident { name }, Span::new(6, 7), None);
        let neg = ast.push(NodeKind::Unary { op: UnOp::Neg, operand: ident }, Span::new(5, 7), None);
        let stmt = ast.push(NodeKind::ExprStmt { expr: neg }, Span::new(5, 8), None);
        let root = ast.push(NodeKind::Program { globals: vec![decl, stmt] }, Span::new(0, 8), None);
        resolve(&mut ast, &mut interner, root).unwrap();
        assert_eq!(ast.get(ident).symbol_id, Some(decl));
    }
}
