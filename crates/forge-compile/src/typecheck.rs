//! Type checking. Each node is visited at most once; a node that already
//! carries a type annotation (because some earlier call reached it first,
//! or because the checker revisits a shared declaration node) short-
//! circuits to that cached type instead of rechecking.

use std::collections::HashMap;

use forge_base::{Interner, SymbolEq};
use tracing::instrument;

use forge_lang::ast::{Ast, BasicType, BinOp, NodeId, NodeKind, UnOp};

use crate::error::TypeError;
use crate::types::Type;

struct Ctx {
    func_ret: Option<Type>,
    loop_depth: usize,
    /// Full `Type::Function` signatures, keyed by `FuncDecl` node — kept
    /// out of `Ast` itself since `forge_lang::Ast` knows nothing about
    /// this crate's richer `Type`, only the basic-type vocabulary.
    func_types: HashMap<NodeId, Type>,
}

/// Type-checks every global in `root`, annotating the AST in place via
/// `Ast::set_type`.
#[instrument(skip(ast, interner))]
pub fn typecheck(ast: &mut Ast, interner: &Interner, root: NodeId) -> Result<(), TypeError> {
    let globals = match &ast.get(root).kind {
        NodeKind::Program { globals } => globals.clone(),
        other => panic!("typecheck expects a Program root, found {other:?}"),
    };

    let mut ctx = Ctx { func_ret: None, loop_depth: 0, func_types: HashMap::new() };

    // Pass 1: register every function's signature so forward calls
    // (a function calling one declared later in the file) resolve.
    for &g in &globals {
        if let NodeKind::FuncDecl { params, ret, .. } = ast.get(g).kind.clone() {
            let ty = Type::Function {
                params: params.iter().map(|(_, t)| Type::Basic(*t)).collect(),
                ret: Box::new(Type::Basic(ret)),
            };
            ctx.func_types.insert(g, ty);
        }
    }

    for &g in &globals {
        check_global(ast, interner, &mut ctx, g)?;
    }
    Ok(())
}

fn check_global(ast: &mut Ast, interner: &Interner, ctx: &mut Ctx, id: NodeId) -> Result<(), TypeError> {
    match ast.get(id).kind.clone() {
        NodeKind::VarDecl { ty, init, .. } => check_var_decl(ast, interner, ctx, id, ty, init),
        NodeKind::FuncDecl { ret, body, .. } => {
            let prior = ctx.func_ret.replace(Type::Basic(ret));
            check_stmt(ast, interner, ctx, body)?;
            ctx.func_ret = prior;
            Ok(())
        }
        // A struct's own fields already carry their declared types; there's
        // nothing further to check until one is read through a FieldAccess.
        NodeKind::StructDecl { .. } => Ok(()),
        other => panic!("unexpected global statement {other:?}"),
    }
}

fn check_var_decl(
    ast: &mut Ast,
    interner: &Interner,
    ctx: &mut Ctx,
    id: NodeId,
    ty: BasicType,
    init: Option<NodeId>,
) -> Result<(), TypeError> {
    if let Some(init_id) = init {
        let init_ty = check_expr(ast, interner, ctx, init_id)?;
        if init_ty != Type::Basic(ty) {
            return Err(TypeError::Mismatch {
                expected: Type::Basic(ty).to_string(),
                found: init_ty.to_string(),
                span: ast.get(init_id).span,
            });
        }
    }
    ast.set_type(id, ty);
    Ok(())
}

fn check_stmt(ast: &mut Ast, interner: &Interner, ctx: &mut Ctx, id: NodeId) -> Result<(), TypeError> {
    let span = ast.get(id).span;
    match ast.get(id).kind.clone() {
        NodeKind::Block { stmts } => {
            for s in stmts {
                check_stmt(ast, interner, ctx, s)?;
            }
            Ok(())
        }
        NodeKind::VarDecl { ty, init, .. } => check_var_decl(ast, interner, ctx, id, ty, init),
        NodeKind::If { cond, then_branch, else_branch } => {
            check_expr(ast, interner, ctx, cond)?;
            check_stmt(ast, interner, ctx, then_branch)?;
            if let Some(e) = else_branch {
                check_stmt(ast, interner, ctx, e)?;
            }
            Ok(())
        }
        NodeKind::While { cond, body } => {
            check_expr(ast, interner, ctx, cond)?;
            ctx.loop_depth += 1;
            check_stmt(ast, interner, ctx, body)?;
            ctx.loop_depth -= 1;
            Ok(())
        }
        NodeKind::Return { value } => {
            let expected = ctx.func_ret.clone().expect("return outside a function");
            let found = match value {
                Some(v) => check_expr(ast, interner, ctx, v)?,
                None => Type::Basic(BasicType::Void),
            };
            if found != expected {
                return Err(TypeError::Mismatch { expected: expected.to_string(), found: found.to_string(), span });
            }
            Ok(())
        }
        NodeKind::Break => {
            if ctx.loop_depth == 0 {
                return Err(TypeError::BreakOutsideLoop { span });
            }
            Ok(())
        }
        NodeKind::ExprStmt { expr } => {
            check_expr(ast, interner, ctx, expr)?;
            Ok(())
        }
        NodeKind::StructDecl { .. } => Ok(()),
        other => panic!("unexpected statement node {other:?}"),
    }
}

fn check_expr(ast: &mut Ast, interner: &Interner, ctx: &mut Ctx, id: NodeId) -> Result<Type, TypeError> {
    if let Some(ty) = ast.get(id).ty {
        return Ok(Type::Basic(ty));
    }
    let span = ast.get(id).span;
    let ty = match ast.get(id).kind.clone() {
        NodeKind::IntLit(_) => Type::Basic(BasicType::Int),
        NodeKind::RealLit(_) => Type::Basic(BasicType::Real),
        NodeKind::StringLit(_) => Type::Basic(BasicType::String),
        NodeKind::CharLit(_) => Type::Basic(BasicType::Char),
        NodeKind::BoolLit(_) => Type::Basic(BasicType::Bool),

        NodeKind::Ident { name } => {
            let decl_id = ast.get(id).symbol_id.expect("identifier resolved before typecheck");
            match ast.get(decl_id).kind.clone() {
                NodeKind::VarDecl { ty, .. } => Type::Basic(ty),
                NodeKind::FuncDecl { params, .. } => params
                    .iter()
                    .find(|(pname, _)| *pname == name)
                    .map(|(_, pty)| Type::Basic(*pty))
                    .expect("parameter identifier names a declared parameter"),
                other => panic!("identifier bound to non-variable declaration {other:?}"),
            }
        }

        NodeKind::Unary { op, operand } => {
            let operand_ty = check_expr(ast, interner, ctx, operand)?;
            match op {
                UnOp::Neg if operand_ty.is_numeric() => operand_ty,
                UnOp::Neg => {
                    return Err(TypeError::Mismatch { expected: "int or real".into(), found: operand_ty.to_string(), span })
                }
                UnOp::Not if operand_ty == Type::Basic(BasicType::Bool) => operand_ty,
                UnOp::Not => {
                    return Err(TypeError::Mismatch { expected: "bool".into(), found: operand_ty.to_string(), span })
                }
            }
        }

        NodeKind::Binary { op, lhs, rhs } => {
            let lhs_ty = check_expr(ast, interner, ctx, lhs)?;
            let rhs_ty = check_expr(ast, interner, ctx, rhs)?;
            match op {
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                    if !lhs_ty.is_numeric() || lhs_ty != rhs_ty {
                        return Err(TypeError::Mismatch { expected: lhs_ty.to_string(), found: rhs_ty.to_string(), span });
                    }
                    lhs_ty
                }
                BinOp::Eq | BinOp::NotEq => {
                    if lhs_ty != rhs_ty {
                        return Err(TypeError::Mismatch { expected: lhs_ty.to_string(), found: rhs_ty.to_string(), span });
                    }
                    Type::Basic(BasicType::Bool)
                }
                BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                    if !lhs_ty.is_numeric() || lhs_ty != rhs_ty {
                        return Err(TypeError::Mismatch { expected: lhs_ty.to_string(), found: rhs_ty.to_string(), span });
                    }
                    Type::Basic(BasicType::Bool)
                }
            }
        }

        NodeKind::Cast { ty, operand } => {
            check_expr(ast, interner, ctx, operand)?;
            // The only lowering this backend implements is real -> int;
            // anything else type-checks but is rejected later in tacgen
            // as a codegen-error, matching the redesign note that these
            // are reachable-from-valid-source failures, not assertions.
            Type::Basic(ty)
        }

        NodeKind::Assign { target, value } => {
            let target_ty = check_expr(ast, interner, ctx, target)?;
            let value_ty = check_expr(ast, interner, ctx, value)?;
            if target_ty != value_ty {
                return Err(TypeError::Mismatch { expected: target_ty.to_string(), found: value_ty.to_string(), span });
            }
            target_ty
        }

        NodeKind::FieldAccess { .. } => {
            let decl_id = ast.get(id).symbol_id.expect("field access resolved before typecheck");
            match ast.get(decl_id).kind.clone() {
                NodeKind::FieldDecl { ty, .. } => Type::Basic(ty),
                NodeKind::StructDecl { .. } => {
                    return Err(TypeError::Mismatch { expected: "a scalar field".into(), found: "a struct".into(), span })
                }
                other => panic!("field access resolved to an unexpected declaration {other:?}"),
            }
        }

        NodeKind::Call { args, .. } => {
            let decl_id = ast.get(id).symbol_id.expect("call resolved before typecheck");
            let name = match ast.get(decl_id).kind.clone() {
                NodeKind::FuncDecl { name, .. } => name,
                other => return Err(TypeError::NotCallable { span: { let _ = other; span } }),
            };
            let is_builtin_print = name.is(interner, "print") || name.is(interner, "println");

            if is_builtin_print {
                for a in args {
                    check_expr(ast, interner, ctx, a)?;
                }
                Type::Basic(BasicType::Void)
            } else {
                let Type::Function { params, ret } = ctx.func_types.get(&decl_id).cloned().expect("registered in pass 1")
                else {
                    return Err(TypeError::NotCallable { span });
                };
                if params.len() != args.len() {
                    return Err(TypeError::Mismatch {
                        expected: format!("{} argument(s)", params.len()),
                        found: format!("{} argument(s)", args.len()),
                        span,
                    });
                }
                for (arg, expected) in args.iter().zip(params.iter()) {
                    let found = check_expr(ast, interner, ctx, *arg)?;
                    if found != *expected {
                        return Err(TypeError::Mismatch { expected: expected.to_string(), found: found.to_string(), span });
                    }
                }
                *ret
            }
        }

        other => panic!("unexpected expression node {other:?}"),
    };
    if let Some(basic) = ty.as_basic() {
        ast.set_type(id, basic);
    }
    Ok(ty)
}
