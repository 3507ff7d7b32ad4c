//! Three-address-code generation. Walks the already-typed AST in
//! statement order, emitting into a per-function instruction list and a
//! shared [`AddressPool`]. Assumes [`crate::typecheck::typecheck`] already
//! ran successfully — every expression node is expected to carry a type
//! annotation.

use forge_base::{Interner, Symbol};
use tracing::instrument;

use forge_lang::ast::{Ast, BasicType, BinOp, NodeId, NodeKind, UnOp};

use crate::address::{AddrId, Address, AddressPool, Instr, Opcode};
use crate::types::Type;

#[derive(Debug)]
pub struct FunctionCode {
    pub name: forge_base::Symbol,
    pub params: Vec<(forge_base::Symbol, BasicType)>,
    pub ret: BasicType,
    pub instrs: Vec<Instr>,
}

struct Gen<'a> {
    ast: &'a Ast,
    interner: &'a mut Interner,
    pool: &'a mut AddressPool,
    instrs: Vec<Instr>,
    pending_label: Option<u32>,
    break_targets: Vec<AddrId>,
}

/// Lowers every function in `root` (expected a `Program` node) to TAC,
/// sharing a single address pool across all functions.
#[instrument(skip(ast, interner, pool))]
pub fn generate(ast: &Ast, interner: &mut Interner, pool: &mut AddressPool, root: NodeId) -> Vec<FunctionCode> {
    let globals = match &ast.get(root).kind {
        NodeKind::Program { globals } => globals.clone(),
        other => panic!("tacgen expects a Program root, found {other:?}"),
    };

    let mut out = Vec::new();
    for g in globals {
        if let NodeKind::FuncDecl { name, params, ret, body } = ast.get(g).kind.clone() {
            let mut gen = Gen { ast, interner, pool, instrs: Vec::new(), pending_label: None, break_targets: Vec::new() };
            gen.lower_stmt(body);
            out.push(FunctionCode { name, params, ret, instrs: gen.instrs });
        }
    }
    out
}

/// Flattens every global `VarDecl` and (recursively, through nested
/// structs) `StructDecl` into the flat `(qualified-name, type)` pairs that
/// `Gen::lower_expr`'s `FieldAccess` arm addresses each field under — a
/// struct never gets real memory layout, just a dot-joined symbol per
/// scalar field.
pub fn flatten_globals(ast: &Ast, interner: &mut Interner, globals: &[NodeId]) -> Vec<(Symbol, BasicType)> {
    let mut out = Vec::new();
    for &g in globals {
        match ast.get(g).kind.clone() {
            NodeKind::VarDecl { ty, name, .. } => out.push((name, ty)),
            NodeKind::StructDecl { name, fields } => {
                let prefix = interner.resolve(name).to_string();
                flatten_struct_fields(ast, interner, &prefix, &fields, &mut out);
            }
            _ => {}
        }
    }
    out
}

fn flatten_struct_fields(ast: &Ast, interner: &mut Interner, prefix: &str, fields: &[NodeId], out: &mut Vec<(Symbol, BasicType)>) {
    for &f in fields {
        match ast.get(f).kind.clone() {
            NodeKind::FieldDecl { ty, name } => {
                let qualified = format!("{prefix}.{}", interner.resolve(name));
                out.push((interner.intern(&qualified), ty));
            }
            NodeKind::StructDecl { name, fields: nested } => {
                let qualified = format!("{prefix}.{}", interner.resolve(name));
                flatten_struct_fields(ast, interner, &qualified, &nested, out);
            }
            other => panic!("unexpected struct field node {other:?}"),
        }
    }
}

impl<'a> Gen<'a> {
    fn emit(&mut self, op: Opcode, src1: AddrId, src2: AddrId, dst: AddrId) {
        let label = self.pending_label.take();
        self.instrs.push(Instr { label: label.unwrap_or(u32::MAX), op, src1, src2, dst });
    }

    /// Records that the next-emitted instruction is the target of
    /// `label_addr`, backpatching the address pool immediately (the
    /// instruction index is already known: it's the current length).
    fn mark_label(&mut self, label_addr: AddrId) {
        let id = match self.pool.get(label_addr) {
            Address::Label { id, .. } => *id,
            other => panic!("mark_label called on non-label address {other:?}"),
        };
        self.pool.place_label(label_addr, self.instrs.len());
        self.pending_label = Some(id);
    }

    fn ty_of(&self, id: NodeId) -> Type {
        Type::Basic(self.ast.get(id).ty.expect("tacgen requires a typechecked AST"))
    }

    fn lower_stmt(&mut self, id: NodeId) {
        match self.ast.get(id).kind.clone() {
            NodeKind::Block { stmts } => {
                for s in stmts {
                    self.lower_stmt(s);
                }
            }
            NodeKind::VarDecl { name, init, ty } => {
                if let Some(init_id) = init {
                    let value = self.lower_expr(init_id);
                    let dst = self.pool.push(Address::SymbolRef { symbol: name, ty: Type::Basic(ty) });
                    self.emit(Opcode::Copy, value, AddrId::UNUSED, dst);
                }
            }
            NodeKind::If { cond, then_branch, else_branch } => {
                let cond_addr = self.lower_expr(cond);
                let false_label = self.pool.new_label();
                self.emit(Opcode::IfFalseGoto, cond_addr, false_label, AddrId::UNUSED);
                self.lower_stmt(then_branch);
                match else_branch {
                    Some(else_id) => {
                        let end_label = self.pool.new_label();
                        self.emit(Opcode::Goto, end_label, AddrId::UNUSED, AddrId::UNUSED);
                        self.mark_label(false_label);
                        self.lower_stmt(else_id);
                        self.mark_label(end_label);
                    }
                    None => self.mark_label(false_label),
                }
            }
            NodeKind::While { cond, body } => {
                let loop_label = self.pool.new_label();
                self.mark_label(loop_label);
                let cond_addr = self.lower_expr(cond);
                let exit_label = self.pool.new_label();
                self.emit(Opcode::IfFalseGoto, cond_addr, exit_label, AddrId::UNUSED);
                self.break_targets.push(exit_label);
                self.lower_stmt(body);
                self.break_targets.pop();
                self.emit(Opcode::Goto, loop_label, AddrId::UNUSED, AddrId::UNUSED);
                self.mark_label(exit_label);
            }
            NodeKind::Return { value } => {
                let addr = value.map(|v| self.lower_expr(v)).unwrap_or(AddrId::UNUSED);
                self.emit(Opcode::Return, addr, AddrId::UNUSED, AddrId::UNUSED);
            }
            NodeKind::Break => {
                let target = *self.break_targets.last().expect("break inside a loop (typechecked)");
                self.emit(Opcode::Goto, target, AddrId::UNUSED, AddrId::UNUSED);
            }
            NodeKind::ExprStmt { expr } => {
                self.lower_expr(expr);
            }
            // A struct's fields are flattened to plain symbols by
            // `flatten_globals`/the enclosing caller; there's no storage
            // to allocate here for the declaration itself.
            NodeKind::StructDecl { .. } | NodeKind::FieldDecl { .. } => {}
            other => panic!("unexpected statement node {other:?}"),
        }
    }

    fn symbol_ref_for_ident(&mut self, id: NodeId) -> AddrId {
        let NodeKind::Ident { name } = self.ast.get(id).kind.clone() else {
            panic!("expected Ident node");
        };
        let ty = self.ty_of(id);
        self.pool.push(Address::SymbolRef { symbol: name, ty })
    }

    /// A `FieldAccess` chain has no real memory layout; it's addressed by
    /// synthesizing the same dot-joined qualified name `flatten_globals`
    /// gives that field, e.g. `a.b.c`.
    fn qualified_symbol(&mut self, id: NodeId) -> Symbol {
        let mut parts = Vec::new();
        self.collect_field_parts(id, &mut parts);
        self.interner.intern(&parts.join("."))
    }

    fn collect_field_parts(&self, id: NodeId, parts: &mut Vec<String>) {
        match self.ast.get(id).kind.clone() {
            NodeKind::Ident { name } => parts.push(self.interner.resolve(name).to_string()),
            NodeKind::FieldAccess { base, field } => {
                self.collect_field_parts(base, parts);
                parts.push(self.interner.resolve(field).to_string());
            }
            other => panic!("expected an identifier or field-access chain, found {other:?}"),
        }
    }

    /// The address an assignment or a `FieldAccess` read resolves to:
    /// a plain ident's own symbol, or a struct field's qualified one.
    fn symbol_ref_for_target(&mut self, id: NodeId) -> AddrId {
        match self.ast.get(id).kind.clone() {
            NodeKind::Ident { .. } => self.symbol_ref_for_ident(id),
            NodeKind::FieldAccess { .. } => {
                let ty = self.ty_of(id);
                let symbol = self.qualified_symbol(id);
                self.pool.push(Address::SymbolRef { symbol, ty })
            }
            other => panic!("unexpected assignment target {other:?}"),
        }
    }

    fn lower_expr(&mut self, id: NodeId) -> AddrId {
        match self.ast.get(id).kind.clone() {
            NodeKind::IntLit(v) => self.pool.push(Address::IntConst(v)),
            NodeKind::RealLit(v) => self.pool.push(Address::RealConst(v)),
            NodeKind::CharLit(v) => {
                // Materialize a char-typed temp rather than a bare untyped
                // IntConst, so the assembly emitter's format-string dispatch
                // (which switches on operand type) can tell this apart from
                // a plain integer.
                let raw = self.pool.push(Address::IntConst(v as i64));
                let dst = self.pool.new_temp(Type::Basic(BasicType::Char));
                self.emit(Opcode::Copy, raw, AddrId::UNUSED, dst);
                dst
            }
            NodeKind::BoolLit(v) => self.pool.push(Address::BoolConst(v)),
            NodeKind::StringLit(sym) => self.pool.push(Address::StringConst(sym)),

            NodeKind::Ident { .. } => self.symbol_ref_for_ident(id),

            NodeKind::FieldAccess { .. } => {
                let ty = self.ty_of(id);
                let symbol = self.qualified_symbol(id);
                self.pool.push(Address::SymbolRef { symbol, ty })
            }

            NodeKind::Unary { op, operand } => {
                let src = self.lower_expr(operand);
                let ty = self.ty_of(id);
                let dst = self.pool.new_temp(ty);
                let opcode = match op {
                    UnOp::Neg => Opcode::Neg,
                    UnOp::Not => Opcode::Not,
                };
                self.emit(opcode, src, AddrId::UNUSED, dst);
                dst
            }

            NodeKind::Binary { op, lhs, rhs } => {
                let lhs_addr = self.lower_expr(lhs);
                let rhs_addr = self.lower_expr(rhs);
                let ty = self.ty_of(id);
                let dst = self.pool.new_temp(ty);
                let opcode = match op {
                    BinOp::Add => Opcode::Add,
                    BinOp::Sub => Opcode::Sub,
                    BinOp::Mul => Opcode::Mul,
                    BinOp::Div => Opcode::Div,
                    BinOp::Mod => Opcode::Mod,
                    BinOp::Gt => Opcode::Gt,
                    BinOp::Lt => Opcode::Lt,
                    BinOp::Ge => Opcode::Ge,
                    BinOp::Le => Opcode::Le,
                    BinOp::Eq => Opcode::Eq,
                    BinOp::NotEq => Opcode::Ne,
                };
                self.emit(opcode, lhs_addr, rhs_addr, dst);
                dst
            }

            NodeKind::Cast { operand, .. } => {
                let src = self.lower_expr(operand);
                let ty = self.ty_of(id);
                let dst = self.pool.new_temp(ty);
                // The only TAC-level cast opcode is real -> int (per the
                // opcode enumeration); other source/target combinations
                // type-check but are rejected as a codegen-error once the
                // assembly emitter inspects the operand's concrete type.
                self.emit(Opcode::CastRealToInt, src, AddrId::UNUSED, dst);
                dst
            }

            NodeKind::Assign { target, value } => {
                let value_addr = self.lower_expr(value);
                let dst = self.symbol_ref_for_target(target);
                self.emit(Opcode::Copy, value_addr, AddrId::UNUSED, dst);
                dst
            }

            NodeKind::Call { args, .. } => self.lower_call(id, args),

            other => panic!("unexpected expression node {other:?}"),
        }
    }

    fn lower_call(&mut self, id: NodeId, args: Vec<NodeId>) -> AddrId {
        let decl_id = self.ast.get(id).symbol_id.expect("call resolved before tacgen");
        let NodeKind::FuncDecl { name, .. } = self.ast.get(decl_id).kind.clone() else {
            panic!("call callee is not a FuncDecl");
        };

        let mut arg_addrs = Vec::with_capacity(args.len());
        for a in args {
            let addr = self.lower_expr(a);
            self.emit(Opcode::DeclareParameter, addr, AddrId::UNUSED, AddrId::UNUSED);
            arg_addrs.push(addr);
        }
        let arglist = self.pool.push(Address::ArgList(arg_addrs));
        let callee = self.pool.push(Address::SymbolRef { symbol: name, ty: Type::Basic(BasicType::Void) });

        let ret_ty = self.ast.get(id).ty;
        match ret_ty {
            Some(BasicType::Void) | None => {
                self.emit(Opcode::CallVoid, callee, arglist, AddrId::UNUSED);
                AddrId::UNUSED
            }
            Some(bt) => {
                let dst = self.pool.new_temp(Type::Basic(bt));
                self.emit(Opcode::CallResult, callee, arglist, dst);
                dst
            }
        }
    }
}
