//! x86-64 System V assembly emission, AT&T syntax.
//!
//! Each forge function lowers to a dot-prefixed local label (`.main`,
//! `.add`, ...) so it never collides with the synthesized C `main` this
//! module also emits, which simply calls the source language's own
//! `main` function and exits 0.

mod frame;

use std::collections::HashSet;

use forge_base::{Interner, Symbol, SymbolEq};

use crate::address::{AddrId, Address, AddressPool, Instr, Opcode};
use crate::error::CodegenError;
use crate::tacgen::FunctionCode;
use crate::types::Type;
use forge_lang::ast::BasicType;

pub use frame::{Frame, FrameKey};
use frame::{classify_params, ParamLoc};

const INT_ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
const SSE_ARG_REGS: [&str; 8] = ["%xmm0", "%xmm1", "%xmm2", "%xmm3", "%xmm4", "%xmm5", "%xmm6", "%xmm7"];

struct ConstPool {
    strings: Vec<(AddrId, Symbol)>,
    reals: Vec<(AddrId, f64)>,
}

impl ConstPool {
    fn collect(funcs: &[FunctionCode], pool: &AddressPool) -> ConstPool {
        let mut strings = Vec::new();
        let mut reals = Vec::new();
        let mut seen = HashSet::new();
        for func in funcs {
            for instr in &func.instrs {
                for addr in [instr.src1, instr.src2, instr.dst] {
                    if !seen.insert(addr) {
                        continue;
                    }
                    match pool.get(addr) {
                        Address::StringConst(sym) => strings.push((addr, *sym)),
                        Address::RealConst(v) => reals.push((addr, *v)),
                        _ => {}
                    }
                }
            }
        }
        ConstPool { strings, reals }
    }

    fn string_label(&self, addr: AddrId) -> String {
        format!(".Lstr{}", addr.0)
    }

    fn real_label(&self, addr: AddrId) -> String {
        format!(".Lreal{}", addr.0)
    }
}

/// Emits a complete assembly-language translation unit for `funcs`.
/// `globals` lists every top-level (BSS-resident) variable declaration.
pub fn emit_program(
    funcs: &[FunctionCode],
    pool: &AddressPool,
    interner: &Interner,
    globals: &[(Symbol, BasicType)],
) -> Result<String, CodegenError> {
    let global_set: HashSet<Symbol> = globals.iter().map(|(s, _)| *s).collect();
    let consts = ConstPool::collect(funcs, pool);

    let mut out = String::new();
    out.push_str(".text\n");

    for func in funcs {
        let frame = Frame::build_with_globals(func, pool, &global_set);
        emit_function(&mut out, func, pool, interner, &frame, &global_set, &consts)?;
    }

    emit_safety_wrappers(&mut out);

    if funcs.iter().any(|f| f.name.is(interner, "main")) {
        out.push_str("\n.globl main\nmain:\n");
        out.push_str("    pushq %rbp\n");
        out.push_str("    movq %rsp, %rbp\n");
        out.push_str("    call .main\n");
        out.push_str("    movl $0, %eax\n");
        out.push_str("    popq %rbp\n");
        out.push_str("    ret\n");
    }

    out.push_str("\n.section .rodata\n");
    out.push_str(".Lfmt_int: .string \"%ld\"\n");
    out.push_str(".Lfmt_real: .string \"%f\"\n");
    out.push_str(".Lfmt_str: .string \"%s\"\n");
    out.push_str(".Lfmt_char: .string \"%c\"\n");
    for (addr, sym) in &consts.strings {
        out.push_str(&format!("{}: .string \"{}\"\n", consts.string_label(*addr), escape_string(interner.resolve(*sym))));
    }
    for (addr, v) in &consts.reals {
        out.push_str(&format!("{}: .double {:?}\n", consts.real_label(*addr), v));
    }

    if !globals.is_empty() {
        out.push_str("\n.section .bss\n");
        for (sym, _) in globals {
            out.push_str(&format!(".align 8\n{}: .zero 8\n", interner.resolve(*sym)));
        }
    }

    Ok(out)
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn emit_safety_wrappers(out: &mut String) {
    for (name, target) in [("safe_putchar", "putchar"), ("safe_printf", "printf"), ("safe_malloc", "malloc")] {
        out.push_str(&format!(
            "\n{name}:\n    pushq %rbp\n    movq %rsp, %rbp\n    andq $-16, %rsp\n    call {target}\n    movq %rbp, %rsp\n    popq %rbp\n    ret\n"
        ));
    }
}

struct FuncCtx<'a> {
    pool: &'a AddressPool,
    interner: &'a Interner,
    frame: &'a Frame,
    globals: &'a HashSet<Symbol>,
    consts: &'a ConstPool,
    epilogue: String,
    ret_ty: BasicType,
}

fn emit_function(
    out: &mut String,
    func: &FunctionCode,
    pool: &AddressPool,
    interner: &Interner,
    frame: &Frame,
    globals: &HashSet<Symbol>,
    consts: &ConstPool,
) -> Result<(), CodegenError> {
    let fname = interner.resolve(func.name);
    out.push_str(&format!("\n.{fname}:\n"));
    out.push_str("    pushq %rbp\n");
    out.push_str("    movq %rsp, %rbp\n");

    let is_real: Vec<bool> = func.params.iter().map(|(_, ty)| *ty == BasicType::Real).collect();
    let param_locs = classify_params(&is_real);
    for ((name, _), loc) in func.params.iter().zip(param_locs.iter()) {
        if globals.contains(name) {
            continue;
        }
        let off = frame.offset_of(FrameKey::Symbol(*name));
        match loc {
            ParamLoc::IntReg(i) => out.push_str(&format!("    movq {}, {}(%rbp)\n", INT_ARG_REGS[*i], off)),
            ParamLoc::SseReg(i) => out.push_str(&format!("    movsd {}, {}(%rbp)\n", SSE_ARG_REGS[*i], off)),
            ParamLoc::Stack(_) => {}
        }
    }
    if frame.size > 0 {
        out.push_str(&format!("    subq ${}, %rsp\n", frame.size));
    }

    let ctx = FuncCtx {
        pool,
        interner,
        frame,
        globals,
        consts,
        epilogue: format!(".Lepilogue_{fname}"),
        ret_ty: func.ret,
    };

    // Labels are targets of backpatched addresses; find every address
    // whose placed target equals this instruction's index and print it
    // before lowering the instruction itself.
    let label_targets = collect_label_targets(func, pool);

    for (idx, instr) in func.instrs.iter().enumerate() {
        if let Some(label_id) = label_targets.get(&idx) {
            out.push_str(&format!("{}:\n", local_label(*label_id)));
        }
        emit_instr(out, &ctx, instr)?;
    }

    out.push_str(&format!("{}:\n", ctx.epilogue));
    out.push_str("    movq %rbp, %rsp\n");
    out.push_str("    popq %rbp\n");
    out.push_str("    ret\n");
    Ok(())
}

fn collect_label_targets(func: &FunctionCode, pool: &AddressPool) -> std::collections::HashMap<usize, u32> {
    let mut out = std::collections::HashMap::new();
    for instr in &func.instrs {
        for addr in [instr.src1, instr.src2, instr.dst] {
            if let Address::Label { id, target: Some(t) } = pool.get(addr) {
                out.insert(*t, *id);
            }
        }
    }
    out
}

fn local_label(id: u32) -> String {
    format!(".L{id}")
}

fn emit_instr(out: &mut String, ctx: &FuncCtx, instr: &Instr) -> Result<(), CodegenError> {
    match instr.op {
        Opcode::Nop | Opcode::DeclareParameter => {}

        Opcode::Copy => {
            if is_real(ctx, instr.src1) {
                load_real(out, ctx, instr.src1, "%xmm0");
                store_real(out, ctx, "%xmm0", instr.dst);
            } else {
                load_int(out, ctx, instr.src1, "%rax");
                store_int(out, ctx, "%rax", instr.dst);
            }
        }

        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
            emit_binary_arith(out, ctx, instr)?;
        }

        Opcode::Gt | Opcode::Lt | Opcode::Ge | Opcode::Le | Opcode::Eq | Opcode::Ne => {
            emit_comparison(out, ctx, instr);
        }

        Opcode::Neg => {
            if is_real(ctx, instr.src1) {
                return Err(CodegenError::RealUnaryNegateNotImplemented);
            }
            load_int(out, ctx, instr.src1, "%rax");
            out.push_str("    negq %rax\n");
            store_int(out, ctx, "%rax", instr.dst);
        }

        Opcode::Not => {
            load_int(out, ctx, instr.src1, "%rax");
            out.push_str("    testq %rax, %rax\n");
            out.push_str("    sete %al\n");
            out.push_str("    movzbq %al, %rax\n");
            store_int(out, ctx, "%rax", instr.dst);
        }

        Opcode::CastRealToInt => {
            if !is_real(ctx, instr.src1) {
                return Err(CodegenError::UnsupportedIntCast { from: type_name_of(ctx, instr.src1) });
            }
            load_real(out, ctx, instr.src1, "%xmm0");
            out.push_str("    cvttsd2si %xmm0, %rax\n");
            store_int(out, ctx, "%rax", instr.dst);
        }

        Opcode::IfFalseGoto => {
            load_int(out, ctx, instr.src1, "%rax");
            out.push_str("    testq %rax, %rax\n");
            out.push_str(&format!("    jz {}\n", label_name(ctx, instr.src2)));
        }

        Opcode::Goto => {
            out.push_str(&format!("    jmp {}\n", label_name(ctx, instr.src1)));
        }

        Opcode::Return => {
            if instr.src1 != AddrId::UNUSED {
                if ctx.ret_ty == BasicType::Real {
                    load_real(out, ctx, instr.src1, "%xmm0");
                } else {
                    load_int(out, ctx, instr.src1, "%rax");
                }
            }
            out.push_str(&format!("    jmp {}\n", ctx.epilogue));
        }

        Opcode::CallVoid | Opcode::CallResult => {
            emit_call(out, ctx, instr)?;
        }

        Opcode::AddressOf | Opcode::LoadIndirect | Opcode::StoreIndirect => {
            return Err(CodegenError::Unimplemented(
                "pointer/array operations (no surface syntax constructs them)".into(),
            ));
        }
    }
    Ok(())
}

fn emit_binary_arith(out: &mut String, ctx: &FuncCtx, instr: &Instr) -> Result<(), CodegenError> {
    if is_real(ctx, instr.src1) {
        if instr.op == Opcode::Mod {
            return Err(CodegenError::RealModuloNotImplemented);
        }
        load_real(out, ctx, instr.src1, "%xmm0");
        load_real(out, ctx, instr.src2, "%xmm1");
        let op = match instr.op {
            Opcode::Add => "addsd",
            Opcode::Sub => "subsd",
            Opcode::Mul => "mulsd",
            Opcode::Div => "divsd",
            _ => unreachable!(),
        };
        out.push_str(&format!("    {op} %xmm1, %xmm0\n"));
        store_real(out, ctx, "%xmm0", instr.dst);
    } else {
        load_int(out, ctx, instr.src1, "%rax");
        load_int(out, ctx, instr.src2, "%rcx");
        match instr.op {
            Opcode::Add => out.push_str("    addq %rcx, %rax\n"),
            Opcode::Sub => out.push_str("    subq %rcx, %rax\n"),
            Opcode::Mul => out.push_str("    imulq %rcx, %rax\n"),
            Opcode::Div => {
                out.push_str("    cqto\n");
                out.push_str("    idivq %rcx\n");
            }
            Opcode::Mod => {
                out.push_str("    cqto\n");
                out.push_str("    idivq %rcx\n");
                out.push_str("    movq %rdx, %rax\n");
            }
            _ => unreachable!(),
        }
        store_int(out, ctx, "%rax", instr.dst);
    }
    Ok(())
}

fn emit_comparison(out: &mut String, ctx: &FuncCtx, instr: &Instr) {
    let setcc = match instr.op {
        Opcode::Gt => "setg",
        Opcode::Lt => "setl",
        Opcode::Ge => "setge",
        Opcode::Le => "setle",
        Opcode::Eq => "sete",
        Opcode::Ne => "setne",
        _ => unreachable!(),
    };
    if is_real(ctx, instr.src1) {
        load_real(out, ctx, instr.src1, "%xmm0");
        load_real(out, ctx, instr.src2, "%xmm1");
        out.push_str("    ucomisd %xmm1, %xmm0\n");
    } else {
        load_int(out, ctx, instr.src1, "%rax");
        load_int(out, ctx, instr.src2, "%rcx");
        out.push_str("    cmpq %rcx, %rax\n");
    }
    out.push_str(&format!("    {setcc} %al\n"));
    out.push_str("    movzbq %al, %rax\n");
    store_int(out, ctx, "%rax", instr.dst);
}

fn emit_call(out: &mut String, ctx: &FuncCtx, instr: &Instr) -> Result<(), CodegenError> {
    let Address::SymbolRef { symbol: callee, .. } = ctx.pool.get(instr.src1) else {
        panic!("call instruction's src1 must be a function SymbolRef");
    };
    let name = ctx.interner.resolve(*callee);

    let Address::ArgList(args) = ctx.pool.get(instr.src2) else {
        panic!("call instruction's src2 must be an ArgList");
    };

    if callee.is(ctx.interner, "print") || callee.is(ctx.interner, "println") {
        for &arg in args {
            emit_inline_print(out, ctx, arg);
        }
        if callee.is(ctx.interner, "println") {
            out.push_str("    movl $10, %edi\n");
            out.push_str("    call safe_putchar\n");
        }
        return Ok(());
    }

    let arg_is_real: Vec<bool> = args.iter().map(|&a| is_real(ctx, a)).collect();
    let arg_locs = classify_params(&arg_is_real);

    let stack_args: Vec<(AddrId, bool)> =
        args.iter().zip(arg_is_real.iter()).zip(arg_locs.iter()).filter_map(|((&a, &real), loc)| match loc {
            ParamLoc::Stack(_) => Some((a, real)),
            _ => None,
        }).collect();
    let needs_align_pad = stack_args.len() % 2 == 1;
    if needs_align_pad {
        out.push_str("    pushq $0\n");
    }
    for &(arg, real) in stack_args.iter().rev() {
        if real {
            load_real(out, ctx, arg, "%xmm0");
            out.push_str("    subq $8, %rsp\n");
            out.push_str("    movsd %xmm0, (%rsp)\n");
        } else {
            load_int(out, ctx, arg, "%rax");
            out.push_str("    pushq %rax\n");
        }
    }
    for (&arg, loc) in args.iter().zip(arg_locs.iter()) {
        match loc {
            ParamLoc::IntReg(i) => load_int(out, ctx, arg, INT_ARG_REGS[*i]),
            ParamLoc::SseReg(i) => load_real(out, ctx, arg, SSE_ARG_REGS[*i]),
            ParamLoc::Stack(_) => {}
        }
    }
    out.push_str(&format!("    call .{name}\n"));
    let removed = stack_args.len() * 8 + if needs_align_pad { 8 } else { 0 };
    if removed > 0 {
        out.push_str(&format!("    addq ${removed}, %rsp\n"));
    }
    if instr.op == Opcode::CallResult {
        if let Address::Temp { ty: Type::Basic(BasicType::Real), .. } = ctx.pool.get(instr.dst) {
            store_real(out, ctx, "%xmm0", instr.dst);
        } else {
            store_int(out, ctx, "%rax", instr.dst);
        }
    }
    Ok(())
}

fn emit_inline_print(out: &mut String, ctx: &FuncCtx, arg: AddrId) {
    let fmt = match ctx.pool.get(arg) {
        Address::StringConst(_) => ".Lfmt_str",
        Address::RealConst(_) => ".Lfmt_real",
        Address::SymbolRef { ty: Type::Basic(BasicType::Real), .. } | Address::Temp { ty: Type::Basic(BasicType::Real), .. } => {
            ".Lfmt_real"
        }
        Address::SymbolRef { ty: Type::Basic(BasicType::Char), .. } | Address::Temp { ty: Type::Basic(BasicType::Char), .. } => {
            ".Lfmt_char"
        }
        _ => ".Lfmt_int",
    };
    out.push_str(&format!("    leaq {fmt}(%rip), %rdi\n"));
    if fmt == ".Lfmt_real" {
        load_real(out, ctx, arg, "%xmm0");
        out.push_str("    movb $1, %al\n");
    } else if fmt == ".Lfmt_str" {
        load_string_addr(out, ctx, arg, "%rsi");
        out.push_str("    movb $0, %al\n");
    } else {
        load_int(out, ctx, arg, "%rsi");
        out.push_str("    movb $0, %al\n");
    }
    out.push_str("    call safe_printf\n");
}

fn is_real(ctx: &FuncCtx, addr: AddrId) -> bool {
    matches!(
        ctx.pool.get(addr),
        Address::RealConst(_)
            | Address::SymbolRef { ty: Type::Basic(BasicType::Real), .. }
            | Address::Temp { ty: Type::Basic(BasicType::Real), .. }
    )
}

fn type_name_of(ctx: &FuncCtx, addr: AddrId) -> String {
    match ctx.pool.get(addr) {
        Address::SymbolRef { ty, .. } | Address::Temp { ty, .. } => ty.to_string(),
        Address::IntConst(_) => "int".into(),
        Address::RealConst(_) => "real".into(),
        Address::BoolConst(_) => "bool".into(),
        Address::StringConst(_) => "string".into(),
        other => format!("{other:?}"),
    }
}

fn label_name(ctx: &FuncCtx, addr: AddrId) -> String {
    match ctx.pool.get(addr) {
        Address::Label { id, .. } => local_label(*id),
        other => panic!("expected a label address, found {other:?}"),
    }
}

fn mem_operand(ctx: &FuncCtx, addr: AddrId) -> String {
    match ctx.pool.get(addr) {
        Address::SymbolRef { symbol, .. } => {
            if ctx.globals.contains(symbol) {
                format!("{}(%rip)", ctx.interner.resolve(*symbol))
            } else {
                format!("{}(%rbp)", ctx.frame.offset_of(FrameKey::Symbol(*symbol)))
            }
        }
        Address::Temp { id, .. } => format!("{}(%rbp)", ctx.frame.offset_of(FrameKey::Temp(*id))),
        other => panic!("expected a memory-resident address, found {other:?}"),
    }
}

fn load_int(out: &mut String, ctx: &FuncCtx, addr: AddrId, reg: &str) {
    match ctx.pool.get(addr) {
        Address::IntConst(v) => out.push_str(&format!("    movq ${v}, {reg}\n")),
        Address::BoolConst(b) => out.push_str(&format!("    movq ${}, {reg}\n", if *b { 1 } else { 0 })),
        Address::StringConst(_) => load_string_addr(out, ctx, addr, reg),
        Address::Unused => out.push_str(&format!("    xorq {reg}, {reg}\n")),
        _ => out.push_str(&format!("    movq {}, {reg}\n", mem_operand(ctx, addr))),
    }
}

fn load_string_addr(out: &mut String, ctx: &FuncCtx, addr: AddrId, reg: &str) {
    let label = ctx.consts.string_label(addr);
    out.push_str(&format!("    leaq {label}(%rip), {reg}\n"));
}

fn store_int(out: &mut String, ctx: &FuncCtx, reg: &str, addr: AddrId) {
    if addr == AddrId::UNUSED {
        return;
    }
    out.push_str(&format!("    movq {reg}, {}\n", mem_operand(ctx, addr)));
}

fn load_real(out: &mut String, ctx: &FuncCtx, addr: AddrId, reg: &str) {
    match ctx.pool.get(addr) {
        Address::RealConst(_) => {
            let label = ctx.consts.real_label(addr);
            out.push_str(&format!("    movsd {label}(%rip), {reg}\n"));
        }
        _ => out.push_str(&format!("    movsd {}, {reg}\n", mem_operand(ctx, addr))),
    }
}

fn store_real(out: &mut String, ctx: &FuncCtx, reg: &str, addr: AddrId) {
    if addr == AddrId::UNUSED {
        return;
    }
    out.push_str(&format!("    movsd {reg}, {}\n", mem_operand(ctx, addr)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tacgen::{flatten_globals, generate};
    use crate::typecheck::typecheck;
    use forge_lang::ast::NodeKind;
    use forge_lang::resolve::resolve;
    use forge_lang::Parser;

    fn compile(src: &str) -> String {
        let mut interner = Interner::new();
        let (mut ast, root) = Parser::new(src.as_bytes(), &mut interner).parse_program().unwrap();
        resolve(&mut ast, &mut interner, root).unwrap();
        typecheck(&mut ast, &interner, root).unwrap();
        let mut pool = AddressPool::new();
        let top_level: Vec<_> = match &ast.get(root).kind {
            NodeKind::Program { globals } => globals.clone(),
            _ => vec![],
        };
        let funcs = generate(&ast, &mut interner, &mut pool, root);
        let globals = flatten_globals(&ast, &mut interner, &top_level);
        emit_program(&funcs, &pool, &interner, &globals).unwrap()
    }

    /// Scenario 5: `main := () -> void { println("hello"); }` emits a
    /// `.main` label, loads the string's address into RSI, and calls
    /// `safe_printf` exactly once followed by `safe_putchar` with '\n'.
    #[test]
    fn println_hello_world_matches_the_expected_shape() {
        let asm = compile(r#"main := () -> void { println("hello"); }"#);
        assert!(asm.contains(".main:"));
        assert_eq!(asm.matches("call safe_printf").count(), 1);
        assert!(asm.contains("call safe_putchar"));
        assert!(asm.contains("%rsi"));
        let printf_pos = asm.find("call safe_printf").unwrap();
        let putchar_pos = asm.find("call safe_putchar").unwrap();
        assert!(printf_pos < putchar_pos);
    }

    /// Scenario 6: `f := (int a, int b) -> int { return a + b; }` moves
    /// operands into RAX/RCX and emits `addq %rcx, %rax`.
    #[test]
    fn integer_addition_uses_rax_rcx() {
        let asm = compile("f := (int a, int b) -> int { return a + b; }");
        assert!(asm.contains("%rax"));
        assert!(asm.contains("%rcx"));
        assert!(asm.contains("addq %rcx, %rax"));
    }

    #[test]
    fn real_unary_negate_is_a_codegen_error() {
        let mut interner = Interner::new();
        let src = "f := (real x) -> real { return -x; }";
        let (mut ast, root) = Parser::new(src.as_bytes(), &mut interner).parse_program().unwrap();
        resolve(&mut ast, &mut interner, root).unwrap();
        typecheck(&mut ast, &interner, root).unwrap();
        let mut pool = AddressPool::new();
        let funcs = generate(&ast, &mut interner, &mut pool, root);
        let err = emit_program(&funcs, &pool, &interner, &[]).unwrap_err();
        assert_eq!(err, CodegenError::RealUnaryNegateNotImplemented);
    }

    #[test]
    fn global_variable_is_addressed_via_rip_relative_bss_symbol() {
        let asm = compile("int counter := 0; bump := () -> void { counter := counter + 1; }");
        assert!(asm.contains("counter(%rip)"));
        assert!(asm.contains(".section .bss"));
    }

    #[test]
    fn if_false_goto_and_goto_lower_to_jz_and_jmp() {
        let asm = compile("f := (int x) -> void { if (x > 0) { println(x); } else { println(x); } }");
        assert!(asm.contains("jz "));
        assert!(asm.contains("jmp "));
    }
}
