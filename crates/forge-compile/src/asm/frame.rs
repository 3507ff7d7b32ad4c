//! Per-function stack frame layout: assigns every referenced local
//! variable, parameter, and temporary a frame offset ahead of lowering.

use std::collections::{HashMap, HashSet};

use forge_base::Symbol;

use crate::address::{Address, AddressPool, Instr};
use crate::tacgen::FunctionCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKey {
    Symbol(Symbol),
    Temp(u32),
}

/// The first six integer/pointer parameters arrive in registers and are
/// homed into negative-offset slots on entry; parameters beyond that are
/// caller-pushed and read from positive offsets.
pub const REGISTER_ARG_COUNT: usize = 6;
/// The first eight real parameters arrive in XMM registers.
pub const SSE_ARG_COUNT: usize = 8;

/// Where one argument lands under the System V classification: its own
/// integer/pointer or SSE register index, or a position among the
/// stack-passed overflow arguments (0-based, in left-to-right order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLoc {
    IntReg(usize),
    SseReg(usize),
    Stack(i32),
}

/// Classifies `is_real` (indexed by argument position) into per-class
/// register assignments. Integer and real arguments consume independent
/// register files, so a real argument doesn't "use up" an integer
/// register and vice versa — only once a class's own registers are
/// exhausted does an argument of that class spill to the stack.
pub fn classify_params(is_real: &[bool]) -> Vec<ParamLoc> {
    let mut int_idx = 0usize;
    let mut sse_idx = 0usize;
    let mut stack_idx = 0i32;
    is_real
        .iter()
        .map(|&real| {
            if real {
                if sse_idx < SSE_ARG_COUNT {
                    let loc = ParamLoc::SseReg(sse_idx);
                    sse_idx += 1;
                    loc
                } else {
                    let loc = ParamLoc::Stack(stack_idx);
                    stack_idx += 1;
                    loc
                }
            } else if int_idx < REGISTER_ARG_COUNT {
                let loc = ParamLoc::IntReg(int_idx);
                int_idx += 1;
                loc
            } else {
                let loc = ParamLoc::Stack(stack_idx);
                stack_idx += 1;
                loc
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct Frame {
    offsets: HashMap<FrameKey, i32>,
    /// Total negative-offset space required, already rounded to 16 bytes.
    pub size: i32,
}

impl Frame {
    pub fn offset_of(&self, key: FrameKey) -> i32 {
        *self.offsets.get(&key).unwrap_or_else(|| panic!("no frame slot for {key:?}"))
    }

    pub fn build(func: &FunctionCode, pool: &AddressPool) -> Frame {
        Frame::build_with_globals(func, pool, &HashSet::new())
    }

    /// Like [`Frame::build`], but symbols in `globals` never get a stack
    /// slot — they live in `.bss` and are addressed `name(%rip)` instead.
    pub fn build_with_globals(func: &FunctionCode, pool: &AddressPool, globals: &HashSet<Symbol>) -> Frame {
        let mut offsets = HashMap::new();
        let mut next_local_slot: i32 = 0;

        let is_real: Vec<bool> = func.params.iter().map(|(_, ty)| *ty == forge_lang::ast::BasicType::Real).collect();
        let locs = classify_params(&is_real);
        for ((name, _), loc) in func.params.iter().zip(locs.iter()) {
            if globals.contains(name) {
                continue;
            }
            match loc {
                ParamLoc::IntReg(_) | ParamLoc::SseReg(_) => {
                    next_local_slot += 8;
                    offsets.insert(FrameKey::Symbol(*name), -next_local_slot);
                }
                ParamLoc::Stack(stack_index) => {
                    offsets.insert(FrameKey::Symbol(*name), 16 + 8 * stack_index);
                }
            }
        }

        let mut seen: HashSet<FrameKey> = offsets.keys().copied().collect();
        for instr in &func.instrs {
            for addr in referenced_addrs(instr) {
                let key = match pool.get(addr) {
                    Address::SymbolRef { symbol, .. } => {
                        if globals.contains(symbol) {
                            continue;
                        }
                        FrameKey::Symbol(*symbol)
                    }
                    Address::Temp { id, .. } => FrameKey::Temp(*id),
                    _ => continue,
                };
                if seen.insert(key) {
                    next_local_slot += 8;
                    offsets.insert(key, -next_local_slot);
                }
            }
        }

        let size = round_up_16(next_local_slot);
        Frame { offsets, size }
    }
}

fn referenced_addrs(instr: &Instr) -> [crate::address::AddrId; 3] {
    [instr.src1, instr.src2, instr.dst]
}

fn round_up_16(n: i32) -> i32 {
    (n + 15) & !15
}
