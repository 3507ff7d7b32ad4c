//! The DFA builder: subset construction over an NFA.
//!
//! Each DFA state corresponds to an ε-closed subset of NFA states, compared
//! for equality by a sorted sequence of node ids (an identity comparison
//! once index-based handles replace the original pointer model — see
//! `DESIGN.md`). State 0 is always the dead/error state; state 1 is always
//! the initial state.

use crate::atom::EPSILON;
use crate::nfa::{Nfa, NodeId, Trans};
use std::collections::VecDeque;

/// Per-state classification bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFlags {
    pub initial: bool,
    pub accept: bool,
    pub error: bool,
}

/// A dense N x 256 transition table plus per-state flags.
#[derive(Debug, Clone)]
pub struct Dfa {
    pub num_states: usize,
    pub trans: Vec<[u32; 256]>,
    pub flags: Vec<StateFlags>,
}

impl Dfa {
    /// The permanently-reserved dead/error state.
    pub const DEAD: u32 = 0;
    /// The permanently-reserved initial state.
    pub const INITIAL: u32 = 1;
}

/// A subset of NFA states, kept sorted by node id so equality is a linear
/// compare rather than a set operation.
type Subset = Vec<NodeId>;

fn epsilon_closure(nfa: &Nfa, seeds: &[NodeId]) -> Subset {
    let mut stack: Vec<NodeId> = seeds.to_vec();
    let mut seen: Vec<NodeId> = Vec::new();
    while let Some(n) = stack.pop() {
        if seen.contains(&n) {
            continue;
        }
        seen.push(n);
        for &(trans, to) in &nfa.state(n).out {
            if trans == Trans::Epsilon {
                stack.push(to);
            }
        }
    }
    seen.sort();
    seen.dedup();
    seen
}

fn step(nfa: &Nfa, subset: &Subset, byte: u8) -> Subset {
    let mut next: Vec<NodeId> = Vec::new();
    for &n in subset {
        for &(trans, to) in &nfa.state(n).out {
            if trans == Trans::Byte(byte) {
                next.push(to);
            }
        }
    }
    epsilon_closure(nfa, &next)
}

/// Builds a DFA from an NFA via subset construction.
pub fn build(nfa: &Nfa) -> Dfa {
    let mut subsets: Vec<Subset> = vec![Vec::new()]; // state 0: dead, empty subset
    let mut trans: Vec<[u32; 256]> = vec![[0u32; 256]]; // dead state self-loops everywhere

    let initial = epsilon_closure(nfa, &[nfa.start]);
    subsets.push(initial);
    trans.push([0u32; 256]);

    let mut worklist: VecDeque<usize> = VecDeque::new();
    worklist.push_back(Dfa::INITIAL as usize);

    while let Some(s) = worklist.pop_front() {
        for b in 0u16..256 {
            let byte = b as u8;
            if byte == EPSILON {
                trans[s][b as usize] = Dfa::DEAD;
                continue;
            }
            let next = step(nfa, &subsets[s], byte);
            if next.is_empty() {
                trans[s][b as usize] = Dfa::DEAD;
                continue;
            }
            let existing = subsets.iter().position(|candidate| candidate == &next);
            let target = match existing {
                Some(idx) => idx,
                None => {
                    subsets.push(next);
                    trans.push([0u32; 256]);
                    let idx = subsets.len() - 1;
                    worklist.push_back(idx);
                    idx
                }
            };
            trans[s][b as usize] = target as u32;
        }
    }

    let flags: Vec<StateFlags> = subsets
        .iter()
        .enumerate()
        .map(|(idx, subset)| StateFlags {
            initial: idx == Dfa::INITIAL as usize,
            accept: subset.contains(&nfa.accept),
            error: idx == Dfa::DEAD as usize,
        })
        .collect();

    Dfa {
        num_states: subsets.len(),
        trans,
        flags,
    }
}
