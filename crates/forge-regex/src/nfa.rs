//! The NFA builder: Thompson construction over an atom list.
//!
//! Walks the atom list recursively between matched paren pairs, maintaining
//! a *concat list* of fragments to be chained and a *union list* of
//! already-sealed alternatives, exactly as described by the construction
//! rules for `*`, `+`, `?`, `|`, and parenthesised groups.

use crate::atom::{Atom, ByteClass, Operator};
use crate::error::RegexError;
use forge_base::Span;

/// An index-based handle to an NFA state. States never move once
/// allocated, so handles stay valid for the life of the [`Nfa`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An outgoing transition: either a labelled byte edge or an epsilon edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trans {
    Byte(u8),
    Epsilon,
}

/// A single NFA state: its outgoing transitions.
#[derive(Debug, Clone, Default)]
pub struct NfaState {
    pub out: Vec<(Trans, NodeId)>,
}

/// The built automaton: an owned sequence of states plus distinguished
/// initial and accepting state references.
#[derive(Debug)]
pub struct Nfa {
    pub states: Vec<NfaState>,
    pub start: NodeId,
    pub accept: NodeId,
}

impl Nfa {
    pub fn state(&self, id: NodeId) -> &NfaState {
        &self.states[id.index()]
    }
}

/// A sub-NFA under construction: one entry state and one accepting state,
/// with no outgoing edges from the accepting state until the fragment is
/// wired into a larger one.
#[derive(Clone, Copy)]
struct Frag {
    start: NodeId,
    accept: NodeId,
}

struct Builder {
    states: Vec<NfaState>,
}

impl Builder {
    fn alloc(&mut self) -> NodeId {
        self.states.push(NfaState::default());
        NodeId((self.states.len() - 1) as u32)
    }

    fn edge(&mut self, from: NodeId, trans: Trans, to: NodeId) {
        self.states[from.index()].out.push((trans, to));
    }
}

/// Builds an NFA from a preprocessed atom list.
pub fn build(atoms: &[Atom]) -> Result<Nfa, RegexError> {
    let mut b = Builder { states: Vec::new() };
    let frag = build_scope(atoms, 0, atoms.len(), &mut b)?;
    Ok(Nfa {
        states: b.states,
        start: frag.start,
        accept: frag.accept,
    })
}

fn class_frag(b: &mut Builder, class: &ByteClass) -> Frag {
    let start = b.alloc();
    let accept = b.alloc();
    for byte in class.iter() {
        b.edge(start, Trans::Byte(byte), accept);
    }
    Frag { start, accept }
}

fn apply_postfix(b: &mut Builder, frag: Frag, op: Operator) -> Frag {
    match op {
        Operator::Star => {
            let entry = b.alloc();
            let exit = b.alloc();
            b.edge(entry, Trans::Epsilon, frag.start);
            b.edge(entry, Trans::Epsilon, exit);
            b.edge(frag.accept, Trans::Epsilon, frag.start);
            b.edge(frag.accept, Trans::Epsilon, exit);
            Frag { start: entry, accept: exit }
        }
        Operator::Plus => {
            let entry = b.alloc();
            let exit = b.alloc();
            b.edge(entry, Trans::Epsilon, frag.start);
            b.edge(frag.accept, Trans::Epsilon, frag.start);
            b.edge(frag.accept, Trans::Epsilon, exit);
            Frag { start: entry, accept: exit }
        }
        Operator::Question => {
            let exit = b.alloc();
            b.edge(frag.start, Trans::Epsilon, exit);
            b.edge(frag.accept, Trans::Epsilon, exit);
            Frag { start: frag.start, accept: exit }
        }
        Operator::Alt => unreachable!("'|' is not a postfix operator"),
    }
}

/// Concatenates a sealed run of fragments by epsilon-joining each
/// fragment's accept state to the next fragment's start state.
fn concat_all(b: &mut Builder, frags: &[Frag]) -> Frag {
    let mut iter = frags.iter().copied();
    let mut acc = iter.next().expect("concat_all requires at least one fragment");
    for next in iter {
        b.edge(acc.accept, Trans::Epsilon, next.start);
        acc = Frag { start: acc.start, accept: next.accept };
    }
    acc
}

/// Unions a list of already-sealed alternatives behind a fresh
/// epsilon-branching entry/exit pair.
fn union_all(b: &mut Builder, alts: &[Frag]) -> Frag {
    let entry = b.alloc();
    let exit = b.alloc();
    for alt in alts {
        b.edge(entry, Trans::Epsilon, alt.start);
        b.edge(alt.accept, Trans::Epsilon, exit);
    }
    Frag { start: entry, accept: exit }
}

fn seal_concat(concat: &mut Vec<Frag>, b: &mut Builder, at: usize) -> Result<Frag, RegexError> {
    if concat.is_empty() {
        return Err(RegexError::DanglingOperator { op: '|', span: Span::new(at, at + 1) });
    }
    let sealed = concat_all(b, concat);
    concat.clear();
    Ok(sealed)
}

/// Builds the fragment spanning atoms `[lo, hi)` — either the whole
/// pattern or the interior of one matched paren pair.
fn build_scope(atoms: &[Atom], lo: usize, hi: usize, b: &mut Builder) -> Result<Frag, RegexError> {
    let mut concat: Vec<Frag> = Vec::new();
    let mut alternatives: Vec<Frag> = Vec::new();

    let mut i = lo;
    while i < hi {
        match &atoms[i] {
            Atom::Class(class) => {
                concat.push(class_frag(b, class));
                i += 1;
            }
            Atom::LParen { match_pos } => {
                let inner = build_scope(atoms, i + 1, *match_pos, b)?;
                concat.push(inner);
                i = match_pos + 1;
            }
            Atom::RParen { .. } => unreachable!("reached ')' outside of LParen jump"),
            Atom::Op(Operator::Alt) => {
                let sealed = seal_concat(&mut concat, b, i)?;
                alternatives.push(sealed);
                i += 1;
            }
            Atom::Op(op) => {
                let op = *op;
                let last = concat
                    .pop()
                    .ok_or_else(|| RegexError::DanglingOperator { op: op_symbol(op), span: Span::new(i, i + 1) })?;
                concat.push(apply_postfix(b, last, op));
                i += 1;
            }
        }
    }

    if concat.is_empty() && !alternatives.is_empty() {
        // Trailing '|' with nothing after it, e.g. "a|".
        return Err(RegexError::DanglingOperator { op: '|', span: Span::new(hi, hi) });
    }
    let sealed = concat_all(b, &concat);
    if alternatives.is_empty() {
        Ok(sealed)
    } else {
        alternatives.push(sealed);
        Ok(union_all(b, &alternatives))
    }
}

fn op_symbol(op: Operator) -> char {
    match op {
        Operator::Star => '*',
        Operator::Plus => '+',
        Operator::Question => '?',
        Operator::Alt => '|',
    }
}
