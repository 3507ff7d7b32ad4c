//! The DFA minimiser: Myhill-Nerode table filling.
//!
//! Maintains an N x N `distinguishable` matrix. The base case is an
//! accept-ness mismatch; the fixed-point step propagates distinguishability
//! through transitions. Non-distinguishable state pairs are merged, each
//! remapping to the lowest-indexed member of its equivalence class, with
//! the dead state and the initial state pinned to indices 0 and 1 so the
//! DFA's standing invariant survives minimisation.

use crate::dfa::{Dfa, StateFlags};
use std::collections::HashMap;

/// Minimises `dfa` in place, returning a language-equivalent DFA with no
/// more states than the input.
pub fn minimize(dfa: &Dfa) -> Dfa {
    let n = dfa.num_states;
    let mut distinguishable = vec![vec![false; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dfa.flags[i].accept != dfa.flags[j].accept {
                distinguishable[i][j] = true;
                distinguishable[j][i] = true;
            }
        }
    }

    loop {
        let mut changed = false;
        for i in 0..n {
            for j in (i + 1)..n {
                if distinguishable[i][j] {
                    continue;
                }
                for b in 0..256usize {
                    let ti = dfa.trans[i][b] as usize;
                    let tj = dfa.trans[j][b] as usize;
                    if distinguishable[ti][tj] {
                        distinguishable[i][j] = true;
                        distinguishable[j][i] = true;
                        changed = true;
                        break;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    // Each state's class representative is the lowest-indexed state it is
    // not distinguishable from.
    let mut class_of = vec![0usize; n];
    for i in 0..n {
        let mut rep = i;
        for j in 0..i {
            if !distinguishable[i][j] {
                rep = j;
                break;
            }
        }
        class_of[i] = rep;
    }

    // Assign compacted indices, pinning the dead and initial classes first.
    let mut new_id: HashMap<usize, u32> = HashMap::new();
    new_id.insert(class_of[Dfa::DEAD as usize], 0);
    let init_rep = class_of[Dfa::INITIAL as usize];
    let next_id = new_id.len() as u32;
    new_id.entry(init_rep).or_insert(next_id);
    for i in 0..n {
        let rep = class_of[i];
        let next_id = new_id.len() as u32;
        new_id.entry(rep).or_insert(next_id);
    }

    let m = new_id.len();
    let remap: Vec<u32> = (0..n).map(|i| new_id[&class_of[i]]).collect();

    let mut rep_for_new = vec![usize::MAX; m];
    for (old, &ni) in remap.iter().enumerate() {
        let ni = ni as usize;
        if rep_for_new[ni] == usize::MAX {
            rep_for_new[ni] = old;
        }
    }

    let mut trans = vec![[0u32; 256]; m];
    let mut flags = vec![StateFlags::default(); m];
    for ni in 0..m {
        let old = rep_for_new[ni];
        for b in 0..256 {
            trans[ni][b] = remap[dfa.trans[old][b] as usize];
        }
        flags[ni] = StateFlags {
            initial: ni == Dfa::INITIAL as usize,
            accept: dfa.flags[old].accept,
            error: ni == Dfa::DEAD as usize,
        };
    }

    Dfa {
        num_states: m,
        trans,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::preprocess;
    use crate::{dfa, nfa};

    fn build_dfa(pattern: &[u8]) -> Dfa {
        let atoms = preprocess(pattern).unwrap();
        let nfa = nfa::build(&atoms).unwrap();
        dfa::build(&nfa)
    }

    #[test]
    fn minimized_dfa_never_grows() {
        let dfa = build_dfa(b"a(b|c)*");
        let min = minimize(&dfa);
        assert!(min.num_states <= dfa.num_states);
    }

    #[test]
    fn minimized_dfa_keeps_dead_and_initial_pinned() {
        let dfa = build_dfa(b"a*bbc*");
        let min = minimize(&dfa);
        assert!(min.flags[Dfa::DEAD as usize].error);
        assert!(min.flags[Dfa::INITIAL as usize].initial);
    }

    #[test]
    fn minimized_dfa_has_dense_transition_rows() {
        let dfa = build_dfa(b"(ab)+c*(ba)+");
        let min = minimize(&dfa);
        for row in &min.trans {
            assert_eq!(row.len(), 256);
            for &target in row {
                assert!((target as usize) < min.num_states);
            }
        }
    }

    #[test]
    fn redundant_states_collapse_on_equivalent_pattern() {
        // `a*a*` has a lot of NFA redundancy that subset construction then
        // minimisation should be able to collapse relative to the raw DFA.
        let dfa = build_dfa(b"a*a*");
        let min = minimize(&dfa);
        assert!(min.num_states <= dfa.num_states);
        assert!(min.num_states >= 2); // dead + at least one live state
    }
}
