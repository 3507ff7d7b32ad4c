//! Matching: full-match and longest-prefix-match over bytes.

use crate::dfa::Dfa;

impl Dfa {
    /// Returns `true` if the entire input is accepted.
    ///
    /// Walks from the initial state, following one transition per byte.
    /// Short-circuits to `false` the moment the dead state is entered.
    pub fn accepts(&self, input: &[u8]) -> bool {
        let mut state = Dfa::INITIAL;
        for &byte in input {
            state = self.trans[state as usize][byte as usize];
            if state == Dfa::DEAD {
                return false;
            }
        }
        self.flags[state as usize].accept
    }

    /// Returns the length of the longest prefix of `input` (capped at
    /// `max_len` bytes) that the DFA accepts, or 0 if no prefix matches.
    ///
    /// Extending the scanned input by a byte never decreases the result:
    /// the walk only ever records a *later* accepting position.
    pub fn longest_match(&self, input: &[u8], max_len: usize) -> usize {
        let mut state = Dfa::INITIAL;
        let mut best = 0usize;
        if self.flags[state as usize].accept {
            best = 0;
        }
        let limit = max_len.min(input.len());
        for (i, &byte) in input.iter().take(limit).enumerate() {
            state = self.trans[state as usize][byte as usize];
            if state == Dfa::DEAD {
                return best;
            }
            if self.flags[state as usize].accept {
                best = i + 1;
            }
        }
        best
    }
}
