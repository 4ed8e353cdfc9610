use rand::rngs::SmallRng;
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};

/// Zobrist keying over move indices.
///
/// Two random 64-bit tables, one value per move index. `codes` are masked
/// to the table-size exponent so a fingerprint code doubles as a bucket
/// index without a modulo; `keys` identify states uniquely. Values are
/// pairwise distinct within each table and keys are never zero — the zero
/// key is reserved, which guarantees a child can never share its parent's
/// key after a single XOR and lets the recycling table mark never-stored
/// nodes with key 0.
///
/// The fingerprint `(code, key)` is a XOR over the moves applied, so it
/// is invariant under move reordering: transposed paths collide by
/// design.
pub struct Keying {
    codes: Vec<u64>,
    keys: Vec<u64>,
    mask: u64,
    code: u64,
    key: u64,
}

impl Keying {
    /// Draw tables for `move_num` move indices and a bucket space of
    /// `2^code_bits` entries.
    pub fn new(move_num: usize, code_bits: u32, rng: &mut SmallRng) -> Result<Self> {
        if code_bits >= 64 || (move_num as u64) > 1u64 << code_bits {
            return Err(Error::Config(format!(
                "number of possible moves ({move_num}) is greater than the number of entries"
            )));
        }
        let mask = (1u64 << code_bits) - 1;

        let mut codes = Vec::with_capacity(move_num);
        let mut keys = Vec::with_capacity(move_num);
        let mut seen_codes = FxHashSet::default();
        let mut seen_keys = FxHashSet::default();
        for _ in 0..move_num {
            let mut c = rng.gen::<u64>() & mask;
            while !seen_codes.insert(c) {
                c = rng.gen::<u64>() & mask;
            }
            codes.push(c);

            let mut k = rng.gen::<u64>();
            while k == 0 || !seen_keys.insert(k) {
                k = rng.gen::<u64>();
            }
            keys.push(k);
        }

        Ok(Self {
            codes,
            keys,
            mask,
            code: 0,
            key: 0,
        })
    }

    /// Test hook: exact tables for reproducing collisions.
    #[cfg(test)]
    pub(crate) fn with_tables(codes: Vec<u64>, keys: Vec<u64>, code_bits: u32) -> Self {
        Self {
            codes,
            keys,
            mask: (1u64 << code_bits) - 1,
            code: 0,
            key: 0,
        }
    }

    #[inline]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    #[inline]
    pub fn code(&self) -> u64 {
        self.code
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The code the state reached by `move_idx` would have.
    #[inline]
    pub fn child_code(&self, move_idx: usize) -> u64 {
        self.code ^ self.codes[move_idx]
    }

    /// The key the state reached by `move_idx` would have.
    #[inline]
    pub fn child_key(&self, move_idx: usize) -> u64 {
        self.key ^ self.keys[move_idx]
    }

    /// Advance the fingerprint by one move.
    #[inline]
    pub fn forward(&mut self, move_idx: usize) {
        self.code ^= self.codes[move_idx];
        self.key ^= self.keys[move_idx];
    }

    /// Retract one move. XOR is self-inverse, so this is `forward`.
    #[inline]
    pub fn backward(&mut self, move_idx: usize) {
        self.forward(move_idx);
    }

    /// Reset the fingerprint to a known state, e.g. when backtracking to
    /// a stored node.
    #[inline]
    pub fn restore(&mut self, code: u64, key: u64) {
        self.code = code;
        self.key = key;
    }
}
