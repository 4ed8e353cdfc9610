use rand::rngs::SmallRng;

use crate::error::{Error, Result};
use crate::zobrist::Keying;

/// Reserved bucket slot value meaning "no node".
pub(crate) const EMPTY: u32 = u32::MAX;

/// What the replacement policy and the scheduler need to know about a
/// node payload, independent of the exploration strategy.
pub trait NodeStats: Default {
    fn visit_count(&self) -> f64;
    fn state_score(&self) -> f64;
}

/// Transposition table capability set consumed by the exploration nodes
/// and the driver. Nodes are owned by the table; the search path and the
/// current fingerprint are part of the table state, so callers only ever
/// speak in move indices.
///
/// `init` closures must fully reinitialise the payload they are handed:
/// tables recycle node storage and the previous contents are arbitrary.
pub trait TransTable {
    type Node;

    /// Look up the child reached by `move_idx` from the current state.
    /// Does not advance anything.
    fn lookup(&self, move_idx: usize) -> Option<&Self::Node>;

    /// Follow an existing child: advance the fingerprint and push the
    /// child onto the search path. The child must be present.
    fn advance(&mut self, move_idx: usize);

    /// Advance the fingerprint and insert a node for the reached state,
    /// pushing it onto the search path. An existing node for the state
    /// (a transposition) is kept as is.
    fn store(&mut self, move_idx: usize, init: impl FnOnce(&mut Self::Node));

    /// Re-root the table at the child reached by `move_idx`, storing it
    /// first if absent. The search path must be empty.
    fn update_root(&mut self, move_idx: usize, init: impl FnOnce(&mut Self::Node));

    /// Pop one entry off the search path, restoring the parent's
    /// fingerprint. Returns false when the path is already empty, i.e.
    /// the current node is the root.
    fn backward(&mut self) -> bool;

    /// Reset per-playout helper state; called when backpropagation has
    /// reached the root.
    fn setup_exploration(&mut self);

    /// True when the current node is the search root.
    fn at_root(&self) -> bool;

    /// The node for the current fingerprint: the top of the search path,
    /// or the root between playouts.
    fn current(&self) -> &Self::Node;
    fn current_mut(&mut self) -> &mut Self::Node;

    /// Absolute depth of the search root; non-decreasing.
    fn root_depth(&self) -> usize;
}

/// Node payload stamped with its fingerprint and the absolute depth it
/// was stored at.
struct HashNode<N> {
    key: u64,
    code: u64,
    depth: usize,
    node: N,
}

/// Zobrist transposition table with a two-slot replacement scheme.
///
/// Each bucket holds up to two nodes. When both slots are taken the
/// replacement rule picks a victim in order of priority: a slot stamped
/// at or above the current root depth (unreachable from the root), then
/// the slot farther from the root, then the slot with fewer visits. The
/// victim is parked in a helper slot so that a just-evicted node that is
/// still on the search path can be read until backpropagation finishes.
pub struct TwoSlotTable<N> {
    keying: Keying,
    arena: Vec<HashNode<N>>,
    buckets: Vec<[u32; 2]>,
    /// Junk arena entry overwritten by the next eviction.
    scrap: u32,
    /// The most recently evicted node; `lookup` fallback during
    /// backpropagation.
    fallback: Option<u32>,
    path: Vec<u32>,
    root: u32,
    root_depth: usize,
}

impl<N: NodeStats> TwoSlotTable<N> {
    pub fn new(move_num: usize, code_bits: u32, rng: &mut SmallRng) -> Result<Self> {
        let keying = Keying::new(move_num, code_bits, rng)?;
        Self::from_keying(keying, code_bits)
    }

    fn from_keying(keying: Keying, code_bits: u32) -> Result<Self> {
        let size = 1usize << code_bits;
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(size)
            .map_err(|_| Error::ResourceExhausted)?;
        buckets.resize(size, [EMPTY; 2]);

        // arena entry 0 is the eviction scratch, entry 1 the root of the
        // empty move sequence
        let arena = vec![
            HashNode {
                key: 0,
                code: 0,
                depth: 0,
                node: N::default(),
            },
            HashNode {
                key: 0,
                code: 0,
                depth: 0,
                node: N::default(),
            },
        ];
        buckets[0][0] = 1;

        Ok(Self {
            keying,
            arena,
            buckets,
            scrap: 0,
            fallback: None,
            path: Vec::new(),
            root: 1,
            root_depth: 0,
        })
    }

    fn find_in_bucket(&self, code: usize, key: u64) -> Option<u32> {
        self.buckets[code]
            .iter()
            .copied()
            .find(|&id| id != EMPTY && self.arena[id as usize].key == key)
    }

    fn current_id(&self) -> u32 {
        self.path.last().copied().unwrap_or(self.root)
    }

    /// Place a node for the state reached by `move_idx`; advances the
    /// fingerprint but not the path. Returns the arena index.
    fn insert(&mut self, move_idx: usize, init: impl FnOnce(&mut N)) -> u32 {
        let depth = self.root_depth + self.path.len() + 1;
        self.keying.forward(move_idx);
        let code = self.keying.code() as usize;
        let key = self.keying.key();

        let slot = (0..2).find(|&s| self.buckets[code][s] == EMPTY);
        let id = match slot {
            Some(slot) => {
                let id = self.arena.len() as u32;
                self.arena.push(HashNode {
                    key,
                    code: code as u64,
                    depth,
                    node: N::default(),
                });
                self.buckets[code][slot] = id;
                id
            }
            None => {
                // the replacement rule: unreachable first, then farther
                // from the root, then fewer visits; slot 0 wins ties
                let h0 = &self.arena[self.buckets[code][0] as usize];
                let h1 = &self.arena[self.buckets[code][1] as usize];
                let mut slot = if h0.depth <= self.root_depth {
                    0
                } else if h1.depth <= self.root_depth {
                    1
                } else if h0.depth > h1.depth {
                    0
                } else if h0.depth < h1.depth {
                    1
                } else if h0.node.visit_count() < h1.node.visit_count() {
                    0
                } else {
                    1
                };
                // the live root stamps at rootDepth and would qualify as
                // unreachable; it must keep its entry
                if self.buckets[code][slot] == self.root {
                    slot = 1 - slot;
                }

                // park the victim so backpropagation can still reach it,
                // and overwrite the previous scrap entry in place
                let victim = self.buckets[code][slot];
                let id = self.scrap;
                self.scrap = victim;
                self.fallback = Some(victim);
                self.buckets[code][slot] = id;

                let h = &mut self.arena[id as usize];
                h.key = key;
                h.code = code as u64;
                h.depth = depth;
                id
            }
        };
        init(&mut self.arena[id as usize].node);
        id
    }
}

impl<N: NodeStats> TransTable for TwoSlotTable<N> {
    type Node = N;

    fn lookup(&self, move_idx: usize) -> Option<&N> {
        let code = self.keying.child_code(move_idx) as usize;
        let key = self.keying.child_key(move_idx);
        if let Some(id) = self.find_in_bucket(code, key) {
            return Some(&self.arena[id as usize].node);
        }
        // an evicted parent stays readable until the playout unwinds
        self.fallback.and_then(|id| {
            let h = &self.arena[id as usize];
            (h.key == key).then(|| &h.node)
        })
    }

    fn advance(&mut self, move_idx: usize) {
        let code = self.keying.child_code(move_idx) as usize;
        let key = self.keying.child_key(move_idx);
        let Some(id) = self.find_in_bucket(code, key) else {
            unreachable!("advance on a missing child")
        };
        self.keying.forward(move_idx);
        self.path.push(id);
    }

    fn store(&mut self, move_idx: usize, init: impl FnOnce(&mut N)) {
        let id = self.insert(move_idx, init);
        self.path.push(id);
    }

    fn update_root(&mut self, move_idx: usize, init: impl FnOnce(&mut N)) {
        debug_assert!(self.path.is_empty());
        let code = self.keying.child_code(move_idx) as usize;
        let key = self.keying.child_key(move_idx);
        match self.find_in_bucket(code, key) {
            Some(id) => {
                self.keying.forward(move_idx);
                self.root = id;
            }
            None => {
                self.root = self.insert(move_idx, init);
            }
        }
        self.root_depth += 1;
        self.fallback = None;
    }

    fn backward(&mut self) -> bool {
        if self.path.pop().is_none() {
            return false;
        }
        let h = &self.arena[self.current_id() as usize];
        self.keying.restore(h.code, h.key);
        if self.path.is_empty() {
            self.fallback = None;
        }
        true
    }

    fn setup_exploration(&mut self) {
        self.fallback = None;
    }

    fn at_root(&self) -> bool {
        self.path.is_empty()
    }

    fn current(&self) -> &N {
        &self.arena[self.current_id() as usize].node
    }

    fn current_mut(&mut self) -> &mut N {
        let id = self.current_id();
        &mut self.arena[id as usize].node
    }

    fn root_depth(&self) -> usize {
        self.root_depth
    }
}
