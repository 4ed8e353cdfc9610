use rand::rngs::SmallRng;

use super::table::{NodeStats, TransTable, EMPTY};
use crate::error::{Error, Result};
use crate::zobrist::Keying;

/// Node payload with its fingerprint. `code == NEVER_STORED` marks a
/// preallocated entry that has never occupied a bucket; stored codes are
/// always masked and cannot collide with the marker.
struct HashNode<N> {
    key: u64,
    code: u64,
    node: N,
}

const NEVER_STORED: u64 = u64::MAX;

/// Fixed-capacity doubly-linked list over an arena, addressed by `u32`
/// indices with a single circular sentinel at index `len`.
struct FifoList<T> {
    nodes: Vec<T>,
    prev: Vec<u32>,
    next: Vec<u32>,
}

impl<T> FifoList<T> {
    fn new(capacity: usize, mut make: impl FnMut() -> T) -> Result<Self> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(capacity)
            .map_err(|_| Error::ResourceExhausted)?;
        nodes.extend(std::iter::repeat_with(&mut make).take(capacity));

        // entries linked in index order, sentinel at `capacity`
        let n = capacity as u32;
        let prev = (0..=n).map(|i| if i == 0 { n } else { i - 1 }).collect();
        let next = (0..=n).map(|i| if i == n { 0 } else { i + 1 }).collect();
        Ok(Self { nodes, prev, next })
    }

    #[inline]
    fn sentinel(&self) -> u32 {
        self.nodes.len() as u32
    }

    #[inline]
    fn front(&self) -> u32 {
        self.next[self.sentinel() as usize]
    }

    #[inline]
    fn back(&self) -> u32 {
        self.prev[self.sentinel() as usize]
    }

    #[inline]
    fn get(&self, id: u32) -> &T {
        &self.nodes[id as usize]
    }

    #[inline]
    fn get_mut(&mut self, id: u32) -> &mut T {
        &mut self.nodes[id as usize]
    }

    /// Unlink `x` and reinsert it just before `anchor`. No-op when the
    /// two coincide.
    fn move_before(&mut self, x: u32, anchor: u32) {
        if x == anchor {
            return;
        }
        let (xp, xn) = (self.prev[x as usize], self.next[x as usize]);
        self.next[xp as usize] = xn;
        self.prev[xn as usize] = xp;

        let before = self.prev[anchor as usize];
        self.next[before as usize] = x;
        self.prev[x as usize] = before;
        self.next[x as usize] = anchor;
        self.prev[anchor as usize] = x;
    }
}

/// Recycling Zobrist transposition table.
///
/// A fixed budget of hash nodes lives in a least-recently-visited list;
/// when a new state needs storage the front of the list is recycled.
/// Buckets use open addressing with linear probing, and removals backward-
/// shift displaced entries so probe chains never cross a tombstone —
/// lookups dominate insertions in tree search, so keeping chains tight is
/// worth the extra work on eviction.
///
/// During selection every visited node is spliced to just before the
/// insertion-target cursor, and the cursor then moves onto that node, so
/// the current selection path accumulates at the back of the list and the
/// root is always the final entry.
pub struct RecyclingTable<N> {
    keying: Keying,
    list: FifoList<HashNode<N>>,
    buckets: Vec<u32>,
    mask: usize,
    /// Fresh nodes are spliced to just before this cursor.
    target: u32,
    path: Vec<u32>,
    root: u32,
    root_depth: usize,
}

impl<N: NodeStats> RecyclingTable<N> {
    pub fn new(
        move_num: usize,
        max_depth: usize,
        code_bits: u32,
        budget: usize,
        rng: &mut SmallRng,
    ) -> Result<Self> {
        let keying = Keying::new(move_num, code_bits, rng)?;
        Self::from_keying(keying, max_depth, code_bits, budget)
    }

    fn from_keying(
        keying: Keying,
        max_depth: usize,
        code_bits: u32,
        budget: usize,
    ) -> Result<Self> {
        let size = 1usize << code_bits;
        if size < 2 * budget {
            return Err(Error::Config(
                "load factor should not exceed 0.5".to_string(),
            ));
        }
        if budget < max_depth + 1 {
            return Err(Error::Config(format!(
                "budget should be greater than {max_depth}"
            )));
        }

        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(size)
            .map_err(|_| Error::ResourceExhausted)?;
        buckets.resize(size, EMPTY);

        let mut list = FifoList::new(budget, || HashNode {
            key: 0,
            code: NEVER_STORED,
            node: N::default(),
        })?;
        // the last list position is the root of the empty move sequence
        let root = list.back();
        list.get_mut(root).code = 0;
        buckets[0] = root;

        Ok(Self {
            keying,
            list,
            buckets,
            mask: size - 1,
            target: root,
            path: Vec::new(),
            root,
            root_depth: 0,
        })
    }

    fn current_id(&self) -> u32 {
        self.path.last().copied().unwrap_or(self.root)
    }

    /// Probe for the child reached by `move_idx` without advancing the
    /// fingerprint. Returns the hit, if any, and the bucket the probe
    /// ended on — the first empty bucket, where a fresh node would go.
    fn probe_child(&self, move_idx: usize) -> (Option<u32>, usize) {
        let key = self.keying.child_key(move_idx);
        let mut b = self.keying.child_code(move_idx) as usize;
        loop {
            let id = self.buckets[b];
            if id == EMPTY {
                return (None, b);
            }
            if self.list.get(id).key == key {
                return (Some(id), b);
            }
            b = (b + 1) & self.mask;
        }
    }

    /// Recycle the least-recently-visited node into a node for the
    /// current fingerprint, publishing it at `slot` (the empty bucket the
    /// preceding probe found). The victim's old bucket entry is removed
    /// with a backward shift so no tombstone is left behind.
    fn recycle(&mut self, slot: usize, init: impl FnOnce(&mut N)) -> u32 {
        let victim = self.list.front();
        self.list.move_before(victim, self.target);

        let was_stored = self.list.get(victim).code != NEVER_STORED;

        // locate the victim's bucket before its identity changes; probing
        // from its home bucket cannot cross an empty slot
        let mut target = self.list.get(victim).code as usize;
        if was_stored {
            while self.buckets[target] != victim {
                target = (target + 1) & self.mask;
            }
        }

        let h = self.list.get_mut(victim);
        h.key = self.keying.key();
        h.code = self.keying.code();
        init(&mut h.node);
        self.buckets[slot] = victim;

        if was_stored {
            // backward-shift entries whose home bucket lies within the
            // vacated span; the circular comparison handles wrap-around
            let mut source = (target + 1) & self.mask;
            loop {
                let id = self.buckets[source];
                if id == EMPTY {
                    break;
                }
                let home = self.list.get(id).code as usize;
                let movable = if source > target {
                    home <= target || home > source
                } else {
                    home <= target && home > source
                };
                if movable {
                    self.buckets[target] = id;
                    target = source;
                }
                source = (source + 1) & self.mask;
            }
            self.buckets[target] = EMPTY;
        }
        victim
    }
}

impl<N: NodeStats> TransTable for RecyclingTable<N> {
    type Node = N;

    fn lookup(&self, move_idx: usize) -> Option<&N> {
        let (found, _) = self.probe_child(move_idx);
        found.map(|id| &self.list.get(id).node)
    }

    fn advance(&mut self, move_idx: usize) {
        self.keying.forward(move_idx);
        let key = self.keying.key();
        let mut b = self.keying.code() as usize;
        let id = loop {
            let id = self.buckets[b];
            if id == EMPTY {
                unreachable!("advance on a missing child");
            }
            if self.list.get(id).key == key {
                break id;
            }
            b = (b + 1) & self.mask;
        };
        // visited nodes gather at the back, deeper ones in front of
        // shallower ones
        self.list.move_before(id, self.target);
        self.target = id;
        self.path.push(id);
    }

    fn store(&mut self, move_idx: usize, init: impl FnOnce(&mut N)) {
        let (found, slot) = self.probe_child(move_idx);
        self.keying.forward(move_idx);
        let id = match found {
            Some(id) => {
                // a transposition reached through a different move order
                self.list.move_before(id, self.target);
                self.target = id;
                id
            }
            None => self.recycle(slot, init),
        };
        self.path.push(id);
    }

    fn update_root(&mut self, move_idx: usize, init: impl FnOnce(&mut N)) {
        debug_assert!(self.path.is_empty());
        let (found, slot) = self.probe_child(move_idx);
        // the outgoing root becomes the first candidate for eviction
        let front = self.list.front();
        self.list.move_before(self.root, front);
        self.root_depth += 1;
        self.keying.forward(move_idx);

        let id = match found {
            Some(id) => {
                let sentinel = self.list.sentinel();
                self.list.move_before(id, sentinel);
                id
            }
            None => {
                // recycle splices the victim to just before the sentinel,
                // i.e. to the tail
                self.target = self.list.sentinel();
                self.recycle(slot, init)
            }
        };
        self.root = id;
        self.target = id;
    }

    fn backward(&mut self) -> bool {
        if self.path.pop().is_none() {
            return false;
        }
        let h = self.list.get(self.current_id());
        self.keying.restore(h.code, h.key);
        true
    }

    fn setup_exploration(&mut self) {
        self.target = self.list.back();
    }

    fn at_root(&self) -> bool {
        self.path.is_empty()
    }

    fn current(&self) -> &N {
        &self.list.get(self.current_id()).node
    }

    fn current_mut(&mut self) -> &mut N {
        let id = self.current_id();
        &mut self.list.get_mut(id).node
    }

    fn root_depth(&self) -> usize {
        self.root_depth
    }
}

#[cfg(test)]
mod tests {
    use super::super::table::testing::Counter;
    use super::*;
    use rand_core::SeedableRng;

    impl<N: NodeStats> RecyclingTable<N> {
        fn with_keying(keying: Keying, max_depth: usize, code_bits: u32, budget: usize) -> Self {
            Self::from_keying(keying, max_depth, code_bits, budget).unwrap()
        }

        fn fingerprint(&self) -> (u64, u64) {
            (self.keying.code(), self.keying.key())
        }

        /// Occupancy, uniqueness, no-tombstone and root-at-tail checks.
        fn assert_invariants(&self) {
            let budget = self.list.nodes.len();
            let occupied: Vec<usize> = (0..self.buckets.len())
                .filter(|&b| self.buckets[b] != EMPTY)
                .collect();
            assert!(occupied.len() <= budget, "more buckets in use than nodes");

            // every bucket entry is a distinct node
            let mut seen = std::collections::HashSet::new();
            for &b in &occupied {
                assert!(seen.insert(self.buckets[b]), "node in two buckets");
            }

            // probing from any entry's home bucket reaches it without
            // crossing an empty slot
            for &b in &occupied {
                let id = self.buckets[b];
                let mut probe = self.list.get(id).code as usize;
                loop {
                    assert_ne!(self.buckets[probe], EMPTY, "tombstone in probe chain");
                    if probe == b {
                        break;
                    }
                    probe = (probe + 1) & self.mask;
                }
            }

            // list is a single cycle through all nodes plus the sentinel
            let mut id = self.list.sentinel();
            for _ in 0..=budget {
                let next = self.list.next[id as usize];
                assert_eq!(self.list.prev[next as usize], id);
                id = next;
            }
            assert_eq!(id, self.list.sentinel(), "list is not a single cycle");

            // the root occupies the last list position
            assert_eq!(self.list.back(), self.root);
        }
    }

    fn tag(t: usize) -> impl FnOnce(&mut Counter) {
        move |n: &mut Counter| {
            *n = Counter {
                visits: 1.0,
                score: 0.5,
                tag: t,
            }
        }
    }

    #[test]
    fn construction_checks_the_load_factor() {
        let mut rng = SmallRng::seed_from_u64(3);
        // 2 * 50 <= 256 and 50 >= 30 + 1: fine
        assert!(RecyclingTable::<Counter>::new(64, 30, 8, 50, &mut rng).is_ok());
        // 2 * 200 > 256
        let err = RecyclingTable::<Counter>::new(64, 30, 8, 200, &mut rng)
            .err()
            .expect("load factor above 0.5 must be rejected");
        match err {
            Error::Config(msg) => assert!(msg.contains("load factor")),
            other => panic!("unexpected error kind: {other}"),
        }
        // budget below the deepest possible selection path
        assert!(matches!(
            RecyclingTable::<Counter>::new(64, 60, 8, 50, &mut rng),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn store_advance_and_transpositions() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut t: RecyclingTable<Counter> = RecyclingTable::new(64, 10, 8, 32, &mut rng).unwrap();
        t.store(4, tag(1));
        t.store(9, tag(2));
        t.current_mut().visits += 1.0;
        while t.backward() {}
        t.setup_exploration();
        t.assert_invariants();

        // the transposed order reuses both nodes
        t.store(9, tag(3));
        assert_eq!(t.current().tag, 3);
        t.store(4, tag(4));
        assert_eq!(t.current().tag, 2, "transposition shares the node");
        assert_eq!(t.current().visits, 2.0);
        while t.backward() {}
        t.setup_exploration();
        t.assert_invariants();
    }

    #[test]
    fn eviction_recycles_the_least_recently_visited() {
        // tiny budget: stores beyond the budget must throw out the
        // oldest leaves while the current path stays intact
        let mut rng = SmallRng::seed_from_u64(17);
        let mut t: RecyclingTable<Counter> = RecyclingTable::new(128, 5, 8, 6, &mut rng).unwrap();
        for round in 0..20 {
            for (depth, m) in [(0, round), (1, 40 + round)].into_iter() {
                let _ = depth;
                let (found, _) = t.probe_child(m);
                if found.is_some() {
                    t.advance(m);
                } else {
                    t.store(m, tag(m));
                }
            }
            while t.backward() {}
            t.setup_exploration();
            t.assert_invariants();
        }
    }

    #[test]
    fn update_root_moves_the_root_to_the_tail() {
        let mut rng = SmallRng::seed_from_u64(23);
        let mut t: RecyclingTable<Counter> = RecyclingTable::new(64, 10, 8, 32, &mut rng).unwrap();
        t.store(7, tag(7));
        while t.backward() {}
        t.setup_exploration();

        // known child: adopted, not restored
        t.update_root(7, tag(99));
        assert_eq!(t.current().tag, 7);
        assert_eq!(t.root_depth(), 1);
        t.assert_invariants();

        // unknown child: stored, root depth still bumps exactly once
        t.update_root(12, tag(12));
        assert_eq!(t.current().tag, 12);
        assert_eq!(t.root_depth(), 2);
        t.assert_invariants();
    }

    #[test]
    fn path_discipline_restores_the_root_fingerprint() {
        let mut rng = SmallRng::seed_from_u64(29);
        let mut t: RecyclingTable<Counter> = RecyclingTable::new(64, 10, 8, 32, &mut rng).unwrap();
        t.update_root(3, tag(3));
        let at_root = t.fingerprint();
        t.store(1, tag(1));
        t.store(2, tag(2));
        while t.backward() {}
        t.setup_exploration();
        assert_eq!(t.fingerprint(), at_root);
    }

    use proptest::prelude::*;

    proptest! {
        // random walks through the table keep every structural invariant
        #[test]
        fn random_walks_preserve_invariants(script in proptest::collection::vec(0u8..255, 1..300)) {
            let keying = {
                let mut rng = SmallRng::seed_from_u64(31);
                Keying::new(16, 6, &mut rng).unwrap()
            };
            let max_depth = 8;
            let mut t: RecyclingTable<Counter> =
                RecyclingTable::with_keying(keying, max_depth, 6, 16);

            for byte in script {
                match byte {
                    0..=199 => {
                        if t.path.len() >= max_depth {
                            continue;
                        }
                        let m = (byte % 16) as usize;
                        let (found, _) = t.probe_child(m);
                        if found.is_some() {
                            t.advance(m);
                        } else {
                            t.store(m, |n| *n = Counter::default());
                        }
                    }
                    200..=229 => {
                        while t.backward() {}
                        t.setup_exploration();
                    }
                    _ => {
                        while t.backward() {}
                        t.setup_exploration();
                        let m = (byte % 16) as usize;
                        t.update_root(m, |n| *n = Counter::default());
                    }
                }
                t.assert_invariants();
            }
        }
    }
}
