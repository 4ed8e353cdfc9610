use rand::rngs::SmallRng;
use serde::Serialize;

use super::perspective;
use super::simulate::Policy;
use super::table::{NodeStats, TransTable};
use crate::game::Game;

/// Exploration strategy of the tree phase: per-state statistics plus the
/// action-selection formula. Nodes live inside the transposition table
/// and are only addressed through it, so the operations are associated
/// functions acting on the table's current node.
pub trait Exploration<G: Game>: NodeStats {
    /// Fully reinitialise the payload for the game's current state.
    /// Called through the tables' `init` closures, which may hand over
    /// recycled storage.
    fn reset(&mut self, game: &G);

    /// One selection step from the current node: score every legal move,
    /// apply the best one to the game, and follow it in the table when
    /// the child already exists. Returns false when an unexplored state
    /// was reached (the move is applied to the game either way).
    fn select<T: TransTable<Node = Self>>(table: &mut T, game: &mut G) -> bool;

    /// Store a node for the state reached by the last selected move and
    /// seed its statistics.
    fn expand<T: TransTable<Node = Self>>(
        table: &mut T,
        game: &mut G,
        policy: &mut impl Policy<G>,
        rng: &mut SmallRng,
    );

    /// Propagate a simulation outcome from the current node back to the
    /// search root, undoing the game in lockstep with the table.
    fn backprop<T: TransTable<Node = Self>>(
        outcome: f64,
        table: &mut T,
        game: &mut G,
        leaf_depth: usize,
    );
}

////////////////////////////////////////////////////////////////////////////////

/// UCT node in the move-group formulation of Childs, Brodeur & Kocsis
/// (2008): the per-child visit counts live at the parent, indexed by the
/// position of the move in the valid-move iteration, while children are
/// rediscovered from the table on every visit so that transpositions
/// share their statistics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct UctNode {
    mean: f64,
    v_count: f64,
    v_counts: Vec<f64>,
}

impl UctNode {
    /// Exploration/exploitation balance.
    pub const C: f64 = 2.0;

    #[inline]
    fn action_score(child_mean: Option<f64>, child_visits: f64, logc: f64) -> f64 {
        // unexplored children start from the optimistic prior 0.5
        child_mean.unwrap_or(0.5) + (logc / child_visits).sqrt()
    }
}

impl NodeStats for UctNode {
    fn visit_count(&self) -> f64 {
        self.v_count
    }

    fn state_score(&self) -> f64 {
        self.mean
    }
}

impl<G: Game> Exploration<G> for UctNode {
    fn reset(&mut self, game: &G) {
        self.mean = 0.5;
        let n = game.valid_moves().len();
        self.v_count = n as f64;
        self.v_counts.clear();
        self.v_counts.resize(n, 1.0);
    }

    fn select<T: TransTable<Node = Self>>(table: &mut T, game: &mut G) -> bool {
        let node = table.current();
        let logc = Self::C * (node.v_count + 1.0).ln();

        let mut best_score = f64::NEG_INFINITY;
        let mut best_idx = 0;
        let mut best_move = 0;
        let mut best_known = false;
        for (idx, m) in game.valid_moves().enumerate() {
            let move_idx = game.to_move_idx(m.piece, m.pos);
            let child = table.lookup(move_idx);
            let score = Self::action_score(
                child.map(|c| c.mean),
                node.v_counts[idx],
                logc,
            );
            if score > best_score {
                best_score = score;
                best_idx = idx;
                best_move = move_idx;
                best_known = child.is_some();
            }
        }

        let node = table.current_mut();
        node.v_count += 1.0;
        node.v_counts[best_idx] += 1.0;

        // choosing an unexplored state ends the selection phase; the
        // expansion will store it and advance the table itself
        if best_known {
            table.advance(best_move);
        }
        game.update(best_move);
        best_known
    }

    fn expand<T: TransTable<Node = Self>>(
        table: &mut T,
        game: &mut G,
        policy: &mut impl Policy<G>,
        rng: &mut SmallRng,
    ) {
        let move_idx = game.last_move_idx();
        table.store(move_idx, |n| n.reset(game));

        table.current_mut().v_count += 1.0;
        // seed the leaf with one policy step so its child counts are
        // never uniform zero
        if !game.end() {
            let (_, child_idx) = policy.select(game, rng);
            table.current_mut().v_counts[child_idx] += 1.0;
        }
    }

    fn backprop<T: TransTable<Node = Self>>(
        outcome: f64,
        table: &mut T,
        game: &mut G,
        leaf_depth: usize,
    ) {
        // unwind the simulation
        while game.current_depth() > leaf_depth {
            game.undo();
        }
        // walk the selection path; each node's value is seen from the
        // player to move at its parent, who chose the edge into it
        while !table.at_root() {
            game.undo();
            let val = perspective(outcome, game.next_player());
            let node = table.current_mut();
            node.mean = (node.mean * (node.v_count - 1.0) + val) / node.v_count;
            table.backward();
        }
        table.setup_exploration();
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Moves seen below a node during backpropagation, bucketed by player and
/// piece. Feeds the all-moves-as-first statistics.
pub struct BelowMoves {
    moves: [Vec<Vec<usize>>; 2],
}

impl BelowMoves {
    fn new(piece_num: usize) -> Self {
        Self {
            moves: [vec![Vec::new(); piece_num], vec![Vec::new(); piece_num]],
        }
    }

    #[inline]
    fn push(&mut self, taken: crate::game::Taken) {
        self.moves[taken.player][taken.piece].push(taken.pos);
    }
}

/// Rapid Action Value Estimation node: Monte Carlo statistics blended
/// with AMAF statistics indexed by `(piece, pos)`. Effective for games
/// where an unplayed move tends to stay available on later turns, which
/// holds for placement games like this one.
///
/// MC values live at the child so they gather the most samples; AMAF
/// tables live at the parent and span all positions of the available
/// pieces, because backpropagation updates them with moves taken at any
/// later point of the playout.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RaveNode {
    mc_mean: f64,
    mc_count: f64,
    r_mean: Vec<Vec<f64>>,
    r_count: Vec<Vec<f64>>,
}

impl RaveNode {
    /// Weighting between the MC and AMAF means.
    pub const K: f64 = 1000.0;

    #[inline]
    fn beta(&self) -> f64 {
        (Self::K / (3.0 * self.mc_count + Self::K)).sqrt()
    }

    #[inline]
    fn action_score(&self, child_mean: Option<f64>, piece: usize, pos: usize) -> f64 {
        let beta = self.beta();
        (1.0 - beta) * child_mean.unwrap_or(0.5) + beta * self.r_mean[piece][pos]
    }

    #[inline]
    fn update_mc(&mut self, val: f64) {
        self.mc_mean = (self.mc_mean * self.mc_count + val) / (self.mc_count + 1.0);
        self.mc_count += 1.0;
    }

    /// AMAF update with every below-move of the player to move at this
    /// node's own state.
    fn update_rave<G: Game>(&mut self, outcome: f64, below: &BelowMoves, game: &G) {
        let player = game.next_player();
        let val = perspective(outcome, player);
        for &piece in game.available_pieces() {
            for &pos in &below.moves[player][piece] {
                let count = self.r_count[piece][pos];
                self.r_mean[piece][pos] = (self.r_mean[piece][pos] * count + val) / (count + 1.0);
                self.r_count[piece][pos] += 1.0;
            }
        }
    }
}

impl NodeStats for RaveNode {
    fn visit_count(&self) -> f64 {
        self.mc_count
    }

    fn state_score(&self) -> f64 {
        self.mc_mean
    }
}

impl<G: Game> Exploration<G> for RaveNode {
    fn reset(&mut self, game: &G) {
        self.mc_mean = 0.5;
        self.mc_count = 1.0;
        self.r_mean.resize(G::PIECE_NUM, Vec::new());
        self.r_count.resize(G::PIECE_NUM, Vec::new());
        // only the pieces placeable here are ever indexed through this
        // node; vectors of other pieces may hold stale recycled data
        for &piece in game.available_pieces() {
            let n = game.piece_max_moves(piece);
            self.r_mean[piece].clear();
            self.r_mean[piece].resize(n, 0.5);
            self.r_count[piece].clear();
            self.r_count[piece].resize(n, 1.0);
        }
    }

    fn select<T: TransTable<Node = Self>>(table: &mut T, game: &mut G) -> bool {
        let node = table.current();

        let mut best_score = f64::NEG_INFINITY;
        let mut best_move = 0;
        let mut best_known = false;
        for m in game.valid_moves() {
            let move_idx = game.to_move_idx(m.piece, m.pos);
            let child = table.lookup(move_idx);
            let score = node.action_score(child.map(|c| c.mc_mean), m.piece, m.pos);
            if score > best_score {
                best_score = score;
                best_move = move_idx;
                best_known = child.is_some();
            }
        }

        if best_known {
            table.advance(best_move);
        }
        game.update(best_move);
        best_known
    }

    fn expand<T: TransTable<Node = Self>>(
        table: &mut T,
        game: &mut G,
        _policy: &mut impl Policy<G>,
        _rng: &mut SmallRng,
    ) {
        let move_idx = game.last_move_idx();
        table.store(move_idx, |n| n.reset(game));
    }

    fn backprop<T: TransTable<Node = Self>>(
        outcome: f64,
        table: &mut T,
        game: &mut G,
        leaf_depth: usize,
    ) {
        let mut below = BelowMoves::new(G::PIECE_NUM);

        // unwind the simulation, gathering the moves it played
        while game.current_depth() > leaf_depth {
            below.push(game.last_move());
            game.undo();
        }

        while !table.at_root() {
            // the AMAF update sees the node's own player, the MC update
            // the parent's
            table.current_mut().update_rave(outcome, &below, game);
            let taken = game.last_move();
            game.undo();
            let val = perspective(outcome, game.next_player());
            table.current_mut().update_mc(val);
            below.push(taken);
            table.backward();
        }

        table.current_mut().update_rave(outcome, &below, game);
        table.setup_exploration();
    }
}

/// Root move with the highest visit count; unexplored moves count as
/// zero, ties go to the earlier move.
pub fn most_visited_move<G, T>(table: &T, game: &G) -> usize
where
    G: Game,
    T: TransTable,
    T::Node: NodeStats,
{
    let mut best_visits = -1.0;
    let mut best_move = None;
    for m in game.valid_moves() {
        let move_idx = game.to_move_idx(m.piece, m.pos);
        let visits = table
            .lookup(move_idx)
            .map_or(0.0, |child| child.visit_count());
        if visits > best_visits {
            best_visits = visits;
            best_move = Some(move_idx);
        }
    }
    best_move.expect("no valid moves at the search root")
}
