use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::SmallRng;
use rand::Rng;

use super::perspective;
use crate::game::Game;

/// Simulation policy: plays the game from the current state to the end
/// and reports the outcome. `select` is also used on its own to seed a
/// freshly expanded leaf.
pub trait Policy<G: Game> {
    /// Sample one move and apply it. Returns the move index and the
    /// move's position within the valid-move iteration.
    fn select(&mut self, game: &mut G, rng: &mut SmallRng) -> (usize, usize);

    /// Play out the game from the current state; the game is left at the
    /// terminal state.
    fn simulate(&mut self, game: &mut G, rng: &mut SmallRng) -> f64 {
        while !game.end() {
            self.select(game, rng);
        }
        game.outcome()
    }

    /// The search root advanced by one ply.
    fn update_root(&mut self) {}
}

////////////////////////////////////////////////////////////////////////////////

/// Uniformly random playouts.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPolicy;

impl<G: Game> Policy<G> for RandomPolicy {
    fn select(&mut self, game: &mut G, rng: &mut SmallRng) -> (usize, usize) {
        let n = game.valid_moves().len();
        let idx = rng.gen_range(0..n);
        let m = game.valid_moves().nth(idx).expect("index within bounds");
        let move_idx = game.to_move_idx(m.piece, m.pos);
        game.update(move_idx);
        (move_idx, idx)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Move-Average Sampling Technique: a softmax policy over per-move
/// historical scores, with the search depth as an extra feature.
///
/// Scores live in `[0, 1]` and are folded in with an exponential moving
/// average, so only moves actually played below the current search root
/// are ever updated; the `from` cursor advances with the root.
pub struct Mast {
    /// `[depth][player][piece][pos]` -> score.
    scores: Vec<Vec<Vec<Vec<f64>>>>,
    temp: f64,
    w: f64,
    from: usize,
    weights: Vec<f64>,
}

impl Mast {
    pub fn new<G: Game>(game: &G, temp: f64, w: f64) -> Self {
        let per_player = vec![vec![0.5; game.max_valid_moves()]; G::PIECE_NUM];
        let per_depth = vec![per_player; 2];
        Self {
            scores: vec![per_depth; game.max_turns()],
            temp,
            w,
            from: game.current_depth(),
            weights: Vec::with_capacity(game.max_valid_moves()),
        }
    }

    /// Warm start: seed the score table with plain random playouts from
    /// the current state before the first search.
    pub fn warmup<G: Game>(&mut self, game: &mut G, rollouts: usize, rng: &mut SmallRng) {
        let depth = game.current_depth();
        for _ in 0..rollouts {
            <Self as Policy<G>>::simulate(self, game, rng);
            while game.current_depth() > depth {
                game.undo();
            }
        }
    }

    fn update_scores<G: Game>(&mut self, outcome: f64, game: &G) {
        let mut depth = game.current_depth();
        while depth > self.from {
            depth -= 1;
            let taken = game.taken_move_at(depth);
            let val = perspective(outcome, taken.player);
            let score = &mut self.scores[depth][taken.player][taken.piece][taken.pos];
            *score = self.w * *score + (1.0 - self.w) * val;
        }
    }
}

impl<G: Game> Policy<G> for Mast {
    fn select(&mut self, game: &mut G, rng: &mut SmallRng) -> (usize, usize) {
        let depth = game.current_depth();
        let player = game.next_player();

        // relative volume is all that matters, no normalisation needed
        self.weights.clear();
        for m in game.valid_moves() {
            let score = self.scores[depth][player][m.piece][m.pos];
            self.weights.push((score / self.temp).exp());
        }
        let dist = WeightedIndex::new(&self.weights).expect("weights are positive");
        let idx = dist.sample(rng);

        let m = game.valid_moves().nth(idx).expect("index within bounds");
        let move_idx = game.to_move_idx(m.piece, m.pos);
        game.update(move_idx);
        (move_idx, idx)
    }

    fn simulate(&mut self, game: &mut G, rng: &mut SmallRng) -> f64 {
        while !game.end() {
            self.select(game, rng);
        }
        let outcome = game.outcome();
        self.update_scores(outcome, game);
        outcome
    }

    fn update_root(&mut self) {
        self.from += 1;
    }
}
