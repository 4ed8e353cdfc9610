use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use serde::Serialize;

use super::bot::StopHandle;
use super::node::{most_visited_move, Exploration};
use super::schedule::Scheduler;
use super::simulate::Policy;
use super::table::TransTable;
use super::Search;
use crate::error::{Error, Result};
use crate::game::Game;

/// How a search ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Finished on schedule; the listed moves — one whole turn — were
    /// played into the internal game and the tree was re-rooted behind
    /// them.
    Played(Vec<usize>),
    /// The stop flag cut the search short; no move was played and the
    /// root is unchanged.
    Interrupted,
}

/// Counters of the most recent searches.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchStats {
    pub searches: u64,
    pub playouts: u64,
    pub last_playouts: u64,
    pub last_elapsed_ms: u64,
}

/// The Monte Carlo tree search driver, generic over the exploration node
/// `N`, the transposition table `T`, the simulation policy `P` and the
/// scheduler `S`. It owns the game: front-ends feed opponent moves in
/// through [`Search::update_by_opponent`] and read the engine's replies
/// out of [`RunOutcome::Played`].
pub struct Mcts<G, N, T, P, S>
where
    G: Game,
    N: Exploration<G>,
    T: TransTable<Node = N>,
    P: Policy<G>,
    S: Scheduler,
{
    game: G,
    table: T,
    policy: P,
    scheduler: S,
    rng: SmallRng,
    interrupt: Arc<AtomicBool>,
    time_left: Option<Duration>,
    stats: SearchStats,
    _node: PhantomData<N>,
}

impl<G, N, T, P, S> Mcts<G, N, T, P, S>
where
    G: Game,
    N: Exploration<G>,
    T: TransTable<Node = N>,
    P: Policy<G>,
    S: Scheduler,
{
    pub fn new(mut game: G, mut table: T, policy: P, scheduler: S, rng: SmallRng) -> Self {
        game.mark_root();
        table.current_mut().reset(&game);
        Self {
            game,
            table,
            policy,
            scheduler,
            rng,
            interrupt: Arc::new(AtomicBool::new(false)),
            time_left: None,
            stats: SearchStats::default(),
            _node: PhantomData,
        }
    }

    /// The internal game; only read this between searches.
    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// One playout: selection, expansion, simulation, backpropagation.
    fn playout(&mut self) {
        self.game.select_root();

        let mut descended = N::select(&mut self.table, &mut self.game);
        while !self.game.end() && descended {
            descended = N::select(&mut self.table, &mut self.game);
        }
        let leaf_depth = self.game.current_depth();
        if !descended {
            N::expand(
                &mut self.table,
                &mut self.game,
                &mut self.policy,
                &mut self.rng,
            );
        }

        let outcome = self.policy.simulate(&mut self.game, &mut self.rng);
        N::backprop(outcome, &mut self.table, &mut self.game, leaf_depth);
    }

    /// Advance the root by one move: game, table and policy in lockstep.
    fn advance_root(&mut self, move_idx: usize) {
        self.game.update(move_idx);
        self.game.mark_root();
        self.table
            .update_root(move_idx, |n| n.reset(&self.game));
        self.policy.update_root();
    }
}

impl<G, N, T, P, S> Search for Mcts<G, N, T, P, S>
where
    G: Game,
    N: Exploration<G>,
    T: TransTable<Node = N>,
    P: Policy<G>,
    S: Scheduler,
{
    fn run(&mut self) -> Result<RunOutcome> {
        let Some(time_left) = self.time_left else {
            return Err(Error::InvalidOperation("run called before set_time_left"));
        };
        if self.game.end() {
            return Err(Error::InvalidOperation("run called on a finished game"));
        }

        let start = Instant::now();
        self.scheduler
            .schedule(time_left, self.game.expected_moves());

        let mut playouts = 0u64;
        let mut finished = false;
        loop {
            if self.interrupt.load(Relaxed) {
                break;
            }
            if self.scheduler.finish(&self.game, &self.table) {
                finished = true;
                break;
            }
            self.playout();
            playouts += 1;
        }

        self.stats.searches += 1;
        self.stats.playouts += playouts;
        self.stats.last_playouts = playouts;
        self.stats.last_elapsed_ms = start.elapsed().as_millis() as u64;

        if !finished {
            // consume the stop request; the root is untouched and the
            // game sits at it
            self.interrupt.store(false, Relaxed);
            self.game.select_root();
            log::debug!("search interrupted after {playouts} playouts");
            return Ok(RunOutcome::Interrupted);
        }

        // play a whole turn: one player may move several times in a row
        self.game.select_root();
        let root_player = self.game.next_player();
        let mut played = Vec::new();
        while !self.game.end() && self.game.next_player() == root_player {
            let move_idx = most_visited_move(&self.table, &self.game);
            self.advance_root(move_idx);
            played.push(move_idx);
        }

        log::debug!(
            "search finished: {playouts} playouts in {} ms, played {played:?}",
            self.stats.last_elapsed_ms
        );
        Ok(RunOutcome::Played(played))
    }

    fn update_by_opponent(&mut self, move_idx: usize) {
        self.advance_root(move_idx);
    }

    fn set_time_left(&mut self, time: Duration) {
        self.time_left = Some(time);
    }

    fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.interrupt.clone())
    }

    fn stats(&self) -> SearchStats {
        self.stats.clone()
    }
}
