use std::time::{Duration, Instant};

use super::table::{NodeStats, TransTable};
use crate::error::{Error, Result};
use crate::game::Game;

/// Wall-clock budgeting: `schedule` opens a search, `finish` is asked
/// once per playout whether to stop. Checks are throttled to every
/// `freq` playouts, so the reserve time must comfortably cover `freq`
/// playouts or the engine can overrun its clock.
pub trait Scheduler {
    fn schedule(&mut self, time_left: Duration, expected_moves: f64);

    fn finish<G, T>(&mut self, game: &G, table: &T) -> bool
    where
        G: Game,
        T: TransTable,
        T::Node: NodeStats;
}

fn check_common(freq: u64, reserve_ms: i64) -> Result<()> {
    if reserve_ms <= 0 {
        return Err(Error::Config(
            "reserveTime argument should be greater than 0".to_string(),
        ));
    }
    if freq < 2 {
        return Err(Error::Config(
            "freq argument should be at least 2".to_string(),
        ));
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

/// Splits the remaining clock evenly over the expected remaining moves.
pub struct EvenScheduler {
    freq: u64,
    reserve_ms: i64,
    playouts: u64,
    budget_ms: u64,
    start: Instant,
}

impl EvenScheduler {
    pub fn new(freq: u64, reserve_ms: i64) -> Result<Self> {
        check_common(freq, reserve_ms)?;
        Ok(Self {
            freq,
            reserve_ms,
            playouts: 0,
            budget_ms: 0,
            start: Instant::now(),
        })
    }
}

impl Scheduler for EvenScheduler {
    fn schedule(&mut self, time_left: Duration, expected_moves: f64) {
        self.playouts = 0;
        self.start = Instant::now();
        let remaining = time_left.as_millis() as i64 - self.reserve_ms;
        self.budget_ms = (remaining.max(1) as f64 / expected_moves) as u64;
    }

    fn finish<G, T>(&mut self, _game: &G, _table: &T) -> bool
    where
        G: Game,
        T: TransTable,
        T::Node: NodeStats,
    {
        self.playouts += 1;
        if self.playouts % self.freq != 0 {
            return false;
        }
        self.start.elapsed().as_millis() as u64 >= self.budget_ms
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Stop scheduler with a parabolic time distribution.
///
/// Move budgets follow a parabola fitted through `(1, 1)`,
/// `((1+n)/2, m)` and `(n, 1)` over the expected number of moves `n`,
/// so mid-game moves — where the search matters most — get the largest
/// share of the clock. On top of the budget, a search ends early when
/// the position is clearly decided either way, or when the second-best
/// root child can no longer catch up with the best within the remaining
/// budget at the observed playout rate.
pub struct StopScheduler {
    /// Fraction of the remaining budget granted to the runner-up to
    /// catch up.
    p: f64,
    freq: u64,
    reserve_ms: i64,
    // parabola coefficients, fitted at construction
    a: f64,
    b: f64,
    c: f64,
    /// Parabola weight of the current move, refreshed by `schedule`.
    w: f64,
    playouts: u64,
    budget_ms: f64,
    start: Instant,
}

impl StopScheduler {
    pub fn new(expected_moves: f64, p: f64, freq: u64, reserve_ms: i64) -> Result<Self> {
        if !(p > 0.0 && p <= 1.0) {
            return Err(Error::Config(
                "p argument should be greater than 0 and smaller or equal to 1".to_string(),
            ));
        }
        check_common(freq, reserve_ms)?;

        // fit the parabola to the three support points; m is the middle
        // weight, s the weight of the first and last move
        let n = expected_moves;
        let m = 1.0 + (n / 2.0 - 1.0) / 2.0;
        let s = 1.0;
        let (x1, y1) = (1.0, 1.0);
        let (x2, y2) = ((1.0 + n) / 2.0, m);
        let (x3, y3) = (n, s);

        let denom = (x1 - x2) * (x1 - x3) * (x2 - x3);
        let a = (x3 * (y2 - y1) + x2 * (y1 - y3) + x1 * (y3 - y2)) / denom;
        let b = (x3 * x3 * (y1 - y2) + x2 * x2 * (y3 - y1) + x1 * x1 * (y2 - y3)) / denom;
        let c = (x2 * x3 * (x2 - x3) * y1 + x3 * x1 * (x3 - x1) * y2 + x1 * x2 * (x1 - x2) * y3)
            / denom;

        // the slope must stay below the identity or the budgets could
        // outrun the clock
        if !(2.0 * a + b < 1.0) {
            return Err(Error::Config(
                "invalid parabolic curve, lower the value of m".to_string(),
            ));
        }
        if s >= m {
            return Err(Error::Config(
                "invalid parabolic curve, s should be smaller than m".to_string(),
            ));
        }
        if s <= 0.0 || m <= 0.0 {
            return Err(Error::Config(
                "invalid parabolic curve, s and m should be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            p,
            freq,
            reserve_ms,
            a,
            b,
            c,
            w: 1.0,
            playouts: 0,
            budget_ms: 0.0,
            start: Instant::now(),
        })
    }

    #[cfg(test)]
    fn weight(&self, x: f64) -> f64 {
        self.a * x * x + self.b * x + self.c
    }
}

impl Scheduler for StopScheduler {
    fn schedule(&mut self, time_left: Duration, expected_moves: f64) {
        self.playouts = 0;
        self.start = Instant::now();
        let n = expected_moves;
        self.w = self.a * n * n + self.b * n + self.c;
        let remaining = time_left.as_millis() as i64 - self.reserve_ms;
        self.budget_ms = self.w / n * remaining.max(1) as f64;
    }

    fn finish<G, T>(&mut self, game: &G, table: &T) -> bool
    where
        G: Game,
        T: TransTable,
        T::Node: NodeStats,
    {
        self.playouts += 1;
        if self.playouts % self.freq != 0 {
            return false;
        }

        let elapsed = self.start.elapsed().as_millis() as f64;
        if elapsed >= self.budget_ms {
            return true;
        }
        let speed = self.playouts as f64 / elapsed.max(1.0);

        // the two most visited root children
        let mut best_visits = -1.0;
        let mut second_visits = -1.0;
        let mut best_score = None;
        for m in game.valid_moves() {
            let move_idx = game.to_move_idx(m.piece, m.pos);
            let child = table.lookup(move_idx);
            let visits = child.map_or(0.0, |c| c.visit_count());
            if visits > best_visits {
                second_visits = best_visits;
                best_visits = visits;
                best_score = child.map(|c| c.state_score());
            } else if visits > second_visits {
                second_visits = visits;
            }
        }

        // hopeless or won: no point searching on
        if let Some(score) = best_score {
            if (score < 0.01 || score > 0.99) && elapsed >= 500.0 {
                return true;
            }
        }

        // the lead is unbeatable within the rest of the budget
        let min_playouts = best_visits - second_visits;
        min_playouts > self.p / self.w * speed * (self.budget_ms - elapsed)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Runtime-selected scheduler, so the variant dispatch does not have to
/// double its arms.
pub enum AnyScheduler {
    Even(EvenScheduler),
    Stop(StopScheduler),
}

impl Scheduler for AnyScheduler {
    fn schedule(&mut self, time_left: Duration, expected_moves: f64) {
        match self {
            AnyScheduler::Even(s) => s.schedule(time_left, expected_moves),
            AnyScheduler::Stop(s) => s.schedule(time_left, expected_moves),
        }
    }

    fn finish<G, T>(&mut self, game: &G, table: &T) -> bool
    where
        G: Game,
        T: TransTable,
        T::Node: NodeStats,
    {
        match self {
            AnyScheduler::Even(s) => s.finish(game, table),
            AnyScheduler::Stop(s) => s.finish(game, table),
        }
    }
}
