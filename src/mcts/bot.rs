use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand_core::SeedableRng;

use super::config::{NodeKind, Options, PolicyKind, SchedulerKind};
use super::node::{Exploration, RaveNode, UctNode};
use super::recycling::RecyclingTable;
use super::schedule::{AnyScheduler, EvenScheduler, StopScheduler};
use super::search::{Mcts, RunOutcome, SearchStats};
use super::simulate::{Mast, RandomPolicy};
use super::table::{TransTable, TwoSlotTable};
use super::Search;
use crate::error::Result;
use crate::game::Game;

/// Cloneable handle for interrupting a running search from another
/// thread. Setting the flag is idempotent; the search consumes it when
/// it returns interrupted.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    pub fn stop(&self) {
        self.0.store(true, Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Relaxed)
    }
}

/// Non-generic engine facade: one of the eight node/policy/table variants
/// behind the object-safe [`Search`] trait.
pub struct MctsBot {
    imp: Box<dyn Search + Send>,
}

impl MctsBot {
    pub fn new<G>(game: G, options: &Options) -> Result<Self>
    where
        G: Game + Send + 'static,
    {
        let mut rng = SmallRng::from_entropy();
        let scheduler = match options.scheduler {
            SchedulerKind::Even => AnyScheduler::Even(EvenScheduler::new(100, 2000)?),
            SchedulerKind::Stop => {
                AnyScheduler::Stop(StopScheduler::new(game.expected_moves(), 0.9, 100, 2000)?)
            }
        };

        let imp = match (options.recycling, options.node) {
            (false, NodeKind::Uct2) => {
                let table: TwoSlotTable<UctNode> =
                    TwoSlotTable::new(game.total_move_count(), options.hash_code_size, &mut rng)?;
                build(game, table, options, scheduler, rng)?
            }
            (false, NodeKind::Rave) => {
                let table: TwoSlotTable<RaveNode> =
                    TwoSlotTable::new(game.total_move_count(), options.hash_code_size, &mut rng)?;
                build(game, table, options, scheduler, rng)?
            }
            (true, NodeKind::Uct2) => {
                let table: RecyclingTable<UctNode> = RecyclingTable::new(
                    game.total_move_count(),
                    game.max_depth(),
                    options.hash_code_size,
                    options.budget,
                    &mut rng,
                )?;
                build(game, table, options, scheduler, rng)?
            }
            (true, NodeKind::Rave) => {
                let table: RecyclingTable<RaveNode> = RecyclingTable::new(
                    game.total_move_count(),
                    game.max_depth(),
                    options.hash_code_size,
                    options.budget,
                    &mut rng,
                )?;
                build(game, table, options, scheduler, rng)?
            }
        };
        Ok(Self { imp })
    }

    pub fn run(&mut self) -> Result<RunOutcome> {
        self.imp.run()
    }

    pub fn update_by_opponent(&mut self, move_idx: usize) {
        self.imp.update_by_opponent(move_idx);
    }

    pub fn set_time_left(&mut self, time: Duration) {
        self.imp.set_time_left(time);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.imp.stop_handle()
    }

    pub fn stats(&self) -> SearchStats {
        self.imp.stats()
    }
}

/// Close over the policy choice; the node and table types are fixed by
/// the caller.
fn build<G, N, T>(
    mut game: G,
    table: T,
    options: &Options,
    scheduler: AnyScheduler,
    mut rng: SmallRng,
) -> Result<Box<dyn Search + Send>>
where
    G: Game + Send + 'static,
    N: Exploration<G> + Send + 'static,
    T: TransTable<Node = N> + Send + 'static,
{
    Ok(match options.policy {
        PolicyKind::Random => Box::new(Mcts::new(game, table, RandomPolicy, scheduler, rng)),
        PolicyKind::Mast => {
            let mut policy = Mast::new(&game, options.temp, options.w);
            if options.mast_warmup > 0 {
                policy.warmup(&mut game, options.mast_warmup, &mut rng);
            }
            Box::new(Mcts::new(game, table, policy, scheduler, rng))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::games::Omega;

    fn small(options: Options) -> Options {
        // small tables keep the tests quick
        options.hash_code_size(10).budget(64)
    }

    #[test]
    fn every_variant_plays_a_move() {
        for recycling in [false, true] {
            for node in [NodeKind::Uct2, NodeKind::Rave] {
                for policy in [PolicyKind::Random, PolicyKind::Mast] {
                    let options = small(Options::new())
                        .recycling(recycling)
                        .node(node)
                        .policy(policy)
                        .scheduler(SchedulerKind::Even);
                    let mut bot = MctsBot::new(Omega::new(3), &options).unwrap();
                    bot.set_time_left(Duration::from_millis(150));
                    match bot.run().unwrap() {
                        RunOutcome::Played(moves) => assert_eq!(moves.len(), 2),
                        RunOutcome::Interrupted => {
                            panic!("{recycling}/{node:?}/{policy:?} was interrupted")
                        }
                    }
                    assert!(bot.stats().last_playouts > 0);
                }
            }
        }
    }

    #[test]
    fn stop_scheduler_variant_finishes_within_its_budget() {
        let options = small(Options::new()).scheduler(SchedulerKind::Stop);
        let mut bot = MctsBot::new(Omega::new(3), &options).unwrap();
        // 100 ms of clock on top of the 2000 ms reserve
        bot.set_time_left(Duration::from_millis(2100));
        let start = std::time::Instant::now();
        match bot.run().unwrap() {
            RunOutcome::Played(moves) => assert_eq!(moves.len(), 2),
            RunOutcome::Interrupted => panic!("search was interrupted"),
        }
        // generous margin: the budget is ~45 ms, checks every 100
        // playouts
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn invalid_recycling_budget_is_rejected_at_construction() {
        // scenario: budget 200 against 2^8 buckets violates the load
        // factor bound
        let options = Options::new().recycling(true).hash_code_size(8).budget(200);
        match MctsBot::new(Omega::new(3), &options) {
            Err(Error::Config(msg)) => assert!(msg.contains("load factor")),
            Err(other) => panic!("unexpected error kind: {other}"),
            Ok(_) => panic!("construction must fail"),
        }
    }

    #[test]
    fn stop_handle_outlives_the_borrow() {
        let options = small(Options::new()).scheduler(SchedulerKind::Even);
        let mut bot = MctsBot::new(Omega::new(3), &options).unwrap();
        let handle = bot.stop_handle();
        bot.set_time_left(Duration::from_millis(10_000));
        handle.stop();
        assert!(matches!(bot.run().unwrap(), RunOutcome::Interrupted));
    }

    #[test]
    fn bot_versus_bot_finishes_a_game() {
        let options_a = small(Options::new())
            .scheduler(SchedulerKind::Even)
            .node(NodeKind::Rave);
        let options_b = small(Options::new())
            .scheduler(SchedulerKind::Even)
            .recycling(true)
            .policy(PolicyKind::Mast);
        let mut a = MctsBot::new(Omega::new(3), &options_a).unwrap();
        let mut b = MctsBot::new(Omega::new(3), &options_b).unwrap();
        let mut referee = Omega::new(3);

        fn half_turn(me: &mut MctsBot, other: &mut MctsBot, referee: &mut Omega) {
            me.set_time_left(Duration::from_millis(120));
            match me.run().unwrap() {
                RunOutcome::Played(moves) => {
                    for m in moves {
                        referee.update(m);
                        other.update_by_opponent(m);
                    }
                }
                RunOutcome::Interrupted => panic!("nothing interrupts these searches"),
            }
        }

        while !referee.end() {
            half_turn(&mut a, &mut b, &mut referee);
            if referee.end() {
                break;
            }
            half_turn(&mut b, &mut a, &mut referee);
        }
        assert!([0.0, 0.5, 1.0].contains(&referee.outcome()));
    }
}
