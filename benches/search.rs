use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand_core::SeedableRng;

use omega::game::Game;
use omega::games::Omega;
use omega::mcts::simulate::{Mast, Policy, RandomPolicy};
use omega::mcts::{MctsBot, NodeKind, Options, PolicyKind, SchedulerKind};

fn bench_playouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("playout");

    group.bench_function("random", |b| {
        let mut game = Omega::new(5);
        let mut rng = SmallRng::seed_from_u64(1);
        b.iter(|| {
            let outcome = Policy::<Omega>::simulate(&mut RandomPolicy, &mut game, &mut rng);
            while game.current_depth() > 0 {
                game.undo();
            }
            outcome
        });
    });

    group.bench_function("mast", |b| {
        let mut game = Omega::new(5);
        let mut rng = SmallRng::seed_from_u64(2);
        let mut mast = Mast::new(&game, 5.0, 0.98);
        b.iter(|| {
            let outcome = Policy::<Omega>::simulate(&mut mast, &mut game, &mut rng);
            while game.current_depth() > 0 {
                game.undo();
            }
            outcome
        });
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search-one-move");
    group.sample_size(20);

    for (name, recycling, node) in [
        ("uct2-twoslot", false, NodeKind::Uct2),
        ("uct2-recycling", true, NodeKind::Uct2),
        ("rave-twoslot", false, NodeKind::Rave),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let options = Options::new()
                    .node(node)
                    .policy(PolicyKind::Random)
                    .recycling(recycling)
                    .hash_code_size(14)
                    .budget(4_096)
                    .scheduler(SchedulerKind::Even);
                let mut bot = MctsBot::new(Omega::new(5), &options).unwrap();
                // ~65 ms budget for the first move after the reserve
                bot.set_time_left(Duration::from_millis(3_000));
                bot.run().unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_playouts, bench_search);
criterion_main!(benches);
