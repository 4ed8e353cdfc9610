use std::io::Write;
use std::time::{Duration, Instant};

use clap::Parser;

use omega::display::HexIndexDisplay;
use omega::game::Game;
use omega::games::omega::move_notation;
use omega::games::Omega;
use omega::mcts::{MctsBot, NodeKind, Options, PolicyKind, RunOutcome, SchedulerKind};

/// Play Omega against the engine in the terminal.
#[derive(Parser)]
#[command(about, long_about = None)]
struct Args {
    /// Board side length.
    #[arg(long, default_value_t = 3)]
    size: usize,

    /// Exploration node: UCT-2 or RAVE.
    #[arg(long, default_value = "UCT-2")]
    node: String,

    /// Simulation policy: random or MAST.
    #[arg(long, default_value = "random")]
    policy: String,

    /// Scheduler: even or stop.
    #[arg(long, default_value = "stop")]
    scheduler: String,

    /// Use the recycling transposition table.
    #[arg(long)]
    recycling: bool,

    /// Recycling table budget.
    #[arg(long, default_value_t = 50_000)]
    budget: usize,

    /// Engine clock for the whole game, in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    clock_ms: u64,

    /// Play as the second player instead of the first.
    #[arg(long)]
    second: bool,

    /// Dump search statistics as JSON at the end.
    #[arg(long)]
    stats: bool,
}

fn read_move(game: &Omega) -> usize {
    loop {
        print!("cell for your {} stone> ", if game.available_pieces()[0] == 0 { "white" } else { "black" });
        std::io::stdout().flush().unwrap();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            continue;
        }
        match line.trim().parse::<usize>() {
            Ok(pos) if pos < game.cell_num() && game.cell(pos).is_none() => {
                return game.to_move_idx(game.available_pieces()[0], pos);
            }
            _ => println!("enter the index of an empty cell"),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    color_backtrace::install();
    pretty_env_logger::init();
    let args = Args::parse();

    let options = Options::new()
        .node(args.node.parse::<NodeKind>()?)
        .policy(args.policy.parse::<PolicyKind>()?)
        .scheduler(args.scheduler.parse::<SchedulerKind>()?)
        .recycling(args.recycling)
        .budget(args.budget);

    let mut game = Omega::new(args.size);
    let mut bot = MctsBot::new(Omega::new(args.size), &options)?;
    let mut clock = Duration::from_millis(args.clock_ms);
    let human = if args.second { 1 } else { 0 };

    println!("cell indices:\n{}", HexIndexDisplay(&game));
    while !game.end() {
        println!("{game}");
        if game.next_player() == human {
            let m = read_move(&game);
            game.update(m);
            bot.update_by_opponent(m);
        } else {
            bot.set_time_left(clock);
            let start = Instant::now();
            match bot.run()? {
                RunOutcome::Played(moves) => {
                    for m in moves {
                        println!("engine plays {}", move_notation(&game, m));
                        game.update(m);
                    }
                }
                RunOutcome::Interrupted => unreachable!("nothing interrupts this search"),
            }
            clock = clock.saturating_sub(start.elapsed());
        }
    }

    println!("{game}");
    let [white, black] = game.scores();
    println!("white group product: {white}");
    println!("black group product: {black}");
    match game.outcome() {
        o if o == 0.5 => println!("draw"),
        o => {
            let winner = if o == 1.0 { 0 } else { 1 };
            println!(
                "player {winner} ({}) wins",
                if winner == human { "you" } else { "engine" }
            );
        }
    }

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&bot.stats())?);
    }
    Ok(())
}
