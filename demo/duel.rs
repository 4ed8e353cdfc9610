use std::time::Duration;

use clap::Parser;

use omega::error::Error;
use omega::game::Game;
use omega::games::Omega;
use omega::mcts::{MctsBot, Options, RunOutcome};

/// Pit two engine configurations against each other.
#[derive(Parser)]
#[command(about, long_about = None)]
struct Args {
    /// Board side length.
    #[arg(long, default_value_t = 3)]
    size: usize,

    /// Number of games; colours swap every game.
    #[arg(long, default_value_t = 2)]
    games: usize,

    /// Engine clock per game, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    clock_ms: u64,

    /// First configuration, e.g. "UCT-2/random" or "RAVE/MAST/recycling".
    #[arg(long, default_value = "UCT-2/random")]
    a: String,

    /// Second configuration.
    #[arg(long, default_value = "RAVE/MAST")]
    b: String,
}

fn parse_side(spec: &str) -> Result<Options, Error> {
    let mut parts = spec.split('/');
    let node = parts
        .next()
        .ok_or_else(|| Error::Config(format!("empty configuration: {spec}")))?
        .parse()?;
    let policy = parts
        .next()
        .ok_or_else(|| Error::Config(format!("missing policy in: {spec}")))?
        .parse()?;
    let recycling = match parts.next() {
        None => false,
        Some("recycling") => true,
        Some(other) => return Err(Error::Config(format!("unknown flag: {other}"))),
    };
    Ok(Options::new().node(node).policy(policy).recycling(recycling))
}

fn play_one(
    size: usize,
    clock_ms: u64,
    first: &Options,
    second: &Options,
) -> Result<f64, Box<dyn std::error::Error>> {
    let mut referee = Omega::new(size);
    let mut bots = [
        MctsBot::new(Omega::new(size), first)?,
        MctsBot::new(Omega::new(size), second)?,
    ];
    let mut turn = 0usize;

    while !referee.end() {
        let (me, other) = {
            let [a, b] = &mut bots;
            if turn == 0 {
                (a, b)
            } else {
                (b, a)
            }
        };
        me.set_time_left(Duration::from_millis(clock_ms));
        match me.run()? {
            RunOutcome::Played(moves) => {
                for m in moves {
                    referee.update(m);
                    other.update_by_opponent(m);
                }
            }
            RunOutcome::Interrupted => unreachable!("nothing interrupts these searches"),
        }
        turn = 1 - turn;
    }
    Ok(referee.outcome())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    color_backtrace::install();
    pretty_env_logger::init();
    let args = Args::parse();

    let side_a = parse_side(&args.a)?;
    let side_b = parse_side(&args.b)?;

    let mut score_a = 0.0;
    for round in 0..args.games {
        // colours swap every round
        let (first, second, a_is_first) = if round % 2 == 0 {
            (&side_a, &side_b, true)
        } else {
            (&side_b, &side_a, false)
        };
        let outcome = play_one(args.size, args.clock_ms, first, second)?;
        let a_outcome = if a_is_first { outcome } else { 1.0 - outcome };
        score_a += a_outcome;
        log::info!("round {round}: {} scores {a_outcome}", args.a);
    }

    println!(
        "{}: {score_a} - {}: {}",
        args.a,
        args.b,
        args.games as f64 - score_a
    );
    Ok(())
}
