use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use plasma_learn_hub::engine::{self as GameEngine, Board, Direction, Score, WINNING_TILE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "simulate", about = "Parallel 2048 self-play over the hub engine")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 1000)]
    games: u64,

    /// Base seed; game i uses seed + i
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = Policy::Greedy)]
    policy: Policy,

    /// Stop each game after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    /// Uniformly random legal move
    Random,
    /// Legal move with the highest immediate merge score, ties to more empty cells
    Greedy,
}

#[derive(Debug, Clone, Copy)]
struct GameResult {
    score: Score,
    max_tile: u32,
    moves: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    GameEngine::init();
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new().num_threads(n).build_global()?;
    }

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.games);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:40}] {pos}/{len} games | {msg}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let start = Instant::now();
    let results: Vec<GameResult> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let r = play_one(args.seed.wrapping_add(i), args.policy, args.steps);
            pb.inc(1);
            r
        })
        .collect();
    pb.finish_and_clear();

    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    let total_moves: u64 = results.iter().map(|r| r.moves).sum();
    let best = results.iter().map(|r| r.score).max().unwrap_or(0);
    let mean = if results.is_empty() { 0.0 } else { results.iter().map(|r| r.score as f64).sum::<f64>() / results.len() as f64 };
    let wins = results.iter().filter(|r| r.max_tile >= WINNING_TILE).count();
    info!(games = results.len(), elapsed_s = elapsed, "simulation finished");
    println!(
        "games: {} | mean score: {:.1} | best: {} | reached {}: {} ({:.1}%) | moves/sec: {:.0}",
        results.len(),
        mean,
        best,
        WINNING_TILE,
        wins,
        100.0 * wins as f64 / results.len().max(1) as f64,
        total_moves as f64 / elapsed
    );

    let mut tiles: Vec<u32> = results.iter().map(|r| r.max_tile).collect();
    tiles.sort_unstable();
    tiles.dedup();
    for tile in tiles.into_iter().rev() {
        let n = results.iter().filter(|r| r.max_tile == tile).count();
        println!("{tile:>6}: {n}");
    }
    Ok(())
}

fn play_one(seed: u64, policy: Policy, steps: Option<u64>) -> GameResult {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut board = Board::initialize(&mut rng);
    let mut score: Score = 0;
    let mut moves = 0u64;
    while !board.is_terminal() {
        if steps.is_some_and(|limit| moves >= limit) {
            break;
        }
        let Some(dir) = choose(board, policy, &mut rng) else { break };
        let out = board.apply_move(dir);
        score += out.score_delta;
        board = out.board.with_random_tile(&mut rng);
        moves += 1;
    }
    GameResult { score, max_tile: board.max_tile(), moves }
}

fn choose(board: Board, policy: Policy, rng: &mut StdRng) -> Option<Direction> {
    let legal: Vec<_> = Direction::ALL
        .iter()
        .map(|&d| (d, board.apply_move(d)))
        .filter(|(_, out)| out.moved)
        .collect();
    match policy {
        Policy::Random => legal.choose(rng).map(|(d, _)| *d),
        Policy::Greedy => legal
            .iter()
            .max_by_key(|(_, out)| (out.score_delta, out.board.count_empty()))
            .map(|(d, _)| *d),
    }
}
