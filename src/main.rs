use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use plasma_learn_hub::chain::{parse_xpl, ChainClient, MemoryContract};
use plasma_learn_hub::config::{HubConfig, CONTRACT_ADDRESS_ENV};
use plasma_learn_hub::engine::Direction;
use plasma_learn_hub::game::Turn;
use plasma_learn_hub::leaderboard::{GameType, Window};
use plasma_learn_hub::profile::format_countdown;
use plasma_learn_hub::quiz::score_message;
use plasma_learn_hub::storage::{FileStore, KvStore, MemoryStore, Namespaced};
use plasma_learn_hub::{Hub, Saved};
use tracing_subscriber::EnvFilter;

type CliHub = Hub<Box<dyn KvStore>, MemoryContract>;

#[derive(Debug, Parser)]
#[command(name = "plasma-hub", about = "Plasma Learn Hub: 2048, quizzes and leaderboards")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,

    /// JSON config file; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file for saved state
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Keep everything in memory for this run
    #[arg(long, global = true, conflicts_with = "storage")]
    memory: bool,

    /// Key prefix inside the store
    #[arg(long, global = true)]
    namespace: Option<String>,

    #[arg(long, global = true, env = CONTRACT_ADDRESS_ENV)]
    contract_address: Option<String>,

    /// Wallet to connect before running the command
    #[arg(long, global = true)]
    wallet: Option<String>,

    /// Credit the wallet with this much XPL on the in-process contract
    #[arg(long, global = true)]
    fund: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Play 2048 (w/a/s/d or up/down/left/right, q to stop)
    Play {
        /// Buy the game with the connected wallet
        #[arg(long)]
        paid: bool,
    },
    /// Answer stablecoin questions (1/2 to answer, q to stop)
    Quiz {
        #[arg(long, default_value = "Anonymous")]
        nickname: String,
        /// Paid 20-question round
        #[arg(long)]
        paid: bool,
    },
    /// Show a leaderboard
    Leaderboard {
        #[arg(long, default_value = "quiz")]
        game: GameType,
        #[arg(long, default_value = "global")]
        window: Window,
    },
    /// Spin the daily reward wheel
    Spin,
    /// Answer the question of the day
    Daily {
        /// Option id; omit to just show the question
        answer: Option<String>,
    },
    /// Show the connected wallet's profile
    Profile,
    /// Estimate this week's prize pool
    PrizePool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();
    let config = resolve_config(&args)?;
    let mut hub = build_hub(&config, &args)?;

    match args.cmd {
        Cmd::Play { paid } => play(&mut hub, paid),
        Cmd::Quiz { nickname, paid } => quiz(&mut hub, &nickname, paid),
        Cmd::Leaderboard { game, window } => {
            let rows = hub.leaderboard(game, window, Utc::now())?;
            if rows.is_empty() {
                println!("No {game} scores yet ({window}).");
            }
            for (i, entry) in rows.iter().enumerate() {
                println!("{:>2}. {:<20} {}", i + 1, entry.nickname(), entry.display_score());
            }
            Ok(())
        }
        Cmd::Spin => {
            let now = Utc::now();
            match hub.spin_wheel(&mut rand::thread_rng(), now) {
                Ok(Saved { value, saved }) => {
                    println!("You won {}!", value.label());
                    warn_unsaved(saved);
                }
                Err(plasma_learn_hub::HubError::Spin(e)) => {
                    println!("{e} ({})", format_countdown(hub.spin_remaining(now)?));
                }
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Cmd::Daily { answer } => {
            let now = Utc::now();
            let q = hub.daily_question(now);
            let Some(answer) = answer else {
                println!("{}", q.prompt);
                for o in &q.options {
                    println!("  [{}] {}", o.id, o.name);
                }
                return Ok(());
            };
            let Saved { value, saved } = hub.answer_daily_quiz(&answer, now)?;
            if value > 0 {
                println!("Correct! +{value} LHP");
            } else {
                println!("Not quite. {}", q.explanation);
            }
            warn_unsaved(saved);
            Ok(())
        }
        Cmd::Profile => {
            let p = hub.profile()?;
            println!("{}  {} LHP", p.wallet_address.short(), p.lhp_points);
            println!("games: {}  streak: {}  days: {}", p.total_games, p.current_streak, p.total_days);
            println!("achievements: {}/{}", p.unlocked_count(), p.achievements.len());
            for a in &p.achievements {
                let mark = if a.unlocked { "x" } else { " " };
                println!("  [{mark}] {} {} ({}/{})", a.icon, a.name, a.progress, a.max_progress);
            }
            let stats = hub.chain().player_stats(None);
            println!("on chain: {} games, best {}", stats.total_games, stats.best_score);
            Ok(())
        }
        Cmd::PrizePool => {
            let pool = hub.prize_pool(Utc::now())?;
            println!(
                "pool: {} XPL from {} ({} players)",
                plasma_learn_hub::chain::format_ether(pool.total_pool),
                plasma_learn_hub::chain::format_ether(pool.total_fees),
                pool.participants
            );
            for r in &pool.rewards {
                println!("  #{} {:>2}%  {}", r.position, r.percentage, plasma_learn_hub::chain::format_xpl(r.amount));
            }
            println!("ends {}", pool.end_date_label());
            Ok(())
        }
    }
}

fn resolve_config(args: &Args) -> anyhow::Result<HubConfig> {
    let mut config = match &args.config {
        Some(path) => HubConfig::load(path)?,
        None => HubConfig::default(),
    };
    if args.memory {
        config.storage_path = None;
    } else if let Some(path) = &args.storage {
        config.storage_path = Some(path.clone());
    }
    if let Some(ns) = &args.namespace {
        config.namespace = Some(ns.clone()).filter(|n| !n.is_empty());
    }
    if let Some(addr) = &args.contract_address {
        config.contract_address = Some(addr.clone());
    }
    config.validate()?;
    Ok(config)
}

fn build_hub(config: &HubConfig, args: &Args) -> anyhow::Result<CliHub> {
    let base: Box<dyn KvStore> = match &config.storage_path {
        Some(path) => Box::new(FileStore::open(path).with_context(|| format!("opening {}", path.display()))?),
        None => Box::new(MemoryStore::new()),
    };
    let store: Box<dyn KvStore> = match &config.namespace {
        Some(ns) => Box::new(Namespaced::new(base, ns)),
        None => base,
    };
    let contract = MemoryContract::new(config.game_price_wei()?);
    let chain = ChainClient::new(contract, config.contract_address()?);
    let mut hub = Hub::new(store, chain, config.leaderboard()?, config.spin_cooldown());

    if let Some(wallet) = &args.wallet {
        let connection = hub.connect_wallet(wallet)?;
        if let Some(amount) = &args.fund {
            let amount = parse_xpl(amount)?;
            hub.chain_mut().contract_mut().fund(&connection.address, amount);
        }
        eprintln!("connected {} ({})", hub.chain().formatted_address(), hub.chain().balance_display()?);
    } else if args.fund.is_some() {
        bail!("--fund needs --wallet");
    }
    Ok(hub)
}

fn warn_unsaved(saved: bool) {
    if !saved {
        eprintln!("Played locally but not saved.");
    }
}

fn read_line(lines: &mut impl Iterator<Item = io::Result<String>>) -> anyhow::Result<Option<String>> {
    print!("> ");
    io::stdout().flush()?;
    Ok(lines.next().transpose()?.map(|l| l.trim().to_string()))
}

fn play(hub: &mut CliHub, paid: bool) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    if paid {
        let id = hub.purchase_arcade(&mut rng, Utc::now())?;
        println!("Game {id} purchased for {}", hub.chain().game_price_display());
    } else {
        hub.start_practice(&mut rng);
    }
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    println!("{}", hub.game().board());
    while hub.game().is_active() {
        let Some(input) = read_line(&mut lines)? else { break };
        if input == "q" {
            break;
        }
        let dir: Direction = match input.parse() {
            Ok(d) => d,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        let Saved { value, saved } = hub.play_arcade(dir, &mut rng);
        warn_unsaved(saved);
        if let Turn::Moved { just_won, .. } = value {
            println!("{}", hub.game().board());
            println!("score {}  best {}", hub.game().score(), hub.game().best_score());
            if just_won {
                println!("You reached 2048! Keep going.");
            }
        }
    }
    let done = hub.complete_arcade(Utc::now())?;
    println!("Final score {} (max tile {})", done.score, done.max_tile);
    warn_unsaved(done.saved);
    if let Some(e) = done.chain_error {
        eprintln!("Score saved locally; contract update failed: {e}");
    }
    Ok(())
}

fn quiz(hub: &mut CliHub, nickname: &str, paid: bool) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    if paid {
        let Saved { value, saved } = hub.start_paid_quiz(nickname, Utc::now())?;
        println!("Quiz {value} purchased");
        warn_unsaved(saved);
    } else if hub.quiz().is_none() {
        warn_unsaved(hub.start_quiz(nickname).saved);
    } else {
        println!("Resuming your last quiz.");
    }
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let q = hub.next_question(&mut rng)?;
        println!("\n{}", q.prompt);
        for (i, o) in q.options.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, o.name, o.description);
        }
        let Some(input) = read_line(&mut lines)? else { break };
        let option = match input.as_str() {
            "q" => break,
            "1" => q.options[0].id,
            "2" => q.options[1].id,
            other => other,
        };
        let Saved { value, saved } = hub.answer_quiz(q.id, option)?;
        warn_unsaved(saved);
        if value.correct {
            println!("Correct! Streak {}", value.streak);
        } else {
            println!("Wrong. {}", q.explanation);
        }
        if let Some(points) = value.awarded {
            println!("+{points} points");
        }
        if value.finished {
            break;
        }
    }
    let Saved { value: results, saved } = hub.end_quiz(Utc::now())?;
    warn_unsaved(saved);
    println!(
        "\n{}: {} points, {}/{} correct ({}%)",
        score_message(results.points),
        results.points,
        results.correct_answers,
        results.questions_answered,
        results.accuracy()
    );
    Ok(())
}
