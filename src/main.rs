use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use games::azul::{Game, GameConfig, GameMode, Strategy};
use games::Validate;
use rating::{store, JsonFileStore, RatingConfig, RatingSystem};
use tournament::{feed_ratings, play_all, round_robin, MatchResult, SimulationSummary, UpdateTimings};

mod errors;
mod games;
mod rating;
mod tournament;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game between CPU strategies
    Play {
        #[arg(short, long, value_delimiter = ',', default_value = "greedy,smart")]
        strategies: Vec<Strategy>,
        #[arg(short, long, default_value_t = GameMode::Pattern)]
        mode: GameMode,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Play every ordered pair of strategies against each other
    Simulate {
        #[arg(short)]
        log_file: PathBuf,
        #[arg(short, long, default_value_t = 100)]
        games: usize,
        #[arg(short, long, value_delimiter = ',', default_value = "dummy,greedy,smart,strategic")]
        strategies: Vec<Strategy>,
        #[arg(short, long, default_value = "analysis/results.json")]
        results: PathBuf,
        #[arg(short, long, default_value_t = GameMode::Pattern)]
        mode: GameMode,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Benchmark Elo, Glicko-2 and TrueSkill on the same stream of games
    Rate {
        #[arg(short, long, default_value_t = 100)]
        games: usize,
        #[arg(short, long, default_value = "analysis")]
        dir: PathBuf,
        #[arg(long)]
        reset: bool,
        #[arg(short, long, value_delimiter = ',', default_value = "dummy,greedy,smart,strategic,minmax")]
        strategies: Vec<Strategy>,
        #[arg(long)]
        seed: Option<u64>,
        /// JSON file overriding Elo, Glicko-2 and TrueSkill parameters
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn write_game_log(results: &[MatchResult], file: &Path) -> Result<()> {
    let file = File::create(file)?;
    let mut writer = BufWriter::new(file);
    for item in results {
        jsonl::write(&mut writer, item)?;
    }
    Ok(())
}

// Drop games that failed, they have been logged already
fn finished(results: Vec<Result<MatchResult>>) -> Vec<MatchResult> {
    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(m) => Some(m),
            Err(err) => {
                log::error!("{:#}", err);
                None
            }
        })
        .collect()
}

fn report(summary: &SimulationSummary) {
    for (first, row) in &summary.0 {
        for (second, pair) in row {
            let total = pair.wins + pair.losses + pair.ties;
            println!(
                "{} vs {}: {}/{}/{} (W/L/T of {}), win ratio: {:.3}, average score: {:.1} - {:.1}",
                first,
                second,
                pair.wins,
                pair.losses,
                pair.ties,
                total,
                pair.wins as f64 / total as f64,
                pair.avg_first,
                pair.avg_second
            );
        }
    }
}

fn print_ratings(systems: &[Box<dyn RatingSystem>]) {
    for system in systems {
        println!("\n{} Ratings:", system.name());
        println!("{}", system.ratings_table());
        println!();
        println!("{}", system.matchup_table());
    }
}

fn play(strategies: Vec<Strategy>, mode: GameMode, seed: Option<u64>) -> Result<()> {
    let config = GameConfig {
        mode,
        seed,
        ..GameConfig::default()
    };
    config.validate()?;

    let mut game = Game::new(strategies.clone(), &config)?;
    let scores = game.play_game()?;
    game.validate()?;

    println!("Seed {}, {} rounds", game.seed, game.board.round - 1);
    for (i, (strategy, score)) in strategies.iter().zip(&scores).enumerate() {
        println!("Final score P{} ({}): {}", i + 1, strategy, score);
    }
    let winners: Vec<String> = game.winners().iter().map(|w| format!("P{}", w + 1)).collect();
    println!("Winner: {}", winners.join(", "));

    Ok(())
}

fn simulate(
    log_file: &Path,
    n_games: usize,
    strategies: &[Strategy],
    results_file: &Path,
    mode: GameMode,
    seed: Option<u64>,
) -> Result<()> {
    let config = GameConfig {
        mode,
        ..GameConfig::default()
    };
    config.validate()?;

    let schedule: Vec<(Strategy, Strategy)> = round_robin(strategies, true)
        .into_iter()
        .flat_map(|pair| std::iter::repeat(pair).take(n_games))
        .collect();
    let base_seed = seed.unwrap_or_else(|| rand::rng().random());

    log::info!("Running {} simulations for {} strategies", schedule.len(), strategies.len());
    let results = finished(play_all(&schedule, &config, base_seed));

    write_game_log(&results, log_file)?;

    let summary = SimulationSummary::from_results(&results);
    report(&summary);

    let results_store = JsonFileStore::new(results_file);
    let mut stored: SimulationSummary = store::load(&results_store);
    stored.merge(summary);
    store::save(&results_store, &stored)?;
    log::info!("Results saved to {}", results_file.display());

    Ok(())
}

fn rate(
    n_games: usize,
    dir: &Path,
    reset: bool,
    strategies: &[Strategy],
    seed: Option<u64>,
    config_file: Option<&Path>,
) -> Result<()> {
    let matchups = round_robin(strategies, false);
    if matchups.is_empty() {
        bail!("Rating needs at least two distinct strategies");
    }
    // Each matchup is played in both seatings per round
    let schedule: Vec<(Strategy, Strategy)> = matchups.iter().flat_map(|&(a, b)| [(a, b), (b, a)]).collect();

    let rating_config = match config_file {
        Some(path) => RatingConfig::from_file(path)?,
        None => RatingConfig::default(),
    };
    let mut systems = rating_config.systems();
    let stores: Vec<JsonFileStore> = systems
        .iter()
        .map(|s| JsonFileStore::new(dir.join(format!("{}_ratings.json", s.name().to_lowercase()))))
        .collect();
    if !reset {
        for (system, store) in systems.iter_mut().zip(&stores) {
            system.load(store);
        }
    }

    let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
    println!("\nRunning {} total games across {} matchups", n_games * schedule.len(), matchups.len());
    println!("Each matchup will play {} games in each configuration", n_games);
    println!("Testing all strategies: {}\n", names.join(", "));

    let config = GameConfig::default();
    let base_seed = seed.unwrap_or_else(|| rand::rng().random());
    let report_every = (n_games / 10).max(1);
    let mut timings = UpdateTimings::default();
    let mut games_played = 0;

    for round in 0..n_games {
        let round_seed = base_seed.wrapping_add((round * schedule.len()) as u64);
        let results = finished(play_all(&schedule, &config, round_seed));
        games_played += results.len();

        feed_ratings(&mut systems, &results, &mut timings);
        for (system, store) in systems.iter().zip(&stores) {
            system.save(store)?;
        }

        if round % report_every == 0 {
            println!("\nRatings after {} games:", games_played);
            print_ratings(&systems);
        }
    }

    println!("\nFinal Ratings:");
    print_ratings(&systems);
    println!("\n{}", timings.table());

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.commands {
        Commands::Play { strategies, mode, seed } => play(strategies, mode, seed),
        Commands::Simulate {
            log_file,
            games,
            strategies,
            results,
            mode,
            seed,
        } => simulate(&log_file, games, &strategies, &results, mode, seed),
        Commands::Rate {
            games,
            dir,
            reset,
            strategies,
            seed,
            config,
        } => rate(games, &dir, reset, &strategies, seed, config.as_deref()),
    }
}
