//! Headless team domino match simulator.
//!
//! Plays complete matches with every turn decided by auto-moves, either
//! directly against a session or through a table actor whose turn timer
//! makes every move.

mod sim;

use anyhow::{Error, bail};
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use team_domino::{
    GameEvent,
    table::{TableConfig, TableManager, TableNotification},
};
use tokio::sync::mpsc;

const HELP: &str = "\
Simulate team domino matches between bots

USAGE:
  td_bots [OPTIONS]

OPTIONS:
  --matches    N           Number of matches to play  [default: 1]
  --seed       S           Seed for the first match, incremented per match  [default: random]

FLAGS:
  --via-table              Play through a table actor driven by its turn timer
  -h, --help               Print help information

ENVIRONMENT:
  TABLE_NAME, TABLE_SEED, TABLE_AUTO_START
                           Table settings used with --via-table
  RUST_LOG                 Log filter (e.g. info, debug)
";

const BOT_NAMES: [&str; 4] = ["Bot Norte", "Bot Leste", "Bot Sul", "Bot Oeste"];

/// Turn timer used when playing through a table, so bots "time out" fast.
const BOT_TURN_TIMEOUT_MS: u64 = 5;

struct Args {
    matches: usize,
    seed: u64,
    via_table: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        matches: pargs.value_from_str("--matches").unwrap_or(1),
        seed: pargs
            .value_from_str("--seed")
            .unwrap_or_else(|_| rand::random()),
        via_table: pargs.contains("--via-table"),
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();

    if args.via_table {
        play_via_table(&args).await
    } else {
        play_offline(&args)
    }
}

fn play_offline(args: &Args) -> Result<(), Error> {
    info!("Playing {} offline match(es) from seed {}", args.matches, args.seed);
    let mut wins = [0usize; 2];
    for i in 0..args.matches {
        let seed = args.seed.wrapping_add(i as u64);
        let summary = sim::play_match(&BOT_NAMES, seed)?;
        info!(
            "Match {} (seed {}): {} won {} in {} round(s), {} draw(s), {} pass(es)",
            i + 1,
            summary.seed,
            summary.winner,
            summary.scores,
            summary.rounds,
            summary.draws,
            summary.passes
        );
        wins[usize::from(u8::from(summary.winner)) - 1] += 1;
    }
    info!("Team 1 won {}, team 2 won {}", wins[0], wins[1]);
    Ok(())
}

async fn play_via_table(args: &Args) -> Result<(), Error> {
    let mut config = TableConfig::from_env()?;
    config.turn_timeout_ms = BOT_TURN_TIMEOUT_MS;
    config.round_result_delay_ms = 0;
    config.locked_result_delay_ms = 0;
    config.auto_start = true;
    config.seed = config.seed.or(Some(args.seed));

    let manager = TableManager::new();
    let table_id = manager.create_table(config).await?;
    let table = manager.table(table_id).await?;

    let (tx, mut rx) = mpsc::channel(1024);
    table.subscribe("observer".into(), tx).await?;
    for (i, name) in BOT_NAMES.iter().enumerate() {
        table.join(format!("bot-{i}").as_str().into(), *name).await?;
    }
    info!("Table {} seated {} bots", table_id, BOT_NAMES.len());

    let mut played = 0;
    while played < args.matches {
        let Some(notification) = rx.recv().await else {
            bail!("table {table_id} stopped before the match ended");
        };
        match notification {
            TableNotification::Event(GameEvent::MatchEnded { winner, scores }) => {
                played += 1;
                info!("Match {played}: {winner} won {scores}");
                if played < args.matches {
                    table.start().await?;
                }
            }
            TableNotification::Event(event) => log::debug!("{event}"),
            TableNotification::View(_) => {}
        }
    }

    manager.close_table(table_id).await?;
    Ok(())
}
