//! Offline match simulation against a bare session.

use anyhow::{Context, Error, bail};
use team_domino::{
    GameSession, Team,
    entities::Scores,
};

/// Rounds after which a match is considered stuck.
const MAX_ROUNDS: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub seed: u64,
    pub rounds: u32,
    pub winner: Team,
    pub scores: Scores,
    pub draws: u32,
    pub passes: u32,
}

/// Plays a whole match where every turn is an auto-move, settling rounds
/// the same way a table does.
pub fn play_match(names: &[&str], seed: u64) -> Result<MatchSummary, Error> {
    let mut session = GameSession::with_seed(seed);
    for (i, name) in names.iter().enumerate() {
        session.add_player(format!("bot-{i}").as_str().into(), name)?;
    }
    session.start_game()?;

    let mut draws = 0;
    let mut passes = 0;
    loop {
        let current = session
            .current_player()
            .context("match started without a current player")?;
        if !session.make_auto_move(current.id)?.moved() {
            passes += 1;
        }

        let outcome = if session.is_round_ended() {
            session.end_round(Some(current.id))?
        } else if session.is_game_locked() {
            session.handle_locked_game()?
        } else {
            continue;
        };
        log::debug!("{outcome}");

        if outcome.is_draw() {
            draws += 1;
        }
        if let Some(winner) = outcome.match_winner {
            return Ok(MatchSummary {
                seed,
                rounds: session.round_number(),
                winner,
                scores: session.scores(),
                draws,
                passes,
            });
        }
        if session.round_number() >= MAX_ROUNDS {
            bail!("match with seed {seed} still undecided after {MAX_ROUNDS} rounds");
        }
        session.start_new_round()?;
    }
}
