//! Round scoring. Everything here is a pure function of the final table
//! shape or the hands left when a game locks.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entities::{Pip, PlayerId, Scores, Team, Tile};

/// How a round was won by emptying a hand.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinKind {
    /// Went out with a double while both open ends show the same value.
    Cruzada,
    /// Went out with a non-double matching both (different) open ends.
    LaELo,
    /// Went out with a double.
    Carroca,
    Plain,
}

impl WinKind {
    #[must_use]
    pub const fn base_points(&self) -> u32 {
        match self {
            Self::Cruzada => 4,
            Self::LaELo => 3,
            Self::Carroca => 2,
            Self::Plain => 1,
        }
    }
}

impl fmt::Display for WinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Cruzada => "cruzada",
            Self::LaELo => "lá e lô",
            Self::Carroca => "carroça",
            Self::Plain => "batida",
        };
        write!(f, "{repr}")
    }
}

/// Classifies a win from the tile the winner went out with and the table's
/// open ends after it was placed. Checks run strongest first, so exactly one
/// kind applies.
#[must_use]
pub fn classify_win(winning_tile: Tile, open_ends: (Pip, Pip)) -> WinKind {
    let (left, right) = open_ends;
    if winning_tile.is_double() && left == right {
        WinKind::Cruzada
    } else if !winning_tile.is_double()
        && left != right
        && winning_tile.has_pip(left)
        && winning_tile.has_pip(right)
    {
        WinKind::LaELo
    } else if winning_tile.is_double() {
        WinKind::Carroca
    } else {
        WinKind::Plain
    }
}

/// Each consecutive locked-game draw doubles what the next decisive round is
/// worth.
#[must_use]
pub const fn multiplier_for(consecutive_draws: u32) -> u32 {
    2u32.saturating_pow(consecutive_draws)
}

/// Outcome of tallying the hands of a locked game.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LockedResolution {
    /// `seat` is the first seat (in join order) holding the lowest sum.
    Winner { team: Team, seat: usize, lowest: u32 },
    /// Both teams hold the lowest sum.
    Draw { lowest: u32 },
}

/// Resolves a locked game from `(team, pip sum)` pairs in seat order.
///
/// The global minimum is computed first, then every hand at that minimum is
/// classified by team. A tie that spans both teams is a draw no matter where
/// the tied hands sit in the scan order. Returns `None` for an empty table.
#[must_use]
pub fn resolve_locked(hands: &[(Team, u32)]) -> Option<LockedResolution> {
    let lowest = hands.iter().map(|&(_, sum)| sum).min()?;
    let mut at_lowest = hands
        .iter()
        .enumerate()
        .filter(|(_, (_, sum))| *sum == lowest);

    let (seat, &(team, _)) = at_lowest.next()?;
    if at_lowest.any(|(_, (other, _))| *other != team) {
        Some(LockedResolution::Draw { lowest })
    } else {
        Some(LockedResolution::Winner { team, seat, lowest })
    }
}

/// How a round finished.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "kind")]
pub enum Finish {
    Domino(WinKind),
    Locked,
    LockedDraw,
}

impl fmt::Display for Finish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domino(kind) => write!(f, "{kind}"),
            Self::Locked => write!(f, "locked game"),
            Self::LockedDraw => write!(f, "locked game draw"),
        }
    }
}

/// Result of settling a round, suitable for broadcasting as is.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    pub round_number: u32,
    pub finish: Finish,
    /// `None` on a draw.
    pub winner: Option<Team>,
    pub winning_player: Option<PlayerId>,
    /// Points actually awarded, multiplier included.
    pub points: u32,
    /// Multiplier that was in effect for this round.
    pub multiplier: u32,
    /// Multiplier the next round will be played for.
    pub next_multiplier: u32,
    pub scores: Scores,
    pub match_winner: Option<Team>,
}

impl RoundOutcome {
    #[must_use]
    pub const fn is_draw(&self) -> bool {
        matches!(self.finish, Finish::LockedDraw)
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.winner {
            Some(team) => write!(
                f,
                "round {}: {team} wins {} point(s) by {} ({})",
                self.round_number, self.points, self.finish, self.scores
            ),
            None => write!(
                f,
                "round {}: {}, next round is worth x{}",
                self.round_number, self.finish, self.next_multiplier
            ),
        }
    }
}
