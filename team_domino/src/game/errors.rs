//! Errors surfaced to the player who issued a command.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{MAX_NAME_LENGTH, MIN_NAME_LENGTH};
use super::entities::{End, Tile};

/// Every rejected command maps onto one of these. None of them leave the
/// session in a different state than before the command was issued.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum UserError {
    // Joining.
    #[error("name too short, use at least {} characters", MIN_NAME_LENGTH)]
    NameTooShort,
    #[error("name too long, use at most {} characters", MAX_NAME_LENGTH)]
    NameTooLong,
    #[error("room is full, try again later")]
    CapacityReached,
    #[error("connection is already seated under another name")]
    ConnectionAlreadySeated,
    #[error("name is already taken")]
    NameTaken,

    // Starting.
    #[error("need exactly 4 players to start")]
    NotEnoughPlayers,
    #[error("game already in progress")]
    GameAlreadyInProgress,

    // Turns.
    #[error("game not started")]
    NotStarted,
    #[error("not your turn")]
    NotYourTurn,

    // Moves.
    #[error("invalid tile index {0}")]
    InvalidIndex(usize),
    #[error("{tile} can't be played on the {end} end")]
    InvalidMove { tile: Tile, end: End },

    // Passing.
    #[error("you have a valid move available")]
    MoveAvailable,

    // Round and match lifecycle.
    #[error("the round is over")]
    RoundOver,
    #[error("the round is still being played")]
    RoundInProgress,
    #[error("the game isn't locked")]
    NotLocked,
    #[error("the round has already been scored")]
    RoundAlreadySettled,
    #[error("the round hasn't been scored yet")]
    RoundNotSettled,
    #[error("the match is over")]
    MatchOver,
    #[error("player does not exist")]
    UserDoesNotExist,
    #[error("player has no team")]
    NoTeam,
}
