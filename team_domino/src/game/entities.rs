use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{self},
};
use uuid::Uuid;

use super::{
    constants::{DECK_SIZE, MAX_NAME_LENGTH, MAX_PIP, MIN_NAME_LENGTH},
    errors::UserError,
};

/// Number of spots on one half of a tile, `0` (blank) through [`MAX_PIP`].
pub type Pip = u8;

/// An unordered pair of pip values. Orientation only matters once a tile is
/// placed on the table, so a tile in a hand may be flipped freely.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "TileRepr", into = "TileRepr")]
pub struct Tile {
    left: Pip,
    right: Pip,
}

impl Tile {
    /// Pips above [`MAX_PIP`] are a programming error; tiles coming off the
    /// wire are validated during deserialization instead.
    #[must_use]
    pub const fn new(left: Pip, right: Pip) -> Self {
        debug_assert!(left <= MAX_PIP && right <= MAX_PIP);
        Self { left, right }
    }

    #[must_use]
    pub const fn left(&self) -> Pip {
        self.left
    }

    #[must_use]
    pub const fn right(&self) -> Pip {
        self.right
    }

    #[must_use]
    pub const fn is_double(&self) -> bool {
        self.left == self.right
    }

    /// Total pip count, used for locked-game tallies and opener selection.
    #[must_use]
    pub const fn pips(&self) -> u32 {
        self.left as u32 + self.right as u32
    }

    #[must_use]
    pub const fn flipped(&self) -> Self {
        Self {
            left: self.right,
            right: self.left,
        }
    }

    #[must_use]
    pub const fn has_pip(&self, value: Pip) -> bool {
        self.left == value || self.right == value
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}|{}]", self.left, self.right)
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct TileRepr {
    left: Pip,
    right: Pip,
    #[serde(default)]
    is_double: bool,
}

impl From<Tile> for TileRepr {
    fn from(value: Tile) -> Self {
        Self {
            left: value.left,
            right: value.right,
            is_double: value.is_double(),
        }
    }
}

impl TryFrom<TileRepr> for Tile {
    type Error = String;

    // `isDouble` is derived, so whatever the client sent for it is ignored.
    fn try_from(value: TileRepr) -> Result<Self, Self::Error> {
        if value.left > MAX_PIP || value.right > MAX_PIP {
            return Err(format!(
                "pip values must be within 0..={MAX_PIP}, got {}/{}",
                value.left, value.right
            ));
        }
        Ok(Self::new(value.left, value.right))
    }
}

/// One of the two open ends of the table.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum End {
    Left,
    Right,
}

impl End {
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];
}

impl fmt::Display for End {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Left => "left",
            Self::Right => "right",
        };
        write!(f, "{repr}")
    }
}

/// Pool of all 28 double-six tiles. Rebuilt, shuffled, and dealt from the
/// front every round; whatever isn't dealt is the boneyard.
#[derive(Clone, Debug)]
pub struct Deck {
    tiles: Vec<Tile>,
    /// Index of the first tile not dealt yet.
    next: usize,
}

impl Deck {
    /// Fisher-Yates from the last index down to 1, swapping with a uniformly
    /// chosen index in `0..=i`.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.tiles.len()).rev() {
            let j = rng.random_range(0..=i);
            self.tiles.swap(i, j);
        }
        self.next = 0;
    }

    /// Takes the next contiguous slice of `size` tiles.
    pub fn deal_hand(&mut self, size: usize) -> Vec<Tile> {
        let end = (self.next + size).min(self.tiles.len());
        let hand = self.tiles[self.next..end].to_vec();
        self.next = end;
        hand
    }

    /// Tiles that weren't dealt this round. They are never drawn.
    #[must_use]
    pub fn boneyard(&self) -> &[Tile] {
        &self.tiles[self.next..]
    }

    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}

impl Default for Deck {
    fn default() -> Self {
        let mut tiles = Vec::with_capacity(DECK_SIZE);
        for i in 0..=MAX_PIP {
            for j in i..=MAX_PIP {
                tiles.push(Tile::new(i, j));
            }
        }
        Self { tiles, next: 0 }
    }
}

/// Stable identity of a seated player for the lifetime of the session.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport-level handle for a player. Swapped on reconnect, so nothing in
/// the rules engine keys off of it except lookups at the boundary.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ConnectionHandle(String);

impl ConnectionHandle {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ConnectionHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A trimmed display name between 2 and 20 characters.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String")]
pub struct PlayerName(String);

impl PlayerName {
    pub fn parse(s: &str) -> Result<Self, UserError> {
        let trimmed = s.trim();
        let len = trimmed.chars().count();
        if len < MIN_NAME_LENGTH {
            return Err(UserError::NameTooShort);
        }
        if len > MAX_NAME_LENGTH {
            return Err(UserError::NameTooLong);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Names are unique per table regardless of case.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for PlayerName {
    type Error = UserError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Team {
    One,
    Two,
}

impl Team {
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    #[must_use]
    pub const fn other(&self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", u8::from(*self))
    }
}

impl From<Team> for u8 {
    fn from(value: Team) -> Self {
        match value {
            Team::One => 1,
            Team::Two => 2,
        }
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            v => Err(format!("no such team {v}")),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub connection_handle: ConnectionHandle,
    pub name: PlayerName,
    pub team: Option<Team>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TeamAssignment {
    pub team1: Vec<Player>,
    pub team2: Vec<Player>,
}

impl TeamAssignment {
    #[must_use]
    pub fn members(&self, team: Team) -> &[Player] {
        match team {
            Team::One => &self.team1,
            Team::Two => &self.team2,
        }
    }
}

/// A tile as it was placed, and on which end.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub player_id: PlayerId,
    pub tile: Tile,
    pub end: End,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on the {} end", self.tile, self.end)
    }
}

/// Match scoreboard, serialized as `{"1": n, "2": n}`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Scores {
    #[serde(rename = "1")]
    pub team1: u32,
    #[serde(rename = "2")]
    pub team2: u32,
}

impl Scores {
    #[must_use]
    pub const fn get(&self, team: Team) -> u32 {
        match team {
            Team::One => self.team1,
            Team::Two => self.team2,
        }
    }

    /// Adds points to a team and returns its new total.
    pub fn award(&mut self, team: Team, points: u32) -> u32 {
        let score = match team {
            Team::One => &mut self.team1,
            Team::Two => &mut self.team2,
        };
        *score = score.saturating_add(points);
        *score
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.team1, self.team2)
    }
}

/// Coarse lifecycle of a session.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    NotStarted,
    InProgress,
    /// A hand emptied.
    RoundEnded,
    /// Every player passed in a row.
    Locked,
    MatchEnded,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::RoundEnded => "round ended",
            Self::Locked => "locked",
            Self::MatchEnded => "match ended",
        };
        write!(f, "{repr}")
    }
}

/// Everything a single player is allowed to see. Only the viewer's own hand
/// is included; everyone else is reduced to a tile count.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub player_id: PlayerId,
    pub phase: Phase,
    pub hand: Vec<Tile>,
    pub table: Vec<Tile>,
    pub current_player: Option<Player>,
    pub players: Vec<Player>,
    pub teams: TeamAssignment,
    pub scores: Scores,
    pub round_number: u32,
    pub tiles_left: HashMap<PlayerId, usize>,
}

/// Type alias for a per-player mapping of views.
pub type GameViews = HashMap<PlayerId, GameView>;
