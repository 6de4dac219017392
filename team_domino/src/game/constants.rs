/// Highest pip value on a tile.
pub const MAX_PIP: u8 = 6;

/// Number of distinct tiles in a double-six set.
pub const DECK_SIZE: usize = 28;

/// The table is always four players in two teams of two.
pub const NUM_PLAYERS: usize = 4;
pub const TEAM_SIZE: usize = 2;

/// Tiles dealt to each player at the start of a round. The remaining
/// `DECK_SIZE - NUM_PLAYERS * HAND_SIZE` tiles stay in the boneyard.
pub const HAND_SIZE: usize = 6;
pub const BONEYARD_SIZE: usize = DECK_SIZE - NUM_PLAYERS * HAND_SIZE;

/// A match ends the instant either team reaches this score.
pub const WINNING_SCORE: u32 = 6;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 20;
