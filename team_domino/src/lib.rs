//! # Team Domino
//!
//! A four-player team domino rules engine played with a double-six set.
//!
//! Four players join a table, are drawn into two teams of two, and play
//! rounds until one team reaches six points. Each round deals six tiles to
//! every player and leaves four in a boneyard that is never drawn from.
//! Tiles are played on either open end of a single line. A round ends when
//! someone empties their hand, scored by how the last tile was played, or
//! when all four players pass in a row, scored by the lowest pip total left
//! in hand. Draws double the value of the next decisive round.
//!
//! ## Core Modules
//!
//! - [`game`]: The session state machine, entities, and scoring
//! - [`table`]: An actor that owns a session and drives turn timers and
//!   round transitions for connected players
//!
//! ## Example
//!
//! ```
//! use team_domino::GameSession;
//!
//! let mut session = GameSession::with_seed(7);
//! for (conn, name) in [("c1", "Ana"), ("c2", "Bruno"), ("c3", "Caio"), ("c4", "Dedé")] {
//!     session.add_player(conn.into(), name).unwrap();
//! }
//! session.start_game().unwrap();
//! assert_eq!(session.round_number(), 1);
//! ```

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    AutoPlay, GameEvent, GameSession, UserError,
    constants::{self, NUM_PLAYERS, WINNING_SCORE},
    entities::{self, End, GameView, GameViews, Phase, Player, PlayerId, Team, Tile},
    scoring::{self, RoundOutcome, WinKind},
};

/// Table actor, handles, and manager.
pub mod table;
pub use table::{TableConfig, TableHandle, TableManager};
