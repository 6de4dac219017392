//! Table actor message types.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::config::{ConfigError, TableId};
use crate::game::{
    GameEvent, UserError,
    entities::{ConnectionHandle, End, GameView, Move, Phase, Player, PlayerId, Scores},
};

/// Messages that can be sent to a TableActor
#[derive(Debug)]
pub enum TableMessage {
    /// Join table request
    Join {
        connection: ConnectionHandle,
        name: String,
        response: oneshot::Sender<Result<Player, TableError>>,
    },

    /// Leave table request
    Leave {
        connection: ConnectionHandle,
        response: oneshot::Sender<Result<Player, TableError>>,
    },

    /// The connection dropped. Its player is unseated once the grace period
    /// runs out, unless they reconnect first.
    Disconnect {
        connection: ConnectionHandle,
        response: oneshot::Sender<Result<(), TableError>>,
    },

    /// Rebind a seated player to a new connection
    Reconnect {
        player_id: PlayerId,
        connection: ConnectionHandle,
        response: oneshot::Sender<Result<(), TableError>>,
    },

    /// Start the match by hand, for tables without auto start
    Start {
        response: oneshot::Sender<Result<(), TableError>>,
    },

    /// Place a tile from the sender's hand
    PlayTile {
        connection: ConnectionHandle,
        tile_index: usize,
        end: End,
        response: oneshot::Sender<Result<Move, TableError>>,
    },

    /// Pass the sender's turn
    Pass {
        connection: ConnectionHandle,
        response: oneshot::Sender<Result<(), TableError>>,
    },

    /// Get game view for a specific player
    GetGameView {
        player_id: PlayerId,
        response: oneshot::Sender<Option<GameView>>,
    },

    /// Get current table state
    GetState {
        response: oneshot::Sender<TableStateResponse>,
    },

    /// Subscribe to table notifications
    Subscribe {
        connection: ConnectionHandle,
        sender: mpsc::Sender<TableNotification>,
    },

    /// Unsubscribe from table notifications
    Unsubscribe { connection: ConnectionHandle },

    /// Close table
    Close { response: oneshot::Sender<()> },
}

/// Pushed to subscribers whenever the table changes. Events go to everyone;
/// each seated subscriber then gets their own private view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum TableNotification {
    Event(GameEvent),
    View(GameView),
}

/// Errors returned by table operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// The engine rejected the command
    #[error(transparent)]
    User(#[from] UserError),

    #[error("connection is not seated at this table")]
    NotSeated,

    #[error("table {0} not found")]
    NotFound(TableId),

    /// The actor stopped before answering
    #[error("table is closed")]
    Closed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Table state response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStateResponse {
    pub table_id: TableId,
    pub table_name: String,
    pub phase: Phase,
    /// Player names in seat order
    pub players: Vec<String>,
    pub current_player: Option<PlayerId>,
    pub scores: Scores,
    pub round_number: u32,
    pub point_multiplier: u32,
    pub tiles_on_table: usize,
}

impl TableStateResponse {
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}
