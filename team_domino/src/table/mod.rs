//! Table module: runs game sessions for connected players.
//!
//! This module implements:
//! - TableActor: Async actor owning a single [`GameSession`](crate::GameSession)
//! - TableManager: Registry of table instances
//! - Message-based communication with tokio channels
//! - Turn timers and the pause between rounds
//!
//! ## Architecture
//!
//! Each table runs in a separate Tokio task with an mpsc message inbox, so
//! commands against one table are applied one at a time. When the current
//! player's turn timer runs out the actor plays for them. Settled rounds are
//! followed by a short pause before the next deal. Engine events and each
//! player's private view are pushed to subscribers after every change.
//!
//! ## Example
//!
//! ```no_run
//! use team_domino::table::{TableActor, TableConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, handle) = TableActor::new(1, TableConfig::default());
//!     tokio::spawn(actor.run());
//!
//!     let player = handle.join("socket-1".into(), "Ana").await.unwrap();
//!     println!("seated {} as {}", player.name, player.id);
//! }
//! ```

pub mod actor;
pub mod config;
pub mod manager;
pub mod messages;

pub use actor::{TableActor, TableHandle};
pub use config::{ConfigError, TableConfig, TableId};
pub use manager::{TableManager, TableMetadata};
pub use messages::{TableError, TableMessage, TableNotification, TableStateResponse};
