//! Team domino rules engine.
//!
//! This module provides the core game implementation:
//! - Tiles, the double-six deck, players, and teams
//! - Turn flow, move validation, and passing
//! - Round scoring, locked-game resolution, and the draw multiplier
//! - Event generation and per-player views

pub mod constants;
pub mod entities;
pub mod errors;
pub mod scoring;

mod state_machine;

pub use errors::UserError;
pub use state_machine::*;
