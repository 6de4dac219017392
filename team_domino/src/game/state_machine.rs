//! Team domino session state machine.
//!
//! A [`GameSession`] owns all mutable state for one table of four players:
//! the roster, teams, hands, the table layout, the scoreboard, and the draw
//! streak. Commands validate fully before mutating anything, so a rejected
//! command never leaves partial state behind. Queries hand out owned
//! snapshots.

use log::{debug, info};
use rand::{
    SeedableRng,
    rngs::StdRng,
    seq::{IndexedRandom, SliceRandom},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    fmt,
};

use super::constants::{HAND_SIZE, NUM_PLAYERS, TEAM_SIZE, WINNING_SCORE};
use super::entities::{
    ConnectionHandle, Deck, End, GameView, GameViews, Move, Phase, Pip, Player, PlayerId,
    PlayerName, Scores, Team, TeamAssignment, Tile,
};
use super::errors::UserError;
use super::scoring::{
    Finish, LockedResolution, RoundOutcome, WinKind, classify_win, multiplier_for,
    resolve_locked,
};

/// Events that occur during gameplay, drained by whoever broadcasts state.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "event")]
pub enum GameEvent {
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player: Player,
    },
    TeamsAssigned {
        teams: TeamAssignment,
    },
    GameStarted {
        opener: PlayerId,
    },
    TilePlayed {
        play: Move,
        auto: bool,
    },
    TurnPassed {
        player_id: PlayerId,
        auto: bool,
    },
    RoundEnded {
        outcome: RoundOutcome,
    },
    /// Every hand is revealed when a game locks.
    GameLocked {
        outcome: RoundOutcome,
        hands: HashMap<PlayerId, Vec<Tile>>,
    },
    NewRound {
        round_number: u32,
        opener: PlayerId,
    },
    MatchEnded {
        winner: Team,
        scores: Scores,
    },
    /// A player dropped mid-match and the match was abandoned.
    SessionReset,
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerJoined { player } => write!(f, "{} joined the table", player.name),
            Self::PlayerLeft { player } => write!(f, "{} left the table", player.name),
            Self::TeamsAssigned { teams } => {
                let names = |members: &[Player]| {
                    members
                        .iter()
                        .map(|p| p.name.to_string())
                        .collect::<Vec<_>>()
                        .join(" & ")
                };
                write!(
                    f,
                    "teams drawn: {} vs {}",
                    names(&teams.team1),
                    names(&teams.team2)
                )
            }
            Self::GameStarted { opener } => write!(f, "game started, {opener} opens"),
            Self::TilePlayed { play, auto } => {
                let how = if *auto { " (timed out)" } else { "" };
                write!(f, "{} played {play}{how}", play.player_id)
            }
            Self::TurnPassed { player_id, auto } => {
                let how = if *auto { " (timed out)" } else { "" };
                write!(f, "{player_id} passed{how}")
            }
            Self::RoundEnded { outcome } => write!(f, "{outcome}"),
            Self::GameLocked { outcome, .. } => write!(f, "game locked, {outcome}"),
            Self::NewRound {
                round_number,
                opener,
            } => write!(f, "round {round_number} started, {opener} opens"),
            Self::MatchEnded { winner, scores } => {
                write!(f, "{winner} won the match ({scores})")
            }
            Self::SessionReset => write!(f, "a player left, the match was reset"),
        }
    }
}

/// Result of a timed-out turn.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AutoPlay {
    Moved(Move),
    Passed,
}

impl AutoPlay {
    #[must_use]
    pub const fn moved(&self) -> bool {
        matches!(self, Self::Moved(_))
    }
}

/// Authoritative rules engine for one table of four.
#[derive(Debug)]
pub struct GameSession {
    /// Seats in join order. Turn order follows this order.
    players: Vec<Player>,
    /// Hands aligned with `players`.
    hands: Vec<Vec<Tile>>,
    /// Left to right; the open ends are the front's left and the back's right.
    table: VecDeque<Tile>,
    deck: Deck,
    phase: Phase,
    current_player_idx: usize,
    round_number: u32,
    scores: Scores,
    /// Consecutive passes since the last tile was placed.
    pass_count: usize,
    last_move: Option<Move>,
    last_winning_team: Option<Team>,
    consecutive_draws: u32,
    point_multiplier: u32,
    /// Set once the current round has been scored.
    round_outcome: Option<RoundOutcome>,
    events: VecDeque<GameEvent>,
    rng: StdRng,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deals, team draws, opener picks, and auto-moves are all reproducible
    /// for a given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            players: Vec::with_capacity(NUM_PLAYERS),
            hands: Vec::with_capacity(NUM_PLAYERS),
            table: VecDeque::with_capacity(NUM_PLAYERS * HAND_SIZE),
            deck: Deck::default(),
            phase: Phase::NotStarted,
            current_player_idx: 0,
            round_number: 1,
            scores: Scores::default(),
            pass_count: 0,
            last_move: None,
            last_winning_team: None,
            consecutive_draws: 0,
            point_multiplier: 1,
            round_outcome: None,
            events: VecDeque::new(),
            rng,
        }
    }

    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Seats a new player. Teams are drawn as soon as the fourth player sits.
    pub fn add_player(
        &mut self,
        connection_handle: ConnectionHandle,
        name: &str,
    ) -> Result<Player, UserError> {
        let name = PlayerName::parse(name)?;
        if self.players.len() >= NUM_PLAYERS {
            return Err(UserError::CapacityReached);
        }
        if self
            .players
            .iter()
            .any(|p| p.connection_handle == connection_handle)
        {
            return Err(UserError::ConnectionAlreadySeated);
        }
        if self.players.iter().any(|p| p.name.same_as(&name)) {
            return Err(UserError::NameTaken);
        }

        let player = Player {
            id: PlayerId::new(),
            connection_handle,
            name,
            team: None,
        };
        info!("{} joined as {}", player.name, player.id);
        self.players.push(player.clone());
        self.hands.push(Vec::with_capacity(HAND_SIZE));
        self.events.push_back(GameEvent::PlayerJoined {
            player: player.clone(),
        });

        if self.players.len() == NUM_PLAYERS {
            self.assign_teams();
            // The returned record reflects the team just drawn.
            return Ok(self.players[NUM_PLAYERS - 1].clone());
        }
        Ok(player)
    }

    /// Uniform random permutation of the seats; the first two form team 1.
    fn assign_teams(&mut self) {
        let mut seats: Vec<usize> = (0..self.players.len()).collect();
        seats.shuffle(&mut self.rng);
        for (i, seat) in seats.into_iter().enumerate() {
            self.players[seat].team = Some(if i < TEAM_SIZE { Team::One } else { Team::Two });
        }
        let teams = self.team_assignment();
        info!(
            "teams drawn: {:?} vs {:?}",
            teams.team1.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            teams.team2.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        self.events.push_back(GameEvent::TeamsAssigned { teams });
    }

    /// Unseats whoever is bound to `connection_handle`. Losing a player once a
    /// match has started abandons the match entirely.
    pub fn remove_player(&mut self, connection_handle: &ConnectionHandle) -> Option<Player> {
        let seat = self
            .players
            .iter()
            .position(|p| &p.connection_handle == connection_handle)?;
        let player = self.players.remove(seat);
        self.hands.remove(seat);

        // Teams only exist while the table is full.
        for p in &mut self.players {
            p.team = None;
        }

        info!("{} ({}) left the table", player.name, player.id);
        self.events.push_back(GameEvent::PlayerLeft {
            player: player.clone(),
        });

        if self.phase != Phase::NotStarted {
            self.reset();
        }
        Some(player)
    }

    fn reset(&mut self) {
        info!("match abandoned, resetting session");
        self.phase = Phase::NotStarted;
        self.scores = Scores::default();
        self.round_number = 1;
        self.current_player_idx = 0;
        self.pass_count = 0;
        self.last_move = None;
        self.last_winning_team = None;
        self.consecutive_draws = 0;
        self.point_multiplier = 1;
        self.round_outcome = None;
        self.table.clear();
        self.deck = Deck::default();
        for hand in &mut self.hands {
            hand.clear();
        }
        self.events.push_back(GameEvent::SessionReset);
    }

    /// Rebinds a player's transport handle after a reconnect. Refused when
    /// the player doesn't exist or another player already holds the handle.
    pub fn update_connection_handle(
        &mut self,
        player_id: PlayerId,
        new_handle: ConnectionHandle,
    ) -> bool {
        if self
            .players
            .iter()
            .any(|p| p.id != player_id && p.connection_handle == new_handle)
        {
            debug!("refusing rebind of {player_id} onto {new_handle}, handle in use");
            return false;
        }

        match self.players.iter_mut().find(|p| p.id == player_id) {
            Some(player) => {
                debug!(
                    "{} reconnected: {} -> {}",
                    player.name, player.connection_handle, new_handle
                );
                player.connection_handle = new_handle;
                true
            }
            None => false,
        }
    }

    /// Starts a fresh match. Allowed again once a previous match has ended.
    pub fn start_game(&mut self) -> Result<(), UserError> {
        if self.players.len() != NUM_PLAYERS {
            return Err(UserError::NotEnoughPlayers);
        }
        if !matches!(self.phase, Phase::NotStarted | Phase::MatchEnded) {
            return Err(UserError::GameAlreadyInProgress);
        }

        self.phase = Phase::InProgress;
        self.scores = Scores::default();
        self.round_number = 1;
        self.consecutive_draws = 0;
        self.point_multiplier = 1;
        self.last_winning_team = None;
        self.start_round();

        let opener = self.players[self.current_player_idx].id;
        info!("match started, {} opens", self.players[self.current_player_idx].name);
        self.events.push_back(GameEvent::GameStarted { opener });
        Ok(())
    }

    /// Moves on to the next round once the current one has been scored.
    pub fn start_new_round(&mut self) -> Result<(), UserError> {
        match self.phase {
            Phase::NotStarted => return Err(UserError::NotStarted),
            Phase::MatchEnded => return Err(UserError::MatchOver),
            _ => {}
        }
        if self.round_outcome.is_none() {
            return Err(UserError::RoundNotSettled);
        }

        self.round_number += 1;
        self.phase = Phase::InProgress;
        self.start_round();

        let opener = self.players[self.current_player_idx].id;
        info!(
            "round {} started, {} opens (x{})",
            self.round_number, self.players[self.current_player_idx].name, self.point_multiplier
        );
        self.events.push_back(GameEvent::NewRound {
            round_number: self.round_number,
            opener,
        });
        Ok(())
    }

    fn start_round(&mut self) {
        self.table.clear();
        self.pass_count = 0;
        self.last_move = None;
        self.round_outcome = None;
        self.initialize_deck();
        self.deal_tiles();
        self.current_player_idx = self.determine_first_player();
    }

    fn initialize_deck(&mut self) {
        self.deck = Deck::default();
    }

    /// Each seat, in join order, takes the next contiguous slice of the
    /// shuffled deck.
    fn deal_tiles(&mut self) {
        for hand in &mut self.hands {
            hand.clear();
        }
        self.deck.shuffle(&mut self.rng);
        for hand in &mut self.hands {
            *hand = self.deck.deal_hand(HAND_SIZE);
        }
    }

    /// After a decisive round, a random member of the winning team opens.
    /// Otherwise whoever holds the highest double opens, falling back to the
    /// highest pip total. Ties go to the first tile found scanning seats in
    /// join order, then each hand in order.
    fn determine_first_player(&mut self) -> usize {
        if self.round_number > 1
            && self.consecutive_draws == 0
            && let Some(team) = self.last_winning_team
        {
            let members: Vec<usize> = self
                .players
                .iter()
                .enumerate()
                .filter(|(_, p)| p.team == Some(team))
                .map(|(seat, _)| seat)
                .collect();
            if let Some(&seat) = members.choose(&mut self.rng) {
                return seat;
            }
        }

        let mut highest_double: Option<(Pip, usize)> = None;
        for (seat, hand) in self.hands.iter().enumerate() {
            for tile in hand.iter().filter(|t| t.is_double()) {
                if highest_double.is_none_or(|(value, _)| tile.left() > value) {
                    highest_double = Some((tile.left(), seat));
                }
            }
        }
        if let Some((_, seat)) = highest_double {
            return seat;
        }

        let mut highest_tile: Option<(u32, usize)> = None;
        for (seat, hand) in self.hands.iter().enumerate() {
            for tile in hand {
                if highest_tile.is_none_or(|(pips, _)| tile.pips() > pips) {
                    highest_tile = Some((tile.pips(), seat));
                }
            }
        }
        highest_tile.map_or(0, |(_, seat)| seat)
    }

    /// Places the tile at `tile_index` of the player's hand on `end`.
    pub fn make_move(
        &mut self,
        player_id: PlayerId,
        tile_index: usize,
        end: End,
    ) -> Result<Move, UserError> {
        let seat = self.check_turn(player_id)?;
        self.apply_move(seat, tile_index, end, false)
    }

    fn apply_move(
        &mut self,
        seat: usize,
        tile_index: usize,
        end: End,
        auto: bool,
    ) -> Result<Move, UserError> {
        let tile = *self.hands[seat]
            .get(tile_index)
            .ok_or(UserError::InvalidIndex(tile_index))?;
        let placed = self
            .orient(tile, end)
            .ok_or(UserError::InvalidMove { tile, end })?;

        self.hands[seat].remove(tile_index);
        match end {
            End::Left => self.table.push_front(placed),
            End::Right => self.table.push_back(placed),
        }
        self.pass_count = 0;

        let play = Move {
            player_id: self.players[seat].id,
            tile: placed,
            end,
        };
        debug!("{} played {play}", self.players[seat].name);
        self.last_move = Some(play.clone());
        self.advance_turn();

        if self.hands[seat].is_empty() {
            self.phase = Phase::RoundEnded;
        }
        self.events.push_back(GameEvent::TilePlayed {
            play: play.clone(),
            auto,
        });
        Ok(play)
    }

    /// Passes the player's turn. Only legal when no tile in hand fits
    /// either open end.
    pub fn pass_turn(&mut self, player_id: PlayerId) -> Result<(), UserError> {
        let seat = self.check_turn(player_id)?;
        self.apply_pass(seat, false)
    }

    fn apply_pass(&mut self, seat: usize, auto: bool) -> Result<(), UserError> {
        if !self.legal_moves_for(seat).is_empty() {
            return Err(UserError::MoveAvailable);
        }

        self.pass_count += 1;
        let player_id = self.players[seat].id;
        debug!(
            "{} passed ({} in a row)",
            self.players[seat].name, self.pass_count
        );
        self.advance_turn();

        if self.is_game_locked() {
            self.phase = Phase::Locked;
        }
        self.events
            .push_back(GameEvent::TurnPassed { player_id, auto });
        Ok(())
    }

    /// Used when a player's turn timer runs out: plays a uniformly random
    /// legal move, or passes when there is none.
    pub fn make_auto_move(&mut self, player_id: PlayerId) -> Result<AutoPlay, UserError> {
        let seat = self.check_turn(player_id)?;
        let moves = self.legal_moves_for(seat);
        match moves.choose(&mut self.rng) {
            Some(&(tile_index, end)) => {
                let play = self.apply_move(seat, tile_index, end, true)?;
                Ok(AutoPlay::Moved(play))
            }
            None => {
                self.apply_pass(seat, true)?;
                Ok(AutoPlay::Passed)
            }
        }
    }

    fn check_turn(&self, player_id: PlayerId) -> Result<usize, UserError> {
        match self.phase {
            Phase::NotStarted => return Err(UserError::NotStarted),
            Phase::RoundEnded | Phase::Locked => return Err(UserError::RoundOver),
            Phase::MatchEnded => return Err(UserError::MatchOver),
            Phase::InProgress => {}
        }
        if self.players[self.current_player_idx].id != player_id {
            return Err(UserError::NotYourTurn);
        }
        Ok(self.current_player_idx)
    }

    fn advance_turn(&mut self) {
        self.current_player_idx = (self.current_player_idx + 1) % self.players.len();
    }

    /// Left value of the first tile and right value of the last one.
    fn open_ends(&self) -> Option<(Pip, Pip)> {
        Some((self.table.front()?.left(), self.table.back()?.right()))
    }

    /// Orients `tile` so its matching pip touches `end`, or `None` when it
    /// doesn't fit. Anything fits an empty table as is.
    fn orient(&self, tile: Tile, end: End) -> Option<Tile> {
        let Some((left, right)) = self.open_ends() else {
            return Some(tile);
        };
        match end {
            End::Left if tile.right() == left => Some(tile),
            End::Left if tile.left() == left => Some(tile.flipped()),
            End::Right if tile.left() == right => Some(tile),
            End::Right if tile.right() == right => Some(tile.flipped()),
            _ => None,
        }
    }

    fn legal_moves_for(&self, seat: usize) -> Vec<(usize, End)> {
        self.hands[seat]
            .iter()
            .enumerate()
            .flat_map(|(i, &tile)| {
                End::BOTH
                    .into_iter()
                    .filter(move |&end| self.orient(tile, end).is_some())
                    .map(move |end| (i, end))
            })
            .collect()
    }

    /// Every `(tile index, end)` pair the player could play right now.
    #[must_use]
    pub fn legal_moves(&self, player_id: PlayerId) -> Vec<(usize, End)> {
        self.seat_of(player_id)
            .map(|seat| self.legal_moves_for(seat))
            .unwrap_or_default()
    }

    /// True iff some hand is empty.
    #[must_use]
    pub fn is_round_ended(&self) -> bool {
        self.is_game_started() && self.hands.iter().any(Vec::is_empty)
    }

    /// True iff every player passed in a row.
    #[must_use]
    pub fn is_game_locked(&self) -> bool {
        self.is_game_started() && self.pass_count >= self.players.len()
    }

    /// Scores a round that ended with an empty hand. Without an explicit
    /// winner, the current player is credited.
    pub fn end_round(&mut self, winner: Option<PlayerId>) -> Result<RoundOutcome, UserError> {
        self.check_settleable()?;
        if !self.is_round_ended() && !self.is_game_locked() {
            return Err(UserError::RoundInProgress);
        }

        let seat = match winner {
            Some(id) => self.seat_of(id).ok_or(UserError::UserDoesNotExist)?,
            None => self.current_player_idx,
        };
        let winner = &self.players[seat];
        let team = winner.team.ok_or(UserError::NoTeam)?;

        let kind = if self.hands[seat].is_empty() {
            // The tile the winner went out with.
            let winning_tile = self
                .last_move
                .as_ref()
                .filter(|m| m.player_id == winner.id)
                .map(|m| m.tile);
            match (winning_tile, self.open_ends()) {
                (Some(tile), Some(ends)) => classify_win(tile, ends),
                _ => WinKind::Plain,
            }
        } else {
            WinKind::Plain
        };

        let multiplier = self.point_multiplier;
        let points = kind.base_points().saturating_mul(multiplier);
        let winning_player = winner.id;
        self.scores.award(team, points);
        self.last_winning_team = Some(team);
        self.consecutive_draws = 0;
        self.point_multiplier = 1;

        let outcome = RoundOutcome {
            round_number: self.round_number,
            finish: Finish::Domino(kind),
            winner: Some(team),
            winning_player: Some(winning_player),
            points,
            multiplier,
            next_multiplier: self.point_multiplier,
            scores: self.scores,
            match_winner: self.game_winner(),
        };
        info!("{outcome}");
        self.events.push_back(GameEvent::RoundEnded {
            outcome: outcome.clone(),
        });
        self.settle(outcome.clone());
        Ok(outcome)
    }

    /// Scores a locked round: the lowest pip total left in hand wins one
    /// point for its team, unless both teams share the lowest total, in which
    /// case nobody scores and the next round is worth double.
    pub fn handle_locked_game(&mut self) -> Result<RoundOutcome, UserError> {
        self.check_settleable()?;
        if !self.is_game_locked() {
            return Err(UserError::NotLocked);
        }

        let tallies = self
            .players
            .iter()
            .zip(&self.hands)
            .map(|(p, hand)| {
                let team = p.team.ok_or(UserError::NoTeam)?;
                Ok((team, hand.iter().map(Tile::pips).sum::<u32>()))
            })
            .collect::<Result<Vec<(Team, u32)>, UserError>>()?;

        let multiplier = self.point_multiplier;
        let outcome = match resolve_locked(&tallies).ok_or(UserError::NotEnoughPlayers)? {
            LockedResolution::Winner { team, seat, .. } => {
                let points = multiplier;
                self.scores.award(team, points);
                self.last_winning_team = Some(team);
                self.consecutive_draws = 0;
                self.point_multiplier = 1;
                RoundOutcome {
                    round_number: self.round_number,
                    finish: Finish::Locked,
                    winner: Some(team),
                    winning_player: Some(self.players[seat].id),
                    points,
                    multiplier,
                    next_multiplier: self.point_multiplier,
                    scores: self.scores,
                    match_winner: self.game_winner(),
                }
            }
            LockedResolution::Draw { .. } => {
                self.consecutive_draws += 1;
                self.point_multiplier = multiplier_for(self.consecutive_draws);
                RoundOutcome {
                    round_number: self.round_number,
                    finish: Finish::LockedDraw,
                    winner: None,
                    winning_player: None,
                    points: 0,
                    multiplier,
                    next_multiplier: self.point_multiplier,
                    scores: self.scores,
                    match_winner: self.game_winner(),
                }
            }
        };

        info!("game locked, {outcome}");
        self.events.push_back(GameEvent::GameLocked {
            outcome: outcome.clone(),
            hands: self.revealed_hands(),
        });
        self.settle(outcome.clone());
        Ok(outcome)
    }

    fn check_settleable(&self) -> Result<(), UserError> {
        if self.phase == Phase::NotStarted {
            return Err(UserError::NotStarted);
        }
        if self.round_outcome.is_some() {
            return Err(UserError::RoundAlreadySettled);
        }
        Ok(())
    }

    fn settle(&mut self, outcome: RoundOutcome) {
        self.round_outcome = Some(outcome);
        if let Some(winner) = self.game_winner() {
            self.phase = Phase::MatchEnded;
            info!("{winner} won the match ({})", self.scores);
            self.events.push_back(GameEvent::MatchEnded {
                winner,
                scores: self.scores,
            });
        }
    }

    /// The match ends the instant either team reaches the winning score.
    #[must_use]
    pub fn is_game_ended(&self) -> bool {
        self.game_winner().is_some()
    }

    #[must_use]
    pub fn game_winner(&self) -> Option<Team> {
        Team::ALL
            .into_iter()
            .find(|&team| self.scores.get(team) >= WINNING_SCORE)
    }

    fn seat_of(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    #[must_use]
    pub fn players(&self) -> Vec<Player> {
        self.players.clone()
    }

    #[must_use]
    pub fn player(&self, player_id: PlayerId) -> Option<Player> {
        self.players.iter().find(|p| p.id == player_id).cloned()
    }

    #[must_use]
    pub fn player_id_by_connection(&self, connection_handle: &ConnectionHandle) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| &p.connection_handle == connection_handle)
            .map(|p| p.id)
    }

    #[must_use]
    pub fn team_assignment(&self) -> TeamAssignment {
        let members = |team: Team| {
            self.players
                .iter()
                .filter(|p| p.team == Some(team))
                .cloned()
                .collect()
        };
        TeamAssignment {
            team1: members(Team::One),
            team2: members(Team::Two),
        }
    }

    /// `None` until a match has started.
    #[must_use]
    pub fn current_player(&self) -> Option<Player> {
        if self.is_game_started() {
            self.players.get(self.current_player_idx).cloned()
        } else {
            None
        }
    }

    #[must_use]
    pub fn table(&self) -> Vec<Tile> {
        self.table.iter().copied().collect()
    }

    /// Empty for unknown players.
    #[must_use]
    pub fn hand(&self, player_id: PlayerId) -> Vec<Tile> {
        self.seat_of(player_id)
            .map(|seat| self.hands[seat].clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn revealed_hands(&self) -> HashMap<PlayerId, Vec<Tile>> {
        self.players
            .iter()
            .zip(&self.hands)
            .map(|(p, hand)| (p.id, hand.clone()))
            .collect()
    }

    #[must_use]
    pub fn tiles_left(&self) -> HashMap<PlayerId, usize> {
        self.players
            .iter()
            .zip(&self.hands)
            .map(|(p, hand)| (p.id, hand.len()))
            .collect()
    }

    /// Undealt tiles for the current round.
    #[must_use]
    pub fn boneyard(&self) -> Vec<Tile> {
        if self.is_game_started() {
            self.deck.boneyard().to_vec()
        } else {
            Vec::new()
        }
    }

    #[must_use]
    pub fn scores(&self) -> Scores {
        self.scores
    }

    #[must_use]
    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_game_started(&self) -> bool {
        self.phase != Phase::NotStarted
    }

    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    #[must_use]
    pub fn point_multiplier(&self) -> u32 {
        self.point_multiplier
    }

    #[must_use]
    pub fn consecutive_draws(&self) -> u32 {
        self.consecutive_draws
    }

    #[must_use]
    pub fn last_winning_team(&self) -> Option<Team> {
        self.last_winning_team
    }

    #[must_use]
    pub fn last_move(&self) -> Option<Move> {
        self.last_move.clone()
    }

    /// Outcome of the current round once it has been scored.
    #[must_use]
    pub fn round_outcome(&self) -> Option<RoundOutcome> {
        self.round_outcome.clone()
    }

    /// What `player_id` is allowed to see.
    #[must_use]
    pub fn view(&self, player_id: PlayerId) -> Option<GameView> {
        Some(GameView {
            player_id,
            phase: self.phase,
            hand: self.hands[self.seat_of(player_id)?].clone(),
            table: self.table(),
            current_player: self.current_player(),
            players: self.players(),
            teams: self.team_assignment(),
            scores: self.scores,
            round_number: self.round_number,
            tiles_left: self.tiles_left(),
        })
    }

    /// Views for every seated player.
    #[must_use]
    pub fn views(&self) -> GameViews {
        self.players
            .iter()
            .filter_map(|p| Some((p.id, self.view(p.id)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::{BONEYARD_SIZE, DECK_SIZE};
    use std::collections::HashSet;

    const NAMES: [&str; 4] = ["Ana", "Bruno", "Caio", "Dedé"];

    fn seated(seed: u64) -> (GameSession, Vec<PlayerId>) {
        let mut session = GameSession::with_seed(seed);
        let ids = NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                session
                    .add_player(ConnectionHandle::new(format!("conn-{i}")), name)
                    .unwrap()
                    .id
            })
            .collect();
        (session, ids)
    }

    fn started(seed: u64) -> (GameSession, Vec<PlayerId>) {
        let (mut session, ids) = seated(seed);
        session.start_game().unwrap();
        session.drain_events();
        (session, ids)
    }

    /// Replaces the dealt round with a hand-built position.
    fn rig(session: &mut GameSession, hands: [Vec<Tile>; 4], table: &[Tile], current: usize) {
        session.hands = hands.to_vec();
        session.table = table.iter().copied().collect();
        session.current_player_idx = current;
        session.pass_count = 0;
        session.last_move = None;
        session.round_outcome = None;
        session.phase = Phase::InProgress;
    }

    fn t(a: Pip, b: Pip) -> Tile {
        Tile::new(a, b)
    }

    fn seat_on(session: &GameSession, team: Team) -> usize {
        session
            .players
            .iter()
            .position(|p| p.team == Some(team))
            .unwrap()
    }

    fn assert_partition(session: &GameSession) {
        let mut seen = HashSet::new();
        let all = session
            .hands
            .iter()
            .flatten()
            .chain(session.table.iter())
            .chain(session.deck.boneyard().iter());
        let mut count = 0;
        for tile in all {
            let key = (tile.left().min(tile.right()), tile.left().max(tile.right()));
            assert!(seen.insert(key), "duplicate tile {tile}");
            count += 1;
        }
        assert_eq!(count, DECK_SIZE);
    }

    #[test]
    fn test_join_scenario() {
        let (mut session, _) = seated(1);
        let teams = session.team_assignment();
        assert_eq!(teams.team1.len(), 2);
        assert_eq!(teams.team2.len(), 2);
        assert!(session.players().iter().all(|p| p.team.is_some()));

        assert_eq!(
            session.add_player("conn-5".into(), "Eva"),
            Err(UserError::CapacityReached)
        );
    }

    #[test]
    fn test_join_validation_does_not_mutate() {
        let mut session = GameSession::with_seed(1);
        assert_eq!(
            session.add_player("a".into(), "J"),
            Err(UserError::NameTooShort)
        );
        assert_eq!(
            session.add_player("a".into(), "   "),
            Err(UserError::NameTooShort)
        );
        assert_eq!(
            session.add_player("a".into(), &"x".repeat(21)),
            Err(UserError::NameTooLong)
        );
        assert!(session.players().is_empty());

        let jo = session.add_player("a".into(), "Jo").unwrap();
        assert_eq!(jo.name.as_str(), "Jo");
        assert_eq!(jo.team, None);

        assert_eq!(
            session.add_player("a".into(), "Other"),
            Err(UserError::ConnectionAlreadySeated)
        );
        assert_eq!(
            session.add_player("b".into(), "  jO "),
            Err(UserError::NameTaken)
        );
        assert_eq!(session.players().len(), 1);
    }

    #[test]
    fn test_fourth_join_returns_team() {
        let mut session = GameSession::with_seed(3);
        for (i, name) in NAMES.iter().enumerate().take(3) {
            let p = session.add_player(format!("c{i}").as_str().into(), name).unwrap();
            assert_eq!(p.team, None);
        }
        let fourth = session.add_player("c3".into(), NAMES[3]).unwrap();
        assert!(fourth.team.is_some());
    }

    #[test]
    fn test_remove_player_before_start() {
        let (mut session, _) = seated(2);
        assert!(session.remove_player(&"nobody".into()).is_none());

        let removed = session.remove_player(&"conn-1".into()).unwrap();
        assert_eq!(removed.name.as_str(), "Bruno");
        assert_eq!(session.players().len(), 3);
        assert!(session.players().iter().all(|p| p.team.is_none()));
        assert!(session.team_assignment().team1.is_empty());
        assert_eq!(session.phase(), Phase::NotStarted);
    }

    #[test]
    fn test_remove_player_mid_match_resets() {
        let (mut session, _) = started(4);
        session.scores.award(Team::One, 3);
        session.round_number = 3;

        session.remove_player(&"conn-2".into()).unwrap();
        assert_eq!(session.phase(), Phase::NotStarted);
        assert!(!session.is_game_started());
        assert_eq!(session.scores(), Scores::default());
        assert_eq!(session.round_number(), 1);
        assert!(session.table().is_empty());
        assert!(session.current_player().is_none());
        assert!(
            session
                .drain_events()
                .iter()
                .any(|e| *e == GameEvent::SessionReset)
        );

        // Refilling the table draws new teams and allows a new match.
        session.add_player("conn-9".into(), "Zé").unwrap();
        assert!(session.players().iter().all(|p| p.team.is_some()));
        assert!(session.start_game().is_ok());
    }

    #[test]
    fn test_update_connection_handle() {
        let (mut session, ids) = seated(5);
        assert!(session.update_connection_handle(ids[0], "new-conn".into()));
        assert_eq!(session.player_id_by_connection(&"new-conn".into()), Some(ids[0]));
        assert_eq!(session.player_id_by_connection(&"conn-0".into()), None);

        assert!(!session.update_connection_handle(PlayerId::new(), "x".into()));
        assert_eq!(session.players().len(), 4);
    }

    #[test]
    fn test_update_connection_handle_refuses_another_players_handle() {
        let (mut session, ids) = started(5);
        let before = session.players();

        assert!(!session.update_connection_handle(ids[0], "conn-1".into()));
        assert_eq!(session.players(), before);
        assert_eq!(session.player_id_by_connection(&"conn-0".into()), Some(ids[0]));
        assert_eq!(session.player_id_by_connection(&"conn-1".into()), Some(ids[1]));

        // Dropping conn-1 still unseats its real owner.
        let removed = session.remove_player(&"conn-1".into()).unwrap();
        assert_eq!(removed.id, ids[1]);
    }

    #[test]
    fn test_update_connection_handle_to_own_handle() {
        let (mut session, ids) = seated(5);
        assert!(session.update_connection_handle(ids[2], "conn-2".into()));
        assert_eq!(session.player_id_by_connection(&"conn-2".into()), Some(ids[2]));
    }

    #[test]
    fn test_start_game_preconditions() {
        let mut session = GameSession::with_seed(6);
        session.add_player("a".into(), "Ana").unwrap();
        assert_eq!(session.start_game(), Err(UserError::NotEnoughPlayers));

        let (mut session, _) = started(6);
        assert_eq!(session.start_game(), Err(UserError::GameAlreadyInProgress));
    }

    #[test]
    fn test_deal_shape() {
        let (session, ids) = started(7);
        for id in &ids {
            assert_eq!(session.hand(*id).len(), HAND_SIZE);
        }
        assert_eq!(session.boneyard().len(), BONEYARD_SIZE);
        assert!(session.table().is_empty());
        assert_partition(&session);
    }

    #[test]
    fn test_same_seed_same_deal() {
        let (a, _) = started(8);
        let (b, _) = started(8);
        assert_eq!(a.hands, b.hands);
        assert_eq!(a.current_player_idx, b.current_player_idx);
    }

    #[test]
    fn test_first_round_opener_holds_highest_double() {
        for seed in 0..20 {
            let (session, _) = started(seed);
            let best_double = session
                .hands
                .iter()
                .flatten()
                .filter(|t| t.is_double())
                .map(Tile::left)
                .max();
            let opener_hand = &session.hands[session.current_player_idx];
            match best_double {
                Some(v) => assert!(opener_hand.contains(&t(v, v))),
                None => {
                    let best = session.hands.iter().flatten().map(Tile::pips).max();
                    assert_eq!(opener_hand.iter().map(Tile::pips).max(), best);
                }
            }
        }
    }

    #[test]
    fn test_opener_falls_back_to_highest_pip_total() {
        let (mut session, _) = started(9);
        session.hands = vec![
            vec![t(0, 1), t(2, 3)],
            vec![t(4, 6), t(0, 2)],
            vec![t(5, 6), t(1, 2)],
            vec![t(3, 5)],
        ];
        assert_eq!(session.determine_first_player(), 2);

        // Ties go to the first tile found.
        session.hands = vec![vec![t(0, 1)], vec![t(3, 6)], vec![t(4, 5)], vec![t(2, 3)]];
        assert_eq!(session.determine_first_player(), 1);
    }

    #[test]
    fn test_opener_after_decisive_round_is_from_winning_team() {
        let (mut session, _) = started(10);
        session.round_number = 2;
        session.last_winning_team = Some(Team::Two);
        for _ in 0..20 {
            let seat = session.determine_first_player();
            assert_eq!(session.players[seat].team, Some(Team::Two));
        }

        // After a draw the doubles rule applies again.
        session.consecutive_draws = 1;
        session.hands = vec![vec![t(1, 1)], vec![t(0, 6)], vec![t(5, 5)], vec![t(2, 6)]];
        assert_eq!(session.determine_first_player(), 2);
    }

    #[test]
    fn test_move_requires_started_game_and_turn() {
        let (mut session, ids) = seated(11);
        assert_eq!(
            session.make_move(ids[0], 0, End::Left),
            Err(UserError::NotStarted)
        );
        assert_eq!(session.pass_turn(ids[0]), Err(UserError::NotStarted));

        session.start_game().unwrap();
        let current = session.current_player_idx;
        let other = ids[(current + 1) % 4];
        assert_eq!(
            session.make_move(other, 0, End::Left),
            Err(UserError::NotYourTurn)
        );
        assert_eq!(session.pass_turn(other), Err(UserError::NotYourTurn));
        assert_eq!(
            session.make_move(ids[current], HAND_SIZE, End::Left),
            Err(UserError::InvalidIndex(HAND_SIZE))
        );
    }

    #[test]
    fn test_first_tile_fits_empty_table() {
        let (mut session, ids) = started(12);
        let current = session.current_player_idx;
        let tile = session.hands[current][2];
        let play = session.make_move(ids[current], 2, End::Right).unwrap();
        assert_eq!(play.tile, tile);
        assert_eq!(session.table(), vec![tile]);
        assert_eq!(session.hand(ids[current]).len(), HAND_SIZE - 1);
        assert_eq!(session.current_player_idx, (current + 1) % 4);
        assert_partition(&session);
    }

    #[test]
    fn test_left_only_tile_rejected_on_right() {
        let (mut session, ids) = started(13);
        rig(
            &mut session,
            [vec![t(3, 5), t(0, 0)], vec![t(1, 1)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(3, 4), t(4, 6)],
            0,
        );

        assert_eq!(
            session.make_move(ids[0], 0, End::Right),
            Err(UserError::InvalidMove {
                tile: t(3, 5),
                end: End::Right
            })
        );
        assert_eq!(session.hand(ids[0]), vec![t(3, 5), t(0, 0)]);
        assert_eq!(session.table(), vec![t(3, 4), t(4, 6)]);
        assert_eq!(session.current_player_idx, 0);

        let play = session.make_move(ids[0], 0, End::Left).unwrap();
        assert_eq!(play.tile, t(5, 3));
        assert_eq!(session.table(), vec![t(5, 3), t(3, 4), t(4, 6)]);
    }

    #[test]
    fn test_right_end_orientation() {
        let (mut session, ids) = started(14);
        rig(
            &mut session,
            [vec![t(2, 6), t(6, 1)], vec![t(1, 1)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(3, 6)],
            0,
        );
        // [2|6] must flip so 6 touches the 6.
        assert_eq!(session.make_move(ids[0], 0, End::Right).unwrap().tile, t(6, 2));
        assert_eq!(session.table(), vec![t(3, 6), t(6, 2)]);
    }

    #[test]
    fn test_move_is_deterministic_from_same_state() {
        let (mut a, ids_a) = started(15);
        let (mut b, ids_b) = started(15);
        let seat = a.current_player_idx;
        let play_a = a.make_move(ids_a[seat], 1, End::Left).unwrap();
        let play_b = b.make_move(ids_b[seat], 1, End::Left).unwrap();
        assert_eq!(play_a.tile, play_b.tile);
        assert_eq!(a.table(), b.table());
        assert_eq!(a.current_player_idx, b.current_player_idx);
    }

    #[test]
    fn test_pass_only_when_blocked() {
        let (mut session, ids) = started(16);
        rig(
            &mut session,
            [vec![t(5, 1)], vec![t(0, 0)], vec![t(2, 6)], vec![t(4, 4)]],
            &[t(6, 5)],
            0,
        );
        assert_eq!(session.pass_turn(ids[0]), Err(UserError::MoveAvailable));

        session.current_player_idx = 1;
        session.pass_turn(ids[1]).unwrap();
        assert_eq!(session.pass_count(), 1);
        assert_eq!(session.current_player_idx, 2);

        // A successful move resets the pass streak.
        session.make_move(ids[2], 0, End::Left).unwrap();
        assert_eq!(session.pass_count(), 0);
    }

    #[test]
    fn test_four_passes_lock_the_game() {
        let (mut session, ids) = started(17);
        rig(
            &mut session,
            [vec![t(0, 1)], vec![t(0, 2)], vec![t(1, 2)], vec![t(0, 3)]],
            &[t(6, 6)],
            0,
        );
        for (i, id) in ids.iter().enumerate() {
            assert!(!session.is_game_locked());
            session.pass_turn(*id).unwrap();
            assert_eq!(session.pass_count(), i + 1);
        }
        assert!(session.is_game_locked());
        assert_eq!(session.phase(), Phase::Locked);
        assert_eq!(session.pass_turn(ids[0]), Err(UserError::RoundOver));
    }

    #[test]
    fn test_auto_move_plays_legal_tile_or_passes() {
        let (mut session, ids) = started(18);
        rig(
            &mut session,
            [vec![t(0, 1), t(6, 2)], vec![t(0, 0)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(6, 5)],
            0,
        );
        assert_eq!(session.legal_moves(ids[0]), vec![(1, End::Left)]);
        let auto = session.make_auto_move(ids[0]).unwrap();
        assert_eq!(
            auto,
            AutoPlay::Moved(Move {
                player_id: ids[0],
                tile: t(2, 6),
                end: End::Left
            })
        );

        // Seat 1 holds nothing playable.
        let auto = session.make_auto_move(ids[1]).unwrap();
        assert_eq!(auto, AutoPlay::Passed);
        assert!(!auto.moved());
        assert_eq!(session.pass_count(), 1);

        let events = session.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::TilePlayed { auto: true, .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::TurnPassed { auto: true, .. })));

        assert_eq!(session.make_auto_move(ids[3]), Err(UserError::NotYourTurn));
    }

    #[test]
    fn test_round_end_plain_win() {
        let (mut session, ids) = started(19);
        rig(
            &mut session,
            [vec![t(3, 6)], vec![t(0, 0)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(1, 3)],
            0,
        );
        assert_eq!(session.end_round(Some(ids[0])), Err(UserError::RoundInProgress));

        session.make_move(ids[0], 0, End::Right).unwrap();
        assert!(session.is_round_ended());
        assert_eq!(session.phase(), Phase::RoundEnded);
        assert_eq!(session.make_move(ids[1], 0, End::Left), Err(UserError::RoundOver));

        let team = session.players[0].team.unwrap();
        let outcome = session.end_round(Some(ids[0])).unwrap();
        assert_eq!(outcome.finish, Finish::Domino(WinKind::Plain));
        assert_eq!(outcome.points, 1);
        assert_eq!(outcome.winner, Some(team));
        assert_eq!(session.scores().get(team), 1);
        assert_eq!(session.last_winning_team(), Some(team));

        assert_eq!(
            session.end_round(Some(ids[0])),
            Err(UserError::RoundAlreadySettled)
        );
    }

    #[test]
    fn test_round_end_carroca() {
        let (mut session, ids) = started(20);
        rig(
            &mut session,
            [vec![t(3, 3)], vec![t(0, 0)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(1, 3)],
            0,
        );
        session.make_move(ids[0], 0, End::Right).unwrap();
        let outcome = session.end_round(Some(ids[0])).unwrap();
        assert_eq!(outcome.finish, Finish::Domino(WinKind::Carroca));
        assert_eq!(outcome.points, 2);
    }

    #[test]
    fn test_round_end_la_e_lo() {
        let (mut session, ids) = started(21);
        rig(
            &mut session,
            [vec![t(2, 5)], vec![t(0, 0)], vec![t(6, 6)], vec![t(4, 4)]],
            &[t(5, 3), t(3, 5)],
            0,
        );
        session.make_move(ids[0], 0, End::Right).unwrap();
        assert_eq!(session.table(), vec![t(5, 3), t(3, 5), t(5, 2)]);
        let outcome = session.end_round(Some(ids[0])).unwrap();
        assert_eq!(outcome.finish, Finish::Domino(WinKind::LaELo));
        assert_eq!(outcome.points, 3);
    }

    #[test]
    fn test_winning_tile_is_the_one_played_not_the_rightmost() {
        let (mut session, ids) = started(22);
        rig(
            &mut session,
            [vec![t(1, 1)], vec![t(0, 0)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(1, 4), t(4, 3)],
            0,
        );
        // The rightmost tile [4|3] would score a plain win, but the winner
        // went out with [1|1] on the left: a carroça.
        session.make_move(ids[0], 0, End::Left).unwrap();
        let outcome = session.end_round(Some(ids[0])).unwrap();
        assert_eq!(outcome.finish, Finish::Domino(WinKind::Carroca));
    }

    #[test]
    fn test_cruzada_at_five_ends_match_immediately() {
        let (mut session, ids) = started(23);
        let seat = seat_on(&session, Team::Two);
        let mut hands: [Vec<Tile>; 4] = [vec![t(0, 1)], vec![t(0, 2)], vec![t(0, 3)], vec![t(0, 5)]];
        hands[seat] = vec![t(4, 4)];
        rig(&mut session, hands, &[t(4, 1), t(1, 4)], seat);
        session.scores.award(Team::Two, 5);

        session.make_move(ids[seat], 0, End::Left).unwrap();
        let outcome = session.end_round(Some(ids[seat])).unwrap();
        assert_eq!(outcome.finish, Finish::Domino(WinKind::Cruzada));
        assert_eq!(outcome.points, 4);
        assert_eq!(outcome.match_winner, Some(Team::Two));
        assert_eq!(session.scores().get(Team::Two), 9);
        assert!(session.is_game_ended());
        assert_eq!(session.game_winner(), Some(Team::Two));
        assert_eq!(session.phase(), Phase::MatchEnded);
        assert_eq!(session.start_new_round(), Err(UserError::MatchOver));

        let events = session.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::MatchEnded {
                winner: Team::Two,
                ..
            }
        )));

        // A finished match can be restarted with a clean scoreboard.
        session.start_game().unwrap();
        assert_eq!(session.scores(), Scores::default());
        assert_eq!(session.round_number(), 1);
    }

    #[test]
    fn test_end_round_without_winner_credits_current_player() {
        let (mut session, ids) = started(24);
        rig(
            &mut session,
            [vec![t(0, 1)], vec![t(0, 2)], vec![t(1, 2)], vec![t(0, 3)]],
            &[t(6, 6)],
            0,
        );
        for id in &ids {
            session.pass_turn(*id).unwrap();
        }
        let team = session.players[0].team.unwrap();
        let outcome = session.end_round(None).unwrap();
        assert_eq!(outcome.winning_player, Some(ids[0]));
        assert_eq!(outcome.finish, Finish::Domino(WinKind::Plain));
        assert_eq!(session.scores().get(team), 1);
    }

    #[test]
    fn test_locked_game_lowest_hand_wins() {
        let (mut session, ids) = started(25);
        let seat = seat_on(&session, Team::One);
        let mut hands: [Vec<Tile>; 4] = [vec![t(5, 5)], vec![t(5, 4)], vec![t(4, 4)], vec![t(5, 3)]];
        hands[seat] = vec![t(0, 1)];
        rig(&mut session, hands, &[t(6, 6)], 0);
        assert_eq!(session.handle_locked_game(), Err(UserError::NotLocked));

        for id in &ids {
            session.pass_turn(*id).unwrap();
        }
        let outcome = session.handle_locked_game().unwrap();
        assert_eq!(outcome.finish, Finish::Locked);
        assert_eq!(outcome.winner, Some(Team::One));
        assert_eq!(outcome.winning_player, Some(ids[seat]));
        assert_eq!(outcome.points, 1);
        assert_eq!(session.scores().get(Team::One), 1);

        let events = session.drain_events();
        let revealed = events.iter().find_map(|e| match e {
            GameEvent::GameLocked { hands, .. } => Some(hands.clone()),
            _ => None,
        });
        assert_eq!(revealed.unwrap()[&ids[seat]], vec![t(0, 1)]);
    }

    fn lock_with_cross_team_tie(session: &mut GameSession, ids: &[PlayerId]) {
        let one = seat_on(session, Team::One);
        let two = seat_on(session, Team::Two);
        let mut hands: [Vec<Tile>; 4] = [vec![t(5, 5)], vec![t(5, 4)], vec![t(4, 4)], vec![t(5, 3)]];
        hands[one] = vec![t(0, 2)];
        hands[two] = vec![t(1, 1)];
        rig(session, hands, &[t(6, 6)], 0);
        for id in ids {
            session.pass_turn(*id).unwrap();
        }
    }

    #[test]
    fn test_draw_streak_compounds() {
        let (mut session, ids) = started(26);

        lock_with_cross_team_tie(&mut session, &ids);
        let outcome = session.handle_locked_game().unwrap();
        assert!(outcome.is_draw());
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.points, 0);
        assert_eq!(outcome.next_multiplier, 2);
        session.start_new_round().unwrap();

        lock_with_cross_team_tie(&mut session, &ids);
        let outcome = session.handle_locked_game().unwrap();
        assert!(outcome.is_draw());
        assert_eq!(session.consecutive_draws(), 2);
        assert_eq!(session.point_multiplier(), 4);
        assert_eq!(session.scores(), Scores::default());
        session.start_new_round().unwrap();

        // Next decisive round: plain win worth 1 x 4.
        rig(
            &mut session,
            [vec![t(3, 6)], vec![t(0, 0)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(1, 3)],
            0,
        );
        session.make_move(ids[0], 0, End::Right).unwrap();
        let team = session.players[0].team.unwrap();
        let outcome = session.end_round(Some(ids[0])).unwrap();
        assert_eq!(outcome.multiplier, 4);
        assert_eq!(outcome.points, 4);
        assert_eq!(session.scores().get(team), 4);
        assert_eq!(session.point_multiplier(), 1);
        assert_eq!(session.consecutive_draws(), 0);
    }

    #[test]
    fn test_locked_win_reports_multiplied_points() {
        let (mut session, ids) = started(27);
        session.consecutive_draws = 1;
        session.point_multiplier = 2;
        let seat = seat_on(&session, Team::Two);
        let mut hands: [Vec<Tile>; 4] = [vec![t(5, 5)], vec![t(5, 4)], vec![t(4, 4)], vec![t(5, 3)]];
        hands[seat] = vec![t(0, 0)];
        rig(&mut session, hands, &[t(6, 6)], 0);
        for id in &ids {
            session.pass_turn(*id).unwrap();
        }
        let outcome = session.handle_locked_game().unwrap();
        assert_eq!(outcome.points, 2);
        assert_eq!(outcome.next_multiplier, 1);
        assert_eq!(session.scores().get(Team::Two), 2);
    }

    #[test]
    fn test_new_round_lifecycle() {
        let (mut session, ids) = started(28);
        assert_eq!(session.start_new_round(), Err(UserError::RoundNotSettled));

        rig(
            &mut session,
            [vec![t(3, 6)], vec![t(0, 0)], vec![t(2, 2)], vec![t(4, 4)]],
            &[t(1, 3)],
            0,
        );
        session.make_move(ids[0], 0, End::Right).unwrap();
        let team = session.players[0].team.unwrap();
        session.end_round(Some(ids[0])).unwrap();
        session.drain_events();

        session.start_new_round().unwrap();
        assert_eq!(session.round_number(), 2);
        assert_eq!(session.phase(), Phase::InProgress);
        assert!(session.table().is_empty());
        assert_eq!(session.pass_count(), 0);
        assert!(session.round_outcome().is_none());
        assert_eq!(session.current_player().unwrap().team, Some(team));
        assert_partition(&session);
        assert!(matches!(
            session.drain_events().front(),
            Some(GameEvent::NewRound { round_number: 2, .. })
        ));
    }

    #[test]
    fn test_views_hide_other_hands() {
        let (session, ids) = started(29);
        let views = session.views();
        assert_eq!(views.len(), 4);
        let view = &views[&ids[0]];
        assert_eq!(view.hand, session.hand(ids[0]));
        assert_eq!(view.tiles_left[&ids[3]], HAND_SIZE);
        assert_eq!(view.phase, Phase::InProgress);
        assert!(session.view(PlayerId::new()).is_none());
    }

    #[test]
    fn test_queries_return_snapshots() {
        let (session, ids) = started(30);
        let mut hand = session.hand(ids[0]);
        hand.clear();
        assert_eq!(session.hand(ids[0]).len(), HAND_SIZE);

        let mut players = session.players();
        players[0].team = None;
        assert!(session.players()[0].team.is_some());
    }
}
