//! Table actor implementation with async message handling.

use super::{
    config::{TableConfig, TableId},
    messages::{TableError, TableMessage, TableNotification, TableStateResponse},
};
use crate::game::{
    GameSession, UserError,
    constants::NUM_PLAYERS,
    entities::{ConnectionHandle, End, GameView, Move, Phase, Player, PlayerId},
};
use std::collections::HashMap;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Duration, Instant, sleep_until},
};

/// Capacity of a table's message inbox.
const INBOX_CAPACITY: usize = 100;

/// Table actor handle for sending messages
#[derive(Clone, Debug)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
    table_id: TableId,
}

impl TableHandle {
    /// Create a new table handle
    pub fn new(sender: mpsc::Sender<TableMessage>, table_id: TableId) -> Self {
        Self { sender, table_id }
    }

    /// Get table ID
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Send a message to the table
    pub async fn send(&self, message: TableMessage) -> Result<(), TableError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| TableError::Closed)
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> TableMessage,
    ) -> Result<T, TableError> {
        let (tx, rx) = oneshot::channel();
        self.send(message(tx)).await?;
        rx.await.map_err(|_| TableError::Closed)
    }

    pub async fn join(
        &self,
        connection: ConnectionHandle,
        name: impl Into<String>,
    ) -> Result<Player, TableError> {
        let name = name.into();
        self.request(|response| TableMessage::Join {
            connection,
            name,
            response,
        })
        .await?
    }

    pub async fn leave(&self, connection: ConnectionHandle) -> Result<Player, TableError> {
        self.request(|response| TableMessage::Leave {
            connection,
            response,
        })
        .await?
    }

    pub async fn disconnect(&self, connection: ConnectionHandle) -> Result<(), TableError> {
        self.request(|response| TableMessage::Disconnect {
            connection,
            response,
        })
        .await?
    }

    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        connection: ConnectionHandle,
    ) -> Result<(), TableError> {
        self.request(|response| TableMessage::Reconnect {
            player_id,
            connection,
            response,
        })
        .await?
    }

    pub async fn start(&self) -> Result<(), TableError> {
        self.request(|response| TableMessage::Start { response })
            .await?
    }

    pub async fn play_tile(
        &self,
        connection: ConnectionHandle,
        tile_index: usize,
        end: End,
    ) -> Result<Move, TableError> {
        self.request(|response| TableMessage::PlayTile {
            connection,
            tile_index,
            end,
            response,
        })
        .await?
    }

    pub async fn pass(&self, connection: ConnectionHandle) -> Result<(), TableError> {
        self.request(|response| TableMessage::Pass {
            connection,
            response,
        })
        .await?
    }

    pub async fn game_view(&self, player_id: PlayerId) -> Result<Option<GameView>, TableError> {
        self.request(|response| TableMessage::GetGameView {
            player_id,
            response,
        })
        .await
    }

    pub async fn state(&self) -> Result<TableStateResponse, TableError> {
        self.request(|response| TableMessage::GetState { response })
            .await
    }

    /// Registers `sender` to receive notifications on behalf of
    /// `connection`. A seated connection immediately gets its current view.
    pub async fn subscribe(
        &self,
        connection: ConnectionHandle,
        sender: mpsc::Sender<TableNotification>,
    ) -> Result<(), TableError> {
        self.send(TableMessage::Subscribe { connection, sender })
            .await
    }

    pub async fn unsubscribe(&self, connection: ConnectionHandle) -> Result<(), TableError> {
        self.send(TableMessage::Unsubscribe { connection }).await
    }

    pub async fn close(&self) -> Result<(), TableError> {
        self.request(|response| TableMessage::Close { response })
            .await
    }
}

/// Table actor owning a single game session
pub struct TableActor {
    /// Table ID
    id: TableId,

    /// Table configuration
    config: TableConfig,

    /// Rules engine
    session: GameSession,

    /// Message inbox
    inbox: mpsc::Receiver<TableMessage>,

    /// When the current player runs out of time
    turn_deadline: Option<Instant>,

    /// When the next round gets dealt after a settled one
    next_round_at: Option<Instant>,

    /// Dropped connections and when their seat is given up
    pending_leaves: HashMap<ConnectionHandle, Instant>,

    /// Is table closed
    is_closed: bool,

    /// Notification channels keyed by the connection that subscribed
    subscribers: HashMap<ConnectionHandle, mpsc::Sender<TableNotification>>,
}

impl TableActor {
    /// Create a new table actor
    ///
    /// # Arguments
    ///
    /// * `id` - Table ID
    /// * `config` - Table configuration
    ///
    /// # Returns
    ///
    /// * `(TableActor, TableHandle)` - Actor and handle for sending messages
    pub fn new(id: TableId, config: TableConfig) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);

        let session = match config.seed {
            Some(seed) => GameSession::with_seed(seed),
            None => GameSession::new(),
        };

        let actor = Self {
            id,
            config,
            session,
            inbox,
            turn_deadline: None,
            next_round_at: None,
            pending_leaves: HashMap::new(),
            is_closed: false,
            subscribers: HashMap::new(),
        };

        let handle = TableHandle::new(sender, id);

        (actor, handle)
    }

    /// Run the table actor event loop
    pub async fn run(mut self) {
        log::info!("Table {} '{}' starting", self.id, self.config.name);

        loop {
            let next_leave_at = self.next_leave_at();
            tokio::select! {
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        // Every handle was dropped.
                        break;
                    };
                    self.handle_message(message);

                    if self.is_closed {
                        break;
                    }
                }

                () = sleep_until(self.turn_deadline.unwrap_or_else(Instant::now)),
                    if self.turn_deadline.is_some() =>
                {
                    self.turn_deadline = None;
                    self.handle_turn_timeout();
                }

                () = sleep_until(self.next_round_at.unwrap_or_else(Instant::now)),
                    if self.next_round_at.is_some() =>
                {
                    self.next_round_at = None;
                    self.handle_next_round();
                }

                () = sleep_until(next_leave_at.unwrap_or_else(Instant::now)),
                    if !self.pending_leaves.is_empty() =>
                {
                    self.handle_expired_leaves();
                }
            }
        }

        log::info!("Table {} '{}' closed", self.id, self.config.name);
    }

    /// Handle a table message
    fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::Join {
                connection,
                name,
                response,
            } => {
                let result = self.handle_join(connection, &name);
                let _ = response.send(result);
            }

            TableMessage::Leave {
                connection,
                response,
            } => {
                let result = self.handle_leave(&connection);
                let _ = response.send(result);
            }

            TableMessage::Disconnect {
                connection,
                response,
            } => {
                let result = self.handle_disconnect(connection);
                let _ = response.send(result);
            }

            TableMessage::Reconnect {
                player_id,
                connection,
                response,
            } => {
                let result = self.handle_reconnect(player_id, connection);
                let _ = response.send(result);
            }

            TableMessage::Start { response } => {
                let result = self.handle_start();
                let _ = response.send(result);
            }

            TableMessage::PlayTile {
                connection,
                tile_index,
                end,
                response,
            } => {
                let result = self.handle_play_tile(&connection, tile_index, end);
                let _ = response.send(result);
            }

            TableMessage::Pass {
                connection,
                response,
            } => {
                let result = self.handle_pass(&connection);
                let _ = response.send(result);
            }

            TableMessage::GetGameView {
                player_id,
                response,
            } => {
                let _ = response.send(self.session.view(player_id));
            }

            TableMessage::GetState { response } => {
                let _ = response.send(self.get_state());
            }

            TableMessage::Subscribe { connection, sender } => {
                log::debug!("{} subscribed to table {}", connection, self.id);
                if let Some(player_id) = self.session.player_id_by_connection(&connection)
                    && let Some(view) = self.session.view(player_id)
                {
                    let _ = sender.try_send(TableNotification::View(view));
                }
                self.subscribers.insert(connection, sender);
            }

            TableMessage::Unsubscribe { connection } => {
                self.subscribers.remove(&connection);
                log::debug!("{} unsubscribed from table {}", connection, self.id);
            }

            TableMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(());
            }
        }
    }

    fn seated(&self, connection: &ConnectionHandle) -> Result<PlayerId, TableError> {
        self.session
            .player_id_by_connection(connection)
            .ok_or(TableError::NotSeated)
    }

    /// Handle join table request
    fn handle_join(
        &mut self,
        connection: ConnectionHandle,
        name: &str,
    ) -> Result<Player, TableError> {
        let mut player = self.session.add_player(connection, name)?;
        log::info!("{} joined table {}", player.name, self.id);

        if self.config.auto_start
            && self.session.players().len() == NUM_PLAYERS
            && !self.session.is_game_started()
        {
            self.session.start_game()?;
            self.arm_turn_timer();
        }
        self.broadcast();

        // Hand back the record as it stands after teams were drawn.
        if let Some(current) = self.session.player(player.id) {
            player = current;
        }
        Ok(player)
    }

    /// Handle leave table request
    fn handle_leave(&mut self, connection: &ConnectionHandle) -> Result<Player, TableError> {
        let player = self
            .session
            .remove_player(connection)
            .ok_or(TableError::NotSeated)?;
        self.pending_leaves.remove(connection);
        log::info!("{} left table {}", player.name, self.id);

        if !self.session.is_game_started() {
            self.turn_deadline = None;
            self.next_round_at = None;
        }
        self.broadcast();
        Ok(player)
    }

    /// Handle a dropped connection. With no grace period configured this is
    /// a plain leave.
    fn handle_disconnect(&mut self, connection: ConnectionHandle) -> Result<(), TableError> {
        self.seated(&connection)?;

        let grace = self.config.disconnect_grace();
        if grace.is_zero() {
            return self.handle_leave(&connection).map(|_| ());
        }

        log::debug!(
            "{} dropped from table {}, holding the seat for {:?}",
            connection,
            self.id,
            grace
        );
        self.pending_leaves
            .entry(connection)
            .or_insert_with(|| Instant::now() + grace);
        Ok(())
    }

    fn next_leave_at(&self) -> Option<Instant> {
        self.pending_leaves.values().min().copied()
    }

    /// Unseats every dropped connection whose grace period has run out.
    fn handle_expired_leaves(&mut self) {
        let now = Instant::now();
        let expired: Vec<ConnectionHandle> = self
            .pending_leaves
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(connection, _)| connection.clone())
            .collect();

        for connection in expired {
            self.pending_leaves.remove(&connection);
            if let Err(e) = self.handle_leave(&connection) {
                log::debug!("Table {}: {} already gone: {}", self.id, connection, e);
            }
        }
    }

    /// Handle reconnect request. A subscription held by the old connection
    /// moves over to the new one, and a pending leave for it is cancelled.
    fn handle_reconnect(
        &mut self,
        player_id: PlayerId,
        connection: ConnectionHandle,
    ) -> Result<(), TableError> {
        let old = self
            .session
            .player(player_id)
            .ok_or(UserError::UserDoesNotExist)?
            .connection_handle;

        if !self
            .session
            .update_connection_handle(player_id, connection.clone())
        {
            return Err(UserError::ConnectionAlreadySeated.into());
        }

        if self.pending_leaves.remove(&old).is_some() {
            log::info!("Player {} back at table {} as {}", player_id, self.id, connection);
        }
        if old != connection
            && let Some(sender) = self.subscribers.remove(&old)
        {
            self.subscribers.insert(connection, sender);
        }
        self.broadcast();
        Ok(())
    }

    fn handle_start(&mut self) -> Result<(), TableError> {
        self.session.start_game()?;
        self.arm_turn_timer();
        self.broadcast();
        Ok(())
    }

    fn handle_play_tile(
        &mut self,
        connection: &ConnectionHandle,
        tile_index: usize,
        end: End,
    ) -> Result<Move, TableError> {
        let player_id = self.seated(connection)?;
        let play = self.session.make_move(player_id, tile_index, end)?;
        self.after_turn(player_id);
        Ok(play)
    }

    fn handle_pass(&mut self, connection: &ConnectionHandle) -> Result<(), TableError> {
        let player_id = self.seated(connection)?;
        self.session.pass_turn(player_id)?;
        self.after_turn(player_id);
        Ok(())
    }

    fn handle_turn_timeout(&mut self) {
        let Some(current) = self.session.current_player() else {
            return;
        };
        match self.session.make_auto_move(current.id) {
            Ok(auto) => {
                log::debug!(
                    "Table {}: {} timed out, moved: {}",
                    self.id,
                    current.name,
                    auto.moved()
                );
                self.after_turn(current.id);
            }
            Err(e) => log::warn!("Table {}: auto move for {} failed: {}", self.id, current.name, e),
        }
    }

    fn handle_next_round(&mut self) {
        match self.session.start_new_round() {
            Ok(()) => self.arm_turn_timer(),
            Err(e) => log::warn!("Table {}: could not start next round: {}", self.id, e),
        }
        self.broadcast();
    }

    /// Settles the round if the last move or pass finished it, otherwise
    /// hands the turn timer to the next player.
    fn after_turn(&mut self, mover: PlayerId) {
        let settled = if self.session.is_round_ended() {
            Some((self.session.end_round(Some(mover)), self.config.round_result_delay()))
        } else if self.session.is_game_locked() {
            Some((self.session.handle_locked_game(), self.config.locked_result_delay()))
        } else {
            None
        };

        match settled {
            Some((Ok(outcome), delay)) => {
                self.turn_deadline = None;
                if outcome.match_winner.is_none() {
                    self.schedule_next_round(delay);
                }
            }
            Some((Err(e), _)) => {
                self.turn_deadline = None;
                log::warn!("Table {}: could not settle round: {}", self.id, e);
            }
            None => self.arm_turn_timer(),
        }
        self.broadcast();
    }

    fn arm_turn_timer(&mut self) {
        self.turn_deadline = (self.session.phase() == Phase::InProgress)
            .then(|| Instant::now() + self.config.turn_timeout());
    }

    fn schedule_next_round(&mut self, delay: Duration) {
        log::debug!("Table {}: next round in {:?}", self.id, delay);
        self.next_round_at = Some(Instant::now() + delay);
    }

    /// Sends pending engine events to every subscriber, then each seated
    /// subscriber's private view.
    fn broadcast(&mut self) {
        for event in self.session.drain_events() {
            log::debug!("Table {}: {}", self.id, event);
            let notification = TableNotification::Event(event);
            notify_subscribers(&mut self.subscribers, |_| Some(notification.clone()));
        }

        let session = &self.session;
        let views = session.views();
        notify_subscribers(&mut self.subscribers, |connection| {
            let player_id = session.player_id_by_connection(connection)?;
            views.get(&player_id).cloned().map(TableNotification::View)
        });
    }

    /// Get current table state
    fn get_state(&self) -> TableStateResponse {
        TableStateResponse {
            table_id: self.id,
            table_name: self.config.name.clone(),
            phase: self.session.phase(),
            players: self
                .session
                .players()
                .into_iter()
                .map(|p| p.name.to_string())
                .collect(),
            current_player: self.session.current_player().map(|p| p.id),
            scores: self.session.scores(),
            round_number: self.session.round_number(),
            point_multiplier: self.session.point_multiplier(),
            tiles_on_table: self.session.table().len(),
        }
    }
}

/// Delivers whatever `notification_for` yields to each subscriber, dropping
/// subscribers whose receiving end has gone away.
fn notify_subscribers(
    subscribers: &mut HashMap<ConnectionHandle, mpsc::Sender<TableNotification>>,
    mut notification_for: impl FnMut(&ConnectionHandle) -> Option<TableNotification>,
) {
    subscribers.retain(|connection, sender| {
        let Some(notification) = notification_for(connection) else {
            return true;
        };
        match sender.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Subscriber {} channel full, dropping notification", connection);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Subscriber {} disconnected, removing", connection);
                false
            }
        }
    });
}
