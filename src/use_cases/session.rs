// Session controller: join lifecycle, event application and command dispatch.
//
// Everything runs on one task. Channel events, user commands and push replies
// are taken one at a time from `run` and each is handled to completion before
// the next, so the presence store needs no locking. Keep it that way when
// wiring this into a multi-threaded runtime: hand the controller its inputs
// through channels, never share it.

use crate::domain::{
    Avatar, AvatarId, PresenceStore, ProximityGroups, PushError, SessionError, Space, UserId,
};
use crate::use_cases::command;
use crate::use_cases::ports::{SessionView, SpaceChannel};
use crate::use_cases::render::{self, GRID_SIZE};
use crate::use_cases::types::{
    ConnectionStatus, JoinOutcome, JoinRequest, JoinSnapshot, MoveAck, MoveCommand, SpaceEvent,
    SpaceState, UserCommand,
};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// Reply of a push that was in flight, tagged by what asked for it.
enum Completion {
    Move(MoveCommand, Result<MoveAck, PushError>),
    Nearby(Result<Vec<Avatar>, PushError>),
    State(Result<SpaceState, PushError>),
}

pub struct SessionController<C, V> {
    channel: C,
    view: V,
    space: Space,
    user_id: UserId,
    unit_px: f64,
    // Exclusively owned; the renderer only ever sees a borrowed snapshot.
    store: PresenceStore,
    current_avatar_id: Option<AvatarId>,
    status: ConnectionStatus,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl<C, V> SessionController<C, V>
where
    C: SpaceChannel,
    V: SessionView,
{
    pub fn new(channel: C, view: V, space: Space, user_id: UserId) -> Self {
        Self {
            channel,
            view,
            space,
            user_id,
            unit_px: GRID_SIZE,
            store: PresenceStore::new(),
            current_avatar_id: None,
            status: ConnectionStatus::Disconnected,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn store(&self) -> &PresenceStore {
        &self.store
    }

    pub fn current_avatar_id(&self) -> Option<AvatarId> {
        self.current_avatar_id
    }

    pub fn current_avatar(&self) -> Option<&Avatar> {
        self.current_avatar_id.and_then(|id| self.store.get(id))
    }

    /// Joins the space at the requested position and seeds the store.
    ///
    /// Error and timeout are terminal for this attempt; a retry is a fresh call.
    pub async fn connect(&mut self, x: f64, y: f64) -> Result<(), SessionError> {
        if matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            return Err(SessionError::AlreadyJoined);
        }

        self.set_status(ConnectionStatus::Connecting);
        let request = JoinRequest {
            user_id: self.user_id,
            x,
            y,
        };

        match self.channel.join(request).await {
            JoinOutcome::Ok(snapshot) => {
                self.on_join_ok(snapshot);
                Ok(())
            }
            JoinOutcome::Error(reason) => {
                warn!(user_id = %self.user_id, %reason, "failed to join space");
                self.set_status(ConnectionStatus::Error);
                Err(SessionError::JoinRejected(reason))
            }
            JoinOutcome::Timeout => {
                warn!(user_id = %self.user_id, "join timed out");
                self.set_status(ConnectionStatus::Timeout);
                Err(SessionError::JoinTimeout)
            }
        }
    }

    fn on_join_ok(&mut self, snapshot: JoinSnapshot) {
        let JoinSnapshot {
            current_avatar,
            avatars,
        } = snapshot;

        self.store.clear();
        self.current_avatar_id = Some(current_avatar.id);
        for avatar in avatars {
            self.store.upsert(avatar);
        }
        // The snapshot normally lists us already; make sure "mine" resolves.
        if self.store.get(current_avatar.id).is_none() {
            self.store.upsert(current_avatar.clone());
        }

        info!(
            avatar_id = %current_avatar.id,
            avatars = self.store.len(),
            "joined space"
        );
        self.set_status(ConnectionStatus::Connected);
        self.redraw();
        self.refresh_roster();
        self.view.position_changed(&current_avatar);
    }

    /// Applies one server-pushed event. Ignored unless connected.
    pub fn apply(&mut self, event: SpaceEvent) {
        if self.status != ConnectionStatus::Connected {
            debug!(status = %self.status, ?event, "event ignored while not connected");
            return;
        }

        match event {
            SpaceEvent::Joined(avatar) => {
                debug!(avatar_id = %avatar.id, user_id = %avatar.user_id, "user joined");
                self.store.upsert(avatar);
                self.redraw();
                self.refresh_roster();
            }
            SpaceEvent::Moved { user_id, avatar } => {
                debug!(avatar_id = %avatar.id, %user_id, x = avatar.x, y = avatar.y, "user moved");
                let is_local = user_id == self.user_id;
                let readout = is_local.then(|| avatar.clone());
                self.store.upsert(avatar);
                self.redraw();
                if let Some(avatar) = readout {
                    self.view.position_changed(&avatar);
                }
            }
            SpaceEvent::Left { user_id } => {
                let removed = self.store.remove_by_user_id(user_id);
                debug!(%user_id, avatar_id = ?removed, "user left");
                self.redraw();
                self.refresh_roster();
            }
            SpaceEvent::Proximity(groups) => self.on_proximity(&groups),
            SpaceEvent::ChannelClosed { reason } => {
                warn!(%reason, "space channel closed");
                self.teardown();
            }
        }
    }

    // Advisory only; reserved for highlighting nearby avatars.
    fn on_proximity(&mut self, groups: &ProximityGroups) {
        let crowded = groups.values().filter(|nearby| !nearby.is_empty()).count();
        debug!(groups = groups.len(), crowded, "proximity update");
    }

    /// Executes one user intent.
    pub async fn execute(&mut self, command: UserCommand) -> Result<(), SessionError> {
        match command {
            UserCommand::Click { px, py } => {
                let unit_px = self.unit_px;
                self.move_current(|me| command::click_to_move(me, px, py, unit_px))
            }
            UserCommand::MoveTo { x, y, direction } => {
                self.move_current(|me| command::move_to(me, x, y, direction))
            }
            UserCommand::Step {
                direction,
                distance,
            } => self.move_current(|me| command::step(me, direction, distance)),
            UserCommand::Nearby { radius } => {
                self.ensure_connected()?;
                let reply = self.channel.nearby_users(radius);
                self.in_flight.push(reply.map(Completion::Nearby).boxed());
                Ok(())
            }
            UserCommand::State => {
                self.ensure_connected()?;
                let reply = self.channel.space_state();
                self.in_flight.push(reply.map(Completion::State).boxed());
                Ok(())
            }
            UserCommand::Leave => self.leave().await,
        }
    }

    fn move_current<F>(&mut self, translate: F) -> Result<(), SessionError>
    where
        F: FnOnce(&Avatar) -> MoveCommand,
    {
        self.ensure_connected()?;
        let Some(me) = self.current_avatar() else {
            debug!("no current avatar; move ignored");
            return Ok(());
        };
        let command = translate(me);
        self.send_move(command)
    }

    /// Pushes a move. Local state is only updated by the authority's events.
    pub fn send_move(&mut self, command: MoveCommand) -> Result<(), SessionError> {
        self.ensure_connected()?;
        debug!(
            x = command.x,
            y = command.y,
            direction = %command.direction,
            "sending move"
        );
        let reply = self.channel.push_move(command);
        self.in_flight
            .push(reply.map(move |result| Completion::Move(command, result)).boxed());
        Ok(())
    }

    /// Leaves the space gracefully and tears the session down.
    pub async fn leave(&mut self) -> Result<(), SessionError> {
        self.ensure_connected()?;
        if let Err(error) = self.channel.leave().await {
            warn!(%error, "leave was not acknowledged");
        }
        info!("left space");
        self.teardown();
        Ok(())
    }

    fn handle_completion(&mut self, completion: Completion) {
        if self.status != ConnectionStatus::Connected {
            debug!("late reply ignored after disconnect");
            return;
        }

        match completion {
            Completion::Move(_, Ok(ack)) => {
                debug!(x = ack.x, y = ack.y, direction = %ack.direction, "move acknowledged");
            }
            Completion::Move(command, Err(error)) => {
                // No optimistic update was applied, so nothing to roll back.
                warn!(%error, x = command.x, y = command.y, "move failed");
                self.view.move_failed(&error);
            }
            Completion::Nearby(Ok(avatars)) => {
                debug!(count = avatars.len(), "nearby users");
                self.view.nearby_users(&avatars);
            }
            Completion::Nearby(Err(error)) => warn!(%error, "failed to get nearby users"),
            Completion::State(Ok(state)) => {
                debug!(avatars = state.avatars.len(), "space state");
                self.view.space_state(&state);
            }
            Completion::State(Err(error)) => warn!(%error, "failed to get space state"),
        }
    }

    /// Waits for the next in-flight reply and handles it.
    /// Returns false when nothing was in flight.
    #[cfg(test)]
    async fn drain_one(&mut self) -> bool {
        match self.in_flight.next().await {
            Some(completion) => {
                self.handle_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Drives the session until it leaves or the channel goes away.
    ///
    /// Returns `Ok` after a requested leave, `Disconnected` when the channel or
    /// the event stream closed underneath us.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SpaceEvent>,
        mut commands: mpsc::Receiver<UserCommand>,
    ) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let mut requested_leave = false;

        while self.status == ConnectionStatus::Connected {
            tokio::select! {
                // Authority events first, then replies, then local intents.
                biased;

                event = events.recv() => match event {
                    Some(event) => self.apply(event),
                    None => {
                        warn!("space event stream ended");
                        self.teardown();
                    }
                },
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.handle_completion(completion);
                }
                command = commands.recv() => match command {
                    Some(UserCommand::Leave) | None => {
                        requested_leave = true;
                        if let Err(error) = self.leave().await {
                            debug!(%error, "leave skipped");
                        }
                    }
                    Some(command) => {
                        if let Err(error) = self.execute(command).await {
                            warn!(%error, "command rejected");
                        }
                    }
                },
            }
        }

        if requested_leave {
            Ok(())
        } else {
            Err(SessionError::Disconnected)
        }
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.status == ConnectionStatus::Connected {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        info!(from = %self.status, to = %status, "connection status");
        self.status = status;
        self.view.status_changed(status);
    }

    // Session end: pending replies are dropped, the store is emptied.
    fn teardown(&mut self) {
        self.in_flight = FuturesUnordered::new();
        self.store.clear();
        self.current_avatar_id = None;
        self.set_status(ConnectionStatus::Disconnected);
        self.redraw();
        self.refresh_roster();
    }

    fn redraw(&mut self) {
        let avatars = self.store.all();
        let commands = render::render(self.space, self.current_avatar_id, &avatars, self.unit_px);
        self.view.render(&commands);
    }

    fn refresh_roster(&mut self) {
        let avatars = self.store.all();
        let roster = render::roster(self.current_avatar_id, &avatars);
        self.view.roster_changed(&roster);
    }
}
