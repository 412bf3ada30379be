use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::domain::{Avatar, AvatarId, Direction, PushError, UserId};
use crate::use_cases::ports::{SessionView, SpaceChannel};
use crate::use_cases::render::{DrawCommand, RosterEntry};
use crate::use_cases::types::{
    ConnectionStatus, JoinOutcome, JoinRequest, MoveAck, MoveCommand, SpaceState,
};

type MoveReply = Result<MoveAck, PushError>;

// Shared avatar builder for session tests.
pub(crate) fn avatar(id: u64, user_id: u64, x: f64, y: f64) -> Avatar {
    Avatar {
        id: AvatarId(id),
        user_id: UserId(user_id),
        username: format!("user-{user_id}"),
        x,
        y,
        direction: Direction::Down,
        is_active: None,
    }
}

struct Script {
    join_outcome: JoinOutcome,
    joins: Vec<JoinRequest>,
    moves: Vec<MoveCommand>,
    // Move replies stay pending until a test resolves them.
    move_replies: Vec<Option<oneshot::Sender<MoveReply>>>,
    nearby_reply: Result<Vec<Avatar>, PushError>,
    nearby_radii: Vec<f64>,
    state_reply: Result<SpaceState, PushError>,
    leaves: usize,
}

// Channel fake that records requests and answers from a script.
#[derive(Clone)]
pub(crate) struct ScriptedChannel {
    script: Arc<Mutex<Script>>,
}

impl ScriptedChannel {
    pub(crate) fn new(join_outcome: JoinOutcome) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                join_outcome,
                joins: Vec::new(),
                moves: Vec::new(),
                move_replies: Vec::new(),
                nearby_reply: Ok(Vec::new()),
                nearby_radii: Vec::new(),
                state_reply: Ok(SpaceState::default()),
                leaves: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script mutex poisoned")
    }

    pub(crate) fn set_join_outcome(&self, outcome: JoinOutcome) {
        self.lock().join_outcome = outcome;
    }

    pub(crate) fn set_nearby_reply(&self, reply: Result<Vec<Avatar>, PushError>) {
        self.lock().nearby_reply = reply;
    }

    pub(crate) fn joins(&self) -> Vec<JoinRequest> {
        self.lock().joins.clone()
    }

    pub(crate) fn moves(&self) -> Vec<MoveCommand> {
        self.lock().moves.clone()
    }

    pub(crate) fn nearby_radii(&self) -> Vec<f64> {
        self.lock().nearby_radii.clone()
    }

    pub(crate) fn leave_count(&self) -> usize {
        self.lock().leaves
    }

    /// Answers the `index`-th move. Receivers that were dropped are ignored.
    pub(crate) fn resolve_move(&self, index: usize, reply: MoveReply) {
        let sender = self
            .lock()
            .move_replies
            .get_mut(index)
            .and_then(Option::take)
            .expect("move reply should be pending");
        let _ = sender.send(reply);
    }
}

impl SpaceChannel for ScriptedChannel {
    fn join(&self, request: JoinRequest) -> BoxFuture<'static, JoinOutcome> {
        let mut script = self.lock();
        script.joins.push(request);
        let outcome = script.join_outcome.clone();
        async move { outcome }.boxed()
    }

    fn push_move(&self, command: MoveCommand) -> BoxFuture<'static, MoveReply> {
        let (tx, rx) = oneshot::channel();
        let mut script = self.lock();
        script.moves.push(command);
        script.move_replies.push(Some(tx));
        async move { rx.await.unwrap_or(Err(PushError::Closed)) }.boxed()
    }

    fn nearby_users(&self, radius: f64) -> BoxFuture<'static, Result<Vec<Avatar>, PushError>> {
        let mut script = self.lock();
        script.nearby_radii.push(radius);
        let reply = script.nearby_reply.clone();
        async move { reply }.boxed()
    }

    fn space_state(&self) -> BoxFuture<'static, Result<SpaceState, PushError>> {
        let reply = self.lock().state_reply.clone();
        async move { reply }.boxed()
    }

    fn leave(&self) -> BoxFuture<'static, Result<(), PushError>> {
        self.lock().leaves += 1;
        async { Ok(()) }.boxed()
    }
}

#[derive(Default)]
struct ViewLog {
    statuses: Vec<ConnectionStatus>,
    frames: Vec<Vec<DrawCommand>>,
    rosters: Vec<Vec<RosterEntry>>,
    positions: Vec<Avatar>,
    move_failures: Vec<PushError>,
    nearby: Vec<Avatar>,
}

// View fake that keeps everything it was shown.
#[derive(Clone, Default)]
pub(crate) struct RecordingView {
    log: Arc<Mutex<ViewLog>>,
}

impl RecordingView {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewLog> {
        self.log.lock().expect("view mutex poisoned")
    }

    pub(crate) fn statuses(&self) -> Vec<ConnectionStatus> {
        self.lock().statuses.clone()
    }

    pub(crate) fn render_count(&self) -> usize {
        self.lock().frames.len()
    }

    pub(crate) fn last_frame(&self) -> Vec<DrawCommand> {
        self.lock().frames.last().cloned().unwrap_or_default()
    }

    pub(crate) fn rosters(&self) -> Vec<Vec<RosterEntry>> {
        self.lock().rosters.clone()
    }

    pub(crate) fn last_roster(&self) -> Vec<RosterEntry> {
        self.lock().rosters.last().cloned().unwrap_or_default()
    }

    pub(crate) fn positions(&self) -> Vec<Avatar> {
        self.lock().positions.clone()
    }

    pub(crate) fn move_failures(&self) -> Vec<PushError> {
        self.lock().move_failures.clone()
    }

    pub(crate) fn nearby(&self) -> Vec<Avatar> {
        self.lock().nearby.clone()
    }
}

impl SessionView for RecordingView {
    fn status_changed(&mut self, status: ConnectionStatus) {
        self.lock().statuses.push(status);
    }

    fn render(&mut self, commands: &[DrawCommand]) {
        self.lock().frames.push(commands.to_vec());
    }

    fn roster_changed(&mut self, roster: &[RosterEntry]) {
        self.lock().rosters.push(roster.to_vec());
    }

    fn position_changed(&mut self, avatar: &Avatar) {
        self.lock().positions.push(avatar.clone());
    }

    fn move_failed(&mut self, error: &PushError) {
        self.lock().move_failures.push(error.clone());
    }

    fn nearby_users(&mut self, avatars: &[Avatar]) {
        self.lock().nearby.extend_from_slice(avatars);
    }
}
