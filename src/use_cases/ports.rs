use crate::domain::{Avatar, PushError};
use crate::use_cases::render::{DrawCommand, RosterEntry};
use crate::use_cases::types::{
    ConnectionStatus, JoinOutcome, JoinRequest, MoveAck, MoveCommand, SpaceState,
};
use futures::future::BoxFuture;

// The session controller depends on these traits, not on the concrete channel
// or UI. Dependencies point inwards.

/// Request/response side of the space channel.
///
/// Each call sends immediately and hands back a future for the reply, so the
/// caller can keep several pushes in flight. Dropping the future discards the
/// reply.
pub trait SpaceChannel: Send {
    fn join(&self, request: JoinRequest) -> BoxFuture<'static, JoinOutcome>;
    fn push_move(&self, command: MoveCommand) -> BoxFuture<'static, Result<MoveAck, PushError>>;
    fn nearby_users(&self, radius: f64) -> BoxFuture<'static, Result<Vec<Avatar>, PushError>>;
    fn space_state(&self) -> BoxFuture<'static, Result<SpaceState, PushError>>;
    fn leave(&self) -> BoxFuture<'static, Result<(), PushError>>;
}

/// Output side fed by the session. Implementations must not call back into
/// the session.
pub trait SessionView: Send {
    fn status_changed(&mut self, status: ConnectionStatus);
    fn render(&mut self, commands: &[DrawCommand]);
    fn roster_changed(&mut self, roster: &[RosterEntry]);
    /// Debug readout for the local avatar.
    fn position_changed(&mut self, avatar: &Avatar);

    fn move_failed(&mut self, _error: &PushError) {}
    fn nearby_users(&mut self, _avatars: &[Avatar]) {}
    fn space_state(&mut self, _state: &SpaceState) {}
}
