// Use cases layer: session workflow, command translation and rendering.

pub mod command;
pub mod ports;
pub mod render;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use ports::{SessionView, SpaceChannel};
pub use session::SessionController;
pub use types::{
    ConnectionStatus, JoinOutcome, JoinRequest, JoinSnapshot, MoveAck, MoveCommand, SpaceEvent,
    SpaceState, UserCommand,
};
