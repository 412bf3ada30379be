// Use-case level inputs/outputs for the presence session.

use crate::domain::{Avatar, Direction, ProximityGroups, UserId};
use std::fmt;

/// Join parameters; `x`/`y` are the requested position, subject to override.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub user_id: UserId,
    pub x: f64,
    pub y: f64,
}

/// Everything the authority hands back on a successful join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSnapshot {
    pub current_avatar: Avatar,
    pub avatars: Vec<Avatar>,
}

/// Terminal result of one join attempt. Exactly one is observed per attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Ok(JoinSnapshot),
    Error(String),
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveCommand {
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
}

/// Authority echo of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveAck {
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
}

/// Full-state reply to `get_state`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpaceState {
    pub avatars: Vec<Avatar>,
    pub proximity_groups: ProximityGroups,
}

/// Server-pushed events after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceEvent {
    Joined(Avatar),
    Moved { user_id: UserId, avatar: Avatar },
    Left { user_id: UserId },
    Proximity(ProximityGroups),
    // Channel error/close or transport loss.
    ChannelClosed { reason: String },
}

/// User intents fed into the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    /// Pointer interaction in surface pixels.
    Click { px: f64, py: f64 },
    /// Absolute move in grid units; direction derived when absent.
    MoveTo {
        x: f64,
        y: f64,
        direction: Option<Direction>,
    },
    /// Relative move from the current position.
    Step { direction: Direction, distance: f64 },
    Nearby { radius: f64 },
    State,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
    Timeout,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
