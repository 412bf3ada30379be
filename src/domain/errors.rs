// Domain-level errors for the presence session. None of these are fatal to the
// process; at worst they end the current session.

use std::fmt;

/// Failure of a client-initiated push (move, queries, leave).
#[derive(Debug, Clone, PartialEq)]
pub enum PushError {
    /// The authority replied with `error`.
    Rejected(String),
    /// No reply arrived before the deadline.
    Timeout,
    /// The channel went away before a reply arrived.
    Closed,
    /// The reply arrived but did not have the expected shape.
    Decode(String),
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Rejected(reason) => write!(f, "push rejected: {reason}"),
            PushError::Timeout => write!(f, "push timed out"),
            PushError::Closed => write!(f, "channel closed before reply"),
            PushError::Decode(detail) => write!(f, "malformed reply: {detail}"),
        }
    }
}

impl std::error::Error for PushError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Authority rejected the join.
    JoinRejected(String),
    /// Join got neither `ok` nor `error` in time.
    JoinTimeout,
    NotConnected,
    AlreadyJoined,
    /// The channel failed or the transport dropped.
    Disconnected,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::JoinRejected(reason) => write!(f, "join rejected: {reason}"),
            SessionError::JoinTimeout => write!(f, "join timed out"),
            SessionError::NotConnected => write!(f, "session is not connected"),
            SessionError::AlreadyJoined => write!(f, "session already joined"),
            SessionError::Disconnected => write!(f, "session disconnected"),
        }
    }
}

impl std::error::Error for SessionError {}
