use crate::domain::{Space, SpaceId, UserId};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

// Runtime settings read from the environment, each with a local-dev default.

pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_or(key, default))
}

pub fn socket_url() -> String {
    env::var("SPACE_SOCKET_URL").unwrap_or_else(|_| "ws://127.0.0.1:4000/socket".to_string())
}

pub fn space_id() -> SpaceId {
    SpaceId(env_or("SPACE_ID", 1))
}

pub fn user_id() -> UserId {
    UserId(env_or("SPACE_USER_ID", 1))
}

pub fn space() -> Space {
    Space {
        width: env_or("SPACE_WIDTH", 100),
        height: env_or("SPACE_HEIGHT", 100),
    }
}

/// Position requested when joining.
pub fn initial_position() -> (f64, f64) {
    (env_or("SPACE_INITIAL_X", 50.0), env_or("SPACE_INITIAL_Y", 50.0))
}

pub fn join_timeout() -> Duration {
    millis("SPACE_JOIN_TIMEOUT_MS", 10_000)
}

pub fn push_timeout() -> Duration {
    millis("SPACE_PUSH_TIMEOUT_MS", 10_000)
}

// 0 disables heartbeats.
pub fn heartbeat_interval() -> Option<Duration> {
    Some(millis("SPACE_HEARTBEAT_MS", 30_000)).filter(|period| !period.is_zero())
}

pub fn render_path() -> Option<PathBuf> {
    env::var_os("SPACE_RENDER_PATH")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}
