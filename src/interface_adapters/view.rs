use crate::domain::{Avatar, PushError};
use crate::interface_adapters::svg;
use crate::use_cases::render::{DrawCommand, RosterEntry};
use crate::use_cases::{ConnectionStatus, SessionView, SpaceState};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Headless view: logs session output and optionally keeps the latest frame
/// as an SVG file.
pub struct ConsoleView {
    render_path: Option<PathBuf>,
}

impl ConsoleView {
    pub fn new(render_path: Option<PathBuf>) -> Self {
        Self { render_path }
    }
}

/// Local avatar readout, e.g. `(12.00, 3.50) facing up`.
pub fn position_readout(avatar: &Avatar) -> String {
    format!("({:.2}, {:.2}) facing {}", avatar.x, avatar.y, avatar.direction)
}

pub fn roster_summary(roster: &[RosterEntry]) -> String {
    let names: Vec<String> = roster
        .iter()
        .map(|entry| {
            if entry.is_current {
                format!("{} (you)", entry.username)
            } else {
                entry.username.clone()
            }
        })
        .collect();
    format!("{} online: {}", roster.len(), names.join(", "))
}

impl SessionView for ConsoleView {
    fn status_changed(&mut self, status: ConnectionStatus) {
        info!(%status, "connection status");
    }

    fn render(&mut self, commands: &[DrawCommand]) {
        debug!(commands = commands.len(), "frame rendered");
        let Some(path) = &self.render_path else {
            return;
        };
        if let Err(e) = std::fs::write(path, svg::to_svg(commands)) {
            warn!(path = %path.display(), error = %e, "failed to write frame");
        }
    }

    fn roster_changed(&mut self, roster: &[RosterEntry]) {
        info!(users = roster.len(), "{}", roster_summary(roster));
    }

    fn position_changed(&mut self, avatar: &Avatar) {
        info!(avatar_id = %avatar.id, "position {}", position_readout(avatar));
    }

    fn move_failed(&mut self, error: &PushError) {
        warn!(%error, "move failed");
    }

    fn nearby_users(&mut self, avatars: &[Avatar]) {
        let names: Vec<&str> = avatars.iter().map(|a| a.username.as_str()).collect();
        info!(count = avatars.len(), users = %names.join(", "), "nearby users");
    }

    fn space_state(&mut self, state: &SpaceState) {
        info!(
            avatars = state.avatars.len(),
            proximity_groups = state.proximity_groups.len(),
            "space state"
        );
    }
}
