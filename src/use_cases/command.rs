// Translates user intent into move commands relative to the current avatar.

use crate::domain::{Avatar, Direction};
use crate::use_cases::types::MoveCommand;

pub const DEFAULT_STEP_DISTANCE: f64 = 5.0;
pub const DEFAULT_NEARBY_RADIUS: f64 = 5.0;

/// Heading for a displacement. Horizontal wins only when strictly dominant, so
/// ties go vertical and a zero displacement yields `Up`.
pub fn compute_direction(old_x: f64, old_y: f64, new_x: f64, new_y: f64) -> Direction {
    let dx = new_x - old_x;
    let dy = new_y - old_y;

    if dx.abs() > dy.abs() {
        if dx > 0.0 { Direction::Right } else { Direction::Left }
    } else if dy > 0.0 {
        Direction::Down
    } else {
        Direction::Up
    }
}

/// Surface pixels to continuous grid units.
pub fn pixel_to_grid(px: f64, py: f64, unit_px: f64) -> (f64, f64) {
    (px / unit_px, py / unit_px)
}

pub fn click_to_move(current: &Avatar, px: f64, py: f64, unit_px: f64) -> MoveCommand {
    let (x, y) = pixel_to_grid(px, py, unit_px);
    move_to(current, x, y, None)
}

pub fn move_to(current: &Avatar, x: f64, y: f64, direction: Option<Direction>) -> MoveCommand {
    let direction = direction.unwrap_or_else(|| compute_direction(current.x, current.y, x, y));
    MoveCommand { x, y, direction }
}

/// Moves `distance` grid units from the current position, facing the step.
pub fn step(current: &Avatar, direction: Direction, distance: f64) -> MoveCommand {
    let (x, y) = match direction {
        Direction::Up => (current.x, current.y - distance),
        Direction::Down => (current.x, current.y + distance),
        Direction::Left => (current.x - distance, current.y),
        Direction::Right => (current.x + distance, current.y),
    };
    MoveCommand { x, y, direction }
}
