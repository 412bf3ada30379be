// Domain-level presence entities.

use crate::domain::ids::{AvatarId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Last movement heading of an avatar. Only affects rendering.
// Serde derive is a pragmatic leak so wire DTOs can embed it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDirection(pub String);

impl fmt::Display for UnknownDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown direction: {}", self.0)
    }
}

impl std::error::Error for UnknownDirection {}

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

/// One present user in the space. Positions are continuous grid units.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub id: AvatarId,
    pub user_id: UserId,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    // Only present on full-state responses.
    pub is_active: Option<bool>,
}

/// Coordinate domain `[0, width) x [0, height)`, fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Space {
    pub width: u32,
    pub height: u32,
}

/// Authority-computed neighbours per avatar.
pub type ProximityGroups = HashMap<AvatarId, Vec<AvatarId>>;
