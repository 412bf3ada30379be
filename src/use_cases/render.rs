// Pure state-to-drawing translation. Output adapters decide how the commands
// reach an actual surface.

use crate::domain::{Avatar, AvatarId, Direction, Space, UserId};

/// Pixels per grid unit.
pub const GRID_SIZE: f64 = 32.0;
pub const AVATAR_RADIUS: f64 = 12.0;
pub const DIRECTION_INDICATOR_SIZE: f64 = 6.0;
// Gap between the circle edge and the direction marker tip.
const INDICATOR_GAP: f64 = 2.0;
const LABEL_GAP: f64 = 4.0;
pub const LABEL_FONT_SIZE: f64 = 12.0;

const GRID_LINE_WIDTH: f64 = 0.5;
const CURRENT_STROKE_WIDTH: f64 = 2.0;
const INDICATOR_STROKE_WIDTH: f64 = 1.0;

pub const GRID_COLOR: Color = Color::Rgb(0xe0, 0xe0, 0xe0);
pub const CURRENT_FILL: Color = Color::Rgb(0x22, 0xc5, 0x5e);
pub const CURRENT_STROKE: Color = Color::Rgb(0x16, 0xa3, 0x4a);
pub const INK: Color = Color::Rgb(0x00, 0x00, 0x00);

// Golden angle in degrees; consecutive user ids land far apart on the wheel.
const GOLDEN_ANGLE: f64 = 137.508;
const USER_SATURATION: u8 = 70;
const USER_LIGHTNESS: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Rgb(u8, u8, u8),
    Hsl { hue: f64, saturation: u8, lightness: u8 },
}

impl Color {
    /// CSS color string usable by canvas and SVG surfaces.
    pub fn css(&self) -> String {
        match self {
            Color::Rgb(r, g, b) => format!("#{r:02x}{g:02x}{b:02x}"),
            Color::Hsl {
                hue,
                saturation,
                lightness,
            } => format!("hsl({hue}, {saturation}%, {lightness}%)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Reset the whole surface to the background.
    Clear { width: f64, height: f64 },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Triangle {
        points: [Point; 3],
        fill: Color,
        stroke: Stroke,
    },
    /// Text centered horizontally on `anchor`, hanging below it.
    Label {
        anchor: Point,
        text: String,
        color: Color,
        font_size: f64,
    },
}

/// One row of the roster sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub avatar_id: AvatarId,
    pub username: String,
    pub color: Color,
    pub is_current: bool,
}

/// Deterministic per-user color; identical for a user across stores and calls.
pub fn user_color(user_id: UserId) -> Color {
    let hue = (user_id.0 as f64 * GOLDEN_ANGLE) % 360.0;
    Color::Hsl {
        hue,
        saturation: USER_SATURATION,
        lightness: USER_LIGHTNESS,
    }
}

pub fn avatar_color(avatar: &Avatar, current: Option<AvatarId>) -> Color {
    if Some(avatar.id) == current {
        CURRENT_FILL
    } else {
        user_color(avatar.user_id)
    }
}

/// Pixel extent of the space.
pub fn surface_size(space: Space, unit_px: f64) -> (f64, f64) {
    (space.width as f64 * unit_px, space.height as f64 * unit_px)
}

/// Full redraw of the space. No state survives between calls.
pub fn render(
    space: Space,
    current: Option<AvatarId>,
    avatars: &[&Avatar],
    unit_px: f64,
) -> Vec<DrawCommand> {
    let (width, height) = surface_size(space, unit_px);
    let mut commands = vec![DrawCommand::Clear { width, height }];

    render_grid(&mut commands, space, unit_px, width, height);
    for avatar in avatars {
        render_avatar(&mut commands, avatar, current, unit_px);
    }
    commands
}

pub fn roster(current: Option<AvatarId>, avatars: &[&Avatar]) -> Vec<RosterEntry> {
    avatars
        .iter()
        .map(|avatar| RosterEntry {
            avatar_id: avatar.id,
            username: avatar.username.clone(),
            color: avatar_color(avatar, current),
            is_current: Some(avatar.id) == current,
        })
        .collect()
}

fn render_grid(commands: &mut Vec<DrawCommand>, space: Space, unit_px: f64, width: f64, height: f64) {
    let stroke = Stroke {
        color: GRID_COLOR,
        width: GRID_LINE_WIDTH,
    };

    for x in 0..=space.width {
        let px = x as f64 * unit_px;
        commands.push(DrawCommand::Line {
            from: Point::new(px, 0.0),
            to: Point::new(px, height),
            stroke,
        });
    }

    for y in 0..=space.height {
        let py = y as f64 * unit_px;
        commands.push(DrawCommand::Line {
            from: Point::new(0.0, py),
            to: Point::new(width, py),
            stroke,
        });
    }
}

fn render_avatar(
    commands: &mut Vec<DrawCommand>,
    avatar: &Avatar,
    current: Option<AvatarId>,
    unit_px: f64,
) {
    // Center of the avatar's cell in pixels.
    let center = Point::new(
        avatar.x * unit_px + unit_px / 2.0,
        avatar.y * unit_px + unit_px / 2.0,
    );
    let is_current = Some(avatar.id) == current;
    let fill = avatar_color(avatar, current);

    commands.push(DrawCommand::Circle {
        center,
        radius: AVATAR_RADIUS,
        fill,
        stroke: is_current.then_some(Stroke {
            color: CURRENT_STROKE,
            width: CURRENT_STROKE_WIDTH,
        }),
    });

    commands.push(DrawCommand::Triangle {
        points: direction_marker(center, avatar.direction),
        fill,
        stroke: Stroke {
            color: INK,
            width: INDICATOR_STROKE_WIDTH,
        },
    });

    commands.push(DrawCommand::Label {
        anchor: Point::new(center.x, center.y + AVATAR_RADIUS + LABEL_GAP),
        text: avatar.username.clone(),
        color: INK,
        font_size: LABEL_FONT_SIZE,
    });
}

/// Triangle whose tip touches the circle and whose base points outward.
fn direction_marker(center: Point, direction: Direction) -> [Point; 3] {
    let size = DIRECTION_INDICATOR_SIZE;
    let edge = AVATAR_RADIUS + INDICATOR_GAP;
    let Point { x, y } = center;

    match direction {
        Direction::Up => [
            Point::new(x, y - edge),
            Point::new(x - size, y - edge - size),
            Point::new(x + size, y - edge - size),
        ],
        Direction::Down => [
            Point::new(x, y + edge),
            Point::new(x - size, y + edge + size),
            Point::new(x + size, y + edge + size),
        ],
        Direction::Left => [
            Point::new(x - edge, y),
            Point::new(x - edge - size, y - size),
            Point::new(x - edge - size, y + size),
        ],
        Direction::Right => [
            Point::new(x + edge, y),
            Point::new(x + edge + size, y - size),
            Point::new(x + edge + size, y + size),
        ],
    }
}
