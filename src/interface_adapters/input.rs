// Line-oriented command parser for the interactive client.

use crate::domain::Direction;
use crate::use_cases::UserCommand;
use crate::use_cases::command::{DEFAULT_NEARBY_RADIUS, DEFAULT_STEP_DISTANCE};
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const HELP: &str = "commands: click <px> <py> | move <x> <y> [up|down|left|right] | \
up|down|left|right [distance] | nearby [radius] | state | leave";

#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    Empty,
    UnknownCommand(String),
    MissingArgument(&'static str),
    InvalidNumber(String),
    InvalidDirection(String),
    TrailingInput(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => write!(f, "empty command"),
            InputError::UnknownCommand(cmd) => write!(f, "unknown command {cmd:?}"),
            InputError::MissingArgument(name) => write!(f, "missing argument <{name}>"),
            InputError::InvalidNumber(raw) => write!(f, "not a finite number: {raw:?}"),
            InputError::InvalidDirection(raw) => write!(f, "not a direction: {raw:?}"),
            InputError::TrailingInput(rest) => write!(f, "unexpected input: {rest:?}"),
        }
    }
}

impl std::error::Error for InputError {}

pub fn parse_command(line: &str) -> Result<UserCommand, InputError> {
    let mut args = line.split_whitespace();
    let Some(name) = args.next() else {
        return Err(InputError::Empty);
    };
    let name = name.to_ascii_lowercase();

    let command = match name.as_str() {
        "click" => UserCommand::Click {
            px: required_number(args.next(), "px")?,
            py: required_number(args.next(), "py")?,
        },
        "move" => UserCommand::MoveTo {
            x: required_number(args.next(), "x")?,
            y: required_number(args.next(), "y")?,
            direction: args.next().map(parse_direction).transpose()?,
        },
        "up" | "down" | "left" | "right" => UserCommand::Step {
            direction: parse_direction(&name)?,
            distance: optional_number(args.next(), DEFAULT_STEP_DISTANCE)?,
        },
        "nearby" => UserCommand::Nearby {
            radius: optional_number(args.next(), DEFAULT_NEARBY_RADIUS)?,
        },
        "state" => UserCommand::State,
        "leave" | "quit" | "exit" => UserCommand::Leave,
        _ => return Err(InputError::UnknownCommand(name)),
    };

    let rest: Vec<&str> = args.collect();
    if !rest.is_empty() {
        return Err(InputError::TrailingInput(rest.join(" ")));
    }
    Ok(command)
}

/// Feeds parsed lines into the session until `leave`, end of input, or the
/// session going away. Dropping `commands` on return makes the session leave.
pub async fn read_commands<R>(reader: R, commands: mpsc::Sender<UserCommand>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("command input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read command input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(command) => {
                let leave = command == UserCommand::Leave;
                if commands.send(command).await.is_err() || leave {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "{HELP}"),
        }
    }
}

fn parse_number(raw: &str) -> Result<f64, InputError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(InputError::InvalidNumber(raw.to_string())),
    }
}

fn required_number(raw: Option<&str>, name: &'static str) -> Result<f64, InputError> {
    parse_number(raw.ok_or(InputError::MissingArgument(name))?)
}

fn optional_number(raw: Option<&str>, default: f64) -> Result<f64, InputError> {
    raw.map_or(Ok(default), parse_number)
}

fn parse_direction(raw: &str) -> Result<Direction, InputError> {
    raw.to_ascii_lowercase()
        .parse()
        .map_err(|_| InputError::InvalidDirection(raw.to_string()))
}
