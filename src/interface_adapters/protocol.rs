// Wire protocol: Phoenix V2 JSON frames plus the space channel DTOs and their
// conversions into use-case types.

use crate::domain::{Avatar, AvatarId, Direction, ProximityGroups, UserId};
use crate::use_cases::{JoinRequest, JoinSnapshot, MoveAck, MoveCommand, SpaceEvent, SpaceState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const HEARTBEAT: &str = "heartbeat";
pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";

pub const USER_JOINED: &str = "user_joined";
pub const USER_MOVED: &str = "user_moved";
pub const USER_LEFT: &str = "user_left";
pub const PROXIMITY_UPDATE: &str = "proximity_update";

pub const MOVE: &str = "move";
pub const GET_NEARBY_USERS: &str = "get_nearby_users";
pub const GET_STATE: &str = "get_state";

/// One Phoenix message, `[join_ref, ref, topic, event, payload]` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFrame", into = "RawFrame")]
pub struct Frame {
    pub join_ref: Option<String>,
    pub msg_ref: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

#[derive(Serialize, Deserialize)]
struct RawFrame(Option<String>, Option<String>, String, String, Value);

impl From<RawFrame> for Frame {
    fn from(RawFrame(join_ref, msg_ref, topic, event, payload): RawFrame) -> Self {
        Self {
            join_ref,
            msg_ref,
            topic,
            event,
            payload,
        }
    }
}

impl From<Frame> for RawFrame {
    fn from(frame: Frame) -> Self {
        RawFrame(
            frame.join_ref,
            frame.msg_ref,
            frame.topic,
            frame.event,
            frame.payload,
        )
    }
}

impl Frame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Payload of a `phx_reply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub status: String,
    #[serde(default)]
    pub response: Value,
}

/// Human-readable reason out of an error reply.
pub fn error_reason(response: &Value) -> String {
    match response.get("reason").and_then(Value::as_str) {
        Some(reason) => reason.to_string(),
        None => response.to_string(),
    }
}

/// Avatar as sent by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarDto {
    pub id: AvatarId,
    pub user_id: UserId,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl From<AvatarDto> for Avatar {
    fn from(dto: AvatarDto) -> Self {
        Self {
            id: dto.id,
            user_id: dto.user_id,
            username: dto.username,
            x: dto.x,
            y: dto.y,
            direction: dto.direction,
            is_active: dto.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinParamsDto {
    pub user_id: UserId,
    pub x: f64,
    pub y: f64,
}

impl From<&JoinRequest> for JoinParamsDto {
    fn from(request: &JoinRequest) -> Self {
        Self {
            user_id: request.user_id,
            x: request.x,
            y: request.y,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinReplyDto {
    pub current_avatar: AvatarDto,
    #[serde(default)]
    pub avatars: Vec<AvatarDto>,
}

impl From<JoinReplyDto> for JoinSnapshot {
    fn from(dto: JoinReplyDto) -> Self {
        Self {
            current_avatar: dto.current_avatar.into(),
            avatars: dto.avatars.into_iter().map(Avatar::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJoinedDto {
    pub avatar: AvatarDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMovedDto {
    pub user_id: UserId,
    pub avatar: AvatarDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftDto {
    pub user_id: UserId,
}

// JSON object keys are strings, so avatar ids arrive stringified.
type ProximityGroupsDto = HashMap<String, Vec<AvatarId>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityUpdateDto {
    pub proximity_groups: ProximityGroupsDto,
}

fn proximity_groups(dto: ProximityGroupsDto) -> ProximityGroups {
    dto.into_iter()
        .filter_map(|(key, nearby)| key.parse().ok().map(|id| (AvatarId(id), nearby)))
        .collect()
}

/// Body of a `move` push and of its acknowledgement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveDto {
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
}

impl From<&MoveCommand> for MoveDto {
    fn from(command: &MoveCommand) -> Self {
        Self {
            x: command.x,
            y: command.y,
            direction: command.direction,
        }
    }
}

impl From<MoveDto> for MoveAck {
    fn from(dto: MoveDto) -> Self {
        Self {
            x: dto.x,
            y: dto.y,
            direction: dto.direction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyRequestDto {
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyReplyDto {
    pub nearby_users: Vec<AvatarDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateReplyDto {
    pub avatars: Vec<AvatarDto>,
    #[serde(default)]
    pub proximity_groups: ProximityGroupsDto,
}

impl From<StateReplyDto> for SpaceState {
    fn from(dto: StateReplyDto) -> Self {
        Self {
            avatars: dto.avatars.into_iter().map(Avatar::from).collect(),
            proximity_groups: proximity_groups(dto.proximity_groups),
        }
    }
}

/// Decodes a server-pushed space event. Unknown event names yield `None`.
pub fn decode_event(event: &str, payload: Value) -> Result<Option<SpaceEvent>, serde_json::Error> {
    let event = match event {
        USER_JOINED => {
            let dto: UserJoinedDto = serde_json::from_value(payload)?;
            SpaceEvent::Joined(dto.avatar.into())
        }
        USER_MOVED => {
            let dto: UserMovedDto = serde_json::from_value(payload)?;
            SpaceEvent::Moved {
                user_id: dto.user_id,
                avatar: dto.avatar.into(),
            }
        }
        USER_LEFT => {
            let dto: UserLeftDto = serde_json::from_value(payload)?;
            SpaceEvent::Left {
                user_id: dto.user_id,
            }
        }
        PROXIMITY_UPDATE => {
            let dto: ProximityUpdateDto = serde_json::from_value(payload)?;
            SpaceEvent::Proximity(proximity_groups(dto.proximity_groups))
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}
