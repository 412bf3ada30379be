// Shared mock presence authority for integration tests, started once per test binary.
#![allow(dead_code)]

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use serde_json::{Value, json};
use space_client::ClientSettings;
use space_client::domain::{Avatar, AvatarId, Direction, PushError, Space, SpaceId, UserId};
use space_client::interface_adapters::channel::ChannelSettings;
use space_client::interface_adapters::protocol::{
    AvatarDto, Frame, GET_NEARBY_USERS, GET_STATE, HEARTBEAT, MOVE, MoveDto, PHOENIX_TOPIC,
    PHX_JOIN, PHX_LEAVE, PHX_REPLY, USER_JOINED, USER_LEFT, USER_MOVED,
};
use space_client::interface_adapters::transport::{WsTransport, socket_url};
use space_client::use_cases::render::{DrawCommand, RosterEntry};
use space_client::use_cases::{ConnectionStatus, SessionView, SpaceState};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::broadcast;

/// Join is answered with `error`.
pub const REJECTED_USER: u64 = 0;
/// Join is never answered.
pub const SILENT_USER: u64 = 999;

static SOCKET_URL: OnceLock<String> = OnceLock::new();

// Ensure the mock authority is running and return its socket base url.
pub fn ensure_authority() -> &'static str {
    SOCKET_URL.get_or_init(|| {
        let (url_tx, url_rx) = std::sync::mpsc::channel();
        // Own thread and runtime so the server outlives individual test runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("authority runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let app = Router::new()
                    .route("/socket/websocket", get(socket_handler))
                    .with_state(Authority::default());
                url_tx
                    .send(format!("ws://{addr}/socket"))
                    .expect("publish authority url");
                axum::serve(listener, app).await.expect("authority failed");
            });
        });
        url_rx.recv().expect("authority url")
    })
}

pub fn settings(space_id: u64, user_id: u64) -> ClientSettings {
    ClientSettings {
        socket_url: ensure_authority().to_string(),
        space_id: SpaceId(space_id),
        user_id: UserId(user_id),
        space: Space {
            width: 100,
            height: 100,
        },
        initial_x: 10.0,
        initial_y: 10.0,
        channel: ChannelSettings {
            join_timeout: Duration::from_secs(2),
            push_timeout: Duration::from_secs(2),
            heartbeat_interval: Some(Duration::from_secs(30)),
        },
        render_path: None,
    }
}

pub async fn connect(settings: &ClientSettings) -> WsTransport {
    let url = socket_url(&settings.socket_url).expect("valid socket url");
    WsTransport::connect(&url).await.expect("connect to authority")
}

/// Polls `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

#[derive(Default)]
struct ViewLog {
    statuses: Vec<ConnectionStatus>,
    rosters: Vec<Vec<String>>,
    positions: Vec<(f64, f64, Direction)>,
    nearby: Vec<String>,
    move_failures: Vec<PushError>,
    frames: usize,
}

/// View that records what the session showed, shareable with the test body.
#[derive(Clone, Default)]
pub struct SharedView {
    log: Arc<Mutex<ViewLog>>,
}

impl SharedView {
    fn with<T>(&self, read: impl FnOnce(&ViewLog) -> T) -> T {
        read(&self.log.lock().expect("view lock"))
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.with(|log| log.statuses.clone())
    }

    pub fn last_roster(&self) -> Vec<String> {
        self.with(|log| log.rosters.last().cloned().unwrap_or_default())
    }

    pub fn positions(&self) -> Vec<(f64, f64, Direction)> {
        self.with(|log| log.positions.clone())
    }

    pub fn nearby(&self) -> Vec<String> {
        self.with(|log| log.nearby.clone())
    }

    pub fn frames(&self) -> usize {
        self.with(|log| log.frames)
    }
}

impl SessionView for SharedView {
    fn status_changed(&mut self, status: ConnectionStatus) {
        self.log.lock().expect("view lock").statuses.push(status);
    }

    fn render(&mut self, _commands: &[DrawCommand]) {
        self.log.lock().expect("view lock").frames += 1;
    }

    fn roster_changed(&mut self, roster: &[RosterEntry]) {
        let names = roster.iter().map(|entry| entry.username.clone()).collect();
        self.log.lock().expect("view lock").rosters.push(names);
    }

    fn position_changed(&mut self, avatar: &Avatar) {
        self.log
            .lock()
            .expect("view lock")
            .positions
            .push((avatar.x, avatar.y, avatar.direction));
    }

    fn move_failed(&mut self, error: &PushError) {
        self.log
            .lock()
            .expect("view lock")
            .move_failures
            .push(error.clone());
    }

    fn nearby_users(&mut self, avatars: &[Avatar]) {
        let mut log = self.log.lock().expect("view lock");
        log.nearby
            .extend(avatars.iter().map(|avatar| avatar.username.clone()));
    }

    fn space_state(&mut self, _state: &SpaceState) {}
}

// Mock authority: one avatar per connection, broadcasts scoped by topic.

#[derive(Clone)]
struct Broadcast {
    origin: u64,
    include_origin: bool,
    frame: Frame,
}

#[derive(Clone)]
struct Authority {
    spaces: Arc<Mutex<HashMap<String, Vec<AvatarDto>>>>,
    broadcasts: broadcast::Sender<Broadcast>,
    next_conn: Arc<AtomicU64>,
}

impl Default for Authority {
    fn default() -> Self {
        let (broadcasts, _) = broadcast::channel(256);
        Self {
            spaces: Arc::default(),
            broadcasts,
            next_conn: Arc::new(AtomicU64::new(1)),
        }
    }
}

struct Member {
    topic: String,
    join_ref: Option<String>,
    user_id: UserId,
}

async fn socket_handler(ws: WebSocketUpgrade, State(authority): State<Authority>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, authority))
}

async fn serve_socket(mut socket: WebSocket, authority: Authority) {
    let conn_id = authority.next_conn.fetch_add(1, Ordering::Relaxed);
    let mut broadcasts = authority.broadcasts.subscribe();
    let mut member: Option<Member> = None;

    loop {
        let outgoing = tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match Frame::decode(text.as_str()) {
                    Ok(frame) => authority.handle(conn_id, &mut member, frame),
                    Err(_) => Vec::new(),
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => Vec::new(),
            },
            Ok(broadcast) = broadcasts.recv() => {
                let addressed = member
                    .as_ref()
                    .is_some_and(|m| m.topic == broadcast.frame.topic);
                if addressed && (broadcast.include_origin || broadcast.origin != conn_id) {
                    vec![broadcast.frame]
                } else {
                    Vec::new()
                }
            }
        };

        for frame in outgoing {
            let text = frame.encode().expect("encode frame");
            if socket.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    }

    if let Some(member) = member.take() {
        authority.depart(conn_id, &member);
    }
}

fn reply(request: &Frame, status: &str, response: Value) -> Frame {
    Frame {
        join_ref: request.join_ref.clone(),
        msg_ref: request.msg_ref.clone(),
        topic: request.topic.clone(),
        event: PHX_REPLY.to_string(),
        payload: json!({ "status": status, "response": response }),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("serialize dto")
}

impl Authority {
    fn handle(&self, conn_id: u64, member: &mut Option<Member>, frame: Frame) -> Vec<Frame> {
        if frame.topic == PHOENIX_TOPIC && frame.event == HEARTBEAT {
            return vec![reply(&frame, "ok", json!({}))];
        }

        match frame.event.as_str() {
            PHX_JOIN => self.join(conn_id, member, &frame),
            PHX_LEAVE => {
                if let Some(left) = member.take() {
                    self.depart(conn_id, &left);
                }
                vec![reply(&frame, "ok", json!({}))]
            }
            _ => {
                let Some(joined) = member.as_ref().filter(|m| m.topic == frame.topic) else {
                    return vec![reply(&frame, "error", json!({"reason": "unmatched topic"}))];
                };
                self.member_push(conn_id, joined, &frame)
            }
        }
    }

    fn join(&self, conn_id: u64, member: &mut Option<Member>, frame: &Frame) -> Vec<Frame> {
        let user_id = frame.payload["user_id"].as_u64().unwrap_or(REJECTED_USER);
        match user_id {
            SILENT_USER => return Vec::new(),
            REJECTED_USER => {
                return vec![reply(frame, "error", json!({"reason": "unauthorized"}))];
            }
            _ => {}
        }

        let avatar = AvatarDto {
            id: AvatarId(1000 + user_id),
            user_id: UserId(user_id),
            username: format!("user-{user_id}"),
            x: frame.payload["x"].as_f64().unwrap_or(0.0),
            y: frame.payload["y"].as_f64().unwrap_or(0.0),
            direction: Direction::Down,
            is_active: Some(true),
        };

        let avatars = {
            let mut spaces = self.spaces.lock().expect("spaces lock");
            let space = spaces.entry(frame.topic.clone()).or_default();
            space.retain(|existing| existing.user_id != avatar.user_id);
            space.push(avatar.clone());
            space.clone()
        };
        *member = Some(Member {
            topic: frame.topic.clone(),
            join_ref: frame.join_ref.clone(),
            user_id: avatar.user_id,
        });

        self.broadcast(
            conn_id,
            false,
            &frame.topic,
            USER_JOINED,
            json!({ "avatar": to_json(&avatar) }),
        );
        vec![reply(
            frame,
            "ok",
            json!({ "current_avatar": to_json(&avatar), "avatars": to_json(&avatars) }),
        )]
    }

    fn member_push(&self, conn_id: u64, member: &Member, frame: &Frame) -> Vec<Frame> {
        let mut spaces = self.spaces.lock().expect("spaces lock");
        let space = spaces.entry(member.topic.clone()).or_default();

        match frame.event.as_str() {
            MOVE => {
                let Ok(request) = serde_json::from_value::<MoveDto>(frame.payload.clone()) else {
                    return vec![reply(frame, "error", json!({"reason": "invalid move"}))];
                };
                if request.x < 0.0 || request.y < 0.0 {
                    return vec![reply(frame, "error", json!({"reason": "out of bounds"}))];
                }
                let Some(avatar) = space.iter_mut().find(|a| a.user_id == member.user_id) else {
                    return vec![reply(frame, "error", json!({"reason": "not joined"}))];
                };
                avatar.x = request.x;
                avatar.y = request.y;
                avatar.direction = request.direction;
                let moved = avatar.clone();
                drop(spaces);

                self.broadcast(
                    conn_id,
                    true,
                    &member.topic,
                    USER_MOVED,
                    json!({ "user_id": member.user_id, "avatar": to_json(&moved) }),
                );
                vec![reply(frame, "ok", to_json(&request))]
            }
            GET_NEARBY_USERS => {
                let radius = frame.payload["radius"].as_f64().unwrap_or(5.0);
                let Some(me) = space.iter().find(|a| a.user_id == member.user_id).cloned() else {
                    return vec![reply(frame, "error", json!({"reason": "not joined"}))];
                };
                let nearby: Vec<&AvatarDto> = space
                    .iter()
                    .filter(|a| a.user_id != me.user_id)
                    .filter(|a| ((a.x - me.x).powi(2) + (a.y - me.y).powi(2)).sqrt() <= radius)
                    .collect();
                vec![reply(frame, "ok", json!({ "nearby_users": to_json(&nearby) }))]
            }
            GET_STATE => vec![reply(
                frame,
                "ok",
                json!({ "avatars": to_json(&*space), "proximity_groups": {} }),
            )],
            _ => vec![reply(frame, "error", json!({"reason": "unknown event"}))],
        }
    }

    fn depart(&self, conn_id: u64, member: &Member) {
        {
            let mut spaces = self.spaces.lock().expect("spaces lock");
            if let Some(space) = spaces.get_mut(&member.topic) {
                space.retain(|a| a.user_id != member.user_id);
            }
        }
        self.broadcast(
            conn_id,
            false,
            &member.topic,
            USER_LEFT,
            json!({ "user_id": member.user_id }),
        );
    }

    fn broadcast(&self, origin: u64, include_origin: bool, topic: &str, event: &str, payload: Value) {
        let _ = self.broadcasts.send(Broadcast {
            origin,
            include_origin,
            frame: Frame {
                join_ref: None,
                msg_ref: None,
                topic: topic.to_string(),
                event: event.to_string(),
                payload,
            },
        });
    }
}
