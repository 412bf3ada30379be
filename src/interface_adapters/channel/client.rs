use crate::interface_adapters::protocol::{
    Frame, HEARTBEAT, PHOENIX_TOPIC, PHX_CLOSE, PHX_ERROR, PHX_JOIN, PHX_LEAVE, PHX_REPLY,
    ReplyPayload,
};
use crate::interface_adapters::transport::Transport;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, interval_at, timeout};
use tracing::{debug, info, warn};

pub type EventHandler = Box<dyn FnMut(Value) + Send + 'static>;

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub join_timeout: Duration,
    pub push_timeout: Duration,
    /// `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(10),
            push_timeout: Duration::from_secs(10),
            heartbeat_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Terminal answer to a join or push.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok(Value),
    Error(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    Timeout,
    Closed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Timeout => write!(f, "no reply before deadline"),
            ChannelError::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

enum Command {
    Subscribe {
        event: String,
        handler: EventHandler,
    },
    Join {
        payload: Value,
        reply_tx: oneshot::Sender<Reply>,
    },
    Push {
        event: String,
        payload: Value,
        reply_tx: oneshot::Sender<Reply>,
    },
    Leave {
        reply_tx: oneshot::Sender<Reply>,
    },
}

/// Reply handle for a join or push. Resolves exactly once.
pub struct Pending {
    rx: oneshot::Receiver<Reply>,
    deadline: Duration,
    // Set for joins: a timed-out join is abandoned with a leave.
    leave_on_timeout: Option<mpsc::UnboundedSender<Command>>,
}

impl Pending {
    pub async fn wait(self) -> Result<Reply, ChannelError> {
        let Pending {
            rx,
            deadline,
            leave_on_timeout,
        } = self;

        match timeout(deadline, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => {
                if let Some(cmd_tx) = leave_on_timeout {
                    let (reply_tx, _reply_rx) = oneshot::channel();
                    let _ = cmd_tx.send(Command::Leave { reply_tx });
                }
                Err(ChannelError::Timeout)
            }
        }
    }
}

/// Client side of one Phoenix channel on its own transport.
///
/// All frames flow through a single background task that owns the transport,
/// so refs, reply correlation and handler dispatch happen in wire order.
pub struct ChannelClient {
    settings: ChannelSettings,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl ChannelClient {
    pub fn open<T: Transport>(transport: T, topic: impl Into<String>, settings: ChannelSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(channel_loop(
            transport,
            Arc::from(topic.into()),
            cmd_rx,
            settings.heartbeat_interval,
        ));

        Self { settings, cmd_tx }
    }

    /// Registers a handler called once per occurrence of `event` on this topic.
    /// A lost transport is reported to `phx_error` handlers.
    pub fn subscribe<F>(&self, event: &str, handler: F)
    where
        F: FnMut(Value) + Send + 'static,
    {
        let _ = self.cmd_tx.send(Command::Subscribe {
            event: event.to_string(),
            handler: Box::new(handler),
        });
    }

    pub fn join(&self, payload: Value) -> Pending {
        let (reply_tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Join { payload, reply_tx });
        Pending {
            rx,
            deadline: self.settings.join_timeout,
            leave_on_timeout: Some(self.cmd_tx.clone()),
        }
    }

    pub fn push(&self, event: &str, payload: Value) -> Pending {
        let (reply_tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Push {
            event: event.to_string(),
            payload,
            reply_tx,
        });
        self.pending(rx)
    }

    pub fn leave(&self) -> Pending {
        let (reply_tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Leave { reply_tx });
        self.pending(rx)
    }

    fn pending(&self, rx: oneshot::Receiver<Reply>) -> Pending {
        Pending {
            rx,
            deadline: self.settings.push_timeout,
            leave_on_timeout: None,
        }
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

struct LoopState {
    topic: Arc<str>,
    next_ref: u64,
    join_ref: Option<String>,
    pending: HashMap<String, oneshot::Sender<Reply>>,
    handlers: HashMap<String, Vec<EventHandler>>,
    heartbeat_ref: Option<String>,
}

impl LoopState {
    fn new(topic: Arc<str>) -> Self {
        Self {
            topic,
            next_ref: 1,
            join_ref: None,
            pending: HashMap::new(),
            handlers: HashMap::new(),
            heartbeat_ref: None,
        }
    }

    fn make_ref(&mut self) -> String {
        let msg_ref = self.next_ref.to_string();
        self.next_ref += 1;
        msg_ref
    }

    // Waiters that gave up (deadline elapsed) no longer need their slot.
    fn track(&mut self, msg_ref: String, reply_tx: oneshot::Sender<Reply>) {
        self.pending.retain(|_, tx| !tx.is_closed());
        self.pending.insert(msg_ref, reply_tx);
    }

    fn dispatch(&mut self, event: &str, payload: Value) {
        if let Some(handlers) = self.handlers.get_mut(event) {
            for handler in handlers.iter_mut() {
                handler(payload.clone());
            }
        }
    }

    // Outstanding waiters observe `Closed` once their senders drop.
    fn fail_all(&mut self, reason: &str) {
        self.pending.clear();
        self.heartbeat_ref = None;
        if self.join_ref.take().is_some() {
            self.dispatch(PHX_ERROR, json!({ "reason": reason }));
        }
    }
}

async fn channel_loop<T: Transport>(
    mut transport: T,
    topic: Arc<str>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    heartbeat_interval: Option<Duration>,
) {
    debug!(topic = %topic, "channel loop started");

    let mut state = LoopState::new(topic);
    let mut heartbeat =
        heartbeat_interval.map(|period| interval_at(Instant::now() + period, period));

    loop {
        let control = tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => handle_command(&mut transport, &mut state, cmd).await,
                None => {
                    debug!(topic = %state.topic, "channel handle dropped");
                    if let Err(e) = transport.close().await {
                        debug!(error = %e, "transport close error");
                    }
                    LoopControl::Disconnect
                }
            },

            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => {
                    handle_text(&mut state, &text);
                    LoopControl::Continue
                }
                Some(Err(e)) => {
                    warn!(topic = %state.topic, error = %e, "transport receive error");
                    state.fail_all(&e.to_string());
                    LoopControl::Disconnect
                }
                None => {
                    info!(topic = %state.topic, "transport closed by server");
                    state.fail_all("transport closed");
                    LoopControl::Disconnect
                }
            },

            _ = tick(&mut heartbeat) => send_heartbeat(&mut transport, &mut state).await,
        };

        if let LoopControl::Disconnect = control {
            break;
        }
    }

    debug!(topic = %state.topic, "channel loop exited");
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn send_frame<T: Transport>(transport: &mut T, state: &mut LoopState, frame: Frame) -> LoopControl {
    let text = match frame.encode() {
        Ok(text) => text,
        Err(e) => {
            warn!(event = %frame.event, error = %e, "failed to encode frame");
            return LoopControl::Continue;
        }
    };

    match transport.send(text).await {
        Ok(()) => LoopControl::Continue,
        Err(e) => {
            warn!(topic = %state.topic, error = %e, "transport send error");
            state.fail_all(&e.to_string());
            LoopControl::Disconnect
        }
    }
}

async fn handle_command<T: Transport>(transport: &mut T, state: &mut LoopState, cmd: Command) -> LoopControl {
    match cmd {
        Command::Subscribe { event, handler } => {
            state.handlers.entry(event).or_default().push(handler);
            LoopControl::Continue
        }
        Command::Join { payload, reply_tx } => {
            let msg_ref = state.make_ref();
            state.join_ref = Some(msg_ref.clone());
            state.track(msg_ref.clone(), reply_tx);
            let frame = Frame {
                join_ref: Some(msg_ref.clone()),
                msg_ref: Some(msg_ref),
                topic: state.topic.to_string(),
                event: PHX_JOIN.to_string(),
                payload,
            };
            send_frame(transport, state, frame).await
        }
        Command::Push {
            event,
            payload,
            reply_tx,
        } => {
            let Some(join_ref) = state.join_ref.clone() else {
                // Dropping `reply_tx` resolves the waiter as closed.
                warn!(topic = %state.topic, event = %event, "push before join; dropped");
                return LoopControl::Continue;
            };
            let msg_ref = state.make_ref();
            state.track(msg_ref.clone(), reply_tx);
            let frame = Frame {
                join_ref: Some(join_ref),
                msg_ref: Some(msg_ref),
                topic: state.topic.to_string(),
                event,
                payload,
            };
            send_frame(transport, state, frame).await
        }
        Command::Leave { reply_tx } => {
            let Some(join_ref) = state.join_ref.take() else {
                let _ = reply_tx.send(Reply::Ok(Value::Null));
                return LoopControl::Continue;
            };
            let msg_ref = state.make_ref();
            state.track(msg_ref.clone(), reply_tx);
            let frame = Frame {
                join_ref: Some(join_ref),
                msg_ref: Some(msg_ref),
                topic: state.topic.to_string(),
                event: PHX_LEAVE.to_string(),
                payload: json!({}),
            };
            send_frame(transport, state, frame).await
        }
    }
}

async fn send_heartbeat<T: Transport>(transport: &mut T, state: &mut LoopState) -> LoopControl {
    if let Some(stale) = state.heartbeat_ref.take() {
        warn!(topic = %state.topic, heartbeat_ref = %stale, "heartbeat not acknowledged; closing");
        if let Err(e) = transport.close().await {
            debug!(error = %e, "transport close error");
        }
        state.fail_all("heartbeat timeout");
        return LoopControl::Disconnect;
    }

    let msg_ref = state.make_ref();
    state.heartbeat_ref = Some(msg_ref.clone());
    let frame = Frame {
        join_ref: None,
        msg_ref: Some(msg_ref),
        topic: PHOENIX_TOPIC.to_string(),
        event: HEARTBEAT.to_string(),
        payload: json!({}),
    };
    send_frame(transport, state, frame).await
}

fn handle_text(state: &mut LoopState, text: &str) {
    let frame = match Frame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "failed to decode frame");
            return;
        }
    };

    if frame.topic == PHOENIX_TOPIC {
        if frame.event == PHX_REPLY && frame.msg_ref.is_some() && frame.msg_ref == state.heartbeat_ref {
            state.heartbeat_ref = None;
        }
        return;
    }
    if frame.topic != *state.topic {
        debug!(topic = %frame.topic, "frame for another topic ignored");
        return;
    }

    if frame.event == PHX_REPLY {
        handle_reply(state, frame);
        return;
    }

    // Frames addressed to an earlier join of this topic are stale.
    if frame.join_ref.is_some() && frame.join_ref != state.join_ref {
        debug!(event = %frame.event, "frame from previous join ignored");
        return;
    }

    if frame.event == PHX_CLOSE || frame.event == PHX_ERROR {
        info!(topic = %state.topic, event = %frame.event, "channel terminated by server");
        state.join_ref = None;
        state.pending.clear();
    }
    state.dispatch(&frame.event, frame.payload);
}

fn handle_reply(state: &mut LoopState, frame: Frame) {
    let reply = match serde_json::from_value::<ReplyPayload>(frame.payload) {
        Ok(ReplyPayload { status, response }) if status == "ok" => Reply::Ok(response),
        Ok(ReplyPayload { response, .. }) => Reply::Error(response),
        Err(e) => Reply::Error(json!({ "reason": format!("malformed reply: {e}") })),
    };

    // A refused join leaves the channel unjoined.
    let answers_join = frame.msg_ref.is_some() && frame.msg_ref == state.join_ref;
    if answers_join && matches!(reply, Reply::Error(_)) {
        debug!(topic = %state.topic, "join refused");
        state.join_ref = None;
    }

    let Some(sender) = frame.msg_ref.as_ref().and_then(|r| state.pending.remove(r)) else {
        debug!(msg_ref = ?frame.msg_ref, "late or unknown reply ignored");
        return;
    };
    // The waiter may have timed out already.
    let _ = sender.send(reply);
}
