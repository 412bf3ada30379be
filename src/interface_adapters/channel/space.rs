use crate::domain::{Avatar, PushError, SpaceId};
use crate::interface_adapters::channel::client::{ChannelClient, ChannelError, ChannelSettings, Pending, Reply};
use crate::interface_adapters::protocol::{
    self, GET_NEARBY_USERS, GET_STATE, JoinParamsDto, JoinReplyDto, MOVE, MoveDto, NearbyReplyDto,
    NearbyRequestDto, PHX_CLOSE, PHX_ERROR, PROXIMITY_UPDATE, StateReplyDto, USER_JOINED, USER_LEFT,
    USER_MOVED,
};
use crate::interface_adapters::transport::Transport;
use crate::use_cases::{
    JoinOutcome, JoinRequest, MoveAck, MoveCommand, SpaceChannel, SpaceEvent, SpaceState,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// `space:<id>` channel bound to the presence protocol.
pub struct SpaceChannelClient {
    channel: ChannelClient,
}

impl SpaceChannelClient {
    /// Opens the channel and wires server events into a stream of
    /// `SpaceEvent`s. The stream ends once the channel task stops.
    pub fn open<T: Transport>(
        transport: T,
        space_id: SpaceId,
        settings: ChannelSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SpaceEvent>) {
        let channel = ChannelClient::open(transport, space_id.topic(), settings);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        for event in [USER_JOINED, USER_MOVED, USER_LEFT, PROXIMITY_UPDATE] {
            let tx = event_tx.clone();
            channel.subscribe(event, move |payload| forward(&tx, event, payload));
        }
        for event in [PHX_ERROR, PHX_CLOSE] {
            let tx = event_tx.clone();
            channel.subscribe(event, move |payload| {
                let _ = tx.send(SpaceEvent::ChannelClosed {
                    reason: closed_reason(event, &payload),
                });
            });
        }

        (Self { channel }, event_rx)
    }

    fn request<D, R>(&self, event: &str, payload: Result<Value, PushError>) -> BoxFuture<'static, Result<R, PushError>>
    where
        D: DeserializeOwned + Send + 'static,
        R: From<D> + Send + 'static,
    {
        let pending = match payload {
            Ok(payload) => self.channel.push(event, payload),
            Err(e) => return async move { Err(e) }.boxed(),
        };
        async move {
            let response = reply_response(pending).await?;
            serde_json::from_value::<D>(response)
                .map(R::from)
                .map_err(|e| PushError::Decode(e.to_string()))
        }
        .boxed()
    }
}

fn forward(tx: &mpsc::UnboundedSender<SpaceEvent>, event: &str, payload: Value) {
    match protocol::decode_event(event, payload) {
        Ok(Some(space_event)) => {
            let _ = tx.send(space_event);
        }
        Ok(None) => debug!(event, "unhandled space event"),
        Err(e) => warn!(event, error = %e, "malformed space event"),
    }
}

fn closed_reason(event: &str, payload: &Value) -> String {
    match payload.get("reason").and_then(Value::as_str) {
        Some(reason) => reason.to_string(),
        None => event.to_string(),
    }
}

fn encode<T: Serialize>(body: &T) -> Result<Value, PushError> {
    serde_json::to_value(body).map_err(|e| PushError::Decode(e.to_string()))
}

async fn reply_response(pending: Pending) -> Result<Value, PushError> {
    match pending.wait().await {
        Ok(Reply::Ok(response)) => Ok(response),
        Ok(Reply::Error(response)) => Err(PushError::Rejected(protocol::error_reason(&response))),
        Err(ChannelError::Timeout) => Err(PushError::Timeout),
        Err(ChannelError::Closed) => Err(PushError::Closed),
    }
}

impl SpaceChannel for SpaceChannelClient {
    fn join(&self, request: JoinRequest) -> BoxFuture<'static, JoinOutcome> {
        let pending = match encode(&JoinParamsDto::from(&request)) {
            Ok(params) => self.channel.join(params),
            Err(e) => return async move { JoinOutcome::Error(e.to_string()) }.boxed(),
        };

        async move {
            match pending.wait().await {
                Ok(Reply::Ok(response)) => match serde_json::from_value::<JoinReplyDto>(response) {
                    Ok(dto) => JoinOutcome::Ok(dto.into()),
                    Err(e) => JoinOutcome::Error(format!("malformed join reply: {e}")),
                },
                Ok(Reply::Error(response)) => JoinOutcome::Error(protocol::error_reason(&response)),
                Err(ChannelError::Timeout) => JoinOutcome::Timeout,
                Err(ChannelError::Closed) => JoinOutcome::Error("channel closed".to_string()),
            }
        }
        .boxed()
    }

    fn push_move(&self, command: MoveCommand) -> BoxFuture<'static, Result<MoveAck, PushError>> {
        self.request::<MoveDto, MoveAck>(MOVE, encode(&MoveDto::from(&command)))
    }

    fn nearby_users(&self, radius: f64) -> BoxFuture<'static, Result<Vec<Avatar>, PushError>> {
        let payload = encode(&NearbyRequestDto { radius });
        let pending = self.request::<NearbyReplyDto, NearbyReplyDto>(GET_NEARBY_USERS, payload);
        async move {
            let reply = pending.await?;
            Ok(reply.nearby_users.into_iter().map(Avatar::from).collect())
        }
        .boxed()
    }

    fn space_state(&self) -> BoxFuture<'static, Result<SpaceState, PushError>> {
        self.request::<StateReplyDto, SpaceState>(GET_STATE, Ok(json!({})))
    }

    fn leave(&self) -> BoxFuture<'static, Result<(), PushError>> {
        let pending = self.channel.leave();
        async move { reply_response(pending).await.map(|_| ()) }.boxed()
    }
}
