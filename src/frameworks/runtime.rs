// Framework bootstrap for the presence client.

use crate::domain::{Space, SpaceId, UserId};
use crate::frameworks::config;
use crate::interface_adapters::channel::{ChannelSettings, SpaceChannelClient};
use crate::interface_adapters::input::read_commands;
use crate::interface_adapters::transport::{Transport, WsTransport, socket_url};
use crate::interface_adapters::view::ConsoleView;
use crate::use_cases::{SessionController, SessionView, UserCommand};

use std::io::{Error, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Everything needed to join one space as one user.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub socket_url: String,
    pub space_id: SpaceId,
    pub user_id: UserId,
    pub space: Space,
    pub initial_x: f64,
    pub initial_y: f64,
    pub channel: ChannelSettings,
    pub render_path: Option<PathBuf>,
}

impl ClientSettings {
    pub fn from_env() -> Self {
        let (initial_x, initial_y) = config::initial_position();
        Self {
            socket_url: config::socket_url(),
            space_id: config::space_id(),
            user_id: config::user_id(),
            space: config::space(),
            initial_x,
            initial_y,
            channel: ChannelSettings {
                join_timeout: config::join_timeout(),
                push_timeout: config::push_timeout(),
                heartbeat_interval: config::heartbeat_interval(),
            },
            render_path: config::render_path(),
        }
    }
}

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Joins the configured space over `transport` and drives the session until
/// the user leaves or the channel goes away.
pub async fn run<T, V>(
    transport: T,
    settings: &ClientSettings,
    view: V,
    commands: mpsc::Receiver<UserCommand>,
) -> Result<()>
where
    T: Transport,
    V: SessionView,
{
    let (channel, events) =
        SpaceChannelClient::open(transport, settings.space_id, settings.channel.clone());
    let mut session = SessionController::new(channel, view, settings.space, settings.user_id);

    session
        .connect(settings.initial_x, settings.initial_y)
        .await
        .map_err(|e| Error::other(format!("failed to join {}: {e}", settings.space_id.topic())))?;

    session
        .run(events, commands)
        .await
        .inspect_err(|e| {
            tracing::warn!(space_id = %settings.space_id, error = %e, "session ended");
        })
        .map_err(Error::other)
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let settings = ClientSettings::from_env();
    let url = socket_url(&settings.socket_url).map_err(Error::other)?;
    tracing::info!(
        %url,
        space_id = %settings.space_id,
        user_id = %settings.user_id,
        "connecting"
    );

    let transport = WsTransport::connect(&url).await.map_err(|e| {
        tracing::error!(%url, error = %e, "failed to connect");
        Error::other(e)
    })?;

    let (command_tx, command_rx) = mpsc::channel(config::COMMAND_CHANNEL_CAPACITY);
    tokio::spawn(read_commands(tokio::io::stdin(), command_tx));

    let view = ConsoleView::new(settings.render_path.clone());
    run(transport, &settings, view, command_rx).await
}
