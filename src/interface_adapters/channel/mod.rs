pub mod client;
pub mod space;

pub use client::{ChannelClient, ChannelError, ChannelSettings, Pending, Reply};
pub use space::SpaceChannelClient;
