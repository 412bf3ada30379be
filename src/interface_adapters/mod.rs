// Interface adapters: wire protocol, channel transport and output surfaces.

pub mod channel;
pub mod input;
pub mod protocol;
pub mod svg;
pub mod transport;
pub mod view;
