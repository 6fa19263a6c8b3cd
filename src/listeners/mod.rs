pub mod tcp;
pub mod udp;
#[cfg(feature = "websocket")]
pub mod ws;

pub use tcp::{StreamListener, StreamTransport};
pub use udp::{DatagramListener, DatagramTransport};
#[cfg(feature = "websocket")]
pub use ws::MessageTransport;
