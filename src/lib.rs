pub mod cli;
pub mod core;
pub mod listeners;
pub mod shell;
pub mod utils;

// Export public types and functions
pub use crate::core::config::{EndpointConfig, ProbeConfig};
pub use crate::core::error::{ProbeError, ProbeResult};
pub use crate::core::events::{Event, EventKind, EventLog};
pub use crate::core::facade::{ProtocolFacade, Transport};
pub use crate::core::network::ListenerManager;
pub use crate::core::registry::{ClientRegistry, ClientSnapshot, CLOSED_DESCRIPTION};
pub use crate::core::types::{
    ClientHandle, Payload, PeerIdentity, Protocol, TransportState, MAX_PAYLOAD_SIZE,
};
pub use crate::core::Probe;
pub use cli::Cli;
pub use shell::Shell;
