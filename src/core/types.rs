use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::core::error::{ProbeError, ProbeResult};

/// Largest payload read by a single datagram or stream receive
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Stable per-protocol client number, assigned from 0 in order of first observation
pub type ClientHandle = usize;

/// Transports handled by the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Udp,
    Tcp,
    Ws,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Udp, Protocol::Tcp, Protocol::Ws];

    /// Name used on the command line and in the shell
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
            Protocol::Ws => "ws",
        }
    }

    /// Name used in log lines and diagnostics
    pub fn label(self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
            Protocol::Ws => "WebSocket",
        }
    }

    /// What a peer is called on this transport
    pub fn peer_noun(self) -> &'static str {
        match self {
            Protocol::Udp => "session",
            Protocol::Tcp | Protocol::Ws => "connection",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Protocol {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .into_iter()
            .find(|protocol| protocol.name() == s)
            .ok_or_else(|| ProbeError::UnknownProtocol(s.to_string()))
    }
}

/// Transport-specific peer descriptor.
///
/// Datagram and stream peers are identified by their address; message-framed
/// peers also carry the path they requested during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    pub addr: SocketAddr,
    pub path: Option<String>,
}

impl PeerIdentity {
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self { addr, path: None }
    }

    pub fn with_path(addr: SocketAddr, path: impl Into<String>) -> Self {
        Self {
            addr,
            path: Some(path.into()),
        }
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr.ip(), self.addr.port())?;
        if let Some(path) = &self.path {
            write!(f, ":{}", path)?;
        }
        Ok(())
    }
}

/// Connection state of a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Open,
    Closed,
}

/// Data sent to a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Text payload terminated by a newline, the way `send` delivers it
    pub fn line(text: &str) -> Self {
        Payload::Text(format!("{}\n", text))
    }

    /// Binary payload from hexadecimal, whitespace ignored
    pub fn from_hex(hex_text: &str) -> ProbeResult<Self> {
        let compact: String = hex_text.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(Payload::Binary(hex::decode(compact)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }
}
