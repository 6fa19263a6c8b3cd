use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::core::types::{ClientHandle, Protocol};

/// Errors surfaced by the probe. The Display text is what the shell prints after `X `.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unknown protocol {0}")]
    UnknownProtocol(String),

    #[error("try to write on unknown {protocol} {noun} #{handle}", noun = .protocol.peer_noun())]
    UnknownClient {
        protocol: Protocol,
        handle: ClientHandle,
    },

    #[error("try to write on closed {protocol} connection #{handle}")]
    ClosedConnection {
        protocol: Protocol,
        handle: ClientHandle,
    },

    #[error("{protocol} transport error: {source}")]
    Transport {
        protocol: Protocol,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {protocol} listener on {addr}: {source}")]
    Bind {
        protocol: Protocol,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProbeError {
    pub fn transport(protocol: Protocol, source: io::Error) -> Self {
        ProbeError::Transport { protocol, source }
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
