use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{ProbeError, ProbeResult};
use crate::core::types::Protocol;

pub const DEFAULT_UDP_PORT: u16 = 1234;
pub const DEFAULT_TCP_PORT: u16 = 1234;
pub const DEFAULT_WS_PORT: u16 = 1235;

/// Where one listener binds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointConfig {
    pub enabled: bool,
    pub addr: IpAddr,
    pub port: u16,
}

impl EndpointConfig {
    pub fn new(port: u16) -> Self {
        Self {
            enabled: true,
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

/// Endpoint as written in a config file. Absent fields keep the value the
/// protocol's default endpoint already has.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EndpointFile {
    enabled: Option<bool>,
    addr: Option<IpAddr>,
    port: Option<u16>,
}

impl EndpointFile {
    fn apply(self, base: &mut EndpointConfig) {
        if let Some(enabled) = self.enabled {
            base.enabled = enabled;
        }
        if let Some(addr) = self.addr {
            base.addr = addr;
        }
        if let Some(port) = self.port {
            base.port = port;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeFile {
    udp: EndpointFile,
    tcp: EndpointFile,
    ws: EndpointFile,
    timestamps: Option<bool>,
    log_level: Option<String>,
}

impl From<ProbeFile> for ProbeConfig {
    fn from(file: ProbeFile) -> Self {
        let mut config = ProbeConfig::default();
        file.udp.apply(&mut config.udp);
        file.tcp.apply(&mut config.tcp);
        file.ws.apply(&mut config.ws);
        if let Some(timestamps) = file.timestamps {
            config.timestamps = timestamps;
        }
        if let Some(log_level) = file.log_level {
            config.log_level = log_level;
        }
        config
    }
}

/// Probe settings: defaults, then an optional JSON file, then command-line flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProbeFile")]
pub struct ProbeConfig {
    pub udp: EndpointConfig,
    pub tcp: EndpointConfig,
    pub ws: EndpointConfig,
    pub timestamps: bool,
    pub log_level: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            udp: EndpointConfig::new(DEFAULT_UDP_PORT),
            tcp: EndpointConfig::new(DEFAULT_TCP_PORT),
            ws: EndpointConfig::new(DEFAULT_WS_PORT),
            timestamps: false,
            log_level: "warn".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn from_json(text: &str) -> ProbeResult<Self> {
        serde_json::from_str(text).map_err(|e| ProbeError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ProbeResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ProbeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Every listener on 127.0.0.1 with an ephemeral port
    pub fn loopback() -> Self {
        let local = || EndpointConfig {
            enabled: true,
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        };
        Self {
            udp: local(),
            tcp: local(),
            ws: local(),
            ..Self::default()
        }
    }

    pub fn endpoint(&self, protocol: Protocol) -> &EndpointConfig {
        match protocol {
            Protocol::Udp => &self.udp,
            Protocol::Tcp => &self.tcp,
            Protocol::Ws => &self.ws,
        }
    }

    pub fn endpoint_mut(&mut self, protocol: Protocol) -> &mut EndpointConfig {
        match protocol {
            Protocol::Udp => &mut self.udp,
            Protocol::Tcp => &mut self.tcp,
            Protocol::Ws => &mut self.ws,
        }
    }

    /// Endpoints to bind. The WebSocket one only exists when built with `websocket`.
    pub fn enabled_endpoints(&self) -> Vec<(Protocol, SocketAddr)> {
        Protocol::ALL
            .into_iter()
            .filter(|protocol| *protocol != Protocol::Ws || cfg!(feature = "websocket"))
            .filter(|protocol| self.endpoint(*protocol).enabled)
            .map(|protocol| (protocol, self.endpoint(protocol).socket_addr()))
            .collect()
    }
}
