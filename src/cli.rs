use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::core::config::ProbeConfig;
use crate::core::error::ProbeResult;
use crate::core::types::Protocol;

/// Dump messages from various protocols
#[derive(Debug, Parser)]
#[command(name = "sockprobe", version, about)]
pub struct Cli {
    /// JSON configuration file, overridden by the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Listening address for UDP (default "0.0.0.0")
    #[arg(long)]
    pub udp_addr: Option<IpAddr>,

    /// Listening port for UDP (default 1234)
    #[arg(long)]
    pub udp_port: Option<u16>,

    /// Do not listen on UDP
    #[arg(long)]
    pub no_udp: bool,

    /// Listening address for TCP (default "0.0.0.0")
    #[arg(long)]
    pub tcp_addr: Option<IpAddr>,

    /// Listening port for TCP (default 1234)
    #[arg(long)]
    pub tcp_port: Option<u16>,

    /// Do not listen on TCP
    #[arg(long)]
    pub no_tcp: bool,

    /// Listening address for WebSocket (default "0.0.0.0")
    #[arg(long)]
    pub ws_addr: Option<IpAddr>,

    /// Listening port for WebSocket (default 1235)
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Do not listen on WebSocket
    #[arg(long)]
    pub no_ws: bool,

    /// Prefix event lines with the local time
    #[arg(long)]
    pub timestamps: bool,

    /// Diagnostic log level when RUST_LOG is not set
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Builds the effective configuration: defaults, then the config file, then flags
    pub fn into_config(self) -> ProbeResult<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::load(path)?,
            None => ProbeConfig::default(),
        };

        let overrides = [
            (Protocol::Udp, self.udp_addr, self.udp_port, self.no_udp),
            (Protocol::Tcp, self.tcp_addr, self.tcp_port, self.no_tcp),
            (Protocol::Ws, self.ws_addr, self.ws_port, self.no_ws),
        ];
        for (protocol, addr, port, disabled) in overrides {
            let endpoint = config.endpoint_mut(protocol);
            if let Some(addr) = addr {
                endpoint.addr = addr;
            }
            if let Some(port) = port {
                endpoint.port = port;
            }
            if disabled {
                endpoint.enabled = false;
            }
        }

        if self.timestamps {
            config.timestamps = true;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        Ok(config)
    }
}
