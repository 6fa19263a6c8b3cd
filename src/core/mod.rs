pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod network;
pub mod registry;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::core::config::ProbeConfig;
use crate::core::error::ProbeResult;
use crate::core::events::EventLog;
use crate::core::facade::ProtocolFacade;
use crate::core::network::ListenerManager;
use crate::core::types::Protocol;

/// Running probe: the listeners plus the façade the shell talks to
pub struct Probe {
    facade: Arc<ProtocolFacade>,
    manager: ListenerManager,
    events: EventLog,
}

impl Probe {
    /// Binds every enabled endpoint, then starts the listener threads.
    /// Nothing is spawned if any bind fails.
    pub fn start(config: &ProbeConfig, events: EventLog) -> ProbeResult<Self> {
        let mut manager = ListenerManager::new(events.clone());
        let mut facade = ProtocolFacade::new();

        for (protocol, addr) in config.enabled_endpoints() {
            facade.register(manager.bind(protocol, addr)?);
        }
        manager.spawn_all()?;

        info!(protocols = ?facade, "probe started");
        Ok(Self {
            facade: Arc::new(facade),
            manager,
            events,
        })
    }

    pub fn facade(&self) -> Arc<ProtocolFacade> {
        Arc::clone(&self.facade)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Bound address, useful when the configured port was 0
    pub fn local_addr(&self, protocol: Protocol) -> Option<SocketAddr> {
        self.manager.local_addr(protocol)
    }

    /// Stops every listener loop and waits for their threads
    pub fn shutdown(mut self) {
        info!("probe shutting down");
        self.manager.shutdown();
        self.manager.join();
    }
}

