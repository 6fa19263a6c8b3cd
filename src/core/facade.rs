use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::error::{ProbeError, ProbeResult};
use crate::core::types::{ClientHandle, Payload, Protocol, TransportState};

/// What the façade needs from a listener, whatever its transport.
///
/// Implementations must be callable from a thread other than the listener's own.
pub trait Transport: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Writes `payload` to the client. Fails with `UnknownClient` or
    /// `ClosedConnection` before touching the socket.
    fn send(&self, handle: ClientHandle, payload: &Payload) -> ProbeResult<()>;

    /// Peer description, or the closed sentinel for torn-down slots
    fn describe(&self, handle: ClientHandle) -> ProbeResult<String>;

    fn status(&self, handle: ClientHandle) -> ProbeResult<TransportState>;

    /// Descriptions of every slot in handle order
    fn list(&self) -> Vec<String>;

    fn client_count(&self) -> usize;
}

/// Routes operator calls to the listener of the named protocol
#[derive(Default, Clone)]
pub struct ProtocolFacade {
    transports: BTreeMap<Protocol, Arc<dyn Transport>>,
}

impl ProtocolFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transport, replacing any previous one for the same protocol
    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        self.transports.insert(transport.protocol(), transport);
    }

    /// Handled protocols in stable order
    pub fn protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        self.transports.keys().copied()
    }

    pub fn handles(&self, name: &str) -> bool {
        self.transport(name).is_ok()
    }

    pub fn transport(&self, name: &str) -> ProbeResult<&Arc<dyn Transport>> {
        name.parse::<Protocol>()
            .ok()
            .and_then(|protocol| self.transports.get(&protocol))
            .ok_or_else(|| ProbeError::UnknownProtocol(name.to_string()))
    }

    pub fn send(&self, name: &str, handle: ClientHandle, payload: &Payload) -> ProbeResult<()> {
        self.transport(name)?.send(handle, payload)
    }

    pub fn describe(&self, name: &str, handle: ClientHandle) -> ProbeResult<String> {
        self.transport(name)?.describe(handle)
    }

    pub fn status(&self, name: &str, handle: ClientHandle) -> ProbeResult<TransportState> {
        self.transport(name)?.status(handle)
    }

    pub fn list(&self, name: &str) -> ProbeResult<Vec<String>> {
        Ok(self.transport(name)?.list())
    }
}

impl std::fmt::Debug for ProtocolFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.transports.keys()).finish()
    }
}
