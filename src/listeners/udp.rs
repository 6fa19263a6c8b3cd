//! Datagram listener: one bound UDP socket, peers identified by source address

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::FutureExt;
use tokio::net::UdpSocket;
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::error::{ProbeError, ProbeResult};
use crate::core::events::{Event, EventLog};
use crate::core::facade::Transport;
use crate::core::network::BoundListener;
use crate::core::registry::ClientRegistry;
use crate::core::types::{ClientHandle, Payload, PeerIdentity, Protocol, TransportState, MAX_PAYLOAD_SIZE};

const PROTOCOL: Protocol = Protocol::Udp;

/// Binds the datagram socket inside `runtime`
pub fn bind(
    addr: SocketAddr,
    runtime: &Runtime,
    events: EventLog,
    cancel: CancellationToken,
) -> ProbeResult<BoundListener> {
    let socket = runtime
        .block_on(UdpSocket::bind(addr))
        .map_err(|source| ProbeError::Bind { protocol: PROTOCOL, addr, source })?;
    let local_addr = socket.local_addr()?;
    let socket = Arc::new(socket);
    // Peers never close, so the live handle is simply where to send
    let registry = ClientRegistry::<SocketAddr>::new(PROTOCOL);

    let listener = DatagramListener {
        socket: Arc::clone(&socket),
        registry: registry.clone(),
        events: events.clone(),
    };
    let transport = DatagramTransport {
        socket,
        registry,
        events,
        runtime: runtime.handle().clone(),
    };

    Ok(BoundListener {
        transport: Arc::new(transport),
        local_addr,
        task: listener.run(cancel).boxed(),
    })
}

/// Receive loop, owned by the UDP thread
pub struct DatagramListener {
    socket: Arc<UdpSocket>,
    registry: ClientRegistry<SocketAddr>,
    events: EventLog,
}

impl DatagramListener {
    pub async fn run(self, cancel: CancellationToken) -> ProbeResult<()> {
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let mut sessions: HashMap<SocketAddr, ClientHandle> = HashMap::new();

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    let closed = self.registry.close_all();
                    debug!(closed, "udp sessions closed on stop");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => received,
            };
            let (len, addr) = match received {
                Ok(received) => received,
                Err(e) => {
                    // e.g. ICMP port unreachable reported after a send; the socket is still usable
                    warn!(error = %e, "udp receive failed");
                    continue;
                }
            };

            let handle = *sessions.entry(addr).or_insert_with(|| {
                let identity = PeerIdentity::from_addr(addr);
                let handle = self.registry.register(identity.clone(), addr);
                self.events.emit(Event::opened(PROTOCOL, handle, identity));
                handle
            });
            debug!(handle, len, "datagram received");
            self.events.emit(Event::received(PROTOCOL, handle, &buf[..len]));
        }
    }
}

/// Façade side of the datagram listener
pub struct DatagramTransport {
    socket: Arc<UdpSocket>,
    registry: ClientRegistry<SocketAddr>,
    events: EventLog,
    runtime: Handle,
}

impl Transport for DatagramTransport {
    fn protocol(&self) -> Protocol {
        PROTOCOL
    }

    fn send(&self, handle: ClientHandle, payload: &Payload) -> ProbeResult<()> {
        let addr = self.registry.live(handle)?;
        let bytes = payload.as_bytes();
        // Single best-effort send, never retried
        self.runtime
            .block_on(self.socket.send_to(bytes, addr))
            .map_err(|source| ProbeError::transport(PROTOCOL, source))?;
        self.events.emit(Event::sent(PROTOCOL, handle, bytes));
        Ok(())
    }

    fn describe(&self, handle: ClientHandle) -> ProbeResult<String> {
        self.registry.describe(handle)
    }

    fn status(&self, handle: ClientHandle) -> ProbeResult<TransportState> {
        self.registry.state(handle)
    }

    fn list(&self) -> Vec<String> {
        self.registry.snapshot().iter().map(|client| client.description()).collect()
    }

    fn client_count(&self) -> usize {
        self.registry.len()
    }
}
