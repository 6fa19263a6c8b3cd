//! Stream listener: single-threaded readiness loop over the listening socket
//! and every live connection.

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::io::{Interest, Ready};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::error::{ProbeError, ProbeResult};
use crate::core::events::{Event, EventLog};
use crate::core::facade::Transport;
use crate::core::network::BoundListener;
use crate::core::registry::ClientRegistry;
use crate::core::types::{ClientHandle, Payload, PeerIdentity, Protocol, TransportState, MAX_PAYLOAD_SIZE};

const PROTOCOL: Protocol = Protocol::Tcp;

/// Binds and listens inside `runtime`
pub fn bind(
    addr: SocketAddr,
    runtime: &Runtime,
    events: EventLog,
    cancel: CancellationToken,
) -> ProbeResult<BoundListener> {
    let listener = runtime
        .block_on(TcpListener::bind(addr))
        .map_err(|source| ProbeError::Bind { protocol: PROTOCOL, addr, source })?;
    let local_addr = listener.local_addr()?;
    let registry = ClientRegistry::<Arc<TcpStream>>::new(PROTOCOL);

    let dispatch = StreamListener {
        listener,
        registry: registry.clone(),
        events: events.clone(),
    };
    let transport = StreamTransport {
        registry,
        events,
        runtime: runtime.handle().clone(),
    };

    Ok(BoundListener {
        transport: Arc::new(transport),
        local_addr,
        task: dispatch.run(cancel).boxed(),
    })
}

/// Sockets found ready by one wait, split the way they are processed
#[derive(Default)]
struct ReadySet {
    errored: Vec<ClientHandle>,
    accepted: Option<io::Result<(TcpStream, SocketAddr)>>,
    readable: Vec<ClientHandle>,
}

impl ReadySet {
    fn record(&mut self, handle: ClientHandle, readiness: io::Result<Ready>) {
        match readiness {
            Ok(ready) if ready.is_error() => self.errored.push(handle),
            Ok(ready) if ready.is_readable() || ready.is_read_closed() => self.readable.push(handle),
            Ok(_) => {}
            Err(_) => self.errored.push(handle),
        }
    }
}

/// Readiness loop, owned by the TCP thread. All registry mutation for TCP
/// happens here, one iteration at a time.
pub struct StreamListener {
    listener: TcpListener,
    registry: ClientRegistry<Arc<TcpStream>>,
    events: EventLog,
}

impl StreamListener {
    pub async fn run(self, cancel: CancellationToken) -> ProbeResult<()> {
        let mut live: BTreeMap<ClientHandle, Arc<TcpStream>> = BTreeMap::new();
        let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];

        loop {
            let ready = tokio::select! {
                _ = cancel.cancelled() => {
                    self.stop();
                    return Ok(());
                }
                ready = self.wait_ready(&live) => ready,
            };

            // Error set first: a socket both erroring and readable is retired unread
            for handle in &ready.errored {
                if live.remove(handle).is_some() {
                    self.retire(*handle, Event::cut(PROTOCOL, *handle));
                }
            }

            match ready.accepted {
                Some(Ok((stream, addr))) => {
                    let stream = Arc::new(stream);
                    let identity = PeerIdentity::from_addr(addr);
                    let handle = self.registry.register(identity.clone(), Arc::clone(&stream));
                    live.insert(handle, stream);
                    self.events.emit(Event::opened(PROTOCOL, handle, identity));
                }
                Some(Err(e)) => {
                    error!(error = %e, "tcp accept failed");
                    self.stop();
                    return Err(ProbeError::transport(PROTOCOL, e));
                }
                None => {}
            }

            for handle in ready.readable {
                let Some(stream) = live.get(&handle) else {
                    continue;
                };
                match stream.try_read(&mut buf) {
                    Ok(0) => {
                        live.remove(&handle);
                        self.retire(handle, Event::ended(PROTOCOL, handle));
                    }
                    Ok(len) => {
                        debug!(handle, len, "tcp payload received");
                        self.events.emit(Event::received(PROTOCOL, handle, &buf[..len]));
                    }
                    // Spurious wakeup, readiness was cleared
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        warn!(handle, error = %e, "tcp read failed");
                        live.remove(&handle);
                        self.retire(handle, Event::cut(PROTOCOL, handle));
                    }
                }
            }
        }
    }

    /// Blocks until the listening socket or a live connection is ready, then
    /// collects everything else that is already ready without blocking again.
    async fn wait_ready(&self, live: &BTreeMap<ClientHandle, Arc<TcpStream>>) -> ReadySet {
        let mut watchers: FuturesUnordered<_> = live
            .iter()
            .map(|(&handle, stream)| {
                let stream = Arc::clone(stream);
                async move {
                    let readiness = stream.ready(Interest::READABLE | Interest::ERROR).await;
                    (handle, readiness)
                }
            })
            .collect();

        let mut ready = ReadySet::default();
        tokio::select! {
            accepted = self.listener.accept() => ready.accepted = Some(accepted),
            Some((handle, readiness)) = watchers.next(), if !watchers.is_empty() => {
                ready.record(handle, readiness);
            }
        }

        while let Some(Some((handle, readiness))) = watchers.next().now_or_never() {
            ready.record(handle, readiness);
        }
        if ready.accepted.is_none() {
            ready.accepted = self.listener.accept().now_or_never();
        }
        ready
    }

    // Nothing serves the sockets once the loop returns
    fn stop(&self) {
        let closed = self.registry.close_all();
        debug!(closed, "tcp connections closed on stop");
    }

    /// Closes the registry slot and logs why. The socket itself is dropped with
    /// its last reference.
    fn retire(&self, handle: ClientHandle, event: Event) {
        if self.registry.close(handle).is_some() {
            self.events.emit(event);
        }
    }
}

/// Façade side of the stream listener
pub struct StreamTransport {
    registry: ClientRegistry<Arc<TcpStream>>,
    events: EventLog,
    runtime: Handle,
}

impl Transport for StreamTransport {
    fn protocol(&self) -> Protocol {
        PROTOCOL
    }

    /// Synchronous write; blocks the caller until every byte is handed to the kernel
    fn send(&self, handle: ClientHandle, payload: &Payload) -> ProbeResult<()> {
        let stream = self.registry.live(handle)?;
        let bytes = payload.as_bytes();
        self.runtime
            .block_on(write_all(&stream, bytes))
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

// Writes through a shared stream; the read half stays with the dispatch loop.
async fn write_all(stream: &TcpStream, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        stream.writable().await?;
        match stream.try_write(bytes) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(written) => bytes = &bytes[written..],
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
