//! WebSocket listener.
//!
//! warp serves the handshake on the listener's own runtime; every accepted
//! session is a task there. Sessions suspend only while waiting for the next
//! inbound message or for an outbound payload queued by the façade.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warp::filters::path::FullPath;
use warp::ws::{Message, WebSocket, Ws};
use warp::Filter;

use crate::core::error::{ProbeError, ProbeResult};
use crate::core::events::{Event, EventLog};
use crate::core::facade::Transport;
use crate::core::network::BoundListener;
use crate::core::registry::ClientRegistry;
use crate::core::types::{ClientHandle, Payload, PeerIdentity, Protocol, TransportState};

const PROTOCOL: Protocol = Protocol::Ws;

type Outbox = mpsc::UnboundedSender<Payload>;

/// Binds the WebSocket server inside `runtime`. The server stops when `cancel` fires.
pub fn bind(
    addr: SocketAddr,
    runtime: &Runtime,
    events: EventLog,
    cancel: CancellationToken,
) -> ProbeResult<BoundListener> {
    let registry = ClientRegistry::<Outbox>::new(PROTOCOL);
    let sessions = Sessions {
        registry: registry.clone(),
        events: events.clone(),
    };

    let route = warp::ws()
        .and(warp::addr::remote())
        .and(warp::path::full())
        .map(move |ws: Ws, remote: Option<SocketAddr>, path: FullPath| {
            let sessions = sessions.clone();
            let addr = remote.unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0));
            let identity = PeerIdentity::with_path(addr, path.as_str());
            ws.on_upgrade(move |socket| sessions.run(socket, identity))
        });

    // hyper needs the runtime context to register the listening socket
    let _guard = runtime.enter();
    let (local_addr, server) = warp::serve(route)
        .try_bind_with_graceful_shutdown(addr, async move { cancel.cancelled().await })
        .map_err(|e| ProbeError::Bind {
            protocol: PROTOCOL,
            addr,
            source: std::io::Error::other(e),
        })?;

    let stopped = registry.clone();
    Ok(BoundListener {
        transport: Arc::new(MessageTransport { registry, events }),
        local_addr,
        task: server
            .map(move |()| {
                let closed = stopped.close_all();
                debug!(closed, "websocket sessions closed on stop");
                Ok(())
            })
            .boxed(),
    })
}

#[derive(Clone)]
struct Sessions {
    registry: ClientRegistry<Outbox>,
    events: EventLog,
}

impl Sessions {
    async fn run(self, socket: WebSocket, identity: PeerIdentity) {
        let (outbox, mut queued) = mpsc::unbounded_channel::<Payload>();
        let handle = self.registry.register(identity.clone(), outbox);
        self.events.emit(Event::opened(PROTOCOL, handle, identity));

        let (mut sink, mut inbound) = socket.split();
        let closing = loop {
            tokio::select! {
                message = inbound.next() => match message {
                    Some(Ok(message)) if message.is_close() => break Event::ended(PROTOCOL, handle),
                    Some(Ok(message)) if message.is_text() || message.is_binary() => {
                        self.events.emit(Event::received(PROTOCOL, handle, message.as_bytes()));
                    }
                    // ping/pong are answered by the protocol layer
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(handle, error = %e, "websocket receive failed");
                        break Event::cut(PROTOCOL, handle);
                    }
                    None => break Event::ended(PROTOCOL, handle),
                },
                Some(payload) = queued.recv() => {
                    let message = match payload {
                        Payload::Text(text) => Message::text(text),
                        Payload::Binary(bytes) => Message::binary(bytes),
                    };
                    if let Err(e) = sink.send(message).await {
                        warn!(handle, error = %e, "websocket send failed");
                        break Event::cut(PROTOCOL, handle);
                    }
                }
            }
        };

        if self.registry.close(handle).is_some() {
            self.events.emit(closing);
        }
        // Flushes the close reply queued for the peer, if any
        if let Err(e) = sink.close().await {
            debug!(handle, error = %e, "websocket close failed");
        }
    }
}

/// Façade side of the WebSocket listener
pub struct MessageTransport {
    registry: ClientRegistry<Outbox>,
    events: EventLog,
}

impl Transport for MessageTransport {
    fn protocol(&self) -> Protocol {
        PROTOCOL
    }

    /// Queues the payload on the session's task; the caller never touches the socket
    fn send(&self, handle: ClientHandle, payload: &Payload) -> ProbeResult<()> {
        let outbox = self.registry.live(handle)?;
        outbox
            .send(payload.clone())
            .map_err(|_| ProbeError::ClosedConnection { protocol: PROTOCOL, handle })?;
        self.events.emit(Event::sent(PROTOCOL, handle, payload.as_bytes()));
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
