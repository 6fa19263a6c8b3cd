//! Event log: every connection change and payload, one line each

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::core::types::{ClientHandle, PeerIdentity, Protocol};
use crate::utils::{render_payload, timestamp};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// New peer observed, slot created
    Opened(PeerIdentity),
    /// Payload received from the peer
    Received(Vec<u8>),
    /// Payload written to the peer by the operator
    Sent(Vec<u8>),
    /// Connection reported in error, slot closed
    Cut,
    /// Orderly shutdown by the peer, slot closed
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub protocol: Protocol,
    pub handle: ClientHandle,
    pub kind: EventKind,
}

impl Event {
    pub fn opened(protocol: Protocol, handle: ClientHandle, identity: PeerIdentity) -> Self {
        Self { protocol, handle, kind: EventKind::Opened(identity) }
    }

    pub fn received(protocol: Protocol, handle: ClientHandle, payload: &[u8]) -> Self {
        Self { protocol, handle, kind: EventKind::Received(payload.to_vec()) }
    }

    pub fn sent(protocol: Protocol, handle: ClientHandle, payload: &[u8]) -> Self {
        Self { protocol, handle, kind: EventKind::Sent(payload.to_vec()) }
    }

    pub fn cut(protocol: Protocol, handle: ClientHandle) -> Self {
        Self { protocol, handle, kind: EventKind::Cut }
    }

    pub fn ended(protocol: Protocol, handle: ClientHandle) -> Self {
        Self { protocol, handle, kind: EventKind::Ended }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocol = self.protocol;
        let noun = protocol.peer_noun();
        let handle = self.handle;
        match &self.kind {
            EventKind::Opened(identity) => {
                write!(f, "< new {} {} #{}: {}", protocol, noun, handle, identity)
            }
            EventKind::Received(payload) => {
                let what = match protocol {
                    Protocol::Udp => "datagram from",
                    Protocol::Tcp => "payload on",
                    Protocol::Ws => "message on",
                };
                write!(f, "< received {} {} {} #{}: {}", what, protocol, noun, handle, render_payload(payload))
            }
            EventKind::Sent(payload) => {
                let what = match protocol {
                    Protocol::Udp => "datagram",
                    Protocol::Tcp => "payload",
                    Protocol::Ws => "message",
                };
                write!(f, "> sent {} to {} {} #{}: {}", what, protocol, noun, handle, render_payload(payload))
            }
            EventKind::Cut => write!(f, "< {} {} #{} cut", protocol, noun, handle),
            EventKind::Ended => write!(f, "< end of {} {} #{}", protocol, noun, handle),
        }
    }
}

struct EventLogInner {
    tx: broadcast::Sender<Event>,
    echo: bool,
    timestamps: bool,
}

/// Sink for listener events.
///
/// Each event is printed to stdout (unless silent) and broadcast to subscribers.
/// Cheap to clone; all clones feed the same subscribers.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

impl EventLog {
    pub fn new(timestamps: bool) -> Self {
        Self::build(true, timestamps)
    }

    /// Event log that only broadcasts, for embedding and tests
    pub fn silent() -> Self {
        Self::build(false, false)
    }

    fn build(echo: bool, timestamps: bool) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(EventLogInner { tx, echo, timestamps }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.tx.subscribe()
    }

    pub fn emit(&self, event: Event) {
        trace!(protocol = %event.protocol, handle = event.handle, "{}", event);
        if self.inner.echo {
            if self.inner.timestamps {
                println!("{} {}", timestamp(), event);
            } else {
                println!("{}", event);
            }
        }
        // No subscriber is fine
        let _ = self.inner.tx.send(event);
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("echo", &self.inner.echo)
            .field("timestamps", &self.inner.timestamps)
            .field("subscribers", &self.inner.tx.receiver_count())
            .finish()
    }
}
