use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::error::{ProbeError, ProbeResult};
use crate::core::types::{ClientHandle, PeerIdentity, Protocol, TransportState};

/// Description returned for slots whose connection has been torn down
pub const CLOSED_DESCRIPTION: &str = "closed connection";

// State and live handle live in one enum so they can never disagree.
#[derive(Debug, Clone)]
enum Link<H> {
    Open(H),
    Closed,
}

#[derive(Debug, Clone)]
struct ClientRecord<H> {
    identity: PeerIdentity,
    link: Link<H>,
}

/// Point-in-time view of one registry slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub handle: ClientHandle,
    pub identity: PeerIdentity,
    pub state: TransportState,
}

impl ClientSnapshot {
    pub fn description(&self) -> String {
        match self.state {
            TransportState::Open => self.identity.to_string(),
            TransportState::Closed => CLOSED_DESCRIPTION.to_string(),
        }
    }
}

/// Append-only table of the peers seen on one protocol.
///
/// Slot indexes are the client handles. Slots are never removed, only marked
/// closed, so a handle keeps naming the same peer for the life of the process.
/// Clones share the same table: the listener loop mutates it, the façade reads it.
#[derive(Debug)]
pub struct ClientRegistry<H> {
    protocol: Protocol,
    records: Arc<RwLock<Vec<ClientRecord<H>>>>,
}

impl<H> Clone for ClientRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            protocol: self.protocol,
            records: Arc::clone(&self.records),
        }
    }
}

impl<H: Clone> ClientRegistry<H> {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Appends an open slot and returns its handle
    pub fn register(&self, identity: PeerIdentity, live: H) -> ClientHandle {
        let mut records = self.write();
        records.push(ClientRecord {
            identity,
            link: Link::Open(live),
        });
        records.len() - 1
    }

    /// Marks a slot closed and hands back its live handle.
    /// Returns `None` if the slot was already closed or does not exist.
    pub fn close(&self, handle: ClientHandle) -> Option<H> {
        let mut records = self.write();
        let record = records.get_mut(handle)?;
        match std::mem::replace(&mut record.link, Link::Closed) {
            Link::Open(live) => Some(live),
            Link::Closed => None,
        }
    }

    /// Closes every slot still open, once the loop serving them has stopped.
    /// Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for record in self.write().iter_mut() {
            if matches!(record.link, Link::Open(_)) {
                record.link = Link::Closed;
                closed += 1;
            }
        }
        closed
    }

    /// Live handle of an open slot
    pub fn live(&self, handle: ClientHandle) -> ProbeResult<H> {
        let records = self.read();
        let record = records.get(handle).ok_or(ProbeError::UnknownClient {
            protocol: self.protocol,
            handle,
        })?;
        match &record.link {
            Link::Open(live) => Ok(live.clone()),
            Link::Closed => Err(ProbeError::ClosedConnection {
                protocol: self.protocol,
                handle,
            }),
        }
    }

    pub fn state(&self, handle: ClientHandle) -> ProbeResult<TransportState> {
        self.snapshot_of(handle).map(|snapshot| snapshot.state)
    }

    pub fn identity(&self, handle: ClientHandle) -> ProbeResult<PeerIdentity> {
        self.snapshot_of(handle).map(|snapshot| snapshot.identity)
    }

    /// Human-readable peer description, or the closed sentinel
    pub fn describe(&self, handle: ClientHandle) -> ProbeResult<String> {
        self.snapshot_of(handle).map(|snapshot| snapshot.description())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every slot in handle order, taken under a single lock
    pub fn snapshot(&self) -> Vec<ClientSnapshot> {
        self.read()
            .iter()
            .enumerate()
            .map(|(handle, record)| Self::snapshot_record(handle, record))
            .collect()
    }

    fn snapshot_of(&self, handle: ClientHandle) -> ProbeResult<ClientSnapshot> {
        let records = self.read();
        records
            .get(handle)
            .map(|record| Self::snapshot_record(handle, record))
            .ok_or(ProbeError::UnknownClient {
                protocol: self.protocol,
                handle,
            })
    }

    fn snapshot_record(handle: ClientHandle, record: &ClientRecord<H>) -> ClientSnapshot {
        ClientSnapshot {
            handle,
            identity: record.identity.clone(),
            state: match record.link {
                Link::Open(_) => TransportState::Open,
                Link::Closed => TransportState::Closed,
            },
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ClientRecord<H>>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ClientRecord<H>>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}
