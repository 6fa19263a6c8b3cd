use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use futures::future::BoxFuture;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::core::error::ProbeResult;
use crate::core::events::EventLog;
use crate::core::facade::Transport;
use crate::core::types::Protocol;
use crate::listeners;

/// Dispatch loop of a bound listener, run to completion on the listener's thread
pub type ListenerTask = BoxFuture<'static, ProbeResult<()>>;

/// A listener whose socket is bound but whose loop has not started yet
pub struct BoundListener {
    pub transport: Arc<dyn Transport>,
    pub local_addr: SocketAddr,
    pub task: ListenerTask,
}

struct PendingListener {
    protocol: Protocol,
    runtime: Runtime,
    task: ListenerTask,
}

/// Owns the listeners: binds them all first, then gives each one its own
/// thread and current-thread runtime. Threads are detached; the process may
/// exit without joining them.
pub struct ListenerManager {
    events: EventLog,
    cancel: CancellationToken,
    pending: Vec<PendingListener>,
    local_addrs: BTreeMap<Protocol, SocketAddr>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl ListenerManager {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            cancel: CancellationToken::new(),
            pending: Vec::new(),
            local_addrs: BTreeMap::new(),
            threads: Vec::new(),
        }
    }

    /// Binds the socket for `protocol` inside a fresh runtime. The loop does not
    /// run until `spawn_all`.
    pub fn bind(&mut self, protocol: Protocol, addr: SocketAddr) -> ProbeResult<Arc<dyn Transport>> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name(format!("{}-listener", protocol.name()))
            .build()?;
        let cancel = self.cancel.child_token();
        let events = self.events.clone();

        let bound = match protocol {
            Protocol::Udp => listeners::udp::bind(addr, &runtime, events, cancel)?,
            Protocol::Tcp => listeners::tcp::bind(addr, &runtime, events, cancel)?,
            #[cfg(feature = "websocket")]
            Protocol::Ws => listeners::ws::bind(addr, &runtime, events, cancel)?,
            #[cfg(not(feature = "websocket"))]
            Protocol::Ws => {
                return Err(crate::core::error::ProbeError::UnknownProtocol(
                    protocol.name().to_string(),
                ))
            }
        };

        info!(%protocol, addr = %bound.local_addr, "listener bound");
        self.local_addrs.insert(protocol, bound.local_addr);
        self.pending.push(PendingListener {
            protocol,
            runtime,
            task: bound.task,
        });
        Ok(bound.transport)
    }

    /// Starts one thread per bound listener
    pub fn spawn_all(&mut self) -> ProbeResult<()> {
        for PendingListener { protocol, runtime, task } in self.pending.drain(..) {
            let handle = thread::Builder::new()
                .name(format!("{}-listener", protocol.name()))
                .spawn(move || match runtime.block_on(task) {
                    Ok(()) => info!(%protocol, "listener stopped"),
                    Err(e) => error!(%protocol, error = %e, "listener failed"),
                })?;
            self.threads.push(handle);
        }
        Ok(())
    }

    pub fn local_addr(&self, protocol: Protocol) -> Option<SocketAddr> {
        self.local_addrs.get(&protocol).copied()
    }

    /// Asks every loop to stop
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Waits for every listener thread to finish. Only returns after `shutdown`
    /// or after each loop has failed.
    pub fn join(&mut self) {
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("listener thread panicked");
            }
        }
    }
}
