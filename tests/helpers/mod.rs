#![allow(dead_code)]

pub mod test_utils {
    use std::collections::BTreeMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use sockprobe::{
        ClientHandle, ClientRegistry, Event, EventLog, Payload, PeerIdentity, Probe, ProbeConfig, ProbeResult,
        Protocol, Transport, TransportState,
    };
    use tokio::sync::broadcast::{self, error::TryRecvError};

    pub const WAIT: Duration = Duration::from_secs(5);

    /// Probe bound on loopback with ephemeral ports for the given protocols
    pub fn start_probe(protocols: &[Protocol]) -> (Probe, broadcast::Receiver<Event>) {
        let mut config = ProbeConfig::loopback();
        for protocol in Protocol::ALL {
            config.endpoint_mut(protocol).enabled = protocols.contains(&protocol);
        }
        let events = EventLog::silent();
        let rx = events.subscribe();
        let probe = Probe::start(&config, events).expect("probe should start");
        (probe, rx)
    }

    pub fn addr_of(probe: &Probe, protocol: Protocol) -> SocketAddr {
        probe.local_addr(protocol).expect("protocol should be bound")
    }

    /// Polls `condition` until it holds or `WAIT` elapses
    pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    /// Next event matching `predicate`, skipping others
    pub fn expect_event(rx: &mut broadcast::Receiver<Event>, mut predicate: impl FnMut(&Event) -> bool) -> Event {
        let deadline = Instant::now() + WAIT;
        loop {
            match rx.try_recv() {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) => {
                    assert!(Instant::now() < deadline, "timed out waiting for event");
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Closed) => panic!("event log closed"),
            }
        }
    }

    /// In-memory transport for façade and shell tests
    pub struct FakeTransport {
        protocol: Protocol,
        registry: ClientRegistry<()>,
        pub sent: Mutex<BTreeMap<ClientHandle, Vec<Payload>>>,
    }

    impl FakeTransport {
        pub fn new(protocol: Protocol) -> Arc<Self> {
            Arc::new(Self {
                protocol,
                registry: ClientRegistry::new(protocol),
                sent: Mutex::new(BTreeMap::new()),
            })
        }

        pub fn connect(&self, addr: &str) -> ClientHandle {
            let addr: SocketAddr = addr.parse().expect("valid address");
            self.registry.register(PeerIdentity::from_addr(addr), ())
        }

        pub fn disconnect(&self, handle: ClientHandle) {
            self.registry.close(handle);
        }

        pub fn sent_to(&self, handle: ClientHandle) -> Vec<Payload> {
            self.sent.lock().unwrap().get(&handle).cloned().unwrap_or_default()
        }
    }

    impl Transport for FakeTransport {
        fn protocol(&self) -> Protocol {
            self.protocol
        }

        fn send(&self, handle: ClientHandle, payload: &Payload) -> ProbeResult<()> {
            self.registry.live(handle)?;
            self.sent.lock().unwrap().entry(handle).or_default().push(payload.clone());
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
}
