use std::net::SocketAddr;

use sockprobe::{Event, EventLog, Payload, PeerIdentity, ProbeError, Protocol};
use tokio_test::{assert_err, assert_ok};

fn identity() -> PeerIdentity {
    PeerIdentity::from_addr("10.1.2.3:4567".parse::<SocketAddr>().unwrap())
}

#[test]
fn test_event_lines_per_protocol() {
    assert_eq!(
        Event::opened(Protocol::Udp, 0, identity()).to_string(),
        "< new UDP session #0: 10.1.2.3:4567"
    );
    assert_eq!(
        Event::received(Protocol::Udp, 2, b"abc").to_string(),
        "< received datagram from UDP session #2: abc"
    );
    assert_eq!(
        Event::sent(Protocol::Udp, 2, b"abc\n").to_string(),
        "> sent datagram to UDP session #2: abc\\n"
    );
    assert_eq!(
        Event::opened(Protocol::Tcp, 1, identity()).to_string(),
        "< new TCP connection #1: 10.1.2.3:4567"
    );
    assert_eq!(Event::cut(Protocol::Tcp, 1).to_string(), "< TCP connection #1 cut");
    assert_eq!(Event::ended(Protocol::Tcp, 1).to_string(), "< end of TCP connection #1");

    let ws_peer = PeerIdentity::with_path("10.1.2.3:4567".parse().unwrap(), "/socket");
    assert_eq!(
        Event::opened(Protocol::Ws, 0, ws_peer).to_string(),
        "< new WebSocket connection #0: 10.1.2.3:4567:/socket"
    );
    assert_eq!(
        Event::received(Protocol::Ws, 0, b"hi").to_string(),
        "< received message on WebSocket connection #0: hi"
    );
}

#[test]
fn test_binary_payloads_are_escaped() {
    let line = Event::received(Protocol::Tcp, 0, &[0x00, b'A', 0xff, b'\r']).to_string();
    assert_eq!(line, "< received payload on TCP connection #0: \\x00A\\xff\\r");
}

#[test]
fn test_event_log_broadcasts_to_every_subscriber() {
    let log = EventLog::silent();
    let mut first = log.subscribe();
    let mut second = log.clone().subscribe();

    log.emit(Event::ended(Protocol::Ws, 4));
    assert_eq!(assert_ok!(first.try_recv()), Event::ended(Protocol::Ws, 4));
    assert_eq!(assert_ok!(second.try_recv()), Event::ended(Protocol::Ws, 4));

    // Emitting with no subscribers left is not an error
    drop(first);
    drop(second);
    log.emit(Event::cut(Protocol::Ws, 4));
}

#[test]
fn test_protocol_names() {
    assert_eq!(assert_ok!("udp".parse::<Protocol>()), Protocol::Udp);
    assert_eq!(assert_ok!("ws".parse::<Protocol>()), Protocol::Ws);
    match assert_err!("UDP".parse::<Protocol>()) {
        ProbeError::UnknownProtocol(name) => assert_eq!(name, "UDP"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_payload_builders() {
    assert_eq!(Payload::line("a b").as_bytes(), b"a b\n");
    assert!(Payload::line("x").is_text());
    assert_eq!(assert_ok!(Payload::from_hex(" 68 65\t6c6c 6f ")).as_bytes(), b"hello");
    assert_err!(Payload::from_hex("abc"));
    assert_eq!(assert_ok!(Payload::from_hex("")), Payload::Binary(Vec::new()));
}
