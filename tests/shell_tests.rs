mod helpers;

use std::io::Cursor;
use std::sync::Arc;

use helpers::test_utils::FakeTransport;
use sockprobe::{Payload, ProbeError, ProtocolFacade, Protocol, Shell, TransportState};
use tokio_test::{assert_err, assert_ok};

struct Fixture {
    udp: Arc<FakeTransport>,
    tcp: Arc<FakeTransport>,
    shell: Shell,
    facade: Arc<ProtocolFacade>,
}

fn fixture() -> Fixture {
    let udp = FakeTransport::new(Protocol::Udp);
    let tcp = FakeTransport::new(Protocol::Tcp);
    let mut facade = ProtocolFacade::new();
    facade.register(udp.clone());
    facade.register(tcp.clone());
    let facade = Arc::new(facade);
    Fixture {
        udp,
        tcp,
        shell: Shell::new(Arc::clone(&facade)),
        facade,
    }
}

fn run(shell: &Shell, line: &str) -> String {
    let mut out = Vec::new();
    shell.execute(line, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_facade_routes_by_protocol_name() {
    let f = fixture();
    f.tcp.connect("10.0.0.5:7000");

    assert_ok!(f.facade.send("tcp", 0, &Payload::line("hi")));
    assert_eq!(f.tcp.sent_to(0), vec![Payload::Text("hi\n".into())]);
    assert!(f.udp.sent_to(0).is_empty());

    match assert_err!(f.facade.send("sctp", 0, &Payload::line("hi"))) {
        ProbeError::UnknownProtocol(name) => assert_eq!(name, "sctp"),
        other => panic!("unexpected error: {other}"),
    }
    // Known name, but not registered here
    assert_err!(f.facade.list("ws"));
    assert_eq!(f.facade.protocols().collect::<Vec<_>>(), vec![Protocol::Udp, Protocol::Tcp]);
}

#[test]
fn test_facade_list_tracks_every_peer_ever_seen() {
    let f = fixture();
    f.tcp.connect("10.0.0.5:7000");
    f.tcp.connect("10.0.0.6:7001");
    f.tcp.disconnect(0);

    assert_eq!(
        assert_ok!(f.facade.list("tcp")),
        vec!["closed connection".to_string(), "10.0.0.6:7001".to_string()]
    );
    assert_eq!(assert_ok!(f.facade.status("tcp", 0)), TransportState::Closed);
}

#[test]
fn test_send_command_joins_words_and_appends_newline() {
    let f = fixture();
    f.udp.connect("10.0.0.5:7000");

    assert_eq!(run(&f.shell, "send udp 0 hello  big world"), "");
    assert_eq!(f.udp.sent_to(0), vec![Payload::Text("hello  big world\n".into())]);
}

#[test]
fn test_sendb_command_decodes_hex_ignoring_spaces() {
    let f = fixture();
    f.tcp.connect("10.0.0.5:7000");

    assert_eq!(run(&f.shell, "sendb tcp 0 68 65 6c6c 6f"), "");
    assert_eq!(f.tcp.sent_to(0), vec![Payload::Binary(b"hello".to_vec())]);

    let out = run(&f.shell, "sendb tcp 0 6g");
    assert!(out.starts_with("X invalid hex payload"), "{out}");
    assert_eq!(f.tcp.sent_to(0).len(), 1);
}

#[test]
fn test_send_failures_print_single_diagnostic() {
    let f = fixture();
    f.tcp.connect("10.0.0.5:7000");
    f.tcp.disconnect(0);

    assert_eq!(run(&f.shell, "send ws 0 hi"), "X unknown protocol ws\n");
    assert_eq!(run(&f.shell, "send tcp 0 hi"), "X try to write on closed TCP connection #0\n");
    assert_eq!(run(&f.shell, "send tcp 3 hi"), "X try to write on unknown TCP connection #3\n");
    assert_eq!(run(&f.shell, "send udp 0 hi"), "X try to write on unknown UDP session #0\n");
    assert_eq!(run(&f.shell, "send tcp -1 hi"), "X invalid client number -1\n");
}

#[test]
fn test_list_clients_output() {
    let f = fixture();
    f.tcp.connect("10.0.0.5:7000");
    f.tcp.connect("10.0.0.6:7001");
    f.tcp.disconnect(1);

    assert_eq!(
        run(&f.shell, "list_clients"),
        "udp:\n\tNo client\ntcp:\n\t#0: 10.0.0.5:7000\n\t#1: closed connection\n"
    );
    assert!(run(&f.shell, "list_clients help").starts_with("list_clients\n"));
}

#[test]
fn test_usage_and_help() {
    let f = fixture();
    assert!(run(&f.shell, "send").starts_with("send <protocol> <client-num> <message>"));
    assert!(run(&f.shell, "sendb help tcp").starts_with("sendb <protocol> <client-num> <message>"));

    let help = run(&f.shell, "help");
    assert!(help.contains("Handled protocols:\n\tudp\n\ttcp\n"));
    assert!(help.contains("Commands list:\n\thelp\n\tlist_clients\n\tsend\n\tsendb\n"));

    let unknown = run(&f.shell, "frobnicate now");
    assert!(unknown.starts_with("unknown command frobnicate\n"));
    assert!(unknown.contains("Commands list:"));
    assert_eq!(run(&f.shell, ""), "");
}

#[test]
fn test_run_processes_lines_until_eof() {
    let f = fixture();
    f.udp.connect("10.0.0.5:7000");

    let input = Cursor::new("send udp 0 one\n\nsend nope 0 x\nsendb udp 0 ff00\n");
    let mut out = Vec::new();
    f.shell.run(input, &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "X unknown protocol nope\n");
    assert_eq!(
        f.udp.sent_to(0),
        vec![Payload::Text("one\n".into()), Payload::Binary(vec![0xff, 0x00])]
    );
}
