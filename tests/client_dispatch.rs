//! End-to-end dispatcher tests driven through a fake in-memory transport,
//! covering the parts of SPEC_FULL.md §4.5/§8 that only manifest once the
//! framer, parser, ISUPPORT state, and tracker are wired together by
//! `Client::dispatch`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use wyrcore::client::{Client, ClientConfig};
use wyrcore::error::IrcCoreError;
use wyrcore::transport::Transport;

#[derive(Default)]
struct FakeTransport {
    incoming: VecDeque<Vec<u8>>,
    sent: Rc<RefCell<Vec<u8>>>,
    closed: Rc<RefCell<bool>>,
}

impl FakeTransport {
    fn feed(&mut self, line: &str) {
        self.incoming.push_back(line.as_bytes().to_vec());
    }
}

impl Transport for FakeTransport {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.incoming.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no data")),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sent.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        *self.closed.borrow_mut() = true;
        Ok(())
    }
}

fn config() -> ClientConfig {
    ClientConfig {
        nick: "tester".to_string(),
        user: "tester".to_string(),
        real_name: "Test Er".to_string(),
        password: Some("secret".to_string()),
    }
}

type RegisteredClient = (
    Client<FakeTransport>,
    Rc<RefCell<Vec<u8>>>,
    Rc<RefCell<bool>>,
);

fn registered_client() -> RegisteredClient {
    let transport = FakeTransport::default();
    let sent = transport.sent.clone();
    let closed = transport.closed.clone();
    let mut client = Client::from_transport(transport, config());
    client.register().unwrap();
    (client, sent, closed)
}

#[test]
fn operations_before_connect_fail() {
    let mut client = Client::from_transport(FakeTransport::default(), config());
    assert!(matches!(
        client.join("#chan", None),
        Err(IrcCoreError::NotConnected)
    ));
}

#[test]
fn register_sends_pass_nick_user_once() {
    let (mut client, sent, _closed) = registered_client();
    let wire = String::from_utf8(sent.borrow().clone()).unwrap();
    assert!(wire.contains("PASS :secret\r\n"));
    assert!(wire.contains("NICK :tester\r\n"));
    assert!(wire.contains("USER tester * * :Test Er\r\n"));

    assert!(matches!(
        client.register(),
        Err(IrcCoreError::AlreadyConnected)
    ));
}

#[test]
fn ping_is_answered_with_pong() {
    let (mut client, sent, _closed) = registered_client();
    sent.borrow_mut().clear();
    client.transport_mut().feed("PING :irc.example.com\r\n");
    client.read_step().unwrap();
    assert_eq!(
        String::from_utf8(sent.borrow().clone()).unwrap(),
        "PONG :irc.example.com\r\n"
    );
}

#[test]
fn welcome_updates_self_nick_and_starts_tracker() {
    let (mut client, _sent, _closed) = registered_client();
    client.start_tracking().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 001 tester :Welcome\r\n");
    client.read_step().unwrap();
    assert_eq!(client.self_nick(), "tester");
}

#[test]
fn privmsg_is_tracked_and_dispatched_through_handlers() {
    let (mut client, _sent, _closed) = registered_client();

    let received = Rc::new(RefCell::new(Vec::new()));
    let received_clone = received.clone();
    client.events.on_message(move |user, target, text| {
        received_clone.borrow_mut().push((
            user.nick_name.clone(),
            target.to_string(),
            text.to_string(),
        ));
    });

    client
        .transport_mut()
        .feed(":alice!a@host PRIVMSG #chan :hello there\r\n");
    client.read_step().unwrap();

    let calls = received.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        (
            "alice".to_string(),
            "#chan".to_string(),
            "hello there".to_string()
        )
    );
}

#[test]
fn unhandled_nick_collision_closes_connection() {
    let (mut client, _sent, closed) = registered_client();
    client
        .transport_mut()
        .feed(":irc.example.com 433 * tester :Nickname is already in use\r\n");
    let result = client.read_step();
    assert!(matches!(result, Err(IrcCoreError::IrcError(_))));
    assert!(*closed.borrow());
    assert!(!client.is_connected());
}

#[test]
fn handled_nick_collision_retries_with_suggested_nick() {
    let (mut client, sent, closed) = registered_client();
    client
        .nick_in_use
        .on_nick_in_use(|failed| Some(format!("{failed}_")));
    sent.borrow_mut().clear();

    client
        .transport_mut()
        .feed(":irc.example.com 433 * tester :Nickname is already in use\r\n");
    client.read_step().unwrap();

    assert_eq!(
        String::from_utf8(sent.borrow().clone()).unwrap(),
        "NICK :tester_\r\n"
    );
    assert!(!*closed.borrow());
}

#[test]
fn tracker_sees_join_before_application_handler_and_names_roster_is_queryable() {
    let (mut client, _sent, _closed) = registered_client();
    client.start_tracking().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 001 tester :Welcome\r\n");
    client.read_step().unwrap();
    // startup WHOIS path: synthesize as if tracker already enabled via no-channels WHOIS end
    client
        .transport_mut()
        .feed(":irc.example.com 318 tester tester :End of WHOIS\r\n");
    client.read_step().unwrap();

    client.transport_mut().feed(":tester!t@host JOIN #chan\r\n");
    client.read_step().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 353 tester = #chan :@tester bob\r\n");
    client.read_step().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 366 tester #chan :End of NAMES\r\n");
    client.read_step().unwrap();

    let roster = client.tracker().find_channel("#chan").unwrap().unwrap();
    assert!(roster.members.contains("tester"));
    assert!(roster.members.contains("bob"));
}

#[test]
fn welcome_registers_self_with_tracker() {
    let (mut client, _sent, _closed) = registered_client();
    client.start_tracking().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 001 tester :Welcome\r\n");
    client.read_step().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 318 tester tester :End of WHOIS\r\n");
    client.read_step().unwrap();

    // handle_connect runs before on_connect fires, so the tracker already
    // knows about the self user by the time any on_connect handler could run.
    assert!(client.tracker().find_user("tester").unwrap().is_some());
}

#[test]
fn nick_change_rekeys_tracker_before_dispatch_returns() {
    let (mut client, _sent, _closed) = registered_client();
    client.start_tracking().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 001 tester :Welcome\r\n");
    client.read_step().unwrap();
    client
        .transport_mut()
        .feed(":irc.example.com 318 tester tester :End of WHOIS\r\n");
    client.read_step().unwrap();

    client
        .transport_mut()
        .feed(":tester!t@host NICK :newnick\r\n");
    client.read_step().unwrap();

    assert!(client.tracker().find_user("newnick").unwrap().is_some());
    assert!(client.tracker().find_user("tester").unwrap().is_none());
}

#[test]
fn line_with_stray_control_byte_is_dropped_not_parsed() {
    let (mut client, _sent, _closed) = registered_client();

    let received = Rc::new(RefCell::new(false));
    let received_clone = received.clone();
    client
        .events
        .on_message(move |_user, _target, _text| *received_clone.borrow_mut() = true);

    client
        .transport_mut()
        .feed(":alice!a@host PRIVMSG #chan :hi\0there\r\n");
    client.read_step().unwrap();

    assert!(!*received.borrow());
}
