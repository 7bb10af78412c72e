//! Testing utilities for `selka::state`

use crate::client::MessageQueueItem;
use crate::config;
use crate::net::Control;
use selka_tokens::{Command, Dialect, Message, assert_msg};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use super::StateInner;
use tokio::sync::mpsc;

type Queue = mpsc::UnboundedReceiver<MessageQueueItem>;

pub const DOMAIN: &str = "selka.localdomain";

pub(crate) fn simple_state() -> StateInner {
    state_with_config(config::State::sample())
}

pub(crate) fn state_with_dialect(dialect: Dialect) -> StateInner {
    state_with_config(config::State { dialect, ..config::State::sample() })
}

pub(crate) fn state_with_config(config: config::State) -> StateInner {
    let (control, _) = mpsc::unbounded_channel();
    StateInner::new(config, control)
}

pub(crate) fn state_with_control() -> (StateInner, mpsc::UnboundedReceiver<Control>) {
    let (control, requests) = mpsc::unbounded_channel();
    (StateInner::new(config::State::sample(), control), requests)
}

pub(crate) fn add_client(s: &mut StateInner) -> (usize, Queue) {
    let port = s.clients.len() as u16;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let (msg_queue, outgoing_msgs) = mpsc::unbounded_channel();
    let id = s.peer_joined(addr, msg_queue);
    (id, outgoing_msgs)
}

pub(crate) fn add_registered_client(s: &mut StateInner, nickname: &str) -> (usize, Queue) {
    let (id, mut queue) = add_client(s);
    let nick = format!("NICK {}", nickname);
    handle_message(s, id, &nick);
    handle_message(s, id, "USER X 0 * :X");
    flush(&mut queue);
    (id, queue)
}

pub(crate) fn handle_message(state: &mut StateInner, id: usize, message: &str) {
    let message = Message::parse(message).expect("bad message");
    let _ = state.handle_message(id, message);
}

pub fn flush(queue: &mut Queue) {
    while queue.try_recv().is_ok() {}
}

pub fn collect(res: &mut String, queue: &mut Queue) {
    loop {
        match queue.try_recv() {
            Ok(item) => {
                let s: &str = item.as_ref();
                res.push_str(s);
            }
            Err(mpsc::error::TryRecvError::Empty) => return,
            Err(mpsc::error::TryRecvError::Closed) => return,
        }
    }
}

pub fn messages(s: &str) -> impl Iterator<Item = Message<'_>> {
    s.lines().map(|line| Message::parse(line).expect("bad message"))
}

type ExpectedMessage<'a> = (Option<&'a str>, Result<Command, &'a str>, &'a [&'a str]);

pub fn assert_msgs(s: &str, expected: &[ExpectedMessage<'_>]) {
    let mut i = 0;
    for msg in messages(s) {
        let (prefix, command, params) = expected[i];
        assert_msg(&msg, prefix, command, params);
        i += 1;
    }
    assert_eq!(i, expected.len());
}

// Scenario: registration handshake.
#[test]
fn test_registration() {
    let mut state = simple_state();
    let (id, mut queue) = add_client(&mut state);

    handle_message(&mut state, id, "NICK alice");
    handle_message(&mut state, id, "USER alice 0 * :Alice");

    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert!(res.starts_with(
        ":selka.localdomain 001 alice :Welcome to the IRC Network alice!alice@127.0.0.1\r\n"
    ));
    assert!(res.contains(" 002 alice :"));
    assert!(res.contains(" 003 alice :"));
    assert!(res.contains(" 004 alice "));
    // The modern dialect also advertises ISUPPORT tokens.
    assert!(res.contains(" 005 alice "));
    assert!(res.contains(" 422 alice :"));
    assert!(res.contains(" 221 alice :+"));

    assert_eq!(state.nicks.get("alice"), Some(&id));
    assert!(state.clients[id].is_registered());
}

#[test]
fn test_registration_burst_has_no_isupport_on_rfc1459() {
    let mut state = state_with_dialect(Dialect::Rfc1459);
    let (id, mut queue) = add_client(&mut state);

    handle_message(&mut state, id, "NICK alice");
    handle_message(&mut state, id, "USER alice 0 * :Alice");

    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert!(res.contains(" 004 alice "));
    assert!(!res.contains(" 005 alice "));
}

#[test]
fn test_commands_rejected_before_registration() {
    let mut state = simple_state();
    let (id, mut queue) = add_client(&mut state);

    handle_message(&mut state, id, "JOIN #room");
    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert_msgs(&res, &[(Some(DOMAIN), Ok(Command::Reply(451)), &["*", ""])]);
}

// Scenario: channel creation, NAMES and TOPIC.
#[test]
fn test_channel_create_and_topic() {
    let mut state = simple_state();
    let (id, mut queue) = add_registered_client(&mut state, "alice");

    handle_message(&mut state, id, "JOIN #room");
    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert_msgs(&res, &[
        (Some("alice!X@127.0.0.1"), Ok(Command::Join), &["#room"]),
        (Some(DOMAIN), Ok(Command::Reply(331)), &["alice", "#room", "No topic is set"]),
        (Some(DOMAIN), Ok(Command::Reply(353)), &["alice", "=", "#room", "@alice"]),
        (Some(DOMAIN), Ok(Command::Reply(366)), &["alice", "#room", "End of NAMES list"]),
    ]);

    handle_message(&mut state, id, "TOPIC #room :hello");
    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert_msgs(&res, &[
        (Some("alice!X@127.0.0.1"), Ok(Command::Topic), &["#room", "hello"]),
    ]);

    handle_message(&mut state, id, "TOPIC #room");
    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(332)), &["alice", "#room", "hello"]),
        (Some(DOMAIN), Ok(Command::Reply(333)), &["alice", "#room", "alice!X@127.0.0.1", ""]),
    ]);
}

// Scenario: moderated channels require voice.
#[test]
fn test_moderation() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, bob, "JOIN #room");
    handle_message(&mut state, alice, "MODE #room +m");
    flush(&mut alice_queue);
    flush(&mut bob_queue);

    handle_message(&mut state, bob, "PRIVMSG #room :hi");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(404)), &["bob", "#room", "Cannot send to channel"]),
    ]);
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_eq!(res, "");

    handle_message(&mut state, alice, "MODE #room +v bob");
    flush(&mut alice_queue);
    flush(&mut bob_queue);
    handle_message(&mut state, bob, "PRIVMSG #room :hi");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some("bob!X@127.0.0.1"), Ok(Command::PrivMsg), &["#room", "hi"]),
    ]);
    // The sender does not get a copy.
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_eq!(res, "");
}

// Scenario: ping timeout.
#[test]
fn test_ping_timeout() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, bob, "JOIN #room");
    flush(&mut alice_queue);
    flush(&mut bob_queue);

    // Idle for a minute: pinged, not removed.
    let minute_ago = Instant::now() - Duration::from_secs(61);
    {
        let client = &mut state.clients[bob];
        client.last_action = minute_ago;
        client.last_alive = minute_ago;
        client.last_ping = minute_ago;
    }
    state.liveness_sweep();
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[(None, Ok(Command::Ping), &[DOMAIN])]);
    assert!(state.clients.contains(bob));

    // Silent for five minutes: removed, QUIT fanned out.
    let ages_ago = Instant::now() - Duration::from_secs(301);
    {
        let client = &mut state.clients[bob];
        client.last_action = ages_ago;
        client.last_alive = ages_ago;
    }
    state.liveness_sweep();
    assert!(!state.clients.contains(bob));
    assert_eq!(state.nicks.get("bob"), None);
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some("bob!X@127.0.0.1"), Ok(Command::Quit), &["Ping Timeout"]),
    ]);
}

// Scenario: nickname collision.
#[test]
fn test_nick_collision() {
    let mut state = simple_state();
    let (_alice, _alice_queue) = add_registered_client(&mut state, "alice");
    let (eve, mut eve_queue) = add_client(&mut state);

    handle_message(&mut state, eve, "NICK alice");
    let mut res = String::new();
    collect(&mut res, &mut eve_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(433)), &["*", "alice", "Nickname is already in use"]),
    ]);
    assert!(!state.clients[eve].is_registered());
    assert_eq!(state.nicks.len(), 1);
}

#[test]
fn test_nick_collision_follows_rfc1459_folding() {
    let mut state = state_with_dialect(Dialect::Rfc1459);
    let (_, _q) = add_registered_client(&mut state, "ni{k}");
    let (eve, mut eve_queue) = add_client(&mut state);

    handle_message(&mut state, eve, "NICK ni[k]");
    let mut res = String::new();
    collect(&mut res, &mut eve_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(433)), &["*", "ni[k]", "Nickname is already in use"]),
    ]);
}

// Law: NICK renames atomically and peers are told.
#[test]
fn test_nick_round_trip() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, bob, "JOIN #room");
    flush(&mut alice_queue);
    flush(&mut bob_queue);

    handle_message(&mut state, alice, "NICK alicia");
    assert_eq!(state.nicks.get("alice"), None);
    assert_eq!(state.nicks.get("alicia"), Some(&alice));
    assert_eq!(state.clients[alice].nick(), "alicia");
    assert!(state.channels.get("#room").unwrap().members.contains_key(&alice));

    for queue in [&mut alice_queue, &mut bob_queue].iter_mut() {
        let mut res = String::new();
        collect(&mut res, queue);
        assert_msgs(&res, &[
            (Some("alice!X@127.0.0.1"), Ok(Command::Nick), &["alicia"]),
        ]);
    }

    // The old nick is free again, and remembered for WHOWAS.
    handle_message(&mut state, bob, "WHOWAS alice");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(314)), &["bob", "alice", "X", "127.0.0.1", "*", "X"]),
        (Some(DOMAIN), Ok(Command::Reply(369)), &["bob", "alice", "End of WHOWAS"]),
    ]);
}

// Law: a second JOIN is a no-op, with no numeric.
#[test]
fn test_join_idempotence() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    handle_message(&mut state, alice, "JOIN #room");
    flush(&mut alice_queue);

    handle_message(&mut state, alice, "JOIN #room");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_eq!(res, "");
    assert_eq!(state.channels.get("#room").unwrap().members.len(), 1);
}

#[test]
fn test_part_removes_empty_channels() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    handle_message(&mut state, alice, "JOIN #room");
    flush(&mut alice_queue);

    handle_message(&mut state, alice, "PART #room :bye");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some("alice!X@127.0.0.1"), Ok(Command::Part), &["#room", "bye"]),
    ]);
    assert!(state.channels.is_empty());
}

#[test]
fn test_privmsg_away_reply() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");

    handle_message(&mut state, bob, "AWAY :gone fishing");
    flush(&mut bob_queue);
    handle_message(&mut state, alice, "PRIVMSG bob :hi");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(301)), &["alice", "bob", "gone fishing"]),
    ]);
    // Away users are not delivered to.
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_eq!(res, "");

    handle_message(&mut state, bob, "AWAY");
    flush(&mut bob_queue);
    handle_message(&mut state, alice, "PRIVMSG bob :hi again");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some("alice!X@127.0.0.1"), Ok(Command::PrivMsg), &["bob", "hi again"]),
    ]);
}

#[test]
fn test_notice_never_replies() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");

    handle_message(&mut state, alice, "NOTICE nosuchnick :hi");
    handle_message(&mut state, alice, "NOTICE #nosuchchan :hi");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_eq!(res, "");
}

#[test]
fn test_join_gates_in_order() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, alice, "MODE #room +ki sesame");
    flush(&mut alice_queue);

    handle_message(&mut state, bob, "JOIN #room");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(475)), &["bob", "#room", "Cannot join channel (+k)"]),
    ]);

    // Key passes, invite-only still blocks.
    handle_message(&mut state, bob, "JOIN #room sesame");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(473)), &["bob", "#room", "Cannot join channel (+i)"]),
    ]);

    // An INVITE opens the door once.
    handle_message(&mut state, alice, "INVITE bob #room");
    flush(&mut bob_queue);
    handle_message(&mut state, bob, "JOIN #room sesame");
    assert!(state.channels.get("#room").unwrap().members.contains_key(&bob));
}

#[test]
fn test_ban_and_exception_on_join() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, alice, "MODE #room +b bob!*@*");
    flush(&mut alice_queue);

    handle_message(&mut state, bob, "JOIN #room");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(474)), &["bob", "#room", "Cannot join channel (+b)"]),
    ]);

    handle_message(&mut state, alice, "MODE #room +e bob!X@*");
    flush(&mut alice_queue);
    handle_message(&mut state, bob, "JOIN #room");
    assert!(state.channels.get("#room").unwrap().members.contains_key(&bob));
}

#[test]
fn test_mode_ban_list_enumeration() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, alice, "MODE #room +b troll!*@*");
    flush(&mut alice_queue);

    handle_message(&mut state, alice, "MODE #room b");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(367)),
         &["alice", "#room", "troll!*@*", "alice!X@127.0.0.1", ""]),
        (Some(DOMAIN), Ok(Command::Reply(368)), &["alice", "#room", "End of channel ban list"]),
    ]);
}

#[test]
fn test_kick() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, bob, "JOIN #room");
    flush(&mut alice_queue);
    flush(&mut bob_queue);

    // Only operators may kick.
    handle_message(&mut state, bob, "KICK #room alice");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(482)), &["bob", "#room", "You're not channel operator"]),
    ]);

    handle_message(&mut state, alice, "KICK #room bob :begone");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some("alice!X@127.0.0.1"), Ok(Command::Kick), &["#room", "bob", "begone"]),
    ]);
    assert!(!state.channels.get("#room").unwrap().members.contains_key(&bob));
}

#[test]
fn test_oper_and_lifecycle_commands() {
    let (mut state, mut requests) = state_with_control();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");

    // Not an operator yet.
    handle_message(&mut state, alice, "DIE");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(481)), &["alice", ""]),
    ]);
    assert!(requests.try_recv().is_err());

    handle_message(&mut state, alice, "OPER root hunter2");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(381)), &["alice", "You are now an IRC operator"]),
        (Some(DOMAIN), Ok(Command::Mode), &["alice", "+o"]),
    ]);

    handle_message(&mut state, alice, "REHASH");
    assert!(matches!(requests.try_recv(), Ok(Control::Rehash)));
    handle_message(&mut state, alice, "RESTART");
    assert!(matches!(requests.try_recv(), Ok(Control::Restart)));
    handle_message(&mut state, alice, "DIE");
    assert!(matches!(requests.try_recv(), Ok(Control::Stop)));
}

#[test]
fn test_kill() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, bob, "JOIN #room");
    handle_message(&mut state, alice, "OPER root hunter2");
    flush(&mut alice_queue);
    flush(&mut bob_queue);

    handle_message(&mut state, alice, "KILL bob :misbehaving");
    assert!(!state.clients.contains(bob));
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some("alice!X@127.0.0.1"), Ok(Command::Kill), &["bob", "misbehaving"]),
    ]);
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some("bob!X@127.0.0.1"), Ok(Command::Quit), &["Killed (alice (misbehaving))"]),
    ]);
}

#[test]
fn test_pass_is_enforced() {
    let config = config::State {
        password: Some("sesame".to_owned()),
        ..config::State::sample()
    };

    // Wrong password: closed immediately.
    let mut state = state_with_config(config.clone());
    let (eve, mut eve_queue) = add_client(&mut state);
    handle_message(&mut state, eve, "PASS wrong");
    let mut res = String::new();
    collect(&mut res, &mut eve_queue);
    assert_msgs(&res, &[(None, Ok(Command::Error), &["Bad Password"])]);
    assert!(!state.clients.contains(eve));

    // No PASS at all: closed when registration completes.
    let mut state = state_with_config(config.clone());
    let (eve, mut eve_queue) = add_client(&mut state);
    handle_message(&mut state, eve, "NICK eve");
    handle_message(&mut state, eve, "USER eve 0 * :Eve");
    let mut res = String::new();
    collect(&mut res, &mut eve_queue);
    assert_msgs(&res, &[(None, Ok(Command::Error), &["Bad Password"])]);
    assert!(!state.clients.contains(eve));

    // The right password registers normally.
    let mut state = state_with_config(config);
    let (alice, mut alice_queue) = add_client(&mut state);
    handle_message(&mut state, alice, "PASS sesame");
    handle_message(&mut state, alice, "NICK alice");
    handle_message(&mut state, alice, "USER alice 0 * :Alice");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert!(res.contains(" 001 alice :"));
}

#[test]
fn test_cap_suspends_registration() {
    let mut state = simple_state();
    let (id, mut queue) = add_client(&mut state);

    handle_message(&mut state, id, "CAP LS 302");
    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Cap), &["*", "LS", ""]),
    ]);

    handle_message(&mut state, id, "NICK alice");
    handle_message(&mut state, id, "USER alice 0 * :Alice");
    assert!(!state.clients[id].is_registered());

    handle_message(&mut state, id, "CAP REQ :multi-prefix");
    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Cap), &["alice", "NAK", "multi-prefix"]),
    ]);

    handle_message(&mut state, id, "CAP END");
    assert!(state.clients[id].is_registered());
    let mut res = String::new();
    collect(&mut res, &mut queue);
    assert!(res.contains(" 001 alice :"));
}

#[test]
fn test_dialect_gates_commands() {
    let mut state = state_with_dialect(Dialect::Rfc1459);
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");

    handle_message(&mut state, alice, "SERVLIST");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(421)), &["alice", "SERVLIST", "Unknown command"]),
    ]);

    let mut state = state_with_dialect(Dialect::Rfc2810);
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    handle_message(&mut state, alice, "SERVLIST");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(235)), &["alice", "*", "*", "End of service listing"]),
    ]);
}

#[test]
fn test_silence_suppresses_messages() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");

    handle_message(&mut state, bob, "SILENCE +alice");
    handle_message(&mut state, bob, "SILENCE");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(271)), &["bob", "alice!*@*"]),
        (Some(DOMAIN), Ok(Command::Reply(272)), &["bob", "End of silence list"]),
    ]);

    // Dropped without a word on either side.
    handle_message(&mut state, alice, "PRIVMSG bob :psst");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_eq!(res, "");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_eq!(res, "");
}

#[test]
fn test_knock() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, mut bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    flush(&mut alice_queue);

    handle_message(&mut state, bob, "KNOCK #room");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(713)), &["bob", "#room", "Channel is open"]),
    ]);

    handle_message(&mut state, alice, "MODE #room +i");
    flush(&mut alice_queue);
    handle_message(&mut state, bob, "KNOCK #room");
    let mut res = String::new();
    collect(&mut res, &mut bob_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(711)),
         &["bob", "#room", "Your KNOCK has been delivered"]),
    ]);
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(710)),
         &["alice", "#room", "bob!X@127.0.0.1 has asked for an invite"]),
    ]);
}

#[test]
fn test_whowas_ring_is_bounded() {
    let config = config::State { whowas_len: 2, ..config::State::sample() };
    let mut state = state_with_config(config);
    for nick in &["one", "two", "three"] {
        let (id, _queue) = add_registered_client(&mut state, nick);
        handle_message(&mut state, id, "QUIT");
    }
    assert_eq!(state.whowas.len(), 2);

    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    handle_message(&mut state, alice, "WHOWAS one");
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some(DOMAIN), Ok(Command::Reply(406)), &["alice", "one", "There was no such nickname"]),
        (Some(DOMAIN), Ok(Command::Reply(369)), &["alice", "one", "End of WHOWAS"]),
    ]);
}

#[test]
fn test_quit_fans_out_and_frees_the_nick() {
    let mut state = simple_state();
    let (alice, mut alice_queue) = add_registered_client(&mut state, "alice");
    let (bob, _bob_queue) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #room");
    handle_message(&mut state, bob, "JOIN #room");
    flush(&mut alice_queue);

    handle_message(&mut state, bob, "QUIT :gone");
    assert!(!state.clients.contains(bob));
    assert_eq!(state.nicks.get("bob"), None);
    assert_eq!(state.channels.get("#room").unwrap().members.len(), 1);
    let mut res = String::new();
    collect(&mut res, &mut alice_queue);
    assert_msgs(&res, &[
        (Some("bob!X@127.0.0.1"), Ok(Command::Quit), &["gone"]),
    ]);
}

// Invariant: membership links are mirrored both ways and empty channels
// are unreachable.
#[test]
fn test_membership_invariants_after_churn() {
    let mut state = simple_state();
    let (alice, _qa) = add_registered_client(&mut state, "alice");
    let (bob, _qb) = add_registered_client(&mut state, "bob");
    handle_message(&mut state, alice, "JOIN #one");
    handle_message(&mut state, alice, "JOIN #two");
    handle_message(&mut state, bob, "JOIN #one");
    handle_message(&mut state, alice, "PART #one");
    handle_message(&mut state, bob, "QUIT");

    assert_eq!(state.channels.len(), 1);
    let two = state.channels.get("#two").unwrap();
    assert_eq!(two.members.len(), 1);
    assert!(two.members.contains_key(&alice));
    for (folded, id) in &state.nicks {
        assert_eq!(state.fold(state.clients[*id].nick()), *folded);
    }
}
