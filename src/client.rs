//! Per-connection data.

use crate::lines;
use selka_tokens::{Buffer, Command, ReplyBuffer, rpl};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// The queue used by the state to push messages back to a peer.  The other
/// end is drained by the peer's write task in `net`.
pub type MessageQueue = mpsc::UnboundedSender<MessageQueueItem>;

/// A cheaply clonable chunk of outgoing bytes.
///
/// One item may carry several IRC messages; fan-out clones share the
/// underlying string.
#[derive(Clone, Debug)]
pub struct MessageQueueItem(Arc<String>);

impl From<Buffer> for MessageQueueItem {
    fn from(buf: Buffer) -> Self {
        MessageQueueItem(Arc::new(buf.build()))
    }
}

impl From<ReplyBuffer> for MessageQueueItem {
    fn from(buf: ReplyBuffer) -> Self {
        MessageQueueItem(Arc::new(buf.build()))
    }
}

impl AsRef<str> for MessageQueueItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for MessageQueueItem {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Registration progress of a connection.
///
/// `Accepted -(PASS)-> PassGiven -(NICK|USER)-> NickGiven|UserGiven ->
/// Registered -> Quit`.  PASS is only accepted in `Accepted`; everything
/// else a client may send before `Registered` is answered with 451 by the
/// dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    PassGiven,
    NickGiven,
    UserGiven,
    Registered,
    Quit,
}

impl ConnectionState {
    pub fn is_registered(self) -> bool {
        self == ConnectionState::Registered
    }
}

/// A connected peer and everything the server remembers about it.
pub struct Client {
    queue: MessageQueue,

    /// The peer's IP address, as a string.  Reverse DNS is out of scope, so
    /// this is also the host part of the usermask.
    pub host: String,

    state: ConnectionState,
    /// Whether a modern-dialect CAP negotiation holds registration open.
    cap_negotiation: bool,
    has_nick: bool,
    has_user: bool,
    /// Set on accept when no server password is configured, or by a correct
    /// PASS.
    pub pass_satisfied: bool,

    nick: String,
    user: String,
    real: String,
    full_name: String,

    // User modes.
    pub invisible: bool,
    pub wallops: bool,
    pub restricted: bool,
    pub operator: bool,
    pub local_operator: bool,

    pub away: Option<String>,

    /// Folded masks whose messages this client does not want (SILENCE).
    pub silence: HashSet<String>,

    pub signon_time: u64,
    pub last_action: Instant,
    pub last_alive: Instant,
    pub last_ping: Instant,
}

impl Client {
    pub fn new(queue: MessageQueue, host: String) -> Client {
        let now = Instant::now();
        Client {
            queue,
            host,
            state: ConnectionState::Accepted,
            cap_negotiation: false,
            has_nick: false,
            has_user: false,
            pass_satisfied: false,
            nick: "*".to_owned(),
            user: String::new(),
            real: String::new(),
            full_name: String::new(),
            invisible: false,
            wallops: false,
            restricted: false,
            operator: false,
            local_operator: false,
            away: None,
            silence: HashSet::new(),
            signon_time: crate::util::time_now(),
            last_action: now,
            last_alive: now,
            last_ping: now,
        }
    }

    /// Pushes a message onto the peer's queue.  Errors mean the write task
    /// is gone and the connection is being torn down; they are ignored
    /// because the state will notice through `peer_quit`.
    pub fn send<M>(&self, msg: M)
    where
        M: Into<MessageQueueItem>,
    {
        let _ = self.queue.send(msg.into());
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state.is_registered()
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn real(&self) -> &str {
        &self.real
    }

    /// The usermask `nick!user@host` this client's messages are prefixed
    /// with.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn set_nick(&mut self, nick: &str) {
        self.nick.clear();
        self.nick.push_str(nick);
        self.update_full_name();
    }

    pub fn set_user_real(&mut self, user: &str, real: &str) {
        self.user.clear();
        self.user.push_str(user);
        self.real.clear();
        self.real.push_str(real);
        self.update_full_name();
    }

    fn update_full_name(&mut self) {
        self.full_name.clear();
        self.full_name.push_str(&self.nick);
        self.full_name.push('!');
        self.full_name.push_str(&self.user);
        self.full_name.push('@');
        self.full_name.push_str(&self.host);
    }

    pub fn is_oper(&self) -> bool {
        self.operator || self.local_operator
    }

    /// Whether the dispatcher may hand the command to its handler, given
    /// the registration state.
    pub fn can_issue_command(&self, command: Command, _sub_command: &str) -> bool {
        if self.state == ConnectionState::Quit {
            return false;
        }
        match command {
            // Reissues after registration, and PASS after NICK/USER, are
            // rejected with 462.
            Command::Pass => self.state == ConnectionState::Accepted,
            Command::User => !self.is_registered(),
            _ => self.is_registered() || command.accepted_unregistered(),
        }
    }

    /// Advances the registration state machine and returns the new state.
    ///
    /// Registration is held open while a CAP negotiation is in progress and
    /// resumes on CAP END.
    pub fn apply_command(&mut self, command: Command, sub_command: &str) -> ConnectionState {
        match command {
            Command::Pass => {
                if self.state == ConnectionState::Accepted {
                    self.state = ConnectionState::PassGiven;
                }
            }
            Command::Nick => {
                self.has_nick = true;
                self.advance();
            }
            Command::User => {
                self.has_user = true;
                self.advance();
            }
            Command::Cap => {
                if !self.is_registered() {
                    if sub_command.eq_ignore_ascii_case("END") {
                        self.cap_negotiation = false;
                        self.advance();
                    } else {
                        self.cap_negotiation = true;
                    }
                }
            }
            Command::Quit => {
                self.state = ConnectionState::Quit;
            }
            _ => {}
        }
        self.state
    }

    fn advance(&mut self) {
        if self.state == ConnectionState::Registered || self.state == ConnectionState::Quit {
            return;
        }
        self.state = match (self.has_nick, self.has_user) {
            (true, true) if !self.cap_negotiation => ConnectionState::Registered,
            (true, _) => ConnectionState::NickGiven,
            (_, true) => ConnectionState::UserGiven,
            _ => self.state,
        };
    }

    /// The current user mode string, `+` included; empty when no mode is
    /// set.
    pub fn modes(&self) -> String {
        let mut modes = String::from("+");
        if self.local_operator {
            modes.push('O');
        }
        if self.invisible {
            modes.push('i');
        }
        if self.operator {
            modes.push('o');
        }
        if self.restricted {
            modes.push('r');
        }
        if self.wallops {
            modes.push('w');
        }
        if modes.len() == 1 { String::new() } else { modes }
    }

    pub fn write_modes(&self, rb: &mut ReplyBuffer) {
        let modes = self.modes();
        rb.reply(rpl::UMODEIS)
            .trailing_param(if modes.is_empty() { "+" } else { modes.as_str() });
    }

    /// Applies the RFC 2812 USER mode bitmask: bit 2 requests `w`, bit 3
    /// requests `i`.
    pub fn apply_user_mode_mask(&mut self, mask: &str) {
        if let Ok(mask) = mask.parse::<u8>() {
            self.wallops = mask & 4 != 0;
            self.invisible = mask & 8 != 0;
        }
    }

    /// Stamps the liveness clocks; every processed line counts.
    pub fn update_alive(&mut self) {
        let now = Instant::now();
        self.last_action = now;
        self.last_alive = now;
    }

    /// WHO replies describe members as here (`H`) or gone (`G`).
    pub fn who_flag(&self) -> &'static str {
        if self.away.is_some() { "G" } else { "H" }
    }
}

/// Builds the ERROR line sent before a connection is closed by the server.
pub fn error_line(reason: &str) -> MessageQueueItem {
    let mut buf = Buffer::new();
    buf.message("", Command::Error).trailing_param(reason);
    buf.into()
}

/// The ERROR line sent on server shutdown, shared by every connection.
pub fn shutdown_line() -> MessageQueueItem {
    error_line(lines::SERVER_SHUTDOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (Client, mpsc::UnboundedReceiver<MessageQueueItem>) {
        let (queue, outgoing) = mpsc::unbounded_channel();
        (Client::new(queue, "127.0.0.1".to_owned()), outgoing)
    }

    #[test]
    fn test_registration_sequence() {
        let (mut c, _out) = client();
        assert_eq!(c.state(), ConnectionState::Accepted);
        assert!(!c.can_issue_command(Command::Join, ""));
        assert!(c.can_issue_command(Command::Nick, ""));

        c.apply_command(Command::Nick, "");
        assert_eq!(c.state(), ConnectionState::NickGiven);
        c.apply_command(Command::User, "");
        assert_eq!(c.state(), ConnectionState::Registered);
        assert!(c.can_issue_command(Command::Join, ""));
        assert!(!c.can_issue_command(Command::User, ""));
        assert!(!c.can_issue_command(Command::Pass, ""));
    }

    #[test]
    fn test_pass_must_come_first() {
        let (mut c, _out) = client();
        c.apply_command(Command::Nick, "");
        assert!(!c.can_issue_command(Command::Pass, ""));
    }

    #[test]
    fn test_cap_holds_registration() {
        let (mut c, _out) = client();
        c.apply_command(Command::Cap, "LS");
        c.apply_command(Command::Nick, "");
        c.apply_command(Command::User, "");
        assert!(!c.state().is_registered());
        c.apply_command(Command::Cap, "END");
        assert_eq!(c.state(), ConnectionState::Registered);
    }

    #[test]
    fn test_full_name() {
        let (mut c, _out) = client();
        c.set_nick("alice");
        c.set_user_real("alice", "Alice");
        assert_eq!(c.full_name(), "alice!alice@127.0.0.1");
        c.set_nick("alicia");
        assert_eq!(c.full_name(), "alicia!alice@127.0.0.1");
    }

    #[test]
    fn test_modes_string() {
        let (mut c, _out) = client();
        assert_eq!(c.modes(), "");
        c.apply_user_mode_mask("12");
        assert_eq!(c.modes(), "+iw");
        c.operator = true;
        assert_eq!(c.modes(), "+iow");
    }
}
