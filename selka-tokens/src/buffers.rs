use crate::message::MESSAGE_LENGTH;

/// A helper to build one IRC message inside a [`Buffer`] or a
/// [`ReplyBuffer`].
///
/// The message is terminated when the `MessageBuffer` is dropped; at that
/// point it is also truncated (on a character boundary) to
/// `MESSAGE_LENGTH` bytes, CR-LF included, so that no outgoing line can
/// exceed the protocol limit.
pub struct MessageBuffer<'a> {
    buf: &'a mut String,
    start: usize,
}

impl<'a> MessageBuffer<'a> {
    fn new(buf: &'a mut String, prefix: &str, command: &str) -> MessageBuffer<'a> {
        let start = buf.len();
        if !prefix.is_empty() {
            buf.push(':');
            buf.push_str(prefix);
            buf.push(' ');
        }
        buf.push_str(command);
        MessageBuffer { buf, start }
    }

    /// Appends a middle parameter.  Empty parameters are skipped, they
    /// cannot be represented on the wire.
    pub fn param<S>(self, param: S) -> MessageBuffer<'a>
    where
        S: AsRef<str>,
    {
        let param = param.as_ref();
        if !param.is_empty() {
            self.buf.push(' ');
            self.buf.push_str(param);
        }
        self
    }

    /// Appends a space and returns the underlying `String`, for parameters
    /// that are built incrementally (e.g. mode strings).
    pub fn raw_param(&mut self) -> &mut String {
        self.buf.push(' ');
        self.buf
    }

    /// Appends the trailing parameter and ends the message.
    pub fn trailing_param<S>(self, param: S)
    where
        S: AsRef<str>,
    {
        self.buf.push_str(" :");
        self.buf.push_str(param.as_ref());
    }

    /// Appends ` :` and returns the underlying `String`, for trailing
    /// parameters that are built incrementally (e.g. NAMES lists).
    pub fn raw_trailing_param(&mut self) -> &mut String {
        self.buf.push_str(" :");
        self.buf
    }

    /// Ends the message without a trailing parameter.
    pub fn build(self) {}
}

impl Drop for MessageBuffer<'_> {
    fn drop(&mut self) {
        let max = self.start + MESSAGE_LENGTH - 2;
        if max < self.buf.len() {
            let mut end = max;
            while !self.buf.is_char_boundary(end) {
                end -= 1;
            }
            self.buf.truncate(end);
        }
        self.buf.push_str("\r\n");
    }
}

/// A buffer of outgoing messages with arbitrary prefixes.
///
/// Used for messages relayed on behalf of other users (JOIN, PRIVMSG, QUIT
/// announcements) where the prefix is the sender's usermask.
#[derive(Debug, Default)]
pub struct Buffer {
    buf: String,
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Starts a message with the given prefix (may be empty) and command.
    pub fn message<C>(&mut self, prefix: &str, command: C) -> MessageBuffer<'_>
    where
        C: AsRef<str>,
    {
        MessageBuffer::new(&mut self.buf, prefix, command.as_ref())
    }

    /// The accumulated bytes, CR-LF terminated.
    pub fn build(self) -> String {
        self.buf
    }
}

/// A buffer of outgoing replies to one client.
///
/// Replies all start with `:<domain> <numeric> <nick>`; the buffer owns
/// copies of both so that handlers can mutate the server state while the
/// buffer is alive.  Unregistered clients are addressed as `*`.
#[derive(Debug)]
pub struct ReplyBuffer {
    domain: String,
    nick: String,
    buf: Buffer,
}

impl ReplyBuffer {
    pub fn new(domain: &str, nick: &str) -> ReplyBuffer {
        ReplyBuffer {
            domain: domain.to_owned(),
            nick: if nick.is_empty() { "*".to_owned() } else { nick.to_owned() },
            buf: Buffer::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Starts a server-prefixed reply addressed to the client.
    pub fn reply<C>(&mut self, r: C) -> MessageBuffer<'_>
    where
        C: AsRef<str>,
    {
        let mb = MessageBuffer::new(&mut self.buf.buf, &self.domain, r.as_ref());
        mb.param(&self.nick)
    }

    /// Starts a message with an arbitrary prefix, for relayed or
    /// unnumbered lines (PING, CAP, ERROR).
    pub fn message<C>(&mut self, prefix: &str, command: C) -> MessageBuffer<'_>
    where
        C: AsRef<str>,
    {
        self.buf.message(prefix, command)
    }

    /// Starts a server-prefixed message that is not a numbered reply.
    pub fn prefixed_message<C>(&mut self, command: C) -> MessageBuffer<'_>
    where
        C: AsRef<str>,
    {
        MessageBuffer::new(&mut self.buf.buf, &self.domain, command.as_ref())
    }

    pub fn build(self) -> String {
        self.buf.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_with_params() {
        let mut buf = Buffer::new();
        buf.message("nick!user@host", "JOIN").param("#chan").build();
        assert_eq!(buf.build(), ":nick!user@host JOIN #chan\r\n");
    }

    #[test]
    fn test_trailing_param() {
        let mut buf = Buffer::new();
        buf.message("", "PING").trailing_param("token with spaces");
        assert_eq!(buf.build(), "PING :token with spaces\r\n");
    }

    #[test]
    fn test_reply_buffer_inserts_nick() {
        let mut rb = ReplyBuffer::new("selka.dev", "ser");
        rb.reply("001").trailing_param("Welcome");
        assert_eq!(rb.build(), ":selka.dev 001 ser :Welcome\r\n");
    }

    #[test]
    fn test_reply_buffer_unregistered_is_star() {
        let mut rb = ReplyBuffer::new("selka.dev", "");
        rb.reply("433").param("nick").trailing_param("Nickname is already in use");
        assert_eq!(rb.build(), ":selka.dev 433 * nick :Nickname is already in use\r\n");
    }

    #[test]
    fn test_raw_trailing_param() {
        let mut rb = ReplyBuffer::new("selka.dev", "ser");
        let mut msg = rb.reply("353").param("=").param("#chan");
        let trailing = msg.raw_trailing_param();
        trailing.push_str("@ser ");
        trailing.push_str("other");
        drop(msg);
        assert_eq!(rb.build(), ":selka.dev 353 ser = #chan :@ser other\r\n");
    }

    #[test]
    fn test_messages_are_truncated_to_the_limit() {
        let mut buf = Buffer::new();
        let long = "x".repeat(600);
        buf.message("srv", "PRIVMSG").param("#chan").trailing_param(&long);
        let built = buf.build();
        assert_eq!(built.len(), MESSAGE_LENGTH);
        assert!(built.ends_with("\r\n"));
        assert!(!built[..built.len() - 2].contains('\r'));
    }

    #[test]
    fn test_several_messages_share_the_buffer() {
        let mut buf = Buffer::new();
        buf.message("", "PING").param("one").build();
        buf.message("", "PING").param("two").build();
        assert_eq!(buf.build(), "PING one\r\nPING two\r\n");
    }
}
