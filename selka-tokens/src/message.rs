use crate::Command;

/// The maximum length of an IRC message, in bytes, CR-LF included.
pub const MESSAGE_LENGTH: usize = 512;

/// The number of elements in `Message::params`.
pub const PARAMS_LENGTH: usize = 15;

/// Returns `(word, rest)` where `word` is the first whitespace-delimited
/// token of `s` and `rest` has its leading spaces stripped.
fn parse_word(s: &str) -> (&str, &str) {
    let mut split = s.splitn(2, ' ');
    let word = split.next().unwrap_or("");
    let rest = split.next().unwrap_or("").trim_start_matches(' ');
    (word, rest)
}

/// An IRC message, tokenized.
///
/// `Message`s borrow from the line they were parsed from and are produced by
/// [`Message::parse`].  Tokenizing follows RFC 1459 section 2.3.1: an
/// optional `:`-introduced prefix, a command word or a three-digit numeric,
/// then up to 15 parameters of which the last may be a `:`-introduced
/// trailing parameter that takes the rest of the line verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct Message<'a> {
    /// The prefix, without the leading `:`.  When absent, the sender is the
    /// peer the line was read from.
    pub prefix: Option<&'a str>,

    /// `Ok(command)` for known words and numerics, `Err(word)` otherwise.
    pub command: Result<Command, &'a str>,

    /// The number of filled elements of `params`.
    pub num_params: usize,

    /// The parameters.  Unused elements are empty strings.
    pub params: [&'a str; PARAMS_LENGTH],
}

impl<'a> Message<'a> {
    /// Tokenizes one line.
    ///
    /// The line may carry its CR-LF terminator.  Returns `None` when the
    /// line holds no command at all (empty lines, lone prefixes); such lines
    /// are silently dropped by the caller.
    pub fn parse(s: &'a str) -> Option<Message<'a>> {
        let mut buf = s.trim_end_matches(|c| c == '\r' || c == '\n').trim_start_matches(' ');
        if buf.is_empty() {
            return None;
        }

        let prefix = if buf.as_bytes()[0] == b':' {
            let (word, rest) = parse_word(buf);
            buf = rest;
            Some(&word[1..])
        } else {
            None
        };

        let (word, mut buf) = parse_word(buf);
        if word.is_empty() {
            return None;
        }
        let command = if word.len() == 3 && word.bytes().all(|b| b.is_ascii_digit()) {
            // Three decimal digits: a numeric reply travelling between
            // servers rather than a command word.
            Ok(Command::Reply(word.parse().unwrap()))
        } else {
            Command::parse(word).ok_or(word)
        };

        let mut params = [""; PARAMS_LENGTH];
        let mut num_params = 0;
        while !buf.is_empty() && num_params < PARAMS_LENGTH {
            if buf.as_bytes()[0] == b':' {
                params[num_params] = &buf[1..];
                num_params += 1;
                break;
            }
            if num_params == PARAMS_LENGTH - 1 {
                // The last slot takes the rest of the line even without the
                // `:` marker, per the `params` production of the grammar.
                params[num_params] = buf;
                num_params += 1;
                break;
            }
            let (word, rest) = parse_word(buf);
            params[num_params] = word;
            num_params += 1;
            buf = rest;
        }

        Some(Message {
            prefix,
            command,
            num_params,
            params,
        })
    }

    /// Whether the message carries enough parameters for its command.
    ///
    /// Unknown commands have no arity; they are answered with 421 before the
    /// count matters.
    pub fn has_enough_params(&self) -> bool {
        match self.command {
            Ok(command) => command.required_params() <= self.num_params,
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let msg = Message::parse("NICK ser\r\n").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, Ok(Command::Nick));
        assert_eq!(msg.num_params, 1);
        assert_eq!(msg.params[0], "ser");
    }

    #[test]
    fn test_parse_numeric_with_trailing() {
        let msg = Message::parse(":srv 001 alice :Welcome to IRC").unwrap();
        assert_eq!(msg.prefix, Some("srv"));
        assert_eq!(msg.command, Ok(Command::Reply(1)));
        assert_eq!(msg.num_params, 2);
        assert_eq!(msg.params[0], "alice");
        assert_eq!(msg.params[1], "Welcome to IRC");
    }

    #[test]
    fn test_parse_suppresses_empty_tokens() {
        let msg = Message::parse("MODE   #chan  +nt").unwrap();
        assert_eq!(msg.command, Ok(Command::Mode));
        assert_eq!(msg.num_params, 2);
        assert_eq!(msg.params[0], "#chan");
        assert_eq!(msg.params[1], "+nt");
    }

    #[test]
    fn test_parse_trailing_keeps_spaces_and_colons() {
        let msg = Message::parse("PRIVMSG #chan :hello :) how are  you").unwrap();
        assert_eq!(msg.num_params, 2);
        assert_eq!(msg.params[1], "hello :) how are  you");
    }

    #[test]
    fn test_parse_empty_trailing() {
        let msg = Message::parse("TOPIC #chan :").unwrap();
        assert_eq!(msg.num_params, 2);
        assert_eq!(msg.params[1], "");
    }

    #[test]
    fn test_parse_unknown_command() {
        let msg = Message::parse("FROBNICATE a b").unwrap();
        assert_eq!(msg.command, Err("FROBNICATE"));
        assert_eq!(msg.num_params, 2);
    }

    #[test]
    fn test_parse_rejects_empty_lines() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse("\r\n").is_none());
        assert!(Message::parse("   ").is_none());
        assert!(Message::parse(":prefix.only").is_none());
    }

    #[test]
    fn test_parse_fifteenth_param_takes_the_rest() {
        let msg = Message::parse("KICK a b c d e f g h i j k l m n o p q").unwrap();
        assert_eq!(msg.num_params, PARAMS_LENGTH);
        assert_eq!(msg.params[PARAMS_LENGTH - 1], "o p q");
    }

    #[test]
    fn test_has_enough_params() {
        assert!(Message::parse("NICK ser").unwrap().has_enough_params());
        assert!(!Message::parse("NICK").unwrap().has_enough_params());
        assert!(!Message::parse("USER a b c").unwrap().has_enough_params());
        assert!(Message::parse("LUSERS").unwrap().has_enough_params());
    }
}
