use std::fmt;
use std::str::FromStr;

/// The protocol dialect spoken by a server.
///
/// The dialect decides which commands are known, which channel/user modes
/// exist, how nicknames may be spelled and how names are case-folded.
/// Ordering follows inclusion: `Rfc2810` is a superset of `Rfc1459`, and
/// `Modern` a superset of both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dialect {
    Rfc1459,
    Rfc2810,
    Modern,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Modern
    }
}

impl FromStr for Dialect {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        if s.eq_ignore_ascii_case("rfc1459") || s == "1459" {
            Ok(Dialect::Rfc1459)
        } else if s.eq_ignore_ascii_case("rfc2810") || s == "2810" {
            Ok(Dialect::Rfc2810)
        } else if s.eq_ignore_ascii_case("modern") {
            Ok(Dialect::Modern)
        } else {
            Err(())
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Rfc1459 => write!(f, "rfc1459"),
            Dialect::Rfc2810 => write!(f, "rfc2810"),
            Dialect::Modern => write!(f, "modern"),
        }
    }
}

macro_rules! commands {
    { $( $Variant:ident => $word:literal, $required:literal; )+ } => {
        /// The command of an IRC message.
        ///
        /// `Reply` carries an incoming three-digit numeric; those are routed
        /// to the server-to-server path and never answered directly.
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum Command {
            $( $Variant, )+
            Reply(u16),
        }

        impl Command {
            /// Looks a command word up, case-insensitively.
            pub fn parse(s: &str) -> Option<Command> {
                $( if s.eq_ignore_ascii_case($word) { return Some(Command::$Variant); } )+
                None
            }

            /// The wire spelling of the command.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Command::$Variant => $word, )+
                    Command::Reply(_) => "",
                }
            }

            /// The number of parameters the dispatcher requires before the
            /// handler runs.
            pub fn required_params(&self) -> usize {
                match self {
                    $( Command::$Variant => $required, )+
                    Command::Reply(_) => 0,
                }
            }
        }
    }
}

commands! {
    Admin => "ADMIN", 0;
    Away => "AWAY", 0;
    Cap => "CAP", 1;
    Connect => "CONNECT", 1;
    Die => "DIE", 0;
    Error => "ERROR", 0;
    Info => "INFO", 0;
    Invite => "INVITE", 2;
    IsOn => "ISON", 1;
    Join => "JOIN", 1;
    Kick => "KICK", 2;
    Kill => "KILL", 2;
    Knock => "KNOCK", 1;
    Language => "LANGUAGE", 0;
    Links => "LINKS", 0;
    List => "LIST", 0;
    Lusers => "LUSERS", 0;
    Mode => "MODE", 1;
    Motd => "MOTD", 0;
    Names => "NAMES", 0;
    Nick => "NICK", 1;
    Notice => "NOTICE", 2;
    Oper => "OPER", 2;
    Part => "PART", 1;
    Pass => "PASS", 1;
    Ping => "PING", 1;
    Pong => "PONG", 1;
    PrivMsg => "PRIVMSG", 2;
    Quit => "QUIT", 0;
    Rehash => "REHASH", 0;
    Restart => "RESTART", 0;
    Server => "SERVER", 3;
    Service => "SERVICE", 6;
    ServList => "SERVLIST", 0;
    Silence => "SILENCE", 0;
    SQuery => "SQUERY", 2;
    SQuit => "SQUIT", 1;
    Stats => "STATS", 0;
    Summon => "SUMMON", 1;
    Time => "TIME", 0;
    Topic => "TOPIC", 1;
    Trace => "TRACE", 0;
    User => "USER", 4;
    UserHost => "USERHOST", 1;
    Version => "VERSION", 0;
    Wallops => "WALLOPS", 1;
    Who => "WHO", 0;
    Whois => "WHOIS", 1;
    Whowas => "WHOWAS", 1;
}

impl Command {
    /// Whether the command exists at all in the given dialect.
    ///
    /// Disabled commands are indistinguishable from unknown words.
    pub fn is_enabled(&self, dialect: Dialect) -> bool {
        match self {
            Command::ServList | Command::SQuery => Dialect::Rfc2810 <= dialect,
            Command::Cap | Command::Knock | Command::Language | Command::Silence => {
                dialect == Dialect::Modern
            }
            _ => true,
        }
    }

    /// Whether an unregistered connection may issue the command.
    pub fn accepted_unregistered(&self) -> bool {
        matches!(
            self,
            Command::Pass | Command::Nick | Command::User | Command::Cap | Command::Quit
        )
    }

    /// Whether the command is reserved to IRC operators.
    pub fn oper_only(&self) -> bool {
        matches!(
            self,
            Command::Connect
                | Command::Die
                | Command::Kill
                | Command::Rehash
                | Command::Restart
                | Command::SQuit
                | Command::Wallops
        )
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Reply(code) => write!(f, "{:03}", code),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Command::parse("privmsg"), Some(Command::PrivMsg));
        assert_eq!(Command::parse("PrivMsg"), Some(Command::PrivMsg));
        assert_eq!(Command::parse("WHOWAS"), Some(Command::Whowas));
        assert_eq!(Command::parse("frobnicate"), None);
    }

    #[test]
    fn test_dialect_gating() {
        assert!(Command::Join.is_enabled(Dialect::Rfc1459));
        assert!(!Command::ServList.is_enabled(Dialect::Rfc1459));
        assert!(Command::ServList.is_enabled(Dialect::Rfc2810));
        assert!(!Command::Cap.is_enabled(Dialect::Rfc2810));
        assert!(Command::Cap.is_enabled(Dialect::Modern));
        assert!(Command::Silence.is_enabled(Dialect::Modern));
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("rfc1459".parse(), Ok(Dialect::Rfc1459));
        assert_eq!("RFC2810".parse(), Ok(Dialect::Rfc2810));
        assert_eq!("modern".parse(), Ok(Dialect::Modern));
        assert!("rfc2812".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_registration_gate() {
        assert!(Command::Nick.accepted_unregistered());
        assert!(Command::Quit.accepted_unregistered());
        assert!(!Command::Join.accepted_unregistered());
        assert!(!Command::Whois.accepted_unregistered());
    }
}
