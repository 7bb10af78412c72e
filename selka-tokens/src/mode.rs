//! Parsing of mode strings.
//!
//! Mode strings are parsed into change requests by `UserQuery` and
//! `ChannelQuery`.  Which letters resolve at all depends on the dialect:
//! ban exceptions (`e`) and invite exceptions (`I`) appear with RFC 2810,
//! the colorless (`c`), no-notice (`T`) and half-op (`h`) modes only exist
//! in the modern dialect.

use crate::Dialect;
use std::borrow::Cow;

struct SimpleQuery<'a> {
    modes: &'a [u8],
    value: bool,
}

impl<'a> Iterator for SimpleQuery<'a> {
    type Item = (bool, u8);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.modes.is_empty() {
                return None;
            }
            match self.modes[0] {
                b'+' => {
                    self.value = true;
                }
                b'-' => {
                    self.value = false;
                }
                c => {
                    self.modes = &self.modes[1..];
                    return Some((self.value, c));
                }
            }
            self.modes = &self.modes[1..];
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Error {
    UnknownMode(char),
    MissingModeParam,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq)]
pub enum UserModeChange {
    Invisible(bool),
    Oper(bool),
    LocalOper(bool),
    Restricted(bool),
    Wallops(bool),
}

impl UserModeChange {
    pub fn value(&self) -> bool {
        use UserModeChange::*;
        match self {
            Invisible(v) | Oper(v) | LocalOper(v) | Restricted(v) | Wallops(v) => *v,
        }
    }

    pub fn symbol(&self) -> char {
        use UserModeChange::*;
        match self {
            Invisible(_) => 'i',
            Oper(_) => 'o',
            LocalOper(_) => 'O',
            Restricted(_) => 'r',
            Wallops(_) => 'w',
        }
    }
}

/// Parses user mode strings.  The user mode set is the same in every
/// dialect.
pub struct UserQuery<'a> {
    inner: SimpleQuery<'a>,
}

impl<'a> UserQuery<'a> {
    pub fn new(modes: &'a str) -> UserQuery<'a> {
        UserQuery {
            inner: SimpleQuery {
                modes: modes.as_bytes(),
                value: true,
            },
        }
    }
}

impl<'a> Iterator for UserQuery<'a> {
    type Item = Result<UserModeChange>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(value, mode)| match mode {
            b'i' => Ok(UserModeChange::Invisible(value)),
            b'o' => Ok(UserModeChange::Oper(value)),
            b'O' => Ok(UserModeChange::LocalOper(value)),
            b'r' => Ok(UserModeChange::Restricted(value)),
            b'w' => Ok(UserModeChange::Wallops(value)),
            other => Err(Error::UnknownMode(other as char)),
        })
    }
}

#[derive(Debug, PartialEq)]
pub enum ChannelModeChange<'a> {
    InviteOnly(bool),
    Moderated(bool),
    NoMsgFromOutside(bool),
    Private(bool),
    Secret(bool),
    TopicRestricted(bool),
    Colorless(bool),
    NoNotice(bool),
    Key(bool, Cow<'a, str>),
    UserLimit(Option<Cow<'a, str>>),
    GetBans,
    GetExceptions,
    GetInviteExceptions,
    ChangeBan(bool, Cow<'a, str>),
    ChangeException(bool, Cow<'a, str>),
    ChangeInviteException(bool, Cow<'a, str>),
    ChangeOperator(bool, Cow<'a, str>),
    ChangeHalfOp(bool, Cow<'a, str>),
    ChangeVoice(bool, Cow<'a, str>),
}

impl<'a> ChannelModeChange<'a> {
    pub fn value(&self) -> bool {
        use ChannelModeChange::*;
        match self {
            InviteOnly(v)
            | Moderated(v)
            | NoMsgFromOutside(v)
            | Private(v)
            | Secret(v)
            | TopicRestricted(v)
            | Colorless(v)
            | NoNotice(v)
            | Key(v, _)
            | ChangeBan(v, _)
            | ChangeException(v, _)
            | ChangeInviteException(v, _)
            | ChangeOperator(v, _)
            | ChangeHalfOp(v, _)
            | ChangeVoice(v, _) => *v,
            UserLimit(l) => l.is_some(),
            _ => false,
        }
    }

    pub fn symbol(&self) -> Option<char> {
        use ChannelModeChange::*;
        match self {
            InviteOnly(_) => Some('i'),
            Moderated(_) => Some('m'),
            NoMsgFromOutside(_) => Some('n'),
            Private(_) => Some('p'),
            Secret(_) => Some('s'),
            TopicRestricted(_) => Some('t'),
            Colorless(_) => Some('c'),
            NoNotice(_) => Some('T'),
            Key(_, _) => Some('k'),
            UserLimit(_) => Some('l'),
            ChangeBan(_, _) => Some('b'),
            ChangeException(_, _) => Some('e'),
            ChangeInviteException(_, _) => Some('I'),
            ChangeOperator(_, _) => Some('o'),
            ChangeHalfOp(_, _) => Some('h'),
            ChangeVoice(_, _) => Some('v'),
            _ => None,
        }
    }

    pub fn param(&'a self) -> Option<&'a str> {
        use ChannelModeChange::*;
        match self {
            UserLimit(Some(p))
            | Key(_, p)
            | ChangeBan(_, p)
            | ChangeException(_, p)
            | ChangeInviteException(_, p)
            | ChangeOperator(_, p)
            | ChangeHalfOp(_, p)
            | ChangeVoice(_, p) => Some(p.as_ref()),
            _ => None,
        }
    }
}

/// Parses channel mode strings, resolving letters against the given
/// dialect and consuming parameters per each mode's policy.
pub struct ChannelQuery<'a, I> {
    dialect: Dialect,
    inner: SimpleQuery<'a>,
    params: I,
}

impl<'a, I> ChannelQuery<'a, I> {
    pub fn new(dialect: Dialect, modes: &'a str, params: I) -> ChannelQuery<'a, I> {
        ChannelQuery {
            dialect,
            inner: SimpleQuery {
                modes: modes.as_bytes(),
                value: true,
            },
            params,
        }
    }
}

impl<'a> ChannelQuery<'a, std::iter::Empty<&'a str>> {
    /// A query over a mode string with no parameters, as used for default
    /// channel modes.
    pub fn simple(dialect: Dialect, modes: &'a str) -> ChannelQuery<'a, std::iter::Empty<&'a str>> {
        ChannelQuery::new(dialect, modes, std::iter::empty())
    }
}

impl<'a, I> Iterator for ChannelQuery<'a, I>
where
    I: Iterator<Item = &'a str>,
{
    type Item = Result<ChannelModeChange<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let dialect = self.dialect;
        self.inner.next().map(|(value, mode)| match mode {
            b'i' => Ok(ChannelModeChange::InviteOnly(value)),
            b'm' => Ok(ChannelModeChange::Moderated(value)),
            b'n' => Ok(ChannelModeChange::NoMsgFromOutside(value)),
            b'p' => Ok(ChannelModeChange::Private(value)),
            b's' => Ok(ChannelModeChange::Secret(value)),
            b't' => Ok(ChannelModeChange::TopicRestricted(value)),
            b'c' if dialect == Dialect::Modern => Ok(ChannelModeChange::Colorless(value)),
            b'T' if dialect == Dialect::Modern => Ok(ChannelModeChange::NoNotice(value)),
            b'k' => {
                if let Some(param) = self.params.next() {
                    Ok(ChannelModeChange::Key(value, param.into()))
                } else {
                    Err(Error::MissingModeParam)
                }
            }
            b'l' => Ok(ChannelModeChange::UserLimit(
                self.params.next().map(Into::into),
            )),
            b'b' => {
                if let Some(param) = self.params.next() {
                    Ok(ChannelModeChange::ChangeBan(value, param.into()))
                } else {
                    Ok(ChannelModeChange::GetBans)
                }
            }
            b'e' if Dialect::Rfc2810 <= dialect => {
                if let Some(param) = self.params.next() {
                    Ok(ChannelModeChange::ChangeException(value, param.into()))
                } else {
                    Ok(ChannelModeChange::GetExceptions)
                }
            }
            b'I' if Dialect::Rfc2810 <= dialect => {
                if let Some(param) = self.params.next() {
                    Ok(ChannelModeChange::ChangeInviteException(value, param.into()))
                } else {
                    Ok(ChannelModeChange::GetInviteExceptions)
                }
            }
            b'o' => {
                if let Some(param) = self.params.next() {
                    Ok(ChannelModeChange::ChangeOperator(value, param.into()))
                } else {
                    Err(Error::MissingModeParam)
                }
            }
            b'h' if dialect == Dialect::Modern => {
                if let Some(param) = self.params.next() {
                    Ok(ChannelModeChange::ChangeHalfOp(value, param.into()))
                } else {
                    Err(Error::MissingModeParam)
                }
            }
            b'v' => {
                if let Some(param) = self.params.next() {
                    Ok(ChannelModeChange::ChangeVoice(value, param.into()))
                } else {
                    Err(Error::MissingModeParam)
                }
            }
            other => Err(Error::UnknownMode(other as char)),
        })
    }
}

/// The user mode letters, for RPL_MYINFO.
pub fn user_modes(_dialect: Dialect) -> &'static str {
    "Oiorw"
}

/// The channel mode letters that never take a parameter, for RPL_MYINFO.
pub fn simple_chan_modes(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Modern => "cimnpstT",
        _ => "imnpst",
    }
}

/// The channel mode letters that take a parameter, for RPL_MYINFO.
pub fn extended_chan_modes(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Rfc1459 => "bklov",
        Dialect::Rfc2810 => "beIklov",
        Dialect::Modern => "beIhklov",
    }
}

/// The CHANMODES ISUPPORT token (lists, always-parameter, set-parameter,
/// flags), advertised by the modern dialect.
pub fn chan_modes_isupport(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Rfc1459 => "CHANMODES=b,k,l,imnpst",
        Dialect::Rfc2810 => "CHANMODES=beI,k,l,imnpst",
        Dialect::Modern => "CHANMODES=beI,k,l,cimnpstT",
    }
}

/// The PREFIX ISUPPORT token: which ranks exist and their NAMES sigils.
pub fn prefix_isupport(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Modern => "PREFIX=(ohv)@%+",
        _ => "PREFIX=(ov)@+",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan_query<'a>(
        dialect: Dialect,
        modes: &'a str,
        params: &'a [&'a str],
    ) -> Vec<Result<ChannelModeChange<'a>>> {
        ChannelQuery::new(dialect, modes, params.iter().copied()).collect()
    }

    #[test]
    fn test_user_query() {
        let changes: Vec<_> = UserQuery::new("+iw-o").collect();
        assert_eq!(
            changes,
            vec![
                Ok(UserModeChange::Invisible(true)),
                Ok(UserModeChange::Wallops(true)),
                Ok(UserModeChange::Oper(false)),
            ]
        );
        let changes: Vec<_> = UserQuery::new("x").collect();
        assert_eq!(changes, vec![Err(Error::UnknownMode('x'))]);
    }

    #[test]
    fn test_channel_query_params() {
        let changes = chan_query(Dialect::Rfc1459, "+kl", &["sesame", "42"]);
        assert_eq!(
            changes,
            vec![
                Ok(ChannelModeChange::Key(true, "sesame".into())),
                Ok(ChannelModeChange::UserLimit(Some("42".into()))),
            ]
        );
    }

    #[test]
    fn test_channel_query_list_enumeration() {
        let changes = chan_query(Dialect::Rfc2810, "b", &[]);
        assert_eq!(changes, vec![Ok(ChannelModeChange::GetBans)]);
        let changes = chan_query(Dialect::Rfc2810, "+b", &["a!b@c"]);
        assert_eq!(
            changes,
            vec![Ok(ChannelModeChange::ChangeBan(true, "a!b@c".into()))]
        );
    }

    #[test]
    fn test_channel_query_dialect_gating() {
        let changes = chan_query(Dialect::Rfc1459, "e", &[]);
        assert_eq!(changes, vec![Err(Error::UnknownMode('e'))]);
        let changes = chan_query(Dialect::Rfc2810, "e", &[]);
        assert_eq!(changes, vec![Ok(ChannelModeChange::GetExceptions)]);

        let changes = chan_query(Dialect::Rfc2810, "+h", &["nick"]);
        assert_eq!(changes, vec![Err(Error::UnknownMode('h'))]);
        let changes = chan_query(Dialect::Modern, "+h", &["nick"]);
        assert_eq!(
            changes,
            vec![Ok(ChannelModeChange::ChangeHalfOp(true, "nick".into()))]
        );

        let changes = chan_query(Dialect::Rfc2810, "+c", &[]);
        assert_eq!(changes, vec![Err(Error::UnknownMode('c'))]);
    }

    #[test]
    fn test_missing_param() {
        let changes = chan_query(Dialect::Modern, "+o", &[]);
        assert_eq!(changes, vec![Err(Error::MissingModeParam)]);
    }
}
