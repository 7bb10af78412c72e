use crate::util;
use selka_tokens::rpl::{self, Reply};
use selka_tokens::{Dialect, MessageBuffer, mode};
use std::collections::{HashMap, HashSet};

/// Channel semantics, selected by the first character of the name.
///
/// Only `#` channels exist today; the registry shape is kept so that `&`,
/// `+` or `!` channels can be added without touching consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Normal,
}

impl ChannelKind {
    pub fn from_prefix(prefix: char) -> Option<ChannelKind> {
        match prefix {
            '#' => Some(ChannelKind::Normal),
            _ => None,
        }
    }

    pub fn supports_modes(self) -> bool {
        match self {
            ChannelKind::Normal => true,
        }
    }

    pub fn supports_bans(self) -> bool {
        match self {
            ChannelKind::Normal => true,
        }
    }

    pub fn supports_invites(self) -> bool {
        match self {
            ChannelKind::Normal => true,
        }
    }

    /// The CHANTYPES ISUPPORT value.
    pub fn prefixes() -> &'static str {
        "#"
    }
}

/// Modes applied to clients on a per-channel basis.
///
/// https://tools.ietf.org/html/rfc2811.html#section-4.1
#[derive(Clone, Copy, Default)]
pub struct MemberModes {
    pub operator: bool,
    pub half_op: bool,
    pub voice: bool,
}

impl MemberModes {
    pub fn symbol(&self) -> Option<char> {
        if self.operator {
            Some('@')
        } else if self.half_op {
            Some('%')
        } else if self.voice {
            Some('+')
        } else {
            None
        }
    }

    pub fn has_voice(&self) -> bool {
        self.voice || self.half_op || self.operator
    }

    /// Whether a member with these modes may apply the given change.
    ///
    /// Channel flags, key, limit and rank changes need op; in the modern
    /// dialect half-ops may manage the ban-like lists and voice.
    pub fn can_set(&self, change: &mode::ChannelModeChange<'_>, dialect: Dialect) -> bool {
        use mode::ChannelModeChange::*;
        if self.operator {
            return true;
        }
        if self.half_op && dialect == Dialect::Modern {
            return matches!(
                change,
                GetBans
                    | GetExceptions
                    | GetInviteExceptions
                    | ChangeBan(_, _)
                    | ChangeException(_, _)
                    | ChangeInviteException(_, _)
                    | ChangeVoice(_, _)
            );
        }
        false
    }
}

/// An entry of a ban-like mask list.
pub struct MaskListEntry {
    pub mask: String,
    pub set_by: String,
    pub set_at: u64,
}

pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: u64,
}

/// Channel data.
pub struct Channel {
    /// The display form of the name; lookups go through the case-folded
    /// key of `StateInner::channels`.
    pub name: String,
    pub kind: ChannelKind,
    pub created_at: u64,

    /// Set of channel members, identified by their connection id, and
    /// associated with their rank.
    pub members: HashMap<usize, MemberModes>,

    pub topic: Option<Topic>,

    pub user_limit: Option<usize>,
    pub key: Option<String>,

    // https://tools.ietf.org/html/rfc2811.html#section-4.3
    pub ban_mask: Vec<MaskListEntry>,
    pub exception_mask: Vec<MaskListEntry>,
    pub invex_mask: Vec<MaskListEntry>,

    /// Case-folded nicks let in by INVITE while the channel is
    /// invite-only.  Consumed on join.
    pub invites: HashSet<String>,

    // Modes: https://tools.ietf.org/html/rfc2811.html#section-4.2
    pub invite_only: bool,
    pub moderated: bool,
    pub no_privmsg_from_outside: bool,
    pub private: bool,
    pub secret: bool,
    pub topic_restricted: bool,
    pub colorless: bool,
    pub no_notice: bool,
}

impl Channel {
    /// Creates a channel with the given default modes set.
    pub fn new(name: &str, kind: ChannelKind, dialect: Dialect, modes: &str) -> Channel {
        let mut chan = Channel {
            name: name.to_owned(),
            kind,
            created_at: util::time_now(),
            members: HashMap::new(),
            topic: None,
            user_limit: None,
            key: None,
            ban_mask: Vec::new(),
            exception_mask: Vec::new(),
            invex_mask: Vec::new(),
            invites: HashSet::new(),
            invite_only: false,
            moderated: false,
            no_privmsg_from_outside: false,
            private: false,
            secret: false,
            topic_restricted: false,
            colorless: false,
            no_notice: false,
        };
        if kind.supports_modes() {
            for change in mode::ChannelQuery::simple(dialect, modes).filter_map(Result::ok) {
                let _ = chan.apply_mode_change(dialect, change, "", |_| "");
            }
        }
        chan
    }

    /// Adds a member.  The first member created the channel and is made
    /// operator; half-op is never granted this way.
    pub fn add_member(&mut self, id: usize) {
        let modes = MemberModes {
            operator: self.members.is_empty(),
            half_op: false,
            voice: false,
        };
        self.members.insert(id, modes);
    }

    pub fn remove_member(&mut self, id: usize) {
        self.members.remove(&id);
    }

    pub fn list_entry(&self, msg: MessageBuffer<'_>) {
        msg.param(self.members.len().to_string())
            .trailing_param(self.topic.as_ref().map(|t| t.text.as_ref()).unwrap_or(""));
    }

    /// Whether the usermask is covered by a ban and not by an exception.
    pub fn is_banned(&self, mask: &str) -> bool {
        self.ban_mask.iter().any(|e| util::mask_matches(&e.mask, mask))
            && !self.exception_mask.iter().any(|e| util::mask_matches(&e.mask, mask))
    }

    /// Whether the invite-only gate lets this user in, either because the
    /// channel is open, or through an INVITE, or an invite exception.
    pub fn is_invited(&self, folded_nick: &str, mask: &str) -> bool {
        !self.invite_only
            || self.invites.contains(folded_nick)
            || self.invex_mask.iter().any(|e| util::mask_matches(&e.mask, mask))
    }

    /// Whether a message from this sender reaches the channel, per the
    /// `n`, `m` and ban checks.  Text-dependent checks (`c`, `T`) are the
    /// caller's.
    pub fn can_talk(&self, id: usize, mask: &str) -> bool {
        let member = self.members.get(&id);
        if self.moderated {
            return member.map(|m| m.has_voice()).unwrap_or(false);
        }
        if member.is_none() && self.no_privmsg_from_outside {
            return false;
        }
        !self.is_banned(mask)
    }

    /// Writes the channel modes, as for RPL_CHANNELMODEIS.  Parameters are
    /// only revealed to members (`full_info`).
    pub fn modes(&self, mut out: MessageBuffer<'_>, full_info: bool) {
        let modes = out.raw_param();
        modes.push('+');
        if self.colorless { modes.push('c'); }
        if self.invite_only { modes.push('i'); }
        if self.moderated { modes.push('m'); }
        if self.no_privmsg_from_outside { modes.push('n'); }
        if self.private { modes.push('p'); }
        if self.secret { modes.push('s'); }
        if self.topic_restricted { modes.push('t'); }
        if self.no_notice { modes.push('T'); }
        if self.user_limit.is_some() { modes.push('l'); }
        if self.key.is_some() { modes.push('k'); }

        if full_info {
            if let Some(user_limit) = self.user_limit {
                out = out.param(user_limit.to_string());
            }
            if let Some(ref key) = self.key {
                out = out.param(key.to_owned());
            }
        }
        out.build();
    }

    /// Applies one mode change and reports whether anything changed.
    ///
    /// Rank changes resolve their nick parameter through `nick_of`; list
    /// changes are deduplicated by mask and record `set_by` with a
    /// timestamp.
    pub fn apply_mode_change<'b, F>(
        &mut self,
        dialect: Dialect,
        change: mode::ChannelModeChange<'_>,
        set_by: &str,
        nick_of: F,
    ) -> Result<bool, Reply>
    where
        F: Fn(usize) -> &'b str,
    {
        use mode::ChannelModeChange::*;
        let mut applied = false;
        match change {
            InviteOnly(value) => {
                applied = self.invite_only != value;
                self.invite_only = value;
            }
            Moderated(value) => {
                applied = self.moderated != value;
                self.moderated = value;
            }
            NoMsgFromOutside(value) => {
                applied = self.no_privmsg_from_outside != value;
                self.no_privmsg_from_outside = value;
            }
            Private(value) => {
                applied = self.private != value;
                self.private = value;
            }
            Secret(value) => {
                applied = self.secret != value;
                self.secret = value;
            }
            TopicRestricted(value) => {
                applied = self.topic_restricted != value;
                self.topic_restricted = value;
            }
            Colorless(value) => {
                applied = self.colorless != value;
                self.colorless = value;
            }
            NoNotice(value) => {
                applied = self.no_notice != value;
                self.no_notice = value;
            }
            Key(value, key) => {
                if value {
                    if self.key.is_some() {
                        return Err(rpl::ERR_KEYSET);
                    }
                    applied = true;
                    self.key = Some(key.into_owned());
                } else if let Some(ref chan_key) = self.key {
                    if *chan_key == key {
                        applied = true;
                        self.key = None;
                    }
                }
            }
            UserLimit(Some(s)) => {
                if let Ok(limit) = s.parse() {
                    if limit > 0 {
                        applied = self.user_limit.map_or(true, |chan_limit| chan_limit != limit);
                        self.user_limit = Some(limit);
                    }
                }
            }
            UserLimit(None) => {
                applied = self.user_limit.is_some();
                self.user_limit = None;
            }
            ChangeBan(value, param) => {
                applied = update_mask_list(&mut self.ban_mask, value, &param, set_by);
            }
            ChangeException(value, param) => {
                applied = update_mask_list(&mut self.exception_mask, value, &param, set_by);
            }
            ChangeInviteException(value, param) => {
                applied = update_mask_list(&mut self.invex_mask, value, &param, set_by);
            }
            ChangeOperator(value, param) => {
                applied = self.change_rank(&param, nick_of, |m| {
                    let changed = m.operator != value;
                    m.operator = value;
                    changed
                })?;
            }
            ChangeHalfOp(value, param) => {
                if dialect != Dialect::Modern {
                    return Ok(false);
                }
                applied = self.change_rank(&param, nick_of, |m| {
                    let changed = m.half_op != value;
                    m.half_op = value;
                    changed
                })?;
            }
            ChangeVoice(value, param) => {
                applied = self.change_rank(&param, nick_of, |m| {
                    let changed = m.voice != value;
                    m.voice = value;
                    changed
                })?;
            }
            _ => {}
        }
        Ok(applied)
    }

    fn change_rank<'b, F, G>(&mut self, nick: &str, nick_of: F, apply: G) -> Result<bool, Reply>
    where
        F: Fn(usize) -> &'b str,
        G: Fn(&mut MemberModes) -> bool,
    {
        for (member, modes) in self.members.iter_mut() {
            if nick_of(*member).eq_ignore_ascii_case(nick) {
                return Ok(apply(modes));
            }
        }
        Err(rpl::ERR_USERNOTINCHANNEL)
    }

    /// The channel status symbol used in NAMES and WHO replies.
    pub fn symbol(&self) -> &'static str {
        if self.secret {
            "@"
        } else if self.private {
            "*"
        } else {
            "="
        }
    }

    /// Whether the channel is hidden from a client that is not a member.
    pub fn is_hidden_from_outside(&self) -> bool {
        self.secret || self.private
    }
}

/// Inserts or removes a mask, keeping the list deduplicated.
fn update_mask_list(list: &mut Vec<MaskListEntry>, insert: bool, mask: &str, set_by: &str) -> bool {
    if insert {
        if list.iter().any(|e| e.mask == mask) {
            return false;
        }
        list.push(MaskListEntry {
            mask: mask.to_owned(),
            set_by: set_by.to_owned(),
            set_at: util::time_now(),
        });
        true
    } else {
        let before = list.len();
        list.retain(|e| e.mask != mask);
        before != list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selka_tokens::Buffer;

    fn channel(dialect: Dialect) -> Channel {
        Channel::new("#test", ChannelKind::Normal, dialect, "+n")
    }

    #[test]
    fn test_new_applies_default_modes() {
        let chan = channel(Dialect::Modern);
        assert!(chan.no_privmsg_from_outside);
        assert!(!chan.moderated);
    }

    #[test]
    fn test_first_member_is_operator() {
        let mut chan = channel(Dialect::Modern);
        chan.add_member(1);
        chan.add_member(2);
        assert!(chan.members[&1].operator);
        assert!(!chan.members[&1].half_op);
        assert!(!chan.members[&2].operator);
    }

    #[test]
    fn test_ban_and_exception() {
        let mut chan = channel(Dialect::Modern);
        let _ = chan.apply_mode_change(
            Dialect::Modern,
            mode::ChannelModeChange::ChangeBan(true, "*!*@bad.host".into()),
            "op!op@srv",
            |_| "",
        );
        assert!(chan.is_banned("troll!x@bad.host"));
        assert!(!chan.is_banned("alice!a@good.host"));

        let _ = chan.apply_mode_change(
            Dialect::Modern,
            mode::ChannelModeChange::ChangeException(true, "troll!*@*".into()),
            "op!op@srv",
            |_| "",
        );
        assert!(!chan.is_banned("troll!x@bad.host"));
    }

    #[test]
    fn test_mask_lists_are_deduplicated() {
        let mut chan = channel(Dialect::Modern);
        for _ in 0..2 {
            let _ = chan.apply_mode_change(
                Dialect::Modern,
                mode::ChannelModeChange::ChangeBan(true, "a!b@c".into()),
                "op!op@srv",
                |_| "",
            );
        }
        assert_eq!(chan.ban_mask.len(), 1);
        assert_eq!(chan.ban_mask[0].set_by, "op!op@srv");
    }

    #[test]
    fn test_key_cannot_be_replaced() {
        let mut chan = channel(Dialect::Modern);
        let ok = chan.apply_mode_change(
            Dialect::Modern,
            mode::ChannelModeChange::Key(true, "sesame".into()),
            "",
            |_| "",
        );
        assert_eq!(ok, Ok(true));
        let err = chan.apply_mode_change(
            Dialect::Modern,
            mode::ChannelModeChange::Key(true, "other".into()),
            "",
            |_| "",
        );
        assert_eq!(err, Err(rpl::ERR_KEYSET));
    }

    #[test]
    fn test_moderated_needs_voice() {
        let mut chan = channel(Dialect::Modern);
        chan.add_member(1);
        chan.add_member(2);
        chan.moderated = true;
        assert!(chan.can_talk(1, "op!op@srv"));
        assert!(!chan.can_talk(2, "bob!bob@srv"));
        chan.members.get_mut(&2).unwrap().voice = true;
        assert!(chan.can_talk(2, "bob!bob@srv"));
    }

    #[test]
    fn test_outside_messages_blocked_by_n() {
        let mut chan = channel(Dialect::Modern);
        chan.add_member(1);
        assert!(!chan.can_talk(7, "out!sider@srv"));
        chan.no_privmsg_from_outside = false;
        assert!(chan.can_talk(7, "out!sider@srv"));
    }

    #[test]
    fn test_half_op_rights() {
        let halfop = MemberModes { operator: false, half_op: true, voice: false };
        let ban = mode::ChannelModeChange::ChangeBan(true, "a!b@c".into());
        let op_grant = mode::ChannelModeChange::ChangeOperator(true, "x".into());
        assert!(halfop.can_set(&ban, Dialect::Modern));
        assert!(!halfop.can_set(&ban, Dialect::Rfc2810));
        assert!(!halfop.can_set(&op_grant, Dialect::Modern));
    }

    #[test]
    fn test_modes_reply() {
        let mut chan = channel(Dialect::Modern);
        chan.user_limit = Some(12);
        chan.key = Some("sesame".to_owned());
        let mut buf = Buffer::new();
        chan.modes(buf.message("srv", "324"), true);
        assert_eq!(buf.build(), ":srv 324 +nlk 12 sesame\r\n");
    }
}
