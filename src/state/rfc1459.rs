//! Handlers for the commands defined in RFC 1459.

use crate::channel::{Channel, ChannelKind, MemberModes, Topic};
use crate::net::Control;
use crate::{lines, util};
use selka_tokens::{Buffer, Command, Dialect, mode, rpl};
use super::{
    CommandContext, HandlerResult, StateInner, WhowasEntry, channel_kind_of, find_channel,
    find_member, find_nick, is_valid_nickname,
};

/// Control and formatting bytes rejected by the colorless channel mode.
fn has_color_codes(text: &str) -> bool {
    text.bytes()
        .any(|b| b == 0x02 || b == 0x03 || b == 0x16 || b == 0x1d || b == 0x1f)
}

/// Registration and connection commands.
impl StateInner {
    pub fn cmd_nick(&mut self, ctx: CommandContext<'_>, nick: &str) -> HandlerResult {
        let id = ctx.id;
        let first_is_letter = nick.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
        if !is_valid_nickname(self.dialect, nick, self.nicklen)
            || (self.dialect != Dialect::Modern && !first_is_letter)
        {
            log::debug!("{}:         invalid nickname", id);
            ctx.rb
                .reply(rpl::ERR_ERRONEUSNICKNAME)
                .param(nick)
                .trailing_param(lines::ERRONEOUS_NICKNAME);
            return Err(());
        }

        let folded = self.fold(nick);
        let taken = self
            .clients
            .iter()
            .any(|(cid, c)| cid != id && c.nick() != "*" && self.fold(c.nick()) == folded);
        if taken {
            log::debug!("{}:         nickname in use", id);
            ctx.rb
                .reply(rpl::ERR_NICKNAMEINUSE)
                .param(nick)
                .trailing_param(lines::NICKNAME_IN_USE);
            return Err(());
        }

        if self.clients[id].is_registered() {
            let mut buf = Buffer::new();
            buf.message(self.clients[id].full_name(), Command::Nick).trailing_param(nick);
            let entry = WhowasEntry::of(&self.clients[id]);
            self.send_to_peers(id, buf.into());
            self.remember_nick(entry);
            self.rename_user(id, nick);
        } else {
            self.clients.get_mut(id).unwrap().set_nick(nick);
        }
        Ok(())
    }

    pub fn cmd_user(&mut self, ctx: CommandContext<'_>, user: &str, mode_mask: &str,
                    real: &str) -> HandlerResult
    {
        let userlen = self.userlen;
        let client = self.clients.get_mut(ctx.id).unwrap();
        client.set_user_real(util::truncate(user, userlen), real);
        client.apply_user_mode_mask(mode_mask);
        Ok(())
    }

    pub fn cmd_pass(&mut self, ctx: CommandContext<'_>, pass: &str) -> HandlerResult {
        let ok = match self.password {
            Some(ref password) => password.as_str() == pass,
            None => true,
        };
        if ok {
            self.clients.get_mut(ctx.id).unwrap().pass_satisfied = true;
            Ok(())
        } else {
            log::debug!("{}:         bad password", ctx.id);
            self.clients[ctx.id].send(crate::client::error_line(lines::BAD_PASSWORD));
            self.remove_client(ctx.id, None);
            Err(())
        }
    }

    pub fn cmd_quit(&mut self, ctx: CommandContext<'_>, reason: &str) -> HandlerResult {
        let reason = if reason.is_empty() { None } else { Some(reason) };
        self.remove_client(ctx.id, reason);
        Err(())
    }

    pub fn cmd_ping(&mut self, ctx: CommandContext<'_>, origin: &str) -> HandlerResult {
        ctx.rb
            .prefixed_message(Command::Pong)
            .param(&self.domain)
            .trailing_param(origin);
        Ok(())
    }

    pub fn cmd_oper(&mut self, ctx: CommandContext<'_>, name: &str, pass: &str) -> HandlerResult {
        if self.opers.is_empty() {
            ctx.rb.reply(rpl::ERR_NOOPERHOST).trailing_param(lines::NO_OPER_HOST);
            return Err(());
        }
        let entry = self
            .opers
            .iter()
            .find(|(n, p, _)| n.as_str() == name && p.as_str() == pass);
        let local = match entry {
            Some((_, _, local)) => *local,
            None => {
                log::debug!("{}:         bad OPER credentials", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_PASSWDMISMATCH)
                    .trailing_param(lines::PASSWORD_MISMATCH);
                return Err(());
            }
        };
        let client = self.clients.get_mut(ctx.id).unwrap();
        if local {
            client.local_operator = true;
        } else {
            client.operator = true;
        }
        log::info!("{}: Now operator as {}", ctx.id, name);
        let nick = client.nick().to_owned();
        ctx.rb.reply(rpl::YOUREOPER).trailing_param(lines::YOURE_OPER);
        ctx.rb
            .prefixed_message(Command::Mode)
            .param(&nick)
            .trailing_param(if local { "+O" } else { "+o" });
        Ok(())
    }

    pub fn cmd_error(&mut self, ctx: CommandContext<'_>, msg: &str) -> HandlerResult {
        // Diagnostic from the peer; servers never answer ERROR.
        log::warn!("{}: ERROR from peer: {}", ctx.id, msg);
        Ok(())
    }
}

/// Channel commands.
impl StateInner {
    pub fn cmd_join(&mut self, ctx: CommandContext<'_>, targets: &str, keys: &str) -> HandlerResult {
        if targets == "0" {
            let names: Vec<String> = self
                .channels
                .values()
                .filter(|c| c.members.contains_key(&ctx.id))
                .map(|c| c.name.clone())
                .collect();
            for name in names {
                let _ = self.part_channel(ctx.id, ctx.rb, &name, "");
            }
            return Ok(());
        }
        let mut keys = keys.split(',');
        for target in targets.split(',').filter(|s| !s.is_empty()) {
            let key = keys.next().unwrap_or("");
            let _ = self.join_channel(ctx.id, ctx.rb, target, key);
        }
        Ok(())
    }

    fn join_channel(&mut self, id: usize, rb: &mut selka_tokens::ReplyBuffer, name: &str,
                    key: &str) -> HandlerResult
    {
        let folded = self.fold(name);
        if self.channels.get(&folded).map_or(false, |c| c.members.contains_key(&id)) {
            // Already a member: no state change and no numeric.
            return Ok(());
        }
        let kind = match channel_kind_of(name, self.channellen) {
            Some(kind) => kind,
            None => {
                log::debug!("{}:         invalid channel name", id);
                rb.reply(rpl::ERR_NOSUCHCHANNEL)
                    .param(name)
                    .trailing_param(lines::NO_SUCH_CHANNEL);
                return Err(());
            }
        };
        let joined = self.channels.values().filter(|c| c.members.contains_key(&id)).count();
        if self.max_channels <= joined {
            rb.reply(rpl::ERR_TOOMANYCHANNELS)
                .param(name)
                .trailing_param(lines::TOO_MANY_CHANNELS);
            return Err(());
        }

        let mask = self.clients[id].full_name().to_owned();
        let folded_nick = self.fold(self.clients[id].nick());
        if let Some(channel) = self.channels.get(&folded) {
            // Gates, in order: key, user limit, invite-only, ban.
            if let Some(ref chan_key) = channel.key {
                if chan_key.as_str() != key {
                    rb.reply(rpl::ERR_BADCHANNELKEY)
                        .param(name)
                        .trailing_param(lines::BAD_CHAN_KEY);
                    return Err(());
                }
            }
            if let Some(limit) = channel.user_limit {
                if limit <= channel.members.len() {
                    rb.reply(rpl::ERR_CHANNELISFULL)
                        .param(name)
                        .trailing_param(lines::CHANNEL_IS_FULL);
                    return Err(());
                }
            }
            if channel.kind.supports_invites() && !channel.is_invited(&folded_nick, &mask) {
                rb.reply(rpl::ERR_INVITEONLYCHAN)
                    .param(name)
                    .trailing_param(lines::INVITE_ONLY_CHAN);
                return Err(());
            }
            if channel.kind.supports_bans() && channel.is_banned(&mask) {
                rb.reply(rpl::ERR_BANNEDFROMCHAN)
                    .param(name)
                    .trailing_param(lines::BANNED_FROM_CHAN);
                return Err(());
            }
        }

        let dialect = self.dialect;
        let default_chan_mode = self.default_chan_mode.clone();
        let channel = self
            .channels
            .entry(folded.clone())
            .or_insert_with(|| Channel::new(name, kind, dialect, &default_chan_mode));
        channel.add_member(id);
        channel.invites.remove(&folded_nick);
        let display = channel.name.clone();

        let mut join = Buffer::new();
        join.message(&mask, Command::Join).trailing_param(&display);
        self.broadcast(&folded, join.into());

        let channel = &self.channels[&folded];
        self.write_topic(rb, channel, &display);
        self.write_names(id, rb, &display);
        Ok(())
    }

    pub fn cmd_part(&mut self, ctx: CommandContext<'_>, targets: &str, reason: &str) -> HandlerResult {
        for target in targets.split(',').filter(|s| !s.is_empty()) {
            let _ = self.part_channel(ctx.id, ctx.rb, target, reason);
        }
        Ok(())
    }

    fn part_channel(&mut self, id: usize, rb: &mut selka_tokens::ReplyBuffer, name: &str,
                    reason: &str) -> HandlerResult
    {
        let folded = self.fold(name);
        let channel = find_channel(id, rb, &self.channels, &folded, name)?;
        find_member(id, rb, channel, name)?;

        let mask = self.clients[id].full_name().to_owned();
        let mut part = Buffer::new();
        {
            let msg = part.message(&mask, Command::Part).param(name);
            if reason.is_empty() {
                msg.build();
            } else {
                msg.trailing_param(reason);
            }
        }
        self.broadcast(&folded, part.into());

        let channel = self.channels.get_mut(&folded).unwrap();
        channel.remove_member(id);
        if channel.members.is_empty() {
            self.channels.remove(&folded);
        }
        Ok(())
    }

    pub fn cmd_topic(&mut self, ctx: CommandContext<'_>, target: &str,
                     topic: Option<&str>) -> HandlerResult
    {
        let id = ctx.id;
        let folded = self.fold(target);
        let channel = find_channel(id, ctx.rb, &self.channels, &folded, target)?;
        let member = find_member(id, ctx.rb, channel, target)?;

        let text = match topic {
            None => {
                self.write_topic(ctx.rb, channel, target);
                return Ok(());
            }
            Some(text) => text,
        };
        if channel.topic_restricted && !member.operator {
            log::debug!("{}:         not operator", id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(target)
                .trailing_param(lines::CHANOP_PRIVS_NEEDED);
            return Err(());
        }

        let text = util::truncate(text, self.topiclen);
        let mask = self.clients[id].full_name().to_owned();
        let channel = self.channels.get_mut(&folded).unwrap();
        channel.topic = if text.is_empty() {
            None
        } else {
            Some(Topic {
                text: text.to_owned(),
                set_by: mask.clone(),
                set_at: util::time_now(),
            })
        };

        let mut buf = Buffer::new();
        buf.message(&mask, Command::Topic).param(target).trailing_param(text);
        self.broadcast(&folded, buf.into());
        Ok(())
    }

    pub fn cmd_invite(&mut self, ctx: CommandContext<'_>, nick: &str, target: &str) -> HandlerResult {
        let id = ctx.id;
        let folded_nick = self.fold(nick);
        let (tid, _) = find_nick(id, ctx.rb, &self.clients, &self.nicks, &folded_nick, nick)?;

        let folded_chan = self.fold(target);
        if let Some(channel) = self.channels.get(&folded_chan) {
            let member = find_member(id, ctx.rb, channel, target)?;
            if channel.members.contains_key(&tid) {
                ctx.rb
                    .reply(rpl::ERR_USERONCHANNEL)
                    .param(nick)
                    .param(target)
                    .trailing_param(lines::USER_ON_CHANNEL);
                return Err(());
            }
            if channel.invite_only && !member.operator {
                ctx.rb
                    .reply(rpl::ERR_CHANOPRIVSNEEDED)
                    .param(target)
                    .trailing_param(lines::CHANOP_PRIVS_NEEDED);
                return Err(());
            }
        }
        if let Some(channel) = self.channels.get_mut(&folded_chan) {
            channel.invites.insert(folded_nick);
        }

        ctx.rb.reply(rpl::INVITING).param(target).param(nick);
        if let Some(ref away) = self.clients[tid].away {
            ctx.rb.reply(rpl::AWAY).param(nick).trailing_param(away);
        }

        let mask = self.clients[id].full_name().to_owned();
        let mut buf = Buffer::new();
        buf.message(&mask, Command::Invite).param(nick).trailing_param(target);
        self.send(tid, buf.into());
        Ok(())
    }

    pub fn cmd_kick(&mut self, ctx: CommandContext<'_>, targets: &str, users: &str,
                    reason: &str) -> HandlerResult
    {
        let chans: Vec<&str> = targets.split(',').filter(|s| !s.is_empty()).collect();
        let users: Vec<&str> = users.split(',').filter(|s| !s.is_empty()).collect();
        if chans.len() == 1 {
            for user in &users {
                let _ = self.kick_member(ctx.id, ctx.rb, chans[0], user, reason);
            }
        } else if chans.len() == users.len() {
            for (chan, user) in chans.iter().zip(users.iter()) {
                let _ = self.kick_member(ctx.id, ctx.rb, chan, user, reason);
            }
        } else {
            ctx.rb
                .reply(rpl::ERR_NEEDMOREPARAMS)
                .param(Command::Kick.as_str())
                .trailing_param(lines::NEED_MORE_PARAMS);
            return Err(());
        }
        Ok(())
    }

    fn kick_member(&mut self, id: usize, rb: &mut selka_tokens::ReplyBuffer, name: &str,
                   nick: &str, reason: &str) -> HandlerResult
    {
        let folded = self.fold(name);
        let channel = find_channel(id, rb, &self.channels, &folded, name)?;
        let member = find_member(id, rb, channel, name)?;

        let folded_nick = self.fold(nick);
        let target_modes = self
            .nicks
            .get(&folded_nick)
            .and_then(|tid| channel.members.get(tid).map(|m| (*tid, *m)));
        let (tid, target_modes) = match target_modes {
            Some(found) => found,
            None => {
                rb.reply(rpl::ERR_USERNOTINCHANNEL)
                    .param(nick)
                    .param(name)
                    .trailing_param(lines::USER_NOT_IN_CHANNEL);
                return Err(());
            }
        };

        let allowed = member.operator
            || (self.dialect == Dialect::Modern
                && member.half_op
                && !target_modes.operator
                && !target_modes.half_op);
        if !allowed {
            log::debug!("{}:         not operator", id);
            rb.reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(name)
                .trailing_param(lines::CHANOP_PRIVS_NEEDED);
            return Err(());
        }

        let mask = self.clients[id].full_name().to_owned();
        let kicker_nick = self.clients[id].nick().to_owned();
        let reason = if reason.is_empty() { kicker_nick.as_str() } else { reason };
        let mut buf = Buffer::new();
        buf.message(&mask, Command::Kick)
            .param(name)
            .param(nick)
            .trailing_param(util::truncate(reason, self.kicklen));
        self.broadcast(&folded, buf.into());

        let channel = self.channels.get_mut(&folded).unwrap();
        channel.remove_member(tid);
        if channel.members.is_empty() {
            self.channels.remove(&folded);
        }
        Ok(())
    }

    pub fn cmd_names(&mut self, ctx: CommandContext<'_>, targets: &str) -> HandlerResult {
        if targets.is_empty() {
            let names: Vec<String> = self
                .channels
                .values()
                .filter(|c| c.members.contains_key(&ctx.id) || !c.is_hidden_from_outside())
                .map(|c| c.name.clone())
                .collect();
            for name in names {
                self.write_names(ctx.id, ctx.rb, &name);
            }
            return Ok(());
        }
        for target in targets.split(',').filter(|s| !s.is_empty()) {
            self.write_names(ctx.id, ctx.rb, target);
        }
        Ok(())
    }

    pub fn cmd_list(&mut self, ctx: CommandContext<'_>, targets: &str) -> HandlerResult {
        let id = ctx.id;
        ctx.rb.reply(rpl::LISTSTART).param("Channel").trailing_param("Users  Name");
        if targets.is_empty() {
            for channel in self.channels.values() {
                if channel.is_hidden_from_outside() && !channel.members.contains_key(&id) {
                    continue;
                }
                channel.list_entry(ctx.rb.reply(rpl::LIST).param(&channel.name));
            }
        } else {
            for target in targets.split(',').filter(|s| !s.is_empty()) {
                let folded = self.fold(target);
                if let Some(channel) = self.channels.get(&folded) {
                    if channel.is_hidden_from_outside() && !channel.members.contains_key(&id) {
                        continue;
                    }
                    channel.list_entry(ctx.rb.reply(rpl::LIST).param(&channel.name));
                }
            }
        }
        ctx.rb.reply(rpl::LISTEND).trailing_param(lines::END_OF_LIST);
        Ok(())
    }
}

/// Messaging commands.
impl StateInner {
    pub fn cmd_privmsg(&mut self, ctx: CommandContext<'_>, targets: &str, text: &str) -> HandlerResult {
        self.send_query_or_channel_msg(ctx, Command::PrivMsg, targets, text)
    }

    pub fn cmd_notice(&mut self, ctx: CommandContext<'_>, targets: &str, text: &str) -> HandlerResult {
        self.send_query_or_channel_msg(ctx, Command::Notice, targets, text)
    }

    /// Delivers a PRIVMSG or NOTICE to each of the comma-separated
    /// `targets`.  NOTICE must never trigger a reply of any kind, so all
    /// its failures are silent.
    fn send_query_or_channel_msg(&mut self, ctx: CommandContext<'_>, command: Command,
                                 targets: &str, text: &str) -> HandlerResult
    {
        let id = ctx.id;
        let notice = command == Command::Notice;
        let sender_mask = self.clients[id].full_name().to_owned();
        let mut res = Ok(());

        for target in targets.split(',').filter(|s| !s.is_empty()) {
            let first = target.chars().next().unwrap_or('\0');
            if ChannelKind::from_prefix(first).is_some() {
                let folded = self.fold(target);
                let channel = match self.channels.get(&folded) {
                    Some(channel) => channel,
                    None => {
                        if !notice {
                            ctx.rb
                                .reply(rpl::ERR_NOSUCHNICK)
                                .param(target)
                                .trailing_param(lines::NO_SUCH_NICK);
                        }
                        res = Err(());
                        continue;
                    }
                };
                if !channel.can_talk(id, &sender_mask)
                    || (channel.colorless && has_color_codes(text))
                {
                    log::debug!("{}:         can't send to channel", id);
                    if !notice {
                        ctx.rb
                            .reply(rpl::ERR_CANNOTSENDTOCHAN)
                            .param(target)
                            .trailing_param(lines::CANNOT_SEND_TO_CHAN);
                    }
                    res = Err(());
                    continue;
                }
                if notice && channel.no_notice {
                    res = Err(());
                    continue;
                }
                let mut buf = Buffer::new();
                buf.message(&sender_mask, command).param(target).trailing_param(text);
                let msg = crate::client::MessageQueueItem::from(buf);
                for member in channel.members.keys().filter(|member| **member != id) {
                    self.send(*member, msg.clone());
                }
            } else {
                let folded = self.fold(target);
                let found = self
                    .nicks
                    .get(&folded)
                    .and_then(|tid| self.clients.get(*tid).map(|c| (*tid, c)));
                let (_, tclient) = match found {
                    Some(found) => found,
                    None => {
                        if !notice {
                            ctx.rb
                                .reply(rpl::ERR_NOSUCHNICK)
                                .param(target)
                                .trailing_param(lines::NO_SUCH_NICK);
                        }
                        res = Err(());
                        continue;
                    }
                };
                if tclient.silence.iter().any(|mask| util::mask_matches(mask, &sender_mask)) {
                    // Silenced senders are dropped without a word.
                    continue;
                }
                // Away users are not delivered to; the sender is told once
                // instead (and NOTICE not at all).
                if let Some(ref away) = tclient.away {
                    if !notice {
                        ctx.rb.reply(rpl::AWAY).param(target).trailing_param(away);
                    }
                    continue;
                }
                let mut buf = Buffer::new();
                buf.message(&sender_mask, command).param(target).trailing_param(text);
                tclient.send(buf);
            }
        }
        res
    }

    pub fn cmd_away(&mut self, ctx: CommandContext<'_>, reason: &str) -> HandlerResult {
        let client = self.clients.get_mut(ctx.id).unwrap();
        if reason.is_empty() {
            client.away = None;
            ctx.rb.reply(rpl::UNAWAY).trailing_param(lines::UNAWAY);
        } else {
            client.away = Some(reason.to_owned());
            ctx.rb.reply(rpl::NOWAWAY).trailing_param(lines::NOW_AWAY);
        }
        Ok(())
    }

    pub fn cmd_wallops(&mut self, ctx: CommandContext<'_>, text: &str) -> HandlerResult {
        let mask = self.clients[ctx.id].full_name().to_owned();
        let mut buf = Buffer::new();
        buf.message(&mask, Command::Wallops).trailing_param(text);
        let msg = crate::client::MessageQueueItem::from(buf);
        for (_, client) in self.clients.iter() {
            if client.is_registered() && client.wallops {
                client.send(msg.clone());
            }
        }
        Ok(())
    }

    pub fn cmd_ison(&mut self, ctx: CommandContext<'_>, nicks: &[&str]) -> HandlerResult {
        let mut msg = ctx.rb.reply(rpl::ISON);
        let trailing = msg.raw_trailing_param();
        for nick in nicks.iter().flat_map(|p| p.split(' ')).filter(|s| !s.is_empty()) {
            let folded = self.fold(nick);
            if let Some(tid) = self.nicks.get(&folded) {
                trailing.push_str(self.clients[*tid].nick());
                trailing.push(' ');
            }
        }
        if trailing.ends_with(' ') {
            trailing.pop();
        }
        Ok(())
    }

    pub fn cmd_userhost(&mut self, ctx: CommandContext<'_>, nicks: &[&str]) -> HandlerResult {
        let mut msg = ctx.rb.reply(rpl::USERHOST);
        let trailing = msg.raw_trailing_param();
        for nick in nicks.iter().take(5) {
            let folded = self.fold(nick);
            let client = match self.nicks.get(&folded) {
                Some(tid) => &self.clients[*tid],
                None => continue,
            };
            trailing.push_str(client.nick());
            if client.is_oper() {
                trailing.push('*');
            }
            trailing.push('=');
            trailing.push(if client.away.is_some() { '-' } else { '+' });
            trailing.push_str(client.user());
            trailing.push('@');
            trailing.push_str(&client.host);
            trailing.push(' ');
        }
        if trailing.ends_with(' ') {
            trailing.pop();
        }
        Ok(())
    }
}

/// MODE, for both user and channel targets.
impl StateInner {
    pub fn cmd_mode(&mut self, ctx: CommandContext<'_>, target: &str, modes: &str,
                    params: &[&str]) -> HandlerResult
    {
        let first = target.chars().next().unwrap_or('\0');
        if ChannelKind::from_prefix(first).is_some() {
            self.cmd_mode_channel(ctx, target, modes, params)
        } else {
            self.cmd_mode_user(ctx, target, modes)
        }
    }

    fn cmd_mode_user(&mut self, ctx: CommandContext<'_>, target: &str, modes: &str) -> HandlerResult {
        let id = ctx.id;
        let folded = self.fold(target);
        if folded != self.fold(self.clients[id].nick()) {
            ctx.rb
                .reply(rpl::ERR_USERSDONTMATCH)
                .trailing_param(lines::USERS_DONT_MATCH);
            return Err(());
        }
        if modes.is_empty() {
            self.clients[id].write_modes(ctx.rb);
            return Ok(());
        }

        let client = self.clients.get_mut(id).unwrap();
        let mut applied = String::new();
        let mut last_sign = '\0';
        for change in mode::UserQuery::new(modes) {
            let change = match change {
                Ok(change) => change,
                Err(_) => {
                    ctx.rb
                        .reply(rpl::ERR_UMODEUNKNOWNFLAG)
                        .trailing_param(lines::UMODE_UNKNOWN_FLAG);
                    continue;
                }
            };
            let value = change.value();
            let symbol = change.symbol();
            let changed = match change {
                mode::UserModeChange::Invisible(v) => {
                    let changed = client.invisible != v;
                    client.invisible = v;
                    changed
                }
                mode::UserModeChange::Wallops(v) => {
                    let changed = client.wallops != v;
                    client.wallops = v;
                    changed
                }
                // Restricted can be set, never unset.
                mode::UserModeChange::Restricted(true) => {
                    let changed = !client.restricted;
                    client.restricted = true;
                    changed
                }
                mode::UserModeChange::Restricted(false) => false,
                // Operator status is only granted through OPER.
                mode::UserModeChange::Oper(false) => {
                    let changed = client.operator;
                    client.operator = false;
                    changed
                }
                mode::UserModeChange::LocalOper(false) => {
                    let changed = client.local_operator;
                    client.local_operator = false;
                    changed
                }
                mode::UserModeChange::Oper(true) | mode::UserModeChange::LocalOper(true) => false,
            };
            if changed {
                let sign = if value { '+' } else { '-' };
                if last_sign != sign {
                    applied.push(sign);
                    last_sign = sign;
                }
                applied.push(symbol);
            }
        }
        if !applied.is_empty() {
            let mask = self.clients[id].full_name().to_owned();
            let nick = self.clients[id].nick().to_owned();
            let mut buf = Buffer::new();
            buf.message(&mask, Command::Mode).param(&nick).trailing_param(&applied);
            self.send(id, buf.into());
        }
        Ok(())
    }

    fn cmd_mode_channel(&mut self, ctx: CommandContext<'_>, target: &str, modes: &str,
                        params: &[&str]) -> HandlerResult
    {
        let id = ctx.id;
        let folded = self.fold(target);
        let channel = find_channel(id, ctx.rb, &self.channels, &folded, target)?;

        if modes.is_empty() {
            let full_info = channel.members.contains_key(&id);
            channel.modes(ctx.rb.reply(rpl::CHANNELMODEIS).param(target), full_info);
            return Ok(());
        }

        let member = find_member(id, ctx.rb, channel, target)?;
        let mask = self.clients[id].full_name().to_owned();
        let dialect = self.dialect;

        let mut applied_modes = String::new();
        let mut applied_params: Vec<String> = Vec::new();
        let mut last_sign = '\0';

        let clients = &self.clients;
        let channel = self.channels.get_mut(&folded).unwrap();
        let nick_of = |member_id: usize| clients[member_id].nick();

        for change in mode::ChannelQuery::new(dialect, modes, params.iter().copied()) {
            let change = match change {
                Ok(change) => change,
                Err(mode::Error::UnknownMode(c)) => {
                    ctx.rb
                        .reply(rpl::ERR_UNKNOWNMODE)
                        .param(c.to_string())
                        .trailing_param(lines::UNKNOWN_MODE);
                    continue;
                }
                Err(mode::Error::MissingModeParam) => {
                    ctx.rb
                        .reply(rpl::ERR_NEEDMOREPARAMS)
                        .param(Command::Mode.as_str())
                        .trailing_param(lines::NEED_MORE_PARAMS);
                    continue;
                }
            };
            match change {
                mode::ChannelModeChange::GetBans => {
                    for entry in &channel.ban_mask {
                        ctx.rb
                            .reply(rpl::BANLIST)
                            .param(target)
                            .param(&entry.mask)
                            .param(&entry.set_by)
                            .param(entry.set_at.to_string());
                    }
                    ctx.rb
                        .reply(rpl::ENDOFBANLIST)
                        .param(target)
                        .trailing_param(lines::END_OF_BAN_LIST);
                }
                mode::ChannelModeChange::GetExceptions => {
                    for entry in &channel.exception_mask {
                        ctx.rb
                            .reply(rpl::EXCEPTLIST)
                            .param(target)
                            .param(&entry.mask)
                            .param(&entry.set_by)
                            .param(entry.set_at.to_string());
                    }
                    ctx.rb
                        .reply(rpl::ENDOFEXCEPTLIST)
                        .param(target)
                        .trailing_param(lines::END_OF_EXCEPT_LIST);
                }
                mode::ChannelModeChange::GetInviteExceptions => {
                    for entry in &channel.invex_mask {
                        ctx.rb
                            .reply(rpl::INVITELIST)
                            .param(target)
                            .param(&entry.mask)
                            .param(&entry.set_by)
                            .param(entry.set_at.to_string());
                    }
                    ctx.rb
                        .reply(rpl::ENDOFINVITELIST)
                        .param(target)
                        .trailing_param(lines::END_OF_INVITE_LIST);
                }
                change => {
                    if !member.can_set(&change, dialect) {
                        log::debug!("{}:         not operator", id);
                        ctx.rb
                            .reply(rpl::ERR_CHANOPRIVSNEEDED)
                            .param(target)
                            .trailing_param(lines::CHANOP_PRIVS_NEEDED);
                        continue;
                    }
                    let value = change.value();
                    let symbol = change.symbol();
                    let param = change.param().map(ToOwned::to_owned);
                    match channel.apply_mode_change(dialect, change, &mask, nick_of) {
                        Ok(true) => {
                            let sign = if value { '+' } else { '-' };
                            if last_sign != sign {
                                applied_modes.push(sign);
                                last_sign = sign;
                            }
                            if let Some(symbol) = symbol {
                                applied_modes.push(symbol);
                            }
                            if let Some(param) = param {
                                applied_params.push(param);
                            }
                        }
                        Ok(false) => {}
                        Err(err) => {
                            if err == rpl::ERR_KEYSET {
                                ctx.rb
                                    .reply(err)
                                    .param(target)
                                    .trailing_param(lines::KEY_SET);
                            } else if err == rpl::ERR_USERNOTINCHANNEL {
                                ctx.rb
                                    .reply(err)
                                    .param(param.as_deref().unwrap_or(""))
                                    .param(target)
                                    .trailing_param(lines::USER_NOT_IN_CHANNEL);
                            }
                        }
                    }
                }
            }
        }

        if !applied_modes.is_empty() {
            let mut buf = Buffer::new();
            {
                let mut msg = buf.message(&mask, Command::Mode).param(target).param(&applied_modes);
                for param in &applied_params {
                    msg = msg.param(param);
                }
                msg.build();
            }
            self.broadcast(&folded, buf.into());
        }
        Ok(())
    }
}

/// Server queries.
impl StateInner {
    pub fn cmd_admin(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb.reply(rpl::ADMINME).param(&self.domain).trailing_param(lines::ADMIN_ME);
        ctx.rb.reply(rpl::ADMINLOC1).trailing_param(&self.org_location);
        ctx.rb.reply(rpl::ADMINLOC2).trailing_param(&self.org_name);
        ctx.rb.reply(rpl::ADMINEMAIL).trailing_param(&self.org_mail);
        Ok(())
    }

    pub fn cmd_info(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        for line in super::SERVER_INFO.lines() {
            ctx.rb.reply(rpl::INFO).trailing_param(line);
        }
        ctx.rb.reply(rpl::ENDOFINFO).trailing_param(lines::END_OF_INFO);
        Ok(())
    }

    pub fn cmd_lusers(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        self.write_lusers(ctx.rb);
        Ok(())
    }

    pub fn cmd_motd(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        self.write_motd(ctx.rb);
        Ok(())
    }

    pub fn cmd_version(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb
            .reply(rpl::VERSION)
            .param(crate::server_version!())
            .param(&self.domain)
            .trailing_param(&format!("dialect {}", self.dialect));
        Ok(())
    }

    pub fn cmd_time(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb
            .reply(rpl::TIME)
            .param(&self.domain)
            .trailing_param(&util::time_str());
        Ok(())
    }

    pub fn cmd_trace(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb
            .reply(rpl::TRACEEND)
            .param(&self.domain)
            .param(crate::server_version!())
            .trailing_param(lines::END_OF_TRACE);
        Ok(())
    }

    pub fn cmd_links(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb
            .reply(rpl::LINKS)
            .param("*")
            .param(&self.domain)
            .trailing_param(&format!("0 {}", self.org_name));
        ctx.rb.reply(rpl::ENDOFLINKS).param("*").trailing_param(lines::END_OF_LINKS);
        Ok(())
    }

    pub fn cmd_stats(&mut self, ctx: CommandContext<'_>, query: &str) -> HandlerResult {
        match query.chars().next() {
            Some('u') => {
                lines::uptime(ctx.rb.reply(rpl::STATSUPTIME), &self.created_at);
            }
            Some('o') => {
                for (name, _, _) in &self.opers {
                    ctx.rb
                        .reply(rpl::STATSOLINE)
                        .param("O")
                        .param("*")
                        .param("*")
                        .param(name);
                }
            }
            _ => {}
        }
        ctx.rb
            .reply(rpl::ENDOFSTATS)
            .param(if query.is_empty() { "*" } else { query })
            .trailing_param(lines::END_OF_STATS);
        Ok(())
    }

    pub fn cmd_summon(&mut self, ctx: CommandContext<'_>, _user: &str) -> HandlerResult {
        ctx.rb
            .reply(rpl::ERR_SUMMONDISABLED)
            .trailing_param(lines::SUMMON_DISABLED);
        Err(())
    }

    pub fn cmd_who(&mut self, ctx: CommandContext<'_>, mask: &str, flag: &str) -> HandlerResult {
        let id = ctx.id;
        let opers_only = flag == "o";
        let folded = self.fold(mask);

        if !mask.is_empty() && self.channels.contains_key(&folded) {
            let channel = &self.channels[&folded];
            let requester_is_member = channel.members.contains_key(&id);
            if requester_is_member || !channel.is_hidden_from_outside() {
                for (member, modes) in &channel.members {
                    let client = &self.clients[*member];
                    if opers_only && !client.is_oper() {
                        continue;
                    }
                    if client.invisible && !requester_is_member && *member != id {
                        continue;
                    }
                    self.write_who_reply(ctx.rb, mask, *member, Some(*modes));
                }
            }
        } else {
            let matcher = if mask.is_empty() || mask == "0" { "*" } else { mask };
            for (cid, client) in self.clients.iter() {
                if !client.is_registered() {
                    continue;
                }
                if opers_only && !client.is_oper() {
                    continue;
                }
                if client.invisible && cid != id && !self.share_channel(id, cid) {
                    continue;
                }
                let matched = util::mask_matches(matcher, client.nick())
                    || util::mask_matches(matcher, &client.host)
                    || util::mask_matches(matcher, client.user());
                if !matched {
                    continue;
                }
                self.write_who_reply(ctx.rb, "*", cid, None);
            }
        }
        ctx.rb
            .reply(rpl::ENDOFWHO)
            .param(if mask.is_empty() { "*" } else { mask })
            .trailing_param(lines::END_OF_WHO);
        Ok(())
    }

    fn write_who_reply(&self, rb: &mut selka_tokens::ReplyBuffer, channel_name: &str, cid: usize,
                       modes: Option<MemberModes>)
    {
        let client = &self.clients[cid];
        let mut msg = rb
            .reply(rpl::WHOREPLY)
            .param(channel_name)
            .param(client.user())
            .param(&client.host)
            .param(&self.domain)
            .param(client.nick());
        {
            let status = msg.raw_param();
            status.push_str(client.who_flag());
            if client.is_oper() {
                status.push('*');
            }
            if let Some(symbol) = modes.and_then(|m| m.symbol()) {
                status.push(symbol);
            }
        }
        let trailing = msg.raw_trailing_param();
        trailing.push_str("0 ");
        trailing.push_str(client.real());
    }

    fn share_channel(&self, a: usize, b: usize) -> bool {
        self.channels
            .values()
            .any(|c| c.members.contains_key(&a) && c.members.contains_key(&b))
    }

    pub fn cmd_whois(&mut self, ctx: CommandContext<'_>, targets: &str) -> HandlerResult {
        let id = ctx.id;
        for nick in targets.split(',').filter(|s| !s.is_empty()) {
            let folded = self.fold(nick);
            let found = self
                .nicks
                .get(&folded)
                .and_then(|tid| self.clients.get(*tid).map(|c| (*tid, c)));
            let (tid, client) = match found {
                Some(found) => found,
                None => {
                    ctx.rb
                        .reply(rpl::ERR_NOSUCHNICK)
                        .param(nick)
                        .trailing_param(lines::NO_SUCH_NICK);
                    continue;
                }
            };
            ctx.rb
                .reply(rpl::WHOISUSER)
                .param(client.nick())
                .param(client.user())
                .param(&client.host)
                .param("*")
                .trailing_param(client.real());
            let mut on_channels = String::new();
            for channel in self.channels.values() {
                if !channel.members.contains_key(&tid) {
                    continue;
                }
                if channel.is_hidden_from_outside() && !channel.members.contains_key(&id) {
                    continue;
                }
                if let Some(symbol) = channel.members[&tid].symbol() {
                    on_channels.push(symbol);
                }
                on_channels.push_str(&channel.name);
                on_channels.push(' ');
            }
            if on_channels.ends_with(' ') {
                on_channels.pop();
                ctx.rb
                    .reply(rpl::WHOISCHANNELS)
                    .param(client.nick())
                    .trailing_param(&on_channels);
            }
            ctx.rb
                .reply(rpl::WHOISSERVER)
                .param(client.nick())
                .param(&self.domain)
                .trailing_param(&self.org_name);
            if client.is_oper() {
                ctx.rb
                    .reply(rpl::WHOISOPERATOR)
                    .param(client.nick())
                    .trailing_param(lines::WHOIS_OPERATOR);
            }
            if let Some(ref away) = client.away {
                ctx.rb.reply(rpl::AWAY).param(client.nick()).trailing_param(away);
            }
            ctx.rb
                .reply(rpl::WHOISIDLE)
                .param(client.nick())
                .param(client.last_action.elapsed().as_secs().to_string())
                .param(client.signon_time.to_string())
                .trailing_param(lines::WHOIS_IDLE);
        }
        ctx.rb
            .reply(rpl::ENDOFWHOIS)
            .param(targets)
            .trailing_param(lines::END_OF_WHOIS);
        Ok(())
    }

    pub fn cmd_whowas(&mut self, ctx: CommandContext<'_>, nick: &str, count: &str) -> HandlerResult {
        let folded = self.fold(nick);
        let limit = count.parse::<usize>().unwrap_or(0);
        let mut found = 0;
        for entry in self.whowas.iter().rev() {
            if self.fold(&entry.nick) != folded {
                continue;
            }
            ctx.rb
                .reply(rpl::WHOWASUSER)
                .param(&entry.nick)
                .param(&entry.user)
                .param(&entry.host)
                .param("*")
                .trailing_param(&entry.real);
            found += 1;
            if limit != 0 && limit <= found {
                break;
            }
        }
        if found == 0 {
            ctx.rb
                .reply(rpl::ERR_WASNOSUCHNICK)
                .param(nick)
                .trailing_param(lines::WAS_NO_SUCH_NICK);
        }
        ctx.rb.reply(rpl::ENDOFWHOWAS).param(nick).trailing_param(lines::END_OF_WHOWAS);
        Ok(())
    }
}

/// Operator lifecycle commands and the server-to-server extension points.
impl StateInner {
    pub fn cmd_kill(&mut self, ctx: CommandContext<'_>, nick: &str, comment: &str) -> HandlerResult {
        let id = ctx.id;
        if nick.eq_ignore_ascii_case(&self.domain) {
            ctx.rb
                .reply(rpl::ERR_CANTKILLSERVER)
                .trailing_param(lines::CANT_KILL_SERVER);
            return Err(());
        }
        let folded = self.fold(nick);
        let (tid, _) = find_nick(id, ctx.rb, &self.clients, &self.nicks, &folded, nick)?;

        let oper_nick = self.clients[id].nick().to_owned();
        let mask = self.clients[id].full_name().to_owned();
        let mut buf = Buffer::new();
        buf.message(&mask, Command::Kill).param(nick).trailing_param(comment);
        self.send(tid, buf.into());

        let mut reason = String::new();
        lines::killed(&mut reason, &oper_nick, comment);
        log::info!("{}: Killed by {}: {}", tid, oper_nick, comment);
        self.remove_client(tid, Some(&reason));
        Ok(())
    }

    pub fn cmd_die(&mut self, _ctx: CommandContext<'_>) -> HandlerResult {
        log::info!("{}: DIE", _ctx.id);
        let _ = self.control.send(Control::Stop);
        Ok(())
    }

    pub fn cmd_restart(&mut self, _ctx: CommandContext<'_>) -> HandlerResult {
        log::info!("{}: RESTART", _ctx.id);
        let _ = self.control.send(Control::Restart);
        Ok(())
    }

    pub fn cmd_rehash(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        log::info!("{}: REHASH", ctx.id);
        ctx.rb.reply(rpl::REHASHING).trailing_param(lines::REHASHING);
        let _ = self.control.send(Control::Rehash);
        Ok(())
    }

    // Server-to-server linking is an extension point; no links exist, so
    // the related commands answer with the matching terminal numeric.

    pub fn cmd_connect(&mut self, ctx: CommandContext<'_>, target: &str) -> HandlerResult {
        ctx.rb
            .reply(rpl::ERR_NOSUCHSERVER)
            .param(target)
            .trailing_param(lines::NO_SUCH_SERVER);
        Err(())
    }

    pub fn cmd_squit(&mut self, ctx: CommandContext<'_>, server: &str) -> HandlerResult {
        ctx.rb
            .reply(rpl::ERR_NOSUCHSERVER)
            .param(server)
            .trailing_param(lines::NO_SUCH_SERVER);
        Err(())
    }

    pub fn cmd_server(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb
            .reply(rpl::ERR_ALREADYREGISTRED)
            .trailing_param(lines::ALREADY_REGISTERED);
        Err(())
    }

    pub fn cmd_service(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb
            .reply(rpl::ERR_ALREADYREGISTRED)
            .trailing_param(lines::ALREADY_REGISTERED);
        Err(())
    }
}
