//! Handlers for the modern-dialect commands.
//!
//! Capability negotiation follows
//! <https://ircv3.net/specs/core/capability-negotiation>; the server owns
//! the capability list and it is currently empty, so every REQ is NAK'd.
//! Registration is suspended while a negotiation is in progress; the
//! client state machine resumes it on CAP END.

use crate::{lines, util};
use selka_tokens::{Buffer, Command, rpl};
use super::{CommandContext, HandlerResult, StateInner};

/// The capability list advertised by CAP LS and CAP LIST.
const CAP_LS: &str = "";

/// The languages advertised by LANGUAGE.  No dialect document pins the
/// command down, so the server speaks exactly one.
const LANGUAGES: &str = "en";

const SILENCE_LIMIT: usize = 15;

/// Handler for the CAP command.
impl StateInner {
    fn cmd_cap_ls(&mut self, ctx: CommandContext<'_>, _version: &str) -> HandlerResult {
        ctx.rb.reply(Command::Cap).param("LS").trailing_param(CAP_LS);
        Ok(())
    }

    fn cmd_cap_list(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb.reply(Command::Cap).param("LIST").trailing_param(CAP_LS);
        Ok(())
    }

    fn cmd_cap_req(&mut self, ctx: CommandContext<'_>, capabilities: &str) -> HandlerResult {
        if capabilities.trim().is_empty() {
            ctx.rb.reply(Command::Cap).param("ACK").trailing_param("");
            return Ok(());
        }
        // Nothing is supported yet.
        ctx.rb.reply(Command::Cap).param("NAK").trailing_param(capabilities);
        Ok(())
    }

    pub fn cmd_cap(&mut self, ctx: CommandContext<'_>, params: &[&str]) -> HandlerResult {
        match params[0].to_ascii_uppercase().as_str() {
            "END" => Ok(()),
            "LIST" => self.cmd_cap_list(ctx),
            "LS" => self.cmd_cap_ls(ctx, params.get(1).copied().unwrap_or("")),
            "REQ" => self.cmd_cap_req(ctx, params.get(1).copied().unwrap_or("")),
            _ => {
                log::debug!("{}:     Bad CAP command", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_INVALIDCAPCMD)
                    .param(params[0])
                    .trailing_param(lines::UNKNOWN_COMMAND);
                Err(())
            }
        }
    }
}

/// Handler for the KNOCK command.
impl StateInner {
    pub fn cmd_knock(&mut self, ctx: CommandContext<'_>, target: &str) -> HandlerResult {
        let id = ctx.id;
        let folded = self.fold(target);
        let channel = super::find_channel(id, ctx.rb, &self.channels, &folded, target)?;

        if channel.members.contains_key(&id) {
            ctx.rb
                .reply(rpl::ERR_KNOCKONCHAN)
                .param(target)
                .trailing_param(lines::KNOCK_ON_CHAN);
            return Err(());
        }
        if !channel.invite_only {
            ctx.rb
                .reply(rpl::ERR_CHANOPEN)
                .param(target)
                .trailing_param(lines::CHAN_OPEN);
            return Err(());
        }

        let mask = self.clients[id].full_name().to_owned();
        let operators: Vec<usize> = channel
            .members
            .iter()
            .filter(|(_, modes)| modes.operator)
            .map(|(member, _)| *member)
            .collect();
        for operator in operators {
            let mut buf = Buffer::new();
            lines::knock(
                buf.message(&self.domain, rpl::KNOCK)
                    .param(self.clients[operator].nick())
                    .param(target),
                &mask,
            );
            self.send(operator, buf.into());
        }
        ctx.rb
            .reply(rpl::KNOCKDLVR)
            .param(target)
            .trailing_param(lines::KNOCK_DELIVERED);
        Ok(())
    }
}

/// Handler for the LANGUAGE command.
impl StateInner {
    pub fn cmd_language(&mut self, ctx: CommandContext<'_>, _langs: &[&str]) -> HandlerResult {
        let nick = self.clients[ctx.id].nick().to_owned();
        let mut msg = ctx.rb.prefixed_message(Command::Notice).param(&nick);
        let trailing = msg.raw_trailing_param();
        trailing.push_str("Supported languages: ");
        trailing.push_str(LANGUAGES);
        Ok(())
    }
}

/// Handler for the SILENCE command.
impl StateInner {
    pub fn cmd_silence(&mut self, ctx: CommandContext<'_>, entry: &str) -> HandlerResult {
        let id = ctx.id;
        if entry.is_empty() {
            let client = &self.clients[id];
            for mask in &client.silence {
                ctx.rb.reply(rpl::SILELIST).param(mask);
            }
            ctx.rb
                .reply(rpl::ENDOFSILELIST)
                .trailing_param(lines::END_OF_SILENCE_LIST);
            return Ok(());
        }

        let (remove, mask) = match entry.as_bytes()[0] {
            b'-' => (true, &entry[1..]),
            b'+' => (false, &entry[1..]),
            _ => (false, entry),
        };
        if mask.is_empty() {
            return Err(());
        }
        // Bare nicks silence every connection of that nick.
        let mask = if mask.contains('!') || mask.contains('@') {
            mask.to_owned()
        } else {
            format!("{}!*@*", mask)
        };
        let mask = util::truncate(&mask, 128).to_owned();

        let client = self.clients.get_mut(id).unwrap();
        if remove {
            client.silence.remove(&mask);
        } else {
            if SILENCE_LIMIT <= client.silence.len() {
                ctx.rb
                    .reply(rpl::ERR_SILELISTFULL)
                    .param(&mask)
                    .trailing_param(lines::SILENCE_LIST_FULL);
                return Err(());
            }
            client.silence.insert(mask);
        }
        Ok(())
    }
}
