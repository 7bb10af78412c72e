//! Handlers for the service commands introduced with the RFC 2810 family.
//!
//! Services cannot register (SERVICE is a reserved extension point), so
//! these queries always run against an empty service set.

use crate::lines;
use selka_tokens::rpl;
use super::{CommandContext, HandlerResult, StateInner};

impl StateInner {
    pub fn cmd_servlist(&mut self, ctx: CommandContext<'_>, mask: &str, kind: &str) -> HandlerResult {
        ctx.rb
            .reply(rpl::SERVLISTEND)
            .param(if mask.is_empty() { "*" } else { mask })
            .param(if kind.is_empty() { "*" } else { kind })
            .trailing_param(lines::END_OF_SERVLIST);
        Ok(())
    }

    pub fn cmd_squery(&mut self, ctx: CommandContext<'_>, name: &str, _text: &str) -> HandlerResult {
        ctx.rb
            .reply(rpl::ERR_NOSUCHNICK)
            .param(name)
            .trailing_param(lines::NO_SUCH_NICK);
        Err(())
    }
}
