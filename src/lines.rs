//! The text of replies sent by the server.
//!
//! Numeric codes identify replies to clients; these strings are only read
//! by humans.  Parameterized lines are built with the `MessageBuffer` raw
//! accessors to avoid intermediate allocations.

use selka_tokens::MessageBuffer;

pub const ADMIN_ME: &str = "Administrative info";
pub const ALREADY_REGISTERED: &str = "Unauthorized command (already registered)";
pub const BAD_PASSWORD: &str = "Bad Password";
pub const BANNED_FROM_CHAN: &str = "Cannot join channel (+b)";
pub const BAD_CHAN_KEY: &str = "Cannot join channel (+k)";
pub const CANNOT_SEND_TO_CHAN: &str = "Cannot send to channel";
pub const CANT_KILL_SERVER: &str = "You can't kill a server!";
pub const CHANNEL_IS_FULL: &str = "Cannot join channel (+l)";
pub const CHANOP_PRIVS_NEEDED: &str = "You're not channel operator";
pub const CHAN_OPEN: &str = "Channel is open";
pub const END_OF_BAN_LIST: &str = "End of channel ban list";
pub const END_OF_EXCEPT_LIST: &str = "End of channel exception list";
pub const END_OF_INFO: &str = "End of INFO list";
pub const END_OF_INVITE_LIST: &str = "End of channel invite exception list";
pub const END_OF_LINKS: &str = "End of LINKS list";
pub const END_OF_LIST: &str = "End of LIST";
pub const END_OF_MOTD: &str = "End of MOTD command";
pub const END_OF_NAMES: &str = "End of NAMES list";
pub const END_OF_SERVLIST: &str = "End of service listing";
pub const END_OF_SILENCE_LIST: &str = "End of silence list";
pub const END_OF_STATS: &str = "End of STATS report";
pub const END_OF_TRACE: &str = "End of TRACE";
pub const END_OF_WHO: &str = "End of WHO list";
pub const END_OF_WHOIS: &str = "End of WHOIS list";
pub const END_OF_WHOWAS: &str = "End of WHOWAS";
pub const ERRONEOUS_NICKNAME: &str = "Erroneous nickname";
pub const INVITE_ONLY_CHAN: &str = "Cannot join channel (+i)";
pub const I_SUPPORT: &str = "are supported by this server";
pub const KEY_SET: &str = "Channel key already set";
pub const KNOCK_DELIVERED: &str = "Your KNOCK has been delivered";
pub const LUSER_CHANNELS: &str = "channels formed";
pub const LUSER_OPS: &str = "operator(s) online";
pub const LUSER_UNKNOWN: &str = "unknown connection(s)";
pub const KNOCK_ON_CHAN: &str = "You are already on that channel";
pub const NEED_MORE_PARAMS: &str = "Not enough parameters";
pub const NICKNAME_IN_USE: &str = "Nickname is already in use";
pub const NO_MOTD: &str = "MOTD File is missing";
pub const NO_ORIGIN: &str = "No origin specified";
pub const NO_OPER_HOST: &str = "No O-lines for your host";
pub const NO_PRIVILEGES: &str = "Permission Denied- You're not an IRC operator";
pub const NO_RECIPIENT: &str = "No recipient given";
pub const NO_SUCH_CHANNEL: &str = "No such channel";
pub const NO_SUCH_NICK: &str = "No such nick/channel";
pub const NO_SUCH_SERVER: &str = "No such server";
pub const NO_TEXT_TO_SEND: &str = "No text to send";
pub const NO_TOPIC: &str = "No topic is set";
pub const NOT_ON_CHANNEL: &str = "You're not on that channel";
pub const NOT_REGISTERED: &str = "You have not registered";
pub const PASSWORD_MISMATCH: &str = "Password incorrect";
pub const PING_TIMEOUT: &str = "Ping Timeout";
pub const REHASHING: &str = "Rehashing";
pub const SERVER_SHUTDOWN: &str = "Server Shutdown";
pub const SILENCE_LIST_FULL: &str = "Your silence list is full";
pub const SOCKET_RESET: &str = "Socket reset by peer";
pub const SUMMON_DISABLED: &str = "SUMMON has been disabled";
pub const TOO_MANY_CHANNELS: &str = "You have joined too many channels";
pub const UMODE_UNKNOWN_FLAG: &str = "Unknown MODE flag";
pub const UNAWAY: &str = "You are no longer marked as being away";
pub const NOW_AWAY: &str = "You have been marked as being away";
pub const UNKNOWN_COMMAND: &str = "Unknown command";
pub const UNKNOWN_MODE: &str = "is unknown mode char to me";
pub const USERS_DONT_MATCH: &str = "Cannot change mode for other users";
pub const USER_NOT_IN_CHANNEL: &str = "They aren't on that channel";
pub const USER_ON_CHANNEL: &str = "is already on channel";
pub const WAS_NO_SUCH_NICK: &str = "There was no such nickname";
pub const WHOIS_IDLE: &str = "seconds idle, signon time";
pub const WHOIS_OPERATOR: &str = "is an IRC operator";
pub const YOURE_OPER: &str = "You are now an IRC operator";

pub fn welcome(msg: MessageBuffer<'_>, name: &str) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str("Welcome to the IRC Network ");
    trailing.push_str(name);
}

pub fn your_host(msg: MessageBuffer<'_>, domain: &str, version: &str) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str("Your host is ");
    trailing.push_str(domain);
    trailing.push_str(", running version ");
    trailing.push_str(version);
}

pub fn created(msg: MessageBuffer<'_>, date: &str) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str("This server was created ");
    trailing.push_str(date);
}

pub fn motd_start(msg: MessageBuffer<'_>, domain: &str) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str("- ");
    trailing.push_str(domain);
    trailing.push_str(" Message of the day - ");
}

pub fn luser_client(msg: MessageBuffer<'_>, users: usize, invisible: usize) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str("There are ");
    trailing.push_str(&users.to_string());
    trailing.push_str(" users and ");
    trailing.push_str(&invisible.to_string());
    trailing.push_str(" invisible on 1 servers");
}

pub fn luser_me(msg: MessageBuffer<'_>, clients: usize) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str("I have ");
    trailing.push_str(&clients.to_string());
    trailing.push_str(" clients and 1 servers");
}

pub fn uptime(msg: MessageBuffer<'_>, since: &str) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str("Server Up since ");
    trailing.push_str(since);
}

pub fn killed(reason: &mut String, oper: &str, comment: &str) {
    reason.push_str("Killed (");
    reason.push_str(oper);
    reason.push_str(" (");
    reason.push_str(comment);
    reason.push_str("))");
}

pub fn knock(msg: MessageBuffer<'_>, mask: &str) {
    let mut msg = msg;
    let trailing = msg.raw_trailing_param();
    trailing.push_str(mask);
    trailing.push_str(" has asked for an invite");
}
