//! Shared state and API to handle incoming commands.
//!
//! This module is split in several files:
//!
//! - `mod.rs`: public API of the server state and send utilities
//! - `rfc1459.rs`: handlers for the commands defined in RFC 1459
//! - `rfc2810.rs`: handlers for the service commands of the RFC 2810 family
//! - `modern.rs`: handlers for the modern-dialect commands (CAP, KNOCK,
//!   LANGUAGE, SILENCE)

use crate::channel::{Channel, ChannelKind, MemberModes};
use crate::client::{Client, MessageQueue, MessageQueueItem};
use crate::config;
use crate::lines;
use crate::net::Control;
use selka_tokens::{Buffer, Command, Dialect, Message, ReplyBuffer, mode, rpl};
use slab::Slab;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{fs, io, net};
use tokio::sync::{Mutex, mpsc};

mod modern;
mod rfc1459;
mod rfc2810;
#[cfg(test)]
mod test;

#[macro_export]
macro_rules! server_version(() => {concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"))});

/// Information about selka from an IRC client perspective.
///
/// Sent to clients with the INFO command.
const SERVER_INFO: &str = include_str!("info.txt");

type ChannelMap = HashMap<String, Channel>;
type ClientMap = Slab<Client>;
type NickMap = HashMap<String, usize>;
type HandlerResult = Result<(), ()>;

pub struct CommandContext<'a> {
    id: usize,
    rb: &'a mut ReplyBuffer,
}

/// State of an IRC network.
///
/// This is just an `Arc` to the real data, so it's cheap to clone and clones
/// share the same data.  All mutation is serialized behind the lock: command
/// handlers are synchronous and the per-connection tasks in `net` only
/// suspend between messages, which gives per-connection ordering for free.
///
/// # Example
///
/// ```rust
/// # use selka::State;
/// # use selka::config;
/// # use selka_tokens::Message;
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let (control, _) = tokio::sync::mpsc::unbounded_channel();
/// let state = State::new(config::State::sample(), control);
///
/// // Each connection gets a queue onto which the state pushes the
/// // messages meant to be sent to the peer.
/// let (msg_queue, mut outgoing_msgs) = tokio::sync::mpsc::unbounded_channel();
/// let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 12345));
/// let id = state.peer_joined(addr, msg_queue).await;
///
/// let nick = Message::parse("NICK ser\r\n").unwrap();
/// let user = Message::parse("USER ser 0 * :ser\r\n").unwrap();
/// state.handle_message(id, nick).await;
/// state.handle_message(id, user).await;
///
/// // The client has registered; the welcome burst is on the queue.
/// let msg = outgoing_msgs.recv().await.unwrap();
/// let msg: &str = msg.as_ref();
/// assert!(msg.starts_with(":selka.localdomain 001 ser :Welcome to the IRC Network ser!ser@127.0.0.1"));
/// # });
/// ```
#[derive(Clone)]
pub struct State(Arc<Mutex<StateInner>>);

impl State {
    /// Initializes the IRC state from the given configuration.
    ///
    /// `control` carries the lifecycle requests raised by DIE, RESTART and
    /// REHASH back to the listening loop.
    pub fn new(config: config::State, control: mpsc::UnboundedSender<Control>) -> Self {
        let inner = StateInner::new(config, control);
        Self(Arc::new(Mutex::new(inner)))
    }

    /// Adds a new connection to the state and returns its id.
    ///
    /// The queue is used to push messages back to the peer.
    pub async fn peer_joined(&self, addr: net::SocketAddr, queue: MessageQueue) -> usize {
        self.0.lock().await.peer_joined(addr, queue)
    }

    /// Removes the given connection from the state, with an optional error.
    ///
    /// If the peer has quit unexpectedly, `err` should be set to `Some` so
    /// that other peers can be correctly informed.
    pub async fn peer_quit(&self, id: usize, err: Option<io::Error>) {
        self.0.lock().await.peer_quit(id, err);
    }

    /// Updates the state according to the given message from the given
    /// client.  Returns false when the client is gone afterwards.
    pub async fn handle_message(&self, id: usize, msg: Message<'_>) -> bool {
        self.0.lock().await.handle_message(id, msg)
    }

    /// Pings idle connections and reaps the ones that stopped answering.
    pub async fn liveness_sweep(&self) {
        self.0.lock().await.liveness_sweep();
    }

    /// Re-reads the reloadable part of the configuration.
    pub async fn rehash(&self, config: config::State) {
        self.0.lock().await.rehash(config);
    }

    /// Says goodbye to every connection and clears all indices.
    pub async fn shutdown(&self) {
        self.0.lock().await.shutdown();
    }
}

/// An entry of the bounded ring of nicknames remembered for WHOWAS.
struct WhowasEntry {
    nick: String,
    user: String,
    host: String,
    real: String,
}

impl WhowasEntry {
    /// Snapshots the identity of a client that is about to lose it, either
    /// by disconnecting or by changing nick.
    fn of(client: &Client) -> WhowasEntry {
        WhowasEntry {
            nick: client.nick().to_owned(),
            user: client.user().to_owned(),
            host: client.host.clone(),
            real: client.real().to_owned(),
        }
    }
}

/// The actual shared data (state) of the IRC server.
pub(crate) struct StateInner {
    /// The dialect spoken by this server; fixed for the process run.
    dialect: Dialect,

    /// The domain of the server.  This string is used as a prefix for
    /// replies sent to clients.
    domain: String,

    /// `org_name`, `org_location` and `org_mail` contain information about
    /// the administrators of the server, sent as a reply to ADMIN.
    org_name: String,
    org_location: String,
    org_mail: String,

    /// Arena of connection records.  Ids are stable for the lifetime of the
    /// connection and key both `nicks` and channel membership.
    clients: ClientMap,

    /// Case-folded nickname -> connection id, for registered clients only.
    nicks: NickMap,

    /// Case-folded channel name -> channel data.
    channels: ChannelMap,

    /// Ring of recently-released nicknames, newest at the back.
    whowas: VecDeque<WhowasEntry>,
    whowas_len: usize,

    /// The formatted time when this instance was created, sent in
    /// RPL_CREATED and STATS u.
    created_at: String,

    /// The message of the day.
    motd: Option<String>,

    /// The global password.  Clients need to issue a PASS command with this
    /// password to register.
    password: Option<String>,

    /// Modes applied at the creation of new channels.
    default_chan_mode: String,

    /// A list of (name, password, is-local) that are valid OPER parameters.
    opers: Vec<(String, String, bool)>,

    control: mpsc::UnboundedSender<Control>,

    channellen: usize,
    kicklen: usize,
    nicklen: usize,
    topiclen: usize,
    userlen: usize,
    max_channels: usize,
}

impl StateInner {
    pub fn new(config: config::State, control: mpsc::UnboundedSender<Control>) -> Self {
        let motd = config.motd_file.as_ref().and_then(|file| match fs::read_to_string(file) {
            Ok(motd) => Some(motd),
            Err(err) => {
                log::warn!("Failed to read {:?}: {}", file, err);
                None
            }
        });
        Self {
            dialect: config.dialect,
            domain: config.domain,
            org_name: config.org_name,
            org_location: config.org_location,
            org_mail: config.org_mail,
            clients: Slab::new(),
            nicks: HashMap::new(),
            channels: HashMap::new(),
            whowas: VecDeque::new(),
            whowas_len: config.whowas_len,
            created_at: crate::util::time_str(),
            motd,
            password: config.password,
            default_chan_mode: config.default_chan_mode,
            opers: config.opers,
            control,
            channellen: config.channellen,
            kicklen: config.kicklen,
            nicklen: config.nicklen,
            topiclen: config.topiclen,
            userlen: config.userlen,
            max_channels: config.max_channels,
        }
    }

    pub fn peer_joined(&mut self, addr: net::SocketAddr, queue: MessageQueue) -> usize {
        let mut client = Client::new(queue, addr.ip().to_string());
        client.pass_satisfied = self.password.is_none();
        let id = self.clients.insert(client);
        log::debug!("{}: Connected from {}", id, addr);
        id
    }

    pub fn peer_quit(&mut self, id: usize, err: Option<io::Error>) {
        if !self.clients.contains(id) {
            return;
        }
        log::debug!("{}: Disconnected", id);
        if let Some(err) = err {
            log::debug!("{}:     transport error: {}", id, err);
            self.remove_client(id, Some(lines::SOCKET_RESET));
        } else {
            self.remove_client(id, None);
        }
    }

    /// This function is called by `peer_quit`, `cmd_quit`, `cmd_kill` and
    /// the liveness sweep to do the various cleanup needed when a client
    /// disconnects:
    ///
    /// - remove the client from `StateInner::clients` and from the nick
    ///   index,
    /// - remove the client from each channel it was in, and drop channels
    ///   that end up empty,
    /// - send a QUIT message to all clients that shared a channel with it,
    /// - remember the nickname for WHOWAS.
    fn remove_client(&mut self, id: usize, reason: Option<&str>) {
        let client = self.clients.remove(id);
        let folded = casemapped(self.dialect, client.nick());

        if client.is_registered() {
            let mut response = Buffer::new();
            {
                let msg = response.message(client.full_name(), Command::Quit);
                match reason {
                    Some(reason) => msg.trailing_param(reason),
                    None => msg.build(),
                }
            }
            let msg = MessageQueueItem::from(response);

            let mut informed = HashSet::new();
            for channel in self.channels.values() {
                if channel.members.contains_key(&id) {
                    for member in channel.members.keys() {
                        if informed.insert(*member) {
                            self.send(*member, msg.clone());
                        }
                    }
                }
            }

            if self.nicks.get(&folded) == Some(&id) {
                self.nicks.remove(&folded);
            }
            self.remember_nick(WhowasEntry::of(&client));
        }

        self.channels.retain(|_, channel| {
            channel.members.remove(&id);
            channel.invites.remove(&folded);
            !channel.members.is_empty()
        });
    }

    fn remember_nick(&mut self, entry: WhowasEntry) {
        if self.whowas_len == 0 {
            return;
        }
        if self.whowas.len() == self.whowas_len {
            self.whowas.pop_front();
        }
        self.whowas.push_back(entry);
    }

    /// Swaps the nickname of a registered client.  Either both the nick
    /// index and the client record change, or neither does; callers have
    /// already checked that the new nick is free.
    fn rename_user(&mut self, id: usize, new_nick: &str) {
        let folded_new = casemapped(self.dialect, new_nick);
        let client = &mut self.clients[id];
        let folded_old = casemapped(self.dialect, client.nick());
        if self.nicks.get(&folded_old) == Some(&id) {
            self.nicks.remove(&folded_old);
        }
        self.nicks.insert(folded_new, id);
        client.set_nick(new_nick);
    }

    pub fn handle_message(&mut self, id: usize, msg: Message<'_>) -> bool {
        let client = match self.clients.get_mut(id) {
            Some(client) => client,
            None => return false,
        };
        client.update_alive();

        let client = &self.clients[id];
        let mut rb = ReplyBuffer::new(&self.domain, client.nick());

        let command = match msg.command {
            Ok(command) if command.is_enabled(self.dialect) => command,
            // Disabled commands do not exist in this dialect and are
            // indistinguishable from unknown words.
            other => {
                let word = match other {
                    Ok(command) => command.as_str(),
                    Err(unknown) => unknown,
                };
                if client.is_registered() {
                    rb.reply(rpl::ERR_UNKNOWNCOMMAND)
                        .param(word)
                        .trailing_param(lines::UNKNOWN_COMMAND);
                } else {
                    rb.reply(rpl::ERR_NOTREGISTERED).trailing_param(lines::NOT_REGISTERED);
                }
                client.send(rb);
                return true;
            }
        };

        if let Command::Reply(code) = command {
            // Numerics travel between servers; no links are configured, so
            // they are dropped without a user-visible reply.
            log::debug!("{}: numeric {:03} dropped (no server links)", id, code);
            return true;
        }

        if !msg.has_enough_params() {
            match command {
                Command::Nick | Command::Whois | Command::Whowas => {
                    rb.reply(rpl::ERR_NONICKNAMEGIVEN).trailing_param(lines::NEED_MORE_PARAMS);
                }
                Command::PrivMsg | Command::Notice | Command::SQuery if msg.num_params == 0 => {
                    rb.reply(rpl::ERR_NORECIPIENT).trailing_param(lines::NO_RECIPIENT);
                }
                Command::PrivMsg | Command::Notice | Command::SQuery if msg.num_params == 1 => {
                    rb.reply(rpl::ERR_NOTEXTTOSEND).trailing_param(lines::NO_TEXT_TO_SEND);
                }
                Command::Ping | Command::Pong => {
                    rb.reply(rpl::ERR_NOORIGIN).trailing_param(lines::NO_ORIGIN);
                }
                _ => {
                    rb.reply(rpl::ERR_NEEDMOREPARAMS)
                        .param(command.as_str())
                        .trailing_param(lines::NEED_MORE_PARAMS);
                }
            }
            client.send(rb);
            return true;
        }

        if !client.can_issue_command(command, msg.params[0]) {
            if client.is_registered() || command == Command::User || command == Command::Pass {
                rb.reply(rpl::ERR_ALREADYREGISTRED).trailing_param(lines::ALREADY_REGISTERED);
            } else {
                rb.reply(rpl::ERR_NOTREGISTERED).trailing_param(lines::NOT_REGISTERED);
            }
            client.send(rb);
            return true;
        }

        if command.oper_only() && !client.is_oper() {
            rb.reply(rpl::ERR_NOPRIVILEGES).trailing_param(lines::NO_PRIVILEGES);
            client.send(rb);
            return true;
        }

        let ps = msg.params;
        let n = msg.num_params;
        let ctx = CommandContext { id, rb: &mut rb };

        log::debug!("{}: {} {:?}", id, command, &ps[..n]);
        let cmd_result = match command {
            Command::Admin => self.cmd_admin(ctx),
            Command::Away => self.cmd_away(ctx, ps[0]),
            Command::Cap => self.cmd_cap(ctx, &ps[..n]),
            Command::Connect => self.cmd_connect(ctx, ps[0]),
            Command::Die => self.cmd_die(ctx),
            Command::Error => self.cmd_error(ctx, ps[0]),
            Command::Info => self.cmd_info(ctx),
            Command::Invite => self.cmd_invite(ctx, ps[0], ps[1]),
            Command::IsOn => self.cmd_ison(ctx, &ps[..n]),
            Command::Join => self.cmd_join(ctx, ps[0], ps[1]),
            Command::Kick => self.cmd_kick(ctx, ps[0], ps[1], ps[2]),
            Command::Kill => self.cmd_kill(ctx, ps[0], ps[1]),
            Command::Knock => self.cmd_knock(ctx, ps[0]),
            Command::Language => self.cmd_language(ctx, &ps[..n]),
            Command::Links => self.cmd_links(ctx),
            Command::List => self.cmd_list(ctx, ps[0]),
            Command::Lusers => self.cmd_lusers(ctx),
            Command::Mode => self.cmd_mode(ctx, ps[0], ps[1], &ps[2..std::cmp::max(2, n)]),
            Command::Motd => self.cmd_motd(ctx),
            Command::Names => self.cmd_names(ctx, ps[0]),
            Command::Nick => self.cmd_nick(ctx, ps[0]),
            Command::Notice => self.cmd_notice(ctx, ps[0], ps[1]),
            Command::Oper => self.cmd_oper(ctx, ps[0], ps[1]),
            Command::Part => self.cmd_part(ctx, ps[0], ps[1]),
            Command::Pass => self.cmd_pass(ctx, ps[0]),
            Command::Ping => self.cmd_ping(ctx, ps[0]),
            Command::Pong => Ok(()),
            Command::PrivMsg => self.cmd_privmsg(ctx, ps[0], ps[1]),
            Command::Quit => self.cmd_quit(ctx, ps[0]),
            Command::Rehash => self.cmd_rehash(ctx),
            Command::Restart => self.cmd_restart(ctx),
            Command::Server => self.cmd_server(ctx),
            Command::Service => self.cmd_service(ctx),
            Command::ServList => self.cmd_servlist(ctx, ps[0], ps[1]),
            Command::Silence => self.cmd_silence(ctx, ps[0]),
            Command::SQuery => self.cmd_squery(ctx, ps[0], ps[1]),
            Command::SQuit => self.cmd_squit(ctx, ps[0]),
            Command::Stats => self.cmd_stats(ctx, ps[0]),
            Command::Summon => self.cmd_summon(ctx, ps[0]),
            Command::Time => self.cmd_time(ctx),
            Command::Topic => self.cmd_topic(ctx, ps[0], if n <= 1 { None } else { Some(ps[1]) }),
            Command::Trace => self.cmd_trace(ctx),
            Command::User => self.cmd_user(ctx, ps[0], ps[1], ps[3]),
            Command::UserHost => self.cmd_userhost(ctx, &ps[..n]),
            Command::Version => self.cmd_version(ctx),
            Command::Wallops => self.cmd_wallops(ctx, ps[0]),
            Command::Who => self.cmd_who(ctx, ps[0], ps[1]),
            Command::Whois => self.cmd_whois(ctx, ps[0]),
            Command::Whowas => self.cmd_whowas(ctx, ps[0], ps[1]),
            Command::Reply(_) => Ok(()),
        };

        if !rb.is_empty() {
            self.send(id, rb.into());
        }
        if cmd_result.is_ok() {
            if let Some(client) = self.clients.get_mut(id) {
                let old_state = client.state();
                let new_state = client.apply_command(command, msg.params[0]);
                if new_state.is_registered() && !old_state.is_registered() {
                    self.complete_registration(id);
                }
            }
        }
        self.clients.contains(id)
    }

    /// Finishes a registration the state machine just declared complete:
    /// enforces the server password, claims the nick index entry and sends
    /// the welcome burst.
    fn complete_registration(&mut self, id: usize) {
        if self.password.is_some() && !self.clients[id].pass_satisfied {
            log::debug!("{}: no valid PASS before registration", id);
            self.clients[id].send(crate::client::error_line(lines::BAD_PASSWORD));
            self.remove_client(id, None);
            return;
        }

        let folded = casemapped(self.dialect, self.clients[id].nick());
        self.nicks.insert(folded, id);

        let client = &self.clients[id];
        log::debug!("{}: Registered as {}", id, client.full_name());
        let mut rb = ReplyBuffer::new(&self.domain, client.nick());
        self.write_welcome(&mut rb, id);
        self.clients[id].send(rb);
    }

    /// The periodic liveness pass.
    ///
    /// Connections idle for a minute are pinged; connections whose last
    /// sign of life is older than five minutes are reaped.
    pub fn liveness_sweep(&mut self) {
        const IDLE: Duration = Duration::from_secs(60);
        const DEAD: Duration = Duration::from_secs(300);

        let now = Instant::now();
        let mut dead = Vec::new();
        let domain = &self.domain;
        for (id, client) in self.clients.iter_mut() {
            if !client.is_registered() {
                continue;
            }
            let idle = IDLE <= now.duration_since(client.last_action)
                && IDLE <= now.duration_since(client.last_alive);
            if !idle {
                continue;
            }
            if DEAD <= now.duration_since(client.last_alive) {
                dead.push(id);
            } else if IDLE <= now.duration_since(client.last_ping) {
                let mut ping = Buffer::new();
                ping.message("", Command::Ping).trailing_param(domain);
                client.send(ping);
                client.last_ping = now;
            }
        }
        for id in dead {
            log::info!("{}: Ping timeout", id);
            self.remove_client(id, Some(lines::PING_TIMEOUT));
        }
    }

    pub fn rehash(&mut self, config: config::State) {
        self.motd = config.motd_file.as_ref().and_then(|file| match fs::read_to_string(file) {
            Ok(motd) => Some(motd),
            Err(err) => {
                log::warn!("Failed to read {:?}: {}", file, err);
                None
            }
        });
        self.password = config.password;
        self.opers = config.opers;
        log::info!("Configuration rehashed");
    }

    pub fn shutdown(&mut self) {
        log::info!("Saying goodbye to {} connection(s)", self.clients.len());
        let goodbye = crate::client::shutdown_line();
        for (_, client) in self.clients.iter() {
            client.send(goodbye.clone());
        }
        self.clients.clear();
        self.nicks.clear();
        self.channels.clear();
    }

    pub(crate) fn fold(&self, s: &str) -> String {
        casemapped(self.dialect, s)
    }
}

/// Returns `Ok(channel)` when `name` folds to an existing channel name.
/// Otherwise returns `Err(())` and sends an error to the client.
fn find_channel<'a>(id: usize, rb: &mut ReplyBuffer, channels: &'a ChannelMap, folded: &str,
                    name: &str) -> Result<&'a Channel, ()>
{
    match channels.get(folded) {
        Some(channel) => Ok(channel),
        None => {
            log::debug!("{}:         no such channel", id);
            rb.reply(rpl::ERR_NOSUCHCHANNEL).param(name).trailing_param(lines::NO_SUCH_CHANNEL);
            Err(())
        }
    }
}

/// Returns `Ok(member_modes)` when the client identified by `id` is in the
/// given `channel`.  Otherwise returns `Err(())` and sends an error to the
/// client.
///
/// `channel_name` is needed for the error reply.
fn find_member(id: usize, rb: &mut ReplyBuffer, channel: &Channel,
               channel_name: &str) -> Result<MemberModes, ()>
{
    match channel.members.get(&id) {
        Some(modes) => Ok(*modes),
        None => {
            log::debug!("{}:         not on channel", id);
            rb.reply(rpl::ERR_NOTONCHANNEL)
                .param(channel_name)
                .trailing_param(lines::NOT_ON_CHANNEL);
            Err(())
        }
    }
}

/// Returns `Ok((id, client))` when the client identified by the nickname
/// `nick` is connected and registered.  Otherwise returns `Err(())` and
/// sends an error to the client.
fn find_nick<'a>(id: usize, rb: &mut ReplyBuffer, clients: &'a ClientMap, nicks: &NickMap,
                 folded: &str, nick: &str) -> Result<(usize, &'a Client), ()>
{
    match nicks.get(folded).and_then(|target| clients.get(*target).map(|c| (*target, c))) {
        Some(found) => Ok(found),
        None => {
            log::debug!("{}:         nick doesn't exist", id);
            rb.reply(rpl::ERR_NOSUCHNICK).param(nick).trailing_param(lines::NO_SUCH_NICK);
            Err(())
        }
    }
}

// Send utilities
impl StateInner {
    /// Sends the given message to the given client.
    fn send(&self, id: usize, msg: MessageQueueItem) {
        if let Some(client) = self.clients.get(id) {
            client.send(msg);
        }
    }

    /// Sends the given message to all members of the given channel.
    fn broadcast(&self, folded_channel: &str, msg: MessageQueueItem) {
        if let Some(channel) = self.channels.get(folded_channel) {
            for member in channel.members.keys() {
                self.send(*member, msg.clone());
            }
        }
    }

    /// Sends the given message to the client and everyone that shares a
    /// channel with it, once each.  Used for NICK announcements.
    fn send_to_peers(&self, id: usize, msg: MessageQueueItem) {
        let mut informed = HashSet::new();
        informed.insert(id);
        self.send(id, msg.clone());
        for channel in self.channels.values() {
            if channel.members.contains_key(&id) {
                for member in channel.members.keys() {
                    if informed.insert(*member) {
                        self.send(*member, msg.clone());
                    }
                }
            }
        }
    }

    /// Counts (visible users, invisible users, operators, unknown
    /// connections) for LUSERS and STATS.  Derived on demand, never cached.
    fn crowd_counts(&self) -> (usize, usize, usize, usize) {
        let mut users = 0;
        let mut invisible = 0;
        let mut opers = 0;
        let mut unknown = 0;
        for (_, client) in self.clients.iter() {
            if !client.is_registered() {
                unknown += 1;
            } else {
                if client.invisible {
                    invisible += 1;
                } else {
                    users += 1;
                }
                if client.is_oper() {
                    opers += 1;
                }
            }
        }
        (users, invisible, opers, unknown)
    }

    fn write_i_support(&self, rb: &mut ReplyBuffer) {
        rb.reply(rpl::ISUPPORT)
            .param("CASEMAPPING=ascii")
            .param(&format!("CHANNELLEN={}", self.channellen))
            .param(&format!("CHANTYPES={}", ChannelKind::prefixes()))
            .param(mode::chan_modes_isupport(self.dialect))
            .param("EXCEPTS")
            .param("INVEX")
            .param(&format!("KICKLEN={}", self.kicklen))
            .param("MODES")
            .param(&format!("NICKLEN={}", self.nicklen))
            .param(mode::prefix_isupport(self.dialect))
            .param("SILENCE=15")
            .param(&format!("TOPICLEN={}", self.topiclen))
            .trailing_param(lines::I_SUPPORT);
    }

    fn write_lusers(&self, rb: &mut ReplyBuffer) {
        let (users, invisible, opers, unknown) = self.crowd_counts();
        lines::luser_client(rb.reply(rpl::LUSERCLIENT), users, invisible);
        if 0 < opers {
            rb.reply(rpl::LUSEROP).param(opers.to_string()).trailing_param(lines::LUSER_OPS);
        }
        if 0 < unknown {
            rb.reply(rpl::LUSERUNKNOWN)
                .param(unknown.to_string())
                .trailing_param(lines::LUSER_UNKNOWN);
        }
        if !self.channels.is_empty() {
            rb.reply(rpl::LUSERCHANNELS)
                .param(self.channels.values().filter(|c| !c.secret).count().to_string())
                .trailing_param(lines::LUSER_CHANNELS);
        }
        lines::luser_me(rb.reply(rpl::LUSERME), self.clients.len());
    }

    fn write_motd(&self, rb: &mut ReplyBuffer) {
        if let Some(ref motd) = self.motd {
            lines::motd_start(rb.reply(rpl::MOTDSTART), &self.domain);
            for line in motd.lines() {
                let mut msg = rb.reply(rpl::MOTD);
                let trailing = msg.raw_trailing_param();
                trailing.push_str("- ");
                trailing.push_str(line);
            }
            rb.reply(rpl::ENDOFMOTD).trailing_param(lines::END_OF_MOTD);
        } else {
            rb.reply(rpl::ERR_NOMOTD).trailing_param(lines::NO_MOTD);
        }
    }

    /// Sends the list of nicknames in the channel `name` to the given
    /// client.  Hidden channels list as empty for outsiders; the end marker
    /// is always sent.
    fn write_names(&self, id: usize, rb: &mut ReplyBuffer, name: &str) {
        let folded = self.fold(name);
        if let Some(channel) = self.channels.get(&folded) {
            let is_member = channel.members.contains_key(&id);
            if (is_member || !channel.is_hidden_from_outside()) && !channel.members.is_empty() {
                let mut message = rb.reply(rpl::NAMREPLY).param(channel.symbol()).param(name);
                let trailing = message.raw_trailing_param();
                for (member, modes) in &channel.members {
                    if let Some(s) = modes.symbol() {
                        trailing.push(s);
                    }
                    trailing.push_str(self.clients[*member].nick());
                    trailing.push(' ');
                }
                trailing.pop();  // Remove last space
            }
        }
        rb.reply(rpl::ENDOFNAMES).param(name).trailing_param(lines::END_OF_NAMES);
    }

    /// Sends the topic of the channel `name` to the given client.
    fn write_topic(&self, rb: &mut ReplyBuffer, channel: &Channel, name: &str) {
        if let Some(ref topic) = channel.topic {
            rb.reply(rpl::TOPIC).param(name).trailing_param(&topic.text);
            rb.reply(rpl::TOPICWHOTIME)
                .param(name)
                .param(&topic.set_by)
                .param(topic.set_at.to_string());
        } else {
            rb.reply(rpl::NOTOPIC).param(name).trailing_param(lines::NO_TOPIC);
        }
    }

    /// Sends welcome messages.  Called when a client has completed its
    /// registration.
    fn write_welcome(&self, rb: &mut ReplyBuffer, id: usize) {
        let client = &self.clients[id];
        lines::welcome(rb.reply(rpl::WELCOME), client.full_name());
        lines::your_host(rb.reply(rpl::YOURHOST), &self.domain, server_version!());
        lines::created(rb.reply(rpl::CREATED), &self.created_at);
        rb.reply(rpl::MYINFO)
            .param(&self.domain)
            .param(server_version!())
            .param(mode::user_modes(self.dialect))
            .param(mode::simple_chan_modes(self.dialect))
            .param(mode::extended_chan_modes(self.dialect));
        if self.dialect == Dialect::Modern {
            self.write_i_support(rb);
        }
        self.write_lusers(rb);
        self.write_motd(rb);
        client.write_modes(rb);
    }
}

/// The case-folded form of a name, used as key in the nick and channel
/// indices.
///
/// Folding is plain ASCII lowercasing; under the RFC dialects the
/// characters `[]\~` additionally fold to `{}|^`, per RFC 1459 section
/// 2.2.
pub(crate) fn casemapped(dialect: Dialect, s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A'..='Z' => c.to_ascii_lowercase(),
            '[' if dialect != Dialect::Modern => '{',
            ']' if dialect != Dialect::Modern => '}',
            '\\' if dialect != Dialect::Modern => '|',
            '~' if dialect != Dialect::Modern => '^',
            _ => c,
        })
        .collect()
}

/// Whether a string is accepted as a nickname.
///
/// First-character restrictions of the RFC dialects (must be a letter) are
/// enforced by NICK itself, not by this predicate.
fn is_valid_nickname(dialect: Dialect, s: &str, max_len: usize) -> bool {
    if s.is_empty() || max_len < s.len() {
        return false;
    }
    match dialect {
        Dialect::Modern => {
            let ctrl_g = 7 as char;
            s.chars().all(|c| {
                c != ' ' && c != ',' && c != ctrl_g
                    && c != '!' && c != '@' && c != '*' && c != '?'
                    && c != '+' && c != '%' && c != '#'
            })
        }
        _ => {
            // Inclusive ranges; the half-open comparisons of the reference
            // implementation would have rejected 'z', 'Z' and '9'.
            let is_valid_nickname_char = |&c: &u8| {
                (b'0' <= c && c <= b'9')
                    || (b'a' <= c && c <= b'z')
                    || (b'A' <= c && c <= b'Z')
                    // "[", "]", "\", "`", "_", "^", "{", "|", "}"
                    || (0x5b <= c && c <= 0x60)
                    || (0x7b <= c && c <= 0x7d)
            };
            s.as_bytes().iter().all(is_valid_nickname_char)
        }
    }
}

/// Resolves a channel name against the channel-type registry and validates
/// its body.
fn channel_kind_of(s: &str, max_len: usize) -> Option<ChannelKind> {
    // https://tools.ietf.org/html/rfc2811.html#section-2.1
    let ctrl_g = 7 as char;
    if s.is_empty() || max_len < s.len() {
        return None;
    }
    let kind = ChannelKind::from_prefix(s.chars().next().unwrap())?;
    if s.chars().all(|c| c != ' ' && c != ',' && c != ctrl_g && c != ':') {
        Some(kind)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casemapped() {
        assert_eq!(casemapped(Dialect::Modern, "NiCk"), "nick");
        assert_eq!(casemapped(Dialect::Modern, "ni[k]"), "ni[k]");
        assert_eq!(casemapped(Dialect::Rfc1459, "NI[K]\\~"), "ni{k}|^");
        assert_eq!(casemapped(Dialect::Rfc2810, "[a]"), "{a}");
    }

    #[test]
    fn test_is_valid_nickname_rfc() {
        const MAX_LEN: usize = 9;

        assert!(is_valid_nickname(Dialect::Rfc1459, "nickname", MAX_LEN));
        assert!(is_valid_nickname(Dialect::Rfc1459, "my{}_\\^", MAX_LEN));
        assert!(is_valid_nickname(Dialect::Rfc1459, "zZ9", MAX_LEN));

        assert!(!is_valid_nickname(Dialect::Rfc1459, "", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Rfc1459, "sp ace", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Rfc1459, "acc\u{e9}nt", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Rfc1459, "waytoolongnickname", MAX_LEN));
    }

    #[test]
    fn test_is_valid_nickname_modern() {
        const MAX_LEN: usize = 16;

        assert!(is_valid_nickname(Dialect::Modern, "nickname", MAX_LEN));
        assert!(is_valid_nickname(Dialect::Modern, "acc\u{e9}nt", MAX_LEN));
        assert!(is_valid_nickname(Dialect::Modern, "dot.ted", MAX_LEN));

        assert!(!is_valid_nickname(Dialect::Modern, "sp ace", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Modern, "who?", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Modern, "half%op", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Modern, "chan#nel", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Modern, "a,b", MAX_LEN));
        assert!(!is_valid_nickname(Dialect::Modern, "ding\u{7}", MAX_LEN));
    }

    #[test]
    fn test_channel_kind_of() {
        const MAX_LEN: usize = 50;

        assert_eq!(channel_kind_of("#Channel9", MAX_LEN), Some(ChannelKind::Normal));

        assert_eq!(channel_kind_of("", MAX_LEN), None);
        assert_eq!(channel_kind_of("channel", MAX_LEN), None);
        assert_eq!(channel_kind_of("&local", MAX_LEN), None);
        assert_eq!(channel_kind_of("#chan nel", MAX_LEN), None);
        assert_eq!(channel_kind_of("#chan:nel", MAX_LEN), None);
        assert_eq!(
            channel_kind_of("#longchannelverylongohwowthisisalongchannelohwowmuchlong", MAX_LEN),
            None
        );
    }
}
