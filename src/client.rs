//! The protocol handler: owns the socket, ISUPPORT state, and nick/user
//! registration, and dispatches parsed messages to typed events.
//!
//! The `feed(message) -> reactions` shape is grounded on the teacher's
//! `state::HandshakeMachine::feed`, generalized from a CAP/SASL-only
//! handshake to the full ~50-entry dispatch table in SPEC_FULL.md §4.5.

use std::io;

use crate::ctcp;
use crate::error::{IrcCoreError, Result};
use crate::events::{EventHandlers, NickInUseHandlers};
use crate::format::{format_line, split_chat_message};
use crate::framer::LineFramer;
use crate::isupport::IsupportState;
use crate::message::MessageRef;
use crate::mode::build_mode_lines;
use crate::tracker::{StartAction, Tracker};
use crate::transport::{has_illegal_control_char, TcpTransport, Transport};
use crate::user::IrcUser;

/// The registration parameters the client needs; this is the entirety of
/// this crate's configuration surface (no file-based config format —
/// that belongs to the out-of-scope executable).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub nick: String,
    pub user: String,
    pub real_name: String,
    pub password: Option<String>,
}

pub struct Client<T: Transport> {
    transport: T,
    framer: LineFramer,
    isupport: IsupportState,
    config: ClientConfig,
    self_nick: String,
    connected: bool,
    pub events: EventHandlers,
    pub nick_in_use: NickInUseHandlers,
    tracker: Tracker,
}

impl Client<TcpTransport> {
    /// Dials `address` over plain TCP and sends the registration handshake.
    pub fn connect(address: &str, config: ClientConfig) -> Result<Self> {
        let transport = TcpTransport::connect(address)
            .map_err(|e| IrcCoreError::TransportError(e.to_string()))?;
        let mut client = Client::from_transport(transport, config);
        client.register()?;
        Ok(client)
    }
}

impl<T: Transport> Client<T> {
    pub fn from_transport(transport: T, config: ClientConfig) -> Self {
        let self_nick = config.nick.clone();
        Client {
            transport,
            framer: LineFramer::default(),
            isupport: IsupportState::new(),
            config,
            self_nick,
            connected: false,
            events: EventHandlers::new(),
            nick_in_use: NickInUseHandlers::new(),
            tracker: Tracker::new(),
        }
    }

    /// Marks the connection live and sends `PASS`/`NICK`/`USER`. Exposed for
    /// any transport, including test doubles — [`Client::connect`] is just a
    /// `TcpTransport`-specific convenience wrapper around this plus dialing.
    pub fn register(&mut self) -> Result<()> {
        if self.connected {
            return Err(IrcCoreError::AlreadyConnected);
        }
        self.connected = true;
        if let Some(pass) = self.config.password.clone() {
            self.write_raw(&format_line("PASS", &[&pass]))?;
        }
        self.write_raw(&format_line("NICK", &[&self.config.nick.clone()]))?;
        let user = self.config.user.clone();
        let real_name = self.config.real_name.clone();
        self.write_raw(&format_line("USER", &[&user, "*", "*", &real_name]))?;
        Ok(())
    }

    fn require_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(IrcCoreError::NotConnected)
        }
    }

    /// Sends a pre-built raw line (must already end in `\r\n`) verbatim.
    ///
    /// Exposed for callers that need to issue a command this crate has no
    /// dedicated helper for; prefer [`Client::write_line`] when `format_line`
    /// framing suffices.
    pub fn write_raw(&mut self, line: &str) -> Result<()> {
        self.require_connected()?;
        tracing::trace!(line = line.trim_end(), "-> ");
        self.transport
            .send(line.as_bytes())
            .map_err(|e| IrcCoreError::TransportError(self.transport.error_text(&e)))
    }

    pub fn isupport(&self) -> &IsupportState {
        &self.isupport
    }

    /// Direct access to the underlying transport; chiefly useful for feeding
    /// a test double bytes to drive [`Client::read_step`].
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn self_nick(&self) -> &str {
        &self.self_nick
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Starts the tracker. If connected, kicks off the self-WHOIS handshake.
    pub fn start_tracking(&mut self) -> Result<()> {
        match self.tracker.start(self.connected, &self.self_nick) {
            StartAction::SendWhois(nick) => self.write_raw(&format_line("WHOIS", &[&nick])),
            StartAction::None => Ok(()),
        }
    }

    pub fn stop_tracking(&mut self) {
        self.tracker.stop();
    }

    /// Performs one non-blocking read and dispatches all complete messages
    /// it produced. Returns `true` if the peer closed the connection.
    pub fn read_step(&mut self) -> Result<bool> {
        self.require_connected()?;
        let mut buf = [0u8; 4096];
        match self.transport.recv(&mut buf) {
            Ok(0) => {
                self.connected = false;
                Ok(true)
            }
            Ok(n) => {
                self.framer.push(&buf[..n])?;
                while let Some(line) = self.framer.next_line() {
                    let text = String::from_utf8_lossy(&line).into_owned();
                    if let Some(ch) = has_illegal_control_char(&text) {
                        tracing::warn!(char = ?ch, line = %text, "dropping line with illegal control character");
                        continue;
                    }
                    match MessageRef::parse(&text) {
                        Ok(msg) => self.dispatch(&msg)?,
                        Err(e) => {
                            tracing::warn!(error = %e, line = %text, "dropping malformed line")
                        }
                    }
                }
                Ok(false)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => {
                self.connected = false;
                Err(IrcCoreError::TransportError(self.transport.error_text(&e)))
            }
        }
    }

    fn dispatch(&mut self, msg: &MessageRef<'_>) -> Result<()> {
        let args = msg.args;
        match msg.command {
            "PING" => {
                let token = args.get(0).unwrap_or("");
                self.write_raw(&format_line("PONG", &[token]))?;
            }
            "PRIVMSG" => self.dispatch_chat(msg, false),
            "NOTICE" => self.dispatch_chat(msg, true),
            "NICK" => {
                let old = IrcUser::from_prefix(msg.prefix.unwrap_or(""));
                let new_nick = args.get(0).unwrap_or("");
                self.tracker.handle_nick_change(&old.nick_name, new_nick);
                for h in &mut self.events.on_nick_change {
                    h(&old, new_nick);
                }
                if old.nick_name == self.self_nick {
                    self.self_nick = new_nick.to_string();
                }
            }
            "JOIN" => {
                let user = IrcUser::from_prefix(msg.prefix.unwrap_or(""));
                let channel = args.get(0).unwrap_or("");
                if user.nick_name == self.self_nick {
                    self.tracker.handle_successful_join(channel);
                    for h in &mut self.events.on_successful_join {
                        h(channel);
                    }
                } else {
                    self.tracker.handle_join(
                        &user.nick_name,
                        &user.user_name,
                        &user.host_name,
                        channel,
                    );
                    for h in &mut self.events.on_join {
                        h(&user, channel);
                    }
                }
            }
            "PART" => {
                let user = IrcUser::from_prefix(msg.prefix.unwrap_or(""));
                let channel = args.get(0).unwrap_or("");
                self.tracker.handle_leave(&user.nick_name, channel);
                for h in &mut self.events.on_part {
                    h(&user, channel);
                }
            }
            "KICK" => {
                let kicker = IrcUser::from_prefix(msg.prefix.unwrap_or(""));
                let channel = args.get(0).unwrap_or("");
                let kicked = args.get(1).unwrap_or("");
                let comment = args.get(2);
                self.tracker.handle_leave(kicked, channel);
                for h in &mut self.events.on_kick {
                    h(&kicker, channel, kicked, comment);
                }
            }
            "QUIT" => {
                let user = IrcUser::from_prefix(msg.prefix.unwrap_or(""));
                let message = args.get(0);
                self.tracker.handle_quit(&user.nick_name);
                for h in &mut self.events.on_quit {
                    h(&user, message);
                }
            }
            "MODE" => {
                let target = args.get(0).unwrap_or("");
                if target.starts_with('#') {
                    let mode_string = args.get(1).unwrap_or("");
                    let params: Vec<&str> = args.as_slice()[2.min(args.len())..].to_vec();
                    self.tracker
                        .handle_mode_change(&self.isupport, target, mode_string, &params);
                    for h in &mut self.events.on_mode_change {
                        h(target, mode_string, &params);
                    }
                } else {
                    let user = IrcUser::from_prefix(msg.prefix.unwrap_or(""));
                    let mode_string = args.get(1).unwrap_or("");
                    for h in &mut self.events.on_user_mode_change {
                        h(&user, mode_string);
                    }
                }
            }
            "INVITE" => {
                if let Some(channel) = args.get(1) {
                    for h in &mut self.events.on_invite {
                        h(channel);
                    }
                }
            }
            "ERROR" => {
                self.connected = false;
                return Err(IrcCoreError::IrcError(
                    args.get(0).unwrap_or("").to_string(),
                ));
            }
            other => self.dispatch_numeric(other, msg)?,
        }
        Ok(())
    }

    fn dispatch_chat(&mut self, msg: &MessageRef<'_>, is_notice: bool) {
        let user = IrcUser::from_prefix(msg.prefix.unwrap_or(""));
        let target = msg.args.get(0).unwrap_or("");
        let text = msg.args.get(1).unwrap_or("");

        if let Some(payload) = ctcp::extract(text) {
            if is_notice {
                if !self.events.on_ctcp_reply.is_empty() {
                    for h in &mut self.events.on_ctcp_reply {
                        h(&user, target, payload.tag, payload.data);
                    }
                    return;
                }
            } else if !self.events.on_ctcp_query.is_empty() {
                for h in &mut self.events.on_ctcp_query {
                    h(&user, target, payload.tag, payload.data);
                }
                return;
            }
        }

        if is_notice {
            for h in &mut self.events.on_notice {
                h(&user, target, text);
            }
        } else {
            for h in &mut self.events.on_message {
                h(&user, target, text);
            }
        }
    }

    fn dispatch_numeric(&mut self, command: &str, msg: &MessageRef<'_>) -> Result<()> {
        let args = msg.args;
        let Some(code) = msg.numeric() else {
            return Ok(());
        };

        match code {
            1 => {
                if let Some(nick) = args.get(0) {
                    self.self_nick = nick.to_string();
                }
                self.tracker.handle_connect(
                    &self.self_nick.clone(),
                    &self.config.user.clone(),
                    &self.config.real_name.clone(),
                );
                for h in &mut self.events.on_connect {
                    h();
                }
            }
            2..=4 | 250..=255 | 265 | 266 => {
                let text = if code == 4 {
                    args.as_slice().join(" ")
                } else {
                    args.as_slice().last().copied().unwrap_or("").to_string()
                };
                for h in &mut self.events.on_server_info {
                    h(command, &text);
                }
            }
            5 => self
                .isupport
                .apply_005(&args.as_slice()[1.min(args.len())..]),
            302 => {
                let text = args.as_slice().last().copied().unwrap_or("");
                let users: Vec<IrcUser> = text
                    .split_whitespace()
                    .take(5)
                    .map(|entry| {
                        let entry = entry.trim_start_matches('+').trim_start_matches('-');
                        match entry.split_once('=') {
                            Some((nick, rest)) => {
                                let rest = rest.trim_start_matches(['+', '-']);
                                match rest.split_once('@') {
                                    Some((user, host)) => IrcUser {
                                        nick_name: nick.to_string(),
                                        user_name: user.to_string(),
                                        host_name: host.to_string(),
                                    },
                                    None => IrcUser {
                                        nick_name: nick.to_string(),
                                        ..Default::default()
                                    },
                                }
                            }
                            None => IrcUser {
                                nick_name: entry.to_string(),
                                ..Default::default()
                            },
                        }
                    })
                    .collect();
                for h in &mut self.events.on_userhost_reply {
                    h(&users);
                }
            }
            301 => {
                let nick = args.get(1).unwrap_or("");
                let message = args.get(2).unwrap_or("");
                for h in &mut self.events.on_whois_away_reply {
                    h(nick, message);
                }
            }
            311 => {
                let nick = args.get(1).unwrap_or("");
                let user = args.get(2).unwrap_or("");
                let host = args.get(3).unwrap_or("");
                let real_name = args.get(5).unwrap_or("");
                for h in &mut self.events.on_whois_reply {
                    h(nick, user, host, real_name);
                }
            }
            312 => {
                let nick = args.get(1).unwrap_or("");
                let server = args.get(2).unwrap_or("");
                let info = args.get(3).unwrap_or("");
                for h in &mut self.events.on_whois_server_reply {
                    h(nick, server, info);
                }
            }
            313 => {
                let nick = args.get(1).unwrap_or("");
                for h in &mut self.events.on_whois_operator_reply {
                    h(nick);
                }
            }
            317 => {
                let nick = args.get(1).unwrap_or("");
                let idle: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
                let signon: Option<u64> = args.get(3).and_then(|s| s.parse().ok());
                for h in &mut self.events.on_whois_idle_reply {
                    h(nick, idle, signon);
                }
            }
            318 => {
                let nick = args.get(1).unwrap_or("");
                self.tracker.handle_whois_end(nick);
                for h in &mut self.events.on_whois_end {
                    h(nick);
                }
            }
            319 => {
                let nick = args.get(1).unwrap_or("");
                let raw = args.as_slice().last().copied().unwrap_or("");
                let channels_to_query =
                    self.tracker
                        .handle_whois_channels_reply(&self.isupport, nick, raw);
                let channels: Vec<String> = raw.split_whitespace().map(|s| s.to_string()).collect();
                for h in &mut self.events.on_whois_channels_reply {
                    h(nick, &channels);
                }
                for channel in channels_to_query {
                    self.write_raw(&format_line("NAMES", &[&channel]))?;
                }
            }
            330 => {
                let nick = args.get(1).unwrap_or("");
                let account = args.get(2).unwrap_or("");
                for h in &mut self.events.on_whois_account_reply {
                    h(nick, account);
                }
            }
            310 => self.fire_whois_generic(args.get(1), args.as_slice().last().copied(), |e| {
                &mut e.on_whois_help_op_reply
            }),
            320 => self.fire_whois_generic(args.get(1), args.as_slice().last().copied(), |e| {
                &mut e.on_whois_special_reply
            }),
            338 => self.fire_whois_generic(args.get(1), args.as_slice().last().copied(), |e| {
                &mut e.on_whois_actually_reply
            }),
            378 => self.fire_whois_generic(args.get(1), args.as_slice().last().copied(), |e| {
                &mut e.on_whois_host_reply
            }),
            379 => self.fire_whois_generic(args.get(1), args.as_slice().last().copied(), |e| {
                &mut e.on_whois_modes_reply
            }),
            671 => self.fire_whois_generic(args.get(1), args.as_slice().last().copied(), |e| {
                &mut e.on_whois_secure_reply
            }),
            332 => {
                let channel = args.get(1).unwrap_or("");
                let topic = args.as_slice().last().copied().unwrap_or("");
                for h in &mut self.events.on_topic {
                    h(channel, topic);
                }
            }
            333 => {
                let channel = args.get(1).unwrap_or("");
                let setter = args.get(2).unwrap_or("");
                let set_time = args.get(3).unwrap_or("");
                for h in &mut self.events.on_topic_info {
                    h(channel, setter, set_time);
                }
            }
            353 => {
                let channel = args.get(2).unwrap_or("");
                let raw = args.as_slice().last().copied().unwrap_or("");
                let names: Vec<String> = raw.split_whitespace().map(|s| s.to_string()).collect();
                self.tracker
                    .handle_name_list(&self.isupport, channel, &names);
                for h in &mut self.events.on_name_list {
                    h(channel, &names);
                }
            }
            366 => {
                let channel = args.get(1).unwrap_or("");
                for h in &mut self.events.on_name_list_end {
                    h(channel);
                }
            }
            372 => self.fire_text(args.as_slice().last().copied(), |e| &mut e.on_motd),
            375 => self.fire_text(args.as_slice().last().copied(), |e| &mut e.on_motd_start),
            376 => {
                for h in &mut self.events.on_motd_end {
                    h();
                }
            }
            422 => {
                for h in &mut self.events.on_no_motd {
                    h();
                }
            }
            433 => {
                let failed_nick = args.get(1).unwrap_or("");
                let mut replacement = None;
                for h in &mut self.nick_in_use.handlers {
                    if let Some(n) = h(failed_nick) {
                        if !n.is_empty() {
                            replacement = Some(n);
                            break;
                        }
                    }
                }
                match replacement {
                    Some(n) => self.write_raw(&format_line("NICK", &[&n]))?,
                    None => {
                        let _ = self.transport.close();
                        self.connected = false;
                        return Err(IrcCoreError::IrcError(
                            "433 Nick already in use was unhandled".to_string(),
                        ));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn fire_whois_generic(
        &mut self,
        nick: Option<&str>,
        text: Option<&str>,
        select: impl FnOnce(&mut EventHandlers) -> &mut Vec<Box<dyn FnMut(&str, &str)>>,
    ) {
        let nick = nick.unwrap_or("");
        let text = text.unwrap_or("");
        for h in select(&mut self.events) {
            h(nick, text);
        }
    }

    fn fire_text(
        &mut self,
        text: Option<&str>,
        select: impl FnOnce(&mut EventHandlers) -> &mut Vec<Box<dyn FnMut(&str)>>,
    ) {
        let text = text.unwrap_or("");
        for h in select(&mut self.events) {
            h(text);
        }
    }

    // --- outgoing operations -------------------------------------------------

    pub fn write_line(&mut self, command: &str, args: &[&str]) -> Result<()> {
        self.write_raw(&format_line(command, args))
    }

    pub fn send(&mut self, target: &str, body: &str) -> Result<()> {
        self.require_connected()?;
        for line in split_chat_message("PRIVMSG", target, body) {
            self.write_raw(&line)?;
        }
        Ok(())
    }

    pub fn notice(&mut self, target: &str, body: &str) -> Result<()> {
        self.require_connected()?;
        for line in split_chat_message("NOTICE", target, body) {
            self.write_raw(&line)?;
        }
        Ok(())
    }

    pub fn ctcp_query(&mut self, target: &str, tag: &str, data: &str) -> Result<()> {
        self.send(target, &format_ctcp(tag, data))
    }

    pub fn ctcp_reply(&mut self, target: &str, tag: &str, data: &str) -> Result<()> {
        self.notice(target, &format_ctcp(tag, data))
    }

    pub fn ctcp_error(&mut self, target: &str, tag: &str, message: &str) -> Result<()> {
        self.notice(target, &format_ctcp("ERRMSG", &format!("{tag} :{message}")))
    }

    pub fn set_nick(&mut self, new_nick: &str) -> Result<()> {
        self.validate_nick(new_nick)?;
        if self.connected {
            self.write_raw(&format_line("NICK", &[new_nick]))
        } else {
            self.config.nick = new_nick.to_string();
            self.self_nick = new_nick.to_string();
            Ok(())
        }
    }

    fn validate_nick(&self, nick: &str) -> Result<()> {
        if nick.is_empty() {
            return Err(IrcCoreError::InvalidArgument(
                "nick must not be empty".to_string(),
            ));
        }
        if self.isupport.enforce_max_nick_length && nick.len() > self.isupport.max_nick_length {
            return Err(IrcCoreError::InvalidArgument(format!(
                "nick {nick} exceeds NICKLEN of {}",
                self.isupport.max_nick_length
            )));
        }
        Ok(())
    }

    pub fn join(&mut self, channel: &str, key: Option<&str>) -> Result<()> {
        match key {
            Some(k) => self.write_line("JOIN", &[channel, k]),
            None => self.write_line("JOIN", &[channel]),
        }
    }

    pub fn part(&mut self, channel: &str, message: Option<&str>) -> Result<()> {
        match message {
            Some(m) => self.write_line("PART", &[channel, m]),
            None => self.write_line("PART", &[channel]),
        }
    }

    pub fn kick(&mut self, channel: &str, nicks: &[&str], comment: Option<&str>) -> Result<()> {
        let joined = nicks.join(",");
        match comment {
            Some(c) => self.write_line("KICK", &[channel, &joined, c]),
            None => self.write_line("KICK", &[channel, &joined]),
        }
    }

    pub fn query_userhost(&mut self, nicks: &[&str]) -> Result<()> {
        if nicks.is_empty() || nicks.len() > 5 {
            return Err(IrcCoreError::InvalidArgument(
                "USERHOST accepts between 1 and 5 nicks".to_string(),
            ));
        }
        self.write_line("USERHOST", nicks)
    }

    pub fn query_whois(&mut self, nick: &str) -> Result<()> {
        self.write_line("WHOIS", &[nick])
    }

    pub fn query_names(&mut self, channels: &[&str]) -> Result<()> {
        let joined = channels.join(",");
        self.write_line("NAMES", &[&joined])
    }

    pub fn add_user_modes(&mut self, nick: &str, modes: &str) -> Result<()> {
        self.write_line("MODE", &[nick, &format!("+{modes}")])
    }

    pub fn remove_user_modes(&mut self, nick: &str, modes: &str) -> Result<()> {
        self.write_line("MODE", &[nick, &format!("-{modes}")])
    }

    pub fn add_to_channel_list(
        &mut self,
        channel: &str,
        list_mode: char,
        addresses: &[&str],
    ) -> Result<()> {
        if !self.isupport.channel_list_modes.contains(list_mode) {
            return Err(IrcCoreError::InvalidArgument(format!(
                "'{list_mode}' is not a list mode"
            )));
        }
        let pairs: Vec<(char, Option<&str>)> =
            addresses.iter().map(|a| (list_mode, Some(*a))).collect();
        for line in build_mode_lines(channel, '+', &pairs, self.isupport.message_mode_limit) {
            self.write_raw(&format!("{line}\r\n"))?;
        }
        Ok(())
    }

    pub fn remove_from_channel_list(
        &mut self,
        channel: &str,
        list_mode: char,
        addresses: &[&str],
    ) -> Result<()> {
        if !self.isupport.channel_list_modes.contains(list_mode) {
            return Err(IrcCoreError::InvalidArgument(format!(
                "'{list_mode}' is not a list mode"
            )));
        }
        let pairs: Vec<(char, Option<&str>)> =
            addresses.iter().map(|a| (list_mode, Some(*a))).collect();
        for line in build_mode_lines(channel, '-', &pairs, self.isupport.message_mode_limit) {
            self.write_raw(&format!("{line}\r\n"))?;
        }
        Ok(())
    }

    pub fn add_channel_modes(
        &mut self,
        channel: &str,
        pairs: &[(char, Option<&str>)],
    ) -> Result<()> {
        for line in build_mode_lines(channel, '+', pairs, self.isupport.message_mode_limit) {
            self.write_raw(&format!("{line}\r\n"))?;
        }
        Ok(())
    }

    pub fn remove_channel_modes(
        &mut self,
        channel: &str,
        pairs: &[(char, Option<&str>)],
    ) -> Result<()> {
        for line in build_mode_lines(channel, '-', pairs, self.isupport.message_mode_limit) {
            self.write_raw(&format!("{line}\r\n"))?;
        }
        Ok(())
    }

    pub fn quit(&mut self, message: Option<&str>) -> Result<()> {
        let result = match message {
            Some(m) => self.write_line("QUIT", &[m]),
            None => self.write_line("QUIT", &[]),
        };
        let _ = self.transport.close();
        self.connected = false;
        result
    }
}

fn format_ctcp(tag: &str, data: &str) -> String {
    if data.is_empty() {
        format!("\u{0001}{tag}\u{0001}")
    } else {
        format!("\u{0001}{tag} {data}\u{0001}")
    }
}
