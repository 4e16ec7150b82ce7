//! Channel/user state tracking.
//!
//! Grounded stylistically on the teacher's `state::HandshakeMachine`
//! Disabled/Starting/Enabled-ish lifecycle shape, generalized to the
//! tracker's own three states. Rather than subscribing into
//! [`crate::events::EventHandlers`] via boxed closures (which would force
//! a shared `Rc<RefCell<_>>` between dispatcher and tracker, or an unsafe
//! self-reference), the dispatcher calls the tracker's `handle_*` methods
//! directly from inside `Client::dispatch`, passing whatever ISUPPORT/self
//! state a given event needs as a parameter. This keeps the tracker a
//! plain, independently-testable value type and reproduces the documented
//! "tracker observes before application handlers do" ordering by simply
//! calling it first in `dispatch`.

use std::collections::{HashMap, HashSet};

use crate::isupport::IsupportState;
use crate::mode::{parse_mode_changes, Sign};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Disabled,
    Starting,
    Enabled,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackedUser {
    pub nick_name: String,
    pub user_name: String,
    pub host_name: String,
    pub real_name: String,
    pub channels: Vec<String>,
    pub channel_prefixes: HashMap<String, Vec<(char, char)>>,
}

impl TrackedUser {
    fn new(nick: &str) -> Self {
        TrackedUser {
            nick_name: nick.to_string(),
            ..Default::default()
        }
    }

    fn add_prefix(&mut self, channel: &str, prefix: char, mode: char) {
        let list = self
            .channel_prefixes
            .entry(channel.to_string())
            .or_default();
        if let Some(slot) = list.iter_mut().find(|(p, _)| *p == prefix) {
            slot.1 = mode;
        } else {
            list.push((prefix, mode));
        }
    }

    fn remove_prefix(&mut self, channel: &str, prefix: char) {
        if let Some(list) = self.channel_prefixes.get_mut(channel) {
            list.retain(|(p, _)| *p != prefix);
            if list.is_empty() {
                self.channel_prefixes.remove(channel);
            }
        }
    }

    fn drop_channel(&mut self, channel: &str) {
        self.channels.retain(|c| c != channel);
        self.channel_prefixes.remove(channel);
    }

    /// Highest-ranked prefix the user holds in `channel`, by `~ > & > @ > % > +`,
    /// first-acquired wins ties.
    pub fn highest_prefix(&self, channel: &str) -> Option<char> {
        let list = self.channel_prefixes.get(channel)?;
        let mut best: Option<(char, u8)> = None;
        for &(p, _) in list {
            let rank = prefix_rank(p);
            match best {
                None => best = Some((p, rank)),
                Some((_, br)) if rank > br => best = Some((p, rank)),
                _ => {}
            }
        }
        best.map(|(p, _)| p)
    }
}

fn prefix_rank(p: char) -> u8 {
    match p {
        '~' => 5,
        '&' => 4,
        '@' => 3,
        '%' => 2,
        '+' => 1,
        _ => 0,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackedChannel {
    pub name: String,
    pub members: HashSet<String>,
}

impl TrackedChannel {
    fn new(name: &str) -> Self {
        TrackedChannel {
            name: name.to_string(),
            members: HashSet::new(),
        }
    }
}

pub struct Tracker {
    state: TrackerState,
    channels: HashMap<String, TrackedChannel>,
    users: HashMap<String, TrackedUser>,
    self_nick: String,
}

impl Default for Tracker {
    fn default() -> Self {
        Tracker {
            state: TrackerState::Disabled,
            channels: HashMap::new(),
            users: HashMap::new(),
            self_nick: String::new(),
        }
    }
}

/// What the dispatcher should do after calling [`Tracker::start`].
pub enum StartAction {
    None,
    SendWhois(String),
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn start(&mut self, connected: bool, self_nick: &str) -> StartAction {
        if self.state != TrackerState::Disabled {
            return StartAction::None;
        }
        self.self_nick = self_nick.to_string();
        if connected {
            self.state = TrackerState::Starting;
            StartAction::SendWhois(self_nick.to_string())
        } else {
            self.enable();
            StartAction::None
        }
    }

    pub fn stop(&mut self) {
        self.state = TrackerState::Disabled;
        self.channels.clear();
        self.users.clear();
        self.self_nick.clear();
    }

    fn enable(&mut self) {
        self.state = TrackerState::Enabled;
        self.users
            .entry(self.self_nick.clone())
            .or_insert_with(|| TrackedUser::new(&self.self_nick));
    }

    /// 319: returns the channels to synthesize a join for and to query
    /// NAMES on, if this reply is for our own startup WHOIS.
    pub fn handle_whois_channels_reply(
        &mut self,
        isupport: &IsupportState,
        nick: &str,
        raw: &str,
    ) -> Vec<String> {
        if self.state != TrackerState::Starting || nick != self.self_nick {
            return Vec::new();
        }
        self.enable();
        let channels: Vec<String> = raw
            .split_whitespace()
            .map(|tok| {
                tok.trim_start_matches(|c: char| isupport.prefix_table.iter().any(|&(p, _)| p == c))
                    .to_string()
            })
            .collect();
        for c in &channels {
            self.handle_successful_join(c);
        }
        channels
    }

    /// 318: finishes startup with no channels if 319 never arrived.
    pub fn handle_whois_end(&mut self, nick: &str) {
        if self.state == TrackerState::Starting && nick == self.self_nick {
            self.enable();
        }
    }

    pub fn handle_connect(&mut self, nick: &str, user: &str, real_name: &str) {
        if self.state != TrackerState::Enabled {
            return;
        }
        let u = self
            .users
            .entry(nick.to_string())
            .or_insert_with(|| TrackedUser::new(nick));
        u.user_name = user.to_string();
        u.real_name = real_name.to_string();
    }

    pub fn handle_successful_join(&mut self, channel: &str) {
        if self.state != TrackerState::Enabled {
            return;
        }
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| TrackedChannel::new(channel));
        self.channels
            .get_mut(channel)
            .unwrap()
            .members
            .insert(self.self_nick.clone());
        let me = self
            .users
            .entry(self.self_nick.clone())
            .or_insert_with(|| TrackedUser::new(&self.self_nick));
        if !me.channels.iter().any(|c| c == channel) {
            me.channels.push(channel.to_string());
        }
    }

    pub fn handle_name_list(&mut self, isupport: &IsupportState, channel: &str, names: &[String]) {
        if self.state != TrackerState::Enabled {
            return;
        }
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| TrackedChannel::new(channel));

        for raw in names {
            let prefix_chars: Vec<char> = raw
                .chars()
                .take_while(|c| isupport.prefix_table.iter().any(|&(p, _)| p == *c))
                .collect();
            let nick = &raw[prefix_chars.len()..];
            if nick.is_empty() {
                continue;
            }

            self.channels
                .get_mut(channel)
                .unwrap()
                .members
                .insert(nick.to_string());
            let user = self
                .users
                .entry(nick.to_string())
                .or_insert_with(|| TrackedUser::new(nick));
            if !user.channels.iter().any(|c| c == channel) {
                user.channels.push(channel.to_string());
            }
            for &pc in &prefix_chars {
                if let Some(mode) = isupport
                    .prefix_table
                    .iter()
                    .find(|&&(p, _)| p == pc)
                    .map(|&(_, m)| m)
                {
                    user.add_prefix(channel, pc, mode);
                }
            }
        }
    }

    pub fn handle_join(&mut self, nick: &str, user_name: &str, host_name: &str, channel: &str) {
        if self.state != TrackerState::Enabled {
            return;
        }
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| TrackedChannel::new(channel));
        self.channels
            .get_mut(channel)
            .unwrap()
            .members
            .insert(nick.to_string());

        let u = self
            .users
            .entry(nick.to_string())
            .or_insert_with(|| TrackedUser::new(nick));
        if u.user_name.is_empty() {
            u.user_name = user_name.to_string();
        }
        if u.host_name.is_empty() {
            u.host_name = host_name.to_string();
        }
        if !u.channels.iter().any(|c| c == channel) {
            u.channels.push(channel.to_string());
        }
    }

    /// PART/KICK of someone other than self.
    pub fn handle_leave(&mut self, nick: &str, channel: &str) {
        if self.state != TrackerState::Enabled {
            return;
        }
        if nick == self.self_nick {
            self.handle_self_leave(channel);
            return;
        }
        if let Some(c) = self.channels.get_mut(channel) {
            c.members.remove(nick);
        }
        let drop_user = if let Some(u) = self.users.get_mut(nick) {
            u.drop_channel(channel);
            u.channels.is_empty()
        } else {
            false
        };
        if drop_user {
            self.users.remove(nick);
        }
    }

    fn handle_self_leave(&mut self, channel: &str) {
        if let Some(c) = self.channels.remove(channel) {
            for member in c.members {
                let drop_user = if let Some(u) = self.users.get_mut(&member) {
                    u.drop_channel(channel);
                    member != self.self_nick && u.channels.is_empty()
                } else {
                    false
                };
                if drop_user {
                    self.users.remove(&member);
                }
            }
        }
        if let Some(me) = self.users.get_mut(&self.self_nick) {
            me.drop_channel(channel);
        }
    }

    pub fn handle_quit(&mut self, nick: &str) {
        if self.state != TrackerState::Enabled {
            return;
        }
        if let Some(u) = self.users.remove(nick) {
            for channel in &u.channels {
                if let Some(c) = self.channels.get_mut(channel) {
                    c.members.remove(nick);
                }
            }
        }
    }

    pub fn handle_nick_change(&mut self, old_nick: &str, new_nick: &str) {
        if self.state != TrackerState::Enabled {
            return;
        }
        if let Some(mut u) = self.users.remove(old_nick) {
            u.nick_name = new_nick.to_string();
            self.users.insert(new_nick.to_string(), u);
        }
        if old_nick == self.self_nick {
            self.self_nick = new_nick.to_string();
        }
        // Channel member-set keys are deliberately NOT re-keyed here; see DESIGN.md.
    }

    pub fn handle_mode_change(
        &mut self,
        isupport: &IsupportState,
        channel: &str,
        mode_string: &str,
        params: &[&str],
    ) {
        if self.state != TrackerState::Enabled || !channel.starts_with('#') {
            return;
        }
        let changes = match parse_mode_changes(isupport, mode_string, params) {
            Ok(changes) => changes,
            Err(e) => {
                tracing::warn!("malformed MODE string {mode_string:?}: {e}");
                return;
            }
        };
        for change in changes {
            let Some(prefix) = isupport.prefix_for_mode(change.mode) else {
                continue;
            };
            let Some(target_nick) = change.arg else {
                continue;
            };
            let Some(user) = self.users.get_mut(target_nick) else {
                continue;
            };
            match change.sign {
                Sign::Plus => user.add_prefix(channel, prefix, change.mode),
                Sign::Minus => user.remove_prefix(channel, prefix),
            }
        }
    }

    pub fn channels(
        &self,
    ) -> Result<impl Iterator<Item = &TrackedChannel>, crate::error::IrcCoreError> {
        self.require_enabled()?;
        Ok(self.channels.values())
    }

    pub fn users(&self) -> Result<impl Iterator<Item = &TrackedUser>, crate::error::IrcCoreError> {
        self.require_enabled()?;
        Ok(self.users.values())
    }

    pub fn find_channel(
        &self,
        name: &str,
    ) -> Result<Option<&TrackedChannel>, crate::error::IrcCoreError> {
        self.require_enabled()?;
        Ok(self.channels.get(name))
    }

    pub fn find_user(
        &self,
        nick: &str,
    ) -> Result<Option<&TrackedUser>, crate::error::IrcCoreError> {
        self.require_enabled()?;
        Ok(self.users.get(nick))
    }

    pub fn find_member(
        &self,
        channel: &str,
        nick: &str,
    ) -> Result<Option<&TrackedUser>, crate::error::IrcCoreError> {
        self.require_enabled()?;
        Ok(self
            .channels
            .get(channel)
            .filter(|c| c.members.contains(nick))
            .and_then(|_| self.users.get(nick)))
    }

    fn require_enabled(&self) -> Result<(), crate::error::IrcCoreError> {
        if self.state == TrackerState::Enabled {
            Ok(())
        } else {
            Err(crate::error::IrcCoreError::NotTracking)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_tracker() -> Tracker {
        let mut t = Tracker::new();
        t.start(false, "self");
        t
    }

    #[test]
    fn names_reconstructs_roster_and_prefixes() {
        let isupport = IsupportState::new();
        let mut t = enabled_tracker();
        t.handle_successful_join("#a");
        t.handle_name_list(
            &isupport,
            "#a",
            &[
                "@alice".to_string(),
                "+bob".to_string(),
                "carol".to_string(),
            ],
        );

        let chan = t.find_channel("#a").unwrap().unwrap();
        assert_eq!(chan.members.len(), 4);
        assert_eq!(
            t.find_user("alice").unwrap().unwrap().highest_prefix("#a"),
            Some('@')
        );
        assert_eq!(
            t.find_user("bob").unwrap().unwrap().highest_prefix("#a"),
            Some('+')
        );
        assert_eq!(
            t.find_user("carol").unwrap().unwrap().highest_prefix("#a"),
            None
        );
    }

    #[test]
    fn mode_change_adds_and_no_ops_on_missing_prefix() {
        let isupport = IsupportState::new();
        let mut t = enabled_tracker();
        t.handle_successful_join("#a");
        t.handle_name_list(&isupport, "#a", &["@alice".to_string(), "bob".to_string()]);

        t.handle_mode_change(&isupport, "#a", "+o-v", &["bob", "alice"]);
        assert_eq!(
            t.find_user("bob").unwrap().unwrap().highest_prefix("#a"),
            Some('@')
        );
        // alice never had +v: removing it is a no-op, not an error.
        assert_eq!(
            t.find_user("alice").unwrap().unwrap().highest_prefix("#a"),
            Some('@')
        );
    }

    #[test]
    fn nick_change_rekeys_index_not_channel_members() {
        let isupport = IsupportState::new();
        let mut t = enabled_tracker();
        t.handle_successful_join("#a");
        t.handle_name_list(&isupport, "#a", &["alice".to_string()]);

        t.handle_nick_change("alice", "alice2");
        assert!(t.find_user("alice").unwrap().is_none());
        assert_eq!(t.find_user("alice2").unwrap().unwrap().nick_name, "alice2");
        // documented limitation: the channel's member set still has the old key
        assert!(t
            .find_channel("#a")
            .unwrap()
            .unwrap()
            .members
            .contains("alice"));
    }

    #[test]
    fn self_kick_tears_down_channel() {
        let isupport = IsupportState::new();
        let mut t = enabled_tracker();
        t.handle_successful_join("#a");
        t.handle_name_list(&isupport, "#a", &["alice".to_string()]);

        t.handle_leave("self", "#a");
        assert!(t.find_channel("#a").unwrap().is_none());
        assert!(t.find_user("alice").unwrap().is_none());
    }

    #[test]
    fn mid_session_start_sequencing() {
        let isupport = IsupportState::new();
        let mut t = Tracker::new();
        match t.start(true, "self") {
            StartAction::SendWhois(nick) => assert_eq!(nick, "self"),
            StartAction::None => panic!("expected WHOIS"),
        }
        assert_eq!(t.state(), TrackerState::Starting);

        let channels = t.handle_whois_channels_reply(&isupport, "self", "#x #y");
        assert_eq!(channels, vec!["#x".to_string(), "#y".to_string()]);
        assert_eq!(t.state(), TrackerState::Enabled);
        assert!(t.find_channel("#x").unwrap().is_some());
        assert!(t.find_channel("#y").unwrap().is_some());
    }

    #[test]
    fn queries_fail_while_not_tracking() {
        let t = Tracker::new();
        assert!(matches!(
            t.find_channel("#a"),
            Err(crate::error::IrcCoreError::NotTracking)
        ));
    }
}
