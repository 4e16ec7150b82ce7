//! Typed event subscriptions.
//!
//! Each event is a `Vec` of boxed closures invoked in subscription order
//! (see SPEC_FULL.md §9 Design Notes: "a plain runtime loop over a fixed
//! array of handler slots"). Naming follows the `GuiEvent`-style
//! conventions in the pack's `other_examples/...protocol.rs` reference
//! file, adapted from a single flat enum to independently-subscribable
//! handlers since the `433` chain needs to short-circuit per-handler.

use crate::user::IrcUser;

macro_rules! events {
    ($($name:ident ( $($arg:ident : $ty:ty),* );)*) => {
        #[derive(Default)]
        pub struct EventHandlers {
            $(pub(crate) $name: Vec<Box<dyn FnMut($($ty),*)>>,)*
        }

        impl EventHandlers {
            pub fn new() -> Self {
                Self::default()
            }

            $(
                #[allow(clippy::type_complexity)]
                pub fn $name<F: FnMut($($ty),*) + 'static>(&mut self, handler: F) {
                    self.$name.push(Box::new(handler));
                }
            )*
        }
    };
}

events! {
    on_connect();
    on_message(user: &IrcUser, target: &str, text: &str);
    on_notice(user: &IrcUser, target: &str, text: &str);
    on_nick_change(user: &IrcUser, new_nick: &str);
    on_successful_join(channel: &str);
    on_join(user: &IrcUser, channel: &str);
    on_part(user: &IrcUser, channel: &str);
    on_quit(user: &IrcUser, message: Option<&str>);
    on_kick(kicker: &IrcUser, channel: &str, kicked_nick: &str, comment: Option<&str>);
    on_name_list(channel: &str, names: &[String]);
    on_name_list_end(channel: &str);
    on_ctcp_query(user: &IrcUser, target: &str, tag: &str, data: &str);
    on_ctcp_reply(user: &IrcUser, target: &str, tag: &str, data: &str);
    on_mode_change(channel: &str, mode_string: &str, params: &[&str]);
    on_user_mode_change(user: &IrcUser, mode_string: &str);
    on_topic(channel: &str, topic: &str);
    on_topic_info(channel: &str, setter: &str, set_time: &str);
    on_userhost_reply(users: &[IrcUser]);
    on_invite(channel: &str);
    on_whois_reply(nick: &str, user: &str, host: &str, real_name: &str);
    on_whois_server_reply(nick: &str, server: &str, server_info: &str);
    on_whois_operator_reply(nick: &str);
    on_whois_idle_reply(nick: &str, idle_seconds: u64, signon_time: Option<u64>);
    on_whois_channels_reply(nick: &str, channels: &[String]);
    on_whois_account_reply(nick: &str, account: &str);
    on_whois_end(nick: &str);
    on_whois_away_reply(nick: &str, message: &str);
    on_whois_help_op_reply(nick: &str, text: &str);
    on_whois_special_reply(nick: &str, text: &str);
    on_whois_actually_reply(nick: &str, text: &str);
    on_whois_host_reply(nick: &str, text: &str);
    on_whois_modes_reply(nick: &str, text: &str);
    on_whois_secure_reply(nick: &str, text: &str);
    on_motd(line: &str);
    on_motd_start(line: &str);
    on_motd_end();
    on_no_motd();
    on_server_info(code: &str, text: &str);
}

/// Separate from [`EventHandlers`] because it folds over handlers looking
/// for the first non-empty replacement nick rather than notifying all of
/// them (SPEC_FULL.md §4.5's `433` short-circuit).
type NickInUseHandler = Box<dyn FnMut(&str) -> Option<String>>;

#[derive(Default)]
pub struct NickInUseHandlers {
    pub(crate) handlers: Vec<NickInUseHandler>,
}

impl NickInUseHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_nick_in_use<F: FnMut(&str) -> Option<String> + 'static>(&mut self, handler: F) {
        self.handlers.push(Box::new(handler));
    }
}
