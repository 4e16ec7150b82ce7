//! `nick!user@host` prefix splitting.

/// The three components of a `nick!user@host` message prefix.
///
/// Missing components (no `!`, no `@`) are represented as empty strings,
/// mirroring how the wire format itself can omit them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IrcUser {
    pub nick_name: String,
    pub user_name: String,
    pub host_name: String,
}

impl IrcUser {
    /// Splits a raw prefix slice (without the leading `:`) into its parts.
    pub fn from_prefix(prefix: &str) -> Self {
        let (nick, rest) = match prefix.split_once('!') {
            Some((nick, rest)) => (nick, rest),
            None => {
                return IrcUser {
                    nick_name: prefix.to_string(),
                    ..Default::default()
                }
            }
        };

        let (user, host) = match rest.split_once('@') {
            Some((user, host)) => (user, host),
            None => (rest, ""),
        };

        IrcUser {
            nick_name: nick.to_string(),
            user_name: user.to_string(),
            host_name: host.to_string(),
        }
    }
}
