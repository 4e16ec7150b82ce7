//! Owned, incrementally-updated ISUPPORT (numeric 005) state.
//!
//! The teacher crate's own `Isupport<'a>` is borrowed and parsed once per
//! message; a connection-lived client instead needs a mutable struct that
//! absorbs one 005 line at a time and persists for the connection.

/// Default PREFIX table per RFC 2812 (`@` for op, `+` for voice).
fn default_prefix_table() -> Vec<(char, char)> {
    vec![('@', 'o'), ('+', 'v')]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsupportState {
    /// Ordered `(prefix, mode)` pairs, highest-priority first as advertised.
    pub prefix_table: Vec<(char, char)>,
    pub channel_list_modes: String,
    pub channel_parameterized_modes: String,
    pub channel_nullary_removable_modes: String,
    pub channel_setting_modes: String,
    pub max_nick_length: usize,
    pub enforce_max_nick_length: bool,
    pub message_mode_limit: usize,
    pub network_name: Option<String>,
}

impl Default for IsupportState {
    fn default() -> Self {
        IsupportState {
            prefix_table: default_prefix_table(),
            channel_list_modes: "b".to_string(),
            channel_parameterized_modes: String::new(),
            channel_nullary_removable_modes: String::new(),
            channel_setting_modes: String::new(),
            max_nick_length: 9,
            enforce_max_nick_length: false,
            message_mode_limit: 3,
            network_name: None,
        }
    }
}

impl IsupportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every `NAME[=VALUE]` / `-NAME` token in a single 005 line.
    /// Unknown tokens, and the trailing "are supported by this server"
    /// human-readable text, are ignored.
    pub fn apply_005(&mut self, params: &[&str]) {
        for &token in params {
            if token.contains(' ') {
                // the trailing human-readable text; never a real token
                continue;
            }
            if let Some(name) = token.strip_prefix('-') {
                self.negate(name);
                continue;
            }
            let (name, value) = match token.split_once('=') {
                Some((n, v)) => (n, Some(v)),
                None => (token, None),
            };
            self.apply_token(name, value);
        }
    }

    fn negate(&mut self, name: &str) {
        match name.to_ascii_uppercase().as_str() {
            "NICKLEN" => {
                self.max_nick_length = IsupportState::default().max_nick_length;
                self.enforce_max_nick_length = false;
            }
            "PREFIX" => self.prefix_table = default_prefix_table(),
            "CHANMODES" => {
                let d = IsupportState::default();
                self.channel_list_modes = d.channel_list_modes;
                self.channel_parameterized_modes = d.channel_parameterized_modes;
                self.channel_nullary_removable_modes = d.channel_nullary_removable_modes;
                self.channel_setting_modes = d.channel_setting_modes;
            }
            "NETWORK" => self.network_name = None,
            "MODES" => self.message_mode_limit = IsupportState::default().message_mode_limit,
            _ => {}
        }
    }

    fn apply_token(&mut self, name: &str, value: Option<&str>) {
        match name.to_ascii_uppercase().as_str() {
            "PREFIX" => {
                if let Some(v) = value {
                    if let Some(table) = parse_prefix_value(v) {
                        self.prefix_table = table;
                    }
                }
            }
            "CHANMODES" => {
                if let Some(v) = value {
                    let mut parts = v.splitn(4, ',');
                    if let (Some(a), Some(b), Some(c), Some(d)) =
                        (parts.next(), parts.next(), parts.next(), parts.next())
                    {
                        self.channel_list_modes = a.to_string();
                        self.channel_parameterized_modes = b.to_string();
                        self.channel_nullary_removable_modes = c.to_string();
                        self.channel_setting_modes = d.to_string();
                    }
                }
            }
            "NICKLEN" => {
                if let Some(n) = value.and_then(|v| v.parse::<usize>().ok()) {
                    self.max_nick_length = n;
                    self.enforce_max_nick_length = true;
                }
            }
            "NETWORK" => {
                if let Some(v) = value {
                    self.network_name = Some(v.to_string());
                }
            }
            "MODES" => {
                if let Some(n) = value.and_then(|v| v.parse::<usize>().ok()) {
                    self.message_mode_limit = n;
                }
            }
            _ => {}
        }
    }

    /// Whether `c` is a mode letter that consumes a status-prefix argument
    /// (i.e. one of the modes in the PREFIX table).
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.prefix_table.iter().any(|&(_, m)| m == mode)
    }

    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        self.prefix_table
            .iter()
            .find(|&&(_, m)| m == mode)
            .map(|&(p, _)| p)
    }

    /// Whether `mode` consumes a parameter at all (any of the four CHANMODES
    /// classes except the final "setting" class, plus prefix modes).
    pub fn mode_takes_arg(&self, mode: char, adding: bool) -> bool {
        if self.is_prefix_mode(mode) {
            return true;
        }
        if self.channel_list_modes.contains(mode) || self.channel_parameterized_modes.contains(mode)
        {
            return true;
        }
        if self.channel_nullary_removable_modes.contains(mode) {
            return adding;
        }
        false
    }
}

/// Parses the `(modes)prefixes` PREFIX value into ordered `(prefix, mode)` pairs.
fn parse_prefix_value(s: &str) -> Option<Vec<(char, char)>> {
    let open = s.find('(')?;
    let close = s[open + 1..].find(')')? + open + 1;
    let modes = &s[open + 1..close];
    let prefixes = &s[close + 1..];
    if modes.chars().count() != prefixes.chars().count() {
        return None;
    }
    Some(
        modes
            .chars()
            .zip(prefixes.chars())
            .map(|(m, p)| (p, m))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_prefix_nicklen_network() {
        let mut st = IsupportState::new();
        st.apply_005(&["PREFIX=(ohv)@%+", "NICKLEN=16", "NETWORK=Libera"]);
        assert_eq!(st.prefix_table, vec![('@', 'o'), ('%', 'h'), ('+', 'v')]);
        assert_eq!(st.max_nick_length, 16);
        assert!(st.enforce_max_nick_length);
        assert_eq!(st.network_name.as_deref(), Some("Libera"));
    }

    #[test]
    fn negation_resets_to_default() {
        let mut st = IsupportState::new();
        st.apply_005(&["NICKLEN=16"]);
        assert_eq!(st.max_nick_length, 16);
        st.apply_005(&["-NICKLEN"]);
        assert_eq!(st.max_nick_length, 9);
        assert!(!st.enforce_max_nick_length);
    }

    #[test]
    fn chanmodes_four_way_split() {
        let mut st = IsupportState::new();
        st.apply_005(&["CHANMODES=eIbq,k,flj,CFLMPQScgimnprstz"]);
        assert_eq!(st.channel_list_modes, "eIbq");
        assert_eq!(st.channel_parameterized_modes, "k");
        assert_eq!(st.channel_nullary_removable_modes, "flj");
        assert_eq!(st.channel_setting_modes, "CFLMPQScgimnprstz");
    }

    #[test]
    fn ignores_trailing_human_text() {
        let mut st = IsupportState::new();
        st.apply_005(&["NETWORK=Foo", "are supported by this server"]);
        assert_eq!(st.network_name.as_deref(), Some("Foo"));
    }
}
